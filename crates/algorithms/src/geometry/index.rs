//! Packed R-tree over feature envelopes
//!
//! Bulk loaded with Sort-Tile-Recursive packing and queried by rectangle.
//! Feature pools rebuild it after edits; it is never updated in place.
//!
//! Reference:
//! Leutenegger, S.T., Lopez, M.A., Edgington, J. (1997). STR: a simple and
//! efficient algorithm for R-tree packing. ICDE.

use super::envelope::Envelope;
use geocheck_core::FeatureId;

/// Maximum number of children per node
const NODE_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
pub struct EnvelopeIndex {
    nodes: Vec<IndexNode>,
    root: Option<usize>,
    len: usize,
}

#[derive(Debug, Clone)]
struct IndexNode {
    envelope: Envelope,
    kind: NodeKind,
}

#[derive(Debug, Clone)]
enum NodeKind {
    Leaf(Vec<(FeatureId, Envelope)>),
    /// Indices into `nodes`
    Internal(Vec<usize>),
}

impl EnvelopeIndex {
    /// Bulk load the index
    pub fn build(entries: Vec<(FeatureId, Envelope)>) -> Self {
        let len = entries.len();
        if entries.is_empty() {
            return Self {
                nodes: Vec::new(),
                root: None,
                len,
            };
        }

        let mut nodes = Vec::new();
        let mut level: Vec<usize> = str_tiles(entries, |(_, env)| env.center())
            .into_iter()
            .map(|chunk| {
                let envelope = enclosing(chunk.iter().map(|(_, env)| env));
                nodes.push(IndexNode {
                    envelope,
                    kind: NodeKind::Leaf(chunk),
                });
                nodes.len() - 1
            })
            .collect();

        while level.len() > 1 {
            let centers: Vec<usize> = level;
            let groups = {
                let nodes_ref = &nodes;
                str_tiles(centers, |&idx| nodes_ref[idx].envelope.center())
            };
            level = groups
                .into_iter()
                .map(|children| {
                    let envelope = enclosing(children.iter().map(|&c| &nodes[c].envelope));
                    nodes.push(IndexNode {
                        envelope,
                        kind: NodeKind::Internal(children),
                    });
                    nodes.len() - 1
                })
                .collect();
        }

        Self {
            root: level.first().copied(),
            nodes,
            len,
        }
    }

    /// Number of indexed entries
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Ids whose envelope intersects `query`, ascending
    pub fn query(&self, query: &Envelope) -> Vec<FeatureId> {
        let mut found = Vec::new();
        let Some(root) = self.root else {
            return found;
        };

        let mut stack = vec![root];
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            if !node.envelope.intersects(query) {
                continue;
            }
            match &node.kind {
                NodeKind::Leaf(entries) => found.extend(
                    entries
                        .iter()
                        .filter(|(_, env)| env.intersects(query))
                        .map(|(id, _)| *id),
                ),
                NodeKind::Internal(children) => stack.extend(children.iter().copied()),
            }
        }

        found.sort_unstable();
        found.dedup();
        found
    }
}

fn enclosing<'a>(mut envelopes: impl Iterator<Item = &'a Envelope>) -> Envelope {
    let first = envelopes
        .next()
        .copied()
        .unwrap_or(Envelope::new(0.0, 0.0, 0.0, 0.0));
    envelopes.fold(first, |acc, env| acc.union(env))
}

/// Split items into groups of at most `NODE_CAPACITY`: sort by x into
/// vertical slabs, then by y within each slab.
fn str_tiles<T>(mut items: Vec<T>, center: impl Fn(&T) -> geo::Coord<f64>) -> Vec<Vec<T>> {
    let leaf_count = items.len().div_ceil(NODE_CAPACITY);
    let slab_count = (leaf_count as f64).sqrt().ceil().max(1.0) as usize;
    let slab_size = slab_count * NODE_CAPACITY;

    items.sort_by(|a, b| center(a).x.total_cmp(&center(b).x));

    let mut groups = Vec::with_capacity(leaf_count);
    let mut rest = items;
    while !rest.is_empty() {
        let tail = rest.split_off(slab_size.min(rest.len()));
        let mut slab = rest;
        rest = tail;

        slab.sort_by(|a, b| center(a).y.total_cmp(&center(b).y));
        while !slab.is_empty() {
            let tail = slab.split_off(NODE_CAPACITY.min(slab.len()));
            groups.push(slab);
            slab = tail;
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(n: usize) -> Vec<(FeatureId, Envelope)> {
        let mut entries = Vec::new();
        for row in 0..n {
            for col in 0..n {
                let id = (row * n + col) as FeatureId;
                let (x, y) = (col as f64 * 2.0, row as f64 * 2.0);
                entries.push((id, Envelope::new(x, y, x + 1.0, y + 1.0)));
            }
        }
        entries
    }

    #[test]
    fn test_empty_index() {
        let index = EnvelopeIndex::build(Vec::new());
        assert!(index.is_empty());
        assert!(index.query(&Envelope::new(0.0, 0.0, 1.0, 1.0)).is_empty());
    }

    #[test]
    fn test_query_matches_brute_force() {
        let entries = grid(30);
        let index = EnvelopeIndex::build(entries.clone());
        assert_eq!(index.len(), 900);

        for query in [
            Envelope::new(0.0, 0.0, 0.5, 0.5),
            Envelope::new(3.5, 3.5, 10.2, 4.0),
            Envelope::new(-5.0, -5.0, 100.0, 100.0),
            Envelope::new(1.2, 1.2, 1.8, 1.8),
        ] {
            let mut expected: Vec<FeatureId> = entries
                .iter()
                .filter(|(_, env)| env.intersects(&query))
                .map(|(id, _)| *id)
                .collect();
            expected.sort_unstable();
            assert_eq!(index.query(&query), expected);
        }
    }

    #[test]
    fn test_touching_envelopes_are_found() {
        let index = EnvelopeIndex::build(vec![(7, Envelope::new(0.0, 0.0, 1.0, 1.0))]);
        assert_eq!(index.query(&Envelope::from_coord(geo::Coord { x: 1.0, y: 1.0 })), vec![7]);
    }
}
