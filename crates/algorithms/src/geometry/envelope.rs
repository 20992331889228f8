//! Search windows for coarse spatial filtering
//!
//! An envelope is the bounding `Rect` of a feature, grown by the run's
//! tolerance before it is used as a search window, so that candidates lying
//! within tolerance of the bounds are not filtered out.

use geo::{BoundingRect, Coord, Intersects, Rect};

/// Axis-aligned search window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope(Rect<f64>);

impl Envelope {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self(Rect::new(Coord { x: min_x, y: min_y }, Coord { x: max_x, y: max_y }))
    }

    pub fn from_coord(c: Coord<f64>) -> Self {
        Self(Rect::new(c, c))
    }

    /// Window reaching `eps` around a coordinate
    pub fn around(c: Coord<f64>, eps: f64) -> Self {
        Self::from_coord(c).expanded(eps)
    }

    /// Bounds of anything with coordinates, `None` when it has none
    pub fn of<G>(geom: &G) -> Option<Self>
    where
        G: BoundingRect<f64, Output = Option<Rect<f64>>>,
    {
        geom.bounding_rect().map(Self)
    }

    pub fn rect(&self) -> Rect<f64> {
        self.0
    }

    pub fn center(&self) -> Coord<f64> {
        self.0.center()
    }

    /// Grow on every side by the tolerance `eps`
    pub fn expanded(&self, eps: f64) -> Self {
        let (min, max) = (self.0.min(), self.0.max());
        Self::new(min.x - eps, min.y - eps, max.x + eps, max.y + eps)
    }

    /// Smallest envelope holding both
    pub fn union(&self, other: &Envelope) -> Self {
        let (a, b) = (self.0, other.0);
        Self::new(
            a.min().x.min(b.min().x),
            a.min().y.min(b.min().y),
            a.max().x.max(b.max().x),
            a.max().y.max(b.max().y),
        )
    }

    /// Touching windows intersect
    pub fn intersects(&self, other: &Envelope) -> bool {
        self.0.intersects(&other.0)
    }

    /// `other` lies within this window, boundary included
    pub fn covers(&self, other: &Envelope) -> bool {
        let (outer, inner) = (self.0, other.0);
        inner.min().x >= outer.min().x
            && inner.min().y >= outer.min().y
            && inner.max().x <= outer.max().x
            && inner.max().y <= outer.max().y
    }
}
