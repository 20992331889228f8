//! Feature sinks: append-only destinations for produced features
//!
//! A sink either writes a whole record or reports an error; it never leaves
//! half a feature behind. Sinks are obtained from a [`SinkProvider`] by
//! output name, which lets callers decide where `ERRORS` and `OUTPUT` go.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::rc::Rc;

use serde_json::Value;

use super::geojson::{crs_doc, feature_doc};
use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::vector::{Feature, Fields, GeometryType, Layer};

/// Append-only feature destination
pub trait FeatureSink {
    /// Append one feature; the sink assigns its own feature id
    fn add_feature(&mut self, feature: &Feature) -> Result<()>;

    /// Number of features written so far
    fn feature_count(&self) -> usize;

    /// Flush and close the destination. Calling it twice is harmless.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// What a sink is asked to hold
#[derive(Debug, Clone)]
pub struct SinkSpec {
    pub fields: Fields,
    pub geometry_type: GeometryType,
    pub crs: CRS,
}

/// A freshly created sink and the identifier of where it writes
pub struct CreatedSink {
    pub sink: Box<dyn FeatureSink>,
    pub destination: String,
}

/// Creates sinks for named outputs
pub trait SinkProvider {
    fn create_sink(&mut self, output: &str, spec: &SinkSpec) -> Result<CreatedSink>;

    /// Check that `output` could be created, without creating anything
    fn validate(&self, _output: &str) -> Result<()> {
        Ok(())
    }

    /// Remove what a created but abandoned output left behind
    fn discard(&mut self, _output: &str) -> Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// memory
// ---------------------------------------------------------------------------

/// Sink appending to a shared in-memory layer
pub struct MemorySink {
    layer: Rc<RefCell<Layer>>,
}

impl MemorySink {
    pub fn new(layer: Rc<RefCell<Layer>>) -> Self {
        Self { layer }
    }
}

impl FeatureSink for MemorySink {
    fn add_feature(&mut self, feature: &Feature) -> Result<()> {
        let mut layer = self.layer.borrow_mut();
        let id = layer.next_id();
        layer.add_feature(Feature {
            id,
            geometry: feature.geometry.clone(),
            attributes: feature.attributes.clone(),
        })
    }

    fn feature_count(&self) -> usize {
        self.layer.borrow().feature_count()
    }
}

/// Provider of memory sinks; the produced layers stay readable afterwards
#[derive(Default)]
pub struct MemorySinkProvider {
    layers: BTreeMap<String, Rc<RefCell<Layer>>>,
}

impl MemorySinkProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Destination identifier used for an output name
    pub fn destination(output: &str) -> String {
        format!("memory:{}", output)
    }

    /// Snapshot of the layer written for an output
    pub fn layer(&self, output: &str) -> Option<Layer> {
        self.layers.get(output).map(|l| l.borrow().clone())
    }

    pub fn feature_count(&self, output: &str) -> Option<usize> {
        self.layers.get(output).map(|l| l.borrow().feature_count())
    }
}

impl SinkProvider for MemorySinkProvider {
    fn create_sink(&mut self, output: &str, spec: &SinkSpec) -> Result<CreatedSink> {
        let destination = Self::destination(output);
        let layer = Layer::new(destination.as_str(), output, spec.geometry_type)
            .with_crs(spec.crs.clone())
            .with_fields(spec.fields.clone());
        let layer = Rc::new(RefCell::new(layer));
        self.layers.insert(output.to_string(), layer.clone());
        Ok(CreatedSink {
            sink: Box::new(MemorySink::new(layer)),
            destination,
        })
    }

    fn discard(&mut self, output: &str) -> Result<()> {
        self.layers.remove(output);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// GeoJSON file
// ---------------------------------------------------------------------------

/// Sink streaming a GeoJSON FeatureCollection to a file
pub struct GeoJsonSink {
    writer: BufWriter<File>,
    destination: String,
    fields: Fields,
    written: usize,
    finished: bool,
}

impl GeoJsonSink {
    pub fn create(path: impl Into<PathBuf>, name: &str, spec: &SinkSpec) -> Result<Self> {
        let path = path.into();
        let destination = path.display().to_string();
        let file = File::create(&path)?;
        let mut sink = Self {
            writer: BufWriter::new(file),
            destination,
            fields: spec.fields.clone(),
            written: 0,
            finished: false,
        };
        let mut header = format!(
            "{{\"type\":\"FeatureCollection\",\"name\":{}",
            Value::from(name)
        );
        if let Some(crs) = crs_doc(&spec.crs) {
            header.push_str(",\"crs\":");
            header.push_str(&serde_json::to_string(&crs)?);
        }
        header.push_str(",\"features\":[\n");
        sink.write_raw(header.as_bytes())?;
        Ok(sink)
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes).map_err(|e| Error::Write {
            destination: self.destination.clone(),
            reason: e.to_string(),
        })
    }
}

impl FeatureSink for GeoJsonSink {
    fn add_feature(&mut self, feature: &Feature) -> Result<()> {
        if self.finished {
            return Err(Error::Write {
                destination: self.destination.clone(),
                reason: "sink already finished".to_string(),
            });
        }
        let id = self.written as i64 + 1;
        // Serialise first so a failure cannot leave a partial record behind.
        let doc = serde_json::to_vec(&feature_doc(feature, &self.fields, id))?;
        let mut record = Vec::with_capacity(doc.len() + 2);
        if self.written > 0 {
            record.extend_from_slice(b",\n");
        }
        record.extend_from_slice(&doc);
        self.write_raw(&record)?;
        self.written += 1;
        Ok(())
    }

    fn feature_count(&self) -> usize {
        self.written
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.write_raw(b"\n]}\n")?;
        self.writer.flush().map_err(|e| Error::Write {
            destination: self.destination.clone(),
            reason: e.to_string(),
        })?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for GeoJsonSink {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.finish();
        }
    }
}

/// Provider writing each configured output to its own GeoJSON file
#[derive(Debug, Default)]
pub struct GeoJsonSinkProvider {
    destinations: BTreeMap<String, PathBuf>,
}

impl GeoJsonSinkProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_destination(mut self, output: &str, path: impl Into<PathBuf>) -> Self {
        self.destinations.insert(output.to_string(), path.into());
        self
    }

    fn path(&self, output: &str) -> Result<&PathBuf> {
        self.destinations
            .get(output)
            .ok_or_else(|| Error::Other(format!("no destination configured for {}", output)))
    }
}

impl SinkProvider for GeoJsonSinkProvider {
    fn create_sink(&mut self, output: &str, spec: &SinkSpec) -> Result<CreatedSink> {
        let path = self.path(output)?;
        let sink = GeoJsonSink::create(path.clone(), output, spec)?;
        let destination = sink.destination().to_string();
        Ok(CreatedSink {
            sink: Box::new(sink),
            destination,
        })
    }

    fn validate(&self, output: &str) -> Result<()> {
        let path = self.path(output)?;
        if path.is_dir() {
            return Err(Error::Other(format!("{} is a directory", path.display())));
        }
        match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() && !dir.is_dir() => Err(Error::Other(format!(
                "directory {} does not exist",
                dir.display()
            ))),
            _ => Ok(()),
        }
    }

    fn discard(&mut self, output: &str) -> Result<()> {
        let path = self.path(output)?;
        match std::fs::remove_file(path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::read_geojson;
    use crate::vector::{AttributeValue, Field, FieldKind};
    use geo_types::{point, Geometry};

    fn spec() -> SinkSpec {
        SinkSpec {
            fields: vec![Field::new("gc_error", FieldKind::String)].into_iter().collect(),
            geometry_type: GeometryType::Point,
            crs: CRS::from_epsg(2056),
        }
    }

    fn record(x: f64) -> Feature {
        Feature::new(99, Geometry::Point(point!(x: x, y: 1.0)))
            .with_attributes(vec![AttributeValue::from(format!("{}", x))])
    }

    #[test]
    fn test_memory_provider_keeps_layers() {
        let mut provider = MemorySinkProvider::new();
        let mut created = provider.create_sink("ERRORS", &spec()).unwrap();
        assert_eq!(created.destination, "memory:ERRORS");
        created.sink.add_feature(&record(1.0)).unwrap();
        created.sink.add_feature(&record(2.0)).unwrap();

        assert_eq!(created.sink.feature_count(), 2);
        let layer = provider.layer("ERRORS").unwrap();
        assert_eq!(layer.feature_ids().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(provider.feature_count("OUTPUT"), None);
    }

    #[test]
    fn test_geojson_sink_streams_valid_collection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("errors.geojson");
        let mut provider = GeoJsonSinkProvider::new().with_destination("ERRORS", &path);
        let mut created = provider.create_sink("ERRORS", &spec()).unwrap();
        for x in [1.0, 2.0, 3.0] {
            created.sink.add_feature(&record(x)).unwrap();
        }
        created.sink.finish().unwrap();
        created.sink.finish().unwrap();
        assert!(created.sink.add_feature(&record(4.0)).is_err());

        let layer = read_geojson(&path).unwrap();
        assert_eq!(layer.feature_count(), 3);
        assert_eq!(layer.crs().epsg(), Some(2056));
        assert_eq!(
            layer.feature(3).unwrap().attributes[0],
            AttributeValue::String("3".to_string())
        );
    }

    #[test]
    fn test_geojson_provider_requires_destination() {
        let mut provider = GeoJsonSinkProvider::new();
        assert!(provider.validate("OUTPUT").is_err());
        assert!(provider.create_sink("OUTPUT", &spec()).is_err());
    }

    #[test]
    fn test_geojson_provider_validates_without_creating() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("errors.geojson");
        let bad = dir.path().join("missing").join("output.geojson");
        let provider = GeoJsonSinkProvider::new()
            .with_destination("ERRORS", &good)
            .with_destination("OUTPUT", &bad);

        provider.validate("ERRORS").unwrap();
        assert!(!good.exists());
        assert!(provider.validate("OUTPUT").is_err());
    }

    #[test]
    fn test_discard_removes_created_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.geojson");
        let mut provider = GeoJsonSinkProvider::new().with_destination("OUTPUT", &path);
        let created = provider.create_sink("OUTPUT", &spec()).unwrap();
        drop(created);
        assert!(path.exists());

        provider.discard("OUTPUT").unwrap();
        assert!(!path.exists());
        provider.discard("OUTPUT").unwrap();

        let mut memory = MemorySinkProvider::new();
        memory.create_sink("OUTPUT", &spec()).unwrap();
        memory.discard("OUTPUT").unwrap();
        assert!(memory.layer("OUTPUT").is_none());
    }
}
