//! JSON run description: inputs, rule, outputs and run options
//!
//! ```json
//! {
//!   "inputs": [{ "path": "roads.geojson" }],
//!   "rule": { "check": "segment_length", "min_segment_length": 0.03 },
//!   "outputs": { "errors": "errors.geojson", "output": "flagged.geojson" },
//!   "tolerance": 8
//! }
//! ```
//!
//! Relative paths are resolved against the directory of the run file.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use geocheck_core::io::{read_geojson_str, GeoJsonSinkProvider};
use geocheck_core::{FeatureId, Layer, Project};
use serde::{Deserialize, Serialize};

use super::driver::{RunConfig, ERRORS, OUTPUT};
use crate::checks::{Check, CheckSpec, MergeAttributes, ResolutionMethod};
use crate::engine::Tolerance;
use crate::error::{CheckEngineError, Result};

/// One input layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunInput {
    pub path: PathBuf,
    /// Layer id, defaults to the file stem
    #[serde(default)]
    pub id: Option<String>,
    /// Display name; defaults to the document's name, then to the id
    #[serde(default)]
    pub name: Option<String>,
    /// Feature ids to select
    #[serde(default)]
    pub selected: Option<Vec<FeatureId>>,
}

/// Destinations of the named outputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunOutputs {
    pub errors: PathBuf,
    #[serde(default)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunFile {
    pub inputs: Vec<RunInput>,
    pub rule: CheckSpec,
    pub outputs: RunOutputs,
    #[serde(default)]
    pub tolerance: Tolerance,
    #[serde(default)]
    pub selected_only: bool,
    /// Fix errors in place with this method
    #[serde(default)]
    pub in_place: Option<ResolutionMethod>,
    #[serde(default)]
    pub merge_attributes: MergeAttributes,
    #[serde(skip)]
    base_dir: PathBuf,
}

impl RunFile {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| CheckEngineError::Core(e.into()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| CheckEngineError::Core(e.into()))?;
        let mut run = Self::from_json_str(&text)?;
        run.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(run)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Build the configured rule, validating its parameters
    pub fn check(&self) -> Result<Check> {
        self.rule.build()
    }

    /// Read every input layer, in file order
    pub fn load_layers(&self) -> Result<Vec<Layer>> {
        if self.inputs.is_empty() {
            return Err(CheckEngineError::configuration("INPUT", "the run file lists no inputs"));
        }
        self.inputs
            .iter()
            .map(|input| {
                let path = self.resolve(&input.path);
                let text = fs::read_to_string(&path).map_err(|e| {
                    CheckEngineError::configuration("INPUT", format!("could not read {}: {}", path.display(), e))
                })?;
                let stem = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "layer".to_string());
                let id = input.id.clone().unwrap_or(stem);
                let mut layer = read_geojson_str(&text, id.as_str(), input.name.as_deref())?;
                if let Some(selected) = &input.selected {
                    layer.select(selected.iter().copied());
                }
                Ok(layer)
            })
            .collect()
    }

    /// Run options; the project registers the input layers by name
    pub fn config(&self, layers: &[Layer]) -> RunConfig {
        let crs = layers.first().map(|l| l.crs().clone()).unwrap_or_default();
        let mut project = Project::new(crs);
        for layer in layers {
            project.add_layer(layer);
        }
        RunConfig {
            tolerance: self.tolerance,
            selected_only: self.selected_only,
            in_place: self.in_place,
            merge_attributes: self.merge_attributes.clone(),
            project: Some(Arc::new(project)),
        }
    }

    /// GeoJSON sinks for the configured outputs
    pub fn sink_provider(&self) -> GeoJsonSinkProvider {
        let provider = GeoJsonSinkProvider::new().with_destination(ERRORS, self.resolve(&self.outputs.errors));
        match &self.outputs.output {
            Some(output) => provider.with_destination(OUTPUT, self.resolve(output)),
            None => provider,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geocheck_core::LayerId;

    const RUN: &str = r#"{
        "inputs": [{ "path": "parcels.geojson", "id": "parcels_1", "name": "Parcels", "selected": [2] }],
        "rule": { "check": "area", "area_threshold": 0.5 },
        "outputs": { "errors": "errors.geojson", "output": "flagged.geojson" },
        "tolerance": 6,
        "in_place": "merge_identical_attribute",
        "merge_attributes": { "parcels_1": "owner" }
    }"#;

    #[test]
    fn test_parse_run_file() {
        let run = RunFile::from_json_str(RUN).unwrap();
        assert_eq!(run.tolerance.digits(), 6);
        assert_eq!(run.in_place, Some(ResolutionMethod::MergeIdenticalAttribute));
        assert_eq!(run.merge_attributes.get(&LayerId::new("parcels_1")).map(String::as_str), Some("owner"));
        assert_eq!(run.check().unwrap().as_check().id(), "area");
        assert!(!run.selected_only);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(RunFile::from_json_str(&RUN.replace("\"tolerance\": 6", "\"tolerance\": 20")).is_err());
        assert!(RunFile::from_json_str(&RUN.replace("\"in_place\"", "\"in_plaice\"")).is_err());
    }

    #[test]
    fn test_load_layers_relative_to_run_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("parcels.geojson"),
            r#"{"type": "FeatureCollection", "name": "cadastre", "features": [
                {"type": "Feature", "id": 1, "properties": {"owner": "a"},
                 "geometry": {"type": "Point", "coordinates": [0.0, 0.0]}},
                {"type": "Feature", "id": 2, "properties": {"owner": "b"},
                 "geometry": {"type": "Point", "coordinates": [1.0, 0.0]}}
            ]}"#,
        )
        .unwrap();
        let run_path = dir.path().join("run.json");
        fs::write(&run_path, RUN).unwrap();

        let run = RunFile::from_path(&run_path).unwrap();
        let layers = run.load_layers().unwrap();
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].id(), &LayerId::new("parcels_1"));
        assert_eq!(layers[0].name(), "Parcels");
        assert_eq!(layers[0].selected_ids().iter().copied().collect::<Vec<_>>(), vec![2]);

        let config = run.config(&layers);
        assert_eq!(config.project.as_ref().and_then(|p| p.layer_name(&LayerId::new("parcels_1"))), Some("Parcels"));

        // Without a configured name the document's name is used
        let unnamed_path = dir.path().join("unnamed.json");
        fs::write(&unnamed_path, RUN.replace(", \"name\": \"Parcels\"", "")).unwrap();
        let unnamed = RunFile::from_path(&unnamed_path).unwrap();
        assert_eq!(unnamed.load_layers().unwrap()[0].name(), "cadastre");
    }
}
