//! End-to-end runs of the geometry checks on the regression fixtures.
//!
//! Fixtures (workspace root, `tests/fixtures/geometry_checker/`):
//! - `line_layer.geojson`: 8 single-part multilines. Four edges of a unit
//!   square, a line ending in a 0.028 long segment, two zigzags with sharp
//!   turns and a spur hanging off the square.
//! - `polygon_layer.geojson`: 24 single-part multipolygons on a grid. Nine
//!   unit squares, three chamfered squares, four slivers and eight small
//!   squares of side 0.1.

use std::path::{Path, PathBuf};

use geocheck_algorithms::checks::{AngleParams, AreaParams, Check, SegmentLengthParams};
use geocheck_algorithms::engine::{CheckContext, ErrorValue, FeaturePools};
use geocheck_algorithms::processing::{
    run_check, RunConfig, RunFile, RunOutcome, RunState, ERRORS, ERROR_FIELD_NAMES, OUTPUT,
};
use geocheck_algorithms::{GeometryCheck, ResolutionMethod};
use geocheck_algorithms::CheckEngineError;
use geocheck_core::io::{read_geojson, GeoJsonSinkProvider, MemorySinkProvider};
use geocheck_core::{AttributeValue, CancellationToken, Layer, NoFeedback, ProgressFeedback};
use proptest::prelude::*;

// ── Fixtures ──────────────────────────────────────────────────────────

const LINE_LAYER: &str = "tests/fixtures/geometry_checker/line_layer.geojson";
const POLYGON_LAYER: &str = "tests/fixtures/geometry_checker/polygon_layer.geojson";

fn workspace_root() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest.parent().unwrap().parent().unwrap().to_path_buf()
}

fn load(relative: &str) -> Layer {
    let path = workspace_root().join(relative);
    read_geojson(&path).unwrap_or_else(|e| panic!("failed to read {}: {}", path.display(), e))
}

fn lines() -> Layer {
    load(LINE_LAYER)
}

fn polygons() -> Layer {
    load(POLYGON_LAYER)
}

fn run(check: &Check, layer: Layer) -> (RunOutcome, MemorySinkProvider) {
    run_with(check, vec![layer], &RunConfig::default())
}

fn run_with(check: &Check, layers: Vec<Layer>, config: &RunConfig) -> (RunOutcome, MemorySinkProvider) {
    let mut sinks = MemorySinkProvider::new();
    let outcome = run_check(check, layers, config, &mut sinks, &NoFeedback).unwrap();
    (outcome, sinks)
}

/// Run over one layer and check both sinks hold one record per error
fn error_count(check: &Check, layer: Layer) -> usize {
    let (outcome, sinks) = run(check, layer);
    assert_eq!(outcome.state, RunState::Done);
    let errors = sinks.feature_count(ERRORS).unwrap();
    assert_eq!(errors, outcome.error_count());
    assert_eq!(sinks.feature_count(OUTPUT), Some(errors));
    errors
}

fn segment_length(min: f64) -> Check {
    Check::segment_length(SegmentLengthParams {
        min_segment_length: min,
    })
    .unwrap()
}

// ── Regression counts ─────────────────────────────────────────────────

#[test]
fn test_segment_length_regression() {
    let check = segment_length(0.03);
    assert_eq!(error_count(&check, lines()), 1);
    assert_eq!(error_count(&check, polygons()), 3);
}

#[test]
fn test_angle_regression() {
    let check = Check::angle(AngleParams { min_angle: 15.0 }).unwrap();
    assert_eq!(error_count(&check, lines()), 4);
    assert_eq!(error_count(&check, polygons()), 4);
}

#[test]
fn test_multipart_regression() {
    let check = Check::multipart();
    assert_eq!(error_count(&check, lines()), 8);
    assert_eq!(error_count(&check, polygons()), 24);
}

#[test]
fn test_area_regression() {
    let check = Check::area(AreaParams { area_threshold: 0.04 }).unwrap();
    let (outcome, sinks) = run(&check, polygons());
    assert_eq!(outcome.error_count(), 8);
    assert_eq!(sinks.feature_count(ERRORS), Some(8));
    assert_eq!(sinks.feature_count(OUTPUT), Some(8));
}

#[test]
fn test_dangle_regression() {
    assert_eq!(error_count(&Check::dangle(), lines()), 6);
}

#[test]
fn test_segment_length_values() {
    let (outcome, _) = run(&segment_length(0.03), lines());
    let error = &outcome.errors[0];
    assert_eq!(error.feature_id(), 5);
    assert_eq!((error.vidx().part, error.vidx().ring, error.vidx().vertex), (0, 0, 1));
    match error.value() {
        ErrorValue::Number(length) => assert!((length - 0.02f64.hypot(0.02)).abs() < 1e-9),
        other => panic!("unexpected value {:?}", other),
    }
}

// ── Properties ────────────────────────────────────────────────────────

#[test]
fn test_collection_is_idempotent() {
    let checks = [
        segment_length(0.03),
        Check::angle(AngleParams { min_angle: 15.0 }).unwrap(),
        Check::dangle(),
        Check::multipart(),
    ];
    let pools = FeaturePools::from_layers(vec![lines()], false).unwrap();
    let context = CheckContext::new(Default::default(), pools.first().unwrap().crs().clone());
    for check in &checks {
        let first = check.as_check().collect_errors(&pools, &context, &NoFeedback).unwrap();
        let second = check.as_check().collect_errors(&pools, &context, &NoFeedback).unwrap();
        assert_eq!(first.errors, second.errors, "{}", check.as_check().id());
    }
}

#[test]
fn test_error_records_follow_schema() {
    let (_, sinks) = run(&Check::angle(AngleParams { min_angle: 15.0 }).unwrap(), polygons());
    let errors = sinks.layer(ERRORS).unwrap();
    assert_eq!(errors.fields().names(), ERROR_FIELD_NAMES.to_vec());
    assert_eq!(errors.feature_count(), 4);

    for record in errors.features() {
        assert!(matches!(record.geometry, Some(geo::Geometry::Point(_))));
        assert!(matches!(&record.attributes[0], AttributeValue::String(id) if id == "polygon_layer"));
        assert!(matches!(record.attributes[2], AttributeValue::Int(fid) if fid > 0));
        for slot in 3..6 {
            assert!(matches!(record.attributes[slot], AttributeValue::Int(i) if i >= -1));
        }
    }
}

#[test]
fn test_contained_never_matches_itself() {
    let (outcome, sinks) = run_with(&Check::contained(), vec![polygons(), lines()], &RunConfig::default());
    assert_eq!(outcome.state, RunState::Done);
    assert!(sinks.feature_count(OUTPUT).is_none());
    assert_eq!(sinks.feature_count(ERRORS), Some(outcome.error_count()));

    for error in &outcome.errors {
        if let ErrorValue::Feature { layer, feature } = error.value() {
            assert!(!(layer == error.layer_id() && *feature == error.feature_id()));
        }
    }
    // The square's four edges lie in polygon 1, the first zigzag in polygon 2
    let contained: Vec<i64> = outcome.errors.iter().map(|e| e.feature_id()).collect();
    assert_eq!(contained, vec![1, 2, 3, 4, 6]);
    assert!(outcome.errors.iter().all(|e| e.layer_id().as_str() == "line_layer"));
}

#[test]
fn test_zero_minimum_finds_nothing() {
    assert_eq!(error_count(&segment_length(0.0), lines()), 0);
    assert_eq!(error_count(&segment_length(0.0), polygons()), 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_segment_length_is_monotone(a in 0.0f64..0.2, b in 0.0f64..0.2) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let pools = FeaturePools::from_layers(vec![polygons()], false).unwrap();
        let context = CheckContext::new(Default::default(), pools.first().unwrap().crs().clone());
        let count = |min: f64| {
            segment_length(min)
                .as_check()
                .collect_errors(&pools, &context, &NoFeedback)
                .unwrap()
                .errors
                .len()
        };
        prop_assert!(count(low) <= count(high));
    }
}

// ── In-place and cancellation ─────────────────────────────────────────

#[test]
fn test_in_place_angle_fix() {
    let check = Check::angle(AngleParams { min_angle: 15.0 }).unwrap();
    let config = RunConfig {
        in_place: Some(ResolutionMethod::DeleteNode),
        ..RunConfig::default()
    };
    let (outcome, sinks) = run_with(&check, vec![lines()], &config);

    assert_eq!(outcome.state, RunState::Done);
    assert_eq!(sinks.feature_count(ERRORS), Some(4));
    // Removing the first sharp vertex of each zigzag opens up the second one
    assert_eq!(outcome.fix_summary.fixed, 2);
    assert_eq!(outcome.fix_summary.obsolete, 2);

    let fixed = sinks.layer(OUTPUT).unwrap();
    assert_eq!(fixed.feature_count(), 8);
    assert_eq!(fixed.fields().names(), vec!["name"]);
    let again = error_count(&check, fixed);
    assert_eq!(again, 0);
}

#[test]
fn test_in_place_no_action_reexports_source() {
    let config = RunConfig {
        in_place: Some(ResolutionMethod::NoAction),
        ..RunConfig::default()
    };
    let (outcome, sinks) = run_with(&segment_length(0.03), vec![polygons()], &config);
    assert_eq!(outcome.fix_summary.unchanged, 3);
    assert_eq!(sinks.feature_count(ERRORS), Some(3));
    assert_eq!(sinks.feature_count(OUTPUT), Some(24));
}

#[test]
fn test_cancel_during_export() {
    let token = CancellationToken::new();
    let trigger = token.clone();
    let feedback = ProgressFeedback::new().with_token(token).on_progress(move |fraction| {
        // Past the first records of the export step (third of three)
        if fraction > 0.7 {
            trigger.cancel();
        }
    });
    let mut sinks = MemorySinkProvider::new();
    let outcome =
        run_check(&Check::multipart(), vec![polygons()], &RunConfig::default(), &mut sinks, &feedback).unwrap();

    assert_eq!(outcome.state, RunState::Cancelled);
    assert_eq!(outcome.error_count(), 24);
    assert!(outcome.exported > 0 && outcome.exported < 24);
    assert_eq!(sinks.feature_count(ERRORS), Some(outcome.exported));
    assert_eq!(sinks.feature_count(OUTPUT), Some(outcome.exported));
}

// ── Run files ─────────────────────────────────────────────────────────

#[test]
fn test_run_file_writes_geojson() {
    let dir = tempfile::tempdir().unwrap();
    let run_json = format!(
        r#"{{
            "inputs": [{{ "path": {} }}],
            "rule": {{ "check": "area", "areaThreshold": 0.04 }},
            "outputs": {{ "errors": "errors.geojson", "output": "flagged.geojson" }}
        }}"#,
        serde_json::to_string(&workspace_root().join(POLYGON_LAYER)).unwrap()
    );
    let run_path = dir.path().join("run.json");
    std::fs::write(&run_path, run_json).unwrap();

    let run = RunFile::from_path(&run_path).unwrap();
    let layers = run.load_layers().unwrap();
    let config = run.config(&layers);
    let mut sinks = run.sink_provider();
    let outcome = run_check(&run.check().unwrap(), layers, &config, &mut sinks, &NoFeedback).unwrap();

    assert_eq!(outcome.state, RunState::Done);
    let errors_path = dir.path().join("errors.geojson");
    assert_eq!(outcome.outputs.get(ERRORS), Some(&errors_path.display().to_string()));
    let errors = read_geojson(&errors_path).unwrap();
    let flagged = read_geojson(dir.path().join("flagged.geojson")).unwrap();
    assert_eq!(errors.feature_count(), 8);
    assert_eq!(flagged.feature_count(), 8);
}

#[test]
fn test_unusable_destination_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("flagged.geojson");
    let errors = dir.path().join("missing").join("errors.geojson");
    let mut sinks = GeoJsonSinkProvider::new()
        .with_destination(OUTPUT, &output)
        .with_destination(ERRORS, &errors);

    let check = Check::area(AreaParams { area_threshold: 0.04 }).unwrap();
    let err = run_check(&check, vec![polygons()], &RunConfig::default(), &mut sinks, &NoFeedback).unwrap_err();
    assert!(matches!(err, CheckEngineError::Configuration { ref parameter, .. } if parameter == ERRORS));
    assert!(!output.exists());
    assert!(!errors.exists());
}
