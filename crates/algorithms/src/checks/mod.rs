//! Geometry checks
//!
//! Every rule implements [`GeometryCheck`]: it walks the feature pools,
//! reports [`CheckError`]s and, for rules that can repair what they find,
//! applies a [`ResolutionMethod`] to one error at a time.
//!
//! - `contained`: features lying within a polygon of any input layer
//! - `line_layer_intersection`: lines meeting a second layer
//! - `segment_length`: segments shorter than a minimum
//! - `angle`: vertices forming a too-sharp angle
//! - `area`: polygon parts below an area threshold
//! - `dangle`: line ends touching nothing
//! - `multipart`: multi-type geometries holding one part

mod angle;
mod area;
mod contained;
mod dangle;
mod line_intersection;
mod multipart;
mod segment_length;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use geocheck_core::{Feedback, GeometryType, LayerId};
use serde::{Deserialize, Serialize};

use crate::engine::{CheckContext, CheckError, Changes, FeaturePools};
use crate::error::{CheckEngineError, Result};

pub use angle::{AngleCheck, AngleParams};
pub use area::{AreaCheck, AreaParams};
pub use contained::ContainedCheck;
pub use dangle::DangleCheck;
pub use line_intersection::{LineLayerIntersectionCheck, LineLayerIntersectionParams};
pub use multipart::MultipartCheck;
pub use segment_length::{SegmentLengthCheck, SegmentLengthParams};

/// Attribute compared per layer by [`ResolutionMethod::MergeIdenticalAttribute`]
pub type MergeAttributes = BTreeMap<LayerId, String>;

/// How an error gets fixed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    DeleteNode,
    MergeLongestEdge,
    MergeLargestArea,
    MergeIdenticalAttribute,
    ConvertToSingle,
    DeleteFeature,
    NoAction,
}

impl ResolutionMethod {
    pub const ALL: [ResolutionMethod; 7] = [
        ResolutionMethod::DeleteNode,
        ResolutionMethod::MergeLongestEdge,
        ResolutionMethod::MergeLargestArea,
        ResolutionMethod::MergeIdenticalAttribute,
        ResolutionMethod::ConvertToSingle,
        ResolutionMethod::DeleteFeature,
        ResolutionMethod::NoAction,
    ];

    /// Identifier used in configuration and on the command line
    pub fn id(&self) -> &'static str {
        match self {
            ResolutionMethod::DeleteNode => "delete_node",
            ResolutionMethod::MergeLongestEdge => "merge_longest_edge",
            ResolutionMethod::MergeLargestArea => "merge_largest_area",
            ResolutionMethod::MergeIdenticalAttribute => "merge_identical_attribute",
            ResolutionMethod::ConvertToSingle => "convert_to_single",
            ResolutionMethod::DeleteFeature => "delete_feature",
            ResolutionMethod::NoAction => "no_action",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ResolutionMethod::DeleteNode => "Delete node",
            ResolutionMethod::MergeLongestEdge => {
                "Merge with neighboring polygon with longest shared edge"
            }
            ResolutionMethod::MergeLargestArea => "Merge with neighboring polygon with largest area",
            ResolutionMethod::MergeIdenticalAttribute => {
                "Merge with neighboring polygon with identical attribute value"
            }
            ResolutionMethod::ConvertToSingle => "Convert to single part feature",
            ResolutionMethod::DeleteFeature => "Delete feature",
            ResolutionMethod::NoAction => "No action",
        }
    }
}

impl fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ResolutionMethod {
    type Err = CheckEngineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.id() == s)
            .ok_or_else(|| CheckEngineError::InvalidParameter {
                name: "resolution",
                value: s.to_string(),
                reason: "unknown resolution method".to_string(),
            })
    }
}

/// What became of one fix attempt
#[derive(Debug, Clone, PartialEq)]
pub enum FixOutcome {
    Fixed,
    /// `NoAction`, or nothing to do
    NoChange,
    /// The error no longer applies to the current geometry
    Obsolete,
    /// The fix was refused; the data is unchanged
    Failed(String),
}

/// Errors of one collection pass plus anomalies met on the way
#[derive(Debug, Clone, Default)]
pub struct CollectedErrors {
    pub errors: Vec<CheckError>,
    pub messages: Vec<String>,
}

/// A validation rule
pub trait GeometryCheck {
    /// Stable identifier, e.g. `segment_length`
    fn id(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Layer geometry types the rule examines
    fn compatible_geometry_types(&self) -> &'static [GeometryType];

    /// Reject input combinations the rule cannot work with
    fn validate_inputs(&self, pools: &FeaturePools) -> Result<()> {
        let Some(primary) = pools.first() else {
            return Err(CheckEngineError::configuration("INPUT", "no input layer supplied"));
        };
        if !self.compatible_geometry_types().contains(&primary.geometry_type()) {
            return Err(CheckEngineError::configuration(
                "INPUT",
                format!(
                    "{} layers cannot be checked by the {} check",
                    primary.geometry_type(),
                    self.id()
                ),
            ));
        }
        Ok(())
    }

    /// Walk the pools and report errors, in visiting order
    fn collect_errors(
        &self,
        pools: &FeaturePools,
        context: &CheckContext,
        feedback: &dyn Feedback,
    ) -> Result<CollectedErrors>;

    /// Available resolutions; `NoAction` is always last
    fn resolution_methods(&self) -> &'static [ResolutionMethod] {
        &[ResolutionMethod::NoAction]
    }

    /// Whether errors on layers of this type can be fixed during the run
    fn supports_in_place(&self, _geometry_type: GeometryType) -> bool {
        false
    }

    /// Whether the run produces an `OUTPUT` layer besides `ERRORS`
    fn produces_output_layer(&self) -> bool {
        true
    }

    /// Apply `method` to `error`, recording every edit in `changes`
    fn fix_error(
        &self,
        _pools: &mut FeaturePools,
        _context: &CheckContext,
        error: &CheckError,
        method: ResolutionMethod,
        _merge_attributes: &MergeAttributes,
        _changes: &mut Changes,
    ) -> Result<FixOutcome> {
        match method {
            ResolutionMethod::NoAction => Ok(FixOutcome::NoChange),
            other => Err(CheckEngineError::UnsupportedResolution {
                check: error.check(),
                method: other,
            }),
        }
    }
}

/// Reject a method the check does not list
pub(crate) fn ensure_supported(check: &dyn GeometryCheck, method: ResolutionMethod) -> Result<()> {
    if check.resolution_methods().contains(&method) {
        Ok(())
    } else {
        Err(CheckEngineError::UnsupportedResolution {
            check: check.id(),
            method,
        })
    }
}

/// Check a numeric parameter is finite and within `[min, max]`
pub(crate) fn validate_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<()> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(CheckEngineError::InvalidParameter {
            name,
            value: value.to_string(),
            reason: format!("must be between {} and {}", min, max),
        })
    }
}

/// Report progress for item `done` of `total`
pub(crate) fn report_progress(feedback: &dyn Feedback, done: usize, total: usize) {
    if total > 0 {
        feedback.set_progress(done as f64 / total as f64);
    }
}

/// A configured rule
#[derive(Debug, Clone)]
pub enum Check {
    Contained(ContainedCheck),
    LineLayerIntersection(LineLayerIntersectionCheck),
    SegmentLength(SegmentLengthCheck),
    Angle(AngleCheck),
    Area(AreaCheck),
    Dangle(DangleCheck),
    Multipart(MultipartCheck),
}

impl Check {
    pub fn contained() -> Self {
        Check::Contained(ContainedCheck)
    }

    pub fn line_layer_intersection(params: LineLayerIntersectionParams) -> Result<Self> {
        Ok(Check::LineLayerIntersection(LineLayerIntersectionCheck::new(params)?))
    }

    pub fn segment_length(params: SegmentLengthParams) -> Result<Self> {
        Ok(Check::SegmentLength(SegmentLengthCheck::new(params)?))
    }

    pub fn angle(params: AngleParams) -> Result<Self> {
        Ok(Check::Angle(AngleCheck::new(params)?))
    }

    pub fn area(params: AreaParams) -> Result<Self> {
        Ok(Check::Area(AreaCheck::new(params)?))
    }

    pub fn dangle() -> Self {
        Check::Dangle(DangleCheck)
    }

    pub fn multipart() -> Self {
        Check::Multipart(MultipartCheck)
    }

    pub fn as_check(&self) -> &dyn GeometryCheck {
        match self {
            Check::Contained(c) => c,
            Check::LineLayerIntersection(c) => c,
            Check::SegmentLength(c) => c,
            Check::Angle(c) => c,
            Check::Area(c) => c,
            Check::Dangle(c) => c,
            Check::Multipart(c) => c,
        }
    }
}

/// Serializable description of a rule and its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum CheckSpec {
    Contained,
    LineLayerIntersection(LineLayerIntersectionParams),
    SegmentLength(SegmentLengthParams),
    Angle(AngleParams),
    Area(AreaParams),
    Dangle,
    Multipart,
}

impl CheckSpec {
    pub fn build(&self) -> Result<Check> {
        match self {
            CheckSpec::Contained => Ok(Check::contained()),
            CheckSpec::LineLayerIntersection(p) => Check::line_layer_intersection(p.clone()),
            CheckSpec::SegmentLength(p) => Check::segment_length(p.clone()),
            CheckSpec::Angle(p) => Check::angle(p.clone()),
            CheckSpec::Area(p) => Check::area(p.clone()),
            CheckSpec::Dangle => Ok(Check::dangle()),
            CheckSpec::Multipart => Ok(Check::multipart()),
        }
    }
}
