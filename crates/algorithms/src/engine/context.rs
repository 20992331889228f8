//! Run-wide context: tolerance, CRS and the project handle

use std::sync::Arc;

use geocheck_core::{LayerId, Project, TransformContext, CRS};
use serde::{Deserialize, Serialize};

use crate::error::{CheckEngineError, Result};

/// Comparison tolerance as a number of decimal digits
///
/// Coordinates closer than `10^-digits` are treated as equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Tolerance(u8);

impl Tolerance {
    pub const MIN_DIGITS: u8 = 1;
    pub const MAX_DIGITS: u8 = 13;
    pub const DEFAULT_DIGITS: u8 = 8;

    pub fn new(digits: u8) -> Result<Self> {
        if (Self::MIN_DIGITS..=Self::MAX_DIGITS).contains(&digits) {
            Ok(Self(digits))
        } else {
            Err(CheckEngineError::InvalidParameter {
                name: "tolerance",
                value: digits.to_string(),
                reason: format!(
                    "must be between {} and {}",
                    Self::MIN_DIGITS,
                    Self::MAX_DIGITS
                ),
            })
        }
    }

    pub fn digits(&self) -> u8 {
        self.0
    }

    pub fn epsilon(&self) -> f64 {
        10f64.powi(-i32::from(self.0))
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self(Self::DEFAULT_DIGITS)
    }
}

impl TryFrom<u8> for Tolerance {
    type Error = CheckEngineError;

    fn try_from(digits: u8) -> Result<Self> {
        Self::new(digits)
    }
}

impl From<Tolerance> for u8 {
    fn from(tolerance: Tolerance) -> u8 {
        tolerance.0
    }
}

/// Everything a check may consult besides the features themselves
#[derive(Debug, Clone)]
pub struct CheckContext {
    tolerance: Tolerance,
    crs: CRS,
    transform_context: TransformContext,
    project: Option<Arc<Project>>,
}

impl CheckContext {
    pub fn new(tolerance: Tolerance, crs: CRS) -> Self {
        Self {
            tolerance,
            crs,
            transform_context: TransformContext::default(),
            project: None,
        }
    }

    /// Take CRS and transform context from the project
    pub fn for_project(tolerance: Tolerance, project: Arc<Project>) -> Self {
        Self {
            tolerance,
            crs: project.crs().clone(),
            transform_context: project.transform_context().clone(),
            project: Some(project),
        }
    }

    pub fn tolerance(&self) -> Tolerance {
        self.tolerance
    }

    pub fn epsilon(&self) -> f64 {
        self.tolerance.epsilon()
    }

    pub fn crs(&self) -> &CRS {
        &self.crs
    }

    pub fn transform_context(&self) -> &TransformContext {
        &self.transform_context
    }

    pub fn project(&self) -> Option<&Project> {
        self.project.as_deref()
    }

    /// Display name registered in the project, if any
    pub fn layer_name(&self, id: &LayerId) -> Option<&str> {
        self.project().and_then(|p| p.layer_name(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geocheck_core::{GeometryType, Layer};

    #[test]
    fn test_tolerance_bounds() {
        assert!(Tolerance::new(0).is_err());
        assert!(Tolerance::new(14).is_err());
        assert_eq!(Tolerance::new(13).unwrap().digits(), 13);
        assert_eq!(Tolerance::default().digits(), 8);
        assert!((Tolerance::new(3).unwrap().epsilon() - 0.001).abs() < 1e-15);
    }

    #[test]
    fn test_tolerance_deserialize() {
        let t: Tolerance = serde_json::from_str("5").unwrap();
        assert_eq!(t.digits(), 5);
        assert!(serde_json::from_str::<Tolerance>("20").is_err());
    }

    #[test]
    fn test_context_from_project() {
        let mut project = Project::new(CRS::from_epsg(2056));
        project.add_layer(&Layer::new("roads_01", "roads", GeometryType::Line));
        let ctx = CheckContext::for_project(Tolerance::default(), Arc::new(project));

        assert_eq!(ctx.crs().epsg(), Some(2056));
        assert_eq!(ctx.layer_name(&LayerId::new("roads_01")), Some("roads"));
        assert!(CheckContext::new(Tolerance::default(), CRS::wgs84())
            .layer_name(&LayerId::new("roads_01"))
            .is_none());
    }
}
