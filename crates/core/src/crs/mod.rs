//! Coordinate reference systems and the transform context
//!
//! Checks never reproject geometry themselves. The CRS and the transform
//! context travel with the check context so that callers (and the driver's
//! diagnostics) can tell when layers are compared in different systems.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate Reference System representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    /// EPSG code if known
    epsg: Option<u32>,
    /// Authority identifier as found in the source (`EPSG:2056`, `OGC:CRS84`, ...)
    authid: Option<String>,
    /// WKT representation if that is all we have
    wkt: Option<String>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            epsg: Some(code),
            authid: Some(format!("EPSG:{}", code)),
            wkt: None,
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            epsg: None,
            authid: None,
            wkt: Some(wkt.into()),
        }
    }

    /// A CRS nobody told us about
    pub fn unknown() -> Self {
        Self {
            epsg: None,
            authid: None,
            wkt: None,
        }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Parse an authority identifier.
    ///
    /// Accepts `EPSG:2056`, `epsg:2056`, the OGC URN form
    /// `urn:ogc:def:crs:EPSG::2056` and the GeoJSON default
    /// `urn:ogc:def:crs:OGC:1.3:CRS84` (mapped to EPSG:4326).
    pub fn from_authid(id: &str) -> Self {
        let trimmed = id.trim();
        let upper = trimmed.to_ascii_uppercase();
        if upper.ends_with("CRS84") {
            return Self::wgs84();
        }
        let code = upper
            .rsplit(':')
            .next()
            .filter(|_| upper.contains("EPSG"))
            .and_then(|c| c.parse::<u32>().ok());
        match code {
            Some(code) => Self::from_epsg(code),
            None => Self {
                epsg: None,
                authid: Some(trimmed.to_string()),
                wkt: None,
            },
        }
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Get WKT representation
    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Whether anything at all identifies this CRS
    pub fn is_valid(&self) -> bool {
        self.epsg.is_some() || self.authid.is_some() || self.wkt.is_some()
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (&self.authid, &other.authid) {
            return a.eq_ignore_ascii_case(b);
        }
        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }
        !self.is_valid() && !other.is_valid()
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(authid) = &self.authid {
            return authid.clone();
        }
        if let Some(wkt) = &self.wkt {
            return format!("WKT:{}", &wkt[..wkt.len().min(50)]);
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::wgs84()
    }
}

/// A preferred coordinate operation between two reference systems
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateOperation {
    pub source: String,
    pub destination: String,
    /// PROJ pipeline string
    pub proj: String,
}

/// Coordinate transform bookkeeping shared by a project and its checks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformContext {
    operations: Vec<CoordinateOperation>,
}

impl TransformContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the operation used from `source` to `destination`.
    pub fn add_operation(&mut self, source: &CRS, destination: &CRS, proj: impl Into<String>) {
        let (source, destination) = (source.identifier(), destination.identifier());
        self.operations
            .retain(|op| !(op.source == source && op.destination == destination));
        self.operations.push(CoordinateOperation {
            source,
            destination,
            proj: proj.into(),
        });
    }

    /// The registered operation for a CRS pair, if any
    pub fn operation(&self, source: &CRS, destination: &CRS) -> Option<&str> {
        let (source, destination) = (source.identifier(), destination.identifier());
        self.operations
            .iter()
            .find(|op| op.source == source && op.destination == destination)
            .map(|op| op.proj.as_str())
    }

    /// Coordinates in `source` cannot be compared with `destination` as-is.
    pub fn requires_transform(&self, source: &CRS, destination: &CRS) -> bool {
        !source.is_equivalent(destination)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crs_epsg() {
        let crs = CRS::from_epsg(2056);
        assert_eq!(crs.epsg(), Some(2056));
        assert_eq!(crs.identifier(), "EPSG:2056");
    }

    #[test]
    fn test_crs_from_urn() {
        let crs = CRS::from_authid("urn:ogc:def:crs:EPSG::3857");
        assert_eq!(crs.epsg(), Some(3857));
        assert!(CRS::from_authid("urn:ogc:def:crs:OGC:1.3:CRS84").is_equivalent(&CRS::wgs84()));
    }

    #[test]
    fn test_crs_custom_authority() {
        let crs = CRS::from_authid("IGNF:LAMB93");
        assert_eq!(crs.epsg(), None);
        assert_eq!(crs.identifier(), "IGNF:LAMB93");
        assert!(crs.is_equivalent(&CRS::from_authid("ignf:lamb93")));
    }

    #[test]
    fn test_unknown_crs() {
        assert!(!CRS::unknown().is_valid());
        assert!(CRS::unknown().is_equivalent(&CRS::unknown()));
        assert!(!CRS::unknown().is_equivalent(&CRS::wgs84()));
    }

    #[test]
    fn test_transform_context() {
        let mut ctx = TransformContext::new();
        let (a, b) = (CRS::from_epsg(4326), CRS::from_epsg(2056));
        assert!(ctx.requires_transform(&a, &b));
        assert!(!ctx.requires_transform(&a, &CRS::wgs84()));

        ctx.add_operation(&a, &b, "+proj=pipeline +step +proj=noop");
        ctx.add_operation(&a, &b, "+proj=pipeline +step +proj=somerc");
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.operation(&a, &b), Some("+proj=pipeline +step +proj=somerc"));
        assert_eq!(ctx.operation(&b, &a), None);
    }
}
