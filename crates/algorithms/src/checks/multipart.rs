//! Multipart check: multi-type geometries that hold a single part

use geocheck_core::vector::is_multi_type;
use geocheck_core::{Feedback, GeometryType};
use tracing::debug;

use super::{
    ensure_supported, report_progress, CollectedErrors, FixOutcome, GeometryCheck, MergeAttributes,
    ResolutionMethod,
};
use crate::engine::{
    layer_features, Change, ChangeKind, Changes, CheckContext, CheckError, FeaturePools, VertexLocator,
};
use crate::error::{CheckEngineError, Result};
use crate::geometry::{part_count, representative_point, to_single_part};

#[derive(Debug, Clone, Default)]
pub struct MultipartCheck;

impl GeometryCheck for MultipartCheck {
    fn id(&self) -> &'static str {
        "multipart"
    }

    fn description(&self) -> &'static str {
        "Multipart object with only one feature"
    }

    fn compatible_geometry_types(&self) -> &'static [GeometryType] {
        &[GeometryType::Point, GeometryType::Line, GeometryType::Polygon]
    }

    fn collect_errors(
        &self,
        pools: &FeaturePools,
        _context: &CheckContext,
        feedback: &dyn Feedback,
    ) -> Result<CollectedErrors> {
        let mut collected = CollectedErrors::default();
        let features = layer_features(pools, self.compatible_geometry_types(), &mut collected.messages);

        for (done, lf) in features.iter().enumerate() {
            if feedback.is_canceled() {
                break;
            }
            if is_multi_type(lf.geometry) && part_count(lf.geometry) == 1 {
                if let Some(location) = representative_point(lf.geometry) {
                    collected.errors.push(
                        CheckError::new(self.id(), lf.layer_id().clone(), lf.id(), location)
                            .with_vidx(VertexLocator::NONE)
                            .with_message("Multipart geometry with a single part"),
                    );
                }
            }
            report_progress(feedback, done + 1, features.len());
        }
        Ok(collected)
    }

    fn resolution_methods(&self) -> &'static [ResolutionMethod] {
        &[
            ResolutionMethod::ConvertToSingle,
            ResolutionMethod::DeleteFeature,
            ResolutionMethod::NoAction,
        ]
    }

    fn supports_in_place(&self, geometry_type: GeometryType) -> bool {
        matches!(geometry_type, GeometryType::Line | GeometryType::Polygon)
    }

    fn fix_error(
        &self,
        pools: &mut FeaturePools,
        _context: &CheckContext,
        error: &CheckError,
        method: ResolutionMethod,
        _merge_attributes: &MergeAttributes,
        changes: &mut Changes,
    ) -> Result<FixOutcome> {
        ensure_supported(self, method)?;
        if method == ResolutionMethod::NoAction {
            return Ok(FixOutcome::NoChange);
        }
        let pool = pools
            .get_mut(error.layer_id())
            .ok_or_else(|| CheckEngineError::DanglingReference {
                layer: error.layer_id().clone(),
                feature: error.feature_id(),
            })?;
        let Some(mut feature) = pool.feature(error.feature_id()).cloned() else {
            return Ok(FixOutcome::Obsolete);
        };
        let Some(single) = feature.geometry.as_ref().and_then(to_single_part) else {
            return Ok(FixOutcome::Obsolete);
        };

        match method {
            ResolutionMethod::ConvertToSingle => {
                feature.geometry = Some(single);
                pool.update_feature(feature)?;
                changes.push(error.layer_id().clone(), error.feature_id(), Change::feature(ChangeKind::Changed));
            }
            _ => {
                pool.delete_feature(error.feature_id())?;
                changes.push(error.layer_id().clone(), error.feature_id(), Change::feature(ChangeKind::Removed));
            }
        }
        debug!("{} applied to feature {} in {}", method, error.feature_id(), error.layer_id());
        Ok(FixOutcome::Fixed)
    }
}
