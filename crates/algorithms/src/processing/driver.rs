//! Error/fix driver
//!
//! Runs one check end to end: builds the feature pools, collects errors,
//! streams them into the `ERRORS` sink (and the flagged-feature `OUTPUT`
//! sink) and, in in-place mode, fixes the primary layer before exporting it
//! again. Cancellation is polled once per exported error and once per
//! re-exported feature; records already written stay written.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use geocheck_core::io::{FeatureSink, SinkProvider, SinkSpec};
use geocheck_core::{Feedback, GeometryType, Layer, LayerId, MultiStepFeedback, Project};
use tracing::{debug, info, warn};

use super::schema::{error_fields, error_record, flagged_record};
use crate::checks::{report_progress, Check, FixOutcome, GeometryCheck, MergeAttributes, ResolutionMethod};
use crate::engine::{Changes, CheckContext, CheckError, FeaturePools, Tolerance};
use crate::error::{CheckEngineError, Result};

/// Name of the flagged-feature (or fixed layer) output
pub const OUTPUT: &str = "OUTPUT";
/// Name of the error point output
pub const ERRORS: &str = "ERRORS";

/// Options of one run
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    pub tolerance: Tolerance,
    /// Only look at the selected features of each input
    pub selected_only: bool,
    /// Fix errors on the primary layer with this method
    pub in_place: Option<ResolutionMethod>,
    /// Attribute per layer for [`ResolutionMethod::MergeIdenticalAttribute`]
    pub merge_attributes: MergeAttributes,
    /// Supplies CRS, transform context and layer names when set
    pub project: Option<Arc<Project>>,
}

/// Phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    PreparingPools,
    CollectingErrors,
    ExportingErrors,
    ApplyingFixes,
    ExportingFixedLayer,
    Done,
    Cancelled,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Cancelled)
    }

    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (_, Cancelled)
                | (Idle, PreparingPools)
                | (PreparingPools, CollectingErrors)
                | (CollectingErrors, ExportingErrors)
                | (ExportingErrors, ApplyingFixes)
                | (ExportingErrors, Done)
                | (ApplyingFixes, ExportingFixedLayer)
                | (ExportingFixedLayer, Done)
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::PreparingPools => "preparing pools",
            RunState::CollectingErrors => "collecting errors",
            RunState::ExportingErrors => "exporting errors",
            RunState::ApplyingFixes => "applying fixes",
            RunState::ExportingFixedLayer => "exporting fixed layer",
            RunState::Done => "done",
            RunState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Tally of fix attempts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixSummary {
    pub fixed: usize,
    pub unchanged: usize,
    pub obsolete: usize,
    pub failed: usize,
}

impl FixSummary {
    fn record(&mut self, outcome: &FixOutcome) {
        match outcome {
            FixOutcome::Fixed => self.fixed += 1,
            FixOutcome::NoChange => self.unchanged += 1,
            FixOutcome::Obsolete => self.obsolete += 1,
            FixOutcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.fixed + self.unchanged + self.obsolete + self.failed
    }
}

/// What a run produced
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Output name (`OUTPUT`, `ERRORS`) to destination identifier
    pub outputs: BTreeMap<String, String>,
    pub state: RunState,
    /// Errors found, in collection order
    pub errors: Vec<CheckError>,
    /// Records written to `ERRORS`
    pub exported: usize,
    pub messages: Vec<String>,
    pub fix_summary: FixSummary,
    /// Every edit made in in-place mode
    pub changes: Changes,
}

impl RunOutcome {
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Whether the run went through all of its phases
    pub fn is_complete(&self) -> bool {
        self.state == RunState::Done
    }
}

struct StateTracker {
    state: RunState,
}

impl StateTracker {
    fn advance(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid run transition {} -> {}",
            self.state,
            next
        );
        debug!("Run state: {} -> {}", self.state, next);
        self.state = next;
    }
}

struct OpenSinks {
    output: Option<Box<dyn FeatureSink>>,
    errors: Box<dyn FeatureSink>,
    destinations: BTreeMap<String, String>,
}

impl OpenSinks {
    fn finish(&mut self) -> Result<()> {
        if let Some(output) = self.output.as_mut() {
            output.finish().map_err(|e| write_failed(OUTPUT, e))?;
        }
        self.errors.finish().map_err(|e| write_failed(ERRORS, e))
    }
}

fn write_failed(output: &str, err: geocheck_core::Error) -> CheckEngineError {
    CheckEngineError::Write {
        output: output.to_string(),
        reason: err.to_string(),
    }
}

fn open_sink(sinks: &mut dyn SinkProvider, output: &str, spec: &SinkSpec) -> Result<(Box<dyn FeatureSink>, String)> {
    let created = sinks
        .create_sink(output, spec)
        .map_err(|e| CheckEngineError::configuration(output, format!("could not create sink: {}", e)))?;
    Ok((created.sink, created.destination))
}

/// Reject runs that cannot start before anything is built or written
fn preflight(rule: &dyn GeometryCheck, layers: &[Layer], config: &RunConfig) -> Result<()> {
    let Some(primary) = layers.first() else {
        return Err(CheckEngineError::configuration("INPUT", "no input layer supplied"));
    };
    if let Some(method) = config.in_place {
        let geometry_type = primary.geometry_type();
        if !rule.supports_in_place(geometry_type) {
            return Err(CheckEngineError::configuration(
                "INPUT",
                format!(
                    "the {} check cannot edit {} layers in place",
                    rule.id(),
                    geometry_type
                ),
            ));
        }
        if !rule.resolution_methods().contains(&method) {
            return Err(CheckEngineError::UnsupportedResolution {
                check: rule.id(),
                method,
            });
        }
    }
    Ok(())
}

/// Run `check` over `layers`, the first of which is the primary input.
///
/// Fails before producing any output when inputs or sinks are unusable.
/// A cancelled run is not an error: its outcome carries
/// [`RunState::Cancelled`] and whatever had been written.
pub fn run_check(
    check: &Check,
    layers: Vec<Layer>,
    config: &RunConfig,
    sinks: &mut dyn SinkProvider,
    feedback: &dyn Feedback,
) -> Result<RunOutcome> {
    let rule = check.as_check();
    let mut tracker = StateTracker { state: RunState::Idle };
    preflight(rule, &layers, config)?;

    let steps = if config.in_place.is_some() { 5 } else { 3 };
    let multi = MultiStepFeedback::new(steps, feedback);

    // Preparing pools
    tracker.advance(RunState::PreparingPools);
    multi.set_current_step(0);
    multi.set_progress_text("Preparing features…");

    let primary = layers
        .first()
        .ok_or_else(|| CheckEngineError::configuration("INPUT", "no input layer supplied"))?;
    let primary_id = primary.id().clone();
    let primary_type = primary.geometry_type();
    let primary_fields = primary.fields().clone();
    let context = match &config.project {
        Some(project) => CheckContext::for_project(config.tolerance, project.clone()),
        None => CheckContext::new(config.tolerance, primary.crs().clone()),
    };
    for layer in &layers {
        if !layer.crs().is_equivalent(context.crs()) {
            warn!(
                "Layer {} is in {}, comparing as stored against {}",
                layer.id(),
                layer.crs(),
                context.crs()
            );
        }
    }

    let pools = FeaturePools::from_layers(layers, config.selected_only)?;
    rule.validate_inputs(&pools)?;
    info!(
        "Running {} check on {} layer(s), tolerance {} digits",
        rule.id(),
        pools.len(),
        context.tolerance().digits()
    );

    let mut open = open_sinks(rule, sinks, config, &context, primary_type, primary_fields)?;
    let mut outcome = RunOutcome {
        outputs: open.destinations.clone(),
        state: RunState::PreparingPools,
        errors: Vec::new(),
        exported: 0,
        messages: Vec::new(),
        fix_summary: FixSummary::default(),
        changes: Changes::default(),
    };
    multi.set_progress(1.0);

    // Collecting errors
    tracker.advance(RunState::CollectingErrors);
    multi.set_current_step(1);
    multi.set_progress_text("Collecting errors…");
    let collected = rule.collect_errors(&pools, &context, &multi)?;
    for message in &collected.messages {
        debug!("{}", message);
    }
    info!("{} check found {} error(s)", rule.id(), collected.errors.len());
    outcome.errors = collected.errors;
    outcome.messages = collected.messages;
    if multi.is_canceled() {
        return cancel(tracker, &mut open, outcome);
    }

    // Exporting errors
    tracker.advance(RunState::ExportingErrors);
    multi.set_current_step(2);
    multi.set_progress_text("Exporting errors…");
    let in_place = config.in_place.is_some();
    outcome.exported = export_errors(&outcome.errors, &pools, &context, &mut open, in_place, &multi)?;
    if outcome.exported < outcome.errors.len() {
        return cancel(tracker, &mut open, outcome);
    }

    let mut pools = pools;
    if let Some(method) = config.in_place {
        // Applying fixes
        tracker.advance(RunState::ApplyingFixes);
        multi.set_current_step(3);
        multi.set_progress_text("Fixing errors…");
        let finished = apply_fixes(
            rule,
            &mut pools,
            &context,
            &outcome.errors,
            method,
            &config.merge_attributes,
            &mut outcome.fix_summary,
            &mut outcome.changes,
            &multi,
        )?;
        info!(
            "Fixes: {} fixed, {} unchanged, {} obsolete, {} failed",
            outcome.fix_summary.fixed,
            outcome.fix_summary.unchanged,
            outcome.fix_summary.obsolete,
            outcome.fix_summary.failed
        );
        if !finished {
            return cancel(tracker, &mut open, outcome);
        }

        // Exporting the fixed layer
        tracker.advance(RunState::ExportingFixedLayer);
        multi.set_current_step(4);
        multi.set_progress_text("Exporting (fixed) layer…");
        if !export_fixed_layer(&pools, &primary_id, &mut open, &multi)? {
            return cancel(tracker, &mut open, outcome);
        }
    }

    open.finish()?;
    tracker.advance(RunState::Done);
    outcome.state = tracker.state;
    multi.set_progress(1.0);
    info!("{} check finished, {} error record(s) written", rule.id(), outcome.exported);
    Ok(outcome)
}

/// Validate every destination first, then create the sinks. When a later
/// sink still cannot be created the ones already created are discarded, so a
/// failed setup leaves no output behind.
fn open_sinks(
    rule: &dyn GeometryCheck,
    sinks: &mut dyn SinkProvider,
    config: &RunConfig,
    context: &CheckContext,
    primary_type: GeometryType,
    primary_fields: geocheck_core::Fields,
) -> Result<OpenSinks> {
    let mut specs = Vec::with_capacity(2);
    if rule.produces_output_layer() {
        let fields = if config.in_place.is_some() {
            primary_fields
        } else {
            error_fields()
        };
        specs.push((
            OUTPUT,
            SinkSpec {
                fields,
                geometry_type: primary_type,
                crs: context.crs().clone(),
            },
        ));
    }
    specs.push((
        ERRORS,
        SinkSpec {
            fields: error_fields(),
            geometry_type: GeometryType::Point,
            crs: context.crs().clone(),
        },
    ));

    for (output, _) in &specs {
        sinks
            .validate(output)
            .map_err(|e| CheckEngineError::configuration(*output, format!("unusable destination: {}", e)))?;
    }

    let mut created: Vec<(&str, Box<dyn FeatureSink>)> = Vec::with_capacity(specs.len());
    let mut destinations = BTreeMap::new();
    for (output, spec) in &specs {
        match open_sink(sinks, output, spec) {
            Ok((sink, destination)) => {
                destinations.insert(output.to_string(), destination);
                created.push((*output, sink));
            }
            Err(err) => {
                for (name, sink) in created {
                    drop(sink);
                    if let Err(e) = sinks.discard(name) {
                        warn!("Could not remove abandoned output {}: {}", name, e);
                    }
                }
                return Err(err);
            }
        }
    }

    let mut output = None;
    let mut errors = None;
    for (name, sink) in created {
        if name == OUTPUT {
            output = Some(sink);
        } else {
            errors = Some(sink);
        }
    }
    let errors = errors.ok_or_else(|| CheckEngineError::configuration(ERRORS, "sink was not created"))?;
    Ok(OpenSinks {
        output,
        errors,
        destinations,
    })
}

fn cancel(mut tracker: StateTracker, open: &mut OpenSinks, mut outcome: RunOutcome) -> Result<RunOutcome> {
    warn!("Run cancelled while {}", tracker.state);
    tracker.advance(RunState::Cancelled);
    open.finish()?;
    outcome.state = tracker.state;
    Ok(outcome)
}

/// Write one record per error; returns how many were written before a
/// cancellation
fn export_errors(
    errors: &[CheckError],
    pools: &FeaturePools,
    context: &CheckContext,
    open: &mut OpenSinks,
    in_place: bool,
    feedback: &dyn Feedback,
) -> Result<usize> {
    if errors.is_empty() {
        feedback.set_progress(1.0);
        return Ok(0);
    }
    feedback.set_progress(0.0);

    let mut written = 0;
    for error in errors {
        if feedback.is_canceled() {
            break;
        }
        let dangling = || CheckEngineError::DanglingReference {
            layer: error.layer_id().clone(),
            feature: error.feature_id(),
        };
        let pool = pools.get(error.layer_id()).ok_or_else(dangling)?;
        let feature = pool.feature(error.feature_id()).ok_or_else(dangling)?;
        let layer_name = context
            .layer_name(error.layer_id())
            .unwrap_or_else(|| pool.layer_name());

        if !in_place {
            if let Some(output) = open.output.as_mut() {
                let geometry = error.geometry().cloned().or_else(|| feature.geometry.clone());
                output
                    .add_feature(&flagged_record(error, layer_name, geometry))
                    .map_err(|e| write_failed(OUTPUT, e))?;
            }
        }
        open.errors
            .add_feature(&error_record(error, layer_name))
            .map_err(|e| write_failed(ERRORS, e))?;

        written += 1;
        report_progress(feedback, written, errors.len());
    }
    Ok(written)
}

/// Fix pending errors one by one. After each fix the remaining errors are
/// re-addressed with that fix's changes; those whose target disappeared
/// count as obsolete. Returns false when cancelled.
#[allow(clippy::too_many_arguments)]
fn apply_fixes(
    rule: &dyn GeometryCheck,
    pools: &mut FeaturePools,
    context: &CheckContext,
    errors: &[CheckError],
    method: ResolutionMethod,
    merge_attributes: &MergeAttributes,
    summary: &mut FixSummary,
    changes: &mut Changes,
    feedback: &dyn Feedback,
) -> Result<bool> {
    let mut pending: Vec<Option<CheckError>> = errors.iter().cloned().map(Some).collect();
    let total = pending.len();

    for i in 0..total {
        if feedback.is_canceled() {
            return Ok(false);
        }
        let Some(error) = pending[i].take() else {
            summary.record(&FixOutcome::Obsolete);
            report_progress(feedback, i + 1, total);
            continue;
        };

        let mut delta = Changes::default();
        let result = rule.fix_error(pools, context, &error, method, merge_attributes, &mut delta)?;
        match &result {
            FixOutcome::Failed(reason) => warn!(
                "Could not fix error on feature {} of {}: {}",
                error.feature_id(),
                error.layer_id(),
                reason
            ),
            other => debug!(
                "Fix of feature {} of {}: {:?}",
                error.feature_id(),
                error.layer_id(),
                other
            ),
        }
        summary.record(&result);

        if !delta.is_empty() {
            for slot in pending[i + 1..].iter_mut() {
                *slot = slot.take().and_then(|e| e.rebased(&delta));
            }
            changes.merge(delta);
        }
        report_progress(feedback, i + 1, total);
    }
    if total == 0 {
        feedback.set_progress(1.0);
    }
    Ok(true)
}

/// Copy every visible feature of the edited primary layer to `OUTPUT`.
/// Returns false when cancelled.
fn export_fixed_layer(
    pools: &FeaturePools,
    primary: &LayerId,
    open: &mut OpenSinks,
    feedback: &dyn Feedback,
) -> Result<bool> {
    let Some(output) = open.output.as_mut() else {
        return Ok(true);
    };
    let pool = pools
        .get(primary)
        .ok_or_else(|| CheckEngineError::configuration("INPUT", format!("layer {} disappeared", primary)))?;

    let ids = pool.all_ids();
    if ids.is_empty() {
        feedback.set_progress(1.0);
    }
    for (done, id) in ids.iter().enumerate() {
        if feedback.is_canceled() {
            return Ok(false);
        }
        if let Some(feature) = pool.feature(*id) {
            output.add_feature(feature).map_err(|e| write_failed(OUTPUT, e))?;
        }
        report_progress(feedback, done + 1, ids.len());
    }
    debug!("Exported {} feature(s) of fixed layer {}", ids.len(), primary);
    Ok(true)
}
