//! geocheck CLI - geometry validation for vector layers

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use geocheck_algorithms::checks::{
    AngleParams, AreaParams, Check, LineLayerIntersectionParams, MergeAttributes, SegmentLengthParams,
};
use geocheck_algorithms::engine::Tolerance;
use geocheck_algorithms::processing::{run_check, RunConfig, RunFile, RunOutcome, RunState, ERRORS, OUTPUT};
use geocheck_algorithms::{GeometryCheck, ResolutionMethod};
use geocheck_core::io::{read_geojson, GeoJsonSinkProvider, SinkProvider};
use geocheck_core::{FeatureId, Layer, LayerId, ProgressFeedback, Project};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "geocheck")]
#[command(author, version, about = "Geometry validation for vector layers", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every rule
#[derive(Args)]
struct RunArgs {
    /// Input GeoJSON layers; the first one is the checked layer
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// Error points output (GeoJSON)
    #[arg(long)]
    errors: PathBuf,
    /// Flagged features, or the fixed layer with --in-place (GeoJSON)
    #[arg(long)]
    output: Option<PathBuf>,
    /// Tolerance as decimal digits (1-13)
    #[arg(long, default_value_t = Tolerance::DEFAULT_DIGITS)]
    tolerance: u8,
    /// Only check selected features
    #[arg(long)]
    selected_only: bool,
    /// Feature ids of the first input to select, comma separated
    #[arg(long, value_delimiter = ',')]
    select: Vec<FeatureId>,
    /// Fix errors on the first input
    #[arg(long)]
    in_place: bool,
    /// Resolution method used with --in-place (see `geocheck resolutions`)
    #[arg(long, default_value = "no_action")]
    resolution: String,
    /// Attribute compared by merge_identical_attribute
    #[arg(long)]
    merge_attribute: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Features lying within a polygon of any input layer
    Contained {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Lines meeting features of another input layer
    LineIntersection {
        #[command(flatten)]
        run: RunArgs,
        /// Id (file stem) of the input layer lines must not meet
        #[arg(long)]
        check_layer: String,
    },
    /// Segments shorter than a minimum length
    SegmentLength {
        #[command(flatten)]
        run: RunArgs,
        /// Minimum segment length in map units
        #[arg(long, default_value_t = 0.0)]
        min_length: f64,
    },
    /// Vertices with a too sharp angle
    Angle {
        #[command(flatten)]
        run: RunArgs,
        /// Minimum angle in degrees
        #[arg(long, default_value_t = 0.0)]
        min_angle: f64,
    },
    /// Polygon parts below an area threshold
    Area {
        #[command(flatten)]
        run: RunArgs,
        /// Area threshold in squared map units
        #[arg(long, default_value_t = 0.0)]
        threshold: f64,
    },
    /// Line ends touching nothing
    Dangle {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Multi-type geometries holding a single part
    Multipart {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Run a check described by a JSON run file
    Run {
        /// Run file
        file: PathBuf,
    },
    /// List the resolution methods of a rule
    Resolutions {
        /// Rule id, e.g. area or segment_length
        rule: String,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to install logging")
}

/// Progress bar driven by the engine's feedback
fn progress_feedback() -> Result<(ProgressFeedback, ProgressBar)> {
    let pb = ProgressBar::new(1000);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {percent:>3}% {msg}")?
            .progress_chars("=> "),
    );
    let bar = pb.clone();
    let label = pb.clone();
    let feedback = ProgressFeedback::new()
        .on_progress(move |fraction| bar.set_position((fraction * 1000.0).round() as u64))
        .on_text(move |text| label.set_message(text.to_string()));
    Ok((feedback, pb))
}

fn read_layers(paths: &[PathBuf]) -> Result<Vec<Layer>> {
    paths
        .iter()
        .map(|path| read_geojson(path).with_context(|| format!("Failed to read {}", path.display())))
        .collect()
}

fn rule_check(rule: &str) -> Result<Check> {
    let check = match rule {
        "contained" => Check::contained(),
        "line_layer_intersection" | "line-intersection" => {
            Check::line_layer_intersection(LineLayerIntersectionParams {
                check_layer: LayerId::new("check_layer"),
            })?
        }
        "segment_length" | "segment-length" => Check::segment_length(SegmentLengthParams::default())?,
        "angle" => Check::angle(AngleParams::default())?,
        "area" => Check::area(AreaParams::default())?,
        "dangle" => Check::dangle(),
        "multipart" => Check::multipart(),
        _ => anyhow::bail!(
            "Unknown rule: {}. Use contained, line_layer_intersection, segment_length, angle, area, dangle or multipart.",
            rule
        ),
    };
    Ok(check)
}

fn execute(
    check: &Check,
    layers: Vec<Layer>,
    config: &RunConfig,
    sinks: &mut dyn SinkProvider,
) -> Result<RunOutcome> {
    let (feedback, pb) = progress_feedback()?;
    let start = Instant::now();
    let outcome = run_check(check, layers, config, sinks, &feedback)
        .with_context(|| format!("The {} check failed", check.as_check().id()))?;
    pb.finish_and_clear();
    info!("Processing time: {:.2?}", start.elapsed());
    Ok(outcome)
}

fn report(outcome: &RunOutcome) {
    if outcome.state == RunState::Cancelled {
        println!("Run cancelled after {} of {} error(s)", outcome.exported, outcome.error_count());
    }
    println!("Errors found: {}", outcome.error_count());
    for message in &outcome.messages {
        println!("  note: {}", message);
    }
    if outcome.fix_summary.total() > 0 {
        let summary = &outcome.fix_summary;
        println!(
            "Fixes: {} fixed, {} unchanged, {} obsolete, {} failed",
            summary.fixed, summary.unchanged, summary.obsolete, summary.failed
        );
    }
    for (name, destination) in &outcome.outputs {
        println!("{} saved to: {}", name, destination);
    }
}

fn run_rule(check: Check, args: RunArgs) -> Result<()> {
    let rule = check.as_check();
    if rule.produces_output_layer() && args.output.is_none() {
        anyhow::bail!("--output is required for the {} check", rule.id());
    }
    let tolerance = Tolerance::new(args.tolerance)?;
    let in_place = if args.in_place {
        Some(args.resolution.parse::<ResolutionMethod>()?)
    } else {
        None
    };

    let mut layers = read_layers(&args.inputs)?;
    if !args.select.is_empty() {
        if let Some(primary) = layers.first_mut() {
            primary.select(args.select.iter().copied());
        }
    }
    let mut merge_attributes = MergeAttributes::new();
    if let Some(attribute) = &args.merge_attribute {
        for layer in &layers {
            merge_attributes.insert(layer.id().clone(), attribute.clone());
        }
    }
    let mut project = Project::new(layers.first().map(|l| l.crs().clone()).unwrap_or_default());
    for layer in &layers {
        project.add_layer(layer);
    }

    let config = RunConfig {
        tolerance,
        selected_only: args.selected_only,
        in_place,
        merge_attributes,
        project: Some(Arc::new(project)),
    };
    let mut sinks = GeoJsonSinkProvider::new().with_destination(ERRORS, &args.errors);
    if let Some(output) = &args.output {
        sinks = sinks.with_destination(OUTPUT, output);
    }

    let outcome = execute(&check, layers, &config, &mut sinks)?;
    report(&outcome);
    Ok(())
}

fn run_file(path: &Path) -> Result<()> {
    let run = RunFile::from_path(path).with_context(|| format!("Failed to read run file {}", path.display()))?;
    let check = run.check()?;
    let layers = run.load_layers()?;
    let config = run.config(&layers);
    let mut sinks = run.sink_provider();
    let outcome = execute(&check, layers, &config, &mut sinks)?;
    report(&outcome);
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Contained { run } => run_rule(Check::contained(), run),
        Commands::LineIntersection { run, check_layer } => {
            let check = Check::line_layer_intersection(LineLayerIntersectionParams {
                check_layer: LayerId::new(check_layer),
            })?;
            run_rule(check, run)
        }
        Commands::SegmentLength { run, min_length } => {
            let check = Check::segment_length(SegmentLengthParams {
                min_segment_length: min_length,
            })?;
            run_rule(check, run)
        }
        Commands::Angle { run, min_angle } => {
            run_rule(Check::angle(AngleParams { min_angle })?, run)
        }
        Commands::Area { run, threshold } => {
            let check = Check::area(AreaParams {
                area_threshold: threshold,
            })?;
            run_rule(check, run)
        }
        Commands::Dangle { run } => run_rule(Check::dangle(), run),
        Commands::Multipart { run } => run_rule(Check::multipart(), run),
        Commands::Run { file } => run_file(&file),
        Commands::Resolutions { rule } => {
            let check = rule_check(&rule)?;
            let rule = check.as_check();
            println!("{} ({})", rule.id(), rule.description());
            for method in rule.resolution_methods() {
                println!("  {:<28} {}", method.id(), method.description());
            }
            Ok(())
        }
    }
}
