use std::{path::PathBuf, sync::atomic::AtomicBool, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use handdepth::{
    config::{DepthMapping, DetectorOptions, PipelineConfig},
    display::SnapshotSurface,
    pipeline::{
        DetectorBackend, FrameOrchestrator, StillImageSource, open_palm_hand, start_detector,
    },
};

const FRAME_INTERVAL: Duration = Duration::from_millis(33);
const HAND_SCALE: f32 = 0.35;

#[derive(Parser)]
#[command(name = "handdepth")]
#[command(about = "Samples scene depth under the index fingertip of a tracked hand")]
#[command(version)]
struct Cli {
    /// Color image replayed as camera frames
    color: PathBuf,

    /// 16-bit grayscale PNG with depth in millimeters
    #[arg(short, long)]
    depth: Option<PathBuf>,

    /// Number of frames to render
    #[arg(short, long, default_value = "30")]
    frames: u64,

    /// Frames reported as not ready before the first image
    #[arg(long, default_value = "0")]
    warmup: usize,

    /// Report an open hand with its index fingertip at X,Y (normalized)
    #[arg(long, value_parser = parse_tip)]
    tip: Option<(f32, f32)>,

    /// Maximum number of hands the detector reports
    #[arg(long, default_value = "2")]
    max_hands: usize,

    /// Run the detector on the CPU
    #[arg(long)]
    cpu: bool,

    /// Use color-image coordinates on the depth image without rescaling
    #[arg(long)]
    direct_depth: bool,

    /// Where to write the last frame with its overlay
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn parse_tip(value: &str) -> Result<(f32, f32), String> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got '{value}'"))?;
    let parse = |s: &str| {
        s.trim()
            .parse::<f32>()
            .map_err(|err| format!("invalid coordinate '{s}': {err}"))
    };
    Ok((parse(x)?, parse(y)?))
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    let source = StillImageSource::from_paths(&cli.color, cli.depth.as_deref())?
        .with_warmup_frames(cli.warmup);

    let config = PipelineConfig {
        detector: DetectorOptions {
            run_on_gpu: !cli.cpu,
            max_num_hands: cli.max_hands,
            ..DetectorOptions::default()
        },
        depth_mapping: if cli.direct_depth {
            DepthMapping::Direct
        } else {
            DepthMapping::Scaled
        },
        frame_interval: Some(FRAME_INTERVAL),
        ..PipelineConfig::default()
    };

    let backend = match cli.tip {
        Some(tip) => DetectorBackend::FixedPose {
            hands: vec![open_palm_hand(tip, HAND_SCALE)],
        },
        None => DetectorBackend::Placeholder,
    };
    let (tracker, results) = start_detector(backend, config.detector.clone());

    let mut orchestrator =
        FrameOrchestrator::new(source, SnapshotSurface::new(), tracker, results, config);

    let stats = orchestrator.run(Some(cli.frames), &AtomicBool::new(false));
    println!(
        "frames: {} rendered, {} skipped; detector: {} submitted, {} dropped; depth samples: {}",
        stats.rendered,
        stats.skipped,
        stats.submitted,
        stats.dropped_submissions,
        stats.depth_samples
    );
    match orchestrator.latest_depth() {
        Some(reading) => println!(
            "fingertip at depth pixel ({}, {}): {}",
            reading.x,
            reading.y,
            reading.display_text()
        ),
        None => println!("no fingertip depth sampled"),
    }

    if let Some(output) = &cli.output {
        orchestrator
            .display()
            .save(output)
            .with_context(|| format!("failed to save snapshot to {}", output.display()))?;
    }

    Ok(())
}
