use anyhow::{ensure, Context, Result};
use clap::Parser;
use cloak_fx::capture::{CaptureSource, WebcamCapture};
use cloak_fx::cloak::{BackgroundStore, CloakColor, CloakPipeline, EdgeMode, RefineConfig};
use cloak_fx::control::{spawn_stdin_listener, ModeState};
use cloak_fx::output::LoopbackOutput;
use cloak_fx::session::{Session, SessionConfig};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input webcam device index
    #[arg(short, long, default_value_t = 0)]
    input_device: u32,

    /// Output v4l2loopback device path
    #[arg(short, long, default_value = "/dev/video10")]
    output_device: String,

    /// Capture resolution width
    #[arg(long, default_value_t = 640)]
    width: u32,

    /// Capture resolution height
    #[arg(long, default_value_t = 480)]
    height: u32,

    /// Output resolution width (defaults to the capture width)
    #[arg(long)]
    output_width: Option<u32>,

    /// Output resolution height (defaults to the capture height)
    #[arg(long)]
    output_height: Option<u32>,

    /// Target frames per second
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Initial cloak color: red, blue or green
    #[arg(short, long, default_value_t = CloakColor::Red)]
    color: CloakColor,

    /// Static background image instead of a live capture
    #[arg(short, long)]
    background: Option<PathBuf>,

    /// Do not mirror frames horizontally
    #[arg(long)]
    no_mirror: bool,

    /// Frames discarded before storing a captured background
    #[arg(long, default_value_t = 20)]
    warmup_frames: u32,

    /// Closing radius for mask cleanup (0 disables)
    #[arg(long, default_value_t = 2)]
    close_radius: u8,

    /// Opening radius for speckle removal (0 disables)
    #[arg(long, default_value_t = 0)]
    open_radius: u8,

    /// Extra dilation radius after closing (0 disables)
    #[arg(long, default_value_t = 0)]
    dilate_radius: u8,

    /// Minimum area in pixels of a cloak region
    #[arg(long, default_value_t = 1500)]
    min_area: u32,

    /// Blend mask edges with a Gaussian of this sigma instead of hard edges
    #[arg(long)]
    soft_edge: Option<f32>,

    /// Output the cleaned mask instead of the composited video
    #[arg(long)]
    show_mask: bool,

    /// Stop after this many frames
    #[arg(long)]
    max_frames: Option<u64>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn validate(&self) -> Result<()> {
        ensure!(self.fps > 0, "--fps must be greater than zero");
        ensure!(
            self.width > 0 && self.height > 0,
            "capture resolution must be non-zero"
        );
        ensure!(
            self.output_width != Some(0) && self.output_height != Some(0),
            "output resolution must be non-zero"
        );
        if let Some(sigma) = self.soft_edge {
            ensure!(
                sigma.is_finite() && sigma > 0.0,
                "--soft-edge must be a positive number"
            );
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    args.validate().context("Invalid configuration")?;

    tracing::info!("cloak-fx starting");
    tracing::info!("Capture: {}x{} @ {} fps", args.width, args.height, args.fps);
    tracing::info!("Cloak color: {}", args.color);

    // Initialize capture
    let mut capture = WebcamCapture::new(args.input_device, args.width, args.height, args.fps)
        .context("Failed to initialize webcam capture")?;
    let (width, height) = capture.resolution();

    // A static plate has to match what the camera actually delivers
    let background = match &args.background {
        Some(path) => BackgroundStore::load(path, width, height)
            .context("Failed to load static background")?,
        None => BackgroundStore::new(),
    };

    // Initialize output
    let output_width = args.output_width.unwrap_or(width);
    let output_height = args.output_height.unwrap_or(height);
    tracing::info!("Output: {}x{}", output_width, output_height);
    let mut output = LoopbackOutput::new(&args.output_device, output_width, output_height)
        .context("Failed to initialize v4l2loopback output")?;

    let refine = RefineConfig {
        open_radius: args.open_radius,
        close_radius: args.close_radius,
        dilate_radius: args.dilate_radius,
        min_area: args.min_area,
    };
    let edge = args.soft_edge.map(EdgeMode::soft).unwrap_or_default();
    tracing::debug!("Refine: {:?}, edges: {:?}", refine, edge);

    let pipeline = CloakPipeline::new(refine, edge);
    let mode = ModeState::new(args.color, !args.no_mirror);
    let config = SessionConfig {
        fps: args.fps,
        warmup_frames: args.warmup_frames,
        show_mask: args.show_mask,
        max_frames: args.max_frames,
        ..SessionConfig::default()
    };

    let commands = spawn_stdin_listener();

    // Main loop
    let mut session = Session::new(&mut capture, &mut output, pipeline, background, mode, config);
    let summary = session.run(&commands)?;

    tracing::info!(
        "Stopped after {} frames ({} composited, {} passthrough, {} background captures)",
        summary.frames,
        summary.composited,
        summary.passthrough,
        summary.background_captures
    );

    Ok(())
}
