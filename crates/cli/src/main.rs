use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use moodlens_core::capture::domain::frame_source::FrameSource;
use moodlens_core::capture::infrastructure::ffmpeg_frame_source::FfmpegFrameSource;
use moodlens_core::capture::infrastructure::image_sequence_source::ImageSequenceSource;
use moodlens_core::expression::infrastructure::onnx_expression_classifier::OnnxExpressionClassifier;
use moodlens_core::overlay::domain::display_mapper::DisplaySize;
use moodlens_core::overlay::domain::render_sink::{NullDrawingSurface, NullSymbolSink, SymbolSink};
use moodlens_core::overlay::infrastructure::terminal_overlay::TerminalSymbolSink;
use moodlens_core::sampling::sampling_loop::{LoopConfig, SamplingLoopController};
use moodlens_core::sampling::tick_logger::StdoutTickLogger;
use moodlens_core::shared::constants::{
    DETECTOR_MODEL_NAME, DETECTOR_MODEL_URL, EXPRESSION_MODEL_NAME, EXPRESSION_MODEL_URL,
    LANDMARK_MODEL_NAME, LANDMARK_MODEL_URL,
};
use moodlens_core::shared::model_resolver;

/// Live facial-expression annotation for a video feed.
#[derive(Parser)]
#[command(name = "moodlens")]
struct Cli {
    /// Input video file, stream URL, or directory of still images.
    input: PathBuf,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, default_value = "0.5")]
    confidence: f64,

    /// Directory with pre-downloaded model files.
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Stop after this many sampling ticks (default: run until the feed ends).
    #[arg(long)]
    max_ticks: Option<u64>,

    /// Overlay surface width in pixels.
    #[arg(long, default_value = "720")]
    display_width: u32,

    /// Overlay surface height in pixels.
    #[arg(long, default_value = "560")]
    display_height: u32,

    /// Glyph sink: terminal or null.
    #[arg(long, default_value = "terminal")]
    sink: String,

    /// Terminal cells across, for the terminal sink.
    #[arg(long, default_value = "80")]
    cols: u16,

    /// Terminal cells down, for the terminal sink.
    #[arg(long, default_value = "24")]
    rows: u16,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let display = DisplaySize {
        width: cli.display_width,
        height: cli.display_height,
    };

    let classifier = build_classifier(&cli)?;
    let source = build_source(&cli.input);
    let sink = build_sink(&cli, display);

    let config = LoopConfig {
        max_ticks: cli.max_ticks,
        ..Default::default()
    };

    let mut controller = SamplingLoopController::new(
        classifier,
        source,
        Box::new(NullDrawingSurface),
        sink,
        Box::new(StdoutTickLogger::default()),
        Some(display),
        config,
    );

    controller.start()?;
    let summary = controller.run()?;

    log::info!(
        "done: {} ticks scheduled, {} committed, {} discarded, {} failed, {} lagged",
        summary.ticks_scheduled,
        summary.committed,
        summary.discarded,
        summary.failed,
        summary.lagged
    );
    Ok(())
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err(format!("--confidence must be within 0.0-1.0, got {}", cli.confidence).into());
    }
    if cli.sink != "terminal" && cli.sink != "null" {
        return Err(format!("--sink must be 'terminal' or 'null', got '{}'", cli.sink).into());
    }
    if cli.display_width == 0 || cli.display_height == 0 {
        return Err("display dimensions must be non-zero".into());
    }
    if cli.cols == 0 || cli.rows == 0 {
        return Err("terminal grid must be non-zero".into());
    }
    Ok(())
}

fn build_classifier(
    cli: &Cli,
) -> Result<Box<OnnxExpressionClassifier>, Box<dyn std::error::Error>> {
    let detector = resolve_model(DETECTOR_MODEL_NAME, DETECTOR_MODEL_URL, cli)?;
    let landmarker = resolve_model(LANDMARK_MODEL_NAME, LANDMARK_MODEL_URL, cli)?;
    let expression = resolve_model(EXPRESSION_MODEL_NAME, EXPRESSION_MODEL_URL, cli)?;

    let classifier =
        OnnxExpressionClassifier::new(&detector, &landmarker, &expression, cli.confidence)?;
    Ok(Box::new(classifier))
}

fn resolve_model(name: &str, url: &str, cli: &Cli) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let label = name.to_string();
    let path = model_resolver::resolve(
        name,
        url,
        cli.model_dir.as_deref(),
        Some(Box::new(move |done, total| {
            if total > 0 {
                log::debug!("downloading {label}: {done}/{total} bytes");
            }
        })),
    )?;
    log::info!("model {name}: {}", path.display());
    Ok(path)
}

fn build_source(input: &Path) -> Box<dyn FrameSource> {
    if input.is_dir() {
        Box::new(ImageSequenceSource::new(input))
    } else {
        Box::new(FfmpegFrameSource::new(input))
    }
}

fn build_sink(cli: &Cli, display: DisplaySize) -> Box<dyn SymbolSink> {
    if cli.sink == "null" {
        Box::new(NullSymbolSink)
    } else {
        Box::new(TerminalSymbolSink::new(display, cli.cols, cli.rows))
    }
}
