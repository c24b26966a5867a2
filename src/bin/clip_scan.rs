//! clip_scan - score a recorded clip for potholes
//!
//! Reads every frame of a clip, scores every fifth one and prints the verdict.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pothole_watch::clip::FrameDirReader;
use pothole_watch::{ClipReader, ClipScanner, InferenceEngine, Preprocessor, ResizeFilter};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// ONNX model file.
    #[arg(long, env = "POTHOLE_MODEL_PATH", default_value = "best.onnx")]
    model: PathBuf,
    /// Directory of numbered frame images (png/jpg/bmp).
    #[arg(long, conflicts_with = "video", required_unless_present = "video")]
    frames_dir: Option<PathBuf>,
    /// Video file (requires the clip-ffmpeg feature).
    #[arg(long)]
    video: Option<PathBuf>,
    /// Resize filter: nearest, triangle, catmull_rom or lanczos3.
    #[arg(long, default_value = "nearest")]
    filter: String,
    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let filter = ResizeFilter::parse(&args.filter)?;
    let engine = load_engine(&args.model)?;
    let scanner = ClipScanner::new(Preprocessor::new(filter), engine);

    let mut reader = open_reader(&args)?;
    let report = scanner.scan(reader.as_mut())?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.message);
        println!("max confidence: {:.4}", report.max_confidence);
        println!(
            "frames: {} read, {} sampled",
            report.frames_read, report.frames_sampled
        );
    }
    Ok(())
}

fn open_reader(args: &Args) -> Result<Box<dyn ClipReader>> {
    if let Some(dir) = &args.frames_dir {
        return Ok(Box::new(FrameDirReader::open(dir)?));
    }
    let video = args
        .video
        .as_ref()
        .ok_or_else(|| anyhow!("either --frames-dir or --video is required"))?;
    open_video(video)
}

#[cfg(feature = "clip-ffmpeg")]
fn open_video(path: &Path) -> Result<Box<dyn ClipReader>> {
    Ok(Box::new(pothole_watch::clip::FfmpegClipReader::open(path)?))
}

#[cfg(not(feature = "clip-ffmpeg"))]
fn open_video(path: &Path) -> Result<Box<dyn ClipReader>> {
    Err(anyhow!(
        "cannot read {}: video clips require the clip-ffmpeg feature",
        path.display()
    ))
}

#[cfg(feature = "backend-tract")]
fn load_engine(model: &Path) -> Result<Arc<dyn InferenceEngine>> {
    let engine = pothole_watch::detect::TractEngine::load(model)
        .with_context(|| format!("failed to load model {}", model.display()))?;
    Ok(Arc::new(engine))
}

#[cfg(not(feature = "backend-tract"))]
fn load_engine(model: &Path) -> Result<Arc<dyn InferenceEngine>> {
    Err(anyhow!(
        "cannot load {}: built without the backend-tract feature",
        model.display()
    ))
    .context("no inference backend available")
}
