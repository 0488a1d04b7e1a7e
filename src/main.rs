use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use stylecam::{
    app::App,
    capture::{CaptureWorker, WorkerSettings},
    config::{self, Config},
    recorder::RecordSettings,
    ui::{draw, ButtonBar},
    Camera, Effects, FramePipeline, MaskMode,
};
use stylecam_vision::{model, FaceSegmenter, StyleImage, StyleTransfer};

#[derive(Parser)]
#[command(name = "stylecam")]
#[command(version, about = "Webcam preview with neural style transfer")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the camera preview window (default)
    Run,
    /// Stylize still images and recorded clips offline
    Stylize {
        /// Style name as listed by `styles`
        #[arg(short, long)]
        style: String,
        /// Stylize the whole frame instead of only the face
        #[arg(long)]
        full_frame: bool,
        /// Output directory
        #[arg(short, long, default_value = "results")]
        out: PathBuf,
        /// Input images or clips
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// List configured styles
    Styles,
    /// Open config file in editor
    Config,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();
    let load = || config::load_config(config_path);

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&load()?),
        Commands::Stylize {
            style,
            full_frame,
            out,
            inputs,
        } => stylize(&load()?, &style, full_frame, &out, &inputs),
        Commands::Styles => list_styles(&load()?),
        // no parsing here, a broken config must stay editable
        Commands::Config => open_config(config_path),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segmentation {
    Required,
    /// Fall back to whole-frame styling when the model is missing.
    Optional,
    Skip,
}

fn load_styles(cfg: &Config) -> Result<Vec<StyleImage>> {
    cfg.styles
        .iter()
        .map(|s| StyleImage::open(&s.name, &s.image))
        .collect()
}

fn build_pipeline(cfg: &Config, segmentation: Segmentation) -> Result<FramePipeline> {
    let styles = load_styles(cfg)?;
    let session = model::style_session(&cfg.style_model)?;
    let style = StyleTransfer::new(session, styles)?;

    let segmenter = load_segmenter(cfg, segmentation)?;
    Ok(FramePipeline::new(style, segmenter))
}

fn load_segmenter(cfg: &Config, segmentation: Segmentation) -> Result<Option<FaceSegmenter>> {
    if segmentation == Segmentation::Skip {
        return Ok(None);
    }
    match model::segmentation_session(&cfg.segmentation_model) {
        Ok(session) => Ok(Some(FaceSegmenter::new(session, cfg.mask_threshold))),
        Err(e) if segmentation == Segmentation::Optional => {
            warn!("{:#}; styling whole frames", e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn run(cfg: &Config) -> Result<()> {
    let pipeline = build_pipeline(cfg, Segmentation::Optional)
        .context("Failed to initialize style transfer pipeline")?;
    let labels: Vec<String> = cfg.styles.iter().map(|s| s.name.clone()).collect();

    let settings = WorkerSettings {
        snapshot_dir: cfg.snapshot_dir.clone(),
        user_tag: cfg.user_tag.clone(),
        record: RecordSettings::from_config(cfg),
        effects: Effects {
            mirror: cfg.mirror,
            mask_mode: if cfg.face_only {
                MaskMode::StyleFace
            } else {
                MaskMode::StyleBackground
            },
            ..Effects::default()
        },
    };

    info!("Opening camera: {}", cfg.camera);
    let (device, width, height) = (cfg.camera.clone(), cfg.width, cfg.height);
    let worker = CaptureWorker::spawn(
        move || Camera::open(&device, width, height),
        pipeline,
        settings,
    )
    .context("Failed to open camera")?;

    let bar = ButtonBar::with_labels(cfg.width, cfg.height, labels);
    let font = if cfg.labels {
        draw::load_optional_font(cfg.font.as_deref())
    } else {
        None
    };
    App::new(worker, bar, font).run(cfg.width as usize, cfg.height as usize)
}

fn stylize(
    cfg: &Config,
    style: &str,
    full_frame: bool,
    out: &Path,
    inputs: &[PathBuf],
) -> Result<()> {
    let segmentation = if full_frame {
        Segmentation::Skip
    } else {
        Segmentation::Required
    };
    let mut pipeline = build_pipeline(cfg, segmentation)?;
    let index = pipeline.style.position(style).with_context(|| {
        let known: Vec<&str> = pipeline.style.names().collect();
        format!("unknown style {:?}, configured: {}", style, known.join(", "))
    })?;
    pipeline.style.change_style(index)?;

    let written =
        stylecam::batch::stylize_files(&mut pipeline, inputs, out, MaskMode::StyleFace, cfg.fps)?;
    info!("✓ {} of {} file(s) written to {}", written, inputs.len(), out.display());
    if written < inputs.len() {
        anyhow::bail!("{} file(s) failed", inputs.len() - written);
    }
    Ok(())
}

fn list_styles(cfg: &Config) -> Result<()> {
    for (i, s) in cfg.styles.iter().enumerate() {
        let state = if s.image.exists() { "ok" } else { "missing" };
        println!("{:>2}  {:<12} {} ({})", i, s.name, s.image.display(), state);
    }
    Ok(())
}

fn open_config(path: Option<&Path>) -> Result<()> {
    let config_path = config::ensure_config_file(path)?;
    let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());

    info!("Opening config file: {:?}", config_path);

    let status = std::process::Command::new(editor)
        .arg(&config_path)
        .status()
        .context("Failed to open editor")?;

    if !status.success() {
        anyhow::bail!("Editor exited with non-zero status");
    }

    Ok(())
}
