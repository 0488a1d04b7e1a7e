use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub static CONFIG_PATH: Lazy<PathBuf> = Lazy::new(|| {
    if let Some(p) = option_env!("STYLECAM_CONFIG_PATH") {
        return PathBuf::from(p);
    }
    ProjectDirs::from("", "", "stylecam")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("stylecam.toml"))
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleEntry {
    pub name: String,
    pub image: PathBuf,
}

impl StyleEntry {
    fn new(name: &str, image: &str) -> Self {
        Self {
            name: name.to_string(),
            image: PathBuf::from(image),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub camera: String,
    pub width: u32,
    pub height: u32,
    pub mirror: bool,
    pub style_model: PathBuf,
    pub segmentation_model: PathBuf,
    /// Start with the style painted on the face instead of the background.
    pub face_only: bool,
    pub mask_threshold: f32,
    pub snapshot_dir: PathBuf,
    pub video_dir: PathBuf,
    pub clip_seconds: u64,
    pub max_clips: usize,
    pub fps: f64,
    /// Label font; unset means the system DejaVu Sans.
    pub font: Option<PathBuf>,
    pub labels: bool,
    pub user_tag: String,
    // kept last: serialised as an array of tables
    pub styles: Vec<StyleEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera: "/dev/video0".to_string(),
            width: 640,
            height: 480,
            mirror: true,
            style_model: PathBuf::from("models/arbitrary-image-stylization.onnx"),
            segmentation_model: PathBuf::from("models/face_unet.onnx"),
            styles: vec![
                StyleEntry::new("GOGH", "style/gogh.jpg"),
                StyleEntry::new("VK1913", "style/VK1913.jpg"),
                StyleEntry::new("MONET", "style/monet.jpg"),
            ],
            face_only: false,
            mask_threshold: 0.5,
            snapshot_dir: PathBuf::from("images"),
            video_dir: PathBuf::from("videos"),
            clip_seconds: 600,
            max_clips: 100,
            fps: 20.0,
            font: None,
            labels: true,
            user_tag: "00001".to_string(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("frame size must be non-zero, got {0}x{1}")]
    FrameSize(u32, u32),
    #[error("at least one style must be configured")]
    NoStyles,
    #[error("max_clips must be at least 1")]
    MaxClips,
    #[error("clip_seconds must be at least 1")]
    ClipSeconds,
    #[error("fps must be positive, got {0}")]
    Fps(f64),
    #[error("mask_threshold must be in (0, 1), got {0}")]
    Threshold(f32),
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::FrameSize(self.width, self.height));
        }
        if self.styles.is_empty() {
            return Err(ConfigError::NoStyles);
        }
        if self.max_clips == 0 {
            return Err(ConfigError::MaxClips);
        }
        if self.clip_seconds == 0 {
            return Err(ConfigError::ClipSeconds);
        }
        if !(self.fps > 0.0) {
            return Err(ConfigError::Fps(self.fps));
        }
        if !(self.mask_threshold > 0.0 && self.mask_threshold < 1.0) {
            return Err(ConfigError::Threshold(self.mask_threshold));
        }
        Ok(())
    }
}

/// `path`, or the platform config file when none is given.
pub fn config_path(path: Option<&Path>) -> &Path {
    path.unwrap_or(CONFIG_PATH.as_path())
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = config_path(path);
    if !path.exists() {
        log::debug!("no config at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    let cfg: Config =
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = config_path(path);
    let data = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data)?;
    Ok(())
}

/// Write the defaults if no config exists yet. An existing file is left as
/// is, even when it does not parse, so it can still be opened and fixed.
pub fn ensure_config_file(path: Option<&Path>) -> Result<PathBuf> {
    let path = config_path(path);
    if !path.exists() {
        save_config(&Config::default(), Some(path)).context("writing default config")?;
    }
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(Some(&dir.path().join("none.toml"))).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");
        let mut cfg = Config::default();
        cfg.max_clips = 5;
        cfg.styles.truncate(1);
        save_config(&cfg, Some(&path)).unwrap();
        assert_eq!(load_config(Some(&path)).unwrap(), cfg);
    }

    #[test]
    fn unset_font_survives_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut cfg = Config::default();
        cfg.font = None;
        cfg.labels = false;
        save_config(&cfg, Some(&path)).unwrap();
        let back = load_config(Some(&path)).unwrap();
        assert_eq!(back.font, None);
        assert!(!back.labels);

        cfg.font = Some(PathBuf::from("/opt/fonts/Mono.ttf"));
        save_config(&cfg, Some(&path)).unwrap();
        assert_eq!(load_config(Some(&path)).unwrap(), cfg);
    }

    #[test]
    fn broken_config_can_still_be_opened() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_clips = 0\n").unwrap();
        assert!(load_config(Some(&path)).is_err());

        assert_eq!(ensure_config_file(Some(&path)).unwrap(), path);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "max_clips = 0\n");

        let fresh = dir.path().join("new/config.toml");
        ensure_config_file(Some(&fresh)).unwrap();
        assert_eq!(load_config(Some(&fresh)).unwrap(), Config::default());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "camera = \"/dev/video2\"\nclip_seconds = 30\n").unwrap();
        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.camera, "/dev/video2");
        assert_eq!(cfg.clip_seconds, 30);
        assert_eq!(cfg.max_clips, 100);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut cfg = Config::default();
        cfg.max_clips = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::MaxClips));

        let mut cfg = Config::default();
        cfg.mask_threshold = 1.5;
        assert_eq!(cfg.validate(), Err(ConfigError::Threshold(1.5)));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "styles = []\n").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }
}
