use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use image::RgbImage;

/// `cvui_{date}_{time}_{tag}.png`, with `_{n}` appended while the name is taken.
pub fn snapshot_path(dir: &Path, now: DateTime<Local>, tag: &str) -> PathBuf {
    let stem = format!("cvui_{}_{}", now.format("%Y%m%d_%H%M%S"), tag);
    let first = dir.join(format!("{stem}.png"));
    if !first.exists() {
        return first;
    }
    (1..)
        .map(|n| dir.join(format!("{stem}_{n}.png")))
        .find(|p| !p.exists())
        .unwrap_or(first)
}

pub fn save_snapshot(dir: &Path, frame: &RgbImage, tag: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = snapshot_path(dir, Local::now(), tag);
    frame
        .save(&path)
        .with_context(|| format!("writing snapshot {}", path.display()))?;
    log::info!("snapshot saved to {}", path.display());
    Ok(path)
}
