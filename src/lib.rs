pub mod app;
pub mod batch;
pub mod capture;
pub mod config;
pub mod input;
pub mod recorder;
pub mod snapshot;
pub mod ui;

// Re-export vision types for convenience
pub use stylecam_vision::{Camera, Effects, FramePipeline, MaskMode, Zoom};
