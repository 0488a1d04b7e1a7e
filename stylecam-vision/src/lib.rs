pub mod composite;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod segmentation;
pub mod style;
pub mod tensor;
pub mod video;
pub mod zoom;

// Re-export commonly used types
pub use composite::MaskMode;
pub use error::VisionError;
pub use pipeline::{Effects, FramePipeline};
pub use segmentation::FaceSegmenter;
pub use style::{StyleImage, StyleTransfer};
pub use video::Camera;
pub use zoom::Zoom;
