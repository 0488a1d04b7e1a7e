use thiserror::Error;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("style index {index} out of range ({count} styles loaded)")]
    StyleOutOfRange { index: usize, count: usize },
    #[error("no styles loaded")]
    NoStyles,
    #[error("dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("unexpected model output shape {0:?}")]
    OutputShape(Vec<i64>),
}
