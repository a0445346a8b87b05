use thiserror::Error;

use crate::types::ImageFormat;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("unsupported image format {format:?} with {planes} planes")]
    UnsupportedFormat { format: ImageFormat, planes: usize },

    #[error("sensor data not ready yet")]
    NotReady,

    #[error("depth query ({x}, {y}) outside {width}x{height} buffer")]
    OutOfBounds {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },

    #[error("hand detector failed: {0}")]
    DetectorFailure(String),

    #[error("invalid buffer: {0}")]
    InvalidBuffer(String),

    #[error("color conversion failed: {0}")]
    Conversion(String),
}

impl FrameError {
    /// Only missing sensor data is expected to clear up by itself.
    pub fn is_transient(&self) -> bool {
        matches!(self, FrameError::NotReady)
    }
}

pub type FrameResult<T> = Result<T, FrameError>;
