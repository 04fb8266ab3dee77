use thiserror::Error;

use crate::color::Channel;

/// Reasons an image operation produced no result.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    #[error("a source image is required when no output size is given")]
    MissingSource,
    #[error("no channel selected")]
    EmptyFilter,
    #[error("output format {0} is not supported")]
    UnsupportedFormat(&'static str),
    #[error("failed to allocate {0} bytes")]
    Allocation(usize),
    #[error("size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("invalid gradient: {0}")]
    InvalidGradient(&'static str),
    #[error("channel {0:?} is not available")]
    ChannelUnavailable(Channel),
    #[error("unsupported bit depth {0}")]
    UnsupportedDepth(u8),
}
