// error.rs — 查看器错误类型

use thiserror::Error;

/// Errors surfaced at the viewer boundary.
#[derive(Debug, Error)]
pub enum ViewerError {
    /// No capability to decode or render images.
    #[error("unsupported environment: {0}")]
    UnsupportedEnvironment(String),

    #[error("failed to read panorama source: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode panorama image: {0}")]
    ImageDecode(#[source] image::ImageError),

    #[error("failed to encode panorama texture: {0}")]
    Encode(#[source] image::ImageError),

    #[error("invalid animation speed: {0:?}")]
    InvalidSpeed(String),

    #[error("unknown animation speed unit: {0:?}")]
    InvalidSpeedUnit(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("renderer error: {0}")]
    Renderer(String),
}

pub type Result<T> = std::result::Result<T, ViewerError>;
