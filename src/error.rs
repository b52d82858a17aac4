use crate::format::PixelFormat;
use crate::op::CompositeOperation;

pub type PixmixResult<T> = Result<T, PixmixError>;

#[derive(thiserror::Error, Debug)]
pub enum PixmixError {
    /// No kernel is installed for the requested (operation, format triple).
    #[error("unsupported combination: {op} {format_a}x{format_b}->{format_d}")]
    UnsupportedCombination {
        op: CompositeOperation,
        format_a: PixelFormat,
        format_b: PixelFormat,
        format_d: PixelFormat,
    },

    /// The composite context describes buffers that cannot hold the
    /// requested pixel extent, or carries an out-of-range parameter.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PixmixError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}
