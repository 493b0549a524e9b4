//! Error types for RustAcoustic.

use thiserror::Error;

/// Main error type for model construction and length projection.
#[derive(Error, Debug)]
pub enum AcousticError {
    /// Border mode outside `{same, valid}` passed to the length projector.
    #[error("Invalid border mode: {0} (expected `same` or `valid`)")]
    InvalidBorderMode(String),

    /// Composite output length is not positive for the given input.
    #[error("Degenerate sequence length: {input} input frames map to {output} output frames")]
    DegenerateLength {
        /// Input frame count.
        input: i64,
        /// Projected (non-positive) output frame count.
        output: i64,
    },

    /// Configuration errors.
    #[error("Config error: {0}")]
    Config(String),

    /// Model building and loading errors.
    #[error("Model error: {0}")]
    Model(String),

    /// I/O errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Candle tensor errors.
    #[error("Tensor error: {0}")]
    Candle(#[from] candle_core::Error),

    /// JSON parsing errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for acoustic model operations.
pub type AcousticResult<T> = Result<T, AcousticError>;
