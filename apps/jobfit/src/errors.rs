use thiserror::Error;

/// Crate-level error type.
///
/// Input-data problems never reach this type: the engine absorbs them and
/// marks the run degraded. What remains are configuration mistakes and
/// genuinely unexpected failures.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable code, used by the binary when reporting failures.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::InvalidConfig(_) => "INVALID_CONFIG",
            AppError::Cache(_) => "CACHE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
