/// Convenience result type used across Montage.
pub type MontageResult<T> = Result<T, MontageError>;

/// Top-level error taxonomy used by engine APIs.
///
/// Out-of-range edits (spans, speeds, parameter values) are clamped and never reach this type.
#[derive(thiserror::Error, Debug)]
pub enum MontageError {
    /// Malformed input that cannot be clamped into a legal value.
    #[error("validation error: {0}")]
    Validation(String),

    /// Illegal operation on the model: duplicate registration, rejected effect owner, foreign
    /// parameter, mismatched value kind.
    #[error("structural error: {0}")]
    Structural(String),

    /// Resource lookup or decode failure outside the render loop.
    #[error("resource error: {0}")]
    Resource(String),

    /// Failure while drawing a clip or running a render job.
    #[error("render error: {0}")]
    Render(String),

    /// Errors when serializing or deserializing configuration.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MontageError {
    /// Build a [`MontageError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`MontageError::Structural`] value.
    pub fn structural(msg: impl Into<String>) -> Self {
        Self::Structural(msg.into())
    }

    /// Build a [`MontageError::Resource`] value.
    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    /// Build a [`MontageError::Render`] value.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build a [`MontageError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Whether this error is a programming error that must surface to the caller.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Structural(_))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
