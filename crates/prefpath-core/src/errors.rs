//! Error types for prefpath.
//!
//! Configuration and shape problems are fatal and reported before training
//! starts; feasibility failures inside the scorer are observations, not
//! errors, and never surface here.

use thiserror::Error;

/// Unified error type for all prefpath operations.
#[derive(Error, Debug)]
pub enum PrefPathError {
    /// Configuration validation errors (bad option values, missing inputs)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Matrix/table dimension mismatch against the configured resolution
    #[error("Shape error in {context}: expected {expected}, found {found}")]
    Shape {
        context: String,
        expected: String,
        found: String,
    },

    /// Checkpoint function set differs from the run's configured functions
    #[error("Different function criteria loaded: checkpoint has [{stored}], run configured [{configured}]")]
    FnMismatch { stored: String, configured: String },

    /// Mathematical/numerical errors (e.g., non-positive sigma override)
    #[error("Numerical error: {0}")]
    Numerical(String),

    /// I/O errors (dataset files, checkpoint read/write)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// NPY matrix file could not be read
    #[error("NPY read error: {0}")]
    Npy(#[from] ndarray_npy::ReadNpyError),

    /// Checkpoint payload could not be decoded
    #[error("Checkpoint decode error: {0}")]
    Decode(String),
}

impl PrefPathError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        PrefPathError::Config(message.into())
    }

    /// Creates a shape error with context.
    pub fn shape(
        context: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        PrefPathError::Shape {
            context: context.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Creates a numerical error.
    pub fn numerical(message: impl Into<String>) -> Self {
        PrefPathError::Numerical(message.into())
    }

    /// Creates a function-set mismatch error from the two function lists.
    pub fn fn_mismatch(stored: &[String], configured: &[String]) -> Self {
        PrefPathError::FnMismatch {
            stored: stored.join(", "),
            configured: configured.join(", "),
        }
    }
}

/// Result type alias for prefpath operations.
pub type Result<T> = std::result::Result<T, PrefPathError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let config_err = PrefPathError::config("resolution must be positive");
        assert!(matches!(config_err, PrefPathError::Config(_)));

        let shape_err = PrefPathError::shape("structural matrix", "219x219", "219x200");
        assert!(matches!(shape_err, PrefPathError::Shape { .. }));
    }

    #[test]
    fn test_fn_mismatch_message() {
        let err = PrefPathError::fn_mismatch(
            &["distance".to_string(), "hub".to_string()],
            &["distance".to_string()],
        );
        let msg = err.to_string();
        assert!(msg.contains("distance, hub"));
        assert!(msg.contains("Different function criteria"));
    }
}
