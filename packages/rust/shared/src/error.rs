//! Error types for StockRAG.
//!
//! Library crates use [`StockRagError`] via `thiserror`.
//! App crates (cli/web) wrap this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all StockRAG operations.
#[derive(Debug, thiserror::Error)]
pub enum StockRagError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to an external service.
    #[error("network error: {0}")]
    Network(String),

    /// Response or document parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Vector database error (Qdrant API or payload mismatch).
    #[error("vector store error: {0}")]
    VectorStore(String),

    /// Language model error (API, quota, or response shape).
    #[error("llm error: {0}")]
    Llm(String),

    /// Market data provider error (price or news).
    #[error("market data error: {0}")]
    MarketData(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, StockRagError>;

impl StockRagError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = StockRagError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = StockRagError::MarketData("yahoo: HTTP 429".into());
        assert!(err.to_string().contains("HTTP 429"));
    }

    #[test]
    fn io_error_keeps_path() {
        let err = StockRagError::io(
            "/tmp/seed.json",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().contains("seed.json"));
    }
}
