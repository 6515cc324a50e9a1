//! Error taxonomy for the ebook pipeline.
//!
//! Every failure surfaced to a caller carries a coarse [`ErrorKind`] plus a
//! human-readable message naming the stage (and page, when relevant).

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Missing or out-of-range request field, or a text box that does not fit
    /// the output image. Raised before any file is written.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Cover or template image could not be read or decoded.
    #[error("asset error during {stage}: {message}")]
    Asset { stage: &'static str, message: String },

    /// A referenced template id is unknown to the template store.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("I/O error during {stage}{}: {source}", page_suffix(.page))]
    Io {
        stage: &'static str,
        page: Option<u32>,
        #[source]
        source: std::io::Error,
    },
}

fn page_suffix(page: &Option<u32>) -> String {
    match page {
        Some(n) => format!(" (page {n})"),
        None => String::new(),
    }
}

/// Coarse error classification exposed to external callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Asset,
    NotFound,
    Io,
}

/// Serialisable `{ kind, message }` pair for the CLI and FFI surfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    pub fn asset(stage: &'static str, msg: impl Into<String>) -> Self {
        EngineError::Asset {
            stage,
            message: msg.into(),
        }
    }

    pub fn io(stage: &'static str, page: Option<u32>, source: std::io::Error) -> Self {
        EngineError::Io {
            stage,
            page,
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::Asset { .. } => ErrorKind::Asset,
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::Io { .. } => ErrorKind::Io,
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_mentions_page() {
        let err = EngineError::io(
            "page write",
            Some(3),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("page write"), "{msg}");
        assert!(msg.contains("(page 3)"), "{msg}");
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn report_serialises_kind_in_snake_case() {
        let report = EngineError::NotFound("template 'x'".into()).report();
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"kind\":\"not_found\""), "{json}");
    }
}
