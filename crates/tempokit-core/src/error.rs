//! Error taxonomy for the pipeline
//!
//! Configuration errors are fatal and raised before any source is touched.
//! Everything else is attributed to exactly one source and isolated by the
//! batch loop, see [`crate::pipeline::Batch`].

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Invalid or contradictory operation configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("missing mandatory field `{0}`")]
    MissingField(&'static str),

    #[error("unsupported format `{value}`, supported formats are {expected}")]
    UnsupportedFormat {
        value: String,
        expected: &'static str,
    },

    #[error("either target_tempo or min_rate/max_rate must be provided")]
    NoStretchTarget,

    #[error("only one of target_tempo or min_rate/max_rate can be provided")]
    ConflictingStretchTarget,

    #[error("min_rate ({min}) cannot be greater than max_rate ({max})")]
    RateOrder { min: f64, max: f64 },

    #[error("{field} must be a positive finite number, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("target_lufs must be a finite value <= 0.0, got {0}")]
    InvalidTargetLufs(f64),

    #[error("unknown variable `{name}` in filename template `{template}`")]
    UnknownTemplateVariable { name: String, template: String },

    #[error("malformed filename template `{template}`: {reason}")]
    MalformedTemplate { template: String, reason: String },

    #[error("configuration file not found at {0:?}")]
    FileNotFound(PathBuf),

    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

/// Coarse error classification used for reporting and failure accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    SourceNotFound,
    Ingestion,
    Computation,
    Persistence,
}

impl ErrorKind {
    /// Whether this kind aborts the whole operation rather than one source
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorKind::Configuration | ErrorKind::SourceNotFound)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::SourceNotFound => "source-not-found",
            ErrorKind::Ingestion => "ingestion",
            ErrorKind::Computation => "computation",
            ErrorKind::Persistence => "persistence",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors raised by the pipeline and its collaborators
#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("source not found: {0:?}")]
    SourceNotFound(PathBuf),

    #[error("failed to ingest {path:?}: {reason}")]
    Ingestion { path: PathBuf, reason: String },

    #[error("computation error: {0}")]
    Computation(String),

    #[error("failed to write {path:?}: {reason}")]
    Persistence { path: PathBuf, reason: String },
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Configuration(_) => ErrorKind::Configuration,
            PipelineError::SourceNotFound(_) => ErrorKind::SourceNotFound,
            PipelineError::Ingestion { .. } => ErrorKind::Ingestion,
            PipelineError::Computation(_) => ErrorKind::Computation,
            PipelineError::Persistence { .. } => ErrorKind::Persistence,
        }
    }

    /// Path the error is attributed to, when it names one
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            PipelineError::SourceNotFound(path)
            | PipelineError::Ingestion { path, .. }
            | PipelineError::Persistence { path, .. } => Some(path),
            PipelineError::Configuration(_) | PipelineError::Computation(_) => None,
        }
    }

    pub(crate) fn ingestion(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        PipelineError::Ingestion {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn persistence(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        PipelineError::Persistence {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_converts_to_configuration_kind() {
        let err: PipelineError = ConfigError::NoStretchTarget.into();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.kind().is_fatal());
        assert_eq!(
            err.to_string(),
            "configuration error: either target_tempo or min_rate/max_rate must be provided"
        );
    }

    #[test]
    fn test_per_source_kinds_are_not_fatal() {
        let ingestion = PipelineError::ingestion("a.wav", "corrupt header");
        let persistence = PipelineError::persistence("/out/a.wav", "read-only filesystem");
        let computation = PipelineError::Computation("tempo estimate is 0".into());

        for err in [ingestion, persistence, computation] {
            assert!(!err.kind().is_fatal(), "{} should be per-source", err.kind());
        }
    }

    #[test]
    fn test_rate_order_display() {
        let err = ConfigError::RateOrder { min: 1.2, max: 0.8 };
        assert_eq!(err.to_string(), "min_rate (1.2) cannot be greater than max_rate (0.8)");
    }
}
