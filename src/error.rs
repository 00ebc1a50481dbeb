use thiserror::Error;

#[derive(Error, Debug)]
pub enum PyramidError {
    #[error("No common levels between reference and candidate pyramids (suffix '{suffix}')")]
    NoCommonLevels { suffix: String },

    #[error("Malformed level column '{column}': expected level_<n>_<attribute> with n >= 1")]
    MalformedLevelColumn { column: String },

    #[error("The {side} pyramid is empty")]
    EmptyPyramid { side: String },

    #[error("Ambiguous {side} entity '{key}' at {column}: rows share the key path but disagree on '{attribute}'")]
    AmbiguousEntity {
        side: String,
        column: String,
        key: String,
        attribute: String,
    },

    #[error("Key column '{column}' of the {side} pyramid cannot be read as text: {message}")]
    InvalidKeyColumn {
        side: String,
        column: String,
        message: String,
    },

    #[error("Threshold {0} is outside [0, 100]")]
    InvalidThreshold(f64),

    #[error("Unknown matcher: {0} (available: {})", crate::matcher::available_matchers().join(", "))]
    UnknownMatcher(String),

    #[error("Unknown scorer: {0}")]
    UnknownScorer(String),

    #[error("Invalid matching column suffix '{0}': expected '_' followed by a name")]
    InvalidSuffix(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("Scoring failed at {column} for '{reference}' vs '{candidate}': {message}")]
    Scoring {
        column: String,
        reference: String,
        candidate: String,
        message: String,
    },

    #[error("Deadline exceeded before matching level {level}")]
    DeadlineExceeded { level: u32 },

    #[error("Polars error: {0}")]
    Polars(String),
}

/// Coarse classification used by callers that only care about the failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Schema,
    Input,
    Config,
    Scoring,
    Deadline,
    Internal,
}

impl PyramidError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoCommonLevels { .. } | Self::MalformedLevelColumn { .. } => ErrorKind::Schema,
            Self::EmptyPyramid { .. }
            | Self::AmbiguousEntity { .. }
            | Self::InvalidKeyColumn { .. } => ErrorKind::Input,
            Self::InvalidThreshold(_)
            | Self::UnknownMatcher(_)
            | Self::UnknownScorer(_)
            | Self::InvalidSuffix(_)
            | Self::ConfigParse(_) => ErrorKind::Config,
            Self::Scoring { .. } => ErrorKind::Scoring,
            Self::DeadlineExceeded { .. } => ErrorKind::Deadline,
            Self::Polars(_) => ErrorKind::Internal,
        }
    }
}

impl From<polars::error::PolarsError> for PyramidError {
    fn from(err: polars::error::PolarsError) -> Self {
        PyramidError::Polars(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PyramidError>;
