use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Table setup error: {0}")]
    TableSetup(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Write(#[from] WriteError),
}

impl AppError {
    /// Stable name used as `error_kind` in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) => "ConfigError",
            AppError::TableSetup(_) => "TableSetupError",
            AppError::Fetch(e) => e.kind(),
            AppError::Schema(e) => e.kind(),
            AppError::Write(e) => e.kind(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Failure of the single standings request. Always aborts the run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status} from statistics provider: {snippet}")]
    Status { status: u16, snippet: String },

    #[error("Malformed response body (HTTP {status}): {reason}; body starts with: {snippet}")]
    Malformed {
        status: u16,
        reason: String,
        snippet: String,
    },
}

impl FetchError {
    pub fn kind(&self) -> &'static str {
        "FetchError"
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Request(e) => e.status().map(|s| s.as_u16()),
            FetchError::Status { status, .. } | FetchError::Malformed { status, .. } => {
                Some(*status)
            }
        }
    }
}

/// A raw provider record that could not be turned into a `TeamStat`.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("record {index}: field `{field}` {problem}")]
pub struct SchemaError {
    /// Position of the record in the provider response.
    pub index: usize,
    pub field: &'static str,
    pub problem: SchemaProblem,
}

impl SchemaError {
    pub fn kind(&self) -> &'static str {
        "SchemaError"
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaProblem {
    #[error("is missing")]
    Missing,

    #[error("is not an integer: {0}")]
    NotAnInteger(String),

    #[error("is not a number: {0}")]
    NotANumber(String),

    #[error("is not text: {0}")]
    NotText(String),

    #[error("must not be negative: {0}")]
    Negative(i64),

    #[error("is not a JSON object")]
    NotAnObject,

    #[error("repeats team id {0} from an earlier record")]
    DuplicateTeamId(i64),
}

/// A BatchWriteItem call the store rejected as a whole.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WriteError {
    #[error("Store rejected batch: {0}")]
    Service(String),

    #[error("Could not build batch request: {0}")]
    Request(String),
}

impl WriteError {
    pub fn kind(&self) -> &'static str {
        "WriteError"
    }
}
