use thiserror::Error;

/// Closed set of failure kinds visible to callers, per the error handling design.
///
/// Each variant carries the data its HTTP/log representation needs. Construction
/// failures (missing credentials, unknown providers, mode violations) are
/// surfaced immediately; `rate_limit` and `server_fault` are the only kinds a
/// provider retry loop should catch and retry.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("provider unconfigured: missing {0}")]
    Unconfigured(String),

    #[error("unknown provider {requested:?}, valid providers are {valid:?}")]
    UnknownProvider { requested: String, valid: Vec<String> },

    #[error("provider {provider:?} is not admissible in {mode:?} mode")]
    ModeViolation { provider: String, mode: String },

    #[error("rate limited: {0}")]
    RateLimit(String),

    #[error("provider server fault: {0}")]
    ServerFault(String),

    #[error("unrecoverable provider error: {0}")]
    Unrecoverable(String),

    #[error("policy violation: {0}")]
    PolicyViolation(String),

    #[error("workspace {workspace:?} is not indexed")]
    NotIndexed { workspace: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("database error: {0}")]
    Database(#[from] surrealdb::Error),

    #[error("http error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
}

impl AppError {
    /// Stable kind tag used in structured logs and the JSON error body.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unconfigured(_) => "unconfigured",
            Self::UnknownProvider { .. } => "unknown_provider",
            Self::ModeViolation { .. } => "mode_violation",
            Self::RateLimit(_) => "rate_limit",
            Self::ServerFault(_) => "server_fault",
            Self::Unrecoverable(_) => "unrecoverable",
            Self::PolicyViolation(_) => "policy_violation",
            Self::NotIndexed { .. } => "not_indexed",
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Database(_) | Self::Reqwest(_) | Self::Io(_) | Self::Config(_) => "server_fault",
        }
    }

    /// Whether a provider-capability retry loop should retry this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit(_) | Self::ServerFault(_))
    }
}
