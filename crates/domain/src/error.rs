/// Shared error type used across all AgentIM crates.
///
/// Variant names are the contract from the failure-kind taxonomy: callers
/// match on them to decide whether a connection stays open, a frame is
/// dropped, or a turn is surfaced as an inline error chunk.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("validation: {0}")]
    Validation(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("limit: {0}")]
    Limit(String),

    #[error("agent busy: {0}")]
    AgentBusy(String),

    #[error("adapter failure: {0}")]
    AdapterFailure(String),

    #[error("permission timeout: {0}")]
    PermissionTimeout(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("transient: {0}")]
    Transient(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error kind represents a condition the caller should
    /// retry (a `Transient` failure per the error-handling design).
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transient(_) | Error::Timeout(_))
    }
}
