use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No document type has any data for the scope. Sessions refuse to
    /// start; individual rules return SKIP instead of raising this.
    #[error("No financial data for property '{property_id}' period '{period_id}'")]
    DataUnavailable {
        property_id: String,
        period_id: String,
    },

    /// Malformed calculated-check configuration. The offending check is
    /// skipped and logged; the session continues.
    #[error("Bad configuration for check '{check_id}': {reason}")]
    Configuration { check_id: String, reason: String },

    /// Alert status changed between read and write. The monitor retries
    /// once against a fresh read; surfaced only if the retry also loses.
    #[error("Concurrent update on alert '{alert_id}'")]
    ConcurrencyConflict { alert_id: String },

    #[error("Session '{session_id}' is {status}, expected {expected}")]
    SessionState {
        session_id: String,
        status: String,
        expected: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ReconResult<T> = Result<T, ReconError>;
