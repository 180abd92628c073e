use thiserror::Error;

/// Errors from oracle providers.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle failed: {0}")]
    Failed(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Errors surfaced by the preparedness and voice request handlers.
///
/// The display text is the message returned to the caller.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Configuration(String),

    #[error("{0}")]
    Oracle(#[from] OracleError),
}

impl RequestError {
    /// HTTP-style status code for this error.
    pub fn status(&self) -> u16 {
        match self {
            RequestError::Validation(_) => 400,
            RequestError::Configuration(_) | RequestError::Oracle(_) => 500,
        }
    }
}
