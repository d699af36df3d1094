use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CieloApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Cielo declined the request. Error {status}. {message}")]
    Rejected { status: u16, message: String },
    #[error("Cielo is temporarily unavailable. {0}")]
    Transient(String),
    #[error("Could not make sense of the Cielo response. {0}")]
    Malformed(String),
}

impl CieloApiError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Classifies a non-success HTTP status. 5xx, 408 and 429 are worth retrying. Every other status means Cielo
    /// looked at the request and refused it.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            408 | 429 | 500..=599 => Self::Transient(format!("HTTP {status}. {message}")),
            _ => Self::Rejected { status, message },
        }
    }
}

impl From<reqwest::Error> for CieloApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Malformed(e.to_string())
        } else if e.is_builder() {
            Self::Initialization(e.to_string())
        } else {
            // connect, timeout, body and redirect errors all leave the sale in an unknown state on our side
            Self::Transient(e.to_string())
        }
    }
}
