use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum AssessmentError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotAvailable(&'static str),
    #[error("{0}")]
    Conflict(String),
}

impl AssessmentError {
    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }
}
