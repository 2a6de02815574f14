use thiserror::Error;

/// Why an external lookup could not produce data
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("Request Error: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("HTTP Error: {status_code} - {message}")]
    HttpError { status_code: u16, message: String },

    #[error("Malformed Response: {0}")]
    MalformedResponse(String),

    #[error("Incomplete Response: {0}")]
    Incomplete(String),

    #[error("Invalid Configuration: {0}")]
    InvalidConfig(String),
}

impl LookupError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse(message.into())
    }
}
