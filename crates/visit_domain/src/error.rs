use thiserror::Error;

#[derive(Debug, Error)]
pub enum VisitError {
    #[error("invalid visit date `{input}`: {reason}")]
    Parse { input: String, reason: &'static str },

    #[error("verify frequency must be a positive number of days, got {0}")]
    InvalidFrequency(i64),

    #[error("unable to reach visit service: {0}")]
    Transport(String),

    #[error("{method} {url} failed with status {status}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
    },

    #[error("unable to decode visit service response: {0}")]
    Decode(String),

    #[error("no visit record with id `{0}`")]
    UnknownRecord(String),

    #[error("invalid visit service address `{0}`")]
    InvalidBaseUrl(String),
}

impl VisitError {
    pub(crate) fn parse(input: &str, reason: &'static str) -> Self {
        Self::Parse {
            input: input.to_string(),
            reason,
        }
    }

    /// Operator-facing text for an error raised while loading or updating visits.
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(_) => {
                "Unable to reach the server. Check your connection and try again.".to_string()
            }
            Self::Status { status, .. } if *status >= 500 => format!(
                "The server failed to process the request (status {status}). Try again later."
            ),
            Self::Status { status: 404, .. } => "The visit record was not found.".to_string(),
            Self::Status { status: 400, .. } => "The server rejected the request.".to_string(),
            Self::Status { status, .. } => format!("Request failed with status {status}."),
            Self::Parse { .. } | Self::InvalidFrequency(_) | Self::Decode(_) => {
                "The server sent visit data that could not be read.".to_string()
            }
            Self::UnknownRecord(id) => format!("No visit record with id {id}."),
            Self::InvalidBaseUrl(_) => {
                "The visit service address is not configured correctly.".to_string()
            }
        }
    }
}
