use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    /// Non-success HTTP status. `message` is the server's `detail` when it sent one.
    #[error("{message}")]
    Request { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Status channel error: {0}")]
    Channel(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Status channel did not open within {0:?}")]
    ChannelTimeout(Duration),

    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Validation(#[from] sp_core::Error),

    #[error("Payment required to download full stems")]
    PaymentRequired,

    #[error("Payment is already being processed")]
    PaymentInProgress,

    #[error("This job does not need a payment")]
    PaymentNotRequired,

    #[error("Job has no stem named {0}")]
    UnknownStem(String),

    #[error("Not allowed while {0}")]
    InvalidPhase(&'static str),
}

impl AppError {
    /// Message shown to the user when status tracking fails.
    pub fn tracking_message(&self) -> String {
        match self {
            Self::Request { message, .. } => message.clone(),
            _ => "Failed to check job status".to_string(),
        }
    }
}
