use crate::Operation;
use kinolern_core::ItemIndex;
use thiserror::Error;

/// Failure talking to the recommendation service. Carries no recovery
/// information; the session only reports it and rolls back.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Response decoding failed: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Invalid service endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    /// The one runtime failure kind. Displays as the user-facing message.
    #[error("{}", operation.failure_message())]
    OperationFailed {
        operation: Operation,
        #[source]
        source: ServiceError,
    },
    #[error("Another request is still pending")]
    Busy,
    #[error("Refreshing discards the preferences set in this round; confirmation required")]
    ConfirmationRequired,
    #[error("This round has already been expanded")]
    ExpandUnavailable,
    #[error("Round {requested} does not exist ({available} completed)")]
    RoundOutOfRange { requested: u32, available: usize },
    #[error("Item {0} is not part of the active round")]
    UnknownItem(ItemIndex),
    #[error("Completion for ticket {ticket} does not match the pending request")]
    StaleCompletion { ticket: u64 },
}

pub type Result<T> = std::result::Result<T, SessionError>;
