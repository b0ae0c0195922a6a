use crate::turn::TurnState;

/// Reasons a turn can't be started or driven.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TurnError {
    #[error("a turn is already {0}; wait for it to finish or cancel it")]
    Busy(TurnState),

    #[error("cannot send an empty message")]
    EmptyInput,

    #[error("turn is not open on this conversation")]
    NotOpen,
}

/// Failures opening the generation stream.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("generation endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
}
