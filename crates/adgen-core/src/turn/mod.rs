//! Turn lifecycle: one user submission and the assistant reply streamed back
//! for it.

pub mod controller;
pub mod conversation;
mod router;
pub mod side_channel;

pub use controller::{TurnController, TurnReport};
pub use conversation::{Conversation, EndReason, TurnHandle, TurnOutcome, TurnSeed, TurnStep};
pub use router::TRANSPORT_ERROR_TEXT;
pub use side_channel::{GeneratedTemplate, SideChannelState, SideChannelUpdate, TemplateDraft};

use std::fmt;

/// Identifies one turn so events from a finished stream can't leak into the
/// next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TurnId(u64);

impl TurnId {
    pub(crate) fn new(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "turn-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    #[default]
    Idle,
    AwaitingFirstToken,
    Streaming,
    /// Authoritative text is in; completion metadata may still follow.
    Finalizing,
    Complete,
    Errored,
}

impl TurnState {
    /// A turn is open and owns the placeholder message
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            TurnState::AwaitingFirstToken | TurnState::Streaming | TurnState::Finalizing
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TurnState::Idle => "idle",
            TurnState::AwaitingFirstToken => "awaiting first token",
            TurnState::Streaming => "streaming",
            TurnState::Finalizing => "finalizing",
            TurnState::Complete => "complete",
            TurnState::Errored => "errored",
        }
    }
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
