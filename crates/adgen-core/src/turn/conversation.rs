//! The conversation owns the transcript and the single open turn.
//!
//! Every front end funnels stream events through [`Conversation::handle`], so
//! the auto-triggered first turn and interactive turns share the same
//! ordering, finalization and error semantics.

use super::router::{self, TRANSPORT_ERROR_TEXT};
use super::side_channel::SideChannelUpdate;
use super::{TurnId, TurnState};
use crate::client::{ChatRequest, HistoryEntry};
use crate::error::TurnError;
use crate::state::{AssetRef, ChatMessage, Transcript};
use crate::stream::{StreamEvent, StreamRecord};
use tokio_util::sync::CancellationToken;

/// Shown in place of an empty reply when the owner stops a turn
pub const CANCELLED_TEXT: &str = "Generation cancelled.";

/// Optional hand-off that seeds the auto-triggered first turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnSeed {
    pub message: Option<String>,
    pub image: Option<AssetRef>,
}

impl TurnSeed {
    /// The seed image becomes the current image before any record arrives.
    pub fn side_channel(&self) -> Option<SideChannelUpdate> {
        self.image
            .clone()
            .filter(|image| !image.is_empty())
            .map(SideChannelUpdate::image)
    }
}

/// Everything the caller needs to run one turn's stream.
#[derive(Debug, Clone)]
pub struct TurnHandle {
    pub id: TurnId,
    pub request: ChatRequest,
    /// Cancelling stops the read loop at the next chunk boundary.
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EndReason {
    ResponseComplete,
    /// Transport closed without a terminal record
    StreamClosed,
    ErrorRecord(String),
    TransportFailed(String),
    Cancelled,
}

/// How a turn ended. The conversation is back to `idle` once this exists.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub turn: TurnId,
    /// `Complete` or `Errored`
    pub state: TurnState,
    pub reason: EndReason,
    /// Transcript index of the assistant message
    pub message_index: usize,
}

/// What applying one stream event produced for the caller.
#[derive(Debug, Default)]
pub struct TurnStep {
    pub side_channel: Option<SideChannelUpdate>,
    pub outcome: Option<TurnOutcome>,
}

#[derive(Debug)]
struct OpenTurn {
    id: TurnId,
    placeholder: usize,
    cancel: CancellationToken,
}

#[derive(Debug, Default)]
pub struct Conversation {
    transcript: Transcript,
    state: TurnState,
    open: Option<OpenTurn>,
    next_turn: u64,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn open_turn(&self) -> Option<TurnId> {
        self.open.as_ref().map(|open| open.id)
    }

    /// The open turn's assistant message
    pub fn placeholder(&self) -> Option<&ChatMessage> {
        self.open
            .as_ref()
            .and_then(|open| self.transcript.get(open.placeholder))
    }

    /// Start an interactive turn. The request carries the transcript as it
    /// stood before this submission.
    pub fn begin_turn(
        &mut self,
        input: &str,
        initial_image: Option<AssetRef>,
    ) -> Result<TurnHandle, TurnError> {
        self.begin(input, initial_image, true)
    }

    /// Start the auto-triggered first turn from a seed. Returns `None` when
    /// the seed has no message to send.
    pub fn begin_seeded(&mut self, seed: &TurnSeed) -> Result<Option<TurnHandle>, TurnError> {
        match seed.message.as_deref() {
            Some(message) if !message.trim().is_empty() => {
                let image = seed.image.clone().filter(|image| !image.is_empty());
                self.begin(message, image, false).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn begin(
        &mut self,
        input: &str,
        initial_image: Option<AssetRef>,
        with_history: bool,
    ) -> Result<TurnHandle, TurnError> {
        if self.state != TurnState::Idle {
            return Err(TurnError::Busy(self.state));
        }
        let input = input.trim();
        if input.is_empty() {
            return Err(TurnError::EmptyInput);
        }

        let previous_messages = if with_history {
            self.transcript.iter().map(HistoryEntry::from).collect()
        } else {
            Vec::new()
        };

        self.transcript.push(ChatMessage::user(input));
        let placeholder = self.transcript.push(ChatMessage::placeholder());

        self.next_turn += 1;
        let id = TurnId::new(self.next_turn);
        let cancel = CancellationToken::new();
        self.open = Some(OpenTurn {
            id,
            placeholder,
            cancel: cancel.clone(),
        });
        self.state = TurnState::AwaitingFirstToken;
        tracing::info!(turn = %id, history = previous_messages.len(), "turn started");

        Ok(TurnHandle {
            id,
            request: ChatRequest {
                message: input.to_string(),
                previous_messages,
                initial_image,
            },
            cancel,
        })
    }

    /// Ask the open turn's read loop to stop. Returns false when idle.
    pub fn cancel(&self) -> bool {
        match &self.open {
            Some(open) => {
                open.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Apply one stream event to the open turn.
    ///
    /// Events for any turn other than the open one are stale and ignored.
    pub fn handle(&mut self, turn: TurnId, event: StreamEvent) -> TurnStep {
        let index = match &self.open {
            Some(open) if open.id == turn => open.placeholder,
            _ => {
                tracing::debug!(turn = %turn, ?event, "ignoring event for a turn that is not open");
                return TurnStep::default();
            }
        };
        let Some(message) = self.transcript.get_mut(index) else {
            return TurnStep::default();
        };

        match event {
            StreamEvent::Record(record) => {
                let kind = record.kind();
                let error_detail = match &record {
                    StreamRecord::Error { message } => Some(message.clone().unwrap_or_default()),
                    _ => None,
                };
                let routed = router::route(record, message, self.state);
                tracing::debug!(turn = %turn, kind, state = %routed.state, "record applied");
                self.state = routed.state;

                let outcome = match routed.state {
                    TurnState::Complete => Some(self.close(EndReason::ResponseComplete)),
                    TurnState::Errored => Some(self.close(EndReason::ErrorRecord(
                        error_detail.unwrap_or_default(),
                    ))),
                    _ => None,
                };
                TurnStep {
                    side_channel: routed.side_channel,
                    outcome,
                }
            }
            StreamEvent::Closed => {
                self.state = TurnState::Finalizing;
                message.image_loading = false;
                self.state = TurnState::Complete;
                TurnStep {
                    side_channel: None,
                    outcome: Some(self.close(EndReason::StreamClosed)),
                }
            }
            StreamEvent::Failed(reason) => {
                tracing::warn!(turn = %turn, %reason, "turn transport failed");
                message.content = TRANSPORT_ERROR_TEXT.to_string();
                message.image_loading = false;
                self.state = TurnState::Errored;
                TurnStep {
                    side_channel: None,
                    outcome: Some(self.close(EndReason::TransportFailed(reason))),
                }
            }
            StreamEvent::Cancelled => {
                if message.content.is_empty() {
                    message.content = CANCELLED_TEXT.to_string();
                }
                message.image_loading = false;
                self.state = TurnState::Errored;
                TurnStep {
                    side_channel: None,
                    outcome: Some(self.close(EndReason::Cancelled)),
                }
            }
        }
    }

    /// Freeze the placeholder, stop the read loop and return to idle.
    fn close(&mut self, reason: EndReason) -> TurnOutcome {
        let state = self.state;
        self.state = TurnState::Idle;

        let Some(open) = self.open.take() else {
            // handle() only closes a turn it found open
            return TurnOutcome {
                turn: TurnId::new(self.next_turn),
                state,
                reason,
                message_index: self.transcript.len().saturating_sub(1),
            };
        };
        if let Some(message) = self.transcript.get_mut(open.placeholder) {
            message.image_loading = false;
        }
        open.cancel.cancel();

        tracing::info!(turn = %open.id, %state, ?reason, "turn closed");
        TurnOutcome {
            turn: open.id,
            state,
            reason,
            message_index: open.placeholder,
        }
    }
}
