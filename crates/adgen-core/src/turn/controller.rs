//! Drives turns against the generation endpoint.
//!
//! Two ways to run a turn:
//! - [`TurnController::run_turn`] / [`TurnController::run_seeded`] own the
//!   conversation for the whole turn and return a [`TurnReport`] (headless
//!   callers, tests).
//! - [`TurnController::spawn`] pumps events onto a channel so an event loop
//!   can feed them to [`Conversation::handle`] alongside its other input.

use super::conversation::{Conversation, TurnHandle, TurnOutcome, TurnSeed};
use super::side_channel::SideChannelUpdate;
use super::TurnId;
use crate::client::{ByteStream, ChatRequest, GenerationClient};
use crate::error::TurnError;
use crate::state::AssetRef;
use crate::stream::{RecordStream, StreamEvent, ValidationPolicy};
use futures_util::Stream;
use std::fmt::Display;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Everything one finished turn produced besides the transcript itself.
#[derive(Debug)]
pub struct TurnReport {
    pub outcome: TurnOutcome,
    /// Side-channel updates in arrival order
    pub side_channel: Vec<SideChannelUpdate>,
}

#[derive(Clone)]
pub struct TurnController {
    client: GenerationClient,
    policy: ValidationPolicy,
}

impl TurnController {
    pub fn new(client: GenerationClient, policy: ValidationPolicy) -> Self {
        Self { client, policy }
    }

    pub fn client(&self) -> &GenerationClient {
        &self.client
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    /// Open the request's stream, giving up early if the turn is cancelled
    /// while connecting. Failures come back as the end event to deliver.
    pub async fn open(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<RecordStream<ByteStream>, StreamEvent> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StreamEvent::Cancelled),
            opened = self.client.open_stream(request) => match opened {
                Ok(chunks) => Ok(RecordStream::new(chunks, self.policy.clone())),
                Err(err) => {
                    tracing::warn!(error = %err, "could not open generation stream");
                    Err(StreamEvent::Failed(err.to_string()))
                }
            },
        }
    }

    /// Feed every event of `records` to the conversation until the turn
    /// closes.
    pub async fn drive<S, B, E>(
        conversation: &mut Conversation,
        handle: &TurnHandle,
        mut records: RecordStream<S>,
    ) -> Result<TurnReport, TurnError>
    where
        S: Stream<Item = Result<B, E>> + Unpin,
        B: AsRef<[u8]>,
        E: Display,
    {
        if conversation.open_turn() != Some(handle.id) {
            return Err(TurnError::NotOpen);
        }

        let mut side_channel = Vec::new();
        loop {
            let event = records.next_event(&handle.cancel).await;
            let end = event.is_end();
            let step = conversation.handle(handle.id, event);
            side_channel.extend(step.side_channel);
            if let Some(outcome) = step.outcome {
                return Ok(TurnReport {
                    outcome,
                    side_channel,
                });
            }
            if end {
                return Err(TurnError::NotOpen);
            }
        }
    }

    /// Submit `input` as a new turn and stream the reply to completion.
    pub async fn run_turn(
        &self,
        conversation: &mut Conversation,
        input: &str,
        initial_image: Option<AssetRef>,
    ) -> Result<TurnReport, TurnError> {
        let handle = conversation.begin_turn(input, initial_image)?;
        self.run_handle(conversation, &handle, Vec::new()).await
    }

    /// Run the auto-triggered first turn. `Ok(None)` when the seed carries no
    /// message.
    pub async fn run_seeded(
        &self,
        conversation: &mut Conversation,
        seed: &TurnSeed,
    ) -> Result<Option<TurnReport>, TurnError> {
        let Some(handle) = conversation.begin_seeded(seed)? else {
            return Ok(None);
        };
        let initial = seed.side_channel().into_iter().collect();
        self.run_handle(conversation, &handle, initial).await.map(Some)
    }

    async fn run_handle(
        &self,
        conversation: &mut Conversation,
        handle: &TurnHandle,
        initial: Vec<SideChannelUpdate>,
    ) -> Result<TurnReport, TurnError> {
        let mut report = match self.open(&handle.request, &handle.cancel).await {
            Ok(records) => Self::drive(conversation, handle, records).await?,
            Err(event) => {
                let step = conversation.handle(handle.id, event);
                let outcome = step.outcome.ok_or(TurnError::NotOpen)?;
                TurnReport {
                    outcome,
                    side_channel: Vec::new(),
                }
            }
        };
        let mut side_channel = initial;
        side_channel.append(&mut report.side_channel);
        report.side_channel = side_channel;
        Ok(report)
    }

    /// Run the turn's stream on a background task, sending each event through
    /// `tx` wrapped by `wrap`. The task ends after the first end event, or
    /// when the receiver is dropped.
    pub fn spawn<T, F>(&self, handle: &TurnHandle, tx: mpsc::UnboundedSender<T>, wrap: F) -> JoinHandle<()>
    where
        T: Send + 'static,
        F: Fn(TurnId, StreamEvent) -> T + Send + 'static,
    {
        let controller = self.clone();
        let id = handle.id;
        let request = handle.request.clone();
        let cancel = handle.cancel.clone();

        tokio::spawn(async move {
            let mut records = match controller.open(&request, &cancel).await {
                Ok(records) => records,
                Err(event) => {
                    let _ = tx.send(wrap(id, event));
                    return;
                }
            };
            loop {
                let event = records.next_event(&cancel).await;
                let end = event.is_end();
                if tx.send(wrap(id, event)).is_err() {
                    tracing::debug!(turn = %id, "event receiver dropped, stopping stream");
                    break;
                }
                if end {
                    break;
                }
            }
        })
    }
}
