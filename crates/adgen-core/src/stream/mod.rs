//! Incremental decoding of the generation backend's record stream
//!
//! Bytes flow `LineDecoder` → `extract_payload` → `ValidationPolicy::parse`
//! and come out as typed [`StreamRecord`]s. Anything that fails along the way
//! is protocol noise: logged at debug level and skipped.

pub mod decoder;
pub mod extract;
pub mod record;

pub use decoder::LineDecoder;
pub use extract::{extract_payload, PAYLOAD_PREFIX};
pub use record::{Discard, SideChannelPayload, StreamRecord, TemplateData, ValidationPolicy};

use futures_util::{Stream, StreamExt};
use std::collections::VecDeque;
use std::fmt::Display;
use tokio_util::sync::CancellationToken;

/// Characters of an offending line kept in debug logs
const LOG_PREVIEW_CHARS: usize = 100;

/// What one step of the read loop produced.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Record(StreamRecord),
    /// Transport closed normally
    Closed,
    /// Transport failed mid-stream or could not be opened
    Failed(String),
    /// The turn's owner cancelled before the transport finished
    Cancelled,
}

impl StreamEvent {
    /// True for every event after which the stream yields nothing new
    pub fn is_end(&self) -> bool {
        !matches!(self, StreamEvent::Record(_))
    }
}

/// Turn a single line into a record, or explain why not.
pub fn decode_line(line: &str, policy: &ValidationPolicy) -> Option<StreamRecord> {
    let payload = extract_payload(line)?;
    match policy.parse(payload) {
        Ok(record) => Some(record),
        Err(reason) => {
            tracing::debug!(
                %reason,
                line = %line.chars().take(LOG_PREVIEW_CHARS).collect::<String>(),
                "discarding stream payload"
            );
            None
        }
    }
}

/// Lazy, non-restartable sequence of records over a chunked byte stream.
pub struct RecordStream<S> {
    chunks: S,
    decoder: LineDecoder,
    policy: ValidationPolicy,
    ready: VecDeque<StreamRecord>,
    finished: bool,
}

impl<S, B, E> RecordStream<S>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
{
    pub fn new(chunks: S, policy: ValidationPolicy) -> Self {
        Self {
            chunks,
            decoder: LineDecoder::new(),
            policy,
            ready: VecDeque::new(),
            finished: false,
        }
    }

    /// Wait for the next event.
    ///
    /// Records already decoded from a chunk are handed out before the token is
    /// consulted again, so cancellation takes effect between chunk reads.
    /// Once an end event has been returned, every later call yields `Closed`.
    pub async fn next_event(&mut self, cancel: &CancellationToken) -> StreamEvent {
        loop {
            if let Some(record) = self.ready.pop_front() {
                return StreamEvent::Record(record);
            }
            if self.finished {
                return StreamEvent::Closed;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.finish();
                    return StreamEvent::Cancelled;
                }
                chunk = self.chunks.next() => match chunk {
                    Some(Ok(bytes)) => self.ingest(bytes.as_ref()),
                    Some(Err(err)) => {
                        self.finish();
                        return StreamEvent::Failed(err.to_string());
                    }
                    None => {
                        self.finish();
                        return StreamEvent::Closed;
                    }
                },
            }
        }
    }

    fn ingest(&mut self, chunk: &[u8]) {
        for line in self.decoder.push(chunk) {
            if let Some(record) = decode_line(&line, &self.policy) {
                self.ready.push_back(record);
            }
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        let discarded = self.decoder.finish();
        if discarded > 0 {
            tracing::debug!(bytes = discarded, "dropping unterminated trailing line");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn chunks(parts: &[&str]) -> impl Stream<Item = Result<Vec<u8>, String>> + Unpin {
        stream::iter(
            parts
                .iter()
                .map(|p| Ok(p.as_bytes().to_vec()))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn yields_records_then_closed_forever() {
        let cancel = CancellationToken::new();
        let mut records = RecordStream::new(
            chunks(&["data: {\"type\":\"text_delta\",\"content\":\"A\"}\n\n", "noise\n"]),
            ValidationPolicy::default(),
        );
        assert_eq!(
            records.next_event(&cancel).await,
            StreamEvent::Record(StreamRecord::TextDelta { content: "A".into() })
        );
        assert_eq!(records.next_event(&cancel).await, StreamEvent::Closed);
        assert_eq!(records.next_event(&cancel).await, StreamEvent::Closed);
    }

    #[tokio::test]
    async fn unterminated_last_line_is_not_a_record() {
        let cancel = CancellationToken::new();
        let mut records = RecordStream::new(
            chunks(&["data: {\"type\":\"text_delta\",\"content\":\"A\"}"]),
            ValidationPolicy::default(),
        );
        assert_eq!(records.next_event(&cancel).await, StreamEvent::Closed);
    }

    #[tokio::test]
    async fn transport_errors_end_the_stream() {
        let cancel = CancellationToken::new();
        let parts: Vec<Result<Vec<u8>, String>> = vec![
            Ok(b"data: {\"type\":\"text_delta\",\"content\":\"A\"}\n".to_vec()),
            Err("connection reset".to_string()),
            Ok(b"data: {\"type\":\"text_delta\",\"content\":\"B\"}\n".to_vec()),
        ];
        let mut records = RecordStream::new(stream::iter(parts), ValidationPolicy::default());
        assert!(matches!(records.next_event(&cancel).await, StreamEvent::Record(_)));
        assert_eq!(
            records.next_event(&cancel).await,
            StreamEvent::Failed("connection reset".into())
        );
        assert_eq!(records.next_event(&cancel).await, StreamEvent::Closed);
    }

    #[tokio::test]
    async fn cancellation_is_seen_between_reads() {
        let cancel = CancellationToken::new();
        let mut records = RecordStream::new(
            stream::pending::<Result<Vec<u8>, String>>(),
            ValidationPolicy::default(),
        );
        cancel.cancel();
        assert_eq!(records.next_event(&cancel).await, StreamEvent::Cancelled);
        assert_eq!(records.next_event(&cancel).await, StreamEvent::Closed);
    }
}
