//! Decoding and routing properties that must hold regardless of how the
//! transport fragments the body.

use adgen_core::stream::{RecordStream, StreamEvent, StreamRecord, ValidationPolicy};
use adgen_core::turn::{Conversation, EndReason, TurnController, TurnState};
use adgen_core::{AssetRef, TurnError};
use futures_util::stream;
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

type Chunks = stream::Iter<std::vec::IntoIter<Result<Vec<u8>, String>>>;

fn from_chunks(chunks: Vec<Vec<u8>>) -> RecordStream<Chunks> {
    let chunks: Vec<Result<Vec<u8>, String>> = chunks.into_iter().map(Ok).collect();
    RecordStream::new(stream::iter(chunks), ValidationPolicy::default())
}

fn from_lines(lines: &[&str]) -> RecordStream<Chunks> {
    from_chunks(lines.iter().map(|l| format!("{}\n\n", l).into_bytes()).collect())
}

async fn collect(mut records: RecordStream<Chunks>) -> Vec<StreamRecord> {
    let cancel = CancellationToken::new();
    let mut out = Vec::new();
    while let StreamEvent::Record(record) = records.next_event(&cancel).await {
        out.push(record);
    }
    out
}

#[tokio::test]
async fn any_split_point_decodes_the_same_record() {
    let line = "data: {\"type\":\"text_delta\",\"content\":\"Café ☕ 20% off, 今日だけ\"}\n\n";
    let bytes = line.as_bytes();
    let whole = collect(from_chunks(vec![bytes.to_vec()])).await;
    assert_eq!(
        whole,
        vec![StreamRecord::TextDelta {
            content: "Café ☕ 20% off, 今日だけ".into()
        }]
    );

    for split in 1..bytes.len() {
        let parts = vec![bytes[..split].to_vec(), bytes[split..].to_vec()];
        assert_eq!(collect(from_chunks(parts)).await, whole, "split at byte {}", split);
    }

    let byte_per_chunk = bytes.iter().map(|b| vec![*b]).collect();
    assert_eq!(collect(from_chunks(byte_per_chunk)).await, whole);
}

#[tokio::test]
async fn replace_wins_over_delta() {
    let mut conversation = Conversation::new();
    let handle = conversation.begin_turn("Write a greeting", None).unwrap();
    let report = TurnController::drive(
        &mut conversation,
        &handle,
        from_lines(&[
            r#"data: {"type":"text_delta","content":"He"}"#,
            r#"data: {"type":"text_delta","content":"llo"}"#,
            r#"data: {"type":"text_replace","content":"Hello there!"}"#,
        ]),
    )
    .await
    .unwrap();

    assert_eq!(report.outcome.reason, EndReason::StreamClosed);
    assert_eq!(report.outcome.state, TurnState::Complete);
    assert_eq!(conversation.transcript().last().unwrap().content, "Hello there!");
}

#[tokio::test]
async fn noise_between_records_is_skipped() {
    let mut conversation = Conversation::new();
    let handle = conversation.begin_turn("Promo", None).unwrap();
    TurnController::drive(
        &mut conversation,
        &handle,
        from_lines(&[
            r#"data: {"type":"text_delta","content":"Big "}"#,
            ": keep-alive",
            "data: {",
            r#"data: {"response": "cut off"#,
            r#"data: {"type":"text_delta","content":"unterminated""#,
            r#"data: {"content":"no discriminator"}"#,
            r#"data: {"type":"mystery","content":"x"}"#,
            "event: ping",
            "data:    ",
            r#"data: {"type":"text_delta","content":"sale"}"#,
        ]),
    )
    .await
    .unwrap();

    assert_eq!(conversation.transcript().last().unwrap().content, "Big sale");
}

#[tokio::test]
async fn latest_image_survives_null_completion() {
    let mut conversation = Conversation::new();
    let handle = conversation.begin_turn("Draw a poster", None).unwrap();
    let report = TurnController::drive(
        &mut conversation,
        &handle,
        from_lines(&[
            r#"data: {"type":"partial_image","imageUrl":"A","index":0}"#,
            r#"data: {"type":"image_generated","imageUrl":"B"}"#,
            r#"data: {"type":"response_complete","fullText":"Done","imageUrl":null}"#,
        ]),
    )
    .await
    .unwrap();

    let message = conversation.transcript().last().unwrap();
    assert_eq!(message.image_ref, Some(AssetRef::new("B")));
    assert!(!message.image_loading);
    assert_eq!(report.outcome.reason, EndReason::ResponseComplete);
}

#[tokio::test]
async fn second_turn_rejected_while_streaming() {
    let mut conversation = Conversation::new();
    let handle = conversation.begin_turn("first", None).unwrap();
    conversation.handle(
        handle.id,
        StreamEvent::Record(StreamRecord::TextDelta {
            content: "Partial".into(),
        }),
    );

    assert_eq!(
        conversation.begin_turn("second", None).unwrap_err(),
        TurnError::Busy(TurnState::Streaming)
    );
    assert_eq!(conversation.transcript().len(), 2);
}

#[tokio::test]
async fn close_without_terminal_record_still_finalizes() {
    let mut conversation = Conversation::new();
    let handle = conversation.begin_turn("Draw", None).unwrap();
    let report = TurnController::drive(
        &mut conversation,
        &handle,
        from_lines(&[r#"data: {"type":"partial_image","imageUrl":"https://cdn.example/p.png"}"#]),
    )
    .await
    .unwrap();

    assert_eq!(report.outcome.state, TurnState::Complete);
    assert!(!conversation.transcript().last().unwrap().image_loading);
    assert_eq!(conversation.state(), TurnState::Idle);
}

#[tokio::test]
async fn transport_failure_finalizes_as_errored() {
    let chunks: Vec<Result<Vec<u8>, String>> = vec![
        Ok(b"data: {\"type\":\"partial_image\",\"imageUrl\":\"p.png\"}\n\n".to_vec()),
        Err("connection reset by peer".into()),
    ];
    let mut conversation = Conversation::new();
    let handle = conversation.begin_turn("Draw", None).unwrap();
    let report = TurnController::drive(
        &mut conversation,
        &handle,
        RecordStream::new(stream::iter(chunks), ValidationPolicy::default()),
    )
    .await
    .unwrap();

    assert_eq!(report.outcome.state, TurnState::Errored);
    let message = conversation.transcript().last().unwrap();
    assert!(!message.image_loading);
    assert_eq!(message.content, adgen_core::turn::TRANSPORT_ERROR_TEXT);
    assert_eq!(conversation.transcript().len(), 2);
}

#[tokio::test]
async fn empty_image_url_does_not_erase_earlier_image() {
    let mut conversation = Conversation::new();
    let handle = conversation.begin_turn("Draw a poster", None).unwrap();
    let report = TurnController::drive(
        &mut conversation,
        &handle,
        from_lines(&[
            r#"data: {"type":"image_generated","imageUrl":"B"}"#,
            r#"data: {"type":"partial_image","imageUrl":""}"#,
            r#"data: {"type":"response_complete","fullText":"Done","imageUrl":null}"#,
        ]),
    )
    .await
    .unwrap();

    let message = conversation.transcript().last().unwrap();
    assert_eq!(message.image_ref, Some(AssetRef::new("B")));
    assert!(!message.image_loading);
    assert_eq!(
        report
            .side_channel
            .iter()
            .filter_map(|u| u.image.clone())
            .collect::<Vec<_>>(),
        vec![AssetRef::new("B")]
    );
}

#[tokio::test]
async fn error_record_with_null_detail_errors_the_turn() {
    let mut conversation = Conversation::new();
    let handle = conversation.begin_turn("Promo", None).unwrap();
    let report = TurnController::drive(
        &mut conversation,
        &handle,
        from_lines(&[
            r#"data: {"type":"text_delta","content":"partial"}"#,
            r#"data: {"type":"error","error":null}"#,
        ]),
    )
    .await
    .unwrap();

    assert_eq!(report.outcome.state, TurnState::Errored);
    assert_eq!(report.outcome.reason, EndReason::ErrorRecord(String::new()));
    assert_eq!(
        conversation.transcript().last().unwrap().content,
        adgen_core::turn::TRANSPORT_ERROR_TEXT
    );
}
