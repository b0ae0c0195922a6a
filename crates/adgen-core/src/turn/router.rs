//! Applies one record to the open turn's placeholder message.

use super::side_channel::{SideChannelUpdate, TemplateDraft};
use super::TurnState;
use crate::state::{AssetRef, ChatMessage};
use crate::stream::StreamRecord;

/// Shown when the transport fails or an error record carries no detail
pub const TRANSPORT_ERROR_TEXT: &str = "Sorry, something went wrong. Please try again.";

pub(crate) fn render_error(detail: &str) -> String {
    let detail = detail.trim();
    if detail.is_empty() {
        TRANSPORT_ERROR_TEXT.to_string()
    } else {
        format!("Sorry, something went wrong: {}", detail)
    }
}

/// Result of routing one record
#[derive(Debug)]
pub(crate) struct Routed {
    pub state: TurnState,
    pub side_channel: Option<SideChannelUpdate>,
}

/// Leave `awaiting_first_token` on the first content-bearing record.
fn streaming(state: TurnState) -> TurnState {
    match state {
        TurnState::AwaitingFirstToken => TurnState::Streaming,
        other => other,
    }
}

/// Empty or null references never replace an earlier image.
fn set_image(
    message: &mut ChatMessage,
    image_ref: Option<AssetRef>,
) -> Option<SideChannelUpdate> {
    let image_ref = image_ref.filter(|r| !r.is_empty())?;
    message.image_ref = Some(image_ref.clone());
    Some(SideChannelUpdate::image(image_ref))
}

pub(crate) fn route(record: StreamRecord, message: &mut ChatMessage, state: TurnState) -> Routed {
    match record {
        StreamRecord::TextDelta { content } => {
            message.content.push_str(&content);
            Routed {
                state: streaming(state),
                side_channel: None,
            }
        }
        StreamRecord::TextReplace {
            content,
            side_channel,
        } => {
            message.content = content;
            let update = SideChannelUpdate::from_payload(side_channel);
            Routed {
                state: TurnState::Finalizing,
                side_channel: (!update.is_empty()).then_some(update),
            }
        }
        StreamRecord::PartialImage { image_ref, .. } => {
            message.image_loading = true;
            Routed {
                state: streaming(state),
                side_channel: set_image(message, image_ref),
            }
        }
        StreamRecord::ImageGenerated { image_ref } => {
            message.image_loading = false;
            Routed {
                state: streaming(state),
                side_channel: set_image(message, image_ref),
            }
        }
        StreamRecord::ResponseComplete {
            full_text,
            image_ref,
            is_question,
            side_channel,
        } => {
            let template_data = side_channel.template_data.clone();
            let mut update = SideChannelUpdate::from_payload(side_channel);

            message.content = full_text;
            message.image_loading = false;
            if is_question == Some(true) {
                message.is_question = true;
            }
            // A null image keeps whatever an earlier image record set.
            if let Some(image_ref) = image_ref.filter(|r| !r.is_empty()) {
                message.image_ref = Some(image_ref.clone());
                update.template = template_data.map(|t| TemplateDraft {
                    title: t.title,
                    description: t.description,
                    image_ref: image_ref.clone(),
                });
                update.image = Some(image_ref);
            }

            Routed {
                state: TurnState::Complete,
                side_channel: (!update.is_empty()).then_some(update),
            }
        }
        StreamRecord::Error { message: detail } => {
            message.content = render_error(detail.as_deref().unwrap_or_default());
            message.image_loading = false;
            Routed {
                state: TurnState::Errored,
                side_channel: None,
            }
        }
    }
}
