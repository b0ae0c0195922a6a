//! Side-channel state: application slots that records update outside the
//! transcript (draft outbound text, suggested title, current image, ...).
//!
//! The router never touches this state directly. It returns
//! [`SideChannelUpdate`] values and whoever owns a [`SideChannelState`]
//! applies them.

use crate::state::AssetRef;
use crate::stream::SideChannelPayload;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Template gallery entry produced when a completed response carries both an
/// image and template metadata. Missing fields fall back to the current
/// state when applied.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateDraft {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_ref: AssetRef,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedTemplate {
    pub id: String,
    pub title: String,
    pub description: String,
    pub image_ref: AssetRef,
    pub created_at: DateTime<Utc>,
}

/// Fields to overwrite. `None` leaves the slot alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SideChannelUpdate {
    pub draft_text: Option<String>,
    pub title: Option<String>,
    pub quick_actions: Option<serde_json::Value>,
    pub recommendation: Option<serde_json::Value>,
    pub image: Option<AssetRef>,
    pub template: Option<TemplateDraft>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl SideChannelUpdate {
    pub fn image(image_ref: AssetRef) -> Self {
        Self {
            image: Some(image_ref),
            ..Default::default()
        }
    }

    /// Normalize a wire payload. Empty strings count as absent, and
    /// `conciseTitle` takes precedence over `templateData.title`.
    pub fn from_payload(payload: SideChannelPayload) -> Self {
        let template_title = payload
            .template_data
            .as_ref()
            .and_then(|t| non_empty(t.title.clone()));
        Self {
            draft_text: non_empty(payload.sms_text_content),
            title: non_empty(payload.concise_title).or(template_title),
            quick_actions: payload.quick_action_buttons.filter(|v| !v.is_null()),
            recommendation: payload.structured_recommendation.filter(|v| !v.is_null()),
            image: None,
            template: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Last-write-wins slots owned by the caller of a turn.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SideChannelState {
    pub draft_text: String,
    pub title: String,
    pub quick_actions: Option<serde_json::Value>,
    pub recommendation: Option<serde_json::Value>,
    pub image: Option<AssetRef>,
    /// Newest first
    pub templates: Vec<GeneratedTemplate>,
}

impl SideChannelState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, update: SideChannelUpdate) {
        // Missing title falls back to the current one; missing description to
        // this update's draft text, then the current draft.
        if let Some(draft) = update.template {
            let title = non_empty(draft.title).unwrap_or_else(|| self.title.clone());
            let description = non_empty(draft.description)
                .or_else(|| update.draft_text.clone())
                .unwrap_or_else(|| self.draft_text.clone());
            self.templates.insert(
                0,
                GeneratedTemplate {
                    id: uuid::Uuid::new_v4().to_string(),
                    title,
                    description,
                    image_ref: draft.image_ref,
                    created_at: Utc::now(),
                },
            );
        }
        if let Some(text) = update.draft_text {
            self.draft_text = text;
        }
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(actions) = update.quick_actions {
            self.quick_actions = Some(actions);
        }
        if let Some(recommendation) = update.recommendation {
            self.recommendation = Some(recommendation);
        }
        if let Some(image) = update.image {
            self.image = Some(image);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::TemplateData;
    use serde_json::json;

    #[test]
    fn concise_title_beats_template_title() {
        let update = SideChannelUpdate::from_payload(SideChannelPayload {
            concise_title: Some("Short".into()),
            template_data: Some(TemplateData {
                title: Some("Long template title".into()),
                description: None,
            }),
            ..Default::default()
        });
        assert_eq!(update.title.as_deref(), Some("Short"));

        let update = SideChannelUpdate::from_payload(SideChannelPayload {
            concise_title: Some(String::new()),
            template_data: Some(TemplateData {
                title: Some("Template".into()),
                description: None,
            }),
            ..Default::default()
        });
        assert_eq!(update.title.as_deref(), Some("Template"));
    }

    #[test]
    fn absent_fields_are_left_untouched() {
        let mut state = SideChannelState::new();
        state.apply(SideChannelUpdate {
            draft_text: Some("first draft".into()),
            title: Some("Cafe promo".into()),
            ..Default::default()
        });
        state.apply(SideChannelUpdate::from_payload(SideChannelPayload {
            sms_text_content: Some(String::new()),
            quick_action_buttons: Some(json!([{"label": "Send"}])),
            ..Default::default()
        }));
        assert_eq!(state.draft_text, "first draft");
        assert_eq!(state.title, "Cafe promo");
        assert_eq!(state.quick_actions, Some(json!([{"label": "Send"}])));
    }

    #[test]
    fn last_write_wins() {
        let mut state = SideChannelState::new();
        state.apply(SideChannelUpdate::image(AssetRef::new("a.png")));
        state.apply(SideChannelUpdate {
            draft_text: Some("one".into()),
            ..Default::default()
        });
        state.apply(SideChannelUpdate {
            draft_text: Some("two".into()),
            image: Some(AssetRef::new("b.png")),
            ..Default::default()
        });
        assert_eq!(state.draft_text, "two");
        assert_eq!(state.image, Some(AssetRef::new("b.png")));
    }

    #[test]
    fn templates_fall_back_to_current_state() {
        let mut state = SideChannelState::new();
        state.title = "Spring sale".into();
        state.draft_text = "old draft".into();

        state.apply(SideChannelUpdate {
            draft_text: Some("new draft".into()),
            template: Some(TemplateDraft {
                title: None,
                description: None,
                image_ref: AssetRef::new("one.png"),
            }),
            ..Default::default()
        });
        state.apply(SideChannelUpdate {
            template: Some(TemplateDraft {
                title: Some("Grand opening".into()),
                description: Some("Free coffee".into()),
                image_ref: AssetRef::new("two.png"),
            }),
            ..Default::default()
        });

        assert_eq!(state.templates.len(), 2);
        assert_eq!(state.templates[0].title, "Grand opening");
        assert_eq!(state.templates[0].description, "Free coffee");
        assert_eq!(state.templates[1].title, "Spring sale");
        assert_eq!(state.templates[1].description, "new draft");
    }

    #[test]
    fn only_empty_strings_count_as_absent() {
        let mut state = SideChannelState::new();
        state.draft_text = "old draft".into();
        state.apply(SideChannelUpdate::from_payload(SideChannelPayload {
            sms_text_content: Some(" ".into()),
            concise_title: Some("  ".into()),
            ..Default::default()
        }));
        assert_eq!(state.draft_text, " ");
        assert_eq!(state.title, "  ");
    }
}
