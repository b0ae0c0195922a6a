//! Typed stream records and the structural pre-checks that guard parsing

use crate::state::AssetRef;
use serde::Deserialize;

/// Key every record must carry; used as a cheap pre-check before parsing.
const DISCRIMINATOR_KEY: &str = "\"type\"";

/// One decoded unit of the generation protocol, tagged by its `type` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamRecord {
    TextDelta {
        content: String,
    },
    TextReplace {
        content: String,
        #[serde(flatten)]
        side_channel: SideChannelPayload,
    },
    PartialImage {
        #[serde(default, rename = "imageUrl")]
        image_ref: Option<AssetRef>,
        #[serde(default)]
        index: Option<u32>,
    },
    ImageGenerated {
        #[serde(default, rename = "imageUrl")]
        image_ref: Option<AssetRef>,
    },
    ResponseComplete {
        #[serde(rename = "fullText")]
        full_text: String,
        #[serde(default, rename = "imageUrl")]
        image_ref: Option<AssetRef>,
        #[serde(default, rename = "isQuestion")]
        is_question: Option<bool>,
        #[serde(flatten)]
        side_channel: SideChannelPayload,
    },
    Error {
        #[serde(default, rename = "error")]
        message: Option<String>,
    },
}

impl StreamRecord {
    /// Wire name of the discriminator, for logs
    pub fn kind(&self) -> &'static str {
        match self {
            StreamRecord::TextDelta { .. } => "text_delta",
            StreamRecord::TextReplace { .. } => "text_replace",
            StreamRecord::PartialImage { .. } => "partial_image",
            StreamRecord::ImageGenerated { .. } => "image_generated",
            StreamRecord::ResponseComplete { .. } => "response_complete",
            StreamRecord::Error { .. } => "error",
        }
    }
}

/// Side-channel fields that ride along on `text_replace` and
/// `response_complete`. Everything is optional; absent means "leave alone".
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SideChannelPayload {
    #[serde(default)]
    pub sms_text_content: Option<String>,
    #[serde(default)]
    pub concise_title: Option<String>,
    #[serde(default)]
    pub template_data: Option<TemplateData>,
    #[serde(default)]
    pub quick_action_buttons: Option<serde_json::Value>,
    #[serde(default)]
    pub structured_recommendation: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TemplateData {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Why a candidate payload was dropped. Never fatal to the stream.
#[derive(Debug, thiserror::Error)]
pub enum Discard {
    #[error("payload shorter than {min} bytes")]
    TooShort { min: usize },

    #[error("lone opening brace")]
    LoneBrace,

    #[error("truncated payload starting with {prefix:?}")]
    Truncated { prefix: String },

    #[error("payload does not end with a closing brace")]
    Unterminated,

    #[error("payload has no type discriminator")]
    MissingDiscriminator,

    #[error("malformed record: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Thresholds for the structural pre-checks.
///
/// Upstream fragmentation produces payloads that are syntactically incomplete;
/// rejecting them before `serde_json` sees them keeps the hot path free of
/// parse errors for the common garbage shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPolicy {
    pub min_len: usize,
    pub truncated_prefixes: Vec<String>,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            min_len: 10,
            truncated_prefixes: vec!["{\"response".to_string(), "{ \"response".to_string()],
        }
    }
}

impl ValidationPolicy {
    pub fn check(&self, payload: &str) -> Result<(), Discard> {
        if payload.len() < self.min_len {
            return Err(Discard::TooShort { min: self.min_len });
        }
        if payload == "{" {
            return Err(Discard::LoneBrace);
        }
        if let Some(prefix) = self
            .truncated_prefixes
            .iter()
            .find(|prefix| payload.starts_with(prefix.as_str()))
        {
            return Err(Discard::Truncated {
                prefix: prefix.clone(),
            });
        }
        if !payload.ends_with('}') {
            return Err(Discard::Unterminated);
        }
        if !payload.contains(DISCRIMINATOR_KEY) {
            return Err(Discard::MissingDiscriminator);
        }
        Ok(())
    }

    /// Pre-check, then parse. Unknown discriminators surface as `Malformed`.
    pub fn parse(&self, payload: &str) -> Result<StreamRecord, Discard> {
        self.check(payload)?;
        Ok(serde_json::from_str(payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(payload: &str) -> Result<StreamRecord, Discard> {
        ValidationPolicy::default().parse(payload)
    }

    #[test]
    fn parses_every_variant() {
        assert_eq!(
            parse(r#"{"type":"text_delta","content":"He"}"#).unwrap(),
            StreamRecord::TextDelta { content: "He".into() }
        );
        assert_eq!(
            parse(r#"{"type":"partial_image","imageUrl":"a.png","index":1}"#).unwrap(),
            StreamRecord::PartialImage {
                image_ref: Some(AssetRef::new("a.png")),
                index: Some(1),
            }
        );
        assert_eq!(
            parse(r#"{"type":"image_generated","imageUrl":"b.png"}"#).unwrap(),
            StreamRecord::ImageGenerated {
                image_ref: Some(AssetRef::new("b.png"))
            }
        );
        assert_eq!(
            parse(r#"{"type":"error","error":"quota exceeded"}"#).unwrap(),
            StreamRecord::Error {
                message: Some("quota exceeded".into())
            }
        );
    }

    #[test]
    fn null_fields_still_parse() {
        assert_eq!(
            parse(r#"{"type":"error","error":null}"#).unwrap(),
            StreamRecord::Error { message: None }
        );
        assert_eq!(
            parse(r#"{"type":"error","code":500}"#).unwrap(),
            StreamRecord::Error { message: None }
        );
        assert_eq!(
            parse(r#"{"type":"partial_image","imageUrl":null}"#).unwrap(),
            StreamRecord::PartialImage {
                image_ref: None,
                index: None,
            }
        );
    }

    #[test]
    fn side_channel_fields_are_flattened() {
        let record = parse(
            r#"{"type":"text_replace","content":"Hi","smsTextContent":"20% off","templateData":{"title":"Cafe"}}"#,
        )
        .unwrap();
        assert_eq!(
            record,
            StreamRecord::TextReplace {
                content: "Hi".into(),
                side_channel: SideChannelPayload {
                    sms_text_content: Some("20% off".into()),
                    template_data: Some(TemplateData {
                        title: Some("Cafe".into()),
                        description: None,
                    }),
                    ..Default::default()
                },
            }
        );
    }

    #[test]
    fn response_complete_accepts_null_image_and_template() {
        let record = parse(
            r#"{"type":"response_complete","fullText":"Done","imageUrl":null,"templateData":null,"smsTextContent":""}"#,
        )
        .unwrap();
        match record {
            StreamRecord::ResponseComplete {
                full_text,
                image_ref,
                is_question,
                side_channel,
            } => {
                assert_eq!(full_text, "Done");
                assert_eq!(image_ref, None);
                assert_eq!(is_question, None);
                assert_eq!(side_channel.template_data, None);
                assert_eq!(side_channel.sms_text_content.as_deref(), Some(""));
            }
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn prechecks_reject_fragments_without_parsing() {
        assert!(matches!(parse(r#"{"a":1}"#), Err(Discard::TooShort { .. })));
        assert!(matches!(
            ValidationPolicy { min_len: 0, truncated_prefixes: vec![] }.parse("{"),
            Err(Discard::LoneBrace)
        ));
        assert!(matches!(
            parse(r#"{"response": "partial", "type":"x"}"#),
            Err(Discard::Truncated { .. })
        ));
        assert!(matches!(
            parse(r#"{ "response": "partial", "type":"x"}"#),
            Err(Discard::Truncated { .. })
        ));
        assert!(matches!(
            parse(r#"{"type":"text_delta","content":"cut"#),
            Err(Discard::Unterminated)
        ));
        assert!(matches!(
            parse(r#"{"kind":"text_delta","content":"x"}"#),
            Err(Discard::MissingDiscriminator)
        ));
    }

    #[test]
    fn parse_failures_are_discards() {
        assert!(matches!(
            parse(r#"{"type":"heartbeat","at":12345}"#),
            Err(Discard::Malformed(_))
        ));
        assert!(matches!(
            parse(r#"{"type":"text_delta"}"#),
            Err(Discard::Malformed(_))
        ));
        assert!(matches!(
            parse(r#"{"type":"text_delta","content":"a" "b"}"#),
            Err(Discard::Malformed(_))
        ));
    }
}
