use crate::core::model::{SpanKind, TextSpan};
use serde::Deserialize;

/// Envelope every Bot API method answers with.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(default)]
    pub result: Option<T>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageEntity {
    pub offset: usize,
    pub length: usize,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub url: Option<String>,
}

impl MessageEntity {
    pub fn to_span(&self) -> TextSpan {
        let kind = match self.kind.as_str() {
            "url" => SpanKind::Url,
            "text_link" => SpanKind::TextLink,
            _ => SpanKind::Other,
        };
        TextSpan {
            offset: self.offset,
            length: self.length,
            kind,
            url: self.url.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub entities: Vec<MessageEntity>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub caption_entities: Vec<MessageEntity>,
    #[serde(default)]
    pub photo: Vec<PhotoSize>,
}

impl Message {
    /// The annotated text of the message: the caption when the message
    /// carries a photo, the plain text otherwise.
    pub fn content(&self) -> Option<(&str, &[MessageEntity])> {
        if !self.photo.is_empty() {
            self.caption
                .as_deref()
                .map(|text| (text, self.caption_entities.as_slice()))
        } else {
            self.text
                .as_deref()
                .map(|text| (text, self.entities.as_slice()))
        }
    }
}
