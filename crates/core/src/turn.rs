//! Turn domain types.
//!
//! A turn is one role-tagged message in a conversation. The canonical history
//! of a session is an ordered `Vec<Turn>`; insertion order is conversation
//! order and is replayed to providers unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The role of a turn's author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The operator at the terminal
    User,
    /// The model
    Assistant,
    /// System instructions
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// A non-primary payload attached to a turn.
///
/// Backends that report tool calls or accept images attach them here instead
/// of through loosely-typed JSON, so every consumer matches each case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Segment {
    /// Additional text beyond the turn's main content
    Text { text: String },
    /// Base64-encoded image data
    Image { media_type: String, data: String },
    /// A tool invocation reported by the model
    ToolCall {
        id: String,
        name: String,
        /// Arguments as a JSON string
        arguments: String,
    },
}

impl Segment {
    /// Characters this segment contributes to a history budget.
    ///
    /// Tool calls are charged by their serialized size. Images are not charged.
    pub fn char_len(&self) -> usize {
        match self {
            Segment::Text { text } => text.chars().count(),
            Segment::Image { .. } => 0,
            Segment::ToolCall { .. } => serde_json::to_string(self)
                .map(|s| s.chars().count())
                .unwrap_or(0),
        }
    }
}

/// A single turn in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Who authored this turn
    pub role: Role,

    /// The text content
    pub content: String,

    /// When the turn was recorded
    pub timestamp: DateTime<Utc>,

    /// Tool calls, images, extra text
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub segments: Vec<Segment>,
}

impl Turn {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            segments: Vec::new(),
        }
    }

    /// Create a new user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a new system turn.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Attach a segment.
    pub fn with_segment(mut self, segment: Segment) -> Self {
        self.segments.push(segment);
        self
    }

    /// Tool calls carried by this turn, in order.
    pub fn tool_calls(&self) -> impl Iterator<Item = &Segment> {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::ToolCall { .. }))
    }

    /// Content length plus segment payload length, in characters.
    pub fn char_len(&self) -> usize {
        self.content.chars().count() + self.segments.iter().map(Segment::char_len).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_turn() {
        let turn = Turn::user("Hello there");
        assert_eq!(turn.role, Role::User);
        assert_eq!(turn.content, "Hello there");
        assert!(turn.segments.is_empty());
    }

    #[test]
    fn char_len_counts_characters_not_bytes() {
        let turn = Turn::user("héllo");
        assert_eq!(turn.char_len(), 5);
    }

    #[test]
    fn tool_call_segments_are_charged_by_serialized_size() {
        let call = Segment::ToolCall {
            id: "call_1".into(),
            name: "shell".into(),
            arguments: r#"{"command":"ls"}"#.into(),
        };
        let expected = serde_json::to_string(&call).unwrap().chars().count();
        let turn = Turn::assistant("ok").with_segment(call);
        assert_eq!(turn.char_len(), 2 + expected);
        assert_eq!(turn.tool_calls().count(), 1);
    }

    #[test]
    fn images_are_not_charged() {
        let turn = Turn::user("look").with_segment(Segment::Image {
            media_type: "image/png".into(),
            data: "iVBORw0KGgo".repeat(100),
        });
        assert_eq!(turn.char_len(), 4);
    }

    #[test]
    fn segments_serialize_with_type_tag() {
        let seg = Segment::Text { text: "hi".into() };
        let json = serde_json::to_value(&seg).unwrap();
        assert_eq!(json["type"], "text");

        let turn = Turn::user("plain");
        let json = serde_json::to_string(&turn).unwrap();
        assert!(!json.contains("segments"));
        assert!(json.contains(r#""role":"user""#));
    }
}
