//! Slack Block Kit message model.
//!
//! Only the subset the relay emits is modelled. Limits below are imposed by
//! the chat platform; builders must chunk or truncate to respect them.

use serde::{Deserialize, Serialize};

/// Maximum number of fields in one section block
pub const MAX_SECTION_FIELDS: usize = 10;
/// Maximum number of elements in one actions block
pub const MAX_ACTION_ELEMENTS: usize = 5;
/// Maximum length of a section's text
pub const MAX_SECTION_TEXT: usize = 3000;
/// Maximum length of a header's text
pub const MAX_HEADER_TEXT: usize = 150;
/// Maximum length of a button label
pub const MAX_BUTTON_TEXT: usize = 75;
/// Maximum number of blocks in one message
pub const MAX_BLOCKS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Header {
        text: Text,
    },
    Section {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<Text>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        fields: Vec<Text>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        accessory: Option<Element>,
    },
    Context {
        elements: Vec<Text>,
    },
    Actions {
        elements: Vec<Element>,
    },
    Divider,
}

impl Block {
    pub fn header(text: &str) -> Self {
        Self::Header {
            text: Text::plain(&truncate_chars(text, MAX_HEADER_TEXT)),
        }
    }

    pub fn section(text: &str) -> Self {
        Self::Section {
            text: Some(Text::mrkdwn(text)),
            fields: Vec::new(),
            accessory: None,
        }
    }

    pub fn section_with_button(text: &str, button: Button) -> Self {
        Self::Section {
            text: Some(Text::mrkdwn(text)),
            fields: Vec::new(),
            accessory: Some(Element::Button(button)),
        }
    }

    pub fn fields(fields: Vec<Text>) -> Self {
        Self::Section {
            text: None,
            fields,
            accessory: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Text {
    PlainText { text: String, emoji: bool },
    Mrkdwn { text: String },
}

impl Text {
    pub fn plain(text: &str) -> Self {
        Self::PlainText {
            text: text.to_string(),
            emoji: true,
        }
    }

    pub fn mrkdwn(text: &str) -> Self {
        Self::Mrkdwn {
            text: text.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Element {
    Button(Button),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonStyle {
    Primary,
    Danger,
}

/// Interactive control identified by `(action_id, value)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub text: Text,
    pub action_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<ButtonStyle>,
}

impl Button {
    pub fn new(label: &str, action_id: &str, value: String) -> Self {
        Self {
            text: Text::plain(&truncate_chars(label, MAX_BUTTON_TEXT)),
            action_id: action_id.to_string(),
            value: Some(value),
            url: None,
            style: None,
        }
    }

    pub fn link(label: &str, action_id: &str, url: String) -> Self {
        Self {
            text: Text::plain(&truncate_chars(label, MAX_BUTTON_TEXT)),
            action_id: action_id.to_string(),
            value: None,
            url: Some(url),
            style: None,
        }
    }

    #[must_use]
    pub fn with_style(mut self, style: ButtonStyle) -> Self {
        self.style = Some(style);
        self
    }
}

/// Escapes the characters Slack mrkdwn treats as control sequences.
pub fn escape_mrkdwn(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Truncates to at most `max` characters, marking the cut with an ellipsis.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max.saturating_sub(1)).collect();
    truncated.push('…');
    truncated
}
