use serde::Deserialize;
use serde_json::Value;
use url::form_urlencoded;

use crate::actions::ActionRequest;
use crate::error::Result;
use crate::pipeline::MessageRef;

// -- Slack interaction payload shapes --

#[derive(Deserialize)]
struct InteractionPayload {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    actions: Vec<InteractionAction>,
    container: Option<Container>,
    message: Option<InteractionMessage>,
}

#[derive(Deserialize)]
struct InteractionAction {
    action_id: String,
    #[serde(default)]
    value: String,
}

#[derive(Deserialize)]
struct Container {
    channel_id: Option<String>,
}

#[derive(Deserialize)]
struct InteractionMessage {
    ts: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    blocks: Vec<Value>,
}

/// Decodes a Slack `block_actions` interaction payload.
///
/// Returns `Ok(None)` for other interaction types, for payloads without an
/// activated control, and for clicks that did not come from a message.
///
/// Accepts either the bare JSON payload or the form-encoded request body
/// Slack actually posts (`payload=<urlencoded json>`).
///
/// # Errors
///
/// Returns an error when the payload is not valid JSON of the expected shape.
pub fn decode_interaction(body: &str) -> Result<Option<ActionRequest>> {
    let body = body.trim();
    let payload: InteractionPayload = if body.starts_with("payload=") {
        let json = form_urlencoded::parse(body.as_bytes())
            .find(|(key, _)| key == "payload")
            .map(|(_, value)| value.into_owned())
            .unwrap_or_default();
        serde_json::from_str(&json)?
    } else {
        serde_json::from_str(body)?
    };
    if payload.kind != "block_actions" {
        return Ok(None);
    }

    let Some(action) = payload.actions.into_iter().next() else {
        return Ok(None);
    };
    let Some(message) = payload.message else {
        return Ok(None);
    };
    let Some(channel) = payload.container.and_then(|container| container.channel_id) else {
        return Ok(None);
    };

    Ok(Some(ActionRequest {
        action_id: action.action_id,
        value: action.value,
        message_ref: MessageRef {
            channel,
            ts: message.ts,
        },
        blocks: message.blocks,
        text: message.text,
    }))
}
