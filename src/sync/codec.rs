//! Wire format of the chat channel.
//!
//! Outbound frames carry only `{"message": ...}`; the server stamps identity
//! and ordering fields on the broadcast copy. Inbound frames accept every
//! field spelling the server has used over time.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::common::{ChatError, MessageEnvelope, SentAt};

#[derive(Serialize)]
struct OutboundFrame<'a> {
    message: &'a str,
}

/// Bản broadcast đầy đủ mà server gửi xuống client.
#[derive(Serialize)]
struct WireEnvelope<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sender_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sender_username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<&'a str>,
}

pub fn encode(body: &str) -> Result<String, ChatError> {
    serde_json::to_string(&OutboundFrame { message: body })
        .map_err(|err| ChatError::MalformedPayload(err.to_string()))
}

/// Server-side encoding of a stamped envelope.
pub fn encode_envelope(envelope: &MessageEnvelope) -> Result<String, ChatError> {
    let wire = WireEnvelope {
        message: &envelope.body,
        sender_id: envelope.sender_id,
        sender_username: envelope.sender_display_name.as_deref(),
        timestamp: envelope.sent_at.as_ref().map(|token| token.0.as_str()),
    };
    serde_json::to_string(&wire).map_err(|err| ChatError::MalformedPayload(err.to_string()))
}

pub fn decode(bytes: &[u8]) -> Result<MessageEnvelope, ChatError> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|err| ChatError::MalformedPayload(err.to_string()))?;
    let Value::Object(fields) = value else {
        return Err(ChatError::MalformedPayload(
            "payload is not a JSON object".to_string(),
        ));
    };

    let body = match fields.get("message") {
        Some(Value::String(body)) if !body.trim().is_empty() => body.clone(),
        Some(Value::String(_)) => {
            return Err(ChatError::MalformedPayload("empty message".to_string()));
        }
        Some(_) => {
            return Err(ChatError::MalformedPayload(
                "`message` is not a string".to_string(),
            ));
        }
        None => {
            return Err(ChatError::MalformedPayload(
                "missing `message` field".to_string(),
            ));
        }
    };

    Ok(MessageEnvelope {
        body,
        sender_id: first_usable(&fields, &["sender_id", "sender"], as_user_id),
        sender_display_name: first_usable(
            &fields,
            &["sender_display_name", "sender_username"],
            |value| value.as_str().map(str::to_string),
        ),
        sent_at: first_usable(&fields, &["timestamp", "sentAt"], as_token),
    })
}

/// Phía server chỉ cần lấy nội dung `message` từ frame client gửi lên.
pub fn decode_outbound(bytes: &[u8]) -> Result<String, ChatError> {
    decode(bytes).map(|envelope| envelope.body)
}

/// First alias whose value converts; unusable values fall through to the next.
fn first_usable<T>(
    fields: &Map<String, Value>,
    keys: &[&str],
    convert: impl Fn(&Value) -> Option<T>,
) -> Option<T> {
    keys.iter()
        .filter_map(|key| fields.get(*key))
        .find_map(convert)
}

fn as_user_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn as_token(value: &Value) -> Option<SentAt> {
    match value {
        Value::String(text) if !text.is_empty() => Some(SentAt(text.clone())),
        Value::Number(number) => Some(SentAt(number.to_string())),
        _ => None,
    }
}
