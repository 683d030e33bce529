//! Bot API JSON shapes.
//!
//! Only the fields the firmware reads are modelled; serde ignores the rest.

use serde::{Deserialize, Serialize};

use crate::app::ports::{InboundMessage, MessagingError};

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: u64,
    pub message: Option<Message>,
    pub channel_post: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub text: Option<String>,
    pub from: Option<User>,
    pub chat: Option<Chat>,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub username: Option<String>,
    pub first_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// `sendMessage` request body.
#[derive(Debug, Serialize)]
pub struct SendMessage<'a> {
    pub chat_id: &'a str,
    pub text: &'a str,
}

/// Whether a (possibly truncated) response body acknowledges the request.
pub fn is_acknowledged(raw: &[u8]) -> bool {
    contains(raw, b"\"ok\":true") || contains(raw, b"\"ok\": true")
}

fn contains(hay: &[u8], needle: &[u8]) -> bool {
    hay.windows(needle.len()).any(|w| w == needle)
}

/// Decode a `getUpdates` body into at most one message.
///
/// Updates from any chat other than `chat_id` are still returned (so the
/// offset advances) but with their text removed, so they never dispatch.
/// `chat_id` is compared against the numeric id in the update, which is
/// why `FirmwareConfig::validate` refuses `@name` handles.
pub fn parse_updates(json: &[u8], chat_id: &str) -> Result<Option<InboundMessage>, MessagingError> {
    let resp: ApiResponse<Vec<Update>> =
        serde_json::from_slice(json).map_err(|_| MessagingError::Malformed)?;
    if !resp.ok {
        log::warn!(
            "getUpdates refused: {}",
            resp.description.as_deref().unwrap_or("?")
        );
        return Err(MessagingError::NotAcknowledged);
    }

    let Some(update) = resp.result.and_then(|r| r.into_iter().next()) else {
        return Ok(None);
    };
    let Some(msg) = update.message.or(update.channel_post) else {
        return Ok(Some(InboundMessage {
            sequence: update.update_id,
            text: None,
            sender: None,
        }));
    };

    let sender = msg.from.and_then(|u| u.username.or(u.first_name));
    let authorised = msg
        .chat
        .as_ref()
        .is_some_and(|c| c.id.to_string() == chat_id);
    let text = if authorised {
        msg.text
    } else {
        log::warn!(
            "update {} from foreign chat {:?} ignored",
            update.update_id,
            msg.chat.map(|c| c.id)
        );
        None
    };

    Ok(Some(InboundMessage {
        sequence: update.update_id,
        text,
        sender,
    }))
}
