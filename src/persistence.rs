// src/persistence.rs
//! Persistence codec for the conversation store
//!
//! State is written as JSON inside a small versioned envelope. Timestamps are
//! stored as RFC 3339 strings and turned back into `DateTime<Utc>` values while
//! rehydrating, so the store never sees an encoded date.

use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ChatError, Result};
use crate::models::{ChatState, Chatroom, Message};

/// Current layout version written into the envelope
pub const STORAGE_VERSION: u32 = 0;

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    state: T,
    #[serde(default)]
    version: u32,
}

#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct StateRecord {
    #[serde(default)]
    chatrooms: Vec<ChatroomRecord>,
    #[serde(default)]
    current_chatroom: Option<String>,
    #[serde(default)]
    is_typing: bool,
    #[serde(default)]
    search_query: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatroomRecord {
    id: String,
    title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_message_time: Option<String>,
    #[serde(default)]
    messages: Vec<MessageRecord>,
    created_at: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageRecord {
    id: String,
    content: String,
    is_user: bool,
    timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image: Option<String>,
}

/// Format a timestamp the way it is stored on disk
pub fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parse a stored timestamp back into a wall-clock value
pub fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| ChatError::PersistenceDecode(format!("bad timestamp '{}': {}", raw, e)))
}

impl From<&Message> for MessageRecord {
    fn from(message: &Message) -> Self {
        MessageRecord {
            id: message.id.clone(),
            content: message.content.clone(),
            is_user: message.is_user,
            timestamp: encode_timestamp(&message.timestamp),
            image: message.image.clone(),
        }
    }
}

impl From<&Chatroom> for ChatroomRecord {
    fn from(room: &Chatroom) -> Self {
        ChatroomRecord {
            id: room.id.clone(),
            title: room.title.clone(),
            last_message: room.last_message.clone(),
            last_message_time: room.last_message_time.as_ref().map(encode_timestamp),
            messages: room.messages.iter().map(MessageRecord::from).collect(),
            created_at: encode_timestamp(&room.created_at),
        }
    }
}

impl MessageRecord {
    fn rehydrate(self) -> Result<Message> {
        Ok(Message {
            timestamp: decode_timestamp(&self.timestamp)?,
            id: self.id,
            content: self.content,
            is_user: self.is_user,
            image: self.image,
        })
    }
}

impl ChatroomRecord {
    fn rehydrate(self) -> Result<Chatroom> {
        let last_message_time = match self.last_message_time {
            Some(raw) => Some(decode_timestamp(&raw)?),
            None => None,
        };
        let messages = self
            .messages
            .into_iter()
            .map(MessageRecord::rehydrate)
            .collect::<Result<Vec<_>>>()?;

        Ok(Chatroom {
            id: self.id,
            title: self.title,
            last_message: self.last_message,
            last_message_time,
            messages,
            created_at: decode_timestamp(&self.created_at)?,
        })
    }
}

/// Wrap a slot record in the versioned envelope shared by every slot
pub(crate) fn encode_slot<T: Serialize>(state: &T) -> Result<String> {
    Ok(serde_json::to_string(&Envelope { state, version: STORAGE_VERSION })?)
}

/// Unwrap a slot record, rejecting layouts newer than this build understands
pub(crate) fn decode_slot<T: DeserializeOwned>(encoded: &str) -> Result<T> {
    let envelope: Envelope<T> = serde_json::from_str(encoded)
        .map_err(|e| ChatError::PersistenceDecode(e.to_string()))?;

    if envelope.version > STORAGE_VERSION {
        return Err(ChatError::PersistenceDecode(format!(
            "unsupported storage version {}",
            envelope.version
        )));
    }
    Ok(envelope.state)
}

/// Encode the full store state for the chat slot
pub fn serialize(state: &ChatState) -> Result<String> {
    encode_slot(&StateRecord {
        chatrooms: state.chatrooms.iter().map(ChatroomRecord::from).collect(),
        current_chatroom: state.current_chatroom_id.clone(),
        is_typing: state.is_typing,
        search_query: state.search_query.clone(),
    })
}

/// Decode the chat slot, restoring every timestamp to a date value
pub fn deserialize(encoded: &str) -> Result<ChatState> {
    let record: StateRecord = decode_slot(encoded)?;
    let chatrooms = record
        .chatrooms
        .into_iter()
        .map(ChatroomRecord::rehydrate)
        .collect::<Result<Vec<_>>>()?;

    debug!("Decoded {} chatrooms from storage", chatrooms.len());

    Ok(ChatState {
        chatrooms,
        current_chatroom_id: record.current_chatroom,
        is_typing: record.is_typing,
        search_query: record.search_query,
    })
}

/// Fail-soft rehydration: a missing or unreadable slot yields an empty state
pub fn rehydrate(encoded: Option<&str>) -> ChatState {
    match encoded {
        None => ChatState::default(),
        Some(raw) => match deserialize(raw) {
            Ok(state) => state,
            Err(e) => {
                warn!("Discarding stored chat state: {}", e);
                ChatState::default()
            }
        },
    }
}
