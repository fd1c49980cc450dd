use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use std::path::Path;

use crate::ids::generate_id;

/// The logged-in user. Created once at login and never changed.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub phone_number: String,
    pub country_code: String, // Dial code, e.g. "+91"
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(phone_number: &str, country_code: &str) -> Self {
        User {
            id: generate_id(),
            phone_number: phone_number.to_string(),
            country_code: country_code.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// A single utterance in a chatroom. Immutable once appended.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub content: String,
    pub is_user: bool,
    pub timestamp: DateTime<Utc>,
    pub image: Option<String>, // Opaque encoded blob (data URL)
}

/// Everything a caller supplies for a message; the store assigns the id
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub content: String,
    pub is_user: bool,
    pub timestamp: DateTime<Utc>,
    pub image: Option<String>,
}

impl NewMessage {
    /// A message typed by the user, stamped now
    pub fn from_user(content: &str) -> Self {
        NewMessage {
            content: content.to_string(),
            is_user: true,
            timestamp: Utc::now(),
            image: None,
        }
    }

    /// A message produced by the assistant, stamped now
    pub fn from_assistant(content: &str) -> Self {
        NewMessage {
            content: content.to_string(),
            is_user: false,
            timestamp: Utc::now(),
            image: None,
        }
    }

    pub fn with_image(mut self, image: String) -> Self {
        self.image = Some(image);
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub(crate) fn into_message(self, id: String) -> Message {
        Message {
            id,
            content: self.content,
            is_user: self.is_user,
            timestamp: self.timestamp,
            image: self.image,
        }
    }
}

/// A named conversation. Messages are kept in insertion order, which is the
/// chronological order; `last_message`/`last_message_time` mirror the final entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Chatroom {
    pub id: String,
    pub title: String,
    pub last_message: Option<String>,
    pub last_message_time: Option<DateTime<Utc>>,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
}

impl Chatroom {
    pub fn new(id: String, title: &str, created_at: DateTime<Utc>) -> Self {
        Chatroom {
            id,
            title: title.to_string(),
            last_message: None,
            last_message_time: None,
            messages: Vec::new(),
            created_at,
        }
    }

    /// Append a message and refresh the last-message cache
    pub(crate) fn push(&mut self, message: Message) {
        self.last_message = Some(message.content.clone());
        self.last_message_time = Some(message.timestamp);
        self.messages.push(message);
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// Full state held by the conversation store
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatState {
    pub chatrooms: Vec<Chatroom>, // Newest-created first
    pub current_chatroom_id: Option<String>,
    pub is_typing: bool,
    pub search_query: String,
}

impl ChatState {
    pub fn chatroom(&self, id: &str) -> Option<&Chatroom> {
        self.chatrooms.iter().find(|room| room.id == id)
    }

    pub(crate) fn chatroom_mut(&mut self, id: &str) -> Option<&mut Chatroom> {
        self.chatrooms.iter_mut().find(|room| room.id == id)
    }
}

/// Encode raw image bytes as a `data:` URL, the form stored on a message
pub fn encode_image(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, BASE64.encode(bytes))
}

/// Best-effort MIME type from a file extension
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
