// src/error.rs
//! Errors raised by the conversation engine
//!
//! Persistence and simulation failures are recovered inside the store and the
//! simulator; these variants exist so the recovery paths can log and report them.

use thiserror::Error;

/// Errors that can occur in conversation operations
#[derive(Debug, Error)]
pub enum ChatError {
    /// An operation referenced a chatroom that does not exist
    #[error("Chatroom not found: {0}")]
    NotFound(String),

    /// Chatroom titles must contain something other than whitespace
    #[error("Chatroom title must not be empty")]
    EmptyTitle,

    /// The durable slot held something we could not decode
    #[error("Persistence decode error: {0}")]
    PersistenceDecode(String),

    /// Unexpected failure inside the response simulator
    #[error("Simulation error: {0}")]
    Simulation(String),

    /// The storage medium rejected a read or write
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ChatError>;
