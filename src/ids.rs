// src/ids.rs
//! Identifier allocation for chatrooms, messages and users
//!
//! Identifiers only need to be unique for the lifetime of a single-user client,
//! so a random v4 UUID is plenty. Tests can swap in a sequential generator.

use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Source of process-unique string identifiers
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Default generator backed by random v4 UUIDs (simple form, no hyphens)
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

/// Deterministic generator producing `<prefix>-1`, `<prefix>-2`, ...
#[derive(Debug)]
pub struct SequentialGenerator {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialGenerator {
    pub fn new(prefix: &str) -> Self {
        SequentialGenerator {
            prefix: prefix.to_string(),
            counter: AtomicU64::new(0),
        }
    }
}

impl IdGenerator for SequentialGenerator {
    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{}", self.prefix, n)
    }
}

/// Generate an identifier with the default generator
pub fn generate_id() -> String {
    UuidGenerator.next_id()
}
