// src/simulator.rs
//! Simulated assistant replies
//!
//! Stands in for a remote model: show the typing indicator, wait, post a canned
//! reply, and now and then post a follow-up question after a second round of typing.
//!
//! Each run is a tokio task. The task never keeps a chatroom across a sleep; it
//! appends through the store when it wakes, and if the chatroom was deleted in the
//! meantime the reply is dropped. The typing indicator is reference counted so
//! overlapping runs in different chatrooms don't clear each other's indicator.

use log::{debug, error, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::error::{ChatError, Result};
use crate::models::NewMessage;
use crate::notify::{Notice, Notifier};
use crate::store::ChatStore;

pub const DEFAULT_TYPING_DELAY: Duration = Duration::from_millis(1500);
pub const DEFAULT_FOLLOW_UP_PAUSE: Duration = Duration::from_millis(1000);
pub const DEFAULT_FOLLOW_UP_PROBABILITY: f64 = 0.3;

pub const FOLLOW_UP_TEXT: &str =
    "Is there anything specific you'd like me to elaborate on or any follow-up questions you have?";

pub const DEFAULT_REPLIES: [&str; 10] = [
    "I understand your question. Let me help you with that.",
    "That's an interesting point. Here's what I think about it...",
    "Based on the information you've provided, I can suggest the following approach:",
    "Great question! Let me break this down for you step by step.",
    "I see what you're asking. Here's a detailed explanation:",
    "That's a complex topic. Let me provide you with a comprehensive answer.",
    "Thanks for sharing that. Here's my perspective on the matter:",
    "I'd be happy to help you understand this better. Let me explain:",
    "That's a good observation. Here's some additional context:",
    "Excellent question! This is something many people wonder about.",
];

/// Text shown to the user when a run fails
const FAILURE_NOTICE: &str = "Failed to get AI response";

/// Timing, probability and content of simulated replies
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// How long the indicator shows before each reply
    pub typing_delay: Duration,
    /// Gap between the first reply and the follow-up's typing
    pub follow_up_pause: Duration,
    /// Chance of a follow-up, from 0.0 (never) to 1.0 (always)
    pub follow_up_probability: f64,
    pub follow_up_text: String,
    pub replies: Vec<String>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        SimulatorConfig {
            typing_delay: DEFAULT_TYPING_DELAY,
            follow_up_pause: DEFAULT_FOLLOW_UP_PAUSE,
            follow_up_probability: DEFAULT_FOLLOW_UP_PROBABILITY,
            follow_up_text: FOLLOW_UP_TEXT.to_string(),
            replies: DEFAULT_REPLIES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Produces fake assistant replies into a [`ChatStore`]
#[derive(Clone)]
pub struct ResponseSimulator {
    store: ChatStore,
    config: Arc<SimulatorConfig>,
    notifier: Arc<dyn Notifier>,
    rng: Arc<Mutex<StdRng>>,
    in_flight: Arc<Mutex<usize>>, // Compositions currently showing the indicator
}

/// Holds the typing indicator up while alive
struct Composition {
    store: ChatStore,
    in_flight: Arc<Mutex<usize>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Drop for Composition {
    fn drop(&mut self) {
        let mut in_flight = lock(&self.in_flight);
        *in_flight = in_flight.saturating_sub(1);
        if *in_flight == 0 {
            self.store.set_typing(false);
        }
    }
}

impl ResponseSimulator {
    pub fn new(store: ChatStore, config: SimulatorConfig, notifier: Arc<dyn Notifier>) -> Self {
        Self::with_rng(store, config, notifier, StdRng::from_entropy())
    }

    /// Build a simulator around a specific random source (seed it for repeatable runs)
    pub fn with_rng(
        store: ChatStore,
        config: SimulatorConfig,
        notifier: Arc<dyn Notifier>,
        rng: StdRng,
    ) -> Self {
        ResponseSimulator {
            store,
            config: Arc::new(config),
            notifier,
            rng: Arc::new(Mutex::new(rng)),
            in_flight: Arc::new(Mutex::new(0)),
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Number of replies currently being composed
    pub fn in_flight(&self) -> usize {
        *lock(&self.in_flight)
    }

    /// Post a user message and schedule the reply to it.
    /// Returns `None` if the chatroom does not exist; nothing is scheduled then.
    pub fn submit(&self, chatroom_id: &str, message: NewMessage) -> Option<JoinHandle<()>> {
        let appended = self.store.append_message(chatroom_id, message)?;
        Some(self.respond(chatroom_id, &appended.content))
    }

    /// Start a reply in the background. The typing indicator is on before this returns.
    pub fn respond(&self, chatroom_id: &str, user_message: &str) -> JoinHandle<()> {
        let composition = self.begin_composing();
        let simulator = self.clone();
        let chatroom_id = chatroom_id.to_string();
        let user_message = user_message.to_string();
        tokio::spawn(async move {
            simulator.drive(&chatroom_id, &user_message, composition).await;
        })
    }

    /// Run a reply to completion on the current task
    pub async fn run(&self, chatroom_id: &str, user_message: &str) {
        let composition = self.begin_composing();
        self.drive(chatroom_id, user_message, composition).await;
    }

    async fn drive(&self, chatroom_id: &str, user_message: &str, composition: Composition) {
        debug!("Composing reply in {} to {:?}", chatroom_id, user_message);
        if let Err(e) = self.converse(chatroom_id, composition).await {
            // The composition guard is gone by now, so the indicator is already down
            error!("Reply simulation for {} failed: {}", chatroom_id, e);
            self.notifier.notify(Notice::error(FAILURE_NOTICE));
        }
    }

    async fn converse(&self, chatroom_id: &str, composition: Composition) -> Result<()> {
        tokio::time::sleep(self.config.typing_delay).await;
        let reply = self.pick_reply()?;
        drop(composition);

        if !self.deliver(chatroom_id, &reply) {
            return Ok(());
        }

        if self.roll_follow_up() {
            tokio::time::sleep(self.config.follow_up_pause).await;
            let composition = self.begin_composing();
            tokio::time::sleep(self.config.typing_delay).await;
            drop(composition);
            self.deliver(chatroom_id, &self.config.follow_up_text);
        }
        Ok(())
    }

    fn begin_composing(&self) -> Composition {
        let mut in_flight = lock(&self.in_flight);
        *in_flight += 1;
        self.store.set_typing(true);
        Composition {
            store: self.store.clone(),
            in_flight: self.in_flight.clone(),
        }
    }

    /// Append a reply if the chatroom still exists
    fn deliver(&self, chatroom_id: &str, text: &str) -> bool {
        match self.store.append_message(chatroom_id, NewMessage::from_assistant(text)) {
            Some(message) => {
                info!("Simulated reply {} posted to {}", message.id, chatroom_id);
                true
            }
            None => {
                debug!("Chatroom {} was deleted while composing, dropping reply", chatroom_id);
                false
            }
        }
    }

    fn pick_reply(&self) -> Result<String> {
        let mut rng = lock(&self.rng);
        self.config
            .replies
            .choose(&mut *rng)
            .cloned()
            .ok_or_else(|| ChatError::Simulation("no replies configured".to_string()))
    }

    fn roll_follow_up(&self) -> bool {
        let p = self.config.follow_up_probability;
        // Also rejects NaN
        if !(p > 0.0) {
            return false;
        }
        lock(&self.rng).gen_bool(p.min(1.0))
    }
}
