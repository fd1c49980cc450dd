// src/store.rs
//! Conversation store
//!
//! Single source of truth for chatrooms, messages, the active selection, the typing
//! indicator and the search string. Every mutation runs inside one short critical
//! section, persists the resulting snapshot, and only then notifies subscribers, so
//! nobody observes a half-applied change.
//!
//! The lock is a plain `std::sync::Mutex` and is never held across an `.await`.
//! Async callers (the response simulator) always go back through the store when they
//! resume instead of holding on to a chatroom they looked up earlier.

use chrono::Utc;
use log::{debug, info, warn};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

use crate::error::{ChatError, Result};
use crate::ids::{IdGenerator, UuidGenerator};
use crate::models::{ChatState, Chatroom, Message, NewMessage};
use crate::persistence;
use crate::search::filter_chatrooms;
use crate::storage::{Storage, CHAT_SLOT};

/// Buffer size for each subscriber channel
const SUBSCRIBER_CAPACITY: usize = 256;

/// Change notifications delivered to subscribers after a mutation completes
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    ChatroomCreated { id: String },
    ChatroomDeleted { id: String },
    SelectionChanged(Option<String>),
    MessageAppended { chatroom_id: String, message: Message },
    TypingChanged(bool),
    SearchChanged(String),
    Reset,
}

struct Inner {
    state: Mutex<ChatState>,
    storage: Arc<dyn Storage>,
    ids: Arc<dyn IdGenerator>,
    subscribers: Mutex<Vec<mpsc::Sender<StoreEvent>>>,
}

/// Shared handle to the conversation store. Clones refer to the same state.
#[derive(Clone)]
pub struct ChatStore {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Every mutation leaves the state consistent before it can panic out, so a
    // poisoned lock still guards valid data
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ChatStore {
    /// Open the store, rehydrating whatever the chat slot holds
    pub fn open(storage: Arc<dyn Storage>) -> Self {
        Self::open_with_ids(storage, Arc::new(UuidGenerator))
    }

    /// Open the store with a specific identifier generator
    pub fn open_with_ids(storage: Arc<dyn Storage>, ids: Arc<dyn IdGenerator>) -> Self {
        let stored = match storage.load(CHAT_SLOT) {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Could not read chat storage, starting empty: {}", e);
                None
            }
        };
        let mut state = persistence::rehydrate(stored.as_deref());
        normalize(&mut state);
        info!("Conversation store opened with {} chatrooms", state.chatrooms.len());

        ChatStore {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                storage,
                ids,
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Register an observer. Events arrive in mutation order.
    pub fn subscribe(&self) -> mpsc::Receiver<StoreEvent> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        lock(&self.inner.subscribers).push(tx);
        rx
    }

    /// Create a chatroom at the front of the list and return its id.
    /// The new chatroom is not selected.
    pub fn create_chatroom(&self, title: &str) -> Result<String> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ChatError::EmptyTitle);
        }

        let id = self.inner.ids.next_id();
        let room = Chatroom::new(id.clone(), title, Utc::now());
        self.mutate(|state| {
            state.chatrooms.insert(0, room);
            debug!("Created chatroom {} ({})", id, title);
            ((), vec![StoreEvent::ChatroomCreated { id: id.clone() }])
        });
        Ok(id)
    }

    /// Remove a chatroom. Returns false (and changes nothing) if it did not exist.
    pub fn delete_chatroom(&self, id: &str) -> bool {
        self.mutate(|state| {
            let Some(index) = state.chatrooms.iter().position(|room| room.id == id) else {
                debug!("Ignoring delete of unknown chatroom {}", id);
                return (false, Vec::new());
            };

            state.chatrooms.remove(index);
            let mut events = vec![StoreEvent::ChatroomDeleted { id: id.to_string() }];
            if state.current_chatroom_id.as_deref() == Some(id) {
                state.current_chatroom_id = None;
                events.push(StoreEvent::SelectionChanged(None));
            }
            debug!("Deleted chatroom {}", id);
            (true, events)
        })
    }

    /// Change the active chatroom. Selecting an unknown id is ignored and returns false;
    /// `None` always clears the selection.
    pub fn select_chatroom(&self, id: Option<&str>) -> bool {
        self.mutate(|state| {
            if let Some(id) = id {
                if state.chatroom(id).is_none() {
                    debug!("Ignoring selection of unknown chatroom {}", id);
                    return (false, Vec::new());
                }
            }

            let selection = id.map(str::to_string);
            if state.current_chatroom_id == selection {
                return (true, Vec::new());
            }
            state.current_chatroom_id = selection.clone();
            (true, vec![StoreEvent::SelectionChanged(selection)])
        })
    }

    /// Append a message to a chatroom, assigning it a fresh id.
    /// Returns `None` without touching anything if the chatroom does not exist.
    pub fn append_message(&self, chatroom_id: &str, message: NewMessage) -> Option<Message> {
        let id = self.inner.ids.next_id();
        self.mutate(|state| {
            let Some(room) = state.chatroom_mut(chatroom_id) else {
                debug!("Dropping message for unknown chatroom {}", chatroom_id);
                return (None, Vec::new());
            };

            let message = message.into_message(id);
            room.push(message.clone());
            let event = StoreEvent::MessageAppended {
                chatroom_id: chatroom_id.to_string(),
                message: message.clone(),
            };
            (Some(message), vec![event])
        })
    }

    /// Strict variant of [`ChatStore::append_message`] for callers that need to know
    pub fn try_append_message(&self, chatroom_id: &str, message: NewMessage) -> Result<Message> {
        self.append_message(chatroom_id, message)
            .ok_or_else(|| ChatError::NotFound(chatroom_id.to_string()))
    }

    pub fn set_typing(&self, typing: bool) {
        self.mutate(|state| {
            if state.is_typing == typing {
                return ((), Vec::new());
            }
            state.is_typing = typing;
            ((), vec![StoreEvent::TypingChanged(typing)])
        })
    }

    pub fn set_search_query(&self, query: &str) {
        self.mutate(|state| {
            if state.search_query == query {
                return ((), Vec::new());
            }
            state.search_query = query.to_string();
            ((), vec![StoreEvent::SearchChanged(query.to_string())])
        })
    }

    /// Clear everything; used when the session ends
    pub fn reset(&self) {
        self.mutate(|state| {
            *state = ChatState::default();
            info!("Conversation store reset");
            ((), vec![StoreEvent::Reset])
        })
    }

    pub fn get_chatroom(&self, id: &str) -> Option<Chatroom> {
        lock(&self.inner.state).chatroom(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        lock(&self.inner.state).chatroom(id).is_some()
    }

    /// All chatrooms, newest first
    pub fn chatrooms(&self) -> Vec<Chatroom> {
        lock(&self.inner.state).chatrooms.clone()
    }

    /// Chatrooms matching the current search query, in stored order
    pub fn filtered_chatrooms(&self) -> Vec<Chatroom> {
        let state = lock(&self.inner.state);
        filter_chatrooms(&state.chatrooms, &state.search_query)
    }

    pub fn current_chatroom_id(&self) -> Option<String> {
        lock(&self.inner.state).current_chatroom_id.clone()
    }

    /// Resolve the selection through a lookup
    pub fn current_chatroom(&self) -> Option<Chatroom> {
        let state = lock(&self.inner.state);
        state
            .current_chatroom_id
            .as_deref()
            .and_then(|id| state.chatroom(id))
            .cloned()
    }

    pub fn is_typing(&self) -> bool {
        lock(&self.inner.state).is_typing
    }

    pub fn search_query(&self) -> String {
        lock(&self.inner.state).search_query.clone()
    }

    /// Copy of the whole state
    pub fn snapshot(&self) -> ChatState {
        lock(&self.inner.state).clone()
    }

    /// Drop the persisted chat slot without touching in-memory state
    pub fn clear_persisted(&self) -> Result<()> {
        self.inner.storage.remove(CHAT_SLOT)
    }

    /// Apply a mutation, persist the result and notify subscribers.
    /// The closure reports the events it caused; no events means nothing changed.
    fn mutate<R>(&self, f: impl FnOnce(&mut ChatState) -> (R, Vec<StoreEvent>)) -> R {
        let mut state = lock(&self.inner.state);
        let (result, events) = f(&mut *state);
        if events.is_empty() {
            return result;
        }

        // Persist and publish under the state lock so slot writes and events land in
        // mutation order. Lock order is always state, then subscribers.
        self.persist(&state);
        let mut subscribers = lock(&self.inner.subscribers);
        for event in events {
            publish(&mut subscribers, event);
        }
        result
    }

    /// Slot writes are synchronous and happen under the state lock, on whichever
    /// thread (or tokio worker) mutated the store. The chat slot is a single small
    /// JSON document, so this stays cheap.
    fn persist(&self, state: &ChatState) {
        let written = persistence::serialize(state)
            .and_then(|encoded| self.inner.storage.save(CHAT_SLOT, &encoded));
        if let Err(e) = written {
            warn!("Failed to persist chat state: {}", e);
        }
    }
}

/// Offer an event to every subscriber without blocking, pruning closed channels
fn publish(subscribers: &mut Vec<mpsc::Sender<StoreEvent>>, event: StoreEvent) {
    subscribers.retain(|tx| match tx.try_send(event.clone()) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!("Subscriber lagging, dropped {:?}", event);
            true
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    });
}

/// Restore the invariants a freshly loaded state must satisfy
fn normalize(state: &mut ChatState) {
    // No simulation survives a restart
    state.is_typing = false;

    if let Some(id) = state.current_chatroom_id.as_deref() {
        if state.chatroom(id).is_none() {
            warn!("Stored selection {} no longer exists, clearing it", id);
            state.current_chatroom_id = None;
        }
    }

    for room in &mut state.chatrooms {
        room.last_message = room.messages.last().map(|m| m.content.clone());
        room.last_message_time = room.messages.last().map(|m| m.timestamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequentialGenerator;
    use crate::storage::MemoryStorage;

    fn store() -> (ChatStore, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let store = ChatStore::open_with_ids(storage.clone(), Arc::new(SequentialGenerator::new("id")));
        (store, storage)
    }

    #[test]
    fn test_create_inserts_newest_first_without_selecting() -> Result<()> {
        let (store, _) = store();
        let first = store.create_chatroom("First")?;
        let second = store.create_chatroom("  Second  ")?;

        let ids: Vec<String> = store.chatrooms().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![second.clone(), first]);
        assert_eq!(store.get_chatroom(&second).map(|r| r.title), Some("Second".to_string()));
        assert_eq!(store.current_chatroom_id(), None);
        Ok(())
    }

    #[test]
    fn test_create_rejects_blank_title() {
        let (store, storage) = store();
        assert!(matches!(store.create_chatroom("   "), Err(ChatError::EmptyTitle)));
        assert!(store.chatrooms().is_empty());
        assert_eq!(storage.load(CHAT_SLOT).ok().flatten(), None);
    }

    #[test]
    fn test_select_unknown_is_ignored() -> Result<()> {
        let (store, _) = store();
        let id = store.create_chatroom("Room")?;
        assert!(store.select_chatroom(Some(&id)));
        assert!(!store.select_chatroom(Some("nope")));
        assert_eq!(store.current_chatroom_id(), Some(id.clone()));
        assert_eq!(store.current_chatroom().map(|r| r.id), Some(id));
        assert!(store.select_chatroom(None));
        assert_eq!(store.current_chatroom_id(), None);
        Ok(())
    }

    #[test]
    fn test_append_to_unknown_chatroom_is_noop() {
        let (store, _) = store();
        assert_eq!(store.append_message("ghost", NewMessage::from_user("hi")), None);
        assert!(matches!(
            store.try_append_message("ghost", NewMessage::from_user("hi")),
            Err(ChatError::NotFound(id)) if id == "ghost"
        ));
        assert!(store.chatrooms().is_empty());
    }

    #[test]
    fn test_every_mutation_persists() -> Result<()> {
        let (store, storage) = store();
        let id = store.create_chatroom("Persisted")?;
        store.append_message(&id, NewMessage::from_user("saved"));
        store.set_search_query("pers");

        let stored = storage.load(CHAT_SLOT)?;
        let decoded = persistence::deserialize(stored.as_deref().unwrap_or_default())?;
        assert_eq!(decoded, store.snapshot());
        Ok(())
    }

    #[test]
    fn test_open_normalizes_loaded_state() -> Result<()> {
        let storage = Arc::new(MemoryStorage::new());
        {
            let store = ChatStore::open(storage.clone());
            let id = store.create_chatroom("Room")?;
            store.append_message(&id, NewMessage::from_user("last"));
            store.select_chatroom(Some(&id));
            store.set_typing(true);
        }

        // Point the selection at something that is gone
        let mut state = persistence::deserialize(&storage.load(CHAT_SLOT)?.unwrap_or_default())?;
        state.current_chatroom_id = Some("deleted".to_string());
        storage.save(CHAT_SLOT, &persistence::serialize(&state)?)?;

        let reopened = ChatStore::open(storage);
        assert!(!reopened.is_typing());
        assert_eq!(reopened.current_chatroom_id(), None);
        assert_eq!(reopened.chatrooms()[0].last_message.as_deref(), Some("last"));
        Ok(())
    }

    #[test]
    fn test_open_with_corrupt_slot_starts_empty() -> Result<()> {
        let storage = Arc::new(MemoryStorage::new());
        storage.save(CHAT_SLOT, "{\"state\": [1, 2")?;
        let store = ChatStore::open(storage);
        assert_eq!(store.snapshot(), ChatState::default());

        // And keeps working afterwards
        store.create_chatroom("Fresh")?;
        assert_eq!(store.chatrooms().len(), 1);
        Ok(())
    }

    #[test]
    fn test_events_follow_mutations() -> Result<()> {
        let (store, _) = store();
        let mut events = store.subscribe();

        let id = store.create_chatroom("Events")?;
        store.select_chatroom(Some(&id));
        store.set_typing(true);
        store.set_typing(true); // unchanged, no event
        store.delete_chatroom(&id);

        assert_eq!(events.try_recv().ok(), Some(StoreEvent::ChatroomCreated { id: id.clone() }));
        assert_eq!(events.try_recv().ok(), Some(StoreEvent::SelectionChanged(Some(id.clone()))));
        assert_eq!(events.try_recv().ok(), Some(StoreEvent::TypingChanged(true)));
        assert_eq!(events.try_recv().ok(), Some(StoreEvent::ChatroomDeleted { id }));
        assert_eq!(events.try_recv().ok(), Some(StoreEvent::SelectionChanged(None)));
        assert!(events.try_recv().is_err());
        Ok(())
    }

    #[test]
    fn test_closed_subscribers_are_pruned() -> Result<()> {
        let (store, _) = store();
        let dropped = store.subscribe();
        let mut kept = store.subscribe();
        drop(dropped);

        store.create_chatroom("One")?;
        assert_eq!(lock(&store.inner.subscribers).len(), 1);
        assert!(matches!(kept.try_recv(), Ok(StoreEvent::ChatroomCreated { .. })));
        Ok(())
    }

    #[test]
    fn test_lagging_subscriber_stays_registered() {
        let (store, _) = store();
        let mut events = store.subscribe();

        for i in 0..SUBSCRIBER_CAPACITY + 10 {
            store.set_search_query(&i.to_string());
        }
        let mut received = 0;
        while events.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, SUBSCRIBER_CAPACITY);

        // Overflow drops events, not the subscriber
        store.set_search_query("after");
        assert_eq!(events.try_recv().ok(), Some(StoreEvent::SearchChanged("after".to_string())));
        assert_eq!(lock(&store.inner.subscribers).len(), 1);
    }

    #[test]
    fn test_reset_clears_everything() -> Result<()> {
        let (store, _) = store();
        let id = store.create_chatroom("Room")?;
        store.select_chatroom(Some(&id));
        store.set_typing(true);
        store.set_search_query("ro");

        store.reset();
        assert_eq!(store.snapshot(), ChatState::default());
        Ok(())
    }
}
