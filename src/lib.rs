// Conversation engine for the chat client: chatroom state, persistence,
// search and the simulated assistant
pub mod error;
pub mod format;
pub mod ids;
pub mod models;
pub mod notify;
pub mod persistence;
pub mod search;
pub mod session;
pub mod simulator;
pub mod storage;
pub mod store;

// Re-export main types for convenience
pub use error::{ChatError, Result};
pub use models::*;
pub use simulator::{ResponseSimulator, SimulatorConfig};
pub use store::{ChatStore, StoreEvent};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use std::sync::Arc;

    #[test]
    fn test_store_and_filter_work_together() -> Result<()> {
        let store = ChatStore::open(Arc::new(MemoryStorage::new()));
        store.create_chatroom("work discussion")?;
        store.create_chatroom("Trip Planning")?;

        // Empty query returns everything, newest first
        let all: Vec<String> = store.filtered_chatrooms().into_iter().map(|r| r.title).collect();
        assert_eq!(all, vec!["Trip Planning", "work discussion"]);

        store.set_search_query("Work");
        let found: Vec<String> = store.filtered_chatrooms().into_iter().map(|r| r.title).collect();
        assert_eq!(found, vec!["work discussion"]);

        store.set_search_query("nothing like this");
        assert!(store.filtered_chatrooms().is_empty());
        Ok(())
    }
}
