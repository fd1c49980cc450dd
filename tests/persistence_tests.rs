// Durable storage across store restarts

mod common;
use common::setup_logging;

use std::sync::Arc;
use tempfile::tempdir;

use palaver::persistence;
use palaver::storage::{FileStorage, Storage, CHAT_SLOT};
use palaver::{ChatError, ChatState, ChatStore, NewMessage};

#[test]
fn test_state_survives_restart_on_disk() -> Result<(), ChatError> {
    setup_logging();
    let temp_dir = tempdir()?;

    let before = {
        let storage = Arc::new(FileStorage::new(temp_dir.path())?);
        let store = ChatStore::open(storage);
        let trip = store.create_chatroom("Trip Planning")?;
        let work = store.create_chatroom("work discussion")?;
        store.append_message(&trip, NewMessage::from_user("Hello"));
        store.append_message(&trip, NewMessage::from_assistant("Hi! Where to?"));
        store.append_message(&work, NewMessage::from_user("see image").with_image("data:image/png;base64,AAAA".to_string()));
        store.select_chatroom(Some(&trip));
        store.set_search_query("trip");
        store.snapshot()
    };

    let storage = Arc::new(FileStorage::new(temp_dir.path())?);
    let after = ChatStore::open(storage).snapshot();
    assert_eq!(after, before);
    Ok(())
}

#[test]
fn test_round_trip_of_reachable_state() -> Result<(), ChatError> {
    setup_logging();
    let storage = Arc::new(palaver::storage::MemoryStorage::new());
    let store = ChatStore::open(storage);
    for title in ["one", "two", "three"] {
        let id = store.create_chatroom(title)?;
        for n in 0..3 {
            store.append_message(&id, NewMessage::from_user(&format!("{} #{}", title, n)));
        }
    }
    store.delete_chatroom(&store.chatrooms()[1].id);
    store.set_typing(true);

    let state = store.snapshot();
    assert_eq!(persistence::deserialize(&persistence::serialize(&state)?)?, state);
    Ok(())
}

#[test]
fn test_corrupt_file_falls_back_to_empty() -> Result<(), ChatError> {
    setup_logging();
    let temp_dir = tempdir()?;
    let storage = Arc::new(FileStorage::new(temp_dir.path())?);
    storage.save(CHAT_SLOT, "{\"state\":{\"chatrooms\":[{\"id\":1}]}}")?;

    let store = ChatStore::open(storage.clone());
    assert_eq!(store.snapshot(), ChatState::default());

    // The next mutation overwrites the bad slot with something readable
    store.create_chatroom("Fresh start")?;
    let raw = storage.load(CHAT_SLOT)?.unwrap_or_default();
    assert_eq!(persistence::deserialize(&raw)?.chatrooms.len(), 1);
    Ok(())
}
