use crate::models::Chatroom;

/// Filter chatrooms by a case-insensitive substring match on the title.
///
/// An empty or whitespace-only query returns every chatroom in its stored order.
/// Debouncing is left to the caller; this is cheap enough to run per keystroke.
pub fn filter_chatrooms(chatrooms: &[Chatroom], query: &str) -> Vec<Chatroom> {
    if query.trim().is_empty() {
        return chatrooms.to_vec();
    }

    let needle = query.to_lowercase();
    chatrooms
        .iter()
        .filter(|room| room.title.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}
