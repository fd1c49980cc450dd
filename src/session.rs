// src/session.rs
//! Login identity and theme preference
//!
//! Both live in their own storage slots next to the chat slot and use the same
//! envelope layout. Logging out also wipes the conversation store.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;
use crate::models::User;
use crate::persistence::{decode_slot, decode_timestamp, encode_slot, encode_timestamp};
use crate::storage::{Storage, AUTH_SLOT, THEME_SLOT};
use crate::store::ChatStore;

#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct AuthRecord {
    #[serde(default)]
    user: Option<UserRecord>,
    #[serde(default)]
    is_authenticated: bool,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserRecord {
    id: String,
    phone_number: String,
    country_code: String,
    created_at: String,
}

#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ThemeRecord {
    #[serde(default)]
    is_dark: bool,
}

impl From<&User> for UserRecord {
    fn from(user: &User) -> Self {
        UserRecord {
            id: user.id.clone(),
            phone_number: user.phone_number.clone(),
            country_code: user.country_code.clone(),
            created_at: encode_timestamp(&user.created_at),
        }
    }
}

impl UserRecord {
    fn rehydrate(self) -> Result<User> {
        Ok(User {
            created_at: decode_timestamp(&self.created_at)?,
            id: self.id,
            phone_number: self.phone_number,
            country_code: self.country_code,
        })
    }
}

/// The authenticated user, persisted in the auth slot
pub struct AuthSession {
    storage: Arc<dyn Storage>,
    chat: ChatStore,
    user: Option<User>,
}

impl AuthSession {
    /// Restore the session from storage. Anything unreadable counts as logged out.
    pub fn open(storage: Arc<dyn Storage>, chat: ChatStore) -> Self {
        let user = match storage.load(AUTH_SLOT) {
            Ok(Some(raw)) => match decode_slot::<AuthRecord>(&raw) {
                Ok(record) => record.user.map(UserRecord::rehydrate).transpose().unwrap_or_else(|e| {
                    warn!("Discarding stored user: {}", e);
                    None
                }),
                Err(e) => {
                    warn!("Discarding stored auth state: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Could not read auth storage: {}", e);
                None
            }
        };

        if let Some(user) = &user {
            info!("Restored session for {} {}", user.country_code, user.phone_number);
        }
        AuthSession { storage, chat, user }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Authenticated exactly when a user is present
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn login(&mut self, user: User) -> Result<()> {
        info!("Logged in as {} {}", user.country_code, user.phone_number);
        self.user = Some(user);
        self.save()
    }

    /// Forget the user and everything they chatted about
    pub fn logout(&mut self) -> Result<()> {
        self.user = None;
        self.chat.reset();
        self.chat.clear_persisted()?;
        info!("Logged out");
        self.save()
    }

    fn save(&self) -> Result<()> {
        let record = AuthRecord {
            user: self.user.as_ref().map(UserRecord::from),
            is_authenticated: self.is_authenticated(),
        };
        self.storage.save(AUTH_SLOT, &encode_slot(&record)?)
    }
}

/// Light/dark preference, persisted in the theme slot
pub struct ThemeSetting {
    storage: Arc<dyn Storage>,
    is_dark: bool,
}

impl ThemeSetting {
    pub fn open(storage: Arc<dyn Storage>) -> Self {
        let is_dark = storage
            .load(THEME_SLOT)
            .ok()
            .flatten()
            .and_then(|raw| decode_slot::<ThemeRecord>(&raw).ok())
            .map(|record| record.is_dark)
            .unwrap_or(false);
        ThemeSetting { storage, is_dark }
    }

    pub fn is_dark(&self) -> bool {
        self.is_dark
    }

    /// Flip the theme and return the new value
    pub fn toggle(&mut self) -> Result<bool> {
        self.is_dark = !self.is_dark;
        self.storage
            .save(THEME_SLOT, &encode_slot(&ThemeRecord { is_dark: self.is_dark })?)?;
        Ok(self.is_dark)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewMessage;
    use crate::storage::{MemoryStorage, CHAT_SLOT};

    #[test]
    fn test_login_survives_restart() -> Result<()> {
        let storage = Arc::new(MemoryStorage::new());
        let chat = ChatStore::open(storage.clone());

        let mut session = AuthSession::open(storage.clone(), chat.clone());
        assert!(!session.is_authenticated());
        let user = User::new("9876543210", "+91");
        session.login(user.clone())?;

        let restored = AuthSession::open(storage, chat);
        assert!(restored.is_authenticated());
        assert_eq!(restored.user(), Some(&user));
        Ok(())
    }

    #[test]
    fn test_logout_wipes_chat() -> Result<()> {
        let storage = Arc::new(MemoryStorage::new());
        let chat = ChatStore::open(storage.clone());
        let id = chat.create_chatroom("Secrets")?;
        chat.append_message(&id, NewMessage::from_user("psst"));

        let mut session = AuthSession::open(storage.clone(), chat.clone());
        session.login(User::new("5550100", "+1"))?;
        session.logout()?;

        assert!(!session.is_authenticated());
        assert!(chat.chatrooms().is_empty());
        assert_eq!(storage.load(CHAT_SLOT)?, None);
        assert!(!AuthSession::open(storage, chat).is_authenticated());
        Ok(())
    }

    #[test]
    fn test_flag_without_user_is_logged_out() -> Result<()> {
        let storage = Arc::new(MemoryStorage::new());
        let chat = ChatStore::open(storage.clone());
        storage.save(AUTH_SLOT, r#"{"state":{"user":null,"isAuthenticated":true},"version":0}"#)?;
        assert!(!AuthSession::open(storage.clone(), chat.clone()).is_authenticated());

        storage.save(AUTH_SLOT, "garbage")?;
        assert!(!AuthSession::open(storage, chat).is_authenticated());
        Ok(())
    }

    #[test]
    fn test_theme_toggle_persists() -> Result<()> {
        let storage = Arc::new(MemoryStorage::new());
        let mut theme = ThemeSetting::open(storage.clone());
        assert!(!theme.is_dark());
        assert!(theme.toggle()?);
        assert!(ThemeSetting::open(storage.clone()).is_dark());
        assert!(!theme.toggle()?);
        assert!(!ThemeSetting::open(storage).is_dark());
        Ok(())
    }
}
