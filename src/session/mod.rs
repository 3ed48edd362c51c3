//! Session store: the authenticated identity, in memory and in durable
//! secure storage.
//!
//! Mutations write the durable copy first and the in-memory copy second, so
//! after a crash the durable copy is authoritative and [`SessionStore::restore`]
//! re-derives memory from it.

mod crypto;
pub mod secure_store;

pub use secure_store::{
    FileSecureStore, MemorySecureStore, SecureStore, SharedSecureStore, StoreError,
};

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::models::{Session, UserId};

/// Secure-store key holding the bearer token.
pub const TOKEN_KEY: &str = "authToken";
/// Secure-store key holding the user id of the token's owner.
pub const USER_ID_KEY: &str = "authUserId";

/// What durable storage held at restore time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredSession {
    /// Token and user id both present.
    Complete(Session),
    /// A token without a user id (or the reverse).
    Partial,
    /// Nothing stored.
    Missing,
}

/// In-memory session mirrored into a [`SecureStore`].
pub struct SessionStore {
    current: RwLock<Session>,
    durable: SharedSecureStore,
}

impl SessionStore {
    pub fn new(durable: SharedSecureStore) -> Self {
        Self {
            current: RwLock::new(Session::default()),
            durable,
        }
    }

    /// Persist and activate a session.
    pub async fn set_session(&self, token: &str, user_id: UserId) -> Result<(), StoreError> {
        self.durable.set_item(TOKEN_KEY, token).await?;
        if let Err(e) = self
            .durable
            .set_item(USER_ID_KEY, &user_id.to_string())
            .await
        {
            // Do not leave a token without its owner on disk.
            if let Err(cleanup) = self.durable.delete_item(TOKEN_KEY).await {
                tracing::error!("Failed to roll back stored token: {}", cleanup);
            }
            return Err(e);
        }

        *self.current.write().await = Session::new(token, user_id);
        tracing::info!(user_id, "Session established");
        Ok(())
    }

    /// Snapshot of the in-memory session.
    pub async fn session(&self) -> Session {
        self.current.read().await.clone()
    }

    pub async fn token(&self) -> Option<String> {
        self.current.read().await.token.clone()
    }

    pub async fn user_id(&self) -> Option<UserId> {
        self.current.read().await.user_id
    }

    pub async fn is_authenticated(&self) -> bool {
        self.current.read().await.is_authenticated()
    }

    /// Remove the durable copy and clear memory.
    ///
    /// Memory is cleared even when the durable delete fails; the error is
    /// still returned.
    pub async fn clear_session(&self) -> Result<(), StoreError> {
        let token_result = self.durable.delete_item(TOKEN_KEY).await;
        let user_result = self.durable.delete_item(USER_ID_KEY).await;

        *self.current.write().await = Session::default();
        tracing::info!("Session cleared");

        token_result.and(user_result)
    }

    /// Drop the in-memory session only.
    pub async fn forget(&self) {
        *self.current.write().await = Session::default();
    }

    /// Read what durable storage holds, without changing memory.
    pub async fn load_stored(&self) -> Result<StoredSession, StoreError> {
        let token = self
            .durable
            .get_item(TOKEN_KEY)
            .await?
            .filter(|t| !t.is_empty());
        let user_id = self
            .durable
            .get_item(USER_ID_KEY)
            .await?
            .and_then(|raw| raw.trim().parse::<UserId>().ok());

        Ok(match (token, user_id) {
            (Some(token), Some(user_id)) => StoredSession::Complete(Session::new(token, user_id)),
            (None, None) => StoredSession::Missing,
            _ => StoredSession::Partial,
        })
    }

    /// Re-derive the in-memory session from durable storage.
    ///
    /// Returns the restored session, or `None` (and an empty in-memory
    /// session) when durable storage does not hold a complete one.
    pub async fn restore(&self) -> Result<Option<Session>, StoreError> {
        match self.load_stored().await? {
            StoredSession::Complete(session) => {
                *self.current.write().await = session.clone();
                Ok(Some(session))
            }
            StoredSession::Partial | StoredSession::Missing => {
                self.forget().await;
                Ok(None)
            }
        }
    }
}

/// Shared session store.
pub type SharedSessionStore = Arc<SessionStore>;

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Store whose deletes always fail.
    struct StuckStore(MemorySecureStore);

    #[async_trait]
    impl SecureStore for StuckStore {
        async fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.0.get_item(key).await
        }

        async fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
            self.0.set_item(key, value).await
        }

        async fn delete_item(&self, _key: &str) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )))
        }
    }

    #[tokio::test]
    async fn test_set_and_clear_keep_copies_in_agreement() {
        let durable = MemorySecureStore::new();
        let store = SessionStore::new(Arc::new(durable.clone()));

        store.set_session("tok", 42).await.unwrap();
        assert_eq!(store.session().await, Session::new("tok", 42));
        assert_eq!(durable.get_item(TOKEN_KEY).await.unwrap().as_deref(), Some("tok"));
        assert_eq!(durable.get_item(USER_ID_KEY).await.unwrap().as_deref(), Some("42"));

        store.clear_session().await.unwrap();
        assert_eq!(store.session().await, Session::default());
        assert_eq!(durable.get_item(TOKEN_KEY).await.unwrap(), None);
        assert_eq!(durable.get_item(USER_ID_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_restore_from_durable_copy() {
        let durable = MemorySecureStore::new();
        SessionStore::new(Arc::new(durable.clone()))
            .set_session("tok", 7)
            .await
            .unwrap();

        // Fresh process, same storage.
        let store = SessionStore::new(Arc::new(durable));
        assert!(!store.is_authenticated().await);
        let restored = store.restore().await.unwrap();
        assert_eq!(restored, Some(Session::new("tok", 7)));
        assert_eq!(store.user_id().await, Some(7));
    }

    #[tokio::test]
    async fn test_partial_durable_copy() {
        let durable = MemorySecureStore::new();
        durable.set_item(TOKEN_KEY, "tok").await.unwrap();
        let store = SessionStore::new(Arc::new(durable));

        assert_eq!(store.load_stored().await.unwrap(), StoredSession::Partial);
        assert_eq!(store.restore().await.unwrap(), None);
        assert!(!store.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_clear_still_clears_memory_on_storage_error() {
        let store = SessionStore::new(Arc::new(StuckStore(MemorySecureStore::new())));
        store.set_session("tok", 1).await.unwrap();

        assert!(store.clear_session().await.is_err());
        assert!(!store.is_authenticated().await);
    }
}
