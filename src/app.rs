//! Composition root: one handle owning the stores, the gateway and the
//! workflows.

use std::sync::Arc;

use anyhow::Context;

use crate::api::{HttpBackend, SharedBackend};
use crate::cache::{EntityCache, SharedEntityCache};
use crate::config::Config;
use crate::session::{FileSecureStore, SessionStore, SharedSecureStore, SharedSessionStore};
use crate::workflow::{AuthSignal, AuthWorkflow, TaskWorkflow};

/// Everything a UI collaborator needs.
pub struct Taskpad {
    pub session: SharedSessionStore,
    pub cache: SharedEntityCache,
    pub auth: AuthWorkflow,
    pub tasks: TaskWorkflow,
}

impl Taskpad {
    /// Open the on-disk secure store and wire the HTTP backend.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let durable = FileSecureStore::open(&config.data_dir, config.secret_passphrase.as_deref())
            .await
            .with_context(|| {
                format!(
                    "Failed to open secure store in {}",
                    config.data_dir.display()
                )
            })?;

        let session = Arc::new(SessionStore::new(Arc::new(durable)));
        let backend = Arc::new(HttpBackend::new(&config.api_base_url, Arc::clone(&session)));

        tracing::info!(api_base_url = %config.api_base_url, "Client ready");
        Ok(Self::from_parts(session, backend))
    }

    /// Wire with a caller-supplied secure store (e.g. in memory).
    pub fn with_store(config: &Config, durable: SharedSecureStore) -> Self {
        let session = Arc::new(SessionStore::new(durable));
        let backend = Arc::new(HttpBackend::new(&config.api_base_url, Arc::clone(&session)));
        Self::from_parts(session, backend)
    }

    /// Wire with an arbitrary backend sharing `session`.
    pub fn from_parts(session: SharedSessionStore, backend: SharedBackend) -> Self {
        let cache: SharedEntityCache = Arc::new(EntityCache::new());
        let signal = AuthSignal::new();
        Self {
            auth: AuthWorkflow::new(
                Arc::clone(&backend),
                Arc::clone(&session),
                Arc::clone(&cache),
                signal.clone(),
            ),
            tasks: TaskWorkflow::new(backend, Arc::clone(&cache), signal),
            session,
            cache,
        }
    }
}
