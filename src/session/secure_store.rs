//! Durable secure storage for session secrets.
//!
//! Provides:
//! - The [`SecureStore`] key/value seam
//! - [`FileSecureStore`], sealed values in `<dir>/secure-store.json`
//! - [`MemorySecureStore`], for tests and ephemeral sessions

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;

use super::crypto::{random_bytes, SealedValue, Sealer, SALT_LEN};

const STORE_FILE: &str = "secure-store.json";
const DEVICE_KEY_FILE: &str = "device.key";
const STORE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Secure store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Secure store is corrupt: {0}")]
    Corrupt(String),

    #[error("Secure store crypto failed: {0}")]
    Crypto(String),
}

/// Scoped key/value storage for secrets.
#[async_trait]
pub trait SecureStore: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Deleting a missing key is not an error.
    async fn delete_item(&self, key: &str) -> Result<(), StoreError>;
}

pub type SharedSecureStore = Arc<dyn SecureStore>;

/// On-disk layout of the store file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    /// Hex-encoded PBKDF2 salt, fixed for the life of the file.
    salt: String,
    #[serde(default)]
    entries: HashMap<String, SealedValue>,
}

/// File-backed store with every value sealed under AES-256-GCM.
///
/// The key is derived from the passphrase if one is given, otherwise from a
/// random device key created once next to the store file.
pub struct FileSecureStore {
    path: PathBuf,
    sealer: Sealer,
    file: RwLock<StoreFile>,
}

impl FileSecureStore {
    /// Open (or create) the store under `dir`.
    pub async fn open(dir: &Path, passphrase: Option<&str>) -> Result<Self, StoreError> {
        fs::create_dir_all(dir).await?;
        let path = dir.join(STORE_FILE);

        let file = if path.exists() {
            let content = fs::read_to_string(&path).await?;
            let file: StoreFile = serde_json::from_str(&content)
                .map_err(|e| StoreError::Corrupt(e.to_string()))?;
            if file.version != STORE_VERSION {
                return Err(StoreError::Corrupt(format!(
                    "unsupported version {}",
                    file.version
                )));
            }
            file
        } else {
            StoreFile {
                version: STORE_VERSION,
                salt: hex::encode(random_bytes::<SALT_LEN>()),
                entries: HashMap::new(),
            }
        };

        let salt = hex::decode(&file.salt).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let material = match passphrase.filter(|p| !p.is_empty()) {
            Some(p) => p.as_bytes().to_vec(),
            None => load_or_create_device_key(dir).await?,
        };
        let sealer = Sealer::derive(&material, &salt);

        tracing::debug!("Opened secure store at {}", path.display());

        Ok(Self {
            path,
            sealer,
            file: RwLock::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn save(&self, file: &StoreFile) -> Result<(), StoreError> {
        let content =
            serde_json::to_string_pretty(file).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        write_private(&self.path, content.as_bytes()).await
    }
}

#[async_trait]
impl SecureStore for FileSecureStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        let file = self.file.read().await;
        file.entries
            .get(key)
            .map(|sealed| self.sealer.open(sealed))
            .transpose()
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let sealed = self.sealer.seal(value)?;
        let mut file = self.file.write().await;
        let previous = file.entries.insert(key.to_string(), sealed);

        if let Err(e) = self.save(&file).await {
            // Keep memory in line with what is on disk.
            match previous {
                Some(old) => file.entries.insert(key.to_string(), old),
                None => file.entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn delete_item(&self, key: &str) -> Result<(), StoreError> {
        let mut file = self.file.write().await;
        let Some(previous) = file.entries.remove(key) else {
            return Ok(());
        };

        if let Err(e) = self.save(&file).await {
            file.entries.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }
}

async fn load_or_create_device_key(dir: &Path) -> Result<Vec<u8>, StoreError> {
    let path = dir.join(DEVICE_KEY_FILE);
    if path.exists() {
        let content = fs::read_to_string(&path).await?;
        return hex::decode(content.trim()).map_err(|e| StoreError::Corrupt(e.to_string()));
    }

    let key = random_bytes::<32>();
    write_private(&path, hex::encode(key).as_bytes()).await?;
    tracing::info!("Created device key at {}", path.display());
    Ok(key.to_vec())
}

/// Write a file readable only by the owner.
async fn write_private(path: &Path, content: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, content).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
    }

    fs::rename(&tmp, path).await?;
    Ok(())
}

/// In-memory store. Contents vanish with the process.
#[derive(Debug, Clone, Default)]
pub struct MemorySecureStore {
    items: Arc<RwLock<HashMap<String, String>>>,
}

impl MemorySecureStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecureStore for MemorySecureStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.items
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete_item(&self, key: &str) -> Result<(), StoreError> {
        self.items.write().await.remove(key);
        Ok(())
    }
}
