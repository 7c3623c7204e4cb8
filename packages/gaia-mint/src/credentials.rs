//! Credential persistence for wallet sessions.
//!
//! Holds the signed-in account and the function-call keys issued to this
//! client. File-backed stores are optionally encrypted (AES-256-GCM).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::info;

/// A stored key. `account_id` is `None` while the key is pending sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredKey {
    #[serde(default)]
    pub account_id: Option<String>,
    pub public_key: String,
    pub secret_key: String,
}

/// Everything a credential store persists for one network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub network_id: String,
    /// Signed-in account, if any.
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub keys: Vec<StoredKey>,
}

impl Credentials {
    pub fn empty(network_id: &str) -> Self {
        Self {
            network_id: network_id.to_string(),
            ..Self::default()
        }
    }

    /// Key owned by `account_id`.
    pub fn account_key(&self, account_id: &str) -> Option<&StoredKey> {
        self.keys
            .iter()
            .find(|k| k.account_id.as_deref() == Some(account_id))
    }

    /// Store a pending key awaiting wallet approval. At most one key is
    /// pending; an earlier unapproved one is discarded.
    pub fn add_pending(&mut self, public_key: String, secret_key: String) {
        self.keys.retain(|k| k.account_id.is_some());
        self.keys.push(StoredKey {
            account_id: None,
            public_key,
            secret_key,
        });
    }

    /// Move the pending key with `public_key` to `account_id`, replacing any
    /// key the account already had and dropping every other pending key.
    /// Returns false if no such pending key exists.
    pub fn promote_pending(&mut self, account_id: &str, public_key: &str) -> bool {
        let Some(pos) = self
            .keys
            .iter()
            .position(|k| k.account_id.is_none() && k.public_key == public_key)
        else {
            return false;
        };
        let mut key = self.keys.remove(pos);
        key.account_id = Some(account_id.to_string());
        self.keys.retain(|k| {
            k.account_id.is_some() && k.account_id.as_deref() != Some(account_id)
        });
        self.keys.push(key);
        self.account_id = Some(account_id.to_string());
        true
    }

    /// Drop the signed-in marker and the account's key.
    pub fn forget_account(&mut self) {
        if let Some(account_id) = self.account_id.take() {
            self.keys
                .retain(|k| k.account_id.as_deref() != Some(account_id.as_str()));
        }
    }
}

/// Where the session manager keeps credentials between runs.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Credentials, crate::Error>;
    fn save(&self, credentials: &Credentials) -> Result<(), crate::Error>;
}

/// Credential file: encrypted (AES-256-GCM) for production, plaintext for dev.
pub struct FileCredentialStore {
    path: PathBuf,
    encryption_key: Option<[u8; 32]>,
}

impl FileCredentialStore {
    pub fn new_plaintext(path: PathBuf) -> Self {
        Self {
            path,
            encryption_key: None,
        }
    }

    pub fn new_encrypted(path: PathBuf, key_b64: &str) -> Result<Self, crate::Error> {
        let key_bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, key_b64)
            .map_err(|e| crate::Error::Config(format!("Invalid encryption key base64: {e}")))?;

        if key_bytes.len() != 32 {
            return Err(crate::Error::Config(format!(
                "Encryption key must be 32 bytes, got {}",
                key_bytes.len()
            )));
        }

        let mut key = [0u8; 32];
        key.copy_from_slice(&key_bytes);

        Ok(Self {
            path,
            encryption_key: Some(key),
        })
    }
}

impl CredentialStore for FileCredentialStore {
    fn save(&self, credentials: &Credentials) -> Result<(), crate::Error> {
        let json = serde_json::to_string_pretty(credentials).map_err(|e| {
            crate::Error::Credentials(format!("Failed to serialize credentials: {e}"))
        })?;

        let data = if let Some(key) = &self.encryption_key {
            encrypt_aes256gcm(key, json.as_bytes())?
        } else {
            json.into_bytes()
        };

        // Atomic write: tmp + rename
        let tmp = self.path.with_extension("tmp");
        if let Some(parent) = tmp.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                crate::Error::Credentials(format!("Failed to create credentials directory: {e}"))
            })?;
        }
        std::fs::write(&tmp, &data)
            .map_err(|e| crate::Error::Credentials(format!("Failed to write credentials: {e}")))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| crate::Error::Credentials(format!("Failed to rename credentials: {e}")))?;

        info!(path = %self.path.display(), keys = credentials.keys.len(), "Credentials saved");
        Ok(())
    }

    fn load(&self) -> Result<Credentials, crate::Error> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "No credentials found, starting signed out");
            return Ok(Credentials::default());
        }

        let data = std::fs::read(&self.path)
            .map_err(|e| crate::Error::Credentials(format!("Failed to read credentials: {e}")))?;

        let json_bytes = if let Some(key) = &self.encryption_key {
            decrypt_aes256gcm(key, &data)?
        } else {
            data
        };

        serde_json::from_slice(&json_bytes)
            .map_err(|e| crate::Error::Credentials(format!("Failed to parse credentials: {e}")))
    }
}

/// In-process credential store.
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<Credentials>,
}

impl MemoryCredentialStore {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            inner: Mutex::new(credentials),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Credentials, crate::Error> {
        Ok(self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn save(&self, credentials: &Credentials) -> Result<(), crate::Error> {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner()) = credentials.clone();
        Ok(())
    }
}

fn encrypt_aes256gcm(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, crate::Error> {
    use aes_gcm::aead::{Aead, KeyInit};
    use aes_gcm::{Aes256Gcm, Nonce};
    use rand::RngCore;

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| crate::Error::Credentials(format!("AES init failed: {e}")))?;

    let mut nonce_bytes = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| crate::Error::Credentials(format!("Encryption failed: {e}")))?;

    // nonce || ciphertext
    let mut result = Vec::with_capacity(12 + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

fn decrypt_aes256gcm(key: &[u8; 32], data: &[u8]) -> Result<Vec<u8>, crate::Error> {
    use aes_gcm::aead::{Aead, KeyInit};
    use aes_gcm::{Aes256Gcm, Nonce};

    if data.len() < 12 {
        return Err(crate::Error::Credentials(
            "Encrypted data too short (missing nonce)".into(),
        ));
    }

    let (nonce_bytes, ciphertext) = data.split_at(12);
    let nonce = Nonce::from_slice(nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| crate::Error::Credentials(format!("AES init failed: {e}")))?;

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| crate::Error::Credentials(format!("Decryption failed (wrong key?): {e}")))
}
