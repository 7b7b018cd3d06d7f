//! Encrypted credential storage keyed by remote domain.
//!
//! Credentials (username plus personal-access-token) are stored one blob per
//! domain, AES-256-GCM encrypted under a process-wide master key that lives
//! base64-encoded in the same key-value store. The vault also owns the
//! one-way migration from the older per-provider cookie layout to the
//! domain-keyed scheme.
//!
//! # Public API
//! - [`Credential`]: Username/secret pair, serialized as `{username, password}`
//! - [`Vault`]: Key lifecycle, encrypt/decrypt, lookup/save/remove
//!
//! # Invariants
//! - One encrypted blob per domain
//! - A fresh 12-byte nonce per encryption; never reused for the same key
//! - No credential is persisted unencrypted once the vault is initialized

use crate::core::error::{Result, SyncError};
use crate::core::persist::KeyValueStore;
use crate::core::providers::provider_slug;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Entry name holding the base64 master key.
const MASTER_KEY_ENTRY: &str = "gitMasterKey";

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Legacy cookie-name suffixes, `{provider}{suffix}`. The first two held
/// real data in the old layout; the rest are historical alternates that are
/// cleanup-only.
const LEGACY_KEY_SUFFIXES: [&str; 7] = [
    "Username",
    "Token",
    "AccessToken",
    "Auth",
    "Credentials",
    "_username",
    "_token",
];

/// A stored host credential. The secret is a personal-access-token acting
/// as the password, which is also its name on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    #[serde(rename = "password")]
    pub secret: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }
}

/// Encrypted credential vault.
///
/// Constructed `Uninitialized`; [`Vault::ensure_encryption`] transitions it
/// to `Ready` by loading or generating the master key. Every other
/// operation fails with [`SyncError::VaultUninitialized`] before that.
pub struct Vault {
    store: Arc<dyn KeyValueStore>,
    cipher: Option<Aes256Gcm>,
}

impl Vault {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            cipher: None,
        }
    }

    /// True once the master key has been imported.
    pub fn is_ready(&self) -> bool {
        self.cipher.is_some()
    }

    /// Load the persisted master key, or generate and persist 32 random
    /// bytes, then import the material for use in encrypt/decrypt.
    /// Idempotent once ready.
    pub fn ensure_encryption(&mut self) -> Result<()> {
        if self.cipher.is_some() {
            return Ok(());
        }

        let key_bytes = match self.store.get(MASTER_KEY_ENTRY) {
            Some(encoded) => BASE64.decode(encoded)?,
            None => {
                let mut fresh = [0u8; KEY_LEN];
                OsRng.fill_bytes(&mut fresh);
                self.store.set(MASTER_KEY_ENTRY, &BASE64.encode(fresh))?;
                log::debug!("generated new master key");
                fresh.to_vec()
            }
        };

        if key_bytes.len() != KEY_LEN {
            return Err(SyncError::InvalidMasterKey);
        }
        self.cipher =
            Some(Aes256Gcm::new_from_slice(&key_bytes).map_err(|_| SyncError::InvalidMasterKey)?);
        Ok(())
    }

    fn cipher(&self) -> Result<&Aes256Gcm> {
        self.cipher.as_ref().ok_or(SyncError::VaultUninitialized)
    }

    /// Authenticated-encrypt UTF-8 text into base64(nonce ∥ ciphertext+tag).
    ///
    /// A fresh nonce is generated per call; two encryptions of the same
    /// plaintext yield different blobs.
    pub fn encrypt(&self, text: &str) -> Result<String> {
        let cipher = self.cipher()?;
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = cipher
            .encrypt(GenericArray::from_slice(&nonce), text.as_bytes())
            .map_err(|_| SyncError::EncryptionFailed)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(blob))
    }

    /// Decrypt a blob produced by [`Vault::encrypt`]. Any authentication
    /// failure surfaces as [`SyncError::DecryptionFailed`], which callers
    /// treat as credential invalid/corrupt rather than retry.
    pub fn decrypt(&self, blob: &str) -> Result<String> {
        let cipher = self.cipher()?;
        let decoded = BASE64.decode(blob)?;
        if decoded.len() < NONCE_LEN {
            return Err(SyncError::DecryptionFailed);
        }
        let (nonce, ciphertext) = decoded.split_at(NONCE_LEN);
        let plaintext = cipher
            .decrypt(GenericArray::from_slice(nonce), ciphertext)
            .map_err(|_| SyncError::DecryptionFailed)?;
        Ok(String::from_utf8(plaintext)?)
    }

    /// Read the credential stored for a domain.
    ///
    /// A blob that fails authentication is deleted so a corrupt credential
    /// cannot wedge future attempts. When no domain entry exists, the
    /// legacy per-provider cookies are consulted once: a successful decrypt
    /// is re-encrypted under the domain key and returned; either way every
    /// legacy key is removed.
    pub fn lookup(&self, domain: &str) -> Result<Option<Credential>> {
        self.cipher()?;

        if let Some(blob) = self.store.get(domain) {
            return match self.decrypt(&blob) {
                Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
                Err(SyncError::DecryptionFailed) | Err(SyncError::Base64(_)) => {
                    log::warn!("deleting corrupt credential entry for {domain}");
                    self.store.remove(domain)?;
                    Ok(None)
                }
                Err(err) => Err(err),
            };
        }

        self.migrate_legacy(domain)
    }

    /// JSON-encode, encrypt, and store a credential under its domain key.
    pub fn save(&self, domain: &str, credential: &Credential) -> Result<()> {
        let json = serde_json::to_string(credential)?;
        let blob = self.encrypt(&json)?;
        self.store.set(domain, &blob)
    }

    /// Delete the credential for a domain. Idempotent.
    pub fn remove(&self, domain: &str) -> Result<()> {
        self.cipher()?;
        self.store.remove(domain)
    }

    fn migrate_legacy(&self, domain: &str) -> Result<Option<Credential>> {
        let Some(provider) = provider_slug(domain) else {
            return Ok(None);
        };

        let username_blob = self.store.get(&format!("{provider}Username"));
        let token_blob = self.store.get(&format!("{provider}Token"));
        if username_blob.is_none() && token_blob.is_none() {
            return Ok(None);
        }

        let recovered = match (username_blob, token_blob) {
            (Some(username_blob), Some(token_blob)) => {
                match (self.decrypt(&username_blob), self.decrypt(&token_blob)) {
                    (Ok(username), Ok(secret)) => Some(Credential::new(username, secret)),
                    _ => None,
                }
            }
            _ => None,
        };

        // Stale legacy entries are removed whether or not they decrypted.
        for suffix in LEGACY_KEY_SUFFIXES {
            self.store.remove(&format!("{provider}{suffix}"))?;
        }

        if let Some(credential) = &recovered {
            log::debug!("migrated legacy {provider} credential to domain key {domain}");
            self.save(domain, credential)?;
        } else {
            log::warn!("discarded undecryptable legacy {provider} credential entries");
        }
        Ok(recovered)
    }
}
