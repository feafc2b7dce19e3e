//! Vault — AES-256-GCM encryption at rest for stored API keys.
//!
//! User settings hold provider secrets, so they never touch disk in
//! plaintext. Values are encrypted with a randomly generated 256-bit key
//! kept next to the workspace (`vault.key`, created on first use) and
//! stored as `vault:` + base64(nonce + ciphertext). Values without the
//! prefix are returned as-is, which allows graceful migration from
//! plaintext settings files.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as B64, Engine};
use rand::RngCore;
use std::fs;
use std::path::{Path, PathBuf};

/// Prefix for encrypted values stored on disk.
const VAULT_PREFIX: &str = "vault:";

/// AES-256-GCM nonce length (96 bits).
const NONCE_LEN: usize = 12;

/// AES-256 key length (256 bits).
const KEY_LEN: usize = 32;

/// Handle to one vault key file.
pub struct Vault {
    key_path: PathBuf,
}

impl Vault {
    /// Vault whose key lives at `<dir>/vault.key`.
    pub fn new(dir: &Path) -> Self {
        Self {
            key_path: dir.join("vault.key"),
        }
    }

    /// Encrypt a plaintext secret into a `vault:...` storage string.
    pub fn encrypt(&self, plaintext: &str) -> anyhow::Result<String> {
        let key = self.load_or_create_key()?;
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| anyhow::anyhow!("cipher init: {}", e))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        #[allow(deprecated)]
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| anyhow::anyhow!("encrypt: {}", e))?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(format!("{}{}", VAULT_PREFIX, B64.encode(&combined)))
    }

    /// Decrypt a `vault:...` string. Unprefixed values pass through
    /// unchanged (plaintext migration path).
    pub fn decrypt(&self, value: &str) -> anyhow::Result<String> {
        if !value.starts_with(VAULT_PREFIX) {
            return Ok(value.to_string());
        }

        let encoded = &value[VAULT_PREFIX.len()..];
        let combined = B64
            .decode(encoded)
            .map_err(|e| anyhow::anyhow!("base64 decode: {}", e))?;

        if combined.len() < NONCE_LEN {
            anyhow::bail!("encrypted value too short");
        }

        let key = self.load_or_create_key()?;
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| anyhow::anyhow!("cipher init: {}", e))?;

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        #[allow(deprecated)]
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| anyhow::anyhow!("decrypt: {} (wrong vault.key?)", e))?;

        String::from_utf8(plaintext).map_err(|e| anyhow::anyhow!("utf8 decode: {}", e))
    }

    /// Returns `true` if the value looks like a vault-encrypted string.
    pub fn is_encrypted(value: &str) -> bool {
        value.starts_with(VAULT_PREFIX)
    }

    fn load_or_create_key(&self) -> anyhow::Result<[u8; KEY_LEN]> {
        if self.key_path.exists() {
            let data = fs::read(&self.key_path)?;
            if data.len() != KEY_LEN {
                anyhow::bail!(
                    "vault.key has invalid length: {} (expected {})",
                    data.len(),
                    KEY_LEN
                );
            }
            let mut key = [0u8; KEY_LEN];
            key.copy_from_slice(&data);
            return Ok(key);
        }

        let mut key = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);

        if let Some(parent) = self.key_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.key_path, key)?;
        tracing::info!("Generated new vault key at {}", self.key_path.display());

        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Vault::new(dir.path());

        let secret = "sk-super-secret-provider-key-1234567890";
        let encrypted = vault.encrypt(secret).unwrap();
        assert!(Vault::is_encrypted(&encrypted));
        assert!(!Vault::is_encrypted(secret));
        assert_ne!(encrypted, secret);

        assert_eq!(vault.decrypt(&encrypted).unwrap(), secret);
    }

    #[test]
    fn test_plaintext_passthrough() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Vault::new(dir.path());
        assert_eq!(vault.decrypt("not_encrypted").unwrap(), "not_encrypted");
    }

    #[test]
    fn test_different_nonces() {
        let dir = tempfile::tempdir().unwrap();
        let vault = Vault::new(dir.path());

        let a = vault.encrypt("same-secret").unwrap();
        let b = vault.encrypt("same-secret").unwrap();
        assert_ne!(a, b);
        assert_eq!(vault.decrypt(&a).unwrap(), "same-secret");
        assert_eq!(vault.decrypt(&b).unwrap(), "same-secret");
    }

    #[test]
    fn test_separate_vaults_do_not_share_keys() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let encrypted = Vault::new(dir_a.path()).encrypt("secret").unwrap();
        assert!(Vault::new(dir_b.path()).decrypt(&encrypted).is_err());
    }
}
