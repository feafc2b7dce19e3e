//! Per-user settings: provider API keys, stored encrypted.
//!
//! One JSON file maps user identity → settings. Keys pass through the
//! [`Vault`](crate::vault::Vault) before hitting disk and are decrypted
//! on read. A missing or corrupt file degrades to empty settings.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::vault::Vault;

/// Provider keys one user has saved. All optional; an empty string on
/// write clears the key.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct UserSettings {
    pub gemini_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
}

impl UserSettings {
    fn map_values(
        &self,
        mut f: impl FnMut(&str) -> anyhow::Result<String>,
    ) -> anyhow::Result<UserSettings> {
        let convert = |v: &Option<String>, f: &mut dyn FnMut(&str) -> anyhow::Result<String>| {
            v.as_deref()
                .filter(|s| !s.is_empty())
                .map(|s| f(s))
                .transpose()
        };
        Ok(UserSettings {
            gemini_api_key: convert(&self.gemini_api_key, &mut f)?,
            anthropic_api_key: convert(&self.anthropic_api_key, &mut f)?,
            openai_api_key: convert(&self.openai_api_key, &mut f)?,
        })
    }
}

/// File-backed settings store.
pub struct SettingsStore {
    path: PathBuf,
    vault: Vault,
}

impl SettingsStore {
    /// Store at `<dir>/user_settings.json`, vault key alongside it.
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join("user_settings.json"),
            vault: Vault::new(dir),
        }
    }

    /// Settings for one user, decrypted. Unknown user → defaults.
    pub fn get(&self, user: &str) -> UserSettings {
        let all = self.load_all();
        let Some(stored) = all.get(user) else {
            return UserSettings::default();
        };
        match stored.map_values(|v| self.vault.decrypt(v)) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(user, error = %e, "Failed to decrypt stored settings");
                UserSettings::default()
            }
        }
    }

    /// Encrypt and persist one user's settings. Values that are already
    /// vault ciphertext (a client echoing back what it was served) are
    /// stored as-is rather than wrapped a second time.
    pub fn save(&self, user: &str, settings: &UserSettings) -> anyhow::Result<()> {
        let mut all = self.load_all();
        let encrypted = settings.map_values(|v| {
            if Vault::is_encrypted(v) {
                Ok(v.to_string())
            } else {
                self.vault.encrypt(v)
            }
        })?;
        all.insert(user.to_string(), encrypted);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&all)?)?;
        Ok(())
    }

    fn load_all(&self) -> HashMap<String, UserSettings> {
        if !self.path.exists() {
            return HashMap::new();
        }
        match std::fs::read_to_string(&self.path)
            .map_err(anyhow::Error::from)
            .and_then(|c| Ok(serde_json::from_str(&c)?))
        {
            Ok(all) => all,
            Err(e) => {
                warn!(error = %e, "Settings file unreadable, starting empty");
                HashMap::new()
            }
        }
    }
}
