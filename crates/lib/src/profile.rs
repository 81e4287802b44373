//! Persisted profile: session id and display name under the profile directory.
//!
//! One small file per key, read at startup and written only on identity
//! changes. This client is the sole writer of its own keys, so
//! last-writer-wins is acceptable.

use anyhow::{Context, Result};
use std::path::PathBuf;

const SESSION_FILE: &str = "session";
const USERNAME_FILE: &str = "username";

/// Sentinel display name before a human has confirmed or skipped entry.
pub const ANONYMOUS: &str = "Anonymous";

/// Display name plus whether a human has chosen it yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub display_name: String,
    pub is_set: bool,
}

impl UserIdentity {
    pub fn anonymous() -> Self {
        Self {
            display_name: ANONYMOUS.to_string(),
            is_set: false,
        }
    }
}

/// File-per-key store for the two persisted identity values.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    dir: PathBuf,
}

impl ProfileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn open_default() -> Self {
        Self::new(default_profile_dir())
    }

    fn read_key(&self, name: &str) -> Option<String> {
        let s = std::fs::read_to_string(self.dir.join(name)).ok()?;
        let t = s.trim().to_string();
        if t.is_empty() {
            None
        } else {
            Some(t)
        }
    }

    fn write_key(&self, name: &str, value: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating profile directory {}", self.dir.display()))?;
        std::fs::write(self.dir.join(name), value)
            .with_context(|| format!("writing profile key {}", name))?;
        Ok(())
    }

    pub fn load_session_id(&self) -> Option<String> {
        self.read_key(SESSION_FILE)
    }

    /// Read the persisted session id, or generate and persist a new one.
    /// Idempotent: later calls return the same id.
    pub fn ensure_session_id(&self) -> Result<String> {
        if let Some(id) = self.load_session_id() {
            return Ok(id);
        }
        let id = new_session_id();
        self.write_key(SESSION_FILE, &id)?;
        log::info!("created new session id {}", id);
        Ok(id)
    }

    pub fn load_username(&self) -> UserIdentity {
        match self.read_key(USERNAME_FILE) {
            Some(name) => UserIdentity {
                display_name: name,
                is_set: true,
            },
            None => UserIdentity::anonymous(),
        }
    }

    pub fn save_username(&self, name: &str) -> Result<()> {
        self.write_key(USERNAME_FILE, name)
    }
}

/// Session ids are `mhoro-<unix millis>-<128-bit token>`: unique per profile
/// directory, opaque to the service.
fn new_session_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    format!("mhoro-{}-{}", millis, uuid::Uuid::new_v4().simple())
}

/// Default profile directory (`~/.mhoro`).
pub fn default_profile_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".mhoro"))
        .unwrap_or_else(|| PathBuf::from(".mhoro"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> ProfileStore {
        let dir = std::env::temp_dir().join(format!("mhoro-profile-test-{}", uuid::Uuid::new_v4()));
        ProfileStore::new(dir)
    }

    #[test]
    fn ensure_session_id_is_stable() {
        let store = temp_store();
        let first = store.ensure_session_id().expect("create id");
        let second = store.ensure_session_id().expect("reload id");
        assert_eq!(first, second);
        assert!(first.starts_with("mhoro-"));
    }

    #[test]
    fn username_defaults_to_anonymous() {
        let store = temp_store();
        let identity = store.load_username();
        assert_eq!(identity.display_name, ANONYMOUS);
        assert!(!identity.is_set);
    }

    #[test]
    fn saved_username_round_trips() {
        let store = temp_store();
        store.save_username("Tambawoga").expect("save");
        let identity = store.load_username();
        assert_eq!(identity.display_name, "Tambawoga");
        assert!(identity.is_set);
    }
}
