//! Session & presence: username lifecycle, online registration, heartbeat.
//!
//! The heartbeat is a best-effort liveness signal. Failures are logged at
//! debug and never surface; the loop runs for the application lifetime and
//! stops only on teardown.

use crate::api::{ApiClient, ApiError};
use crate::names;
use crate::profile::{ProfileStore, UserIdentity};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Display names are clamped to this many characters, never rejected.
pub const MAX_USERNAME_LEN: usize = 20;

/// Trim, substitute a random name when empty, and clamp to the length limit.
/// Never returns an empty string.
pub fn sanitize_username(requested: &str) -> String {
    let trimmed = requested.trim();
    let name = if trimmed.is_empty() {
        names::random_name()
    } else {
        trimmed.to_string()
    };
    name.chars().take(MAX_USERNAME_LEN).collect()
}

/// Owns the username lifecycle and the presence signals for one session.
pub struct SessionManager {
    api: Arc<ApiClient>,
    profile: ProfileStore,
    beating: AtomicBool,
}

impl SessionManager {
    pub fn new(api: Arc<ApiClient>, profile: ProfileStore) -> Self {
        Self {
            api,
            profile,
            beating: AtomicBool::new(false),
        }
    }

    pub fn load_username(&self) -> UserIdentity {
        self.profile.load_username()
    }

    /// Set the display name: sanitize, tell the service, persist on success,
    /// and refresh the presence entry under the new name. The caller decides
    /// the fallback when the service refuses.
    pub async fn set_username(&self, requested: &str) -> Result<UserIdentity, ApiError> {
        let name = sanitize_username(requested);
        self.api.set_username(&name).await?;
        if let Err(e) = self.profile.save_username(&name) {
            log::warn!("could not persist username: {}", e);
        }
        self.register(&name).await;
        Ok(UserIdentity {
            display_name: name,
            is_set: true,
        })
    }

    /// Register this session as online. Non-fatal: failures are logged.
    pub async fn register(&self, username: &str) {
        if let Err(e) = self.api.register_online(username).await {
            log::warn!("presence registration failed: {}", e);
        }
    }

    /// Fetch the online count; `None` on failure so the caller keeps the
    /// previously displayed value.
    pub async fn online_count(&self) -> Option<u64> {
        match self.api.online_count().await {
            Ok(count) => Some(count),
            Err(e) => {
                log::debug!("online count fetch failed: {}", e);
                None
            }
        }
    }

    /// Start the recurring heartbeat task.
    pub fn start_heartbeat(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        self.beating.store(true, Ordering::SeqCst);
        let manager = self;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(period).await;
                if !manager.beating.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(e) = manager.api.heartbeat().await {
                    log::debug!("heartbeat failed: {}", e);
                }
            }
            log::debug!("heartbeat loop stopped");
        })
    }

    pub fn stop_heartbeat(&self) {
        self.beating.store(false, Ordering::SeqCst);
    }
}
