//! Pairing state machine: idle → searching → matched → ended.
//!
//! The search poll reschedules itself rather than running on a fixed
//! interval: 2 s after a "waiting" reply, 3 s after an error or unknown
//! reply. It stops only on a match or explicit cancellation — the pool has
//! no retry cap.

use crate::api::{ApiClient, PoolStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

/// Lifecycle of a pairing. `Ended` is transient: the machine passes through
/// it during cleanup and lands back on `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingState {
    Idle,
    Searching,
    Matched,
    Ended,
}

/// Signals from the pairing and stream tasks to the composition root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingSignal {
    Matched { convo_id: String },
    PartnerEnded,
}

pub struct Pairing {
    api: Arc<ApiClient>,
    state: RwLock<PairingState>,
    convo_id: RwLock<Option<String>>,
    searching: AtomicBool,
    signals: mpsc::Sender<PairingSignal>,
}

impl Pairing {
    pub fn new(api: Arc<ApiClient>, signals: mpsc::Sender<PairingSignal>) -> Self {
        Self {
            api,
            state: RwLock::new(PairingState::Idle),
            convo_id: RwLock::new(None),
            searching: AtomicBool::new(false),
            signals,
        }
    }

    pub async fn state(&self) -> PairingState {
        *self.state.read().await
    }

    pub async fn convo_id(&self) -> Option<String> {
        self.convo_id.read().await.clone()
    }

    /// Begin searching. Valid only from `Idle` (logged no-op otherwise).
    /// Returns the poll task handle when the search actually started.
    pub async fn start_search(
        self: Arc<Self>,
        waiting_delay: Duration,
        backoff_delay: Duration,
    ) -> Option<JoinHandle<()>> {
        {
            let mut state = self.state.write().await;
            if *state != PairingState::Idle {
                log::warn!("start_search ignored in state {:?}", *state);
                return None;
            }
            *state = PairingState::Searching;
        }
        self.searching.store(true, Ordering::SeqCst);
        let pairing = self;
        Some(tokio::spawn(async move {
            pairing.run_search_loop(waiting_delay, backoff_delay).await;
        }))
    }

    async fn run_search_loop(&self, waiting_delay: Duration, backoff_delay: Duration) {
        while self.searching.load(Ordering::SeqCst) {
            match self.api.join_pool().await {
                Ok(PoolStatus::Matched { convo_id }) => {
                    if !self.searching.swap(false, Ordering::SeqCst) {
                        // Cancelled while the match reply was in flight.
                        return;
                    }
                    *self.state.write().await = PairingState::Matched;
                    *self.convo_id.write().await = Some(convo_id.clone());
                    log::info!("matched, conversation {}", convo_id);
                    if self
                        .signals
                        .send(PairingSignal::Matched { convo_id })
                        .await
                        .is_err()
                    {
                        log::debug!("pairing: signal channel closed");
                    }
                    return;
                }
                Ok(PoolStatus::Waiting) => tokio::time::sleep(waiting_delay).await,
                Err(e) => {
                    log::debug!("join_pool failed: {}", e);
                    tokio::time::sleep(backoff_delay).await;
                }
            }
        }
        log::debug!("search loop stopped");
    }

    /// Cancel an in-progress search. Idempotent; returns true when a search
    /// was actually cancelled. The service is notified best-effort.
    pub async fn cancel_search(&self) -> bool {
        if !self.searching.swap(false, Ordering::SeqCst) {
            return false;
        }
        {
            let mut state = self.state.write().await;
            if *state == PairingState::Searching {
                *state = PairingState::Idle;
            }
        }
        let api = Arc::clone(&self.api);
        tokio::spawn(async move {
            if let Err(e) = api.cancel_search().await {
                log::debug!("cancel_search notify failed: {}", e);
            }
        });
        true
    }

    /// Tear down a matched pairing: transient `Ended`, then `Idle`. Returns
    /// the conversation id that was active; `None` makes this a no-op, so a
    /// second call has no effect.
    pub async fn end(&self) -> Option<String> {
        let mut state = self.state.write().await;
        if *state != PairingState::Matched {
            return None;
        }
        *state = PairingState::Ended;
        let convo_id = self.convo_id.write().await.take();
        *state = PairingState::Idle;
        convo_id
    }
}
