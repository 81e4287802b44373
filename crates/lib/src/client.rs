//! Composition root: owns the components and their recurring tasks, turns
//! user intents into state transitions, and dispatches internal signals
//! (matched, partner ended) back into the state machine.
//!
//! Three recurring tasks exist: the heartbeat (whole lifetime), the search
//! poll and the message poll (mutually exclusive by construction). Every
//! spawned handle is held here so teardown can abort anything still running.

use crate::api::ApiClient;
use crate::config::{resolve_api_base, resolve_profile_dir, Config, Timings};
use crate::pairing::{Pairing, PairingSignal, PairingState};
use crate::profile::{ProfileStore, UserIdentity};
use crate::session::SessionManager;
use crate::stream::MessageStream;
use crate::ui::{Screen, UiEvent};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

const TEARDOWN_NOTIFY_TIMEOUT: Duration = Duration::from_secs(2);

pub struct ChatClient {
    api: Arc<ApiClient>,
    session: Arc<SessionManager>,
    pairing: Arc<Pairing>,
    identity: RwLock<UserIdentity>,
    stream: RwLock<Option<Arc<MessageStream>>>,
    events: mpsc::Sender<UiEvent>,
    signals: mpsc::Sender<PairingSignal>,
    timings: Timings,
    tasks: RwLock<Vec<JoinHandle<()>>>,
}

impl ChatClient {
    /// Build the client, register presence, start the heartbeat, and show
    /// the first screen. Events for the front-end arrive on `events`.
    pub async fn start(config: &Config, events: mpsc::Sender<UiEvent>) -> Result<Arc<Self>> {
        Self::start_with(config, events, Timings::default()).await
    }

    pub async fn start_with(
        config: &Config,
        events: mpsc::Sender<UiEvent>,
        timings: Timings,
    ) -> Result<Arc<Self>> {
        let profile = ProfileStore::new(resolve_profile_dir(config));
        let session_id = profile
            .ensure_session_id()
            .context("initializing session identity")?;
        log::info!("session {}", session_id);

        let api = Arc::new(ApiClient::new(resolve_api_base(config), session_id));
        let identity = profile.load_username();
        let session = Arc::new(SessionManager::new(Arc::clone(&api), profile));
        let (signal_tx, signal_rx) = mpsc::channel(8);
        let pairing = Arc::new(Pairing::new(Arc::clone(&api), signal_tx.clone()));

        let client = Arc::new(Self {
            api,
            session,
            pairing,
            identity: RwLock::new(identity),
            stream: RwLock::new(None),
            events,
            signals: signal_tx,
            timings,
            tasks: RwLock::new(Vec::new()),
        });

        client
            .session
            .register(&client.identity.read().await.display_name)
            .await;
        let heartbeat = Arc::clone(&client.session).start_heartbeat(client.timings.heartbeat);
        let dispatcher = tokio::spawn(Self::dispatch_signals(Arc::clone(&client), signal_rx));
        client.tasks.write().await.push(heartbeat);
        client.tasks.write().await.push(dispatcher);

        let first = if client.identity.read().await.is_set {
            Screen::Welcome
        } else {
            Screen::Username
        };
        client.emit(UiEvent::Screen(first)).await;
        client.refresh_online_count().await;
        Ok(client)
    }

    async fn dispatch_signals(client: Arc<Self>, mut signals: mpsc::Receiver<PairingSignal>) {
        while let Some(signal) = signals.recv().await {
            match signal {
                PairingSignal::Matched { convo_id } => client.on_matched(convo_id).await,
                PairingSignal::PartnerEnded => {
                    client
                        .emit(UiEvent::System("Stranger disconnected.".to_string()))
                        .await;
                    client.end_chat().await;
                }
            }
        }
        log::debug!("signal dispatcher stopped");
    }

    async fn on_matched(&self, convo_id: String) {
        let display_name = self.identity.read().await.display_name.clone();
        let stream = Arc::new(MessageStream::new(
            Arc::clone(&self.api),
            convo_id,
            display_name,
            self.events.clone(),
            self.signals.clone(),
        ));
        let handle = Arc::clone(&stream).start(self.timings.message_poll);
        *self.stream.write().await = Some(stream);
        self.tasks.write().await.push(handle);
        self.emit(UiEvent::Screen(Screen::Chat)).await;
        self.emit(UiEvent::System(
            "You are now connected! Say hi!".to_string(),
        ))
        .await;
    }

    /// Submit a typed display name. On service failure, shows the one
    /// blocking notice and falls back to a random name.
    pub async fn submit_username(&self, requested: &str) {
        match self.session.set_username(requested).await {
            Ok(identity) => self.adopt_identity(identity).await,
            Err(e) => {
                log::warn!("set_username failed: {}", e);
                self.emit(UiEvent::Notice(
                    "Error setting username. Using random name.".to_string(),
                ))
                .await;
                self.skip_username().await;
            }
        }
    }

    /// Skip name entry: take a random name. A failure here only logs; the
    /// previous identity stays in place.
    pub async fn skip_username(&self) {
        match self.session.set_username("").await {
            Ok(identity) => self.adopt_identity(identity).await,
            Err(e) => log::warn!("random name fallback failed: {}", e),
        }
    }

    async fn adopt_identity(&self, identity: UserIdentity) {
        log::info!("display name set to {}", identity.display_name);
        *self.identity.write().await = identity;
        self.emit(UiEvent::Screen(Screen::Welcome)).await;
        self.refresh_online_count().await;
    }

    /// Start looking for a stranger. No-op unless idle.
    pub async fn start_search(&self) {
        if self.pairing.state().await != PairingState::Idle {
            log::debug!("start_search ignored, pairing not idle");
            return;
        }
        // Waiting screen goes up before the first poll can resolve.
        self.emit(UiEvent::Screen(Screen::Waiting)).await;
        self.refresh_online_count().await;
        let handle = Arc::clone(&self.pairing)
            .start_search(self.timings.search_waiting, self.timings.search_backoff)
            .await;
        if let Some(handle) = handle {
            self.tasks.write().await.push(handle);
        }
    }

    /// Stop an in-progress search. Idempotent.
    pub async fn cancel_search(&self) {
        if self.pairing.cancel_search().await {
            self.emit(UiEvent::Screen(Screen::Welcome)).await;
        }
    }

    /// Send a message in the active conversation; silently ignored when no
    /// conversation is active.
    pub async fn send_message(&self, text: &str) {
        let stream = self.stream.read().await.clone();
        match stream {
            Some(stream) => stream.send(text).await,
            None => log::debug!("send ignored, no active conversation"),
        }
    }

    /// End the active chat: stop the message poll, notify the service
    /// best-effort, drop all message state, return to the welcome screen.
    /// Idempotent no-op outside `Matched`.
    pub async fn end_chat(&self) {
        if let Some(stream) = self.stream.write().await.take() {
            stream.stop();
        }
        let Some(convo_id) = self.pairing.end().await else {
            return;
        };
        let api = Arc::clone(&self.api);
        tokio::spawn(async move {
            if let Err(e) = api.end_chat(&convo_id).await {
                log::debug!("end_chat notify failed: {}", e);
            }
        });
        self.emit(UiEvent::System("Chat ended.".to_string())).await;
        self.emit(UiEvent::Screen(Screen::Welcome)).await;
        self.refresh_online_count().await;
    }

    /// Fetch and publish the online count; a failure keeps the last value
    /// on screen.
    pub async fn refresh_online_count(&self) {
        if let Some(count) = self.session.online_count().await {
            self.emit(UiEvent::OnlineCount(count)).await;
        }
    }

    /// Tear down: stop every recurring task and fire the courtesy end-chat
    /// notification. Delivery of that last call is not guaranteed.
    pub async fn shutdown(&self) {
        self.session.stop_heartbeat();
        self.pairing.cancel_search().await;
        if let Some(stream) = self.stream.write().await.take() {
            stream.stop();
        }
        if let Some(convo_id) = self.pairing.end().await {
            let notify = self.api.end_chat(&convo_id);
            match tokio::time::timeout(TEARDOWN_NOTIFY_TIMEOUT, notify).await {
                Ok(Err(e)) => log::debug!("teardown end_chat failed: {}", e),
                Err(_) => log::debug!("teardown end_chat timed out"),
                Ok(Ok(())) => {}
            }
        }
        for task in self.tasks.write().await.drain(..) {
            task.abort();
        }
        log::debug!("client shut down");
    }

    pub async fn identity(&self) -> UserIdentity {
        self.identity.read().await.clone()
    }

    pub async fn pairing_state(&self) -> PairingState {
        self.pairing.state().await
    }

    pub async fn convo_id(&self) -> Option<String> {
        self.pairing.convo_id().await
    }

    /// Inbound watermark of the active conversation, if any.
    pub async fn stream_watermark(&self) -> Option<i64> {
        let stream = self.stream.read().await.clone();
        match stream {
            Some(stream) => Some(stream.watermark().await),
            None => None,
        }
    }

    pub async fn has_active_stream(&self) -> bool {
        self.stream.read().await.is_some()
    }

    pub fn session_id(&self) -> &str {
        self.api.session_id()
    }

    async fn emit(&self, event: UiEvent) {
        if self.events.send(event).await.is_err() {
            log::debug!("ui channel closed");
        }
    }
}
