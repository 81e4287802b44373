//! Message stream for a matched conversation: inbound poll with
//! de-duplication and ordering, outbound optimistic send with
//! reconciliation.
//!
//! Own messages come back in the broadcast stream too; the cursor keeps them
//! (and any replayed ids) from rendering twice.

use crate::api::ApiClient;
use crate::pairing::PairingSignal;
use crate::ui::{ChatLine, MessageId, UiEvent};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// Inbound cursor: which server ids have been rendered, and the greatest id
/// seen — the `after` value for the next poll.
#[derive(Debug, Default)]
pub struct InboxCursor {
    seen: HashSet<i64>,
    watermark: i64,
}

impl InboxCursor {
    /// Admit an inbound message for rendering. False for duplicates and for
    /// the local session's own broadcast copies; true records the id and
    /// raises the watermark.
    pub fn admit(&mut self, id: i64, sender_session: &str, own_session: &str) -> bool {
        if sender_session == own_session || !self.seen.insert(id) {
            return false;
        }
        self.watermark = self.watermark.max(id);
        true
    }

    /// Record a successfully sent own message so the broadcast copy is never
    /// re-fetched or re-rendered.
    pub fn reconcile_sent(&mut self, id: i64) {
        self.seen.insert(id);
        self.watermark = self.watermark.max(id);
    }

    pub fn watermark(&self) -> i64 {
        self.watermark
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    pub fn reset(&mut self) {
        self.seen.clear();
        self.watermark = 0;
    }
}

/// Drives one conversation: the recurring `get_messages` poll and the
/// outbound send path. Constructed on match, stopped on end.
pub struct MessageStream {
    api: Arc<ApiClient>,
    convo_id: String,
    display_name: String,
    cursor: Mutex<InboxCursor>,
    running: AtomicBool,
    next_local: AtomicU64,
    events: mpsc::Sender<UiEvent>,
    signals: mpsc::Sender<PairingSignal>,
}

impl MessageStream {
    pub fn new(
        api: Arc<ApiClient>,
        convo_id: impl Into<String>,
        display_name: impl Into<String>,
        events: mpsc::Sender<UiEvent>,
        signals: mpsc::Sender<PairingSignal>,
    ) -> Self {
        Self {
            api,
            convo_id: convo_id.into(),
            display_name: display_name.into(),
            cursor: Mutex::new(InboxCursor::default()),
            running: AtomicBool::new(true),
            next_local: AtomicU64::new(1),
            events,
            signals,
        }
    }

    pub fn convo_id(&self) -> &str {
        &self.convo_id
    }

    /// Spawn the recurring inbound poll. The task exits once `stop` clears
    /// the running flag (or the conversation ends).
    pub fn start(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        let stream = self;
        tokio::spawn(async move {
            while stream.running.load(Ordering::SeqCst) {
                tokio::time::sleep(period).await;
                if !stream.running.load(Ordering::SeqCst) {
                    break;
                }
                stream.poll_once().await;
            }
            log::debug!("message poll stopped for {}", stream.convo_id);
        })
    }

    /// One `get_messages` round: admit new partner messages, detect
    /// partner-initiated end. Poll errors are logged and the next tick
    /// retries — the cursor guarantees nothing renders twice.
    async fn poll_once(&self) {
        let after = self.cursor.lock().await.watermark();
        let inbox = match self.api.fetch_messages(&self.convo_id, after).await {
            Ok(inbox) => inbox,
            Err(e) => {
                log::debug!("get_messages failed: {}", e);
                return;
            }
        };
        if inbox.convo_ended {
            log::info!("conversation {} ended by partner", self.convo_id);
            self.running.store(false, Ordering::SeqCst);
            if self.signals.send(PairingSignal::PartnerEnded).await.is_err() {
                log::debug!("stream: signal channel closed");
            }
            return;
        }
        for msg in inbox.messages {
            let admitted = self.cursor.lock().await.admit(
                msg.message_id,
                &msg.sender_session,
                self.api.session_id(),
            );
            if !admitted {
                continue;
            }
            self.emit(UiEvent::Message(ChatLine {
                id: MessageId::Server(msg.message_id),
                author: msg.username,
                text: msg.message_text,
                origin_self: false,
            }))
            .await;
        }
    }

    /// Send a message: optimistic render under a provisional id, then
    /// reconcile to the server id — or mark the provisional line failed.
    /// Empty text and sends after stop are no-ops.
    pub async fn send(&self, text: &str) {
        let text = text.trim();
        if text.is_empty() || !self.running.load(Ordering::SeqCst) {
            return;
        }
        let local = MessageId::Local(self.next_local.fetch_add(1, Ordering::SeqCst));
        self.emit(UiEvent::Message(ChatLine {
            id: local.clone(),
            author: self.display_name.clone(),
            text: text.to_string(),
            origin_self: true,
        }))
        .await;
        match self.api.send_message(&self.convo_id, text).await {
            Ok(server_id) => {
                self.cursor.lock().await.reconcile_sent(server_id);
                self.emit(UiEvent::Retract(local)).await;
                self.emit(UiEvent::Message(ChatLine {
                    id: MessageId::Server(server_id),
                    author: self.display_name.clone(),
                    text: text.to_string(),
                    origin_self: true,
                }))
                .await;
            }
            Err(e) => {
                log::warn!("send_message failed: {}", e);
                self.emit(UiEvent::SendFailed(local)).await;
            }
        }
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub async fn watermark(&self) -> i64 {
        self.cursor.lock().await.watermark()
    }

    pub async fn seen_count(&self) -> usize {
        self.cursor.lock().await.seen_count()
    }

    async fn emit(&self, event: UiEvent) {
        if self.events.send(event).await.is_err() {
            log::debug!("ui channel closed");
        }
    }
}
