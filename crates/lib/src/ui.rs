//! Events the core emits for a presentation adapter to render.
//!
//! The core never draws anything. It pushes `UiEvent`s into an mpsc channel
//! and the front-end renders them. Message rendering is keyed by id; a
//! renderer must treat repeated ids as idempotent.

use std::fmt;

/// The four screens of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// First-run name entry.
    Username,
    /// Idle/welcome, ready to search.
    Welcome,
    /// Searching for a stranger.
    Waiting,
    /// Active conversation.
    Chat,
}

/// Render key for a chat message. Locally authored messages start with a
/// provisional `Local` id and are reconciled to a `Server` id once the
/// service acknowledges the send.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageId {
    Local(u64),
    Server(i64),
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Local(n) => write!(f, "local-{}", n),
            MessageId::Server(id) => write!(f, "{}", id),
        }
    }
}

/// One rendered chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    pub id: MessageId,
    pub author: String,
    pub text: String,
    pub origin_self: bool,
}

/// Everything the core tells the presentation adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// Switch to a screen.
    Screen(Screen),
    /// Most recently fetched online count.
    OnlineCount(u64),
    /// Render a message under its id.
    Message(ChatLine),
    /// Remove a provisional message (it is re-sent under its server id).
    Retract(MessageId),
    /// Mark a provisional message as failed; it stays visible, dimmed.
    SendFailed(MessageId),
    /// Out-of-band system line ("You are now connected!", ...).
    System(String),
    /// The one blocking failure notification (username assignment failed).
    Notice(String),
}
