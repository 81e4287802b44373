//! Remote service client: one GET endpoint, `action` + `session` query
//! params, JSON replies.
//!
//! Transport, status, and decode failures are all normalized to [`ApiError`];
//! a well-formed reply carrying an `error` field is surfaced the same way.
//! No retries happen here — retry policy belongs to callers.

use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("service error: {0}")]
    Api(String),
}

/// Client for the chat service API. Cheap to clone; every call carries the
/// session id it was built with.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    session_id: String,
    http: reqwest::Client,
}

/// Outcome of a `join_pool` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolStatus {
    Matched { convo_id: String },
    Waiting,
}

/// One message from the conversation's broadcast stream.
#[derive(Debug, Clone, Deserialize)]
pub struct WireMessage {
    pub message_id: i64,
    pub message_text: String,
    pub sender_session: String,
    #[serde(default)]
    pub username: String,
}

/// `get_messages` reply: new messages past the cursor, and whether the
/// conversation has ended.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Inbox {
    #[serde(default)]
    pub messages: Vec<WireMessage>,
    #[serde(default)]
    pub convo_ended: bool,
}

#[derive(Debug, Deserialize)]
struct PoolReply {
    #[serde(default)]
    status: String,
    #[serde(default)]
    convo_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SendReply {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CountReply {
    count: u64,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, session_id: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session_id: session_id.into(),
            http,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Issue one API call. Every call carries `action` and the session id.
    pub async fn call(&self, action: &str, params: &[(&str, &str)]) -> Result<Value, ApiError> {
        let mut query: Vec<(&str, &str)> = Vec::with_capacity(params.len() + 2);
        query.push(("action", action));
        query.push(("session", self.session_id.as_str()));
        query.extend_from_slice(params);
        let res = self.http.get(&self.base_url).query(&query).send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ApiError::Api(format!("{} {}", status, body)));
        }
        let value: Value = res.json().await?;
        if let Some(message) = value.get("error").and_then(Value::as_str) {
            return Err(ApiError::Api(message.to_string()));
        }
        Ok(value)
    }

    pub async fn register_online(&self, username: &str) -> Result<(), ApiError> {
        self.call("register_online", &[("username", username)])
            .await
            .map(|_| ())
    }

    pub async fn heartbeat(&self) -> Result<(), ApiError> {
        self.call("heartbeat", &[]).await.map(|_| ())
    }

    pub async fn online_count(&self) -> Result<u64, ApiError> {
        let value = self.call("get_online_count", &[]).await?;
        let reply: CountReply = decode(value)?;
        Ok(reply.count)
    }

    pub async fn set_username(&self, username: &str) -> Result<(), ApiError> {
        self.call("set_username", &[("username", username)])
            .await
            .map(|_| ())
    }

    pub async fn join_pool(&self) -> Result<PoolStatus, ApiError> {
        let value = self.call("join_pool", &[]).await?;
        let reply: PoolReply = decode(value)?;
        match (reply.status.as_str(), reply.convo_id) {
            ("matched", Some(convo_id)) => Ok(PoolStatus::Matched { convo_id }),
            ("waiting", _) => Ok(PoolStatus::Waiting),
            (other, _) => Err(ApiError::Api(format!("unexpected pool status {:?}", other))),
        }
    }

    pub async fn cancel_search(&self) -> Result<(), ApiError> {
        self.call("cancel_search", &[]).await.map(|_| ())
    }

    /// Send a message; returns the server-assigned message id.
    pub async fn send_message(&self, convo_id: &str, text: &str) -> Result<i64, ApiError> {
        let value = self
            .call("send_message", &[("convo_id", convo_id), ("message", text)])
            .await?;
        let reply: SendReply = decode(value)?;
        match (reply.status.as_str(), reply.message_id) {
            ("sent", Some(id)) => Ok(id),
            _ => Err(ApiError::Api("send not acknowledged".to_string())),
        }
    }

    /// Fetch messages with ids greater than `after`.
    pub async fn fetch_messages(&self, convo_id: &str, after: i64) -> Result<Inbox, ApiError> {
        let after = after.to_string();
        let value = self
            .call(
                "get_messages",
                &[("convo_id", convo_id), ("after", after.as_str())],
            )
            .await?;
        decode(value)
    }

    pub async fn end_chat(&self, convo_id: &str) -> Result<(), ApiError> {
        self.call("end_chat", &[("convo_id", convo_id)])
            .await
            .map(|_| ())
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::Api(format!("malformed reply: {}", e)))
}
