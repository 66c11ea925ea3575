use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::{Client, Response, Url};
use serde::{de, Deserialize, Deserializer, Serialize};

use crate::config::Config;
use crate::error::ApiError;
use crate::message::{Message, Sender};

const SEND_FAILED: &str = "Failed to send message";
const FETCH_FAILED: &str = "Failed to fetch conversation";

/// The assistant's answer to one user message
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub session_id: String,
    pub reply: String,
}

/// The two backend calls the widget depends on
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send a user message, continuing `session_id` if given
    async fn send_message(
        &self,
        message: &str,
        session_id: Option<&str>,
    ) -> Result<ChatReply, ApiError>;

    /// Fetch the full transcript of an existing conversation
    async fn get_conversation(&self, session_id: &str) -> Result<Vec<Message>, ApiError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Naive timestamp layouts accepted after RFC 3339, read as UTC
const NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Message ids may be stored as database integers
#[derive(Deserialize)]
#[serde(untagged)]
enum EntryId {
    Text(String),
    Number(serde_json::Number),
}

impl From<EntryId> for String {
    fn from(id: EntryId) -> Self {
        match id {
            EntryId::Text(text) => text,
            EntryId::Number(number) => number.to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Text(String),
    Millis(i64),
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
        .or_else(|| {
            raw.parse::<i64>()
                .ok()
                .and_then(DateTime::from_timestamp_millis)
        })
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    match RawTimestamp::deserialize(deserializer)? {
        RawTimestamp::Text(text) => parse_timestamp(&text)
            .ok_or_else(|| de::Error::custom(format!("unrecognised timestamp: {}", text))),
        RawTimestamp::Millis(millis) => DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| de::Error::custom(format!("timestamp out of range: {}", millis))),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryEntry {
    id: EntryId,
    role: String,
    content: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct ConversationResponse {
    messages: Vec<HistoryEntry>,
}

impl From<HistoryEntry> for Message {
    fn from(entry: HistoryEntry) -> Self {
        Message {
            id: entry.id.into(),
            sender: Sender::from_role(&entry.role),
            text: entry.content,
            created_at: entry.created_at,
        }
    }
}

/// HTTP client for the support backend
#[derive(Clone)]
pub struct ChatApiClient {
    client: Client,
    base_url: String,
}

impl ChatApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.to_string(),
        }
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::with_timeout(
            &config.api_url,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Build `{base_url}/seg/seg/...`, percent-encoding each segment
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
}

#[async_trait]
impl ChatBackend for ChatApiClient {
    async fn send_message(
        &self,
        message: &str,
        session_id: Option<&str>,
    ) -> Result<ChatReply, ApiError> {
        let url = self.endpoint(&["api", "chat"])?;
        tracing::debug!(%url, resumed = session_id.is_some(), "sending chat message");

        let response = self
            .client
            .post(url)
            .json(&ChatRequest {
                message,
                session_id,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error)
                .unwrap_or_else(|| SEND_FAILED.to_string());
            tracing::warn!(status = status.as_u16(), %message, "chat request rejected");
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let reply: ChatReply = decode(response).await?;
        tracing::debug!(session_id = %reply.session_id, "received chat reply");
        Ok(reply)
    }

    async fn get_conversation(&self, session_id: &str) -> Result<Vec<Message>, ApiError> {
        let url = self.endpoint(&["api", "conversations", session_id])?;
        tracing::debug!(%url, "fetching conversation");

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: FETCH_FAILED.to_string(),
            });
        }

        let conversation: ConversationResponse = decode(response).await?;
        Ok(conversation
            .messages
            .into_iter()
            .map(Message::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_handles_trailing_slash() {
        let a = ChatApiClient::new("http://localhost:4000");
        let b = ChatApiClient::new("http://localhost:4000/");
        assert_eq!(
            a.endpoint(&["api", "chat"]).unwrap().as_str(),
            "http://localhost:4000/api/chat"
        );
        assert_eq!(
            b.endpoint(&["api", "chat"]).unwrap().as_str(),
            "http://localhost:4000/api/chat"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path_and_encodes_id() {
        let client = ChatApiClient::new("https://example.com/support");
        let url = client
            .endpoint(&["api", "conversations", "a/b c"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/support/api/conversations/a%2Fb%20c"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let client = ChatApiClient::new("not a url");
        assert!(matches!(
            client.endpoint(&["api", "chat"]),
            Err(ApiError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_request_omits_missing_session() {
        let body = serde_json::to_value(ChatRequest {
            message: "hi",
            session_id: None,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({ "message": "hi" }));

        let body = serde_json::to_value(ChatRequest {
            message: "hi",
            session_id: Some("s-1"),
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({ "message": "hi", "sessionId": "s-1" }));
    }

    #[test]
    fn test_history_entry_conversion() {
        let raw = r#"{"messages":[
            {"id":"m1","role":"user","content":"hi","createdAt":"2024-05-01T10:00:00Z"},
            {"id":"m2","role":"assistant","content":"hello","createdAt":"2024-05-01T10:00:05.250Z"}
        ]}"#;
        let parsed: ConversationResponse = serde_json::from_str(raw).unwrap();
        let messages: Vec<Message> = parsed.messages.into_iter().map(Message::from).collect();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, "m1");
        assert_eq!(messages[0].sender, Sender::User);
        assert_eq!(messages[1].sender, Sender::Ai);
        assert_eq!(messages[1].text, "hello");
        assert_eq!(messages[1].created_at.timestamp_millis() % 1000, 250);
    }

    #[test]
    fn test_history_accepts_database_ids_and_timestamps() {
        let raw = r#"{"messages":[
            {"id":1,"role":"user","content":"hi","createdAt":"2024-05-01 10:00:00"},
            {"id":"m2","role":"assistant","content":"hello","createdAt":"2024-05-01T10:00:05"},
            {"id":3,"role":"assistant","content":"more","createdAt":"2024-05-01 10:00:07.500"},
            {"id":"m4","role":"user","content":"ok","createdAt":1714557610000}
        ]}"#;
        let parsed: ConversationResponse = serde_json::from_str(raw).unwrap();
        let messages: Vec<Message> = parsed.messages.into_iter().map(Message::from).collect();

        let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "m2", "3", "m4"]);
        assert_eq!(messages[0].created_at.to_rfc3339(), "2024-05-01T10:00:00+00:00");
        assert_eq!(messages[1].created_at.to_rfc3339(), "2024-05-01T10:00:05+00:00");
        assert_eq!(messages[2].created_at.timestamp_millis() % 1000, 500);
        assert_eq!(messages[3].created_at.to_rfc3339(), "2024-05-01T10:00:10+00:00");
    }

    #[test]
    fn test_parse_timestamp_fallbacks() {
        assert_eq!(
            parse_timestamp("2024-05-01T12:00:00+02:00").map(|t| t.to_rfc3339()),
            Some("2024-05-01T10:00:00+00:00".to_string())
        );
        assert!(parse_timestamp("1714557600000").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_unreadable_timestamp_is_decode_error() {
        let raw = r#"{"messages":[{"id":"m1","role":"user","content":"hi","createdAt":"soon"}]}"#;
        assert!(serde_json::from_str::<ConversationResponse>(raw).is_err());
    }
}
