use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// User id sent with every chat turn unless configured otherwise.
pub const DEFAULT_USER_ID: &str = "demo-user";

/// Shown when a rejected request carries no usable `detail`.
pub const FALLBACK_DETAIL: &str = "Request failed";

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: Option<String>,
    pub user_id: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChatResponse {
    #[serde(default)]
    pub reply: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct HealthResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub has_api_key: Value,
}

impl HealthResponse {
    /// Interprets the backend's key flag leniently: booleans, non-zero
    /// numbers and "true"/"1"/"yes" count as present.
    pub fn has_api_key(&self) -> bool {
        match &self.has_api_key {
            Value::Bool(flag) => *flag,
            Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
            Value::String(s) => matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "true" | "1" | "yes"
            ),
            Value::Null | Value::Array(_) | Value::Object(_) => false,
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Value,
}

/// Failure of a backend call. `Display` is the text the status label shows.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    #[error("{detail}")]
    Rejected { status: StatusCode, detail: String },
    #[error("{0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// HTTP status of a rejected request, if the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Transport(err) => err.status(),
            ApiError::Rejected { status, .. } => Some(*status),
            ApiError::Decode(_) => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ChatClient {
    client: Client,
    base_url: String,
}

impl ChatClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Builds a client whose requests give up after `timeout`. `None` waits forever.
    pub fn with_timeout(base_url: &str, timeout: Option<Duration>) -> Result<Self, ApiError> {
        let mut chat_client = Self::new(base_url);
        if let Some(timeout) = timeout {
            chat_client.client = Client::builder().timeout(timeout).build()?;
        }
        Ok(chat_client)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health(&self) -> Result<HealthResponse, ApiError> {
        let url = format!("{}/api/health", self.base_url);
        debug!(%url, "health check");

        let response = self.client.get(&url).send().await?;
        read_json(response).await
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ApiError> {
        let url = format!("{}/api/chat", self.base_url);
        debug!(
            %url,
            len = request.message.len(),
            has_session = request.session_id.is_some(),
            "chat request"
        );

        let response = self.client.post(&url).json(request).send().await?;
        read_json(response).await
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        return Err(ApiError::Rejected {
            status,
            detail: rejection_detail(&body),
        });
    }

    Ok(serde_json::from_slice(&body)?)
}

/// Pulls a human-readable message out of an error body. Plain string
/// details are used as-is; validation error lists contribute their `msg`s.
fn rejection_detail(body: &[u8]) -> String {
    let Ok(ErrorBody { detail }) = serde_json::from_slice::<ErrorBody>(body) else {
        return FALLBACK_DETAIL.to_string();
    };

    match detail {
        Value::String(text) if !text.trim().is_empty() => text,
        Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            if messages.is_empty() {
                FALLBACK_DETAIL.to_string()
            } else {
                messages.join("; ")
            }
        }
        _ => FALLBACK_DETAIL.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn health_reports_key_presence() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/health"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "ok", "has_api_key": true})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let health = ChatClient::new(&server.uri()).health().await.unwrap();
        assert!(health.has_api_key());
        assert_eq!(health.status.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn chat_posts_message_session_and_user() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_json(json!({
                "message": "Hello",
                "session_id": null,
                "user_id": "demo-user",
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"reply": "Hi there", "session_id": "abc123"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let request = ChatRequest {
            message: "Hello".to_string(),
            session_id: None,
            user_id: DEFAULT_USER_ID.to_string(),
        };
        let response = ChatClient::new(&format!("{}/", server.uri()))
            .chat(&request)
            .await
            .unwrap();

        assert_eq!(
            response,
            ChatResponse {
                reply: Some("Hi there".to_string()),
                session_id: Some("abc123".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn rejection_surfaces_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({"detail": "Rate limited"})))
            .mount(&server)
            .await;

        let request = ChatRequest {
            message: "Hello".to_string(),
            session_id: Some("abc123".to_string()),
            user_id: DEFAULT_USER_ID.to_string(),
        };
        let err = ChatClient::new(&server.uri()).chat(&request).await.unwrap_err();

        match &err {
            ApiError::Rejected { status, detail } => {
                assert_eq!(*status, StatusCode::TOO_MANY_REQUESTS);
                assert_eq!(detail, "Rate limited");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(err.to_string(), "Rate limited");
        assert_eq!(err.status(), Some(StatusCode::TOO_MANY_REQUESTS));
    }

    #[tokio::test]
    async fn rejection_without_json_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/health"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;

        let err = ChatClient::new(&server.uri()).health().await.unwrap_err();
        assert_eq!(err.to_string(), FALLBACK_DETAIL);
    }

    #[tokio::test]
    async fn malformed_success_body_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/health"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = ChatClient::new(&server.uri()).health().await.unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn validation_errors_are_joined() {
        let body = json!({
            "detail": [
                {"loc": ["body", "message"], "msg": "field required", "type": "missing"},
                {"loc": ["body", "user_id"], "msg": "str type expected", "type": "type_error"},
            ]
        });
        let detail = rejection_detail(body.to_string().as_bytes());
        assert_eq!(detail, "field required; str type expected");
    }

    #[test]
    fn blank_or_missing_detail_falls_back() {
        assert_eq!(rejection_detail(br#"{"detail": "  "}"#), FALLBACK_DETAIL);
        assert_eq!(rejection_detail(br#"{"error": "nope"}"#), FALLBACK_DETAIL);
        assert_eq!(rejection_detail(br#""just a string""#), FALLBACK_DETAIL);
    }

    #[test]
    fn key_flag_is_boolean_like() {
        let flag = |value: Value| HealthResponse { status: None, has_api_key: value }.has_api_key();

        assert!(flag(json!(true)));
        assert!(!flag(json!(false)));
        assert!(flag(json!(1)));
        assert!(!flag(json!(0)));
        assert!(flag(json!("Yes")));
        assert!(!flag(json!("false")));
        assert!(!flag(Value::Null));
    }

    #[test]
    fn missing_reply_and_session_deserialize_as_none() {
        let response: ChatResponse = serde_json::from_str(r#"{"reply": null}"#).unwrap();
        assert_eq!(response.reply, None);
        assert_eq!(response.session_id, None);
    }
}
