use ratatui::layout::Rect;
use tracing::{debug, info, warn};

use crate::api::{ApiError, ChatRequest, ChatResponse, HealthResponse};
use crate::page::Page;

pub const STATUS_CHECKING: &str = "Checking server...";
pub const STATUS_KEY_PRESENT: &str = "API key detected. Ready to chat.";
pub const STATUS_KEY_MISSING: &str = "Set GOOGLE_API_KEY to enable the demo.";
pub const STATUS_UNREACHABLE: &str = "Unable to reach server";
pub const STATUS_THINKING: &str = "Thinking...";
pub const STATUS_READY: &str = "Ready";

pub const EMPTY_REPLY: &str = "(No response)";
pub const FAILURE_BUBBLE: &str = "Sorry, I hit an error. Check the API key or try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Agent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bubble {
    pub role: Role,
    pub text: String,
}

impl Bubble {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            role: Role::Agent,
            text: text.into(),
        }
    }
}

/// A chat turn that has been handed to the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChat {
    pub seq: u64,
    pub request: ChatRequest,
}

/// Status line for the outcome of a health check.
pub fn health_status(result: &Result<HealthResponse, ApiError>) -> &'static str {
    match result {
        Ok(health) if health.has_api_key() => STATUS_KEY_PRESENT,
        Ok(_) => STATUS_KEY_MISSING,
        Err(_) => STATUS_UNREACHABLE,
    }
}

/// The text an agent bubble shows for a reply; blank replies get a placeholder.
pub fn reply_text(reply: Option<String>) -> String {
    reply
        .filter(|reply| !reply.is_empty())
        .unwrap_or_else(|| EMPTY_REPLY.to_string())
}

pub struct App {
    pub should_quit: bool,

    // Conversation state
    transcript: Vec<Bubble>,
    status: String,
    session_id: Option<String>,
    user_id: String,
    latest_seq: u64,
    awaiting: bool,

    // Input state
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars

    // Page state
    pub page: Page,

    // Areas for mouse hit-testing (updated during render)
    pub demo_button_area: Option<Rect>,
    pub details_button_area: Option<Rect>,
}

impl App {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            should_quit: false,

            transcript: Vec::new(),
            status: STATUS_CHECKING.to_string(),
            session_id: None,
            user_id: user_id.into(),
            latest_seq: 0,
            awaiting: false,

            input: String::new(),
            cursor: 0,

            page: Page::default(),

            demo_button_area: None,
            details_button_area: None,
        }
    }

    pub fn transcript(&self) -> &[Bubble] {
        &self.transcript
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Whether the most recent submission is still waiting for its reply.
    pub fn is_awaiting_reply(&self) -> bool {
        self.awaiting
    }

    pub fn apply_health(&mut self, result: Result<HealthResponse, ApiError>) {
        match &result {
            Ok(health) => info!(
                has_api_key = health.has_api_key(),
                status = health.status.as_deref().unwrap_or("unknown"),
                "health check completed"
            ),
            Err(err) => warn!(status = ?err.status(), error = %err, "health check failed"),
        }
        // A late health check must not hide that a reply is on its way.
        if self.awaiting {
            return;
        }
        self.status = health_status(&result).to_string();
    }

    /// Take the typed message and turn it into a request. Blank input is
    /// ignored. The user bubble is shown before anything goes out.
    pub fn submit(&mut self) -> Option<PendingChat> {
        let message = self.input.trim().to_string();
        if message.is_empty() {
            return None;
        }

        self.push_bubble(Bubble::user(message.clone()));
        self.input.clear();
        self.cursor = 0;
        self.status = STATUS_THINKING.to_string();

        self.latest_seq += 1;
        self.awaiting = true;

        let pending = PendingChat {
            seq: self.latest_seq,
            request: ChatRequest {
                message,
                session_id: self.session_id.clone(),
                user_id: self.user_id.clone(),
            },
        };
        info!(seq = pending.seq, has_session = self.session_id.is_some(), "chat submitted");
        Some(pending)
    }

    /// Apply the outcome of request `seq`. Only the latest submission's
    /// outcome is applied; returns false when the result was stale.
    pub fn apply_chat(&mut self, seq: u64, result: Result<ChatResponse, ApiError>) -> bool {
        if seq != self.latest_seq {
            debug!(seq, latest = self.latest_seq, "discarding stale chat result");
            return false;
        }
        self.awaiting = false;

        match result {
            Ok(response) => {
                if let Some(session_id) = response.session_id {
                    self.session_id = Some(session_id);
                }
                let reply = reply_text(response.reply);
                info!(seq, reply_len = reply.len(), "chat reply received");
                self.push_bubble(Bubble::agent(reply));
                self.status = STATUS_READY.to_string();
            }
            Err(err) => {
                warn!(seq, status = ?err.status(), error = %err, "chat request failed");
                self.status = err.to_string();
                self.push_bubble(Bubble::agent(FAILURE_BUBBLE));
            }
        }
        true
    }

    fn push_bubble(&mut self, bubble: Bubble) {
        self.transcript.push(bubble);
        self.page.follow_tail();
    }

    /// Advance animations (called by Tick event)
    pub fn tick(&mut self) {
        self.page.tick();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::FALLBACK_DETAIL;
    use pretty_assertions::assert_eq;
    use reqwest::StatusCode;
    use serde_json::json;

    fn app_with_input(text: &str) -> App {
        let mut app = App::new("demo-user");
        app.input = text.to_string();
        app.cursor = text.chars().count();
        app
    }

    fn reply(text: &str, session: &str) -> Result<ChatResponse, ApiError> {
        Ok(ChatResponse {
            reply: Some(text.to_string()),
            session_id: Some(session.to_string()),
        })
    }

    fn health(flag: serde_json::Value) -> Result<HealthResponse, ApiError> {
        Ok(serde_json::from_value(json!({"status": "ok", "has_api_key": flag})).unwrap())
    }

    #[test]
    fn blank_input_is_a_no_op() {
        for text in ["", "   ", "\t \n"] {
            let mut app = app_with_input(text);
            assert_eq!(app.submit(), None);
            assert!(app.transcript().is_empty());
            assert_eq!(app.status(), STATUS_CHECKING);
            assert!(!app.is_awaiting_reply());
        }
    }

    #[test]
    fn user_bubble_is_shown_before_the_reply() {
        let mut app = app_with_input("  Hello ");
        let pending = app.submit().unwrap();

        assert_eq!(app.transcript(), [Bubble::user("Hello")]);
        assert_eq!(app.input, "");
        assert_eq!(app.cursor, 0);
        assert_eq!(app.status(), STATUS_THINKING);
        assert_eq!(
            pending.request,
            ChatRequest {
                message: "Hello".to_string(),
                session_id: None,
                user_id: "demo-user".to_string(),
            }
        );

        assert!(app.apply_chat(pending.seq, reply("Hi there", "abc123")));
        assert_eq!(
            app.transcript(),
            [Bubble::user("Hello"), Bubble::agent("Hi there")]
        );
        assert_eq!(app.status(), STATUS_READY);
    }

    #[test]
    fn session_id_is_carried_into_the_next_turn() {
        let mut app = app_with_input("Hello");
        let first = app.submit().unwrap();
        app.apply_chat(first.seq, reply("Hi there", "abc123"));
        assert_eq!(app.session_id(), Some("abc123"));

        app.input = "What can I deduct?".to_string();
        let second = app.submit().unwrap();
        assert_eq!(second.request.session_id.as_deref(), Some("abc123"));
    }

    #[test]
    fn empty_reply_shows_placeholder() {
        let mut app = app_with_input("Hello");
        let pending = app.submit().unwrap();
        app.apply_chat(pending.seq, reply("", "abc123"));
        assert_eq!(app.transcript().last(), Some(&Bubble::agent(EMPTY_REPLY)));

        app.input = "again".to_string();
        let pending = app.submit().unwrap();
        app.apply_chat(
            pending.seq,
            Ok(ChatResponse {
                reply: None,
                session_id: None,
            }),
        );
        assert_eq!(app.transcript().last(), Some(&Bubble::agent(EMPTY_REPLY)));
        assert_eq!(app.session_id(), Some("abc123"));
    }

    #[test]
    fn rejection_sets_status_and_appends_apology() {
        let mut app = app_with_input("Hello");
        let pending = app.submit().unwrap();
        app.apply_chat(
            pending.seq,
            Err(ApiError::Rejected {
                status: StatusCode::TOO_MANY_REQUESTS,
                detail: "Rate limited".to_string(),
            }),
        );

        assert_eq!(app.status(), "Rate limited");
        assert_eq!(
            app.transcript(),
            [Bubble::user("Hello"), Bubble::agent(FAILURE_BUBBLE)]
        );
        assert!(!app.is_awaiting_reply());
    }

    #[test]
    fn apology_text_does_not_depend_on_cause() {
        let mut app = app_with_input("Hello");
        let pending = app.submit().unwrap();
        let decode = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        app.apply_chat(pending.seq, Err(ApiError::Decode(decode)));
        assert_eq!(app.transcript().last(), Some(&Bubble::agent(FAILURE_BUBBLE)));

        app.input = "again".to_string();
        let pending = app.submit().unwrap();
        app.apply_chat(
            pending.seq,
            Err(ApiError::Rejected {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                detail: FALLBACK_DETAIL.to_string(),
            }),
        );
        assert_eq!(app.status(), FALLBACK_DETAIL);
        assert_eq!(app.transcript().last(), Some(&Bubble::agent(FAILURE_BUBBLE)));
    }

    #[test]
    fn stale_results_are_discarded() {
        let mut app = app_with_input("first");
        let first = app.submit().unwrap();
        app.input = "second".to_string();
        let second = app.submit().unwrap();
        assert!(second.seq > first.seq);

        assert!(!app.apply_chat(first.seq, reply("late", "old-session")));
        assert_eq!(app.status(), STATUS_THINKING);
        assert_eq!(app.session_id(), None);
        assert!(app.is_awaiting_reply());

        assert!(app.apply_chat(second.seq, reply("fresh", "new-session")));
        assert_eq!(
            app.transcript(),
            [
                Bubble::user("first"),
                Bubble::user("second"),
                Bubble::agent("fresh"),
            ]
        );
        assert_eq!(app.session_id(), Some("new-session"));

        // Arriving after the fresh one changes nothing either.
        assert!(!app.apply_chat(first.seq, reply("later still", "old-session")));
        assert_eq!(app.transcript().len(), 3);
    }

    #[test]
    fn health_result_sets_status() {
        let mut app = App::new("demo-user");
        assert_eq!(app.status(), STATUS_CHECKING);

        app.apply_health(health(json!(true)));
        assert_eq!(app.status(), "API key detected. Ready to chat.");

        app.apply_health(health(json!(false)));
        assert_eq!(app.status(), "Set GOOGLE_API_KEY to enable the demo.");

        app.apply_health(Err(ApiError::Rejected {
            status: StatusCode::SERVICE_UNAVAILABLE,
            detail: FALLBACK_DETAIL.to_string(),
        }));
        assert_eq!(app.status(), STATUS_UNREACHABLE);
    }

    #[test]
    fn late_health_result_keeps_thinking_status() {
        let mut app = app_with_input("Hello");
        let pending = app.submit().unwrap();

        app.apply_health(health(json!(true)));
        assert_eq!(app.status(), STATUS_THINKING);

        app.apply_chat(pending.seq, reply("Hi there", "abc123"));
        assert_eq!(app.status(), STATUS_READY);
    }
}
