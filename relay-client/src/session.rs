//! Conversation state for one chat page view.
//!
//! [`SessionState`] is an immutable snapshot: every transition borrows the
//! current state and returns a new one. Callers keep or discard snapshots as
//! they like; nothing is mutated behind their back.
//!
//! ```text
//! Idle ──submit──▶ Sending ──begin_streaming──▶ StreamingResponse ──complete──▶ Idle
//!                     │                                │
//!                     └────────────fail────────────────┴──▶ Error ──acknowledge_error──▶ Idle
//! ```

use relay_types::{ChatMessage, ModelDescriptor, Role};

/// Stable identity of a displayed message.
///
/// Assigned from a monotonically increasing counter when the message is
/// created and never recomputed from content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

/// A message as shown in the conversation view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayMessage {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
}

/// Where the session is in the exchange lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// The user's message is recorded and the request is on its way.
    Sending,
    /// The relay accepted the request and the reply is arriving.
    StreamingResponse,
    /// The last exchange failed; holds the text shown to the user.
    Error(String),
}

/// What to send to the relay for an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    phase: Phase,
    messages: Vec<DisplayMessage>,
    models: Vec<ModelDescriptor>,
    selected_model: Option<String>,
    next_id: u64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            messages: Vec::new(),
            models: Vec::new(),
            selected_model: None,
            next_id: 1,
        }
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    // ── accessors ────────────────────────────────────────────────────────────

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn messages(&self) -> &[DisplayMessage] {
        &self.messages
    }

    pub fn models(&self) -> &[ModelDescriptor] {
        &self.models
    }

    pub fn selected_model(&self) -> Option<&str> {
        self.selected_model.as_deref()
    }

    /// The user-visible status line, if the last exchange failed.
    pub fn error(&self) -> Option<&str> {
        match &self.phase {
            Phase::Error(message) => Some(message.as_str()),
            _ => None,
        }
    }

    /// An exchange is in flight; input is disabled.
    pub fn is_busy(&self) -> bool {
        matches!(self.phase, Phase::Sending | Phase::StreamingResponse)
    }

    /// Whether the send control is enabled.
    pub fn can_send(&self) -> bool {
        !self.is_busy() && self.selected_model.is_some()
    }

    /// The conversation history in the shape the relay expects.
    pub fn history(&self) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .map(|m| ChatMessage::new(m.role, m.content.clone()))
            .collect()
    }

    // ── transitions ──────────────────────────────────────────────────────────

    /// Replace the model list.
    ///
    /// The current selection survives if it is still listed; otherwise the
    /// first model is selected. An empty list leaves nothing selected.
    pub fn with_models(&self, models: Vec<ModelDescriptor>) -> Self {
        let selected_model = self
            .selected_model
            .as_ref()
            .filter(|name| models.iter().any(|m| &m.name == *name))
            .cloned()
            .or_else(|| models.first().map(|m| m.name.clone()));

        Self {
            models,
            selected_model,
            ..self.clone()
        }
    }

    /// Select a listed model. Returns `None` for a name that is not listed.
    pub fn select_model(&self, name: &str) -> Option<Self> {
        self.models.iter().find(|m| m.name == name)?;
        Some(Self {
            selected_model: Some(name.to_owned()),
            ..self.clone()
        })
    }

    /// Append a message outside of an exchange, e.g. a system prompt.
    pub fn with_message(&self, role: Role, content: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.push(role, content.into());
        next
    }

    /// Accept user input.
    ///
    /// Returns `None`, leaving history untouched and sending nothing, when
    /// the input is blank, no model is selected, or an exchange is already in
    /// flight. Otherwise the user's message is appended immediately and the
    /// request to send is returned with the new snapshot.
    pub fn submit(&self, input: &str) -> Option<(Self, ChatRequest)> {
        if input.trim().is_empty() || self.is_busy() {
            return None;
        }
        let model = self.selected_model.clone()?;

        let mut next = self.clone();
        next.push(Role::User, input.to_owned());
        next.phase = Phase::Sending;

        let request = ChatRequest {
            model,
            messages: next.history(),
        };
        Some((next, request))
    }

    /// The relay accepted the request: add an empty assistant placeholder.
    pub fn begin_streaming(&self) -> Self {
        let mut next = self.clone();
        next.push(Role::Assistant, String::new());
        next.phase = Phase::StreamingResponse;
        next
    }

    /// Show the accumulated reply.
    ///
    /// The assistant message's content is replaced, not appended to, so a
    /// repeated update never duplicates text.
    pub fn apply_content(&self, content: &str) -> Self {
        let mut next = self.clone();
        if next.phase == Phase::StreamingResponse {
            if let Some(last) = next.messages.last_mut().filter(|m| m.role == Role::Assistant) {
                last.content = content.to_owned();
            }
        }
        next
    }

    /// The stream closed normally.
    pub fn complete(&self) -> Self {
        let mut next = self.clone();
        next.drop_empty_placeholder();
        next.phase = Phase::Idle;
        next
    }

    /// The exchange failed. An assistant placeholder that never received
    /// content is removed; partial content that did arrive is kept.
    pub fn fail(&self, message: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.drop_empty_placeholder();
        next.phase = Phase::Error(message.into());
        next
    }

    /// Dismiss the error status line.
    pub fn acknowledge_error(&self) -> Self {
        match self.phase {
            Phase::Error(_) => Self {
                phase: Phase::Idle,
                ..self.clone()
            },
            _ => self.clone(),
        }
    }

    // ── private helpers ──────────────────────────────────────────────────────

    fn push(&mut self, role: Role, content: String) {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        self.messages.push(DisplayMessage { id, role, content });
    }

    fn drop_empty_placeholder(&mut self) {
        if self.phase == Phase::StreamingResponse
            && self
                .messages
                .last()
                .is_some_and(|m| m.role == Role::Assistant && m.content.is_empty())
        {
            self.messages.pop();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn ready() -> SessionState {
        SessionState::new().with_models(vec![
            ModelDescriptor::named("llama3.2"),
            ModelDescriptor::named("qwen2.5"),
        ])
    }

    #[test]
    fn first_model_is_selected_by_default() {
        let s = ready();
        assert_eq!(s.selected_model(), Some("llama3.2"));
        assert!(s.can_send());
    }

    #[test]
    fn zero_models_disables_sending() {
        let s = SessionState::new().with_models(Vec::new());
        assert_eq!(s.selected_model(), None);
        assert!(!s.can_send());
        assert!(s.submit("hello").is_none());
    }

    #[test]
    fn selection_survives_refresh_when_still_listed() {
        let s = ready().select_model("qwen2.5").unwrap();
        let refreshed = s.with_models(vec![
            ModelDescriptor::named("mistral"),
            ModelDescriptor::named("qwen2.5"),
        ]);
        assert_eq!(refreshed.selected_model(), Some("qwen2.5"));
        let names: Vec<&str> = refreshed.models().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["mistral", "qwen2.5"]);

        let gone = s.with_models(vec![ModelDescriptor::named("mistral")]);
        assert_eq!(gone.selected_model(), Some("mistral"));
        assert!(s.select_model("unknown").is_none());
    }

    #[test]
    fn blank_input_is_ignored() {
        let s = ready();
        assert!(s.submit("").is_none());
        assert!(s.submit("  \t\n").is_none());
        assert!(s.messages().is_empty());
    }

    #[test]
    fn submit_appends_user_message_and_builds_request() {
        let s = ready().with_message(Role::System, "be brief");
        let (next, req) = s.submit("hi there").unwrap();

        assert_eq!(*next.phase(), Phase::Sending);
        assert_eq!(req.model, "llama3.2");
        assert_eq!(
            req.messages,
            vec![ChatMessage::system("be brief"), ChatMessage::user("hi there")]
        );
        // The previous snapshot is untouched.
        assert_eq!(s.messages().len(), 1);
        assert_eq!(*s.phase(), Phase::Idle);
    }

    #[test]
    fn busy_session_rejects_submission() {
        let (sending, _) = ready().submit("one").unwrap();
        assert!(!sending.can_send());
        assert!(sending.submit("two").is_none());
        assert!(sending.begin_streaming().submit("two").is_none());
    }

    #[test]
    fn streaming_replaces_placeholder_content() {
        let (sending, _) = ready().submit("hi").unwrap();
        let streaming = sending.begin_streaming();
        assert_eq!(streaming.messages().len(), 2);
        assert_eq!(streaming.messages()[1].content, "");

        let s = streaming.apply_content("Hel").apply_content("Hello");
        assert_eq!(s.messages().len(), 2);
        assert_eq!(s.messages()[1].content, "Hello");

        let done = s.complete();
        assert_eq!(*done.phase(), Phase::Idle);
        assert_eq!(done.messages()[1].content, "Hello");
        assert!(done.can_send());
    }

    #[test]
    fn message_ids_increase_monotonically() {
        let (s, _) = ready().submit("a").unwrap();
        let s = s.begin_streaming().apply_content("b").complete();
        let (s, _) = s.submit("c").unwrap();
        let ids: Vec<u64> = s.messages().iter().map(|m| m.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn ids_are_not_reused_after_placeholder_removal() {
        let (s, _) = ready().submit("a").unwrap();
        let failed = s.begin_streaming().fail("boom");
        let (s, _) = failed.submit("b").unwrap();
        let ids: Vec<u64> = s.messages().iter().map(|m| m.id.0).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn failure_before_content_removes_placeholder() {
        let (s, _) = ready().submit("hi").unwrap();
        let failed = s.begin_streaming().fail("connection reset");
        assert_eq!(failed.error(), Some("connection reset"));
        assert_eq!(failed.messages().len(), 1);
        assert_eq!(failed.messages()[0].role, Role::User);
    }

    #[test]
    fn failure_after_content_keeps_partial_reply() {
        let (s, _) = ready().submit("hi").unwrap();
        let failed = s.begin_streaming().apply_content("Hal").fail("connection reset");
        assert_eq!(failed.messages().len(), 2);
        assert_eq!(failed.messages()[1].content, "Hal");
    }

    #[test]
    fn failure_while_sending_keeps_user_message() {
        let (s, _) = ready().submit("hi").unwrap();
        let failed = s.fail("relay unreachable");
        assert_eq!(failed.messages().len(), 1);
        assert!(failed.can_send());

        let cleared = failed.acknowledge_error();
        assert_eq!(*cleared.phase(), Phase::Idle);
        assert_eq!(cleared.error(), None);
    }

    #[test]
    fn content_is_ignored_outside_streaming() {
        let s = ready().with_message(Role::Assistant, "earlier reply");
        assert_eq!(s.apply_content("overwrite"), s);
    }
}
