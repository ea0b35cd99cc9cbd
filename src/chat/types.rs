use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const NEW_SESSION_TITLE: &str = "Percakapan Baru";
const TITLE_MAX_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	User,
	Assistant,
}

impl Role {
	pub fn as_str(self) -> &'static str {
		match self {
			Role::User => "user",
			Role::Assistant => "assistant",
		}
	}
}

/// Lifecycle of a message buffer. The last three states are terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageStatus {
	Pending,
	Streaming,
	#[default]
	Completed,
	Errored,
	Aborted,
}

impl MessageStatus {
	pub fn is_terminal(self) -> bool {
		matches!(
			self,
			MessageStatus::Completed | MessageStatus::Errored | MessageStatus::Aborted
		)
	}
}

/// One turn of a conversation.
///
/// `content` and `thinking_content` only grow, and only through
/// [`crate::reassembler::Reassembler`] while the message is in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
	pub id: String,
	pub role: Role,
	pub(crate) content: String,
	#[serde(default, alias = "thinking", skip_serializing_if = "Option::is_none")]
	pub(crate) thinking_content: Option<String>,
	#[serde(default)]
	pub(crate) status: MessageStatus,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub(crate) error: Option<String>,
	#[serde(alias = "timestamp", with = "chrono::serde::ts_milliseconds")]
	pub created_at: DateTime<Utc>,
	/// Flag from the older storage shape, replaced by `status`.
	#[serde(default, rename = "isStreaming", skip_serializing)]
	legacy_streaming: Option<bool>,
}

impl ChatMessage {
	fn new(role: Role, content: String, status: MessageStatus) -> Self {
		Self {
			id: Uuid::new_v4().to_string(),
			role,
			content,
			thinking_content: None,
			status,
			error: None,
			created_at: Utc::now(),
			legacy_streaming: None,
		}
	}

	pub fn user(content: impl Into<String>) -> Self {
		Self::new(Role::User, content.into(), MessageStatus::Completed)
	}

	/// Empty assistant message awaiting its first delta.
	pub fn assistant_placeholder() -> Self {
		Self::new(Role::Assistant, String::new(), MessageStatus::Pending)
	}

	pub fn content(&self) -> &str {
		&self.content
	}

	pub fn thinking_content(&self) -> Option<&str> {
		self.thinking_content.as_deref()
	}

	pub fn status(&self) -> MessageStatus {
		self.status
	}

	pub fn error(&self) -> Option<&str> {
		self.error.as_deref()
	}

	pub fn is_streaming(&self) -> bool {
		!self.status.is_terminal()
	}

	/// Freeze a message that was persisted mid-stream. Returns whether
	/// anything changed.
	pub(crate) fn repair_interrupted(&mut self) -> bool {
		let legacy = self.legacy_streaming.take();
		if self.is_streaming() || legacy == Some(true) {
			self.status = MessageStatus::Aborted;
			return true;
		}
		legacy.is_some()
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
	pub id: String,
	pub title: String,
	#[serde(default)]
	pub messages: Vec<ChatMessage>,
	#[serde(default)]
	pub model_id: String,
	#[serde(with = "chrono::serde::ts_milliseconds")]
	pub created_at: DateTime<Utc>,
	#[serde(with = "chrono::serde::ts_milliseconds")]
	pub updated_at: DateTime<Utc>,
}

impl ChatSession {
	pub fn new(model_id: impl Into<String>) -> Self {
		let now = Utc::now();
		Self {
			id: Uuid::new_v4().to_string(),
			title: NEW_SESSION_TITLE.to_string(),
			messages: Vec::new(),
			model_id: model_id.into(),
			created_at: now,
			updated_at: now,
		}
	}

	/// Append a message. The first user message names the session.
	pub fn push(&mut self, message: ChatMessage) {
		if self.messages.is_empty() && message.role == Role::User {
			self.title = title_from(&message.content);
		}
		self.messages.push(message);
		self.touch();
	}

	pub fn touch(&mut self) {
		self.updated_at = Utc::now();
	}

	pub fn message_mut(&mut self, id: &str) -> Option<&mut ChatMessage> {
		self.messages.iter_mut().rev().find(|m| m.id == id)
	}

	pub fn last_user_question(&self) -> Option<&str> {
		self.messages
			.iter()
			.rev()
			.find(|m| m.role == Role::User)
			.map(|m| m.content.as_str())
	}
}

fn title_from(content: &str) -> String {
	let mut chars = content.chars();
	let head: String = chars.by_ref().take(TITLE_MAX_CHARS).collect();
	if chars.next().is_some() {
		format!("{head}...")
	} else {
		head
	}
}

/// Listing entry; avoids shipping whole transcripts for a sidebar.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
	pub id: String,
	pub title: String,
	pub model_id: String,
	pub message_count: usize,
	#[serde(with = "chrono::serde::ts_milliseconds")]
	pub created_at: DateTime<Utc>,
	#[serde(with = "chrono::serde::ts_milliseconds")]
	pub updated_at: DateTime<Utc>,
}

impl From<&ChatSession> for SessionSummary {
	fn from(s: &ChatSession) -> Self {
		Self {
			id: s.id.clone(),
			title: s.title.clone(),
			model_id: s.model_id.clone(),
			message_count: s.messages.len(),
			created_at: s.created_at,
			updated_at: s.updated_at,
		}
	}
}
