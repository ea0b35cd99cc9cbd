//! Accumulates streamed deltas into an assistant message.
//!
//! Per message the state machine is
//! `pending -> streaming -> {completed | errored | aborted}`; terminal states
//! are final and every later call is a no-op.

use tracing::debug;

use crate::chat::types::{ChatMessage, MessageStatus};
use crate::error::ChatError;
use crate::segment::{Segment, parse_segments};

/// One provider-independent increment. Either side may be absent or empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamDelta {
	pub content: Option<String>,
	pub thinking: Option<String>,
}

impl StreamDelta {
	pub fn content(text: impl Into<String>) -> Self {
		Self {
			content: Some(text.into()),
			thinking: None,
		}
	}

	pub fn thinking(text: impl Into<String>) -> Self {
		Self {
			content: None,
			thinking: Some(text.into()),
		}
	}

	pub fn has_content(&self) -> bool {
		self.content.as_deref().is_some_and(|c| !c.is_empty())
	}

	pub fn has_thinking(&self) -> bool {
		self.thinking.as_deref().is_some_and(|t| !t.is_empty())
	}
}

pub struct Reassembler<'a> {
	message: &'a mut ChatMessage,
}

impl<'a> Reassembler<'a> {
	pub fn new(message: &'a mut ChatMessage) -> Self {
		Self { message }
	}

	pub fn status(&self) -> MessageStatus {
		self.message.status
	}

	pub fn message(&self) -> &ChatMessage {
		self.message
	}

	/// Append whatever the delta carries. Returns whether either buffer grew.
	///
	/// A pending message only starts streaming once something was appended.
	pub fn on_delta(&mut self, delta: &StreamDelta) -> bool {
		if self.message.status.is_terminal() {
			debug!(message = %self.message.id, status = ?self.message.status, "dropping delta for finished message");
			return false;
		}

		let mut grew = false;
		if let Some(text) = delta.content.as_deref()
			&& !text.is_empty()
		{
			self.message.content.push_str(text);
			grew = true;
		}
		if let Some(text) = delta.thinking.as_deref()
			&& !text.is_empty()
		{
			self.message
				.thinking_content
				.get_or_insert_with(String::new)
				.push_str(text);
			grew = true;
		}
		if grew {
			self.message.status = MessageStatus::Streaming;
		}
		grew
	}

	pub fn on_complete(&mut self) -> bool {
		self.finish(MessageStatus::Completed)
	}

	/// Terminate with a failure. Content received so far is kept.
	pub fn on_error(&mut self, err: &ChatError) -> bool {
		if !self.finish(MessageStatus::Errored) {
			return false;
		}
		self.message.error = Some(err.to_string());
		true
	}

	/// Terminate because the caller cancelled. Not an error.
	pub fn on_abort(&mut self) -> bool {
		self.finish(MessageStatus::Aborted)
	}

	/// Full re-parse of the current content buffer.
	pub fn segments(&self) -> Vec<Segment> {
		parse_segments(&self.message.content)
	}

	fn finish(&mut self, status: MessageStatus) -> bool {
		if self.message.status.is_terminal() {
			debug!(message = %self.message.id, current = ?self.message.status, requested = ?status, "message already finished");
			return false;
		}
		self.message.status = status;
		true
	}
}
