//! Drives one question from the user's message to a finished answer.

use futures::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use crate::chat::types::MessageStatus;
use crate::error::ChatError;
use crate::provider::api::provider_headers;
use crate::provider::client::{EMPTY_RESPONSE_NOTICE, stream_chat};
use crate::reassembler::{Reassembler, StreamDelta};
use crate::segment::Segment;
use crate::settings::ApiConfig;
use crate::state::{AppState, Turn};

/// What the presentation layer needs to redraw an in-flight message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatUpdate {
	pub session_id: String,
	pub message_id: String,
	pub phase: MessageStatus,
	pub segments: Vec<Segment>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub thinking: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

impl ChatUpdate {
	fn capture(session_id: &str, r: &Reassembler<'_>) -> Self {
		let message = r.message();
		Self {
			session_id: session_id.to_string(),
			message_id: message.id.clone(),
			phase: r.status(),
			segments: r.segments(),
			thinking: message.thinking_content().map(str::to_string),
			error: message.error().map(str::to_string),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CompletionNotice {
	Answered,
	ThinkingOnly,
	Empty,
}

impl CompletionNotice {
	pub fn message(self) -> &'static str {
		match self {
			CompletionNotice::Answered => "Jawaban selesai",
			CompletionNotice::ThinkingOnly => "AI selesai berpikir (tidak ada konten)",
			CompletionNotice::Empty => "Tidak ada respons dari AI",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TurnOutcome {
	Completed { notice: CompletionNotice },
	/// Stopped by the user. Not an error.
	Aborted,
	Failed { message: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ChatEvent {
	Started {
		session_id: String,
		user_message_id: String,
		message_id: String,
	},
	Update(ChatUpdate),
	Finished {
		session_id: String,
		message_id: String,
		outcome: TurnOutcome,
	},
}

impl ChatEvent {
	pub fn name(&self) -> &'static str {
		match self {
			ChatEvent::Started { .. } => "started",
			ChatEvent::Update(_) => "update",
			ChatEvent::Finished { .. } => "finished",
		}
	}
}

fn emit(events: &UnboundedSender<ChatEvent>, event: ChatEvent) {
	if events.send(event).is_err() {
		debug!("event receiver gone, turn continues");
	}
}

/// Ask `question` in `session_id` (or the current session, or a new one).
///
/// Configuration problems are returned as `Err` before any message is
/// created. Once the turn has started every failure, whether from the
/// provider or from saving, ends it as [`TurnOutcome::Failed`] and is
/// followed by a `Finished` event.
pub async fn send(
	state: &AppState,
	session_id: Option<&str>,
	question: &str,
	events: &UnboundedSender<ChatEvent>,
) -> Result<TurnOutcome, ChatError> {
	let question = question.trim();
	if question.is_empty() {
		return Err(ChatError::EmptyQuestion);
	}

	let api = state.api_config().await;
	api.require_key()?;
	provider_headers(&api)?;

	let turn = state.begin_turn(session_id, question).await?;
	let (session_id, message_id) = (turn.session_id.clone(), turn.message_id.clone());
	info!(
		session = %session_id,
		message = %message_id,
		model = %turn.request.model,
		history = turn.request.messages.len(),
		"turn started"
	);
	emit(
		events,
		ChatEvent::Started {
			session_id: session_id.clone(),
			user_message_id: turn.user_message_id.clone(),
			message_id: message_id.clone(),
		},
	);

	let result = run_turn(state, turn, api, events).await;
	state.end_stream(&session_id, &message_id).await;

	let outcome = result.unwrap_or_else(|e| {
		error!(session = %session_id, message = %message_id, error = %e, "turn could not be finished");
		TurnOutcome::Failed {
			message: e.to_string(),
		}
	});
	info!(session = %session_id, message = %message_id, outcome = ?outcome, "turn finished");
	emit(
		events,
		ChatEvent::Finished {
			session_id,
			message_id,
			outcome: outcome.clone(),
		},
	);
	Ok(outcome)
}

async fn run_turn(
	state: &AppState,
	turn: Turn,
	api: ApiConfig,
	events: &UnboundedSender<ChatEvent>,
) -> Result<TurnOutcome, ChatError> {
	let Turn {
		session_id,
		message_id,
		request,
		token,
		..
	} = turn;

	let mut stream = stream_chat(
		state.client.clone(),
		api,
		request,
		token.clone(),
		state.config.split_inline_think,
	);

	let mut saw_content = false;
	let mut saw_thinking = false;
	let mut failure = None;

	while let Some(item) = stream.next().await {
		if token.is_cancelled() {
			break;
		}
		let delta: StreamDelta = match item {
			Ok(d) => d,
			Err(e) => {
				failure = Some(e);
				break;
			}
		};

		if delta.has_thinking() && !saw_thinking {
			debug!(message = %message_id, "first thinking chunk");
			saw_thinking = true;
		}
		if delta.has_content() && delta.content.as_deref() != Some(EMPTY_RESPONSE_NOTICE) && !saw_content {
			debug!(message = %message_id, "first content chunk");
			saw_content = true;
		}

		let update = state
			.update_message(&session_id, &message_id, false, |r| {
				r.on_delta(&delta).then(|| ChatUpdate::capture(&session_id, r))
			})
			.await?;
		if let Some(update) = update {
			emit(events, ChatEvent::Update(update));
		}
	}

	let outcome = if token.is_cancelled() {
		TurnOutcome::Aborted
	} else if let Some(e) = &failure {
		warn!(session = %session_id, message = %message_id, error = %e, "turn failed");
		TurnOutcome::Failed {
			message: e.to_string(),
		}
	} else {
		let notice = if saw_content {
			CompletionNotice::Answered
		} else if saw_thinking {
			CompletionNotice::ThinkingOnly
		} else {
			CompletionNotice::Empty
		};
		debug!(session = %session_id, notice = notice.message(), "turn completed");
		TurnOutcome::Completed { notice }
	};

	let update = state
		.update_message(&session_id, &message_id, true, |r| {
			match (&outcome, &failure) {
				(TurnOutcome::Aborted, _) => r.on_abort(),
				(TurnOutcome::Failed { .. }, Some(e)) => r.on_error(e),
				_ => r.on_complete(),
			};
			ChatUpdate::capture(&session_id, r)
		})
		.await?;
	emit(events, ChatEvent::Update(update));

	Ok(outcome)
}

/// Cancel the session's in-flight answer. The message ends as aborted.
pub async fn stop(state: &AppState, session_id: &str) -> bool {
	state.cancel_stream(session_id).await
}

/// Ask the session's last user question again as a new turn.
pub async fn retry(
	state: &AppState,
	session_id: &str,
	events: &UnboundedSender<ChatEvent>,
) -> Result<TurnOutcome, ChatError> {
	let session = state.session(session_id).await?;
	let question = session
		.last_user_question()
		.ok_or(ChatError::NothingToRetry)?
		.to_string();
	info!(session = %session_id, "retrying last question");
	send(state, Some(session_id), &question, events).await
}
