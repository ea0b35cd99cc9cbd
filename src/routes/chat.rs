use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::{JsonBody, error_response};
use crate::chat::controller::{self, ChatEvent};
use crate::chat::enhance::{follow_ups, topic_id};
use crate::segment::{Segment, parse_segments};
use crate::state::AppState;
use crate::thinking::extract_thinking;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
	#[serde(default, alias = "sessionId")]
	pub session_id: Option<String>,
	pub question: String,
}

enum TurnKind {
	Ask {
		session_id: Option<String>,
		question: String,
	},
	Retry {
		session_id: String,
	},
}

pub async fn post_chat(
	State(state): State<Arc<AppState>>,
	JsonBody(req): JsonBody<ChatRequest>,
) -> Response {
	info!(
		session = ?req.session_id,
		chars = req.question.chars().count(),
		"incoming /v1/chat request"
	);
	stream_turn(
		state,
		TurnKind::Ask {
			session_id: req.session_id,
			question: req.question,
		},
	)
	.await
}

pub async fn retry_session(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
	info!(session = %id, "incoming retry request");
	stream_turn(state, TurnKind::Retry { session_id: id }).await
}

pub async fn stop_session(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
	let stopped = controller::stop(&state, &id).await;
	info!(session = %id, stopped, "stop requested");
	Json(serde_json::json!({ "stopped": stopped })).into_response()
}

/// Run the turn on its own task so it finishes and persists even if the
/// client goes away. Errors raised before the first event (configuration,
/// unknown session) are answered as plain JSON errors instead of a stream.
async fn stream_turn(state: Arc<AppState>, kind: TurnKind) -> Response {
	let (tx, mut rx) = mpsc::unbounded_channel();
	let task = tokio::spawn(async move {
		match kind {
			TurnKind::Ask {
				session_id,
				question,
			} => controller::send(&state, session_id.as_deref(), &question, &tx).await,
			TurnKind::Retry { session_id } => controller::retry(&state, &session_id, &tx).await,
		}
	});

	let Some(first) = rx.recv().await else {
		return match task.await {
			Ok(Err(e)) => {
				if e.is_config() {
					info!(error = %e, "chat rejected, API settings incomplete");
				}
				e.into_response()
			}
			Ok(Ok(outcome)) => {
				error!(outcome = ?outcome, "turn ended without events");
				StatusCode::NO_CONTENT.into_response()
			}
			Err(e) => {
				error!(error = %e, "chat task panicked");
				error_response(
					StatusCode::INTERNAL_SERVER_ERROR,
					"api_error",
					"chat task failed",
				)
			}
		};
	};

	let stream = async_stream::stream! {
		if let Some(event) = to_sse(&first) {
			yield Ok::<_, Infallible>(event);
		}
		while let Some(ev) = rx.recv().await {
			if let Some(event) = to_sse(&ev) {
				yield Ok(event);
			}
		}
		debug!("chat event stream closed");
	};

	Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
}

fn to_sse(ev: &ChatEvent) -> Option<Event> {
	match serde_json::to_string(ev) {
		Ok(data) => Some(Event::default().event(ev.name()).data(data)),
		Err(e) => {
			error!(error = %e, "failed to serialize chat event");
			None
		}
	}
}

#[derive(Debug, Deserialize)]
pub struct ParseRequest {
	pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ParseResponse {
	pub thinking: String,
	pub segments: Vec<Segment>,
}

/// Segments for arbitrary text, with any `<think>` blocks split off first.
pub async fn post_parse(JsonBody(req): JsonBody<ParseRequest>) -> Json<ParseResponse> {
	let split = extract_thinking(&req.text);
	let segments = parse_segments(&split.content);
	debug!(segments = segments.len(), "parsed text");
	Json(ParseResponse {
		thinking: split.thinking,
		segments,
	})
}

#[derive(Debug, Deserialize)]
pub struct SuggestionsQuery {
	#[serde(default)]
	pub q: String,
}

pub async fn get_suggestions(Query(query): Query<SuggestionsQuery>) -> Response {
	Json(serde_json::json!({
		"topic": topic_id(&query.q),
		"followUps": follow_ups(&query.q),
	}))
	.into_response()
}
