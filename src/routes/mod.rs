use std::sync::Arc;

use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::{Json, Router};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::error::ChatError;
use crate::state::AppState;

pub mod chat;
pub mod models;
pub mod sessions;
pub mod settings;

const MAX_BODY_BYTES: usize = 1024 * 1024;

pub fn router(state: Arc<AppState>) -> Router {
	Router::new()
		.route("/", get(health))
		.route("/v1/models", get(models::get_models))
		.route(
			"/v1/settings",
			get(settings::get_settings).put(settings::put_settings),
		)
		.route("/v1/settings/test", post(settings::test_settings))
		.route(
			"/v1/sessions",
			get(sessions::list_sessions)
				.post(sessions::create_session)
				.delete(sessions::clear_sessions),
		)
		.route("/v1/sessions/current", get(sessions::current_session))
		.route(
			"/v1/sessions/{id}",
			get(sessions::get_session).delete(sessions::delete_session),
		)
		.route("/v1/sessions/{id}/select", post(sessions::select_session))
		.route("/v1/sessions/{id}/stop", post(chat::stop_session))
		.route("/v1/sessions/{id}/retry", post(chat::retry_session))
		.route("/v1/chat", post(chat::post_chat))
		.route("/v1/parse", post(chat::post_parse))
		.route("/v1/suggestions", get(chat::get_suggestions))
		.layer(TraceLayer::new_for_http())
		.layer(CorsLayer::permissive())
		.with_state(state)
}

pub async fn health() -> &'static str {
	"ustadz is running"
}

/// JSON body extractor that logs the raw body when it fails to decode and
/// answers with the same error shape as every other route.
pub struct JsonBody<T>(pub T);

impl<T> FromRequest<Arc<AppState>> for JsonBody<T>
where
	T: serde::de::DeserializeOwned,
{
	type Rejection = Response;

	async fn from_request(req: Request, _state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
		let bytes = match axum::body::to_bytes(req.into_body(), MAX_BODY_BYTES).await {
			Ok(b) => b,
			Err(e) => {
				error!(error = %e, "failed to read request body");
				return Err(error_response(
					StatusCode::BAD_REQUEST,
					"invalid_request_error",
					format!("failed to read request body: {e}"),
				));
			}
		};

		serde_json::from_slice::<T>(&bytes).map(JsonBody).map_err(|e| {
			warn!(
				error = %e,
				body = %String::from_utf8_lossy(&bytes),
				"failed to deserialize request body"
			);
			error_response(
				StatusCode::UNPROCESSABLE_ENTITY,
				"invalid_request_error",
				format!("invalid request body: {e}"),
			)
		})
	}
}

pub fn error_response(status: StatusCode, kind: &str, message: impl Into<String>) -> Response {
	(
		status,
		Json(serde_json::json!({
			"type": "error",
			"error": {
				"type": kind,
				"message": message.into()
			}
		})),
	)
		.into_response()
}

impl IntoResponse for ChatError {
	fn into_response(self) -> Response {
		let status = match &self {
			ChatError::MissingApiKey
			| ChatError::InvalidConfig(_)
			| ChatError::NothingToRetry
			| ChatError::EmptyQuestion => StatusCode::BAD_REQUEST,
			ChatError::SessionNotFound(_) => StatusCode::NOT_FOUND,
			ChatError::Upstream { status, .. } => StatusCode::from_u16(status.as_u16())
				.ok()
				.filter(|s| s.is_client_error() || s.is_server_error())
				.unwrap_or(StatusCode::BAD_GATEWAY),
			ChatError::Transport(_) | ChatError::Provider(_) => StatusCode::BAD_GATEWAY,
			ChatError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
		};

		if status.is_server_error() {
			error!(error = %self, status = %status, "request failed");
		} else {
			warn!(error = %self, status = %status, "request rejected");
		}
		error_response(status, self.kind(), self.to_string())
	}
}

/// Serve the real router on an ephemeral port for handler tests.
#[cfg(test)]
pub(crate) mod test_support {
	use std::path::Path;
	use std::sync::Arc;

	use crate::config::Config;
	use crate::state::AppState;

	pub fn app_state(data_dir: &Path, provider: Option<&str>, key: Option<&str>) -> Arc<AppState> {
		let mut config = Config::with_data_dir(data_dir);
		config.base_url = provider.map(str::to_string);
		config.fallback_api_key = key.map(str::to_string);
		Arc::new(AppState::load(config).unwrap())
	}

	pub async fn serve(state: Arc<AppState>) -> String {
		let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			axum::serve(listener, super::router(state)).await.unwrap();
		});
		format!("http://{addr}")
	}

	/// `(event name, data)` pairs from a finished SSE body.
	pub fn sse_events(body: &str) -> Vec<(String, serde_json::Value)> {
		body.split("\n\n")
			.filter_map(|block| {
				let mut name = None;
				let mut data = None;
				for line in block.lines() {
					if let Some(v) = line.strip_prefix("event:") {
						name = Some(v.trim().to_string());
					} else if let Some(v) = line.strip_prefix("data:") {
						data = serde_json::from_str(v.trim()).ok();
					}
				}
				Some((name?, data?))
			})
			.collect()
	}
}
