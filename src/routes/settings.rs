use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::info;

use super::{JsonBody, error_response};
use crate::provider::client::test_connection;
use crate::settings::{Settings, SettingsPatch};
use crate::state::AppState;

pub async fn get_settings(State(state): State<Arc<AppState>>) -> Json<Settings> {
	Json(state.settings().await.redacted())
}

pub async fn put_settings(
	State(state): State<Arc<AppState>>,
	JsonBody(patch): JsonBody<SettingsPatch>,
) -> Response {
	match state.update_settings(patch).await {
		Ok(settings) => Json(settings.redacted()).into_response(),
		Err(e) => e.into_response(),
	}
}

#[derive(Debug, Default, Deserialize)]
pub struct TestRequest {
	pub model: Option<String>,
}

/// One small request with the current configuration and the given or
/// selected model. The body is optional.
pub async fn test_settings(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
	let req: TestRequest = if body.iter().all(u8::is_ascii_whitespace) {
		TestRequest::default()
	} else {
		match serde_json::from_slice(&body) {
			Ok(r) => r,
			Err(e) => {
				return error_response(
					StatusCode::UNPROCESSABLE_ENTITY,
					"invalid_request_error",
					format!("invalid request body: {e}"),
				);
			}
		}
	};

	let api = state.api_config().await;
	let model = match req.model.filter(|m| !m.trim().is_empty()) {
		Some(m) => m,
		None => state.settings().await.selected_model,
	};
	let check = test_connection(&state.client, &api, &model).await;
	info!(model = %model, ok = check.ok, "connection test");
	Json(check).into_response()
}
