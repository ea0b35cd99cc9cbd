use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::info;

use super::error_response;
use crate::state::AppState;

pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Response {
	let sessions = state.sessions().await;
	info!(count = sessions.len(), "serving sessions list");
	Json(serde_json::json!({ "data": sessions })).into_response()
}

pub async fn create_session(State(state): State<Arc<AppState>>) -> Response {
	match state.create_session().await {
		Ok(session) => (StatusCode::CREATED, Json(session)).into_response(),
		Err(e) => e.into_response(),
	}
}

pub async fn clear_sessions(State(state): State<Arc<AppState>>) -> Response {
	match state.clear_sessions().await {
		Ok(removed) => Json(serde_json::json!({ "removed": removed })).into_response(),
		Err(e) => e.into_response(),
	}
}

pub async fn current_session(State(state): State<Arc<AppState>>) -> Response {
	match state.current_session().await {
		Some(session) => Json(session).into_response(),
		None => error_response(StatusCode::NOT_FOUND, "not_found_error", "no current session"),
	}
}

pub async fn get_session(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
	match state.session(&id).await {
		Ok(session) => Json(session).into_response(),
		Err(e) => e.into_response(),
	}
}

pub async fn select_session(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
	match state.select_session(&id).await {
		Ok(session) => {
			info!(session = %id, "session selected");
			Json(session).into_response()
		}
		Err(e) => e.into_response(),
	}
}

pub async fn delete_session(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
	match state.delete_session(&id).await {
		Ok(()) => StatusCode::NO_CONTENT.into_response(),
		Err(e) => e.into_response(),
	}
}

#[cfg(test)]
mod tests {
	use reqwest::StatusCode;
	use serde_json::Value;

	use super::super::test_support::{app_state, serve};

	#[tokio::test]
	async fn session_lifecycle() {
		let dir = tempfile::tempdir().unwrap();
		let base = serve(app_state(dir.path(), None, None)).await;
		let client = reqwest::Client::new();

		let none = client.get(format!("{base}/v1/sessions/current")).send().await.unwrap();
		assert_eq!(none.status(), StatusCode::NOT_FOUND);

		let created = client.post(format!("{base}/v1/sessions")).send().await.unwrap();
		assert_eq!(created.status(), StatusCode::CREATED);
		let first: Value = created.json().await.unwrap();
		assert_eq!(first["title"], "Percakapan Baru");
		let first_id = first["id"].as_str().unwrap().to_string();

		let second: Value = client
			.post(format!("{base}/v1/sessions"))
			.send()
			.await
			.unwrap()
			.json()
			.await
			.unwrap();
		let current: Value = client
			.get(format!("{base}/v1/sessions/current"))
			.send()
			.await
			.unwrap()
			.json()
			.await
			.unwrap();
		assert_eq!(current["id"], second["id"]);

		let selected = client
			.post(format!("{base}/v1/sessions/{first_id}/select"))
			.send()
			.await
			.unwrap();
		assert_eq!(selected.status(), StatusCode::OK);
		let current: Value = client
			.get(format!("{base}/v1/sessions/current"))
			.send()
			.await
			.unwrap()
			.json()
			.await
			.unwrap();
		assert_eq!(current["id"], first_id.as_str());

		let listed: Value = client
			.get(format!("{base}/v1/sessions"))
			.send()
			.await
			.unwrap()
			.json()
			.await
			.unwrap();
		assert_eq!(listed["data"].as_array().map(Vec::len), Some(2));

		let deleted = client
			.delete(format!("{base}/v1/sessions/{first_id}"))
			.send()
			.await
			.unwrap();
		assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
		let gone = client
			.get(format!("{base}/v1/sessions/{first_id}"))
			.send()
			.await
			.unwrap();
		assert_eq!(gone.status(), StatusCode::NOT_FOUND);
		let body: Value = gone.json().await.unwrap();
		assert_eq!(body["error"]["type"], "not_found_error");

		let cleared: Value = client
			.delete(format!("{base}/v1/sessions"))
			.send()
			.await
			.unwrap()
			.json()
			.await
			.unwrap();
		assert_eq!(cleared["removed"], 1);
	}
}
