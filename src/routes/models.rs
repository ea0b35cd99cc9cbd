use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::catalog::{AiModel, ModelFilter, format_price};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ModelsQuery {
	#[serde(default)]
	pub filter: ModelFilter,
	#[serde(default)]
	pub refresh: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelEntry {
	#[serde(flatten)]
	pub model: AiModel,
	pub prompt_price: String,
	pub completion_price: String,
}

impl From<AiModel> for ModelEntry {
	fn from(model: AiModel) -> Self {
		Self {
			prompt_price: format_price(model.pricing.prompt),
			completion_price: format_price(model.pricing.completion),
			model,
		}
	}
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
	pub data: Vec<ModelEntry>,
	pub selected: String,
}

pub async fn get_models(
	State(state): State<Arc<AppState>>,
	Query(query): Query<ModelsQuery>,
) -> Json<ModelsResponse> {
	let models = state.models(query.filter, query.refresh).await;
	info!(
		count = models.len(),
		filter = ?query.filter,
		refresh = query.refresh,
		"serving models list"
	);
	Json(ModelsResponse {
		data: models.into_iter().map(ModelEntry::from).collect(),
		selected: state.settings().await.selected_model,
	})
}
