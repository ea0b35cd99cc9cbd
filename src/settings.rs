//! User settings persisted alongside the sessions.

use serde::{Deserialize, Serialize};

use crate::catalog::DEFAULT_MODEL;
use crate::error::ChatError;
use crate::provider::api::{DEFAULT_BASE_URL, normalize_base_url};

const DEFAULT_REFERER: &str = "http://localhost";
const DEFAULT_SITE_TITLE: &str = "Al-Quran App";
/// Stands in for a stored API key in anything sent back to a client.
pub const REDACTED_KEY: &str = "********";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiConfig {
	pub base_url: String,
	pub api_key: String,
	pub referer: String,
	pub site_title: String,
}

impl Default for ApiConfig {
	fn default() -> Self {
		Self {
			base_url: DEFAULT_BASE_URL.to_string(),
			api_key: String::new(),
			referer: DEFAULT_REFERER.to_string(),
			site_title: DEFAULT_SITE_TITLE.to_string(),
		}
	}
}

impl ApiConfig {
	/// Fill blanks from defaults and the process-level fallback key.
	pub fn resolve(&self, fallback_api_key: Option<&str>) -> Self {
		let defaults = Self::default();
		Self {
			base_url: normalize_base_url(&self.base_url),
			api_key: if self.api_key.trim().is_empty() {
				fallback_api_key.unwrap_or_default().trim().to_string()
			} else {
				self.api_key.trim().to_string()
			},
			referer: non_blank(&self.referer).unwrap_or(defaults.referer),
			site_title: non_blank(&self.site_title).unwrap_or(defaults.site_title),
		}
	}

	pub fn require_key(&self) -> Result<(), ChatError> {
		if self.api_key.trim().is_empty() {
			return Err(ChatError::MissingApiKey);
		}
		Ok(())
	}
}

fn non_blank(s: &str) -> Option<String> {
	let s = s.trim();
	(!s.is_empty()).then(|| s.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
	pub current_session_id: Option<String>,
	pub selected_model: String,
	pub sidebar_collapsed: bool,
	pub api: ApiConfig,
	pub custom_models: Vec<String>,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			current_session_id: None,
			selected_model: DEFAULT_MODEL.to_string(),
			sidebar_collapsed: false,
			api: ApiConfig::default(),
			custom_models: Vec::new(),
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfigPatch {
	pub base_url: Option<String>,
	pub api_key: Option<String>,
	pub referer: Option<String>,
	pub site_title: Option<String>,
}

/// Partial update; absent fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
	pub selected_model: Option<String>,
	pub sidebar_collapsed: Option<bool>,
	pub api: Option<ApiConfigPatch>,
	pub custom_models: Option<Vec<String>>,
}

impl Settings {
	/// Copy safe to hand to a client.
	pub fn redacted(mut self) -> Self {
		if !self.api.api_key.is_empty() {
			self.api.api_key = REDACTED_KEY.to_string();
		}
		self
	}

	pub fn apply(&mut self, patch: SettingsPatch) {
		if let Some(model) = patch.selected_model
			&& !model.trim().is_empty()
		{
			self.selected_model = model.trim().to_string();
		}
		if let Some(collapsed) = patch.sidebar_collapsed {
			self.sidebar_collapsed = collapsed;
		}
		if let Some(api) = patch.api {
			if let Some(base_url) = api.base_url {
				self.api.base_url = base_url;
			}
			if let Some(api_key) = api.api_key
				&& api_key != REDACTED_KEY
			{
				self.api.api_key = api_key;
			}
			if let Some(referer) = api.referer {
				self.api.referer = referer;
			}
			if let Some(site_title) = api.site_title {
				self.api.site_title = site_title;
			}
			self.api.base_url = normalize_base_url(&self.api.base_url);
		}
		if let Some(models) = patch.custom_models {
			self.custom_models = sanitize_model_ids(models);
		}
	}
}

/// Trim, drop blanks and duplicates, keep first-seen order.
fn sanitize_model_ids(models: Vec<String>) -> Vec<String> {
	let mut out: Vec<String> = Vec::with_capacity(models.len());
	for m in models {
		let m = m.trim();
		if !m.is_empty() && !out.iter().any(|seen| seen == m) {
			out.push(m.to_string());
		}
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn resolve_uses_fallback_key_only_when_blank() {
		let api = ApiConfig::default();
		assert_eq!(api.resolve(Some("env-key")).api_key, "env-key");
		assert!(api.resolve(None).require_key().is_err());

		let api = ApiConfig {
			api_key: " own-key ".into(),
			..ApiConfig::default()
		};
		assert_eq!(api.resolve(Some("env-key")).api_key, "own-key");
	}

	#[test]
	fn resolve_normalizes_url_and_fills_blanks() {
		let api = ApiConfig {
			base_url: "https://openrouter.ai/api/v1/chat/completions".into(),
			api_key: "k".into(),
			referer: " ".into(),
			site_title: String::new(),
		};
		let resolved = api.resolve(None);
		assert_eq!(resolved.base_url, "https://openrouter.ai/api/v1");
		assert_eq!(resolved.referer, DEFAULT_REFERER);
		assert_eq!(resolved.site_title, DEFAULT_SITE_TITLE);
	}

	#[test]
	fn patch_updates_only_given_fields() {
		let mut settings = Settings::default();
		settings.apply(SettingsPatch {
			selected_model: Some("google/gemini-2.0-flash-exp:free".into()),
			api: Some(ApiConfigPatch {
				base_url: Some("https://openrouter.ai/api/v1/models".into()),
				..ApiConfigPatch::default()
			}),
			..SettingsPatch::default()
		});
		assert_eq!(settings.selected_model, "google/gemini-2.0-flash-exp:free");
		assert_eq!(settings.api.base_url, "https://openrouter.ai/api/v1");
		assert_eq!(settings.api.site_title, DEFAULT_SITE_TITLE);
		assert!(!settings.sidebar_collapsed);
	}

	#[test]
	fn blank_model_is_ignored() {
		let mut settings = Settings::default();
		settings.apply(SettingsPatch {
			selected_model: Some("  ".into()),
			..SettingsPatch::default()
		});
		assert_eq!(settings.selected_model, DEFAULT_MODEL);
	}

	#[test]
	fn custom_models_are_sanitized() {
		let mut settings = Settings::default();
		settings.apply(SettingsPatch {
			custom_models: Some(vec![
				" a/model ".into(),
				"".into(),
				"b/model".into(),
				"a/model".into(),
			]),
			..SettingsPatch::default()
		});
		assert_eq!(settings.custom_models, ["a/model", "b/model"]);
	}

	#[test]
	fn redacted_key_round_trips_without_overwriting() {
		let mut settings = Settings::default();
		settings.api.api_key = "sk-or-secret".into();

		let shown = settings.clone().redacted();
		assert_eq!(shown.api.api_key, REDACTED_KEY);

		settings.apply(SettingsPatch {
			api: Some(ApiConfigPatch {
				api_key: Some(shown.api.api_key),
				..ApiConfigPatch::default()
			}),
			..SettingsPatch::default()
		});
		assert_eq!(settings.api.api_key, "sk-or-secret");
	}

	#[test]
	fn missing_fields_default_on_load() {
		let settings: Settings = serde_json::from_str(r#"{"sidebarCollapsed": true}"#).unwrap();
		assert!(settings.sidebar_collapsed);
		assert_eq!(settings.selected_model, DEFAULT_MODEL);
		assert_eq!(settings.api.base_url, DEFAULT_BASE_URL);
	}
}
