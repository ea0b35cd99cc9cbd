use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::ChatError;
use crate::settings::ApiConfig;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

const ENDPOINT_SUFFIXES: &[&str] = &["/chat/completions", "/chat/completion", "/models"];

/// Reduce whatever URL a user pasted to the API root.
///
/// `https://openrouter.ai/api/v1/chat/completions` and
/// `https://openrouter.ai/api/v1/models/` both become
/// `https://openrouter.ai/api/v1`. Empty input yields the default.
pub fn normalize_base_url(raw: &str) -> String {
	let mut url = raw.trim().trim_end_matches('/');
	for suffix in ENDPOINT_SUFFIXES {
		if let Some(stripped) = url.strip_suffix(suffix) {
			url = stripped.trim_end_matches('/');
			break;
		}
	}
	if url.is_empty() {
		DEFAULT_BASE_URL.to_string()
	} else {
		url.to_string()
	}
}

pub fn provider_headers(api: &ApiConfig) -> Result<HeaderMap, ChatError> {
	let mut headers = HeaderMap::new();
	headers.insert(
		"authorization",
		header_value("authorization", &format!("Bearer {}", api.api_key))?,
	);
	headers.insert("content-type", HeaderValue::from_static("application/json"));
	headers.insert(
		HeaderName::from_static("http-referer"),
		header_value("HTTP-Referer", &api.referer)?,
	);
	headers.insert(
		HeaderName::from_static("x-title"),
		header_value("X-Title", &api.site_title)?,
	);
	Ok(headers)
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, ChatError> {
	HeaderValue::from_str(value)
		.map_err(|_| ChatError::InvalidConfig(format!("{name} contains characters not allowed in a header")))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn strips_chat_completion_endpoints() {
		assert_eq!(
			normalize_base_url("https://openrouter.ai/api/v1/chat/completions"),
			"https://openrouter.ai/api/v1"
		);
		assert_eq!(
			normalize_base_url("https://openrouter.ai/api/v1/chat/completion"),
			"https://openrouter.ai/api/v1"
		);
	}

	#[test]
	fn strips_models_endpoint_and_slashes() {
		assert_eq!(
			normalize_base_url("https://openrouter.ai/api/v1/models/"),
			"https://openrouter.ai/api/v1"
		);
		assert_eq!(
			normalize_base_url("  http://localhost:11434/v1/  "),
			"http://localhost:11434/v1"
		);
	}

	#[test]
	fn empty_is_default() {
		assert_eq!(normalize_base_url(""), DEFAULT_BASE_URL);
		assert_eq!(normalize_base_url(" / "), DEFAULT_BASE_URL);
	}

	#[test]
	fn headers_carry_attribution() {
		let api = ApiConfig {
			api_key: "sk-or-test".into(),
			..ApiConfig::default()
		};
		let headers = provider_headers(&api).unwrap();
		assert_eq!(headers["authorization"], "Bearer sk-or-test");
		assert_eq!(headers["x-title"], "Al-Quran App");
		assert!(headers.contains_key("http-referer"));
	}

	#[test]
	fn non_ascii_key_is_a_config_error() {
		let api = ApiConfig {
			api_key: "kunci\nrahasia".into(),
			..ApiConfig::default()
		};
		let err = provider_headers(&api).unwrap_err();
		assert!(err.is_config());
	}
}
