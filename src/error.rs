use std::path::PathBuf;

use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
	#[error("no data directory available, set USTADZ_DATA_DIR")]
	NoDataDir,
	#[error("failed to access {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("failed to decode {path}: {source}")]
	Json {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},
}

/// Everything that can go wrong between a user question and a finished answer.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
	#[error("API key belum diatur. Silakan isi API key di pengaturan AI.")]
	MissingApiKey,
	#[error("invalid API configuration: {0}")]
	InvalidConfig(String),
	#[error("request to provider failed: {0}")]
	Transport(#[from] reqwest::Error),
	#[error("provider returned {status}: {message}")]
	Upstream { status: StatusCode, message: String },
	#[error("provider error: {0}")]
	Provider(String),
	#[error(transparent)]
	Store(#[from] StoreError),
	#[error("session {0} not found")]
	SessionNotFound(String),
	#[error("no previous question to retry")]
	NothingToRetry,
	#[error("question is empty")]
	EmptyQuestion,
}

impl ChatError {
	/// Configuration problems are detected before a stream is opened and are
	/// reported separately from runtime failures.
	pub fn is_config(&self) -> bool {
		matches!(self, ChatError::MissingApiKey | ChatError::InvalidConfig(_))
	}

	pub fn kind(&self) -> &'static str {
		match self {
			ChatError::MissingApiKey | ChatError::InvalidConfig(_) => "configuration_error",
			ChatError::Transport(_) | ChatError::Upstream { .. } | ChatError::Provider(_) => {
				"api_error"
			}
			ChatError::Store(_) => "storage_error",
			ChatError::SessionNotFound(_) => "not_found_error",
			ChatError::NothingToRetry | ChatError::EmptyQuestion => "invalid_request_error",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn config_errors_are_distinct_from_runtime_errors() {
		assert!(ChatError::MissingApiKey.is_config());
		assert!(ChatError::InvalidConfig("bad header".into()).is_config());
		assert!(!ChatError::Provider("overloaded".into()).is_config());
		assert!(
			!ChatError::Upstream {
				status: StatusCode::BAD_GATEWAY,
				message: "down".into()
			}
			.is_config()
		);
	}

	#[test]
	fn kinds_group_provider_failures() {
		assert_eq!(ChatError::Provider("x".into()).kind(), "api_error");
		assert_eq!(ChatError::MissingApiKey.kind(), "configuration_error");
		assert_eq!(
			ChatError::SessionNotFound("abc".into()).kind(),
			"not_found_error"
		);
	}
}
