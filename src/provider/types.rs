use serde::{Deserialize, Serialize};

// --- Chat Completions Request ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionsRequest {
	pub model: String,
	pub messages: Vec<Message>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub max_tokens: Option<u64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub temperature: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub top_p: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub stream: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
	pub role: String,
	pub content: String,
}

impl Message {
	pub fn new(role: &str, content: impl Into<String>) -> Self {
		Self {
			role: role.to_string(),
			content: content.into(),
		}
	}
}

// --- Chat Completions Response (non-streaming) ---

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
	#[serde(default)]
	pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
	pub message: ResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
	#[serde(default)]
	pub content: Option<String>,
}

// --- Chat Completions Streaming ---

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletionChunk {
	#[serde(default)]
	pub id: Option<String>,
	#[serde(default)]
	pub model: Option<String>,
	#[serde(default)]
	pub choices: Vec<ChunkChoice>,
	/// OpenRouter reports failures after the 200 status line this way.
	#[serde(default)]
	pub error: Option<ErrorBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkChoice {
	#[serde(default)]
	pub delta: Delta,
	#[serde(default)]
	pub finish_reason: Option<String>,
}

/// The union of the field names providers use for a streamed increment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Delta {
	#[serde(default)]
	pub content: Option<String>,
	#[serde(default)]
	pub reasoning: Option<String>,
	#[serde(default)]
	pub reasoning_content: Option<String>,
	#[serde(default)]
	pub reasoning_details: Option<Vec<ReasoningDetail>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReasoningDetail {
	#[serde(default)]
	pub r#type: Option<String>,
	#[serde(default)]
	pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
	#[serde(default)]
	pub message: Option<String>,
	#[serde(default)]
	pub code: Option<serde_json::Value>,
}

/// Error envelope used by non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
	pub error: ErrorBody,
}

// --- Models ---

#[derive(Debug, Clone, Deserialize)]
pub struct ModelsResponse {
	pub data: Vec<ProviderModel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderModel {
	pub id: String,
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub pricing: Option<ProviderPricing>,
	#[serde(default)]
	pub context_length: Option<u64>,
	#[serde(default)]
	pub created: Option<i64>,
}

/// Prices are decimal strings per token on OpenRouter, numbers elsewhere.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderPricing {
	#[serde(default)]
	pub prompt: serde_json::Value,
	#[serde(default)]
	pub completion: serde_json::Value,
}
