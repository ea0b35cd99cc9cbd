use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::provider::types::ProviderModel;

pub const DEFAULT_MODEL: &str = "openai/gpt-4.1-mini";

/// How long a fetched model list is reused before asking the provider again.
pub const CACHE_TTL_MINUTES: i64 = 60;

const DEFAULT_CONTEXT_LENGTH: u64 = 4096;

static PROVIDER_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?i)^(openai|anthropic|google|meta-llama|mistral|deepseek)/")
		.expect("provider prefix pattern is valid")
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
	pub prompt: f64,
	pub completion: f64,
}

impl Pricing {
	pub fn is_zero(&self) -> bool {
		self.prompt == 0.0 && self.completion == 0.0
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiModel {
	pub id: String,
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	pub pricing: Pricing,
	#[serde(alias = "context_length")]
	pub context_length: u64,
	pub is_free: bool,
	#[serde(default)]
	pub created: i64,
}

impl AiModel {
	fn fallback(id: &str, name: &str, description: &str, pricing: Pricing, context_length: u64) -> Self {
		Self {
			id: id.to_string(),
			name: name.to_string(),
			description: Some(description.to_string()),
			is_free: pricing.is_zero(),
			pricing,
			context_length,
			created: 0,
		}
	}

	/// A user-entered model id the provider list did not include. Pricing is
	/// unknown, so only a `:free` id counts as free.
	pub fn custom(id: &str) -> Self {
		Self {
			id: id.to_string(),
			name: format_model_name(id),
			description: None,
			pricing: Pricing::default(),
			context_length: DEFAULT_CONTEXT_LENGTH,
			is_free: id.to_ascii_lowercase().ends_with(":free"),
			created: 0,
		}
	}
}

impl From<ProviderModel> for AiModel {
	fn from(m: ProviderModel) -> Self {
		let pricing = m
			.pricing
			.map(|p| Pricing {
				prompt: price_value(&p.prompt),
				completion: price_value(&p.completion),
			})
			.unwrap_or_default();
		let display = m.name.as_deref().filter(|n| !n.is_empty()).unwrap_or(&m.id);
		Self {
			name: format_model_name(display),
			description: m.description,
			is_free: pricing.is_zero(),
			pricing,
			context_length: m.context_length.filter(|&n| n > 0).unwrap_or(DEFAULT_CONTEXT_LENGTH),
			created: m.created.unwrap_or(0),
			id: m.id,
		}
	}
}

/// Lenient price parsing: strings or numbers, anything else is free.
fn price_value(v: &serde_json::Value) -> f64 {
	match v {
		serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
		serde_json::Value::String(s) => s.trim().parse().unwrap_or(0.0),
		_ => 0.0,
	}
}

/// `meta-llama/llama-3.3-70b-instruct:free` -> `Llama 3.3 70b Instruct`.
pub fn format_model_name(name: &str) -> String {
	let stripped = PROVIDER_PREFIX_RE.replace(name, "");
	let stripped = strip_suffix_ignore_case(&stripped, ":free");
	let spaced = stripped.replace('-', " ");

	let mut out = String::with_capacity(spaced.len());
	let mut prev_is_word = false;
	for c in spaced.chars() {
		let is_word = c.is_ascii_alphanumeric() || c == '_';
		if is_word && !prev_is_word {
			out.extend(c.to_uppercase());
		} else {
			out.push(c);
		}
		prev_is_word = is_word;
	}
	out
}

fn strip_suffix_ignore_case<'a>(s: &'a str, suffix: &str) -> &'a str {
	if s.len() >= suffix.len() && s.is_char_boundary(s.len() - suffix.len()) {
		let (head, tail) = s.split_at(s.len() - suffix.len());
		if tail.eq_ignore_ascii_case(suffix) {
			return head;
		}
	}
	s
}

/// Price per 1K tokens for display.
pub fn format_price(price: f64) -> String {
	if price == 0.0 {
		"Free".to_string()
	} else if price < 0.001 {
		format!("${:.3}/1K", price * 1000.0)
	} else {
		format!("${price:.4}/1K")
	}
}

/// Free models first, then alphabetical by display name.
pub fn sort_models(models: &mut [AiModel]) {
	models.sort_by(|a, b| b.is_free.cmp(&a.is_free).then_with(|| a.name.cmp(&b.name)));
}

/// Shown when the provider's model list cannot be fetched.
pub fn fallback_models() -> Vec<AiModel> {
	let free = Pricing::default();
	vec![
		AiModel::fallback(DEFAULT_MODEL, "GPT-4.1 Mini", "Fast and efficient model from OpenAI", free, 128_000),
		AiModel::fallback(
			"google/gemini-2.0-flash-exp:free",
			"Gemini 2.0 Flash",
			"Google's fast multimodal model",
			free,
			1_000_000,
		),
		AiModel::fallback(
			"meta-llama/llama-3.3-70b-instruct:free",
			"Llama 3.3 70B",
			"Meta's open source model",
			free,
			131_072,
		),
		AiModel::fallback(
			"anthropic/claude-3.5-sonnet",
			"Claude 3.5 Sonnet",
			"Anthropic's balanced model",
			Pricing {
				prompt: 0.003,
				completion: 0.015,
			},
			200_000,
		),
		AiModel::fallback(
			"openai/gpt-4o",
			"GPT-4o",
			"OpenAI's flagship model",
			Pricing {
				prompt: 0.0025,
				completion: 0.01,
			},
			128_000,
		),
	]
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFilter {
	#[default]
	All,
	Free,
	Paid,
}

impl ModelFilter {
	pub fn matches(self, model: &AiModel) -> bool {
		match self {
			ModelFilter::All => true,
			ModelFilter::Free => model.is_free,
			ModelFilter::Paid => !model.is_free,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelCache {
	#[serde(with = "chrono::serde::ts_milliseconds")]
	pub cached_at: DateTime<Utc>,
	pub models: Vec<AiModel>,
}

impl ModelCache {
	pub fn new(models: Vec<AiModel>) -> Self {
		Self {
			cached_at: Utc::now(),
			models,
		}
	}

	pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
		!self.models.is_empty() && now - self.cached_at < Duration::minutes(CACHE_TTL_MINUTES)
	}
}
