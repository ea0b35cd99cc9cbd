//! Maps provider-specific chunk shapes onto [`StreamDelta`].
//!
//! Providers disagree on where reasoning text goes: `reasoning`,
//! `reasoning_content`, or `reasoning_details[].text`. Everything past this
//! module only sees a content side and a thinking side.

use tracing::debug;

use super::types::{ChatCompletionChunk, Delta};
use crate::error::ChatError;
use crate::reassembler::StreamDelta;
use crate::thinking::InlineThinkSplitter;

const REASONING_TEXT: &str = "reasoning.text";

/// Per-stream normalisation state.
#[derive(Debug, Default)]
pub struct DeltaNormalizer {
	splitter: Option<InlineThinkSplitter>,
	pub finish_reason: Option<String>,
}

impl DeltaNormalizer {
	/// With `split_inline_think`, `<think>` blocks in the content channel are
	/// moved to the thinking channel.
	pub fn new(split_inline_think: bool) -> Self {
		Self {
			splitter: split_inline_think.then(InlineThinkSplitter::new),
			finish_reason: None,
		}
	}

	pub fn push(&mut self, chunk: &ChatCompletionChunk) -> Result<Vec<StreamDelta>, ChatError> {
		if let Some(err) = &chunk.error {
			let message = err
				.message
				.clone()
				.unwrap_or_else(|| "unknown provider error".to_string());
			return Err(ChatError::Provider(message));
		}

		let Some(choice) = chunk.choices.first() else {
			return Ok(Vec::new());
		};

		let mut out = thinking_deltas(&choice.delta);

		if let Some(content) = choice.delta.content.as_deref()
			&& !content.is_empty()
		{
			match self.splitter.as_mut() {
				Some(splitter) => out.extend(splitter.push(content)),
				None => out.push(StreamDelta::content(content)),
			}
		}

		if let Some(reason) = &choice.finish_reason {
			debug!(finish_reason = %reason, "provider finished");
			self.finish_reason = Some(reason.clone());
		}

		Ok(out)
	}

	/// Anything the inline splitter was still holding back.
	pub fn finish(&mut self) -> Option<StreamDelta> {
		self.splitter.take().and_then(InlineThinkSplitter::finish)
	}
}

fn thinking_deltas(delta: &Delta) -> Vec<StreamDelta> {
	let details = delta
		.reasoning_details
		.iter()
		.flatten()
		.filter(|d| d.r#type.as_deref() == Some(REASONING_TEXT))
		.filter_map(|d| d.text.as_deref());

	details
		.chain(delta.reasoning_content.as_deref())
		.chain(delta.reasoning.as_deref())
		.filter(|t| !t.is_empty())
		.map(StreamDelta::thinking)
		.collect()
}
