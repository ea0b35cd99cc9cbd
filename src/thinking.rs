//! Handling of `<think>...</think>` blocks that some providers inline into
//! the normal content channel instead of a separate reasoning field.

use crate::reassembler::StreamDelta;

const OPEN_TAG: &str = "<think>";
const CLOSE_TAG: &str = "</think>";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThinkingSplit {
	pub thinking: String,
	pub content: String,
}

/// Split a complete text into its thinking and answer parts.
///
/// Every closed `<think>` block is removed from the content; their inner
/// texts are trimmed and joined with a blank line. When no closed block is
/// present the input comes back unchanged as content.
pub fn extract_thinking(text: &str) -> ThinkingSplit {
	let mut blocks = Vec::new();
	let mut content = String::with_capacity(text.len());
	let mut remaining = text;

	while let Some(start_idx) = remaining.find(OPEN_TAG) {
		let after_open = &remaining[start_idx + OPEN_TAG.len()..];
		let Some(end_idx) = after_open.find(CLOSE_TAG) else {
			break;
		};
		content.push_str(&remaining[..start_idx]);
		blocks.push(after_open[..end_idx].trim());
		remaining = &after_open[end_idx + CLOSE_TAG.len()..];
	}

	if blocks.is_empty() {
		return ThinkingSplit {
			thinking: String::new(),
			content: text.to_string(),
		};
	}

	content.push_str(remaining);
	ThinkingSplit {
		thinking: blocks
			.into_iter()
			.filter(|b| !b.is_empty())
			.collect::<Vec<_>>()
			.join("\n\n"),
		content: content.trim().to_string(),
	}
}

/// Incremental version of [`extract_thinking`] for a content stream.
///
/// Text inside `<think>` blocks is re-routed to the thinking channel as it
/// arrives. Only the part of the buffer that could still be the start of a
/// tag is held back between chunks.
#[derive(Debug, Default)]
pub struct InlineThinkSplitter {
	buffer: String,
	in_thinking: bool,
}

impl InlineThinkSplitter {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&mut self, chunk: &str) -> Vec<StreamDelta> {
		self.buffer.push_str(chunk);
		let mut out = Vec::new();

		loop {
			let tag = if self.in_thinking { CLOSE_TAG } else { OPEN_TAG };

			if let Some(idx) = self.buffer.find(tag) {
				if idx > 0 {
					out.push(self.delta(self.buffer[..idx].to_string()));
				}
				self.buffer.drain(..idx + tag.len());
				self.in_thinking = !self.in_thinking;
				continue;
			}

			let keep = partial_tag_suffix(&self.buffer, tag);
			let emit_len = self.buffer.len() - keep;
			if emit_len > 0 {
				let text: String = self.buffer.drain(..emit_len).collect();
				out.push(self.delta(text));
			}
			break;
		}

		out
	}

	/// Flush whatever is still held back once the stream ends. An unclosed
	/// block keeps its text on the thinking channel.
	pub fn finish(self) -> Option<StreamDelta> {
		if self.buffer.is_empty() {
			return None;
		}
		Some(self.delta(self.buffer.clone()))
	}

	fn delta(&self, text: String) -> StreamDelta {
		if self.in_thinking {
			StreamDelta::thinking(text)
		} else {
			StreamDelta::content(text)
		}
	}
}

/// Length of the longest suffix of `buffer` that is a proper prefix of `tag`.
fn partial_tag_suffix(buffer: &str, tag: &str) -> usize {
	(1..tag.len())
		.rev()
		.find(|&n| buffer.ends_with(&tag[..n]))
		.unwrap_or(0)
}
