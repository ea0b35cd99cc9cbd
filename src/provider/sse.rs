//! Minimal server-sent-events framing for chat completion streams.

/// Buffers raw bytes and hands out the `data` payload of each complete event.
#[derive(Debug, Default)]
pub struct SseDecoder {
	buffer: String,
	pending: Vec<u8>,
}

impl SseDecoder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Feed bytes as they arrive. A multi-byte character split across two
	/// network frames is kept until its remaining bytes show up.
	pub fn push(&mut self, bytes: &[u8]) {
		self.pending.extend_from_slice(bytes);
		let checked = std::str::from_utf8(&self.pending)
			.map(str::len)
			.map_err(|e| (e.valid_up_to(), e.error_len()));
		let valid_up_to = match checked {
			Ok(len) => len,
			Err((valid, None)) => valid,
			Err((_, Some(_))) => {
				// Genuinely invalid bytes: decode lossily and move on.
				let text = String::from_utf8_lossy(&self.pending).into_owned();
				self.append(&text);
				self.pending.clear();
				return;
			}
		};
		let rest = self.pending.split_off(valid_up_to);
		let complete = std::mem::replace(&mut self.pending, rest);
		if let Ok(text) = std::str::from_utf8(&complete) {
			self.append(text);
		}
	}

	fn append(&mut self, text: &str) {
		if text.contains('\r') {
			self.buffer.push_str(&text.replace("\r\n", "\n").replace('\r', "\n"));
		} else {
			self.buffer.push_str(text);
		}
	}

	/// Next complete event's data, skipping events without a `data` field
	/// (comments, keep-alives).
	pub fn next_data(&mut self) -> Option<String> {
		while let Some(pos) = self.buffer.find("\n\n") {
			let block: String = self.buffer.drain(..pos + 2).collect();
			if let Some(data) = parse_data(&block) {
				return Some(data);
			}
		}
		None
	}
}

fn parse_data(block: &str) -> Option<String> {
	let parts: Vec<&str> = block
		.lines()
		.filter_map(|line| line.strip_prefix("data:"))
		.map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
		.collect();
	if parts.is_empty() {
		None
	} else {
		Some(parts.join("\n"))
	}
}
