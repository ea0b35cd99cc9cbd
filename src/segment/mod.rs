//! Splits assistant text into renderable segments.
//!
//! The model is instructed to embed a handful of XML-like tags in its answer
//! (`<quran>`, `<shalat/>`, `<doa/>`, `<imsakiyah/>`). This module finds them
//! and partitions the text into prose and widget segments. Parsing is total:
//! anything that is not a complete, well-formed tag is prose, so partially
//! streamed text always renders.

mod tags;

use std::fmt;
use std::ops::Range;

use serde::{Serialize, Serializer};

/// `23` or `23-24`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerseRange {
	pub start: u16,
	pub end: Option<u16>,
}

impl VerseRange {
	/// Returns `None` if either bound does not fit a verse number.
	pub fn parse(s: &str) -> Option<Self> {
		match s.split_once('-') {
			Some((start, end)) => Some(Self {
				start: start.parse().ok()?,
				end: Some(end.parse().ok()?),
			}),
			None => Some(Self {
				start: s.parse().ok()?,
				end: None,
			}),
		}
	}
}

impl fmt::Display for VerseRange {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.end {
			Some(end) => write!(f, "{}-{}", self.start, end),
			None => write!(f, "{}", self.start),
		}
	}
}

impl Serialize for VerseRange {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

/// Location hints carried by `<shalat/>` and `<imsakiyah/>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Location {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub province: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub regency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ContentSegment {
	Text {
		content: String,
	},
	QuranRef {
		surah_number: Option<u16>,
		verse_range: Option<VerseRange>,
		content: String,
	},
	PrayerTimes {
		#[serde(flatten)]
		location: Location,
	},
	DoaLookup {
		doa_query: String,
	},
	FastingSchedule {
		#[serde(flatten)]
		location: Location,
	},
}

impl ContentSegment {
	/// Prose for text, the Arabic quotation for Quran references, empty for
	/// widget triggers.
	pub fn content(&self) -> &str {
		match self {
			ContentSegment::Text { content } | ContentSegment::QuranRef { content, .. } => content,
			_ => "",
		}
	}
}

/// A segment together with the byte range of the source it was cut from.
///
/// Whitespace-only gaps around tags produce no segment of their own; they are
/// folded into the span of the neighbouring tag so the spans still tile the
/// whole input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
	pub span: Range<usize>,
	#[serde(flatten)]
	pub body: ContentSegment,
}

impl Segment {
	fn text(span: Range<usize>, content: &str) -> Self {
		Self {
			span,
			body: ContentSegment::Text {
				content: content.to_string(),
			},
		}
	}
}

/// Parse a complete or partially streamed buffer into ordered segments.
///
/// Input without any recognised tag yields exactly one text segment holding
/// the whole input, including when the input is empty or whitespace.
pub fn parse_segments(text: &str) -> Vec<Segment> {
	let mut matches: Vec<tags::TagMatch> = tags::quran_refs(text)
		.chain(tags::prayer_times(text))
		.chain(tags::doa_lookups(text))
		.chain(tags::fasting_schedules(text))
		.collect();

	if matches.is_empty() {
		return vec![Segment::text(0..text.len(), text)];
	}

	matches.sort_by_key(|m| m.span.start);

	let mut segments = Vec::with_capacity(matches.len() * 2 + 1);
	let mut cursor = 0;

	for m in matches {
		// A tag nested inside an earlier one (e.g. a <doa/> quoted inside a
		// <quran> body) belongs to that earlier span.
		if m.span.start < cursor {
			continue;
		}

		let gap = &text[cursor..m.span.start];
		let start = if gap.trim().is_empty() {
			cursor
		} else {
			segments.push(Segment::text(cursor..m.span.start, gap));
			m.span.start
		};

		segments.push(Segment {
			span: start..m.span.end,
			body: m.segment,
		});
		cursor = m.span.end;
	}

	let tail = &text[cursor..];
	if !tail.trim().is_empty() {
		segments.push(Segment::text(cursor..text.len(), tail));
	} else if let Some(last) = segments.last_mut() {
		last.span.end = text.len();
	}

	segments
}
