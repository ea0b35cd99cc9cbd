//! Regex primitives for the inline widget tags.
//!
//! Each scanner is independent and reports absolute byte spans into the
//! scanned text. Merging and ordering happens in the parent module.

use std::ops::Range;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::{ContentSegment, Location, VerseRange};

static QURAN_RE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r#"<quran\s+ref="(\d+):(\d+(?:-\d+)?)">((?s:.)*?)</quran>"#)
		.expect("quran tag pattern is valid")
});

static SHALAT_RE: LazyLock<Regex> = LazyLock::new(|| self_closing("shalat"));
static DOA_RE: LazyLock<Regex> = LazyLock::new(|| self_closing("doa"));
static IMSAKIYAH_RE: LazyLock<Regex> = LazyLock::new(|| self_closing("imsakiyah"));

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r#"([A-Za-z_][A-Za-z0-9_-]*)="([^"]*)""#).expect("attribute pattern is valid")
});

/// `<name a="x" b="y"/>` with any number of attributes in any order.
fn self_closing(name: &str) -> Regex {
	Regex::new(&format!(
		r#"<{name}((?:\s+[A-Za-z_][A-Za-z0-9_-]*="[^"]*")*)\s*/>"#
	))
	.expect("self-closing tag pattern is valid")
}

/// A recognized tag: where it sits in the source and what it turns into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TagMatch {
	pub span: Range<usize>,
	pub segment: ContentSegment,
}

fn span_of(caps: &Captures<'_>) -> Range<usize> {
	let whole = caps.get(0).expect("group 0 always participates");
	whole.range()
}

/// First value of `key` in an attribute list. Later duplicates are ignored
/// and a blank value counts as absent.
fn attribute<'t>(attrs: &'t str, key: &str) -> Option<&'t str> {
	ATTR_RE
		.captures_iter(attrs)
		.find(|c| &c[1] == key)
		.and_then(|c| c.get(2))
		.map(|m| m.as_str())
		.filter(|v| !v.trim().is_empty())
}

fn location(attrs: &str) -> Location {
	Location {
		province: attribute(attrs, "provinsi").map(str::to_string),
		regency: attribute(attrs, "kabkota").map(str::to_string),
	}
}

pub(crate) fn quran_refs(text: &str) -> impl Iterator<Item = TagMatch> + '_ {
	QURAN_RE.captures_iter(text).map(|caps| {
		let surah_number = caps[1]
			.parse::<u16>()
			.ok()
			.filter(|n| (1..=114).contains(n));
		TagMatch {
			span: span_of(&caps),
			segment: ContentSegment::QuranRef {
				surah_number,
				verse_range: VerseRange::parse(&caps[2]),
				content: caps[3].to_string(),
			},
		}
	})
}

pub(crate) fn prayer_times(text: &str) -> impl Iterator<Item = TagMatch> + '_ {
	SHALAT_RE.captures_iter(text).map(|caps| TagMatch {
		span: span_of(&caps),
		segment: ContentSegment::PrayerTimes {
			location: location(&caps[1]),
		},
	})
}

/// `query` is mandatory; a `<doa/>` without it stays plain text.
pub(crate) fn doa_lookups(text: &str) -> impl Iterator<Item = TagMatch> + '_ {
	DOA_RE.captures_iter(text).filter_map(|caps| {
		let query = attribute(&caps[1], "query")?;
		Some(TagMatch {
			span: span_of(&caps),
			segment: ContentSegment::DoaLookup {
				doa_query: query.to_string(),
			},
		})
	})
}

pub(crate) fn fasting_schedules(text: &str) -> impl Iterator<Item = TagMatch> + '_ {
	IMSAKIYAH_RE.captures_iter(text).map(|caps| TagMatch {
		span: span_of(&caps),
		segment: ContentSegment::FastingSchedule {
			location: location(&caps[1]),
		},
	})
}
