//! Keyword topic detection for doa/ayat recommendations and follow-up
//! suggestions.

struct TopicRule {
	id: &'static str,
	keywords: &'static [&'static str],
	doa_query: &'static str,
	ayat_refs: &'static [&'static str],
	follow_ups: [&'static str; 3],
}

const TOPIC_RULES: &[TopicRule] = &[
	TopicRule {
		id: "anxiety",
		keywords: &[
			"cemas",
			"gelisah",
			"takut",
			"stress",
			"stres",
			"sedih",
			"putus asa",
			"overthinking",
		],
		doa_query: "ketenangan hati",
		ayat_refs: &["13:28", "2:286"],
		follow_ups: [
			"Bagaimana cara berdzikir saat hati sedang cemas?",
			"Ayat apa yang dibaca ketika merasa takut berlebihan?",
			"Doa pendek agar hati lebih tenang setelah shalat",
		],
	},
	TopicRule {
		id: "rizki",
		keywords: &[
			"rezeki",
			"rizki",
			"hutang",
			"utang",
			"pekerjaan",
			"usaha",
			"bisnis",
		],
		doa_query: "kelapangan rezeki",
		ayat_refs: &["65:2-3", "51:58"],
		follow_ups: [
			"Amalan harian agar dimudahkan rezeki halal",
			"Bagaimana adab mencari nafkah menurut Islam?",
			"Doa setelah subuh untuk keberkahan rezeki",
		],
	},
	TopicRule {
		id: "family",
		keywords: &[
			"orang tua",
			"ibu",
			"ayah",
			"keluarga",
			"suami",
			"istri",
			"anak",
			"rumah tangga",
		],
		doa_query: "kebaikan keluarga",
		ayat_refs: &["17:23", "25:74"],
		follow_ups: [
			"Bagaimana cara berbakti pada orang tua saat beda pendapat?",
			"Doa untuk kebaikan pasangan dan anak",
			"Ayat tentang menjaga keharmonisan keluarga",
		],
	},
	TopicRule {
		id: "sin",
		keywords: &["dosa", "maksiat", "taubat", "ampunan", "istighfar", "lalai"],
		doa_query: "taubat dan ampunan",
		ayat_refs: &["39:53", "66:8"],
		follow_ups: [
			"Langkah taubat nasuha yang benar menurut ulama",
			"Dzikir istighfar yang dianjurkan setelah shalat",
			"Bagaimana menjaga istiqamah setelah bertaubat?",
		],
	},
	TopicRule {
		id: "study",
		keywords: &["belajar", "ujian", "ilmu", "hafalan", "fokus", "malas"],
		doa_query: "kemudahan belajar",
		ayat_refs: &["20:114", "58:11"],
		follow_ups: [
			"Doa sebelum belajar yang shahih",
			"Tips Islam untuk menjaga semangat menuntut ilmu",
			"Ayat motivasi agar konsisten belajar",
		],
	},
];

const GENERIC_FOLLOW_UPS: [&str; 3] = [
	"Bisa berikan dalil ayat yang paling kuat tentang ini?",
	"Apa amalan praktis yang bisa saya mulai hari ini?",
	"Doa apa yang cocok dibaca terkait pembahasan ini?",
];

const RECOMMENDATION_HEADER: &str = "Tambahkan section **🎯 Rekomendasi Doa & Ayat** di akhir jawaban.";

/// Lowercase, anything outside `[a-z0-9]` and whitespace becomes a space,
/// runs of whitespace collapse.
fn normalize(text: &str) -> String {
	let lowered: String = text
		.to_lowercase()
		.chars()
		.map(|c| {
			if c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() {
				c
			} else {
				' '
			}
		})
		.collect();
	lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Rule with the most keyword hits; ties keep the earlier rule.
fn detect_topic(question: &str) -> Option<&'static TopicRule> {
	let normalized = normalize(question);
	if normalized.is_empty() {
		return None;
	}

	let mut best: Option<(&'static TopicRule, usize)> = None;
	for rule in TOPIC_RULES {
		let score = rule
			.keywords
			.iter()
			.filter(|k| normalized.contains(*k))
			.count();
		if score > best.map_or(0, |(_, s)| s) {
			best = Some((rule, score));
		}
	}
	best.map(|(rule, _)| rule)
}

/// Detected topic id, if any.
pub fn topic_id(question: &str) -> Option<&'static str> {
	detect_topic(question).map(|r| r.id)
}

/// Extra system-prompt lines asking for a doa and ayat matched to the
/// question's topic.
pub fn recommendation_instruction(question: &str) -> String {
	match detect_topic(question) {
		Some(topic) => [
			RECOMMENDATION_HEADER.to_string(),
			format!("Topik terdeteksi: {}.", topic.id),
			format!(
				"- Prioritaskan ayat dengan referensi: {}.",
				topic.ayat_refs.join(", ")
			),
			format!(
				"- Sertakan 1 doa harian via tag <doa query=\"{}\"/>.",
				topic.doa_query
			),
			"- Jelaskan singkat kapan ayat/doa diamalkan.".to_string(),
		]
		.join("\n"),
		None => [
			RECOMMENDATION_HEADER,
			"- Berikan minimal 1 ayat relevan dengan format <quran ref=\"...\">...</quran>.",
			"- Sertakan 1 doa harian via tag <doa query=\"hidayah dan kebaikan\"/>.",
			"- Jelaskan singkat kapan doa tersebut dibaca.",
		]
		.join("\n"),
	}
}

pub fn follow_ups(question: &str) -> Vec<String> {
	let picked = detect_topic(question).map_or(GENERIC_FOLLOW_UPS, |t| t.follow_ups);
	picked.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn normalize_strips_punctuation() {
		assert_eq!(normalize("  Saya CEMAS!!  dan\ttakut... "), "saya cemas dan takut");
		assert_eq!(normalize("ٱلْحَمْدُ"), "");
	}

	#[test]
	fn anxiety_instruction() {
		let instruction = recommendation_instruction("Saya sedang cemas dan takut berlebihan");
		assert!(instruction.contains("Topik terdeteksi: anxiety."));
		assert!(instruction.contains(r#"<doa query="ketenangan hati"/>"#));
		assert!(instruction.contains("13:28, 2:286"));
	}

	#[test]
	fn generic_instruction_without_topic() {
		let instruction = recommendation_instruction("Apa hukum memakai jam tangan?");
		assert!(!instruction.contains("Topik terdeteksi"));
		assert!(instruction.contains(r#"<doa query="hidayah dan kebaikan"/>"#));
	}

	#[test]
	fn rizki_follow_ups() {
		let follow_ups = follow_ups("Bagaimana Islam membahas hutang dan rezeki?");
		assert_eq!(follow_ups.len(), 3);
		assert!(follow_ups[0].contains("rezeki"));
	}

	#[test]
	fn highest_score_wins() {
		// one family keyword, two study keywords
		assert_eq!(topic_id("anak saya malas belajar"), Some("study"));
	}

	#[test]
	fn ties_keep_the_earlier_rule() {
		assert_eq!(topic_id("takut dosa"), Some("anxiety"));
	}

	#[test]
	fn empty_question_falls_back() {
		assert_eq!(topic_id("   "), None);
		assert_eq!(follow_ups("?!"), GENERIC_FOLLOW_UPS);
	}
}
