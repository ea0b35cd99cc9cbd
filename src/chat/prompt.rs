//! System prompt and the request sent for each turn.

use super::enhance::recommendation_instruction;
use super::types::ChatMessage;
use crate::provider::types::{ChatCompletionsRequest, Message};

/// Number of earlier messages sent along with a new question.
pub const HISTORY_LIMIT: usize = 6;

const MAX_TOKENS: u64 = 4096;
const TEMPERATURE: f64 = 0.7;
const TOP_P: f64 = 0.95;

/// Used when no retrieved ayat context is available for the question.
pub const NO_CONTEXT: &str =
	"Tidak dapat mengambil konteks ayat. Jawab berdasarkan pengetahuan umum tentang Al-Quran.";

const PERSONA: &str = r#"Anda adalah Ustadz AI, seorang ulama virtual yang memiliki pengetahuan mendalam tentang Al-Quran, Hadits, Fiqih, Aqidah, Akhlak, dan Sejarah Islam. Anda menjawab dengan hikmah, kelembutan, dan penuh kasih sayang seperti seorang kyai yang bijaksana.

## IDENTITAS ANDA
- Nama: Ustadz AI
- Peran: Asisten pembelajaran Islam yang membantu umat memahami agama dengan benar
- Gaya bicara: Hangat dan penuh kasih, menyapa dengan "Saudaraku", "Ananda", atau "Antum"
- Menyebut diri sebagai "ana" atau "kami"
- Mengakhiri jawaban dengan doa yang relevan dan motivasi singkat

## PANDUAN MENJAWAB

### Format Kutipan Al-Quran
WAJIB menggunakan format XML untuk setiap ayat:
<quran ref="[nomor_surah]:[nomor_ayat]">[teks arab]</quran>

Contoh:
- Satu ayat: <quran ref="2:255">اللَّهُ لَا إِلَٰهَ إِلَّا هُوَ الْحَيُّ الْقَيُّومُ</quran>
- Range ayat: <quran ref="17:23-24">وَقَضَىٰ رَبُّكَ أَلَّا تَعْبُدُوا إِلَّا إِيَّاهُ</quran>

### Format Integrasi Fitur
1. Waktu Sholat: <shalat/>, atau dengan lokasi <shalat provinsi="JAWA TIMUR" kabkota="malang"/>
2. Doa Harian: <doa query="[kata kunci pencarian]"/>, misal <doa query="sebelum makan"/>
3. Jadwal Imsakiyah: <imsakiyah/>, atau dengan lokasi <imsakiyah provinsi="JAWA TIMUR" kabkota="malang"/>

Cukup tulis nama kota/kabupaten di kabkota, sistem akan mencari otomatis.

### Aturan Penting
1. SELALU kutip ayat dengan nomor surah dan ayat yang PRESISI
2. Jangan mengarang ayat atau hadits, jika tidak yakin katakan "Wallahu a'lam"
3. Untuk hadits, sebutkan perawi (HR. Bukhari, Muslim, dll)
4. Gunakan format markdown untuk struktur yang rapi
5. Jika pertanyaan di luar kapasitas atau tidak islami, tolak dengan sopan
6. SELALU gunakan tag integrasi (<shalat/>, <doa/>, <imsakiyah/>) saat relevan

### Follow-up dan Rekomendasi
- Tambahkan section **🔁 Follow-up Otomatis** berisi 2-3 pertanyaan lanjutan singkat yang relevan dengan topik user.
- Tambahkan section **🎯 Rekomendasi Doa & Ayat** sesuai instruksi spesifik dari sistem.
- Untuk rekomendasi doa, WAJIB gunakan tag <doa query="..."/> agar kartu doa muncul."#;

pub fn system_prompt(context: &str, recommendation: &str) -> String {
	format!(
		"{PERSONA}\n\n## INSTRUKSI KHUSUS REKOMENDASI DOA & AYAT\n{recommendation}\n\n\
		 ## KONTEKS AYAT RELEVAN DARI DATABASE\n{context}\n\n\
		 Gunakan konteks di atas untuk memberikan jawaban yang akurat dengan kutipan ayat yang presisi. \
		 Jika konteks tidak cukup, jawab berdasarkan pengetahuan Islam yang benar sambil menyebutkan \"Wallahu a'lam\" untuk hal yang tidak pasti."
	)
}

/// System prompt, the last [`HISTORY_LIMIT`] messages of `history` that have
/// content, then `question`. Messages aborted before the first token do not
/// use up the window.
pub fn build_request(
	model: &str,
	history: &[ChatMessage],
	question: &str,
	context: Option<&str>,
) -> ChatCompletionsRequest {
	let system = system_prompt(
		context.unwrap_or(NO_CONTEXT),
		&recommendation_instruction(question),
	);

	let earlier: Vec<&ChatMessage> = history.iter().filter(|m| !m.content().is_empty()).collect();
	let start = earlier.len().saturating_sub(HISTORY_LIMIT);

	let mut messages = Vec::with_capacity(HISTORY_LIMIT + 2);
	messages.push(Message::new("system", system));
	messages.extend(
		earlier[start..]
			.iter()
			.map(|m| Message::new(m.role.as_str(), m.content())),
	);
	messages.push(Message::new("user", question));

	ChatCompletionsRequest {
		model: model.to_string(),
		messages,
		max_tokens: Some(MAX_TOKENS),
		temperature: Some(TEMPERATURE),
		top_p: Some(TOP_P),
		stream: Some(true),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::chat::types::ChatSession;

	#[test]
	fn prompt_carries_grammar_and_context() {
		let prompt = system_prompt("QS 2:255 ...", "Topik terdeteksi: sin.");
		assert!(prompt.contains(r#"<quran ref="[nomor_surah]:[nomor_ayat]">"#));
		assert!(prompt.contains("<imsakiyah/>"));
		assert!(prompt.contains("Topik terdeteksi: sin."));
		assert!(prompt.contains("QS 2:255 ..."));
	}

	#[test]
	fn request_uses_last_six_messages() {
		let mut session = ChatSession::new("m");
		for i in 0..8 {
			session.push(ChatMessage::user(format!("q{i}")));
		}
		let req = build_request("openai/gpt-4.1-mini", &session.messages, "baru", None);

		assert_eq!(req.messages.len(), 1 + HISTORY_LIMIT + 1);
		assert_eq!(req.messages[0].role, "system");
		assert!(req.messages[0].content.contains(NO_CONTEXT));
		assert_eq!(req.messages[1].content, "q2");
		assert_eq!(req.messages[6].content, "q7");
		assert_eq!(req.messages[7].role, "user");
		assert_eq!(req.messages[7].content, "baru");
		assert_eq!(req.max_tokens, Some(4096));
		assert_eq!(req.temperature, Some(0.7));
		assert_eq!(req.top_p, Some(0.95));
		assert_eq!(req.stream, Some(true));
	}

	#[test]
	fn empty_assistant_turns_are_skipped() {
		let history = vec![
			ChatMessage::user("pertama"),
			ChatMessage::assistant_placeholder(),
		];
		let req = build_request("m", &history, "kedua", Some("ctx"));
		let roles: Vec<&str> = req.messages.iter().map(|m| m.role.as_str()).collect();
		assert_eq!(roles, ["system", "user", "user"]);
	}

	#[test]
	fn aborted_placeholders_do_not_shrink_the_window() {
		let mut history = Vec::new();
		for i in 0..6 {
			history.push(ChatMessage::user(format!("q{i}")));
		}
		history.push(ChatMessage::user("q6"));
		history.push(ChatMessage::assistant_placeholder());

		let req = build_request("m", &history, "baru", None);
		let contents: Vec<&str> = req.messages[1..7].iter().map(|m| m.content.as_str()).collect();
		assert_eq!(req.messages.len(), 1 + HISTORY_LIMIT + 1);
		assert_eq!(contents, ["q1", "q2", "q3", "q4", "q5", "q6"]);
	}
}
