//! JSON document store for sessions, settings and the model cache.

use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::catalog::{DEFAULT_MODEL, ModelCache};
use crate::chat::types::ChatSession;
use crate::error::StoreError;
use crate::settings::Settings;

pub const STORE_VERSION: u32 = 2;
const FILE_NAME: &str = "chat.json";

/// Everything that survives a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
	#[serde(default)]
	pub version: u32,
	#[serde(default)]
	pub sessions: Vec<ChatSession>,
	#[serde(default)]
	pub settings: Settings,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub models: Option<ModelCache>,
}

impl Default for Snapshot {
	fn default() -> Self {
		Self {
			version: STORE_VERSION,
			sessions: Vec::new(),
			settings: Settings::default(),
			models: None,
		}
	}
}

/// On-disk shapes we know how to read. The bare array is what the old
/// browser build exported.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredDocument {
	Legacy(Vec<ChatSession>),
	Current(Snapshot),
}

impl Snapshot {
	/// Bring a freshly read document up to date. Returns whether anything
	/// changed and the document should be written back.
	fn migrate(&mut self) -> bool {
		let mut changed = self.version != STORE_VERSION;
		self.version = STORE_VERSION;

		let fallback_model = if self.settings.selected_model.trim().is_empty() {
			DEFAULT_MODEL.to_string()
		} else {
			self.settings.selected_model.clone()
		};

		for session in &mut self.sessions {
			if session.model_id.trim().is_empty() {
				session.model_id = fallback_model.clone();
				changed = true;
			}
			for message in &mut session.messages {
				if message.repair_interrupted() {
					debug!(session = %session.id, message = %message.id, "repaired interrupted message");
					changed = true;
				}
			}
		}

		if let Some(current) = &self.settings.current_session_id
			&& !self.sessions.iter().any(|s| &s.id == current)
		{
			warn!(session = %current, "current session no longer exists, clearing");
			self.settings.current_session_id = None;
			changed = true;
		}

		changed
	}
}

#[derive(Debug, Clone)]
pub struct JsonStore {
	path: PathBuf,
}

impl JsonStore {
	/// Store backed by `<data_dir>/chat.json`. The directory is created on
	/// first save.
	pub fn open(data_dir: impl AsRef<Path>) -> Self {
		Self {
			path: data_dir.as_ref().join(FILE_NAME),
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Read the document, migrating and rewriting older shapes once.
	/// A missing file is an empty store.
	pub fn load(&self) -> Result<Snapshot, StoreError> {
		let file = match fs::File::open(&self.path) {
			Ok(f) => f,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				info!(path = %self.path.display(), "no store yet, starting empty");
				return Ok(Snapshot::default());
			}
			Err(source) => {
				return Err(StoreError::Io {
					path: self.path.clone(),
					source,
				});
			}
		};

		let document: StoredDocument =
			serde_json::from_reader(BufReader::new(file)).map_err(|source| StoreError::Json {
				path: self.path.clone(),
				source,
			})?;

		let (mut snapshot, legacy) = match document {
			StoredDocument::Legacy(sessions) => (
				Snapshot {
					sessions,
					..Snapshot::default()
				},
				true,
			),
			StoredDocument::Current(snapshot) => (snapshot, false),
		};

		if snapshot.migrate() || legacy {
			info!(
				path = %self.path.display(),
				sessions = snapshot.sessions.len(),
				legacy,
				"migrated store"
			);
			self.save(&snapshot)?;
		}

		Ok(snapshot)
	}

	/// Write to a sibling temp file, then rename over the old document.
	pub fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
		let io_err = |source: std::io::Error| StoreError::Io {
			path: self.path.clone(),
			source,
		};

		if let Some(parent) = self.path.parent() {
			fs::create_dir_all(parent).map_err(io_err)?;
		}

		let tmp = self.path.with_extension("json.tmp");
		let file = fs::File::create(&tmp).map_err(io_err)?;
		let mut buf = BufWriter::new(file);
		serde_json::to_writer_pretty(&mut buf, snapshot).map_err(|source| StoreError::Json {
			path: tmp.clone(),
			source,
		})?;
		buf.write_all(b"\n").map_err(io_err)?;
		buf.flush().map_err(io_err)?;
		drop(buf);

		fs::rename(&tmp, &self.path).map_err(io_err)?;
		debug!(path = %self.path.display(), sessions = snapshot.sessions.len(), "store saved");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::chat::types::{ChatMessage, MessageStatus};

	#[test]
	fn missing_file_is_empty_store() {
		let dir = tempfile::tempdir().unwrap();
		let store = JsonStore::open(dir.path());
		let snapshot = store.load().unwrap();
		assert_eq!(snapshot, Snapshot::default());
		assert!(!store.path().exists());
	}

	#[test]
	fn save_then_load() {
		let dir = tempfile::tempdir().unwrap();
		let store = JsonStore::open(dir.path().join("nested"));

		let mut session = ChatSession::new(DEFAULT_MODEL);
		session.push(ChatMessage::user("Apa itu zakat fitrah?"));
		let mut snapshot = Snapshot::default();
		snapshot.settings.current_session_id = Some(session.id.clone());
		snapshot.sessions.push(session);

		store.save(&snapshot).unwrap();
		let loaded = store.load().unwrap();
		assert!(!store.path().with_extension("json.tmp").exists());

		assert_eq!(loaded.settings, snapshot.settings);
		let (a, b) = (&loaded.sessions[0], &snapshot.sessions[0]);
		assert_eq!(a.id, b.id);
		assert_eq!(a.title, "Apa itu zakat fitrah?");
		assert_eq!(a.messages[0].content(), "Apa itu zakat fitrah?");
		// timestamps are stored at millisecond precision
		assert_eq!(a.created_at.timestamp_millis(), b.created_at.timestamp_millis());
	}

	#[test]
	fn legacy_array_is_migrated_once() {
		let dir = tempfile::tempdir().unwrap();
		let store = JsonStore::open(dir.path());
		fs::write(
			store.path(),
			r#"[{
				"id": "s1",
				"title": "Doa tidur",
				"messages": [
					{"id": "m1", "role": "user", "content": "doa tidur?", "timestamp": 1700000000000},
					{"id": "m2", "role": "assistant", "content": "<doa query=\"tidur\"/>",
					 "thinking": "cari doa", "isStreaming": true, "timestamp": 1700000001000}
				],
				"createdAt": 1700000000000,
				"updatedAt": 1700000001000
			}]"#,
		)
		.unwrap();

		let snapshot = store.load().unwrap();
		assert_eq!(snapshot.version, STORE_VERSION);
		let session = &snapshot.sessions[0];
		assert_eq!(session.model_id, DEFAULT_MODEL);
		assert_eq!(session.messages[1].status(), MessageStatus::Aborted);
		assert_eq!(session.messages[1].thinking_content(), Some("cari doa"));

		// rewritten in the current shape
		let raw = fs::read_to_string(store.path()).unwrap();
		assert!(raw.trim_start().starts_with('{'));
		assert!(!raw.contains("isStreaming"));
		assert_eq!(store.load().unwrap(), snapshot);
	}

	#[test]
	fn streaming_messages_are_frozen_on_load() {
		let dir = tempfile::tempdir().unwrap();
		let store = JsonStore::open(dir.path());

		let mut session = ChatSession::new(DEFAULT_MODEL);
		session.push(ChatMessage::assistant_placeholder());
		let mut snapshot = Snapshot::default();
		snapshot.sessions.push(session);
		store.save(&snapshot).unwrap();

		let loaded = store.load().unwrap();
		assert_eq!(loaded.sessions[0].messages[0].status(), MessageStatus::Aborted);
	}

	#[test]
	fn dangling_current_session_is_cleared() {
		let dir = tempfile::tempdir().unwrap();
		let store = JsonStore::open(dir.path());
		let mut snapshot = Snapshot::default();
		snapshot.settings.current_session_id = Some("gone".into());
		store.save(&snapshot).unwrap();

		assert_eq!(store.load().unwrap().settings.current_session_id, None);
	}

	#[test]
	fn corrupt_file_is_a_json_error() {
		let dir = tempfile::tempdir().unwrap();
		let store = JsonStore::open(dir.path());
		fs::write(store.path(), "{not json").unwrap();
		assert!(matches!(store.load(), Err(StoreError::Json { .. })));
	}
}
