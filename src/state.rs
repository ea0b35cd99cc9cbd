use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::catalog::{AiModel, ModelCache, ModelFilter, fallback_models};
use crate::chat::prompt::build_request;
use crate::chat::types::{ChatMessage, ChatSession, SessionSummary};
use crate::config::Config;
use crate::error::{ChatError, StoreError};
use crate::provider::client::fetch_models;
use crate::provider::types::ChatCompletionsRequest;
use crate::reassembler::Reassembler;
use crate::settings::{ApiConfig, Settings, SettingsPatch};
use crate::store::{JsonStore, Snapshot};

/// Handle for the one stream a session may have open.
struct InFlight {
	message_id: String,
	token: CancellationToken,
}

/// Everything a new turn needs once its messages exist.
#[derive(Debug)]
pub struct Turn {
	pub session_id: String,
	pub user_message_id: String,
	pub message_id: String,
	pub request: ChatCompletionsRequest,
	pub token: CancellationToken,
}

pub struct AppState {
	pub config: Config,
	pub client: reqwest::Client,
	store: JsonStore,
	data: RwLock<Snapshot>,
	in_flight: Mutex<HashMap<String, InFlight>>,
}

impl AppState {
	/// Read the persisted snapshot. This is the only place state is loaded.
	pub fn load(config: Config) -> Result<Self, StoreError> {
		let store = JsonStore::open(&config.data_dir);
		let snapshot = store.load()?;
		info!(
			path = %store.path().display(),
			sessions = snapshot.sessions.len(),
			model = %snapshot.settings.selected_model,
			"loaded state"
		);
		Ok(Self {
			config,
			client: reqwest::Client::new(),
			store,
			data: RwLock::new(snapshot),
			in_flight: Mutex::new(HashMap::new()),
		})
	}

	/// Write the snapshot. Callers hold the write guard, so saves never
	/// interleave. This is the only place state is saved.
	fn persist(&self, data: &Snapshot) -> Result<(), ChatError> {
		self.store.save(data).map_err(|e| {
			error!(error = %e, "failed to persist state");
			ChatError::from(e)
		})
	}

	pub async fn settings(&self) -> Settings {
		self.data.read().await.settings.clone()
	}

	pub async fn update_settings(&self, patch: SettingsPatch) -> Result<Settings, ChatError> {
		let mut data = self.data.write().await;
		data.settings.apply(patch);
		self.persist(&data)?;
		info!(model = %data.settings.selected_model, "settings updated");
		Ok(data.settings.clone())
	}

	/// API configuration with blanks filled from the environment.
	pub async fn api_config(&self) -> ApiConfig {
		let mut api = self
			.data
			.read()
			.await
			.settings
			.api
			.resolve(self.config.fallback_api_key.as_deref());
		if let Some(base_url) = &self.config.base_url {
			api.base_url = base_url.clone();
		}
		api
	}

	/// Newest-updated first.
	pub async fn sessions(&self) -> Vec<SessionSummary> {
		let data = self.data.read().await;
		let mut sessions: Vec<SessionSummary> = data.sessions.iter().map(SessionSummary::from).collect();
		sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
		sessions
	}

	pub async fn session(&self, id: &str) -> Result<ChatSession, ChatError> {
		let data = self.data.read().await;
		data.sessions
			.iter()
			.find(|s| s.id == id)
			.cloned()
			.ok_or_else(|| ChatError::SessionNotFound(id.to_string()))
	}

	pub async fn current_session(&self) -> Option<ChatSession> {
		let data = self.data.read().await;
		let current = data.settings.current_session_id.as_deref()?;
		data.sessions.iter().find(|s| s.id == current).cloned()
	}

	/// New empty session using the selected model. It becomes current.
	pub async fn create_session(&self) -> Result<ChatSession, ChatError> {
		let mut data = self.data.write().await;
		let session = ChatSession::new(data.settings.selected_model.clone());
		data.settings.current_session_id = Some(session.id.clone());
		data.sessions.push(session.clone());
		self.persist(&data)?;
		info!(session = %session.id, "session created");
		Ok(session)
	}

	pub async fn select_session(&self, id: &str) -> Result<ChatSession, ChatError> {
		let mut data = self.data.write().await;
		let session = data
			.sessions
			.iter()
			.find(|s| s.id == id)
			.cloned()
			.ok_or_else(|| ChatError::SessionNotFound(id.to_string()))?;
		data.settings.current_session_id = Some(session.id.clone());
		self.persist(&data)?;
		Ok(session)
	}

	pub async fn delete_session(&self, id: &str) -> Result<(), ChatError> {
		self.cancel_stream(id).await;

		let mut data = self.data.write().await;
		let before = data.sessions.len();
		data.sessions.retain(|s| s.id != id);
		if data.sessions.len() == before {
			return Err(ChatError::SessionNotFound(id.to_string()));
		}
		if data.settings.current_session_id.as_deref() == Some(id) {
			data.settings.current_session_id = None;
		}
		self.persist(&data)?;
		info!(session = %id, "session deleted");
		Ok(())
	}

	/// Remove every session, cancelling any open streams first.
	pub async fn clear_sessions(&self) -> Result<usize, ChatError> {
		for (_, flight) in self.in_flight.lock().await.drain() {
			flight.token.cancel();
		}

		let mut data = self.data.write().await;
		let removed = data.sessions.len();
		data.sessions.clear();
		data.settings.current_session_id = None;
		self.persist(&data)?;
		info!(removed, "history cleared");
		Ok(removed)
	}

	/// Model list for the picker. A fresh cache is reused unless `refresh`;
	/// a failed fetch falls back to a stale cache, then to the built-in list.
	pub async fn models(&self, filter: ModelFilter, refresh: bool) -> Vec<AiModel> {
		let cached = {
			let data = self.data.read().await;
			data.models
				.as_ref()
				.filter(|c| !refresh && c.is_fresh(Utc::now()))
				.map(|c| c.models.clone())
		};

		let mut models = match cached {
			Some(models) => {
				debug!(count = models.len(), "serving cached models");
				models
			}
			None => self.refresh_models().await,
		};

		let custom = self.data.read().await.settings.custom_models.clone();
		for id in custom {
			if !models.iter().any(|m| m.id == id) {
				models.push(AiModel::custom(&id));
			}
		}

		models.retain(|m| filter.matches(m));
		models
	}

	async fn refresh_models(&self) -> Vec<AiModel> {
		let api = self.api_config().await;
		match fetch_models(&self.client, &api).await {
			Ok(models) if !models.is_empty() => {
				let mut data = self.data.write().await;
				data.models = Some(ModelCache::new(models.clone()));
				// a failed cache write still leaves the list usable
				let _ = self.persist(&data);
				models
			}
			Ok(_) => {
				warn!("provider returned no models, using fallback list");
				self.stale_models_or_fallback().await
			}
			Err(e) => {
				warn!(error = %e, "failed to fetch models");
				self.stale_models_or_fallback().await
			}
		}
	}

	async fn stale_models_or_fallback(&self) -> Vec<AiModel> {
		let data = self.data.read().await;
		match data.models.as_ref() {
			Some(cache) if !cache.models.is_empty() => cache.models.clone(),
			_ => fallback_models(),
		}
	}

	/// Open a turn: pick or create the session, append the user message and
	/// an assistant placeholder, then cancel the session's previous stream.
	///
	/// `session_id` of `None` means the current session, or a new one when
	/// nothing is current. Nothing changes, in memory or in flight, unless
	/// the new messages were saved.
	pub async fn begin_turn(
		&self,
		session_id: Option<&str>,
		question: &str,
	) -> Result<Turn, ChatError> {
		let mut data = self.data.write().await;

		let target = match session_id {
			Some(id) => Some(id.to_string()),
			None => data
				.settings
				.current_session_id
				.clone()
				.filter(|id| data.sessions.iter().any(|s| &s.id == id)),
		};
		let (session_id, backup) = match target {
			Some(id) => {
				let backup = data.sessions.iter().find(|s| s.id == id).cloned();
				if backup.is_none() {
					return Err(ChatError::SessionNotFound(id));
				}
				(id, backup)
			}
			None => {
				let session = ChatSession::new(data.settings.selected_model.clone());
				let id = session.id.clone();
				data.sessions.push(session);
				(id, None)
			}
		};
		let previous_current = data.settings.current_session_id.replace(session_id.clone());
		let model = data.settings.selected_model.clone();

		let Some(session) = data.sessions.iter_mut().find(|s| s.id == session_id) else {
			return Err(ChatError::SessionNotFound(session_id));
		};
		let request = build_request(&model, &session.messages, question, None);
		session.model_id = model;

		let user = ChatMessage::user(question);
		let placeholder = ChatMessage::assistant_placeholder();
		let user_message_id = user.id.clone();
		let message_id = placeholder.id.clone();
		session.push(user);
		session.push(placeholder);

		if let Err(e) = self.persist(&data) {
			match backup {
				Some(backup) => {
					if let Some(session) = data.sessions.iter_mut().find(|s| s.id == session_id) {
						*session = backup;
					}
				}
				None => data.sessions.retain(|s| s.id != session_id),
			}
			data.settings.current_session_id = previous_current;
			warn!(session = %session_id, "turn not started, state left as it was");
			return Err(e);
		}
		if backup.is_none() {
			info!(session = %session_id, "session created for new question");
		}

		let token = CancellationToken::new();
		let previous = self.in_flight.lock().await.insert(
			session_id.clone(),
			InFlight {
				message_id: message_id.clone(),
				token: token.clone(),
			},
		);
		if let Some(previous) = previous {
			debug!(session = %session_id, message = %previous.message_id, "cancelling previous stream");
			previous.token.cancel();
		}

		Ok(Turn {
			session_id,
			user_message_id,
			message_id,
			request,
			token,
		})
	}

	/// Run `f` against the in-flight message. With `persist`, the session is
	/// touched and the snapshot saved afterwards.
	pub async fn update_message<R>(
		&self,
		session_id: &str,
		message_id: &str,
		persist: bool,
		f: impl FnOnce(&mut Reassembler<'_>) -> R,
	) -> Result<R, ChatError> {
		let mut data = self.data.write().await;
		let session = data
			.sessions
			.iter_mut()
			.find(|s| s.id == session_id)
			.ok_or_else(|| ChatError::SessionNotFound(session_id.to_string()))?;
		let message = session
			.message_mut(message_id)
			.ok_or_else(|| ChatError::SessionNotFound(session_id.to_string()))?;

		let out = f(&mut Reassembler::new(message));
		if persist {
			session.touch();
			self.persist(&data)?;
		}
		Ok(out)
	}

	/// Drop the in-flight handle, unless a newer turn already replaced it.
	pub async fn end_stream(&self, session_id: &str, message_id: &str) {
		let mut in_flight = self.in_flight.lock().await;
		if in_flight
			.get(session_id)
			.is_some_and(|f| f.message_id == message_id)
		{
			in_flight.remove(session_id);
		}
	}

	/// Cancel the session's open stream. Returns whether there was one.
	pub async fn cancel_stream(&self, session_id: &str) -> bool {
		match self.in_flight.lock().await.remove(session_id) {
			Some(flight) => {
				info!(session = %session_id, message = %flight.message_id, "stream cancelled");
				flight.token.cancel();
				true
			}
			None => false,
		}
	}
}
