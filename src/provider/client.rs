use std::pin::Pin;

use futures::StreamExt;
use futures::stream::Stream;
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::api::provider_headers;
use super::normalize::DeltaNormalizer;
use super::sse::SseDecoder;
use super::types::{
	ChatCompletionChunk, ChatCompletionResponse, ChatCompletionsRequest, ErrorResponse, Message,
	ModelsResponse,
};
use crate::catalog::{AiModel, sort_models};
use crate::error::ChatError;
use crate::reassembler::StreamDelta;
use crate::settings::ApiConfig;

/// Appended when a stream ends without a single content token.
pub const EMPTY_RESPONSE_NOTICE: &str = "\n\n(AI sedang memproses, coba lagi jika tidak ada respons)";

pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<StreamDelta, ChatError>> + Send>>;

async fn post_chat(
	client: &Client,
	api: &ApiConfig,
	request: &ChatCompletionsRequest,
) -> Result<reqwest::Response, ChatError> {
	let headers = provider_headers(api)?;
	let resp = client
		.post(format!("{}/chat/completions", api.base_url))
		.headers(headers)
		.json(request)
		.send()
		.await?;
	check_status(resp).await
}

/// Turn a non-2xx response into [`ChatError::Upstream`] with the provider's
/// own message when it sends one.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ChatError> {
	let status = resp.status();
	if status.is_success() {
		return Ok(resp);
	}
	let body = resp.text().await.unwrap_or_default();
	let message = serde_json::from_str::<ErrorResponse>(&body)
		.ok()
		.and_then(|e| e.error.message)
		.unwrap_or_else(|| {
			if body.trim().is_empty() {
				status.canonical_reason().unwrap_or("request failed").to_string()
			} else {
				body
			}
		});
	Err(ChatError::Upstream { status, message })
}

/// Open a streaming chat completion and yield normalised deltas.
///
/// The stream ends quietly once `cancel` fires, whether the request is still
/// in flight or already streaming; callers check the token to tell an abort
/// from a normal end. Transport and provider failures are yielded as a final
/// `Err` item.
pub fn stream_chat(
	client: Client,
	api: ApiConfig,
	request: ChatCompletionsRequest,
	cancel: CancellationToken,
	split_inline_think: bool,
) -> DeltaStream {
	Box::pin(async_stream::stream! {
		info!(
			model = %request.model,
			messages = request.messages.len(),
			base_url = %api.base_url,
			"starting chat stream"
		);

		let response = tokio::select! {
			biased;
			_ = cancel.cancelled() => {
				debug!("cancelled before the provider answered");
				return;
			}
			resp = post_chat(&client, &api, &request) => resp,
		};
		let response = match response {
			Ok(r) => r,
			Err(e) => {
				yield Err(e);
				return;
			}
		};

		let mut bytes_stream = response.bytes_stream();
		let mut decoder = SseDecoder::new();
		let mut normalizer = DeltaNormalizer::new(split_inline_think);
		let mut content_received = false;

		'frames: loop {
			let frame = tokio::select! {
				biased;
				_ = cancel.cancelled() => {
					debug!("cancelled mid-stream");
					return;
				}
				frame = bytes_stream.next() => frame,
			};
			let bytes = match frame {
				Some(Ok(b)) => b,
				Some(Err(e)) => {
					yield Err(ChatError::Transport(e));
					return;
				}
				None => break,
			};

			decoder.push(&bytes);
			while let Some(data) = decoder.next_data() {
				if data == "[DONE]" {
					debug!("provider stream done");
					break 'frames;
				}

				let chunk: ChatCompletionChunk = match serde_json::from_str(&data) {
					Ok(c) => c,
					Err(e) => {
						debug!(error = %e, data = %data, "skipping unparsable chunk");
						continue;
					}
				};

				match normalizer.push(&chunk) {
					Ok(deltas) => {
						for delta in deltas {
							content_received |= delta.has_content();
							yield Ok(delta);
						}
					}
					Err(e) => {
						yield Err(e);
						return;
					}
				}
			}
		}

		if let Some(delta) = normalizer.finish() {
			content_received |= delta.has_content();
			yield Ok(delta);
		}

		if !content_received {
			warn!(model = %request.model, "stream ended without content");
			yield Ok(StreamDelta::content(EMPTY_RESPONSE_NOTICE));
		}

		info!(
			model = %request.model,
			finish_reason = ?normalizer.finish_reason,
			"chat stream complete"
		);
	})
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ConnectionCheck {
	pub ok: bool,
	pub message: String,
}

/// One tiny non-streaming request to check key, URL and model together.
pub async fn test_connection(client: &Client, api: &ApiConfig, model: &str) -> ConnectionCheck {
	if api.require_key().is_err() {
		return ConnectionCheck {
			ok: false,
			message: "API key kosong. Isi di pengaturan atau environment.".to_string(),
		};
	}

	let request = ChatCompletionsRequest {
		model: model.to_string(),
		messages: vec![Message::new("user", "Balas singkat: OK")],
		max_tokens: Some(16),
		temperature: Some(0.0),
		top_p: None,
		stream: None,
	};

	match ping(client, api, &request).await {
		Ok(_) => ConnectionCheck {
			ok: true,
			message: "Koneksi API berhasil.".to_string(),
		},
		Err(e) => {
			warn!(error = %e, model, "connection test failed");
			ConnectionCheck {
				ok: false,
				message: e.to_string(),
			}
		}
	}
}

async fn ping(
	client: &Client,
	api: &ApiConfig,
	request: &ChatCompletionsRequest,
) -> Result<ChatCompletionResponse, ChatError> {
	let resp = post_chat(client, api, request).await?;
	Ok(resp.json().await?)
}

/// Fetch the provider's model list, mapped and sorted for display.
pub async fn fetch_models(client: &Client, api: &ApiConfig) -> Result<Vec<AiModel>, ChatError> {
	let headers = provider_headers(api)?;
	let resp = client
		.get(format!("{}/models", api.base_url))
		.headers(headers)
		.send()
		.await?;
	let models: ModelsResponse = check_status(resp).await?.json().await?;

	let mut mapped: Vec<AiModel> = models.data.into_iter().map(AiModel::from).collect();
	sort_models(&mut mapped);
	info!(count = mapped.len(), "fetched models");
	Ok(mapped)
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use wiremock::matchers::{header, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	use super::*;

	fn api(server: &MockServer) -> ApiConfig {
		ApiConfig {
			base_url: server.uri(),
			api_key: "sk-test".into(),
			..ApiConfig::default()
		}
	}

	fn request() -> ChatCompletionsRequest {
		ChatCompletionsRequest {
			model: "openai/gpt-4.1-mini".into(),
			messages: vec![Message::new("user", "Assalamu'alaikum")],
			max_tokens: Some(4096),
			temperature: Some(0.7),
			top_p: Some(0.95),
			stream: Some(true),
		}
	}

	fn sse(events: &[&str]) -> String {
		events.iter().map(|e| format!("data: {e}\n\n")).collect()
	}

	async fn collect(stream: DeltaStream) -> Vec<Result<StreamDelta, ChatError>> {
		stream.collect().await
	}

	#[tokio::test]
	async fn streams_content_and_reasoning() {
		let server = MockServer::start().await;
		let body = sse(&[
			r#"{"choices":[{"delta":{"reasoning":"mikir"}}]}"#,
			r#"{"choices":[{"delta":{"content":"Wa'alaikum"}}]}"#,
			r#"{"choices":[{"delta":{"content":"salam"},"finish_reason":"stop"}]}"#,
			"[DONE]",
		]);
		Mock::given(method("POST"))
			.and(path("/chat/completions"))
			.and(header("authorization", "Bearer sk-test"))
			.respond_with(
				ResponseTemplate::new(200)
					.insert_header("content-type", "text/event-stream")
					.set_body_string(body),
			)
			.expect(1)
			.mount(&server)
			.await;

		let items = collect(stream_chat(
			Client::new(),
			api(&server),
			request(),
			CancellationToken::new(),
			false,
		))
		.await;
		let deltas: Vec<StreamDelta> = items.into_iter().map(Result::unwrap).collect();
		assert_eq!(
			deltas,
			vec![
				StreamDelta::thinking("mikir"),
				StreamDelta::content("Wa'alaikum"),
				StreamDelta::content("salam"),
			]
		);
	}

	#[tokio::test]
	async fn empty_stream_gets_notice() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/chat/completions"))
			.respond_with(
				ResponseTemplate::new(200)
					.set_body_string(sse(&[r#"{"choices":[{"delta":{"reasoning":"hmm"}}]}"#, "[DONE]"])),
			)
			.mount(&server)
			.await;

		let items = collect(stream_chat(
			Client::new(),
			api(&server),
			request(),
			CancellationToken::new(),
			false,
		))
		.await;
		let last = items.last().unwrap().as_ref().unwrap();
		assert_eq!(last, &StreamDelta::content(EMPTY_RESPONSE_NOTICE));
	}

	#[tokio::test]
	async fn http_error_is_upstream_error() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/chat/completions"))
			.respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
				"error": {"message": "No auth credentials found", "code": 401}
			})))
			.mount(&server)
			.await;

		let items = collect(stream_chat(
			Client::new(),
			api(&server),
			request(),
			CancellationToken::new(),
			false,
		))
		.await;
		assert_eq!(items.len(), 1);
		match &items[0] {
			Err(ChatError::Upstream { status, message }) => {
				assert_eq!(status.as_u16(), 401);
				assert_eq!(message, "No auth credentials found");
			}
			other => panic!("expected upstream error, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn in_stream_error_ends_after_partial_content() {
		let server = MockServer::start().await;
		let body = sse(&[
			r#"{"choices":[{"delta":{"content":"Sebagian"}}]}"#,
			r#"{"error":{"message":"Upstream overloaded","code":502}}"#,
			r#"{"choices":[{"delta":{"content":"tidak sampai"}}]}"#,
		]);
		Mock::given(method("POST"))
			.and(path("/chat/completions"))
			.respond_with(ResponseTemplate::new(200).set_body_string(body))
			.mount(&server)
			.await;

		let items = collect(stream_chat(
			Client::new(),
			api(&server),
			request(),
			CancellationToken::new(),
			false,
		))
		.await;
		assert_eq!(items.len(), 2);
		assert_eq!(items[0].as_ref().unwrap(), &StreamDelta::content("Sebagian"));
		assert!(matches!(&items[1], Err(ChatError::Provider(m)) if m == "Upstream overloaded"));
	}

	#[tokio::test]
	async fn cancellation_ends_stream_without_error() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/chat/completions"))
			.respond_with(
				ResponseTemplate::new(200)
					.set_body_string(sse(&[r#"{"choices":[{"delta":{"content":"late"}}]}"#]))
					.set_delay(Duration::from_secs(5)),
			)
			.mount(&server)
			.await;

		let cancel = CancellationToken::new();
		let stream = stream_chat(Client::new(), api(&server), request(), cancel.clone(), false);
		let handle = tokio::spawn(collect(stream));
		tokio::time::sleep(Duration::from_millis(50)).await;
		cancel.cancel();

		let items = tokio::time::timeout(Duration::from_secs(2), handle)
			.await
			.expect("stream should stop promptly")
			.unwrap();
		assert!(items.is_empty());
	}

	#[tokio::test]
	async fn models_are_mapped_and_sorted() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/models"))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
				"data": [
					{"id": "openai/gpt-4o", "name": "OpenAI: GPT-4o",
					 "pricing": {"prompt": "0.0000025", "completion": "0.00001"},
					 "context_length": 128000},
					{"id": "meta-llama/llama-3.3-70b-instruct:free", "name": "meta-llama/llama-3.3-70b-instruct:free",
					 "pricing": {"prompt": "0", "completion": "0"},
					 "context_length": 131072, "created": 1733000000}
				]
			})))
			.mount(&server)
			.await;

		let models = fetch_models(&Client::new(), &api(&server)).await.unwrap();
		assert_eq!(models.len(), 2);
		assert!(models[0].is_free);
		assert_eq!(models[0].id, "meta-llama/llama-3.3-70b-instruct:free");
		assert_eq!(models[0].name, "Llama 3.3 70b Instruct");
		assert!(!models[1].is_free);
	}

	#[tokio::test]
	async fn connection_test_reports_missing_key() {
		let check = test_connection(&Client::new(), &ApiConfig::default(), "m").await;
		assert!(!check.ok);
	}

	#[tokio::test]
	async fn connection_test_ok() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/chat/completions"))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
				"choices": [{"message": {"role": "assistant", "content": "OK"}}]
			})))
			.mount(&server)
			.await;

		let check = test_connection(&Client::new(), &api(&server), "openai/gpt-4.1-mini").await;
		assert!(check.ok, "{}", check.message);
	}
}
