//! OpenAI-compatible chat completion provider (OpenRouter by default).

pub mod api;
pub mod client;
pub mod normalize;
pub mod sse;
pub mod types;
