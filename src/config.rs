use std::env;
use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};

use crate::error::StoreError;
use crate::provider::api::normalize_base_url;

const DEFAULT_PORT: u16 = 4141;
const DEFAULT_BIND: &str = "127.0.0.1";
const APP_DIR: &str = "ustadz";

/// Process-level configuration, read once from the environment.
#[derive(Debug, Clone)]
pub struct Config {
	pub bind: IpAddr,
	pub port: u16,
	pub data_dir: PathBuf,
	/// Used when the persisted settings carry no API key.
	pub fallback_api_key: Option<String>,
	/// Overrides the persisted base URL when set.
	pub base_url: Option<String>,
	/// Move `<think>` blocks found in the content channel to thinking.
	pub split_inline_think: bool,
}

impl Config {
	pub fn from_env() -> anyhow::Result<Self> {
		let port = match env::var("PORT") {
			Ok(p) => p
				.parse()
				.with_context(|| format!("PORT must be a port number, got {p:?}"))?,
			Err(_) => DEFAULT_PORT,
		};

		let bind = env::var("BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());
		let bind: IpAddr = bind
			.parse()
			.with_context(|| format!("BIND must be an IP address, got {bind:?}"))?;

		let data_dir = match non_empty_var("USTADZ_DATA_DIR") {
			Some(dir) => PathBuf::from(dir),
			None => default_data_dir()?,
		};

		let split_inline_think = match non_empty_var("USTADZ_SPLIT_THINK_TAGS").as_deref() {
			None | Some("1" | "true" | "yes" | "on") => true,
			Some("0" | "false" | "no" | "off") => false,
			Some(other) => bail!("USTADZ_SPLIT_THINK_TAGS must be a boolean, got {other:?}"),
		};

		Ok(Self {
			bind,
			port,
			data_dir,
			fallback_api_key: non_empty_var("OPENROUTER_API_KEY"),
			base_url: non_empty_var("OPENROUTER_BASE_URL").map(|u| normalize_base_url(&u)),
			split_inline_think,
		})
	}

	/// Defaults with an explicit data directory and no environment lookups.
	#[cfg(test)]
	pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
		Self {
			bind: IpAddr::from([127, 0, 0, 1]),
			port: DEFAULT_PORT,
			data_dir: data_dir.into(),
			fallback_api_key: None,
			base_url: None,
			split_inline_think: true,
		}
	}
}

fn non_empty_var(key: &str) -> Option<String> {
	env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn default_data_dir() -> Result<PathBuf, StoreError> {
	dirs::data_dir()
		.map(|d| d.join(APP_DIR))
		.ok_or(StoreError::NoDataDir)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn explicit_data_dir_defaults() {
		let config = Config::with_data_dir("/tmp/ustadz-test");
		assert_eq!(config.data_dir, PathBuf::from("/tmp/ustadz-test"));
		assert_eq!(config.port, DEFAULT_PORT);
		assert!(config.split_inline_think);
		assert!(config.fallback_api_key.is_none());
	}
}
