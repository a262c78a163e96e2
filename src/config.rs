use std::path::PathBuf;
use std::time::Duration;

use crate::errors::AppError;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";
const DEFAULT_MODEL: &str = "qwen-plus";
const DEFAULT_SYSTEM_PROMPT: &str = "You are a professional programming assistant.";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_STATIC_DIR: &str = "public";

/// Settings for the upstream OpenAI-compatible completion API.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub connect_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub upstream: UpstreamConfig,
    pub default_system_prompt: String,
    pub static_dir: PathBuf,
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source. Empty values
    /// count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match var("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| AppError::invalid_env("PORT", raw, e))?,
            None => DEFAULT_PORT,
        };

        let connect_timeout = match var("UPSTREAM_CONNECT_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| AppError::invalid_env("UPSTREAM_CONNECT_TIMEOUT_SECS", raw, e))?,
            None => Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        };

        let api_key = var("UPSTREAM_API_KEY").ok_or(AppError::MissingEnv {
            name: "UPSTREAM_API_KEY",
        })?;

        let base_url = var("UPSTREAM_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(AppError::invalid_env(
                "UPSTREAM_BASE_URL",
                base_url,
                "expected an http:// or https:// URL",
            ));
        }

        Ok(Self {
            port,
            upstream: UpstreamConfig {
                api_key,
                base_url: base_url.trim_end_matches('/').to_string(),
                model: var("UPSTREAM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                connect_timeout,
            },
            default_system_prompt: var("DEFAULT_SYSTEM_PROMPT")
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            static_dir: var("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR)),
        })
    }
}
