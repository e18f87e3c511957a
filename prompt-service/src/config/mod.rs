use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::services::providers::gemini::GEMINI_API_BASE;

/// Default timeout for a single generation call.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct PromptConfig {
    pub common: core_config::Config,
    pub environment: String,
    pub storage: StorageConfig,
    pub genai: GenaiSettings,
    pub security: SecurityConfig,
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(AppError::ConfigError(anyhow::anyhow!(
                "Unknown STORAGE_BACKEND '{}', expected 'postgres' or 'memory'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Required when `backend` is Postgres.
    pub database_url: Option<Secret<String>>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    Mock,
}

impl FromStr for ProviderKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gemini" => Ok(ProviderKind::Gemini),
            "mock" => Ok(ProviderKind::Mock),
            other => Err(AppError::ConfigError(anyhow::anyhow!(
                "Unknown GENAI_PROVIDER '{}', expected 'gemini' or 'mock'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenaiSettings {
    pub provider: ProviderKind,
    /// Required when `provider` is Gemini.
    pub api_key: Option<Secret<String>>,
    pub text_model: String,
    pub api_base: String,
    pub request_timeout: Duration,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

impl PromptConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let is_prod = environment == "prod";

        let backend: StorageBackend = get_env("STORAGE_BACKEND", Some("postgres"), false)?.parse()?;
        if is_prod && backend == StorageBackend::Memory {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "STORAGE_BACKEND=memory is not allowed in production"
            )));
        }
        let database_url = match backend {
            StorageBackend::Postgres => Some(Secret::new(get_env("DATABASE_URL", None, is_prod)?)),
            StorageBackend::Memory => None,
        };

        let provider: ProviderKind = get_env("GENAI_PROVIDER", Some("gemini"), false)?.parse()?;
        let api_key = match provider {
            ProviderKind::Gemini => Some(Secret::new(get_env("GOOGLE_API_KEY", None, is_prod)?)),
            ProviderKind::Mock => None,
        };

        Ok(PromptConfig {
            common: common_config,
            environment,
            storage: StorageConfig {
                backend,
                database_url,
                max_connections: get_parsed("DATABASE_MAX_CONNECTIONS", 10)?,
                min_connections: get_parsed("DATABASE_MIN_CONNECTIONS", 1)?,
            },
            genai: GenaiSettings {
                provider,
                api_key,
                text_model: get_env("GENAI_TEXT_MODEL", Some("gemini-2.0-flash"), false)?,
                api_base: get_env("GENAI_API_BASE", Some(GEMINI_API_BASE), false)?,
                request_timeout: Duration::from_secs(get_parsed(
                    "GENAI_REQUEST_TIMEOUT_SECS",
                    DEFAULT_REQUEST_TIMEOUT_SECS,
                )?),
                temperature: get_optional_parsed("GENAI_TEMPERATURE")?,
                max_output_tokens: get_optional_parsed("GENAI_MAX_OUTPUT_TOKENS")?,
            },
            security: SecurityConfig {
                allowed_origins: parse_origins(&get_env("ALLOWED_ORIGINS", Some("*"), false)?),
            },
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
        })
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn get_parsed<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get_optional_parsed(key)? {
        Some(value) => Ok(value),
        None => Ok(default),
    }
}

fn get_optional_parsed<T>(key: &str) -> Result<Option<T>, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) if !val.trim().is_empty() => val.trim().parse().map(Some).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("{} has an invalid value '{}': {}", key, val, e))
        }),
        _ => Ok(None),
    }
}
