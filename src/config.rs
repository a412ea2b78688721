//! Configuration types.
//!
//! Everything is read from environment variables. `AppConfig::from_lookup`
//! takes the lookup as a closure so tests never touch the process env.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};

/// Agent (dispatcher) configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Agent name for identification in logs.
    pub name: String,
    /// Per-conversation workers exit after this long without a message.
    pub conversation_idle_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "onboarding-agent".to_string(),
            conversation_idle_timeout: Duration::from_secs(1800), // 30 minutes
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub db_path: PathBuf,
    pub http_port: u16,
    /// Also run the stdin/stdout channel.
    pub enable_cli: bool,
    pub agent: AgentConfig,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match lookup("ONBOARDING_LLM_BACKEND")
            .unwrap_or_else(|| "openai".to_string())
            .to_lowercase()
            .as_str()
        {
            "openai" => LlmBackend::OpenAi,
            "anthropic" => LlmBackend::Anthropic,
            other => {
                return Err(ConfigError::InvalidValue {
                    key: "ONBOARDING_LLM_BACKEND".to_string(),
                    message: format!("expected 'openai' or 'anthropic', got '{other}'"),
                });
            }
        };

        let key_var = match backend {
            LlmBackend::OpenAi => "OPENAI_API_KEY",
            LlmBackend::Anthropic => "ANTHROPIC_API_KEY",
        };
        let api_key = lookup(key_var)
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(key_var.to_string()))?;

        let model = lookup("ONBOARDING_MODEL").unwrap_or_else(|| match backend {
            LlmBackend::OpenAi => "gpt-4o".to_string(),
            LlmBackend::Anthropic => "claude-sonnet-4-20250514".to_string(),
        });

        let db_path = lookup("ONBOARDING_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data/onboarding.db"));

        let http_port = parse_or("ONBOARDING_HTTP_PORT", lookup("ONBOARDING_HTTP_PORT"), 8080)?;

        let enable_cli = lookup("ONBOARDING_CLI")
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let idle_secs: u64 = parse_or(
            "ONBOARDING_IDLE_TIMEOUT_SECS",
            lookup("ONBOARDING_IDLE_TIMEOUT_SECS"),
            1800,
        )?;

        Ok(Self {
            llm: LlmConfig {
                backend,
                api_key: secrecy::SecretString::from(api_key),
                model,
            },
            db_path,
            http_port,
            enable_cli,
            agent: AgentConfig {
                conversation_idle_timeout: Duration::from_secs(idle_secs),
                ..AgentConfig::default()
            },
        })
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(s) => s.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_with_openai_key() {
        let config = AppConfig::from_lookup(lookup_from(&[("OPENAI_API_KEY", "sk-test")])).unwrap();
        assert_eq!(config.llm.backend, LlmBackend::OpenAi);
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.api_key.expose_secret(), "sk-test");
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.db_path, PathBuf::from("./data/onboarding.db"));
        assert!(!config.enable_cli);
        assert_eq!(
            config.agent.conversation_idle_timeout,
            Duration::from_secs(1800)
        );
    }

    #[test]
    fn anthropic_backend_uses_its_own_key() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("ONBOARDING_LLM_BACKEND", "Anthropic"),
            ("ANTHROPIC_API_KEY", "sk-ant"),
            ("ONBOARDING_CLI", "true"),
            ("ONBOARDING_HTTP_PORT", "9090"),
        ]))
        .unwrap();
        assert_eq!(config.llm.backend, LlmBackend::Anthropic);
        assert!(config.llm.model.starts_with("claude"));
        assert!(config.enable_cli);
        assert_eq!(config.http_port, 9090);
    }

    #[test]
    fn missing_key_is_reported() {
        let err = AppConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "OPENAI_API_KEY"));
    }

    #[test]
    fn invalid_backend_and_port_are_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[("ONBOARDING_LLM_BACKEND", "llama")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = AppConfig::from_lookup(lookup_from(&[
            ("OPENAI_API_KEY", "sk"),
            ("ONBOARDING_HTTP_PORT", "not-a-port"),
        ]))
        .unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "ONBOARDING_HTTP_PORT")
        );
    }
}
