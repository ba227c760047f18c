//! Environment configuration loader.
//!
//! Reads the enumerated `LLM_*`, `SESSION_*`, `CORS_*`, and `BACKEND_*`
//! variables into a [`ServerConfig`], falling back to the documented
//! defaults for anything unset or malformed.

use formpilot_types::config::ServerConfig;
use tracing::warn;

/// Load the server configuration from the process environment.
pub fn load_config() -> ServerConfig {
    load_config_from(|name| std::env::var(name).ok())
}

/// Load configuration through an injectable lookup (tests pass a map).
pub fn load_config_from(get: impl Fn(&str) -> Option<String>) -> ServerConfig {
    let defaults = ServerConfig::default();

    ServerConfig {
        llm_api_endpoint: get("LLM_API_ENDPOINT").filter(|v| !v.trim().is_empty()),
        llm_model_name: get("LLM_MODEL_NAME")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.llm_model_name),
        llm_request_timeout_sec: parse_or(
            get("LLM_REQUEST_TIMEOUT_SEC"),
            "LLM_REQUEST_TIMEOUT_SEC",
            defaults.llm_request_timeout_sec,
        ),
        session_timeout_sec: parse_or(
            get("SESSION_TIMEOUT_SEC"),
            "SESSION_TIMEOUT_SEC",
            defaults.session_timeout_sec,
        ),
        cors_allowed_origins: get("CORS_ALLOWED_ORIGINS").unwrap_or(defaults.cors_allowed_origins),
        backend_host: get("BACKEND_HOST").unwrap_or(defaults.backend_host),
        backend_port: parse_or(get("BACKEND_PORT"), "BACKEND_PORT", defaults.backend_port),
        schemas_dir: get("SCHEMAS_DIR").unwrap_or(defaults.schemas_dir),
    }
}

/// The API key, read separately so it never sits inside `ServerConfig`.
pub fn api_key() -> String {
    std::env::var("LLM_API_KEY").unwrap_or_default()
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, name: &str, default: T) -> T {
    match value {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(var = name, value = %raw, "unparseable value, using default");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        move |name| map.get(name).map(|v| v.to_string())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = load_config_from(env(&[]));
        assert!(config.llm_api_endpoint.is_none());
        assert_eq!(config.llm_model_name, "default");
        assert_eq!(config.llm_request_timeout_sec, 300);
        assert_eq!(config.session_timeout_sec, 1800);
        assert_eq!(config.backend_host, "0.0.0.0");
        assert_eq!(config.backend_port, 8000);
    }

    #[test]
    fn test_overrides_applied() {
        let config = load_config_from(env(&[
            ("LLM_API_ENDPOINT", "http://llm.internal/v1/chat/completions"),
            ("LLM_MODEL_NAME", "qwen2.5"),
            ("LLM_REQUEST_TIMEOUT_SEC", "60"),
            ("SESSION_TIMEOUT_SEC", "600"),
            ("BACKEND_PORT", "9001"),
        ]));
        assert_eq!(
            config.llm_api_endpoint.as_deref(),
            Some("http://llm.internal/v1/chat/completions")
        );
        assert_eq!(config.llm_model_name, "qwen2.5");
        assert_eq!(config.llm_request_timeout_sec, 60);
        assert_eq!(config.session_timeout_sec, 600);
        assert_eq!(config.backend_port, 9001);
    }

    #[test]
    fn test_malformed_numbers_fall_back() {
        let config = load_config_from(env(&[("BACKEND_PORT", "not-a-port")]));
        assert_eq!(config.backend_port, 8000);
    }

    #[test]
    fn test_blank_endpoint_treated_as_unset() {
        let config = load_config_from(env(&[("LLM_API_ENDPOINT", "   ")]));
        assert!(config.llm_api_endpoint.is_none());
    }
}
