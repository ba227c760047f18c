//! Server configuration.
//!
//! The values mirror the enumerated environment variables; the actual env
//! reading lives in `formpilot-infra` so this crate stays dependency-free.

use serde::{Deserialize, Serialize};

/// Complete server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Full URL of an OpenAI-compatible chat-completions endpoint.
    pub llm_api_endpoint: Option<String>,
    /// Model identifier sent with every completion request.
    pub llm_model_name: String,
    /// Call-level LLM timeout in seconds.
    pub llm_request_timeout_sec: u64,
    /// Idle session expiry in seconds.
    pub session_timeout_sec: u64,
    /// Comma-separated allowed CORS origins; `*` allows any.
    pub cors_allowed_origins: String,
    pub backend_host: String,
    pub backend_port: u16,
    /// Directory of example form `.md` files served by `/api/schemas`.
    pub schemas_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            llm_api_endpoint: None,
            llm_model_name: "default".to_string(),
            llm_request_timeout_sec: 300,
            session_timeout_sec: 1800,
            cors_allowed_origins: "*".to_string(),
            backend_host: "0.0.0.0".to_string(),
            backend_port: 8000,
            schemas_dir: "schemas".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.llm_model_name, "default");
        assert_eq!(config.llm_request_timeout_sec, 300);
        assert_eq!(config.session_timeout_sec, 1800);
        assert_eq!(config.backend_port, 8000);
        assert_eq!(config.cors_allowed_origins, "*");
    }
}
