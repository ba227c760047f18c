//! Application state wiring the services together.

use std::sync::Arc;
use std::time::Duration;

use formpilot_core::llm::BoxLlmProvider;
use formpilot_core::session::SessionStore;
use formpilot_infra::config;
use formpilot_infra::llm::OpenAiCompatibleProvider;
use formpilot_types::config::ServerConfig;
use secrecy::SecretString;

/// Shared application state: the session store, the LLM provider, and
/// the server configuration.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SessionStore>,
    /// `None` until `LLM_API_ENDPOINT` is configured; `/api/chat` fails
    /// with a 500 in that state but the rest of the API keeps working.
    pub llm: Option<Arc<BoxLlmProvider>>,
    pub config: ServerConfig,
}

impl AppState {
    /// Initialize state from the environment.
    pub fn init() -> Self {
        let config = config::load_config();

        let llm = match &config.llm_api_endpoint {
            Some(endpoint) => {
                tracing::info!(endpoint = %endpoint, model = %config.llm_model_name, "LLM initialized");
                Some(Arc::new(BoxLlmProvider::new(OpenAiCompatibleProvider::new(
                    endpoint,
                    SecretString::from(config::api_key()),
                    Duration::from_secs(config.llm_request_timeout_sec),
                ))))
            }
            None => {
                tracing::warn!(
                    "LLM_API_ENDPOINT not set; /api/chat will fail until an LLM is configured"
                );
                None
            }
        };

        let store = Arc::new(SessionStore::new(Duration::from_secs(
            config.session_timeout_sec,
        )));

        Self { store, llm, config }
    }
}
