use clap::Parser;

use crate::config::secret::DEFAULT_KEY_VAR;
use crate::llm::catalog::DEFAULT_MODELS_URL;
use crate::llm::{ DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_REFERER, DEFAULT_TITLE };

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Credentials ---
    /// Environment variable (and secrets file key) holding the provider API key
    #[arg(long, env = "API_KEY_VAR", default_value = DEFAULT_KEY_VAR)]
    pub api_key_var: String,

    /// TOML secrets file consulted when the API key is not in the environment
    #[arg(long, env = "SECRETS_PATH", default_value = ".streamlit/secrets.toml")]
    pub secrets_path: String,

    // --- Chat Provider Args ---
    /// Base URL of the OpenAI-compatible provider API
    #[arg(long, env = "CHAT_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub chat_base_url: String,

    /// Model used for new sessions until the client selects another one
    #[arg(long, env = "CHAT_MODEL", default_value = DEFAULT_MODEL)]
    pub chat_model: String,

    /// Value of the HTTP-Referer header identifying this app to the provider
    #[arg(long, env = "APP_REFERER", default_value = DEFAULT_REFERER)]
    pub app_referer: String,

    /// Value of the X-Title header identifying this app to the provider
    #[arg(long, env = "APP_TITLE", default_value = DEFAULT_TITLE)]
    pub app_title: String,

    // --- Model Catalog Args ---
    /// Model listing endpoint used to discover free vision models
    #[arg(long, env = "MODELS_URL", default_value = DEFAULT_MODELS_URL)]
    pub models_url: String,

    /// Seconds a fetched model list is reused before asking the provider again
    #[arg(long, env = "MODELS_CACHE_TTL", default_value = "3600")]
    pub models_cache_ttl: u64,

    // --- Conversation Args ---
    /// Number of stored messages sent along with each request
    #[arg(long, env = "HISTORY_WINDOW", default_value = "4")]
    pub history_window: usize,

    /// Optional JSON file with a `system_prompt` overriding the built-in persona
    #[arg(long, env = "PROMPTS_PATH")]
    pub prompts_path: Option<String>,

    // --- General App Args ---
    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,

    /// Host address and port for the WebSocket server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Port for the HTTP API (model list, health). Disabled when unset.
    #[arg(long, env = "HTTP_PORT")]
    pub http_port: Option<u16>,

    /// Optional path to the TLS certificate file (PEM format) for enabling WSS. Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format) for enabling WSS. Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_provider_conventions() {
        let args = Args::try_parse_from(["vision-chat"]).unwrap();
        assert_eq!(args.api_key_var, "OPENROUTER_API_KEY");
        assert_eq!(args.chat_model, "qwen/qwen-2.5-vl-72b-instruct:free");
        assert_eq!(args.history_window, 4);
        assert_eq!(args.models_cache_ttl, 3600);
        assert!(args.http_port.is_none());
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::try_parse_from([
            "vision-chat",
            "--chat-model",
            "google/gemini-2.0-flash-exp:free",
            "--history-window",
            "6",
            "--http-port",
            "8080",
        ]).unwrap();
        assert_eq!(args.chat_model, "google/gemini-2.0-flash-exp:free");
        assert_eq!(args.history_window, 6);
        assert_eq!(args.http_port, Some(8080));
    }
}
