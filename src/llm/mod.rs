pub mod catalog;
pub mod chat;

use crate::config::secret::ApiKey;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "qwen/qwen-2.5-vl-72b-instruct:free";
pub const DEFAULT_REFERER: &str = "http://localhost:8501";
pub const DEFAULT_TITLE: &str = "SupportBot";

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: ApiKey,
    pub base_url: String,
    /// Sent as `HTTP-Referer` so the provider can attribute traffic to this app.
    pub referer: String,
    /// Sent as `X-Title`.
    pub title: String,
}

impl LlmConfig {
    pub fn new(api_key: ApiKey) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            referer: DEFAULT_REFERER.to_string(),
            title: DEFAULT_TITLE.to_string(),
        }
    }

    pub fn endpoint(&self, route: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), route)
    }
}
