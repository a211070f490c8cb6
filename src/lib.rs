pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod image;
pub mod llm;
pub mod models;
pub mod payload;
pub mod server;
pub mod session;
pub mod stream;

use cli::Args;
use config::prompt;
use config::secret::{ CredentialResolver, TomlSecretStore };
use error::ChatError;
use llm::LlmConfig;
use llm::catalog::ModelCatalog;
use llm::chat::openrouter::OpenRouterChatClient;
use log::info;
use payload::PayloadBuilder;
use server::Server;
use session::ChatService;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

/// Resolves the API key and wires the shared chat services. Fails before any network use
/// when the key is missing.
pub fn build_service(args: &Args) -> Result<ChatService, Box<dyn Error + Send + Sync>> {
    let resolver = CredentialResolver::new(
        args.api_key_var.clone(),
        Box::new(TomlSecretStore::with_path(&args.secrets_path))
    );
    let api_key = resolver.resolve()?;

    if args.history_window == 0 {
        return Err(Box::new(ChatError::Config("history window must be at least 1".to_string())));
    }

    let prompts = prompt::load_or_default(args.prompts_path.as_deref())?;

    let mut llm_config = LlmConfig::new(api_key);
    llm_config.base_url = args.chat_base_url.clone();
    llm_config.referer = args.app_referer.clone();
    llm_config.title = args.app_title.clone();
    let client = OpenRouterChatClient::from_config(&llm_config)?;
    info!("Chat client configured: URL={}, default model={}", client.url(), args.chat_model);

    let catalog = ModelCatalog::new(args.models_url.clone(), Duration::from_secs(args.models_cache_ttl))?;
    let builder = PayloadBuilder::new(prompts.system_prompt.clone(), args.history_window);

    Ok(ChatService::new(Arc::new(client), builder, Arc::new(catalog), args.chat_model.clone()))
}

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("HTTP API Port: {:?}", args.http_port);
    info!("Chat Base URL: {}", args.chat_base_url);
    info!("Chat Model: {}", args.chat_model);
    info!("Models URL: {}", args.models_url);
    info!("Models Cache TTL: {}s", args.models_cache_ttl);
    info!("History Window: {}", args.history_window);
    info!("Prompts Path: {}", args.prompts_path.as_deref().unwrap_or("built-in"));
    info!("Secrets Path: {}", args.secrets_path);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let service = Arc::new(build_service(&args)?);
    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, service, args.clone());
    server.run().await?;

    Ok(())
}
