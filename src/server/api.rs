use crate::cli::Args;
use crate::session::ChatService;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use axum::{ routing::get, Router, extract::State, Json };
use serde::Serialize;
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, error };

#[derive(Serialize, Debug)]
pub struct ModelsResponse {
    pub models: Vec<String>,
    pub default_model: String,
}

#[derive(Serialize, Debug)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Clone)]
struct AppState {
    service: Arc<ChatService>,
}

fn router(service: Arc<ChatService>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/api/models", get(models_handler))
        .route("/api/health", get(health_handler))
        .layer(cors)
        .with_state(AppState { service })
}

pub async fn start_http_server(
    http_port: u16,
    service: Arc<ChatService>,
    args: Args
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = format!("0.0.0.0:{}", http_port).parse::<SocketAddr>()?;
    info!("Starting HTTP API server on: http://{}", addr);

    let app = router(service);

    match (args.enable_tls, &args.tls_cert_path, &args.tls_key_path) {
        (true, Some(cert_path), Some(key_path)) => {
            super::install_crypto_provider();
            let tls_config = axum_server::tls_rustls::RustlsConfig
                ::from_pem_file(cert_path, key_path).await?;

            tokio::spawn(async move {
                let result = axum_server
                    ::bind_rustls(addr, tls_config)
                    .serve(app.into_make_service()).await;

                if let Err(e) = result {
                    error!("HTTPS server error: {}", e);
                }
            });

            info!("HTTPS server started with TLS enabled");
        }
        _ => {
            tokio::spawn(async move {
                match tokio::net::TcpListener::bind(addr).await {
                    Ok(listener) => {
                        if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                            error!("HTTP server error: {}", e);
                        }
                    }
                    Err(e) => {
                        error!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e);
                    }
                }
            });

            info!("HTTP server started");
        }
    }

    Ok(())
}

async fn models_handler(State(state): State<AppState>) -> Json<ModelsResponse> {
    let models = state.service.catalog().list_vision_models().await;
    Json(ModelsResponse {
        models,
        default_model: state.service.default_model().to_string(),
    })
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::catalog::{ fallback_models, ModelCatalog, DEFAULT_CACHE_TTL };
    use crate::llm::chat::openrouter::OpenRouterChatClient;
    use crate::llm::LlmConfig;
    use crate::config::secret::ApiKey;
    use crate::payload::PayloadBuilder;

    fn state() -> AppState {
        let client = OpenRouterChatClient::from_config(&LlmConfig::new(ApiKey::new("sk-test"))).unwrap();
        let service = ChatService::new(
            Arc::new(client),
            PayloadBuilder::new("persona", 4),
            Arc::new(ModelCatalog::new("http://127.0.0.1:1/models", DEFAULT_CACHE_TTL).unwrap()),
            "qwen/qwen-2.5-vl-72b-instruct:free"
        );
        AppState { service: Arc::new(service) }
    }

    #[tokio::test]
    async fn models_endpoint_serves_fallback_when_catalog_is_down() {
        let Json(body) = models_handler(State(state())).await;
        assert_eq!(body.models, fallback_models());
        assert_eq!(body.default_model, "qwen/qwen-2.5-vl-72b-instruct:free");
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let Json(body) = health_handler().await;
        assert_eq!(body.status, "ok");
    }
}
