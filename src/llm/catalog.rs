use log::{ info, warn };
use serde::Deserialize;
use std::time::{ Duration, Instant };
use tokio::sync::Mutex;

use crate::cache::TimedCache;
use crate::error::ChatError;

pub const DEFAULT_MODELS_URL: &str = "https://openrouter.ai/api/v1/models";
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

const FREE_SUFFIX: &str = ":free";
const VISION_KEYWORDS: [&str; 6] = ["vision", "vl", "gemini", "pixtral", "llava", "free"];
const PRIMARY_VENDOR: &str = "qwen";
const SECONDARY_VENDOR: &str = "google";

const FALLBACK_MODELS: [&str; 4] = [
    "qwen/qwen-2.5-vl-72b-instruct:free",
    "qwen/qwen2.5-vl-32b-instruct:free",
    "google/gemini-2.0-flash-exp:free",
    "meta-llama/llama-3.2-11b-vision-instruct:free",
];

#[derive(Deserialize)]
struct ModelListResponse {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

pub fn fallback_models() -> Vec<String> {
    FALLBACK_MODELS.iter().map(|m| m.to_string()).collect()
}

/// Keeps free-tier ids that mention a vision keyword, preferred vendors first.
pub fn select_vision_models<I, S>(ids: I) -> Vec<String>
    where I: IntoIterator<Item = S>, S: Into<String>
{
    let mut models: Vec<String> = ids
        .into_iter()
        .map(Into::into)
        .filter(|id| {
            let lower = id.to_lowercase();
            lower.ends_with(FREE_SUFFIX) && VISION_KEYWORDS.iter().any(|k| lower.contains(k))
        })
        .collect();
    // sort_by_key is stable, so ids within the same rank keep their listing order
    models.sort_by_key(|id| vendor_rank(id));
    models
}

fn vendor_rank(id: &str) -> u8 {
    let lower = id.to_lowercase();
    if lower.contains(PRIMARY_VENDOR) {
        0
    } else if lower.contains(SECONDARY_VENDOR) {
        1
    } else {
        2
    }
}

pub struct ModelCatalog {
    http: reqwest::Client,
    url: String,
    cache: Mutex<TimedCache<Vec<String>>>,
}

impl ModelCatalog {
    pub fn new(url: impl Into<String>, ttl: Duration) -> Result<Self, ChatError> {
        Self::with_timeout(url, ttl, DEFAULT_FETCH_TIMEOUT)
    }

    /// Listing requests give up after `timeout`; callers queue on the cache lock meanwhile.
    pub fn with_timeout(url: impl Into<String>, ttl: Duration, timeout: Duration) -> Result<Self, ChatError> {
        let http = reqwest::Client
            ::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChatError::Config(format!("model catalog client: {}", e)))?;
        Ok(Self {
            http,
            url: url.into(),
            cache: Mutex::new(TimedCache::new(ttl)),
        })
    }

    /// Vision-capable free models. Falls back to a static list instead of failing.
    pub async fn list_vision_models(&self) -> Vec<String> {
        let mut cache = self.cache.lock().await;
        if let Some(models) = cache.get_fresh(Instant::now()) {
            return models;
        }

        let models = match self.fetch().await {
            Ok(models) => {
                info!("Model catalog refreshed: {} vision models", models.len());
                models
            }
            Err(e) => {
                warn!("{}; using fallback model list", e);
                fallback_models()
            }
        };
        cache.store(models.clone(), Instant::now());
        models
    }

    async fn fetch(&self) -> Result<Vec<String>, ChatError> {
        let resp = self.http
            .get(&self.url)
            .send().await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ChatError::CatalogUnavailable(e.to_string()))?;
        let listing = resp
            .json::<ModelListResponse>().await
            .map_err(|e| ChatError::CatalogUnavailable(format!("invalid listing: {}", e)))?;

        let models = select_vision_models(listing.data.into_iter().map(|entry| entry.id));
        if models.is_empty() {
            return Err(ChatError::CatalogUnavailable("no free vision models listed".to_string()));
        }
        Ok(models)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{ extract::State, routing::get, Router };
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{ AtomicUsize, Ordering };

    #[test]
    fn keeps_only_free_ids_with_a_keyword() {
        let selected = select_vision_models(["a/x:free", "b/y-vl:pro", "c/z-vision:free", "d/w:pro"]);
        assert_eq!(selected, vec!["a/x:free".to_string(), "c/z-vision:free".to_string()]);
    }

    #[test]
    fn orders_preferred_vendors_first_and_keeps_ties_stable() {
        let selected = select_vision_models([
            "meta-llama/llama-3.2-11b-vision-instruct:free",
            "google/gemini-2.0-flash-exp:free",
            "mistral/pixtral-12b:free",
            "qwen/qwen-2.5-vl-72b-instruct:free",
            "google/gemma-3-27b-it:free",
            "qwen/qwen2.5-vl-32b-instruct:free",
        ]);
        assert_eq!(selected, vec![
            "qwen/qwen-2.5-vl-72b-instruct:free".to_string(),
            "qwen/qwen2.5-vl-32b-instruct:free".to_string(),
            "google/gemini-2.0-flash-exp:free".to_string(),
            "google/gemma-3-27b-it:free".to_string(),
            "meta-llama/llama-3.2-11b-vision-instruct:free".to_string(),
            "mistral/pixtral-12b:free".to_string(),
        ]);
    }

    async fn serve_listing(body: serde_json::Value, hits: Arc<AtomicUsize>) -> String {
        let app = Router::new()
            .route(
                "/models",
                get(move |State(hits): State<Arc<AtomicUsize>>| {
                    let body = body.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        axum::Json(body)
                    }
                })
            )
            .with_state(hits);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/models", addr)
    }

    #[tokio::test]
    async fn fetches_filters_and_caches_listing() {
        let hits = Arc::new(AtomicUsize::new(0));
        let url = serve_listing(
            json!({ "data": [
                { "id": "openai/gpt-4o" },
                { "id": "google/gemini-2.0-flash-exp:free" },
                { "id": "qwen/qwen-2.5-vl-72b-instruct:free" }
            ] }),
            hits.clone()
        ).await;
        let catalog = ModelCatalog::new(url, DEFAULT_CACHE_TTL).unwrap();

        let first = catalog.list_vision_models().await;
        assert_eq!(first, vec![
            "qwen/qwen-2.5-vl-72b-instruct:free".to_string(),
            "google/gemini-2.0-flash-exp:free".to_string(),
        ]);
        let second = catalog.list_vision_models().await;
        assert_eq!(first, second);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_cache_triggers_refetch() {
        let hits = Arc::new(AtomicUsize::new(0));
        let url = serve_listing(json!({ "data": [{ "id": "x/vision:free" }] }), hits.clone()).await;
        let catalog = ModelCatalog::new(url, Duration::ZERO).unwrap();
        catalog.list_vision_models().await;
        catalog.list_vision_models().await;
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn malformed_or_empty_listing_falls_back() {
        let hits = Arc::new(AtomicUsize::new(0));
        let url = serve_listing(json!({ "models": [] }), hits.clone()).await;
        let catalog = ModelCatalog::new(url, DEFAULT_CACHE_TTL).unwrap();
        assert_eq!(catalog.list_vision_models().await, fallback_models());

        let url = serve_listing(json!({ "data": [{ "id": "openai/gpt-4o" }] }), hits).await;
        let catalog = ModelCatalog::new(url, DEFAULT_CACHE_TTL).unwrap();
        assert_eq!(catalog.list_vision_models().await, fallback_models());
    }

    #[tokio::test]
    async fn unreachable_endpoint_falls_back() {
        let catalog = ModelCatalog::new("http://127.0.0.1:1/models", DEFAULT_CACHE_TTL).unwrap();
        assert_eq!(catalog.list_vision_models().await, fallback_models());
    }

    #[tokio::test]
    async fn hung_listing_times_out_to_fallback() {
        let app = Router::new().route(
            "/models",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                axum::Json(json!({ "data": [{ "id": "x/vision:free" }] }))
            })
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let catalog = ModelCatalog::with_timeout(
            format!("http://{}/models", addr),
            DEFAULT_CACHE_TTL,
            Duration::from_millis(200)
        ).unwrap();
        let models = tokio::time::timeout(Duration::from_secs(5), catalog.list_vision_models()).await
            .expect("listing call should not hang");
        assert_eq!(models, fallback_models());
    }
}
