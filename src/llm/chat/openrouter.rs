use async_trait::async_trait;
use futures::StreamExt;
use log::{ debug, info };
use reqwest::{
    Client as HttpClient,
    header::{ HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, AUTHORIZATION },
};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::{ parse_sse_line, CompletionClient, FragmentStream, SseEvent, SseLineBuffer };
use crate::error::{ ChatError, StreamFailure, StreamFailureKind };
use crate::llm::LlmConfig;
use crate::models::chat::Message;
use crate::payload::Payload;

pub struct OpenRouterChatClient {
    http: HttpClient,
    url: String,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

impl OpenRouterChatClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, ChatError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", config.api_key.expose())).map_err(|e|
                ChatError::Config(format!("Invalid API key format: {}", e))
            )?
        );
        headers.insert(
            HeaderName::from_static("http-referer"),
            HeaderValue::from_str(&config.referer).map_err(|e|
                ChatError::Config(format!("Invalid referer header: {}", e))
            )?
        );
        headers.insert(
            HeaderName::from_static("x-title"),
            HeaderValue::from_str(&config.title).map_err(|e|
                ChatError::Config(format!("Invalid title header: {}", e))
            )?
        );

        let http = HttpClient::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ChatError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            url: config.endpoint("/chat/completions"),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl CompletionClient for OpenRouterChatClient {
    async fn stream_chat(&self, model: &str, payload: &Payload) -> Result<FragmentStream, ChatError> {
        let body = serde_json
            ::to_vec(
                &(ChatCompletionRequest {
                    model,
                    messages: payload.messages(),
                    stream: true,
                })
            )
            .map_err(|e| ChatError::Config(format!("Failed to serialize payload: {}", e)))?;

        info!("Streaming completion from {} with model {} ({} messages)", self.url, model, payload.messages().len());

        let (tx, rx) = mpsc::channel(32);
        let client = self.http.clone();
        let url = self.url.clone();

        tokio::spawn(async move {
            let resp = match client.post(&url).body(body).send().await {
                Ok(r) => r,
                Err(e) => {
                    let _ = tx.send(Err(StreamFailure::from_reqwest(&e))).await;
                    return;
                }
            };

            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                let kind = StreamFailureKind::from_status(status.as_u16(), &text);
                let _ = tx.send(Err(StreamFailure::new(kind, format!("HTTP {}: {}", status, text)))).await;
                return;
            }

            let mut stream = resp.bytes_stream();
            let mut lines = SseLineBuffer::new();

            while let Some(chunk_result) = stream.next().await {
                match chunk_result {
                    Ok(chunk) => {
                        for line in lines.push(&chunk) {
                            match parse_sse_line(&line) {
                                SseEvent::Fragment(text) => {
                                    debug!("Fragment of {} bytes", text.len());
                                    if tx.send(Ok(text)).await.is_err() {
                                        return;
                                    }
                                }
                                SseEvent::Done => {
                                    return;
                                }
                                SseEvent::Failure(failure) => {
                                    let _ = tx.send(Err(failure)).await;
                                    return;
                                }
                                SseEvent::Skip => {}
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(
                            Err(StreamFailure::new(StreamFailureKind::Network, e.to_string()))
                        ).await;
                        return;
                    }
                }
            }

            if let Some(tail) = lines.finish() {
                match parse_sse_line(&tail) {
                    SseEvent::Fragment(text) => {
                        let _ = tx.send(Ok(text)).await;
                    }
                    SseEvent::Failure(failure) => {
                        let _ = tx.send(Err(failure)).await;
                    }
                    SseEvent::Done | SseEvent::Skip => {}
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}
