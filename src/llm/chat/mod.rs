pub mod openrouter;

use async_trait::async_trait;
use futures::Stream;
use log::debug;
use serde::Deserialize;
use std::pin::Pin;

use crate::error::{ ChatError, StreamFailure, StreamFailureKind };
use crate::payload::Payload;

/// Text fragments in arrival order. Finite and not restartable.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, StreamFailure>> + Send>>;

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Opens a streaming completion. Transport and remote failures arrive as stream items.
    async fn stream_chat(&self, model: &str, payload: &Payload) -> Result<FragmentStream, ChatError>;
}

#[derive(Debug, PartialEq, Eq)]
pub enum SseEvent {
    Fragment(String),
    Done,
    Failure(StreamFailure),
    Skip,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<StreamErrorBody>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: Option<StreamDelta>,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamErrorBody {
    code: Option<serde_json::Value>,
    #[serde(default)]
    message: String,
}

/// Interprets one line of a chat-completions event stream.
pub fn parse_sse_line(line: &str) -> SseEvent {
    let line = line.trim_end_matches('\r');
    if line.is_empty() || line.starts_with(':') {
        return SseEvent::Skip;
    }
    let data = match line.strip_prefix("data:") {
        Some(d) => d.trim_start(),
        None => {
            return SseEvent::Skip;
        }
    };
    if data == "[DONE]" {
        return SseEvent::Done;
    }

    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => {
            if let Some(err) = chunk.error {
                let status = err.code
                    .as_ref()
                    .and_then(|c| c.as_u64())
                    .and_then(|c| u16::try_from(c).ok());
                let kind = match status {
                    Some(code) => StreamFailureKind::from_status(code, &err.message),
                    None => StreamFailureKind::Remote,
                };
                return SseEvent::Failure(StreamFailure::new(kind, err.message));
            }
            chunk.choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta)
                .and_then(|delta| delta.content)
                .filter(|content| !content.is_empty())
                .map(SseEvent::Fragment)
                .unwrap_or(SseEvent::Skip)
        }
        Err(e) => {
            debug!("Skipping unparseable stream line ({}): {}", e, data);
            SseEvent::Skip
        }
    }
}

/// Reassembles lines from network chunks that may split a line, or a UTF-8 sequence, anywhere.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line[..line.len() - 1]).into_owned());
        }
        lines
    }

    /// Whatever is left once the body ends without a trailing newline.
    pub fn finish(self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&self.pending).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_delta_content() {
        let line = r#"data: {"id":"gen-1","choices":[{"index":0,"delta":{"role":"assistant","content":"Hel"}}]}"#;
        assert_eq!(parse_sse_line(line), SseEvent::Fragment("Hel".to_string()));
    }

    #[test]
    fn skips_comments_empty_deltas_and_noise() {
        assert_eq!(parse_sse_line(": OPENROUTER PROCESSING"), SseEvent::Skip);
        assert_eq!(parse_sse_line(""), SseEvent::Skip);
        assert_eq!(parse_sse_line(r#"data: {"choices":[{"delta":{"content":""}}]}"#), SseEvent::Skip);
        assert_eq!(parse_sse_line(r#"data: {"choices":[{"delta":{}}]}"#), SseEvent::Skip);
        assert_eq!(parse_sse_line("data: {not json"), SseEvent::Skip);
        assert_eq!(parse_sse_line("event: ping"), SseEvent::Skip);
    }

    #[test]
    fn recognises_done_marker() {
        assert_eq!(parse_sse_line("data: [DONE]\r"), SseEvent::Done);
    }

    #[test]
    fn in_band_error_becomes_classified_failure() {
        let line = r#"data: {"error":{"code":429,"message":"Rate limit exceeded"},"choices":[]}"#;
        match parse_sse_line(line) {
            SseEvent::Failure(failure) => {
                assert_eq!(failure.kind, StreamFailureKind::QuotaExceeded);
                assert_eq!(failure.detail, "Rate limit exceeded");
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn line_buffer_joins_split_lines_and_utf8() {
        let mut buffer = SseLineBuffer::new();
        let text = "data: é\ndata: two\n";
        let bytes = text.as_bytes();
        // split inside the two-byte 'é'
        assert!(buffer.push(&bytes[..7]).is_empty());
        let lines = buffer.push(&bytes[7..12]);
        assert_eq!(lines, vec!["data: é".to_string()]);
        let lines = buffer.push(&bytes[12..]);
        assert_eq!(lines, vec!["data: two".to_string()]);
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn line_buffer_returns_unterminated_tail() {
        let mut buffer = SseLineBuffer::new();
        assert!(buffer.push(b"data: [DONE]").is_empty());
        assert_eq!(buffer.finish(), Some("data: [DONE]".to_string()));
    }
}
