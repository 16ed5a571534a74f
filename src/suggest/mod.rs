// SPDX-License-Identifier: MIT
//! Client for the remote text-suggestion service.
//!
//! Handles payload chunking, retry with exponential backoff, and 429
//! rate-limit responses (honoring a server-supplied `Retry-After` when
//! present). Every outbound call first passes through the shared
//! [`RateLimiter`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::backoff::{jitter_seed, jittered};
use crate::rate_limit::{parse_retry_after, RateLimiter};

const PROMPT_TEMPLATE: &str = "Review the following text for grammar and style:\n\n";
const MAX_BACKOFF: Duration = Duration::from_secs(60);

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum SuggestError {
    /// 5xx after the retry budget was exhausted.
    #[error("suggestion service error (status {status}) after {attempts} attempts")]
    Transient { status: u16, attempts: u32 },

    /// 429 after the retry budget was exhausted, or on a later chunk of a
    /// multi-chunk request (fail fast — remaining chunks are aborted).
    #[error("rate limited by suggestion service")]
    RateLimited { attempts: u32 },

    /// Non-retryable 4xx other than 429.
    #[error("suggestion request rejected (status {status}): {message}")]
    Client { status: u16, message: String },

    /// Transport failure after the retry budget was exhausted.
    #[error("suggestion transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// 2xx response whose body could not be decoded.
    #[error("malformed suggestion response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("empty text passed to suggestion client")]
    EmptyText,
}

// ─── Transport seam ──────────────────────────────────────────────────────────

/// A raw reply from the service, before any JSON decoding.
#[derive(Debug, Clone)]
pub struct ServiceReply {
    pub status: u16,
    pub retry_after: Option<String>,
    pub body: String,
}

/// One POST to the suggestion endpoint. Kept behind a trait so tests can
/// script replies without a live server.
#[async_trait]
pub trait SuggestTransport: Send + Sync {
    async fn post_prompt(&self, prompt: &str) -> Result<ServiceReply, reqwest::Error>;
}

/// reqwest-backed transport for the real service.
pub struct HttpTransport {
    http: reqwest::Client,
    url: String,
    api_key: String,
}

impl HttpTransport {
    pub fn new(url: String, api_key: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, url, api_key })
    }
}

#[async_trait]
impl SuggestTransport for HttpTransport {
    async fn post_prompt(&self, prompt: &str) -> Result<ServiceReply, reqwest::Error> {
        let resp = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "prompt": prompt }))
            .send()
            .await?;
        let status = resp.status().as_u16();
        let retry_after = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = resp.text().await?;
        Ok(ServiceReply {
            status,
            retry_after,
            body,
        })
    }
}

// ─── Response body ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

impl CompletionResponse {
    /// First candidate completion's text; completion-style `text` wins over
    /// chat-style `message.content`.
    fn first_text(&self) -> Option<String> {
        let choice = self.choices.first()?;
        if let Some(text) = &choice.text {
            return Some(text.clone());
        }
        choice.message.as_ref().map(|m| m.content.clone())
    }
}

/// Result of one `suggest` call: one suggestion text per processed chunk.
#[derive(Debug, Clone)]
pub struct Suggestion {
    pub chunk_texts: Vec<String>,
}

impl Suggestion {
    /// Chunk-level suggestions concatenated in chunk order.
    pub fn combined(&self) -> String {
        self.chunk_texts.concat().trim().to_string()
    }
}

// ─── Client ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SuggestConfig {
    /// Maximum chars sent per outbound call; longer text fans out into
    /// consecutive fixed-size chunks.
    pub chunk_size: usize,
    /// Total attempts per call, including the first (≥ 1).
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles each retry (> 0).
    pub initial_backoff: Duration,
}

pub struct SuggestionClient {
    transport: Arc<dyn SuggestTransport>,
    limiter: Arc<RateLimiter>,
    config: SuggestConfig,
}

impl SuggestionClient {
    pub fn new(
        transport: Arc<dyn SuggestTransport>,
        limiter: Arc<RateLimiter>,
        config: SuggestConfig,
    ) -> Self {
        let config = SuggestConfig {
            max_attempts: config.max_attempts.max(1),
            ..config
        };
        Self {
            transport,
            limiter,
            config,
        }
    }

    /// Obtain a suggestion for `text` (non-empty) plus optional `context`.
    ///
    /// Text longer than the configured chunk size is split into consecutive
    /// fixed-size chunks, one call each; a 429 on any chunk after the first
    /// aborts the remaining chunks immediately.
    pub async fn suggest(&self, text: &str, context: &str) -> Result<Suggestion, SuggestError> {
        if text.is_empty() {
            return Err(SuggestError::EmptyText);
        }
        let chunks = split_chars(text, self.config.chunk_size);
        let multi = chunks.len() > 1;
        debug!(
            chunks = chunks.len(),
            text_chars = text.chars().count(),
            "requesting suggestions"
        );

        let mut chunk_texts = Vec::with_capacity(chunks.len());
        for (idx, chunk) in chunks.iter().enumerate() {
            let retry_on_rate_limit = !(multi && idx > 0);
            let prompt = build_prompt(chunk, context);
            let body = self.call_with_retry(&prompt, retry_on_rate_limit).await?;
            chunk_texts.push(body);
        }
        Ok(Suggestion { chunk_texts })
    }

    /// One logical call with the full retry policy applied.
    async fn call_with_retry(
        &self,
        prompt: &str,
        retry_on_rate_limit: bool,
    ) -> Result<String, SuggestError> {
        let max_attempts = self.config.max_attempts;
        let mut delay = self.config.initial_backoff;
        let mut last_transport_err: Option<reqwest::Error> = None;

        for attempt in 1..=max_attempts {
            self.limiter.acquire().await;

            let reply = match self.transport.post_prompt(prompt).await {
                Ok(reply) => reply,
                Err(e) => {
                    if attempt < max_attempts {
                        warn!(attempt, err = %e, "suggestion transport failed — retrying");
                        self.sleep_backoff(&mut delay, attempt).await;
                        continue;
                    }
                    last_transport_err = Some(e);
                    break;
                }
            };

            match reply.status {
                200..=299 => {
                    let parsed: CompletionResponse = serde_json::from_str(&reply.body)?;
                    return Ok(parsed.first_text().unwrap_or_else(|| {
                        warn!("suggestion response contained no choices");
                        String::new()
                    }));
                }
                429 => {
                    if !retry_on_rate_limit {
                        warn!("rate limited on a later chunk — aborting remaining chunks");
                        return Err(SuggestError::RateLimited { attempts: attempt });
                    }
                    if attempt >= max_attempts {
                        return Err(SuggestError::RateLimited { attempts: attempt });
                    }
                    // Honor a server-supplied delay; fall back to the current
                    // backoff value.
                    let server_delay = reply
                        .retry_after
                        .as_deref()
                        .and_then(parse_retry_after)
                        .unwrap_or(delay);
                    let wait = jittered(server_delay, jitter_seed(attempt));
                    warn!(
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        "rate limited (429) — retrying"
                    );
                    tokio::time::sleep(wait).await;
                    delay = (delay * 2).min(MAX_BACKOFF);
                }
                500..=599 => {
                    if attempt >= max_attempts {
                        return Err(SuggestError::Transient {
                            status: reply.status,
                            attempts: attempt,
                        });
                    }
                    warn!(attempt, status = reply.status, "server error — retrying");
                    self.sleep_backoff(&mut delay, attempt).await;
                }
                status => {
                    return Err(SuggestError::Client {
                        status,
                        message: truncate_for_log(&reply.body),
                    });
                }
            }
        }

        // Only reachable when the transport itself kept failing.
        Err(SuggestError::Http(
            last_transport_err.expect("retry loop ended without a transport error"),
        ))
    }

    async fn sleep_backoff(&self, delay: &mut Duration, attempt: u32) {
        let wait = jittered(*delay, jitter_seed(attempt));
        tokio::time::sleep(wait).await;
        *delay = (*delay * 2).min(MAX_BACKOFF);
    }
}

/// Split `text` into consecutive chunks of at most `chunk_size` chars.
/// No overlap; the last chunk may be shorter.
fn split_chars(text: &str, chunk_size: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0usize;
    for ch in text.chars() {
        current.push(ch);
        count += 1;
        if count == chunk_size {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn build_prompt(text: &str, context: &str) -> String {
    if context.is_empty() {
        format!("{PROMPT_TEMPLATE}{text}")
    } else {
        format!("{PROMPT_TEMPLATE}{context}\n\n{text}")
    }
}

fn truncate_for_log(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() <= MAX {
        body.to_string()
    } else {
        body.chars().take(MAX).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Transport that pops scripted replies in order and records prompts.
    struct ScriptedTransport {
        replies: tokio::sync::Mutex<Vec<ServiceReply>>,
        prompts: tokio::sync::Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<ServiceReply>) -> Arc<Self> {
            Arc::new(Self {
                replies: tokio::sync::Mutex::new(replies),
                prompts: tokio::sync::Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SuggestTransport for ScriptedTransport {
        async fn post_prompt(&self, prompt: &str) -> Result<ServiceReply, reqwest::Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().await.push(prompt.to_string());
            let mut replies = self.replies.lock().await;
            Ok(replies.remove(0))
        }
    }

    fn ok_reply(text: &str) -> ServiceReply {
        ServiceReply {
            status: 200,
            retry_after: None,
            body: serde_json::json!({ "choices": [{ "text": text }] }).to_string(),
        }
    }

    fn status_reply(status: u16, retry_after: Option<&str>) -> ServiceReply {
        ServiceReply {
            status,
            retry_after: retry_after.map(|s| s.to_string()),
            body: "{}".to_string(),
        }
    }

    fn client(transport: Arc<ScriptedTransport>, chunk_size: usize) -> SuggestionClient {
        SuggestionClient::new(
            transport,
            Arc::new(RateLimiter::new(10_000)),
            SuggestConfig {
                chunk_size,
                max_attempts: 3,
                initial_backoff: Duration::from_millis(10),
            },
        )
    }

    #[test]
    fn split_chars_produces_ceil_chunks() {
        assert_eq!(split_chars("abcdefg", 3), vec!["abc", "def", "g"]);
        assert_eq!(split_chars("abc", 3), vec!["abc"]);
        assert_eq!(split_chars("abc", 10), vec!["abc"]);
        // 7 chars / size 3 = ceil(7/3) = 3 chunks.
        assert_eq!(split_chars("abcdefg", 3).len(), 7usize.div_ceil(3));
    }

    #[test]
    fn split_chars_respects_char_boundaries() {
        let chunks = split_chars("héllo wörld", 4);
        assert_eq!(chunks.concat(), "héllo wörld");
        assert!(chunks.iter().all(|c| c.chars().count() <= 4));
    }

    #[test]
    fn prompt_includes_context_when_present() {
        let p = build_prompt("some text", "be gentle");
        assert!(p.contains("be gentle\n\nsome text"));
        let p = build_prompt("some text", "");
        assert!(p.ends_with("some text"));
    }

    #[test]
    fn chat_style_responses_are_decoded() {
        let body = serde_json::json!({
            "choices": [{ "message": { "content": "use fewer commas" } }]
        })
        .to_string();
        let parsed: CompletionResponse = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed.first_text().unwrap(), "use fewer commas");
    }

    #[tokio::test]
    async fn empty_text_is_rejected() {
        let transport = ScriptedTransport::new(vec![]);
        let c = client(transport, 10);
        assert!(matches!(
            c.suggest("", "").await,
            Err(SuggestError::EmptyText)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_text_fans_out_and_concatenates_in_order() {
        let transport = ScriptedTransport::new(vec![
            ok_reply("first "),
            ok_reply("second "),
            ok_reply("third"),
        ]);
        let c = client(Arc::clone(&transport), 4);
        // 10 chars / size 4 = 3 outbound calls.
        let suggestion = c.suggest("abcdefghij", "").await.unwrap();
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
        assert_eq!(suggestion.chunk_texts.len(), 3);
        assert_eq!(suggestion.combined(), "first second third");
    }

    #[tokio::test(start_paused = true)]
    async fn server_errors_are_retried_then_succeed() {
        let transport = ScriptedTransport::new(vec![
            status_reply(500, None),
            status_reply(503, None),
            ok_reply("ok"),
        ]);
        let c = client(Arc::clone(&transport), 100);
        let suggestion = c.suggest("text", "").await.unwrap();
        assert_eq!(suggestion.combined(), "ok");
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn server_errors_exhaust_retries() {
        let transport = ScriptedTransport::new(vec![
            status_reply(500, None),
            status_reply(500, None),
            status_reply(500, None),
        ]);
        let c = client(Arc::clone(&transport), 100);
        match c.suggest("text", "").await {
            Err(SuggestError::Transient { status, attempts }) => {
                assert_eq!(status, 500);
                assert_eq!(attempts, 3);
            }
            other => panic!("expected Transient, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_honors_retry_after() {
        let transport =
            ScriptedTransport::new(vec![status_reply(429, Some("7")), ok_reply("ok")]);
        let c = client(Arc::clone(&transport), 100);
        let start = tokio::time::Instant::now();
        let suggestion = c.suggest("text", "").await.unwrap();
        assert_eq!(suggestion.combined(), "ok");
        // Retry-After of 7s plus jitter of at most half that.
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(7), "waited {waited:?}");
        assert!(waited < Duration::from_millis(10_600), "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_on_later_chunk_fails_fast() {
        let transport = ScriptedTransport::new(vec![
            ok_reply("first"),
            status_reply(429, Some("30")),
        ]);
        let c = client(Arc::clone(&transport), 4);
        let err = c.suggest("abcdefgh", "").await.unwrap_err();
        assert!(matches!(err, SuggestError::RateLimited { .. }));
        // No retry consumed: exactly two calls went out.
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn other_client_errors_are_not_retried() {
        let transport = ScriptedTransport::new(vec![status_reply(400, None)]);
        let c = client(Arc::clone(&transport), 100);
        let err = c.suggest("text", "").await.unwrap_err();
        assert!(matches!(err, SuggestError::Client { status: 400, .. }));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_choices_yield_empty_suggestion() {
        let transport = ScriptedTransport::new(vec![ServiceReply {
            status: 200,
            retry_after: None,
            body: r#"{"choices": []}"#.to_string(),
        }]);
        let c = client(transport, 100);
        let suggestion = c.suggest("text", "").await.unwrap();
        assert_eq!(suggestion.combined(), "");
    }
}
