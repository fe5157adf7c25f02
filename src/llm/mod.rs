//! LLM integration for mail-router.
//!
//! The AI matcher talks to any OpenAI-compatible chat-completions endpoint
//! through the `LlmProvider` trait. `HttpChatProvider` is the `reqwest`
//! implementation; tests substitute their own.

pub mod http;
pub mod provider;

pub use http::HttpChatProvider;
pub use provider::*;

use std::time::Instant;

use serde::Serialize;

use crate::config::AiConfig;
use crate::error::LlmError;

/// Max tokens for the connection probe.
const PROBE_MAX_TOKENS: u32 = 5;

/// Outcome of an AI connection probe.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub success: bool,
    pub message: String,
    pub latency_ms: u64,
}

/// Send a tiny "Say OK" completion to check endpoint, key and model.
///
/// Runs regardless of `config.enabled` so settings can be tested before
/// they are switched on. Bounded by the configured AI deadline.
pub async fn probe(llm: &dyn LlmProvider, config: &AiConfig) -> ProbeResult {
    let request = CompletionRequest::new(vec![ChatMessage::user("Say OK")])
        .with_model(config.model.clone())
        .with_max_tokens(PROBE_MAX_TOKENS)
        .with_temperature(0.0);

    let started = Instant::now();
    let outcome = match tokio::time::timeout(config.timeout(), llm.complete(config, request)).await
    {
        Ok(result) => result,
        Err(_) => Err(LlmError::Timeout {
            timeout_ms: config.timeout().as_millis() as u64,
        }),
    };
    let latency_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(_) => {
            tracing::info!(latency_ms, model = %config.model, "AI probe succeeded");
            ProbeResult {
                success: true,
                message: "Connection OK".to_string(),
                latency_ms,
            }
        }
        Err(e) => {
            tracing::warn!(latency_ms, error = %e, "AI probe failed");
            ProbeResult {
                success: false,
                message: e.to_string(),
                latency_ms,
            }
        }
    }
}
