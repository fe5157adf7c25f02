//! AI matcher: asks a chat model to pick one of a node's candidate
//! categories.
//!
//! Exactly one completion call per evaluation, bounded by the configured
//! deadline. Every failure is reported as `Err` so the classifier can trace
//! it; the classifier then treats it as "no match".

use tracing::{debug, warn};

use crate::config::AiConfig;
use crate::error::{LlmError, NodeError};
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::pipeline::categories::{Category, CategoryLookup};
use crate::pipeline::types::{AiNodeConfig, EmailInput};

/// Body characters included in the prompt.
const BODY_PREVIEW_CHARS: usize = 1000;

/// Temperature for classification (deterministic).
const AI_TEMPERATURE: f32 = 0.0;

const SYSTEM_PROMPT: &str =
    "You are an email classifier. Respond with only the category name, nothing else.";

/// Run an AI node against an email.
///
/// Returns `Ok(None)` without any lookup or network call when AI is
/// globally disabled or the node has no candidates.
pub async fn match_ai(
    node: &AiNodeConfig,
    email: &EmailInput,
    ai: &AiConfig,
    llm: &dyn LlmProvider,
    categories: &dyn CategoryLookup,
) -> Result<Option<String>, NodeError> {
    if !ai.enabled {
        debug!("AI disabled, skipping AI node");
        return Ok(None);
    }
    if node.candidate_categories.is_empty() {
        return Ok(None);
    }

    let candidates = categories.categories(&node.candidate_categories).await?;
    if candidates.is_empty() {
        debug!("No candidate categories resolved, skipping AI call");
        return Ok(None);
    }

    let prompt = build_prompt(email, &candidates, &node.custom_prompt);
    let request = CompletionRequest::new(vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(prompt),
    ])
    .with_model(ai.model.clone())
    .with_max_tokens(ai.effective_max_tokens())
    .with_temperature(AI_TEMPERATURE);

    let deadline = ai.timeout();
    // Dropping the pending future on expiry abandons the HTTP request.
    let response = match tokio::time::timeout(deadline, llm.complete(ai, request)).await {
        Ok(result) => result?,
        Err(_) => {
            let timeout_ms = deadline.as_millis() as u64;
            warn!(timeout_ms, "AI classification timed out");
            return Err(LlmError::Timeout { timeout_ms }.into());
        }
    };

    let chosen = pick_candidate(&response.content, &candidates);
    debug!(
        answer = %response.content.trim(),
        chosen = chosen.map(|c| c.id.as_str()).unwrap_or("none"),
        "AI answered"
    );
    Ok(chosen.map(|c| c.id.clone()))
}

/// Build the user prompt: custom text, instruction, then the email fields.
pub fn build_prompt(email: &EmailInput, candidates: &[Category], custom_prompt: &str) -> String {
    let names: Vec<&str> = candidates.iter().map(|c| c.name.as_str()).collect();
    let body_preview: String = email.body_text.chars().take(BODY_PREVIEW_CHARS).collect();

    let mut prompt = String::with_capacity(custom_prompt.len() + body_preview.len() + 256);
    prompt.push_str(custom_prompt);
    prompt.push_str(&format!(
        "\n\nClassify the following email into one of these categories: {}\n\n",
        names.join(", ")
    ));
    prompt.push_str(&format!("From: {}\n", email.sender_display()));
    prompt.push_str(&format!("To: {}\n", email.to_address));
    prompt.push_str(&format!("Subject: {}\n", email.subject));
    prompt.push_str(&format!("Body:\n{body_preview}"));
    prompt
}

/// Match the model's answer to exactly one candidate name.
///
/// Trimmed, case-insensitive equality. Ambiguous answers (several candidates
/// share the name) and empty answers pick nothing.
fn pick_candidate<'a>(answer: &str, candidates: &'a [Category]) -> Option<&'a Category> {
    let answer = answer.trim().to_lowercase();
    if answer.is_empty() {
        return None;
    }
    let mut matching = candidates
        .iter()
        .filter(|c| c.name.trim().to_lowercase() == answer);
    match (matching.next(), matching.next()) {
        (Some(only), None) => Some(only),
        _ => None,
    }
}
