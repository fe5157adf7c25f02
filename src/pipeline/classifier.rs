//! Classifier — walks a pipeline's nodes in order, first match wins.
//!
//! Flow for one email:
//! 1. Drop disabled nodes (order preserved)
//! 2. Skip Entry/Default markers
//! 3. Run each node's matcher; the first category returned ends the walk
//! 4. Nothing matched → the default category
//!
//! A node fault (bad pattern, lookup or AI failure) is logged, traced as
//! `error`, and treated as "no match". `classify` has no error path.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::AiConfig;
use crate::error::NodeError;
use crate::llm::{HttpChatProvider, LlmProvider};
use crate::pipeline::ai::match_ai;
use crate::pipeline::categories::CategoryLookup;
use crate::pipeline::rules::{match_keywords, match_recipient, match_regex};
use crate::pipeline::types::{
    ClassifyResult, DEFAULT_CATEGORY, EmailInput, Node, NodeKind, NodeOutcome, Pipeline,
    TraceEntry,
};

/// Read-only snapshots a single `classify` call depends on.
#[derive(Clone, Copy)]
pub struct ClassifyContext<'a> {
    pub ai: &'a AiConfig,
    pub categories: &'a dyn CategoryLookup,
}

impl<'a> ClassifyContext<'a> {
    pub fn new(ai: &'a AiConfig, categories: &'a dyn CategoryLookup) -> Self {
        Self { ai, categories }
    }
}

/// Pipeline evaluator. Cheap to share: holds only the LLM transport.
pub struct Classifier {
    llm: Arc<dyn LlmProvider>,
}

impl Classifier {
    /// Create a classifier using the given LLM transport for AI nodes.
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Create a classifier backed by the HTTP chat-completions transport.
    pub fn with_http() -> Self {
        Self::new(Arc::new(HttpChatProvider::new()))
    }

    /// Classify an email against a pipeline.
    ///
    /// With `with_trace`, the result carries one entry per visited node, in
    /// visitation order, ending at the matching node (or the last node).
    /// Without it, `trace` is `None`.
    pub async fn classify(
        &self,
        pipeline: &Pipeline,
        email: &EmailInput,
        ctx: ClassifyContext<'_>,
        with_trace: bool,
    ) -> ClassifyResult {
        let mut trace = with_trace.then(Vec::new);

        for node in pipeline.nodes.iter().filter(|n| n.enabled) {
            if node.kind.is_marker() {
                record(&mut trace, node, NodeOutcome::Skipped, None);
                continue;
            }

            match self.evaluate(node, email, ctx).await {
                Ok(Some(category_id)) if !category_id.is_empty() => {
                    record(&mut trace, node, NodeOutcome::Matched, None);
                    info!(
                        node_id = %node.id,
                        node_type = node.kind.type_name(),
                        category_id = %category_id,
                        "Email classified"
                    );
                    return ClassifyResult {
                        category_id,
                        node_id: Some(node.id.clone()),
                        node_name: Some(node.name.clone()),
                        trace,
                    };
                }
                Ok(_) => {
                    debug!(node_id = %node.id, "Node did not match");
                    record(&mut trace, node, NodeOutcome::NotMatched, None);
                }
                Err(e) => {
                    warn!(
                        node_id = %node.id,
                        node_type = node.kind.type_name(),
                        error = %e,
                        "Node failed, continuing with next node"
                    );
                    record(&mut trace, node, NodeOutcome::Error, Some(e.to_string()));
                }
            }
        }

        debug!("No node matched, using default category");
        ClassifyResult {
            category_id: DEFAULT_CATEGORY.to_string(),
            node_id: None,
            node_name: None,
            trace,
        }
    }

    /// Dispatch a node to its matcher.
    async fn evaluate(
        &self,
        node: &Node,
        email: &EmailInput,
        ctx: ClassifyContext<'_>,
    ) -> Result<Option<String>, NodeError> {
        match &node.kind {
            NodeKind::Entry | NodeKind::Default => Ok(None),
            NodeKind::Recipient(config) => match_recipient(config, email),
            NodeKind::Regex(config) => match_regex(config, email),
            NodeKind::Keyword(config) => Ok(match_keywords(config, email)),
            NodeKind::Ai(config) => {
                match_ai(config, email, ctx.ai, self.llm.as_ref(), ctx.categories).await
            }
        }
    }
}

fn record(
    trace: &mut Option<Vec<TraceEntry>>,
    node: &Node,
    result: NodeOutcome,
    details: Option<String>,
) {
    if let Some(entries) = trace {
        entries.push(TraceEntry {
            node_id: node.id.clone(),
            node_name: node.name.clone(),
            result,
            details,
        });
    }
}
