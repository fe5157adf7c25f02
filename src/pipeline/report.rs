//! "Test this pipeline" report: classify with trace and describe the result.

use serde::Serialize;
use tracing::warn;

use crate::pipeline::classifier::{ClassifyContext, Classifier};
use crate::pipeline::types::{EmailInput, Pipeline, TraceEntry};

/// Name shown when the result category is missing from the category store.
pub const FALLBACK_CATEGORY_NAME: &str = "Default";

/// Node that produced the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
}

/// Report returned to the pipeline editor. Nothing is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineTestReport {
    pub category_id: String,
    pub category_name: String,
    pub matched_node: Option<MatchedNode>,
    pub trace: Vec<TraceEntry>,
}

/// Run a pipeline against a sample email with tracing enabled.
pub async fn test_pipeline(
    classifier: &Classifier,
    pipeline: &Pipeline,
    email: &EmailInput,
    ctx: ClassifyContext<'_>,
) -> PipelineTestReport {
    let result = classifier.classify(pipeline, email, ctx, true).await;

    let category_name = match ctx.categories.category_name(&result.category_id).await {
        Ok(Some(name)) => name,
        Ok(None) => FALLBACK_CATEGORY_NAME.to_string(),
        Err(e) => {
            warn!(category_id = %result.category_id, error = %e, "Category name lookup failed");
            FALLBACK_CATEGORY_NAME.to_string()
        }
    };

    let matched_node = result.node_id.as_ref().map(|id| MatchedNode {
        id: id.clone(),
        name: result.node_name.clone().unwrap_or_default(),
        node_type: pipeline
            .node(id)
            .map(|n| n.kind.type_name())
            .unwrap_or("unknown")
            .to_string(),
    });

    PipelineTestReport {
        category_id: result.category_id,
        category_name,
        matched_node,
        trace: result.trace.unwrap_or_default(),
    }
}
