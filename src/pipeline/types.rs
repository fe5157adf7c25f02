//! Pipeline document, email input and classification result types.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Category assigned when no node matches.
pub const DEFAULT_CATEGORY: &str = "default";

// ── Pipeline ────────────────────────────────────────────────────────

/// An ordered list of nodes. Position is priority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub nodes: Vec<Node>,
    pub updated_at: DateTime<Utc>,
}

impl Pipeline {
    /// Built-in pipeline used when nothing is stored: entry then default.
    pub fn minimal() -> Self {
        Self {
            nodes: vec![
                Node::new("entry", "Mail entry", NodeKind::Entry),
                Node::new("default", "Default category", NodeKind::Default),
            ],
            updated_at: Utc::now(),
        }
    }

    /// Load the stored pipeline document, or the minimal pipeline if absent.
    pub fn from_stored(document: Option<&str>) -> Result<Self, PipelineError> {
        match document {
            None => Ok(Self::minimal()),
            Some(raw) => Ok(serde_json::from_str(raw)?),
        }
    }

    /// Replace the node list with an edited one, stamping `updated_at`.
    ///
    /// The new node list is validated first; on error `self` is unchanged.
    pub fn apply_update(&mut self, nodes: Vec<Node>) -> Result<(), PipelineError> {
        validate_nodes(&nodes)?;
        self.nodes = nodes;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Check structural invariants: non-empty, unique node ids.
    pub fn validate(&self) -> Result<(), PipelineError> {
        validate_nodes(&self.nodes)
    }

    /// Find a node by id.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::minimal()
    }
}

fn validate_nodes(nodes: &[Node]) -> Result<(), PipelineError> {
    let mut seen = HashSet::with_capacity(nodes.len());
    for (position, node) in nodes.iter().enumerate() {
        if node.id.trim().is_empty() {
            return Err(PipelineError::EmptyNodeId(position));
        }
        if !seen.insert(node.id.as_str()) {
            return Err(PipelineError::DuplicateNodeId(node.id.clone()));
        }
    }
    Ok(())
}

// ── Nodes ───────────────────────────────────────────────────────────

/// One rule unit in a pipeline.
///
/// Persisted as `{id, type, name, enabled, config}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNode", into = "RawNode")]
pub struct Node {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub kind: NodeKind,
}

impl Node {
    /// Create an enabled node.
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            enabled: true,
            kind,
        }
    }

    /// Builder-style toggle for `enabled`.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Node variant with its typed configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Structural marker at the head of the pipeline. Never matches.
    Entry,
    Recipient(RecipientConfig),
    Regex(RegexConfig),
    Keyword(KeywordConfig),
    Ai(AiNodeConfig),
    /// Structural marker at the tail. Never matches; the classifier's
    /// fallback yields the default category.
    Default,
}

impl NodeKind {
    /// The persisted `type` tag.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Recipient(_) => "recipient",
            Self::Regex(_) => "regex",
            Self::Keyword(_) => "keyword",
            Self::Ai(_) => "ai",
            Self::Default => "default",
        }
    }

    /// Entry and Default nodes are skipped by the classifier.
    pub fn is_marker(&self) -> bool {
        matches!(self, Self::Entry | Self::Default)
    }
}

/// Recipient address routing: first matching glob wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipientConfig {
    #[serde(default)]
    pub rules: Vec<RecipientRule>,
    #[serde(default)]
    pub fallback: RecipientFallback,
}

/// One glob pattern and the category it routes to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipientRule {
    /// Glob over the recipient address (`*` any run, `?` one character).
    pub pattern: String,
    /// `None` makes a matching rule decline.
    #[serde(default, deserialize_with = "non_empty_category")]
    pub category_id: Option<String>,
}

/// What a recipient node does when no rule matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientFallback {
    /// Report no match; the next node is evaluated.
    #[default]
    Continue,
    /// Match the default category immediately.
    Default,
}

/// Regular expression test against one email field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegexConfig {
    pub field: EmailField,
    pub pattern: String,
    /// Flag letters as stored by the editor (`i`, `m`, `s`, `u`, `g`, `y`).
    #[serde(default)]
    pub flags: String,
    pub category_id: String,
}

/// Keyword occurrence test against one email field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordConfig {
    pub field: EmailField,
    #[serde(default)]
    pub mode: KeywordMode,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub category_id: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordMode {
    #[default]
    Any,
    All,
}

/// AI-assisted choice among candidate categories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiNodeConfig {
    /// Category ids the model may pick from.
    #[serde(default)]
    pub candidate_categories: Vec<String>,
    /// Text placed ahead of the generated classification instruction.
    #[serde(default)]
    pub custom_prompt: String,
}

/// Email field selector for regex and keyword nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailField {
    Subject,
    /// Display name and address joined with a space.
    From,
    To,
    Body,
}

fn non_empty_category<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|id| !id.is_empty()))
}

// ── Persisted node shape ────────────────────────────────────────────

/// Wire form of a node: a `type` tag plus a type-dependent `config` object.
///
/// Entry and Default nodes carry no config. Extra keys written by the editor
/// (`locked`, `category_id` on the default node) are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawNode {
    id: String,
    #[serde(rename = "type")]
    node_type: String,
    name: String,
    #[serde(default = "enabled_by_default")]
    enabled: bool,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    config: serde_json::Value,
}

fn enabled_by_default() -> bool {
    true
}

impl TryFrom<RawNode> for Node {
    type Error = String;

    fn try_from(raw: RawNode) -> Result<Self, Self::Error> {
        fn config<T: serde::de::DeserializeOwned>(
            raw: &RawNode,
        ) -> Result<T, String> {
            serde_json::from_value(raw.config.clone())
                .map_err(|e| format!("node `{}`: invalid {} config: {e}", raw.id, raw.node_type))
        }

        let kind = match raw.node_type.as_str() {
            "entry" => NodeKind::Entry,
            "default" => NodeKind::Default,
            "recipient" => NodeKind::Recipient(config(&raw)?),
            "regex" => NodeKind::Regex(config(&raw)?),
            "keyword" => NodeKind::Keyword(config(&raw)?),
            "ai" => NodeKind::Ai(config(&raw)?),
            other => return Err(format!("node `{}`: unknown node type `{other}`", raw.id)),
        };

        Ok(Self {
            id: raw.id,
            name: raw.name,
            enabled: raw.enabled,
            kind,
        })
    }
}

impl From<Node> for RawNode {
    fn from(node: Node) -> Self {
        let node_type = node.kind.type_name().to_string();
        let config = match &node.kind {
            NodeKind::Entry | NodeKind::Default => serde_json::Value::Null,
            NodeKind::Recipient(c) => to_config_value(c),
            NodeKind::Regex(c) => to_config_value(c),
            NodeKind::Keyword(c) => to_config_value(c),
            NodeKind::Ai(c) => to_config_value(c),
        };
        Self {
            id: node.id,
            node_type,
            name: node.name,
            enabled: node.enabled,
            config,
        }
    }
}

fn to_config_value<T: Serialize>(config: &T) -> serde_json::Value {
    // Plain structs of strings, enums and vecs always serialize.
    serde_json::to_value(config).unwrap_or(serde_json::Value::Null)
}

// ── Email input ─────────────────────────────────────────────────────

/// Normalized email metadata handed to the classifier. Never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailInput {
    pub from_address: String,
    #[serde(default)]
    pub from_name: Option<String>,
    pub to_address: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body_text: String,
}

impl EmailInput {
    /// Resolve a field selector to the text a matcher tests.
    pub fn field(&self, field: EmailField) -> String {
        match field {
            EmailField::Subject => self.subject.clone(),
            EmailField::From => match self.from_name.as_deref() {
                Some(name) if !name.is_empty() => format!("{name} {}", self.from_address),
                _ => self.from_address.clone(),
            },
            EmailField::To => self.to_address.clone(),
            EmailField::Body => self.body_text.clone(),
        }
    }

    /// Sender as shown in prompts: display name if present, else address.
    pub fn sender_display(&self) -> &str {
        match self.from_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.from_address,
        }
    }
}

// ── Classification result ───────────────────────────────────────────

/// Outcome of one `classify` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyResult {
    pub category_id: String,
    pub node_id: Option<String>,
    pub node_name: Option<String>,
    /// `None` when no trace was requested, as opposed to an empty trace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<TraceEntry>>,
}

impl ClassifyResult {
    /// True when a node produced the category (including a recipient
    /// node's `default` fallback).
    pub fn is_matched(&self) -> bool {
        self.node_id.is_some()
    }
}

/// Per-node diagnostic record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub node_id: String,
    pub node_name: String,
    pub result: NodeOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeOutcome {
    Matched,
    NotMatched,
    Skipped,
    Error,
}

impl NodeOutcome {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Matched => "matched",
            Self::NotMatched => "not_matched",
            Self::Skipped => "skipped",
            Self::Error => "error",
        }
    }
}
