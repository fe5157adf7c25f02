//! Error types for mail-router.

/// Top-level error type for the crate's adapters.
///
/// `Classifier::classify` never returns this: node faults are downgraded to
/// "no match" and only surface in the trace.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Category lookup error: {0}")]
    Lookup(#[from] LookupError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Pipeline document errors (loading and validation, never classification).
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid pipeline document: {0}")]
    InvalidDocument(#[from] serde_json::Error),

    #[error("Duplicate node id: {0}")]
    DuplicateNodeId(String),

    #[error("Node at position {0} has an empty id")]
    EmptyNodeId(usize),
}

/// Chat-completion transport errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("AI request failed: {0}")]
    RequestFailed(String),

    #[error("AI endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid AI response: {0}")]
    InvalidResponse(String),

    #[error("AI request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Category lookup errors, raised by a `CategoryLookup` backend.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("Category lookup failed: {0}")]
    Backend(String),
}

/// Faults raised while evaluating a single node.
///
/// Caught at the node boundary by the classifier and recorded as an `error`
/// trace entry.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("Invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid regex flag `{0}`")]
    InvalidFlag(char),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Ai(#[from] LlmError),
}

/// Raw message ingest errors.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Failed to parse message: {0}")]
    Unparseable(String),

    #[error("Message has no recipient address")]
    MissingRecipient,

    #[error("Message has no sender address")]
    MissingSender,
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
