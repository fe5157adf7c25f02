//! Classification pipeline.
//!
//! Every inbound email flows through:
//! 1. `inbound::parse_raw_message()` — MIME → `EmailInput`
//! 2. `Classifier::classify()` — ordered node walk, first match wins
//!    - `rules` — recipient globs, regex, keywords (sync, no I/O)
//!    - `ai` — one bounded chat-completion call
//! 3. `inbound::route_inbound()` — result → stored record
//!
//! `report::test_pipeline()` runs the same walk with a trace for the editor.

pub mod ai;
pub mod categories;
pub mod classifier;
pub mod inbound;
pub mod report;
pub mod rules;
pub mod types;

pub use categories::{Category, CategoryLookup, CategorySnapshot};
pub use classifier::{ClassifyContext, Classifier};
pub use types::{
    ClassifyResult, DEFAULT_CATEGORY, EmailInput, Node, NodeKind, NodeOutcome, Pipeline,
    TraceEntry,
};
