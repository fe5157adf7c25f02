//! mail-router — rule pipeline for sorting inbound email into categories.

pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
