use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use mail_router::config::AiConfig;
use mail_router::llm::{self, HttpChatProvider};
use mail_router::pipeline::inbound::{InboundEnvelope, parse_raw_message};
use mail_router::pipeline::report::test_pipeline;
use mail_router::pipeline::{CategorySnapshot, ClassifyContext, Classifier, EmailInput, Pipeline};

const USAGE: &str = "\
Usage:
  mail-router <pipeline.json> <email.json|email.eml> [categories.json]
  mail-router probe

AI settings are read from MAIL_ROUTER_AI_* environment variables.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() || args.iter().any(|a| a == "-h" || a == "--help") {
        eprintln!("{USAGE}");
        std::process::exit(2);
    }

    let ai = AiConfig::from_env().context("reading AI settings")?;
    let provider = Arc::new(HttpChatProvider::new());

    if args[0] == "probe" {
        let result = llm::probe(provider.as_ref(), &ai).await;
        println!("{}", serde_json::to_string_pretty(&result)?);
        if !result.success {
            std::process::exit(1);
        }
        return Ok(());
    }

    let [pipeline_path, email_path, rest @ ..] = args.as_slice() else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };

    let pipeline = load_pipeline(Path::new(pipeline_path))?;
    let email = load_email(Path::new(email_path))?;
    let categories = match rest.first() {
        Some(path) => load_categories(Path::new(path))?,
        None => CategorySnapshot::new(),
    };

    eprintln!("📬 mail-router v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Pipeline: {} node(s)", pipeline.nodes.len());
    eprintln!("   AI: {}", if ai.enabled { ai.model.as_str() } else { "disabled" });

    let classifier = Classifier::new(provider);
    let report = test_pipeline(
        &classifier,
        &pipeline,
        &email,
        ClassifyContext::new(&ai, &categories),
    )
    .await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn load_pipeline(path: &Path) -> anyhow::Result<Pipeline> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading pipeline {}", path.display()))?;
    let pipeline = Pipeline::from_stored(Some(&raw))
        .with_context(|| format!("parsing pipeline {}", path.display()))?;
    pipeline.validate()?;
    Ok(pipeline)
}

/// `.eml` files are parsed as raw MIME; anything else as `EmailInput` JSON.
fn load_email(path: &Path) -> anyhow::Result<EmailInput> {
    let raw = std::fs::read(path).with_context(|| format!("reading email {}", path.display()))?;
    if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("eml")) {
        let mail = parse_raw_message(&raw, &InboundEnvelope::default())?;
        Ok(mail.email)
    } else {
        serde_json::from_slice(&raw).with_context(|| format!("parsing email {}", path.display()))
    }
}

fn load_categories(path: &Path) -> anyhow::Result<CategorySnapshot> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading categories {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing categories {}", path.display()))
}
