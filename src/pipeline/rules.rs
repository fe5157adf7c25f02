//! Synchronous node matchers: recipient globs, regex tests, keyword sets.
//!
//! Each matcher returns `Ok(Some(category_id))` on a match, `Ok(None)` when
//! the node declines, and `Err` for a node fault (bad pattern or flags).
//! None of them touch anything but the email they are given.

use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::error::NodeError;
use crate::pipeline::types::{
    DEFAULT_CATEGORY, EmailInput, KeywordConfig, KeywordMode, RecipientConfig,
    RecipientFallback, RegexConfig,
};

/// Route on the recipient address. The first rule whose glob matches wins.
pub fn match_recipient(
    config: &RecipientConfig,
    email: &EmailInput,
) -> Result<Option<String>, NodeError> {
    for rule in &config.rules {
        let glob = glob_to_regex(&rule.pattern)?;
        if glob.is_match(&email.to_address) {
            debug!(
                pattern = %rule.pattern,
                to = %email.to_address,
                category = rule.category_id.as_deref().unwrap_or("none"),
                "Recipient rule matched"
            );
            // A rule without a category declines outright; the fallback
            // only applies when no rule matched at all.
            return Ok(rule.category_id.clone());
        }
    }

    match config.fallback {
        RecipientFallback::Continue => Ok(None),
        RecipientFallback::Default => Ok(Some(DEFAULT_CATEGORY.to_string())),
    }
}

/// Test a regex anywhere in the selected field.
pub fn match_regex(config: &RegexConfig, email: &EmailInput) -> Result<Option<String>, NodeError> {
    let regex = compile_with_flags(&config.pattern, &config.flags)?;
    let haystack = email.field(config.field);
    if regex.is_match(&haystack) {
        Ok(Some(config.category_id.clone()))
    } else {
        Ok(None)
    }
}

/// Case-insensitive substring test for a keyword set.
///
/// An empty keyword set never matches.
pub fn match_keywords(config: &KeywordConfig, email: &EmailInput) -> Option<String> {
    if config.keywords.is_empty() {
        return None;
    }

    let haystack = email.field(config.field).to_lowercase();
    let hits = config
        .keywords
        .iter()
        .filter(|keyword| haystack.contains(&keyword.to_lowercase()))
        .count();

    let matched = match config.mode {
        KeywordMode::Any => hits > 0,
        KeywordMode::All => hits == config.keywords.len(),
    };

    matched.then(|| config.category_id.clone())
}

/// Convert a recipient glob to an anchored, case-insensitive regex.
///
/// `*` matches any run of characters and `?` exactly one; everything else
/// is literal.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, NodeError> {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push('^');
    let mut literal = String::new();
    for ch in pattern.chars() {
        match ch {
            '*' | '?' => {
                source.push_str(&regex::escape(&literal));
                literal.clear();
                source.push_str(if ch == '*' { ".*" } else { "." });
            }
            _ => literal.push(ch),
        }
    }
    source.push_str(&regex::escape(&literal));
    source.push('$');

    RegexBuilder::new(&source)
        .case_insensitive(true)
        .build()
        .map_err(|e| NodeError::InvalidPattern {
            pattern: pattern.to_string(),
            source: e,
        })
}

/// Compile a pattern with editor-style flag letters.
///
/// `i`, `m` and `s` map to regex options. `u` is implied by Rust's regex
/// engine, and `g`/`y` have no effect on a single test.
fn compile_with_flags(pattern: &str, flags: &str) -> Result<Regex, NodeError> {
    let mut builder = RegexBuilder::new(pattern);
    for flag in flags.chars() {
        match flag {
            'i' => {
                builder.case_insensitive(true);
            }
            'm' => {
                builder.multi_line(true);
            }
            's' => {
                builder.dot_matches_new_line(true);
            }
            'u' | 'g' | 'y' => {}
            other => return Err(NodeError::InvalidFlag(other)),
        }
    }
    builder.build().map_err(|e| NodeError::InvalidPattern {
        pattern: pattern.to_string(),
        source: e,
    })
}
