//! Category id → display name lookup.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LookupError;

/// A category as known to the category store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
}

/// Read access to category names, supplied by the category store.
#[async_trait]
pub trait CategoryLookup: Send + Sync {
    /// Resolve ids to categories. Unknown ids are omitted from the result.
    async fn categories(&self, ids: &[String]) -> Result<Vec<Category>, LookupError>;

    /// Name of a single category, if it exists.
    async fn category_name(&self, id: &str) -> Result<Option<String>, LookupError> {
        let found = self.categories(&[id.to_string()]).await?;
        Ok(found.into_iter().next().map(|c| c.name))
    }
}

/// In-memory snapshot of the category table, taken once per call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategorySnapshot {
    names: HashMap<String, String>,
}

impl CategorySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_category(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.names.insert(id.into(), name.into());
        self
    }

    pub fn insert(&mut self, id: impl Into<String>, name: impl Into<String>) {
        self.names.insert(id.into(), name.into());
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl FromIterator<Category> for CategorySnapshot {
    fn from_iter<I: IntoIterator<Item = Category>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(|c| (c.id, c.name)).collect(),
        }
    }
}

#[async_trait]
impl CategoryLookup for CategorySnapshot {
    async fn categories(&self, ids: &[String]) -> Result<Vec<Category>, LookupError> {
        // Keep the caller's order; skip ids repeated in the request.
        let mut found: Vec<Category> = Vec::with_capacity(ids.len());
        for id in ids {
            if found.iter().any(|c| &c.id == id) {
                continue;
            }
            if let Some(name) = self.names.get(id) {
                found.push(Category {
                    id: id.clone(),
                    name: name.clone(),
                });
            }
        }
        Ok(found)
    }
}
