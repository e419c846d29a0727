//! Catalog Resources

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A learning resource in the catalog
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Resource {
    /// Catalog identifier
    pub id: u64,

    /// Display title
    pub title: String,

    /// Author name
    pub author: String,

    /// Category label
    pub category: String,

    /// Price in coin units
    pub price_coins: u64,

    /// Free resources never enter checkout
    pub is_free: bool,

    /// Short description
    pub summary: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Resource {
    pub fn new(
        id: u64,
        title: impl Into<String>,
        author: impl Into<String>,
        category: impl Into<String>,
        price_coins: u64,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            author: author.into(),
            category: category.into(),
            price_coins,
            is_free: price_coins == 0,
            summary: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }
}

/// Resource storage trait
pub trait ResourceStore: Send + Sync {
    /// Save or update a resource
    fn save(&self, resource: &Resource) -> Result<()>;

    /// Get resource by id
    fn get(&self, id: u64) -> Result<Option<Resource>>;

    /// List all resources, ordered by id
    fn list(&self) -> Result<Vec<Resource>>;
}

/// In-memory resource store (for development)
pub struct MemoryResourceStore {
    resources: RwLock<HashMap<u64, Resource>>,
}

impl Default for MemoryResourceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryResourceStore {
    pub fn new() -> Self {
        Self {
            resources: RwLock::new(HashMap::new()),
        }
    }
}

impl ResourceStore for MemoryResourceStore {
    fn save(&self, resource: &Resource) -> Result<()> {
        let mut resources = self.resources.write().unwrap();
        resources.insert(resource.id, resource.clone());
        Ok(())
    }

    fn get(&self, id: u64) -> Result<Option<Resource>> {
        let resources = self.resources.read().unwrap();
        Ok(resources.get(&id).cloned())
    }

    fn list(&self) -> Result<Vec<Resource>> {
        let resources = self.resources.read().unwrap();
        let mut result: Vec<_> = resources.values().cloned().collect();
        result.sort_by_key(|r| r.id);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_flag() {
        let paid = Resource::new(1, "Rust Course", "Ada", "programming", 120);
        assert!(!paid.is_free);

        let free = Resource::new(2, "Intro Notes", "Ada", "programming", 0);
        assert!(free.is_free);
    }

    #[test]
    fn test_store_roundtrip() {
        let store = MemoryResourceStore::new();
        store
            .save(&Resource::new(3, "Algorithms", "Bo", "cs", 200))
            .unwrap();

        let loaded = store.get(3).unwrap();
        assert_eq!(loaded.unwrap().title, "Algorithms");
        assert!(store.get(99).unwrap().is_none());
    }
}
