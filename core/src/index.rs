use anyhow::Result;

use crate::db::Store;

/// In-memory, sorted collection of known food names.
///
/// Built once after the reference store is populated and read-only for the
/// process lifetime; safe for unsynchronized concurrent reads. An empty
/// index is permitted — resolution then always reports not-found.
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    names: Vec<String>,
}

impl ReferenceIndex {
    /// Build the index from all food names in the store.
    pub fn build(store: &dyn Store) -> Result<Self> {
        Ok(Self::from_names(store.all_food_names()?))
    }

    #[must_use]
    pub fn from_names(mut names: Vec<String>) -> Self {
        names.sort_unstable();
        Self { names }
    }

    /// All names, ascending lexicographic.
    #[must_use]
    pub fn all_names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
