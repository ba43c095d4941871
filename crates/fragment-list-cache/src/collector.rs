use indexmap::IndexMap;

use crate::{CacheKey, EntityReference};

/// Entity references found in one result tree, grouped by type name and keyed by cache
/// identity.
///
/// Buckets keep the order entities were first seen in.
#[derive(Debug, Default)]
pub struct EntityCollector {
    entities: IndexMap<String, IndexMap<CacheKey, EntityReference>>,
}

impl EntityCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `reference`, keeping the first one seen for its cache key.
    pub fn insert(&mut self, reference: EntityReference) {
        self.entities
            .entry(reference.typename().to_string())
            .or_default()
            .entry(reference.cache_key().clone())
            .or_insert(reference);
    }

    pub fn typenames(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        self.entities.keys().map(String::as_str)
    }

    pub fn entities_of<'a>(&'a self, typename: &str) -> impl Iterator<Item = &'a EntityReference> + 'a {
        self.entities
            .get(typename)
            .into_iter()
            .flat_map(|bucket| bucket.values())
    }

    pub fn len(&self) -> usize {
        self.entities.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
