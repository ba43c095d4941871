mod memory;

use std::{borrow::Cow, fmt};

use cynic_parser::executable::FragmentDefinition;
use serde_json::{Map, Value};

use crate::StoreError;

pub use self::memory::{default_identify, InMemoryStore};

/// The key a normalized store addresses one entity record with.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        CacheKey(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        CacheKey(key.to_string())
    }
}

/// The normalized cache the lists are kept in.
///
/// Every read distinguishes a miss (`Ok(None)`, the data is absent or incomplete) from a
/// failure of the store itself (`Err`). Callers in this crate treat both as "no cached data",
/// but only failures are logged.
pub trait Store: Send + Sync {
    /// Derives the cache identity of a result object, if it has one.
    fn identify(&self, object: &Map<String, Value>) -> Option<CacheKey>;

    /// Reads a root field as it is stored, without resolving references.
    fn read_field(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Reads `fragment` against the entity stored under `key`.
    ///
    /// Returns `Ok(None)` if the entity is absent or any field the fragment requires is missing.
    fn read_fragment(&self, key: &CacheKey, fragment: FragmentDefinition<'_>)
        -> Result<Option<Map<String, Value>>, StoreError>;

    /// Overwrites the given root fields.
    fn write(&self, data: Map<String, Value>) -> Result<(), StoreError>;

    /// Drops the entity record stored under `key`.
    fn evict(&self, key: &CacheKey) -> Result<(), StoreError>;

    /// Normalizes a query before its definitions are extracted.
    fn transform_document<'a>(&self, query: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(query)
    }
}
