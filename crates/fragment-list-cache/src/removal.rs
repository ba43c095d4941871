use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::{error::Result, CacheKey, ListCache};

impl ListCache {
    /// Removes the entities with the given ids from the list of `typename` and evicts their
    /// records from the store.
    ///
    /// Returns `false` without touching anything when `ids` is empty or there is no list to
    /// remove from. Ids that are not in the list are still evicted and still count as success.
    pub fn remove<I, S>(&self, typename: &str, ids: I) -> Result<bool>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids = ids.into_iter().map(Into::into).collect::<HashSet<String>>();
        if ids.is_empty() {
            return Ok(false);
        }

        let _span = tracing::debug_span!("remove_from_list", typename).entered();

        if self.types().get(typename).is_none() {
            tracing::debug!("{typename} is not a cacheable type, nothing to remove");
            return Ok(false);
        }

        let _guards = self.lock(std::iter::once(typename));

        let Some(previous) = self.read_stored(typename).filter(|record| record.total_count() >= 1) else {
            tracing::debug!("no list of {typename} to remove from");
            return Ok(false);
        };

        let (removed, kept): (Vec<_>, Vec<_>) = previous
            .nodes()
            .iter()
            .cloned()
            .partition(|node| ids.contains(node.id()));
        let record = previous.with_nodes(kept);

        self.write_records(std::iter::once((typename, &record)))?;

        let mut keys = removed
            .iter()
            .map(|node| node.cache_key().clone())
            .collect::<Vec<CacheKey>>();

        // Ids that were not listed only have the store's identity function to go by.
        for id in ids.iter().filter(|id| !removed.iter().any(|node| node.id() == id.as_str())) {
            let mut object = Map::new();
            object.insert(String::from("__typename"), Value::String(typename.to_string()));
            object.insert(String::from("id"), Value::String(id.clone()));

            match self.store().identify(&object) {
                Some(key) => keys.push(key),
                None => tracing::debug!("can't derive the cache key of {typename} {id}, it stays in the store"),
            }
        }

        let mut first_error = None;
        for key in &keys {
            if let Err(err) = self.store().evict(key) {
                tracing::warn!("error when evicting {key} from the store: {err}");
                first_error.get_or_insert(err);
            }
        }

        if let Some(err) = first_error {
            return Err(err.into());
        }

        tracing::debug!("{} ids removed, {} nodes left", ids.len(), record.total_count());

        Ok(true)
    }
}
