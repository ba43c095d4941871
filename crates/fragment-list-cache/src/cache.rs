use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::{
    config::is_graphql_name,
    error::{Error, Result},
    operation::find_operation,
    parser_extensions::OperationExt,
    synchronizer::{empty_connection, synchronize},
    walker::{fragment_map, walk_selection_set, WalkContext},
    CacheableTypeDeclaration, CacheableTypes, ConnectionRecord, EntityCollector, KeyNaming, ListCacheConfig, ListNode,
    Operation, Store, StoreError,
};

/// Keeps one list per cacheable type in a [`Store`] up to date.
///
/// Cloning is cheap, clones share the same store and locks.
#[derive(Clone)]
pub struct ListCache {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn Store>,
    types: CacheableTypes,
    naming: KeyNaming,
    // Serializes the read-merge-write of each type's list.
    locks: HashMap<String, Mutex<()>>,
}

pub struct ListCacheBuilder {
    store: Arc<dyn Store>,
    declarations: Vec<String>,
    config: ListCacheConfig,
    naming: Option<KeyNaming>,
}

impl ListCacheBuilder {
    /// Adds a cacheable type declaration, given as a fragment document.
    pub fn with_declaration(mut self, source: impl Into<String>) -> Self {
        self.declarations.push(source.into());
        self
    }

    pub fn with_declarations(mut self, sources: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.declarations.extend(sources.into_iter().map(Into::into));
        self
    }

    pub fn with_config(mut self, config: ListCacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses `naming` instead of the naming built from the config.
    pub fn with_naming(mut self, naming: KeyNaming) -> Self {
        self.naming = Some(naming);
        self
    }

    pub fn build(self) -> Result<ListCache> {
        let types = CacheableTypes::parse(self.declarations.iter().map(String::as_str))?;
        let naming = match self.naming {
            Some(naming) => naming,
            None => KeyNaming::from_config(&self.config)?,
        };

        validate_keys(&types, &naming)?;

        let locks = types
            .iter()
            .map(|declaration| (declaration.typename().to_string(), Mutex::new(())))
            .collect();

        tracing::debug!("list cache built for {} cacheable types", types.len());

        Ok(ListCache {
            inner: Arc::new(Inner {
                store: self.store,
                types,
                naming,
                locks,
            }),
        })
    }
}

/// Read and remove keys must be usable as field names, and no two types may share one.
fn validate_keys(types: &CacheableTypes, naming: &KeyNaming) -> Result<()> {
    let mut owners = HashMap::<String, &str>::new();

    for declaration in types.iter() {
        let typename = declaration.typename();

        for key in [naming.read_key(typename), naming.remove_key(typename)] {
            if !is_graphql_name(&key) {
                return Err(Error::InvalidNaming(format!("{key} is not a valid field name")));
            }

            if let Some(first) = owners.insert(key.clone(), typename) {
                return Err(Error::KeyCollision {
                    key,
                    first: first.to_string(),
                    second: typename.to_string(),
                });
            }
        }
    }

    Ok(())
}

impl ListCache {
    pub fn builder(store: Arc<dyn Store>) -> ListCacheBuilder {
        ListCacheBuilder {
            store,
            declarations: Vec::new(),
            config: ListCacheConfig::default(),
            naming: None,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.inner.store
    }

    pub fn types(&self) -> &CacheableTypes {
        &self.inner.types
    }

    pub fn naming(&self) -> &KeyNaming {
        &self.inner.naming
    }

    /// Merges every listable entity found in `data` into the lists of their types.
    ///
    /// Returns the records that were written. Entities the store can't serve the declared
    /// fragment for yet are left out; malformed operations are errors.
    pub fn reconcile(&self, operation: &Operation, data: &Map<String, Value>) -> Result<IndexMap<String, ConnectionRecord>> {
        let _span = tracing::debug_span!(
            "reconcile_lists",
            operation = operation.operation_name.as_deref().unwrap_or_default()
        )
        .entered();

        let collector = self.collect(operation, data)?;
        if collector.is_empty() {
            return Ok(IndexMap::new());
        }

        let _guards = self.lock(collector.typenames());
        let records = synchronize(&collector, &self.inner.naming, |typename| self.read_stored(typename));
        self.write_records(records.iter().map(|(typename, record)| (typename.as_str(), record)))?;

        tracing::debug!("{} entities reconciled into {} lists", collector.len(), records.len());

        Ok(records)
    }

    /// Walks `data` along the selections of `operation` without touching any list.
    pub fn collect(&self, operation: &Operation, data: &Map<String, Value>) -> Result<EntityCollector> {
        let query = self.inner.store.transform_document(&operation.query);
        let document =
            cynic_parser::parse_executable_document(&query).map_err(|err| Error::InvalidOperation(err.to_string()))?;
        let definition = find_operation(&document, operation.operation_name.as_deref())?;
        let variables = definition.variables_with_defaults(&operation.variables);

        let ctx = WalkContext {
            fragments: fragment_map(&document),
            variables: &variables,
            declarations: &self.inner.types,
            store: self.inner.store.as_ref(),
        };

        let mut collector = EntityCollector::new();
        walk_selection_set(definition.selection_set(), data, &ctx, &mut collector)?;

        Ok(collector)
    }

    /// The list of `typename` with every node read through the declared fragment.
    ///
    /// Returns `None` for types without a declaration and an empty list when nothing usable is
    /// cached.
    pub fn read_list(&self, typename: &str) -> Option<ConnectionRecord<ListNode>> {
        let declaration = self.inner.types.get(typename)?;
        Some(self.read_list_or_empty(declaration))
    }

    pub(crate) fn read_list_or_empty(&self, declaration: &CacheableTypeDeclaration) -> ConnectionRecord<ListNode> {
        self.read_resolved(declaration)
            .unwrap_or_else(|| empty_connection(declaration.typename(), &self.inner.naming))
    }

    /// Reads the stored list and resolves its nodes. Any node that can't be read makes the
    /// whole list a miss.
    pub(crate) fn read_resolved(&self, declaration: &CacheableTypeDeclaration) -> Option<ConnectionRecord<ListNode>> {
        let stored = self.read_stored(declaration.typename())?;
        let fragment = declaration.fragment()?;

        let mut nodes = Vec::with_capacity(stored.total_count());
        for reference in stored.nodes() {
            match self.inner.store.read_fragment(reference.cache_key(), fragment) {
                Ok(Some(data)) => nodes.push(ListNode::new(reference.clone(), data)),
                Ok(None) => {
                    tracing::debug!(
                        "{} can't be read as {}, the list of {} is a miss",
                        reference.cache_key(),
                        declaration.fragment_name(),
                        declaration.typename()
                    );
                    return None;
                }
                Err(err) => {
                    tracing::warn!("error when reading {} from the store: {err}", reference.cache_key());
                    return None;
                }
            }
        }

        Some(stored.with_nodes(nodes))
    }

    /// Reads the list of `typename` as it is stored, nodes being plain references.
    pub(crate) fn read_stored(&self, typename: &str) -> Option<ConnectionRecord> {
        let key = self.inner.naming.read_key(typename);

        match self.inner.store.read_field(&key) {
            Ok(Some(value)) => serde_json::from_value(value)
                .map_err(|err| tracing::debug!("ignoring unreadable list under {key}: {err}"))
                .ok(),
            Ok(None) => None,
            Err(err) => {
                // We basically just log and then pretend this is a miss
                tracing::warn!("error when reading {key} from the store: {err}");
                None
            }
        }
    }

    pub(crate) fn write_records<'a>(&self, records: impl Iterator<Item = (&'a str, &'a ConnectionRecord)>) -> Result<()> {
        let mut data = Map::new();
        for (typename, record) in records {
            let value = serde_json::to_value(record).map_err(StoreError::from)?;
            data.insert(self.inner.naming.read_key(typename), value);
        }

        self.inner.store.write(data)?;

        Ok(())
    }

    /// Locks the lists of `typenames`, always in the same order.
    pub(crate) fn lock<'s, 'a>(&'s self, typenames: impl Iterator<Item = &'a str>) -> Vec<MutexGuard<'s, ()>> {
        let mut typenames = typenames.collect::<Vec<_>>();
        typenames.sort_unstable();
        typenames.dedup();

        typenames
            .into_iter()
            .filter_map(|typename| self.inner.locks.get(typename))
            .map(|lock| lock.lock().unwrap_or_else(PoisonError::into_inner))
            .collect()
    }
}

impl std::fmt::Debug for ListCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListCache")
            .field("types", &self.inner.types)
            .field("naming", &self.inner.naming)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeSet, thread};

    use serde_json::json;

    use super::*;
    use crate::InMemoryStore;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(object) => object,
            _ => unreachable!(),
        }
    }

    fn task_cache() -> (ListCache, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let cache = ListCache::builder(store.clone())
            .with_declaration("fragment TaskFields on Task { id }")
            .build()
            .unwrap();

        (cache, store)
    }

    fn reconcile_task(cache: &ListCache, store: &InMemoryStore, id: usize) {
        let data = object(json!({"task": {"id": id.to_string(), "__typename": "Task"}}));
        store.write_response(&data);
        cache.reconcile(&Operation::new("{ task { id } }"), &data).unwrap();
    }

    fn stored_ids(cache: &ListCache) -> BTreeSet<String> {
        cache
            .read_stored("Task")
            .map(|record| record.nodes().iter().map(|node| node.id().to_string()).collect())
            .unwrap_or_default()
    }

    fn builder() -> ListCacheBuilder {
        ListCache::builder(Arc::new(InMemoryStore::new()))
            .with_declarations(["fragment TaskFields on Task { id }", "fragment NoteFields on Note { id }"])
    }

    #[test]
    fn colliding_keys_are_rejected() {
        let error = builder()
            .with_naming(KeyNaming::default().with_read_key(|_| String::from("everything")))
            .build()
            .unwrap_err();

        insta::assert_snapshot!(error.to_string(), @"Key everything is generated for both Task and Note");
    }

    #[test]
    fn overridden_keys_must_be_field_names() {
        let error = builder()
            .with_naming(KeyNaming::default().with_remove_key(|typename| format!("remove {typename}")))
            .build()
            .unwrap_err();

        insta::assert_snapshot!(error.to_string(), @"Invalid key naming: remove Task is not a valid field name");
    }

    #[test]
    fn concurrent_reconciliations_keep_every_entity() {
        let (cache, store) = task_cache();

        thread::scope(|scope| {
            for id in 0..16 {
                let (cache, store) = (&cache, &store);
                scope.spawn(move || reconcile_task(cache, store, id));
            }
        });

        let record = cache.read_stored("Task").unwrap();
        assert_eq!(record.total_count(), 16);
        assert_eq!(stored_ids(&cache), (0..16).map(|id| id.to_string()).collect::<BTreeSet<_>>());
    }

    #[test]
    fn concurrent_removals_and_reconciliations() {
        let (cache, store) = task_cache();
        for id in 0..8 {
            reconcile_task(&cache, &store, id);
        }

        thread::scope(|scope| {
            for id in 0..8 {
                let (cache, store) = (&cache, &store);
                scope.spawn(move || {
                    assert!(cache.remove("Task", [id.to_string()]).unwrap());
                });
                scope.spawn(move || reconcile_task(cache, store, 100 + id));
            }
        });

        let record = cache.read_stored("Task").unwrap();
        assert_eq!(record.total_count(), 8);
        assert_eq!(
            stored_ids(&cache),
            (100..108).map(|id| id.to_string()).collect::<BTreeSet<_>>()
        );
    }

    #[test]
    fn variable_defaults_apply_to_directives() {
        let (cache, store) = task_cache();
        let data = object(json!({"items": [{"id": "1", "__typename": "Task"}]}));
        store.write_response(&data);

        let operation = Operation::new("query($v: Boolean = true) { items @include(if: $v) { id } }");
        cache.reconcile(&operation, &data).unwrap();
        assert_eq!(stored_ids(&cache), BTreeSet::from([String::from("1")]));

        let operation = Operation::new("query($v: Boolean = true) { other: items @include(if: $v) { id } }")
            .with_variables(object(json!({"v": false})));
        let collector = cache.collect(&operation, &object(json!({"other": [{"id": "1", "__typename": "Task"}]})));
        assert!(collector.unwrap().is_empty());
    }

    #[test]
    fn read_list_of_undeclared_type() {
        let cache = builder().build().unwrap();

        assert!(cache.read_list("User").is_none());

        let tasks = cache.read_list("Task").unwrap();
        assert_eq!(tasks.total_count(), 0);
        assert_eq!(tasks.typename(), "AllTaskConnection");
    }
}
