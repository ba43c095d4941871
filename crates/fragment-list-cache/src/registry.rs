use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::{
    error::{Error, Result},
    walker::entity_id,
    ListCache, StoreError,
};

/// What a resolver is invoked with.
#[derive(Clone, Copy, Debug)]
pub struct ResolverArgs<'a> {
    /// The parent value of the resolved field, `null` for root fields.
    pub root_value: &'a Value,
    pub arguments: &'a Map<String, Value>,
}

impl<'a> ResolverArgs<'a> {
    pub fn new(root_value: &'a Value, arguments: &'a Map<String, Value>) -> Self {
        ResolverArgs { root_value, arguments }
    }
}

pub type Resolver = Arc<dyn Fn(ResolverArgs<'_>) -> Result<Value> + Send + Sync>;

/// Resolvers for the list fields of every cacheable type, keyed by field name.
#[derive(Clone, Default)]
pub struct ResolverRegistry {
    query: IndexMap<String, Resolver>,
    mutation: IndexMap<String, Resolver>,
}

impl ResolverRegistry {
    /// Read resolvers, one per cacheable type under its read key.
    pub fn query_resolvers(&self) -> &IndexMap<String, Resolver> {
        &self.query
    }

    /// Remove resolvers, one per cacheable type under its remove key.
    pub fn mutation_resolvers(&self) -> &IndexMap<String, Resolver> {
        &self.mutation
    }

    /// Runs the query resolver registered for `field`, `None` if there is none.
    pub fn resolve_query(&self, field: &str, args: ResolverArgs<'_>) -> Option<Result<Value>> {
        self.query.get(field).map(|resolver| resolver(args))
    }

    pub fn resolve_mutation(&self, field: &str, args: ResolverArgs<'_>) -> Option<Result<Value>> {
        self.mutation.get(field).map(|resolver| resolver(args))
    }

    /// Registers an additional query resolver, e.g. a join.
    pub fn with_query_resolver(mut self, field: impl Into<String>, resolver: Resolver) -> Self {
        self.query.insert(field.into(), resolver);
        self
    }
}

impl std::fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverRegistry")
            .field("query", &self.query.keys().collect::<Vec<_>>())
            .field("mutation", &self.mutation.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ListCache {
    /// Builds the read and remove resolvers of every declared type.
    pub fn resolvers(&self) -> ResolverRegistry {
        let mut registry = ResolverRegistry::default();

        for declaration in self.types().iter() {
            let typename = declaration.typename().to_string();

            let cache = self.clone();
            let read_typename = typename.clone();
            let read: Resolver = Arc::new(move |_: ResolverArgs<'_>| -> Result<Value> {
                let record = cache.read_list(&read_typename);
                Ok(serde_json::to_value(record).map_err(StoreError::from)?)
            });

            let cache = self.clone();
            let remove_typename = typename.clone();
            let remove: Resolver = Arc::new(move |args: ResolverArgs<'_>| -> Result<Value> {
                let ids = id_argument(args.arguments)?;
                cache.remove(&remove_typename, ids).map(Value::Bool)
            });

            registry.query.insert(self.naming().read_key(&typename), read);
            registry.mutation.insert(self.naming().remove_key(&typename), remove);
        }

        registry
    }
}

/// The `id` argument of a remove resolver, a single id or a list of ids.
fn id_argument(arguments: &Map<String, Value>) -> Result<Vec<String>> {
    let invalid = |message: &str| Error::InvalidArgument {
        name: String::from("id"),
        message: message.to_string(),
    };

    match arguments.get("id") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| entity_id(item).ok_or_else(|| invalid("expected a list of strings or numbers")))
            .collect(),
        Some(value) => entity_id(value)
            .map(|id| vec![id])
            .ok_or_else(|| invalid("expected a string, a number or a list of them")),
    }
}
