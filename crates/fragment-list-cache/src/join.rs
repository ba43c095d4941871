use std::sync::Arc;

use serde_json::{Map, Value};

use crate::{
    error::Result, registry::ResolverArgs, synchronizer::empty_connection, ConnectionRecord, ListCache, ListNode,
    Resolver, StoreError,
};

/// How a child list is joined to its parent: `field` of every node must equal
/// `connection_id` of the parent.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JoinDescriptor {
    pub field: String,
    #[serde(default = "default_connection_id")]
    pub connection_id: String,
}

fn default_connection_id() -> String {
    String::from("id")
}

impl JoinDescriptor {
    pub fn new(field: impl Into<String>) -> Self {
        JoinDescriptor {
            field: field.into(),
            connection_id: default_connection_id(),
        }
    }

    pub fn with_connection_id(mut self, connection_id: impl Into<String>) -> Self {
        self.connection_id = connection_id.into();
        self
    }
}

/// A read-only view of the cached list of one type, filtered by a parent value.
#[derive(Clone, Debug)]
pub struct JoinAccessor {
    cache: ListCache,
    typename: String,
    descriptor: JoinDescriptor,
}

impl JoinAccessor {
    pub fn typename(&self) -> &str {
        &self.typename
    }

    pub fn descriptor(&self) -> &JoinDescriptor {
        &self.descriptor
    }

    /// The nodes of the cached list whose join field equals the parent's key.
    ///
    /// A parent without the key, or with a `null` one, joins nothing.
    pub fn resolve(&self, parent: &Map<String, Value>) -> ConnectionRecord<ListNode> {
        let list = match self.cache.types().get(&self.typename) {
            Some(declaration) => self.cache.read_list_or_empty(declaration),
            None => empty_connection(&self.typename, self.cache.naming()),
        };

        let key = match parent.get(&self.descriptor.connection_id) {
            None | Some(Value::Null) => {
                tracing::debug!(
                    "parent has no {}, nothing to join from {}",
                    self.descriptor.connection_id,
                    self.typename
                );
                return ConnectionRecord::empty(list.typename(), list.cache_node_id());
            }
            Some(key) => key,
        };

        let handle = format!("{}:{}:{}", list.cache_node_id(), self.descriptor.field, handle_part(key));
        let typename = list.typename().to_string();

        let nodes = list
            .into_nodes()
            .into_iter()
            .filter(|node| node.get(&self.descriptor.field) == Some(key))
            .collect();

        ConnectionRecord::new(typename, handle, nodes)
    }

    /// Wraps the accessor into a resolver reading the parent from `root_value`.
    pub fn into_resolver(self) -> Resolver {
        Arc::new(move |args: ResolverArgs<'_>| -> Result<Value> {
            let empty = Map::new();
            let parent = args.root_value.as_object().unwrap_or(&empty);

            Ok(serde_json::to_value(self.resolve(parent)).map_err(StoreError::from)?)
        })
    }
}

fn handle_part(key: &Value) -> String {
    match key {
        Value::String(key) => key.clone(),
        other => other.to_string(),
    }
}

impl ListCache {
    /// A join of the list of `typename` onto a parent type.
    pub fn join(&self, typename: impl Into<String>, descriptor: JoinDescriptor) -> JoinAccessor {
        JoinAccessor {
            cache: self.clone(),
            typename: typename.into(),
            descriptor,
        }
    }
}
