use std::hash::{Hash, Hasher};

use serde_json::{Map, Value};

use crate::CacheKey;

/// A link to an entity record in the store.
///
/// Two references are equal when they point at the same `id` of the same type. The cache key
/// doubles as the marker telling a reference apart from inline data.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct EntityReference {
    #[serde(rename = "__ref")]
    cache_key: CacheKey,
    id: String,
    #[serde(rename = "__typename")]
    typename: String,
}

impl EntityReference {
    pub fn new(cache_key: CacheKey, id: impl Into<String>, typename: impl Into<String>) -> Self {
        EntityReference {
            cache_key,
            id: id.into(),
            typename: typename.into(),
        }
    }

    pub fn cache_key(&self) -> &CacheKey {
        &self.cache_key
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn typename(&self) -> &str {
        &self.typename
    }
}

impl PartialEq for EntityReference {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.typename == other.typename
    }
}

impl Eq for EntityReference {}

impl Hash for EntityReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.typename.hash(state);
    }
}

/// An "all entities of one type" list as it is kept in the store.
///
/// `total_count` always matches the number of nodes: every constructor derives it.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRecord<N = EntityReference> {
    #[serde(rename = "__typename")]
    typename: String,
    #[serde(rename = "__cacheNodeId")]
    cache_node_id: String,
    total_count: usize,
    nodes: Vec<N>,
}

impl<N> ConnectionRecord<N> {
    pub fn new(typename: impl Into<String>, cache_node_id: impl Into<String>, nodes: Vec<N>) -> Self {
        ConnectionRecord {
            typename: typename.into(),
            cache_node_id: cache_node_id.into(),
            total_count: nodes.len(),
            nodes,
        }
    }

    pub fn empty(typename: impl Into<String>, cache_node_id: impl Into<String>) -> Self {
        Self::new(typename, cache_node_id, Vec::new())
    }

    /// The same list handle with other nodes.
    pub fn with_nodes<M>(self, nodes: Vec<M>) -> ConnectionRecord<M> {
        ConnectionRecord::new(self.typename, self.cache_node_id, nodes)
    }

    pub fn typename(&self) -> &str {
        &self.typename
    }

    pub fn cache_node_id(&self) -> &str {
        &self.cache_node_id
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn nodes(&self) -> &[N] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<N> {
        self.nodes
    }
}

impl<'de, N: serde::Deserialize<'de>> serde::Deserialize<'de> for ConnectionRecord<N> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // Stored counts are not trusted, the count is rebuilt from the nodes.
        #[derive(serde::Deserialize)]
        struct StoredRecord<N> {
            #[serde(rename = "__typename")]
            typename: String,
            #[serde(rename = "__cacheNodeId")]
            cache_node_id: String,
            #[serde(default = "Vec::new")]
            nodes: Vec<N>,
        }

        let StoredRecord {
            typename,
            cache_node_id,
            nodes,
        } = StoredRecord::<N>::deserialize(deserializer)?;

        Ok(ConnectionRecord::new(typename, cache_node_id, nodes))
    }
}

/// A list node resolved through its type's declared fragment.
///
/// Serializes as the fragment data alone.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ListNode {
    #[serde(skip)]
    reference: EntityReference,
    #[serde(flatten)]
    data: Map<String, Value>,
}

impl ListNode {
    pub(crate) fn new(reference: EntityReference, data: Map<String, Value>) -> Self {
        ListNode { reference, data }
    }

    pub fn reference(&self) -> &EntityReference {
        &self.reference
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn references_compare_by_id_and_type() {
        let a = EntityReference::new(CacheKey::from("Task:1"), "1", "Task");
        let b = EntityReference::new(CacheKey::from("tasks/1"), "1", "Task");
        let c = EntityReference::new(CacheKey::from("Note:1"), "1", "Note");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn record_serialization() {
        let record = ConnectionRecord::new(
            "AllTaskConnection",
            "allTask",
            vec![EntityReference::new(CacheKey::from("Task:1"), "1", "Task")],
        );

        insta::assert_json_snapshot!(record, @r###"
        {
          "__typename": "AllTaskConnection",
          "__cacheNodeId": "allTask",
          "totalCount": 1,
          "nodes": [
            {
              "__ref": "Task:1",
              "id": "1",
              "__typename": "Task"
            }
          ]
        }
        "###);
    }

    #[test]
    fn stored_count_is_rebuilt() {
        let record: ConnectionRecord = serde_json::from_value(json!({
            "__typename": "AllTaskConnection",
            "__cacheNodeId": "allTask",
            "totalCount": 12,
            "nodes": [{"__ref": "Task:1", "id": "1", "__typename": "Task"}]
        }))
        .unwrap();

        assert_eq!(record.total_count(), 1);
        assert_eq!(record.nodes().len(), 1);
    }
}
