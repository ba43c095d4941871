use std::collections::HashSet;

use indexmap::IndexMap;

use crate::{CacheKey, ConnectionRecord, EntityCollector, EntityReference, KeyNaming};

/// Merges the collected entities into the previous list of each collected type.
///
/// `previous` returns the list currently stored for a type, if there is one. Every collected
/// type gets a whole new record: existing nodes keep their position, new ones are appended in
/// the order they were collected.
pub fn synchronize(
    collector: &EntityCollector,
    naming: &KeyNaming,
    mut previous: impl FnMut(&str) -> Option<ConnectionRecord>,
) -> IndexMap<String, ConnectionRecord> {
    collector
        .typenames()
        .map(|typename| {
            let previous = previous(typename).unwrap_or_else(|| empty_connection(typename, naming));
            let merged = merge(previous, collector.entities_of(typename));

            (typename.to_string(), merged)
        })
        .collect()
}

pub(crate) fn empty_connection<N>(typename: &str, naming: &KeyNaming) -> ConnectionRecord<N> {
    ConnectionRecord::empty(naming.connection_typename(typename), naming.read_key(typename))
}

fn merge<'a>(previous: ConnectionRecord, collected: impl Iterator<Item = &'a EntityReference>) -> ConnectionRecord {
    let mut seen = previous
        .nodes()
        .iter()
        .map(|node| node.cache_key().clone())
        .collect::<HashSet<CacheKey>>();

    let additions = collected
        .filter(|reference| seen.insert(reference.cache_key().clone()))
        .cloned()
        .collect::<Vec<_>>();

    let mut nodes = previous.nodes().to_vec();
    nodes.extend(additions);

    previous.with_nodes(nodes)
}
