//! Walks a result tree along the selections that produced it and collects the entities that
//! can be listed.

use std::collections::HashMap;

use cynic_parser::{
    executable::{FieldSelection, FragmentDefinition, Selection},
    ExecutableDocument,
};
use serde_json::{Map, Value};

use crate::{
    error::{Error, Result},
    parser_extensions::{FieldExt, IncludeExt},
    CacheableTypes, EntityCollector, EntityReference, Store,
};

pub(crate) type FragmentMap<'a> = HashMap<&'a str, FragmentDefinition<'a>>;

pub(crate) fn fragment_map(document: &ExecutableDocument) -> FragmentMap<'_> {
    document
        .fragments()
        .map(|fragment| (fragment.name(), fragment))
        .collect()
}

pub(crate) struct WalkContext<'a> {
    pub fragments: FragmentMap<'a>,
    pub variables: &'a Map<String, Value>,
    pub declarations: &'a CacheableTypes,
    pub store: &'a dyn Store,
}

/// The shape of a field value, as far as the walk is concerned.
enum Shape<'v> {
    /// Leaf fields, `null`, and values that don't match the field's selection set.
    Scalar,
    List(&'v [Value]),
    Object(&'v Map<String, Value>),
}

impl<'v> Shape<'v> {
    fn of(field: FieldSelection<'_>, value: &'v Value) -> Self {
        if field.selection_set().len() == 0 {
            return Shape::Scalar;
        }

        match value {
            Value::Array(items) => Shape::List(items),
            Value::Object(object) => Shape::Object(object),
            Value::Null => Shape::Scalar,
            _ => {
                tracing::debug!(
                    "field {} has a selection set but its value is a scalar, skipping it",
                    field.response_key()
                );
                Shape::Scalar
            }
        }
    }
}

pub(crate) fn walk_selection_set<'a>(
    selections: impl Iterator<Item = Selection<'a>>,
    object: &Map<String, Value>,
    ctx: &WalkContext<'a>,
    collector: &mut EntityCollector,
) -> Result<()> {
    for selection in selections {
        match selection {
            Selection::Field(field) => {
                if !field.should_include(ctx.variables)? {
                    continue;
                }
                let Some(value) = object.get(field.response_key()) else {
                    continue;
                };
                walk_field_value(field, value, ctx, collector)?;
            }
            Selection::InlineFragment(fragment) => {
                if !fragment.should_include(ctx.variables)? {
                    continue;
                }
                walk_selection_set(fragment.selection_set(), object, ctx, collector)?;
            }
            Selection::FragmentSpread(spread) => {
                if !spread.should_include(ctx.variables)? {
                    continue;
                }
                let fragment = ctx
                    .fragments
                    .get(spread.fragment_name())
                    .ok_or_else(|| Error::FragmentNotFound(spread.fragment_name().to_string()))?;
                walk_selection_set(fragment.selection_set(), object, ctx, collector)?;
            }
        }
    }

    Ok(())
}

fn walk_field_value<'a>(
    field: FieldSelection<'a>,
    value: &Value,
    ctx: &WalkContext<'a>,
    collector: &mut EntityCollector,
) -> Result<()> {
    match Shape::of(field, value) {
        Shape::Scalar => Ok(()),
        Shape::List(items) => items
            .iter()
            .try_for_each(|item| walk_field_value(field, item, ctx, collector)),
        Shape::Object(object) => {
            walk_selection_set(field.selection_set(), object, ctx, collector)?;
            collect_entity(object, ctx, collector);
            Ok(())
        }
    }
}

/// Adds `object` to the collector if its type is declared cacheable and the store can already
/// serve the declared fragment for it.
fn collect_entity(object: &Map<String, Value>, ctx: &WalkContext<'_>, collector: &mut EntityCollector) {
    let Some(cache_key) = ctx.store.identify(object) else {
        return;
    };
    let Some(typename) = object.get("__typename").and_then(Value::as_str) else {
        return;
    };
    let Some(declaration) = ctx.declarations.get(typename) else {
        return;
    };
    let Some(fragment) = declaration.fragment() else {
        return;
    };
    let Some(id) = object.get("id").and_then(entity_id) else {
        tracing::debug!("{cache_key} has no usable id, it can't be listed");
        return;
    };

    match ctx.store.read_fragment(&cache_key, fragment) {
        Ok(Some(_)) => collector.insert(EntityReference::new(cache_key, id, typename)),
        Ok(None) => tracing::trace!("{cache_key} can't be read as {} yet", declaration.fragment_name()),
        Err(error) => tracing::warn!("error when reading {cache_key} from the store: {error}"),
    }
}

pub(crate) fn entity_id(value: &Value) -> Option<String> {
    match value {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use serde_json::json;

    use super::*;
    use crate::{CacheKey, InMemoryStore};

    struct Fixture {
        store: InMemoryStore,
        types: CacheableTypes,
    }

    impl Fixture {
        fn new(declarations: &[&str]) -> Self {
            Fixture {
                store: InMemoryStore::new(),
                types: CacheableTypes::parse(declarations.iter().copied()).unwrap(),
            }
        }

        fn collect(&self, query: &str, data: Value, variables: Value) -> Result<EntityCollector> {
            let document = cynic_parser::parse_executable_document(query).unwrap();
            let operation = document.operations().next().unwrap();
            let (Value::Object(data), Value::Object(variables)) = (data, variables) else {
                unreachable!()
            };

            self.store.write_response(&data);

            let ctx = WalkContext {
                fragments: fragment_map(&document),
                variables: &variables,
                declarations: &self.types,
                store: &self.store,
            };
            let mut collector = EntityCollector::new();
            walk_selection_set(operation.selection_set(), &data, &ctx, &mut collector)?;

            Ok(collector)
        }
    }

    fn ids(collector: &EntityCollector, typename: &str) -> Vec<String> {
        collector
            .entities_of(typename)
            .map(|reference| reference.id().to_string())
            .collect()
    }

    #[test]
    fn collects_list_items() {
        let fixture = Fixture::new(&["fragment TaskFields on Task { id title }"]);

        let collector = fixture
            .collect(
                "{ items { id title } }",
                json!({"items": [
                    {"id": "1", "__typename": "Task", "title": "a"},
                    {"id": "2", "__typename": "Task", "title": "b"}
                ]}),
                json!({}),
            )
            .unwrap();

        assert_eq!(ids(&collector, "Task"), ["1", "2"]);
        assert_eq!(
            collector.entities_of("Task").next().map(|reference| reference.cache_key().clone()),
            Some(CacheKey::from("Task:1"))
        );
    }

    #[test]
    fn descends_into_nested_objects_lists_and_aliases() {
        let fixture = Fixture::new(&[
            "fragment TaskFields on Task { id }",
            "fragment UserFields on User { id name }",
        ]);

        let collector = fixture
            .collect(
                indoc! {r#"
                    {
                        me: viewer {
                            id
                            name
                            board { columns { tasks { id } } }
                        }
                    }
                "#},
                json!({"me": {
                    "id": 9,
                    "__typename": "User",
                    "name": "ada",
                    "board": {"__typename": "Board", "columns": [
                        {"tasks": [{"id": "1", "__typename": "Task"}, null]},
                        {"tasks": [[{"id": "2", "__typename": "Task"}]]}
                    ]}
                }}),
                json!({}),
            )
            .unwrap();

        assert_eq!(ids(&collector, "Task"), ["1", "2"]);
        assert_eq!(ids(&collector, "User"), ["9"]);
    }

    #[test]
    fn skips_entities_the_fragment_cannot_be_read_for() {
        let fixture = Fixture::new(&["fragment TaskFields on Task { id title done }"]);

        let collector = fixture
            .collect(
                "{ items { id title } }",
                json!({"items": [{"id": "1", "__typename": "Task", "title": "a"}]}),
                json!({}),
            )
            .unwrap();

        assert!(collector.is_empty());
    }

    #[test]
    fn ignores_undeclared_and_unidentifiable_objects() {
        let fixture = Fixture::new(&["fragment TaskFields on Task { id }"]);

        let collector = fixture
            .collect(
                "{ notes { id } summary { count } tags }",
                json!({
                    "notes": [{"id": "1", "__typename": "Note"}],
                    "summary": {"count": 3},
                    "tags": ["a", "b"]
                }),
                json!({}),
            )
            .unwrap();

        assert!(collector.is_empty());
    }

    #[test]
    fn resolves_fragments_against_the_same_object() {
        let fixture = Fixture::new(&["fragment TaskFields on Task { id }"]);

        let collector = fixture
            .collect(
                indoc! {r#"
                    query {
                        ...Items
                        ... on Query { other { id } }
                    }

                    fragment Items on Query {
                        items { id }
                    }
                "#},
                json!({
                    "items": [{"id": "1", "__typename": "Task"}],
                    "other": {"id": "2", "__typename": "Task"}
                }),
                json!({}),
            )
            .unwrap();

        assert_eq!(ids(&collector, "Task"), ["1", "2"]);
    }

    #[test]
    fn honors_inclusion_directives() {
        let fixture = Fixture::new(&["fragment TaskFields on Task { id }"]);

        let collector = fixture
            .collect(
                "query($withDone: Boolean!) { open { id } done @include(if: $withDone) { id } }",
                json!({
                    "open": [{"id": "1", "__typename": "Task"}],
                    "done": [{"id": "2", "__typename": "Task"}]
                }),
                json!({"withDone": false}),
            )
            .unwrap();

        assert_eq!(ids(&collector, "Task"), ["1"]);
    }

    #[test]
    fn tolerates_shape_mismatches() {
        let fixture = Fixture::new(&["fragment TaskFields on Task { id }"]);

        let collector = fixture
            .collect(
                "{ items { id } task { id } }",
                json!({"items": "not a list", "task": {"id": "3", "__typename": "Task"}}),
                json!({}),
            )
            .unwrap();

        assert_eq!(ids(&collector, "Task"), ["3"]);
    }

    #[test]
    fn unknown_fragment_is_an_error() {
        let fixture = Fixture::new(&["fragment TaskFields on Task { id }"]);

        let error = fixture
            .collect("{ ...Missing }", json!({"items": []}), json!({}))
            .unwrap_err();

        insta::assert_snapshot!(error.to_string(), @"No fragment named Missing.");
    }
}
