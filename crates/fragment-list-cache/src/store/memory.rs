use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use cynic_parser::executable::{FieldSelection, FragmentDefinition, Selection};
use serde_json::{Map, Value};

use super::{CacheKey, Store};
use crate::{
    error::Error,
    operation::find_operation,
    parser_extensions::FieldExt,
    walker::{fragment_map, FragmentMap},
    Operation, StoreError,
};

type IdentifyFn = Box<dyn Fn(&Map<String, Value>) -> Option<CacheKey> + Send + Sync>;

/// A normalized store kept in memory.
///
/// Objects that can be identified are stored once under their [`CacheKey`] and linked from
/// their parents as `{"__ref": key}`. Fields are stored and read under their field name:
/// results of operations that alias fields go through [`InMemoryStore::write_operation`].
pub struct InMemoryStore {
    inner: RwLock<StoreInner>,
    identify: IdentifyFn,
}

#[derive(Default)]
struct StoreInner {
    root: Map<String, Value>,
    entities: HashMap<CacheKey, Map<String, Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the default `{__typename}:{id}` identity function.
    pub fn with_identify(
        identify: impl Fn(&Map<String, Value>) -> Option<CacheKey> + Send + Sync + 'static,
    ) -> Self {
        InMemoryStore {
            inner: RwLock::default(),
            identify: Box::new(identify),
        }
    }

    /// Normalizes an operation result into the store, storing every field under the key it
    /// arrives with. Only suited to results without aliases.
    pub fn write_response(&self, data: &Map<String, Value>) {
        let mut inner = self.write_lock();
        for (key, value) in data {
            let value = inner.normalize(value, &self.identify);
            inner.root.insert(key.clone(), value);
        }
    }

    /// Normalizes the result of `operation` into the store, following its selections so that
    /// aliased fields are stored under their field name.
    ///
    /// Fields missing from `data` are left untouched.
    pub fn write_operation(&self, operation: &Operation, data: &Map<String, Value>) -> crate::error::Result<()> {
        let document = cynic_parser::parse_executable_document(&operation.query)
            .map_err(|err| Error::InvalidOperation(err.to_string()))?;
        let definition = find_operation(&document, operation.operation_name.as_deref())?;
        let writer = SelectionWriter {
            fragments: fragment_map(&document),
            identify: &self.identify,
        };

        let mut root = Map::new();
        let mut inner = self.write_lock();
        writer.normalize_selected(&mut inner, data, definition.selection_set(), &mut root)?;
        inner.root.extend(root);

        Ok(())
    }

    /// Merges `fields` into the entity stored under `key`.
    pub fn write_entity(&self, key: CacheKey, fields: Map<String, Value>) {
        self.write_lock().entities.entry(key).or_default().extend(fields);
    }

    pub fn entity(&self, key: &CacheKey) -> Option<Map<String, Value>> {
        self.read_lock().entities.get(key).cloned()
    }

    fn read_lock(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_lock(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        InMemoryStore::with_identify(default_identify)
    }
}

/// Identifies objects carrying both a `__typename` and an `id`.
pub fn default_identify(object: &Map<String, Value>) -> Option<CacheKey> {
    let typename = object.get("__typename")?.as_str()?;
    let id = match object.get("id")? {
        Value::String(id) => id.clone(),
        Value::Number(id) => id.to_string(),
        _ => return None,
    };

    Some(CacheKey::new(format!("{typename}:{id}")))
}

impl StoreInner {
    fn normalize(&mut self, value: &Value, identify: &IdentifyFn) -> Value {
        match value {
            Value::Array(items) => Value::Array(items.iter().map(|item| self.normalize(item, identify)).collect()),
            Value::Object(object) => {
                let fields = object
                    .iter()
                    .map(|(key, value)| (key.clone(), self.normalize(value, identify)))
                    .collect::<Map<_, _>>();

                match identify(object) {
                    Some(key) => {
                        self.entities.entry(key.clone()).or_default().extend(fields);
                        reference(&key)
                    }
                    None => Value::Object(fields),
                }
            }
            scalar => scalar.clone(),
        }
    }

    fn read_object<'a>(
        &self,
        object: &Map<String, Value>,
        selections: impl Iterator<Item = Selection<'a>>,
    ) -> Option<Map<String, Value>> {
        let mut output = Map::new();
        self.collect_fields(object, selections, &mut output)?;
        Some(output)
    }

    fn collect_fields<'a>(
        &self,
        object: &Map<String, Value>,
        selections: impl Iterator<Item = Selection<'a>>,
        output: &mut Map<String, Value>,
    ) -> Option<()> {
        for selection in selections {
            match selection {
                Selection::Field(field) => {
                    let stored = object.get(field.name())?;
                    let value = if field.selection_set().len() == 0 {
                        stored.clone()
                    } else {
                        self.read_nested(stored, field)?
                    };
                    output.insert(field.response_key().to_string(), value);
                }
                Selection::InlineFragment(fragment) => self.collect_fields(object, fragment.selection_set(), output)?,
                Selection::FragmentSpread(spread) => {
                    self.collect_fields(object, spread.fragment()?.selection_set(), output)?
                }
            }
        }

        Some(())
    }

    fn read_nested(&self, stored: &Value, field: FieldSelection<'_>) -> Option<Value> {
        match stored {
            Value::Null => Some(Value::Null),
            Value::Array(items) => items
                .iter()
                .map(|item| self.read_nested(item, field))
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            Value::Object(object) => {
                let target = match object.get("__ref").and_then(Value::as_str) {
                    Some(key) => self.entities.get(&CacheKey::from(key))?,
                    None => object,
                };
                self.read_object(target, field.selection_set()).map(Value::Object)
            }
            _ => None,
        }
    }
}

struct SelectionWriter<'a, 'i> {
    fragments: FragmentMap<'a>,
    identify: &'i IdentifyFn,
}

impl<'a> SelectionWriter<'a, '_> {
    fn normalize_selected(
        &self,
        inner: &mut StoreInner,
        object: &Map<String, Value>,
        selections: impl Iterator<Item = Selection<'a>>,
        output: &mut Map<String, Value>,
    ) -> crate::error::Result<()> {
        for selection in selections {
            match selection {
                Selection::Field(field) => {
                    let Some(value) = object.get(field.response_key()) else {
                        continue;
                    };
                    let value = if field.selection_set().len() == 0 {
                        value.clone()
                    } else {
                        self.normalize_value(inner, value, field)?
                    };
                    output.insert(field.name().to_string(), value);
                }
                Selection::InlineFragment(fragment) => {
                    self.normalize_selected(inner, object, fragment.selection_set(), output)?
                }
                Selection::FragmentSpread(spread) => {
                    let fragment = self
                        .fragments
                        .get(spread.fragment_name())
                        .ok_or_else(|| Error::FragmentNotFound(spread.fragment_name().to_string()))?;
                    self.normalize_selected(inner, object, fragment.selection_set(), output)?
                }
            }
        }

        Ok(())
    }

    fn normalize_value(
        &self,
        inner: &mut StoreInner,
        value: &Value,
        field: FieldSelection<'a>,
    ) -> crate::error::Result<Value> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(|item| self.normalize_value(inner, item, field))
                .collect::<crate::error::Result<Vec<_>>>()
                .map(Value::Array),
            Value::Object(object) => {
                let mut fields = Map::new();
                if let Some(typename) = object.get("__typename") {
                    fields.insert(String::from("__typename"), typename.clone());
                }
                self.normalize_selected(inner, object, field.selection_set(), &mut fields)?;

                Ok(match (self.identify)(object) {
                    Some(key) => {
                        inner.entities.entry(key.clone()).or_default().extend(fields);
                        reference(&key)
                    }
                    None => Value::Object(fields),
                })
            }
            scalar => Ok(scalar.clone()),
        }
    }
}

fn reference(key: &CacheKey) -> Value {
    let mut object = Map::new();
    object.insert("__ref".to_string(), Value::String(key.to_string()));
    Value::Object(object)
}

impl Store for InMemoryStore {
    fn identify(&self, object: &Map<String, Value>) -> Option<CacheKey> {
        (self.identify)(object)
    }

    fn read_field(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.read_lock().root.get(key).cloned())
    }

    fn read_fragment(
        &self,
        key: &CacheKey,
        fragment: FragmentDefinition<'_>,
    ) -> Result<Option<Map<String, Value>>, StoreError> {
        let inner = self.read_lock();
        let Some(entity) = inner.entities.get(key) else {
            return Ok(None);
        };

        Ok(inner.read_object(entity, fragment.selection_set()))
    }

    fn write(&self, data: Map<String, Value>) -> Result<(), StoreError> {
        self.write_lock().root.extend(data);
        Ok(())
    }

    fn evict(&self, key: &CacheKey) -> Result<(), StoreError> {
        self.write_lock().entities.remove(key);
        Ok(())
    }
}
