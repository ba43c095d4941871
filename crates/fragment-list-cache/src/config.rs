use std::{fmt, sync::Arc};

use crate::error::{Error, Result};

const TYPENAME_PLACEHOLDER: &str = "{typename}";

/// Naming templates for the fields and types this crate registers.
///
/// `{typename}` in a template is replaced with the entity type name.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListCacheConfig {
    /// Root field holding the list of a type, and the name of its read resolver.
    /// Defaults to `all{typename}`.
    pub read_key: String,
    /// Name of the remove resolver. Defaults to `remove{typename}`.
    pub remove_key: String,
    /// `__typename` of list records. Defaults to `All{typename}Connection`.
    pub connection_typename: String,
}

impl Default for ListCacheConfig {
    fn default() -> Self {
        Self {
            read_key: String::from("all{typename}"),
            remove_key: String::from("remove{typename}"),
            connection_typename: String::from("All{typename}Connection"),
        }
    }
}

type NameFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// The naming functions in use, built from a [`ListCacheConfig`] and overridable one by one.
#[derive(Clone)]
pub struct KeyNaming {
    read_key: NameFn,
    remove_key: NameFn,
    connection_typename: NameFn,
}

impl KeyNaming {
    pub fn from_config(config: &ListCacheConfig) -> Result<Self> {
        Ok(KeyNaming {
            read_key: template("read_key", &config.read_key)?,
            remove_key: template("remove_key", &config.remove_key)?,
            connection_typename: template("connection_typename", &config.connection_typename)?,
        })
    }

    pub fn with_read_key(self, read_key: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        KeyNaming {
            read_key: Arc::new(read_key),
            ..self
        }
    }

    pub fn with_remove_key(self, remove_key: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        KeyNaming {
            remove_key: Arc::new(remove_key),
            ..self
        }
    }

    pub fn with_connection_typename(
        self,
        connection_typename: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        KeyNaming {
            connection_typename: Arc::new(connection_typename),
            ..self
        }
    }

    pub fn read_key(&self, typename: &str) -> String {
        (self.read_key)(typename)
    }

    pub fn remove_key(&self, typename: &str) -> String {
        (self.remove_key)(typename)
    }

    pub fn connection_typename(&self, typename: &str) -> String {
        (self.connection_typename)(typename)
    }
}

impl Default for KeyNaming {
    fn default() -> Self {
        let config = ListCacheConfig::default();
        KeyNaming {
            read_key: render(config.read_key),
            remove_key: render(config.remove_key),
            connection_typename: render(config.connection_typename),
        }
    }
}

impl fmt::Debug for KeyNaming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyNaming")
            .field("read_key", &self.read_key("T"))
            .field("remove_key", &self.remove_key("T"))
            .field("connection_typename", &self.connection_typename("T"))
            .finish()
    }
}

fn template(option: &str, template: &str) -> Result<NameFn> {
    if !template.contains(TYPENAME_PLACEHOLDER) {
        return Err(Error::InvalidNaming(format!(
            "{option} must contain the {TYPENAME_PLACEHOLDER} placeholder, got \"{template}\""
        )));
    }

    let rendered = template.replace(TYPENAME_PLACEHOLDER, "T");
    if !is_graphql_name(&rendered) {
        return Err(Error::InvalidNaming(format!(
            "{option} must render to a GraphQL name, got \"{template}\""
        )));
    }

    Ok(render(template.to_string()))
}

fn render(template: String) -> NameFn {
    Arc::new(move |typename| template.replace(TYPENAME_PLACEHOLDER, typename))
}

pub(crate) fn is_graphql_name(name: &str) -> bool {
    let mut chars = name.chars();

    chars
        .next()
        .is_some_and(|first| first == '_' || first.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}
