use std::sync::Arc;

use cynic_parser::{executable::FragmentDefinition, ExecutableDocument};
use indexmap::{map::Entry, IndexMap};

use crate::error::{Error, Result};

/// Declares that entities of one type are kept in a list.
///
/// The fragment lists the fields an entity needs before it is "complete enough" to be listed.
#[derive(Clone)]
pub struct CacheableTypeDeclaration {
    typename: String,
    fragment_name: String,
    document: Arc<ExecutableDocument>,
}

impl CacheableTypeDeclaration {
    /// Parses a fragment document. Its first fragment definition is the declaration, any
    /// other fragment in the document can be spread from it.
    ///
    /// Returns `Ok(None)` for documents that do not define a fragment.
    pub fn parse(source: &str) -> Result<Option<Self>> {
        let document =
            cynic_parser::parse_executable_document(source).map_err(|err| Error::InvalidDeclaration(err.to_string()))?;

        let Some(fragment) = document.fragments().next() else {
            return Ok(None);
        };

        let typename = fragment.type_condition().to_string();
        let fragment_name = fragment.name().to_string();

        Ok(Some(CacheableTypeDeclaration {
            typename,
            fragment_name,
            document: Arc::new(document),
        }))
    }

    pub fn typename(&self) -> &str {
        &self.typename
    }

    pub fn fragment_name(&self) -> &str {
        &self.fragment_name
    }

    pub fn fragment(&self) -> Option<FragmentDefinition<'_>> {
        self.document
            .fragments()
            .find(|fragment| fragment.name() == self.fragment_name)
    }
}

impl std::fmt::Debug for CacheableTypeDeclaration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheableTypeDeclaration")
            .field("typename", &self.typename)
            .field("fragment_name", &self.fragment_name)
            .finish_non_exhaustive()
    }
}

/// The set of declarations, at most one per type name.
#[derive(Clone, Debug, Default)]
pub struct CacheableTypes {
    declarations: IndexMap<String, CacheableTypeDeclaration>,
}

impl CacheableTypes {
    pub fn parse<'a>(sources: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut declarations = IndexMap::new();

        for source in sources {
            let Some(declaration) = CacheableTypeDeclaration::parse(source)? else {
                tracing::debug!("skipping cacheable type document without a fragment definition");
                continue;
            };

            match declarations.entry(declaration.typename.clone()) {
                Entry::Occupied(entry) => return Err(Error::DuplicateDeclaration(entry.key().clone())),
                Entry::Vacant(entry) => {
                    entry.insert(declaration);
                }
            }
        }

        Ok(CacheableTypes { declarations })
    }

    pub fn get(&self, typename: &str) -> Option<&CacheableTypeDeclaration> {
        self.declarations.get(typename)
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &CacheableTypeDeclaration> + '_ {
        self.declarations.values()
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn declarations_by_typename() {
        let types = CacheableTypes::parse([
            "fragment TaskFields on Task { id title }",
            indoc! {r#"
                fragment UserFields on User {
                    id
                    ...UserName
                }

                fragment UserName on User {
                    name
                }
            "#},
        ])
        .unwrap();

        assert_eq!(types.len(), 2);

        let user = types.get("User").unwrap();
        assert_eq!(user.fragment_name(), "UserFields");
        assert_eq!(user.fragment().map(|fragment| fragment.type_condition()), Some("User"));
        assert!(types.get("Note").is_none());
    }

    #[test]
    fn documents_without_fragments_are_skipped() {
        let types = CacheableTypes::parse(["query { tasks { id } }"]).unwrap();

        assert!(types.is_empty());
    }

    #[test]
    fn duplicate_type_is_rejected() {
        let error = CacheableTypes::parse([
            "fragment TaskFields on Task { id title }",
            "fragment TaskSummary on Task { id }",
        ])
        .unwrap_err();

        insta::assert_snapshot!(error.to_string(), @"Type Task has more than one cacheable type declaration");
    }

    #[test]
    fn parse_errors_are_reported() {
        let error = CacheableTypes::parse(["fragment TaskFields on Task { id"]).unwrap_err();

        assert!(matches!(error, Error::InvalidDeclaration(_)));
    }
}
