use cynic_parser::{executable::OperationDefinition, ExecutableDocument};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// An operation on its way to the transport.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    #[serde(default)]
    pub variables: Map<String, Value>,
}

impl Operation {
    pub fn new(query: impl Into<String>) -> Self {
        Operation {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_operation_name(mut self, operation_name: impl Into<String>) -> Self {
        self.operation_name = Some(operation_name.into());
        self
    }

    pub fn with_variables(mut self, variables: Map<String, Value>) -> Self {
        self.variables = variables;
        self
    }
}

/// A result produced by the transport for an [`Operation`].
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ExecutionResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<Value>,
}

impl ExecutionResult {
    pub fn data(data: Value) -> Self {
        ExecutionResult {
            data: Some(data),
            errors: Vec::new(),
        }
    }
}

/// The named operation, or the first one when no name is given.
pub(crate) fn find_operation<'a>(
    document: &'a ExecutableDocument,
    operation_name: Option<&str>,
) -> Result<OperationDefinition<'a>> {
    match operation_name {
        Some(name) => document
            .operations()
            .find(|operation| operation.name() == Some(name))
            .ok_or_else(|| Error::OperationNotFound(name.to_string())),
        None => document.operations().next().ok_or(Error::MissingOperation),
    }
}
