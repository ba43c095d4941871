use cynic_parser::{
    executable::{Directive, FieldSelection, FragmentSpread, InlineFragment, OperationDefinition},
    ConstValue, Value,
};
use serde_json::Map;

use crate::error::{Error, Result};

pub trait FieldExt<'a> {
    fn response_key(&self) -> &'a str;
}

impl<'a> FieldExt<'a> for FieldSelection<'a> {
    fn response_key(&self) -> &'a str {
        self.alias().unwrap_or(self.name())
    }
}

/// Evaluates `@skip` and `@include` on a selection.
pub trait IncludeExt {
    fn should_include(&self, variables: &Map<String, serde_json::Value>) -> Result<bool>;
}

impl IncludeExt for FieldSelection<'_> {
    fn should_include(&self, variables: &Map<String, serde_json::Value>) -> Result<bool> {
        should_include(self.directives(), variables)
    }
}

impl IncludeExt for FragmentSpread<'_> {
    fn should_include(&self, variables: &Map<String, serde_json::Value>) -> Result<bool> {
        should_include(self.directives(), variables)
    }
}

impl IncludeExt for InlineFragment<'_> {
    fn should_include(&self, variables: &Map<String, serde_json::Value>) -> Result<bool> {
        should_include(self.directives(), variables)
    }
}

pub trait OperationExt {
    /// The operation variables, completed with the default values of the variables that were
    /// not provided.
    fn variables_with_defaults(&self, provided: &Map<String, serde_json::Value>) -> Map<String, serde_json::Value>;
}

impl OperationExt for OperationDefinition<'_> {
    fn variables_with_defaults(&self, provided: &Map<String, serde_json::Value>) -> Map<String, serde_json::Value> {
        let mut variables = provided.clone();

        for definition in self.variable_definitions() {
            if variables.contains_key(definition.name()) {
                continue;
            }
            if let Some(default) = definition.default_value() {
                variables.insert(definition.name().to_string(), const_to_json(default));
            }
        }

        variables
    }
}

fn const_to_json(value: ConstValue<'_>) -> serde_json::Value {
    match value {
        ConstValue::Int(value) => serde_json::Value::from(value.as_i64()),
        ConstValue::Float(value) => serde_json::Number::from_f64(value.value())
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ConstValue::String(value) => serde_json::Value::from(value.value()),
        ConstValue::Boolean(value) => serde_json::Value::Bool(value.value()),
        ConstValue::Null(_) => serde_json::Value::Null,
        ConstValue::Enum(value) => serde_json::Value::from(value.name()),
        ConstValue::List(list) => list.items().map(const_to_json).collect(),
        ConstValue::Object(object) => serde_json::Value::Object(
            object
                .fields()
                .map(|field| (field.name().to_string(), const_to_json(field.value())))
                .collect(),
        ),
    }
}

fn should_include<'a>(
    directives: impl Iterator<Item = Directive<'a>>,
    variables: &Map<String, serde_json::Value>,
) -> Result<bool> {
    for directive in directives {
        let skip_when = match directive.name() {
            "skip" => true,
            "include" => false,
            _ => continue,
        };

        if condition(directive, variables)? == skip_when {
            return Ok(false);
        }
    }

    Ok(true)
}

fn condition(directive: Directive<'_>, variables: &Map<String, serde_json::Value>) -> Result<bool> {
    let name = directive.name();
    let argument = directive
        .arguments()
        .find(|argument| argument.name() == "if")
        .ok_or_else(|| Error::invalid_directive(name, "missing argument if"))?;

    match argument.value() {
        Value::Boolean(value) => Ok(value.value()),
        Value::Variable(variable) => variables
            .get(variable.name())
            .and_then(serde_json::Value::as_bool)
            .ok_or_else(|| Error::invalid_directive(name, format!("variable ${} is not a boolean", variable.name()))),
        _ => Err(Error::invalid_directive(name, "argument if must be a boolean")),
    }
}
