use std::fmt::{Display, Formatter as FmtFormatter, Result as FmtResult};

use graphql_parser::query as parser;
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

use super::{selection_set::SelectionSet, type_ref::TypeRef, value::Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    #[serde(rename = "query")]
    Query,
    #[serde(rename = "mutation")]
    Mutation,
    #[serde(rename = "subscription")]
    Subscription,
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        match self {
            OperationKind::Query => write!(f, "query"),
            OperationKind::Mutation => write!(f, "mutation"),
            OperationKind::Subscription => write!(f, "subscription"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDefinition {
    pub name: String,
    pub variable_type: TypeRef,
    pub default_value: Option<Value>,
}

impl Display for VariableDefinition {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        write!(f, "${}: {}", self.name, self.variable_type)?;
        if let Some(default_value) = &self.default_value {
            write!(f, " = {default_value}")?;
        }
        Ok(())
    }
}

impl From<&parser::VariableDefinition<'_, String>> for VariableDefinition {
    fn from(value: &parser::VariableDefinition<'_, String>) -> Self {
        VariableDefinition {
            name: value.name.clone(),
            variable_type: (&value.var_type).into(),
            default_value: value.default_value.as_ref().map(Value::from),
        }
    }
}

/// A single operation with every fragment spread inlined and every selection merged,
/// ready for planning.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedOperation {
    pub name: Option<String>,
    pub operation_kind: OperationKind,
    pub variable_definitions: Vec<VariableDefinition>,
    pub selection_set: SelectionSet,
}

impl NormalizedOperation {
    /// Stable fingerprint of the operation shape, used as the plan cache key.
    /// The operation name is not part of it.
    pub fn hash(&self) -> u64 {
        let mut printed = self.operation_kind.to_string();
        write_variable_definitions(&mut printed, self.variable_definitions.iter());
        printed.push_str(&self.selection_set.to_string());

        xxh3_64(printed.as_bytes())
    }

    pub fn variable_definition(&self, name: &str) -> Option<&VariableDefinition> {
        self.variable_definitions.iter().find(|v| v.name == name)
    }
}

pub(crate) fn write_variable_definitions<'a>(
    out: &mut String,
    definitions: impl Iterator<Item = &'a VariableDefinition>,
) {
    let printed = definitions
        .map(|definition| definition.to_string())
        .collect::<Vec<_>>();

    if !printed.is_empty() {
        out.push('(');
        out.push_str(&printed.join(", "));
        out.push(')');
    }
}

impl Display for NormalizedOperation {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        let mut header = self.operation_kind.to_string();
        if let Some(name) = &self.name {
            header.push(' ');
            header.push_str(name);
        }
        write_variable_definitions(&mut header, self.variable_definitions.iter());

        write!(f, "{header} {}", self.selection_set)
    }
}
