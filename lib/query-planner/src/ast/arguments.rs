use std::{
    collections::BTreeSet,
    fmt::{Display, Formatter as FmtFormatter, Result as FmtResult},
};

use graphql_parser::query::Value as ParserValue;

use super::value::Value;

/// Field arguments in the order they were written.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ArgumentsMap {
    arguments: Vec<(String, Value)>,
}

impl From<&Vec<(String, ParserValue<'_, String>)>> for ArgumentsMap {
    fn from(args: &Vec<(String, ParserValue<'_, String>)>) -> Self {
        Self {
            arguments: args
                .iter()
                .map(|(key, value)| (key.to_string(), Value::from(value)))
                .collect(),
        }
    }
}

impl ArgumentsMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, replacing a previous value in place.
    pub fn add_argument(&mut self, key: String, value: Value) {
        match self.arguments.iter_mut().find(|(name, _)| *name == key) {
            Some((_, existing)) => *existing = value,
            None => self.arguments.push((key, value)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.arguments.iter().map(|(name, value)| (name, value))
    }

    pub fn variable_usages(&self, usages: &mut BTreeSet<String>) {
        for (_, value) in &self.arguments {
            value.variable_usages(usages);
        }
    }
}

impl Display for ArgumentsMap {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        if self.arguments.is_empty() {
            return Ok(());
        }

        write!(f, "(")?;
        for (i, (name, value)) in self.arguments.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        write!(f, ")")
    }
}
