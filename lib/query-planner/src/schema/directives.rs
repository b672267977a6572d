use graphql_parser::schema::{Directive, Value};

use super::error::CompositeSchemaError;

/// A fusion composition directive that can be read off a field definition.
pub trait FusionDirective: Sized {
    const NAME: &'static str;

    fn is(directive: &Directive<'_, String>) -> bool {
        directive.name == Self::NAME
    }

    fn parse(directive: &Directive<'_, String>, coordinate: &str)
        -> Result<Self, CompositeSchemaError>;
}

fn string_argument(directive: &Directive<'_, String>, name: &str) -> Option<String> {
    directive
        .arguments
        .iter()
        .find(|(arg_name, _)| arg_name == name)
        .and_then(|(_, value)| match value {
            Value::String(value) | Value::Enum(value) => Some(value.clone()),
            _ => None,
        })
}

fn required_string_argument(
    directive: &Directive<'_, String>,
    name: &str,
    coordinate: &str,
) -> Result<String, CompositeSchemaError> {
    string_argument(directive, name).ok_or_else(|| CompositeSchemaError::MissingDirectiveArgument {
        directive: directive.name.clone(),
        argument: name.to_string(),
        coordinate: coordinate.to_string(),
    })
}

/// `@fusion__field(schema: String!)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FusionFieldDirective {
    pub schema: String,
}

impl FusionDirective for FusionFieldDirective {
    const NAME: &'static str = "fusion__field";

    fn parse(
        directive: &Directive<'_, String>,
        coordinate: &str,
    ) -> Result<Self, CompositeSchemaError> {
        Ok(Self {
            schema: required_string_argument(directive, "schema", coordinate)?,
        })
    }
}

/// `@fusion__requires(schema: String!, requirements: String!, map: [String!])`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FusionRequiresDirective {
    pub schema: String,
    pub requirements: String,
    pub map: Option<Vec<String>>,
}

impl FusionDirective for FusionRequiresDirective {
    const NAME: &'static str = "fusion__requires";

    fn parse(
        directive: &Directive<'_, String>,
        coordinate: &str,
    ) -> Result<Self, CompositeSchemaError> {
        let map = directive
            .arguments
            .iter()
            .find(|(arg_name, _)| arg_name == "map")
            .and_then(|(_, value)| match value {
                Value::List(items) => Some(
                    items
                        .iter()
                        .filter_map(|item| match item {
                            Value::String(value) => Some(value.clone()),
                            _ => None,
                        })
                        .collect(),
                ),
                // a single string coerces to a one element list
                Value::String(value) => Some(vec![value.clone()]),
                _ => None,
            });

        Ok(Self {
            schema: required_string_argument(directive, "schema", coordinate)?,
            requirements: required_string_argument(directive, "requirements", coordinate)?,
            map,
        })
    }
}

/// `@fusion__lookup(schema: String!, key: String!)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FusionLookupDirective {
    pub schema: String,
    pub key: String,
}

impl FusionDirective for FusionLookupDirective {
    const NAME: &'static str = "fusion__lookup";

    fn parse(
        directive: &Directive<'_, String>,
        coordinate: &str,
    ) -> Result<Self, CompositeSchemaError> {
        Ok(Self {
            schema: required_string_argument(directive, "schema", coordinate)?,
            key: required_string_argument(directive, "key", coordinate)?,
        })
    }
}
