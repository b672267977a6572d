#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompositeSchemaError {
    #[error("Failed to parse composite schema: {0}")]
    Parse(String),

    #[error("Composite schema does not define a query type.")]
    MissingQueryType,

    #[error("Directive '@{directive}' on '{coordinate}' is missing argument '{argument}'.")]
    MissingDirectiveArgument {
        directive: String,
        argument: String,
        coordinate: String,
    },

    #[error("Invalid selection '{selection}' in '@{directive}' on '{coordinate}': {reason}")]
    InvalidSelection {
        directive: String,
        coordinate: String,
        selection: String,
        reason: String,
    },

    #[error("Directive '@{directive}' on '{coordinate}' references schema '{schema_name}', which does not resolve the field.")]
    UnknownSourceSchema {
        directive: String,
        coordinate: String,
        schema_name: String,
    },
}
