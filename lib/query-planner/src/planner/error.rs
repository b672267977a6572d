use crate::{
    ast::{normalization::error::NormalizationError, selection_path::SelectionPath},
    schema::error::CompositeSchemaError,
    utils::cancellation::CancellationError,
};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlannerError {
    #[error("failed to build composite schema: {0}")]
    Schema(#[from] CompositeSchemaError),

    #[error("failed to normalize operation: {0}")]
    Normalization(#[from] NormalizationError),

    #[error("field '{coordinate}' at '{path}' cannot be resolved by any subgraph")]
    UnresolvableField {
        coordinate: String,
        path: SelectionPath,
    },

    #[error("invalid requirement '{requirement}' of '{coordinate}' in schema '{schema_name}': {reason}")]
    InvalidRequirementSelection {
        schema_name: String,
        coordinate: String,
        requirement: String,
        reason: String,
    },

    #[error("type '{type_name}' not found in composite schema")]
    UnknownType { type_name: String },

    #[error("field '{field_name}' not found in type '{type_name}'")]
    UnknownField {
        type_name: String,
        field_name: String,
    },

    #[error("execution plan contains a dependency cycle through schema '{schema_name}'")]
    CyclicDependency { schema_name: String },

    #[error(transparent)]
    Cancelled(#[from] CancellationError),

    #[error("failed to build a plan: nothing to fetch")]
    EmptyPlan,

    #[error("internal error: {0}")]
    Internal(String),
}

impl PlannerError {
    /// Cancellation depends on the call, everything else on the schema and operation.
    pub fn is_transient(&self) -> bool {
        matches!(self, PlannerError::Cancelled(_))
    }
}
