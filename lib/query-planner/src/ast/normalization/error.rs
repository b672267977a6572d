#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NormalizationError {
    #[error("Document does not contain an operation to execute; {reason}.")]
    MissingOperationToExecute { reason: String },

    #[error("Specified operation '{operation_name}' not found.")]
    OperationNotFound { operation_name: String },

    #[error("Schema does not define a root type for '{operation_kind}' operations.")]
    MissingRootType { operation_kind: String },

    #[error("Schema type '{type_name}' not found.")]
    UnknownType { type_name: String },

    #[error("Field '{field_name}' not found in type '{type_name}'.")]
    UnknownField {
        field_name: String,
        type_name: String,
    },

    #[error("Fragment definition for '{fragment_name}' not found.")]
    FragmentNotFound { fragment_name: String },

    #[error("Fragment '{fragment_name}' spreads itself.")]
    FragmentCycle { fragment_name: String },

    #[error("Unsupported selection at '{coordinate}': {reason}")]
    UnsupportedSelection { coordinate: String, reason: String },
}
