use std::fmt::{Display, Formatter as FmtFormatter, Result as FmtResult};

use crate::ast::{selection_item::SelectionItem, selection_path::SelectionPath, type_ref::TypeRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FetchStepId(pub usize);

impl Display for FetchStepId {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        write!(f, "#{}", self.0)
    }
}

/// Ties one subgraph argument to the selection whose value feeds it.
#[derive(Debug, Clone, PartialEq)]
pub struct RequirementBinding {
    pub argument: String,
    pub argument_type: TypeRef,
    pub selection: SelectionItem,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LookupBinding {
    pub field_name: String,
    pub bindings: Vec<RequirementBinding>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchStepKind {
    /// Selections on the operation root type.
    Root,
    /// Entity fetch through a lookup field, keyed by data of the parent step.
    Lookup(LookupBinding),
}

/// A future execution node, as seen by the search.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchStep {
    pub schema_name: String,
    pub parent: Option<FetchStepId>,
    /// Response position the step's selections are relative to.
    pub path: SelectionPath,
    pub type_name: String,
    pub kind: FetchStepKind,
    /// Opened for a single field with requirements; nothing else may join it.
    pub exclusive: bool,
    /// Response key of the field an exclusive step was opened for.
    pub opened_for: Option<String>,
    pub field_bindings: Vec<RequirementBinding>,
    /// Mutation root steps run in document order.
    pub previous_root: Option<FetchStepId>,
}

impl FetchStep {
    pub fn is_root(&self) -> bool {
        matches!(self.kind, FetchStepKind::Root)
    }

    pub fn is_joinable(&self) -> bool {
        !self.exclusive
    }

    pub fn lookup(&self) -> Option<&LookupBinding> {
        match &self.kind {
            FetchStepKind::Lookup(lookup) => Some(lookup),
            FetchStepKind::Root => None,
        }
    }

    /// Key bindings followed by field requirement bindings.
    pub fn requirement_bindings(&self) -> impl Iterator<Item = &RequirementBinding> {
        self.lookup()
            .into_iter()
            .flat_map(|lookup| lookup.bindings.iter())
            .chain(self.field_bindings.iter())
    }
}
