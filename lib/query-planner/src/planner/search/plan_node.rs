use std::rc::Rc;

use crate::ast::{selection_path::SelectionPath, selection_set::FieldSelection};

use super::{backlog::Backlog, fetch_step::FetchStepId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone)]
pub struct FieldPlanNode {
    /// The placed field, without sub-selections.
    pub field: FieldSelection,
    pub parent_path: SelectionPath,
    pub step: FetchStepId,
    /// Step opened to host this field.
    pub opened_step: Option<FetchStepId>,
    pub requirement_of: Option<FetchStepId>,
}

#[derive(Debug, Clone)]
pub struct InlineFragmentPlanNode {
    pub type_condition: String,
    pub parent_path: SelectionPath,
    /// `None` for fragments directly on the root type; they only scope their children.
    pub step: Option<FetchStepId>,
    pub requirement_of: Option<FetchStepId>,
}

#[derive(Debug, Clone)]
pub enum PlanNodeKind {
    Root,
    Field(FieldPlanNode),
    InlineFragment(InlineFragmentPlanNode),
}

impl PlanNodeKind {
    /// Step the selection landed in.
    pub fn step(&self) -> Option<FetchStepId> {
        match self {
            PlanNodeKind::Root => None,
            PlanNodeKind::Field(field) => Some(field.step),
            PlanNodeKind::InlineFragment(fragment) => fragment.step,
        }
    }

    pub fn requirement_of(&self) -> Option<FetchStepId> {
        match self {
            PlanNodeKind::Root => None,
            PlanNodeKind::Field(field) => field.requirement_of,
            PlanNodeKind::InlineFragment(fragment) => fragment.requirement_of,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlanNode {
    pub previous: Option<NodeId>,
    pub path: SelectionPath,
    pub kind: PlanNodeKind,
}

/// A plan node together with the search state of its branch.
#[derive(Debug, Clone)]
pub struct SelectionNode {
    pub node: PlanNode,
    /// Subgraph of the latest placement.
    pub schema_name: String,
    /// Subgraph the branch resolves top-level selections from.
    pub entry_schema: Rc<str>,
    pub path_cost: u64,
    /// Lower bound of what resolving the backlog still costs.
    pub estimate: u64,
    pub fetch_count: usize,
    /// Placements that left the subgraph of their parent selection.
    pub switches: usize,
    /// Requirement aliases handed out on this branch.
    pub aliases: u32,
    pub backlog: Backlog,
    /// Steps opened on this branch, in opening order.
    pub steps: Rc<Vec<FetchStepId>>,
}

impl SelectionNode {
    pub fn total_cost(&self) -> u64 {
        self.path_cost + self.estimate
    }

    pub fn is_terminal(&self) -> bool {
        self.backlog.is_empty()
    }
}
