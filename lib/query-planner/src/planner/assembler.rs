use std::collections::BTreeSet;

use petgraph::{
    algo::toposort,
    graph::{DiGraph, NodeIndex},
    Direction,
};
use rustc_hash::FxHashMap;
use tracing::{debug, instrument};

use crate::ast::{
    arguments::ArgumentsMap,
    operation::{write_variable_definitions, NormalizedOperation, VariableDefinition},
    selection_item::SelectionItem,
    selection_set::{FieldSelection, InlineFragmentSelection, SelectionSet},
    value::Value,
};

use super::{
    error::PlannerError,
    plan_nodes::{OperationExecutionNode, OperationPlan, OperationRequirement},
    search::{
        fetch_step::{FetchStep, FetchStepId, RequirementBinding},
        plan_node::{PlanNode, PlanNodeKind},
        SearchOutcome,
    },
};

/// Dependency graph of the fetch steps on the chosen branch. Edges point from a step to
/// the steps that need its results.
struct StepGraph {
    graph: DiGraph<FetchStepId, ()>,
    indices: FxHashMap<FetchStepId, NodeIndex>,
}

impl StepGraph {
    fn new(outcome: &SearchOutcome, chain: &[&PlanNode]) -> Self {
        let mut step_graph = StepGraph {
            graph: DiGraph::new(),
            indices: FxHashMap::default(),
        };

        for step_id in outcome.branch_steps() {
            let index = step_graph.graph.add_node(*step_id);
            step_graph.indices.insert(*step_id, index);
        }

        for step_id in outcome.branch_steps() {
            let step = outcome.step(*step_id);
            if let Some(parent) = step.parent {
                step_graph.add_dependency(parent, *step_id);
            }
            if let Some(previous_root) = step.previous_root {
                step_graph.add_dependency(previous_root, *step_id);
            }
        }

        for node in chain {
            if let (Some(landed_in), Some(consumer)) = (node.kind.step(), node.kind.requirement_of()) {
                step_graph.add_dependency(landed_in, consumer);
            }
        }

        step_graph
    }

    fn add_dependency(&mut self, dependency: FetchStepId, dependent: FetchStepId) {
        if dependency == dependent {
            return;
        }

        if let (Some(from), Some(to)) = (self.indices.get(&dependency), self.indices.get(&dependent)) {
            self.graph.update_edge(*from, *to, ());
        }
    }

    fn execution_order(&self, outcome: &SearchOutcome) -> Result<Vec<FetchStepId>, PlannerError> {
        let sorted = toposort(&self.graph, None).map_err(|cycle| PlannerError::CyclicDependency {
            schema_name: outcome.step(self.graph[cycle.node_id()]).schema_name.clone(),
        })?;

        Ok(sorted.into_iter().map(|index| self.graph[index]).collect())
    }

    fn dependencies(&self, step_id: FetchStepId) -> impl Iterator<Item = FetchStepId> + '_ {
        self.indices
            .get(&step_id)
            .into_iter()
            .flat_map(|index| self.graph.neighbors_directed(*index, Direction::Incoming))
            .map(|index| self.graph[index])
    }
}

/// Adds the selection placed by `node` to the selection set of the step it landed in.
fn merge_placement(
    outcome: &SearchOutcome,
    node: &PlanNode,
    selection_sets: &mut FxHashMap<FetchStepId, SelectionSet>,
) -> Result<(), PlannerError> {
    let (step_id, parent_path, item) = match &node.kind {
        PlanNodeKind::Root => return Ok(()),
        PlanNodeKind::Field(field) => (
            field.step,
            &field.parent_path,
            SelectionItem::Field(field.field.clone()),
        ),
        PlanNodeKind::InlineFragment(fragment) => match fragment.step {
            Some(step_id) => (
                step_id,
                &fragment.parent_path,
                SelectionItem::InlineFragment(InlineFragmentSelection::new(
                    fragment.type_condition.clone(),
                )),
            ),
            None => return Ok(()),
        },
    };

    let step = outcome.step(step_id);
    let relative = parent_path.strip_prefix(&step.path).ok_or_else(|| {
        PlannerError::Internal(format!(
            "selection at '{}' lies outside of step {step_id} at '{}'",
            node.path, step.path
        ))
    })?;

    selection_sets
        .entry(step_id)
        .or_default()
        .merge_at(&relative, item)
        .map_err(|err| {
            PlannerError::Internal(format!(
                "cannot place '{}' in step {step_id}: {err}",
                node.path
            ))
        })
}

fn unique_variable_name(id: u32, argument: &str, used: &mut BTreeSet<String>) -> String {
    let base = format!("__fusion_{id}_{argument}");
    let mut name = base.clone();
    let mut suffix = 2;

    while !used.insert(name.clone()) {
        name = format!("{base}_{suffix}");
        suffix += 1;
    }

    name
}

struct BoundVariables {
    definitions: Vec<VariableDefinition>,
    requirements: Vec<OperationRequirement>,
    arguments: ArgumentsMap,
}

fn bind_variables(
    id: u32,
    step: &FetchStep,
    bindings: &[RequirementBinding],
    used: &mut BTreeSet<String>,
) -> BoundVariables {
    let mut bound = BoundVariables {
        definitions: Vec::with_capacity(bindings.len()),
        requirements: Vec::with_capacity(bindings.len()),
        arguments: ArgumentsMap::new(),
    };

    for binding in bindings {
        let name = unique_variable_name(id, &binding.argument, used);
        bound.definitions.push(VariableDefinition {
            name: name.clone(),
            variable_type: binding.argument_type.clone(),
            default_value: None,
        });
        bound.requirements.push(OperationRequirement {
            key: name.clone(),
            path: step.path.clone(),
            selection_map: binding.selection.to_string(),
        });
        bound
            .arguments
            .add_argument(binding.argument.clone(), Value::Variable(name));
    }

    bound
}

fn build_node(
    operation: &NormalizedOperation,
    step_id: FetchStepId,
    step: &FetchStep,
    id: u32,
    mut selection_set: SelectionSet,
    dependencies: Vec<u32>,
) -> Result<OperationExecutionNode, PlannerError> {
    let mut user_variables = BTreeSet::new();
    selection_set.variable_usages(&mut user_variables);

    let mut used = user_variables.clone();
    let keys = bind_variables(
        id,
        step,
        step.lookup()
            .map(|lookup| lookup.bindings.as_slice())
            .unwrap_or_default(),
        &mut used,
    );
    let fields = bind_variables(id, step, &step.field_bindings, &mut used);

    if let Some(opened_for) = &step.opened_for {
        let field = selection_set.field_mut(opened_for).ok_or_else(|| {
            PlannerError::Internal(format!("step {step_id} lost the field '{opened_for}'"))
        })?;
        for (argument, value) in fields.arguments.iter() {
            field.arguments.add_argument(argument.clone(), value.clone());
        }
    }

    let mut variables = String::new();
    write_variable_definitions(
        &mut variables,
        user_variables
            .iter()
            .filter_map(|name| operation.variable_definition(name))
            .chain(&keys.definitions)
            .chain(&fields.definitions),
    );

    let operation_text = match step.lookup() {
        Some(lookup) => {
            let mut lookup_field = FieldSelection::new(lookup.field_name.clone());
            lookup_field.arguments = keys.arguments;
            lookup_field.selections = selection_set;

            format!(
                "query{variables} {}",
                SelectionSet::new(vec![lookup_field.into()])
            )
        }
        None => format!("{}{variables} {selection_set}", operation.operation_kind),
    };

    Ok(OperationExecutionNode {
        id,
        schema_name: step.schema_name.clone(),
        path: step.path.clone(),
        operation: operation_text,
        requirements: keys
            .requirements
            .into_iter()
            .chain(fields.requirements)
            .collect(),
        dependencies,
    })
}

/// Turns the chosen search branch into execution nodes: one per fetch step, numbered in
/// dependency order.
#[instrument(level = "trace", skip_all)]
pub fn assemble(
    operation: &NormalizedOperation,
    outcome: &SearchOutcome,
) -> Result<OperationPlan, PlannerError> {
    let chain = outcome.chain();
    let step_graph = StepGraph::new(outcome, &chain);
    let order = step_graph.execution_order(outcome)?;

    if order.is_empty() {
        return Err(PlannerError::EmptyPlan);
    }

    let ids: FxHashMap<FetchStepId, u32> = order
        .iter()
        .enumerate()
        .map(|(index, step_id)| (*step_id, index as u32 + 1))
        .collect();

    let mut selection_sets: FxHashMap<FetchStepId, SelectionSet> = FxHashMap::default();
    for node in &chain {
        merge_placement(outcome, node, &mut selection_sets)?;
    }

    let nodes = order
        .iter()
        .map(|step_id| {
            let mut dependencies = step_graph
                .dependencies(*step_id)
                .filter_map(|dependency| ids.get(&dependency).copied())
                .collect::<Vec<_>>();
            dependencies.sort_unstable();
            dependencies.dedup();

            build_node(
                operation,
                *step_id,
                outcome.step(*step_id),
                ids[step_id],
                selection_sets.remove(step_id).unwrap_or_default(),
                dependencies,
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    debug!(nodes = nodes.len(), "assembled operation plan");

    Ok(OperationPlan {
        operation_kind: operation.operation_kind,
        nodes,
    })
}
