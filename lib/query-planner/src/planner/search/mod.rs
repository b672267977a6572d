pub mod backlog;
pub mod excluded;
pub mod fetch_step;
pub mod plan_node;

use std::{collections::BTreeSet, num::NonZeroU32, rc::Rc, sync::Arc};

use rustc_hash::FxHashSet;
use tracing::{instrument, trace};

use crate::{
    ast::{
        operation::{NormalizedOperation, OperationKind},
        selection_item::SelectionItem,
        selection_path::SelectionPath,
        selection_set::{FieldSelection, InlineFragmentSelection, SelectionSet},
    },
    schema::{CompositeField, CompositeSchema, FieldSource},
    utils::cancellation::CancellationToken,
};

use super::{
    error::PlannerError,
    requirements::{alias_requirements, field_bindings, lookup_bindings, requirement_items},
};
use backlog::{Backlog, BacklogItem};
use excluded::ExcludedSchemas;
use fetch_step::{FetchStep, FetchStepId, FetchStepKind, LookupBinding, RequirementBinding};
use plan_node::{
    FieldPlanNode, InlineFragmentPlanNode, NodeId, PlanNode, PlanNodeKind, SelectionNode,
};

/// Cost of resolving a selection in the subgraph of its parent.
pub const SAME_SCHEMA_COST: u64 = 1;
/// Extra cost of leaving the current subgraph.
pub const SCHEMA_SWITCH_PENALTY: u64 = 10;
const CROSS_SCHEMA_COST: u64 = SAME_SCHEMA_COST + SCHEMA_SWITCH_PENALTY;

const CANCELLATION_CHECK_INTERVAL: NonZeroU32 = match NonZeroU32::new(64) {
    Some(every) => every,
    None => NonZeroU32::MIN,
};

fn placement_cost(switches_schema: bool) -> u64 {
    match switches_schema {
        true => CROSS_SCHEMA_COST,
        false => SAME_SCHEMA_COST,
    }
}

/// `total_cost` never overestimates the cost of finishing a branch, so the first terminal
/// entry popped is the cheapest plan. Ties go to fewer fetches, then to the branch closer
/// to completion, then to fewer subgraph switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct OpenEntry {
    total_cost: u64,
    fetch_count: usize,
    backlog_len: usize,
    switches: usize,
    node: NodeId,
}

/// Cheapest way an item could still be placed, as far as the branch tells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum LowerBound {
    /// The current subgraph or a step already open at the position.
    Same,
    /// A new step in another subgraph, which later items at the position may join.
    SharedSwitch,
    /// A step of its own in another subgraph.
    OwnSwitch,
}

/// The finished search: the node arena, the step arena and the chosen terminal node.
#[derive(Debug)]
pub struct SearchOutcome {
    pub nodes: Vec<SelectionNode>,
    pub steps: Vec<FetchStep>,
    pub terminal: NodeId,
}

impl SearchOutcome {
    pub fn terminal(&self) -> &SelectionNode {
        &self.nodes[self.terminal.0]
    }

    /// Plan nodes from the root to the terminal node.
    pub fn chain(&self) -> Vec<&PlanNode> {
        let mut chain = Vec::new();
        let mut current = Some(self.terminal);

        while let Some(id) = current {
            let node = &self.nodes[id.0].node;
            chain.push(node);
            current = node.previous;
        }

        chain.reverse();
        chain
    }

    /// Steps opened on the chosen branch, in opening order.
    pub fn branch_steps(&self) -> &[FetchStepId] {
        &self.terminal().steps
    }

    pub fn step(&self, id: FetchStepId) -> &FetchStep {
        &self.steps[id.0]
    }
}

struct Placement {
    kind: PlanNodeKind,
    path: SelectionPath,
    schema_name: String,
    cost: u64,
    switched: bool,
    aliases: u32,
    backlog: Backlog,
    opened: Option<FetchStepId>,
}

/// Everything needed to place one field item, whichever source is picked.
struct FieldExpansion<'e> {
    node: NodeId,
    item: &'e BacklogItem,
    field: &'e FieldSelection,
    composite_field: &'e CompositeField,
    output_type: &'e str,
    path: SelectionPath,
    current_schema: String,
    aliases: u32,
    rest: &'e Backlog,
}

struct SearchContext<'a> {
    schema: &'a CompositeSchema,
    /// Selections of the operation, which requirements must not collide with.
    operation_selections: &'a SelectionSet,
    operation_kind: OperationKind,
    root_type: &'a str,
    nodes: Vec<SelectionNode>,
    steps: Vec<FetchStep>,
    open_set: BTreeSet<OpenEntry>,
    sequence: u32,
    first_dead_end: Option<PlannerError>,
}

/// Best-first search for the cheapest assignment of every selection to a subgraph.
#[instrument(level = "trace", skip_all, fields(operation_kind = %operation.operation_kind))]
pub fn search(
    schema: &CompositeSchema,
    operation: &NormalizedOperation,
    cancellation_token: &CancellationToken,
) -> Result<SearchOutcome, PlannerError> {
    let root_type = schema
        .root_type_name(operation.operation_kind)
        .ok_or_else(|| PlannerError::UnknownType {
            type_name: operation.operation_kind.to_string(),
        })?;

    let mut ctx = SearchContext {
        schema,
        operation_selections: &operation.selection_set,
        operation_kind: operation.operation_kind,
        root_type,
        nodes: Vec::new(),
        steps: Vec::new(),
        open_set: BTreeSet::new(),
        sequence: 0,
        first_dead_end: None,
    };

    let entry_schemas = ctx.entry_schemas(&operation.selection_set);
    if entry_schemas.is_empty() {
        return Err(PlannerError::EmptyPlan);
    }

    for entry_schema in entry_schemas {
        ctx.seed(entry_schema, &operation.selection_set);
    }

    let mut cancel_tick = cancellation_token.throttle_check(CANCELLATION_CHECK_INTERVAL);
    let mut expansions = 0usize;

    while let Some(entry) = ctx.open_set.pop_first() {
        cancel_tick.bail_if_cancelled()?;

        if ctx.nodes[entry.node.0].is_terminal() {
            trace!(
                node = entry.node.0,
                total_cost = entry.total_cost,
                fetch_count = entry.fetch_count,
                expansions,
                nodes = ctx.nodes.len(),
                "found cheapest plan"
            );

            return Ok(SearchOutcome {
                nodes: ctx.nodes,
                steps: ctx.steps,
                terminal: entry.node,
            });
        }

        expansions += 1;
        ctx.expand(entry.node)?;
    }

    Err(ctx.first_dead_end.unwrap_or_else(|| {
        PlannerError::Internal("search exhausted without reaching a terminal node".to_string())
    }))
}

fn collect_entry_schemas(
    schema: &CompositeSchema,
    root_type: &str,
    selection_set: &SelectionSet,
    schema_names: &mut BTreeSet<String>,
) {
    for item in &selection_set.items {
        match item {
            SelectionItem::Field(field) => {
                if let Some(sources) = schema.field_sources(root_type, &field.name) {
                    schema_names.extend(sources.iter().map(|source| source.schema_name.clone()));
                }
            }
            SelectionItem::InlineFragment(fragment) => {
                collect_entry_schemas(schema, root_type, &fragment.selections, schema_names)
            }
        }
    }
}

impl<'a> SearchContext<'a> {
    fn next_sequence(&mut self) -> u32 {
        self.sequence += 1;
        self.sequence
    }

    /// Every subgraph serving a selected top-level field, or any single subgraph when
    /// none does.
    fn entry_schemas(&self, selection_set: &SelectionSet) -> Vec<String> {
        let mut schema_names = BTreeSet::new();
        collect_entry_schemas(self.schema, self.root_type, selection_set, &mut schema_names);

        if schema_names.is_empty() {
            schema_names.extend(self.schema.schema_names().next().map(str::to_string));
        }

        schema_names.into_iter().collect()
    }

    fn seed(&mut self, entry_schema: String, selection_set: &SelectionSet) {
        let mut backlog = Backlog::new();
        for item in &selection_set.items {
            let sequence = self.next_sequence();
            backlog.insert(BacklogItem {
                priority: 0,
                sequence,
                parent_path: SelectionPath::root(),
                parent_type: self.root_type.to_string(),
                selection: Arc::new(item.clone()),
                context: None,
                excluded: ExcludedSchemas::new(),
                requirement_of: None,
            });
        }

        let node = SelectionNode {
            node: PlanNode {
                previous: None,
                path: SelectionPath::root(),
                kind: PlanNodeKind::Root,
            },
            entry_schema: Rc::from(entry_schema.as_str()),
            estimate: self.estimate(&[], &entry_schema, &backlog),
            schema_name: entry_schema,
            path_cost: 0,
            fetch_count: 0,
            switches: 0,
            aliases: 0,
            backlog,
            steps: Rc::new(Vec::new()),
        };

        self.push_node(node);
    }

    fn push_node(&mut self, node: SelectionNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.open_set.insert(OpenEntry {
            total_cost: node.total_cost(),
            fetch_count: node.fetch_count,
            backlog_len: node.backlog.len(),
            switches: node.switches,
            node: id,
        });
        self.nodes.push(node);

        id
    }

    fn add_child(&mut self, parent: NodeId, placement: Placement) {
        let parent_node = &self.nodes[parent.0];
        let steps = match placement.opened {
            Some(opened) => {
                let mut steps = (*parent_node.steps).clone();
                steps.push(opened);
                Rc::new(steps)
            }
            None => parent_node.steps.clone(),
        };

        let estimate = self.estimate(&steps, &parent_node.entry_schema, &placement.backlog);

        let node = SelectionNode {
            node: PlanNode {
                previous: Some(parent),
                path: placement.path,
                kind: placement.kind,
            },
            schema_name: placement.schema_name,
            entry_schema: parent_node.entry_schema.clone(),
            path_cost: parent_node.path_cost + placement.cost,
            estimate,
            fetch_count: steps.len(),
            switches: parent_node.switches + usize::from(placement.switched),
            aliases: placement.aliases,
            backlog: placement.backlog,
            steps,
        };

        trace!(
            parent = parent.0,
            path = %node.node.path,
            schema = %node.schema_name,
            total_cost = node.total_cost(),
            pending = node.backlog.len(),
            "expanded"
        );

        self.push_node(node);
    }

    fn open_step(&mut self, step: FetchStep) -> FetchStepId {
        let id = FetchStepId(self.steps.len());
        trace!(
            step = %id,
            schema = %step.schema_name,
            path = %step.path,
            exclusive = step.exclusive,
            "opened fetch step"
        );
        self.steps.push(step);

        id
    }

    fn branch_steps(&self, node: NodeId) -> Rc<Vec<FetchStepId>> {
        self.nodes[node.0].steps.clone()
    }

    /// Subgraph holding the parent selection of an item in `context`.
    fn current_schema<'s>(
        &'s self,
        context: Option<FetchStepId>,
        entry_schema: &'s str,
    ) -> &'s str {
        match context {
            Some(step) => &self.steps[step.0].schema_name,
            None => entry_schema,
        }
    }

    /// Admissible estimate of what resolving `backlog` costs. Every item costs at least
    /// one. A position where some item can only leave the current subgraph pays the switch
    /// penalty once, since the other items there may join the step it opens.
    fn estimate(&self, steps: &[FetchStepId], entry_schema: &str, backlog: &Backlog) -> u64 {
        let mut switching_positions = FxHashSet::default();

        backlog
            .iter()
            .map(|item| match self.lower_bound(steps, entry_schema, item) {
                LowerBound::Same => SAME_SCHEMA_COST,
                LowerBound::SharedSwitch => {
                    match switching_positions.insert((item.context, &item.parent_path)) {
                        true => CROSS_SCHEMA_COST,
                        false => SAME_SCHEMA_COST,
                    }
                }
                LowerBound::OwnSwitch => CROSS_SCHEMA_COST,
            })
            .sum()
    }

    fn lower_bound(
        &self,
        steps: &[FetchStepId],
        entry_schema: &str,
        item: &BacklogItem,
    ) -> LowerBound {
        let SelectionItem::Field(field) = item.selection.as_ref() else {
            return LowerBound::Same;
        };
        let Some(composite_field) = self.schema.field(&item.parent_type, &field.name) else {
            return LowerBound::Same;
        };
        let current_schema = self.current_schema(item.context, entry_schema);

        composite_field
            .sources
            .iter()
            .filter(|source| !item.excluded.contains(&source.schema_name))
            .map(|source| {
                if source.schema_name == current_schema {
                    LowerBound::Same
                } else if source.field_requirements().is_some() {
                    LowerBound::OwnSwitch
                } else if self.can_join(steps, item, &source.schema_name) {
                    LowerBound::Same
                } else {
                    LowerBound::SharedSwitch
                }
            })
            .min()
            .unwrap_or(LowerBound::Same)
    }

    fn can_join(&self, steps: &[FetchStepId], item: &BacklogItem, schema_name: &str) -> bool {
        match item.context {
            Some(context) => steps
                .iter()
                .any(|step| self.is_joinable_lookup(*step, context, schema_name, item)),
            None => self.joinable_root_step(steps, schema_name).is_some(),
        }
    }

    /// A lookup step opened for the same position, which further selections of its
    /// subgraph can join.
    fn is_joinable_lookup(
        &self,
        step_id: FetchStepId,
        context: FetchStepId,
        schema_name: &str,
        item: &BacklogItem,
    ) -> bool {
        let step = &self.steps[step_id.0];

        step.parent == Some(context)
            && step.lookup().is_some()
            && step.is_joinable()
            && step.schema_name == schema_name
            && step.type_name == item.parent_type
            && step.path == item.parent_path
    }

    /// Root step a top-level selection may join. Mutation fields may only join the most
    /// recently opened root step, so their side effects keep document order.
    fn joinable_root_step(&self, steps: &[FetchStepId], schema_name: &str) -> Option<FetchStepId> {
        let mut roots = steps
            .iter()
            .copied()
            .filter(|id| self.steps[id.0].is_root());
        let joinable = |id: &FetchStepId| {
            let step = &self.steps[id.0];
            step.schema_name == schema_name && step.is_joinable()
        };

        match self.operation_kind {
            OperationKind::Mutation => roots.last().filter(joinable),
            OperationKind::Query | OperationKind::Subscription => roots.find(joinable),
        }
    }

    fn open_root_step(
        &mut self,
        node: NodeId,
        schema_name: &str,
        opened_for: Option<String>,
        field_bindings: Vec<RequirementBinding>,
    ) -> FetchStepId {
        let previous_root = match self.operation_kind {
            OperationKind::Mutation => self
                .branch_steps(node)
                .iter()
                .copied()
                .filter(|id| self.steps[id.0].is_root())
                .last(),
            OperationKind::Query | OperationKind::Subscription => None,
        };

        self.open_step(FetchStep {
            schema_name: schema_name.to_string(),
            parent: None,
            path: SelectionPath::root(),
            type_name: self.root_type.to_string(),
            kind: FetchStepKind::Root,
            exclusive: opened_for.is_some(),
            opened_for,
            field_bindings,
            previous_root,
        })
    }

    /// Top-level step for `schema_name`, joining an existing one when allowed.
    fn root_step(&mut self, node: NodeId, schema_name: &str) -> (FetchStepId, Option<FetchStepId>) {
        match self.joinable_root_step(&self.branch_steps(node), schema_name) {
            Some(step) => (step, None),
            None => {
                let step = self.open_root_step(node, schema_name, None, Vec::new());
                (step, Some(step))
            }
        }
    }

    fn push_children(
        &mut self,
        backlog: &mut Backlog,
        item: &BacklogItem,
        path: &SelectionPath,
        parent_type: &str,
        selections: &SelectionSet,
        context: Option<FetchStepId>,
    ) {
        for child in &selections.items {
            let sequence = self.next_sequence();
            backlog.insert(BacklogItem {
                priority: item.priority,
                sequence,
                parent_path: path.clone(),
                parent_type: parent_type.to_string(),
                selection: Arc::new(child.clone()),
                context,
                excluded: item.excluded.clone(),
                requirement_of: item.requirement_of,
            });
        }
    }

    fn expand(&mut self, node: NodeId) -> Result<(), PlannerError> {
        let Some((item, rest)) = self.nodes[node.0].backlog.split_first() else {
            return Ok(());
        };

        let selection = item.selection.clone();
        match selection.as_ref() {
            SelectionItem::InlineFragment(fragment) => {
                self.expand_inline_fragment(node, &item, fragment, rest);
                Ok(())
            }
            SelectionItem::Field(field) if field.is_typename() => {
                self.expand_typename(node, &item, field, rest);
                Ok(())
            }
            SelectionItem::Field(field) => self.expand_field(node, &item, field, &rest),
        }
    }

    /// `__typename` is served by whichever subgraph holds the parent selection.
    fn expand_typename(
        &mut self,
        node: NodeId,
        item: &BacklogItem,
        field: &FieldSelection,
        rest: Backlog,
    ) {
        let (step, opened) = match item.context {
            Some(step) => (step, None),
            None => {
                let entry_schema = self.nodes[node.0].entry_schema.clone();
                self.root_step(node, &entry_schema)
            }
        };

        let placement = Placement {
            kind: PlanNodeKind::Field(FieldPlanNode {
                field: field.shallow(),
                parent_path: item.parent_path.clone(),
                step,
                opened_step: opened,
                requirement_of: item.requirement_of,
            }),
            path: item.parent_path.append_field(field.response_key()),
            schema_name: self.steps[step.0].schema_name.clone(),
            cost: SAME_SCHEMA_COST,
            switched: false,
            aliases: self.nodes[node.0].aliases,
            backlog: rest,
            opened,
        };

        self.add_child(node, placement);
    }

    fn expand_inline_fragment(
        &mut self,
        node: NodeId,
        item: &BacklogItem,
        fragment: &InlineFragmentSelection,
        mut rest: Backlog,
    ) {
        let path = item.parent_path.append_fragment(&fragment.type_condition);
        self.push_children(
            &mut rest,
            item,
            &path,
            &fragment.type_condition,
            &fragment.selections,
            item.context,
        );

        let schema_name = match item.context {
            Some(step) => self.steps[step.0].schema_name.clone(),
            None => self.nodes[node.0].schema_name.clone(),
        };

        let placement = Placement {
            kind: PlanNodeKind::InlineFragment(InlineFragmentPlanNode {
                type_condition: fragment.type_condition.clone(),
                parent_path: item.parent_path.clone(),
                step: item.context,
                requirement_of: item.requirement_of,
            }),
            path,
            schema_name,
            cost: SAME_SCHEMA_COST,
            switched: false,
            aliases: self.nodes[node.0].aliases,
            backlog: rest,
            opened: None,
        };

        self.add_child(node, placement);
    }

    fn expand_field(
        &mut self,
        node: NodeId,
        item: &BacklogItem,
        field: &FieldSelection,
        rest: &Backlog,
    ) -> Result<(), PlannerError> {
        let schema = self.schema;
        let parent_type = item.parent_type.as_str();
        let coordinate = format!("{parent_type}.{}", field.name);
        let composite_field =
            schema
                .field(parent_type, &field.name)
                .ok_or_else(|| PlannerError::UnknownField {
                    type_name: parent_type.to_string(),
                    field_name: field.name.clone(),
                })?;
        let path = item.parent_path.append_field(field.response_key());

        if composite_field.sources.is_empty() && !item.is_requirement() {
            return Err(PlannerError::UnresolvableField { coordinate, path });
        }

        let parent_node = &self.nodes[node.0];
        let current_schema = self
            .current_schema(item.context, &parent_node.entry_schema)
            .to_string();

        let expansion = FieldExpansion {
            node,
            item,
            field,
            composite_field,
            output_type: composite_field.output_type.named_type(),
            path,
            current_schema,
            aliases: parent_node.aliases,
            rest,
        };

        let mut children = 0;
        for source in &composite_field.sources {
            if item.excluded.contains(&source.schema_name) {
                continue;
            }

            let switches_schema = source.schema_name != expansion.current_schema;
            children += match (source.field_requirements(), item.context) {
                (Some(requirements), _) => {
                    self.place_with_requirements(&expansion, source, requirements)?
                }
                (None, None) => {
                    let (step, opened) = self.root_step(node, &source.schema_name);
                    let cost = match opened {
                        Some(_) => placement_cost(switches_schema),
                        None => SAME_SCHEMA_COST,
                    };
                    self.place_field(
                        &expansion,
                        step,
                        opened,
                        cost,
                        Vec::new(),
                        expansion.aliases,
                    );
                    1
                }
                (None, Some(context)) if !switches_schema => {
                    self.place_field(
                        &expansion,
                        context,
                        None,
                        SAME_SCHEMA_COST,
                        Vec::new(),
                        expansion.aliases,
                    );
                    1
                }
                (None, Some(context)) => self.place_through_lookup(&expansion, source, context)?,
            };
        }

        if children == 0 {
            trace!(coordinate = %coordinate, path = %expansion.path, "dead end");
            if self.first_dead_end.is_none() {
                self.first_dead_end = Some(PlannerError::UnresolvableField {
                    coordinate,
                    path: expansion.path,
                });
            }
        }

        Ok(())
    }

    fn place_field(
        &mut self,
        expansion: &FieldExpansion<'_>,
        step: FetchStepId,
        opened: Option<FetchStepId>,
        cost: u64,
        injected: Vec<BacklogItem>,
        aliases: u32,
    ) {
        let mut backlog = expansion.rest.clone();
        for item in injected {
            backlog.insert(item);
        }

        self.push_children(
            &mut backlog,
            expansion.item,
            &expansion.path,
            expansion.output_type,
            &expansion.field.selections,
            Some(step),
        );

        let placement = Placement {
            kind: PlanNodeKind::Field(FieldPlanNode {
                field: expansion.field.shallow(),
                parent_path: expansion.item.parent_path.clone(),
                step,
                opened_step: opened,
                requirement_of: expansion.item.requirement_of,
            }),
            path: expansion.path.clone(),
            schema_name: self.steps[step.0].schema_name.clone(),
            cost,
            switched: self.steps[step.0].schema_name != expansion.current_schema,
            aliases,
            backlog,
            opened,
        };

        self.add_child(expansion.node, placement);
    }

    /// A nested field from another subgraph joins a lookup already opened for the same
    /// position, or opens one per lookup the subgraph offers. Only opening pays the switch.
    fn place_through_lookup(
        &mut self,
        expansion: &FieldExpansion<'_>,
        source: &FieldSource,
        context: FetchStepId,
    ) -> Result<usize, PlannerError> {
        let joinable = self
            .branch_steps(expansion.node)
            .iter()
            .copied()
            .filter(|step| {
                self.is_joinable_lookup(*step, context, &source.schema_name, expansion.item)
            })
            .collect::<Vec<_>>();

        if !joinable.is_empty() {
            for step in &joinable {
                self.place_field(
                    expansion,
                    *step,
                    None,
                    SAME_SCHEMA_COST,
                    Vec::new(),
                    expansion.aliases,
                );
            }
            return Ok(joinable.len());
        }

        self.open_lookup_steps(expansion, source, context, None, Vec::new(), expansion.aliases)
    }

    /// A source with requirements always gets a step of its own, so the requirements can be
    /// fetched before it without creating a cycle. Requirements colliding with selected
    /// fields are fetched under private aliases.
    fn place_with_requirements(
        &mut self,
        expansion: &FieldExpansion<'_>,
        source: &FieldSource,
        requirements: &SelectionSet,
    ) -> Result<usize, PlannerError> {
        let item = expansion.item;
        let operation_selections = self.operation_selections;
        let mut bindings = field_bindings(
            self.schema,
            &item.parent_type,
            expansion.composite_field,
            source,
            requirements,
        )?;
        let mut aliases = expansion.aliases;
        alias_requirements(
            &mut bindings,
            &operation_selections.fields_at(&item.parent_path),
            &mut aliases,
        );
        let opened_for = expansion.field.response_key().to_string();

        match item.context {
            None => {
                let step = self.open_root_step(
                    expansion.node,
                    &source.schema_name,
                    Some(opened_for),
                    bindings,
                );
                let injected = requirement_items(
                    item,
                    self.steps[step.0].requirement_bindings(),
                    step,
                    &source.schema_name,
                    &mut self.sequence,
                );
                let cost = placement_cost(source.schema_name != expansion.current_schema);
                self.place_field(expansion, step, Some(step), cost, injected, aliases);
                Ok(1)
            }
            Some(context) => self.open_lookup_steps(
                expansion,
                source,
                context,
                Some(opened_for),
                bindings,
                aliases,
            ),
        }
    }

    fn open_lookup_steps(
        &mut self,
        expansion: &FieldExpansion<'_>,
        source: &FieldSource,
        context: FetchStepId,
        opened_for: Option<String>,
        field_bindings: Vec<RequirementBinding>,
        aliases: u32,
    ) -> Result<usize, PlannerError> {
        let schema = self.schema;
        let operation_selections = self.operation_selections;
        let item = expansion.item;
        let selected = operation_selections.fields_at(&item.parent_path);
        let lookups = schema.lookups(&item.parent_type, &source.schema_name);
        let cost = placement_cost(source.schema_name != expansion.current_schema);

        for lookup in &lookups {
            let mut bindings =
                lookup_bindings(schema, lookup, &item.parent_type, &source.schema_name)?;
            let mut lookup_aliases = aliases;
            alias_requirements(&mut bindings, &selected, &mut lookup_aliases);

            let step = self.open_step(FetchStep {
                schema_name: source.schema_name.clone(),
                parent: Some(context),
                path: item.parent_path.clone(),
                type_name: item.parent_type.clone(),
                kind: FetchStepKind::Lookup(LookupBinding {
                    field_name: lookup.field.name.clone(),
                    bindings,
                }),
                exclusive: opened_for.is_some(),
                opened_for: opened_for.clone(),
                field_bindings: field_bindings.clone(),
                previous_root: None,
            });

            let injected = requirement_items(
                item,
                self.steps[step.0].requirement_bindings(),
                step,
                &source.schema_name,
                &mut self.sequence,
            );
            self.place_field(expansion, step, Some(step), cost, injected, lookup_aliases);
        }

        Ok(lookups.len())
    }
}
