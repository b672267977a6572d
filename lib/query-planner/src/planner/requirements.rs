use std::sync::Arc;

use crate::{
    ast::{
        selection_item::SelectionItem,
        selection_set::{FieldSelection, SelectionSet},
    },
    schema::{CompositeField, CompositeSchema, FieldSource, Lookup},
};

use super::{
    error::PlannerError,
    search::{
        backlog::{BacklogItem, REQUIREMENT_PRIORITY},
        fetch_step::{FetchStepId, RequirementBinding},
    },
};

/// Prefix of the response keys given to requirements that would collide with selected
/// fields.
pub const REQUIREMENT_ALIAS_PREFIX: &str = "__fusion_req_";

fn known_field<'a>(
    schema: &'a CompositeSchema,
    parent_type: &str,
    field: &FieldSelection,
) -> Result<&'a CompositeField, String> {
    schema
        .field(parent_type, &field.name)
        .ok_or_else(|| format!("field '{}' does not exist on type '{parent_type}'", field.name))
}

fn validate_selections(
    schema: &CompositeSchema,
    parent_type: &str,
    selections: &SelectionSet,
) -> Result<(), String> {
    for item in &selections.items {
        match item {
            SelectionItem::Field(field) if field.is_typename() => {}
            SelectionItem::Field(field) => {
                let known = known_field(schema, parent_type, field)?;
                validate_selections(schema, known.output_type.named_type(), &field.selections)?;
            }
            SelectionItem::InlineFragment(fragment) => {
                validate_selections(schema, &fragment.type_condition, &fragment.selections)?
            }
        }
    }

    Ok(())
}

/// The field a top-level requirement selects. Its sub-selections are checked against the
/// field type, all the way down.
fn requirement_field<'a>(
    schema: &'a CompositeSchema,
    parent_type: &str,
    selection: &SelectionItem,
) -> Result<&'a CompositeField, String> {
    match selection {
        SelectionItem::Field(field) => {
            let required = known_field(schema, parent_type, field)?;
            validate_selections(schema, required.output_type.named_type(), &field.selections)?;
            Ok(required)
        }
        SelectionItem::InlineFragment(fragment) => Err(format!(
            "inline fragment '... on {}' cannot bind an argument",
            fragment.type_condition
        )),
    }
}

/// Binds each top-level selection of a lookup key to the lookup field argument at the
/// same position.
pub fn lookup_bindings(
    schema: &CompositeSchema,
    lookup: &Lookup<'_>,
    parent_type: &str,
    schema_name: &str,
) -> Result<Vec<RequirementBinding>, PlannerError> {
    let invalid = |reason: String| PlannerError::InvalidRequirementSelection {
        schema_name: schema_name.to_string(),
        coordinate: format!("{}.{}", schema.query_type, lookup.field.name),
        requirement: lookup.key.to_string(),
        reason,
    };

    if lookup.key.len() != lookup.field.arguments.len() {
        return Err(invalid(format!(
            "key has {} selections but the lookup takes {} arguments",
            lookup.key.len(),
            lookup.field.arguments.len()
        )));
    }

    lookup
        .key
        .items
        .iter()
        .zip(&lookup.field.arguments)
        .map(|(selection, argument)| {
            requirement_field(schema, parent_type, selection).map_err(&invalid)?;

            Ok(RequirementBinding {
                argument: argument.name.clone(),
                argument_type: argument.argument_type.clone(),
                selection: selection.clone(),
            })
        })
        .collect()
}

/// Binds each top-level requirement of `source` to the subgraph argument named by its map.
/// The argument type comes from the composite field when it declares the argument, and
/// from the required field otherwise.
pub fn field_bindings(
    schema: &CompositeSchema,
    parent_type: &str,
    field: &CompositeField,
    source: &FieldSource,
    requirements: &SelectionSet,
) -> Result<Vec<RequirementBinding>, PlannerError> {
    let invalid = |reason: String| PlannerError::InvalidRequirementSelection {
        schema_name: source.schema_name.clone(),
        coordinate: format!("{parent_type}.{}", field.name),
        requirement: requirements.to_string(),
        reason,
    };

    if source.argument_map.len() != requirements.len() {
        return Err(invalid(format!(
            "map has {} entries for {} requirements",
            source.argument_map.len(),
            requirements.len()
        )));
    }

    requirements
        .items
        .iter()
        .zip(&source.argument_map)
        .map(|(selection, argument)| {
            let required = requirement_field(schema, parent_type, selection).map_err(&invalid)?;
            let argument_type = field
                .argument(argument)
                .map(|definition| definition.argument_type.clone())
                .unwrap_or_else(|| required.output_type.clone());

            Ok(RequirementBinding {
                argument: argument.clone(),
                argument_type,
                selection: selection.clone(),
            })
        })
        .collect()
}

/// Gives a private response key to every requirement field that takes arguments or that
/// shares its response key with a different field in `selected`, the fields the operation
/// selects at the same position. Requirement fields matching a selected field are compared
/// again one level down.
pub fn alias_requirements(
    bindings: &mut [RequirementBinding],
    selected: &[&FieldSelection],
    aliases: &mut u32,
) {
    for binding in bindings {
        alias_selection(&mut binding.selection, selected, aliases);
    }
}

fn alias_selection(selection: &mut SelectionItem, selected: &[&FieldSelection], aliases: &mut u32) {
    match selection {
        SelectionItem::Field(field) => {
            let same_key = selected
                .iter()
                .copied()
                .filter(|candidate| candidate.response_key() == field.response_key())
                .collect::<Vec<_>>();

            if !field.arguments.is_empty()
                || same_key
                    .iter()
                    .any(|candidate| !candidate.is_mergeable_with(field))
            {
                *aliases += 1;
                field.alias = Some(format!("{REQUIREMENT_ALIAS_PREFIX}{aliases}"));
                return;
            }

            let nested = same_key
                .iter()
                .flat_map(|candidate| candidate.selections.object_fields())
                .collect::<Vec<_>>();
            for child in &mut field.selections.items {
                alias_selection(child, &nested, aliases);
            }
        }
        SelectionItem::InlineFragment(fragment) => {
            for child in &mut fragment.selections.items {
                alias_selection(child, selected, aliases);
            }
        }
    }
}

/// Backlog items resolving `bindings` for `consumer`, scoped to the position of the field
/// that needs them.
pub fn requirement_items<'a>(
    origin: &BacklogItem,
    bindings: impl IntoIterator<Item = &'a RequirementBinding>,
    consumer: FetchStepId,
    schema_name: &str,
    sequence: &mut u32,
) -> Vec<BacklogItem> {
    let excluded = origin.excluded.next_with_schema(schema_name);

    bindings
        .into_iter()
        .map(|binding| {
            *sequence += 1;
            BacklogItem {
                priority: REQUIREMENT_PRIORITY,
                sequence: *sequence,
                parent_path: origin.parent_path.clone(),
                parent_type: origin.parent_type.clone(),
                selection: Arc::new(binding.selection.clone()),
                context: origin.context,
                excluded: excluded.clone(),
                requirement_of: Some(consumer),
            }
        })
        .collect()
}
