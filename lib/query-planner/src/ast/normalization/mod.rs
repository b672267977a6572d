pub mod error;

use graphql_parser::query::{
    self as query_ast, Definition, FragmentDefinition, OperationDefinition, Selection,
    TypeCondition,
};
use rustc_hash::FxHashMap;
use tracing::instrument;

use crate::{
    ast::{
        arguments::ArgumentsMap,
        operation::{NormalizedOperation, OperationKind, VariableDefinition},
        selection_item::SelectionItem,
        selection_set::{FieldSelection, InlineFragmentSelection, SelectionSet},
        value::Value,
    },
    schema::CompositeSchema,
};
use error::NormalizationError;

/// Runtime conditions that survived static evaluation of `@skip` / `@include`.
#[derive(Debug, Clone, Default, PartialEq)]
struct Conditions {
    skip_if: Option<String>,
    include_if: Option<String>,
}

impl Conditions {
    fn is_empty(&self) -> bool {
        self.skip_if.is_none() && self.include_if.is_none()
    }
}

struct NormalizationContext<'a> {
    schema: &'a CompositeSchema,
    fragments: FxHashMap<&'a str, &'a FragmentDefinition<'static, String>>,
    spread_stack: Vec<String>,
}

/// Picks the operation to execute, inlines every fragment and merges selections, so
/// the planner only sees fields and typed inline fragments.
#[instrument(level = "trace", skip_all, fields(operation_name = ?operation_name))]
pub fn normalize_operation(
    schema: &CompositeSchema,
    document: &query_ast::Document<'static, String>,
    operation_name: Option<&str>,
) -> Result<NormalizedOperation, NormalizationError> {
    let operation = select_operation(document, operation_name)?;

    let (name, operation_kind, variable_definitions, selection_set) = match operation {
        OperationDefinition::SelectionSet(selection_set) => {
            (None, OperationKind::Query, &[][..], selection_set)
        }
        OperationDefinition::Query(query) => (
            query.name.clone(),
            OperationKind::Query,
            query.variable_definitions.as_slice(),
            &query.selection_set,
        ),
        OperationDefinition::Mutation(mutation) => (
            mutation.name.clone(),
            OperationKind::Mutation,
            mutation.variable_definitions.as_slice(),
            &mutation.selection_set,
        ),
        OperationDefinition::Subscription(subscription) => (
            subscription.name.clone(),
            OperationKind::Subscription,
            subscription.variable_definitions.as_slice(),
            &subscription.selection_set,
        ),
    };

    let root_type = schema.root_type_name(operation_kind).ok_or_else(|| {
        NormalizationError::MissingRootType {
            operation_kind: operation_kind.to_string(),
        }
    })?;

    let mut ctx = NormalizationContext {
        schema,
        fragments: document
            .definitions
            .iter()
            .filter_map(|definition| match definition {
                Definition::Fragment(fragment) => Some((fragment.name.as_str(), fragment)),
                _ => None,
            })
            .collect(),
        spread_stack: Vec::new(),
    };

    let mut normalized_selection_set = SelectionSet::default();
    ctx.collect_selections(root_type, &selection_set.items, &mut normalized_selection_set)?;

    Ok(NormalizedOperation {
        name,
        operation_kind,
        variable_definitions: variable_definitions
            .iter()
            .map(VariableDefinition::from)
            .collect(),
        selection_set: normalized_selection_set,
    })
}

fn select_operation<'d>(
    document: &'d query_ast::Document<'static, String>,
    operation_name: Option<&str>,
) -> Result<&'d OperationDefinition<'static, String>, NormalizationError> {
    let mut operations = document
        .definitions
        .iter()
        .filter_map(|definition| match definition {
            Definition::Operation(operation) => Some(operation),
            Definition::Fragment(_) => None,
        });

    match operation_name {
        Some(operation_name) => operations
            .find(|operation| operation_name_of(operation) == Some(operation_name))
            .ok_or_else(|| NormalizationError::OperationNotFound {
                operation_name: operation_name.to_string(),
            }),
        None => {
            let first = operations
                .next()
                .ok_or_else(|| NormalizationError::MissingOperationToExecute {
                    reason: "the document has no operations".to_string(),
                })?;

            match operations.next() {
                Some(_) => Err(NormalizationError::MissingOperationToExecute {
                    reason: "an operation name is required when the document has several"
                        .to_string(),
                }),
                None => Ok(first),
            }
        }
    }
}

fn operation_name_of<'d>(operation: &'d OperationDefinition<'static, String>) -> Option<&'d str> {
    match operation {
        OperationDefinition::SelectionSet(_) => None,
        OperationDefinition::Query(query) => query.name.as_deref(),
        OperationDefinition::Mutation(mutation) => mutation.name.as_deref(),
        OperationDefinition::Subscription(subscription) => subscription.name.as_deref(),
    }
}

/// Evaluates `@skip` / `@include`. `None` means the selection is statically excluded.
fn evaluate_conditions(
    directives: &[query_ast::Directive<'static, String>],
    coordinate: &str,
) -> Result<Option<Conditions>, NormalizationError> {
    let mut conditions = Conditions::default();

    for directive in directives {
        let skip = match directive.name.as_str() {
            "skip" => true,
            "include" => false,
            _ => continue,
        };

        let condition = directive
            .arguments
            .iter()
            .find(|(name, _)| name == "if")
            .map(|(_, value)| Value::from(value));

        match condition {
            Some(Value::Boolean(value)) if value == skip => return Ok(None),
            Some(Value::Boolean(_)) => {}
            Some(Value::Variable(variable)) if skip => conditions.skip_if = Some(variable),
            Some(Value::Variable(variable)) => conditions.include_if = Some(variable),
            _ => {
                return Err(NormalizationError::UnsupportedSelection {
                    coordinate: coordinate.to_string(),
                    reason: format!("'@{}' needs a boolean or variable 'if'", directive.name),
                })
            }
        }
    }

    Ok(Some(conditions))
}

/// Pushes conditions of a fragment down onto the fields it contributes.
fn apply_conditions(
    selection_set: &mut SelectionSet,
    conditions: &Conditions,
    coordinate: &str,
) -> Result<(), NormalizationError> {
    if conditions.is_empty() {
        return Ok(());
    }

    for item in selection_set.items.iter_mut() {
        match item {
            SelectionItem::Field(field) => {
                let merged = merge_condition(&mut field.skip_if, &conditions.skip_if)
                    && merge_condition(&mut field.include_if, &conditions.include_if);

                if !merged {
                    return Err(NormalizationError::UnsupportedSelection {
                        coordinate: format!("{coordinate}.{}", field.response_key()),
                        reason: "conflicting nested conditions".to_string(),
                    });
                }
            }
            SelectionItem::InlineFragment(fragment) => {
                apply_conditions(&mut fragment.selections, conditions, coordinate)?
            }
        }
    }

    Ok(())
}

fn merge_condition(slot: &mut Option<String>, condition: &Option<String>) -> bool {
    let Some(condition) = condition else {
        return true;
    };

    match slot {
        Some(existing) => existing == condition,
        None => {
            *slot = Some(condition.clone());
            true
        }
    }
}

/// Merges a normalized field, dropping conditions when duplicates disagree on them.
fn merge_field(selection_set: &mut SelectionSet, field: FieldSelection) {
    match selection_set.field_mut(field.response_key()) {
        Some(existing) => {
            if existing.skip_if != field.skip_if || existing.include_if != field.include_if {
                existing.skip_if = None;
                existing.include_if = None;
            }
            merge_nested(&mut existing.selections, field.selections);
        }
        None => selection_set.items.push(field.into()),
    }
}

fn merge_nested(target: &mut SelectionSet, source: SelectionSet) {
    for item in source.items {
        match item {
            SelectionItem::Field(field) => merge_field(target, field),
            SelectionItem::InlineFragment(fragment) => {
                match target.fragment_mut(&fragment.type_condition) {
                    Some(existing) => merge_nested(&mut existing.selections, fragment.selections),
                    None => target.items.push(fragment.into()),
                }
            }
        }
    }
}

impl NormalizationContext<'_> {
    fn collect_selections(
        &mut self,
        parent_type: &str,
        selections: &[Selection<'static, String>],
        out: &mut SelectionSet,
    ) -> Result<(), NormalizationError> {
        for selection in selections {
            match selection {
                Selection::Field(field) => {
                    let coordinate = format!("{parent_type}.{}", field.name);
                    let Some(conditions) = evaluate_conditions(&field.directives, &coordinate)?
                    else {
                        continue;
                    };

                    let normalized = self.normalize_field(parent_type, field, conditions)?;
                    merge_field(out, normalized);
                }
                Selection::InlineFragment(fragment) => {
                    let Some(conditions) = evaluate_conditions(&fragment.directives, parent_type)?
                    else {
                        continue;
                    };

                    let type_condition = fragment
                        .type_condition
                        .as_ref()
                        .map(|TypeCondition::On(type_name)| type_name.as_str());

                    self.collect_fragment(
                        parent_type,
                        type_condition,
                        &fragment.selection_set.items,
                        conditions,
                        out,
                    )?;
                }
                Selection::FragmentSpread(spread) => {
                    let Some(conditions) = evaluate_conditions(&spread.directives, parent_type)?
                    else {
                        continue;
                    };

                    let fragment_name = spread.fragment_name.as_str();
                    let fragment = *self.fragments.get(fragment_name).ok_or_else(|| {
                        NormalizationError::FragmentNotFound {
                            fragment_name: fragment_name.to_string(),
                        }
                    })?;

                    if self.spread_stack.iter().any(|name| name == fragment_name) {
                        return Err(NormalizationError::FragmentCycle {
                            fragment_name: fragment_name.to_string(),
                        });
                    }

                    let TypeCondition::On(type_condition) = &fragment.type_condition;

                    self.spread_stack.push(fragment_name.to_string());
                    let result = self.collect_fragment(
                        parent_type,
                        Some(type_condition.as_str()),
                        &fragment.selection_set.items,
                        conditions,
                        out,
                    );
                    self.spread_stack.pop();
                    result?;
                }
            }
        }

        Ok(())
    }

    /// Fragments on the parent type itself are spliced into the parent selection set,
    /// everything else becomes a typed inline fragment.
    fn collect_fragment(
        &mut self,
        parent_type: &str,
        type_condition: Option<&str>,
        selections: &[Selection<'static, String>],
        conditions: Conditions,
        out: &mut SelectionSet,
    ) -> Result<(), NormalizationError> {
        let target_type = type_condition.unwrap_or(parent_type);
        if self.schema.type_definition(target_type).is_none() {
            return Err(NormalizationError::UnknownType {
                type_name: target_type.to_string(),
            });
        }

        let mut collected = SelectionSet::default();
        self.collect_selections(target_type, selections, &mut collected)?;
        apply_conditions(&mut collected, &conditions, target_type)?;

        if target_type == parent_type {
            merge_nested(out, collected);
        } else {
            let mut fragment = InlineFragmentSelection::new(target_type);
            fragment.selections = collected;
            merge_nested(out, SelectionSet::new(vec![fragment.into()]));
        }

        Ok(())
    }

    fn normalize_field(
        &mut self,
        parent_type: &str,
        field: &query_ast::Field<'static, String>,
        conditions: Conditions,
    ) -> Result<FieldSelection, NormalizationError> {
        let mut normalized = FieldSelection::new(field.name.as_str());
        normalized.alias = field.alias.clone();
        normalized.arguments = ArgumentsMap::from(&field.arguments);
        normalized.skip_if = conditions.skip_if;
        normalized.include_if = conditions.include_if;

        if normalized.is_typename() {
            return Ok(normalized);
        }

        if self.schema.type_definition(parent_type).is_none() {
            return Err(NormalizationError::UnknownType {
                type_name: parent_type.to_string(),
            });
        }

        let composite_field = self.schema.field(parent_type, &field.name).ok_or_else(|| {
            NormalizationError::UnknownField {
                field_name: field.name.clone(),
                type_name: parent_type.to_string(),
            }
        })?;

        if !field.selection_set.items.is_empty() {
            let output_type = composite_field.output_type.named_type().to_string();
            self.collect_selections(
                &output_type,
                &field.selection_set.items,
                &mut normalized.selections,
            )?;
        }

        Ok(normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::{error::NormalizationError, normalize_operation};
    use crate::{schema::CompositeSchema, utils::parsing::parse_operation};

    const SDL: &str = r#"
        type Query {
          productBySlug(slug: String!): Product @fusion__field(schema: "PRODUCTS")
          node(id: ID!): Node @fusion__field(schema: "PRODUCTS")
        }

        interface Node {
          id: ID! @fusion__field(schema: "PRODUCTS")
        }

        type Product implements Node {
          id: ID! @fusion__field(schema: "PRODUCTS")
          name: String! @fusion__field(schema: "PRODUCTS")
          price: Float! @fusion__field(schema: "PRODUCTS")
        }
    "#;

    fn normalize(operation: &str, name: Option<&str>) -> Result<String, NormalizationError> {
        let schema = CompositeSchema::new_from_sdl(SDL).expect("to build schema");
        let document = parse_operation(operation).expect("to parse");

        normalize_operation(&schema, &document, name).map(|op| op.to_string())
    }

    #[test]
    fn inlines_fragment_spreads() {
        insta::assert_snapshot!(
            normalize(
                r#"
                query {
                  productBySlug(slug: "1") {
                    ...ProductFields
                    name
                  }
                }

                fragment ProductFields on Product {
                  id
                  name
                }
                "#,
                None,
            )
            .expect("to normalize"),
            @r#"query { productBySlug(slug: "1") { id name } }"#
        );
    }

    #[test]
    fn keeps_fragments_on_other_types_and_merges_them() {
        insta::assert_snapshot!(
            normalize(
                r#"
                query ($id: ID!) {
                  node(id: $id) {
                    id
                    ... on Product { name }
                    ... on Product { price }
                    ... { id }
                  }
                }
                "#,
                None,
            )
            .expect("to normalize"),
            @"query($id: ID!) { node(id: $id) { id ... on Product { name price } } }"
        );
    }

    #[test]
    fn evaluates_literal_conditions_and_keeps_variables() {
        insta::assert_snapshot!(
            normalize(
                r#"
                query ($withName: Boolean!) {
                  productBySlug(slug: "1") {
                    id @skip(if: true)
                    price @include(if: false)
                    name @include(if: $withName)
                    ... on Product @skip(if: $withName) { price }
                  }
                }
                "#,
                None,
            )
            .expect("to normalize"),
            @r#"query($withName: Boolean!) { productBySlug(slug: "1") { name @include(if: $withName) price @skip(if: $withName) } }"#
        );
    }

    #[test]
    fn conflicting_conditions_make_the_field_unconditional() {
        insta::assert_snapshot!(
            normalize(
                r#"
                query ($a: Boolean!) {
                  productBySlug(slug: "1") {
                    name @skip(if: $a)
                    name
                  }
                }
                "#,
                None,
            )
            .expect("to normalize"),
            @r#"query($a: Boolean!) { productBySlug(slug: "1") { name } }"#
        );
    }

    #[test]
    fn selects_operations_by_name() {
        let document = r#"
            query A { productBySlug(slug: "a") { id } }
            query B { productBySlug(slug: "b") { name } }
        "#;

        insta::assert_snapshot!(
            normalize(document, Some("B")).expect("to normalize"),
            @r#"query B { productBySlug(slug: "b") { name } }"#
        );
        assert!(matches!(
            normalize(document, None),
            Err(NormalizationError::MissingOperationToExecute { .. })
        ));
        assert_eq!(
            normalize(document, Some("C")),
            Err(NormalizationError::OperationNotFound {
                operation_name: "C".to_string()
            })
        );
    }

    #[test]
    fn reports_fragment_cycles_and_unknown_fields() {
        assert_eq!(
            normalize(
                r#"
                query { productBySlug(slug: "1") { ...A } }
                fragment A on Product { id ...B }
                fragment B on Product { name ...A }
                "#,
                None,
            ),
            Err(NormalizationError::FragmentCycle {
                fragment_name: "A".to_string()
            })
        );

        assert_eq!(
            normalize(r#"query { productBySlug(slug: "1") { weight } }"#, None),
            Err(NormalizationError::UnknownField {
                field_name: "weight".to_string(),
                type_name: "Product".to_string()
            })
        );

        assert_eq!(
            normalize("mutation { productBySlug(slug: \"1\") { id } }", None),
            Err(NormalizationError::MissingRootType {
                operation_kind: "mutation".to_string()
            })
        );
    }
}
