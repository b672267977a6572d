pub mod directives;
pub mod error;

use std::collections::BTreeSet;

use graphql_parser::{
    query::{Selection, TypeCondition},
    schema::{self as input, Definition, TypeDefinition},
};
use rustc_hash::FxHashMap;
use tracing::instrument;

use crate::{
    ast::{
        arguments::ArgumentsMap,
        operation::OperationKind,
        selection_item::SelectionItem,
        selection_set::{FieldSelection, InlineFragmentSelection, SelectionSet},
        type_ref::TypeRef,
        value::Value,
    },
    utils::parsing::{parse_schema, parse_selections},
};

use directives::{
    FusionDirective, FusionFieldDirective, FusionLookupDirective, FusionRequiresDirective,
};
use error::CompositeSchemaError;

static BUILTIN_SCALARS: [&str; 5] = ["String", "Int", "Float", "Boolean", "ID"];

pub type SchemaDocument = input::Document<'static, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Object,
    Interface,
    Union,
    Scalar,
    Enum,
    InputObject,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentDefinition {
    pub name: String,
    pub argument_type: TypeRef,
    pub default_value: Option<Value>,
}

/// One subgraph able to resolve a field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSource {
    pub schema_name: String,
    /// Selection against the parent type that the subgraph needs as input.
    /// For lookup sources this is the lookup key.
    pub requirements: Option<SelectionSet>,
    /// Subgraph field arguments receiving each top-level requirement, in order.
    pub argument_map: Vec<String>,
    pub is_lookup: bool,
}

impl FieldSource {
    fn new(schema_name: String) -> Self {
        Self {
            schema_name,
            requirements: None,
            argument_map: Vec::new(),
            is_lookup: false,
        }
    }

    /// Requirements the subgraph needs when the field is selected on an entity.
    /// A lookup key is only consumed when the lookup is used to enter the subgraph.
    pub fn field_requirements(&self) -> Option<&SelectionSet> {
        match self.is_lookup {
            true => None,
            false => self.requirements.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompositeField {
    pub name: String,
    pub arguments: Vec<ArgumentDefinition>,
    pub output_type: TypeRef,
    pub sources: Vec<FieldSource>,
}

impl CompositeField {
    pub fn argument(&self, name: &str) -> Option<&ArgumentDefinition> {
        self.arguments.iter().find(|argument| argument.name == name)
    }

    pub fn source(&self, schema_name: &str) -> Option<&FieldSource> {
        self.sources
            .iter()
            .find(|source| source.schema_name == schema_name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompositeType {
    pub name: String,
    pub kind: TypeKind,
    pub fields: FxHashMap<String, CompositeField>,
    pub possible_types: BTreeSet<String>,
}

impl CompositeType {
    fn new(name: &str, kind: TypeKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            fields: FxHashMap::default(),
            possible_types: BTreeSet::new(),
        }
    }
}

/// A root query field through which a subgraph fetches an entity by key.
#[derive(Debug, Clone, Copy)]
pub struct Lookup<'a> {
    pub field: &'a CompositeField,
    pub key: &'a SelectionSet,
}

/// The composed schema. Immutable once built and shared between planning calls.
#[derive(Debug)]
pub struct CompositeSchema {
    pub query_type: String,
    pub mutation_type: Option<String>,
    pub subscription_type: Option<String>,
    pub types: FxHashMap<String, CompositeType>,
    schema_names: BTreeSet<String>,
}

impl CompositeSchema {
    pub fn new_from_sdl(sdl: &str) -> Result<Self, CompositeSchemaError> {
        let document =
            parse_schema(sdl).map_err(|err| CompositeSchemaError::Parse(err.to_string()))?;

        Self::new(&document)
    }

    #[instrument(level = "trace", skip(document), name = "new_composite_schema")]
    pub fn new(document: &SchemaDocument) -> Result<Self, CompositeSchemaError> {
        let mut types = FxHashMap::default();
        let mut schema_names = BTreeSet::new();
        let mut implementations = Vec::new();
        let mut declared_roots = (None, None, None);

        for definition in &document.definitions {
            match definition {
                Definition::SchemaDefinition(schema) => {
                    declared_roots = (
                        schema.query.clone(),
                        schema.mutation.clone(),
                        schema.subscription.clone(),
                    );
                }
                Definition::TypeDefinition(type_definition) => {
                    let composite_type = match type_definition {
                        TypeDefinition::Scalar(scalar) => {
                            CompositeType::new(&scalar.name, TypeKind::Scalar)
                        }
                        TypeDefinition::Enum(enum_type) => {
                            CompositeType::new(&enum_type.name, TypeKind::Enum)
                        }
                        TypeDefinition::Object(object) => {
                            for interface in &object.implements_interfaces {
                                implementations.push((interface.clone(), object.name.clone()));
                            }
                            let mut composite_type =
                                CompositeType::new(&object.name, TypeKind::Object);
                            composite_type.possible_types.insert(object.name.clone());
                            composite_type.fields =
                                build_fields(&object.name, &object.fields, &mut schema_names)?;
                            composite_type
                        }
                        TypeDefinition::Interface(interface) => {
                            let mut composite_type =
                                CompositeType::new(&interface.name, TypeKind::Interface);
                            composite_type.fields = build_fields(
                                &interface.name,
                                &interface.fields,
                                &mut schema_names,
                            )?;
                            composite_type
                        }
                        TypeDefinition::Union(union_type) => {
                            let mut composite_type =
                                CompositeType::new(&union_type.name, TypeKind::Union);
                            composite_type
                                .possible_types
                                .extend(union_type.types.iter().cloned());
                            composite_type
                        }
                        TypeDefinition::InputObject(input_object) => {
                            let mut composite_type =
                                CompositeType::new(&input_object.name, TypeKind::InputObject);
                            composite_type.fields = input_object
                                .fields
                                .iter()
                                .map(|value| {
                                    (
                                        value.name.clone(),
                                        CompositeField {
                                            name: value.name.clone(),
                                            arguments: Vec::new(),
                                            output_type: (&value.value_type).into(),
                                            sources: Vec::new(),
                                        },
                                    )
                                })
                                .collect();
                            composite_type
                        }
                    };

                    types.insert(composite_type.name.clone(), composite_type);
                }
                _ => {}
            }
        }

        for scalar in BUILTIN_SCALARS {
            types
                .entry(scalar.to_string())
                .or_insert_with(|| CompositeType::new(scalar, TypeKind::Scalar));
        }

        for (interface, object) in implementations {
            if let Some(interface_type) = types.get_mut(&interface) {
                interface_type.possible_types.insert(object);
            }
        }

        let resolve_root = |declared: Option<String>, conventional: &str| {
            declared
                .or_else(|| Some(conventional.to_string()))
                .filter(|name| types.contains_key(name))
        };

        let query_type = resolve_root(declared_roots.0, "Query")
            .ok_or(CompositeSchemaError::MissingQueryType)?;
        let mutation_type = resolve_root(declared_roots.1, "Mutation");
        let subscription_type = resolve_root(declared_roots.2, "Subscription");

        Ok(Self {
            query_type,
            mutation_type,
            subscription_type,
            types,
            schema_names,
        })
    }

    pub fn type_definition(&self, name: &str) -> Option<&CompositeType> {
        self.types.get(name)
    }

    pub fn field(&self, type_name: &str, field_name: &str) -> Option<&CompositeField> {
        self.types.get(type_name)?.fields.get(field_name)
    }

    pub fn field_sources(&self, type_name: &str, field_name: &str) -> Option<&[FieldSource]> {
        self.field(type_name, field_name)
            .map(|field| field.sources.as_slice())
    }

    pub fn root_type_name(&self, kind: OperationKind) -> Option<&str> {
        match kind {
            OperationKind::Query => Some(self.query_type.as_str()),
            OperationKind::Mutation => self.mutation_type.as_deref(),
            OperationKind::Subscription => self.subscription_type.as_deref(),
        }
    }

    pub fn root_type(&self, kind: OperationKind) -> Option<&CompositeType> {
        self.root_type_name(kind)
            .and_then(|name| self.type_definition(name))
    }

    /// Root query fields that `schema_name` exposes as lookups returning exactly `type_name`,
    /// ordered by field name.
    pub fn lookups(&self, type_name: &str, schema_name: &str) -> Vec<Lookup<'_>> {
        let Some(query_type) = self.type_definition(&self.query_type) else {
            return Vec::new();
        };

        let mut lookups = query_type
            .fields
            .values()
            .filter(|field| field.output_type.named_type() == type_name)
            .filter_map(|field| {
                let source = field.source(schema_name)?;
                match (source.is_lookup, &source.requirements) {
                    (true, Some(key)) => Some(Lookup { field, key }),
                    _ => None,
                }
            })
            .collect::<Vec<_>>();

        lookups.sort_by(|a, b| a.field.name.cmp(&b.field.name));
        lookups
    }

    /// Every subgraph that resolves at least one field, sorted by name.
    pub fn schema_names(&self) -> impl Iterator<Item = &str> {
        self.schema_names.iter().map(String::as_str)
    }
}

fn build_fields(
    type_name: &str,
    fields: &[input::Field<'static, String>],
    schema_names: &mut BTreeSet<String>,
) -> Result<FxHashMap<String, CompositeField>, CompositeSchemaError> {
    fields
        .iter()
        .map(|field| {
            let coordinate = format!("{type_name}.{}", field.name);
            let composite_field = CompositeField {
                name: field.name.clone(),
                arguments: field
                    .arguments
                    .iter()
                    .map(|argument| ArgumentDefinition {
                        name: argument.name.clone(),
                        argument_type: (&argument.value_type).into(),
                        default_value: argument.default_value.as_ref().map(Value::from),
                    })
                    .collect(),
                output_type: (&field.field_type).into(),
                sources: build_sources(&coordinate, &field.directives)?,
            };

            schema_names.extend(
                composite_field
                    .sources
                    .iter()
                    .map(|source| source.schema_name.clone()),
            );

            Ok((field.name.clone(), composite_field))
        })
        .collect()
}

fn build_sources(
    coordinate: &str,
    directives: &[input::Directive<'static, String>],
) -> Result<Vec<FieldSource>, CompositeSchemaError> {
    let mut sources = directives
        .iter()
        .filter(|directive| FusionFieldDirective::is(directive))
        .map(|directive| {
            FusionFieldDirective::parse(directive, coordinate)
                .map(|parsed| FieldSource::new(parsed.schema))
        })
        .collect::<Result<Vec<_>, _>>()?;

    for directive in directives {
        if FusionRequiresDirective::is(directive) {
            let parsed = FusionRequiresDirective::parse(directive, coordinate)?;
            let requirements = parse_field_selection(
                FusionRequiresDirective::NAME,
                coordinate,
                &parsed.requirements,
            )?;
            let argument_map = match parsed.map {
                Some(map) => map,
                None => requirements
                    .items
                    .iter()
                    .filter_map(|item| match item {
                        SelectionItem::Field(field) => Some(field.name.clone()),
                        SelectionItem::InlineFragment(_) => None,
                    })
                    .collect(),
            };

            let source = source_mut(
                &mut sources,
                FusionRequiresDirective::NAME,
                coordinate,
                &parsed.schema,
            )?;
            source.requirements = Some(requirements);
            source.argument_map = argument_map;
        } else if FusionLookupDirective::is(directive) {
            let parsed = FusionLookupDirective::parse(directive, coordinate)?;
            let key =
                parse_field_selection(FusionLookupDirective::NAME, coordinate, &parsed.key)?;

            let source = source_mut(
                &mut sources,
                FusionLookupDirective::NAME,
                coordinate,
                &parsed.schema,
            )?;
            source.requirements = Some(key);
            source.is_lookup = true;
        }
    }

    Ok(sources)
}

fn source_mut<'a>(
    sources: &'a mut [FieldSource],
    directive: &str,
    coordinate: &str,
    schema_name: &str,
) -> Result<&'a mut FieldSource, CompositeSchemaError> {
    sources
        .iter_mut()
        .find(|source| source.schema_name == schema_name)
        .ok_or_else(|| CompositeSchemaError::UnknownSourceSchema {
            directive: directive.to_string(),
            coordinate: coordinate.to_string(),
            schema_name: schema_name.to_string(),
        })
}

fn parse_field_selection(
    directive: &str,
    coordinate: &str,
    selection: &str,
) -> Result<SelectionSet, CompositeSchemaError> {
    let invalid = |reason: String| CompositeSchemaError::InvalidSelection {
        directive: directive.to_string(),
        coordinate: coordinate.to_string(),
        selection: selection.to_string(),
        reason,
    };

    let selections = parse_selections(selection).map_err(|err| invalid(err.to_string()))?;
    let selection_set = selection_set_from_parser(&selections).map_err(invalid)?;

    match selection_set.is_empty() {
        true => Err(invalid("selection is empty".to_string())),
        false => Ok(selection_set),
    }
}

fn selection_set_from_parser(
    selections: &[Selection<'static, String>],
) -> Result<SelectionSet, String> {
    let mut selection_set = SelectionSet::default();

    for selection in selections {
        match selection {
            Selection::Field(field) => {
                let mut field_selection = FieldSelection::new(field.name.as_str());
                field_selection.alias = field.alias.clone();
                field_selection.arguments = ArgumentsMap::from(&field.arguments);
                field_selection.selections =
                    selection_set_from_parser(&field.selection_set.items)?;
                selection_set
                    .merge_item(field_selection.into())
                    .map_err(|err| err.to_string())?;
            }
            Selection::InlineFragment(fragment) => {
                let selections = selection_set_from_parser(&fragment.selection_set.items)?;
                match &fragment.type_condition {
                    Some(TypeCondition::On(type_name)) => {
                        let mut inline_fragment = InlineFragmentSelection::new(type_name.as_str());
                        inline_fragment.selections = selections;
                        selection_set
                            .merge_item(inline_fragment.into())
                            .map_err(|err| err.to_string())?;
                    }
                    None => selection_set
                        .merge(selections)
                        .map_err(|err| err.to_string())?,
                }
            }
            Selection::FragmentSpread(spread) => {
                return Err(format!(
                    "fragment spread '...{}' is not allowed",
                    spread.fragment_name
                ));
            }
        }
    }

    Ok(selection_set)
}

#[cfg(test)]
mod tests {
    use super::{error::CompositeSchemaError, CompositeSchema, TypeKind};
    use crate::ast::operation::OperationKind;

    const SDL: &str = r#"
        type Query {
          productById(id: ID!): Product
            @fusion__field(schema: "SHIPPING")
            @fusion__field(schema: "PRODUCTS")
            @fusion__lookup(schema: "SHIPPING", key: "id")
            @fusion__lookup(schema: "PRODUCTS", key: "id")
          productBySku(sku: String!): Product
            @fusion__field(schema: "SHIPPING")
            @fusion__lookup(schema: "SHIPPING", key: "sku")
        }

        interface Node {
          id: ID!
        }

        type Product implements Node {
          id: ID! @fusion__field(schema: "PRODUCTS") @fusion__field(schema: "SHIPPING")
          sku: String! @fusion__field(schema: "PRODUCTS")
          weight: Int! @fusion__field(schema: "PRODUCTS")
          deliveryEstimate(zip: String): Int!
            @fusion__field(schema: "SHIPPING")
            @fusion__requires(schema: "SHIPPING", requirements: "weight")
        }
    "#;

    #[test]
    fn reads_sources_in_declaration_order() {
        let schema = CompositeSchema::new_from_sdl(SDL).expect("to build");

        let sources = schema
            .field_sources("Query", "productById")
            .expect("field to exist");
        assert_eq!(
            sources.iter().map(|s| s.schema_name.as_str()).collect::<Vec<_>>(),
            vec!["SHIPPING", "PRODUCTS"]
        );
        assert!(sources.iter().all(|s| s.is_lookup));

        let delivery = schema
            .field("Product", "deliveryEstimate")
            .expect("field to exist");
        let source = &delivery.sources[0];
        assert_eq!(
            source.requirements.as_ref().map(|r| r.to_string()),
            Some("{ weight }".to_string())
        );
        assert_eq!(source.argument_map, vec!["weight".to_string()]);
        assert_eq!(
            delivery.argument("zip").map(|a| a.argument_type.to_string()),
            Some("String".to_string())
        );
    }

    #[test]
    fn resolves_root_types_and_possible_types() {
        let schema = CompositeSchema::new_from_sdl(SDL).expect("to build");

        assert_eq!(schema.root_type_name(OperationKind::Query), Some("Query"));
        assert_eq!(schema.root_type_name(OperationKind::Mutation), None);
        assert_eq!(
            schema.type_definition("ID").map(|t| t.kind),
            Some(TypeKind::Scalar)
        );
        assert!(schema
            .type_definition("Node")
            .is_some_and(|t| t.possible_types.contains("Product")));
        assert_eq!(
            schema.schema_names().collect::<Vec<_>>(),
            vec!["PRODUCTS", "SHIPPING"]
        );
    }

    #[test]
    fn lookups_are_ordered_by_field_name() {
        let schema = CompositeSchema::new_from_sdl(SDL).expect("to build");

        let lookups = schema.lookups("Product", "SHIPPING");
        assert_eq!(
            lookups
                .iter()
                .map(|l| (l.field.name.as_str(), l.key.to_string()))
                .collect::<Vec<_>>(),
            vec![
                ("productById", "{ id }".to_string()),
                ("productBySku", "{ sku }".to_string())
            ]
        );
        assert_eq!(schema.lookups("Product", "PRODUCTS").len(), 1);
        assert!(schema.lookups("Node", "SHIPPING").is_empty());
    }

    #[test]
    fn rejects_directive_for_unknown_source() {
        let result = CompositeSchema::new_from_sdl(
            r#"
            type Query {
              a: Int @fusion__field(schema: "A") @fusion__requires(schema: "B", requirements: "b")
              b: Int @fusion__field(schema: "A")
            }
            "#,
        );

        assert_eq!(
            result.err(),
            Some(CompositeSchemaError::UnknownSourceSchema {
                directive: "fusion__requires".to_string(),
                coordinate: "Query.a".to_string(),
                schema_name: "B".to_string(),
            })
        );
    }

    #[test]
    fn rejects_invalid_selections_and_missing_query() {
        let invalid = CompositeSchema::new_from_sdl(
            r#"
            type Query {
              a: Int @fusion__field(schema: "A") @fusion__requires(schema: "A", requirements: "b {")
            }
            "#,
        );
        assert!(matches!(
            invalid,
            Err(CompositeSchemaError::InvalidSelection { .. })
        ));

        let conflicting = CompositeSchema::new_from_sdl(
            r#"
            type Query {
              a: Int @fusion__field(schema: "A") @fusion__requires(schema: "A", requirements: "b b: c")
            }
            "#,
        );
        match conflicting {
            Err(CompositeSchemaError::InvalidSelection { reason, .. }) => {
                assert_eq!(reason, "selections 'b' and 'b: c' share the response key 'b'")
            }
            other => panic!("expected an invalid selection, got {other:?}"),
        }

        let missing = CompositeSchema::new_from_sdl("type Product { id: ID }");
        assert_eq!(missing.err(), Some(CompositeSchemaError::MissingQueryType));

        let unparsable = CompositeSchema::new_from_sdl("type {");
        assert!(matches!(unparsable, Err(CompositeSchemaError::Parse(_))));
    }
}
