use graphql_parser::{query, schema};

#[inline]
pub fn parse_schema(
    sdl: &str,
) -> Result<schema::Document<'static, String>, schema::ParseError> {
    graphql_parser::parse_schema::<String>(sdl).map(|doc| doc.into_static())
}

#[inline]
pub fn parse_operation(
    operation: &str,
) -> Result<query::Document<'static, String>, query::ParseError> {
    graphql_parser::parse_query::<String>(operation).map(|doc| doc.into_static())
}

/// Parses a bare selection string such as `id dimensions { weight }`.
pub fn parse_selections(
    selection: &str,
) -> Result<Vec<query::Selection<'static, String>>, query::ParseError> {
    let document = parse_operation(&format!("{{ {selection} }}"))?;

    Ok(document
        .definitions
        .into_iter()
        .find_map(|definition| match definition {
            query::Definition::Operation(query::OperationDefinition::SelectionSet(set)) => {
                Some(set.items)
            }
            _ => None,
        })
        .unwrap_or_default())
}
