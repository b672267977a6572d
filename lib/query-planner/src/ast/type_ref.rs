use std::fmt::{Display, Formatter as FmtFormatter, Result as FmtResult};

use graphql_parser::query::Type as ParserType;

/// A GraphQL type reference (`[Product!]!`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Named(String),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

impl TypeRef {
    pub fn named_type(&self) -> &str {
        match self {
            TypeRef::Named(name) => name,
            TypeRef::List(inner) | TypeRef::NonNull(inner) => inner.named_type(),
        }
    }
}

impl From<&ParserType<'_, String>> for TypeRef {
    fn from(value: &ParserType<'_, String>) -> Self {
        match value {
            ParserType::NamedType(name) => TypeRef::Named(name.to_string()),
            ParserType::ListType(inner) => TypeRef::List(Box::new(inner.as_ref().into())),
            ParserType::NonNullType(inner) => TypeRef::NonNull(Box::new(inner.as_ref().into())),
        }
    }
}

impl Display for TypeRef {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        match self {
            TypeRef::Named(name) => write!(f, "{name}"),
            TypeRef::List(inner) => write!(f, "[{inner}]"),
            TypeRef::NonNull(inner) => write!(f, "{inner}!"),
        }
    }
}
