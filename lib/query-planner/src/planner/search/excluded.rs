use std::{collections::BTreeSet, sync::Arc};

/// Subgraphs a backlog item may not be resolved from.
///
/// A requirement is never fetched from the subgraph that needs it, and nested requirement
/// chains keep adding the subgraphs they already entered, which bounds the search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ExcludedSchemas {
    schema_names: Arc<BTreeSet<String>>,
}

impl ExcludedSchemas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, schema_name: &str) -> bool {
        self.schema_names.contains(schema_name)
    }

    pub fn is_empty(&self) -> bool {
        self.schema_names.is_empty()
    }

    pub fn next_with_schema(&self, schema_name: &str) -> Self {
        if self.contains(schema_name) {
            return self.clone();
        }

        let mut schema_names = (*self.schema_names).clone();
        schema_names.insert(schema_name.to_string());

        Self {
            schema_names: Arc::new(schema_names),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ExcludedSchemas;

    #[test]
    fn accumulates_without_touching_the_original() {
        let empty = ExcludedSchemas::new();
        let shipping = empty.next_with_schema("SHIPPING");
        let both = shipping.next_with_schema("REVIEWS");

        assert!(empty.is_empty());
        assert!(shipping.contains("SHIPPING") && !shipping.contains("REVIEWS"));
        assert!(both.contains("SHIPPING") && both.contains("REVIEWS"));
        assert_eq!(both.next_with_schema("REVIEWS"), both);
    }
}
