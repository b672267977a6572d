use std::{
    collections::BTreeSet,
    fmt::{Display, Formatter as FmtFormatter, Result as FmtResult},
};

use super::{
    arguments::ArgumentsMap,
    selection_item::SelectionItem,
    selection_path::{PathSegment, SelectionPath},
};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SelectionMergeError {
    #[error("selections '{existing}' and '{incoming}' share the response key '{response_key}'")]
    Conflict {
        response_key: String,
        existing: String,
        incoming: String,
    },
    #[error("no selection '{0}' to merge into")]
    MissingParent(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionSet {
    pub items: Vec<SelectionItem>,
}

impl SelectionSet {
    pub fn new(items: Vec<SelectionItem>) -> Self {
        Self { items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Merges `item` into the set. Fields are matched by response key and inline fragments by
    /// type condition. Two fields sharing a response key must select the same field with the
    /// same arguments and conditions; their children are merged.
    pub fn merge_item(&mut self, item: SelectionItem) -> Result<(), SelectionMergeError> {
        match item {
            SelectionItem::Field(field) => match self.field_mut(field.response_key()) {
                Some(existing) if existing.is_mergeable_with(&field) => {
                    existing.selections.merge(field.selections)
                }
                Some(existing) => Err(SelectionMergeError::Conflict {
                    response_key: field.response_key().to_string(),
                    existing: existing.shallow().to_string(),
                    incoming: field.shallow().to_string(),
                }),
                None => {
                    self.items.push(SelectionItem::Field(field));
                    Ok(())
                }
            },
            SelectionItem::InlineFragment(fragment) => {
                match self.fragment_mut(&fragment.type_condition) {
                    Some(existing) => existing.selections.merge(fragment.selections),
                    None => {
                        self.items.push(SelectionItem::InlineFragment(fragment));
                        Ok(())
                    }
                }
            }
        }
    }

    pub fn merge(&mut self, other: SelectionSet) -> Result<(), SelectionMergeError> {
        other
            .items
            .into_iter()
            .try_for_each(|item| self.merge_item(item))
    }

    /// Merges `item` below `path`. Field segments must already be selected, so the item lands
    /// under the actual field with its alias and arguments. Missing inline fragments are
    /// added on the way.
    pub fn merge_at(
        &mut self,
        path: &SelectionPath,
        item: SelectionItem,
    ) -> Result<(), SelectionMergeError> {
        self.merge_below(path.segments(), item)
    }

    fn merge_below(
        &mut self,
        segments: &[PathSegment],
        item: SelectionItem,
    ) -> Result<(), SelectionMergeError> {
        let Some((segment, rest)) = segments.split_first() else {
            return self.merge_item(item);
        };

        let selections = match segment {
            PathSegment::Field(response_key) => self
                .field_mut(response_key)
                .map(|field| &mut field.selections)
                .ok_or_else(|| SelectionMergeError::MissingParent(response_key.clone()))?,
            PathSegment::Fragment(type_condition) => {
                if self.fragment_mut(type_condition).is_none() {
                    return self.merge_wrapped(segments, item);
                }
                self.fragment_mut(type_condition)
                    .map(|fragment| &mut fragment.selections)
                    .ok_or_else(|| SelectionMergeError::MissingParent(segment.to_string()))?
            }
        };

        selections.merge_below(rest, item)
    }

    /// Adds `item` wrapped in the fragments of `segments`, none of which exist yet.
    fn merge_wrapped(
        &mut self,
        segments: &[PathSegment],
        item: SelectionItem,
    ) -> Result<(), SelectionMergeError> {
        if let Some(field) = segments
            .iter()
            .find(|segment| matches!(segment, PathSegment::Field(_)))
        {
            return Err(SelectionMergeError::MissingParent(field.to_string()));
        }

        let path = SelectionPath::new(segments.to_vec());
        match path.to_selection_node(SelectionSet::new(vec![item])) {
            Some(wrapped) => self.merge_item(wrapped),
            None => Ok(()),
        }
    }

    /// Fields selected directly or through inline fragments, in document order.
    pub fn object_fields(&self) -> Vec<&FieldSelection> {
        let mut fields = Vec::new();
        self.collect_object_fields(&mut fields);
        fields
    }

    fn collect_object_fields<'s>(&'s self, fields: &mut Vec<&'s FieldSelection>) {
        for item in &self.items {
            match item {
                SelectionItem::Field(field) => fields.push(field),
                SelectionItem::InlineFragment(fragment) => {
                    fragment.selections.collect_object_fields(fields)
                }
            }
        }
    }

    /// Every field selected at `path`, looking through inline fragments. Fields of
    /// different fragments that share a response key are all followed.
    pub fn fields_at(&self, path: &SelectionPath) -> Vec<&FieldSelection> {
        let mut fields = self.object_fields();

        for segment in path.segments() {
            if let PathSegment::Field(response_key) = segment {
                fields = fields
                    .into_iter()
                    .filter(|field| field.response_key() == response_key)
                    .flat_map(|field| field.selections.object_fields())
                    .collect();
            }
        }

        fields
    }

    pub fn field(&self, response_key: &str) -> Option<&FieldSelection> {
        self.items.iter().find_map(|item| match item {
            SelectionItem::Field(field) if field.response_key() == response_key => Some(field),
            _ => None,
        })
    }

    pub fn field_mut(&mut self, response_key: &str) -> Option<&mut FieldSelection> {
        self.items.iter_mut().find_map(|item| match item {
            SelectionItem::Field(field) if field.response_key() == response_key => Some(field),
            _ => None,
        })
    }

    pub fn fragment_mut(&mut self, type_condition: &str) -> Option<&mut InlineFragmentSelection> {
        self.items.iter_mut().find_map(|item| match item {
            SelectionItem::InlineFragment(fragment) if fragment.type_condition == type_condition => {
                Some(fragment)
            }
            _ => None,
        })
    }

    pub fn variable_usages(&self, usages: &mut BTreeSet<String>) {
        for item in &self.items {
            item.variable_usages(usages);
        }
    }
}

impl Display for SelectionSet {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        write!(f, "{{")?;
        for item in &self.items {
            write!(f, " {item}")?;
        }
        write!(f, " }}")
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldSelection {
    pub name: String,
    pub alias: Option<String>,
    pub arguments: ArgumentsMap,
    pub skip_if: Option<String>,
    pub include_if: Option<String>,
    pub selections: SelectionSet,
}

impl FieldSelection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            arguments: ArgumentsMap::new(),
            skip_if: None,
            include_if: None,
            selections: SelectionSet::default(),
        }
    }

    pub fn is_typename(&self) -> bool {
        self.name == "__typename"
    }

    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Whether both select the same data under the same response key.
    pub fn is_mergeable_with(&self, other: &FieldSelection) -> bool {
        self.response_key() == other.response_key()
            && self.name == other.name
            && self.arguments == other.arguments
            && self.skip_if == other.skip_if
            && self.include_if == other.include_if
    }

    /// The same field without its sub-selections.
    pub fn shallow(&self) -> Self {
        Self {
            name: self.name.clone(),
            alias: self.alias.clone(),
            arguments: self.arguments.clone(),
            skip_if: self.skip_if.clone(),
            include_if: self.include_if.clone(),
            selections: SelectionSet::default(),
        }
    }

    pub fn variable_usages(&self, usages: &mut BTreeSet<String>) {
        self.arguments.variable_usages(usages);
        usages.extend(self.skip_if.iter().cloned());
        usages.extend(self.include_if.iter().cloned());
        self.selections.variable_usages(usages);
    }
}

impl Display for FieldSelection {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        if let Some(alias) = &self.alias {
            write!(f, "{alias}: ")?;
        }
        write!(f, "{}{}", self.name, self.arguments)?;
        if let Some(variable) = &self.skip_if {
            write!(f, " @skip(if: ${variable})")?;
        }
        if let Some(variable) = &self.include_if {
            write!(f, " @include(if: ${variable})")?;
        }
        if !self.selections.is_empty() {
            write!(f, " {}", self.selections)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct InlineFragmentSelection {
    pub type_condition: String,
    pub selections: SelectionSet,
}

impl InlineFragmentSelection {
    pub fn new(type_condition: impl Into<String>) -> Self {
        Self {
            type_condition: type_condition.into(),
            selections: SelectionSet::default(),
        }
    }
}

impl Display for InlineFragmentSelection {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        write!(f, "... on {}", self.type_condition)?;
        if !self.selections.is_empty() {
            write!(f, " {}", self.selections)?;
        }
        Ok(())
    }
}
