use std::{
    collections::BTreeSet,
    fmt::{Display, Formatter as FmtFormatter, Result as FmtResult},
};

use super::selection_set::{FieldSelection, InlineFragmentSelection, SelectionSet};

#[derive(Clone, Debug, PartialEq)]
pub enum SelectionItem {
    Field(FieldSelection),
    InlineFragment(InlineFragmentSelection),
}

impl SelectionItem {
    pub fn selection_set(&self) -> &SelectionSet {
        match self {
            SelectionItem::Field(FieldSelection { selections, .. }) => selections,
            SelectionItem::InlineFragment(InlineFragmentSelection { selections, .. }) => selections,
        }
    }

    pub fn variable_usages(&self, usages: &mut BTreeSet<String>) {
        match self {
            SelectionItem::Field(field) => field.variable_usages(usages),
            SelectionItem::InlineFragment(fragment) => fragment.selections.variable_usages(usages),
        }
    }
}

impl Display for SelectionItem {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        match self {
            SelectionItem::Field(field) => write!(f, "{field}"),
            SelectionItem::InlineFragment(fragment) => write!(f, "{fragment}"),
        }
    }
}

impl From<FieldSelection> for SelectionItem {
    fn from(field: FieldSelection) -> Self {
        SelectionItem::Field(field)
    }
}

impl From<InlineFragmentSelection> for SelectionItem {
    fn from(fragment: InlineFragmentSelection) -> Self {
        SelectionItem::InlineFragment(fragment)
    }
}
