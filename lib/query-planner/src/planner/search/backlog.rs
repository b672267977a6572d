use std::{
    cmp::Ordering,
    collections::BTreeSet,
    hash::{Hash, Hasher},
    sync::Arc,
};

use rustc_hash::FxHashSet;

use crate::ast::{selection_item::SelectionItem, selection_path::SelectionPath};

use super::{excluded::ExcludedSchemas, fetch_step::FetchStepId};

/// Priority of selections injected to satisfy a lookup key or a field requirement.
pub const REQUIREMENT_PRIORITY: i32 = -1;

/// One selection that still needs a subgraph.
#[derive(Debug, Clone)]
pub struct BacklogItem {
    pub priority: i32,
    /// Per planning call counter, makes the order total.
    pub sequence: u32,
    pub parent_path: SelectionPath,
    pub parent_type: String,
    pub selection: Arc<SelectionItem>,
    /// Step holding the parent selection, `None` for top-level selections.
    pub context: Option<FetchStepId>,
    pub excluded: ExcludedSchemas,
    /// Step consuming this selection as a requirement.
    pub requirement_of: Option<FetchStepId>,
}

impl BacklogItem {
    pub fn is_requirement(&self) -> bool {
        self.requirement_of.is_some()
    }

    /// Same position, selection, context, exclusions and consumer.
    pub fn is_equivalent(&self, other: &BacklogItem) -> bool {
        self.parent_path == other.parent_path
            && self.parent_type == other.parent_type
            && self.context == other.context
            && self.requirement_of == other.requirement_of
            && self.excluded == other.excluded
            && (Arc::ptr_eq(&self.selection, &other.selection) || self.selection == other.selection)
    }
}

impl PartialEq for BacklogItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for BacklogItem {}

impl PartialOrd for BacklogItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BacklogItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| self.sequence.cmp(&other.sequence))
    }
}

/// Hashes what [`BacklogItem::is_equivalent`] compares, so duplicates are found without
/// scanning the backlog.
#[derive(Debug, Clone)]
struct Equivalence(Arc<BacklogItem>);

impl Hash for Equivalence {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let item = &self.0;
        item.parent_path.hash(state);
        item.parent_type.hash(state);
        item.context.hash(state);
        item.requirement_of.hash(state);
        item.excluded.hash(state);
        match item.selection.as_ref() {
            SelectionItem::Field(field) => field.response_key().hash(state),
            SelectionItem::InlineFragment(fragment) => fragment.type_condition.hash(state),
        }
    }
}

impl PartialEq for Equivalence {
    fn eq(&self, other: &Self) -> bool {
        self.0.is_equivalent(&other.0)
    }
}

impl Eq for Equivalence {}

/// Pending selections of a search branch, lowest priority first. Items are shared between
/// the backlogs of sibling branches.
#[derive(Debug, Clone, Default)]
pub struct Backlog {
    items: BTreeSet<Arc<BacklogItem>>,
    index: FxHashSet<Equivalence>,
}

impl Backlog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns `false` when an equivalent item is already pending.
    pub fn insert(&mut self, item: BacklogItem) -> bool {
        let item = Arc::new(item);
        let equivalence = Equivalence(item.clone());

        if self.index.contains(&equivalence) || !self.items.insert(item) {
            return false;
        }

        self.index.insert(equivalence)
    }

    /// The next item to resolve and the backlog without it.
    pub fn split_first(&self) -> Option<(Arc<BacklogItem>, Backlog)> {
        let mut rest = self.clone();
        let first = rest.items.pop_first()?;
        rest.index.remove(&Equivalence(first.clone()));

        Some((first, rest))
    }

    pub fn iter(&self) -> impl Iterator<Item = &BacklogItem> {
        self.items.iter().map(|item| item.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{Backlog, BacklogItem, REQUIREMENT_PRIORITY};
    use crate::{
        ast::{
            selection_item::SelectionItem, selection_path::SelectionPath,
            selection_set::FieldSelection,
        },
        planner::search::{excluded::ExcludedSchemas, fetch_step::FetchStepId},
    };

    fn item(name: &str, priority: i32, sequence: u32) -> BacklogItem {
        BacklogItem {
            priority,
            sequence,
            parent_path: SelectionPath::root().append_field("product"),
            parent_type: "Product".to_string(),
            selection: Arc::new(SelectionItem::Field(FieldSelection::new(name))),
            context: Some(FetchStepId(0)),
            excluded: ExcludedSchemas::new(),
            requirement_of: None,
        }
    }

    #[test]
    fn requirements_come_first_then_insertion_order() {
        let mut backlog = Backlog::new();
        backlog.insert(item("name", 0, 1));
        backlog.insert(item("price", 0, 2));
        backlog.insert(item("id", REQUIREMENT_PRIORITY, 3));

        let order = backlog
            .iter()
            .map(|item| item.selection.to_string())
            .collect::<Vec<_>>();
        assert_eq!(order, vec!["id", "name", "price"]);

        let (first, rest) = backlog.split_first().expect("not empty");
        assert_eq!(first.selection.to_string(), "id");
        assert_eq!(rest.len(), 2);
        assert_eq!(backlog.len(), 3);
    }

    #[test]
    fn split_keeps_duplicate_tracking_per_branch() {
        let mut backlog = Backlog::new();
        backlog.insert(item("id", 0, 1));
        backlog.insert(item("name", 0, 2));

        let (first, mut rest) = backlog.split_first().expect("not empty");
        assert!(Arc::ptr_eq(
            &first,
            &backlog.split_first().expect("not empty").0
        ));

        // the resolved item may be queued again on its own branch only
        assert!(rest.insert(BacklogItem {
            sequence: 3,
            ..(*first).clone()
        }));
        assert!(!backlog.insert(BacklogItem {
            sequence: 4,
            ..(*first).clone()
        }));
        assert!(!rest.insert(item("name", 0, 5)));
        assert_eq!(rest.len(), 2);
    }

    #[test]
    fn deduplicates_equivalent_items() {
        let mut backlog = Backlog::new();
        let mut key = item("id", REQUIREMENT_PRIORITY, 1);
        key.requirement_of = Some(FetchStepId(1));

        assert!(backlog.insert(key.clone()));
        assert!(!backlog.insert(BacklogItem { sequence: 2, ..key.clone() }));

        // a different consumer is a different requirement
        assert!(backlog.insert(BacklogItem {
            sequence: 3,
            requirement_of: Some(FetchStepId(2)),
            ..key.clone()
        }));
        assert!(backlog.insert(BacklogItem {
            sequence: 4,
            excluded: key.excluded.next_with_schema("SHIPPING"),
            ..key
        }));
        assert_eq!(backlog.len(), 3);
    }
}
