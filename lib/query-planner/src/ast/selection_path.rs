use std::{
    fmt::{Display, Formatter as FmtFormatter, Result as FmtResult},
    str::FromStr,
    sync::{Arc, LazyLock},
};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use super::{
    selection_item::SelectionItem,
    selection_set::{FieldSelection, InlineFragmentSelection, SelectionSet},
};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    /// A field, identified by its response key (alias or name).
    Field(String),
    /// An inline fragment, identified by its type condition.
    Fragment(String),
}

impl Display for PathSegment {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        match self {
            PathSegment::Field(name) => write!(f, "{name}"),
            PathSegment::Fragment(type_name) => write!(f, "|[{type_name}]"),
        }
    }
}

impl PathSegment {
    fn to_selection_node(&self, selections: SelectionSet) -> SelectionItem {
        match self {
            PathSegment::Field(name) => {
                let mut field = FieldSelection::new(name.as_str());
                field.selections = selections;
                SelectionItem::Field(field)
            }
            PathSegment::Fragment(type_name) => {
                SelectionItem::InlineFragment(InlineFragmentSelection {
                    type_condition: type_name.clone(),
                    selections,
                })
            }
        }
    }
}

static ROOT: LazyLock<SelectionPath> = LazyLock::new(|| SelectionPath {
    inner: Vec::new().into(),
});

/// A position in the response tree. Cloning is cheap and appending never mutates the original,
/// so many plan nodes can hold overlapping prefixes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SelectionPath {
    inner: Arc<[PathSegment]>,
}

impl Default for SelectionPath {
    fn default() -> Self {
        Self::root()
    }
}

impl SelectionPath {
    pub fn root() -> Self {
        ROOT.clone()
    }

    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self {
            inner: segments.into(),
        }
    }

    pub fn append_field(&self, response_key: &str) -> Self {
        self.push(PathSegment::Field(response_key.to_string()))
    }

    pub fn append_fragment(&self, type_name: &str) -> Self {
        self.push(PathSegment::Fragment(type_name.to_string()))
    }

    fn push(&self, segment: PathSegment) -> Self {
        let mut segments = Vec::with_capacity(self.inner.len() + 1);
        segments.extend_from_slice(&self.inner);
        segments.push(segment);
        Self::new(segments)
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.inner
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.inner.last()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn starts_with(&self, prefix: &SelectionPath) -> bool {
        self.inner.starts_with(&prefix.inner)
    }

    /// The remainder of this path below `prefix`.
    pub fn strip_prefix(&self, prefix: &SelectionPath) -> Option<SelectionPath> {
        if !self.starts_with(prefix) {
            return None;
        }

        if prefix.is_empty() {
            return Some(self.clone());
        }

        Some(Self {
            inner: Arc::from(&self.inner[prefix.len()..]),
        })
    }

    /// Rebuilds the selection that reaches this position, with `inner` as the innermost
    /// selection set. Returns `None` for the root path.
    pub fn to_selection_node(&self, inner: SelectionSet) -> Option<SelectionItem> {
        let (innermost, outer) = self.inner.split_last()?;
        let mut node = innermost.to_selection_node(inner);

        for segment in outer.iter().rev() {
            node = segment.to_selection_node(SelectionSet::new(vec![node]));
        }

        Some(node)
    }

    /// Like [`SelectionPath::to_selection_node`], but always yields a selection set;
    /// the root path yields `inner` itself.
    pub fn to_selection_set(&self, inner: SelectionSet) -> SelectionSet {
        if self.is_empty() {
            return inner;
        }

        SelectionSet::new(self.to_selection_node(inner).into_iter().collect())
    }
}

impl Display for SelectionPath {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        for (i, segment) in self.inner.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{segment}")?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid selection path segment '{0}'")]
pub struct SelectionPathParseError(String);

impl FromStr for SelectionPath {
    type Err = SelectionPathParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.is_empty() {
            return Ok(Self::root());
        }

        value
            .split('.')
            .map(|segment| {
                let fragment = segment
                    .strip_prefix("|[")
                    .and_then(|rest| rest.strip_suffix(']'));

                match fragment {
                    Some(type_name) if !type_name.is_empty() => {
                        Ok(PathSegment::Fragment(type_name.to_string()))
                    }
                    None if !segment.is_empty() && !segment.contains(['|', '[', ']']) => {
                        Ok(PathSegment::Field(segment.to_string()))
                    }
                    _ => Err(SelectionPathParseError(segment.to_string())),
                }
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }
}

impl Serialize for SelectionPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SelectionPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(de::Error::custom)
    }
}
