use crate::{
    ast::{operation::OperationKind, selection_path::SelectionPath},
    utils::pretty_display::{get_indent, PrettyDisplay},
};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter as FmtFormatter, Result as FmtResult};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanFormatError {
    #[error("failed to serialize operation plan: {0}")]
    Serialize(String),
    #[error("failed to deserialize operation plan: {0}")]
    Deserialize(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationPlan {
    pub operation_kind: OperationKind,
    pub nodes: Vec<OperationExecutionNode>,
}

/// One sub-operation sent to a single subgraph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationExecutionNode {
    pub id: u32,
    pub schema_name: String,
    /// Position of the node's results in the final response. Empty for root nodes.
    #[serde(default, skip_serializing_if = "SelectionPath::is_empty")]
    pub path: SelectionPath,
    pub operation: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<OperationRequirement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<u32>,
}

/// A variable of the sub-operation, filled from data of the dependencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRequirement {
    pub key: String,
    /// Where in the response the value is read from.
    pub path: SelectionPath,
    /// The selection that produces the value, relative to `path`.
    pub selection_map: String,
}

impl OperationPlan {
    pub fn node(&self, id: u32) -> Option<&OperationExecutionNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn to_json(&self) -> Result<String, PlanFormatError> {
        sonic_rs::to_string(self).map_err(|e| PlanFormatError::Serialize(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, PlanFormatError> {
        sonic_rs::from_str(json).map_err(|e| PlanFormatError::Deserialize(e.to_string()))
    }
}

impl Display for OperationPlan {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        self.pretty_fmt(f, 0)
    }
}

impl Display for OperationExecutionNode {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        self.pretty_fmt(f, 0)
    }
}

impl PrettyDisplay for OperationPlan {
    fn pretty_fmt(&self, f: &mut FmtFormatter<'_>, depth: usize) -> FmtResult {
        let indent = get_indent(depth);
        if self.nodes.is_empty() {
            return writeln!(f, "{indent}nodes: []");
        }

        writeln!(f, "{indent}nodes:")?;
        for node in &self.nodes {
            node.pretty_fmt(f, depth + 1)?;
        }

        Ok(())
    }
}

impl PrettyDisplay for OperationExecutionNode {
    fn pretty_fmt(&self, f: &mut FmtFormatter<'_>, depth: usize) -> FmtResult {
        let indent = get_indent(depth);
        writeln!(f, "{indent}- id: {}", self.id)?;
        writeln!(f, "{indent}  schema: {}", self.schema_name)?;
        if !self.path.is_empty() {
            writeln!(f, "{indent}  path: {}", self.path)?;
        }
        writeln!(f, "{indent}  operation: >-")?;
        writeln!(f, "{indent}    {}", self.operation)?;

        if !self.requirements.is_empty() {
            writeln!(f, "{indent}  requirements:")?;
            for requirement in &self.requirements {
                requirement.pretty_fmt(f, depth + 2)?;
            }
        }

        if !self.dependencies.is_empty() {
            writeln!(f, "{indent}  dependencies:")?;
            for dependency in &self.dependencies {
                writeln!(f, "{indent}    - id: {dependency}")?;
            }
        }

        Ok(())
    }
}

impl PrettyDisplay for OperationRequirement {
    fn pretty_fmt(&self, f: &mut FmtFormatter<'_>, depth: usize) -> FmtResult {
        let indent = get_indent(depth);
        writeln!(f, "{indent}- name: {}", self.key)?;
        if !self.path.is_empty() {
            writeln!(f, "{indent}  selectionSet: {}", self.path)?;
        }
        writeln!(f, "{indent}  selectionMap: {}", self.selection_map)
    }
}

#[cfg(test)]
mod tests {
    use super::{OperationExecutionNode, OperationPlan, OperationRequirement, PlanFormatError};
    use crate::ast::{operation::OperationKind, selection_path::SelectionPath};

    fn plan() -> OperationPlan {
        let path: SelectionPath = "productBySlug".parse().expect("valid path");

        OperationPlan {
            operation_kind: OperationKind::Query,
            nodes: vec![
                OperationExecutionNode {
                    id: 1,
                    schema_name: "PRODUCTS".to_string(),
                    path: SelectionPath::root(),
                    operation: r#"query { productBySlug(slug: "1") { name id } }"#.to_string(),
                    requirements: vec![],
                    dependencies: vec![],
                },
                OperationExecutionNode {
                    id: 2,
                    schema_name: "SHIPPING".to_string(),
                    path: path.clone(),
                    operation: "query($__fusion_2_id: ID!) { productById(id: $__fusion_2_id) { inStock } }"
                        .to_string(),
                    requirements: vec![OperationRequirement {
                        key: "__fusion_2_id".to_string(),
                        path,
                        selection_map: "id".to_string(),
                    }],
                    dependencies: vec![1],
                },
            ],
        }
    }

    #[test]
    fn renders_yaml_like_text() {
        insta::assert_snapshot!(plan(), @r#"
        nodes:
          - id: 1
            schema: PRODUCTS
            operation: >-
              query { productBySlug(slug: "1") { name id } }
          - id: 2
            schema: SHIPPING
            path: productBySlug
            operation: >-
              query($__fusion_2_id: ID!) { productById(id: $__fusion_2_id) { inStock } }
            requirements:
              - name: __fusion_2_id
                selectionSet: productBySlug
                selectionMap: id
            dependencies:
              - id: 1
        "#);
    }

    #[test]
    fn json_uses_camel_case_and_skips_empty_fields() {
        let json = plan().to_json().expect("to serialize");

        assert!(json.contains(r#""operationKind":"query""#));
        assert!(json.contains(r#""schemaName":"PRODUCTS""#));
        assert!(json.contains(r#""selectionMap":"id""#));
        assert!(json.contains(r#""path":"productBySlug""#));
        assert_eq!(json.matches(r#""dependencies""#).count(), 1);
        assert_eq!(OperationPlan::from_json(&json), Ok(plan()));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            OperationPlan::from_json(r#"{"operationKind":"query","nodes":[{"id":"one"}]}"#),
            Err(PlanFormatError::Deserialize(_))
        ));
    }
}
