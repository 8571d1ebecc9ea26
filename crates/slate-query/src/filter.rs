use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::operator::Operator;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, operator: Operator, value: Value) -> Self {
        Self { field: field.into(), operator, value }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOp {
    And,
    Or,
}

/// A filter tree node: either a leaf condition, a nested group, or the
/// negation of a node (`$not`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterNode {
    Condition(Filter),
    Group(FilterGroup),
    Not(Box<FilterNode>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterGroup {
    pub logical: LogicalOp,
    pub children: Vec<FilterNode>,
}

impl FilterGroup {
    pub fn and(children: Vec<FilterNode>) -> Self {
        Self { logical: LogicalOp::And, children }
    }

    pub fn or(children: Vec<FilterNode>) -> Self {
        Self { logical: LogicalOp::Or, children }
    }
}
