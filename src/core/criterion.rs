use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    /// The left operand is an array containing the right operand.
    #[serde(rename = "contains")]
    Contains,
    /// The left operand is one of the values of the right operand.
    #[serde(rename = "in")]
    In,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Equal => write!(f, "="),
            Operator::NotEqual => write!(f, "!="),
            Operator::Contains => write!(f, "contains"),
            Operator::In => write!(f, "in"),
        }
    }
}

/// A storage query predicate `left operator right`.
///
/// `left` is a dotted property path into the stored document, e.g.
/// `verifiableCredential.credential.type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Criterion {
    pub operand_left: String,
    pub operator: Operator,
    pub operand_right: Json,
}

impl Criterion {
    pub fn new(left: impl Into<String>, operator: Operator, right: impl Into<Json>) -> Self {
        Self {
            operand_left: left.into(),
            operator,
            operand_right: right.into(),
        }
    }

    /// Evaluate this criterion against a JSON document.
    ///
    /// A path that does not resolve only satisfies `!=`.
    pub fn matches(&self, document: &Json) -> bool {
        let value = self
            .operand_left
            .split('.')
            .try_fold(document, |current, segment| current.get(segment));

        match (self.operator, value) {
            (Operator::Equal, Some(value)) => value == &self.operand_right,
            (Operator::NotEqual, Some(value)) => value != &self.operand_right,
            (Operator::NotEqual, None) => true,
            (Operator::Contains, Some(Json::Array(values))) => {
                values.contains(&self.operand_right)
            }
            (Operator::In, Some(value)) => self
                .operand_right
                .as_array()
                .is_some_and(|candidates| candidates.contains(value)),
            _ => false,
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.operand_left, self.operator, self.operand_right
        )
    }
}

/// A conjunction of criteria.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub filter: Vec<Criterion>,
}

impl QuerySpec {
    pub fn new(filter: Vec<Criterion>) -> Self {
        Self { filter }
    }

    pub fn matches(&self, document: &Json) -> bool {
        self.filter.iter().all(|c| c.matches(document))
    }
}
