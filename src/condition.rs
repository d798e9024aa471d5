// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Boolean condition trees evaluated against a form snapshot.
//!
//! ```json
//! { "and": [
//!     { "field": "./type", "operator": "==", "value": "work" },
//!     { "or": [ { "field": "age", "operator": ">=", "value": 18 },
//!               { "field": "guardian", "operator": "isNotEmpty" } ] }
//! ] }
//! ```
//!
//! Conditions never fail to evaluate: a missing field reads as `Undefined` and
//! an operator this version does not know evaluates to `false`.

use crate::path::RuntimePath;
use crate::value::Value;

use core::cmp::Ordering;
use core::convert::Infallible;
use core::fmt;
use core::str::FromStr;
use std::rc::Rc;

use serde::de::{self, Deserializer};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    In,
    NotIn,
    Includes,
    NotIncludes,
    IsEmpty,
    IsNotEmpty,
    Unknown(Rc<str>),
}

impl FromStr for Operator {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "==" | "===" => Operator::Eq,
            "!=" | "!==" => Operator::Ne,
            ">" => Operator::Gt,
            "<" => Operator::Lt,
            ">=" => Operator::Ge,
            "<=" => Operator::Le,
            "in" => Operator::In,
            "notIn" => Operator::NotIn,
            "includes" => Operator::Includes,
            "notIncludes" => Operator::NotIncludes,
            "isEmpty" => Operator::IsEmpty,
            "isNotEmpty" => Operator::IsNotEmpty,
            other => Operator::Unknown(other.into()),
        })
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::In => "in",
            Operator::NotIn => "notIn",
            Operator::Includes => "includes",
            Operator::NotIncludes => "notIncludes",
            Operator::IsEmpty => "isEmpty",
            Operator::IsNotEmpty => "isNotEmpty",
            Operator::Unknown(op) => op,
        })
    }
}

impl Operator {
    pub fn apply(&self, field: &Value, compare: &Value) -> bool {
        match self {
            Operator::Eq => field == compare,
            Operator::Ne => field != compare,
            Operator::Gt => Self::ordering(field, compare) == Some(Ordering::Greater),
            Operator::Lt => Self::ordering(field, compare) == Some(Ordering::Less),
            Operator::Ge => matches!(
                Self::ordering(field, compare),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::Le => matches!(
                Self::ordering(field, compare),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::In => Self::member(field, compare),
            Operator::NotIn => !Self::member(field, compare),
            Operator::Includes => Self::includes(field, compare),
            Operator::NotIncludes => !Self::includes(field, compare),
            Operator::IsEmpty => field.is_absent(),
            Operator::IsNotEmpty => !field.is_absent(),
            Operator::Unknown(_) => false,
        }
    }

    // Numbers order numerically and strings lexicographically; any other
    // pairing is unordered.
    fn ordering(a: &Value, b: &Value) -> Option<Ordering> {
        match (a, b) {
            (Value::Number(x), Value::Number(y)) => Some(x.cmp(y)),
            (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
            _ => None,
        }
    }

    fn member(field: &Value, list: &Value) -> bool {
        match list {
            Value::Array(items) => items.contains(field),
            _ => false,
        }
    }

    fn includes(field: &Value, needle: &Value) -> bool {
        match (field, needle) {
            (Value::Array(items), _) => items.contains(needle),
            (Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_ref()),
            _ => false,
        }
    }
}

/// Something a condition leaf can read from a snapshot.
pub trait FieldPath {
    fn read(&self, snapshot: &Value) -> Value;
}

impl FieldPath for RuntimePath {
    fn read(&self, snapshot: &Value) -> Value {
        snapshot.lookup(self)
    }
}

impl FieldPath for Rc<str> {
    fn read(&self, snapshot: &Value) -> Value {
        match RuntimePath::parse(self) {
            Ok(path) => snapshot.lookup(&path),
            Err(_) => Value::Undefined,
        }
    }
}

/// A condition expression. `P` is the field reference type: declarative
/// strings as authored, or resolved [`RuntimePath`]s once instantiated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition<P = Rc<str>> {
    Leaf {
        field: P,
        operator: Operator,
        value: Value,
    },
    And(Vec<Condition<P>>),
    Or(Vec<Condition<P>>),
    Not(Box<Condition<P>>),
}

impl<P: FieldPath> Condition<P> {
    pub fn evaluate(&self, snapshot: &Value) -> bool {
        match self {
            Condition::Leaf {
                field,
                operator,
                value,
            } => operator.apply(&field.read(snapshot), value),
            Condition::And(children) => children.iter().all(|c| c.evaluate(snapshot)),
            Condition::Or(children) => children.iter().any(|c| c.evaluate(snapshot)),
            Condition::Not(child) => !child.evaluate(snapshot),
        }
    }
}

impl<P> Condition<P> {
    /// Field references of every leaf, depth-first.
    pub fn fields(&self) -> Vec<&P> {
        let mut fields = vec![];
        let mut stack = vec![self];
        while let Some(c) = stack.pop() {
            match c {
                Condition::Leaf { field, .. } => fields.push(field),
                Condition::And(children) | Condition::Or(children) => {
                    stack.extend(children.iter().rev())
                }
                Condition::Not(child) => stack.push(child),
            }
        }
        fields
    }

    /// Rebuilds the tree with every field reference mapped through `f`.
    pub fn map_fields<Q, E>(
        &self,
        f: &mut impl FnMut(&P) -> Result<Q, E>,
    ) -> Result<Condition<Q>, E> {
        Ok(match self {
            Condition::Leaf {
                field,
                operator,
                value,
            } => Condition::Leaf {
                field: f(field)?,
                operator: operator.clone(),
                value: value.clone(),
            },
            Condition::And(children) => Condition::And(
                children
                    .iter()
                    .map(|c| c.map_fields(f))
                    .collect::<Result<_, _>>()?,
            ),
            Condition::Or(children) => Condition::Or(
                children
                    .iter()
                    .map(|c| c.map_fields(f))
                    .collect::<Result<_, _>>()?,
            ),
            Condition::Not(child) => Condition::Not(Box::new(child.map_fields(f)?)),
        })
    }
}

impl Condition {
    pub fn leaf(field: &str, operator: &str, value: Value) -> Self {
        Condition::Leaf {
            field: field.into(),
            operator: operator.parse().unwrap_or_else(|e: Infallible| match e {}),
            value,
        }
    }

    /// Whether a JSON object has the shape of a condition rather than a schema.
    pub fn looks_like(v: &serde_json::Value) -> bool {
        match v {
            serde_json::Value::Object(o) => {
                o.contains_key("field")
                    || o.contains_key("and")
                    || o.contains_key("or")
                    || o.get("not").is_some_and(Self::looks_like)
            }
            _ => false,
        }
    }

    pub fn from_json(v: &serde_json::Value) -> Result<Self, String> {
        let obj = match v {
            serde_json::Value::Object(o) => o,
            _ => return Err(format!("condition must be an object, found `{v}`")),
        };

        let children = |key: &str, items: &serde_json::Value| -> Result<Vec<Condition>, String> {
            match items {
                serde_json::Value::Array(items) => items.iter().map(Self::from_json).collect(),
                _ => Err(format!("`{key}` must be a list of conditions")),
            }
        };

        if let Some(items) = obj.get("and") {
            return Ok(Condition::And(children("and", items)?));
        }
        if let Some(items) = obj.get("or") {
            return Ok(Condition::Or(children("or", items)?));
        }
        if let Some(inner) = obj.get("not") {
            return Ok(Condition::Not(Box::new(Self::from_json(inner)?)));
        }

        let field = match obj.get("field") {
            Some(serde_json::Value::String(s)) => s.as_str(),
            Some(_) => return Err("`field` must be a string".to_string()),
            None => return Err("condition must have one of `field`, `and`, `or`, `not`".into()),
        };
        let operator = match obj.get("operator").or_else(|| obj.get("op")) {
            Some(serde_json::Value::String(s)) => s.as_str(),
            Some(_) => return Err("`operator` must be a string".to_string()),
            None => "==",
        };
        let value = obj
            .get("value")
            .or_else(|| obj.get("compareValue"))
            .cloned()
            .map(Value::from)
            .unwrap_or(Value::Null);

        Ok(Condition::leaf(field, operator, value))
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v: serde_json::Value = Deserialize::deserialize(deserializer)?;
        Condition::from_json(&v).map_err(de::Error::custom)
    }
}
