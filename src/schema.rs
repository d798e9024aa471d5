// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Form schemas.
//!
//! A form schema is a JSON Schema dialect describing the shape of a form's data
//! together with the annotations a form runtime needs:
//!
//! ```json
//! {
//!   "type": "object",
//!   "properties": {
//!     "contacts": {
//!       "type": "array",
//!       "items": {
//!         "type": "object",
//!         "properties": {
//!           "type": { "type": "string", "enum": ["personal", "work"] },
//!           "companyName": {
//!             "type": "string",
//!             "title": "Company",
//!             "linkage": {
//!               "kind": "visibility",
//!               "when": { "field": "./type", "operator": "==", "value": "work" }
//!             }
//!           }
//!         }
//!       }
//!     },
//!     "address": {
//!       "type": "object",
//!       "flatten": true,
//!       "properties": { "city": { "type": "string" }, "zip": { "type": "string" } }
//!     }
//!   },
//!   "if": { "field": "country", "operator": "==", "value": "china" },
//!   "then": { "required": ["idCard"] },
//!   "else": { "required": ["ssn"] }
//! }
//! ```
//!
//! Unlike a general purpose JSON Schema implementation, unknown keywords are
//! ignored: form schemas routinely carry presentation hints meant for other
//! consumers. The schema is immutable once loaded.
//!
//! Supported keywords:
//!
//! - **Shape**: `type`, `properties` (authoring order is kept), `items`, `flatten`
//! - **Presentation**: `title`, `description`, `default`, `messages`
//! - **Linkage**: `linkage`, a single rule or a list of rules
//! - **Conditional validation**: `required`, `dependencies`, `if`/`then`/`else`,
//!   `allOf`, `anyOf`, `oneOf`
//! - **String constraints**: `minLength`, `maxLength`, `pattern`, `format`
//! - **Numeric constraints**: `minimum`, `maximum`, `exclusiveMinimum`,
//!   `exclusiveMaximum`, `multipleOf`
//! - **Array constraints**: `minItems`, `maxItems`, `uniqueItems`
//! - **Object constraints**: `minProperties`, `maxProperties`
//! - **Value constraints**: `const`, `enum`

use crate::condition::Condition;
use crate::linkage::LinkageRule;
use crate::number::Number;
use crate::value::Value;

use core::fmt;
use core::ops::Deref;
use std::collections::BTreeMap;
use std::rc::Rc;

use indexmap::IndexMap;
use regex::Regex;
use serde::de::{self, Deserializer};
use serde::Deserialize;

pub mod error;
pub mod format;
pub mod validate;
pub mod walker;

use error::{SchemaError, ValidationErrors};
use walker::SchemaWalker;

/// A reference counted, immutable schema node.
///
/// Cloning a `Schema` is cheap. `Schema` dereferences to its [`SchemaNode`].
#[derive(Debug, Clone, Default)]
pub struct Schema {
    node: Rc<SchemaNode>,
}

impl Schema {
    pub fn new(node: SchemaNode) -> Self {
        Schema {
            node: Rc::new(node),
        }
    }

    pub fn as_node(&self) -> &SchemaNode {
        &self.node
    }

    /// Parse a form schema from a `serde_json::Value`.
    pub fn from_serde_json_value(schema: serde_json::Value) -> Result<Self, SchemaError> {
        serde_json::from_value::<Schema>(schema).map_err(|e| SchemaError::Parse(e.to_string()))
    }

    pub fn from_json_str(s: &str) -> Result<Self, SchemaError> {
        let value: serde_json::Value =
            serde_json::from_str(s).map_err(|e| SchemaError::Parse(e.to_string()))?;
        Self::from_serde_json_value(value)
    }

    pub fn from_json_file(path: &str) -> Result<Self, SchemaError> {
        match std::fs::read_to_string(path) {
            Ok(c) => Self::from_json_str(&c),
            Err(e) => Err(SchemaError::Read {
                path: path.to_string(),
                message: e.to_string(),
            }),
        }
    }

    #[cfg(feature = "yaml")]
    pub fn from_yaml_str(s: &str) -> Result<Self, SchemaError> {
        serde_yaml::from_str::<Schema>(s).map_err(|e| SchemaError::Parse(e.to_string()))
    }

    #[cfg(feature = "yaml")]
    pub fn from_yaml_file(path: &str) -> Result<Self, SchemaError> {
        match std::fs::read_to_string(path) {
            Ok(c) => Self::from_yaml_str(&c),
            Err(e) => Err(SchemaError::Read {
                path: path.to_string(),
                message: e.to_string(),
            }),
        }
    }

    /// Validates `value` against this schema, returning field-level errors.
    /// An empty result means the value is valid.
    pub fn validate(&self, value: &Value) -> ValidationErrors {
        validate::SchemaValidator::validate(self, value)
    }

    pub fn walker(&self) -> SchemaWalker<'_> {
        SchemaWalker::new(self)
    }

    pub fn property(&self, name: &str) -> Option<&Schema> {
        self.node.properties.get(name)
    }

    pub fn items(&self) -> Option<&Schema> {
        self.node.items.as_ref()
    }

    pub fn is_array(&self) -> bool {
        self.node.kind == Some(Kind::Array) || self.node.items.is_some()
    }

    pub fn title(&self) -> Option<&str> {
        self.node.title.as_deref()
    }

    /// Whether both handles point at the same node.
    pub fn ptr_eq(&self, other: &Schema) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }
}

impl Deref for Schema {
    type Target = SchemaNode;

    fn deref(&self) -> &SchemaNode {
        &self.node
    }
}

impl<'de> Deserialize<'de> for Schema {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v: serde_json::Value = Deserialize::deserialize(deserializer)?;
        match v {
            // `true` accepts anything, just like an empty schema.
            serde_json::Value::Bool(true) => Ok(Schema::default()),
            serde_json::Value::Object(_) => {
                let node: SchemaNode = Deserialize::deserialize(v)
                    .map_err(|e| de::Error::custom(format!("{e}")))?;
                Ok(Schema::new(node))
            }
            other => Err(de::Error::custom(format!(
                "schema must be an object, found `{other}`"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Null,
}

impl Kind {
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Kind::String, Value::String(_))
            | (Kind::Number, Value::Number(_))
            | (Kind::Boolean, Value::Bool(_))
            | (Kind::Object, Value::Object(_))
            | (Kind::Array, Value::Array(_))
            | (Kind::Null, Value::Null) => true,
            (Kind::Integer, Value::Number(n)) => n.is_integer(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::String => "string",
            Kind::Number => "number",
            Kind::Integer => "integer",
            Kind::Boolean => "boolean",
            Kind::Object => "object",
            Kind::Array => "array",
            Kind::Null => "null",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compiled `pattern` constraint.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: Rc<str>,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Ok(Pattern {
            source: source.into(),
            regex: Regex::new(source)?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, s: &str) -> bool {
        self.regex.is_match(s)
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let source = String::deserialize(deserializer)?;
        Pattern::new(&source)
            .map_err(|e| de::Error::custom(format!("invalid pattern `{source}`: {e}")))
    }
}

/// Value of a `dependencies` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Dependency {
    /// The listed fields become required once the trigger is filled in.
    Fields(Vec<Rc<str>>),
    /// The object must satisfy this schema (or one of its `oneOf`/`anyOf`
    /// alternatives) once the trigger is filled in.
    Schema(Schema),
}

/// The `if` clause accepts either a condition expression evaluated against the
/// current object or a schema that matches when it yields no errors.
#[derive(Debug, Clone)]
pub enum IfClause {
    Condition(Condition),
    Schema(Schema),
}

impl<'de> Deserialize<'de> for IfClause {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v: serde_json::Value = Deserialize::deserialize(deserializer)?;
        if Condition::looks_like(&v) {
            Condition::from_json(&v)
                .map(IfClause::Condition)
                .map_err(de::Error::custom)
        } else {
            Schema::deserialize(v)
                .map(IfClause::Schema)
                .map_err(|e| de::Error::custom(format!("{e}")))
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaNode {
    #[serde(rename = "type")]
    pub kind: Option<Kind>,
    pub title: Option<Rc<str>>,
    pub description: Option<Rc<str>>,
    #[serde(default, deserialize_with = "present")]
    pub default: Option<Value>,

    #[serde(default)]
    pub properties: IndexMap<Rc<str>, Schema>,
    pub items: Option<Schema>,
    /// Render this object's fields as siblings of its parent's fields.
    #[serde(default)]
    pub flatten: bool,
    #[serde(default, deserialize_with = "one_or_many")]
    pub linkage: Vec<LinkageRule>,

    #[serde(default)]
    pub required: Vec<Rc<str>>,
    #[serde(default)]
    pub dependencies: IndexMap<Rc<str>, Dependency>,
    #[serde(rename = "if")]
    pub if_clause: Option<IfClause>,
    #[serde(rename = "then")]
    pub then_schema: Option<Schema>,
    #[serde(rename = "else")]
    pub else_schema: Option<Schema>,
    #[serde(default)]
    pub all_of: Vec<Schema>,
    #[serde(default)]
    pub any_of: Vec<Schema>,
    #[serde(default)]
    pub one_of: Vec<Schema>,

    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<Pattern>,
    pub format: Option<Rc<str>>,

    #[serde(default, deserialize_with = "number")]
    pub minimum: Option<Number>,
    #[serde(default, deserialize_with = "number")]
    pub maximum: Option<Number>,
    #[serde(default, deserialize_with = "number")]
    pub exclusive_minimum: Option<Number>,
    #[serde(default, deserialize_with = "number")]
    pub exclusive_maximum: Option<Number>,
    #[serde(default, deserialize_with = "number")]
    pub multiple_of: Option<Number>,

    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    #[serde(default)]
    pub unique_items: bool,
    pub min_properties: Option<usize>,
    pub max_properties: Option<usize>,

    // `"const": null` is a constraint, not an absent keyword.
    #[serde(rename = "const", default, deserialize_with = "present")]
    pub const_value: Option<Value>,
    #[serde(rename = "enum")]
    pub enum_values: Option<Vec<Value>>,

    /// Message templates keyed by constraint name, overriding the defaults.
    #[serde(default)]
    pub messages: BTreeMap<Rc<str>, Rc<str>>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

fn number<'de, D>(deserializer: D) -> Result<Option<Number>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => Ok(Some(n)),
        Value::Null => Ok(None),
        v => Err(de::Error::custom(format!(
            "expected a number, found {}",
            v.type_name()
        ))),
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<LinkageRule>, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(vec![]),
        serde_json::Value::Array(rules) => rules
            .into_iter()
            .map(|r| LinkageRule::deserialize(r).map_err(|e| de::Error::custom(format!("{e}"))))
            .collect(),
        rule => LinkageRule::deserialize(rule)
            .map(|r| vec![r])
            .map_err(|e| de::Error::custom(format!("{e}"))),
    }
}
