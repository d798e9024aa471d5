// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::number::Number;
use crate::schema::Kind;
use crate::value::Value;

use std::collections::BTreeMap;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::Serialize;

/// Key under which violations that span several fields are reported.
pub const WHOLE_SCHEMA_KEY: &str = "#";

/// Errors raised while loading a schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("failed to parse schema: {0}")]
    Parse(String),
    #[error("failed to read schema file `{path}`: {message}")]
    Read { path: String, message: String },
}

/// A single constraint violation.
///
/// Violations are rendered into messages through a template. Templates can
/// be overridden per schema node with the `messages` keyword, keyed by
/// [`ValidationError::constraint`]. The placeholders `{title}`, `{limit}` and
/// `{value}` are substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Required,
    Type { expected: Kind },
    MinLength(usize),
    MaxLength(usize),
    Pattern(Rc<str>),
    Format(Rc<str>),
    Minimum(Number),
    Maximum(Number),
    ExclusiveMinimum(Number),
    ExclusiveMaximum(Number),
    MultipleOf(Number),
    MinItems(usize),
    MaxItems(usize),
    UniqueItems,
    MinProperties(usize),
    MaxProperties(usize),
    Const(Value),
    Enum(Vec<Value>),
    /// No `anyOf` alternative matched.
    AnyOf,
    /// More than one `oneOf` alternative matched.
    OneOfMultiple,
    /// Schema nesting exceeded the validator's depth limit.
    TooDeep(usize),
}

impl ValidationError {
    /// Name of the violated keyword. Used to look up message overrides.
    pub fn constraint(&self) -> &'static str {
        match self {
            ValidationError::Required => "required",
            ValidationError::Type { .. } => "type",
            ValidationError::MinLength(_) => "minLength",
            ValidationError::MaxLength(_) => "maxLength",
            ValidationError::Pattern(_) => "pattern",
            ValidationError::Format(_) => "format",
            ValidationError::Minimum(_) => "minimum",
            ValidationError::Maximum(_) => "maximum",
            ValidationError::ExclusiveMinimum(_) => "exclusiveMinimum",
            ValidationError::ExclusiveMaximum(_) => "exclusiveMaximum",
            ValidationError::MultipleOf(_) => "multipleOf",
            ValidationError::MinItems(_) => "minItems",
            ValidationError::MaxItems(_) => "maxItems",
            ValidationError::UniqueItems => "uniqueItems",
            ValidationError::MinProperties(_) => "minProperties",
            ValidationError::MaxProperties(_) => "maxProperties",
            ValidationError::Const(_) => "const",
            ValidationError::Enum(_) => "enum",
            ValidationError::AnyOf => "anyOf",
            ValidationError::OneOfMultiple => "oneOf",
            ValidationError::TooDeep(_) => "maxDepth",
        }
    }

    fn template(&self) -> &'static str {
        match self {
            ValidationError::Required => "{title} is required",
            ValidationError::Type { .. } => "{title} must be of type {limit}",
            ValidationError::MinLength(_) => "{title} must be at least {limit} characters",
            ValidationError::MaxLength(_) => "{title} must be at most {limit} characters",
            ValidationError::Pattern(_) => "{title} does not match the pattern {limit}",
            ValidationError::Format(_) => "{title} is not a valid {limit}",
            ValidationError::Minimum(_) => "{title} must be greater than or equal to {limit}",
            ValidationError::Maximum(_) => "{title} must be less than or equal to {limit}",
            ValidationError::ExclusiveMinimum(_) => "{title} must be greater than {limit}",
            ValidationError::ExclusiveMaximum(_) => "{title} must be less than {limit}",
            ValidationError::MultipleOf(_) => "{title} must be a multiple of {limit}",
            ValidationError::MinItems(_) => "{title} must contain at least {limit} items",
            ValidationError::MaxItems(_) => "{title} must contain at most {limit} items",
            ValidationError::UniqueItems => "{title} must not contain duplicate items",
            ValidationError::MinProperties(_) => "{title} must have at least {limit} properties",
            ValidationError::MaxProperties(_) => "{title} must have at most {limit} properties",
            ValidationError::Const(_) => "{title} must be equal to {limit}",
            ValidationError::Enum(_) => "{title} must be one of {limit}",
            ValidationError::AnyOf => "{title} must satisfy one of the allowed conditions",
            ValidationError::OneOfMultiple => "multiple mutually exclusive conditions matched",
            ValidationError::TooDeep(_) => "{title} is nested deeper than {limit} levels",
        }
    }

    fn limit(&self) -> String {
        match self {
            ValidationError::Type { expected } => expected.to_string(),
            ValidationError::MinLength(n)
            | ValidationError::MaxLength(n)
            | ValidationError::MinItems(n)
            | ValidationError::MaxItems(n)
            | ValidationError::MinProperties(n)
            | ValidationError::MaxProperties(n)
            | ValidationError::TooDeep(n) => n.to_string(),
            ValidationError::Pattern(s) | ValidationError::Format(s) => s.to_string(),
            ValidationError::Minimum(n)
            | ValidationError::Maximum(n)
            | ValidationError::ExclusiveMinimum(n)
            | ValidationError::ExclusiveMaximum(n)
            | ValidationError::MultipleOf(n) => n.format_decimal(),
            ValidationError::Const(v) => v.to_string(),
            ValidationError::Enum(values) => values
                .iter()
                .map(Value::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            ValidationError::Required
            | ValidationError::UniqueItems
            | ValidationError::AnyOf
            | ValidationError::OneOfMultiple => String::new(),
        }
    }

    /// Renders the message for a field titled `title` holding `value`.
    pub fn render(
        &self,
        title: &str,
        value: &Value,
        overrides: &BTreeMap<Rc<str>, Rc<str>>,
    ) -> String {
        let template = overrides
            .get(self.constraint())
            .map(|t| t.as_ref())
            .unwrap_or_else(|| self.template());

        let value = match value {
            Value::String(s) => s.to_string(),
            Value::Undefined => String::new(),
            v => v.to_string(),
        };

        template
            .replace("{title}", title)
            .replace("{limit}", &self.limit())
            .replace("{value}", &value)
    }
}

/// Field-level validation errors: runtime path to message, in the order they
/// were found. Only the first error reported for a path is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    errors: IndexMap<String, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `message` for `path` unless the path already has an error.
    /// Returns whether the message was recorded.
    pub fn insert(&mut self, path: String, message: String) -> bool {
        if self.errors.contains_key(&path) {
            return false;
        }
        self.errors.insert(path, message);
        true
    }

    /// Merges `other` into `self`, keeping existing messages.
    pub fn extend(&mut self, other: ValidationErrors) {
        for (path, message) in other.errors {
            self.insert(path, message);
        }
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.errors.get(path).map(String::as_str)
    }

    pub fn first(&self) -> Option<(&str, &str)> {
        self.errors
            .first()
            .map(|(p, m)| (p.as_str(), m.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.errors.iter().map(|(p, m)| (p.as_str(), m.as_str()))
    }

    pub fn into_map(self) -> IndexMap<String, String> {
        self.errors
    }
}

impl IntoIterator for ValidationErrors {
    type Item = (String, String);
    type IntoIter = indexmap::map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}
