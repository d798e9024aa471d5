// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Linkage rules: how a field's presentation or value depends on other fields.
//!
//! ```json
//! {
//!   "kind": "visibility",
//!   "dependencies": ["./type"],
//!   "when": { "field": "./type", "operator": "==", "value": "work" },
//!   "fulfill": { "state": true },
//!   "otherwise": { "state": false }
//! }
//! ```
//!
//! A rule is authored once per field. Rules on fields inside arrays are
//! instantiated once per element when evaluated.

use crate::condition::Condition;
use crate::value::Value;

use core::fmt;
use std::rc::Rc;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

pub(crate) mod instantiate;

pub use instantiate::InstantiatedRule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    #[serde(alias = "visible")]
    Visibility,
    Disabled,
    #[serde(alias = "readOnly")]
    Readonly,
    Value,
    Options,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Visibility => "visibility",
            RuleKind::Disabled => "disabled",
            RuleKind::Readonly => "readonly",
            RuleKind::Value => "value",
            RuleKind::Options => "options",
        }
    }

    /// Whether the rule produces a boolean state.
    pub fn is_state(&self) -> bool {
        matches!(
            self,
            RuleKind::Visibility | RuleKind::Disabled | RuleKind::Readonly
        )
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OptionItem {
    pub label: Rc<str>,
    pub value: Value,
}

impl OptionItem {
    /// Builds an option from an element of a list: objects are read for
    /// `label` and `value`, any other value is both label and value.
    pub fn from_value(v: &Value) -> Self {
        match v {
            Value::Object(_) => {
                let value = match &v["value"] {
                    Value::Undefined => Value::Null,
                    value => value.clone(),
                };
                let label = match &v["label"] {
                    Value::String(s) => s.clone(),
                    Value::Undefined => Rc::from(display(&value).as_str()),
                    other => Rc::from(display(other).as_str()),
                };
                OptionItem { label, value }
            }
            _ => OptionItem {
                label: Rc::from(display(v).as_str()),
                value: v.clone(),
            },
        }
    }

    pub fn list_from_value(v: &Value) -> Vec<Self> {
        match v {
            Value::Array(items) => items.iter().map(Self::from_value).collect(),
            _ => vec![],
        }
    }
}

fn display(v: &Value) -> String {
    match v {
        Value::String(s) => s.to_string(),
        v => v.to_string(),
    }
}

/// What a rule applies when its condition holds (or does not).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Effect {
    pub state: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    pub value: Option<Value>,
    /// Reference to a field whose value is copied.
    pub value_from: Option<Rc<str>>,
    /// Registered function computing the value or options.
    pub function: Option<Rc<str>>,
    #[serde(default)]
    pub options: Vec<OptionItem>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Either a condition expression or the name of a registered function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum When {
    Condition(Condition),
    Function(Rc<str>),
}

impl<'de> Deserialize<'de> for When {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(name) => Ok(When::Function(name.into())),
            v => Condition::from_json(&v)
                .map(When::Condition)
                .map_err(de::Error::custom),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkageRule {
    #[serde(alias = "type")]
    pub kind: RuleKind,
    #[serde(default)]
    pub dependencies: Vec<Rc<str>>,
    pub when: Option<When>,
    #[serde(default)]
    pub fulfill: Effect,
    pub otherwise: Option<Effect>,
}

impl LinkageRule {
    pub fn new(kind: RuleKind) -> Self {
        Self {
            kind,
            dependencies: vec![],
            when: None,
            fulfill: Effect::default(),
            otherwise: None,
        }
    }

    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Every reference the rule reads: declared dependencies first, then
    /// condition fields and `valueFrom` sources that were not declared.
    pub fn references(&self) -> Vec<Rc<str>> {
        let mut refs = self.dependencies.clone();
        let mut add = |r: &Rc<str>| {
            if !refs.contains(r) {
                refs.push(r.clone());
            }
        };

        if let Some(When::Condition(c)) = &self.when {
            for field in c.fields() {
                add(field);
            }
        }
        for effect in core::iter::once(&self.fulfill).chain(self.otherwise.iter()) {
            if let Some(from) = &effect.value_from {
                add(from);
            }
        }
        refs
    }

    /// Names of the functions the rule calls.
    pub fn functions(&self) -> Vec<&str> {
        let mut names = vec![];
        if let Some(When::Function(name)) = &self.when {
            names.push(name.as_ref());
        }
        for effect in core::iter::once(&self.fulfill).chain(self.otherwise.iter()) {
            if let Some(name) = &effect.function {
                names.push(name.as_ref());
            }
        }
        names
    }
}

/// Per-field state computed by the linkage engine. Absent members mean the
/// field is unaffected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkageResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readonly: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<OptionItem>>,
}

impl LinkageResult {
    /// Overlays the members `other` sets.
    pub fn merge(&mut self, other: &LinkageResult) {
        if other.visible.is_some() {
            self.visible = other.visible;
        }
        if other.disabled.is_some() {
            self.disabled = other.disabled;
        }
        if other.readonly.is_some() {
            self.readonly = other.readonly;
        }
        if other.value.is_some() {
            self.value = other.value.clone();
        }
        if other.options.is_some() {
            self.options = other.options.clone();
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == LinkageResult::default()
    }
}
