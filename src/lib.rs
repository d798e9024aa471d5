// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

// Use README.md as crate documentation.
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

pub mod cache;
pub mod condition;
mod engine;
mod error;
pub mod graph;
pub mod linkage;
mod number;
mod options;
pub mod path;
pub mod schema;
mod value;

pub use cache::CacheStats;
pub use condition::{Condition, Operator};
pub use engine::{Engine, Function, FunctionContext};
pub use error::{EngineError, FormatError};
pub use linkage::{LinkageResult, LinkageRule, RuleKind};
pub use number::Number;
pub use options::EngineOptions;
pub use path::RuntimePath;
pub use schema::error::{SchemaError, ValidationErrors, WHOLE_SCHEMA_KEY};
pub use schema::validate::SchemaValidator;
pub use schema::Schema;
pub use value::Value;

#[cfg(test)]
mod tests;
