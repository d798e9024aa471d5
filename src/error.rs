// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::schema::error::SchemaError;

/// Malformed declarative path syntax or a schema too deep to traverse.
///
/// These are authoring bugs and are not retryable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("malformed path reference `{reference}`: {reason}")]
    MalformedReference {
        reference: String,
        reason: &'static str,
    },
    #[error("malformed runtime path `{path}`: {reason}")]
    MalformedPath { path: String, reason: &'static str },
    #[error("schema nesting at `{path}` exceeds the maximum depth of {max_depth}")]
    TooDeep { path: String, max_depth: usize },
}

/// Errors surfaced by [`crate::Engine`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("dependency cycle detected: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },
    #[error("function `{0}` is not registered")]
    UnknownFunction(String),
    #[error("function `{0}` is already registered")]
    DuplicateFunction(String),
    #[error("function `{name}` failed at `{path}`: {message}")]
    Function {
        name: String,
        path: String,
        message: String,
    },
}
