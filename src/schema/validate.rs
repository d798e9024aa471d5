// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::condition::Condition;
use crate::error::FormatError;
use crate::path::codec::{pointer_to_logical, relative_to_absolute, Reference};
use crate::path::RuntimePath;
use crate::schema::error::{ValidationError, ValidationErrors, WHOLE_SCHEMA_KEY};
use crate::schema::walker::{flattened, DEFAULT_MAX_DEPTH};
use crate::schema::{format, Dependency, IfClause, Schema};
use crate::value::Value;

use std::rc::Rc;

use log::debug;

/// Title used when neither the schema nor the path names a field.
const DEFAULT_TITLE: &str = "Value";

/// Validator producing field-level error messages for a form submission.
pub struct SchemaValidator;

/// Where in the instance the validator currently is.
#[derive(Clone)]
struct Context<'a> {
    root: &'a Value,
    path: RuntimePath,
    title: &'a str,
    // Object schema declaring the fields at `path`. Conditional branches
    // validated at the same path look titles up here.
    owner: &'a Schema,
    depth: usize,
    max_depth: usize,
}

impl<'a> Context<'a> {
    fn enter(&self, path: RuntimePath, title: &'a str, owner: &'a Schema) -> Self {
        Self {
            root: self.root,
            path,
            title,
            owner,
            depth: self.depth + 1,
            max_depth: self.max_depth,
        }
    }

    // Same location, one schema level deeper.
    fn nested(&self) -> Self {
        Self {
            depth: self.depth + 1,
            ..self.clone()
        }
    }

    fn key(&self) -> String {
        key(&self.path)
    }
}

fn key(path: &RuntimePath) -> String {
    if path.is_empty() {
        WHOLE_SCHEMA_KEY.to_string()
    } else {
        path.to_string()
    }
}

impl SchemaValidator {
    /// Validates `value` against `schema`.
    ///
    /// Returns a map from the runtime path of each invalid field to a message.
    /// Violations spanning several fields are reported under
    /// [`WHOLE_SCHEMA_KEY`]. An empty map means the value is valid.
    ///
    /// # Example
    /// ```rust
    /// use formlink::{Schema, SchemaValidator, Value};
    ///
    /// let schema = Schema::from_json_str(r#"{
    ///     "properties": { "name": { "title": "Name", "minLength": 2 } },
    ///     "required": ["name"]
    /// }"#).unwrap();
    ///
    /// let errors = SchemaValidator::validate(&schema, &Value::from_json_str("{}").unwrap());
    /// assert_eq!(errors.get("name"), Some("Name is required"));
    ///
    /// let errors = SchemaValidator::validate(&schema, &Value::from_json_str(r#"{ "name": "Al" }"#).unwrap());
    /// assert!(errors.is_empty());
    /// ```
    pub fn validate(schema: &Schema, value: &Value) -> ValidationErrors {
        Self::validate_with_max_depth(schema, value, DEFAULT_MAX_DEPTH)
    }

    /// Like [`SchemaValidator::validate`], with a custom nesting limit. Schema
    /// levels past the limit are not validated; a single whole-schema error
    /// is reported instead.
    pub fn validate_with_max_depth(schema: &Schema, value: &Value, max_depth: usize) -> ValidationErrors {
        let ctx = Context {
            root: value,
            path: RuntimePath::root(),
            title: schema.title().unwrap_or(DEFAULT_TITLE),
            owner: schema,
            depth: 0,
            max_depth,
        };
        let mut errors = ValidationErrors::new();
        Self::validate_node(schema, value, &ctx, &mut errors);
        errors
    }

    fn passes<'a>(node: &'a Schema, value: &'a Value, ctx: &Context<'a>) -> bool {
        let mut errors = ValidationErrors::new();
        Self::validate_node(node, value, ctx, &mut errors);
        errors.is_empty()
    }

    fn validate_node<'a>(
        node: &'a Schema,
        value: &'a Value,
        ctx: &Context<'a>,
        errors: &mut ValidationErrors,
    ) {
        if ctx.depth > ctx.max_depth {
            errors.insert(
                WHOLE_SCHEMA_KEY.to_string(),
                ValidationError::TooDeep(ctx.max_depth).render(ctx.title, value, &node.messages),
            );
            return;
        }

        if !value.is_absent() {
            Self::validate_leaf(node, value, ctx, errors);
        }

        // A missing required object is validated as an empty one, so that its
        // own required fields are reported too.
        if matches!(value, Value::Object(_)) || value.is_absent() {
            Self::validate_object(node, value, ctx, errors);
        }

        if let (Value::Array(elements), Some(items)) = (value, node.items()) {
            let title = items.title().unwrap_or(ctx.title);
            for (idx, element) in elements.iter().enumerate() {
                let child = ctx.enter(ctx.path.index(idx), title, items);
                Self::validate_node(items, element, &child, errors);
            }
        }

        Self::validate_conditional(node, value, ctx, errors);
    }

    fn validate_leaf<'a>(
        node: &'a Schema,
        value: &'a Value,
        ctx: &Context<'a>,
        errors: &mut ValidationErrors,
    ) {
        let mut violations = vec![];

        match node.kind {
            Some(kind) if !kind.matches(value) => {
                violations.push(ValidationError::Type { expected: kind })
            }
            _ => {
                match value {
                    Value::String(s) => Self::validate_string(node, s, &mut violations),
                    Value::Number(_) => Self::validate_number(node, value, &mut violations),
                    Value::Array(items) => Self::validate_array(node, items, &mut violations),
                    Value::Object(fields) => {
                        if let Some(min) = node.min_properties {
                            if fields.len() < min {
                                violations.push(ValidationError::MinProperties(min));
                            }
                        }
                        if let Some(max) = node.max_properties {
                            if fields.len() > max {
                                violations.push(ValidationError::MaxProperties(max));
                            }
                        }
                    }
                    _ => (),
                }

                if let Some(expected) = &node.const_value {
                    if value != expected {
                        violations.push(ValidationError::Const(expected.clone()));
                    }
                }
                if let Some(allowed) = &node.enum_values {
                    if !allowed.contains(value) {
                        violations.push(ValidationError::Enum(allowed.clone()));
                    }
                }
            }
        }

        // Only the first message per path is kept.
        if let Some(violation) = violations.first() {
            errors.insert(ctx.key(), violation.render(ctx.title, value, &node.messages));
        }
    }

    fn validate_string(node: &Schema, s: &str, violations: &mut Vec<ValidationError>) {
        let len = s.chars().count();
        if let Some(min) = node.min_length {
            if len < min {
                violations.push(ValidationError::MinLength(min));
            }
        }
        if let Some(max) = node.max_length {
            if len > max {
                violations.push(ValidationError::MaxLength(max));
            }
        }
        if let Some(pattern) = &node.pattern {
            if !pattern.is_match(s) {
                violations.push(ValidationError::Pattern(pattern.as_str().into()));
            }
        }
        if let Some(name) = &node.format {
            if !format::is_valid(name, s) {
                violations.push(ValidationError::Format(name.clone()));
            }
        }
    }

    fn validate_number(node: &Schema, value: &Value, violations: &mut Vec<ValidationError>) {
        let Value::Number(n) = value else {
            return;
        };
        if let Some(min) = &node.minimum {
            if n < min {
                violations.push(ValidationError::Minimum(*min));
            }
        }
        if let Some(max) = &node.maximum {
            if n > max {
                violations.push(ValidationError::Maximum(*max));
            }
        }
        if let Some(min) = &node.exclusive_minimum {
            if n <= min {
                violations.push(ValidationError::ExclusiveMinimum(*min));
            }
        }
        if let Some(max) = &node.exclusive_maximum {
            if n >= max {
                violations.push(ValidationError::ExclusiveMaximum(*max));
            }
        }
        if let Some(divisor) = &node.multiple_of {
            if !n.is_multiple_of(divisor) {
                violations.push(ValidationError::MultipleOf(*divisor));
            }
        }
    }

    fn validate_array(node: &Schema, items: &[Value], violations: &mut Vec<ValidationError>) {
        if let Some(min) = node.min_items {
            if items.len() < min {
                violations.push(ValidationError::MinItems(min));
            }
        }
        if let Some(max) = node.max_items {
            if items.len() > max {
                violations.push(ValidationError::MaxItems(max));
            }
        }
        if node.unique_items {
            let duplicated = items
                .iter()
                .enumerate()
                .any(|(idx, item)| items[..idx].contains(item));
            if duplicated {
                violations.push(ValidationError::UniqueItems);
            }
        }
    }

    fn validate_object<'a>(
        node: &'a Schema,
        value: &'a Value,
        ctx: &Context<'a>,
        errors: &mut ValidationErrors,
    ) {
        for name in &node.required {
            Self::require(node, value, ctx, name, errors);
        }

        for (trigger, dependency) in &node.dependencies {
            if value[trigger.as_ref()].is_absent() {
                continue;
            }
            match dependency {
                Dependency::Fields(fields) => {
                    for name in fields {
                        Self::require(node, value, ctx, name, errors);
                    }
                }
                Dependency::Schema(schema) => {
                    let alternatives: &[Schema] = if !schema.one_of.is_empty() {
                        &schema.one_of
                    } else if !schema.any_of.is_empty() {
                        &schema.any_of
                    } else {
                        core::slice::from_ref(schema)
                    };
                    let nested = ctx.nested();
                    if alternatives.iter().any(|alt| Self::passes(alt, value, &nested)) {
                        continue;
                    }
                    if let Some(first) = alternatives.first() {
                        let mut trial = ValidationErrors::new();
                        Self::validate_node(first, value, &nested, &mut trial);
                        if let Some((path, message)) = trial.first() {
                            errors.insert(path.to_string(), message.to_string());
                        }
                    }
                }
            }
        }

        for (name, child) in &node.properties {
            let field = &value[name.as_ref()];
            // Optional fields that were left out are not validated at all.
            if field.is_absent() && !node.required.contains(name) {
                continue;
            }
            let title = Self::field_title(node, ctx, name);
            let child_ctx = ctx.enter(Self::field_path(node, ctx, name), title, child);
            Self::validate_node(child, field, &child_ctx, errors);
        }
    }

    fn validate_conditional<'a>(
        node: &'a Schema,
        value: &'a Value,
        ctx: &Context<'a>,
        errors: &mut ValidationErrors,
    ) {
        let nested = ctx.nested();

        if let Some(clause) = &node.if_clause {
            let matched = match clause {
                IfClause::Condition(condition) => Self::condition_holds(condition, ctx),
                IfClause::Schema(schema) => Self::passes(schema, value, &nested),
            };
            let branch = if matched {
                node.then_schema.as_ref()
            } else {
                node.else_schema.as_ref()
            };
            if let Some(branch) = branch {
                Self::validate_node(branch, value, &nested, errors);
            }
        }

        for schema in &node.all_of {
            Self::validate_node(schema, value, &nested, errors);
        }

        if !node.any_of.is_empty() && !node.any_of.iter().any(|s| Self::passes(s, value, &nested)) {
            Self::report_any_of(node, value, ctx, errors);
        }

        if let Some(first) = node.one_of.first() {
            let matching = node
                .one_of
                .iter()
                .filter(|s| Self::passes(s, value, &nested))
                .count();
            match matching {
                0 => Self::validate_node(first, value, &nested, errors),
                1 => (),
                _ => {
                    errors.insert(
                        WHOLE_SCHEMA_KEY.to_string(),
                        ValidationError::OneOfMultiple.render(ctx.title, value, &node.messages),
                    );
                }
            }
        }
    }

    // Reported against the first field the first alternative mentions.
    fn report_any_of<'a>(
        node: &'a Schema,
        value: &'a Value,
        ctx: &Context<'a>,
        errors: &mut ValidationErrors,
    ) {
        let first_field = node.any_of.first().and_then(|alt| {
            alt.required
                .first()
                .or_else(|| alt.properties.keys().next())
                .or_else(|| alt.dependencies.keys().next())
        });

        match first_field {
            Some(name) => {
                let title = Self::field_title(node, ctx, name);
                errors.insert(
                    key(&Self::field_path(node, ctx, name)),
                    ValidationError::AnyOf.render(title, &value[name.as_ref()], &node.messages),
                );
            }
            None => {
                errors.insert(
                    WHOLE_SCHEMA_KEY.to_string(),
                    ValidationError::AnyOf.render(ctx.title, value, &node.messages),
                );
            }
        }
    }

    fn require<'a>(
        node: &'a Schema,
        value: &'a Value,
        ctx: &Context<'a>,
        name: &'a Rc<str>,
        errors: &mut ValidationErrors,
    ) {
        let field = &value[name.as_ref()];
        if !field.is_absent() {
            return;
        }

        let declared = node.property(name).or_else(|| ctx.owner.property(name));
        let messages = match declared {
            Some(child) if child.messages.contains_key("required") => &child.messages,
            _ => &node.messages,
        };
        let title = Self::field_title(node, ctx, name);
        errors.insert(
            key(&Self::field_path(node, ctx, name)),
            ValidationError::Required.render(title, field, messages),
        );
    }

    fn field_title<'a>(node: &'a Schema, ctx: &Context<'a>, name: &'a str) -> &'a str {
        node.property(name)
            .and_then(Schema::title)
            .or_else(|| ctx.owner.property(name).and_then(Schema::title))
            .unwrap_or(name)
    }

    fn field_path(node: &Schema, ctx: &Context<'_>, name: &str) -> RuntimePath {
        let base = if (node.flatten || ctx.owner.flatten) && !ctx.path.is_empty() {
            flattened(&ctx.path)
        } else {
            ctx.path.clone()
        };
        base.field(name)
    }

    // Condition fields name fields of the object being validated; pointers
    // are taken from the root of the instance.
    fn condition_holds(condition: &Condition, ctx: &Context<'_>) -> bool {
        let resolved = condition.map_fields(&mut |field: &Rc<str>| -> Result<RuntimePath, FormatError> {
            match Reference::classify(field) {
                Reference::Relative { .. } => relative_to_absolute(field, &ctx.path.field(WHOLE_SCHEMA_KEY)),
                Reference::Pointer(pointer) => pointer_to_logical(pointer),
                Reference::Runtime(path) => Ok(ctx.path.join(&RuntimePath::parse(path)?)),
            }
        });
        match resolved {
            Ok(condition) => condition.evaluate(ctx.root),
            Err(e) => {
                debug!("if condition at `{}` not evaluated: {e}", ctx.key());
                false
            }
        }
    }
}
