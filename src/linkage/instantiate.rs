// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::condition::Condition;
use crate::error::FormatError;
use crate::linkage::{LinkageRule, When};
use crate::path::codec::to_runtime_path;
use crate::path::{RuntimePath, Segment};
use crate::schema::Schema;
use crate::value::Value;

use std::rc::Rc;

/// A rule as authored, attached to a template path.
#[derive(Debug, Clone)]
pub(crate) struct Template {
    pub target: RuntimePath,
    pub rule: Rc<LinkageRule>,
}

/// A rule bound to one concrete field, with every reference resolved against
/// that field's location.
#[derive(Debug, Clone)]
pub struct InstantiatedRule {
    pub target: RuntimePath,
    /// `target` with indices erased.
    pub template: RuntimePath,
    pub rule: Rc<LinkageRule>,
    /// Position of the authored rule among the engine's templates.
    pub origin: usize,
    pub dependencies: Vec<RuntimePath>,
    pub condition: Option<Condition<RuntimePath>>,
    pub fulfill_from: Option<RuntimePath>,
    pub otherwise_from: Option<RuntimePath>,
}

impl InstantiatedRule {
    fn bind(
        template: &Template,
        origin: usize,
        target: RuntimePath,
        schema: &Schema,
    ) -> Result<Self, FormatError> {
        let resolve = |r: &Rc<str>| to_runtime_path(r, &target, Some(schema));

        let mut dependencies: Vec<RuntimePath> = vec![];
        for r in template.rule.references() {
            let path = resolve(&r)?;
            if !dependencies.contains(&path) {
                dependencies.push(path);
            }
        }

        let condition = match &template.rule.when {
            Some(When::Condition(c)) => Some(c.map_fields(&mut |f| resolve(f))?),
            _ => None,
        };
        let fulfill_from = template
            .rule
            .fulfill
            .value_from
            .as_ref()
            .map(resolve)
            .transpose()?;
        let otherwise_from = template
            .rule
            .otherwise
            .as_ref()
            .and_then(|o| o.value_from.as_ref())
            .map(resolve)
            .transpose()?;

        Ok(Self {
            template: target.to_template(),
            target,
            rule: template.rule.clone(),
            origin,
            dependencies,
            condition,
            fulfill_from,
            otherwise_from,
        })
    }
}

/// Expands every template into one rule per current array element. A rule
/// whose array is empty or missing yields no rules.
pub(crate) fn instantiate(
    templates: &[Template],
    schema: &Schema,
    snapshot: &Value,
) -> Result<Vec<InstantiatedRule>, FormatError> {
    let walker = schema.walker();
    let mut rules = vec![];
    for (origin, template) in templates.iter().enumerate() {
        let pattern = walker.fill_array_levels(&template.target, |_| Segment::Wildcard);
        for target in expand(&pattern, snapshot) {
            rules.push(InstantiatedRule::bind(template, origin, target, schema)?);
        }
    }
    Ok(rules)
}

/// Concrete paths matching `pattern`, one per element at each wildcard level,
/// in index order.
pub(crate) fn expand(pattern: &RuntimePath, snapshot: &Value) -> Vec<RuntimePath> {
    let segments = pattern.segments();
    let mut found = vec![];
    let mut stack: Vec<(usize, Vec<Segment>)> = vec![(0, vec![])];

    while let Some((pos, mut prefix)) = stack.pop() {
        let rest = &segments[pos..];
        let Some(offset) = rest.iter().position(|s| matches!(s, Segment::Wildcard)) else {
            prefix.extend(rest.iter().cloned());
            found.push(RuntimePath::from_segments(prefix));
            continue;
        };

        prefix.extend(rest[..offset].iter().cloned());
        let len = match snapshot.lookup(&RuntimePath::from_segments(prefix.clone())) {
            Value::Array(items) => items.len(),
            _ => 0,
        };
        for index in (0..len).rev() {
            let mut next = prefix.clone();
            next.push(Segment::Index(index));
            stack.push((pos + offset + 1, next));
        }
    }

    found
}
