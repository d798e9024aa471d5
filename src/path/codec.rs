// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Conversions from declarative path references to runtime paths.
//!
//! Rules refer to other fields in one of three forms:
//!
//! - relative: `./name` names a sibling of the evaluated field, `../name` a
//!   sibling of its container, one more level per `../`;
//! - schema pointer: `#/properties/contacts/items/properties/type`, with or
//!   without the leading `#`;
//! - runtime path: `contacts.0.type`, already resolved.
//!
//! Pointers, and runtime paths that skip array indices, are instantiated
//! relative to the evaluation site using the schema.

use crate::error::FormatError;
use crate::path::{RuntimePath, Segment};
use crate::schema::walker::SchemaWalker;
use crate::schema::Schema;

/// The syntactic form of a declarative reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference<'a> {
    /// `./name` (`up == 0`) or `../name` (`up == 1`), and so on.
    Relative { up: usize, name: &'a str },
    Pointer(&'a str),
    Runtime(&'a str),
}

impl<'a> Reference<'a> {
    pub fn classify(declared: &'a str) -> Self {
        if declared.starts_with("./") || declared.starts_with("../") {
            let mut rest = declared.strip_prefix("./").unwrap_or(declared);
            let mut up = 0;
            while let Some(r) = rest.strip_prefix("../") {
                rest = r;
                up += 1;
            }
            Reference::Relative { up, name: rest }
        } else if declared.starts_with('#') || declared.contains('/') {
            Reference::Pointer(declared)
        } else {
            Reference::Runtime(declared)
        }
    }
}

/// How a dependency's arrays relate to those of the evaluation site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relationship {
    /// No shared array ancestry.
    Unrelated,
    /// Dependency and site sit in the same innermost array.
    SameArray,
    /// The site sits in an array nested inside the array holding the dependency.
    ChildToParent,
    /// The dependency sits in an array nested below the site's element.
    ParentToChild,
}

/// Strips index and wildcard segments.
pub fn to_template_path(runtime: &RuntimePath) -> RuntimePath {
    runtime.to_template()
}

/// Segment-wise prefix relation in either direction, `*` matching any index.
pub fn paths_overlap(a: &RuntimePath, b: &RuntimePath) -> bool {
    a.overlaps(b)
}

fn malformed(reference: &str, reason: &'static str) -> FormatError {
    FormatError::MalformedReference {
        reference: reference.to_string(),
        reason,
    }
}

/// Resolves `./name` (or `../name`) against `current`.
///
/// `./name` replaces the final `.`-delimited part of `current`. A flattened
/// joint inside that part belongs to a flattened ancestor, so
/// `form.address~~city` with `./zip` gives `form.zip`. Each `../` climbs one
/// more container level; array indices are skipped while climbing.
pub fn relative_to_absolute(reference: &str, current: &RuntimePath) -> Result<RuntimePath, FormatError> {
    let (base, name) = split_relative(reference, current)?;
    Ok(base.join(&name))
}

// Container the reference is resolved in, and the referenced name.
fn split_relative(reference: &str, current: &RuntimePath) -> Result<(RuntimePath, RuntimePath), FormatError> {
    let (up, name) = match Reference::classify(reference) {
        Reference::Relative { up, name } => (up, name),
        _ => return Err(malformed(reference, "expected `./` or `../`")),
    };

    if name.trim().is_empty() {
        return Err(malformed(reference, "empty field name"));
    }
    if name.contains('/') {
        return Err(malformed(reference, "unexpected `/` in field name"));
    }
    let name = RuntimePath::parse(name).map_err(|_| malformed(reference, "invalid field name"))?;

    let mut base = current.prefix(current.last_part_start());
    for _ in 0..up {
        while base.last().is_some_and(Segment::is_index) {
            base = base.prefix(base.len() - 1);
        }
        if base.is_empty() {
            return Err(malformed(reference, "climbs above the root"));
        }
        base = base.prefix(base.last_part_start());
    }

    Ok((base, name))
}

/// Drops the `#`, `properties` and `items` markers of a schema pointer.
/// Numeric segments become explicit indices. `~1` and `~0` decode to `/`
/// and `~`.
pub fn pointer_to_logical(pointer: &str) -> Result<RuntimePath, FormatError> {
    let body = pointer.strip_prefix('#').unwrap_or(pointer);
    let body = body.strip_prefix('/').unwrap_or(body);
    let mut segments = vec![];
    if body.is_empty() {
        return Ok(RuntimePath::root());
    }

    let mut tokens = body.split('/');
    while let Some(token) = tokens.next() {
        let token = match token {
            "properties" => match tokens.next() {
                Some(name) => name,
                None => return Err(malformed(pointer, "`properties` without a field name")),
            },
            "items" => continue,
            _ => token,
        };
        if token.is_empty() {
            return Err(malformed(pointer, "empty pointer segment"));
        }
        let token = token.replace("~1", "/").replace("~0", "~");
        segments.push(match token.parse::<usize>() {
            Ok(i) if token.bytes().all(|b| b.is_ascii_digit()) => Segment::Index(i),
            _ => Segment::Field(token.as_str().into()),
        });
    }

    Ok(RuntimePath::from_segments(segments))
}

/// Classifies `dependency` against the evaluation site by schema containment.
/// Array levels are compared by their template paths.
pub fn relationship(walker: &SchemaWalker, dependency: &RuntimePath, site: &RuntimePath) -> Relationship {
    let (dep_levels, site_levels, shared) = shared_levels(walker, dependency, site);
    match shared {
        0 => Relationship::Unrelated,
        _ if dep_levels == shared && site_levels == shared => Relationship::SameArray,
        _ if dep_levels == shared => Relationship::ChildToParent,
        _ => Relationship::ParentToChild,
    }
}

fn shared_levels(walker: &SchemaWalker, dependency: &RuntimePath, site: &RuntimePath) -> (usize, usize, usize) {
    let dep_chain = walker.array_chain(dependency);
    let site_chain = walker.array_chain(site);
    let shared = dep_chain
        .iter()
        .zip(site_chain.iter())
        .take_while(|(d, s)| {
            let (d, s) = (d.array_path.to_template(), s.array_path.to_template());
            d.len() == s.len() && d.starts_with(&s)
        })
        .count();
    (dep_chain.len(), site_chain.len(), shared)
}

/// Instantiates the array levels of `dependency` for the evaluation site.
///
/// Levels shared with the site take the site's index, so that a rule inside
/// `contacts.1` reading `contacts.type` reads `contacts.1.type`. Deeper levels
/// of the dependency become wildcards. Indices the dependency already
/// names are kept.
pub fn instantiate(walker: &SchemaWalker, dependency: &RuntimePath, site: &RuntimePath) -> RuntimePath {
    let dependency = walker.canonicalize(dependency);
    let site_chain = walker.array_chain(site);
    let (_, _, shared) = shared_levels(walker, &dependency, site);

    walker.fill_array_levels(&dependency, |level| {
        match site_chain.get(level).and_then(|a| a.index) {
            Some(index) if level < shared => Segment::Index(index),
            _ => Segment::Wildcard,
        }
    })
}

/// Resolves a declarative reference to a runtime path for a rule evaluated at
/// `current`.
///
/// Without a schema, runtime paths are trusted verbatim and pointers are only
/// stripped of their markers.
pub fn to_runtime_path(
    declared: &str,
    current: &RuntimePath,
    schema: Option<&Schema>,
) -> Result<RuntimePath, FormatError> {
    match Reference::classify(declared) {
        Reference::Relative { .. } => {
            let (base, name) = split_relative(declared, current)?;
            match schema {
                Some(schema) => Ok(resolve_flattened_sibling(&schema.walker(), &base, &name)),
                None => Ok(base.join(&name)),
            }
        }
        Reference::Pointer(pointer) => {
            let logical = pointer_to_logical(pointer)?;
            match schema {
                Some(schema) => Ok(instantiate(&schema.walker(), &logical, current)),
                None => Ok(logical),
            }
        }
        Reference::Runtime(path) => {
            let path = RuntimePath::parse(path).map_err(|_| malformed(declared, "invalid runtime path"))?;
            match schema {
                Some(schema) => Ok(instantiate(&schema.walker(), &path, current)),
                None => Ok(path),
            }
        }
    }
}

// A relative name that is not a field of the sibling container may be a field
// of a flattened sibling object, rendered alongside the container's own fields.
fn resolve_flattened_sibling(walker: &SchemaWalker, container: &RuntimePath, name: &RuntimePath) -> RuntimePath {
    let resolved = container.join(name);
    if walker.node_at(&resolved).is_some() {
        return walker.canonicalize(&resolved);
    }

    let Some(node) = walker.node_at(container) else {
        return resolved;
    };
    // A container path ending at an array field addresses the element shape.
    let node = match node.items() {
        Some(items) if !container.last().is_some_and(Segment::is_index) => items,
        _ => node,
    };

    for (field, sibling) in node.properties.iter() {
        if !sibling.flatten {
            continue;
        }
        let candidate = container.field(field).join(name);
        if walker.node_at(&candidate).is_some() {
            return walker.canonicalize(&candidate);
        }
    }

    resolved
}
