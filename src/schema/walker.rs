// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::error::FormatError;
use crate::linkage::LinkageRule;
use crate::path::{RuntimePath, Segment};
use crate::schema::Schema;

/// Default limit on schema nesting.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// An array a runtime path passes through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnclosingArray {
    /// Location of the array itself.
    pub array_path: RuntimePath,
    /// Element index, when the path names one. Template paths and wildcard
    /// segments cross arrays without a concrete index.
    pub index: Option<usize>,
    /// Remainder of the path relative to the element.
    pub path_inside_array: RuntimePath,
}

// How a path crosses an array level.
#[derive(Debug, Clone, Copy)]
struct Crossing {
    // Position of the first segment inside the element.
    at: usize,
    // Whether an index (or wildcard) segment names the element.
    explicit: bool,
}

#[derive(Debug)]
struct Trace<'a> {
    // Node reached after each consumed segment.
    nodes: Vec<&'a Schema>,
    crossings: Vec<Crossing>,
    complete: bool,
}

/// Read-only traversal of a [`Schema`] along runtime paths.
///
/// Fields descend into `properties`, index and wildcard segments into
/// `items`. A field segment applied to an array node first crosses into
/// `items`, which lets template paths (`contacts.type`) be walked as well as
/// instantiated ones (`contacts.0.type`). Flattened and plain joints address
/// the same physical nesting.
#[derive(Debug, Clone, Copy)]
pub struct SchemaWalker<'a> {
    schema: &'a Schema,
    max_depth: usize,
}

impl<'a> SchemaWalker<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self {
            schema,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    fn trace(&self, path: &RuntimePath) -> Trace<'a> {
        let mut trace = Trace {
            nodes: Vec::with_capacity(path.len()),
            crossings: vec![],
            complete: false,
        };

        let mut node = self.schema;
        for (idx, segment) in path.segments().iter().enumerate() {
            let next = match segment {
                Segment::Index(_) | Segment::Wildcard => match node.items() {
                    Some(items) => {
                        trace.crossings.push(Crossing {
                            at: idx + 1,
                            explicit: true,
                        });
                        Some(items)
                    }
                    // Objects keyed by digits.
                    None => match segment {
                        Segment::Index(i) => node.property(&i.to_string()),
                        _ => None,
                    },
                },
                Segment::Field(name) | Segment::Flattened(name) => {
                    while node.property(name).is_none() {
                        match node.items() {
                            Some(items) => {
                                trace.crossings.push(Crossing {
                                    at: idx,
                                    explicit: false,
                                });
                                node = items;
                            }
                            None => break,
                        }
                    }
                    node.property(name)
                }
            };

            match next {
                Some(n) => {
                    node = n;
                    trace.nodes.push(n);
                }
                None => return trace,
            }
        }

        trace.complete = true;
        trace
    }

    /// Schema node describing the data at `path`, if any.
    pub fn node_at(&self, path: &RuntimePath) -> Option<&'a Schema> {
        let trace = self.trace(path);
        match (trace.complete, trace.nodes.last()) {
            (false, _) => None,
            (true, Some(node)) => Some(node),
            (true, None) => Some(self.schema),
        }
    }

    /// Every array `path` passes through, outermost first.
    ///
    /// Arrays are found by schema containment along the longest prefix of the
    /// path the schema describes; a path that leaves the schema keeps the
    /// arrays found before that point.
    pub fn array_chain(&self, path: &RuntimePath) -> Vec<EnclosingArray> {
        self.trace(path)
            .crossings
            .into_iter()
            .map(|c| {
                let (array_len, index) = if c.explicit {
                    let index = match path.segments().get(c.at - 1) {
                        Some(Segment::Index(i)) => Some(*i),
                        _ => None,
                    };
                    (c.at - 1, index)
                } else {
                    (c.at, None)
                };
                EnclosingArray {
                    array_path: path.prefix(array_len),
                    index,
                    path_inside_array: path.suffix(c.at),
                }
            })
            .collect()
    }

    /// Nearest array enclosing `path`, or `None` when the path never passes
    /// through an array.
    pub fn find_enclosing_array(&self, path: &RuntimePath) -> Option<EnclosingArray> {
        self.array_chain(path).pop()
    }

    /// Rewrites field joints so that a flattened object is joined to its child
    /// with the flatten separator and every other field with `.`. Segments the
    /// schema does not describe are kept as they are.
    pub fn canonicalize(&self, path: &RuntimePath) -> RuntimePath {
        let trace = self.trace(path);
        let last = path.len().saturating_sub(1);
        let segments = path
            .segments()
            .iter()
            .enumerate()
            .map(|(idx, segment)| match (segment.name(), trace.nodes.get(idx)) {
                (Some(name), Some(node)) if node.flatten && idx < last => {
                    Segment::Flattened(name.into())
                }
                (Some(name), Some(_)) => Segment::Field(name.into()),
                _ => segment.clone(),
            })
            .collect();
        RuntimePath::from_segments(segments)
    }

    /// Inserts an index segment at every array level `path` crosses without
    /// one. `fill` receives the nesting level, outermost being zero.
    pub fn fill_array_levels(
        &self,
        path: &RuntimePath,
        mut fill: impl FnMut(usize) -> Segment,
    ) -> RuntimePath {
        let trace = self.trace(path);
        let mut segments = Vec::with_capacity(path.len() + trace.crossings.len());
        let mut crossings = trace.crossings.iter().enumerate().peekable();

        for (idx, segment) in path.segments().iter().enumerate() {
            while let Some((level, c)) = crossings.peek() {
                let at = if c.explicit { c.at - 1 } else { c.at };
                if at != idx {
                    break;
                }
                if !c.explicit {
                    segments.push(fill(*level));
                }
                crossings.next();
            }
            segments.push(segment.clone());
        }

        RuntimePath::from_segments(segments)
    }

    /// Linkage rules attached anywhere in the schema, with the template path
    /// of the field each one is attached to, in authoring order.
    pub fn collect_linkage(&self) -> Result<Vec<(RuntimePath, LinkageRule)>, FormatError> {
        let mut found = vec![];
        // The flag tells whether the node was reached through a property, and
        // so owns the last segment of its path.
        let mut stack = vec![(RuntimePath::root(), self.schema, 0usize, false)];

        while let Some((path, node, depth, named)) = stack.pop() {
            if depth > self.max_depth {
                return Err(FormatError::TooDeep {
                    path: path.to_string(),
                    max_depth: self.max_depth,
                });
            }

            for rule in &node.linkage {
                found.push((path.clone(), rule.clone()));
            }

            if let Some(items) = node.items() {
                stack.push((path.clone(), items, depth + 1, false));
            }

            let base = if node.flatten && named {
                flattened(&path)
            } else {
                path.clone()
            };
            for (name, child) in node.properties.iter().rev() {
                stack.push((base.field(name), child, depth + 1, true));
            }
        }

        Ok(found)
    }

    /// Checks that the schema nests no deeper than the configured limit.
    pub fn check_depth(&self) -> Result<(), FormatError> {
        let mut stack = vec![(RuntimePath::root(), self.schema, 0usize)];
        while let Some((path, node, depth)) = stack.pop() {
            if depth > self.max_depth {
                return Err(FormatError::TooDeep {
                    path: path.to_string(),
                    max_depth: self.max_depth,
                });
            }
            if let Some(items) = node.items() {
                stack.push((path.index(0), items, depth + 1));
            }
            for (name, child) in node.properties.iter() {
                stack.push((path.field(name), child, depth + 1));
            }
            let branches = node
                .then_schema
                .iter()
                .chain(node.else_schema.iter())
                .chain(node.all_of.iter())
                .chain(node.any_of.iter())
                .chain(node.one_of.iter());
            for branch in branches {
                stack.push((path.clone(), branch, depth + 1));
            }
        }
        Ok(())
    }
}

// Marks the final field of `path` as joined to its children by the flatten
// separator.
pub(crate) fn flattened(path: &RuntimePath) -> RuntimePath {
    let mut path = path.clone();
    if let Some(last) = path.segments_mut().last_mut() {
        if let Segment::Field(name) = last {
            *last = Segment::Flattened(name.clone());
        }
    }
    path
}
