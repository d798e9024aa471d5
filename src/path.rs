// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Runtime paths: the canonical key of a location inside a form snapshot.
//!
//! A runtime path is a sequence of field names and array indices. It prints
//! with `.` between physical levels, except that a flattened object and its
//! child are joined by [`FLATTEN_SEPARATOR`]. A flattened object renders its
//! fields as siblings of its parent's fields; keeping a distinct joint means
//! `address~~city` (flattened) and `address.city` (nested) stay distinct keys
//! even though both address the same data.

use crate::error::FormatError;

use core::fmt;
use std::rc::Rc;

use serde::{Serialize, Serializer};

pub mod codec;

/// Joint placed between a flattened object and its child.
pub const FLATTEN_SEPARATOR: &str = "~~";

/// Printed form of [`Segment::Wildcard`].
pub const WILDCARD: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Segment {
    /// Plain object field.
    Field(Rc<str>),
    /// Object field whose children are joined with [`FLATTEN_SEPARATOR`].
    Flattened(Rc<str>),
    /// Concrete array element.
    Index(usize),
    /// Every element of an array level.
    Wildcard,
}

impl Segment {
    pub fn name(&self) -> Option<&str> {
        match self {
            Segment::Field(name) | Segment::Flattened(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_index(&self) -> bool {
        matches!(self, Segment::Index(_) | Segment::Wildcard)
    }

    /// Physical equality: ignores how a field is joined to the next level and
    /// lets a wildcard stand for any index.
    fn matches(&self, other: &Segment) -> bool {
        match (self, other) {
            (Segment::Wildcard, Segment::Index(_) | Segment::Wildcard)
            | (Segment::Index(_), Segment::Wildcard) => true,
            (Segment::Index(a), Segment::Index(b)) => a == b,
            _ => match (self.name(), other.name()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuntimePath {
    segments: Vec<Segment>,
}

impl RuntimePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// Parses the printed form. The empty string is the root.
    pub fn parse(path: &str) -> Result<Self, FormatError> {
        let mut segments = vec![];
        if path.is_empty() {
            return Ok(Self { segments });
        }

        for part in path.split('.') {
            let mut pieces = part.split(FLATTEN_SEPARATOR).peekable();
            while let Some(piece) = pieces.next() {
                if piece.is_empty() || piece.trim() != piece {
                    return Err(FormatError::MalformedPath {
                        path: path.to_string(),
                        reason: "empty or padded segment",
                    });
                }
                let flattened = pieces.peek().is_some();
                segments.push(match piece {
                    _ if flattened => Segment::Flattened(piece.into()),
                    WILDCARD => Segment::Wildcard,
                    _ if piece.bytes().all(|b| b.is_ascii_digit()) => {
                        Segment::Index(piece.parse().map_err(|_| FormatError::MalformedPath {
                            path: path.to_string(),
                            reason: "index out of range",
                        })?)
                    }
                    _ => Segment::Field(piece.into()),
                });
            }
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    /// Name of the nearest field segment, used as a fallback title.
    pub fn last_name(&self) -> Option<&str> {
        self.segments.iter().rev().find_map(Segment::name)
    }

    pub fn child(&self, segment: Segment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }

    pub fn field(&self, name: &str) -> Self {
        self.child(Segment::Field(name.into()))
    }

    pub fn index(&self, index: usize) -> Self {
        self.child(Segment::Index(index))
    }

    pub fn join(&self, tail: &RuntimePath) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(tail.segments.iter().cloned());
        Self { segments }
    }

    pub fn prefix(&self, len: usize) -> Self {
        Self {
            segments: self.segments[..len.min(self.segments.len())].to_vec(),
        }
    }

    pub fn suffix(&self, start: usize) -> Self {
        Self {
            segments: self.segments[start.min(self.segments.len())..].to_vec(),
        }
    }

    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            None
        } else {
            Some(self.prefix(self.segments.len() - 1))
        }
    }

    /// Start of the final `.`-delimited part. A field joined to its child by
    /// the flatten separator belongs to the same part as that child.
    pub fn last_part_start(&self) -> usize {
        let mut start = self.segments.len().saturating_sub(1);
        while start > 0 && matches!(self.segments[start - 1], Segment::Flattened(_)) {
            start -= 1;
        }
        start
    }

    /// Runtime path with index and wildcard segments erased.
    pub fn to_template(&self) -> Self {
        Self {
            segments: self
                .segments
                .iter()
                .filter(|s| !s.is_index())
                .cloned()
                .collect(),
        }
    }

    pub fn has_indices(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, Segment::Index(_)))
    }

    pub fn has_wildcard(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, Segment::Wildcard))
    }

    /// Physical prefix test, wildcard-aware.
    pub fn starts_with(&self, prefix: &RuntimePath) -> bool {
        prefix.segments.len() <= self.segments.len()
            && prefix
                .segments
                .iter()
                .zip(self.segments.iter())
                .all(|(a, b)| a.matches(b))
    }

    /// True when one path addresses data inside (or equal to) the other.
    pub fn overlaps(&self, other: &RuntimePath) -> bool {
        self.starts_with(other) || other.starts_with(self)
    }

    /// Number of leading segments that are physically equal.
    pub fn common_prefix_len(&self, other: &RuntimePath) -> usize {
        self.segments
            .iter()
            .zip(other.segments.iter())
            .take_while(|(a, b)| a == b || (a.name().is_some() && a.name() == b.name()))
            .count()
    }

    pub(crate) fn segments_mut(&mut self) -> &mut Vec<Segment> {
        &mut self.segments
    }
}

impl fmt::Display for RuntimePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, segment) in self.segments.iter().enumerate() {
            if idx > 0 {
                match &self.segments[idx - 1] {
                    Segment::Flattened(_) => f.write_str(FLATTEN_SEPARATOR)?,
                    _ => f.write_str(".")?,
                }
            }
            match segment {
                Segment::Field(name) | Segment::Flattened(name) => f.write_str(name)?,
                Segment::Index(i) => write!(f, "{i}")?,
                Segment::Wildcard => f.write_str(WILDCARD)?,
            }
        }
        Ok(())
    }
}

impl Serialize for RuntimePath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> RuntimePath {
        RuntimePath::parse(s).unwrap()
    }

    #[test]
    fn parse_round_trips_printed_form() {
        for s in [
            "",
            "name",
            "contacts.0.companyName",
            "form.address~~city",
            "orders.2.items.*.price",
            "a~~b~~c.d",
        ] {
            assert_eq!(p(s).to_string(), s);
        }
    }

    #[test]
    fn parse_classifies_segments() {
        assert_eq!(
            p("a~~b.3.*").segments(),
            &[
                Segment::Flattened("a".into()),
                Segment::Field("b".into()),
                Segment::Index(3),
                Segment::Wildcard,
            ]
        );
    }

    #[test]
    fn parse_rejects_empty_segments() {
        for s in ["a..b", ".a", "a.", "a~~", "~~a", "a. b"] {
            assert!(RuntimePath::parse(s).is_err(), "{s}");
        }
    }

    #[test]
    fn template_erases_indices() {
        assert_eq!(
            p("contacts.0.companyName").to_template().to_string(),
            "contacts.companyName"
        );
        assert_eq!(p("a.*.b.1").to_template().to_string(), "a.b");
    }

    #[test]
    fn flattened_and_nested_are_distinct_keys() {
        assert_ne!(p("address~~city"), p("address.city"));
        assert!(p("address~~city").overlaps(&p("address.city")));
    }

    #[test]
    fn overlap_is_wildcard_aware() {
        assert!(p("contacts.0.type").overlaps(&p("contacts")));
        assert!(p("contacts").overlaps(&p("contacts.0.type")));
        assert!(p("orders.*.price").overlaps(&p("orders.3.price")));
        assert!(p("orders.*.price").overlaps(&p("orders.3")));
        assert!(!p("orders.*.price").overlaps(&p("orders.3.qty")));
        assert!(!p("contacts.0.type").overlaps(&p("contacts.1.type")));
    }

    #[test]
    fn last_part_start_skips_flattened_joints() {
        assert_eq!(p("form.address~~city").last_part_start(), 1);
        assert_eq!(p("a.b").last_part_start(), 1);
        assert_eq!(p("x~~y").last_part_start(), 0);
        assert_eq!(p("").last_part_start(), 0);
    }
}
