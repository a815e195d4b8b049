//! Dotted field paths (`spec.template.spec.containers.[name=app].image`).
//!
//! Grammar, one segment per dot:
//! - `name`       mapping field; all-digit names index a sequence
//! - `[key=val]`  first element of a sequence whose `key` field equals `val`
//!
//! Dots inside brackets do not split (`[name=my.app]`).

#![forbid(unsafe_code)]

use std::fmt;
use std::str::FromStr;

use smallvec::SmallVec;

use crate::node::{Node, NodeKind};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("invalid field path {path:?}: {reason}")]
    Malformed { path: String, reason: &'static str },
    #[error("cannot resolve segment {segment:?} of {path:?} in a {found} node")]
    WrongKind { path: String, segment: String, found: NodeKind },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Field(String),
    Match { key: String, value: String },
}

impl Segment {
    fn parse(s: &str) -> Result<Self, &'static str> {
        if s.is_empty() {
            return Err("empty segment");
        }
        let Some(inner) = s.strip_prefix('[') else {
            return Ok(Segment::Field(s.to_string()));
        };
        let inner = inner.strip_suffix(']').ok_or("unterminated '['")?;
        match inner.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                Ok(Segment::Match { key: key.to_string(), value: value.to_string() })
            }
            _ => Err("element matcher must look like [key=value]"),
        }
    }

    /// Sequence position for all-digit field segments.
    pub fn index(&self) -> Option<usize> {
        match self {
            Segment::Field(name) if !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()) => {
                name.parse().ok()
            }
            _ => None,
        }
    }

    /// Kind of container this segment is resolved against.
    pub fn container_kind(&self) -> NodeKind {
        match self {
            Segment::Match { .. } => NodeKind::Sequence,
            Segment::Field(_) if self.index().is_some() => NodeKind::Sequence,
            Segment::Field(_) => NodeKind::Mapping,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Field(name) => f.write_str(name),
            Segment::Match { key, value } => write!(f, "[{}={}]", key, value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    raw: String,
    segments: SmallVec<[Segment; 6]>,
}

impl FieldPath {
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let malformed = |reason| PathError::Malformed { path: raw.to_string(), reason };
        let mut segments: SmallVec<[Segment; 6]> = SmallVec::new();
        let mut cur = String::new();
        let mut in_bracket = false;
        for ch in raw.chars() {
            match ch {
                '[' if in_bracket => return Err(malformed("nested '['")),
                '[' => {
                    if !cur.is_empty() {
                        return Err(malformed("'[' must start a segment"));
                    }
                    in_bracket = true;
                    cur.push(ch);
                }
                ']' if in_bracket => {
                    in_bracket = false;
                    cur.push(ch);
                }
                ']' => return Err(malformed("unmatched ']'")),
                '.' if !in_bracket => {
                    segments.push(Segment::parse(&cur).map_err(malformed)?);
                    cur.clear();
                }
                c => {
                    if !in_bracket && cur.ends_with(']') {
                        return Err(malformed("']' must end a segment"));
                    }
                    cur.push(c);
                }
            }
        }
        if in_bracket {
            return Err(malformed("unterminated '['"));
        }
        segments.push(Segment::parse(&cur).map_err(malformed)?);
        Ok(Self { raw: raw.to_string(), segments })
    }

    pub fn as_str(&self) -> &str { &self.raw }

    pub fn segments(&self) -> &[Segment] { &self.segments }

    fn wrong_kind(&self, segment: &Segment, found: NodeKind) -> PathError {
        PathError::WrongKind { path: self.raw.clone(), segment: segment.to_string(), found }
    }
}

impl FromStr for FieldPath {
    type Err = PathError;
    fn from_str(s: &str) -> Result<Self, Self::Err> { Self::parse(s) }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.raw) }
}

fn element_matches(element: &Node, key: &str, value: &str) -> bool {
    element.field_text(key) == Some(value)
}

pub(crate) fn lookup<'a>(root: &'a Node, path: &FieldPath) -> Result<Option<&'a Node>, PathError> {
    let mut cur = root;
    for seg in path.segments() {
        let next = match (cur, seg) {
            (Node::Null, _) => None,
            (Node::Scalar(_), _) => return Err(path.wrong_kind(seg, NodeKind::Scalar)),
            (Node::Mapping(m), Segment::Field(name)) => m.get(name),
            (Node::Mapping(_), Segment::Match { .. }) => {
                return Err(path.wrong_kind(seg, NodeKind::Mapping))
            }
            (Node::Sequence(items), Segment::Field(_)) => match seg.index() {
                Some(i) => items.get(i),
                None => return Err(path.wrong_kind(seg, NodeKind::Sequence)),
            },
            (Node::Sequence(items), Segment::Match { key, value }) => {
                items.iter().find(|e| element_matches(e, key, value))
            }
        };
        match next {
            Some(n) => cur = n,
            None => return Ok(None),
        }
    }
    Ok(Some(cur))
}

/// Mutable lookup. With `create = Some(leaf_kind)` missing segments are filled in.
pub(crate) fn lookup_mut<'a>(
    root: &'a mut Node,
    path: &FieldPath,
    create: Option<NodeKind>,
) -> Result<Option<&'a mut Node>, PathError> {
    let segments = path.segments();
    let mut cur = root;
    for (i, seg) in segments.iter().enumerate() {
        let fill = create.map(|leaf| segments.get(i + 1).map_or(leaf, Segment::container_kind));
        match step_mut(cur, seg, fill).map_err(|found| path.wrong_kind(seg, found))? {
            Some(n) => cur = n,
            None => return Ok(None),
        }
    }
    Ok(Some(cur))
}

/// One traversal step. `fill` is the kind of node to create when the child is
/// missing; `None` disables creation. Errors carry the kind that could not be
/// traversed.
fn step_mut<'a>(
    node: &'a mut Node,
    seg: &Segment,
    fill: Option<NodeKind>,
) -> Result<Option<&'a mut Node>, NodeKind> {
    if matches!(node, Node::Null) && fill.is_some() {
        *node = Node::empty(seg.container_kind());
    }
    match node {
        Node::Null => Ok(None),
        Node::Scalar(_) => Err(NodeKind::Scalar),
        Node::Mapping(m) => match seg {
            Segment::Field(name) => {
                if let Some(kind) = fill {
                    if !m.contains_key(name) {
                        m.insert(name.clone(), Node::empty(kind));
                    }
                }
                Ok(m.get_mut(name))
            }
            Segment::Match { .. } => Err(NodeKind::Mapping),
        },
        Node::Sequence(items) => match seg {
            Segment::Field(_) => {
                let i = seg.index().ok_or(NodeKind::Sequence)?;
                // only appending is possible; gaps are never created
                if let Some(kind) = fill {
                    if i == items.len() {
                        items.push(Node::empty(kind));
                    }
                }
                Ok(items.get_mut(i))
            }
            Segment::Match { key, value } => {
                match items.iter().position(|e| element_matches(e, key, value)) {
                    Some(p) => Ok(items.get_mut(p)),
                    None if fill.is_some() => {
                        let element = [(key.clone(), Node::string(value.clone()))].into_iter().collect();
                        items.push(Node::Mapping(element));
                        Ok(items.last_mut())
                    }
                    None => Ok(None),
                }
            }
        },
    }
}
