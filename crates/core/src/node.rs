//! Owned document tree.
//!
//! `Node` is a closed enum over the four YAML node kinds. Every decision that
//! depends on the kind of a node (path creation, delimiter handling) matches on
//! [`NodeKind`] exhaustively instead of probing the value ad hoc.

#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::path::{self, FieldPath, PathError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Null,
    Scalar,
    Mapping,
    Sequence,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeKind::Null => "null",
            NodeKind::Scalar => "scalar",
            NodeKind::Mapping => "mapping",
            NodeKind::Sequence => "sequence",
        };
        f.write_str(s)
    }
}

/// Resolved type of a scalar. Kept when the text is rewritten so that a
/// refined `8080` stays an integer on output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarTag {
    Str,
    Int,
    Float,
    Bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scalar {
    pub tag: ScalarTag,
    pub text: String,
}

impl Scalar {
    pub fn string(text: impl Into<String>) -> Self {
        Self { tag: ScalarTag::Str, text: text.into() }
    }
}

/// Insertion-ordered mapping with string keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mapping {
    entries: Vec<(String, Node)>,
}

impl Mapping {
    pub fn new() -> Self { Self::default() }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.entries.iter_mut().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Insert or replace, keeping the original position of an existing key.
    pub fn insert(&mut self, key: impl Into<String>, value: Node) {
        let key = key.into();
        match self.get_mut(&key) {
            Some(slot) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl<K: Into<String>> FromIterator<(K, Node)> for Mapping {
    fn from_iter<I: IntoIterator<Item = (K, Node)>>(iter: I) -> Self {
        let mut m = Mapping::new();
        for (k, v) in iter {
            m.insert(k, v);
        }
        m
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Node {
    #[default]
    Null,
    Scalar(Scalar),
    Mapping(Mapping),
    Sequence(Vec<Node>),
}

impl Node {
    pub fn string(text: impl Into<String>) -> Self {
        Node::Scalar(Scalar::string(text))
    }

    /// An empty node of the given kind; used when a lookup has to create a path.
    pub fn empty(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Null => Node::Null,
            NodeKind::Scalar => Node::string(""),
            NodeKind::Mapping => Node::Mapping(Mapping::new()),
            NodeKind::Sequence => Node::Sequence(Vec::new()),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Null => NodeKind::Null,
            Node::Scalar(_) => NodeKind::Scalar,
            Node::Mapping(_) => NodeKind::Mapping,
            Node::Sequence(_) => NodeKind::Sequence,
        }
    }

    /// Null, or a container without children.
    pub fn is_nil_or_empty(&self) -> bool {
        match self {
            Node::Null => true,
            Node::Scalar(_) => false,
            Node::Mapping(m) => m.is_empty(),
            Node::Sequence(s) => s.is_empty(),
        }
    }

    /// YAML treats null as a scalar node, and so do we.
    pub fn is_scalar(&self) -> bool {
        matches!(self.kind(), NodeKind::Null | NodeKind::Scalar)
    }

    /// Textual content of a scalar. `None` for containers.
    pub fn text(&self) -> Option<&str> {
        match self {
            Node::Null => Some(""),
            Node::Scalar(s) => Some(&s.text),
            Node::Mapping(_) | Node::Sequence(_) => None,
        }
    }

    /// Replace the textual content of a scalar, keeping its tag. A null
    /// becomes a string scalar. Returns `false` (and leaves the node alone)
    /// for containers.
    pub fn set_text(&mut self, text: impl Into<String>) -> bool {
        match self {
            Node::Null => {
                *self = Node::string(text);
                true
            }
            Node::Scalar(s) => {
                s.text = text.into();
                true
            }
            Node::Mapping(_) | Node::Sequence(_) => false,
        }
    }

    /// Replace this node's whole subtree (kind, tag, children) with `value`.
    pub fn overwrite(&mut self, value: Node) {
        *self = value;
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Node::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Node> {
        self.as_mapping().and_then(|m| m.get(name))
    }

    /// Text of a scalar field of a mapping, if present.
    pub fn field_text(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(Node::text)
    }

    pub fn lookup(&self, path: &FieldPath) -> Result<Option<&Node>, PathError> {
        path::lookup(self, path)
    }

    pub fn lookup_mut(&mut self, path: &FieldPath) -> Result<Option<&mut Node>, PathError> {
        path::lookup_mut(self, path, None)
    }

    /// Like [`Node::lookup_mut`] but creates missing segments. Intermediate
    /// containers take the kind the following segment needs; the leaf is
    /// created as an empty node of `leaf_kind`.
    pub fn lookup_or_create(
        &mut self,
        path: &FieldPath,
        leaf_kind: NodeKind,
    ) -> Result<Option<&mut Node>, PathError> {
        path::lookup_mut(self, path, Some(leaf_kind))
    }
}

// ---- serde_yaml conversions ----

/// Mapping keys are always strings in the tree. Numeric, boolean and null
/// keys keep their plain text (`8080:` becomes `"8080"`) and are written back
/// as quoted string keys; any tag on a key is lost.
fn yaml_key_text(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Null => "null".to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

impl From<serde_yaml::Value> for Node {
    fn from(v: serde_yaml::Value) -> Self {
        use serde_yaml::Value as Y;
        match v {
            Y::Null => Node::Null,
            Y::Bool(b) => Node::Scalar(Scalar { tag: ScalarTag::Bool, text: b.to_string() }),
            Y::Number(n) => {
                let tag = if n.is_i64() || n.is_u64() { ScalarTag::Int } else { ScalarTag::Float };
                Node::Scalar(Scalar { tag, text: n.to_string() })
            }
            Y::String(s) => Node::string(s),
            Y::Sequence(seq) => Node::Sequence(seq.into_iter().map(Node::from).collect()),
            Y::Mapping(map) => Node::Mapping(
                map.into_iter().map(|(k, v)| (yaml_key_text(k), Node::from(v))).collect(),
            ),
            // Custom tags are not carried through the tree
            Y::Tagged(tagged) => Node::from(tagged.value),
        }
    }
}

fn parse_float(text: &str) -> Option<f64> {
    match text {
        ".inf" | ".Inf" | ".INF" | "+.inf" => Some(f64::INFINITY),
        "-.inf" | "-.Inf" | "-.INF" => Some(f64::NEG_INFINITY),
        ".nan" | ".NaN" | ".NAN" => Some(f64::NAN),
        t => t.parse().ok(),
    }
}

impl From<&Node> for serde_yaml::Value {
    fn from(node: &Node) -> Self {
        use serde_yaml::Value as Y;
        match node {
            Node::Null => Y::Null,
            Node::Scalar(s) => match s.tag {
                ScalarTag::Str => Y::String(s.text.clone()),
                ScalarTag::Int => {
                    if let Ok(i) = s.text.parse::<i64>() {
                        Y::Number(i.into())
                    } else if let Ok(u) = s.text.parse::<u64>() {
                        Y::Number(u.into())
                    } else {
                        Y::String(s.text.clone())
                    }
                }
                ScalarTag::Float => match parse_float(&s.text) {
                    Some(f) => Y::Number(f.into()),
                    None => Y::String(s.text.clone()),
                },
                ScalarTag::Bool => match s.text.parse::<bool>() {
                    Ok(b) => Y::Bool(b),
                    Err(_) => Y::String(s.text.clone()),
                },
            },
            Node::Mapping(m) => {
                let mut out = serde_yaml::Mapping::new();
                for (k, v) in m.iter() {
                    out.insert(Y::String(k.to_string()), Y::from(v));
                }
                Y::Mapping(out)
            }
            Node::Sequence(seq) => Y::Sequence(seq.iter().map(Y::from).collect()),
        }
    }
}

// ---- serde_json conversions ----

impl From<serde_json::Value> for Node {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value as J;
        match v {
            J::Null => Node::Null,
            J::Bool(b) => Node::Scalar(Scalar { tag: ScalarTag::Bool, text: b.to_string() }),
            J::Number(n) => {
                let tag = if n.is_i64() || n.is_u64() { ScalarTag::Int } else { ScalarTag::Float };
                Node::Scalar(Scalar { tag, text: n.to_string() })
            }
            J::String(s) => Node::string(s),
            J::Array(arr) => Node::Sequence(arr.into_iter().map(Node::from).collect()),
            J::Object(obj) => Node::Mapping(obj.into_iter().map(|(k, v)| (k, Node::from(v))).collect()),
        }
    }
}

impl From<&Node> for serde_json::Value {
    fn from(node: &Node) -> Self {
        use serde_json::Value as J;
        match node {
            Node::Null => J::Null,
            Node::Scalar(s) => match s.tag {
                ScalarTag::Str => J::String(s.text.clone()),
                ScalarTag::Int => {
                    if let Ok(i) = s.text.parse::<i64>() {
                        J::from(i)
                    } else if let Ok(u) = s.text.parse::<u64>() {
                        J::from(u)
                    } else {
                        J::String(s.text.clone())
                    }
                }
                ScalarTag::Float => parse_float(&s.text)
                    .and_then(serde_json::Number::from_f64)
                    .map(J::Number)
                    .unwrap_or_else(|| J::String(s.text.clone())),
                ScalarTag::Bool => match s.text.parse::<bool>() {
                    Ok(b) => J::Bool(b),
                    Err(_) => J::String(s.text.clone()),
                },
            },
            Node::Mapping(m) => J::Object(m.iter().map(|(k, v)| (k.to_string(), J::from(v))).collect()),
            Node::Sequence(seq) => J::Array(seq.iter().map(J::from).collect()),
        }
    }
}

impl Serialize for Node {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde_yaml::Value::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_yaml::Value::deserialize(deserializer).map(Node::from)
    }
}
