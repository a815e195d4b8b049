//! Resource identity (group, version, kind, name, namespace) and selector patterns.

#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::node::Node;
use crate::{API_VERSION_FIELD, KIND_FIELD, METADATA_FIELD, NAMESPACE_FIELD, NAME_FIELD};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceIdentity {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub name: String,
    pub namespace: String,
}

/// Same shape as [`ResourceIdentity`]; an empty field matches anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityPattern {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub group: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
}

/// Split `apps/v1` into (`apps`, `v1`); a bare `v1` belongs to the core group.
pub fn parse_group_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((g, v)) => (g.to_string(), v.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

impl ResourceIdentity {
    /// Derive the identity of a document. Documents without any resource
    /// metadata (not a mapping, or none of apiVersion/kind/metadata) get the
    /// zero identity, which only an all-wildcard pattern selects.
    pub fn derive(doc: &Node) -> Self {
        let Some(m) = doc.as_mapping() else { return Self::default() };
        if ![API_VERSION_FIELD, KIND_FIELD, METADATA_FIELD].iter().any(|f| m.contains_key(f)) {
            return Self::default();
        }
        let (group, version) = doc
            .field_text(API_VERSION_FIELD)
            .map(parse_group_version)
            .unwrap_or_default();
        let meta = doc.field(METADATA_FIELD);
        let meta_text = |f: &str| meta.and_then(|m| m.field_text(f)).unwrap_or_default().to_string();
        Self {
            group,
            version,
            kind: doc.field_text(KIND_FIELD).unwrap_or_default().to_string(),
            name: meta_text(NAME_FIELD),
            namespace: meta_text(NAMESPACE_FIELD),
        }
    }
}

impl IdentityPattern {
    pub fn kind(kind: impl Into<String>) -> Self {
        Self { kind: kind.into(), ..Self::default() }
    }

    pub fn named(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self { kind: kind.into(), name: name.into(), ..Self::default() }
    }

    pub fn matches(&self, id: &ResourceIdentity) -> bool {
        fn field(pattern: &str, value: &str) -> bool {
            pattern.is_empty() || pattern == value
        }
        field(&self.group, &id.group)
            && field(&self.version, &id.version)
            && field(&self.kind, &id.kind)
            && field(&self.name, &id.name)
            && field(&self.namespace, &id.namespace)
    }
}

fn or_star(s: &str) -> &str {
    if s.is_empty() { "*" } else { s }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let gv = if self.group.is_empty() { self.version.clone() } else { format!("{}/{}", self.group, self.version) };
        write!(f, "{} {}", gv, self.kind)?;
        if !self.namespace.is_empty() {
            write!(f, " {}/{}", self.namespace, self.name)
        } else {
            write!(f, " {}", self.name)
        }
    }
}

impl fmt::Display for IdentityPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{} {}/{}",
            or_star(&self.group),
            or_star(&self.version),
            or_star(&self.kind),
            or_star(&self.namespace),
            or_star(&self.name)
        )
    }
}
