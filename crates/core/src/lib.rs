//! KRM core types: an owned document tree, dotted field paths and resource identity.
//!
//! The tree is deliberately small. Documents come in as `serde_yaml::Value` (or
//! `serde_json::Value`), are converted into [`Node`], mutated in place, and
//! converted back on the way out.

#![forbid(unsafe_code)]

pub mod identity;
pub mod node;
pub mod path;

pub use identity::{parse_group_version, IdentityPattern, ResourceIdentity};
pub use node::{Mapping, Node, NodeKind, Scalar, ScalarTag};
pub use path::{FieldPath, PathError, Segment};

/// Top-level field holding `group/version` (or just `version` for the core group).
pub const API_VERSION_FIELD: &str = "apiVersion";
pub const KIND_FIELD: &str = "kind";
pub const METADATA_FIELD: &str = "metadata";
pub const NAME_FIELD: &str = "name";
pub const NAMESPACE_FIELD: &str = "namespace";
