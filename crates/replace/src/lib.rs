//! KRM replacements: copy a field value from one document into fields of
//! other documents in the same set.
//!
//! Rules run strictly in order and mutate the documents in place, so a rule
//! observes every write made by the rules before it. The first error aborts
//! the pass without undoing earlier writes.

#![forbid(unsafe_code)]

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span};

use krm_core::{IdentityPattern, Node};

mod error;
pub mod source;
pub mod target;

pub use error::ReplaceError;
pub use source::{refine, resolve_source, select_source};
pub use target::{apply_to_node, apply_to_targets, set_target_value};

/// Field path used when a selector leaves its path(s) empty.
pub const DEFAULT_FIELD_PATH: &str = "metadata.name";

/// Delimiter handling shared by sources and targets.
///
/// `index` on a target: negative prepends, `>=` element count appends,
/// anything else replaces that element. On a source it must be in range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FieldOptions {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub delimiter: String,
    pub index: i64,
    /// Create missing path segments on targets instead of skipping them.
    pub create: bool,
}

impl FieldOptions {
    pub fn delimited(delimiter: impl Into<String>, index: i64) -> Self {
        Self { delimiter: delimiter.into(), index, create: false }
    }

    /// `Some(self)` when a delimiter is configured.
    pub(crate) fn with_delimiter(options: Option<&Self>) -> Option<&Self> {
        options.filter(|o| !o.delimiter.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "SourceSelectorFields")]
pub struct SourceSelector {
    #[serde(flatten)]
    pub id: IdentityPattern,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub field_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<FieldOptions>,
}

/// Wire shape of a source selector. `flatten` cannot be combined with
/// `deny_unknown_fields`, so the identity fields are spelled out here.
#[derive(Default, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
struct SourceSelectorFields {
    group: String,
    version: String,
    kind: String,
    name: String,
    namespace: String,
    field_path: String,
    options: Option<FieldOptions>,
}

impl From<SourceSelectorFields> for SourceSelector {
    fn from(f: SourceSelectorFields) -> Self {
        Self {
            id: IdentityPattern {
                group: f.group,
                version: f.version,
                kind: f.kind,
                name: f.name,
                namespace: f.namespace,
            },
            field_path: f.field_path,
            options: f.options,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TargetSelector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<IdentityPattern>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reject: Vec<IdentityPattern>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<FieldOptions>,
}

/// One rule: a single source value and the targets it is written to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Replacement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceSelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<TargetSelector>>,
}

/// Apply `replacements` to `documents` in order.
///
/// Empty field paths in the rules are filled in with [`DEFAULT_FIELD_PATH`]
/// as they are used. On error the documents keep every write made so far.
pub fn apply(documents: &mut [Node], replacements: &mut [Replacement]) -> Result<(), ReplaceError> {
    for (i, r) in replacements.iter_mut().enumerate() {
        let _span = debug_span!("replacement", rule = i).entered();
        if let Err(e) = apply_one(documents, r) {
            counter!("replacement_errors", 1u64);
            return Err(e);
        }
        counter!("replacement_rules_applied", 1u64);
    }
    Ok(())
}

fn apply_one(documents: &mut [Node], r: &mut Replacement) -> Result<(), ReplaceError> {
    let (Some(source), Some(targets)) = (r.source.as_mut(), r.targets.as_mut()) else {
        return Err(ReplaceError::InvalidRule);
    };
    // owned copy of the source field; splicing may rewrite it between targets
    let mut value = resolve_source(documents, source)?;
    if value.is_none() {
        debug!(source = %source.id, field_path = %source.field_path, "source field absent; nothing to write");
    }
    apply_to_targets(documents, value.as_mut(), targets)
}

/// A set of replacements applied as one pass over a document list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementFilter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replacements: Vec<Replacement>,
}

impl ReplacementFilter {
    pub fn new(replacements: Vec<Replacement>) -> Self {
        Self { replacements }
    }

    pub fn filter(&mut self, documents: &mut [Node]) -> Result<(), ReplaceError> {
        apply(documents, &mut self.replacements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_config_uses_kustomize_field_names() {
        let yaml = r#"
source:
  kind: ConfigMap
  name: cfg
  fieldPath: data.key
  options: { delimiter: "-", index: 1 }
targets:
- select: { kind: Deployment }
  reject: [ { name: skip } ]
  fieldPaths: [ spec.replicas ]
  options: { create: true }
"#;
        let r: Replacement = serde_yaml::from_str(yaml).unwrap();
        let source = r.source.unwrap();
        assert_eq!(source.id, IdentityPattern::named("ConfigMap", "cfg"));
        assert_eq!(source.field_path, "data.key");
        assert_eq!(source.options, Some(FieldOptions::delimited("-", 1)));
        let t = &r.targets.unwrap()[0];
        assert_eq!(t.select, Some(IdentityPattern::kind("Deployment")));
        assert_eq!(t.reject[0].name, "skip");
        assert_eq!(t.field_paths, vec!["spec.replicas".to_string()]);
        assert!(t.options.as_ref().unwrap().create);
    }

    #[test]
    fn unknown_source_fields_are_rejected() {
        let err = serde_yaml::from_str::<SourceSelector>("kind: ConfigMap\nfieldpath: data.key\n").unwrap_err();
        assert!(err.to_string().contains("fieldpath"), "err={}", err);
        let ok: SourceSelector = serde_yaml::from_str("kind: ConfigMap\nfieldPath: data.key\n").unwrap();
        assert_eq!(ok.id, IdentityPattern::kind("ConfigMap"));
        assert_eq!(ok.field_path, "data.key");
    }

    #[test]
    fn unknown_target_fields_are_rejected() {
        let err = serde_yaml::from_str::<TargetSelector>("selct: { kind: X }\n");
        assert!(err.is_err());
    }

    #[test]
    fn rules_without_source_or_targets_are_invalid() {
        let mut docs = vec![Node::string("x")];
        let mut missing_targets = vec![Replacement { source: Some(SourceSelector::default()), targets: None }];
        assert_eq!(apply(&mut docs, &mut missing_targets), Err(ReplaceError::InvalidRule));
        let mut missing_source = vec![Replacement { source: None, targets: Some(vec![]) }];
        assert_eq!(apply(&mut docs, &mut missing_source), Err(ReplaceError::InvalidRule));
    }
}
