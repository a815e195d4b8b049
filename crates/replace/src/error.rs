use krm_core::{IdentityPattern, NodeKind, PathError};

/// Every variant aborts the whole pass. Mutations made before the failure stay.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplaceError {
    #[error("replacements must specify a source and at least one target")]
    InvalidRule,
    #[error("target must specify resources to select")]
    MissingTargetSelector,
    #[error("found no matches for source {0}")]
    NoSourceMatch(IdentityPattern),
    #[error("more than one match for source {0}")]
    AmbiguousSource(IdentityPattern),
    #[error("delimiter option can only be used with scalar nodes, found {0}")]
    InvalidRefinementTarget(NodeKind),
    #[error("options.index {index} is out of bounds for value {value}")]
    IndexOutOfBounds { index: i64, value: String },
    #[error(transparent)]
    TreeLookup(#[from] PathError),
}
