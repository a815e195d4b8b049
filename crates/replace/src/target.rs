//! Target side: select documents and write the resolved value into them.

use metrics::counter;
use tracing::{debug, trace};

use krm_core::{FieldPath, IdentityPattern, Node, ResourceIdentity};

use crate::{FieldOptions, ReplaceError, TargetSelector, DEFAULT_FIELD_PATH};

fn rejected(rejects: &[IdentityPattern], id: &ResourceIdentity) -> bool {
    rejects.iter().any(|r| r.matches(id))
}

/// Write `value` into every document selected by each target, in input order.
///
/// With `value == None` (absent source field) targets are still validated
/// but nothing is written. Delimiter splicing rewrites `value` itself, so
/// later targets of the same rule see the composed text.
pub fn apply_to_targets(
    documents: &mut [Node],
    mut value: Option<&mut Node>,
    targets: &mut [TargetSelector],
) -> Result<(), ReplaceError> {
    for t in targets.iter_mut() {
        let select = t.select.as_ref().ok_or(ReplaceError::MissingTargetSelector)?;
        if t.field_paths.is_empty() {
            t.field_paths = vec![DEFAULT_FIELD_PATH.to_string()];
        }
        let Some(value) = value.as_deref_mut() else { continue };
        for doc in documents.iter_mut() {
            let id = ResourceIdentity::derive(doc);
            if !select.matches(&id) || rejected(&t.reject, &id) {
                continue;
            }
            debug!(resource = %id, "writing replacement");
            apply_to_node(doc, value, &t.field_paths, t.options.as_ref())?;
        }
    }
    Ok(())
}

/// Write `value` at each of `field_paths` in one document. Missing paths are
/// skipped unless `options.create` is set.
pub fn apply_to_node(
    doc: &mut Node,
    value: &mut Node,
    field_paths: &[String],
    options: Option<&FieldOptions>,
) -> Result<(), ReplaceError> {
    let create = options.is_some_and(|o| o.create);
    for fp in field_paths {
        let path = FieldPath::parse(fp)?;
        let target = if create {
            doc.lookup_or_create(&path, value.kind())?
        } else {
            doc.lookup_mut(&path)?
        };
        match target {
            Some(t) => {
                set_target_value(options, t, value)?;
                counter!("replacement_fields_written", 1u64);
            }
            None => trace!(field_path = %path, "target path absent; skipped"),
        }
    }
    Ok(())
}

/// Overwrite `target` with a copy of `value`. With a delimiter, `value`'s own
/// text is first replaced by the target's elements with `value` spliced in.
pub fn set_target_value(options: Option<&FieldOptions>, target: &mut Node, value: &mut Node) -> Result<(), ReplaceError> {
    if let Some(opts) = FieldOptions::with_delimiter(options) {
        let current = target.text().ok_or(ReplaceError::InvalidRefinementTarget(target.kind()))?;
        let v = value.text().ok_or(ReplaceError::InvalidRefinementTarget(value.kind()))?;
        let mut parts: Vec<&str> = current.split(opts.delimiter.as_str()).collect();
        match usize::try_from(opts.index) {
            Err(_) => parts.insert(0, v),
            Ok(i) if i >= parts.len() => parts.push(v),
            Ok(i) => parts[i] = v,
        }
        let joined = parts.join(opts.delimiter.as_str());
        value.set_text(joined);
    }
    target.overwrite(value.clone());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use krm_core::{NodeKind, Scalar, ScalarTag};

    fn splice(current: &str, value: &str, index: i64) -> Node {
        let mut target = Node::string(current);
        set_target_value(Some(&FieldOptions::delimited("-", index)), &mut target, &mut Node::string(value)).unwrap();
        target
    }

    #[test]
    fn delimiter_prefix_suffix_and_replace() {
        assert_eq!(splice("a-b", "p", -1), Node::string("p-a-b"));
        assert_eq!(splice("a-b", "s", 5), Node::string("a-b-s"));
        assert_eq!(splice("a-b", "s", 2), Node::string("a-b-s"));
        assert_eq!(splice("x-y-z", "b", 1), Node::string("x-b-z"));
    }

    #[test]
    fn spliced_target_takes_the_value_tag() {
        let mut target = Node::string("1-2");
        let mut value = Node::Scalar(Scalar { tag: ScalarTag::Int, text: "9".into() });
        set_target_value(Some(&FieldOptions::delimited("-", 0)), &mut target, &mut value).unwrap();
        assert_eq!(target, Node::Scalar(Scalar { tag: ScalarTag::Int, text: "9-2".into() }));
    }

    #[test]
    fn splice_rewrites_the_value_it_writes() {
        let mut value = Node::string("v");
        let mut first = Node::string("a-b");
        set_target_value(Some(&FieldOptions::delimited("-", 0)), &mut first, &mut value).unwrap();
        assert_eq!(value, Node::string("v-b"));
        assert_eq!(first, Node::string("v-b"));

        let mut second = Node::string("c-d");
        set_target_value(Some(&FieldOptions::delimited("-", 0)), &mut second, &mut value).unwrap();
        assert_eq!(second, Node::string("v-b-d"));
    }

    #[test]
    fn delimiter_requires_scalar_target() {
        let mut target = Node::Sequence(vec![Node::string("a")]);
        let err = set_target_value(Some(&FieldOptions::delimited("-", 0)), &mut target, &mut Node::string("v")).unwrap_err();
        assert_eq!(err, ReplaceError::InvalidRefinementTarget(NodeKind::Sequence));
    }

    #[test]
    fn delimiter_requires_scalar_value() {
        let mut target = Node::string("a-b");
        let mut value = Node::Mapping([("k", Node::string("v"))].into_iter().collect());
        let err = set_target_value(Some(&FieldOptions::delimited("-", 0)), &mut target, &mut value).unwrap_err();
        assert_eq!(err, ReplaceError::InvalidRefinementTarget(NodeKind::Mapping));
        assert_eq!(target, Node::string("a-b"));
    }

    #[test]
    fn null_target_splices_as_empty_text() {
        let mut target = Node::Null;
        set_target_value(Some(&FieldOptions::delimited("-", 0)), &mut target, &mut Node::string("v")).unwrap();
        assert_eq!(target, Node::string("v"));
    }

    #[test]
    fn plain_injection_replaces_structure() {
        let mut target = Node::string("old");
        let mut value = Node::Sequence(vec![Node::string("a"), Node::string("b")]);
        set_target_value(None, &mut target, &mut value).unwrap();
        assert_eq!(target, value);
    }
}
