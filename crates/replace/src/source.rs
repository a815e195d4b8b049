//! Source side: find the one document a selector names and read the value.

use tracing::{debug, trace};

use krm_core::{FieldPath, IdentityPattern, Node, ResourceIdentity};

use crate::{FieldOptions, ReplaceError, SourceSelector, DEFAULT_FIELD_PATH};

/// The single document matching `pattern`. Scanning stops at the second match.
pub fn select_source<'a>(documents: &'a [Node], pattern: &IdentityPattern) -> Result<&'a Node, ReplaceError> {
    let mut found: Option<&Node> = None;
    for doc in documents {
        if !pattern.matches(&ResourceIdentity::derive(doc)) {
            continue;
        }
        if found.is_some() {
            return Err(ReplaceError::AmbiguousSource(pattern.clone()));
        }
        found = Some(doc);
    }
    found.ok_or_else(|| ReplaceError::NoSourceMatch(pattern.clone()))
}

/// Resolve the value a rule copies. `Ok(None)` when the field path does not
/// exist in the source document. The returned node is an owned copy.
pub fn resolve_source(documents: &[Node], selector: &mut SourceSelector) -> Result<Option<Node>, ReplaceError> {
    let source = select_source(documents, &selector.id)?;
    if selector.field_path.is_empty() {
        selector.field_path = DEFAULT_FIELD_PATH.to_string();
    }
    let path = FieldPath::parse(&selector.field_path)?;
    debug!(source = %ResourceIdentity::derive(source), field_path = %path, "resolved source document");
    match source.lookup(&path)? {
        Some(node) if !node.is_nil_or_empty() => refine(selector.options.as_ref(), node).map(Some),
        Some(node) => Ok(Some(node.clone())),
        None => Ok(None),
    }
}

/// Pick one element of a delimited scalar. Without a delimiter this is a plain copy.
pub fn refine(options: Option<&FieldOptions>, value: &Node) -> Result<Node, ReplaceError> {
    let Some(opts) = FieldOptions::with_delimiter(options) else {
        return Ok(value.clone());
    };
    let text = value.text().ok_or(ReplaceError::InvalidRefinementTarget(value.kind()))?;
    let parts: Vec<&str> = text.split(opts.delimiter.as_str()).collect();
    let part = usize::try_from(opts.index)
        .ok()
        .and_then(|i| parts.get(i))
        .ok_or_else(|| ReplaceError::IndexOutOfBounds { index: opts.index, value: text.to_string() })?;
    trace!(delimiter = %opts.delimiter, index = opts.index, part, "refined source value");
    let mut refined = value.clone();
    refined.set_text(*part);
    Ok(refined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use krm_core::{NodeKind, Scalar, ScalarTag};

    fn yaml(s: &str) -> Node {
        Node::from(serde_yaml::from_str::<serde_yaml::Value>(s).unwrap())
    }

    #[test]
    fn refine_picks_indexed_element() {
        let v = refine(Some(&FieldOptions::delimited("-", 1)), &Node::string("a-b-c")).unwrap();
        assert_eq!(v, Node::string("b"));
    }

    #[test]
    fn refine_keeps_scalar_tag_of_the_copy() {
        let port = Node::Scalar(Scalar { tag: ScalarTag::Int, text: "8080".into() });
        let v = refine(Some(&FieldOptions::delimited("0", 0)), &port).unwrap();
        assert_eq!(v, Node::Scalar(Scalar { tag: ScalarTag::Int, text: "8".into() }));
    }

    #[test]
    fn refine_without_delimiter_is_a_copy() {
        let v = yaml("{a: [1, 2]}");
        assert_eq!(refine(None, &v).unwrap(), v);
        assert_eq!(refine(Some(&FieldOptions::default()), &v).unwrap(), v);
    }

    #[test]
    fn refine_rejects_out_of_range_and_structured_values() {
        for index in [-1, 3, 10] {
            let err = refine(Some(&FieldOptions::delimited("-", index)), &Node::string("a-b-c")).unwrap_err();
            assert_eq!(err, ReplaceError::IndexOutOfBounds { index, value: "a-b-c".into() });
        }
        let err = refine(Some(&FieldOptions::delimited("-", 0)), &yaml("[a, b]")).unwrap_err();
        assert_eq!(err, ReplaceError::InvalidRefinementTarget(NodeKind::Sequence));
    }

    #[test]
    fn select_source_stops_at_second_match() {
        let docs = vec![
            yaml("kind: ConfigMap\nmetadata: {name: a}\n"),
            yaml("kind: ConfigMap\nmetadata: {name: b}\n"),
            // would fail a full scan if the scan ever reached it
            yaml("kind: ConfigMap\nmetadata: {name: c}\n"),
        ];
        let err = select_source(&docs, &IdentityPattern::kind("ConfigMap")).unwrap_err();
        assert_eq!(err, ReplaceError::AmbiguousSource(IdentityPattern::kind("ConfigMap")));
        let one = select_source(&docs, &IdentityPattern::named("ConfigMap", "b")).unwrap();
        assert_eq!(one.field("metadata").and_then(|m| m.field_text("name")), Some("b"));
        assert!(matches!(
            select_source(&docs, &IdentityPattern::kind("Secret")),
            Err(ReplaceError::NoSourceMatch(_))
        ));
    }

    #[test]
    fn resolve_defaults_path_and_skips_refinement_of_empty_values() {
        let docs = vec![yaml("kind: ConfigMap\nmetadata: {name: cfg}\ndata: {}\n")];
        let mut sel = SourceSelector { id: IdentityPattern::kind("ConfigMap"), ..Default::default() };
        assert_eq!(resolve_source(&docs, &mut sel).unwrap(), Some(Node::string("cfg")));
        assert_eq!(sel.field_path, DEFAULT_FIELD_PATH);

        let mut empty = SourceSelector {
            id: IdentityPattern::kind("ConfigMap"),
            field_path: "data".into(),
            options: Some(FieldOptions::delimited("-", 4)),
        };
        assert_eq!(resolve_source(&docs, &mut empty).unwrap(), Some(yaml("{}")));

        let mut absent = SourceSelector { field_path: "data.missing".into(), ..empty };
        assert_eq!(resolve_source(&docs, &mut absent).unwrap(), None);
    }
}
