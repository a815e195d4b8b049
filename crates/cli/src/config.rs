//! Replacement config loading.
//!
//! ```yaml
//! replacements:
//! - path: shared/replacements.yaml   # one replacement or a list
//! - source: { kind: ConfigMap, name: cfg, fieldPath: data.image }
//!   targets:
//!   - select: { kind: Deployment }
//!     fieldPaths: [spec.template.spec.containers.0.image]
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use krm_replace::Replacement;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PathEntry {
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReplacementField {
    Path(PathEntry),
    Inline(Replacement),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<Replacement>),
    One(Replacement),
}

/// Other top-level keys (e.g. the rest of a kustomization) are ignored.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    replacements: Vec<ReplacementField>,
}

pub fn load_replacements(path: &Path) -> Result<Vec<Replacement>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    parse_config(&text, base).with_context(|| format!("loading replacements from {}", path.display()))
}

/// Parse a config document; `path:` entries resolve against `base_dir`.
pub fn parse_config(text: &str, base_dir: &Path) -> Result<Vec<Replacement>> {
    let cfg: ConfigFile = serde_yaml::from_str(text).context("parsing replacements config")?;
    let mut out = Vec::with_capacity(cfg.replacements.len());
    for (i, field) in cfg.replacements.into_iter().enumerate() {
        match field {
            ReplacementField::Inline(r) => out.push(r),
            ReplacementField::Path(entry) => {
                let file = base_dir.join(&entry.path);
                let text = std::fs::read_to_string(&file)
                    .with_context(|| format!("replacements[{}]: reading {}", i, file.display()))?;
                let loaded: OneOrMany = serde_yaml::from_str(&text)
                    .with_context(|| format!("replacements[{}]: parsing {}", i, file.display()))?;
                match loaded {
                    OneOrMany::Many(rs) => {
                        debug!(file = %file.display(), count = rs.len(), "loaded replacement file");
                        out.extend(rs);
                    }
                    OneOrMany::One(r) => out.push(r),
                }
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use krm_core::IdentityPattern;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("krmctl-{}-{}", std::process::id(), name));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn inline_and_path_entries_keep_order() {
        let dir = scratch_dir("order");
        std::fs::write(
            dir.join("many.yaml"),
            "- source: { kind: A }\n  targets: []\n- source: { kind: B }\n  targets: []\n",
        )
        .unwrap();
        std::fs::write(dir.join("one.yaml"), "source: { kind: D }\ntargets: []\n").unwrap();
        let cfg = "apiVersion: kustomize.config.k8s.io/v1beta1\nresources: [x.yaml]\nreplacements:\n- path: many.yaml\n- source: { kind: C }\n  targets: []\n- path: one.yaml\n";
        let rs = parse_config(cfg, &dir).unwrap();
        let kinds: Vec<String> = rs.iter().map(|r| r.source.as_ref().unwrap().id.kind.clone()).collect();
        assert_eq!(kinds, vec!["A", "B", "C", "D"]);
        assert_eq!(rs[2].source.as_ref().unwrap().id, IdentityPattern::kind("C"));
    }

    #[test]
    fn entry_with_path_and_inline_fields_is_rejected() {
        let dir = scratch_dir("mixed");
        let cfg = "replacements:\n- path: one.yaml\n  source: { kind: C }\n";
        assert!(parse_config(cfg, &dir).is_err());
    }

    #[test]
    fn missing_referenced_file_names_the_entry() {
        let dir = scratch_dir("missing");
        let err = parse_config("replacements:\n- path: nope.yaml\n", &dir).unwrap_err();
        assert!(format!("{:#}", err).contains("replacements[0]"), "err={:#}", err);
    }

    #[test]
    fn load_resolves_paths_next_to_the_config() {
        let dir = scratch_dir("load");
        std::fs::write(dir.join("r.yaml"), "source: { kind: A, fieldPath: data.x }\ntargets: []\n").unwrap();
        std::fs::write(dir.join("kustomization.yaml"), "replacements:\n- path: r.yaml\n").unwrap();
        let rs = load_replacements(&dir.join("kustomization.yaml")).unwrap();
        assert_eq!(rs.len(), 1);
        assert_eq!(rs[0].source.as_ref().unwrap().field_path, "data.x");
    }
}
