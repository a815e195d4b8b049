//! Reading and writing multi-document manifest streams.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use tracing::debug;

use krm_core::{Node, ResourceIdentity};

use crate::Output;

fn max_yaml_bytes() -> usize {
    std::env::var("KRM_MAX_YAML_BYTES")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(1_000_000) // 1 MiB default
}

fn max_yaml_nodes() -> usize {
    std::env::var("KRM_MAX_YAML_NODES")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(100_000)
}

fn node_budget_exceeded(n: &Node, max: usize) -> bool {
    // Bail as soon as the running count reaches max
    fn walk(n: &Node, cur: &mut usize, max: usize) {
        if *cur >= max { return; }
        *cur += 1;
        match n {
            Node::Mapping(m) => {
                for (_k, v) in m.iter() {
                    if *cur >= max { break; }
                    walk(v, cur, max);
                }
            }
            Node::Sequence(items) => {
                for v in items.iter() {
                    if *cur >= max { break; }
                    walk(v, cur, max);
                }
            }
            Node::Null | Node::Scalar(_) => {}
        }
    }
    let mut count = 0usize;
    walk(n, &mut count, max);
    count >= max
}

/// Split a YAML stream into documents. Empty documents are dropped.
pub fn parse_stream(text: &str, origin: &str) -> Result<Vec<Node>> {
    if text.len() > max_yaml_bytes() {
        return Err(anyhow!("{}: YAML payload too large (>{} bytes)", origin, max_yaml_bytes()));
    }
    let max_nodes = max_yaml_nodes();
    let mut docs = Vec::new();
    for (i, de) in serde_yaml::Deserializer::from_str(text).enumerate() {
        let value = serde_yaml::Value::deserialize(de)
            .with_context(|| format!("parsing YAML document {} of {}", i, origin))?;
        if value.is_null() {
            continue;
        }
        let node = Node::from(value);
        if node_budget_exceeded(&node, max_nodes) {
            return Err(anyhow!("{}: document {} too complex (>{} nodes)", origin, i, max_nodes));
        }
        docs.push(node);
    }
    Ok(docs)
}

/// Read every input in order; no inputs (or `-`) means stdin.
pub fn read_inputs(inputs: &[PathBuf]) -> Result<Vec<Node>> {
    let stdin = [PathBuf::from("-")];
    let inputs = if inputs.is_empty() { &stdin[..] } else { inputs };
    let mut docs = Vec::new();
    for path in inputs {
        let (text, origin) = if path == Path::new("-") {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).context("reading stdin")?;
            (buf, "<stdin>".to_string())
        } else {
            let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            (text, path.display().to_string())
        };
        let parsed = parse_stream(&text, &origin)?;
        debug!(origin = %origin, documents = parsed.len(), "loaded input");
        docs.extend(parsed);
    }
    Ok(docs)
}

pub fn render(docs: &[Node], output: Output) -> Result<String> {
    match output {
        Output::Yaml => {
            let mut out = String::new();
            for (i, doc) in docs.iter().enumerate() {
                if i > 0 {
                    out.push_str("---\n");
                }
                out.push_str(&serde_yaml::to_string(doc).context("serializing YAML")?);
            }
            Ok(out)
        }
        Output::Json => {
            let values: Vec<serde_json::Value> = docs.iter().map(serde_json::Value::from).collect();
            Ok(serde_json::to_string_pretty(&values)?)
        }
    }
}

/// Identities of the input documents, as one YAML or JSON list in input order.
pub fn render_ids(ids: &[ResourceIdentity], output: Output) -> Result<String> {
    Ok(match output {
        Output::Yaml => serde_yaml::to_string(ids).context("serializing YAML")?,
        Output::Json => serde_json::to_string_pretty(ids)?,
    })
}
