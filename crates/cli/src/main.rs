use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};

use krm_core::ResourceIdentity;
use krm_replace::ReplacementFilter;

mod config;
mod input;

#[derive(Parser, Debug)]
#[command(name = "krmctl", version, about = "Copy field values between KRM documents")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Yaml)]
    output: Output,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum Output { Yaml, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply the replacements in a config file to a manifest stream
    Replace {
        /// Config file with a `replacements:` list (a kustomization works)
        #[arg(short = 'c', long = "config", env = "KRM_CONFIG")]
        config: PathBuf,
        /// Input manifests; none or "-" reads stdin
        inputs: Vec<PathBuf>,
    },
    /// Print the identity each input document is selected by
    Ids {
        /// Input manifests; none or "-" reads stdin
        inputs: Vec<PathBuf>,
    },
}

fn init_tracing() {
    let env = std::env::var("KRM_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    // stdout carries the manifest stream
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Replace { config, inputs } => {
            let replacements = config::load_replacements(&config)?;
            let mut docs = input::read_inputs(&inputs)?;
            info!(config = %config.display(), rules = replacements.len(), documents = docs.len(), "replace invoked");
            let mut filter = ReplacementFilter::new(replacements);
            if let Err(e) = filter.filter(&mut docs) {
                error!(error = %e, "replacement failed");
                return Err(e).context("applying replacements");
            }
            print!("{}", input::render(&docs, cli.output)?);
        }
        Commands::Ids { inputs } => {
            let docs = input::read_inputs(&inputs)?;
            let ids: Vec<ResourceIdentity> = docs.iter().map(ResourceIdentity::derive).collect();
            print!("{}", input::render_ids(&ids, cli.output)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_takes_config_and_inputs() {
        let cli = Cli::try_parse_from(["krmctl", "-o", "json", "replace", "-c", "k.yaml", "a.yaml", "b.yaml"]).unwrap();
        assert_eq!(cli.output, Output::Json);
        match cli.command {
            Commands::Replace { config, inputs } => {
                assert_eq!(config, PathBuf::from("k.yaml"));
                assert_eq!(inputs, vec![PathBuf::from("a.yaml"), PathBuf::from("b.yaml")]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn config_and_stream_run_end_to_end() {
        let cfg = "replacements:\n- source: { kind: ConfigMap, name: cfg, fieldPath: data.image }\n  targets:\n  - select: { kind: Deployment }\n    fieldPaths: [\"spec.template.spec.containers.[name=app].image\"]\n";
        let stream = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cfg\ndata:\n  image: nginx:1.25\n---\napiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: web\nspec:\n  template:\n    spec:\n      containers:\n      - name: app\n        image: nginx\n";
        let mut filter = ReplacementFilter::new(config::parse_config(cfg, std::path::Path::new(".")).unwrap());
        let mut docs = input::parse_stream(stream, "test").unwrap();
        filter.filter(&mut docs).unwrap();
        let out = input::render(&docs, Output::Yaml).unwrap();
        assert_eq!(out.matches("---\n").count(), 1, "out={}", out);
        let reparsed = input::parse_stream(&out, "rendered").unwrap();
        assert_eq!(reparsed, docs);
        let image = krm_core::FieldPath::parse("spec.template.spec.containers.0.image").unwrap();
        assert_eq!(reparsed[1].lookup(&image).unwrap().and_then(krm_core::Node::text), Some("nginx:1.25"));
    }
}
