//! safebind CLI: generate safe bindings from native API metadata.

mod commands;
mod manifest;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use safebind_meta::MetadataSet;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use commands::generate::GenerateArgs;
use manifest::{load_metadata, SafebindManifest};

const LOG_ENV: &str = "SAFEBIND_LOG";
const DEFAULT_FILTER: &str = "safebind=info";

#[derive(Parser)]
#[command(name = "safebind", version, about = "Safe bindings for native APIs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new binding project
    Init {
        /// Project name
        name: String,
    },
    /// Generate bindings
    Generate(GenerateArgs),
    /// List namespaces, or the entities of one namespace
    List {
        namespace: Option<String>,
        /// Metadata file to load (repeatable; overrides the manifest)
        #[arg(long = "metadata")]
        metadata: Vec<String>,
    },
    /// Generate a single API and show the result
    Inspect {
        /// Short or qualified name
        name: String,
        /// Metadata file to load (repeatable; overrides the manifest)
        #[arg(long = "metadata")]
        metadata: Vec<String>,
    },
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

/// Log to stderr, filtered by `SAFEBIND_LOG` (default `safebind=info`).
fn init_tracing() {
    let filter = std::env::var(LOG_ENV).unwrap_or_else(|_| DEFAULT_FILTER.to_string());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(EnvFilter::new(filter));

    if tracing_subscriber::registry()
        .with(fmt_layer)
        .try_init()
        .is_err()
    {
        eprintln!("warning: tracing subscriber already initialized");
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;

    match cli.command {
        Commands::Init { name } => commands::init::run(&name),

        Commands::Generate(args) => {
            let (manifest, project_dir) = load_manifest_optional(&cwd)?;
            let loaded = manifest.as_ref().zip(project_dir.as_deref());
            commands::generate::run(&cwd, loaded, &args)
        }

        Commands::List {
            namespace,
            metadata,
        } => {
            let (manifest, project_dir) = load_manifest_optional(&cwd)?;
            let query = metadata_for(&cwd, manifest.as_ref(), project_dir.as_deref(), &metadata)?;
            commands::list::run(&query, namespace.as_deref())
        }

        Commands::Inspect { name, metadata } => {
            let (manifest, project_dir) = load_manifest_optional(&cwd)?;
            let query = metadata_for(&cwd, manifest.as_ref(), project_dir.as_deref(), &metadata)?;
            let options = manifest.map(|m| m.options).unwrap_or_default();
            commands::inspect::run(&query, options, &name)
        }
    }
}

/// Metadata from the command line when given, else from the manifest.
fn metadata_for(
    cwd: &Path,
    manifest: Option<&SafebindManifest>,
    project_dir: Option<&Path>,
    files: &[String],
) -> anyhow::Result<MetadataSet> {
    match (files.is_empty(), manifest, project_dir) {
        (true, Some(manifest), Some(dir)) => load_metadata(dir, &manifest.metadata.files),
        _ => load_metadata(cwd, files),
    }
}

/// Try to load a manifest from the current directory upward. Returns (None, None) if not found.
fn load_manifest_optional(
    cwd: &Path,
) -> anyhow::Result<(Option<SafebindManifest>, Option<PathBuf>)> {
    match SafebindManifest::find_and_load(cwd)? {
        Some((manifest, dir)) => Ok((Some(manifest), Some(dir))),
        None => Ok((None, None)),
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::commands::FIXTURE;

    /// Full workflow: init, add metadata, list, inspect, generate.
    #[test]
    fn init_list_inspect_generate_workflow() {
        let dir = tempfile::tempdir().unwrap();
        let project_path = dir.path().join("demo");

        commands::init::create_project(&project_path, "demo").unwrap();
        std::fs::write(project_path.join("metadata/demo.meta.toml"), FIXTURE).unwrap();

        let (manifest, project_dir) = load_manifest_optional(&project_path).unwrap();
        let manifest = manifest.unwrap();
        let project_dir = project_dir.unwrap();
        assert_eq!(project_dir, project_path);

        let query = metadata_for(&project_path, Some(&manifest), Some(&project_dir), &[]).unwrap();
        let namespaces = commands::list::list_lines(&query, None).unwrap();
        assert_eq!(namespaces.len(), 2);

        let described =
            commands::inspect::describe(&query, manifest.options.clone(), "CloseHandle").unwrap();
        assert!(described.starts_with("function Win32.Foundation.CloseHandle"));

        let args = GenerateArgs {
            names: vec!["CreateFile".into(), "Win32.Foundation.*".into()],
            ..Default::default()
        };
        commands::generate::run(&project_path, Some((&manifest, &project_dir)), &args).unwrap();
        let written = std::fs::read_to_string(project_path.join("out/bindings.rs")).unwrap();
        assert!(written.contains("pub mod win32_foundation {"));
        assert!(written.contains("pub mod win32_storage {"));
        assert!(written.contains("const MAX_PATH: u32 = 260;"));
    }

    #[test]
    fn metadata_flag_overrides_manifest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("w.meta.toml"), FIXTURE).unwrap();
        let query =
            metadata_for(dir.path(), None, None, &["w.meta.toml".to_string()]).unwrap();
        let lines = commands::list::list_lines(&query, Some("Win32.Storage")).unwrap();
        assert_eq!(lines, vec!["function Win32.Storage.CreateFileW"]);
    }

    #[test]
    fn cli_parses_generate_flags() {
        let cli = Cli::try_parse_from([
            "safebind",
            "generate",
            "CreateFile",
            "--metadata",
            "a.meta.toml",
            "--module",
            "KERNEL32",
            "--all-constants",
            "--format",
            "json",
        ])
        .unwrap();
        match cli.command {
            Commands::Generate(args) => {
                assert_eq!(args.names, vec!["CreateFile"]);
                assert_eq!(args.metadata, vec!["a.meta.toml"]);
                assert_eq!(args.modules, vec!["KERNEL32"]);
                assert!(args.all_constants);
                assert!(!args.all_macros);
                assert_eq!(args.format.as_deref(), Some("json"));
            }
            _ => panic!("expected generate"),
        }
    }
}
