//! `safebind generate`: produce bindings for the requested APIs.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use safebind_core::{DocumentationMap, Generator, GeneratorOptions};
use safebind_meta::Architecture;
use safebind_render::OutputFormat;
use tracing::info;

use crate::manifest::{load_metadata, SafebindManifest};

#[derive(Debug, Default, Args)]
pub struct GenerateArgs {
    /// APIs to generate: short or qualified names, or `Namespace.*`
    pub names: Vec<String>,
    /// Metadata file to load (repeatable; overrides the manifest)
    #[arg(long = "metadata")]
    pub metadata: Vec<String>,
    /// Generate every export of a library (repeatable)
    #[arg(long = "module")]
    pub modules: Vec<String>,
    /// Generate every constant
    #[arg(long)]
    pub all_constants: bool,
    /// Generate every macro
    #[arg(long)]
    pub all_macros: bool,
    /// Target architecture (x86, x64, arm64)
    #[arg(long)]
    pub arch: Option<String>,
    /// Output file (default: manifest output path, else stdout)
    #[arg(long)]
    pub out: Option<String>,
    /// Output format (rust, json)
    #[arg(long)]
    pub format: Option<String>,
}

/// Everything one generation run needs, with paths resolved.
#[derive(Debug)]
pub struct GeneratePlan {
    pub metadata_base: PathBuf,
    pub metadata: Vec<String>,
    pub docs: Option<PathBuf>,
    pub options: GeneratorOptions,
    pub apis: Vec<String>,
    pub modules: Vec<String>,
    pub all_constants: bool,
    pub all_macros: bool,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
}

impl GeneratePlan {
    /// Merge command-line arguments over the manifest. Arguments win.
    pub fn resolve(
        cwd: &Path,
        manifest: Option<(&SafebindManifest, &Path)>,
        args: &GenerateArgs,
    ) -> Result<Self> {
        let (metadata_base, metadata) = match (args.metadata.is_empty(), manifest) {
            (false, _) => (cwd.to_path_buf(), args.metadata.clone()),
            (true, Some((m, dir))) => (dir.to_path_buf(), m.metadata.files.clone()),
            (true, None) => (cwd.to_path_buf(), Vec::new()),
        };

        let mut options = manifest.map(|(m, _)| m.options.clone()).unwrap_or_default();
        if let Some(arch) = &args.arch {
            options.architecture = Some(
                Architecture::parse(arch)
                    .with_context(|| format!("unknown architecture '{arch}'"))?,
            );
        }

        let apis = if args.names.is_empty() {
            manifest.map(|(m, _)| m.apis.clone()).unwrap_or_default()
        } else {
            args.names.clone()
        };
        let modules = if args.modules.is_empty() {
            manifest.map(|(m, _)| m.modules.clone()).unwrap_or_default()
        } else {
            args.modules.clone()
        };

        let format = match &args.format {
            Some(name) => OutputFormat::parse(name)?,
            None => manifest.map(|(m, _)| m.output.format).unwrap_or_default(),
        };
        let output = match (&args.out, manifest) {
            (Some(out), _) => Some(cwd.join(out)),
            (None, Some((m, dir))) => m.output.path.as_ref().map(|p| dir.join(p)),
            (None, None) => None,
        };
        let docs = manifest.and_then(|(m, dir)| m.docs.as_ref().map(|d| dir.join(&d.file)));

        Ok(Self {
            metadata_base,
            metadata,
            docs,
            options,
            apis,
            modules,
            all_constants: args.all_constants,
            all_macros: args.all_macros,
            format,
            output,
        })
    }

    fn is_empty(&self) -> bool {
        self.apis.is_empty() && self.modules.is_empty() && !self.all_constants && !self.all_macros
    }
}

/// Run generation and render the result in the planned format.
pub fn generate(plan: &GeneratePlan) -> Result<String> {
    if plan.is_empty() {
        bail!("nothing to generate (name APIs, pass --module, or list `apis` in the manifest)");
    }
    let query = load_metadata(&plan.metadata_base, &plan.metadata)?;
    let docs = match &plan.docs {
        Some(path) => Some(
            DocumentationMap::load(path)
                .with_context(|| format!("loading documentation {}", path.display()))?,
        ),
        None => None,
    };

    let mut generator = Generator::new(&query, plan.options.clone());
    if let Some(docs) = &docs {
        generator = generator.with_documentation(docs);
    }

    for api in &plan.apis {
        generator
            .try_generate(api)
            .with_context(|| format!("generating '{api}'"))?;
    }
    for module in &plan.modules {
        let report = generator
            .generate_all_for_module(module)
            .with_context(|| format!("generating module '{module}'"))?;
        info!(module = %module, generated = report.generated.len(), skipped = report.skipped.len(), "module generated");
    }
    if plan.all_constants {
        generator
            .generate_all_constants()
            .context("generating constants")?;
    }
    if plan.all_macros {
        generator.generate_all_macros().context("generating macros")?;
    }

    let bindings = generator.bindings().context("collecting bindings")?;
    info!(
        declarations = bindings.declarations.len(),
        fingerprint = %bindings.fingerprint,
        "bindings ready"
    );
    let output = safebind_render::render(&bindings).context("rendering bindings")?;
    Ok(output.render(plan.format)?)
}

pub fn run(cwd: &Path, manifest: Option<(&SafebindManifest, &Path)>, args: &GenerateArgs) -> Result<()> {
    let plan = GeneratePlan::resolve(cwd, manifest, args)?;
    let text = generate(&plan)?;
    match &plan.output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            fs::write(path, &text).with_context(|| format!("writing {}", path.display()))?;
            println!("Wrote {} bindings to {}", plan.format.name(), path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::FIXTURE;

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("win32.meta.toml"), FIXTURE).unwrap();
        dir
    }

    fn args(names: &[&str]) -> GenerateArgs {
        GenerateArgs {
            names: names.iter().map(|n| n.to_string()).collect(),
            metadata: vec!["win32.meta.toml".into()],
            ..Default::default()
        }
    }

    #[test]
    fn generates_rust_for_named_api() {
        let dir = project();
        let plan = GeneratePlan::resolve(dir.path(), None, &args(&["CreateFile"])).unwrap();
        let text = generate(&plan).unwrap();
        assert!(text.contains("pub mod win32_storage {"));
        assert!(text.contains("fn CreateFileW("));
        assert!(text.contains("impl Drop for CloseHandleSafeHandle"));
        assert!(text.contains("#[link(name = \"KERNEL32\")]"));
    }

    #[test]
    fn generates_json() {
        let dir = project();
        let mut a = args(&["MAX_PATH"]);
        a.format = Some("json".into());
        let plan = GeneratePlan::resolve(dir.path(), None, &a).unwrap();
        let text = generate(&plan).unwrap();
        assert!(text.contains("\"fingerprint\""));
        assert!(text.contains("\"MAX_PATH\""));
    }

    #[test]
    fn unknown_api_is_an_error() {
        let dir = project();
        let plan = GeneratePlan::resolve(dir.path(), None, &args(&["NoSuchApi"])).unwrap();
        let err = generate(&plan).unwrap_err();
        assert!(format!("{err:#}").contains("NoSuchApi"));
    }

    #[test]
    fn empty_request_is_an_error() {
        let dir = project();
        let plan = GeneratePlan::resolve(dir.path(), None, &args(&[])).unwrap();
        assert!(generate(&plan).is_err());
    }

    #[test]
    fn module_and_constants_in_bulk() {
        let dir = project();
        let mut a = args(&[]);
        a.modules = vec!["kernel32".into()];
        a.all_constants = true;
        let plan = GeneratePlan::resolve(dir.path(), None, &a).unwrap();
        let text = generate(&plan).unwrap();
        assert!(text.contains("fn CloseHandle("));
        assert!(text.contains("const MAX_PATH: u32 = 260;"));
    }

    #[test]
    fn manifest_supplies_defaults() {
        let dir = project();
        fs::write(dir.path().join("docs.toml"), "\"Win32.Foundation.MAX_PATH\" = \"Longest path.\"\n")
            .unwrap();
        let manifest: SafebindManifest = toml::from_str(
            r#"
apis = ["MAX_PATH"]

[project]
name = "demo"

[metadata]
files = ["win32.meta.toml"]

[docs]
file = "docs.toml"

[output]
path = "out/bindings.rs"
"#,
        )
        .unwrap();

        let cwd = dir.path().join("elsewhere");
        let plan =
            GeneratePlan::resolve(&cwd, Some((&manifest, dir.path())), &GenerateArgs::default())
                .unwrap();
        assert_eq!(plan.metadata_base, dir.path());
        assert_eq!(plan.apis, vec!["MAX_PATH"]);
        assert_eq!(plan.output, Some(dir.path().join("out/bindings.rs")));
        let text = generate(&plan).unwrap();
        assert!(text.contains("/// Longest path."));
    }

    #[test]
    fn run_writes_output_file() {
        let dir = project();
        let mut a = args(&["MAX_PATH"]);
        a.out = Some("out/nested/bindings.rs".into());
        run(dir.path(), None, &a).unwrap();
        let written = fs::read_to_string(dir.path().join("out/nested/bindings.rs")).unwrap();
        assert!(written.starts_with("// Generated by safebind."));
    }

    #[test]
    fn rejects_unknown_architecture() {
        let dir = project();
        let mut a = args(&["MAX_PATH"]);
        a.arch = Some("sparc".into());
        assert!(GeneratePlan::resolve(dir.path(), None, &a).is_err());
    }
}
