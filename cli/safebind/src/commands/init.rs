//! `safebind init`: project scaffolding.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::manifest::{SafebindManifest, MANIFEST_FILE};

/// Create a new binding project in a directory named `name`.
pub fn run(name: &str) -> Result<()> {
    create_project(Path::new(name), name)
}

pub(crate) fn create_project(project_dir: &Path, name: &str) -> Result<()> {
    if project_dir.exists() {
        bail!("directory '{}' already exists", project_dir.display());
    }

    fs::create_dir_all(project_dir.join("metadata")).context("creating metadata/ directory")?;
    fs::create_dir_all(project_dir.join("out")).context("creating out/ directory")?;
    fs::write(project_dir.join(MANIFEST_FILE), SafebindManifest::template(name))
        .with_context(|| format!("writing {MANIFEST_FILE}"))?;
    fs::write(project_dir.join(".gitignore"), "out/\n").context("writing .gitignore")?;

    println!("Created project '{name}'");
    println!("  {name}/{MANIFEST_FILE}");
    println!("  {name}/metadata/");
    Ok(())
}
