//! Documentation lookup for generated declarations.

use std::collections::BTreeMap;
use std::path::Path;

use safebind_meta::QualifiedName;

use crate::error::Result;

/// Prose for an API, keyed by its qualified name.
pub trait DocumentationProvider {
    fn describe(&self, name: &QualifiedName) -> Option<&str>;
}

/// Documentation read from a flat TOML table: `"Ns.Name" = "text"`.
#[derive(Debug, Clone, Default)]
pub struct DocumentationMap {
    entries: BTreeMap<String, String>,
}

impl DocumentationMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(input: &str) -> Result<Self> {
        let entries: BTreeMap<String, String> = toml::from_str(input)?;
        Ok(Self { entries })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn insert(&mut self, name: &QualifiedName, text: impl Into<String>) {
        self.entries.insert(name.to_string(), text.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DocumentationProvider for DocumentationMap {
    fn describe(&self, name: &QualifiedName) -> Option<&str> {
        self.entries.get(&name.to_string()).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_flat_table() {
        let docs = DocumentationMap::parse(
            r#"
"Windows.Win32.Foundation.CloseHandle" = "Closes an open object handle."
"Windows.Win32.Storage.FileSystem.CreateFileW" = "Creates or opens a file."
"#,
        )
        .unwrap();
        assert_eq!(docs.len(), 2);
        let name = QualifiedName::new("Windows.Win32.Foundation", "CloseHandle");
        assert_eq!(docs.describe(&name), Some("Closes an open object handle."));
        assert!(docs
            .describe(&QualifiedName::new("Windows.Win32.Foundation", "Missing"))
            .is_none());
    }

    #[test]
    fn rejects_non_string_values() {
        assert!(DocumentationMap::parse("\"N.A\" = 3").is_err());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "\"N.Beep\" = \"Plays a tone.\"").unwrap();
        let docs = DocumentationMap::load(file.path()).unwrap();
        assert_eq!(docs.describe(&QualifiedName::new("N", "Beep")), Some("Plays a tone."));
    }
}
