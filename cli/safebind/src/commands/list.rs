//! `safebind list`: browse namespaces and the entities they declare.

use anyhow::{bail, Result};
use safebind_meta::MetadataQuery;

/// Namespaces when `namespace` is absent, otherwise `{kind} {name}` for
/// every entity in that namespace.
pub fn list_lines(query: &dyn MetadataQuery, namespace: Option<&str>) -> Result<Vec<String>> {
    let Some(namespace) = namespace else {
        return Ok(query.namespaces().into_iter().map(str::to_string).collect());
    };
    let mut entities = query.entities_in_namespace(namespace);
    if entities.is_empty() {
        bail!("namespace '{namespace}' not found or empty");
    }
    entities.sort();
    Ok(entities
        .into_iter()
        .map(|(name, kind)| format!("{kind} {name}"))
        .collect())
}

pub fn run(query: &dyn MetadataQuery, namespace: Option<&str>) -> Result<()> {
    for line in list_lines(query, namespace)? {
        println!("{line}");
    }
    Ok(())
}
