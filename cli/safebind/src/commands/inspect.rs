//! `safebind inspect`: generate one API and show what came out.

use std::fmt::Write;

use anyhow::{Context, Result};
use safebind_core::{Generator, GeneratorOptions, Item};
use safebind_meta::MetadataQuery;
use safebind_render::format::type_text;
use safebind_render::rust::render_standalone;

/// Describe the declaration generated for `name` along with the count of
/// dependencies pulled in and any friendly overloads.
pub fn describe(query: &dyn MetadataQuery, options: GeneratorOptions, name: &str) -> Result<String> {
    let mut generator = Generator::new(query, options);
    let (qn, kind) = generator.lookup(name)?;
    generator
        .try_generate(&qn.to_string())
        .with_context(|| format!("generating '{qn}'"))?;
    let decl = generator
        .declaration(&qn, kind)
        .with_context(|| format!("no declaration recorded for '{qn}'"))?;

    let mut out = String::new();
    writeln!(out, "{kind} {qn}")?;
    writeln!(out, "  item: {}", decl.item.kind_name())?;
    writeln!(out, "  declarations generated: {}", generator.store().len())?;
    if name != qn.name && name != qn.to_string() {
        writeln!(out, "  requested as: {name}")?;
    }
    if let Item::Function(function) = &decl.item {
        writeln!(out, "  library: {}", function.library)?;
        for overload in &function.friendly {
            let params: Vec<String> = overload
                .params
                .iter()
                .map(|p| format!("{}: {}", p.name, type_text(&p.ty)))
                .collect();
            writeln!(
                out,
                "  overload: {}({}) -> {}",
                overload.name,
                params.join(", "),
                type_text(&overload.ret)
            )?;
        }
    }
    out.push('\n');
    out.push_str(&render_standalone(decl));
    Ok(out)
}

pub fn run(query: &dyn MetadataQuery, options: GeneratorOptions, name: &str) -> Result<()> {
    print!("{}", describe(query, options, name)?);
    Ok(())
}
