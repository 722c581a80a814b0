//! Rewrites applied to every emitted file before it lands in the
//! [`VirtualFs`](crate::VirtualFs).

use std::path::PathBuf;

use crate::fs::GeneratedFile;

/// A pure function from an emitted file to its final form.
pub trait PostProcessor {
    fn name(&self) -> &str;
    fn process(&self, file: GeneratedFile) -> Result<GeneratedFile, String>;
}

impl<F> PostProcessor for F
where
    F: Fn(GeneratedFile) -> Result<GeneratedFile, String>,
{
    fn name(&self) -> &str {
        "closure"
    }

    fn process(&self, file: GeneratedFile) -> Result<GeneratedFile, String> {
        self(file)
    }
}

/// Scopes every output path under a directory.
#[derive(Clone, Debug)]
pub struct Prefixer(pub PathBuf);

impl Prefixer {
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        Self(prefix.into())
    }
}

impl PostProcessor for Prefixer {
    fn name(&self) -> &str {
        "Prefixer"
    }

    fn process(&self, mut file: GeneratedFile) -> Result<GeneratedFile, String> {
        file.path = self.0.join(&file.path);
        Ok(file)
    }
}

fn has_extension(file: &GeneratedFile, extension: &str) -> bool {
    file.path.extension().is_some_and(|e| e == extension)
}

/// Adds the standard library imports a Go file refers to.
#[derive(Copy, Clone, Debug, Default)]
pub struct GoImports;

impl GoImports {
    const KNOWN: [(&'static str, &'static str); 3] =
        [("encoding/json", "json."), ("errors", "errors."), ("fmt", "fmt.")];
}

impl PostProcessor for GoImports {
    fn name(&self) -> &str {
        "GoImports"
    }

    fn process(&self, mut file: GeneratedFile) -> Result<GeneratedFile, String> {
        if !has_extension(&file, "go") {
            return Ok(file);
        }
        let source = String::from_utf8(file.data).map_err(|e| e.to_string())?;
        if source.lines().any(|l| l.starts_with("import ")) {
            file.data = source.into_bytes();
            return Ok(file);
        }

        // Comment lines never reference packages; skip them when scanning.
        let code: Vec<&str> = source
            .lines()
            .filter(|l| !l.trim_start().starts_with("//"))
            .collect();
        let mut imports: Vec<&str> = Self::KNOWN
            .iter()
            .filter(|(_, usage)| {
                code.iter()
                    .any(|l| l.split(|c: char| !c.is_alphanumeric() && c != '.').any(|w| w.starts_with(usage)))
            })
            .map(|(package, _)| *package)
            .collect();
        imports.sort_unstable();

        if imports.is_empty() {
            file.data = source.into_bytes();
            return Ok(file);
        }

        let lines: Vec<&str> = source.lines().collect();
        let package = lines
            .iter()
            .position(|l| l.starts_with("package "))
            .ok_or_else(|| "missing package clause".to_owned())?;

        let mut out = String::with_capacity(source.len() + 64);
        for line in &lines[..=package] {
            out.push_str(line);
            out.push('\n');
        }
        out.push_str("\nimport (\n");
        for import in &imports {
            out.push_str(&format!("\t\"{import}\"\n"));
        }
        out.push(')');
        for line in &lines[package + 1..] {
            out.push('\n');
            out.push_str(line);
        }
        out.push('\n');
        file.data = out.into_bytes();
        Ok(file)
    }
}

/// Validates and re-prints generated Rust, adding the `use` items the
/// emitters leave out.
#[cfg(feature = "generator-rust")]
#[derive(Copy, Clone, Debug, Default)]
pub struct RustFormat;

#[cfg(feature = "generator-rust")]
impl PostProcessor for RustFormat {
    fn name(&self) -> &str {
        "RustFormat"
    }

    fn process(&self, mut file: GeneratedFile) -> Result<GeneratedFile, String> {
        use quote::ToTokens;
        use syn::{parse_quote, Item};

        if !has_extension(&file, "rs") {
            return Ok(file);
        }
        let source = std::str::from_utf8(&file.data).map_err(|e| e.to_string())?;
        let mut ast = syn::parse_file(source).map_err(|e| e.to_string())?;

        let existing: Vec<String> = ast
            .items
            .iter()
            .filter_map(|item| match item {
                Item::Use(u) => Some(u.tree.to_token_stream().to_string()),
                _ => None,
            })
            .collect();
        let mut uses: Vec<Item> = Vec::new();

        let derives_serde = source.contains("Serialize") || source.contains("Deserialize");
        let serde: Item = parse_quote!(use serde::{Deserialize, Serialize};);
        if derives_serde && !contains_use(&existing, &serde) {
            uses.push(serde);
        }

        let stem = file.path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        if let Some(package) = stem.strip_suffix("_builder_gen") {
            let types = quote::format_ident!("{}_types_gen", package);
            let glob: Item = parse_quote!(use super::#types::*;);
            if !contains_use(&existing, &glob) {
                uses.push(glob);
            }
        }

        uses.append(&mut ast.items);
        ast.items = uses;
        file.data = prettyplease::unparse(&ast).into_bytes();
        Ok(file)
    }
}

#[cfg(feature = "generator-rust")]
fn contains_use(existing: &[String], item: &syn::Item) -> bool {
    use quote::ToTokens;

    match item {
        syn::Item::Use(u) => existing.contains(&u.tree.to_token_stream().to_string()),
        _ => false,
    }
}
