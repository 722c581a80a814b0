//! Front end for kind-system envelopes: a CUE document declaring a named
//! kind with a lineage of schema versions.
//!
//! ```text
//! name:     "Playlist"
//! maturity: "merged"
//! lineage: schemas: [{
//!     version: [0, 0]
//!     schema: {
//!         uid:   string
//!         items: [...#Item]
//!         #Item: { ... }
//!     }
//! }]
//! ```

use tracing::debug;

use crate::ast::{File, Scalar};
use crate::cue::{Expr, FieldDecl, Translator, Value};
use crate::error::{Error, Result};
use crate::Config;

/// Metadata read from the envelope before its schema is translated.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KindMetadata {
    pub name: String,
    pub maturity: Option<String>,
    pub description: Option<String>,
}

/// Extracts the envelope metadata and translates the latest schema of the
/// lineage. The schema's regular fields form the entry point, named after
/// the kind; its definitions become further top-level types.
pub fn generate_ast(root: &Value, config: &Config) -> Result<(KindMetadata, File)> {
    let metadata = KindMetadata {
        name: string_field(root, "name")?
            .ok_or_else(|| Error::malformed("name", "kind envelope has no name").at(&root.pos))?,
        maturity: string_field(root, "maturity")?,
        description: string_field(root, "description")?,
    };

    let schema = latest_schema(root)?;
    let decls = schema.fields();
    let translator = Translator::new(
        decls
            .iter()
            .filter(|d| d.definition)
            .map(|d| d.label.as_str())
            .chain(std::iter::once(metadata.name.as_str())),
    );

    let mut file = File::new(&config.package);
    let mut entry = translator
        .structure(&metadata.name, decls.iter().filter(|d| !d.definition))
        .map_err(|e| e.at(&schema.pos))?;
    entry.is_entry_point = true;
    entry.comments = metadata
        .description
        .iter()
        .flat_map(|d| d.lines())
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_owned)
        .collect();
    file.types.push(entry);

    for decl in decls.iter().filter(|d| d.definition) {
        if file.get(&decl.label).is_some() {
            return Err(Error::unsupported(&decl.label, "declared more than once").at(&decl.pos));
        }
        let def = translator.top_level(decl)?;
        debug!(kind = %metadata.name, name = %def.name, "declared top-level type");
        file.types.push(def);
    }

    Ok((metadata, file))
}

fn string_field(root: &Value, label: &str) -> Result<Option<String>> {
    let Some(decl) = root.lookup(label) else {
        return Ok(None);
    };
    match decl.value.concrete_scalar() {
        Some(Scalar::String(s)) => Ok(Some(s.clone())),
        _ => Err(Error::malformed(label, "expected a concrete string").at(&decl.pos)),
    }
}

/// The `schema` struct of the last entry of `lineage.schemas`.
fn latest_schema(root: &Value) -> Result<&Value> {
    let lineage = required(root, "lineage", "lineage")?;
    let schemas = required(&lineage.value, "schemas", "lineage.schemas")?;
    let latest = match &schemas.value.expr {
        Expr::List(list) if !list.open => list.elems.last(),
        _ => None,
    }
    .ok_or_else(|| {
        Error::malformed("lineage.schemas", "expected a non-empty list of schemas").at(&schemas.pos)
    })?;
    let schema = required(latest, "schema", "lineage.schemas[].schema")?;
    if schema.value.as_struct().is_none() {
        return Err(Error::malformed("lineage.schemas[].schema", "expected a struct").at(&schema.pos));
    }
    Ok(&schema.value)
}

fn required<'v>(value: &'v Value, label: &str, path: &str) -> Result<&'v FieldDecl> {
    value
        .lookup(label)
        .ok_or_else(|| Error::malformed(path, "missing from kind envelope").at(&value.pos))
}
