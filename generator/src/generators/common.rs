use std::collections::{HashMap, HashSet};

use sg_schema::{Definition, Field, File, TypeId};

use crate::error::EmitError;

pub(super) const GENERATED_BY: &str = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));

/// Walks the top-level definitions of a file in emission order.
pub(super) trait DefinitionVisitor: Sized {
    type Value;

    fn visit_struct(&mut self, context: &GeneratorContext, def: &Definition) -> Result<Self::Value, EmitError>;

    fn visit_enum(&mut self, context: &GeneratorContext, def: &Definition) -> Result<Self::Value, EmitError>;

    /// Any other top-level definition: a named scalar, array, map or reference.
    fn visit_alias(&mut self, context: &GeneratorContext, def: &Definition) -> Result<Self::Value, EmitError>;
}

pub(super) struct GeneratorContext<'a> {
    pub(super) file: &'a File,
    /// `(struct, field)` pairs whose value leads back to the struct without
    /// passing through a list or map.
    recursive: HashSet<(&'a str, &'a str)>,
}

impl<'a> GeneratorContext<'a> {
    pub(super) fn new(file: &'a File) -> Self {
        Self {
            file,
            recursive: recursive_fields(file),
        }
    }

    /// Whether `owner.field` needs an indirection to keep `owner` finite.
    pub(super) fn is_recursive(&self, owner: &Definition, field: &Field) -> bool {
        self.recursive.contains(&(owner.name.as_str(), field.name.as_str()))
    }

    /// Top-level definitions sorted by name.
    pub(super) fn sorted_types(&self) -> Vec<&'a Definition> {
        let mut types: Vec<_> = self.file.types.iter().collect();
        types.sort_by(|a, b| a.name.cmp(&b.name));
        types
    }

    pub(super) fn walk<V: DefinitionVisitor>(&self, visitor: &mut V) -> Result<Vec<V::Value>, EmitError> {
        self.sorted_types()
            .into_iter()
            .map(|def| match def.type_ {
                TypeId::Struct => visitor.visit_struct(self, def),
                TypeId::Enum => visitor.visit_enum(self, def),
                _ => visitor.visit_alias(self, def),
            })
            .collect()
    }

    pub(super) fn entry_point(&self) -> Result<&'a Definition, EmitError> {
        self.file.entry_point().ok_or_else(|| {
            EmitError::new(&self.file.package, "no entry point type to build a builder for")
        })
    }

    /// The entry point, which builders can only wrap when it is a struct.
    pub(super) fn builder_target(&self) -> Result<&'a Definition, EmitError> {
        let entry = self.entry_point()?;
        if entry.type_ != TypeId::Struct {
            return Err(EmitError::new(&entry.name, "the entry point must be a struct"));
        }
        Ok(entry)
    }

    pub(super) fn file_name(&self, kind: &str, extension: &str) -> String {
        format!("{}_{kind}_gen.{extension}", self.file.package)
    }
}

/// Names `def` holds by value: direct references and the elements of
/// fixed-length arrays.
fn inline_refs<'d>(def: &'d Definition, out: &mut Vec<&'d str>) {
    match &def.type_ {
        TypeId::Ref(name) => out.push(name.as_str()),
        TypeId::Array if def.fixed_length().is_some() => {
            if let Some(value_type) = def.value_type() {
                inline_refs(value_type, out);
            }
        }
        _ => {}
    }
}

fn recursive_fields(file: &File) -> HashSet<(&str, &str)> {
    let mut edges: HashMap<&str, Vec<&str>> = HashMap::new();
    for def in &file.types {
        let targets = edges.entry(def.name.as_str()).or_default();
        match def.type_ {
            TypeId::Struct => def.fields.iter().for_each(|f| inline_refs(&f.type_, targets)),
            TypeId::Enum => {}
            _ => inline_refs(def, targets),
        }
    }

    let reaches = |from: &str, to: &str| {
        let mut seen = HashSet::new();
        let mut stack = vec![from];
        while let Some(name) = stack.pop() {
            if name == to {
                return true;
            }
            if seen.insert(name) {
                stack.extend(edges.get(name).into_iter().flatten().copied());
            }
        }
        false
    };

    let mut recursive = HashSet::new();
    for def in file.types.iter().filter(|d| d.type_ == TypeId::Struct) {
        for field in &def.fields {
            let mut targets = Vec::new();
            inline_refs(&field.type_, &mut targets);
            if targets.into_iter().any(|t| reaches(t, def.name.as_str())) {
                recursive.insert((def.name.as_str(), field.name.as_str()));
            }
        }
    }
    recursive
}

/// Documentation for a field or type: its own comments, then a line per
/// constraint and the default value.
pub(super) fn doc_lines(subject: &str, comments: &[String], def: &Definition) -> Vec<String> {
    let mut lines = comments.to_vec();
    lines.extend(def.constraints.iter().map(|c| c.describe(subject)));
    if let Some(default) = &def.default {
        lines.push(format!("{subject} defaults to {default}"));
    }
    lines
}

/// The field the builder constructor takes as its first argument: `title`
/// when present, else the first required string field.
pub(super) fn primary_field(entry: &Definition) -> Option<&Field> {
    let is_string = |f: &&Field| f.type_.type_ == TypeId::String;
    entry
        .fields
        .iter()
        .filter(is_string)
        .find(|f| f.name == "title")
        .or_else(|| entry.fields.iter().filter(is_string).find(|f| f.required))
}

pub(super) fn unexpected(owner: &Definition, def: &Definition) -> EmitError {
    let message = match def.type_ {
        TypeId::Disjunction => "disjunction left in the AST; run the preprocessor first".to_owned(),
        TypeId::Struct | TypeId::Enum => format!("anonymous nested {}", def.type_),
        _ => format!("cannot render a {} here", def.type_),
    };
    EmitError::new(&owner.name, message)
}

/// Line-oriented source builder for the text-based targets.
pub(super) struct Code {
    buf: String,
    indent: usize,
    unit: &'static str,
}

impl Code {
    pub(super) fn new(unit: &'static str) -> Self {
        Self {
            buf: String::new(),
            indent: 0,
            unit,
        }
    }

    pub(super) fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.indent {
                self.buf.push_str(self.unit);
            }
            self.buf.push_str(text);
        }
        self.buf.push('\n');
    }

    pub(super) fn blank(&mut self) {
        self.buf.push('\n');
    }

    pub(super) fn indent(&mut self) {
        self.indent += 1;
    }

    pub(super) fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    pub(super) fn finish(self) -> String {
        self.buf
    }
}
