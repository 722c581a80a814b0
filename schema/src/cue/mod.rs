//! Front end for CUE-style schemas.
//!
//! [`load`] reads a document into a [`Value`] tree, [`generate_ast`] turns
//! its top-level bindings into a [`File`]:
//!
//! ```
//! use sg_schema::{cue, Config};
//!
//! let instance = cue::load("#Dashboard: {\n  title: string\n}", None).unwrap();
//! let file = cue::generate_ast(&instance.root, &Config::new("dashboard")).unwrap();
//! assert_eq!(file.types[0].name, "Dashboard");
//! assert!(file.types[0].is_entry_point);
//! ```

pub mod lexer;
mod parser;
pub mod value;

use std::collections::HashSet;

use heck::ToPascalCase;
use tracing::{debug, trace};

pub use parser::{load, Instance};
pub use value::{Attribute, Expr, FieldDecl, ListLit, StructLit, Value};

use crate::ast::{ConstraintOp, Definition, EnumValue, Field, File, Scalar, TypeConstraint, TypeId};
use crate::error::{Error, Result};
use crate::Config;

/// Name of the attribute carrying type hints, e.g. `@cuetsy(kind="enum")`.
pub const HINT_ATTRIBUTE: &str = "cuetsy";

/// Translates every top-level binding of `root` into a definition.
///
/// The entry point is the binding whose hint carries `entrypoint`, or else
/// the one named like the package in PascalCase.
pub fn generate_ast(root: &Value, config: &Config) -> Result<File> {
    let fields = root.fields();
    let translator = Translator::new(fields.iter().map(|f| f.label.as_str()));

    let mut file = File::new(&config.package);
    let mut explicit_entry = None;
    for field in fields {
        if file.get(&field.label).is_some() {
            return Err(Error::unsupported(&field.label, "declared more than once").at(&field.pos));
        }
        let def = translator.top_level(field)?;
        if field
            .attribute(HINT_ATTRIBUTE)
            .is_some_and(|hint| hint.has_flag("entrypoint"))
        {
            if explicit_entry.is_some() {
                return Err(Error::malformed(&field.label, "more than one entry point").at(&field.pos));
            }
            explicit_entry = Some(file.types.len());
        }
        debug!(name = %def.name, kind = %def.type_, "declared top-level type");
        file.types.push(def);
    }

    let entry_name = config.package.to_pascal_case();
    let entry = explicit_entry.or_else(|| file.types.iter().position(|d| d.name == entry_name));
    if let Some(index) = entry {
        file.types[index].is_entry_point = true;
    }
    Ok(file)
}

/// Translates values into definitions against a fixed set of top-level names.
pub(crate) struct Translator {
    scope: HashSet<String>,
}

impl Translator {
    pub(crate) fn new<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            scope: names.into_iter().map(str::to_owned).collect(),
        }
    }

    /// A named definition for one top-level binding.
    pub(crate) fn top_level(&self, field: &FieldDecl) -> Result<Definition> {
        let path = field.label.as_str();
        let hint = field.attribute(HINT_ATTRIBUTE);
        let mut def = match hint.and_then(|h| h.lookup("kind")) {
            Some("enum") => self.enumeration(field, hint)?,
            Some("type") | None => match &field.value.expr {
                Expr::Struct(lit) if !lit.fields.is_empty() => self.structure(path, lit.fields.iter())?,
                _ => self.translate(&field.value, path)?,
            },
            Some(other) => {
                return Err(Error::malformed(path, format!("unknown kind hint {other:?}")).at(&field.pos));
            }
        };
        def.name = field.label.clone();
        def.comments = field.docs.clone();
        Ok(def)
    }

    pub(crate) fn structure<'f>(
        &self,
        path: &str,
        decls: impl Iterator<Item = &'f FieldDecl>,
    ) -> Result<Definition> {
        let mut fields: Vec<Field> = Vec::new();
        for decl in decls {
            if decl.definition {
                return Err(Error::unsupported(
                    format!("{path}.#{}", decl.label),
                    "definitions nested inside a struct are not supported",
                )
                .at(&decl.pos));
            }
            let field_path = format!("{path}.{}", decl.label);
            if fields.iter().any(|f| f.name == decl.label) {
                return Err(Error::unsupported(field_path, "declared more than once").at(&decl.pos));
            }
            trace!(field = %field_path, "translating field");
            fields.push(Field {
                name: decl.label.clone(),
                comments: decl.docs.clone(),
                required: !decl.optional,
                type_: self.translate(&decl.value, &field_path)?,
            });
        }
        Ok(Definition::structure(path, fields))
    }

    fn enumeration(&self, field: &FieldDecl, hint: Option<&Attribute>) -> Result<Definition> {
        let path = field.label.as_str();
        let split = field.value.split_disjunction();

        let mut literals = Vec::with_capacity(split.branches.len());
        for branch in &split.branches {
            match branch.concrete_scalar() {
                Some(scalar @ (Scalar::String(_) | Scalar::Int(_))) => literals.push(scalar),
                Some(other) => {
                    return Err(Error::unsupported(
                        path,
                        format!("enum values must be strings or integers, found {other}"),
                    )
                    .at(&branch.pos));
                }
                None => return Err(Error::unsupported(path, "non-concrete enum branch").at(&branch.pos)),
            }
        }

        let numeric = literals.iter().all(|l| matches!(l, Scalar::Int(_)));
        let textual = literals.iter().all(|l| matches!(l, Scalar::String(_)));
        let type_ = match (textual, numeric) {
            (true, _) => TypeId::String,
            (_, true) => match field.value.incomplete_kind() {
                kind if kind.is_integer() => kind,
                _ => TypeId::Int64,
            },
            _ => {
                return Err(Error::unsupported(path, "enum mixes string and integer values").at(&field.pos));
            }
        };

        let names: Vec<String> = match hint.and_then(|h| h.lookup("memberNames")) {
            Some(names) => {
                let names: Vec<String> = names.split('|').map(|n| n.trim().to_owned()).collect();
                if names.len() != literals.len() {
                    return Err(Error::malformed(
                        path,
                        format!("memberNames lists {} names for {} values", names.len(), literals.len()),
                    )
                    .at(&field.pos));
                }
                names
            }
            None if numeric => {
                return Err(Error::unsupported(path, "names required for numeric enums").at(&field.pos));
            }
            None => literals
                .iter()
                .map(|l| match l {
                    Scalar::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
        };

        let values = literals
            .into_iter()
            .zip(names)
            .map(|(value, name)| EnumValue {
                type_: type_.clone(),
                name,
                value: value.clone(),
            })
            .collect();
        let mut def = Definition::enumeration(path, values);
        def.default = split.default.and_then(Value::concrete_scalar).cloned();
        Ok(def)
    }

    /// Translates any value, splitting disjunctions first.
    fn translate(&self, value: &Value, path: &str) -> Result<Definition> {
        let split = value.split_disjunction();
        let mut def = match split.branches.as_slice() {
            [single] => self.single(single, path)?,
            branches => self.disjunction(branches, path)?,
        };
        if let Some(default) = split.default.and_then(Value::concrete_scalar) {
            def.default = Some(default.clone());
        }
        Ok(def)
    }

    fn disjunction(&self, branches: &[&Value], path: &str) -> Result<Definition> {
        let (nulls, others): (Vec<&Value>, Vec<&Value>) = branches
            .iter()
            .copied()
            .partition(|b| matches!(b.expr, Expr::Lit(Scalar::Null)));

        // "a" | "b" is a string restricted to a set of values
        let literals: Option<Vec<&Scalar>> = others.iter().map(|b| b.concrete_scalar()).collect();
        if let Some(literals) = literals.filter(|l| l.len() >= 2) {
            let kind = literals[0].type_id();
            if literals.iter().all(|l| l.type_id() == kind) {
                let base = Definition::new(kind).with_constraints(vec![TypeConstraint {
                    op: ConstraintOp::OneOf,
                    args: literals.into_iter().cloned().collect(),
                }]);
                return Ok(if nulls.is_empty() {
                    base
                } else {
                    Definition::disjunction(vec![base, Definition::new(TypeId::Null)])
                });
            }
        }

        let mut defs: Vec<Definition> = Vec::with_capacity(branches.len());
        for branch in branches {
            let def = self.single(branch, path)?;
            if !defs.contains(&def) {
                defs.push(def);
            }
        }
        Ok(match defs.len() {
            1 => defs.remove(0),
            _ => Definition::disjunction(defs),
        })
    }

    fn single(&self, value: &Value, path: &str) -> Result<Definition> {
        match &value.expr {
            Expr::Top => Ok(Definition::new(TypeId::Any)),
            Expr::Basic(kind) => Ok(Definition::new(kind.clone())),
            Expr::Lit(Scalar::Null) => Ok(Definition::new(TypeId::Null)),
            Expr::Lit(scalar) => Ok(Definition::new(scalar.type_id())
                .with_constraints(vec![TypeConstraint::new(ConstraintOp::Eq, scalar.clone())])),
            Expr::Bound(op, arg) => Ok(Definition::new(value.incomplete_kind())
                .with_constraints(vec![TypeConstraint::new(*op, arg.clone())])),
            Expr::Ref { name, .. } => {
                if self.scope.contains(name) {
                    Ok(Definition::reference(name))
                } else {
                    Err(Error::malformed(path, format!("reference to undefined {name:?}")).at(&value.pos))
                }
            }
            Expr::Struct(lit) => self.struct_value(lit, value, path),
            Expr::List(list) => self.list(list, value, path),
            Expr::And(_) => self.conjunction(value, path),
            Expr::Or(_) | Expr::Default(_) => self.translate(value, path),
        }
    }

    fn struct_value(&self, lit: &StructLit, value: &Value, path: &str) -> Result<Definition> {
        if let Some(decl) = lit.fields.iter().find(|f| f.definition) {
            return Err(Error::unsupported(
                format!("{path}.#{}", decl.label),
                "definitions nested inside a struct are not supported",
            )
            .at(&decl.pos));
        }
        if !lit.fields.is_empty() {
            return Err(Error::unsupported(
                path,
                "nested anonymous struct; declare it as a top-level definition",
            )
            .at(&value.pos));
        }
        match &lit.pattern {
            Some((key, elem)) => {
                let index = key.incomplete_kind();
                if index != TypeId::String {
                    return Err(Error::unsupported(path, format!("map keys must be strings, found {index}")).at(&key.pos));
                }
                Ok(Definition::map(TypeId::String, self.translate(elem, &format!("{path}[]"))?))
            }
            // `{...}` and `{}` accept anything
            None => Ok(Definition::new(TypeId::Any)),
        }
    }

    fn list(&self, list: &ListLit, value: &Value, path: &str) -> Result<Definition> {
        let elem_path = format!("{path}[]");
        let mut elems = Vec::with_capacity(list.elems.len() + 1);
        for elem in &list.elems {
            let def = without_pins(self.translate(elem, &elem_path)?);
            if !elems.contains(&def) {
                elems.push(def);
            }
        }

        if list.open {
            let Some(rest) = &list.rest else {
                return Err(Error::malformed(path, "open list must declare an element type").at(&value.pos));
            };
            let rest = self.translate(rest, &elem_path)?;
            if !elems.contains(&rest) {
                elems.push(rest);
            }
            return Ok(Definition::array(merge(elems)));
        }

        match elems.len() {
            0 => Ok(Definition::array(Definition::new(TypeId::Any))),
            1 => {
                let length = Scalar::Int(list.elems.len() as i64);
                Ok(Definition::array(elems.remove(0)).with_constraints(vec![
                    TypeConstraint::new(ConstraintOp::MinItems, length.clone()),
                    TypeConstraint::new(ConstraintOp::MaxItems, length),
                ]))
            }
            _ => Ok(Definition::array(Definition::disjunction(elems))),
        }
    }

    fn conjunction(&self, value: &Value, path: &str) -> Result<Definition> {
        let mut base: Option<&Value> = None;
        let mut constraints = Vec::new();
        for conjunct in value.conjuncts() {
            match &conjunct.expr {
                Expr::Bound(op, arg) => constraints.push(TypeConstraint::new(*op, arg.clone())),
                Expr::Top => {}
                _ => {
                    base = Some(match base {
                        None => conjunct,
                        Some(current) => narrower(current, conjunct).ok_or_else(|| {
                            Error::unsupported(path, "conjunction of incompatible values is not supported")
                                .at(&conjunct.pos)
                        })?,
                    });
                }
            }
        }

        let mut def = match base {
            Some(base) => self.translate(base, path)?,
            None => Definition::new(value.incomplete_kind()),
        };
        def.constraints.extend(constraints);
        Ok(def)
    }
}

/// Picks the conjunct that carries the other's information, if either does.
fn narrower<'v>(a: &'v Value, b: &'v Value) -> Option<&'v Value> {
    match (&a.expr, &b.expr) {
        _ if a.expr == b.expr => Some(a),
        (Expr::Basic(kind), Expr::Lit(lit)) if lit.fits(kind) => Some(b),
        (Expr::Lit(lit), Expr::Basic(kind)) if lit.fits(kind) => Some(a),
        (Expr::Basic(x), Expr::Basic(y)) if x.is_integer() && y.is_integer() => Some(b),
        (Expr::Basic(x), Expr::Basic(y)) if x.is_float() && (y.is_float() || y.is_integer()) => Some(b),
        _ => None,
    }
}

/// Drops the equality pins literal list elements carry, so `[0, 0]` reads
/// as two integers.
fn without_pins(mut def: Definition) -> Definition {
    def.constraints.retain(|c| c.op != ConstraintOp::Eq);
    def.default = None;
    def
}

fn merge(mut defs: Vec<Definition>) -> Definition {
    match defs.len() {
        1 => defs.remove(0),
        _ => Definition::disjunction(defs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SchemaErrorKind;

    fn generate(source: &str) -> Result<File> {
        let instance = load(source, Some("test.cue"))?;
        generate_ast(&instance.root, &Config::new("dashboard"))
    }

    #[test]
    fn scalar_only_struct() {
        let file = generate("#Dashboard: {\n  title: string\n  version: int & >=1\n}").unwrap();
        let dashboard = &file.types[0];
        assert!(dashboard.is_entry_point);
        assert_eq!(dashboard.fields[0].type_.type_, TypeId::String);
        let version = &dashboard.fields[1];
        assert!(version.required);
        assert_eq!(version.type_.type_, TypeId::Int64);
        assert_eq!(
            version.type_.constraints,
            vec![TypeConstraint::new(ConstraintOp::Ge, Scalar::Int(1))]
        );
    }

    #[test]
    fn string_enum_names_come_from_literals() {
        let file = generate(r#"#Status: "ok" | "warning" | "critical" @cuetsy(kind="enum")"#).unwrap();
        let status = &file.types[0];
        assert_eq!(status.type_, TypeId::Enum);
        let names: Vec<_> = status.values.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["ok", "warning", "critical"]);
    }

    #[test]
    fn numeric_enum_needs_member_names() {
        let err = generate(r#"#Level: 1 | 2 @cuetsy(kind="enum")"#).unwrap_err();
        assert_eq!(err.kind, SchemaErrorKind::Unsupported);
        assert!(err.message.contains("names required for numeric enums"));

        let file = generate(r#"#Level: 1 | 2 @cuetsy(kind="enum", memberNames="Low|High")"#).unwrap();
        assert_eq!(file.types[0].values[1].name, "High");
        assert_eq!(file.types[0].values[1].value, Scalar::Int(2));
    }

    #[test]
    fn single_concrete_branch_is_a_legal_enum() {
        let file = generate(r#"#Only: "one" @cuetsy(kind="enum")"#).unwrap();
        assert_eq!(file.types[0].values.len(), 1);
    }

    #[test]
    fn non_concrete_enum_branch_is_unsupported() {
        let err = generate("#Mode: \"a\" | string @cuetsy(kind=\"enum\")").unwrap_err();
        assert_eq!(err.kind, SchemaErrorKind::Unsupported);
        assert_eq!(err.path, "Mode");
        assert!(err.pos.is_some());
    }

    #[test]
    fn optional_nullable_field_keeps_both_branches() {
        let file = generate("#Dashboard: {\n  note?: string | null\n}").unwrap();
        let note = &file.types[0].fields[0];
        assert!(!note.required);
        assert_eq!(note.type_.type_, TypeId::Disjunction);
        assert_eq!(note.type_.branches.len(), 2);
    }

    #[test]
    fn closed_list_of_one_kind_is_fixed_length() {
        let file = generate("#P: {\n  coords: [float64, float64]\n}").unwrap();
        let coords = &file.types[0].fields[0].type_;
        assert_eq!(coords.fixed_length(), Some(2));
        assert_eq!(coords.value_type().map(|v| &v.type_), Some(&TypeId::Float64));
    }

    #[test]
    fn open_list_without_type_is_malformed() {
        let err = generate("#P: {\n  xs: [...]\n}").unwrap_err();
        assert_eq!(err.kind, SchemaErrorKind::Malformed);
        assert_eq!(err.path, "P.xs");
        assert_eq!(err.pos.map(|p| p.line), Some(2));
    }

    #[test]
    fn nested_anonymous_struct_is_unsupported() {
        let err = generate("#P: {\n  inner: {a: string}\n}").unwrap_err();
        assert_eq!(err.kind, SchemaErrorKind::Unsupported);
        assert_eq!(err.path, "P.inner");
    }

    #[test]
    fn patterns_become_maps_and_open_structs_any() {
        let file = generate("#P: {\n  labels: {[string]: string}\n  extra: {...}\n}").unwrap();
        let p = &file.types[0];
        assert_eq!(p.fields[0].type_.type_, TypeId::Map);
        assert_eq!(p.fields[0].type_.index_type, Some(TypeId::String));
        assert_eq!(p.fields[1].type_.type_, TypeId::Any);
    }

    #[test]
    fn literal_disjunction_without_hint_is_one_of() {
        let file = generate("#P: {\n  mode: *\"a\" | \"b\"\n}").unwrap();
        let mode = &file.types[0].fields[0].type_;
        assert_eq!(mode.type_, TypeId::String);
        assert_eq!(mode.constraints[0].op, ConstraintOp::OneOf);
        assert_eq!(mode.default, Some(Scalar::String("a".into())));
    }

    #[test]
    fn dangling_reference_is_malformed() {
        let err = generate("#P: {\n  x: #Missing\n}").unwrap_err();
        assert_eq!(err.kind, SchemaErrorKind::Malformed);
        assert!(err.message.contains("Missing"));
    }

    #[test]
    fn explicit_entry_point_wins() {
        let file = generate("#Dashboard: {a: string}\n#Panel: {b: string} @cuetsy(kind=\"type\", entrypoint)").unwrap();
        assert!(!file.types[0].is_entry_point);
        assert!(file.types[1].is_entry_point);
    }

    #[test]
    fn docs_become_comments() {
        let file = generate("// A dashboard.\n#Dashboard: {\n  // Shown in the header.\n  title: string\n}").unwrap();
        assert_eq!(file.types[0].comments, vec!["A dashboard."]);
        assert_eq!(file.types[0].fields[0].comments, vec!["Shown in the header."]);
    }
}
