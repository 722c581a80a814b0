//! Front end for JSON Schema documents.
//!
//! `definitions` (or `$defs`) become top-level types; the root `$ref` names
//! the entry point. A root with `properties` is itself a top-level type.

pub mod schema;

use std::collections::HashSet;

use heck::ToPascalCase;
use serde_json::Value as Json;
use tracing::{debug, trace};

pub use schema::{BoolOrSchema, Items, Schema, TypeSet};

use crate::ast::{ConstraintOp, Definition, EnumValue, Field, File, Scalar, TypeConstraint, TypeId};
use crate::error::{Error, Pos, Result};
use crate::Config;

const REF_PREFIXES: [&str; 2] = ["#/definitions/", "#/$defs/"];

/// Parses a JSON Schema document and translates it into a [`File`].
pub fn generate_ast(input: &[u8], config: &Config) -> Result<File> {
    let root: Schema = serde_json::from_slice(input).map_err(|e| {
        Error::malformed("", format!("invalid JSON Schema: {e}")).at(&Pos::new(None, e.line(), e.column()))
    })?;
    generate_ast_from_schema(&root, config)
}

/// Translates an already decoded document.
pub fn generate_ast_from_schema(root: &Schema, config: &Config) -> Result<File> {
    let root_name = root.is_object().then(|| {
        root.title
            .as_deref()
            .map_or_else(|| config.package.to_pascal_case(), |t| t.to_pascal_case())
    });

    let mut scope: HashSet<String> = root.all_definitions().map(|(name, _)| name.clone()).collect();
    if let Some(name) = &root_name {
        scope.insert(name.clone());
    }
    let translator = Translator { scope, root_name: root_name.clone() };

    let mut file = File::new(&config.package);
    for (name, schema) in root.all_definitions() {
        if file.get(name).is_some() {
            return Err(Error::unsupported(name, "declared more than once"));
        }
        let def = translator.top_level(name, schema)?;
        debug!(name = %def.name, kind = %def.type_, "declared top-level type");
        file.types.push(def);
    }

    let entry = match (&root.reference, &root_name) {
        (Some(reference), _) => Some(translator.resolve(reference, "$ref")?),
        (None, Some(name)) => {
            if file.get(name).is_some() {
                return Err(Error::unsupported(name, "root schema clashes with a definition"));
            }
            let def = translator.top_level(name, root)?;
            debug!(name = %def.name, "declared root type");
            file.types.push(def);
            Some(name.clone())
        }
        (None, None) => None,
    };
    if let Some(entry) = entry {
        if let Some(def) = file.types.iter_mut().find(|d| d.name == entry) {
            def.is_entry_point = true;
        }
    }
    Ok(file)
}

struct Translator {
    scope: HashSet<String>,
    root_name: Option<String>,
}

impl Translator {
    fn resolve(&self, reference: &str, path: &str) -> Result<String> {
        if reference == "#" {
            return self
                .root_name
                .clone()
                .ok_or_else(|| Error::unsupported(path, "reference to a root without properties"));
        }
        let name = REF_PREFIXES
            .iter()
            .find_map(|prefix| reference.strip_prefix(prefix))
            .ok_or_else(|| Error::unsupported(path, format!("only local references are supported, found {reference:?}")))?;
        if self.scope.contains(name) {
            Ok(name.to_owned())
        } else {
            Err(Error::malformed(path, format!("reference to undefined {name:?}")))
        }
    }

    fn top_level(&self, name: &str, schema: &Schema) -> Result<Definition> {
        let mut def = if !schema.properties.is_empty() {
            self.structure(name, schema)?
        } else if let Some(values) = &schema.enum_ {
            self.enumeration(name, schema, values)?
        } else if let Some(value) = &schema.const_ {
            self.enumeration(name, schema, std::slice::from_ref(value))?
        } else {
            self.translate(schema, name)?
        };
        def.name = name.to_owned();
        def.comments = schema.comments();
        Ok(def)
    }

    fn structure(&self, path: &str, schema: &Schema) -> Result<Definition> {
        if let Some(missing) = schema.required.iter().find(|r| !schema.properties.contains_key(*r)) {
            return Err(Error::malformed(path, format!("required property {missing:?} is not declared")));
        }
        let mut fields = Vec::with_capacity(schema.properties.len());
        for (name, property) in &schema.properties {
            let field_path = format!("{path}.{name}");
            trace!(field = %field_path, "translating property");
            fields.push(Field {
                name: name.clone(),
                comments: property.comments(),
                required: schema.required.contains(name),
                type_: self.translate(property, &field_path)?,
            });
        }
        Ok(Definition::structure(path, fields))
    }

    fn enumeration(&self, path: &str, schema: &Schema, values: &[Json]) -> Result<Definition> {
        let literals = values
            .iter()
            .map(|v| match scalar(v) {
                Some(s @ (Scalar::String(_) | Scalar::Int(_))) => Ok(s),
                _ => Err(Error::unsupported(path, format!("enum values must be strings or integers, found {v}"))),
            })
            .collect::<Result<Vec<_>>>()?;
        if literals.is_empty() {
            return Err(Error::malformed(path, "enum without values"));
        }
        if let Some(i) = (1..literals.len()).find(|&i| literals[..i].contains(&literals[i])) {
            return Err(Error::unsupported(
                path,
                format!("enum/{i}: {} repeats an earlier value", literals[i]),
            ));
        }

        let numeric = literals.iter().all(|l| matches!(l, Scalar::Int(_)));
        let type_ = if literals.iter().all(|l| matches!(l, Scalar::String(_))) {
            TypeId::String
        } else if numeric {
            integer_width(schema.format.as_deref())
        } else {
            return Err(Error::unsupported(path, "enum mixes string and integer values"));
        };

        let names = match &schema.enum_varnames {
            Some(names) if names.len() == literals.len() => names.clone(),
            Some(names) => {
                return Err(Error::malformed(
                    path,
                    format!("x-enum-varnames lists {} names for {} values", names.len(), literals.len()),
                ));
            }
            None if numeric => return Err(Error::unsupported(path, "names required for numeric enums")),
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
                value,
            })
            .collect();
        let mut def = Definition::enumeration(path, values);
        def.default = schema.default.as_ref().and_then(scalar);
        Ok(def)
    }

    fn translate(&self, schema: &Schema, path: &str) -> Result<Definition> {
        let mut def = self.translate_inner(schema, path)?;
        if let Some(default) = schema.default.as_ref().and_then(scalar) {
            def.default = Some(default);
        }
        Ok(def)
    }

    fn translate_inner(&self, schema: &Schema, path: &str) -> Result<Definition> {
        if let Some(reference) = &schema.reference {
            return Ok(Definition::reference(self.resolve(reference, path)?));
        }

        match schema.all_of.as_slice() {
            [] => {}
            [single] => {
                let mut def = self.translate(single, path)?;
                def.constraints.extend(constraints(schema));
                return Ok(def);
            }
            _ => return Err(Error::unsupported(path, "allOf with several members is not supported")),
        }

        let alternatives = if schema.any_of.is_empty() { &schema.one_of } else { &schema.any_of };
        if !alternatives.is_empty() {
            let mut branches = Vec::with_capacity(alternatives.len());
            for alternative in alternatives {
                branches.push(self.translate(alternative, path)?);
            }
            return Ok(union(branches));
        }

        if let Some(values) = &schema.enum_ {
            return self.restricted(values, path);
        }
        if let Some(value) = &schema.const_ {
            let literal = scalar(value).ok_or_else(|| Error::unsupported(path, "const must be a scalar"))?;
            return Ok(literal_definition(literal));
        }

        match &schema.type_ {
            Some(types) => {
                let mut branches = Vec::new();
                for name in types.names() {
                    branches.push(self.typed(name, schema, path)?);
                }
                Ok(union(branches))
            }
            None if schema.is_object() || schema.additional_properties.is_some() => self.typed("object", schema, path),
            None if schema.items.is_some() => self.typed("array", schema, path),
            None => Ok(Definition::new(TypeId::Any)),
        }
    }

    /// A nested `enum`: the scalar kind restricted to the listed literals.
    fn restricted(&self, values: &[Json], path: &str) -> Result<Definition> {
        let literals = values
            .iter()
            .map(|v| scalar(v).ok_or_else(|| Error::unsupported(path, format!("enum value {v} is not a scalar"))))
            .collect::<Result<Vec<_>>>()?;
        let (nulls, literals): (Vec<Scalar>, Vec<Scalar>) =
            literals.into_iter().partition(|l| *l == Scalar::Null);

        let base = match literals.as_slice() {
            [] => Definition::new(TypeId::Null),
            [only] => literal_definition(only.clone()),
            [first, rest @ ..] => {
                let kind = first.type_id();
                if rest.iter().any(|l| l.type_id() != kind) {
                    return Err(Error::unsupported(path, "enum mixes values of different kinds"));
                }
                Definition::new(kind).with_constraints(vec![TypeConstraint {
                    op: ConstraintOp::OneOf,
                    args: literals,
                }])
            }
        };
        Ok(if nulls.is_empty() || base.type_ == TypeId::Null {
            base
        } else {
            Definition::disjunction(vec![base, Definition::new(TypeId::Null)])
        })
    }

    fn typed(&self, name: &str, schema: &Schema, path: &str) -> Result<Definition> {
        let def = match name {
            "string" => Definition::new(TypeId::String),
            "integer" => Definition::new(integer_width(schema.format.as_deref())),
            "number" => Definition::new(match schema.format.as_deref() {
                Some("float") => TypeId::Float32,
                _ => TypeId::Float64,
            }),
            "boolean" => Definition::new(TypeId::Bool),
            "null" => return Ok(Definition::new(TypeId::Null)),
            "array" => return self.array(schema, path),
            "object" => return self.object(schema, path),
            other => return Err(Error::malformed(path, format!("unknown type {other:?}"))),
        };
        Ok(def.with_constraints(constraints(schema)))
    }

    fn array(&self, schema: &Schema, path: &str) -> Result<Definition> {
        let elem_path = format!("{path}[]");
        let mut def = match &schema.items {
            None => Definition::array(Definition::new(TypeId::Any)),
            Some(Items::Single(items)) => Definition::array(self.translate(items, &elem_path)?),
            Some(Items::Tuple(items)) => {
                let mut elems: Vec<Definition> = Vec::with_capacity(items.len());
                for item in items {
                    let def = self.translate(item, &elem_path)?;
                    if !elems.contains(&def) {
                        elems.push(def);
                    }
                }
                match elems.len() {
                    0 => Definition::array(Definition::new(TypeId::Any)),
                    1 => {
                        let length = Scalar::Int(items.len() as i64);
                        Definition::array(elems.remove(0)).with_constraints(vec![
                            TypeConstraint::new(ConstraintOp::MinItems, length.clone()),
                            TypeConstraint::new(ConstraintOp::MaxItems, length),
                        ])
                    }
                    _ => Definition::array(Definition::disjunction(elems)),
                }
            }
        };
        for constraint in constraints(schema) {
            if !def.constraints.contains(&constraint) {
                def.constraints.push(constraint);
            }
        }
        Ok(def)
    }

    fn object(&self, schema: &Schema, path: &str) -> Result<Definition> {
        if !schema.properties.is_empty() {
            return Err(Error::unsupported(
                path,
                "nested object definitions are not supported; move it to definitions",
            ));
        }
        match &schema.additional_properties {
            Some(BoolOrSchema::Schema(values)) => Ok(Definition::map(
                TypeId::String,
                self.translate(values, &format!("{path}[]"))?,
            )),
            _ => Ok(Definition::new(TypeId::Any)),
        }
    }
}

fn integer_width(format: Option<&str>) -> TypeId {
    match format {
        Some("int8") => TypeId::Int8,
        Some("int16") => TypeId::Int16,
        Some("int32") => TypeId::Int32,
        Some("uint8") => TypeId::Uint8,
        Some("uint16") => TypeId::Uint16,
        Some("uint32") => TypeId::Uint32,
        Some("uint64") => TypeId::Uint64,
        _ => TypeId::Int64,
    }
}

fn number(n: &serde_json::Number) -> Scalar {
    match n.as_i64() {
        Some(i) => Scalar::Int(i),
        None => Scalar::Float(n.as_f64().unwrap_or_default()),
    }
}

fn scalar(value: &Json) -> Option<Scalar> {
    match value {
        Json::Null => Some(Scalar::Null),
        Json::Bool(b) => Some(Scalar::Bool(*b)),
        Json::Number(n) => Some(number(n)),
        Json::String(s) => Some(Scalar::String(s.clone())),
        Json::Array(_) | Json::Object(_) => None,
    }
}

fn literal_definition(literal: Scalar) -> Definition {
    match literal {
        Scalar::Null => Definition::new(TypeId::Null),
        literal => Definition::new(literal.type_id())
            .with_constraints(vec![TypeConstraint::new(ConstraintOp::Eq, literal)]),
    }
}

/// Bounds and patterns carried by `schema`, in a fixed keyword order.
fn constraints(schema: &Schema) -> Vec<TypeConstraint> {
    let mut out = Vec::new();
    if let Some(n) = &schema.minimum {
        out.push(TypeConstraint::new(ConstraintOp::Ge, number(n)));
    }
    if let Some(Json::Number(n)) = &schema.exclusive_minimum {
        out.push(TypeConstraint::new(ConstraintOp::Gt, number(n)));
    }
    if let Some(n) = &schema.maximum {
        out.push(TypeConstraint::new(ConstraintOp::Le, number(n)));
    }
    if let Some(Json::Number(n)) = &schema.exclusive_maximum {
        out.push(TypeConstraint::new(ConstraintOp::Lt, number(n)));
    }
    if let Some(n) = &schema.multiple_of {
        out.push(TypeConstraint::new(ConstraintOp::MultipleOf, number(n)));
    }
    let counts = [
        (ConstraintOp::MinLength, schema.min_length),
        (ConstraintOp::MaxLength, schema.max_length),
        (ConstraintOp::MinItems, schema.min_items),
        (ConstraintOp::MaxItems, schema.max_items),
    ];
    for (op, count) in counts {
        if let Some(count) = count {
            out.push(TypeConstraint::new(op, Scalar::Int(count.min(i64::MAX as u64) as i64)));
        }
    }
    if let Some(pattern) = &schema.pattern {
        out.push(TypeConstraint::new(ConstraintOp::Regex, Scalar::String(pattern.clone())));
    }
    out
}

/// Deduplicated branches; a single survivor stands for itself.
fn union(branches: Vec<Definition>) -> Definition {
    let mut distinct: Vec<Definition> = Vec::with_capacity(branches.len());
    for branch in branches {
        if !distinct.contains(&branch) {
            distinct.push(branch);
        }
    }
    match distinct.len() {
        1 => distinct.remove(0),
        _ => Definition::disjunction(distinct),
    }
}
