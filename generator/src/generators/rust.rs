use std::collections::HashSet;

use check_keyword::CheckKeyword;
use heck::{ToPascalCase, ToShoutySnakeCase, ToSnakeCase};
use quote::format_ident;
use syn::{parse_quote, Attribute, Expr, Ident, Item, Type};

use sg_schema::{Definition, Field, File, Scalar, TypeId};

use super::common::{doc_lines, primary_field, unexpected, DefinitionVisitor, GeneratorContext, GENERATED_BY};
use super::Emitter;
use crate::error::EmitError;
use crate::fs::GeneratedFile;

/// Serde-ready Rust structs, enums and aliases.
#[derive(Copy, Clone, Debug, Default)]
pub struct RustRawTypes;

/// A builder over the entry point type, with boxed option closures.
#[derive(Copy, Clone, Debug, Default)]
pub struct RustBuilder;

impl Emitter for RustRawTypes {
    fn name(&self) -> &str {
        "RustRawTypes"
    }

    fn generate(&self, file: &File) -> Result<GeneratedFile, EmitError> {
        let ctx = GeneratorContext::new(file);
        let items = ctx.walk(&mut RustVisitor)?.into_iter().flatten().collect();
        Ok(GeneratedFile::new(
            ctx.file_name("types", "rs"),
            unparse(items),
            self.name(),
        ))
    }
}

impl Emitter for RustBuilder {
    fn name(&self) -> &str {
        "RustBuilder"
    }

    fn generate(&self, file: &File) -> Result<GeneratedFile, EmitError> {
        let ctx = GeneratorContext::new(file);
        let entry = ctx.builder_target()?;
        let target = RustVisitor::type_ident(&entry.name);

        let (params, init): (Vec<syn::FnArg>, Vec<syn::FieldValue>) = match primary_field(entry) {
            Some(field) => {
                let ident = RustVisitor::field_ident(&field.name);
                let value: Expr = if field.required && !field.type_.nullable {
                    parse_quote!(title.into())
                } else {
                    parse_quote!(Some(title.into()))
                };
                (
                    vec![parse_quote!(title: impl Into<String>)],
                    vec![parse_quote!(#ident: #value)],
                )
            }
            None => (vec![], vec![]),
        };

        let items: Vec<Item> = vec![
            parse_quote! {
                /// Returned by an option that rejects its input.
                #[derive(Debug, Clone, PartialEq, Eq)]
                pub struct BuildError(pub String);
            },
            parse_quote! {
                impl std::fmt::Display for BuildError {
                    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                        f.write_str(&self.0)
                    }
                }
            },
            parse_quote! {
                impl std::error::Error for BuildError {}
            },
            parse_quote! {
                pub type BuilderOption = Box<dyn FnOnce(&mut Builder) -> Result<(), BuildError>>;
            },
            parse_quote! {
                #[derive(Debug, Clone, Default, PartialEq)]
                pub struct Builder {
                    internal: #target,
                }
            },
            parse_quote! {
                impl Builder {
                    pub fn new(
                        #(#params,)*
                        options: impl IntoIterator<Item = BuilderOption>,
                    ) -> Result<Self, BuildError> {
                        let mut builder = Self {
                            internal: #target {
                                #(#init,)*
                                ..Default::default()
                            },
                        };
                        for option in options {
                            option(&mut builder)?;
                        }
                        Ok(builder)
                    }

                    pub fn internal(&self) -> &#target {
                        &self.internal
                    }

                    pub fn internal_mut(&mut self) -> &mut #target {
                        &mut self.internal
                    }

                    pub fn build(self) -> #target {
                        self.internal
                    }

                    pub fn to_json(&self) -> serde_json::Result<String> {
                        serde_json::to_string(&self.internal)
                    }

                    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
                        serde_json::to_string_pretty(&self.internal)
                    }
                }
            },
        ];

        Ok(GeneratedFile::new(
            ctx.file_name("builder", "rs"),
            unparse(items),
            self.name(),
        ))
    }
}

fn unparse(items: Vec<Item>) -> String {
    let doc_comment = format!(" Generated by {GENERATED_BY}");
    let root = syn::File {
        shebang: None,
        attrs: vec![
            parse_quote!(#![doc = #doc_comment]),
            parse_quote!(#![allow(dead_code, unused_imports)]),
        ],
        items,
    };
    prettyplease::unparse(&root)
}

fn docs(lines: &[String]) -> Vec<Attribute> {
    lines
        .iter()
        .map(|line| {
            let line = format!(" {line}");
            parse_quote!(#[doc = #line])
        })
        .collect()
}

/// Parses a literal without the type suffix `quote` would attach.
fn literal(owner: &Definition, value: impl ToString) -> Result<Expr, EmitError> {
    let value = value.to_string();
    syn::parse_str(&value).map_err(|e| EmitError::new(&owner.name, format!("invalid literal {value}: {e}")))
}

/// serde and `Default` only cover arrays up to this length.
const MAX_ARRAY_LEN: usize = 32;

struct RustVisitor;

impl RustVisitor {
    fn name_to_ident(name: &str) -> Ident {
        if ["crate", "self", "super", "Self"].contains(&name) {
            // These are keywords that are not allowed as raw identifiers
            format_ident!("{}_", name)
        } else if name.is_keyword() {
            format_ident!("r#{}", name)
        } else {
            format_ident!("{}", name)
        }
    }

    fn type_ident(name: &str) -> Ident {
        let sanitized = name.replace(|c: char| !c.is_ascii_alphanumeric(), "_");
        let pascal = sanitized.to_pascal_case();
        match pascal.chars().next() {
            None => format_ident!("Empty"),
            Some(c) if !c.is_ascii_alphabetic() => format_ident!("_{}", pascal),
            Some(_) => Self::name_to_ident(&pascal),
        }
    }

    fn field_ident(name: &str) -> Ident {
        let sanitized = name.replace(|c: char| !c.is_ascii_alphanumeric(), "_");
        let snake = sanitized.to_snake_case();
        match snake.chars().next() {
            None => format_ident!("empty"),
            Some(c) if !c.is_ascii_alphabetic() => format_ident!("_{}", snake),
            Some(_) => Self::name_to_ident(&snake),
        }
    }

    fn scalar(type_: &TypeId) -> Option<Type> {
        Some(match type_ {
            TypeId::String | TypeId::Bytes => parse_quote!(String),
            TypeId::Bool => parse_quote!(bool),
            TypeId::Int8 => parse_quote!(i8),
            TypeId::Int16 => parse_quote!(i16),
            TypeId::Int32 => parse_quote!(i32),
            TypeId::Int64 => parse_quote!(i64),
            TypeId::Uint8 => parse_quote!(u8),
            TypeId::Uint16 => parse_quote!(u16),
            TypeId::Uint32 => parse_quote!(u32),
            TypeId::Uint64 => parse_quote!(u64),
            TypeId::Float32 => parse_quote!(f32),
            TypeId::Float64 => parse_quote!(f64),
            TypeId::Any => parse_quote!(serde_json::Value),
            TypeId::Null => parse_quote!(()),
            _ => return None,
        })
    }

    /// The type of a value nested in an array or map; `null` becomes `None`.
    fn element_type(owner: &Definition, def: &Definition) -> Result<Type, EmitError> {
        let ty = Self::base_type(owner, def)?;
        if def.nullable && def.type_ != TypeId::Null {
            Ok(parse_quote!(Option<#ty>))
        } else {
            Ok(ty)
        }
    }

    fn base_type(owner: &Definition, def: &Definition) -> Result<Type, EmitError> {
        match &def.type_ {
            TypeId::Ref(name) => {
                let ident = Self::type_ident(name);
                Ok(parse_quote!(#ident))
            }
            TypeId::Array => {
                let value_type = def.value_type().ok_or_else(|| unexpected(owner, def))?;
                let element: Type = if value_type.is_leaf_union() {
                    parse_quote!(serde_json::Value)
                } else {
                    Self::element_type(owner, value_type)?
                };
                match def.fixed_length() {
                    Some(n) if n <= MAX_ARRAY_LEN => {
                        let n = literal(owner, n)?;
                        Ok(parse_quote!([#element; #n]))
                    }
                    _ => Ok(parse_quote!(Vec<#element>)),
                }
            }
            TypeId::Map => {
                let value_type = def.value_type().ok_or_else(|| unexpected(owner, def))?;
                let key = def
                    .index_type
                    .as_ref()
                    .and_then(Self::scalar)
                    .unwrap_or_else(|| parse_quote!(String));
                let value = Self::element_type(owner, value_type)?;
                Ok(parse_quote!(std::collections::BTreeMap<#key, #value>))
            }
            other => Self::scalar(other).ok_or_else(|| unexpected(owner, def)),
        }
    }

    fn field(context: &GeneratorContext, owner: &Definition, field: &Field) -> Result<syn::Field, EmitError> {
        let ident = Self::field_ident(&field.name);
        let mut attrs = docs(&doc_lines(&field.name, &field.comments, &field.type_));

        if ident.to_string().trim_start_matches("r#") != field.name {
            let name = &field.name;
            attrs.push(parse_quote!(#[serde(rename = #name)]));
        }

        // A struct holding itself needs the indirection, and can only ever
        // be finite when the field may be absent.
        let recursive = context.is_recursive(owner, field);
        let mut ty = Self::base_type(owner, &field.type_)?;
        if recursive {
            ty = parse_quote!(Box<#ty>);
        }

        let optional = !field.required || recursive;
        if optional || (field.type_.nullable && field.type_.type_ != TypeId::Null) {
            ty = parse_quote!(Option<#ty>);
        }
        if optional {
            attrs.push(parse_quote!(#[serde(default, skip_serializing_if = "Option::is_none")]));
        }

        Ok(parse_quote! {
            #(#attrs)*
            pub #ident: #ty
        })
    }
}

impl DefinitionVisitor for RustVisitor {
    type Value = Vec<Item>;

    fn visit_struct(&mut self, context: &GeneratorContext, def: &Definition) -> Result<Vec<Item>, EmitError> {
        let name = Self::type_ident(&def.name);
        let attrs = docs(&def.comments);

        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(def.fields.len());
        for field in &def.fields {
            let rendered = Self::field(context, def, field)?;
            if let Some(ident) = &rendered.ident {
                if !seen.insert(ident.to_string()) {
                    return Err(EmitError::new(
                        &def.name,
                        format!("field {:?} clashes with another field as {ident}", field.name),
                    ));
                }
            }
            fields.push(rendered);
        }

        Ok(vec![parse_quote! {
            #(#attrs)*
            #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
            pub struct #name {
                #(#fields),*
            }
        }])
    }

    fn visit_enum(&mut self, _context: &GeneratorContext, def: &Definition) -> Result<Vec<Item>, EmitError> {
        let name = Self::type_ident(&def.name);
        let attrs = docs(&doc_lines(&def.name, &def.comments, def));
        let first = def
            .values
            .first()
            .ok_or_else(|| EmitError::new(&def.name, "enum without values"))?;

        let mut seen = HashSet::new();
        if first.type_ == TypeId::String {
            let mut variants: Vec<syn::Variant> = Vec::with_capacity(def.values.len());
            for (i, value) in def.values.iter().enumerate() {
                let Scalar::String(literal) = &value.value else {
                    return Err(EmitError::new(&def.name, format!("mixed enum value {}", value.value)));
                };
                let ident = Self::type_ident(&value.name);
                if !seen.insert(ident.to_string()) {
                    return Err(EmitError::new(&def.name, format!("duplicate enum member {ident}")));
                }
                let default: Option<Attribute> = (i == 0).then(|| parse_quote!(#[default]));
                variants.push(parse_quote! {
                    #default
                    #[serde(rename = #literal)]
                    #ident
                });
            }
            return Ok(vec![parse_quote! {
                #(#attrs)*
                #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
                pub enum #name {
                    #(#variants),*
                }
            }]);
        }

        let repr = Self::scalar(&first.type_).ok_or_else(|| unexpected(def, def))?;
        let mut consts: Vec<syn::ImplItem> = Vec::with_capacity(def.values.len());
        for value in &def.values {
            let shouty = value.name.replace(|c: char| !c.is_ascii_alphanumeric(), "_").to_shouty_snake_case();
            let ident = match shouty.chars().next() {
                Some(c) if c.is_ascii_alphabetic() => format_ident!("{}", shouty),
                _ => format_ident!("_{}", shouty),
            };
            if !seen.insert(ident.to_string()) {
                return Err(EmitError::new(&def.name, format!("duplicate enum member {ident}")));
            }
            let literal = literal(def, &value.value)?;
            consts.push(parse_quote!(pub const #ident: Self = Self(#literal);));
        }
        Ok(vec![
            parse_quote! {
                #(#attrs)*
                #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
                #[serde(transparent)]
                pub struct #name(pub #repr);
            },
            parse_quote! {
                impl #name {
                    #(#consts)*
                }
            },
        ])
    }

    fn visit_alias(&mut self, _context: &GeneratorContext, def: &Definition) -> Result<Vec<Item>, EmitError> {
        let name = Self::type_ident(&def.name);
        let attrs = docs(&doc_lines(&def.name, &def.comments, def));
        let ty = Self::element_type(def, def)?;
        Ok(vec![parse_quote! {
            #(#attrs)*
            pub type #name = #ty;
        }])
    }
}

#[cfg(test)]
mod tests {
    use sg_schema::{ConstraintOp, EnumValue, TypeConstraint};

    use super::*;

    fn dashboard() -> File {
        let mut dashboard = Definition::structure(
            "Dashboard",
            vec![
                Field::new("title", Definition::new(TypeId::String), true),
                Field::new(
                    "version",
                    Definition::new(TypeId::Int64)
                        .with_constraints(vec![TypeConstraint::new(ConstraintOp::Ge, Scalar::Int(1))]),
                    true,
                ),
                Field::new(
                    "note",
                    Definition {
                        nullable: true,
                        ..Definition::new(TypeId::String)
                    },
                    false,
                ),
                Field::new("type", Definition::reference("Status"), true),
                Field::new("refreshRate", Definition::new(TypeId::Uint32), true),
                Field::new(
                    "coords",
                    Definition::array(Definition::new(TypeId::Float64)).with_constraints(vec![
                        TypeConstraint::new(ConstraintOp::MinItems, Scalar::Int(2)),
                        TypeConstraint::new(ConstraintOp::MaxItems, Scalar::Int(2)),
                    ]),
                    true,
                ),
                Field::new(
                    "labels",
                    Definition::map(TypeId::String, Definition::new(TypeId::Any)),
                    true,
                ),
                Field::new("parent", Definition::reference("Dashboard"), false),
            ],
        );
        dashboard.is_entry_point = true;
        let status = Definition::enumeration(
            "Status",
            ["ok", "warning"]
                .into_iter()
                .map(|v| EnumValue {
                    type_: TypeId::String,
                    name: v.into(),
                    value: Scalar::String(v.into()),
                })
                .collect(),
        );
        File {
            package: "dashboard".into(),
            types: vec![status, dashboard],
        }
    }

    #[test]
    fn identifiers_are_sanitized() {
        assert_eq!(RustVisitor::field_ident("type").to_string(), "r#type");
        assert_eq!(RustVisitor::field_ident("self").to_string(), "self_");
        assert_eq!(RustVisitor::field_ident("refreshRate").to_string(), "refresh_rate");
        assert_eq!(RustVisitor::field_ident("1st").to_string(), "_1st");
        assert_eq!(RustVisitor::type_ident("time-range").to_string(), "TimeRange");
        assert_eq!(RustVisitor::type_ident("1.0.0").to_string(), "_100");
        assert_eq!(RustVisitor::type_ident("").to_string(), "Empty");
    }

    #[test]
    fn raw_types_parse_back() {
        let out = RustRawTypes.generate(&dashboard()).unwrap();
        assert_eq!(out.path.to_str(), Some("dashboard_types_gen.rs"));
        let text = out.text();
        syn::parse_file(&text).unwrap();

        assert!(text.starts_with("//! Generated by sg-generator"));
        assert!(text.contains("pub struct Dashboard {"));
        assert!(text.contains("pub title: String,"));
        assert!(text.contains("/// version must be >= 1\n    pub version: i64,"));
        assert!(text.contains("#[serde(default, skip_serializing_if = \"Option::is_none\")]\n    pub note: Option<String>,"));
        assert!(text.contains("pub r#type: Status,"));
        assert!(text.contains("#[serde(rename = \"refreshRate\")]\n    pub refresh_rate: u32,"));
        assert!(text.contains("pub coords: [f64; 2],"));
        assert!(text.contains("pub labels: std::collections::BTreeMap<String, serde_json::Value>,"));
        assert!(text.contains("pub parent: Option<Box<Dashboard>>,"));
        assert!(text.contains("#[default]\n    #[serde(rename = \"ok\")]\n    Ok,"));
        assert!(text.find("pub struct Dashboard").unwrap() < text.find("pub enum Status").unwrap());
    }

    #[test]
    fn indirect_recursion_is_boxed() {
        let file = File {
            package: "p".into(),
            types: vec![
                Definition::structure("Panel", vec![Field::new("row", Definition::reference("Row"), true)]),
                Definition::structure("Row", vec![Field::new("panel", Definition::reference("Panel"), true)]),
            ],
        };
        let text = RustRawTypes.generate(&file).unwrap().text().into_owned();
        syn::parse_file(&text).unwrap();
        assert!(text.contains("pub row: Option<Box<Row>>,"));
        assert!(text.contains("pub panel: Option<Box<Panel>>,"));
    }

    #[test]
    fn long_fixed_arrays_become_vectors() {
        let fixed = |n: i64| {
            Definition::array(Definition::new(TypeId::Uint8)).with_constraints(vec![
                TypeConstraint::new(ConstraintOp::MinItems, Scalar::Int(n)),
                TypeConstraint::new(ConstraintOp::MaxItems, Scalar::Int(n)),
            ])
        };
        let file = File {
            package: "p".into(),
            types: vec![Definition::structure(
                "Key",
                vec![
                    Field::new("short", fixed(32), true),
                    Field::new("long", fixed(64), true),
                ],
            )],
        };
        let text = RustRawTypes.generate(&file).unwrap().text().into_owned();
        syn::parse_file(&text).unwrap();
        assert!(text.contains("pub short: [u8; 32],"));
        assert!(text.contains("pub long: Vec<u8>,"));
        assert!(text.contains("/// long must have at least 64 items"));
    }

    #[test]
    fn integer_enums_are_transparent_newtypes() {
        let file = File {
            package: "p".into(),
            types: vec![Definition::enumeration(
                "Level",
                vec![
                    EnumValue {
                        type_: TypeId::Int32,
                        name: "low".into(),
                        value: Scalar::Int(1),
                    },
                    EnumValue {
                        type_: TypeId::Int32,
                        name: "very high".into(),
                        value: Scalar::Int(-3),
                    },
                ],
            )],
        };
        let text = RustRawTypes.generate(&file).unwrap().text().into_owned();
        syn::parse_file(&text).unwrap();
        assert!(text.contains("#[serde(transparent)]\npub struct Level(pub i32);"));
        assert!(text.contains("pub const LOW: Self = Self(1);"));
        assert!(text.contains("pub const VERY_HIGH: Self = Self(-3);"));
    }

    #[test]
    fn clashing_field_identifiers_are_rejected() {
        let file = File {
            package: "p".into(),
            types: vec![Definition::structure(
                "A",
                vec![
                    Field::new("fooBar", Definition::new(TypeId::Bool), true),
                    Field::new("foo_bar", Definition::new(TypeId::Bool), true),
                ],
            )],
        };
        let err = RustRawTypes.generate(&file).unwrap_err();
        assert!(err.message.contains("foo_bar"));
    }

    #[test]
    fn builder() {
        let out = RustBuilder.generate(&dashboard()).unwrap();
        assert_eq!(out.path.to_str(), Some("dashboard_builder_gen.rs"));
        let text = out.text();
        syn::parse_file(&text).unwrap();
        assert!(text.contains("pub type BuilderOption = Box<dyn FnOnce(&mut Builder) -> Result<(), BuildError>>;"));
        assert!(text.contains("internal: Dashboard,"));
        assert!(text.contains("title: title.into(),"));
        assert!(text.contains("..Default::default()"));
        assert!(text.contains("pub fn build(self) -> Dashboard {"));
    }
}
