use sg_schema::{Definition, File, Scalar, TypeId};

use super::common::{doc_lines, primary_field, unexpected, Code, DefinitionVisitor, GeneratorContext, GENERATED_BY};
use super::Emitter;
use crate::error::EmitError;
use crate::fs::GeneratedFile;
use crate::naming::exported;

/// Go structs, enums and aliases with `encoding/json` tags.
#[derive(Copy, Clone, Debug, Default)]
pub struct GoRawTypes;

/// The functional-options builder scaffold for the entry point type.
#[derive(Copy, Clone, Debug, Default)]
pub struct GoBuilder;

impl Emitter for GoRawTypes {
    fn name(&self) -> &str {
        "GoRawTypes"
    }

    fn generate(&self, file: &File) -> Result<GeneratedFile, EmitError> {
        let ctx = GeneratorContext::new(file);
        let blocks = ctx.walk(&mut GoVisitor)?;

        let mut code = header(file);
        for block in blocks {
            code.blank();
            for line in block.lines() {
                code.line(line);
            }
        }
        Ok(GeneratedFile::new(
            ctx.file_name("types", "go"),
            code.finish(),
            self.name(),
        ))
    }
}

impl Emitter for GoBuilder {
    fn name(&self) -> &str {
        "GoBuilder"
    }

    fn generate(&self, file: &File) -> Result<GeneratedFile, EmitError> {
        let ctx = GeneratorContext::new(file);
        let entry = ctx.builder_target()?;
        let type_name = exported(&entry.name);

        // The primary field is always a string; optional ones are pointers.
        let primary = primary_field(entry).map(|field| {
            let optional = !field.required || field.type_.nullable;
            let value = if optional { "&title" } else { "title" };
            (exported(&field.name), "string", value)
        });

        let mut code = header(file);
        code.blank();
        code.line("type Option func(builder *Builder) error");
        code.blank();
        code.line("type Builder struct {");
        code.indent();
        code.line(format!("internal *{type_name}"));
        code.dedent();
        code.line("}");
        code.blank();

        match &primary {
            Some((_, param, _)) => code.line(format!(
                "func New(title {param}, options ...Option) (Builder, error) {{"
            )),
            None => code.line("func New(options ...Option) (Builder, error) {"),
        }
        code.indent();
        match &primary {
            Some((field, _, value)) => {
                code.line(format!("resource := &{type_name}{{"));
                code.indent();
                code.line(format!("{field}: {value},"));
                code.dedent();
                code.line("}");
            }
            None => code.line(format!("resource := &{type_name}{{}}")),
        }
        code.blank();
        code.line("builder := &Builder{internal: resource}");
        code.blank();
        code.line("for _, opt := range options {");
        code.indent();
        code.line("if err := opt(builder); err != nil {");
        code.indent();
        code.line("return *builder, err");
        code.dedent();
        code.line("}");
        code.dedent();
        code.line("}");
        code.blank();
        code.line("return *builder, nil");
        code.dedent();
        code.line("}");

        code.blank();
        code.line(format!("func (builder *Builder) Internal() *{type_name} {{"));
        code.indent();
        code.line("return builder.internal");
        code.dedent();
        code.line("}");
        code.blank();
        code.line("func (builder *Builder) MarshalJSON() ([]byte, error) {");
        code.indent();
        code.line("return json.Marshal(builder.internal)");
        code.dedent();
        code.line("}");
        code.blank();
        code.line("func (builder *Builder) MarshalIndentJSON() ([]byte, error) {");
        code.indent();
        code.line("return json.MarshalIndent(builder.internal, \"\", \"  \")");
        code.dedent();
        code.line("}");

        Ok(GeneratedFile::new(
            ctx.file_name("builder", "go"),
            code.finish(),
            self.name(),
        ))
    }
}

fn header(file: &File) -> Code {
    let mut code = Code::new("\t");
    code.line(format!("// Code generated by {GENERATED_BY}. DO NOT EDIT."));
    code.blank();
    code.line(format!("package {}", file.package));
    code
}

fn comment(code: &mut Code, lines: &[String]) {
    for line in lines {
        code.line(format!("// {line}"));
    }
}

struct GoVisitor;

impl GoVisitor {
    fn scalar(type_: &TypeId) -> Option<&'static str> {
        Some(match type_ {
            TypeId::String | TypeId::Bytes => "string",
            TypeId::Bool => "bool",
            TypeId::Int8 => "int8",
            TypeId::Int16 => "int16",
            TypeId::Int32 => "int32",
            TypeId::Int64 => "int64",
            TypeId::Uint8 => "uint8",
            TypeId::Uint16 => "uint16",
            TypeId::Uint32 => "uint32",
            TypeId::Uint64 => "uint64",
            TypeId::Float32 => "float32",
            TypeId::Float64 => "float64",
            TypeId::Any => "any",
            TypeId::Null => "struct{}",
            _ => return None,
        })
    }

    /// Types that already have a `nil` of their own.
    fn is_nilable(def: &Definition) -> bool {
        match def.type_ {
            TypeId::Map | TypeId::Any | TypeId::Null => true,
            TypeId::Array => def.fixed_length().is_none(),
            _ => false,
        }
    }

    fn type_expr(owner: &Definition, def: &Definition, optional: bool) -> Result<String, EmitError> {
        let base = match &def.type_ {
            TypeId::Ref(name) => exported(name),
            TypeId::Array => {
                let value_type = def.value_type().ok_or_else(|| unexpected(owner, def))?;
                let element = if value_type.type_ == TypeId::Disjunction && value_type.is_leaf_union() {
                    "any".to_owned()
                } else {
                    Self::type_expr(owner, value_type, false)?
                };
                match def.fixed_length() {
                    Some(n) => format!("[{n}]{element}"),
                    None => format!("[]{element}"),
                }
            }
            TypeId::Map => {
                let value_type = def.value_type().ok_or_else(|| unexpected(owner, def))?;
                let key = def
                    .index_type
                    .as_ref()
                    .and_then(Self::scalar)
                    .unwrap_or("string");
                format!("map[{key}]{}", Self::type_expr(owner, value_type, false)?)
            }
            other => Self::scalar(other)
                .ok_or_else(|| unexpected(owner, def))?
                .to_owned(),
        };
        if (optional || def.nullable) && !Self::is_nilable(def) {
            Ok(format!("*{base}"))
        } else {
            Ok(base)
        }
    }
}

impl DefinitionVisitor for GoVisitor {
    type Value = String;

    fn visit_struct(&mut self, context: &GeneratorContext, def: &Definition) -> Result<String, EmitError> {
        let name = exported(&def.name);
        let mut code = Code::new("\t");
        comment(&mut code, &def.comments);
        code.line(format!("type {name} struct {{"));
        code.indent();
        for field in &def.fields {
            comment(&mut code, &doc_lines(&field.name, &field.comments, &field.type_));
            let pointer = !field.required || context.is_recursive(def, field);
            let type_ = Self::type_expr(def, &field.type_, pointer)?;
            let omitempty = if field.required { "" } else { ",omitempty" };
            code.line(format!(
                "{} {type_} `json:\"{}{omitempty}\"`",
                exported(&field.name),
                field.name
            ));
        }
        code.dedent();
        code.line("}");
        Ok(code.finish())
    }

    fn visit_enum(&mut self, _context: &GeneratorContext, def: &Definition) -> Result<String, EmitError> {
        let name = exported(&def.name);
        let underlying = def
            .values
            .first()
            .and_then(|v| Self::scalar(&v.type_))
            .ok_or_else(|| EmitError::new(&def.name, "enum without values"))?;

        let mut code = Code::new("\t");
        comment(&mut code, &doc_lines(&def.name, &def.comments, def));
        code.line(format!("type {name} {underlying}"));
        code.blank();
        code.line("const (");
        code.indent();
        for value in &def.values {
            let literal = match &value.value {
                Scalar::String(_) | Scalar::Int(_) => value.value.to_string(),
                other => return Err(EmitError::new(&def.name, format!("enum value {other} cannot be a constant"))),
            };
            code.line(format!("{} {name} = {literal}", exported(&value.name)));
        }
        code.dedent();
        code.line(")");
        Ok(code.finish())
    }

    fn visit_alias(&mut self, _context: &GeneratorContext, def: &Definition) -> Result<String, EmitError> {
        let mut code = Code::new("\t");
        comment(&mut code, &doc_lines(&def.name, &def.comments, def));
        let type_ = Self::type_expr(def, def, false)?;
        code.line(format!("type {} {type_}", exported(&def.name)));
        Ok(code.finish())
    }
}

#[cfg(test)]
mod tests {
    use sg_schema::{ConstraintOp, EnumValue, Field, TypeConstraint};

    use super::*;

    fn dashboard() -> File {
        let mut dashboard = Definition::structure(
            "Dashboard",
            vec![
                Field {
                    comments: vec!["Shown in the header.".into()],
                    ..Field::new("title", Definition::new(TypeId::String), true)
                },
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
                Field::new("tags", Definition::array(Definition::new(TypeId::String)), false),
                Field::new("status", Definition::reference("Status"), false),
                Field::new(
                    "coords",
                    Definition::array(Definition::new(TypeId::Float64)).with_constraints(vec![
                        TypeConstraint::new(ConstraintOp::MinItems, Scalar::Int(2)),
                        TypeConstraint::new(ConstraintOp::MaxItems, Scalar::Int(2)),
                    ]),
                    true,
                ),
                Field::new(
                    "mixed",
                    Definition::array(Definition::disjunction(vec![
                        Definition::new(TypeId::String),
                        Definition::new(TypeId::Bool),
                    ])),
                    true,
                ),
                Field::new(
                    "labels",
                    Definition::map(TypeId::String, Definition::new(TypeId::String)),
                    false,
                ),
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
    fn raw_types() {
        let out = GoRawTypes.generate(&dashboard()).unwrap();
        assert_eq!(out.path.to_str(), Some("dashboard_types_gen.go"));
        let text = out.text();
        assert!(text.starts_with("// Code generated by sg-generator"));
        assert!(text.contains("\npackage dashboard\n"));
        assert!(text.contains("\t// Shown in the header.\n\tTitle string `json:\"title\"`\n"));
        assert!(text.contains("\t// version must be >= 1\n\tVersion int64 `json:\"version\"`\n"));
        assert!(text.contains("\tNote *string `json:\"note,omitempty\"`\n"));
        assert!(text.contains("\tTags []string `json:\"tags,omitempty\"`\n"));
        assert!(text.contains("\tStatus *Status `json:\"status,omitempty\"`\n"));
        assert!(text.contains("\tCoords [2]float64 `json:\"coords\"`\n"));
        assert!(text.contains("\tMixed []any `json:\"mixed\"`\n"));
        assert!(text.contains("\tLabels map[string]string `json:\"labels,omitempty\"`\n"));
        assert!(text.contains("type Status string\n\nconst (\n\tOk Status = \"ok\"\n\tWarning Status = \"warning\"\n)\n"));
        // Sorted by name regardless of declaration order.
        assert!(text.find("type Dashboard struct").unwrap() < text.find("type Status string").unwrap());
    }

    #[test]
    fn integer_enums_and_aliases() {
        let file = File {
            package: "p".into(),
            types: vec![
                Definition::enumeration(
                    "Level",
                    vec![EnumValue {
                        type_: TypeId::Int32,
                        name: "low".into(),
                        value: Scalar::Int(1),
                    }],
                ),
                Definition {
                    name: "Ids".into(),
                    ..Definition::array(Definition::new(TypeId::Uint16))
                },
            ],
        };
        let text = GoRawTypes.generate(&file).unwrap().text().into_owned();
        assert!(text.contains("type Level int32\n\nconst (\n\tLow Level = 1\n)"));
        assert!(text.contains("type Ids []uint16\n"));
    }

    #[test]
    fn leftover_disjunction_is_an_emit_error() {
        let file = File {
            package: "p".into(),
            types: vec![Definition::structure(
                "A",
                vec![Field::new(
                    "v",
                    Definition::disjunction(vec![Definition::reference("A"), Definition::new(TypeId::String)]),
                    true,
                )],
            )],
        };
        let err = GoRawTypes.generate(&file).unwrap_err();
        assert_eq!(err.type_name, "A");
        assert!(err.message.contains("disjunction"));
    }

    #[test]
    fn builder_scaffold() {
        let out = GoBuilder.generate(&dashboard()).unwrap();
        assert_eq!(out.path.to_str(), Some("dashboard_builder_gen.go"));
        let text = out.text();
        assert!(text.contains("type Option func(builder *Builder) error\n"));
        assert!(text.contains("type Builder struct {\n\tinternal *Dashboard\n}\n"));
        assert!(text.contains("func New(title string, options ...Option) (Builder, error) {\n"));
        assert!(text.contains("\tresource := &Dashboard{\n\t\tTitle: title,\n\t}\n"));
        assert!(text.contains("\t\tif err := opt(builder); err != nil {\n\t\t\treturn *builder, err\n"));
        assert!(text.contains("func (builder *Builder) MarshalIndentJSON() ([]byte, error) {"));
    }

    #[test]
    fn mutually_recursive_structs_use_pointers() {
        let file = File {
            package: "p".into(),
            types: vec![
                Definition::structure("Panel", vec![Field::new("row", Definition::reference("Row"), true)]),
                Definition::structure(
                    "Row",
                    vec![
                        Field::new("panel", Definition::reference("Panel"), true),
                        Field::new("panels", Definition::array(Definition::reference("Panel")), true),
                    ],
                ),
            ],
        };
        let text = GoRawTypes.generate(&file).unwrap().text().into_owned();
        assert!(text.contains("\tRow *Row `json:\"row\"`\n"));
        assert!(text.contains("\tPanel *Panel `json:\"panel\"`\n"));
        assert!(text.contains("\tPanels []Panel `json:\"panels\"`\n"));
    }

    #[test]
    fn builder_rejects_a_non_struct_entry_point() {
        let mut file = dashboard();
        file.types[1].is_entry_point = false;
        file.types[0].is_entry_point = true;
        let err = GoBuilder.generate(&file).unwrap_err();
        assert_eq!(err.type_name, "Status");
        assert!(err.message.contains("struct"));
    }

    #[test]
    fn builder_needs_an_entry_point() {
        let mut file = dashboard();
        file.types[1].is_entry_point = false;
        let err = GoBuilder.generate(&file).unwrap_err();
        assert_eq!(err.type_name, "dashboard");
    }
}
