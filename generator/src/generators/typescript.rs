use sg_schema::{Definition, File, Scalar, TypeId};

use super::common::{doc_lines, unexpected, Code, DefinitionVisitor, GeneratorContext, GENERATED_BY};
use super::Emitter;
use crate::error::EmitError;
use crate::fs::GeneratedFile;
use crate::naming::exported;

/// TypeScript interfaces, enums and type aliases.
#[derive(Copy, Clone, Debug, Default)]
pub struct TypescriptRawTypes;

impl Emitter for TypescriptRawTypes {
    fn name(&self) -> &str {
        "TypescriptRawTypes"
    }

    fn generate(&self, file: &File) -> Result<GeneratedFile, EmitError> {
        let ctx = GeneratorContext::new(file);
        let blocks = ctx.walk(&mut TypescriptVisitor)?;

        let mut out = format!("// Code generated by {GENERATED_BY}. DO NOT EDIT.\n");
        for block in blocks {
            out.push('\n');
            out.push_str(&block);
        }
        Ok(GeneratedFile::new(ctx.file_name("types", "ts"), out, self.name()))
    }
}

struct TypescriptVisitor;

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn property_name(name: &str) -> String {
    if is_identifier(name) {
        name.to_owned()
    } else {
        Scalar::String(name.to_owned()).to_string()
    }
}

fn jsdoc(code: &mut Code, lines: &[String]) {
    if lines.is_empty() {
        return;
    }
    code.line("/**");
    for line in lines {
        code.line(format!(" * {line}"));
    }
    code.line(" */");
}

impl TypescriptVisitor {
    fn type_expr(owner: &Definition, def: &Definition) -> Result<String, EmitError> {
        let base = match &def.type_ {
            TypeId::String | TypeId::Bytes => "string".to_owned(),
            TypeId::Bool => "boolean".to_owned(),
            t if t.is_integer() || t.is_float() => "number".to_owned(),
            TypeId::Any => "any".to_owned(),
            TypeId::Null => "null".to_owned(),
            TypeId::Ref(name) => exported(name),
            TypeId::Array => {
                let value_type = def.value_type().ok_or_else(|| unexpected(owner, def))?;
                let element = Self::type_expr(owner, value_type)?;
                match def.fixed_length() {
                    Some(n) => format!("[{}]", vec![element; n].join(", ")),
                    None if element.contains('|') => format!("({element})[]"),
                    None => format!("{element}[]"),
                }
            }
            TypeId::Map => {
                let value_type = def.value_type().ok_or_else(|| unexpected(owner, def))?;
                format!("Record<string, {}>", Self::type_expr(owner, value_type)?)
            }
            TypeId::Disjunction => def
                .branches
                .iter()
                .map(|b| Self::type_expr(owner, b))
                .collect::<Result<Vec<_>, _>>()?
                .join(" | "),
            _ => return Err(unexpected(owner, def)),
        };
        if def.nullable && def.type_ != TypeId::Null {
            Ok(format!("{base} | null"))
        } else {
            Ok(base)
        }
    }
}

impl DefinitionVisitor for TypescriptVisitor {
    type Value = String;

    fn visit_struct(&mut self, _context: &GeneratorContext, def: &Definition) -> Result<String, EmitError> {
        let mut code = Code::new("  ");
        jsdoc(&mut code, &def.comments);
        code.line(format!("export interface {} {{", exported(&def.name)));
        code.indent();
        for field in &def.fields {
            jsdoc(&mut code, &doc_lines(&field.name, &field.comments, &field.type_));
            let optional = if field.required { "" } else { "?" };
            code.line(format!(
                "{}{optional}: {};",
                property_name(&field.name),
                Self::type_expr(def, &field.type_)?
            ));
        }
        code.dedent();
        code.line("}");
        Ok(code.finish())
    }

    fn visit_enum(&mut self, _context: &GeneratorContext, def: &Definition) -> Result<String, EmitError> {
        let mut code = Code::new("  ");
        jsdoc(&mut code, &doc_lines(&def.name, &def.comments, def));
        code.line(format!("export enum {} {{", exported(&def.name)));
        code.indent();
        for value in &def.values {
            code.line(format!("{} = {},", exported(&value.name), value.value));
        }
        code.dedent();
        code.line("}");
        Ok(code.finish())
    }

    fn visit_alias(&mut self, _context: &GeneratorContext, def: &Definition) -> Result<String, EmitError> {
        let mut code = Code::new("  ");
        jsdoc(&mut code, &doc_lines(&def.name, &def.comments, def));
        code.line(format!(
            "export type {} = {};",
            exported(&def.name),
            Self::type_expr(def, def)?
        ));
        Ok(code.finish())
    }
}
