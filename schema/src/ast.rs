//! The core AST. Every front end produces it; every emitter consumes it.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// The kinds of type a [`Definition`] can denote.
///
/// [`TypeId::Ref`] is the only variant that does not come from the closed set:
/// it names another top-level definition of the same [`File`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeId {
    Struct,
    Enum,
    Map,
    Array,
    Disjunction,
    Null,
    Any,
    Bytes,
    String,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    Ref(String),
}

impl TypeId {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Struct => "struct",
            Self::Enum => "enum",
            Self::Map => "map",
            Self::Array => "array",
            Self::Disjunction => "disjunction",
            Self::Null => "null",
            Self::Any => "any",
            Self::Bytes => "bytes",
            Self::String => "string",
            Self::Bool => "bool",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Ref(name) => name,
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Ref(_))
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::Int8
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::Uint8
                | Self::Uint16
                | Self::Uint32
                | Self::Uint64
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    /// Leaves are the kinds a definition can denote without further structure.
    pub fn is_leaf(&self) -> bool {
        self.is_integer()
            || self.is_float()
            || matches!(
                self,
                Self::Null | Self::Any | Self::Bytes | Self::String | Self::Bool
            )
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeId {
    type Err = ();

    /// Parses one of the closed-set names. Never yields [`TypeId::Ref`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "struct" => Self::Struct,
            "enum" => Self::Enum,
            "map" => Self::Map,
            "array" => Self::Array,
            "disjunction" => Self::Disjunction,
            "null" => Self::Null,
            "any" => Self::Any,
            "bytes" => Self::Bytes,
            "string" => Self::String,
            "bool" => Self::Bool,
            "int8" => Self::Int8,
            "int16" => Self::Int16,
            "int32" => Self::Int32,
            "int64" => Self::Int64,
            "uint8" => Self::Uint8,
            "uint16" => Self::Uint16,
            "uint32" => Self::Uint32,
            "uint64" => Self::Uint64,
            "float32" => Self::Float32,
            "float64" => Self::Float64,
            _ => return Err(()),
        })
    }
}

/// A concrete literal as parsed from a schema source.
#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Scalar {
    /// The widest kind able to hold this literal.
    pub fn type_id(&self) -> TypeId {
        match self {
            Self::Null => TypeId::Null,
            Self::Bool(_) => TypeId::Bool,
            Self::Int(_) => TypeId::Int64,
            Self::Float(_) => TypeId::Float64,
            Self::String(_) => TypeId::String,
        }
    }

    /// Whether this literal is a valid value of `type_`.
    pub fn fits(&self, type_: &TypeId) -> bool {
        match self {
            Self::Null => *type_ == TypeId::Null,
            Self::Bool(_) => *type_ == TypeId::Bool,
            Self::Int(_) => type_.is_integer() || type_.is_float(),
            Self::Float(_) => type_.is_float(),
            Self::String(_) => matches!(type_, TypeId::String | TypeId::Bytes),
        }
    }
}

impl fmt::Display for Scalar {
    /// Renders the literal in the JSON-compatible form shared by all targets.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => {
                let quoted = serde_json::to_string(s).map_err(|_| fmt::Error)?;
                f.write_str(&quoted)
            }
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConstraintOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    /// The value equals one of the arguments.
    OneOf,
    Regex,
    NotRegex,
    MinLength,
    MaxLength,
    MinItems,
    MaxItems,
    MultipleOf,
}

impl fmt::Display for ConstraintOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::OneOf => "oneOf",
            Self::Regex => "=~",
            Self::NotRegex => "!~",
            Self::MinLength => "minLength",
            Self::MaxLength => "maxLength",
            Self::MinItems => "minItems",
            Self::MaxItems => "maxItems",
            Self::MultipleOf => "multipleOf",
        })
    }
}

/// A bound, pattern or equality kept verbatim from the source.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeConstraint {
    pub op: ConstraintOp,
    pub args: Vec<Scalar>,
}

impl TypeConstraint {
    pub fn new(op: ConstraintOp, arg: Scalar) -> Self {
        Self {
            op,
            args: vec![arg],
        }
    }

    /// Human readable rendering used by emitters for doc comments,
    /// e.g. `version must be >= 1`.
    pub fn describe(&self, subject: &str) -> String {
        let args = self
            .args
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        match self.op {
            ConstraintOp::Lt
            | ConstraintOp::Le
            | ConstraintOp::Gt
            | ConstraintOp::Ge
            | ConstraintOp::Eq
            | ConstraintOp::Ne => format!("{subject} must be {} {args}", self.op),
            ConstraintOp::OneOf => format!("{subject} must be one of {args}"),
            ConstraintOp::Regex => format!("{subject} must match {args}"),
            ConstraintOp::NotRegex => format!("{subject} must not match {args}"),
            ConstraintOp::MinLength => format!("{subject} must be at least {args} characters long"),
            ConstraintOp::MaxLength => format!("{subject} must be at most {args} characters long"),
            ConstraintOp::MinItems => format!("{subject} must have at least {args} items"),
            ConstraintOp::MaxItems => format!("{subject} must have at most {args} items"),
            ConstraintOp::MultipleOf => format!("{subject} must be a multiple of {args}"),
        }
    }
}

/// A node of the AST.
///
/// Which attributes are meaningful depends on `type_`: `fields` for structs,
/// `values` for enums, `branches` for disjunctions, `index_type` and
/// `value_type` for maps and arrays.
#[derive(Clone, Debug, PartialEq)]
pub struct Definition {
    pub type_: TypeId,
    /// Unique within a file; empty for anonymous leaves.
    pub name: String,
    pub comments: Vec<String>,
    pub index_type: Option<TypeId>,
    pub value_type: Option<Box<Definition>>,
    pub branches: Vec<Definition>,
    pub fields: Vec<Field>,
    pub values: Vec<EnumValue>,
    pub is_entry_point: bool,
    pub nullable: bool,
    pub constraints: Vec<TypeConstraint>,
    pub default: Option<Scalar>,
}

impl Definition {
    pub fn new(type_: TypeId) -> Self {
        Self {
            type_,
            name: String::new(),
            comments: Vec::new(),
            index_type: None,
            value_type: None,
            branches: Vec::new(),
            fields: Vec::new(),
            values: Vec::new(),
            is_entry_point: false,
            nullable: false,
            constraints: Vec::new(),
            default: None,
        }
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Self::new(TypeId::Ref(name.into()))
    }

    pub fn array(value_type: Definition) -> Self {
        Self {
            index_type: Some(TypeId::Int64),
            value_type: Some(Box::new(value_type)),
            ..Self::new(TypeId::Array)
        }
    }

    pub fn map(index_type: TypeId, value_type: Definition) -> Self {
        Self {
            index_type: Some(index_type),
            value_type: Some(Box::new(value_type)),
            ..Self::new(TypeId::Map)
        }
    }

    pub fn disjunction(branches: Vec<Definition>) -> Self {
        Self {
            branches,
            ..Self::new(TypeId::Disjunction)
        }
    }

    pub fn structure(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            fields,
            ..Self::new(TypeId::Struct)
        }
    }

    pub fn enumeration(name: impl Into<String>, values: Vec<EnumValue>) -> Self {
        Self {
            name: name.into(),
            values,
            ..Self::new(TypeId::Enum)
        }
    }

    pub fn with_constraints(mut self, constraints: Vec<TypeConstraint>) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_comments(mut self, comments: Vec<String>) -> Self {
        self.comments = comments;
        self
    }

    pub fn is_reference(&self) -> bool {
        self.type_.is_reference()
    }

    pub fn reference_name(&self) -> Option<&str> {
        match &self.type_ {
            TypeId::Ref(name) => Some(name),
            _ => None,
        }
    }

    pub fn value_type(&self) -> Option<&Definition> {
        self.value_type.as_deref()
    }

    pub fn has_null_branch(&self) -> bool {
        self.branches.iter().any(|b| b.type_ == TypeId::Null)
    }

    pub fn non_null_branches(&self) -> impl Iterator<Item = &Definition> {
        self.branches.iter().filter(|b| b.type_ != TypeId::Null)
    }

    /// A disjunction whose branches are all scalar leaves (plus optionally
    /// `null`). Targets with native unions render these directly.
    pub fn is_leaf_union(&self) -> bool {
        self.type_ == TypeId::Disjunction && self.branches.iter().all(|b| b.type_.is_leaf())
    }

    /// The length of an array whose item count is pinned by its constraints.
    pub fn fixed_length(&self) -> Option<usize> {
        if self.type_ != TypeId::Array {
            return None;
        }
        let bound = |op| {
            self.constraints.iter().find_map(|c| match (c.op, c.args.first()) {
                (o, Some(Scalar::Int(n))) if o == op => usize::try_from(*n).ok(),
                _ => None,
            })
        };
        match (bound(ConstraintOp::MinItems), bound(ConstraintOp::MaxItems)) {
            (Some(min), Some(max)) if min == max => Some(min),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub name: String,
    pub comments: Vec<String>,
    pub required: bool,
    pub type_: Definition,
}

impl Field {
    pub fn new(name: impl Into<String>, type_: Definition, required: bool) -> Self {
        Self {
            name: name.into(),
            comments: Vec::new(),
            required,
            type_,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnumValue {
    /// `string` or an integer width.
    pub type_: TypeId,
    /// Programmer-friendly identifier.
    pub name: String,
    pub value: Scalar,
}

/// One generated package worth of type definitions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct File {
    pub package: String,
    pub types: Vec<Definition>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{type_name}: {message}")]
pub struct InvariantViolation {
    pub type_name: String,
    pub message: String,
}

impl File {
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            types: Vec::new(),
        }
    }

    pub fn entry_point(&self) -> Option<&Definition> {
        self.types.iter().find(|t| t.is_entry_point)
    }

    pub fn get(&self, name: &str) -> Option<&Definition> {
        self.types.iter().find(|t| t.name == name)
    }

    /// Checks the invariants every pass relies on when handing the AST over.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        let entry_points = self.types.iter().filter(|t| t.is_entry_point).count();
        if entry_points > 1 {
            return Err(InvariantViolation {
                type_name: self.package.clone(),
                message: format!("{entry_points} entry point types, expected at most one"),
            });
        }

        let mut names = HashSet::new();
        for def in &self.types {
            if def.name.is_empty() {
                return Err(InvariantViolation {
                    type_name: self.package.clone(),
                    message: "top-level definition without a name".into(),
                });
            }
            if !names.insert(def.name.as_str()) {
                return Err(def.violation("defined more than once"));
            }
        }

        for def in &self.types {
            self.validate_top_level(def)?;
        }
        Ok(())
    }

    fn validate_top_level(&self, def: &Definition) -> Result<(), InvariantViolation> {
        match def.type_ {
            TypeId::Struct => {
                let mut seen = HashSet::new();
                for field in &def.fields {
                    if !seen.insert(field.name.as_str()) {
                        return Err(def.violation(format!("duplicate field {:?}", field.name)));
                    }
                    self.validate_nested(def, &field.type_)?;
                }
                Ok(())
            }
            TypeId::Enum => validate_enum(def),
            _ => self.validate_nested(def, def),
        }
    }

    fn validate_nested(&self, owner: &Definition, def: &Definition) -> Result<(), InvariantViolation> {
        match &def.type_ {
            TypeId::Ref(name) => {
                if self.get(name).is_none() {
                    return Err(owner.violation(format!("unresolved reference to {name:?}")));
                }
            }
            TypeId::Struct => {
                return Err(owner.violation("anonymous nested struct"));
            }
            TypeId::Enum => {
                return Err(owner.violation("anonymous nested enum"));
            }
            TypeId::Disjunction => {
                if def.branches.len() < 2 {
                    return Err(owner.violation("disjunction with fewer than two branches"));
                }
                for branch in &def.branches {
                    self.validate_nested(owner, branch)?;
                }
            }
            TypeId::Array | TypeId::Map => match def.value_type() {
                Some(value_type) => self.validate_nested(owner, value_type)?,
                None => return Err(owner.violation(format!("{} without a value type", def.type_))),
            },
            _ => {}
        }
        Ok(())
    }
}

fn validate_enum(def: &Definition) -> Result<(), InvariantViolation> {
    if def.values.is_empty() {
        return Err(def.violation("enum without values"));
    }
    let mut seen: Vec<&Scalar> = Vec::with_capacity(def.values.len());
    for value in &def.values {
        if !(value.type_ == TypeId::String || value.type_.is_integer()) {
            return Err(def.violation(format!("enum values may not be of type {}", value.type_)));
        }
        if !matches!(value.value, Scalar::String(_) | Scalar::Int(_)) || !value.value.fits(&value.type_) {
            return Err(def.violation(format!(
                "enum value {} is not a {}",
                value.value, value.type_
            )));
        }
        if seen.contains(&&value.value) {
            return Err(def.violation(format!("duplicate enum value {}", value.value)));
        }
        seen.push(&value.value);
    }
    Ok(())
}

impl Definition {
    fn violation(&self, message: impl Into<String>) -> InvariantViolation {
        InvariantViolation {
            type_name: self.name.clone(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dashboard() -> File {
        let mut dashboard = Definition::structure(
            "Dashboard",
            vec![
                Field::new("title", Definition::new(TypeId::String), true),
                Field::new("status", Definition::reference("Status"), false),
            ],
        );
        dashboard.is_entry_point = true;
        let status = Definition::enumeration(
            "Status",
            vec![EnumValue {
                type_: TypeId::String,
                name: "ok".into(),
                value: Scalar::String("ok".into()),
            }],
        );
        File {
            package: "dashboard".into(),
            types: vec![dashboard, status],
        }
    }

    #[test]
    fn valid_file_passes() {
        let file = dashboard();
        assert!(file.validate().is_ok());
        assert_eq!(file.entry_point().map(|d| d.name.as_str()), Some("Dashboard"));
    }

    #[test]
    fn unresolved_reference_is_reported() {
        let mut file = dashboard();
        file.types.pop();
        let err = file.validate().unwrap_err();
        assert_eq!(err.type_name, "Dashboard");
        assert!(err.message.contains("\"Status\""));
    }

    #[test]
    fn duplicate_enum_literals_are_rejected() {
        let mut file = dashboard();
        let dup = file.types[1].values[0].clone();
        file.types[1].values.push(dup);
        assert!(file.validate().unwrap_err().message.contains("duplicate"));
    }

    #[test]
    fn nested_struct_is_rejected() {
        let mut file = dashboard();
        file.types[0].fields.push(Field::new(
            "inner",
            Definition::structure("", vec![]),
            true,
        ));
        assert_eq!(file.validate().unwrap_err().message, "anonymous nested struct");
    }

    #[test]
    fn fixed_length_needs_matching_bounds() {
        let pinned = Definition::array(Definition::new(TypeId::Float64)).with_constraints(vec![
            TypeConstraint::new(ConstraintOp::MinItems, Scalar::Int(2)),
            TypeConstraint::new(ConstraintOp::MaxItems, Scalar::Int(2)),
        ]);
        assert_eq!(pinned.fixed_length(), Some(2));

        let open = Definition::array(Definition::new(TypeId::Float64)).with_constraints(vec![
            TypeConstraint::new(ConstraintOp::MinItems, Scalar::Int(1)),
        ]);
        assert_eq!(open.fixed_length(), None);
    }

    #[test]
    fn constraint_descriptions() {
        let bound = TypeConstraint::new(ConstraintOp::Ge, Scalar::Int(1));
        assert_eq!(bound.describe("version"), "version must be >= 1");
        let one_of = TypeConstraint {
            op: ConstraintOp::OneOf,
            args: vec![Scalar::String("a".into()), Scalar::String("b".into())],
        };
        assert_eq!(one_of.describe("mode"), r#"mode must be one of "a", "b""#);
    }
}
