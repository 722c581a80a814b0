//! The loaded value tree and the operations the front end queries it with.

use crate::ast::{ConstraintOp, Scalar, TypeId};
use crate::error::Pos;

/// An expression together with the position it was read from.
#[derive(Clone, Debug)]
pub struct Value {
    pub expr: Expr,
    pub pos: Pos,
}

/// Values compare by expression only.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.expr == other.expr
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// `_`
    Top,
    /// A builtin type such as `string` or `uint8`.
    Basic(TypeId),
    Lit(Scalar),
    /// A unary bound like `>=1` or `=~"^a"`.
    Bound(ConstraintOp, Scalar),
    Ref { name: String, definition: bool },
    Struct(StructLit),
    List(ListLit),
    And(Vec<Value>),
    Or(Vec<Value>),
    /// `*value`, the default branch of a disjunction.
    Default(Box<Value>),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StructLit {
    pub fields: Vec<FieldDecl>,
    /// Set by a bare `...`.
    pub open: bool,
    /// `[key]: value`
    pub pattern: Option<(Box<Value>, Box<Value>)>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListLit {
    pub elems: Vec<Value>,
    pub open: bool,
    /// The element type after `...`, if any.
    pub rest: Option<Box<Value>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDecl {
    pub label: String,
    pub definition: bool,
    pub optional: bool,
    pub value: Value,
    pub attributes: Vec<Attribute>,
    pub docs: Vec<String>,
    pub pos: Pos,
}

impl FieldDecl {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// `@name(key=value, flag)`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub args: Vec<(String, Option<String>)>,
}

impl Attribute {
    /// Parses the verbatim `@name(body)` form kept by the lexer.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.strip_prefix('@')?;
        let open = raw.find('(')?;
        let body = raw[open + 1..].strip_suffix(')')?;
        let args = split_args(body)
            .into_iter()
            .filter(|arg| !arg.is_empty())
            .map(|arg| match arg.split_once('=') {
                Some((key, value)) => (key.trim().to_owned(), Some(unquote(value.trim()))),
                None => (arg.to_owned(), None),
            })
            .collect();
        Some(Self {
            name: raw[..open].to_owned(),
            args,
        })
    }

    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.args
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn has_flag(&self, key: &str) -> bool {
        self.args.iter().any(|(k, _)| k == key)
    }
}

/// Splits on commas outside of double quotes.
fn split_args(body: &str) -> Vec<&str> {
    let mut args = Vec::new();
    let mut quoted = false;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        match c {
            '"' => quoted = !quoted,
            ',' if !quoted => {
                args.push(body[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    args.push(body[start..].trim());
    args
}

fn unquote(s: &str) -> String {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
        .to_owned()
}

/// The branches of a disjunction, with defaults stripped.
#[derive(Debug)]
pub struct Disjunction<'a> {
    pub branches: Vec<&'a Value>,
    pub default: Option<&'a Value>,
}

impl Value {
    pub fn new(expr: Expr, pos: Pos) -> Self {
        Self { expr, pos }
    }

    pub fn as_struct(&self) -> Option<&StructLit> {
        match &self.expr {
            Expr::Struct(lit) => Some(lit),
            _ => None,
        }
    }

    /// Every field of a struct value, regular and definition, optional and
    /// required, in declaration order.
    pub fn fields(&self) -> &[FieldDecl] {
        self.as_struct().map_or(&[], |lit| lit.fields.as_slice())
    }

    /// Looks up a regular field by label.
    pub fn lookup(&self, label: &str) -> Option<&FieldDecl> {
        self.fields()
            .iter()
            .find(|f| !f.definition && f.label == label)
    }

    /// Flattens nested disjunctions, strips default markers and removes
    /// branches that are equal to, or subsumed by, an earlier or later one.
    pub fn split_disjunction(&self) -> Disjunction<'_> {
        let mut flat = Vec::new();
        let mut default = None;
        collect_branches(self, &mut flat, &mut default);

        let mut branches: Vec<&Value> = Vec::with_capacity(flat.len());
        for (i, branch) in flat.iter().enumerate() {
            let duplicate = branches.iter().any(|b| b.expr == branch.expr);
            let subsumed = flat
                .iter()
                .enumerate()
                .any(|(j, other)| i != j && subsumes(other, branch));
            if !duplicate && !subsumed {
                branches.push(branch);
            }
        }
        Disjunction { branches, default }
    }

    /// The conjuncts of a conjunction; a lone value is its own conjunct.
    pub fn conjuncts(&self) -> Vec<&Value> {
        match &self.expr {
            Expr::And(values) => values.iter().flat_map(Value::conjuncts).collect(),
            _ => vec![self],
        }
    }

    pub fn is_concrete(&self) -> bool {
        match &self.expr {
            Expr::Lit(_) => true,
            Expr::Default(inner) => inner.is_concrete(),
            Expr::And(values) => values.iter().any(Value::is_concrete),
            Expr::List(list) => !list.open && list.elems.iter().all(Value::is_concrete),
            Expr::Struct(lit) => lit.fields.iter().all(|f| f.value.is_concrete()),
            _ => false,
        }
    }

    /// The literal this value is pinned to, if any.
    pub fn concrete_scalar(&self) -> Option<&Scalar> {
        match &self.expr {
            Expr::Lit(scalar) => Some(scalar),
            Expr::Default(inner) => inner.concrete_scalar(),
            Expr::And(values) => values.iter().find_map(Value::concrete_scalar),
            _ => None,
        }
    }

    /// The name of the definition this value refers to.
    pub fn reference(&self) -> Option<&str> {
        match &self.expr {
            Expr::Ref { name, .. } => Some(name),
            _ => None,
        }
    }

    /// The kind the value is constrained to, even when not concrete.
    pub fn incomplete_kind(&self) -> TypeId {
        match &self.expr {
            Expr::Top => TypeId::Any,
            Expr::Basic(t) => t.clone(),
            Expr::Lit(scalar) => scalar.type_id(),
            Expr::Bound(op, arg) => match op {
                ConstraintOp::Regex | ConstraintOp::NotRegex => TypeId::String,
                _ => match arg {
                    Scalar::Int(_) | Scalar::Float(_) => TypeId::Float64,
                    other => other.type_id(),
                },
            },
            Expr::Ref { name, .. } => TypeId::Ref(name.clone()),
            Expr::Struct(_) => TypeId::Struct,
            Expr::List(_) => TypeId::Array,
            Expr::Default(inner) => inner.incomplete_kind(),
            Expr::And(values) => values
                .iter()
                .find(|v| !matches!(v.expr, Expr::Bound(..) | Expr::Top))
                .or_else(|| values.first())
                .map_or(TypeId::Any, Value::incomplete_kind),
            Expr::Or(_) => {
                let split = self.split_disjunction();
                let mut kinds = split.branches.iter().map(|b| b.incomplete_kind());
                match kinds.next() {
                    Some(first) if kinds.all(|k| k == first) => first,
                    _ => TypeId::Disjunction,
                }
            }
        }
    }
}

fn collect_branches<'a>(value: &'a Value, out: &mut Vec<&'a Value>, default: &mut Option<&'a Value>) {
    match &value.expr {
        Expr::Or(values) => {
            for v in values {
                collect_branches(v, out, default);
            }
        }
        Expr::Default(inner) => {
            if default.is_none() {
                *default = Some(inner);
            }
            collect_branches(inner, out, default);
        }
        _ => out.push(value),
    }
}

/// `string` subsumes `"a"`, `int` subsumes `1`, `_` subsumes everything.
fn subsumes(general: &Value, specific: &Value) -> bool {
    match (&general.expr, &specific.expr) {
        (Expr::Top, other) => !matches!(other, Expr::Top),
        (Expr::Basic(kind), Expr::Lit(lit)) => !matches!(lit, Scalar::Null) && lit.fits(kind),
        _ => false,
    }
}
