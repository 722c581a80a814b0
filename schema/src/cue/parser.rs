//! Recursive-descent parser producing the value tree.

use std::collections::BTreeMap;
use std::str::FromStr;

use tracing::trace;

use super::lexer::{tokenize, SourceMap, Spanned, Token};
use super::value::{Attribute, Expr, FieldDecl, ListLit, StructLit, Value};
use crate::ast::{ConstraintOp, Scalar, TypeId};
use crate::error::{Error, Pos, Result};

/// A parsed source document.
#[derive(Clone, Debug)]
pub struct Instance {
    /// The name given by the `package` clause.
    pub package: Option<String>,
    /// The top-level struct.
    pub root: Value,
}

/// Loads a CUE document. `filename` only feeds error positions.
pub fn load(source: &str, filename: Option<&str>) -> Result<Instance> {
    let map = SourceMap::new(source, filename);
    let mut parser = Parser::new(tokenize(source, &map)?, map);
    parser.file()
}

/// A comment line, and whether code precedes it on the same line.
struct Comment {
    text: String,
    trailing: bool,
}

struct Parser<'a> {
    tokens: Vec<Spanned>,
    comments: BTreeMap<usize, Comment>,
    pos: usize,
    map: SourceMap<'a>,
}

impl<'a> Parser<'a> {
    fn new(spanned: Vec<Spanned>, map: SourceMap<'a>) -> Self {
        let mut tokens = Vec::with_capacity(spanned.len());
        let mut comments = BTreeMap::new();
        let mut last_code_line = 0;
        for (token, span) in spanned {
            let line = map.line(span.start);
            match token {
                Token::Comment(text) => {
                    comments.insert(
                        line,
                        Comment {
                            text,
                            trailing: line == last_code_line,
                        },
                    );
                }
                token => {
                    last_code_line = map.line(span.end.saturating_sub(1).max(span.start));
                    tokens.push((token, span));
                }
            }
        }
        Self {
            tokens,
            comments,
            pos: 0,
            map,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.peek_nth(0)
    }

    fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|(token, _)| token)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(token, _)| token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, expected: &Token) -> bool {
        matches!(self.peek(), Some(t) if std::mem::discriminant(t) == std::mem::discriminant(expected))
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("`{expected}`")))
        }
    }

    fn current_pos(&self) -> Pos {
        match self.tokens.get(self.pos) {
            Some((_, span)) => self.map.pos(span.start),
            None => self
                .tokens
                .last()
                .map_or_else(|| self.map.pos(0), |(_, span)| self.map.pos(span.end)),
        }
    }

    fn current_line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map_or(0, |(_, span)| self.map.line(span.start))
    }

    fn unexpected(&self, wanted: &str) -> Error {
        let found = self
            .peek()
            .map_or_else(|| "end of input".to_owned(), |t| format!("`{t}`"));
        Error::malformed("", format!("expected {wanted}, found {found}")).at(&self.current_pos())
    }

    /// The run of own-line comments directly above `line`.
    fn docs_above(&self, line: usize) -> Vec<String> {
        let mut docs = Vec::new();
        let mut expected = line.saturating_sub(1);
        while let Some(comment) = self.comments.get(&expected) {
            if comment.trailing || expected == 0 {
                break;
            }
            docs.push(comment.text.clone());
            expected -= 1;
        }
        docs.reverse();
        docs
    }

    fn file(&mut self) -> Result<Instance> {
        let pos = self.current_pos();
        let mut package = None;
        if self.eat(&Token::Package) {
            match self.advance() {
                Some(Token::Ident(name)) => package = Some(name),
                _ => {
                    self.pos = self.pos.saturating_sub(1);
                    return Err(self.unexpected("package name"));
                }
            }
        }
        let lit = self.struct_body(None)?;
        trace!(fields = lit.fields.len(), ?package, "parsed document");
        Ok(Instance {
            package,
            root: Value::new(Expr::Struct(lit), pos),
        })
    }

    /// Parses declarations until `close` (or end of input when `None`).
    fn struct_body(&mut self, close: Option<Token>) -> Result<StructLit> {
        let mut lit = StructLit::default();
        loop {
            match &close {
                None if self.peek().is_none() => break,
                Some(close) if self.eat(close) => break,
                Some(_) if self.peek().is_none() => return Err(self.unexpected("`}`")),
                _ => {}
            }

            match self.peek() {
                Some(Token::Ellipsis) => {
                    self.pos += 1;
                    lit.open = true;
                }
                Some(Token::Attribute(_)) => {
                    self.pos += 1;
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let key = self.expr()?;
                    self.expect(Token::RBracket)?;
                    self.expect(Token::Colon)?;
                    let value = self.expr()?;
                    lit.pattern = Some((Box::new(key), Box::new(value)));
                }
                _ => lit.fields.push(self.field()?),
            }
            self.eat(&Token::Comma);
        }
        Ok(lit)
    }

    fn label(&mut self) -> Result<(String, bool)> {
        match self.peek() {
            Some(Token::Ident(name)) | Some(Token::String(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok((name, false))
            }
            Some(Token::Definition(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok((name, true))
            }
            Some(Token::Package) => {
                self.pos += 1;
                Ok(("package".to_owned(), false))
            }
            _ => Err(self.unexpected("field label")),
        }
    }

    fn at_label(&self) -> bool {
        let is_label = matches!(
            self.peek(),
            Some(Token::Ident(_) | Token::String(_) | Token::Definition(_) | Token::Package)
        );
        is_label
            && match self.peek_nth(1) {
                Some(Token::Colon) => true,
                Some(Token::Question | Token::Bang) => matches!(self.peek_nth(2), Some(Token::Colon)),
                _ => false,
            }
    }

    fn field(&mut self) -> Result<FieldDecl> {
        let pos = self.current_pos();
        let docs = self.docs_above(self.current_line());
        let (label, definition) = self.label()?;
        let optional = if self.eat(&Token::Question) {
            true
        } else {
            self.eat(&Token::Bang);
            false
        };
        self.expect(Token::Colon)?;

        let value = if self.at_label() {
            // `a: b: expr` is `a: { b: expr }`
            let inner_pos = self.current_pos();
            let inner = self.field()?;
            Value::new(
                Expr::Struct(StructLit {
                    fields: vec![inner],
                    ..StructLit::default()
                }),
                inner_pos,
            )
        } else {
            self.expr()?
        };

        let mut attributes = Vec::new();
        while let Some(Token::Attribute(raw)) = self.peek() {
            let attribute = Attribute::parse(raw)
                .ok_or_else(|| Error::malformed(&label, format!("malformed attribute {raw}")).at(&self.current_pos()))?;
            attributes.push(attribute);
            self.pos += 1;
        }

        Ok(FieldDecl {
            label,
            definition,
            optional,
            value,
            attributes,
            docs,
            pos,
        })
    }

    fn expr(&mut self) -> Result<Value> {
        let pos = self.current_pos();
        let mut branches = vec![self.conjunction()?];
        while self.eat(&Token::Pipe) {
            branches.push(self.conjunction()?);
        }
        Ok(if branches.len() == 1 {
            branches.remove(0)
        } else {
            Value::new(Expr::Or(branches), pos)
        })
    }

    fn conjunction(&mut self) -> Result<Value> {
        let pos = self.current_pos();
        let mut conjuncts = vec![self.unary()?];
        while self.eat(&Token::Amp) {
            conjuncts.push(self.unary()?);
        }
        Ok(if conjuncts.len() == 1 {
            conjuncts.remove(0)
        } else {
            Value::new(Expr::And(conjuncts), pos)
        })
    }

    fn unary(&mut self) -> Result<Value> {
        let pos = self.current_pos();
        let op = match self.peek() {
            Some(Token::Star) => {
                self.pos += 1;
                let inner = self.unary()?;
                return Ok(Value::new(Expr::Default(Box::new(inner)), pos));
            }
            Some(Token::Lt) => ConstraintOp::Lt,
            Some(Token::Le) => ConstraintOp::Le,
            Some(Token::Gt) => ConstraintOp::Gt,
            Some(Token::Ge) => ConstraintOp::Ge,
            Some(Token::Ne) => ConstraintOp::Ne,
            Some(Token::Match) => ConstraintOp::Regex,
            Some(Token::NotMatch) => ConstraintOp::NotRegex,
            _ => return self.primary(),
        };
        self.pos += 1;
        let operand = self.primary()?;
        match operand.expr {
            Expr::Lit(arg) => Ok(Value::new(Expr::Bound(op, arg), pos)),
            _ => Err(Error::malformed("", format!("bound `{op}` needs a literal operand")).at(&operand.pos)),
        }
    }

    fn primary(&mut self) -> Result<Value> {
        let pos = self.current_pos();
        let Some(token) = self.advance() else {
            return Err(self.unexpected("expression"));
        };
        let expr = match token {
            Token::Null => Expr::Lit(Scalar::Null),
            Token::Bool(b) => Expr::Lit(Scalar::Bool(b)),
            Token::Int(i) => Expr::Lit(Scalar::Int(i)),
            Token::Float(x) => Expr::Lit(Scalar::Float(x)),
            Token::String(s) => Expr::Lit(Scalar::String(s)),
            Token::Minus => match self.advance() {
                Some(Token::Int(i)) => Expr::Lit(Scalar::Int(-i)),
                Some(Token::Float(x)) => Expr::Lit(Scalar::Float(-x)),
                _ => {
                    self.pos -= 1;
                    return Err(self.unexpected("number after `-`"));
                }
            },
            Token::Ident(name) => builtin(&name).unwrap_or(Expr::Ref {
                name,
                definition: false,
            }),
            Token::Definition(name) => Expr::Ref {
                name,
                definition: true,
            },
            Token::LBrace => Expr::Struct(self.struct_body(Some(Token::RBrace))?),
            Token::LBracket => Expr::List(self.list()?),
            Token::LParen => {
                let inner = self.expr()?;
                self.expect(Token::RParen)?;
                return Ok(inner);
            }
            _ => {
                self.pos -= 1;
                return Err(self.unexpected("expression"));
            }
        };
        Ok(Value::new(expr, pos))
    }

    fn list(&mut self) -> Result<ListLit> {
        let mut list = ListLit::default();
        loop {
            if self.eat(&Token::RBracket) {
                return Ok(list);
            }
            if self.eat(&Token::Ellipsis) {
                list.open = true;
                if !self.check(&Token::RBracket) {
                    list.rest = Some(Box::new(self.expr()?));
                }
                self.eat(&Token::Comma);
                self.expect(Token::RBracket)?;
                return Ok(list);
            }
            list.elems.push(self.expr()?);
            if !self.eat(&Token::Comma) && !self.check(&Token::RBracket) {
                return Err(self.unexpected("`,` or `]`"));
            }
        }
    }
}

fn builtin(name: &str) -> Option<Expr> {
    let basic = match name {
        "_" => return Some(Expr::Top),
        "int" => TypeId::Int64,
        "uint" => TypeId::Uint64,
        "float" | "number" => TypeId::Float64,
        "struct" | "enum" | "map" | "array" | "disjunction" | "any" | "null" => return None,
        other => TypeId::from_str(other).ok()?,
    };
    Some(Expr::Basic(basic))
}
