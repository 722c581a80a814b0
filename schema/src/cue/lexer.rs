//! Tokenizer for the CUE subset understood by the loader.

use std::fmt;
use std::ops::Range;

use logos::Logos;

use crate::error::{Error, Pos, Result};

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token {
    #[token("package")]
    Package,
    #[token("null")]
    Null,
    #[token("true", |_| true)]
    #[token("false", |_| false)]
    Bool(bool),

    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("...")]
    Ellipsis,

    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token("?")]
    Question,
    #[token("!")]
    Bang,
    #[token("|")]
    Pipe,
    #[token("&")]
    Amp,
    #[token("*")]
    Star,
    #[token("-")]
    Minus,

    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,
    #[token("!=")]
    Ne,
    #[token("=~")]
    Match,
    #[token("!~")]
    NotMatch,

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),
    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),
    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| {
        let s = lex.slice();
        unescape(&s[1..s.len() - 1])
    })]
    String(String),

    /// `#Name`, stored without the leading `#`.
    #[regex(r"#[a-zA-Z_$][a-zA-Z0-9_$]*", |lex| lex.slice()[1..].to_owned())]
    Definition(String),
    #[regex(r"[a-zA-Z_$][a-zA-Z0-9_$]*", |lex| lex.slice().to_owned())]
    Ident(String),
    /// `@name(body)`, stored verbatim.
    #[regex(r"@[a-zA-Z_][a-zA-Z0-9_]*\(", attribute)]
    Attribute(String),
    /// `// text`, stored trimmed and without the slashes.
    #[regex(r"//[^\n]*", |lex| lex.slice()[2..].trim().to_owned())]
    Comment(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Package => f.write_str("package"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::LBrace => f.write_str("{"),
            Self::RBrace => f.write_str("}"),
            Self::LBracket => f.write_str("["),
            Self::RBracket => f.write_str("]"),
            Self::LParen => f.write_str("("),
            Self::RParen => f.write_str(")"),
            Self::Ellipsis => f.write_str("..."),
            Self::Colon => f.write_str(":"),
            Self::Comma => f.write_str(","),
            Self::Question => f.write_str("?"),
            Self::Bang => f.write_str("!"),
            Self::Pipe => f.write_str("|"),
            Self::Amp => f.write_str("&"),
            Self::Star => f.write_str("*"),
            Self::Minus => f.write_str("-"),
            Self::Lt => f.write_str("<"),
            Self::Le => f.write_str("<="),
            Self::Gt => f.write_str(">"),
            Self::Ge => f.write_str(">="),
            Self::Ne => f.write_str("!="),
            Self::Match => f.write_str("=~"),
            Self::NotMatch => f.write_str("!~"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Definition(name) => write!(f, "#{name}"),
            Self::Ident(name) => f.write_str(name),
            Self::Attribute(attr) => f.write_str(attr),
            Self::Comment(text) => write!(f, "// {text}"),
        }
    }
}

/// Extends an `@name(` match up to its closing parenthesis; parentheses
/// inside string literals do not count.
fn attribute(lex: &mut logos::Lexer<'_, Token>) -> Option<String> {
    let mut depth = 1;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in lex.remainder().char_indices() {
        match c {
            '\n' => return None,
            _ if escaped => escaped = false,
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    lex.bump(i + 1);
                    return Some(lex.slice().to_owned());
                }
            }
            _ => {}
        }
    }
    None
}

fn unescape(s: &str) -> Option<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            '/' => out.push('/'),
            'u' => {
                let hex: String = chars.by_ref().take(4).collect();
                out.push(char::from_u32(u32::from_str_radix(&hex, 16).ok()?)?);
            }
            _ => return None,
        }
    }
    Some(out)
}

/// Maps byte offsets to 1-based line and column numbers.
#[derive(Debug)]
pub struct SourceMap<'a> {
    file: Option<&'a str>,
    line_starts: Vec<usize>,
}

impl<'a> SourceMap<'a> {
    pub fn new(source: &str, file: Option<&'a str>) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { file, line_starts }
    }

    pub fn line(&self, offset: usize) -> usize {
        match self.line_starts.binary_search(&offset) {
            Ok(line) => line + 1,
            Err(line) => line,
        }
    }

    pub fn pos(&self, offset: usize) -> Pos {
        let line = self.line(offset);
        let column = offset - self.line_starts[line - 1] + 1;
        Pos::new(self.file, line, column)
    }
}

/// A token with the byte range it was read from.
pub type Spanned = (Token, Range<usize>);

/// Splits `source` into tokens, failing on the first unrecognized input.
pub fn tokenize(source: &str, map: &SourceMap<'_>) -> Result<Vec<Spanned>> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next() {
        let span = lexer.span();
        match token {
            Ok(token) => tokens.push((token, span)),
            Err(()) => {
                return Err(Error::malformed(
                    "",
                    format!("unexpected input {:?}", lexer.slice()),
                )
                .at(&map.pos(span.start)));
            }
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Token> {
        let map = SourceMap::new(source, None);
        tokenize(source, &map)
            .unwrap()
            .into_iter()
            .map(|(token, _)| token)
            .collect()
    }

    #[test]
    fn field_with_bounds() {
        assert_eq!(
            lex("version: int & >=1"),
            vec![
                Token::Ident("version".into()),
                Token::Colon,
                Token::Ident("int".into()),
                Token::Amp,
                Token::Ge,
                Token::Int(1),
            ]
        );
    }

    #[test]
    fn definitions_attributes_and_comments() {
        assert_eq!(
            lex("// Status of a panel\n#Status: \"ok\" | \"bad\" @cuetsy(kind=\"enum\")"),
            vec![
                Token::Comment("Status of a panel".into()),
                Token::Definition("Status".into()),
                Token::Colon,
                Token::String("ok".into()),
                Token::Pipe,
                Token::String("bad".into()),
                Token::Attribute("@cuetsy(kind=\"enum\")".into()),
            ]
        );
    }

    #[test]
    fn attribute_bodies_may_quote_parentheses() {
        let tokens = lex("#Kind: \"a\" | \"b\" @cuetsy(kind=\"enum\", memberNames=\"A(x)|B\") @go(Kind)\nnext: int");
        assert_eq!(tokens[5], Token::Attribute("@cuetsy(kind=\"enum\", memberNames=\"A(x)|B\")".into()));
        assert_eq!(tokens[6], Token::Attribute("@go(Kind)".into()));
        assert_eq!(tokens[7], Token::Ident("next".into()));

        let source = "a: int @x(\"open)";
        let map = SourceMap::new(source, None);
        assert!(tokenize(source, &map).is_err());
    }

    #[test]
    fn keywords_win_over_identifiers() {
        assert_eq!(
            lex("null nullable true [...]"),
            vec![
                Token::Null,
                Token::Ident("nullable".into()),
                Token::Bool(true),
                Token::LBracket,
                Token::Ellipsis,
                Token::RBracket,
            ]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(lex(r#""a\"b\n""#), vec![Token::String("a\"b\n".into())]);
    }

    #[test]
    fn unknown_input_reports_position() {
        let source = "a: string\nb: ^";
        let map = SourceMap::new(source, Some("x.cue"));
        let err = tokenize(source, &map).unwrap_err();
        assert_eq!(err.pos, Some(Pos::new(Some("x.cue"), 2, 4)));
    }
}
