use std::fmt;

/// A position inside a schema source document. Lines and columns are 1-based.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Pos {
    pub file: Option<String>,
    pub line: usize,
    pub column: usize,
}

impl Pos {
    pub fn new(file: Option<&str>, line: usize, column: usize) -> Self {
        Self {
            file: file.map(str::to_owned),
            line,
            column,
        }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{file}:{}:{}", self.line, self.column),
            None => write!(f, "{}:{}", self.line, self.column),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SchemaErrorKind {
    /// The front end cannot interpret the source.
    Malformed,
    /// The source uses a construct no target can represent.
    Unsupported,
}

impl fmt::Display for SchemaErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => f.write_str("schema-malformed"),
            Self::Unsupported => f.write_str("schema-unsupported"),
        }
    }
}

/// Error raised by a front end (or by the loader feeding it).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Error {
    pub kind: SchemaErrorKind,
    pub pos: Option<Pos>,
    /// Type name or field path under consideration, e.g. `Dashboard.panels`.
    pub path: String,
    pub message: String,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn malformed(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: SchemaErrorKind::Malformed,
            pos: None,
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn unsupported(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: SchemaErrorKind::Unsupported,
            pos: None,
            path: path.into(),
            message: message.into(),
        }
    }

    /// Attaches a source position unless one is already known.
    pub fn at(mut self, pos: &Pos) -> Self {
        if self.pos.is_none() {
            self.pos = Some(pos.clone());
        }
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(pos) = &self.pos {
            write!(f, "{pos}: ")?;
        }
        write!(f, "{}", self.kind)?;
        if !self.path.is_empty() {
            write!(f, ": {}", self.path)?;
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for Error {}
