use std::fmt;
use std::io;
use std::path::PathBuf;

use sg_schema::{InvariantViolation, SchemaErrorKind};
use thiserror::Error;

/// Raised by an emitter that meets an AST node it cannot render.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{type_name}: {message}")]
pub struct EmitError {
    pub type_name: String,
    pub message: String,
}

impl EmitError {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] sg_schema::Error),

    #[error("emit-internal: {0}")]
    Invariant(#[from] InvariantViolation),

    #[error("preprocess-collision: {type_name}: {message}")]
    PreprocessCollision { type_name: String, message: String },

    #[error("emit-internal: {emitter}: {source}")]
    Emit {
        emitter: String,
        #[source]
        source: EmitError,
    },

    #[error("postprocess-failure: {processor}: {}: {message}", path.display())]
    PostProcess {
        processor: String,
        path: PathBuf,
        message: String,
    },

    #[error("emit-internal: {}: generated by both {first} and {second}", path.display())]
    DuplicatePath {
        path: PathBuf,
        first: String,
        second: String,
    },

    #[error("commit-io: {}: {source}", path.display())]
    Commit {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("commit-io: {}: {source}; could not restore {}", path.display(), list_unrestored(unrestored))]
    Rollback {
        path: PathBuf,
        #[source]
        source: io::Error,
        unrestored: Vec<(PathBuf, io::Error)>,
    },
}

fn list_unrestored(unrestored: &[(PathBuf, io::Error)]) -> String {
    unrestored
        .iter()
        .map(|(path, err)| format!("{} ({err})", path.display()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// The failure categories a run can end with.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    SchemaMalformed,
    SchemaUnsupported,
    PreprocessCollision,
    EmitInternal,
    PostprocessFailure,
    CommitIo,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SchemaMalformed => "schema-malformed",
            Self::SchemaUnsupported => "schema-unsupported",
            Self::PreprocessCollision => "preprocess-collision",
            Self::EmitInternal => "emit-internal",
            Self::PostprocessFailure => "postprocess-failure",
            Self::CommitIo => "commit-io",
        })
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Schema(e) => match e.kind {
                SchemaErrorKind::Malformed => ErrorKind::SchemaMalformed,
                SchemaErrorKind::Unsupported => ErrorKind::SchemaUnsupported,
            },
            Self::PreprocessCollision { .. } => ErrorKind::PreprocessCollision,
            Self::Invariant(_) | Self::Emit { .. } | Self::DuplicatePath { .. } => ErrorKind::EmitInternal,
            Self::PostProcess { .. } => ErrorKind::PostprocessFailure,
            Self::Commit { .. } | Self::Rollback { .. } => ErrorKind::CommitIo,
        }
    }

    pub(crate) fn commit(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Commit { path, source }
    }
}
