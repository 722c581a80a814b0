//! Language-neutral schema AST and the front ends that produce it.
//!
//! Every front end owns the knowledge of one source grammar and emits a pure
//! [`File`]:
//!
//! - [`cue`]: CUE-style schemas, loaded with [`cue::load`] and translated with
//!   [`cue::generate_ast`]
//! - [`kindsys`]: the same language wrapped in a kind-system envelope
//! - [`jsonschema`]: draft-7 JSON Schema documents

pub mod ast;
pub mod cue;
pub mod error;
pub mod jsonschema;
pub mod kindsys;

pub use ast::{
    ConstraintOp, Definition, EnumValue, Field, File, InvariantViolation, Scalar, TypeConstraint,
    TypeId,
};
pub use error::{Error, Pos, Result, SchemaErrorKind};

/// Settings shared by all front ends.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    /// Package name used to generate code into.
    pub package: String,
}

impl Config {
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
        }
    }
}
