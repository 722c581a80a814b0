mod common;

#[cfg(feature = "generator-go")]
mod go;
#[cfg(feature = "generator-rust")]
mod rust;
#[cfg(feature = "generator-typescript")]
mod typescript;

#[cfg(not(any(
    feature = "generator-go",
    feature = "generator-rust",
    feature = "generator-typescript"
)))]
compile_error!("At least one generator must be enabled");

use clap::ValueEnum;
use sg_schema::File;

use crate::error::EmitError;
use crate::fs::GeneratedFile;
use crate::postprocess::PostProcessor;

#[cfg(feature = "generator-go")]
pub use go::{GoBuilder, GoRawTypes};
#[cfg(feature = "generator-rust")]
pub use rust::{RustBuilder, RustRawTypes};
#[cfg(feature = "generator-typescript")]
pub use typescript::TypescriptRawTypes;

/// Renders a preprocessed [`File`] as one target-language source file.
///
/// Emitters are stateless: the same input always yields the same bytes, and
/// no emitter sees another emitter's output.
pub trait Emitter {
    fn name(&self) -> &str;
    fn generate(&self, file: &File) -> Result<GeneratedFile, EmitError>;
}

impl<E: Emitter + ?Sized> Emitter for Box<E> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn generate(&self, file: &File) -> Result<GeneratedFile, EmitError> {
        (**self).generate(file)
    }
}

/// A target language, selecting its emitters and the post-processors its
/// output needs.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Generator {
    #[cfg(feature = "generator-go")]
    Go,
    #[cfg(feature = "generator-typescript")]
    Typescript,
    #[cfg(feature = "generator-rust")]
    Rust,
}

impl Generator {
    pub fn emitters(&self) -> Vec<Box<dyn Emitter>> {
        match *self {
            #[cfg(feature = "generator-go")]
            Self::Go => vec![Box::new(GoRawTypes), Box::new(GoBuilder)],
            #[cfg(feature = "generator-typescript")]
            Self::Typescript => vec![Box::new(TypescriptRawTypes)],
            #[cfg(feature = "generator-rust")]
            Self::Rust => vec![Box::new(RustRawTypes), Box::new(RustBuilder)],
        }
    }

    pub fn post_processors(&self) -> Vec<Box<dyn PostProcessor>> {
        match *self {
            #[cfg(feature = "generator-go")]
            Self::Go => vec![Box::new(crate::postprocess::GoImports)],
            #[cfg(feature = "generator-typescript")]
            Self::Typescript => vec![],
            #[cfg(feature = "generator-rust")]
            Self::Rust => vec![Box::new(crate::postprocess::RustFormat)],
        }
    }
}
