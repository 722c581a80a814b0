//! Target-language code generation from [`sg_schema`] ASTs.
//!
//! A run flattens disjunctions ([`preprocess`]), renders each file with every
//! configured [`Emitter`], rewrites the results with [`PostProcessor`]s and
//! collects them in a [`VirtualFs`] that can be committed to disk atomically.

pub mod error;
pub mod fs;
pub mod generators;
pub mod naming;
pub mod pipeline;
pub mod postprocess;
pub mod preprocess;

pub use error::{EmitError, Error, ErrorKind};
pub use fs::{GeneratedFile, VirtualFs};
pub use generators::{Emitter, Generator};
pub use pipeline::Pipeline;
pub use postprocess::PostProcessor;
pub use preprocess::preprocess;
