use sg_schema::File;
use tracing::{debug, trace};

use crate::error::Error;
use crate::fs::VirtualFs;
use crate::generators::Emitter;
use crate::postprocess::PostProcessor;
use crate::preprocess::preprocess;

/// An ordered chain of emitters and post-processors.
///
/// ```no_run
/// # use sg_generator::{Pipeline, Generator, postprocess::Prefixer};
/// # let files: Vec<sg_schema::File> = vec![];
/// let vfs = Pipeline::new()
///     .emitters(Generator::Go.emitters())
///     .post_processors(Generator::Go.post_processors())
///     .post_processor(Prefixer::new("dashboard"))
///     .run(&files)?;
/// vfs.commit("gen")?;
/// # Ok::<(), sg_generator::Error>(())
/// ```
#[derive(Default)]
pub struct Pipeline {
    emitters: Vec<Box<dyn Emitter>>,
    post_processors: Vec<Box<dyn PostProcessor>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emitter(mut self, emitter: impl Emitter + 'static) -> Self {
        self.emitters.push(Box::new(emitter));
        self
    }

    pub fn emitters(mut self, emitters: impl IntoIterator<Item = Box<dyn Emitter>>) -> Self {
        self.emitters.extend(emitters);
        self
    }

    pub fn post_processor(mut self, processor: impl PostProcessor + 'static) -> Self {
        self.post_processors.push(Box::new(processor));
        self
    }

    pub fn post_processors(mut self, processors: impl IntoIterator<Item = Box<dyn PostProcessor>>) -> Self {
        self.post_processors.extend(processors);
        self
    }

    /// Generates every file for every input, or the first error.
    ///
    /// Inputs are validated and flattened on a private copy; nothing is
    /// written to disk until [`VirtualFs::commit`].
    pub fn run(&self, files: &[File]) -> Result<VirtualFs, Error> {
        let mut vfs = VirtualFs::new();
        for file in files {
            file.validate()?;
            let mut file = file.clone();
            preprocess(&mut file)?;
            file.validate()?;
            trace!(package = %file.package, types = file.types.len(), "preprocessed");

            for emitter in &self.emitters {
                let mut generated = emitter.generate(&file).map_err(|source| Error::Emit {
                    emitter: emitter.name().to_owned(),
                    source,
                })?;
                debug!(emitter = emitter.name(), path = %generated.path.display(), "generated file");

                for processor in &self.post_processors {
                    let path = generated.path.clone();
                    generated = processor.process(generated).map_err(|message| Error::PostProcess {
                        processor: processor.name().to_owned(),
                        path,
                        message,
                    })?;
                }
                vfs.add(generated)?;
            }
        }
        Ok(vfs)
    }
}
