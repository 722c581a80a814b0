mod cli;

use std::io::Write;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Format};
use sg_generator::postprocess::Prefixer;
use sg_generator::{Pipeline, VirtualFs};
use sg_schema::{cue, jsonschema, kindsys, Config, File};

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn read_input(cli: &Cli) -> Result<Vec<u8>> {
    if cli.is_url() {
        debug!(url = %cli.input, "fetching schema");
        let response = reqwest::blocking::get(&cli.input)
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("failed to fetch {}", cli.input))?;
        let bytes = response
            .bytes()
            .with_context(|| format!("failed to read the response from {}", cli.input))?;
        Ok(bytes.to_vec())
    } else {
        std::fs::read(&cli.input).with_context(|| format!("failed to read {}", cli.input))
    }
}

fn load(cli: &Cli, config: &Config) -> Result<File> {
    let source = read_input(cli)?;
    let file = match cli.format() {
        Format::Jsonschema => jsonschema::generate_ast(&source, config)?,
        format => {
            let source = String::from_utf8(source).context("the schema is not valid UTF-8")?;
            let instance = cue::load(&source, Some(&cli.input))?;
            if format == Format::Kind {
                let (kind, file) = kindsys::generate_ast(&instance.root, config)?;
                info!(kind = %kind.name, maturity = ?kind.maturity, "loaded kind");
                file
            } else {
                cue::generate_ast(&instance.root, config)?
            }
        }
    };
    info!(package = %file.package, types = file.types.len(), "translated schema");
    Ok(file)
}

fn print(vfs: &VirtualFs) -> Result<()> {
    let mut out = std::io::stdout().lock();
    for file in vfs {
        writeln!(out, "// ===== {} ({}) =====", file.path.display(), file.from)?;
        out.write_all(&file.data)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let package = cli.package();
    let config = Config::new(&package);
    let file = load(&cli, &config)?;

    let targets = cli.targets();
    if targets.is_empty() {
        bail!("no target language enabled");
    }
    let mut pipeline = Pipeline::new();
    for target in &targets {
        pipeline = pipeline
            .emitters(target.emitters())
            .post_processors(target.post_processors());
    }
    if cli.prefix {
        pipeline = pipeline.post_processor(Prefixer::new(&package));
    }

    let vfs = pipeline.run(&[file])?;
    if cli.dry_run {
        return print(&vfs);
    }
    vfs.commit(&cli.output)
        .with_context(|| format!("failed to write into {}", cli.output.display()))?;
    info!(files = vfs.len(), output = %cli.output.display(), "done");
    Ok(())
}
