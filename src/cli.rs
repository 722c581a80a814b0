use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, ValueEnum};
use sg_generator::Generator;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// CUE-style definitions
    Cue,
    /// A draft-7 JSON Schema document
    Jsonschema,
    /// A kind declaration with a lineage of schemas
    Kind,
}

#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    #[arg(help = "The source file or URL")]
    pub input: String,

    #[arg(long, value_enum, help = "Source format [default: inferred from the extension]")]
    pub format: Option<Format>,

    #[arg(long, help = "Package to generate into [default: the input's file stem]")]
    pub package: Option<String>,

    #[arg(long = "target", value_enum, help = "Target language, may be repeated [default: all]")]
    pub targets: Vec<Generator>,

    #[arg(long, short, default_value = "gen", help = "Directory the files are written to")]
    pub output: PathBuf,

    #[arg(long, help = "Write into <output>/<package>/")]
    pub prefix: bool,

    #[arg(long, help = "Print the generated files instead of writing them")]
    pub dry_run: bool,

    #[arg(short, long, action = ArgAction::Count, help = "More logging, may be repeated")]
    pub verbose: u8,
}

impl Cli {
    pub fn is_url(&self) -> bool {
        self.input.starts_with("http://") || self.input.starts_with("https://")
    }

    fn input_path(&self) -> &Path {
        let input = self.input.split(['?', '#']).next().unwrap_or_default();
        Path::new(input)
    }

    pub fn format(&self) -> Format {
        self.format.unwrap_or_else(|| {
            match self.input_path().extension().and_then(|e| e.to_str()) {
                Some("json") => Format::Jsonschema,
                _ => Format::Cue,
            }
        })
    }

    pub fn package(&self) -> String {
        self.package.clone().unwrap_or_else(|| {
            self.input_path()
                .file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s.replace(|c: char| !c.is_ascii_alphanumeric(), "_").to_lowercase())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "schema".to_owned())
        })
    }

    pub fn targets(&self) -> Vec<Generator> {
        if self.targets.is_empty() {
            Generator::value_variants().to_vec()
        } else {
            let mut targets = Vec::with_capacity(self.targets.len());
            for target in &self.targets {
                if !targets.contains(target) {
                    targets.push(*target);
                }
            }
            targets
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_come_from_the_input() {
        let cli = Cli::parse_from(["schemagen", "schemas/time-series.json"]);
        assert_eq!(cli.format(), Format::Jsonschema);
        assert_eq!(cli.package(), "time_series");
        assert_eq!(cli.output, PathBuf::from("gen"));
        assert_eq!(cli.targets().len(), Generator::value_variants().len());

        let cli = Cli::parse_from(["schemagen", "https://example.com/dashboard.cue?raw=1"]);
        assert!(cli.is_url());
        assert_eq!(cli.format(), Format::Cue);
        assert_eq!(cli.package(), "dashboard");
    }

    #[test]
    fn explicit_flags_win() {
        let cli = Cli::parse_from([
            "schemagen",
            "playlist.cue",
            "--format",
            "kind",
            "--package",
            "playlists",
            "--target",
            "typescript",
            "-vv",
            "--dry-run",
        ]);
        assert_eq!(cli.format(), Format::Kind);
        assert_eq!(cli.package(), "playlists");
        assert_eq!(cli.targets(), [Generator::Typescript]);
        assert_eq!(cli.verbose, 2);
        assert!(cli.dry_run);
    }

    #[test]
    #[cfg(feature = "generator-rust")]
    fn repeated_targets_are_kept_once() {
        let cli = Cli::parse_from([
            "schemagen",
            "dashboard.cue",
            "--target",
            "go",
            "--target",
            "rust",
            "--target",
            "go",
        ]);
        assert_eq!(cli.targets(), [Generator::Go, Generator::Rust]);
    }
}
