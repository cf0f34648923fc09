//! Command-line arguments and subcommands of the `ramlkit` binary.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "ramlkit",
    version,
    about = "Validate, inspect and autocomplete RAML 1.0 API descriptions."
)]
pub struct RamlkitArgs {
    /// Settings file; defaults to $RAMLKIT_CONFIG, then ./ramlkit.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Overrides the color setting of the settings file.
    #[arg(long, global = true, value_enum)]
    pub color: Option<ColorArg>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build documents and report every problem found.
    Validate {
        /// RAML files, or directories searched for `.raml` files.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// List completions at a byte offset of a document.
    Suggest {
        /// The document being edited.
        #[arg(required = true)]
        file: PathBuf,
        /// Cursor position; the end of the file when omitted.
        #[arg(long)]
        offset: Option<usize>,
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// Print the tree a build produces.
    Tree {
        #[arg(required = true)]
        file: PathBuf,
        /// Last phase to run, 1 to 7.
        #[arg(long)]
        phase: Option<usize>,
        /// `text` prints YAML.
        #[arg(long, value_enum, default_value_t = Format::Yaml)]
        format: Format,
    },
    /// Check a JSON or YAML payload against a declared type.
    Payload {
        /// The API or library declaring the type.
        #[arg(required = true)]
        file: PathBuf,
        /// Selector of the type declaration, e.g. `/types/User`.
        #[arg(long = "type")]
        type_selector: String,
        /// File holding the payload.
        #[arg(long)]
        payload: PathBuf,
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
    Yaml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorArg {
    Auto,
    Always,
    Never,
}
