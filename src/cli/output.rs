//! Everything the CLI prints.
//!
//! Problems go to stderr as miette diagnostics, results go to stdout either
//! as colored text or as JSON/YAML for tools.

use std::io::Write;

use miette::Report;
use serde::Serialize;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::error::{RamlError, SourceContext, ValidationResult};
use crate::suggest::Suggestion;

// ============================================================================
// DIAGNOSTICS
// ============================================================================

/// Renders every result against `source` on stderr.
pub fn print_problems(source: &SourceContext, results: &[ValidationResult]) {
    for result in results {
        eprintln!("{:?}", Report::new(result.to_report(source)));
    }
}

pub fn print_fatal(error: RamlError) {
    eprintln!("{:?}", Report::new(error));
}

// ============================================================================
// TEXT
// ============================================================================

pub fn print_status(color: ColorChoice, name: &str, problems: usize) {
    let mut stdout = StandardStream::stdout(color);
    let (tint, tag) = match problems {
        0 => (Color::Green, "PASS"),
        _ => (Color::Red, "FAIL"),
    };
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(tint)).set_bold(true));
    let _ = write!(stdout, "{}", tag);
    let _ = stdout.reset();
    match problems {
        0 => {
            let _ = writeln!(stdout, " {}", name);
        }
        n => {
            let _ = writeln!(stdout, " {} ({} problems)", name, n);
        }
    }
}

pub fn print_suggestions(color: ColorChoice, suggestions: &[Suggestion]) {
    let mut stdout = StandardStream::stdout(color);
    let width = suggestions.iter().map(|s| s.label.len()).max().unwrap_or(0);
    for suggestion in suggestions {
        let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)).set_bold(true));
        let _ = write!(stdout, "{:width$}", suggestion.label, width = width);
        let _ = stdout.reset();
        let _ = writeln!(stdout, "  {}", suggestion.description);
    }
}

// ============================================================================
// MACHINE READABLE
// ============================================================================

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), RamlError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| RamlError::Document {
        message: format!("cannot render JSON: {}", e),
    })?;
    println!("{}", text);
    Ok(())
}

pub fn print_yaml<T: Serialize + ?Sized>(value: &T) -> Result<(), RamlError> {
    let text = serde_yaml::to_string(value).map_err(|e| RamlError::Document {
        message: format!("cannot render YAML: {}", e),
    })?;
    print!("{}", text);
    Ok(())
}

/// One file's problems in the JSON report of `validate`.
#[derive(Debug, Serialize)]
pub struct FileReport<'a> {
    pub file: String,
    pub valid: bool,
    pub problems: &'a [ValidationResult],
}
