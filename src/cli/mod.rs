//! The `ramlkit` command-line interface.
//!
//! Exit codes: 0 when everything checked is valid, 1 when problems were
//! found, 2 when a command could not run at all.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::Parser;
use termcolor::ColorChoice;
use tracing::debug;
use walkdir::WalkDir;

use crate::builder::RamlBuilder;
use crate::cli::args::{ColorArg, Command, Format, RamlkitArgs};
use crate::cli::output::FileReport;
use crate::config::Settings;
use crate::error::{RamlError, SourceContext, ValidationResult};
use crate::loader::FileResourceLoader;
use crate::suggest::Suggester;

pub mod args;
pub mod output;

pub fn run() {
    let args = RamlkitArgs::parse();
    match dispatch(args) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            output::print_fatal(e);
            process::exit(2);
        }
    }
}

/// Runs one command; `Ok(false)` means it found problems.
fn dispatch(args: RamlkitArgs) -> Result<bool, RamlError> {
    let settings = Settings::load(args.config.as_deref())?;
    let color = match args.color {
        Some(ColorArg::Auto) => ColorChoice::Auto,
        Some(ColorArg::Always) => ColorChoice::Always,
        Some(ColorArg::Never) => ColorChoice::Never,
        None => settings.color.choice(),
    };
    let builder = RamlBuilder::from_settings(&settings)?;

    match args.command {
        Command::Validate { paths, format } => handle_validate(&builder, &paths, format, color),
        Command::Suggest {
            file,
            offset,
            format,
        } => handle_suggest(&settings, &file, offset, format, color),
        Command::Tree {
            file,
            phase,
            format,
        } => {
            let builder = match phase {
                Some(phase) => builder.with_max_phase(phase),
                None => builder,
            };
            handle_tree(&builder, &file, format)
        }
        Command::Payload {
            file,
            type_selector,
            payload,
            format,
        } => handle_payload(&builder, &file, &type_selector, &payload, format, color),
    }
}

// ============================================================================
// COMMANDS
// ============================================================================

fn handle_validate(
    builder: &RamlBuilder,
    paths: &[PathBuf],
    format: Format,
    color: ColorChoice,
) -> Result<bool, RamlError> {
    let files = collect_raml_files(paths)?;
    let mut all_valid = true;
    let mut results: Vec<(String, Vec<ValidationResult>)> = Vec::new();
    for file in &files {
        let name = file.display().to_string();
        let document = match builder.build_file(file) {
            Ok(document) => document,
            Err(e) => {
                all_valid = false;
                output::print_fatal(e);
                continue;
            }
        };
        let problems = document.errors();
        all_valid &= problems.is_empty();
        if format == Format::Text {
            output::print_problems(&document.source_context(), &problems);
            output::print_status(color, &name, problems.len());
        }
        results.push((name, problems));
    }

    let reports: Vec<FileReport> = results
        .iter()
        .map(|(file, problems)| FileReport {
            file: file.clone(),
            valid: problems.is_empty(),
            problems,
        })
        .collect();
    match format {
        Format::Text => {}
        Format::Json => output::print_json(&reports)?,
        Format::Yaml => output::print_yaml(&reports)?,
    }
    Ok(all_valid)
}

fn handle_suggest(
    settings: &Settings,
    file: &Path,
    offset: Option<usize>,
    format: Format,
    color: ColorChoice,
) -> Result<bool, RamlError> {
    let text = read(file)?;
    let cursor = offset.unwrap_or(text.len()).min(text.len());
    let loader = FileResourceLoader::with_roots(settings.include_roots.iter().cloned());
    let suggester = Suggester::raml10()?.with_loader(Arc::new(loader), &location_of(file));
    let suggestions = suggester.suggestions(&text, cursor);
    debug!(count = suggestions.len(), cursor, "suggestions ready");
    match format {
        Format::Text => output::print_suggestions(color, &suggestions),
        Format::Json => output::print_json(&suggestions)?,
        Format::Yaml => output::print_yaml(&suggestions)?,
    }
    Ok(true)
}

fn handle_tree(builder: &RamlBuilder, file: &Path, format: Format) -> Result<bool, RamlError> {
    let document = builder.build_file(file)?;
    match format {
        Format::Json => output::print_json(&document.to_json())?,
        Format::Text | Format::Yaml => output::print_yaml(&document.to_json())?,
    }
    let problems = document.errors();
    output::print_problems(&document.source_context(), &problems);
    Ok(problems.is_empty())
}

fn handle_payload(
    builder: &RamlBuilder,
    file: &Path,
    type_selector: &str,
    payload: &Path,
    format: Format,
    color: ColorChoice,
) -> Result<bool, RamlError> {
    let document = builder.build_file(file)?;
    if !document.is_valid() {
        let problems = document.errors();
        output::print_problems(&document.source_context(), &problems);
        output::print_status(color, &file.display().to_string(), problems.len());
        return Ok(false);
    }
    let text = read(payload)?;
    let name = payload.display().to_string();
    let problems = document.validate_payload(type_selector, &text);
    match format {
        Format::Text => {
            output::print_problems(&SourceContext::new(name.clone(), text), &problems);
            output::print_status(color, &name, problems.len());
        }
        Format::Json | Format::Yaml => {
            let report = FileReport {
                file: name,
                valid: problems.is_empty(),
                problems: &problems,
            };
            if format == Format::Json {
                output::print_json(&report)?;
            } else {
                output::print_yaml(&report)?;
            }
        }
    }
    Ok(problems.is_empty())
}

// ============================================================================
// HELPERS
// ============================================================================

/// Files as given, plus every `.raml` file below the given directories.
fn collect_raml_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>, RamlError> {
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }
        for entry in WalkDir::new(path).sort_by_file_name() {
            let entry = entry.map_err(|e| RamlError::Io {
                path: path.display().to_string(),
                source: e.into(),
            })?;
            let is_raml = entry.path().extension().is_some_and(|ext| ext == "raml");
            if entry.file_type().is_file() && is_raml {
                files.push(entry.into_path());
            }
        }
    }
    Ok(files)
}

fn read(path: &Path) -> Result<String, RamlError> {
    fs::read_to_string(path).map_err(|source| RamlError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn location_of(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
