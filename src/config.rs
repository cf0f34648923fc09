//! `ramlkit.toml` settings.
//!
//! Discovery order:
//! 1. `--config <path>`
//! 2. the `RAMLKIT_CONFIG` environment variable
//! 3. `./ramlkit.toml`
//!
//! Without any of them the defaults apply.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use termcolor::ColorChoice;

use crate::error::ConfigError;
use crate::phase::pipeline::LAST_PHASE;
use crate::syntax::Fragment;

pub const CONFIG_ENV: &str = "RAMLKIT_CONFIG";
pub const CONFIG_FILE: &str = "ramlkit.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Settings {
    /// Last build phase to run, 1 to 7.
    pub max_phase: usize,
    /// Directories tried, in order, for relative includes.
    pub include_roots: Vec<PathBuf>,
    /// Builds every document as this fragment instead of the one its
    /// header names.
    pub fragment: Option<String>,
    pub color: ColorSetting,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_phase: LAST_PHASE,
            include_roots: Vec::new(),
            fragment: None,
            color: ColorSetting::Auto,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSetting {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorSetting {
    pub fn choice(self) -> ColorChoice {
        match self {
            ColorSetting::Auto => ColorChoice::Auto,
            ColorSetting::Always => ColorChoice::Always,
            ColorSetting::Never => ColorChoice::Never,
        }
    }
}

impl Settings {
    pub fn load(explicit: Option<&Path>) -> Result<Settings, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV).map(PathBuf::from) {
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return Self::load_from(&local);
        }
        Ok(Settings::default())
    }

    pub fn load_from(path: &Path) -> Result<Settings, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text, &path.display().to_string())
    }

    /// Parses and checks settings; `origin` names the text in errors.
    pub fn parse(text: &str, origin: &str) -> Result<Settings, ConfigError> {
        let settings: Settings = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })?;
        if !(1..=LAST_PHASE).contains(&settings.max_phase) {
            return Err(ConfigError::Invalid {
                key: "max-phase".to_string(),
                message: format!("must be between 1 and {}", LAST_PHASE),
            });
        }
        settings.fragment()?;
        Ok(settings)
    }

    pub fn fragment(&self) -> Result<Option<Fragment>, ConfigError> {
        self.fragment
            .as_deref()
            .map(|name| {
                name.parse().map_err(|e: crate::syntax::HeaderError| ConfigError::Invalid {
                    key: "fragment".to_string(),
                    message: e.to_string(),
                })
            })
            .transpose()
    }
}
