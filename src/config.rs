use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::Deserialize;
use tracing::debug;

use crate::{abbrev::Scorer, render::DEFAULT_TEMPLATE, resolver::ServiceUrls};

/// On-disk TOML configuration. Every field is optional; missing values fall back to defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub services: Option<ServicesConfig>,
    pub journals: Option<JournalsConfig>,
    pub rename: Option<RenameConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServicesConfig {
    pub doi_org: Option<String>,
    pub crossref: Option<String>,
    pub connect_timeout_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JournalsConfig {
    /// User dictionary merged over the built-in one.
    pub custom: Option<PathBuf>,
    pub scorer: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenameConfig {
    pub template: Option<String>,
}

/// Effective settings after applying defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    pub services: ServiceUrls,
    pub connect_timeout: Duration,
    pub timeout: Duration,
    pub custom_journals: Option<PathBuf>,
    pub scorer: Scorer,
    pub template: String,
}

/// `<config_dir>/journaltk`.
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("journaltk"))
}

/// Platform config file path: `<config_dir>/journaltk/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

pub fn load_from_path(path: &Path) -> anyhow::Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read config file {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("invalid config file {}", path.display()))
}

/// Load the configuration from `explicit` if given, otherwise from the platform config file when
/// it exists.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<Settings> {
    let file = match explicit {
        Some(path) => load_from_path(path)?,
        None => match config_path().filter(|p| p.is_file()) {
            Some(path) => {
                debug!(path = %path.display(), "using platform config");
                load_from_path(&path)?
            }
            None => ConfigFile::default(),
        },
    };
    file.into_settings()
}

impl ConfigFile {
    pub fn into_settings(self) -> anyhow::Result<Settings> {
        let services = self.services.unwrap_or_default();
        let journals = self.journals.unwrap_or_default();
        let rename = self.rename.unwrap_or_default();
        let defaults = ServiceUrls::default();

        let scorer = match journals.scorer {
            Some(name) => name.parse::<Scorer>().context("invalid `journals.scorer`")?,
            None => Scorer::default(),
        };

        // An absent user dictionary is only an error when it was asked for explicitly.
        let custom_journals = journals.custom.or_else(|| {
            config_dir()
                .map(|d| d.join("custom_journals.json"))
                .filter(|p| p.is_file())
        });

        Ok(Settings {
            services: ServiceUrls {
                doi_org: services.doi_org.unwrap_or(defaults.doi_org),
                crossref: services.crossref.unwrap_or(defaults.crossref),
            },
            connect_timeout: Duration::from_secs(services.connect_timeout_secs.unwrap_or(5)),
            timeout: Duration::from_secs(services.timeout_secs.unwrap_or(20)),
            custom_journals,
            scorer,
            template: rename
                .template
                .unwrap_or_else(|| DEFAULT_TEMPLATE.to_string()),
        })
    }
}
