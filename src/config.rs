//! Settings file support.
//!
//! An optional TOML file supplies defaults; command line flags win over it.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::captions::{DEFAULT_LANGUAGES, DEFAULT_USER_AGENT, parse_languages};
use crate::discovery::DEFAULT_YT_DLP;
use crate::package::DEFAULT_ARCHIVE_NAME;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Config file format. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Comma separated list or array of language codes
    pub languages: Option<Languages>,
    /// Directory the `.srt` or `.zip` is written to
    pub output_dir: Option<PathBuf>,
    /// File name used when several documents are zipped
    pub archive_name: Option<String>,
    /// Path to the yt-dlp executable
    pub yt_dlp: Option<String>,
    /// User agent for caption requests
    pub user_agent: Option<String>,
    /// Pause between caption requests, in milliseconds
    pub request_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Languages {
    List(Vec<String>),
    Csv(String),
}

impl Languages {
    fn into_vec(self) -> Vec<String> {
        match self {
            Languages::List(list) => list
                .into_iter()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect(),
            Languages::Csv(csv) => parse_languages(&csv),
        }
    }
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&data)
    }

    pub fn parse(data: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(data)?)
    }
}

/// Values given on the command line, all optional.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub languages: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub archive_name: Option<String>,
    pub yt_dlp: Option<String>,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub languages: Vec<String>,
    pub output_dir: PathBuf,
    pub archive_name: String,
    pub yt_dlp: String,
    pub user_agent: String,
    pub request_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            languages: parse_languages(DEFAULT_LANGUAGES),
            output_dir: PathBuf::from("."),
            archive_name: DEFAULT_ARCHIVE_NAME.to_string(),
            yt_dlp: DEFAULT_YT_DLP.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_delay_ms: 0,
        }
    }
}

impl Config {
    /// Defaults, then the file, then the command line.
    pub fn resolve(file: ConfigFile, cli: Overrides) -> Self {
        let defaults = Config::default();

        let languages = match cli.languages {
            Some(csv) => parse_languages(&csv),
            None => file
                .languages
                .map(Languages::into_vec)
                .unwrap_or(defaults.languages),
        };

        Config {
            languages,
            output_dir: cli
                .output_dir
                .or(file.output_dir)
                .unwrap_or(defaults.output_dir),
            archive_name: cli
                .archive_name
                .or(file.archive_name)
                .unwrap_or(defaults.archive_name),
            yt_dlp: cli.yt_dlp.or(file.yt_dlp).unwrap_or(defaults.yt_dlp),
            user_agent: file.user_agent.unwrap_or(defaults.user_agent),
            request_delay_ms: file.request_delay_ms.unwrap_or(defaults.request_delay_ms),
        }
    }
}
