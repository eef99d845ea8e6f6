use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "ghfetch.yml";

/// Bundled template written on first run.
pub const TEMPLATE: &str = include_str!("../ghfetch.template.yml");

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Parsed `ghfetch.yml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub github_token: String,
    /// Repository shared by downloads that do not name their own.
    #[serde(default)]
    pub github_repo: Option<String>,
    #[serde(default = "default_api_url")]
    pub github_api_url: String,
    #[serde(default)]
    pub downloads: Vec<DownloadSpec>,
    #[serde(default)]
    pub quiet: bool,
    #[serde(default = "default_marker_dir")]
    pub marker_dir: PathBuf,
}

/// One configured rule: which asset to fetch, where to put it, what to run.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadSpec {
    #[serde(default)]
    pub github_repo: Option<String>,
    pub file_regex: FilePattern,
    pub copy_file_at: String,
    #[serde(default)]
    pub on_download_finish: Option<String>,
    #[serde(default)]
    pub on_download_finish_args: Vec<String>,
}

/// An asset name pattern that only matches whole names.
#[derive(Clone)]
pub struct FilePattern {
    source: String,
    anchored: Regex,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_owned()
}

fn default_marker_dir() -> PathBuf {
    PathBuf::from(".")
}

impl DownloadSpec {
    /// The download's own `githubRepo`, trimmed; `None` when absent or blank.
    pub fn own_repo(&self) -> Option<&str> {
        self.github_repo.as_deref().map(str::trim).filter(|r| !r.is_empty())
    }
}

impl FilePattern {
    /// Compile `pattern` so it only ever matches a whole asset name.
    pub fn new(pattern: &str) -> Result<Self> {
        let anchored = Regex::new(&format!("^(?:{pattern})$")).map_err(|source| {
            Error::InvalidPattern {
                pattern: pattern.to_owned(),
                source,
            }
        })?;
        Ok(Self {
            source: pattern.to_owned(),
            anchored,
        })
    }

    /// The pattern as written in the configuration.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Captures of `name` when the pattern matches all of it.
    pub fn full_match<'h>(&self, name: &'h str) -> Option<regex::Captures<'h>> {
        self.anchored.captures(name)
    }
}

impl fmt::Debug for FilePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FilePattern").field(&self.source).finish()
    }
}

impl fmt::Display for FilePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for FilePattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        FilePattern::new(&raw).map_err(serde::de::Error::custom)
    }
}

impl Config {
    /// Read and validate the configuration at `path`.
    ///
    /// A missing file is reported as [`Error::ConfigMissing`] so the caller
    /// can write the template instead of failing.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::ConfigMissing(path.to_owned()))
            }
            Err(source) => {
                return Err(Error::ConfigRead {
                    path: path.to_owned(),
                    source,
                })
            }
        };
        Self::from_yaml(&raw, path)
    }

    /// Parse configuration text. `origin` is only used in error messages.
    pub fn from_yaml(raw: &str, origin: &Path) -> Result<Self> {
        let config: Config = serde_yaml::from_str(raw).map_err(|source| Error::ConfigParse {
            path: origin.to_owned(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (index, spec) in self.downloads.iter().enumerate() {
            match self.repo_for(spec) {
                Some(repo) if repo.split('/').filter(|p| !p.is_empty()).count() == 2 => {}
                Some(repo) => {
                    return Err(Error::ConfigInvalid(format!(
                        "download #{} (`{}`): repository `{repo}` is not in owner/name form",
                        index + 1,
                        spec.file_regex
                    )))
                }
                None => {
                    return Err(Error::ConfigInvalid(format!(
                        "download #{} (`{}`) has no githubRepo and no global githubRepo is set",
                        index + 1,
                        spec.file_regex
                    )))
                }
            }
        }
        if self.downloads.is_empty() {
            log::warn!("no downloads configured, nothing to do");
        }
        Ok(())
    }

    /// Repository a download reads from: its own, else the global one.
    pub fn repo_for<'a>(&'a self, spec: &'a DownloadSpec) -> Option<&'a str> {
        spec.own_repo()
            .or_else(|| self.github_repo.as_deref().map(str::trim).filter(|r| !r.is_empty()))
    }

    /// Whether any download falls back to the global `githubRepo`.
    pub fn uses_global_repo(&self) -> bool {
        self.downloads.iter().any(|spec| spec.own_repo().is_none())
    }

    /// `None` means anonymous API access.
    pub fn token(&self) -> Option<&str> {
        Some(self.github_token.trim()).filter(|t| !t.is_empty())
    }
}

/// Load `path`, or write the template there and return `None` when it does
/// not exist yet.
pub fn load_or_bootstrap(path: &Path) -> Result<Option<Config>> {
    match Config::load(path) {
        Ok(config) => Ok(Some(config)),
        Err(Error::ConfigMissing(_)) => {
            write_template(path)?;
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Write the bundled template to `path`, creating parent directories.
pub fn write_template(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    std::fs::write(path, TEMPLATE).map_err(|e| Error::io(path, e))
}
