use std::path::PathBuf;

use reqwest::StatusCode;

/// Everything that can go wrong while fetching release assets.
///
/// Only configuration failures and a missing release in single-repository
/// mode abort a whole run; the other variants are scoped to one download.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No configuration file exists yet. The caller writes the template.
    #[error("configuration file {0} not found")]
    ConfigMissing(PathBuf),

    #[error("failed to read configuration {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("invalid file pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("no published release found for {repo}")]
    NoReleaseFound { repo: String },

    #[error("no asset of {repo} matches `{pattern}`")]
    NoAssetFound { repo: String, pattern: String },

    #[error("invalid group reference `{reference}` in `{template}` ({available} groups available)")]
    InvalidGroupReference {
        template: String,
        reference: String,
        available: usize,
    },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned {status}: {body}")]
    HttpStatus {
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("{url} redirected more than once")]
    TooManyRedirects { url: String },

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("download task aborted: {0}")]
    TaskAborted(String),

    #[error("failed to launch `{program}`: {reason}")]
    LaunchFailure { program: String, reason: String },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// True for the download transport family: connection errors,
    /// non-success statuses and redirect loops.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Transport { .. } | Error::HttpStatus { .. } | Error::TooManyRedirects { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
