use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{redirect, Client, Proxy, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{Error, Result};

/// GitHub caps `per_page` at 100.
const PER_PAGE: usize = 100;

const USER_AGENT: &str = concat!("ghfetch/", env!("CARGO_PKG_VERSION"));

// ──────────────────────────────────────────────────────────────────────────────
// Models
// ──────────────────────────────────────────────────────────────────────────────

/// A GitHub release, as returned by `GET /repos/{repo}/releases`.
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    pub tag_name: String,
    #[serde(default)]
    pub body: Option<String>,
    /// `None` for drafts.
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub draft: bool,
}

/// One downloadable file of a release.
#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
    pub id: u64,
    pub name: String,
    /// API URL; serves the binary when asked for `application/octet-stream`.
    pub url: String,
    #[serde(default)]
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
}

// ──────────────────────────────────────────────────────────────────────────────
// HTTP client
// ──────────────────────────────────────────────────────────────────────────────

/// Proxy URL from `HTTP_PROXY`, falling back to `HTTPS_PROXY`.
pub fn proxy_from_env() -> Option<String> {
    std::env::var("HTTP_PROXY")
        .ok()
        .filter(|s| !s.is_empty())
        .or_else(|| std::env::var("HTTPS_PROXY").ok().filter(|s| !s.is_empty()))
}

/// Build an HTTP client, optionally with proxy support.
///
/// Asset downloads pass `follow_redirects = false` and follow the storage
/// redirect themselves so the auth headers travel along.
pub fn build_client(proxy: Option<&str>, follow_redirects: bool) -> Result<Client> {
    let mut builder = Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .user_agent(USER_AGENT);
    if !follow_redirects {
        builder = builder.redirect(redirect::Policy::none());
    }
    if let Some(proxy_url) = proxy {
        let proxy = Proxy::all(proxy_url).map_err(|source| Error::Transport {
            url: proxy_url.to_owned(),
            source,
        })?;
        builder = builder.proxy(proxy);
    }
    builder.build().map_err(|source| Error::Transport {
        url: "(client setup)".to_owned(),
        source,
    })
}

// ──────────────────────────────────────────────────────────────────────────────
// GithubClient
// ──────────────────────────────────────────────────────────────────────────────

/// Minimal GitHub REST session: releases and their assets.
#[derive(Debug, Clone)]
pub struct GithubClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl GithubClient {
    /// Session against `base_url`. A `None` token means anonymous access.
    pub fn new(base_url: &str, token: Option<&str>, proxy: Option<&str>) -> Result<Self> {
        Ok(Self {
            client: build_client(proxy, true)?,
            base_url: base_url.trim_end_matches('/').to_owned(),
            token: token.map(str::to_owned),
        })
    }

    /// Whether requests carry a token.
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Every release of `repo`, across all pages, in API order.
    pub async fn list_releases(&self, repo: &str) -> Result<Vec<Release>> {
        self.get_all_pages(&format!("{}/repos/{repo}/releases", self.base_url))
            .await
    }

    /// The published release with the most recent `published_at`.
    pub async fn latest_release(&self, repo: &str) -> Result<Release> {
        self.list_releases(repo)
            .await?
            .into_iter()
            .filter(|r| !r.draft && r.published_at.is_some())
            .max_by_key(|r| r.published_at)
            .ok_or_else(|| Error::NoReleaseFound {
                repo: repo.to_owned(),
            })
    }

    /// Assets of a release, in the order the API lists them.
    pub async fn list_assets(&self, repo: &str, release_id: u64) -> Result<Vec<Asset>> {
        self.get_all_pages(&format!(
            "{}/repos/{repo}/releases/{release_id}/assets",
            self.base_url
        ))
        .await
    }

    async fn get_all_pages<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        for page in 1.. {
            let url = format!("{endpoint}?per_page={PER_PAGE}&page={page}");
            let batch: Vec<T> = self.get_json(&url).await?;
            let short = batch.len() < PER_PAGE;
            items.extend(batch);
            if short {
                break;
            }
        }
        Ok(items)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self
            .authorize(self.client.get(url))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .send()
            .await
            .map_err(|source| Error::Transport {
                url: url.to_owned(),
                source,
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::HttpStatus {
                url: url.to_owned(),
                status,
                body,
            });
        }

        resp.json().await.map_err(|source| Error::Transport {
            url: url.to_owned(),
            source,
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header("Authorization", format!("token {token}")),
            None => request,
        }
    }
}
