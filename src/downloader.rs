use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::StreamExt;
use reqwest::header::LOCATION;
use reqwest::{Client, Response};
use tokio::io::AsyncWriteExt;

use crate::api::{build_client, Asset};
use crate::error::{Error, Result};
use crate::marker::MarkerStore;

/// Callback type for reporting download progress.
/// Arguments: source name, bytes downloaded, total bytes, MiB/s, is_complete
pub type ProgressFn = Arc<dyn Fn(&str, u64, u64, f64, bool) + Send + Sync>;

/// Authenticated asset fetcher.
///
/// Cloning is cheap; every download task holds its own copy.
#[derive(Clone)]
pub struct Downloader {
    client: Client,
    token: Option<String>,
    /// Optional progress callback.
    pub progress: Option<ProgressFn>,
}

impl Downloader {
    /// Downloader sending `token` with every request. Redirects are never
    /// followed automatically.
    pub fn new(token: Option<&str>, proxy: Option<&str>, progress: Option<ProgressFn>) -> Result<Self> {
        Ok(Self {
            client: build_client(proxy, false)?,
            token: token.map(str::to_owned),
            progress,
        })
    }

    /// Download `asset` to `dest`, then record its id in the marker at
    /// `marker`.
    ///
    /// The marker is only touched once the file is fully on disk, so an
    /// interrupted run leaves it naming the previous, intact asset.
    pub async fn download_asset(
        &self,
        asset: &Asset,
        dest: &Path,
        markers: &MarkerStore,
        marker: &Path,
    ) -> Result<u64> {
        let written = self.fetch(&asset.url, &asset.name, dest).await?;
        markers.write(marker, asset.id).await?;
        Ok(written)
    }

    /// GET `url` and stream the body into `dest`, following at most one
    /// redirect. Returns the number of bytes written.
    pub async fn fetch(&self, url: &str, label: &str, dest: &Path) -> Result<u64> {
        let mut resp = self.send(url).await?;

        if resp.status().is_redirection() {
            let target = redirect_target(url, &resp)?;
            log::debug!("{url} redirected to {target}");
            resp = self.send(&target).await?;
            if resp.status().is_redirection() {
                return Err(Error::TooManyRedirects { url: target });
            }
        }

        if !resp.status().is_success() {
            let status = resp.status();
            let url = resp.url().to_string();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::HttpStatus { url, status, body });
        }

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io(parent, e))?;
        }

        let part = part_path(dest);
        match self.stream_to_file(resp, label, &part).await {
            Ok(written) => {
                tokio::fs::rename(&part, dest)
                    .await
                    .map_err(|e| Error::io(dest, e))?;
                Ok(written)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                Err(e)
            }
        }
    }

    async fn send(&self, url: &str) -> Result<Response> {
        let mut request = self
            .client
            .get(url)
            .header("Accept", "application/octet-stream");
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("token {token}"));
        }
        request.send().await.map_err(|source| Error::Transport {
            url: url.to_owned(),
            source,
        })
    }

    async fn stream_to_file(&self, resp: Response, label: &str, path: &Path) -> Result<u64> {
        let url = resp.url().to_string();
        let total = resp.content_length().unwrap_or(0);
        let mut downloaded: u64 = 0;
        let mut stream = resp.bytes_stream();
        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|e| Error::io(path, e))?;

        let start = std::time::Instant::now();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| Error::Transport {
                url: url.clone(),
                source,
            })?;
            downloaded += chunk.len() as u64;
            file.write_all(&chunk).await.map_err(|e| Error::io(path, e))?;
            self.report(label, downloaded, total, start, false);
        }

        file.flush().await.map_err(|e| Error::io(path, e))?;
        file.sync_all().await.map_err(|e| Error::io(path, e))?;
        self.report(label, downloaded, total, start, true);

        Ok(downloaded)
    }

    fn report(&self, label: &str, downloaded: u64, total: u64, start: std::time::Instant, complete: bool) {
        if let Some(progress) = &self.progress {
            let elapsed = start.elapsed().as_secs_f64();
            let mib_per_sec = if elapsed > 0.0 {
                (downloaded as f64) / (1024.0 * 1024.0) / elapsed
            } else {
                0.0
            };
            progress(label, downloaded, total, mib_per_sec, complete);
        }
    }
}

/// Absolute target of a redirect; relative locations resolve against `url`.
fn redirect_target(url: &str, resp: &Response) -> Result<String> {
    let location = resp
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::HttpStatus {
            url: url.to_owned(),
            status: resp.status(),
            body: "redirect without a usable Location header".to_owned(),
        })?;

    resp.url()
        .join(location)
        .map(String::from)
        .map_err(|_| Error::HttpStatus {
            url: url.to_owned(),
            status: resp.status(),
            body: format!("invalid redirect location {location:?}"),
        })
}

/// `<dest>.part`, the file the body is streamed into before the rename.
fn part_path(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_file_sits_next_to_destination() {
        assert_eq!(part_path(Path::new("run/server.jar")), PathBuf::from("run/server.jar.part"));
    }

    #[tokio::test]
    async fn relative_redirect_resolves_against_request_url() {
        let mut server = mockito::Server::new_async().await;
        let _redirect = server
            .mock("GET", "/assets/1")
            .with_status(302)
            .with_header("location", "/storage/blob")
            .create_async()
            .await;
        let _blob = server
            .mock("GET", "/storage/blob")
            .match_header("authorization", "token t")
            .match_header("accept", "application/octet-stream")
            .with_status(200)
            .with_body("payload")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out").join("file.bin");
        let downloader = Downloader::new(Some("t"), None, None).unwrap();

        let written = downloader
            .fetch(&format!("{}/assets/1", server.url()), "file.bin", &dest)
            .await
            .unwrap();
        assert_eq!(written, 7);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "payload");
        assert!(!part_path(&dest).exists());
    }

    #[tokio::test]
    async fn second_redirect_is_refused() {
        let mut server = mockito::Server::new_async().await;
        let _first = server
            .mock("GET", "/a")
            .with_status(302)
            .with_header("location", "/b")
            .create_async()
            .await;
        let _second = server
            .mock("GET", "/b")
            .with_status(302)
            .with_header("location", "/c")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("file.bin");
        let downloader = Downloader::new(None, None, None).unwrap();

        let err = downloader
            .fetch(&format!("{}/a", server.url()), "file.bin", &dest)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TooManyRedirects { .. }));
        assert!(err.is_transport());
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn failed_status_keeps_previous_file_and_marker() {
        let mut server = mockito::Server::new_async().await;
        let _failing = server
            .mock("GET", "/assets/2")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("file.bin");
        std::fs::write(&dest, "old").unwrap();
        let markers = MarkerStore::new(dir.path());
        let marker = markers.path_for("o/r", "file.bin");
        markers.write(&marker, 1).await.unwrap();

        let asset = Asset {
            id: 2,
            name: "file.bin".to_owned(),
            url: format!("{}/assets/2", server.url()),
            browser_download_url: String::new(),
            size: 0,
        };
        let downloader = Downloader::new(None, None, None).unwrap();
        match downloader.download_asset(&asset, &dest, &markers, &marker).await {
            Err(Error::HttpStatus { status, body, .. }) => {
                assert_eq!(status.as_u16(), 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "old");
        assert_eq!(markers.read(&marker).await.unwrap(), Some(1));
    }
}
