//! One run: resolve releases, sync every download in its own task, then
//! launch the post-download hooks.

use std::path::PathBuf;
use std::sync::Arc;

use crate::api::{Asset, GithubClient, Release};
use crate::config::{Config, DownloadSpec};
use crate::downloader::{Downloader, ProgressFn};
use crate::error::{Error, Result};
use crate::marker::{decide, Gate, MarkerStore};
use crate::resolver::{resolve_asset, ResolvedAsset};
use crate::runner;
use crate::substitute::substitute;

/// Knobs that are not part of the configuration file.
#[derive(Clone, Default)]
pub struct Options {
    /// Resolve and gate only; never fetch, mark, or launch.
    pub dry_run: bool,
    pub proxy: Option<String>,
    pub progress: Option<ProgressFn>,
}

/// What happened to one download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Downloaded { asset_id: u64, dest: PathBuf, bytes: u64 },
    UpToDate { asset_id: u64, dest: PathBuf },
    WouldDownload { asset_id: u64, dest: PathBuf },
}

/// Result of one configured download.
#[derive(Debug)]
pub struct SpecReport {
    /// Position in `downloads`, zero based.
    pub index: usize,
    /// Repository the download was resolved against.
    pub repo: String,
    /// The `fileRegex` as written in the configuration.
    pub pattern: String,
    /// Set once an asset was matched, even if the download then failed.
    pub resolved: Option<ResolvedAsset>,
    /// What the download did, or why it failed.
    pub result: Result<Outcome>,
}

/// Everything one run did.
#[derive(Debug, Default)]
pub struct RunReport {
    /// One entry per download, in configuration order.
    pub specs: Vec<SpecReport>,
    /// Pids of the launched hooks.
    pub launched: Vec<u32>,
    /// Hooks that could not be built or started.
    pub launch_failures: Vec<Error>,
}

impl RunReport {
    pub fn failures(&self) -> usize {
        self.specs.iter().filter(|s| s.result.is_err()).count() + self.launch_failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures() == 0
    }
}

/// A release together with its assets, listed once and shared.
#[derive(Debug)]
struct ReleaseAssets {
    release: Release,
    assets: Vec<Asset>,
}

struct Context {
    config: Config,
    github: GithubClient,
    downloader: Downloader,
    markers: MarkerStore,
    dry_run: bool,
}

/// Run every configured download, then every hook.
///
/// Fails as a whole only when the API session cannot be built or when the
/// global `githubRepo`, used by at least one download, has no release.
/// Everything else is recorded per download in the returned report.
pub async fn run(config: Config, options: Options) -> Result<RunReport> {
    let token = config.token().map(str::to_owned);
    let github = GithubClient::new(&config.github_api_url, token.as_deref(), options.proxy.as_deref())?;
    if github.is_authenticated() {
        log::debug!("using authenticated GitHub session");
    } else {
        log::info!("no githubToken configured, using anonymous GitHub access");
    }
    let progress = if config.quiet { None } else { options.progress };
    let downloader = Downloader::new(token.as_deref(), options.proxy.as_deref(), progress)?;
    let markers = MarkerStore::new(&config.marker_dir);

    let global = config.github_repo.as_deref().map(str::trim).filter(|r| !r.is_empty());
    let shared = match global {
        Some(repo) if config.uses_global_repo() => {
            Some((repo.to_owned(), Arc::new(fetch_release(&github, repo).await?)))
        }
        _ => None,
    };

    let ctx = Arc::new(Context {
        config,
        github,
        downloader,
        markers,
        dry_run: options.dry_run,
    });

    let mut handles = Vec::with_capacity(ctx.config.downloads.len());
    for index in 0..ctx.config.downloads.len() {
        let ctx = Arc::clone(&ctx);
        let shared = shared.clone();
        handles.push(tokio::spawn(async move {
            process_download(&ctx, index, shared).await
        }));
    }

    let mut report = RunReport::default();
    for (index, handle) in handles.into_iter().enumerate() {
        let spec_report = match handle.await {
            Ok(spec_report) => spec_report,
            Err(e) => {
                let spec = &ctx.config.downloads[index];
                SpecReport {
                    index,
                    repo: ctx.config.repo_for(spec).unwrap_or_default().to_owned(),
                    pattern: spec.file_regex.to_string(),
                    resolved: None,
                    result: Err(Error::TaskAborted(e.to_string())),
                }
            }
        };
        if let Err(e) = &spec_report.result {
            log::error!(
                "download #{} ({}, `{}`) failed: {e}",
                index + 1,
                spec_report.repo,
                spec_report.pattern
            );
        }
        report.specs.push(spec_report);
    }

    run_hooks(&ctx, &mut report);
    Ok(report)
}

async fn fetch_release(github: &GithubClient, repo: &str) -> Result<ReleaseAssets> {
    let release = github.latest_release(repo).await?;
    log::info!(
        "Using release {} published at {} Tag: {}",
        release.name.as_deref().unwrap_or(&release.tag_name),
        release
            .published_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_default(),
        release.tag_name
    );
    if let Some(body) = release.body.as_deref().filter(|b| !b.trim().is_empty()) {
        log::info!("{body}");
    }
    let assets = github.list_assets(repo, release.id).await?;
    Ok(ReleaseAssets { release, assets })
}

async fn process_download(
    ctx: &Context,
    index: usize,
    shared: Option<(String, Arc<ReleaseAssets>)>,
) -> SpecReport {
    let spec = &ctx.config.downloads[index];
    let repo = ctx.config.repo_for(spec).unwrap_or_default().to_owned();

    let (resolved, result) = match resolve_for(ctx, spec, &repo, shared).await {
        Ok(resolved) => {
            let result = sync_asset(ctx, spec, &repo, &resolved).await;
            (Some(resolved), result)
        }
        Err(e) => (None, Err(e)),
    };

    SpecReport {
        index,
        repo,
        pattern: spec.file_regex.to_string(),
        resolved,
        result,
    }
}

async fn resolve_for(
    ctx: &Context,
    spec: &DownloadSpec,
    repo: &str,
    shared: Option<(String, Arc<ReleaseAssets>)>,
) -> Result<ResolvedAsset> {
    let release = match shared {
        Some((shared_repo, release)) if shared_repo == repo => release,
        _ => Arc::new(fetch_release(&ctx.github, repo).await?),
    };
    log::debug!(
        "{repo}@{}: {} assets",
        release.release.tag_name,
        release.assets.len()
    );

    resolve_asset(&release.assets, &spec.file_regex).ok_or_else(|| Error::NoAssetFound {
        repo: repo.to_owned(),
        pattern: spec.file_regex.to_string(),
    })
}

/// Gate, then fetch and mark. Strictly ordered within one download.
async fn sync_asset(
    ctx: &Context,
    spec: &DownloadSpec,
    repo: &str,
    resolved: &ResolvedAsset,
) -> Result<Outcome> {
    let asset = &resolved.asset;
    let dest = PathBuf::from(substitute(&spec.copy_file_at, &resolved.groups)?);
    let marker = ctx.markers.path_for(repo, spec.file_regex.as_str());

    let asset_id = asset.id;
    match decide(ctx.markers.read(&marker).await?, asset_id) {
        Gate::Skip => {
            log::info!("{}: asset {} already downloaded", repo, asset.name);
            Ok(Outcome::UpToDate { asset_id, dest })
        }
        Gate::Download if ctx.dry_run => {
            log::info!("{}: would download {} to {}", repo, asset.name, dest.display());
            Ok(Outcome::WouldDownload { asset_id, dest })
        }
        Gate::Download => {
            log::info!("{}: downloading {} to {}", repo, asset.name, dest.display());
            let bytes = ctx
                .downloader
                .download_asset(asset, &dest, &ctx.markers, &marker)
                .await?;
            log::info!("{}: {} downloaded ({bytes} bytes)", repo, asset.name);
            Ok(Outcome::Downloaded { asset_id, dest, bytes })
        }
    }
}

/// Launch hooks in configuration order for every download that matched an
/// asset this run, including ones whose fetch failed: the previous file is
/// still in place.
fn run_hooks(ctx: &Context, report: &mut RunReport) {
    for spec_report in &report.specs {
        let spec = &ctx.config.downloads[spec_report.index];
        if spec.on_download_finish.is_none() {
            continue;
        }
        let Some(resolved) = &spec_report.resolved else {
            log::warn!(
                "download #{}: no asset matched, not running its onDownloadFinish command",
                spec_report.index + 1
            );
            continue;
        };

        let launched = runner::build_command(spec, &resolved.groups).and_then(|argv| {
            let argv = argv.unwrap_or_default();
            if ctx.dry_run {
                log::info!("Would run {argv:?}");
                return Ok(None);
            }
            log::info!("Running {argv:?}");
            runner::launch(&argv).map(Some)
        });

        match launched {
            Ok(Some(pid)) => report.launched.push(pid),
            Ok(None) => {}
            Err(e) => {
                log::error!("download #{}: {e}", spec_report.index + 1);
                report.launch_failures.push(e);
            }
        }
    }
}
