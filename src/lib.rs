//! # ghfetch
//!
//! Keeps local copies of GitHub release assets up to date. For every
//! configured download the latest release is looked up, the first asset
//! whose name fully matches a pattern is picked, and it is fetched to a
//! destination built from the pattern's capture groups, unless the
//! per-download marker says that exact asset was already fetched. Once all
//! downloads have settled, optional commands are launched.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ghfetch::{config, orchestrator, progress};
//!
//! #[tokio::main]
//! async fn main() {
//!     let path = std::path::Path::new(config::DEFAULT_CONFIG_FILE);
//!     let Some(config) = config::load_or_bootstrap(path).unwrap() else {
//!         println!("template written to {}, fill it in and run again", path.display());
//!         return;
//!     };
//!     let options = orchestrator::Options {
//!         progress: Some(progress::default_progress_fn()),
//!         ..Default::default()
//!     };
//!     let report = orchestrator::run(config, options).await.unwrap();
//!     assert!(report.is_success());
//! }
//! ```

pub mod api;
pub mod config;
pub mod downloader;
pub mod error;
pub mod marker;
pub mod orchestrator;
pub mod progress;
pub mod resolver;
pub mod runner;
pub mod substitute;

pub use api::{Asset, GithubClient, Release};
pub use config::{Config, DownloadSpec, FilePattern};
pub use downloader::Downloader;
pub use error::{Error, Result};
pub use orchestrator::{run, Options, Outcome, RunReport};
pub use substitute::{substitute, Groups};
