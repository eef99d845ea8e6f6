use std::path::Path;

use ghfetch::config::Config;
use ghfetch::orchestrator::{run, Options, Outcome};
use ghfetch::progress::default_progress_fn;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    // Keep the latest ripgrep checksum file next to this demo
    let config = Config::from_yaml(
        r#"
githubToken: ""
downloads:
  - githubRepo: "BurntSushi/ripgrep"
    fileRegex: 'ripgrep-([\d.]+)-x86_64-unknown-linux-musl\.tar\.gz\.sha256'
    copyFileAt: "demo-out/ripgrep-$1.sha256"
    onDownloadFinish: "cat"
    onDownloadFinishArgs: ["demo-out/ripgrep-$1.sha256"]
"#,
        Path::new("demo.yml"),
    );

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid demo configuration: {e}");
            return;
        }
    };

    let options = Options {
        progress: Some(default_progress_fn()),
        ..Options::default()
    };

    match run(config, options).await {
        Ok(report) => {
            for spec in &report.specs {
                match &spec.result {
                    Ok(Outcome::Downloaded { dest, .. }) => println!("downloaded {}", dest.display()),
                    Ok(Outcome::UpToDate { dest, .. }) => println!("{} is up to date", dest.display()),
                    Ok(Outcome::WouldDownload { dest, .. }) => println!("would download {}", dest.display()),
                    Err(e) => eprintln!("{}: {e}", spec.repo),
                }
            }
        }
        Err(e) => eprintln!("run aborted: {e}"),
    }
}
