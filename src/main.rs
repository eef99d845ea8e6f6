use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, LevelFilter};

use ghfetch::{config, orchestrator, progress};

const EXIT_FAILURES: u8 = 1;
const EXIT_FATAL: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "ghfetch",
    version,
    about = "Download the latest matching GitHub release assets and launch a command afterwards"
)]
struct Args {
    /// Configuration file; a template is written here if it does not exist
    #[arg(short, long, default_value = config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Only print warnings and errors
    #[arg(short, long)]
    quiet: bool,

    /// Resolve assets and report what would be downloaded, without fetching
    /// or launching anything
    #[arg(long)]
    dry_run: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::new()
        .format(|buf, record| {
            use std::io::Write;
            match record.level() {
                level @ (log::Level::Error | log::Level::Warn) => {
                    writeln!(buf, "[{level}] {}", record.args())
                }
                // status lines go to stdout, the logger's own target is stderr
                _ => writeln!(std::io::stdout().lock(), "{}", record.args()),
            }
        })
        .filter_level(if args.quiet { LevelFilter::Warn } else { LevelFilter::Info })
        .parse_default_env()
        .init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("FATAL: failed to create Tokio runtime: {e}");
            return ExitCode::from(EXIT_FATAL);
        }
    };

    match rt.block_on(real_main(args)) {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

async fn real_main(args: Args) -> Result<ExitCode> {
    let Some(cfg) = config::load_or_bootstrap(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?
    else {
        info!(
            "Config file {} not found, created one from the template",
            args.config.display()
        );
        info!("Please fill it in and run ghfetch again");
        return Ok(ExitCode::SUCCESS);
    };

    let quiet = args.quiet || cfg.quiet;
    if quiet && std::env::var_os("RUST_LOG").is_none() {
        log::set_max_level(LevelFilter::Warn);
    }

    let options = orchestrator::Options {
        dry_run: args.dry_run,
        proxy: ghfetch::api::proxy_from_env(),
        progress: (!quiet).then(progress::default_progress_fn),
    };

    let report = orchestrator::run(cfg, options)
        .await
        .context("run aborted")?;

    if report.is_success() {
        info!("All {} downloads done", report.specs.len());
        Ok(ExitCode::SUCCESS)
    } else {
        error!("{} download(s) or command(s) failed", report.failures());
        Ok(ExitCode::from(EXIT_FAILURES))
    }
}
