use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use depscan::{
    config::Config,
    manifest,
    model::Verdict,
    pipeline::ScanPipeline,
    report::{render, ReportFormat},
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Exit codes for CI integration
mod exit_codes {
    pub const CLEAN: u8 = 0;
    pub const VULNERABLE: u8 = 1;
    pub const INCOMPLETE: u8 = 2;
    pub const ERROR: u8 = 3;
}

#[derive(Parser)]
#[command(name = "depscan")]
#[command(
    author,
    version,
    about = "Scan project dependencies for known vulnerabilities"
)]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a manifest (requirements.txt or pom.xml)
    Scan {
        /// Manifest file to scan
        #[arg(short, long)]
        file: PathBuf,

        /// Output format (text, json, html)
        #[arg(long)]
        format: Option<String>,

        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Maximum number of feed requests in flight
        #[arg(long)]
        concurrency: Option<usize>,

        /// Per-request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Abort the whole scan after this many seconds
        #[arg(long)]
        deadline: Option<u64>,

        /// Base URL of the advisory feed
        #[arg(long)]
        feed_url: Option<String>,

        /// Config file to use instead of the default location
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show or create config file
    Config {
        /// Generate default config file
        #[arg(long)]
        init: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

struct ScanArgs {
    file: PathBuf,
    format: Option<String>,
    output: Option<PathBuf>,
    concurrency: Option<usize>,
    timeout: Option<u64>,
    deadline: Option<u64>,
    feed_url: Option<String>,
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() {
                exit_codes::ERROR
            } else {
                exit_codes::CLEAN
            };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("depscan=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<u8> {
    match cli.command {
        Commands::Scan {
            file,
            format,
            output,
            concurrency,
            timeout,
            deadline,
            feed_url,
            config,
        } => {
            run_scan(ScanArgs {
                file,
                format,
                output,
                concurrency,
                timeout,
                deadline,
                feed_url,
                config,
            })
            .await
        }
        Commands::Config { init, path } => {
            handle_config(init, path)?;
            Ok(exit_codes::CLEAN)
        }
    }
}

async fn run_scan(args: ScanArgs) -> Result<u8> {
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    apply_overrides(&mut config, &args);

    let format_str = args
        .format
        .clone()
        .unwrap_or_else(|| config.default_format.clone());
    let format = ReportFormat::from_str(&format_str).map_err(|e| anyhow::anyhow!(e))?;
    let is_interactive = format == ReportFormat::Text;

    let dependencies = manifest::parse_file(&args.file)
        .with_context(|| format!("failed to parse {}", args.file.display()))?;
    debug!(
        file = %args.file.display(),
        dependencies = dependencies.len(),
        "loaded manifest"
    );

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let progress = if is_interactive && !dependencies.is_empty() {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message(format!(
            "Checking {} dependencies for vulnerabilities...",
            dependencies.len()
        ));
        Some(pb)
    } else {
        None
    };

    let pipeline = ScanPipeline::from_config(&config);
    let outcome = pipeline.run(&dependencies, &cancel).await;

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let result = outcome?;
    let report = render(&result, format)?;

    let destination = args
        .output
        .clone()
        .or_else(|| format.default_output_path().map(PathBuf::from));
    match destination {
        Some(path) => write_report(&path, &report)?,
        None => print!("{}", report),
    }

    Ok(match result.verdict() {
        Verdict::Clean => exit_codes::CLEAN,
        Verdict::Vulnerable => exit_codes::VULNERABLE,
        Verdict::Incomplete => exit_codes::INCOMPLETE,
    })
}

fn apply_overrides(config: &mut Config, args: &ScanArgs) {
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(timeout) = args.timeout {
        config.request_timeout_secs = timeout;
    }
    if let Some(deadline) = args.deadline {
        config.scan_deadline_secs = Some(deadline);
    }
    if let Some(url) = &args.feed_url {
        config.feed_url = url.clone();
    }
}

/// Cancels the scan on Ctrl-C.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "failed to listen for interrupt");
                    return;
                }
                warn!("interrupted, cancelling scan");
                cancel.cancel();
            }
            _ = cancel.cancelled() => {}
        }
    });
}

fn write_report(path: &Path, report: &str) -> Result<()> {
    std::fs::write(path, report)
        .with_context(|| format!("failed to write report to {}", path.display()))?;
    eprintln!("Report written to: {}", path.display());
    Ok(())
}

fn handle_config(init: bool, show_path: bool) -> Result<()> {
    let config_path = Config::config_path();

    if show_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            println!("Config file already exists at: {}", config_path.display());
            return Ok(());
        }

        let config = Config::default();
        config.save()?;
        println!("Created config file at: {}", config_path.display());
        println!();
        println!("Default configuration:");
        println!("{}", Config::generate_default_config());
        return Ok(());
    }

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        println!("Config file: {}", config_path.display());
        println!();
        println!("{}", content);
    } else {
        println!("No config file found.");
        println!("Run 'depscan config --init' to create one.");
        println!();
        println!("Config path: {}", config_path.display());
    }

    Ok(())
}
