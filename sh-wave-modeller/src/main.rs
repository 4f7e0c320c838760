use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use sh_wave_modeller::config::Config;
use sh_wave_modeller::scenario::run_scenario;
use sh_wave_modeller::{Serial, Threaded};

#[derive(Parser)]
#[command(name = "sh-wave-modeller")]
#[command(about = "2-D SH wave propagation on a staggered finite-difference grid")]
#[command(version)]
struct Cli {
    /// Scenario file (TOML); built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Compute backend
    #[arg(short, long, value_enum, default_value_t = BackendKind::Serial)]
    backend: BackendKind,

    /// Worker threads for the threaded backend (default: one per CPU)
    #[arg(long)]
    threads: Option<usize>,

    /// Overrides the scenario's output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Render PNG previews of the final fields
    #[arg(long)]
    preview: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendKind {
    Serial,
    Threaded,
    Device,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.output_dir {
        config.output.directory = dir;
    }
    config.output.preview |= cli.preview;
    config.log_summary();

    let report = match cli.backend {
        BackendKind::Serial => run_scenario(Serial, &config),
        BackendKind::Threaded => {
            run_scenario(Threaded::with_threads(cli.threads.unwrap_or(0))?, &config)
        }
        BackendKind::Device => run_on_device(&config),
    }?;

    tracing::info!(
        "Done: {} steps in {:.2?}, cfl={:.4}, {} snapshot(s), {} preview(s)",
        report.summary.steps,
        report.summary.elapsed,
        report.cfl,
        report.snapshots.len(),
        report.previews.len()
    );
    Ok(())
}

#[cfg(feature = "gpu")]
fn run_on_device(config: &Config) -> Result<sh_wave_modeller::scenario::ScenarioReport> {
    let device = sh_wave_modeller::backend::Device::new()?;
    run_scenario(device, config)
}

#[cfg(not(feature = "gpu"))]
fn run_on_device(_config: &Config) -> Result<sh_wave_modeller::scenario::ScenarioReport> {
    anyhow::bail!("the device backend requires building with `--features gpu`")
}

fn setup_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
