use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::args::{Cli, Commands, EngineArgs};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::processors::{Coordinator, HashPolicy, ProbeStrategy};
use crate::utils::progress::ProgressReporter;
use crate::writers::write_report;

pub fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose);

    match cli.command {
        Commands::Aggregate {
            input,
            engine,
            format,
            stats,
            progress,
        } => {
            let config = resolve_config(cli.config.as_deref(), &engine)?;
            let mut coordinator = Coordinator::with_config(&input, config)?;

            let reporter = ProgressReporter::new_spinner("Aggregating...", !progress);
            coordinator.run_with_progress(Some(&reporter))?;
            drop(reporter);

            let stdout = io::stdout();
            let mut out = BufWriter::with_capacity(1 << 20, stdout.lock());
            write_report(coordinator.report()?, format, &mut out)?;

            if stats {
                coordinator.print_stats(&mut io::stderr().lock())?;
            }
        }

        Commands::HashReport { input, engine } => {
            let config = resolve_config(cli.config.as_deref(), &engine)?;
            let stdout = io::stdout();
            let mut out = stdout.lock();

            writeln!(
                out,
                "{:<8} {:<10} {:>10} {:>12} {:>8}",
                "hash", "probe", "stations", "avg probes", "longest"
            )?;

            for hash in HashPolicy::all() {
                for probe in [ProbeStrategy::Linear, ProbeStrategy::Quadratic] {
                    let trial = EngineConfig {
                        hash,
                        probe,
                        ..config.clone()
                    };
                    let mut coordinator = Coordinator::with_config(&input, trial)?;
                    coordinator.run()?;

                    let stats = coordinator.stats();
                    writeln!(
                        out,
                        "{:<8} {:<10} {:>10} {:>12.4} {:>8}",
                        hash.name(),
                        format!("{:?}", probe).to_lowercase(),
                        stats.stations,
                        stats.probes.average_probe(),
                        stats.probes.longest_probe
                    )?;
                }
            }
        }
    }

    Ok(())
}

/// Defaults, then the config file and environment, then command-line flags.
fn resolve_config(file: Option<&Path>, engine: &EngineArgs) -> Result<EngineConfig> {
    let mut config = EngineConfig::load(file)?;
    engine.apply(&mut config);
    config.check()?;
    info!("Using configuration {:?}", config);
    Ok(config)
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // A second initialisation (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}
