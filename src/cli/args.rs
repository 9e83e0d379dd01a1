use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::EngineConfig;
use crate::processors::{HashPolicy, ProbeStrategy};
use crate::writers::OutputFormat;

#[derive(Parser)]
#[command(name = "brc-aggregator")]
#[command(about = "Multi-threaded min/mean/max aggregation of name;value measurement files")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(
        long,
        global = true,
        help = "Configuration file (toml, yaml or json); BRC_* environment variables override it"
    )]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Aggregate a measurement file and print one line per station
    Aggregate {
        #[arg(help = "Input file of name;value lines")]
        input: PathBuf,

        #[command(flatten)]
        engine: EngineArgs,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        #[arg(long, help = "Print run diagnostics to stderr")]
        stats: bool,

        #[arg(long, help = "Show a progress spinner on stderr")]
        progress: bool,
    },

    /// Compare collision behaviour of every hash policy and probe strategy
    HashReport {
        #[arg(help = "Input file of name;value lines")]
        input: PathBuf,

        #[command(flatten)]
        engine: EngineArgs,
    },
}

/// Overrides for the loaded configuration; unset flags keep the loaded value.
#[derive(Args, Debug, Default, Clone)]
pub struct EngineArgs {
    #[arg(short, long, help = "Worker threads [default: number of CPUs]")]
    pub workers: Option<usize>,

    #[arg(long, help = "Number of pooled read buffers")]
    pub buffers: Option<usize>,

    #[arg(long, help = "Size of each read buffer in bytes")]
    pub buffer_size: Option<usize>,

    #[arg(long, help = "Distinct stations accepted before failing")]
    pub max_stations: Option<usize>,

    #[arg(long, help = "Hash table slots per expected station")]
    pub headroom: Option<f64>,

    #[arg(long, value_enum)]
    pub hash: Option<HashPolicy>,

    #[arg(long, value_enum)]
    pub probe: Option<ProbeStrategy>,
}

impl EngineArgs {
    pub fn apply(&self, config: &mut EngineConfig) {
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(buffers) = self.buffers {
            config.buffer_count = buffers;
        }
        if let Some(buffer_size) = self.buffer_size {
            config.buffer_size = buffer_size;
        }
        if let Some(max_stations) = self.max_stations {
            config.max_stations = max_stations;
        }
        if let Some(headroom) = self.headroom {
            config.headroom = headroom;
        }
        if let Some(hash) = self.hash {
            config.hash = hash;
        }
        if let Some(probe) = self.probe {
            config.probe = probe;
        }
    }
}
