use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::{ProcessingError, Result};
use crate::models::{StationEntry, StationReport};
use crate::processors::station_table::ProbeStats;
use crate::processors::worker::WorkerStatus;
use crate::processors::{StationTable, Worker};
use crate::readers::ChunkSource;
use crate::utils::constants::PROGRESS_POLL_MS;
use crate::utils::progress::ProgressReporter;

/// Diagnostics gathered over one run.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub lines_read: u64,
    pub chunks: u64,
    pub bytes: u64,
    pub stations: usize,
    pub workers: usize,
    pub elapsed: Duration,
    pub probes: ProbeStats,
}

/// Drives a full run: one shared chunk source, `workers` threads, then a
/// merge of their private tables into a sorted report.
pub struct Coordinator {
    path: PathBuf,
    config: EngineConfig,
    source: Arc<ChunkSource>,
    report: Option<StationReport>,
    stats: RunStats,
    consumed: bool,
}

impl Coordinator {
    /// Default configuration with `workers` threads.
    pub fn new(path: &Path, workers: usize) -> Result<Self> {
        Self::with_config(path, EngineConfig::with_workers(workers))
    }

    /// Opens the input immediately, so a missing file fails here.
    pub fn with_config(path: &Path, config: EngineConfig) -> Result<Self> {
        config.check()?;
        let source = ChunkSource::open(path, config.buffer_count, config.buffer_size)?;

        Ok(Self {
            path: path.to_path_buf(),
            source: Arc::new(source),
            stats: RunStats {
                workers: config.workers,
                ..RunStats::default()
            },
            config,
            report: None,
            consumed: false,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn run(&mut self) -> Result<&StationReport> {
        self.run_with_progress(None)
    }

    /// Run every worker to completion and merge. Any worker error is
    /// returned and leaves the coordinator without a report.
    pub fn run_with_progress(
        &mut self,
        progress: Option<&ProgressReporter>,
    ) -> Result<&StationReport> {
        if self.consumed {
            return Err(ProcessingError::Config(
                "input already consumed; create a new coordinator to run again".to_string(),
            ));
        }
        self.consumed = true;

        let started = Instant::now();
        info!(
            "Aggregating {} with {} workers",
            self.path.display(),
            self.config.workers
        );

        let tables = (0..self.config.workers)
            .map(|_| StationTable::from_config(&self.config))
            .collect::<Result<Vec<_>>>()?;

        let mut handles = Vec::with_capacity(tables.len());
        let mut statuses = Vec::with_capacity(tables.len());
        for (id, table) in tables.into_iter().enumerate() {
            let worker = Worker::new(id, Arc::clone(&self.source), table);
            statuses.push(worker.status());

            let spawned = std::thread::Builder::new()
                .name(format!("brc-worker-{id}"))
                .spawn(move || worker.run());
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    self.source.abort();
                    join_all(handles);
                    return Err(e.into());
                }
            }
        }

        if let Some(p) = progress.filter(|p| !p.is_silent()) {
            watch_workers(&statuses, &handles, p);
        }

        let tables = collect_tables(handles)?;

        self.stats.lines_read = statuses.iter().map(|s| s.lines_read()).sum();
        self.stats.chunks = self.source.chunks_issued();
        self.stats.bytes = self.source.bytes_issued();
        for table in &tables {
            self.stats.probes.combine(&table.probe_stats());
        }

        let merged = merge_tables(&tables, StationTable::from_config(&self.config)?)?;
        let report = StationReport::from_merged(&merged);

        self.stats.stations = report.len();
        self.stats.elapsed = started.elapsed();
        info!(
            "Merged {} stations from {} lines in {:?}",
            report.len(),
            self.stats.lines_read,
            self.stats.elapsed
        );

        if let Some(p) = progress {
            p.finish_with_message(&format!(
                "Processed {} lines, {} stations",
                self.stats.lines_read,
                report.len()
            ));
        }

        Ok(self.report.insert(report))
    }

    /// The merged report, once `run` has succeeded.
    pub fn report(&self) -> Result<&StationReport> {
        self.report.as_ref().ok_or(ProcessingError::NotRun)
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Run diagnostics: lines read and elapsed time, plus reader and table
    /// counters.
    pub fn print_stats<W: Write>(&self, out: &mut W) -> Result<()> {
        let stats = &self.stats;
        writeln!(out, "input:    {}", self.path.display())?;
        writeln!(out, "workers:  {}", stats.workers)?;
        writeln!(out, "lines:    {}", stats.lines_read)?;
        writeln!(out, "stations: {}", stats.stations)?;
        writeln!(
            out,
            "chunks:   {} ({} bytes of {})",
            stats.chunks,
            stats.bytes,
            self.source.file_len()
        )?;
        writeln!(
            out,
            "probes:   avg {:.3}, longest {} ({} hash, {:?} probing)",
            stats.probes.average_probe(),
            stats.probes.longest_probe,
            self.config.hash,
            self.config.probe
        )?;
        writeln!(out, "elapsed:  {:.3}s", stats.elapsed.as_secs_f64())?;
        Ok(())
    }

    /// One `name=min/mean/max` line per station, sorted by name.
    pub fn output_results<W: Write>(&self, out: &mut W) -> Result<()> {
        crate::writers::write_text(self.report()?, out)
    }
}

/// Fold every worker's partials into `target`, then sort by name. The target
/// carries the station limit, so a run whose workers each stayed under it
/// still fails with [`ProcessingError::Capacity`] once the union exceeds it.
/// Entry merging is commutative and associative, so table order does not
/// matter.
pub fn merge_tables(
    tables: &[StationTable],
    mut target: StationTable,
) -> Result<BTreeMap<Vec<u8>, StationEntry>> {
    for table in tables {
        for (name, entry) in table.iter() {
            target.merge_entry(name, entry)?;
        }
    }
    debug!("Merged {} tables into {} stations", tables.len(), target.len());

    Ok(target
        .iter()
        .map(|(name, entry)| (name.to_vec(), *entry))
        .collect())
}

/// Join every worker. The first error (in worker order) wins, and is only
/// returned after all threads have stopped.
fn collect_tables(handles: Vec<JoinHandle<Result<StationTable>>>) -> Result<Vec<StationTable>> {
    let mut tables = Vec::with_capacity(handles.len());
    let mut first_error = None;

    for (id, handle) in handles.into_iter().enumerate() {
        let outcome = handle
            .join()
            .unwrap_or_else(|_| Err(ProcessingError::WorkerPanicked { worker: id }));
        match outcome {
            Ok(table) => tables.push(table),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(tables),
    }
}

fn join_all(handles: Vec<JoinHandle<Result<StationTable>>>) {
    for handle in handles {
        let _ = handle.join();
    }
}

fn watch_workers(
    statuses: &[Arc<WorkerStatus>],
    handles: &[JoinHandle<Result<StationTable>>],
    progress: &ProgressReporter,
) {
    while !handles.iter().all(|h| h.is_finished()) {
        let lines: u64 = statuses.iter().map(|s| s.lines_read()).sum();
        progress.set_message(&format!("Aggregating... {} lines", lines));
        std::thread::sleep(Duration::from_millis(PROGRESS_POLL_MS));
    }
}
