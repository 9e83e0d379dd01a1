use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::processors::parser::parse_lines;
use crate::processors::StationTable;
use crate::readers::ChunkSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    Idle = 0,
    Running = 1,
    Draining = 2,
    Done = 3,
    Failed = 4,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Idle,
            1 => WorkerState::Running,
            2 => WorkerState::Draining,
            3 => WorkerState::Done,
            _ => WorkerState::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerState::Done | WorkerState::Failed)
    }
}

/// Progress counters a worker publishes while it runs.
#[derive(Debug)]
pub struct WorkerStatus {
    state: AtomicU8,
    lines_read: AtomicU64,
    chunks_processed: AtomicU64,
}

impl WorkerStatus {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(WorkerState::Idle as u8),
            lines_read: AtomicU64::new(0),
            chunks_processed: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn lines_read(&self) -> u64 {
        self.lines_read.load(Ordering::Relaxed)
    }

    pub fn chunks_processed(&self) -> u64 {
        self.chunks_processed.load(Ordering::Relaxed)
    }

    pub fn is_done(&self) -> bool {
        self.state() == WorkerState::Done
    }

    fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// Pulls chunks from a shared source and aggregates them into a private
/// table. The table is handed back only once the worker is done with it.
pub struct Worker {
    id: usize,
    source: Arc<ChunkSource>,
    table: StationTable,
    status: Arc<WorkerStatus>,
}

impl Worker {
    pub fn new(id: usize, source: Arc<ChunkSource>, table: StationTable) -> Self {
        Self {
            id,
            source,
            table,
            status: Arc::new(WorkerStatus::new()),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Handle for observing the worker from another thread.
    pub fn status(&self) -> Arc<WorkerStatus> {
        Arc::clone(&self.status)
    }

    /// Process chunks until the source is exhausted.
    ///
    /// On failure the source is aborted so that the other workers stop too.
    pub fn run(mut self) -> Result<StationTable> {
        self.status.set_state(WorkerState::Running);
        debug!("Worker {} started", self.id);

        match self.process_chunks() {
            Ok(()) => {
                self.status.set_state(WorkerState::Draining);
                debug!(
                    "Worker {} finished: {} lines, {} chunks, {} stations",
                    self.id,
                    self.status.lines_read(),
                    self.status.chunks_processed(),
                    self.table.len()
                );
                self.status.set_state(WorkerState::Done);
                Ok(self.table)
            }
            Err(e) => {
                warn!("Worker {} failed: {}", self.id, e);
                self.status.set_state(WorkerState::Failed);
                self.source.abort();
                Err(e)
            }
        }
    }

    fn process_chunks(&mut self) -> Result<()> {
        while let Some(chunk) = self.source.next_chunk()? {
            let table = &mut self.table;
            let lines = parse_lines(chunk.data(), chunk.offset(), |name, value| {
                table.record(name, value)
            })?;

            self.status.lines_read.fetch_add(lines, Ordering::Relaxed);
            self.status.chunks_processed.fetch_add(1, Ordering::Relaxed);
            self.source.return_chunk(chunk);
        }
        Ok(())
    }
}
