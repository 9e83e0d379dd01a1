pub mod coordinator;
pub mod hashing;
pub mod parser;
pub mod station_table;
pub mod worker;

pub use coordinator::{merge_tables, Coordinator, RunStats};
pub use hashing::{HashPolicy, ProbeStrategy};
pub use station_table::{ProbeStats, StationTable};
pub use worker::{Worker, WorkerState, WorkerStatus};
