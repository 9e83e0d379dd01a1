pub mod entry;
pub mod report;

pub use entry::StationEntry;
pub use report::{StationReport, StationSummary};
