pub mod constants;
pub mod fixed_point;
pub mod progress;

pub use constants::*;
pub use fixed_point::{format_tenths, mean_tenths};
pub use progress::ProgressReporter;
