pub mod args;
pub mod commands;

pub use args::{Cli, Commands, EngineArgs};
pub use commands::run;
