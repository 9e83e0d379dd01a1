pub mod report_writer;

pub use report_writer::{write_json, write_report, write_text, OutputFormat};
