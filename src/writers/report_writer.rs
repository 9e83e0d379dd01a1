use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::error::Result;
use crate::models::StationReport;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One `name=min/mean/max` line per station
    #[default]
    Text,
    /// The full report as a JSON document
    Json,
}

pub fn write_report<W: Write>(report: &StationReport, format: OutputFormat, out: &mut W) -> Result<()> {
    match format {
        OutputFormat::Text => write_text(report, out),
        OutputFormat::Json => write_json(report, out),
    }
}

pub fn write_text<W: Write>(report: &StationReport, out: &mut W) -> Result<()> {
    for line in report.lines() {
        writeln!(out, "{}", line)?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_json<W: Write>(report: &StationReport, out: &mut W) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}
