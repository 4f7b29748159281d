use anyhow::Result;
use serde::Serialize;
use std::io::Write;

use crate::config::OutputFormat;

/// One line of the final report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreetTotal<'a> {
    pub street: &'a str,
    pub total: i64,
}

/// Writes sorted `(street, total)` entries in one output format
pub trait ReportFormatter {
    fn write_report(&self, entries: &[(String, i64)], out: &mut dyn Write) -> Result<()>;
}

pub fn create_formatter(format: OutputFormat) -> Box<dyn ReportFormatter> {
    match format {
        OutputFormat::Default => Box::new(DefaultFormatter),
        OutputFormat::Csv => Box::new(CsvFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

// Default formatter: "KING: 100"
pub struct DefaultFormatter;

impl ReportFormatter for DefaultFormatter {
    fn write_report(&self, entries: &[(String, i64)], out: &mut dyn Write) -> Result<()> {
        for (street, total) in entries {
            writeln!(out, "{}: {}", street, total)?;
        }
        Ok(())
    }
}

// CSV formatter with a street,total header
pub struct CsvFormatter;

impl ReportFormatter for CsvFormatter {
    fn write_report(&self, entries: &[(String, i64)], out: &mut dyn Write) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(out);
        writer.write_record(["street", "total"])?;
        for (street, total) in entries {
            writer.serialize(StreetTotal {
                street,
                total: *total,
            })?;
        }
        writer.flush()?;
        Ok(())
    }
}

// JSON formatter: one pretty-printed array
pub struct JsonFormatter;

impl ReportFormatter for JsonFormatter {
    fn write_report(&self, entries: &[(String, i64)], out: &mut dyn Write) -> Result<()> {
        let rows: Vec<StreetTotal<'_>> = entries
            .iter()
            .map(|(street, total)| StreetTotal {
                street,
                total: *total,
            })
            .collect();
        serde_json::to_writer_pretty(&mut *out, &rows)?;
        writeln!(out)?;
        Ok(())
    }
}
