use std::io::{self, Write};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use yieldscan_core::{Degradation, SymbolFailure, UtcDateTime};

use crate::cli::OutputFormat;
use crate::commands::CommandResult;
use crate::error::CliError;

/// Standard response envelope for every machine-readable output.
#[derive(Debug, Serialize)]
pub struct Envelope {
    pub meta: EnvelopeMeta,
    pub data: Value,
    pub errors: Vec<SymbolFailure>,
    #[serde(skip)]
    pub table: Table,
}

#[derive(Debug, Serialize)]
pub struct EnvelopeMeta {
    pub request_id: String,
    pub generated_at: UtcDateTime,
    pub latency_ms: u64,
    pub degraded: Vec<Degradation>,
}

impl Envelope {
    pub fn new(result: CommandResult, latency: Duration) -> Self {
        Self {
            meta: EnvelopeMeta {
                request_id: uuid::Uuid::new_v4().to_string(),
                generated_at: UtcDateTime::now(),
                latency_ms: u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                degraded: result.degraded,
            },
            data: result.data,
            errors: result.failures,
            table: result.table,
        }
    }
}

/// Column-aligned text rendering of a command's primary records.
#[derive(Debug, Default)]
pub struct Table {
    headers: Vec<&'static str>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            headers: headers.into_iter().collect(),
            rows: Vec::new(),
        }
    }

    pub fn with_rows(mut self, rows: impl IntoIterator<Item = Vec<String>>) -> Self {
        self.rows.extend(rows);
        self
    }

    fn write_to(&self, out: &mut impl Write) -> io::Result<()> {
        let mut widths: Vec<usize> = self.headers.iter().map(|header| header.len()).collect();
        for row in &self.rows {
            for (index, cell) in row.iter().enumerate() {
                if let Some(width) = widths.get_mut(index) {
                    *width = (*width).max(cell.len());
                }
            }
        }

        let header: Vec<String> = self.headers.iter().map(|header| header.to_string()).collect();
        write_row(out, &header, &widths)?;
        let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
        write_row(out, &rule, &widths)?;
        for row in &self.rows {
            write_row(out, row, &widths)?;
        }
        Ok(())
    }
}

fn write_row(out: &mut impl Write, cells: &[String], widths: &[usize]) -> io::Result<()> {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ");
    writeln!(out, "{}", line.trim_end())
}

pub fn render(envelope: &Envelope, format: OutputFormat, pretty: bool) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match format {
        OutputFormat::Json => {
            let payload = if pretty {
                serde_json::to_string_pretty(envelope)?
            } else {
                serde_json::to_string(envelope)?
            };
            writeln!(out, "{payload}")?;
        }
        OutputFormat::Table => render_table(envelope, &mut out)?,
    }

    Ok(())
}

fn render_table(envelope: &Envelope, out: &mut impl Write) -> Result<(), CliError> {
    envelope.table.write_to(out)?;

    if !envelope.meta.degraded.is_empty() {
        writeln!(out)?;
        writeln!(out, "degraded:")?;
        for degradation in &envelope.meta.degraded {
            writeln!(
                out,
                "  - {} {} {}: {}",
                degradation.provider,
                degradation.market,
                degradation.endpoint,
                serde_json::to_string(&degradation.reason)?
            )?;
        }
    }

    if !envelope.errors.is_empty() {
        writeln!(out)?;
        writeln!(out, "errors:")?;
        for failure in &envelope.errors {
            writeln!(
                out,
                "  - {}: {} ({})",
                failure.symbol,
                failure.error.message(),
                failure.kind()
            )?;
        }
    }

    writeln!(
        out,
        "\nrequest_id={} latency_ms={}",
        envelope.meta.request_id, envelope.meta.latency_ms
    )?;
    Ok(())
}
