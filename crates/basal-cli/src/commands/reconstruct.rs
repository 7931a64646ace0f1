//! Implementation of the `basal reconstruct` command.
//!
//! Reads a sorted device event stream (JSON array or JSONL), runs the
//! reconstruction pipeline, and writes the resulting record stream to
//! stdout.

use std::fs;
use std::io::{BufWriter, Read, Write, stdout};
use std::path::Path;

use anyhow::{Context, Result};

use basal_core::{DeviceEvent, Record, reconstruct, reconstruct_with_boluses};

/// Run the reconstruct command.
pub fn run(input: Option<&Path>, pretty: bool, boluses: bool) -> Result<()> {
    let text = match input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read stdin")?;
            buffer
        }
    };

    let events = parse_events(&text)?;
    tracing::debug!(events = events.len(), boluses, "parsed input stream");

    let records = if boluses {
        reconstruct_with_boluses(events)?
    } else {
        reconstruct(events)?
    };

    write_records(&records, pretty)
}

/// Parses the input as a JSON array when it starts with `[`, JSONL
/// otherwise.
fn parse_events(text: &str) -> Result<Vec<DeviceEvent>> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).context("failed to parse event array");
    }

    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("failed to parse event on line {}", number + 1))
        })
        .collect()
}

/// Writes records as JSONL, or as one pretty-printed array with `--pretty`.
fn write_records(records: &[Record], pretty: bool) -> Result<()> {
    let stdout = stdout();
    let mut writer = BufWriter::new(stdout.lock());

    if pretty {
        serde_json::to_writer_pretty(&mut writer, records)
            .context("failed to serialize records")?;
        let _ = writeln!(writer);
        return Ok(());
    }

    for record in records {
        serde_json::to_writer(&mut writer, record).context("failed to serialize record")?;
        // Handle broken pipe gracefully (e.g., when piped to `head`)
        if writeln!(writer).is_err() {
            break;
        }
    }

    Ok(())
}
