//! Output renderers and formatting helpers for CLI commands.

use std::collections::BTreeMap;

use anyhow::anyhow;
use modelsync_core::{DownloadRecord, ServerDownloadStatus, ServerTransferState};
use modelsync_events::DownloadId;
use modelsync_session::ScanReport;
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
    println!("{text}");
    Ok(())
}

pub(crate) fn render_scan(report: &ScanReport, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(report)?,
        OutputFormat::Table => {
            println!("{:<48} {:<18} {:<8} URL", "FILE", "FOLDER", "PRESENT");
            for entry in &report.entries {
                let reference = &entry.reference;
                println!(
                    "{:<48} {:<18} {:<8} {}",
                    reference.relative_path,
                    reference.destination_folder.as_deref().unwrap_or("-"),
                    if entry.already_present { "yes" } else { "no" },
                    reference.source_url.as_deref().unwrap_or("-")
                );
            }
            let missing = report
                .entries
                .iter()
                .filter(|entry| !entry.already_present)
                .count();
            println!(
                "{} references, {missing} missing, {} downloadable",
                report.entries.len(),
                report.downloadable().count()
            );
        }
    }
    Ok(())
}

pub(crate) fn render_downloads(records: &[DownloadRecord], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(records)?,
        OutputFormat::Table => {
            println!("{:<48} {:<12} {:>5} DETAIL", "ID", "STATUS", "PROG");
            for record in records {
                let detail = record
                    .error_message
                    .as_deref()
                    .or(record.final_path.as_deref())
                    .unwrap_or("");
                println!(
                    "{:<48} {:<12} {:>4}% {}",
                    record.id,
                    record.status.as_str(),
                    record.progress,
                    detail
                );
            }
        }
    }
    Ok(())
}

pub(crate) fn render_status(
    statuses: &BTreeMap<DownloadId, ServerDownloadStatus>,
    format: OutputFormat,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(statuses)?,
        OutputFormat::Table => {
            println!("{:<48} {:<12} {:>7} {:>21}", "ID", "STATE", "PROG", "BYTES");
            for (id, status) in statuses {
                println!(
                    "{:<48} {:<12} {:>6.1}% {:>21}",
                    id,
                    state_to_str(status.status),
                    status.progress,
                    format!(
                        "{}/{}",
                        format_bytes(status.downloaded),
                        format_bytes(status.total)
                    )
                );
                if let Some(error) = &status.error {
                    println!("  reason: {error}");
                }
            }
        }
    }
    Ok(())
}

pub(crate) fn progress_line(record: &DownloadRecord) -> String {
    let mut line = format!(
        "{}: {} {}%",
        record.id,
        record.status.as_str(),
        record.progress
    );
    if record.bytes_total > 0 {
        line.push_str(&format!(
            " ({}/{})",
            format_bytes(record.bytes_downloaded),
            format_bytes(record.bytes_total)
        ));
    }
    line
}

pub(crate) const fn state_to_str(state: ServerTransferState) -> &'static str {
    match state {
        ServerTransferState::Queued => "queued",
        ServerTransferState::Downloading => "downloading",
        ServerTransferState::Completed => "completed",
        ServerTransferState::Error => "error",
        ServerTransferState::Cancelled => "cancelled",
    }
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} {}", UNITS[0])
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use modelsync_core::DownloadStatus;

    fn record(status: DownloadStatus, progress: u8) -> DownloadRecord {
        let mut record =
            DownloadRecord::queued("checkpoints/model.safetensors".into(), Utc::now());
        record.status = status;
        record.progress = progress;
        record
    }

    #[test]
    fn format_bytes_scales_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.0 GiB");
    }

    #[test]
    fn progress_line_includes_sizes_when_known() {
        let mut record = record(DownloadStatus::Downloading, 40);
        assert_eq!(
            progress_line(&record),
            "checkpoints/model.safetensors: downloading 40%"
        );
        record.bytes_downloaded = 2048;
        record.bytes_total = 4096;
        assert_eq!(
            progress_line(&record),
            "checkpoints/model.safetensors: downloading 40% (2.0 KiB/4.0 KiB)"
        );
    }

    #[test]
    fn server_states_render_lowercase() {
        assert_eq!(state_to_str(ServerTransferState::Cancelled), "cancelled");
        assert_eq!(state_to_str(ServerTransferState::Downloading), "downloading");
    }
}
