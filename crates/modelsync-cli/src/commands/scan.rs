use std::path::Path;

use anyhow::anyhow;
use modelsync_core::WorkflowDocument;
use modelsync_session::{ModelSession, ScanReport};
use tracing::debug;

use crate::cli::{OutputFormat, ScanArgs};
use crate::client::{AppContext, CliError, CliResult};
use crate::output::render_scan;

pub(crate) async fn handle_scan(
    ctx: &AppContext,
    args: ScanArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let ScanArgs { workflow } = args;
    let session = ctx.session(false);
    let report = scan_workflow(&session, &workflow).await?;
    render_scan(&report, format)
}

pub(crate) fn load_workflow(path: &Path) -> CliResult<WorkflowDocument> {
    let text = std::fs::read_to_string(path).map_err(|err| {
        CliError::failure(anyhow!("failed to read workflow {}: {err}", path.display()))
    })?;
    WorkflowDocument::from_json(&text).map_err(|err| {
        CliError::validation(format!("invalid workflow {}: {err}", path.display()))
    })
}

pub(crate) async fn scan_workflow(session: &ModelSession, path: &Path) -> CliResult<ScanReport> {
    let document = load_workflow(path)?;
    debug!(nodes = document.node_count(), path = %path.display(), "workflow loaded");
    Ok(session.start_scan(&document).await)
}
