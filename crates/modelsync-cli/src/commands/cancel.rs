use anyhow::anyhow;
use modelsync_core::{CancelResponse, ModelBackend, ServerTransferState};
use modelsync_events::DownloadId;

use crate::cli::CancelArgs;
use crate::client::{AppContext, CliError, CliResult};
use crate::output::state_to_str;

/// Cancel a transfer started by any client; the server status is the authority.
pub(crate) async fn handle_cancel(ctx: &AppContext, args: CancelArgs) -> CliResult<()> {
    let CancelArgs { download_id } = args;
    let id = DownloadId::from(download_id.trim());
    let status = ctx
        .backend
        .download_status(&id)
        .await
        .map_err(CliError::failure)?
        .ok_or_else(|| CliError::validation(format!("download {id} not found")))?;
    if matches!(
        status.status,
        ServerTransferState::Completed | ServerTransferState::Error | ServerTransferState::Cancelled
    ) {
        return Err(CliError::validation(format!(
            "download {id} already {}",
            state_to_str(status.status)
        )));
    }

    match ctx.backend.request_cancel(&id).await {
        Ok(CancelResponse::Cancelled) => {
            ctx.metrics.inc_download("cancelled");
            println!("cancelled {id}");
            Ok(())
        }
        Ok(CancelResponse::Rejected { error }) => Err(CliError::failure(anyhow!(error))),
        Err(err) => Err(CliError::failure(err.context("cancel request failed"))),
    }
}
