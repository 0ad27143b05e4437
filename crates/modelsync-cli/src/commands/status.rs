use std::collections::BTreeMap;

use modelsync_core::ModelBackend;
use modelsync_events::DownloadId;

use crate::cli::{OutputFormat, StatusArgs};
use crate::client::{AppContext, CliError, CliResult};
use crate::output::render_status;

pub(crate) async fn handle_status(
    ctx: &AppContext,
    args: StatusArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let statuses = match args.download_id {
        Some(raw) => {
            let id = DownloadId::from(raw.trim());
            let status = ctx
                .backend
                .download_status(&id)
                .await
                .map_err(CliError::failure)?
                .ok_or_else(|| CliError::validation(format!("download {id} not found")))?;
            BTreeMap::from([(id, status)])
        }
        None => ctx
            .backend
            .fetch_status()
            .await
            .map_err(|err| CliError::failure(err.context("status request failed")))?,
    };
    render_status(&statuses, format)
}
