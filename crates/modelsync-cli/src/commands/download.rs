use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use anyhow::anyhow;
use modelsync_client::StatusPoller;
use modelsync_core::{DownloadRecord, DownloadStatus};
use modelsync_events::{DownloadId, EventBus};
use modelsync_session::{ModelSession, StartOutcome};

use crate::cli::{DownloadArgs, FetchArgs, OutputFormat};
use crate::client::{AppContext, CliError, CliResult};
use crate::commands::scan::scan_workflow;
use crate::output::{progress_line, render_downloads};

/// Terminal state of every followed transfer.
#[derive(Debug, Default)]
pub(crate) struct FollowReport {
    pub(crate) finished: Vec<DownloadRecord>,
    pub(crate) cancelled: Vec<DownloadId>,
}

impl FollowReport {
    fn failures(&self) -> usize {
        self.cancelled.len()
            + self
                .finished
                .iter()
                .filter(|record| record.status == DownloadStatus::Error)
                .count()
    }
}

pub(crate) async fn handle_download(
    ctx: &AppContext,
    args: DownloadArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let DownloadArgs {
        url,
        folder,
        path,
        yes,
        no_follow,
    } = args;
    let session = ctx.session(yes);
    let download_id = match session.start_download(&url, &folder, &path, false).await? {
        StartOutcome::Declined => {
            println!("kept existing file; nothing downloaded");
            return Ok(());
        }
        StartOutcome::Started { download_id } => download_id,
    };
    println!("started {download_id}");
    if no_follow {
        return Ok(());
    }

    let report = follow_downloads(ctx, &session, vec![download_id]).await;
    render_downloads(&report.finished, format)?;
    if report.failures() > 0 {
        return Err(CliError::failure(anyhow!(
            "download did not complete: {}",
            failure_detail(&report)
        )));
    }
    Ok(())
}

pub(crate) async fn handle_fetch(
    ctx: &AppContext,
    args: FetchArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let FetchArgs {
        workflow,
        yes,
        no_follow,
    } = args;
    let session = ctx.session(yes);
    let report = scan_workflow(&session, &workflow).await?;

    let mut started = Vec::new();
    let mut failures = 0_usize;
    for entry in report.downloadable() {
        let reference = &entry.reference;
        let (Some(url), Some(folder)) = (
            reference.source_url.as_deref(),
            reference.destination_folder.as_deref(),
        ) else {
            continue;
        };
        match session
            .start_download(url, folder, &reference.relative_path, false)
            .await
        {
            Ok(StartOutcome::Started { download_id }) => {
                println!("started {download_id}");
                started.push(download_id);
            }
            Ok(StartOutcome::Declined) => println!("kept existing {}", reference.relative_path),
            Err(err) => {
                failures += 1;
                let err = CliError::from(err);
                eprintln!(
                    "failed to start {}: {}",
                    reference.relative_path,
                    err.display_message()
                );
            }
        }
    }

    if started.is_empty() && failures == 0 {
        println!("nothing to download");
        return Ok(());
    }
    if !no_follow && !started.is_empty() {
        let followed = follow_downloads(ctx, &session, started).await;
        render_downloads(&followed.finished, format)?;
        failures += followed.failures();
    }
    if failures > 0 {
        return Err(CliError::failure(anyhow!("{failures} downloads failed")));
    }
    Ok(())
}

/// Poll server status onto a bus and wait until every id reaches a terminal state.
pub(crate) async fn follow_downloads(
    ctx: &AppContext,
    session: &Arc<ModelSession>,
    ids: Vec<DownloadId>,
) -> FollowReport {
    let bus = EventBus::new();
    let listener = session.spawn_event_listener(&bus);
    let poller = StatusPoller::new(ctx.dyn_backend(), bus.clone(), ctx.poll_interval).spawn();

    let mut pending: BTreeSet<DownloadId> = ids.into_iter().collect();
    let mut shown: HashMap<DownloadId, (DownloadStatus, u8)> = HashMap::new();
    let mut report = FollowReport::default();
    let mut ticker = tokio::time::interval(ctx.poll_interval);
    while !pending.is_empty() {
        ticker.tick().await;
        let waiting: Vec<DownloadId> = pending.iter().cloned().collect();
        for id in waiting {
            if let Some(record) = session.download(&id).await {
                let key = (record.status, record.progress);
                if shown.insert(id.clone(), key) != Some(key) {
                    eprintln!("{}", progress_line(&record));
                }
                if record.status.is_terminal() {
                    pending.remove(&id);
                    report.finished.push(record);
                }
            } else {
                eprintln!("{id}: cancelled");
                pending.remove(&id);
                report.cancelled.push(id);
            }
        }
    }

    poller.abort();
    listener.abort();
    report
}

fn failure_detail(report: &FollowReport) -> String {
    report
        .finished
        .iter()
        .filter(|record| record.status == DownloadStatus::Error)
        .map(|record| {
            format!(
                "{}: {}",
                record.id,
                record.error_message.as_deref().unwrap_or("unknown error")
            )
        })
        .chain(report.cancelled.iter().map(|id| format!("{id}: cancelled")))
        .collect::<Vec<_>>()
        .join("; ")
}
