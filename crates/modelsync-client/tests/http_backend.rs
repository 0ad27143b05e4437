use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use httpmock::MockServer;
use httpmock::prelude::*;
use modelsync_client::{HttpBackend, StatusPoller};
use modelsync_core::{
    CancelResponse, ModelBackend, ServerTransferState, StartRequest, StartResponse,
};
use modelsync_events::{DownloadId, Event, EventBus};
use reqwest::Client;
use serde_json::json;

const PREFIX: &str = "test-prefix";

fn backend(server: &MockServer) -> Result<HttpBackend> {
    Ok(HttpBackend::new(
        Client::new(),
        server.base_url().parse()?,
        PREFIX,
    ))
}

fn start_request() -> StartRequest {
    StartRequest {
        url: "https://host/base.safetensors".into(),
        folder: "checkpoints".into(),
        relative_path: "sdxl/base.safetensors".into(),
        overwrite: false,
    }
}

#[tokio::test]
async fn lists_extensions_and_folders() -> Result<()> {
    let server = MockServer::start_async().await;
    let extensions = server.mock(|when, then| {
        when.method(GET).path("/test-prefix/supported_extensions");
        then.status(200)
            .json_body(json!({"success": true, "extensions": [".safetensors", ".ckpt"]}));
    });
    let folders = server.mock(|when, then| {
        when.method(GET).path("/test-prefix/folder_names");
        then.status(200)
            .json_body(json!({"success": true, "folders": ["checkpoints", "loras"]}));
    });

    let backend = backend(&server)?;
    assert_eq!(
        backend.fetch_supported_extensions().await?,
        vec![".safetensors".to_string(), ".ckpt".to_string()]
    );
    assert_eq!(
        backend.fetch_destination_folders().await?,
        vec!["checkpoints".to_string(), "loras".to_string()]
    );
    extensions.assert();
    folders.assert();
    Ok(())
}

#[tokio::test]
async fn failure_status_surfaces_as_error() -> Result<()> {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET).path("/test-prefix/folder_names");
        then.status(500).json_body(json!({"error": "boom"}));
    });
    let backend = backend(&server)?;
    assert!(backend.fetch_destination_folders().await.is_err());
    Ok(())
}

#[tokio::test]
async fn list_bodies_without_their_field_are_decode_errors() -> Result<()> {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET).path("/test-prefix/supported_extensions");
        then.status(200).json_body(json!({"unexpected": 1}));
    });
    server.mock(|when, then| {
        when.method(GET).path("/test-prefix/folder_names");
        then.status(200).json_body(json!({"success": false}));
    });

    let backend = backend(&server)?;
    assert!(backend.fetch_supported_extensions().await.is_err());
    assert!(backend.fetch_destination_folders().await.is_err());
    Ok(())
}

#[tokio::test]
async fn available_files_skip_unknown_folders() -> Result<()> {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET).path("/models");
        then.status(200).json_body(json!(["loras", "configs"]));
    });
    server.mock(|when, then| {
        when.method(GET).path("/models/loras");
        then.status(200)
            .json_body(json!(["character/sub/x.safetensors", "y.safetensors"]));
    });
    server.mock(|when, then| {
        when.method(GET).path("/models/configs");
        then.status(404);
    });

    let index = backend(&server)?.fetch_available_files().await?;
    assert!(index.is_present("loras", "sub/x.safetensors"));
    assert!(index.is_present("loras", "y.safetensors"));
    assert!(index.files("configs").is_none());
    Ok(())
}

#[tokio::test]
async fn catalog_requires_configured_url() -> Result<()> {
    let server = MockServer::start_async().await;
    let catalog = server.mock(|when, then| {
        when.method(GET).path("/catalog.json");
        then.status(200).json_body(json!({
            "models": [{"filename": "a.pt", "url": "https://host/a.pt", "directory": "vae", "type": "vae"}]
        }));
    });

    let bare = backend(&server)?;
    assert!(bare.fetch_catalog().await.is_err());

    let configured =
        backend(&server)?.with_catalog_url(Some(format!("{}/catalog.json", server.base_url()).parse()?));
    let fetched = configured.fetch_catalog().await?;
    assert_eq!(fetched.models.len(), 1);
    assert_eq!(fetched.models[0].save_path.as_deref(), Some("vae"));
    catalog.assert();
    Ok(())
}

#[tokio::test]
async fn start_maps_each_response_shape() -> Result<()> {
    let server = MockServer::start_async().await;
    let mut started = server.mock(|when, then| {
        when.method(POST)
            .path("/test-prefix/server_download/start")
            .json_body(json!({
                "url": "https://host/base.safetensors",
                "save_path": "checkpoints",
                "filename": "sdxl/base.safetensors",
                "override": false
            }));
        then.status(200).json_body(json!({
            "success": true,
            "download_id": "checkpoints/sdxl/base.safetensors",
            "message": "Download queued"
        }));
    });
    let backend = backend(&server)?;
    assert_eq!(
        backend.request_start(start_request()).await?,
        StartResponse::Started {
            download_id: DownloadId::from("checkpoints/sdxl/base.safetensors")
        }
    );
    started.delete();

    let mut conflict = server.mock(|when, then| {
        when.method(POST).path("/test-prefix/server_download/start");
        then.status(200).json_body(json!({
            "confirm_override": true,
            "message": "File already exists: sdxl/base.safetensors",
            "path": "/models/checkpoints/sdxl/base.safetensors"
        }));
    });
    assert_eq!(
        backend.request_start(start_request()).await?,
        StartResponse::ConfirmOverride {
            message: "File already exists: sdxl/base.safetensors".into()
        }
    );
    conflict.delete();

    server.mock(|when, then| {
        when.method(POST).path("/test-prefix/server_download/start");
        then.status(400)
            .json_body(json!({"error": "Invalid save_path: nowhere not found in folder_paths"}));
    });
    assert!(matches!(
        backend.request_start(start_request()).await?,
        StartResponse::Rejected { ref error } if error.starts_with("Invalid save_path")
    ));
    Ok(())
}

#[tokio::test]
async fn cancel_reports_server_errors() -> Result<()> {
    let server = MockServer::start_async().await;
    let mut accepted = server.mock(|when, then| {
        when.method(POST)
            .path("/test-prefix/server_download/cancel")
            .json_body(json!({"download_id": "vae/a.pt"}));
        then.status(200)
            .json_body(json!({"success": true, "message": "Download cancelled"}));
    });
    let backend = backend(&server)?;
    let id = DownloadId::from("vae/a.pt");
    assert_eq!(backend.request_cancel(&id).await?, CancelResponse::Cancelled);
    accepted.delete();

    server.mock(|when, then| {
        when.method(POST).path("/test-prefix/server_download/cancel");
        then.status(500).json_body(json!({"error": "worker gone"}));
    });
    assert_eq!(
        backend.request_cancel(&id).await?,
        CancelResponse::Rejected {
            error: "worker gone".into()
        }
    );
    Ok(())
}

#[tokio::test]
async fn single_status_lookup_handles_missing_entries() -> Result<()> {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET)
            .path("/test-prefix/server_download/status/vae/a.pt");
        then.status(200)
            .json_body(json!({"status": "downloading", "progress": 12.5, "downloaded": 125, "total": 1000}));
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/test-prefix/server_download/status/vae/missing.pt");
        then.status(404).json_body(json!({"error": "Download not found"}));
    });

    let backend = backend(&server)?;
    let status = backend
        .download_status(&DownloadId::from("vae/a.pt"))
        .await?
        .expect("known entry");
    assert_eq!(status.status, ServerTransferState::Downloading);
    assert_eq!(status.downloaded, 125);
    assert!(
        backend
            .download_status(&DownloadId::from("vae/missing.pt"))
            .await?
            .is_none()
    );
    Ok(())
}

#[tokio::test]
async fn poller_publishes_only_changes() -> Result<()> {
    let server = MockServer::start_async().await;
    let mut first = server.mock(|when, then| {
        when.method(GET).path("/test-prefix/server_download/status");
        then.status(200).json_body(json!({
            "vae/a.pt": {"status": "downloading", "progress": 50, "downloaded": 50, "total": 100},
            "vae/b.pt": {"status": "queued", "progress": 0}
        }));
    });

    let bus = EventBus::with_capacity(16);
    let mut stream = bus.subscribe(None);
    let mut poller = StatusPoller::new(
        Arc::new(backend(&server)?),
        bus.clone(),
        Duration::from_millis(10),
    );
    assert_eq!(poller.poll_once().await?, 1);
    assert_eq!(poller.poll_once().await?, 0);
    first.delete();

    server.mock(|when, then| {
        when.method(GET).path("/test-prefix/server_download/status");
        then.status(200).json_body(json!({
            "vae/a.pt": {"status": "completed", "progress": 100, "downloaded": 100, "total": 100, "output_path": "/models/vae/a.pt"},
            "vae/b.pt": {"status": "queued", "progress": 0}
        }));
    });
    assert_eq!(poller.poll_once().await?, 1);

    let progress = stream.next().await.expect("open")?;
    assert!(matches!(progress.event, Event::Progress { .. }));
    let completed = stream.next().await.expect("open")?;
    assert!(matches!(completed.event, Event::Completed { .. }));
    assert!(completed.id > progress.id);
    Ok(())
}
