//! `reqwest` implementation of [`ModelBackend`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use modelsync_core::{
    AvailableFiles, CancelResponse, Catalog, ModelBackend, ServerDownloadStatus, StartRequest,
    StartResponse,
};
use modelsync_events::DownloadId;
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{ClientError, ClientResult};

const OVERRIDE_FALLBACK_MESSAGE: &str = "file already exists";

/// HTTP backend talking to the download server extension.
#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    api_prefix: String,
    catalog_url: Option<Url>,
}

#[derive(Deserialize)]
struct ExtensionsBody {
    extensions: Vec<String>,
}

#[derive(Deserialize)]
struct FoldersBody {
    folders: Vec<String>,
}

#[derive(Deserialize, Default)]
struct StartBody {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    download_id: Option<String>,
    #[serde(default)]
    confirm_override: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize, Default)]
struct CancelBody {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

impl HttpBackend {
    /// Build a backend rooted at `base_url` using `api_prefix` for extension routes.
    #[must_use]
    pub fn new(client: Client, mut base_url: Url, api_prefix: &str) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            client,
            base_url,
            api_prefix: api_prefix.trim_matches('/').to_owned(),
            catalog_url: None,
        }
    }

    /// Fetch the model catalog from `catalog_url`.
    #[must_use]
    pub fn with_catalog_url(mut self, catalog_url: Option<Url>) -> Self {
        self.catalog_url = catalog_url;
        self
    }

    /// Server root all routes are resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn route(&self, route: &str) -> ClientResult<Url> {
        self.join(&format!("{}/{route}", self.api_prefix))
    }

    fn join(&self, path: &str) -> ClientResult<Url> {
        self.base_url
            .join(path)
            .map_err(|source| ClientError::Route {
                route: path.to_owned(),
                source,
            })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: Url,
    ) -> ClientResult<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| ClientError::Http { operation, source })?;
        decode_success(operation, response).await
    }

    async fn post_json<B: serde::Serialize + Sync, T: DeserializeOwned + Default>(
        &self,
        operation: &'static str,
        url: Url,
        body: &B,
    ) -> ClientResult<(StatusCode, T)> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|source| ClientError::Http { operation, source })?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|source| ClientError::Http { operation, source })?;
        if bytes.is_empty() {
            return Ok((status, T::default()));
        }
        match serde_json::from_slice(&bytes) {
            Ok(parsed) => Ok((status, parsed)),
            Err(source) if status.is_success() => Err(ClientError::Decode { operation, source }),
            Err(_) => Err(ClientError::Status {
                operation,
                status: status.as_u16(),
                detail: Some(String::from_utf8_lossy(&bytes).trim().to_owned())
                    .filter(|detail| !detail.is_empty()),
            }),
        }
    }

    /// Status of a single transfer, `None` when the server does not know it.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] on transport or decoding failures.
    pub async fn download_status(
        &self,
        id: &DownloadId,
    ) -> ClientResult<Option<ServerDownloadStatus>> {
        let operation = "download_status";
        let url = self.route(&format!("server_download/status/{}", id.as_str()))?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| ClientError::Http { operation, source })?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        decode_success(operation, response).await.map(Some)
    }
}

async fn decode_success<T: DeserializeOwned>(
    operation: &'static str,
    response: Response,
) -> ClientResult<T> {
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|source| ClientError::Http { operation, source })?;
    if !status.is_success() {
        return Err(ClientError::Status {
            operation,
            status: status.as_u16(),
            detail: error_detail(&bytes),
        });
    }
    serde_json::from_slice(&bytes).map_err(|source| ClientError::Decode { operation, source })
}

fn error_detail(bytes: &[u8]) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: String,
    }
    serde_json::from_slice::<ErrorBody>(bytes)
        .map(|body| body.error)
        .ok()
        .or_else(|| Some(String::from_utf8_lossy(bytes).trim().to_owned()))
        .filter(|detail| !detail.is_empty())
}

#[async_trait]
impl ModelBackend for HttpBackend {
    async fn fetch_catalog(&self) -> anyhow::Result<Catalog> {
        let url = self.catalog_url.clone().ok_or(ClientError::Unsupported {
            operation: "fetch_catalog",
        })?;
        Ok(self.get_json("fetch_catalog", url).await?)
    }

    async fn fetch_supported_extensions(&self) -> anyhow::Result<Vec<String>> {
        let url = self.route("supported_extensions")?;
        let body: ExtensionsBody = self.get_json("fetch_supported_extensions", url).await?;
        Ok(body.extensions)
    }

    async fn fetch_destination_folders(&self) -> anyhow::Result<Vec<String>> {
        let url = self.route("folder_names")?;
        let body: FoldersBody = self.get_json("fetch_destination_folders", url).await?;
        Ok(body.folders)
    }

    async fn fetch_available_files(&self) -> anyhow::Result<AvailableFiles> {
        let operation = "fetch_available_files";
        let folders: Vec<String> = self.get_json(operation, self.join("models")?).await?;
        let mut index = AvailableFiles::new();
        for folder in folders {
            let url = self.join(&format!("models/{folder}"))?;
            match self.get_json::<Vec<String>>(operation, url).await {
                Ok(files) => {
                    for file in &files {
                        index.insert(folder.clone(), file);
                    }
                }
                Err(ClientError::Status { status, .. }) => {
                    debug!(folder = %folder, status, "folder listing unavailable");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(index)
    }

    async fn request_start(&self, request: StartRequest) -> anyhow::Result<StartResponse> {
        let operation = "request_start";
        let url = self.route("server_download/start")?;
        let (status, body): (_, StartBody) = self.post_json(operation, url, &request).await?;
        if body.confirm_override {
            return Ok(StartResponse::ConfirmOverride {
                message: body
                    .message
                    .unwrap_or_else(|| OVERRIDE_FALLBACK_MESSAGE.to_owned()),
            });
        }
        if let Some(error) = body.error {
            return Ok(StartResponse::Rejected { error });
        }
        match body.download_id {
            Some(download_id) if body.success || status.is_success() => {
                Ok(StartResponse::Started {
                    download_id: download_id.into(),
                })
            }
            _ if status.is_success() => {
                warn!(%status, "start response carried no identifier");
                Ok(StartResponse::Started {
                    download_id: request.candidate_id(),
                })
            }
            _ => Ok(StartResponse::Rejected {
                error: format!("request failed with status {status}"),
            }),
        }
    }

    async fn request_cancel(&self, id: &DownloadId) -> anyhow::Result<CancelResponse> {
        let operation = "request_cancel";
        let url = self.route("server_download/cancel")?;
        let payload = serde_json::json!({ "download_id": id });
        let (status, body): (_, CancelBody) = self.post_json(operation, url, &payload).await?;
        if let Some(error) = body.error {
            return Ok(CancelResponse::Rejected { error });
        }
        if body.success || status.is_success() {
            Ok(CancelResponse::Cancelled)
        } else {
            Ok(CancelResponse::Rejected {
                error: format!("request failed with status {status}"),
            })
        }
    }

    async fn fetch_status(&self) -> anyhow::Result<BTreeMap<DownloadId, ServerDownloadStatus>> {
        let url = self.route("server_download/status")?;
        Ok(self.get_json("fetch_status", url).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_live_under_the_prefix() {
        let base: Url = "http://127.0.0.1:8188/comfy".parse().expect("url");
        let backend = HttpBackend::new(Client::new(), base, "/abc/");
        assert_eq!(
            backend
                .route("server_download/start")
                .expect("route")
                .as_str(),
            "http://127.0.0.1:8188/comfy/abc/server_download/start"
        );
        assert_eq!(
            backend.join("models/loras").expect("route").as_str(),
            "http://127.0.0.1:8188/comfy/models/loras"
        );
    }

    #[test]
    fn error_detail_prefers_error_field() {
        assert_eq!(
            error_detail(br#"{"error": "bad folder"}"#).as_deref(),
            Some("bad folder")
        );
        assert_eq!(error_detail(b" oops ").as_deref(), Some("oops"));
        assert_eq!(error_detail(b""), None);
    }
}
