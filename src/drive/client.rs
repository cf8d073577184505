use reqwest::{header, Client, RequestBuilder, Response};
use serde::Deserialize;

use super::{FileMetadata, FilePage, RemoteStore};
use crate::{
    auth::Credential,
    error::{SyncError, TransportError},
};

/// Base URLs of the Drive v2 API
#[derive(Debug, Clone)]
pub struct DriveEndpoints {
    pub api_base_url: String,
    pub upload_base_url: String,
}

/// Response of `GET /about`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct About {
    root_folder_id: String,
}

/// Response of `GET /files`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    items: Vec<FileMetadata>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Drive v2 client over HTTP.
///
/// Calls are blocking: each request runs to completion on an owned tokio
/// runtime.
pub struct DriveClient {
    http: Client,
    endpoints: DriveEndpoints,
    access_token: String,
    runtime: tokio::runtime::Runtime,
}

impl DriveClient {
    pub fn new(endpoints: DriveEndpoints, credential: &Credential) -> Result<Self, SyncError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| TransportError::new("failed to start HTTP runtime").caused_by(e))?;

        let http = Client::builder()
            .user_agent(concat!("drive-script-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(TransportError::from)?;

        Ok(Self {
            http,
            endpoints,
            access_token: credential.access_token().to_string(),
            runtime,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoints.api_base_url.trim_end_matches('/'), path)
    }

    fn upload_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.endpoints.upload_base_url.trim_end_matches('/'),
            path
        )
    }

    /// Send `request` and return the successful response body as text
    fn send(&self, request: RequestBuilder) -> Result<String, SyncError> {
        let request = request.bearer_auth(&self.access_token);
        self.runtime.block_on(async {
            let response = request.send().await.map_err(TransportError::from)?;
            Self::read_body(response).await
        })
    }

    async fn read_body(response: Response) -> Result<String, SyncError> {
        let status = response.status();
        let url = response.url().to_string();
        let body = response.text().await.map_err(TransportError::from)?;

        if !status.is_success() {
            tracing::debug!("{} returned {}: {}", url, status, body);
            return Err(TransportError::with_status(status.as_u16(), body).into());
        }
        Ok(body)
    }

    fn send_json<T: for<'de> Deserialize<'de>>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, SyncError> {
        let body = self.send(request)?;
        serde_json::from_str(&body).map_err(|e| SyncError::MalformedResponse(e.to_string()))
    }
}

impl RemoteStore for DriveClient {
    fn root_id(&self) -> Result<String, SyncError> {
        let about: About = self.send_json(self.http.get(self.api_url("about")))?;
        Ok(about.root_folder_id)
    }

    fn get_metadata(&self, id: &str) -> Result<FileMetadata, SyncError> {
        tracing::debug!("fetching metadata for {}", id);
        self.send_json(self.http.get(self.api_url(&format!("files/{}", id))))
    }

    fn list_page(&self, query: &str, page_token: Option<&str>) -> Result<FilePage, SyncError> {
        let mut params = vec![("q", query)];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }

        let list: FileList = self.send_json(self.http.get(self.api_url("files")).query(&params))?;
        Ok(FilePage {
            items: list.items,
            next_page_token: list.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    fn update_content(
        &self,
        id: &str,
        mime_type: &str,
        body: &str,
    ) -> Result<FileMetadata, SyncError> {
        tracing::info!("uploading {} bytes to {}", body.len(), id);
        let request = self
            .http
            .put(self.upload_url(&format!("files/{}", id)))
            .query(&[("uploadType", "media")])
            .header(header::CONTENT_TYPE, mime_type)
            .body(body.to_string());
        self.send_json(request)
    }

    fn download(&self, url: &str) -> Result<String, SyncError> {
        tracing::debug!("downloading {}", url);
        self.send(self.http.get(url))
    }
}
