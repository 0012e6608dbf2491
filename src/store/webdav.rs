//! WebDAV destination
//!
//! Uploads are sent with an explicit `Content-Length`. Some servers (notably
//! Nextcloud behind its default nginx configuration) mishandle chunked
//! request bodies, so the whole object is always handed to reqwest as a
//! single `Bytes` body.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};

use super::error::StoreError;
use super::traits::DestinationStore;

pub struct WebDavStore {
    client: Client,
    base_url: String,
    username: String,
    password: String,
    name: String,
}

impl WebDavStore {
    pub fn new(url: &str, username: &str, password: &str) -> Result<Self, StoreError> {
        Ok(Self::with_client(Client::builder().build()?, url, username, password))
    }

    pub fn with_client(client: Client, url: &str, username: &str, password: &str) -> Self {
        let base_url = url.trim_end_matches('/').to_string();
        Self {
            client,
            name: format!("webdav:{base_url}"),
            base_url,
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .basic_auth(&self.username, Some(&self.password))
    }

    fn method(name: &'static str) -> Result<Method, StoreError> {
        Method::from_bytes(name.as_bytes()).map_err(|e| StoreError::Other(e.to_string()))
    }
}

/// Cumulative collection paths for `path`: `/a/b` -> [`/a/`, `/a/b/`]
pub(crate) fn collection_paths(path: &str) -> Vec<String> {
    let mut current = String::from("/");
    let mut paths = Vec::new();
    for component in path.split('/').filter(|c| !c.is_empty()) {
        current.push_str(component);
        current.push('/');
        paths.push(current.clone());
    }
    paths
}

#[async_trait]
impl DestinationStore for WebDavStore {
    async fn ensure_directory(&self, path: &str) -> Result<(), StoreError> {
        let mkcol = Self::method("MKCOL")?;
        for collection in collection_paths(path) {
            let status = self.request(mkcol.clone(), &collection).send().await?.status();
            match status {
                // 405: collection already exists
                s if s.is_success() || s == StatusCode::METHOD_NOT_ALLOWED => {}
                s => {
                    return Err(StoreError::Status {
                        op: "MKCOL",
                        path: collection,
                        status: s.as_u16(),
                    })
                }
            }
        }
        Ok(())
    }

    async fn write_full(&self, path: &str, content: Bytes) -> Result<(), StoreError> {
        let length = content.len();
        let status = self
            .request(Method::PUT, path)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, length)
            .body(content)
            .send()
            .await?
            .status();

        if !status.is_success() {
            return Err(StoreError::Status {
                op: "PUT",
                path: path.to_string(),
                status: status.as_u16(),
            });
        }
        log::debug!("PUT {path} ({length} bytes) -> {status}");
        Ok(())
    }

    async fn stat(&self, path: &str) -> Result<u64, StoreError> {
        let response = self.request(Method::HEAD, path).send().await?;
        match response.status() {
            s if s.is_success() => {}
            StatusCode::NOT_FOUND => return Err(StoreError::NotFound(path.to_string())),
            s => {
                return Err(StoreError::Status {
                    op: "HEAD",
                    path: path.to_string(),
                    status: s.as_u16(),
                })
            }
        }

        response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| StoreError::Other(format!("HEAD {path}: missing content length")))
    }

    async fn probe(&self) -> Result<(), StoreError> {
        let status = self
            .request(Self::method("PROPFIND")?, "/")
            .header("Depth", "0")
            .send()
            .await?
            .status();
        if !status.is_success() {
            return Err(StoreError::Status {
                op: "PROPFIND",
                path: self.base_url.clone(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
