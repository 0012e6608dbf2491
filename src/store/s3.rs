use async_trait::async_trait;
use bytes::Bytes;
use s3::creds::Credentials;
use s3::{Bucket, Region};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::error::StoreError;
use super::traits::{DestinationStore, SourceEntry, SourceStore};

/// Bucket-backed store (S3 or MinIO)
///
/// As a source it lists one "directory level" below `prefix`; common prefixes
/// are reported as directories and skipped by the poller.
pub struct S3Store {
    bucket: Bucket,
    prefix: String,
    name: String,
}

impl S3Store {
    pub fn new(
        bucket_name: &str,
        region: &str,
        endpoint: &str,
        aws_access_key_id: &str,
        aws_secret_access_key: &str,
        prefix: Option<&str>,
    ) -> Result<Self, StoreError> {
        let region = Region::Custom {
            region: region.to_owned(),
            endpoint: endpoint.to_owned(),
        };

        let credentials = Credentials::new(
            Some(aws_access_key_id),
            Some(aws_secret_access_key),
            None,
            None,
            None,
        )
        .map_err(|e| StoreError::Other(format!("s3 credentials: {e}")))?;

        let bucket = Bucket::new(bucket_name, region, credentials)?.with_path_style(); // Use path-style for MinIO

        let prefix = match prefix.map(|p| p.trim_matches('/')) {
            Some(p) if !p.is_empty() => format!("{p}/"),
            _ => String::new(),
        };

        Ok(S3Store {
            bucket,
            prefix,
            name: format!("s3:{bucket_name}"),
        })
    }

    fn source_key(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    /// Destination paths live under the same prefix as source keys
    fn object_key(&self, path: &str) -> String {
        format!("{}{}", self.prefix, path.trim_start_matches('/'))
    }

    fn check_status(op: &'static str, path: &str, status: u16) -> Result<(), StoreError> {
        if (200..300).contains(&status) {
            Ok(())
        } else if status == 404 {
            Err(StoreError::NotFound(path.to_string()))
        } else {
            Err(StoreError::Status {
                op,
                path: path.to_string(),
                status,
            })
        }
    }
}

#[async_trait]
impl SourceStore for S3Store {
    async fn list_root(&self) -> Result<Vec<SourceEntry>, StoreError> {
        let pages = self
            .bucket
            .list(self.prefix.clone(), Some("/".to_string()))
            .await?;

        let mut entries = Vec::new();
        for page in pages {
            for object in page.contents {
                let name = object.key.trim_start_matches(&self.prefix);
                if name.is_empty() {
                    continue;
                }
                entries.push(SourceEntry::file(name));
            }
            for common in page.common_prefixes.unwrap_or_default() {
                let name = common
                    .prefix
                    .trim_start_matches(&self.prefix)
                    .trim_end_matches('/');
                entries.push(SourceEntry::directory(name));
            }
        }
        Ok(entries)
    }

    async fn retrieve_into(
        &self,
        name: &str,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<(), StoreError> {
        let key = self.source_key(name);
        let response = self.bucket.get_object(&key).await?;
        Self::check_status("get_object", &key, response.status_code())?;

        writer.write_all(response.bytes()).await?;
        writer.flush().await?;
        log::debug!("get_object {key} ({} bytes)", response.bytes().len());
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        let key = self.source_key(name);
        let response = self.bucket.delete_object(&key).await?;
        Self::check_status("delete_object", &key, response.status_code())
    }

    async fn probe(&self) -> Result<(), StoreError> {
        let (_, status) = self
            .bucket
            .list_page(self.prefix.clone(), Some("/".to_string()), None, None, Some(1))
            .await?;
        Self::check_status("list", &self.prefix, status)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl DestinationStore for S3Store {
    async fn ensure_directory(&self, _path: &str) -> Result<(), StoreError> {
        // Key prefixes need no creation
        Ok(())
    }

    async fn write_full(&self, path: &str, content: Bytes) -> Result<(), StoreError> {
        let key = self.object_key(path);
        let response = self.bucket.put_object(&key, &content).await?;
        Self::check_status("put_object", &key, response.status_code())?;
        log::debug!("put_object {key} ({} bytes)", content.len());
        Ok(())
    }

    async fn stat(&self, path: &str) -> Result<u64, StoreError> {
        let key = self.object_key(path);
        let (head, status) = self.bucket.head_object(&key).await?;
        Self::check_status("head_object", &key, status)?;

        let length = head
            .content_length
            .ok_or_else(|| StoreError::Other(format!("head_object {key}: no content length")))?;
        u64::try_from(length)
            .map_err(|_| StoreError::Other(format!("head_object {key}: bad content length {length}")))
    }

    async fn probe(&self) -> Result<(), StoreError> {
        let (_, status) = self
            .bucket
            .list_page(self.prefix.clone(), Some("/".to_string()), None, None, Some(1))
            .await?;
        Self::check_status("list", &self.prefix, status)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
