//! S3 存储服务：基于 aws-sdk-s3，小对象直接 PutObject，大对象走分段上传。
//!
//! Retry and timeout policy are handed to the SDK; nothing here re-sends a
//! request on its own.

use std::ops::Range;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use bytes::Bytes;
use tokio::sync::Semaphore;

use crate::config::{StoragePluginConfig, TransferConfig};
use crate::error::{Result, StorageError};
use crate::service::{StorageListItem, StorageService};

pub struct S3StorageService {
    client: Client,
    bucket: String,
    transfer: TransferConfig,
}

impl S3StorageService {
    /// Wraps a client the caller already built. The service takes ownership.
    ///
    /// `transfer` is checked the same way [`StoragePluginConfig::validate`]
    /// checks it, since a zero part size or concurrency would stall uploads.
    pub fn from_client(
        client: Client,
        bucket: impl Into<String>,
        transfer: TransferConfig,
    ) -> Result<Self> {
        transfer.validate()?;
        Ok(Self {
            client,
            bucket: bucket.into(),
            transfer,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn md5_base64(data: &[u8]) -> String {
        let sum = md5::compute(data);
        B64.encode(sum.0)
    }

    async fn put_single(&self, key: &str, data: Bytes) -> Result<()> {
        let checksum = Self::md5_base64(&data);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_md5(checksum)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StorageError::backend("put_object", e))?;
        Ok(())
    }

    async fn put_multipart(&self, key: &str, data: Bytes) -> Result<()> {
        let create = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::backend("create_multipart_upload", e))?;
        let upload_id = create
            .upload_id()
            .ok_or_else(|| {
                StorageError::backend("create_multipart_upload", "response has no upload id")
            })?
            .to_string();

        let sem = Semaphore::new(self.transfer.max_concurrency);
        let parts = part_ranges(data.len(), self.transfer.part_size)
            .into_iter()
            .enumerate()
            .map(|(idx, range)| {
                // part numbers start at 1
                self.upload_part(key, &upload_id, idx as i32 + 1, data.slice(range), &sem)
            });

        let completed_parts = match futures::future::try_join_all(parts).await {
            Ok(v) => v,
            Err(e) => {
                self.abort_multipart(key, &upload_id).await;
                return Err(e);
            }
        };

        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(completed_parts))
            .build();

        let result = self
            .client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(&upload_id)
            .multipart_upload(completed)
            .send()
            .await;
        if let Err(e) = result {
            self.abort_multipart(key, &upload_id).await;
            return Err(StorageError::backend("complete_multipart_upload", e));
        }
        Ok(())
    }

    /// Best effort: the caller's error is what gets reported, so a failed
    /// abort is only logged.
    async fn abort_multipart(&self, key: &str, upload_id: &str) {
        if let Err(abort_err) = self
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
        {
            tracing::warn!(
                key,
                upload_id,
                "failed to abort multipart upload: {abort_err}"
            );
        }
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Bytes,
        semaphore: &Semaphore,
    ) -> Result<CompletedPart> {
        let _permit = semaphore
            .acquire()
            .await
            .map_err(|e| StorageError::backend("upload_part", e))?;
        let checksum = Self::md5_base64(&data);

        let resp = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .content_md5(checksum)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StorageError::backend("upload_part", e))?;

        Ok(CompletedPart::builder()
            .part_number(part_number)
            .set_e_tag(resp.e_tag().map(str::to_string))
            .build())
    }
}

/// Splits `len` bytes into consecutive `part_size` ranges; the last one may
/// be shorter. A zero `part_size` is treated as 1.
fn part_ranges(len: usize, part_size: usize) -> Vec<Range<usize>> {
    let part_size = part_size.max(1);
    let mut ranges = Vec::new();
    let mut idx = 0usize;
    while idx < len {
        let end = (idx + part_size).min(len);
        ranges.push(idx..end);
        idx = end;
    }
    ranges
}

#[async_trait]
impl StorageService for S3StorageService {
    type Client = Client;

    async fn from_config(config: &StoragePluginConfig) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .retry_config(RetryConfig::standard().with_max_attempts(config.transfer.max_attempts))
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(config.transfer.timeout())
                    .build(),
            );
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();

        tracing::debug!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = ?config.endpoint,
            "s3 client created"
        );
        Self::from_client(
            Client::from_conf(s3_config),
            config.bucket.clone(),
            config.transfer.clone(),
        )
    }

    fn get_escape_hatch(&self) -> &Client {
        &self.client
    }

    async fn upload(&self, key: &str, data: Bytes) -> Result<()> {
        if data.len() <= self.transfer.part_size {
            self.put_single(key, data).await
        } else {
            self.put_multipart(key, data).await
        }
    }

    async fn download(&self, key: &str) -> Result<Bytes> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;
        let output = match resp {
            Ok(o) => o,
            Err(e) if e.as_service_error().is_some_and(GetObjectError::is_no_such_key) => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(e) => return Err(StorageError::backend("get_object", e)),
        };
        let body = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::backend("get_object", e))?;
        Ok(body.into_bytes())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StorageListItem>> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut items = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| StorageError::backend("list_objects_v2", e))?;
            for object in page.contents() {
                let Some(key) = object.key() else {
                    continue;
                };
                items.push(StorageListItem {
                    key: key.to_string(),
                    size: object.size().unwrap_or_default().max(0) as u64,
                    etag: object.e_tag().map(|t| t.trim_matches('"').to_string()),
                    last_modified: object
                        .last_modified()
                        .cloned()
                        .and_then(|t| SystemTime::try_from(t).ok()),
                });
            }
        }
        Ok(items)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::backend("delete_object", e))?;
        Ok(())
    }

    async fn get_url(&self, key: &str, expires_in: Duration) -> Result<String> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::backend("presign", e))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::backend("presign", e))?;
        Ok(request.uri().to_string())
    }
}
