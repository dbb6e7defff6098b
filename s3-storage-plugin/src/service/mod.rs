//! Storage services (backends behind the plugin facade)
//!
//! Submodules:
//! - `s3`: the default service, built on `aws-sdk-s3`
//! - `localfs`: local directory backend used for development and tests
//!
//! A service exclusively owns its backend client. The client is created when
//! the service is built and dropped with it; callers only ever borrow it
//! through [`StorageService::get_escape_hatch`].

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::StoragePluginConfig;
use crate::error::Result;

pub mod localfs;
pub mod s3;

/// An object returned by [`StorageService::list`]. `key` is the full backend
/// key; the plugin strips the access prefix before handing it to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageListItem {
    pub key: String,
    pub size: u64,
    pub etag: Option<String>,
    pub last_modified: Option<SystemTime>,
}

/// Object-level operations a backend must provide. Keys passed here are
/// already resolved (access prefix included).
#[async_trait]
pub trait StorageService: Send + Sync + Sized {
    /// Native client handed out by the escape hatch.
    type Client: Send + Sync;

    /// Builds the service and its client from a validated config.
    async fn from_config(config: &StoragePluginConfig) -> Result<Self>;

    /// Borrow the client owned by this service.
    fn get_escape_hatch(&self) -> &Self::Client;

    async fn upload(&self, key: &str, data: Bytes) -> Result<()>;

    /// Fails with `StorageError::NotFound` when the key does not exist.
    async fn download(&self, key: &str) -> Result<Bytes>;

    async fn list(&self, prefix: &str) -> Result<Vec<StorageListItem>>;

    /// Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;

    async fn get_url(&self, key: &str, expires_in: Duration) -> Result<String>;
}
