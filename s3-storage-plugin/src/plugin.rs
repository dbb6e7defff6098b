//! Storage plugin facade.
//!
//! `StoragePlugin<S>` presents upload/download/list/remove/url operations over
//! any [`StorageService`], plus [`StoragePlugin::get_escape_hatch`] for callers
//! that need the native backend client directly.
//!
//! The plugin starts unconfigured. Configuration happens once and the
//! configured service is immutable afterwards, so the plugin can be shared
//! across tasks (`Arc<StoragePlugin<_>>`) without locking. Teardown goes
//! through [`StoragePlugin::reset`], which needs exclusive access.

use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use bytes::Bytes;

use crate::config::StoragePluginConfig;
use crate::error::{Result, StorageError};
use crate::key::{PrefixResolver, StorageKey};
use crate::service::localfs::LocalFsStorageService;
use crate::service::s3::S3StorageService;
use crate::service::{StorageListItem, StorageService};

pub const PLUGIN_KEY: &str = "awsS3StoragePlugin";

/// Plugin backed by the default S3 storage service.
pub type AwsS3StoragePlugin = StoragePlugin<S3StorageService>;
/// Plugin backed by a local directory.
pub type LocalStoragePlugin = StoragePlugin<LocalFsStorageService>;

struct Configured<S> {
    service: S,
    resolver: PrefixResolver,
}

pub struct StoragePlugin<S: StorageService> {
    state: OnceLock<Configured<S>>,
}

impl<S: StorageService> Default for StoragePlugin<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: StorageService> StoragePlugin<S> {
    pub fn new() -> Self {
        Self {
            state: OnceLock::new(),
        }
    }

    pub fn key(&self) -> &'static str {
        PLUGIN_KEY
    }

    pub fn is_configured(&self) -> bool {
        self.state.get().is_some()
    }

    /// Validates `config`, builds the backend service from it and installs it.
    pub async fn configure(&self, config: StoragePluginConfig) -> Result<()> {
        if self.is_configured() {
            return Err(StorageError::AlreadyConfigured);
        }
        config.validate()?;
        let service = S::from_config(&config).await?;
        self.configure_with_service(service, &config)
    }

    /// Installs a prebuilt service. Only the access-level settings of
    /// `config` are used, and they are checked before anything is installed.
    pub fn configure_with_service(&self, service: S, config: &StoragePluginConfig) -> Result<()> {
        config.validate_access()?;
        let configured = Configured {
            service,
            resolver: config.prefix_resolver(),
        };
        self.state
            .set(configured)
            .map_err(|_| StorageError::AlreadyConfigured)?;
        tracing::info!(
            plugin = PLUGIN_KEY,
            bucket = %config.bucket,
            default_access_level = %config.default_access_level,
            "storage plugin configured"
        );
        Ok(())
    }

    /// Tears the plugin down, handing back the service (and the client it
    /// owns). The plugin is unconfigured afterwards.
    pub fn reset(&mut self) -> Option<S> {
        let configured = self.state.take()?;
        tracing::info!(plugin = PLUGIN_KEY, "storage plugin reset");
        Some(configured.service)
    }

    /// Access to the configured service.
    ///
    /// Fails with [`StorageError::NotConfigured`] before `configure`.
    pub fn storage_service(&self) -> Result<&S> {
        Ok(&self.configured()?.service)
    }

    /// Retrieve the escape hatch to perform low level operations on the
    /// backend.
    ///
    /// Returns the client owned by the storage service. Every call within one
    /// configured lifetime yields the same instance.
    pub fn get_escape_hatch(&self) -> Result<&S::Client> {
        Ok(self.storage_service()?.get_escape_hatch())
    }

    fn configured(&self) -> Result<&Configured<S>> {
        self.state.get().ok_or(StorageError::NotConfigured)
    }

    pub async fn upload_data(
        &self,
        key: impl Into<StorageKey>,
        data: impl Into<Bytes>,
    ) -> Result<String> {
        let key = key.into();
        let configured = self.configured()?;
        let object_key = configured.resolver.resolve(&key)?;
        let data = data.into();
        tracing::debug!(key = %object_key, size = data.len(), "upload");
        configured.service.upload(&object_key, data).await?;
        Ok(key.key().to_string())
    }

    pub async fn upload_file(
        &self,
        key: impl Into<StorageKey>,
        local_path: impl AsRef<Path>,
    ) -> Result<String> {
        let key = key.into();
        // Check the key before touching the filesystem.
        self.configured()?.resolver.resolve(&key)?;
        let data = tokio::fs::read(local_path.as_ref()).await?;
        self.upload_data(key, data).await
    }

    pub async fn download_data(&self, key: impl Into<StorageKey>) -> Result<Bytes> {
        let key = key.into();
        let configured = self.configured()?;
        let object_key = configured.resolver.resolve(&key)?;
        tracing::debug!(key = %object_key, "download");
        configured
            .service
            .download(&object_key)
            .await
            .map_err(|e| match e {
                StorageError::NotFound(_) => StorageError::NotFound(key.key().to_string()),
                other => other,
            })
    }

    pub async fn download_file(
        &self,
        key: impl Into<StorageKey>,
        local_path: impl AsRef<Path>,
    ) -> Result<()> {
        let data = self.download_data(key).await?;
        let local_path = local_path.as_ref();
        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(local_path, &data).await?;
        Ok(())
    }

    /// Lists everything under `path`. Returned keys are user-facing, without
    /// the access-level prefix.
    pub async fn list(&self, path: impl Into<StorageKey>) -> Result<Vec<StorageListItem>> {
        let path = path.into();
        let configured = self.configured()?;
        let level = path
            .access_level()
            .unwrap_or(configured.resolver.default_level());
        let prefix = configured.resolver.prefix(level)?;
        let object_prefix = configured.resolver.resolve_path(&path)?;
        tracing::debug!(prefix = %object_prefix, "list");

        let mut items = configured.service.list(&object_prefix).await?;
        for item in items.iter_mut() {
            if let Some(stripped) = item.key.strip_prefix(prefix.as_str()) {
                item.key = stripped.to_string();
            }
        }
        items.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(items)
    }

    pub async fn remove(&self, key: impl Into<StorageKey>) -> Result<String> {
        let key = key.into();
        let configured = self.configured()?;
        let object_key = configured.resolver.resolve(&key)?;
        tracing::debug!(key = %object_key, "remove");
        configured.service.remove(&object_key).await?;
        Ok(key.key().to_string())
    }

    pub async fn get_url(
        &self,
        key: impl Into<StorageKey>,
        expires_in: Duration,
    ) -> Result<String> {
        let key = key.into();
        let configured = self.configured()?;
        let object_key = configured.resolver.resolve(&key)?;
        tracing::debug!(key = %object_key, ?expires_in, "get url");
        configured
            .service
            .get_url(&object_key, expires_in)
            .await
            .map_err(|e| match e {
                StorageError::NotFound(_) => StorageError::NotFound(key.key().to_string()),
                other => other,
            })
    }
}
