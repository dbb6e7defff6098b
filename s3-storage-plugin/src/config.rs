use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StorageError};
use crate::key::{AccessLevel, PrefixResolver};

/// S3 rejects multipart parts smaller than 5 MiB (except the last one).
pub const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

/// Transfer tuning for the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransferConfig {
    /// Part size in bytes, 8-64MiB recommended
    pub part_size: usize,
    /// Max parts uploaded concurrently
    pub max_concurrency: usize,
    /// Attempts per request, handed to the SDK retry policy
    pub max_attempts: u32,
    /// Per-operation timeout
    pub timeout_secs: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            part_size: 8 * 1024 * 1024, // 8MB
            max_concurrency: 8,
            max_attempts: 3,
            timeout_secs: 30,
        }
    }
}

impl TransferConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        let problems = self.problems();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(StorageError::Configuration(problems.join("; ")))
        }
    }

    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.part_size < MIN_PART_SIZE {
            problems.push(format!(
                "partSize {} is below the {MIN_PART_SIZE} byte minimum",
                self.part_size
            ));
        }
        if self.max_concurrency == 0 {
            problems.push("maxConcurrency must be at least 1".to_string());
        }
        if self.max_attempts == 0 {
            problems.push("maxAttempts must be at least 1".to_string());
        }
        problems
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoragePluginConfig {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible stores (MinIO, RustFS, ...)
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
    #[serde(default)]
    pub default_access_level: AccessLevel,
    /// Identity used for the protected and private prefixes
    #[serde(default)]
    pub identity_id: Option<String>,
    /// Root directory for the local filesystem backend
    #[serde(default)]
    pub local_root: Option<PathBuf>,
    #[serde(default)]
    pub transfer: TransferConfig,
}

impl StoragePluginConfig {
    pub fn new(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: region.into(),
            endpoint: None,
            force_path_style: false,
            default_access_level: AccessLevel::default(),
            identity_id: None,
            local_root: None,
            transfer: TransferConfig::default(),
        }
    }

    /// Config for the local filesystem backend rooted at `root`.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let mut config = Self::new(root.display().to_string(), "local");
        config.local_root = Some(root);
        config
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        let mut validation_errors = Vec::new();

        if self.bucket.trim().is_empty() {
            validation_errors.push("bucket must not be empty".to_string());
        }
        if self.region.trim().is_empty() {
            validation_errors.push("region must not be empty".to_string());
        }
        if let Some(endpoint) = &self.endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                validation_errors.push(format!(
                    "endpoint `{endpoint}` must start with http:// or https://"
                ));
            }
        }
        validation_errors.extend(self.transfer.problems());
        validation_errors.extend(self.access_problem());

        if validation_errors.is_empty() {
            Ok(())
        } else {
            Err(StorageError::Configuration(validation_errors.join("; ")))
        }
    }

    /// Checks only the access-level settings, for services built outside
    /// [`StoragePluginConfig::validate`].
    pub fn validate_access(&self) -> Result<()> {
        match self.access_problem() {
            Some(problem) => Err(StorageError::Configuration(problem)),
            None => Ok(()),
        }
    }

    // Fail at configure time rather than on the first private request.
    fn access_problem(&self) -> Option<String> {
        if self.default_access_level != AccessLevel::Guest
            && self.identity_id.as_deref().unwrap_or_default().is_empty()
        {
            return Some(format!(
                "defaultAccessLevel `{}` requires identityId",
                self.default_access_level
            ));
        }
        None
    }

    pub fn prefix_resolver(&self) -> PrefixResolver {
        PrefixResolver::new(self.default_access_level, self.identity_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_json() {
        let config =
            StoragePluginConfig::from_json_str(r#"{"bucket": "media", "region": "us-west-2"}"#)
                .unwrap();
        assert_eq!(config.bucket, "media");
        assert_eq!(config.region, "us-west-2");
        assert_eq!(config.default_access_level, AccessLevel::Guest);
        assert_eq!(config.transfer, TransferConfig::default());
        assert!(config.endpoint.is_none());
    }

    #[test]
    fn test_parse_full_json() {
        let json = r#"{
            "bucket": "media",
            "region": "zh-cn",
            "endpoint": "http://127.0.0.1:9000/",
            "forcePathStyle": true,
            "defaultAccessLevel": "protected",
            "identityId": "user-1",
            "transfer": { "partSize": 16777216, "maxConcurrency": 4 }
        }"#;
        let config = StoragePluginConfig::from_json_str(json).unwrap();
        assert!(config.force_path_style);
        assert_eq!(config.default_access_level, AccessLevel::Protected);
        assert_eq!(config.transfer.part_size, 16 * 1024 * 1024);
        assert_eq!(config.transfer.max_concurrency, 4);
        // unspecified transfer fields keep their defaults
        assert_eq!(config.transfer.max_attempts, 3);
    }

    #[test]
    fn test_validation_collects_every_problem() {
        let mut config = StoragePluginConfig::new("", "");
        config.transfer.part_size = 1024;
        config.transfer.max_concurrency = 0;
        let err = config.validate().unwrap_err();
        let StorageError::Configuration(msg) = &err else {
            panic!("unexpected error: {err}");
        };
        assert!(msg.contains("bucket"));
        assert!(msg.contains("region"));
        assert!(msg.contains("partSize"));
        assert!(msg.contains("maxConcurrency"));
    }

    #[test]
    fn test_private_default_needs_identity() {
        let mut config = StoragePluginConfig::new("b", "r");
        config.default_access_level = AccessLevel::Private;
        assert!(config.validate().is_err());
        assert!(config.validate_access().is_err());
        config.identity_id = Some("me".into());
        assert!(config.validate().is_ok());
        assert!(config.validate_access().is_ok());
    }

    #[test]
    fn test_transfer_validation() {
        assert!(TransferConfig::default().validate().is_ok());

        let zero = TransferConfig {
            part_size: 0,
            max_concurrency: 0,
            ..TransferConfig::default()
        };
        let err = zero.validate().unwrap_err();
        let StorageError::Configuration(msg) = &err else {
            panic!("unexpected error: {err}");
        };
        assert!(msg.contains("partSize"));
        assert!(msg.contains("maxConcurrency"));
    }

    #[test]
    fn test_bad_endpoint_and_malformed_json() {
        let mut config = StoragePluginConfig::new("b", "r");
        config.endpoint = Some("127.0.0.1:9000".into());
        assert!(config.validate().is_err());

        let err = StoragePluginConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, StorageError::Json(_)));
    }

    #[tokio::test]
    async fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        tokio::fs::write(&path, r#"{"bucket": "b", "region": "r"}"#)
            .await
            .unwrap();
        let config = StoragePluginConfig::from_file(&path).await.unwrap();
        assert_eq!(config.bucket, "b");

        let missing = StoragePluginConfig::from_file(dir.path().join("nope.json")).await;
        assert!(matches!(missing, Err(StorageError::Io(_))));
    }
}
