// Library crate for the storage plugin: the facade, its backend services and
// the shared config/key/error types. The `s3-storage` binary is a thin CLI on
// top of this.

pub mod config;
pub mod error;
pub mod key;
pub mod plugin;
pub mod service;

pub use config::{StoragePluginConfig, TransferConfig};
pub use error::{Result, StorageError};
pub use key::{AccessLevel, StorageKey};
pub use plugin::{AwsS3StoragePlugin, LocalStoragePlugin, PLUGIN_KEY, StoragePlugin};
pub use service::{StorageListItem, StorageService};
