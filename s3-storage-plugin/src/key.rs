// Key layout in the backend is partitioned by access level:
//
//	<bucket or root>
//	├── public
//	│   └── <key>
//	├── protected
//	│   └── <identity id>
//	│       └── <key>
//	└── private
//	    └── <identity id>
//	        └── <key>
//
// Callers only ever see the user-facing `<key>`; the prefix is added on the
// way in and stripped from listings on the way out.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StorageError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    /// Readable and writable by every user of the app.
    #[default]
    Guest,
    /// Readable by everyone, writable only by the owning identity.
    Protected,
    /// Readable and writable only by the owning identity.
    Private,
}

impl AccessLevel {
    fn service_prefix(self) -> &'static str {
        match self {
            AccessLevel::Guest => "public",
            AccessLevel::Protected => "protected",
            AccessLevel::Private => "private",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AccessLevel::Guest => "guest",
            AccessLevel::Protected => "protected",
            AccessLevel::Private => "private",
        };
        f.write_str(s)
    }
}

impl FromStr for AccessLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "guest" | "public" => Ok(AccessLevel::Guest),
            "protected" => Ok(AccessLevel::Protected),
            "private" => Ok(AccessLevel::Private),
            other => Err(format!("unknown access level `{other}`")),
        }
    }
}

/// A user-facing key, optionally overriding the plugin's default access level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKey {
    key: String,
    access_level: Option<AccessLevel>,
}

impl StorageKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            access_level: None,
        }
    }

    pub fn with_access_level(mut self, level: AccessLevel) -> Self {
        self.access_level = Some(level);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn access_level(&self) -> Option<AccessLevel> {
        self.access_level
    }
}

impl From<&str> for StorageKey {
    fn from(key: &str) -> Self {
        StorageKey::new(key)
    }
}

impl From<String> for StorageKey {
    fn from(key: String) -> Self {
        StorageKey::new(key)
    }
}

impl From<&String> for StorageKey {
    fn from(key: &String) -> Self {
        StorageKey::new(key.as_str())
    }
}

/// Turns user keys into backend object keys.
#[derive(Debug, Clone, Default)]
pub struct PrefixResolver {
    default_level: AccessLevel,
    identity_id: Option<String>,
}

impl PrefixResolver {
    pub fn new(default_level: AccessLevel, identity_id: Option<String>) -> Self {
        Self {
            default_level,
            identity_id,
        }
    }

    pub fn default_level(&self) -> AccessLevel {
        self.default_level
    }

    /// Returns the prefix for the level, e.g. `protected/<identity id>/`.
    pub fn prefix(&self, level: AccessLevel) -> Result<String> {
        match level {
            AccessLevel::Guest => Ok(format!("{}/", level.service_prefix())),
            AccessLevel::Protected | AccessLevel::Private => {
                let identity = self
                    .identity_id
                    .as_deref()
                    .filter(|id| !id.is_empty())
                    .ok_or(StorageError::MissingIdentity(level))?;
                Ok(format!("{}/{identity}/", level.service_prefix()))
            }
        }
    }

    /// Resolves a key addressing a single object. Empty keys are rejected.
    pub fn resolve(&self, key: &StorageKey) -> Result<String> {
        if key.key().is_empty() {
            return Err(StorageError::InvalidKey(String::new()));
        }
        self.resolve_path(key)
    }

    /// Resolves a key used as a listing prefix. An empty key lists the whole
    /// access level.
    pub fn resolve_path(&self, key: &StorageKey) -> Result<String> {
        validate_key(key.key())?;
        let level = key.access_level().unwrap_or(self.default_level);
        Ok(format!("{}{}", self.prefix(level)?, key.key()))
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.starts_with('/') || key.split('/').any(|segment| segment == "..") {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}
