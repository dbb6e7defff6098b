//! 本地文件目录后端，用于开发和测试（实现 StorageService）。

use std::path::{Component, Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use tokio::{fs, io, io::AsyncWriteExt};

use crate::config::StoragePluginConfig;
use crate::error::{Result, StorageError};
use crate::service::{StorageListItem, StorageService};

/// Directory-backed object client; object keys map to relative paths under
/// `root`.
#[derive(Debug)]
pub struct LocalFsClient {
    root: PathBuf,
}

impl LocalFsClient {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    pub async fn put_object(&self, key: &str, data: &[u8]) -> io::Result<()> {
        let path = self.path_for(key);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }
        let mut f = fs::File::create(path).await?;
        f.write_all(data).await?;
        f.flush().await?;
        Ok(())
    }

    pub async fn get_object(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)).await {
            Ok(buf) => Ok(Some(buf)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn delete_object(&self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.path_for(key)).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// Walks the tree under `root` and returns every file whose key starts
    /// with `prefix`, sorted by key.
    pub async fn list_objects(&self, prefix: &str) -> io::Result<Vec<StorageListItem>> {
        let mut items = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut read_dir = match fs::read_dir(&dir).await {
                Ok(rd) => rd,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };
            while let Some(entry) = read_dir.next_entry().await? {
                let path = entry.path();
                let metadata = entry.metadata().await?;
                if metadata.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Some(key) = self.key_for(&path) else {
                    continue;
                };
                if !key.starts_with(prefix) {
                    continue;
                }
                let modified = metadata.modified().ok();
                items.push(StorageListItem {
                    key,
                    size: metadata.len(),
                    etag: modified.map(|m| etag_for(metadata.len(), m)),
                    last_modified: modified,
                });
            }
        }
        items.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(items)
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()?;
        Some(parts.join("/"))
    }
}

// Characters that can't appear raw in a URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// `file://` URL for an absolute path, one encoded segment per component.
fn file_url(path: &Path) -> String {
    let mut url = String::from("file://");
    for component in path.components() {
        if let Component::Normal(part) = component {
            url.push('/');
            url.extend(utf8_percent_encode(&part.to_string_lossy(), PATH_SEGMENT));
        }
    }
    url
}

fn etag_for(len: u64, modified: std::time::SystemTime) -> String {
    let nanos = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{len:x}-{nanos:x}")
}

pub struct LocalFsStorageService {
    client: LocalFsClient,
}

impl LocalFsStorageService {
    pub fn new(client: LocalFsClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StorageService for LocalFsStorageService {
    type Client = LocalFsClient;

    async fn from_config(config: &StoragePluginConfig) -> Result<Self> {
        let root = config.local_root.clone().ok_or_else(|| {
            StorageError::Configuration("localRoot is required for the local backend".into())
        })?;
        fs::create_dir_all(&root).await?;
        tracing::debug!(root = %root.display(), "local storage root ready");
        Ok(Self::new(LocalFsClient::new(root)))
    }

    fn get_escape_hatch(&self) -> &LocalFsClient {
        &self.client
    }

    async fn upload(&self, key: &str, data: Bytes) -> Result<()> {
        self.client.put_object(key, &data).await?;
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Bytes> {
        self.client
            .get_object(key)
            .await?
            .map(Bytes::from)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StorageListItem>> {
        Ok(self.client.list_objects(prefix).await?)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.client.delete_object(key).await?;
        Ok(())
    }

    async fn get_url(&self, key: &str, _expires_in: Duration) -> Result<String> {
        let Ok(path) = fs::canonicalize(self.client.path_for(key)).await else {
            return Err(StorageError::NotFound(key.to_string()));
        };
        Ok(file_url(&path))
    }
}
