use std::{
    collections::HashMap,
    future::Future,
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use eyre::WrapErr;
use tokio::{fs, sync::Mutex};

pub const TASKS_KEY: &str = "TASKS";
pub const PREMIUM_KEY: &str = "PREMIUM_STATUS";
pub const PREMIUM_STARTED_AT_KEY: &str = "PREMIUM_STARTED_AT";

/// Local key-value storage holding opaque records.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> impl Future<Output = eyre::Result<Option<Vec<u8>>>> + Send;

    fn set(&self, key: &str, value: Vec<u8>) -> impl Future<Output = eyre::Result<()>> + Send;

    fn remove(&self, key: &str) -> impl Future<Output = eyre::Result<()>> + Send;
}

/// In-process store. Clones share the same map.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> eyre::Result<Option<Vec<u8>>> {
        let entries = self.entries.lock().await;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> eyre::Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_owned(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> eyre::Result<()> {
        let mut entries = self.entries.lock().await;
        entries.remove(key);
        Ok(())
    }
}

/// Stores every key as its own file inside `dir`.
#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> eyre::Result<Option<Vec<u8>>> {
        let path = self.path(key);

        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).wrap_err_with(|| format!("failed to read {}", path.display())),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> eyre::Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .wrap_err_with(|| format!("failed to create {}", self.dir.display()))?;

        // write then rename, so a crash never leaves a half written record
        let path = self.path(key);
        let tmp = self.path(&format!("{key}.tmp"));

        fs::write(&tmp, value)
            .await
            .wrap_err_with(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .await
            .wrap_err_with(|| format!("failed to replace {}", path.display()))?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> eyre::Result<()> {
        let path = self.path(key);

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).wrap_err_with(|| format!("failed to remove {}", path.display())),
        }
    }
}

/// Empty store that refuses every write.
#[cfg(test)]
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct ReadOnlyStore;

#[cfg(test)]
impl KeyValueStore for ReadOnlyStore {
    async fn get(&self, _key: &str) -> eyre::Result<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn set(&self, key: &str, _value: Vec<u8>) -> eyre::Result<()> {
        eyre::bail!("store is read-only, can't write {}", key)
    }

    async fn remove(&self, key: &str) -> eyre::Result<()> {
        eyre::bail!("store is read-only, can't remove {}", key)
    }
}
