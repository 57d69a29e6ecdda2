//! Filesystem store backend.
//!
//! Each key lives in its own file named after the hex encoding of the key,
//! so arbitrary keys map to safe file names and `list_keys` can recover them.
//! Keys too long for a hex file name are stored under their SHA-256 digest,
//! with the original key kept in a `.key` file next to the value.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, warn};

use super::{PersistentStore, StoreResult};
use crate::error::StoreError;

const EXTENSION: &str = "json";
const KEY_EXTENSION: &str = "key";
const HASHED_PREFIX: char = '~';

/// Longest hex stem used as a file name, well under the usual 255 byte limit.
const MAX_HEX_STEM: usize = 200;

/// Store persisting entries as files under one directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

/// On-disk name of one key.
enum FileName {
    Hex(String),
    Hashed(String),
}

impl FileName {
    fn for_key(key: &str) -> Self {
        let encoded = hex::encode(key.as_bytes());
        if encoded.len() <= MAX_HEX_STEM {
            return Self::Hex(encoded);
        }
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        Self::Hashed(format!("{}{}", HASHED_PREFIX, hex::encode(hasher.finalize())))
    }

    fn stem(&self) -> &str {
        match self {
            Self::Hex(stem) | Self::Hashed(stem) => stem,
        }
    }
}

impl FileStore {
    /// Opens a store rooted at `dir`, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        debug!(dir = %dir.display(), "file store opened");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.value_path(&FileName::for_key(key))
    }

    fn value_path(&self, name: &FileName) -> PathBuf {
        self.dir.join(format!("{}.{}", name.stem(), EXTENSION))
    }

    fn key_path(&self, name: &FileName) -> PathBuf {
        self.dir.join(format!("{}.{}", name.stem(), KEY_EXTENSION))
    }

    /// Recovers the key stored in `path`, None for files this store did not write.
    async fn key_from_path(path: &Path) -> Option<String> {
        if path.extension()? != EXTENSION {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        if stem.starts_with(HASHED_PREFIX) {
            return fs::read_to_string(path.with_extension(KEY_EXTENSION)).await.ok();
        }
        let bytes = hex::decode(stem).ok()?;
        String::from_utf8(bytes).ok()
    }
}

async fn remove_if_exists(path: &Path) -> StoreResult<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

#[async_trait]
impl PersistentStore for FileStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        match fs::read_to_string(self.path_for(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let name = FileName::for_key(key);
        if let FileName::Hashed(_) = name {
            fs::write(self.key_path(&name), key).await?;
        }
        let path = self.value_path(&name);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, value).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        let name = FileName::for_key(key);
        remove_if_exists(&self.value_path(&name)).await?;
        if let FileName::Hashed(_) = name {
            remove_if_exists(&self.key_path(&name)).await?;
        }
        Ok(())
    }

    async fn multi_remove(&self, keys: &[String]) -> StoreResult<()> {
        let mut failures = Vec::new();
        for key in keys {
            if let Err(err) = self.remove(key).await {
                failures.push(format!("{key}: {err}"));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(StoreError::Backend(format!(
                "failed to remove {} keys: {}",
                failures.len(),
                failures.join(", ")
            )))
        }
    }

    async fn list_keys(&self) -> StoreResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut dir = fs::read_dir(&self.dir).await?;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().is_some_and(|ext| ext == KEY_EXTENSION) {
                continue;
            }
            match Self::key_from_path(&path).await {
                Some(key) => keys.push(key),
                None => warn!(path = %path.display(), "skipping foreign file in store"),
            }
        }
        Ok(keys)
    }
}
