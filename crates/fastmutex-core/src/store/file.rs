//! Directory-backed key/value store
//!
//! One file per key. Keys up to `MAX_PLAIN_KEY_BYTES` are stored in a file
//! named by the hex encoding of the key. Longer keys would exceed the file
//! name limit of common file systems, so their file is named by the SHA-256
//! digest of the key and starts with a header line holding the hex-encoded
//! key, followed by the value.
//!
//! Writes land in a uniquely named temporary file that is renamed over the
//! target, so a concurrent reader in another process sees either the old or
//! the new value and never a torn one. Several processes pointed at the same
//! directory share one store.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fastmutex_common::StoreError;
use sha2::{Digest, Sha256};
use tokio::fs;

use super::KeyValueStore;

const TEMP_FILE_MARKER: char = '.';

/// Longest key stored under a plain hex file name (128 hex characters)
const MAX_PLAIN_KEY_BYTES: usize = 64;

/// File name prefix of digest-named entries; not a hex character
const DIGEST_NAME_PREFIX: &str = "sha256-";

/// Default directory shared by every process on the host
pub fn default_store_dir() -> PathBuf {
    std::env::temp_dir().join("fastmutex")
}

/// Key/value store persisted as files under one directory
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl Default for FileKeyValueStore {
    fn default() -> Self {
        Self::new(default_store_dir())
    }
}

fn is_long_key(key: &str) -> bool {
    key.len() > MAX_PLAIN_KEY_BYTES
}

fn file_name_for(key: &str) -> String {
    if is_long_key(key) {
        format!(
            "{}{}",
            DIGEST_NAME_PREFIX,
            const_hex::encode(Sha256::digest(key.as_bytes()))
        )
    } else {
        const_hex::encode(key.as_bytes())
    }
}

/// File contents for `value` stored under `key`
fn encode_contents(key: &str, value: &str) -> String {
    if is_long_key(key) {
        format!("{}\n{}", const_hex::encode(key.as_bytes()), value)
    } else {
        value.to_string()
    }
}

/// Split a digest-named file into its key and value
fn decode_digest_contents(contents: &str) -> Option<(String, &str)> {
    let (hex_key, value) = contents.split_once('\n')?;
    let key = String::from_utf8(const_hex::decode(hex_key).ok()?).ok()?;
    Some((key, value))
}

impl FileKeyValueStore {
    /// The directory is created lazily on first write
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(file_name_for(key))
    }

    fn temp_path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!(
            "{}{}.{}.tmp",
            TEMP_FILE_MARKER,
            file_name_for(key),
            uuid::Uuid::new_v4().simple()
        ))
    }

    fn decode_file_name(name: &str) -> Option<String> {
        if name.starts_with(TEMP_FILE_MARKER) {
            return None;
        }
        let bytes = const_hex::decode(name).ok()?;
        String::from_utf8(bytes).ok()
    }

    /// Key held in the header of a digest-named file
    async fn read_digest_key(&self, path: &Path) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(path).await {
            Ok(contents) => Ok(decode_digest_contents(&contents).map(|(key, _)| key)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(path.display().to_string(), e)),
        }
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        let contents = match fs::read_to_string(self.path_for(key)).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(key, e)),
        };

        if !is_long_key(key) {
            return Ok(Some(contents));
        }
        // A header naming another key means a digest collision; treat as absent
        Ok(decode_digest_contents(&contents)
            .filter(|(stored_key, _)| stored_key == key)
            .map(|(_, value)| value.to_string()))
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError::io(key, e))?;

        let temp = self.temp_path_for(key);
        if let Err(e) = fs::write(&temp, encode_contents(key, value).as_bytes()).await {
            return Err(StoreError::io(key, e));
        }
        if let Err(e) = fs::rename(&temp, self.path_for(key)).await {
            let _ = fs::remove_file(&temp).await;
            return Err(StoreError::io(key, e));
        }
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(key, e)),
        }
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(prefix, e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(prefix, e))?
        {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let key = if name.starts_with(DIGEST_NAME_PREFIX) {
                self.read_digest_key(&entry.path()).await?
            } else {
                Self::decode_file_name(name)
            };
            if let Some(key) = key
                && key.starts_with(prefix)
            {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}
