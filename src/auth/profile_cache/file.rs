use std::fs::{remove_file, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{from_str as deserialize_snapshot, to_string as serialize_snapshot};

use crate::auth::error::{AuthKitError, AuthKitResult};
use crate::auth::profile_cache::{ProfileCache, ProfileSnapshot};

/// JSON file holding one [`ProfileSnapshot`].
pub struct FileProfileCache {
    path: PathBuf,
    io_lock: Mutex<()>,
}

impl std::fmt::Debug for FileProfileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileProfileCache")
            .field("path", &self.path)
            .finish()
    }
}

impl FileProfileCache {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            io_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> AuthKitResult<Option<ProfileSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let mut file = File::open(&self.path).map_err(|err| {
            AuthKitError::ProfileCache(format!("Failed to open profile cache file: {err}"))
        })?;
        let mut buffer = String::new();
        file.read_to_string(&mut buffer).map_err(|err| {
            AuthKitError::ProfileCache(format!("Failed to read profile cache file: {err}"))
        })?;

        if buffer.trim().is_empty() {
            return Ok(None);
        }

        let snapshot = deserialize_snapshot(&buffer).map_err(|err| {
            AuthKitError::ProfileCache(format!("Failed to parse profile cache payload: {err}"))
        })?;
        Ok(Some(snapshot))
    }
}

impl ProfileCache for FileProfileCache {
    fn load(&self) -> AuthKitResult<Option<ProfileSnapshot>> {
        let _io = self.io_lock.lock().unwrap();
        self.read()
    }

    fn store(&self, snapshot: &ProfileSnapshot) -> AuthKitResult<()> {
        let _io = self.io_lock.lock().unwrap();
        let serialized = serialize_snapshot(snapshot).map_err(|err| {
            AuthKitError::ProfileCache(format!("Failed to serialize profile snapshot: {err}"))
        })?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| {
                AuthKitError::ProfileCache(format!("Failed to create profile cache directory: {err}"))
            })?;
        }
        let mut file = File::create(&self.path).map_err(|err| {
            AuthKitError::ProfileCache(format!("Failed to create profile cache file: {err}"))
        })?;
        file.write_all(serialized.as_bytes()).map_err(|err| {
            AuthKitError::ProfileCache(format!("Failed to write profile cache file: {err}"))
        })
    }

    fn clear(&self) -> AuthKitResult<()> {
        let _io = self.io_lock.lock().unwrap();
        if self.path.exists() {
            remove_file(&self.path).map_err(|err| {
                AuthKitError::ProfileCache(format!("Failed to remove profile cache file: {err}"))
            })?;
        }
        Ok(())
    }
}
