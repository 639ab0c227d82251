// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Filesystem-backed `StorageBackend` for vexil stores.
//!
//! Each blob key maps to one `<key>.json` file under a base directory:
//! either the platform config directory (e.g. `~/.config/vexil`) or an
//! explicit root supplied by the caller.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions
)]

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use vexil_core::{BackendError, StorageBackend};

/// Stores blobs as JSON files under a base directory.
#[derive(Debug, Clone)]
pub struct FsBackend {
    base: PathBuf,
}

impl FsBackend {
    /// Creates a backend rooted at the user config directory for `app`
    /// (e.g. `~/.config/<app>`).
    ///
    /// # Errors
    ///
    /// [`BackendError::Other`] when the platform config directory cannot
    /// be resolved; [`BackendError::Io`] when it cannot be created.
    pub fn new(app: &str) -> Result<Self, BackendError> {
        let dirs = ProjectDirs::from("dev", "flyingrobots", app)
            .ok_or_else(|| BackendError::Other("could not resolve config dir".into()))?;
        Self::at(dirs.config_dir())
    }

    /// Creates a backend rooted at an explicit directory.
    ///
    /// # Errors
    ///
    /// [`BackendError::Io`] when the directory cannot be created.
    pub fn at(base: impl AsRef<Path>) -> Result<Self, BackendError> {
        let base = base.as_ref().to_path_buf();
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    /// The directory blobs are stored under.
    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base.join(format!("{key}.json"))
    }
}

impl StorageBackend for FsBackend {
    fn read(&self, key: &str) -> Result<Option<String>, BackendError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(blob) => Ok(Some(blob)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(BackendError::Io(err)),
        }
    }

    fn write(&self, key: &str, blob: &str) -> Result<(), BackendError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, blob)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), BackendError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(BackendError::Io(err)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use vexil_core::{FlagStore, PersistOptions};

    #[test]
    fn read_write_remove_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = FsBackend::at(dir.path()).expect("backend");

        assert_eq!(backend.read("missing").expect("read"), None);
        backend.write("flags", "{}").expect("write");
        assert_eq!(backend.read("flags").expect("read").as_deref(), Some("{}"));
        assert!(dir.path().join("flags.json").is_file());

        backend.remove("flags").expect("remove");
        assert_eq!(backend.read("flags").expect("read"), None);
        backend.remove("flags").expect("absent remove is fine");
    }

    #[test]
    fn store_state_survives_a_process_restart() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let backend = FsBackend::at(dir.path()).expect("backend");
            let store = FlagStore::builder()
                .persist(PersistOptions::new(backend))
                .build()
                .expect("build");
            store.set("dark_mode", true).expect("set");
            store.set("retries", 3).expect("set");
        }
        let backend = FsBackend::at(dir.path()).expect("backend");
        let store = FlagStore::builder()
            .persist(PersistOptions::new(backend))
            .build()
            .expect("build");
        assert_eq!(store.get_bool("dark_mode"), Some(true));
        assert_eq!(store.get_num("retries"), Some(3.0));
    }
}
