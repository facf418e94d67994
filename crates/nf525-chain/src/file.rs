//! JSON-file implementation of `ChainStore`.
//!
//! One file per family, holding a JSON array of rows oldest first.  A
//! missing file is an empty family.  Appends rewrite the file through a
//! temporary sibling and a rename, so a crash never leaves half an array.

use std::{
    fs, io,
    marker::PhantomData,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use nf525_contracts::{
    error::{ChainError, ChainResult},
    event::ChainRecord,
};
use nf525_core::traits::ChainStore;

use crate::memory::guard_append;

/// A file-backed store for one chain family.
///
/// The internal mutex serializes appends within one process.  Writers in
/// separate processes must not share a file.
#[derive(Debug)]
pub struct JsonFileStore<R> {
    path: PathBuf,
    write_lock: Mutex<()>,
    _family: PhantomData<fn() -> R>,
}

impl<R> JsonFileStore<R>
where
    R: ChainRecord + Serialize + DeserializeOwned,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
            _family: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> ChainResult<Vec<R>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ChainError::storage(format!(
                    "failed to read '{}': {}",
                    self.path.display(),
                    e
                )))
            }
        };
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&contents).map_err(|e| {
            ChainError::storage(format!(
                "failed to parse '{}': {}",
                self.path.display(),
                e
            ))
        })
    }

    fn write_all(&self, records: &[R]) -> ChainResult<()> {
        let fail = |e: &dyn std::fmt::Display| {
            ChainError::storage(format!("failed to write '{}': {}", self.path.display(), e))
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| fail(&e))?;
        }
        let json = serde_json::to_string_pretty(records).map_err(|e| fail(&e))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| fail(&e))?;
        fs::rename(&tmp, &self.path).map_err(|e| fail(&e))?;

        debug!(path = %self.path.display(), records = records.len(), "chain file written");
        Ok(())
    }

    fn lock(&self) -> ChainResult<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|e| ChainError::storage(format!("chain file lock poisoned: {}", e)))
    }
}

impl<R> ChainStore<R> for JsonFileStore<R>
where
    R: ChainRecord + Serialize + DeserializeOwned,
{
    fn load_chain(&self) -> ChainResult<Vec<R>> {
        self.read_all()
    }

    fn head_hash(&self) -> ChainResult<Option<String>> {
        let records = self.read_all()?;
        Ok(records.last().and_then(|r| r.hash()).map(str::to_string))
    }

    fn append_if_head(&self, expected_head: Option<&str>, record: R) -> ChainResult<()> {
        let _guard = self.lock()?;
        let mut records = self.read_all()?;
        guard_append(
            records.last().and_then(|r| r.hash()),
            expected_head,
            &record,
        )?;
        records.push(record);
        self.write_all(&records)
    }
}
