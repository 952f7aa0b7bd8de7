//! File-backed collection store
//!
//! Layout under the data directory:
//!
//! ```text
//! <data_dir>/<db>/                         database
//! <data_dir>/<db>/<coll>.digitool          collection unit
//! <data_dir>/<db>/<coll>.indices/<f>.idx   index unit for field <f>
//! ```
//!
//! A collection unit is a JSON envelope
//! `{"format_version": 1, "checksum": <crc32>, "documents": [...]}` where
//! the checksum covers the `documents` text exactly as written. Every
//! write goes to a temp file that is fsynced and renamed over the target.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;
use tracing::debug;

use crate::document::Document;
use crate::index::PersistedIndex;

use super::checksum::{compute_checksum, verify_checksum};
use super::errors::{StorageError, StorageResult};
use super::store::CollectionStore;

/// Current collection unit format
pub const FORMAT_VERSION: u32 = 1;

pub const COLLECTION_EXTENSION: &str = "digitool";
const INDEX_DIR_SUFFIX: &str = "indices";
const INDEX_EXTENSION: &str = "idx";

#[derive(Serialize)]
struct EnvelopeOut<'a> {
    format_version: u32,
    checksum: u32,
    documents: &'a RawValue,
}

#[derive(Deserialize)]
struct EnvelopeIn<'a> {
    format_version: u32,
    checksum: u32,
    #[serde(borrow)]
    documents: &'a RawValue,
}

/// Store keeping one directory per database under `root`
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            StorageError::io_error(
                format!("failed to create data directory {}", root.display()),
                e,
            )
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn db_path(&self, db: &str) -> PathBuf {
        self.root.join(db)
    }

    fn collection_path(&self, db: &str, coll: &str) -> PathBuf {
        self.db_path(db)
            .join(format!("{}.{}", coll, COLLECTION_EXTENSION))
    }

    fn index_dir(&self, db: &str, coll: &str) -> PathBuf {
        self.db_path(db).join(format!("{}.{}", coll, INDEX_DIR_SUFFIX))
    }

    fn index_path(&self, db: &str, coll: &str, field: &str) -> PathBuf {
        self.index_dir(db, coll)
            .join(format!("{}.{}", field, INDEX_EXTENSION))
    }

    fn encode_documents(documents: &[Document]) -> StorageResult<Vec<u8>> {
        let text = serde_json::to_string(documents)
            .map_err(|e| StorageError::io_error("failed to serialize documents", e.into()))?;
        let checksum = compute_checksum(text.as_bytes());
        let raw = RawValue::from_string(text)
            .map_err(|e| StorageError::io_error("failed to serialize documents", e.into()))?;
        let envelope = EnvelopeOut {
            format_version: FORMAT_VERSION,
            checksum,
            documents: &raw,
        };
        serde_json::to_vec(&envelope)
            .map_err(|e| StorageError::io_error("failed to serialize collection", e.into()))
    }

    fn decode_documents(path: &Path, content: &str) -> StorageResult<Vec<Document>> {
        let unit = path.display();
        let envelope: EnvelopeIn<'_> = serde_json::from_str(content)
            .map_err(|e| StorageError::corruption(&unit, format!("invalid envelope: {}", e)))?;

        if envelope.format_version != FORMAT_VERSION {
            return Err(StorageError::corruption(
                &unit,
                format!("unsupported format version {}", envelope.format_version),
            ));
        }

        let text = envelope.documents.get();
        if !verify_checksum(text.as_bytes(), envelope.checksum) {
            return Err(StorageError::corruption(&unit, "checksum mismatch"));
        }

        let values: Vec<Value> = serde_json::from_str(text)
            .map_err(|e| StorageError::corruption(&unit, format!("invalid documents: {}", e)))?;

        values
            .into_iter()
            .map(|value| {
                Document::from_stored(value)
                    .ok_or_else(|| StorageError::corruption(&unit, "document without string _id"))
            })
            .collect()
    }

    fn sorted_entries(dir: &Path, keep: impl Fn(&Path) -> Option<String>) -> StorageResult<Vec<String>> {
        let entries = fs::read_dir(dir)
            .map_err(|e| StorageError::io_error(format!("failed to list {}", dir.display()), e))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|e| StorageError::io_error(format!("failed to list {}", dir.display()), e))?;
            if let Some(name) = keep(&entry.path()) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Stem of `path` if it has the given extension
fn stem_with_extension(path: &Path, extension: &str) -> Option<String> {
    if path.extension()? != extension {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    // Leftover temp files start with '.'
    if stem.starts_with('.') {
        return None;
    }
    Some(stem.to_string())
}

/// Write `bytes` to `path` atomically.
///
/// 1. Write to a temp file in the same directory
/// 2. fsync the temp file
/// 3. Rename over the target
/// 4. fsync the directory
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let temp_path = parent.join(format!(".{}.tmp", file_name));

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    if let Ok(dir) = File::open(parent) {
        let _ = dir.sync_all();
    }
    Ok(())
}

impl CollectionStore for FileStore {
    fn create_database(&self, db: &str) -> StorageResult<()> {
        let path = self.db_path(db);
        if path.is_dir() {
            return Err(StorageError::already_exists(format!("Database '{}' already exists", db)));
        }
        fs::create_dir_all(&path)
            .map_err(|e| StorageError::io_error(format!("failed to create database '{}'", db), e))
    }

    fn drop_database(&self, db: &str) -> StorageResult<()> {
        let path = self.db_path(db);
        if !path.is_dir() {
            return Err(StorageError::not_found(format!("Database '{}' does not exist", db)));
        }
        fs::remove_dir_all(&path)
            .map_err(|e| StorageError::io_error(format!("failed to drop database '{}'", db), e))
    }

    fn database_exists(&self, db: &str) -> bool {
        self.db_path(db).is_dir()
    }

    fn list_databases(&self) -> StorageResult<Vec<String>> {
        Self::sorted_entries(&self.root, |path| {
            if !path.is_dir() {
                return None;
            }
            path.file_name()?.to_str().map(str::to_string)
        })
    }

    fn list_collections(&self, db: &str) -> StorageResult<Vec<String>> {
        let path = self.db_path(db);
        if !path.is_dir() {
            return Err(StorageError::not_found(format!("Database '{}' does not exist", db)));
        }
        Self::sorted_entries(&path, |p| {
            if !p.is_file() {
                return None;
            }
            stem_with_extension(p, COLLECTION_EXTENSION)
        })
    }

    fn create_collection(&self, db: &str, coll: &str) -> StorageResult<()> {
        if !self.database_exists(db) {
            return Err(StorageError::not_found(format!("Database '{}' does not exist", db)));
        }
        if self.collection_exists(db, coll) {
            return Err(StorageError::already_exists(format!(
                "Collection '{}.{}' already exists",
                db, coll
            )));
        }
        // Stale index units from an earlier collection of the same name
        let index_dir = self.index_dir(db, coll);
        if index_dir.exists() {
            fs::remove_dir_all(&index_dir).map_err(|e| {
                StorageError::io_error(format!("failed to clear indices of '{}.{}'", db, coll), e)
            })?;
        }
        self.persist(db, coll, &[])
    }

    fn drop_collection(&self, db: &str, coll: &str) -> StorageResult<()> {
        if !self.collection_exists(db, coll) {
            return Err(StorageError::not_found(format!(
                "Collection '{}.{}' does not exist",
                db, coll
            )));
        }
        fs::remove_file(self.collection_path(db, coll)).map_err(|e| {
            StorageError::io_error(format!("failed to drop collection '{}.{}'", db, coll), e)
        })?;

        let index_dir = self.index_dir(db, coll);
        if index_dir.exists() {
            fs::remove_dir_all(&index_dir).map_err(|e| {
                StorageError::io_error(format!("failed to drop indices of '{}.{}'", db, coll), e)
            })?;
        }
        Ok(())
    }

    fn collection_exists(&self, db: &str, coll: &str) -> bool {
        self.collection_path(db, coll).is_file()
    }

    fn load(&self, db: &str, coll: &str) -> StorageResult<Vec<Document>> {
        let path = self.collection_path(db, coll);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::not_found(format!(
                    "Collection '{}.{}' does not exist",
                    db, coll
                )))
            }
            Err(e) => {
                return Err(StorageError::io_error(
                    format!("failed to read {}", path.display()),
                    e,
                ))
            }
        };
        Self::decode_documents(&path, &content)
    }

    fn persist(&self, db: &str, coll: &str, documents: &[Document]) -> StorageResult<()> {
        let path = self.collection_path(db, coll);
        let bytes = Self::encode_documents(documents)?;
        write_atomic(&path, &bytes)
            .map_err(|e| StorageError::io_error(format!("failed to write {}", path.display()), e))?;
        debug!(db, coll, documents = documents.len(), "persisted collection");
        Ok(())
    }

    fn list_index_units(&self, db: &str, coll: &str) -> StorageResult<Vec<String>> {
        let dir = self.index_dir(db, coll);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        Self::sorted_entries(&dir, |p| stem_with_extension(p, INDEX_EXTENSION))
    }

    fn load_index(&self, db: &str, coll: &str, field: &str) -> StorageResult<Option<PersistedIndex>> {
        let path = self.index_path(db, coll, field);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StorageError::io_error(
                    format!("failed to read {}", path.display()),
                    e,
                ))
            }
        };
        let index: PersistedIndex = serde_json::from_str(&content)
            .map_err(|e| StorageError::corruption(path.display(), e.to_string()))?;
        if index.field != field {
            return Err(StorageError::corruption(
                path.display(),
                format!("holds field '{}'", index.field),
            ));
        }
        Ok(Some(index))
    }

    fn persist_index(&self, db: &str, coll: &str, index: &PersistedIndex) -> StorageResult<()> {
        let dir = self.index_dir(db, coll);
        fs::create_dir_all(&dir)
            .map_err(|e| StorageError::io_error(format!("failed to create {}", dir.display()), e))?;

        let path = self.index_path(db, coll, &index.field);
        let bytes = serde_json::to_vec(index)
            .map_err(|e| StorageError::io_error("failed to serialize index", e.into()))?;
        write_atomic(&path, &bytes)
            .map_err(|e| StorageError::io_error(format!("failed to write {}", path.display()), e))?;
        debug!(db, coll, field = %index.field, "persisted index");
        Ok(())
    }

    fn drop_index(&self, db: &str, coll: &str, field: &str) -> StorageResult<()> {
        let path = self.index_path(db, coll, field);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io_error(
                format!("failed to remove {}", path.display()),
                e,
            )),
        }
    }
}
