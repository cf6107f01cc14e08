use std::{
    fs::{self, File},
    io::{self, Read, Write},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use picpost_core::store::{ensure_id, Collection, Document, RecordStore, StoreError};
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

/// File-backed document store: one JSON file per record under
/// `<root>/<collection>/<base64url(id)>.json`.
pub struct FileRecordStore {
    root: PathBuf,
}

impl FileRecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn collection_dir(&self, collection: Collection) -> PathBuf {
        self.root.join(collection.name())
    }

    fn path_for(&self, collection: Collection, id: &str) -> PathBuf {
        self.collection_dir(collection)
            .join(format!("{}.json", sanitize_id(id)))
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    #[instrument(skip_all, fields(root = %self.root.display()))]
    async fn ping(&self) -> Result<(), StoreError> {
        let dirs: Vec<PathBuf> = Collection::ALL
            .into_iter()
            .map(|collection| self.collection_dir(collection))
            .collect();
        run_blocking(move || {
            for dir in dirs {
                fs::create_dir_all(&dir).map_err(unavailable)?;
                // Check writability without leaving anything behind.
                NamedTempFile::new_in(&dir).map_err(unavailable)?;
            }
            Ok(())
        })
        .await
    }

    #[instrument(skip(self, document))]
    async fn insert(
        &self,
        collection: Collection,
        mut document: Document,
    ) -> Result<String, StoreError> {
        let id = ensure_id(&mut document)?;
        let path = self.path_for(collection, &id);
        let written = run_blocking(move || Ok(write_new_document(&path, &document))).await?;
        written.map_err(|err| match err {
            WriteError::Exists => StoreError::DuplicateId {
                collection,
                id: id.clone(),
            },
            WriteError::Store(err) => err,
        })?;
        debug!(%id, "stored document");
        Ok(id)
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, collection: Collection, id: &str) -> Result<Document, StoreError> {
        let path = self.path_for(collection, id);
        let read = run_blocking(move || Ok(read_document(&path))).await?;
        read.map_err(|err| match err {
            ReadError::Missing => StoreError::NotFound {
                collection,
                id: id.to_string(),
            },
            ReadError::Store(err) => err,
        })
    }
}

/// File I/O runs on the blocking pool so a stalled call can be timed out
/// without pinning a runtime worker.
async fn run_blocking<T, F>(work: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| StoreError::Unavailable {
            reason: format!("blocking store task failed: {e}"),
        })?
}

enum WriteError {
    Exists,
    Store(StoreError),
}

enum ReadError {
    Missing,
    Store(StoreError),
}

/// Write atomically, refusing to replace an existing record.
fn write_new_document(path: &Path, document: &Document) -> Result<(), WriteError> {
    let parent = path.parent().ok_or_else(|| {
        WriteError::Store(StoreError::Unavailable {
            reason: "invalid storage path".to_string(),
        })
    })?;
    fs::create_dir_all(parent).map_err(|e| WriteError::Store(unavailable(e)))?;

    let json = serde_json::to_vec(document).map_err(|e| {
        WriteError::Store(StoreError::Malformed {
            reason: e.to_string(),
        })
    })?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| WriteError::Store(unavailable(e)))?;
    tmp.write_all(&json)
        .map_err(|e| WriteError::Store(unavailable(e)))?;
    tmp.flush().map_err(|e| WriteError::Store(unavailable(e)))?;
    tmp.persist_noclobber(path).map_err(|e| {
        if e.error.kind() == io::ErrorKind::AlreadyExists {
            WriteError::Exists
        } else {
            WriteError::Store(unavailable(e.error))
        }
    })?;
    Ok(())
}

fn read_document(path: &Path) -> Result<Document, ReadError> {
    let mut file = File::open(path).map_err(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            ReadError::Missing
        } else {
            ReadError::Store(unavailable(err))
        }
    })?;

    let mut buf = Vec::new();
    file.read_to_end(&mut buf)
        .map_err(|e| ReadError::Store(unavailable(e)))?;
    serde_json::from_slice(&buf).map_err(|e| {
        ReadError::Store(StoreError::Malformed {
            reason: format!("{}: {e}", path.display()),
        })
    })
}

fn sanitize_id(id: &str) -> String {
    URL_SAFE_NO_PAD.encode(id)
}

fn unavailable<E: ToString>(err: E) -> StoreError {
    StoreError::Unavailable {
        reason: err.to_string(),
    }
}
