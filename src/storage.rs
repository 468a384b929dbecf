use crate::errors::LedgerError;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex as StdMutex;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::error;

/// Flat key/value document store. Values are opaque strings; callers
/// serialize whole documents and write them back in one piece.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, LedgerError>;
    async fn set(&self, key: &str, value: String) -> Result<(), LedgerError>;
    async fn remove(&self, key: &str) -> Result<(), LedgerError>;
}

/// Document store persisted as a single JSON object on disk.
pub struct FileDocumentStore {
    path: PathBuf,
    documents: Mutex<BTreeMap<String, String>>,
}

impl FileDocumentStore {
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let documents = load_documents(&path).await;
        Self {
            path,
            documents: Mutex::new(documents),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn get(&self, key: &str) -> Result<Option<String>, LedgerError> {
        Ok(self.documents.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), LedgerError> {
        let mut documents = self.documents.lock().await;
        let mut updated = documents.clone();
        updated.insert(key.to_string(), value);
        persist_documents(&self.path, &updated).await?;
        *documents = updated;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), LedgerError> {
        let mut documents = self.documents.lock().await;
        if !documents.contains_key(key) {
            return Ok(());
        }
        let mut updated = documents.clone();
        updated.remove(key);
        persist_documents(&self.path, &updated).await?;
        *documents = updated;
        Ok(())
    }
}

async fn load_documents(path: &Path) -> BTreeMap<String, String> {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(documents) => documents,
            Err(err) => {
                error!("failed to parse data file: {err}");
                BTreeMap::new()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
        Err(err) => {
            error!("failed to read data file: {err}");
            BTreeMap::new()
        }
    }
}

async fn persist_documents(
    path: &Path,
    documents: &BTreeMap<String, String>,
) -> Result<(), LedgerError> {
    let payload = serde_json::to_vec_pretty(documents)?;
    fs::write(path, payload).await?;
    Ok(())
}

#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: StdMutex<HashMap<String, String>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, key: &str) -> Result<Option<String>, LedgerError> {
        let documents = self.documents.lock().unwrap_or_else(|e| e.into_inner());
        Ok(documents.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), LedgerError> {
        let mut documents = self.documents.lock().unwrap_or_else(|e| e.into_inner());
        documents.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), LedgerError> {
        let mut documents = self.documents.lock().unwrap_or_else(|e| e.into_inner());
        documents.remove(key);
        Ok(())
    }
}
