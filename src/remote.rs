//! Remote copy of the daily history, kept in a single private GitHub gist.

use crate::errors::LedgerError;
use crate::models::HistoryRecord;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{info, warn};

pub const GIST_API_BASE: &str = "https://api.github.com";
const GIST_FILENAME: &str = "calorie_history.json";
const GIST_DESCRIPTION: &str = "Calorie deficit/excess history";
const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";

#[derive(Debug, Clone)]
pub struct RemoteRecord {
    pub id: String,
    pub record: HistoryRecord,
    /// Set when the record did not exist and was just created.
    pub created: bool,
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Loads the record `record_id`, or creates an empty one when no id is known.
    async fn fetch_record(
        &self,
        credential: &str,
        record_id: Option<&str>,
    ) -> Result<RemoteRecord, LedgerError>;

    async fn replace_record(
        &self,
        credential: &str,
        record_id: &str,
        record: &HistoryRecord,
    ) -> Result<(), LedgerError>;
}

#[derive(Clone)]
pub struct GistHistoryStore {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct GistResponse {
    id: String,
    #[serde(default)]
    files: HashMap<String, GistFileContent>,
}

#[derive(Debug, Deserialize)]
struct GistFileContent {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct GistWrite<'a> {
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    public: Option<bool>,
    files: HashMap<&'a str, GistFileWrite>,
}

#[derive(Debug, Serialize)]
struct GistFileWrite {
    content: String,
}

impl GistHistoryStore {
    pub fn new(base_url: impl Into<String>) -> Result<Self, LedgerError> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    fn payload(
        record: &HistoryRecord,
        public: Option<bool>,
    ) -> Result<GistWrite<'static>, LedgerError> {
        let content = serde_json::to_string(record)?;
        Ok(GistWrite {
            description: GIST_DESCRIPTION,
            public,
            files: HashMap::from([(GIST_FILENAME, GistFileWrite { content })]),
        })
    }

    async fn create(&self, credential: &str) -> Result<RemoteRecord, LedgerError> {
        let record = HistoryRecord::default();
        let response = self
            .client
            .post(format!("{}/gists", self.base_url))
            .header(AUTHORIZATION, format!("token {credential}"))
            .header(ACCEPT, GITHUB_ACCEPT)
            .json(&Self::payload(&record, Some(false))?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LedgerError::Network(format!(
                "failed to create gist: {}",
                response.status()
            )));
        }

        let gist: GistResponse = response.json().await?;
        info!(gist_id = %gist.id, "created history gist");
        Ok(RemoteRecord {
            id: gist.id,
            record,
            created: true,
        })
    }

    async fn fetch(&self, credential: &str, id: &str) -> Result<RemoteRecord, LedgerError> {
        let response = self
            .client
            .get(format!("{}/gists/{id}", self.base_url))
            .header(AUTHORIZATION, format!("token {credential}"))
            .header(ACCEPT, GITHUB_ACCEPT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LedgerError::Network(format!(
                "failed to fetch gist: {}",
                response.status()
            )));
        }

        let gist: GistResponse = response.json().await?;
        let record = match gist.files.get(GIST_FILENAME).and_then(|f| f.content.as_deref()) {
            Some(content) => serde_json::from_str(content).map_err(|err| {
                LedgerError::Network(format!("gist holds malformed history: {err}"))
            })?,
            None => {
                warn!(gist_id = %gist.id, "gist has no {GIST_FILENAME}, starting empty");
                HistoryRecord::default()
            }
        };

        Ok(RemoteRecord {
            id: gist.id,
            record,
            created: false,
        })
    }
}

#[async_trait]
impl HistoryStore for GistHistoryStore {
    async fn fetch_record(
        &self,
        credential: &str,
        record_id: Option<&str>,
    ) -> Result<RemoteRecord, LedgerError> {
        match record_id {
            Some(id) => self.fetch(credential, id).await,
            None => self.create(credential).await,
        }
    }

    async fn replace_record(
        &self,
        credential: &str,
        record_id: &str,
        record: &HistoryRecord,
    ) -> Result<(), LedgerError> {
        let response = self
            .client
            .patch(format!("{}/gists/{record_id}", self.base_url))
            .header(AUTHORIZATION, format!("token {credential}"))
            .header(ACCEPT, GITHUB_ACCEPT)
            .json(&Self::payload(record, None)?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LedgerError::Network(format!(
                "failed to update gist: {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// In-process stand-in for the gist, keyed by record id.
#[derive(Default)]
pub struct MemoryHistoryStore {
    records: Mutex<HashMap<String, HistoryRecord>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, id: &str) -> Option<HistoryRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn fetch_record(
        &self,
        _credential: &str,
        record_id: Option<&str>,
    ) -> Result<RemoteRecord, LedgerError> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        match record_id {
            Some(id) => records
                .get(id)
                .cloned()
                .map(|record| RemoteRecord {
                    id: id.to_string(),
                    record,
                    created: false,
                })
                .ok_or_else(|| LedgerError::Network(format!("record {id} not found"))),
            None => {
                let id = format!("mem-{}", records.len() + 1);
                records.insert(id.clone(), HistoryRecord::default());
                Ok(RemoteRecord {
                    id,
                    record: HistoryRecord::default(),
                    created: true,
                })
            }
        }
    }

    async fn replace_record(
        &self,
        _credential: &str,
        record_id: &str,
        record: &HistoryRecord,
    ) -> Result<(), LedgerError> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        match records.get_mut(record_id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(LedgerError::Network(format!("record {record_id} not found"))),
        }
    }
}
