//! JSON file collaborator registry.
//!
//! The document is an object keyed by display name:
//!
//! ```json
//! {
//!   "Merchant": { "agentId": "agent-2", "planId": "plan-2", "role": "merchant" }
//! }
//! ```
//!
//! Every read goes to disk. Writes re-read the document, merge one entry
//! and replace the file atomically, so entries written by other agents
//! (and fields this version does not know) survive.

use async_trait::async_trait;
use blockhand_domain::{AgentId, CollaboratorRecord, CollaboratorRepository, PlanId, Role};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

/// Errors from the JSON file registry
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Registry I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Registry document {path} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// On-disk shape of one entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistryEntry {
    agent_id: AgentId,
    plan_id: PlanId,
    #[serde(default)]
    role: Role,
}

impl RegistryEntry {
    fn into_record(self, identity: &str) -> CollaboratorRecord {
        CollaboratorRecord::new(identity, self.agent_id, self.plan_id, self.role)
    }
}

pub struct JsonFileCollaboratorRegistry {
    path: PathBuf,
    /// Serializes read-merge-write cycles within this process.
    write_lock: Mutex<()>,
}

impl JsonFileCollaboratorRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> RegistryError {
        RegistryError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Read the raw document. A missing or empty file is an empty registry.
    async fn read_document(&self) -> Result<Map<String, Value>, RegistryError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(self.io_error(e)),
        };
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        serde_json::from_str(&content).map_err(|source| RegistryError::Malformed {
            path: self.path.clone(),
            source,
        })
    }

    async fn write_document(&self, document: &Map<String, Value>) -> Result<(), RegistryError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let content = serde_json::to_string_pretty(document).map_err(|source| {
            RegistryError::Malformed {
                path: self.path.clone(),
                source,
            }
        })?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))
    }
}

fn parse_entry(identity: &str, value: &Value) -> Option<CollaboratorRecord> {
    match serde_json::from_value::<RegistryEntry>(value.clone()) {
        Ok(entry) => Some(entry.into_record(identity)),
        Err(e) => {
            debug!("Skipping unreadable registry entry {}: {}", identity, e);
            None
        }
    }
}

#[async_trait]
impl CollaboratorRepository for JsonFileCollaboratorRegistry {
    type Error = RegistryError;

    async fn all(&self) -> Result<Vec<CollaboratorRecord>, Self::Error> {
        let document = self.read_document().await?;
        Ok(document
            .iter()
            .filter_map(|(identity, value)| parse_entry(identity, value))
            .collect())
    }

    async fn get(&self, identity: &str) -> Result<Option<CollaboratorRecord>, Self::Error> {
        let document = self.read_document().await?;
        Ok(document
            .get(identity)
            .and_then(|value| parse_entry(identity, value)))
    }

    async fn upsert(&self, record: CollaboratorRecord) -> Result<(), Self::Error> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read_document().await?;

        let entry = RegistryEntry {
            agent_id: record.agent_id,
            plan_id: record.plan_id,
            role: record.role,
        };
        let mut value = serde_json::to_value(&entry).map_err(|source| RegistryError::Malformed {
            path: self.path.clone(),
            source,
        })?;

        // Keep fields written by other tools.
        if let Some(Value::Object(existing)) = document.get(&record.identity)
            && let Value::Object(fields) = &mut value
        {
            for (key, old) in existing {
                fields.entry(key.clone()).or_insert_with(|| old.clone());
            }
        }

        document.insert(record.identity.clone(), value);
        self.write_document(&document).await?;
        debug!("Registry entry for {} written to {}", record.identity, self.path.display());
        Ok(())
    }
}
