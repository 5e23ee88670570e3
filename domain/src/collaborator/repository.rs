//! Collaborator registry trait

use super::entities::CollaboratorRecord;
use async_trait::async_trait;

/// Repository of collaborator records keyed by display name.
///
/// The storage format is an implementation detail of the infrastructure
/// layer. Writes merge into the existing records; they never replace the
/// whole store.
#[async_trait]
pub trait CollaboratorRepository: Send + Sync {
    /// Error type for repository operations
    type Error: std::error::Error + Send + Sync + 'static;

    /// Read every record. Called fresh on each discovery.
    async fn all(&self) -> Result<Vec<CollaboratorRecord>, Self::Error>;

    /// Look up a single record by display name.
    async fn get(&self, identity: &str) -> Result<Option<CollaboratorRecord>, Self::Error>;

    /// Insert or replace the record for `record.identity`, keeping all others.
    async fn upsert(&self, record: CollaboratorRecord) -> Result<(), Self::Error>;
}
