//! Collaborator domain.
//!
//! - [`entities::CollaboratorRecord`]: a peer's ledger identity and role
//! - [`repository::CollaboratorRepository`]: trait for registry persistence

pub mod entities;
pub mod repository;
