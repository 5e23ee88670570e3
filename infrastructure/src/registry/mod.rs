//! Collaborator registry adapters.
//!
//! Provides [`JsonFileCollaboratorRegistry`], a flat JSON document that
//! implements the [`CollaboratorRepository`](blockhand_domain::CollaboratorRepository)
//! trait and can be shared by several agent processes.

mod json_file;

pub use json_file::{JsonFileCollaboratorRegistry, RegistryError};
