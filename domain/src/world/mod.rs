//! World domain.
//!
//! - [`value_objects`]: positions, block coordinates, faces, resource tags
//! - [`inventory::Inventory`]: slot-based item storage with stack compaction
//! - [`entities::AgentState`]: what the agent is doing and carrying

pub mod entities;
pub mod inventory;
pub mod value_objects;
