//! World adapters.
//!
//! [`SimulatedWorld`] is a shared voxel grid with a flat ground plane;
//! every agent joins it as a [`SimulatedAgent`] body implementing the
//! [`WorldPort`](blockhand_application::WorldPort). Players without an
//! agent behind them are plain bodies that can only chat.

mod simulated;

pub use simulated::{ChatLine, SimulatedAgent, SimulatedWorld, SimulationSettings};
