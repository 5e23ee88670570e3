//! Chat narration.
//!
//! Behaviors report progress and failures to the requester through in-game
//! chat. A failed send is never worth aborting a behavior over, so the
//! narrator only logs it.

use crate::ports::world::WorldPort;
use std::sync::Arc;
use tracing::{debug, warn};

/// Best-effort chat sender shared by the use cases of one agent.
#[derive(Clone)]
pub struct Narrator {
    world: Arc<dyn WorldPort>,
}

impl Narrator {
    pub fn new(world: Arc<dyn WorldPort>) -> Self {
        Self { world }
    }

    pub async fn say(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        debug!("{} says: {}", self.world.username(), message);
        if let Err(e) = self.world.send_chat(message).await {
            warn!("Failed to send chat message: {}", e);
        }
    }
}
