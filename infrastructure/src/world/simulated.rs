//! Simulated voxel world.
//!
//! Cells below `y = 0` are solid ground; everything else is empty unless a
//! block was set. Bodies walk in straight lines one block per
//! `step_time`, which is enough for the stall watchdog to see motion and
//! for `stop_movement` to interrupt a walk between steps.

use async_trait::async_trait;
use blockhand_application::ports::world::{
    BlockPredicate, Control, Goal, WorldError, WorldEvent, WorldPort,
};
use blockhand_domain::{Block, BlockPos, DroppedItem, Face, Inventory, Position, ResourceTag};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

const EVENT_CAPACITY: usize = 256;

/// Physical constants of the simulation.
#[derive(Debug, Clone)]
pub struct SimulationSettings {
    /// Maximum distance at which blocks can be dug or placed.
    pub reach: f64,
    /// Maximum distance at which a dropped item can be picked up.
    pub pickup_reach: f64,
    /// Time to walk one block.
    pub step_time: Duration,
    /// Time to dig one block.
    pub dig_time: Duration,
    /// Block kind reported for the ground plane.
    pub ground: ResourceTag,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            reach: 8.0,
            pickup_reach: 1.5,
            step_time: Duration::from_millis(50),
            dig_time: Duration::from_millis(100),
            ground: ResourceTag::new("dirt"),
        }
    }
}

/// A chat line as seen by an observer of the whole world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    pub sender: String,
    pub message: String,
}

struct Body {
    position: Position,
    inventory: Inventory,
    connected: bool,
    controls: HashSet<Control>,
    held: Option<ResourceTag>,
    look: Option<Position>,
    /// Bumped by `stop_movement`; a walk in progress ends when it changes.
    movement: u64,
    failing_reconnects: u32,
    /// Only agent bodies receive events.
    events: Option<broadcast::Sender<WorldEvent>>,
}

impl Body {
    fn new(position: Position, events: Option<broadcast::Sender<WorldEvent>>) -> Self {
        Self {
            position,
            inventory: Inventory::new(),
            connected: true,
            controls: HashSet::new(),
            held: None,
            look: None,
            movement: 0,
            failing_reconnects: 0,
            events,
        }
    }
}

#[derive(Default)]
struct WorldState {
    blocks: HashMap<BlockPos, ResourceTag>,
    bodies: HashMap<String, Body>,
    drops: Vec<DroppedItem>,
    next_drop: u64,
}

impl WorldState {
    fn solid(&self, position: BlockPos) -> bool {
        position.y < 0 || self.blocks.contains_key(&position)
    }

    /// Lowest free cell of column `(x, z)` reachable from `from_y`.
    fn standing_height(&self, x: i32, z: i32, from_y: i32) -> i32 {
        let mut y = from_y.max(0);
        while self.solid(BlockPos::new(x, y, z)) {
            y += 1;
        }
        while y > 0 && !self.solid(BlockPos::new(x, y - 1, z)) {
            y -= 1;
        }
        y
    }

    fn snap(&self, position: Position) -> Position {
        let cell = position.block();
        let y = self.standing_height(cell.x, cell.z, cell.y);
        Position::new(position.x, y as f64, position.z)
    }

    fn resolve(&self, name: &str) -> Option<String> {
        if self.bodies.contains_key(name) {
            return Some(name.to_string());
        }
        self.bodies
            .keys()
            .find(|key| key.eq_ignore_ascii_case(name))
            .cloned()
    }

    fn body(&self, name: &str) -> Result<&Body, WorldError> {
        self.bodies
            .get(name)
            .filter(|body| body.connected)
            .ok_or(WorldError::NotConnected)
    }

    fn body_mut(&mut self, name: &str) -> Result<&mut Body, WorldError> {
        self.bodies
            .get_mut(name)
            .filter(|body| body.connected)
            .ok_or(WorldError::NotConnected)
    }
}

/// Shared world state. Cheap to share through `Arc`.
pub struct SimulatedWorld {
    state: Mutex<WorldState>,
    chat: broadcast::Sender<ChatLine>,
    settings: SimulationSettings,
}

impl SimulatedWorld {
    pub fn new() -> Arc<Self> {
        Self::with_settings(SimulationSettings::default())
    }

    pub fn with_settings(settings: SimulationSettings) -> Arc<Self> {
        let (chat, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            state: Mutex::new(WorldState::default()),
            chat,
            settings,
        })
    }

    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    fn with<T>(&self, f: impl FnOnce(&mut WorldState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    // ==================== Terrain ====================

    pub fn set_block(&self, position: BlockPos, kind: impl Into<ResourceTag>) {
        let kind = kind.into();
        self.with(|s| s.blocks.insert(position, kind));
    }

    pub fn block_kind(&self, position: BlockPos) -> Option<ResourceTag> {
        self.with(|s| s.blocks.get(&position).cloned())
    }

    /// A trunk of `height` logs on `base` with a 5×5×3 canopy around its top.
    pub fn plant_tree(&self, base: BlockPos, height: i32, log: &ResourceTag, leaves: &ResourceTag) {
        let top = base.offset(0, height - 1, 0);
        self.with(|s| {
            for dy in -1..=1 {
                for dx in -2..=2 {
                    for dz in -2..=2 {
                        let cell = top.offset(dx, dy, dz);
                        if cell.y >= 0 {
                            s.blocks.entry(cell).or_insert_with(|| leaves.clone());
                        }
                    }
                }
            }
            for dy in 0..height {
                s.blocks.insert(base.offset(0, dy, 0), log.clone());
            }
        });
    }

    // ==================== Bodies ====================

    /// Add a player body with no agent behind it.
    pub fn add_player(&self, name: &str, position: Position) -> Result<(), WorldError> {
        self.with(|s| {
            if s.resolve(name).is_some() {
                return Err(WorldError::Other(format!("{} is already in the world", name)));
            }
            let position = s.snap(position);
            s.bodies.insert(name.to_string(), Body::new(position, None));
            Ok(())
        })
    }

    /// Add an agent body and return the port controlling it.
    ///
    /// The body is connected but silent until [`SimulatedAgent::spawn`].
    pub fn join(self: &Arc<Self>, name: &str, position: Position) -> Result<SimulatedAgent, WorldError> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        self.with(|s| {
            if s.resolve(name).is_some() {
                return Err(WorldError::Other(format!("{} is already in the world", name)));
            }
            let position = s.snap(position);
            s.bodies
                .insert(name.to_string(), Body::new(position, Some(events.clone())));
            Ok(())
        })?;
        info!("{} joined the world", name);
        Ok(SimulatedAgent {
            world: Arc::clone(self),
            name: name.to_string(),
            events,
        })
    }

    pub fn give(&self, name: &str, resource: &ResourceTag, count: u32) -> Result<(), WorldError> {
        self.with(|s| {
            let name = s.resolve(name).ok_or(WorldError::NotConnected)?;
            s.body_mut(&name)?.inventory.add(resource, count);
            Ok(())
        })
    }

    pub fn position_of(&self, name: &str) -> Option<Position> {
        self.with(|s| {
            let name = s.resolve(name)?;
            s.body(&name).ok().map(|b| b.position)
        })
    }

    pub fn count_of(&self, name: &str, resource: &ResourceTag) -> u32 {
        self.with(|s| {
            s.resolve(name)
                .and_then(|name| s.bodies.get(&name).map(|b| b.inventory.count(resource)))
                .unwrap_or(0)
        })
    }

    pub fn is_connected(&self, name: &str) -> bool {
        self.with(|s| {
            s.resolve(name)
                .is_some_and(|name| s.bodies.get(&name).is_some_and(|b| b.connected))
        })
    }

    pub fn drops(&self) -> Vec<DroppedItem> {
        self.with(|s| s.drops.clone())
    }

    // ==================== Chat & Connection ====================

    /// Observe every chat line spoken in the world.
    pub fn subscribe_chat(&self) -> broadcast::Receiver<ChatLine> {
        self.chat.subscribe()
    }

    /// Speak as `sender`. A disconnected body cannot speak.
    pub fn say(&self, sender: &str, message: &str) -> Result<(), WorldError> {
        let line = self.with(|s| {
            let name = s.resolve(sender).ok_or(WorldError::NotConnected)?;
            s.body(&name)?;
            for body in s.bodies.values().filter(|b| b.connected) {
                if let Some(events) = &body.events {
                    let _ = events.send(WorldEvent::Chat {
                        sender: name.clone(),
                        message: message.to_string(),
                    });
                }
            }
            Ok(ChatLine {
                sender: name,
                message: message.to_string(),
            })
        })?;
        let _ = self.chat.send(line);
        Ok(())
    }

    /// Drop the connection of an agent body.
    pub fn disconnect(&self, name: &str, reason: &str) -> Result<(), WorldError> {
        self.with(|s| {
            let name = s.resolve(name).ok_or(WorldError::NotConnected)?;
            let body = s.body_mut(&name)?;
            body.connected = false;
            body.controls.clear();
            body.movement += 1;
            if let Some(events) = &body.events {
                let _ = events.send(WorldEvent::ConnectionLost {
                    reason: reason.to_string(),
                });
            }
            info!("{} disconnected: {}", name, reason);
            Ok(())
        })
    }

    /// Make the next `times` reconnection attempts of `name` fail.
    pub fn fail_reconnects(&self, name: &str, times: u32) {
        self.with(|s| {
            if let Some(name) = s.resolve(name)
                && let Some(body) = s.bodies.get_mut(&name)
            {
                body.failing_reconnects = times;
            }
        });
    }
}

/// One agent's body in a [`SimulatedWorld`].
pub struct SimulatedAgent {
    world: Arc<SimulatedWorld>,
    name: String,
    events: broadcast::Sender<WorldEvent>,
}

impl SimulatedAgent {
    pub fn world(&self) -> &Arc<SimulatedWorld> {
        &self.world
    }

    /// Announce the body as ready.
    pub fn spawn(&self) {
        self.world.with(|s| {
            if let Some(body) = s.bodies.get_mut(&self.name) {
                body.connected = true;
            }
        });
        let _ = self.events.send(WorldEvent::Spawn);
    }

    fn reach_check(&self, from: Position, target: BlockPos) -> Result<(), WorldError> {
        let eye = from.offset(0.0, 1.0, 0.0);
        let center = target.center().offset(0.0, 0.5, 0.0);
        if eye.distance_to(&center) > self.world.settings.reach {
            return Err(WorldError::OutOfReach(target.to_string()));
        }
        Ok(())
    }

    /// Where a walk toward `goal` should end, or `None` to stay put.
    fn destination(&self, s: &WorldState, start: Position, goal: Goal) -> Option<Position> {
        match goal {
            Goal::Block(target) => [(1, 0), (-1, 0), (0, 1), (0, -1)]
                .into_iter()
                .map(|(dx, dz)| {
                    let x = target.x + dx;
                    let z = target.z + dz;
                    BlockPos::new(x, s.standing_height(x, z, 0), z).center()
                })
                .min_by(|a, b| a.distance_to(&start).total_cmp(&b.distance_to(&start))),
            Goal::Near { position, range } => {
                let distance = start.distance_to(&position);
                if distance <= range {
                    return None;
                }
                let t = range / distance;
                Some(s.snap(Position::new(
                    position.x + (start.x - position.x) * t,
                    position.y,
                    position.z + (start.z - position.z) * t,
                )))
            }
            Goal::Exact(position) => Some(s.snap(position)),
        }
    }
}

fn lerp(from: Position, to: Position, t: f64) -> Position {
    Position::new(
        from.x + (to.x - from.x) * t,
        from.y + (to.y - from.y) * t,
        from.z + (to.z - from.z) * t,
    )
}

#[async_trait]
impl WorldPort for SimulatedAgent {
    fn username(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        self.world.with(|s| s.body(&self.name).is_ok())
    }

    fn position(&self) -> Result<Position, WorldError> {
        self.world.with(|s| Ok(s.body(&self.name)?.position))
    }

    fn inventory(&self) -> Result<Inventory, WorldError> {
        self.world.with(|s| Ok(s.body(&self.name)?.inventory.clone()))
    }

    fn find_nearest_block(
        &self,
        predicate: BlockPredicate<'_>,
        max_distance: u32,
    ) -> Result<Option<Block>, WorldError> {
        self.world.with(|s| {
            let here = s.body(&self.name)?.position;
            let origin = here.block();
            let max = i32::try_from(max_distance).unwrap_or(i32::MAX);
            Ok(s.blocks
                .iter()
                .filter(|(position, _)| position.chebyshev(&origin) <= max)
                .map(|(position, kind)| Block::new(*position, kind.clone()))
                .filter(|block| predicate(block))
                .min_by(|a, b| {
                    let da = a.position.center().distance_to(&here);
                    let db = b.position.center().distance_to(&here);
                    da.total_cmp(&db).then_with(|| {
                        (a.position.x, a.position.y, a.position.z)
                            .cmp(&(b.position.x, b.position.y, b.position.z))
                    })
                }))
        })
    }

    fn blocks_near(
        &self,
        center: BlockPos,
        radius: u32,
        predicate: BlockPredicate<'_>,
    ) -> Result<Vec<Block>, WorldError> {
        self.world.with(|s| {
            s.body(&self.name)?;
            let radius = i32::try_from(radius).unwrap_or(i32::MAX);
            let mut blocks: Vec<Block> = s
                .blocks
                .iter()
                .filter(|(position, _)| position.chebyshev(&center) <= radius)
                .map(|(position, kind)| Block::new(*position, kind.clone()))
                .filter(|block| predicate(block))
                .collect();
            blocks.sort_by_key(|b| (b.position.x, b.position.y, b.position.z));
            Ok(blocks)
        })
    }

    fn block_at(&self, position: BlockPos) -> Result<Option<Block>, WorldError> {
        self.world.with(|s| {
            s.body(&self.name)?;
            if let Some(kind) = s.blocks.get(&position) {
                return Ok(Some(Block::new(position, kind.clone())));
            }
            if position.y < 0 {
                return Ok(Some(Block::new(position, self.world.settings.ground.clone())));
            }
            Ok(None)
        })
    }

    fn player_position(&self, name: &str) -> Result<Option<Position>, WorldError> {
        self.world.with(|s| {
            s.body(&self.name)?;
            Ok(s.resolve(name)
                .and_then(|name| s.body(&name).ok().map(|b| b.position)))
        })
    }

    fn dropped_items_near(
        &self,
        center: Position,
        radius: f64,
    ) -> Result<Vec<DroppedItem>, WorldError> {
        self.world.with(|s| {
            s.body(&self.name)?;
            Ok(s.drops
                .iter()
                .filter(|item| item.position.distance_to(&center) <= radius)
                .cloned()
                .collect())
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<WorldEvent> {
        self.events.subscribe()
    }

    async fn path_to(&self, goal: Goal) -> Result<(), WorldError> {
        let plan = self.world.with(|s| {
            let body = s.body(&self.name)?;
            let start = body.position;
            Ok::<_, WorldError>(
                self.destination(s, start, goal)
                    .map(|dest| (start, dest, body.movement)),
            )
        })?;
        let Some((start, dest, movement)) = plan else {
            return Ok(());
        };

        let steps = start.distance_to(&dest).ceil().max(1.0) as u32;
        for step in 1..=steps {
            tokio::time::sleep(self.world.settings.step_time).await;
            let next = lerp(start, dest, f64::from(step) / f64::from(steps));
            self.world.with(|s| {
                let body = s.body_mut(&self.name)?;
                if body.movement != movement {
                    return Err(WorldError::Interrupted);
                }
                body.position = next;
                Ok(())
            })?;
        }
        debug!("{} arrived at {}", self.name, dest);
        Ok(())
    }

    fn stop_movement(&self) {
        self.world.with(|s| {
            if let Some(body) = s.bodies.get_mut(&self.name) {
                body.movement += 1;
            }
        });
    }

    fn set_control_state(&self, control: Control, active: bool) {
        self.world.with(|s| {
            if let Some(body) = s.bodies.get_mut(&self.name) {
                if active {
                    body.controls.insert(control);
                } else {
                    body.controls.remove(&control);
                }
            }
        });
    }

    fn clear_control_states(&self) {
        self.world.with(|s| {
            if let Some(body) = s.bodies.get_mut(&self.name) {
                body.controls.clear();
            }
        });
    }

    async fn collect(&self, block: &Block) -> Result<(), WorldError> {
        tokio::time::sleep(self.world.settings.dig_time).await;
        self.world.with(|s| {
            let here = s.body(&self.name)?.position;
            self.reach_check(here, block.position)?;
            match s.blocks.get(&block.position) {
                Some(kind) if kind == &block.kind => {}
                _ => {
                    return Err(WorldError::Other(format!(
                        "no {} at {}",
                        block.kind, block.position
                    )));
                }
            }
            s.blocks.remove(&block.position);

            let overflow = s.body_mut(&self.name)?.inventory.add(&block.kind, 1);
            if overflow > 0 {
                s.next_drop += 1;
                let id = s.next_drop;
                s.drops.push(DroppedItem {
                    id,
                    resource: block.kind.clone(),
                    count: overflow,
                    position: block.position.center(),
                });
            }
            Ok(())
        })
    }

    async fn compact_stacks(&self, resource: &ResourceTag) -> Result<(), WorldError> {
        self.world.with(|s| {
            s.body_mut(&self.name)?.inventory.compact(resource);
            Ok(())
        })
    }

    async fn equip(&self, resource: &ResourceTag) -> Result<(), WorldError> {
        self.world.with(|s| {
            let body = s.body_mut(&self.name)?;
            if body.inventory.count(resource) == 0 {
                return Err(WorldError::NotHeld(resource.to_string()));
            }
            body.held = Some(resource.clone());
            Ok(())
        })
    }

    async fn place(&self, reference: BlockPos, face: Face) -> Result<(), WorldError> {
        let target = face.target_of(reference);
        self.world.with(|s| {
            let body = s.body(&self.name)?;
            let held = body
                .held
                .clone()
                .ok_or_else(|| WorldError::NotHeld("anything".to_string()))?;
            if body.inventory.count(&held) == 0 {
                return Err(WorldError::NotHeld(held.to_string()));
            }
            if !s.solid(reference) || s.solid(target) {
                return Err(WorldError::PlacementBlocked(target));
            }
            let own_cell = body.position.block() == target;
            if own_cell && !body.controls.contains(&Control::Jump) {
                return Err(WorldError::PlacementBlocked(target));
            }
            self.reach_check(body.position, target)?;

            s.blocks.insert(target, held.clone());
            let body = s.body_mut(&self.name)?;
            body.inventory.remove(&held, 1);
            if own_cell {
                body.position.y = f64::from(target.y + 1);
            }
            Ok(())
        })
    }

    async fn look_at(&self, target: Position) -> Result<(), WorldError> {
        self.world.with(|s| {
            s.body_mut(&self.name)?.look = Some(target);
            Ok(())
        })
    }

    async fn toss(&self, resource: &ResourceTag, count: u32) -> Result<(), WorldError> {
        self.world.with(|s| {
            let body = s.body(&self.name)?;
            if body.inventory.count(resource) < count {
                return Err(WorldError::NotHeld(resource.to_string()));
            }
            let landing = s.snap(body.look.unwrap_or_else(|| body.position.offset(1.0, 0.0, 0.0)));

            s.body_mut(&self.name)?.inventory.remove(resource, count);
            s.next_drop += 1;
            let id = s.next_drop;
            s.drops.push(DroppedItem {
                id,
                resource: resource.clone(),
                count,
                position: landing,
            });
            Ok(())
        })
    }

    async fn pick_up(&self, item: &DroppedItem) -> Result<(), WorldError> {
        self.world.with(|s| {
            let here = s.body(&self.name)?.position;
            let index = s
                .drops
                .iter()
                .position(|d| d.id == item.id)
                .ok_or_else(|| WorldError::Other(format!("item {} is gone", item.id)))?;
            if s.drops[index].position.distance_to(&here) > self.world.settings.pickup_reach {
                return Err(WorldError::OutOfReach(format!("item {}", item.id)));
            }
            let taken = s.drops.remove(index);
            let overflow = s.body_mut(&self.name)?.inventory.add(&taken.resource, taken.count);
            if overflow > 0 {
                s.drops.push(DroppedItem {
                    count: overflow,
                    ..taken
                });
            }
            Ok(())
        })
    }

    async fn send_chat(&self, message: &str) -> Result<(), WorldError> {
        self.world.say(&self.name, message)
    }

    async fn reconnect(&self) -> Result<(), WorldError> {
        self.world.with(|s| {
            let body = s
                .bodies
                .get_mut(&self.name)
                .ok_or(WorldError::NotConnected)?;
            if body.failing_reconnects > 0 {
                body.failing_reconnects -= 1;
                return Err(WorldError::NotConnected);
            }
            body.connected = true;
            Ok(())
        })?;
        info!("{} reconnected", self.name);
        let _ = self.events.send(WorldEvent::Spawn);
        Ok(())
    }
}
