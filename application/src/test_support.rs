//! Hand-written port doubles shared by the use case tests.

use crate::ports::ledger::{LedgerError, LedgerPort, LogLevel, TaskSubmission};
use crate::ports::world::{BlockPredicate, Control, Goal, WorldError, WorldEvent, WorldPort};
use crate::use_cases::capabilities::{DelegationReceipt, ResourceDelegator};
use async_trait::async_trait;
use blockhand_domain::{
    AgentError, AgentId, Block, BlockPos, CollaboratorRecord, CollaboratorRepository,
    CreditBalance, DroppedItem, Face, Inventory, PlanId, Position, ResourceTag, Step, StepEvent,
    StepId, TaskId, TaskUpdate,
};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

// ==================== World ====================

#[derive(Default)]
struct WorldState {
    position: Position,
    inventory: Inventory,
    blocks: HashMap<BlockPos, ResourceTag>,
    players: HashMap<String, Position>,
    drops: Vec<DroppedItem>,
    next_drop: u64,
    chat: Vec<String>,
    goals: Vec<Goal>,
    collected: Vec<BlockPos>,
    placed: Vec<BlockPos>,
    jump_placements: u32,
    tosses: Vec<u32>,
    look_target: Option<Position>,
    controls: HashSet<Control>,
    stops: u32,
    paths_in_flight: u32,
    max_paths_in_flight: u32,
    path_delay: Duration,
    unreachable: HashSet<BlockPos>,
    connected: bool,
    failing_reconnects: u32,
    reconnect_attempts: u32,
}

/// Scriptable world recording every call.
pub struct MockWorld {
    name: String,
    state: Mutex<WorldState>,
    events: broadcast::Sender<WorldEvent>,
}

impl MockWorld {
    pub fn new(name: &str) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            name: name.to_string(),
            state: Mutex::new(WorldState {
                position: Position::new(0.5, 0.0, 0.5),
                connected: true,
                ..Default::default()
            }),
            events,
        }
    }

    fn with<T>(&self, f: impl FnOnce(&mut WorldState) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }

    // ---- setup ----

    pub fn give(&self, resource: &str, count: u32) {
        self.with(|s| s.inventory.add(&ResourceTag::new(resource), count));
    }

    pub fn set_position(&self, position: Position) {
        self.with(|s| s.position = position);
    }

    pub fn add_player(&self, name: &str, position: Position) {
        self.with(|s| s.players.insert(name.to_string(), position));
    }

    pub fn set_block(&self, position: BlockPos, kind: &str) {
        self.with(|s| s.blocks.insert(position, ResourceTag::new(kind)));
    }

    /// A trunk of `height` logs with a leaf canopy around its top.
    pub fn place_tree(&self, base: BlockPos, height: i32) {
        let top = base.offset(0, height - 1, 0);
        for dy in -1..=1 {
            for dx in -2..=2 {
                for dz in -2..=2 {
                    self.set_block(top.offset(dx, dy, dz), "oak_leaves");
                }
            }
        }
        for y in 0..height {
            self.set_block(base.offset(0, y, 0), "oak_log");
        }
    }

    pub fn add_drop(&self, resource: &str, count: u32, position: Position) {
        self.with(|s| {
            s.next_drop += 1;
            let id = s.next_drop;
            s.drops.push(DroppedItem {
                id,
                resource: ResourceTag::new(resource),
                count,
                position,
            });
        });
    }

    pub fn set_path_delay(&self, delay: Duration) {
        self.with(|s| s.path_delay = delay);
    }

    pub fn set_unreachable(&self, position: BlockPos) {
        self.with(|s| s.unreachable.insert(position));
    }

    pub fn fail_reconnects(&self, times: u32) {
        self.with(|s| s.failing_reconnects = times);
    }

    /// Deliver an event to subscribers as if it came from the server.
    pub fn emit(&self, event: WorldEvent) {
        if let WorldEvent::ConnectionLost { .. } = event {
            self.with(|s| s.connected = false);
        }
        let _ = self.events.send(event);
    }

    /// Chat from another player.
    pub fn hear(&self, sender: &str, message: &str) {
        self.emit(WorldEvent::Chat {
            sender: sender.to_string(),
            message: message.to_string(),
        });
    }

    // ---- inspection ----

    pub fn held(&self, resource: &str) -> u32 {
        self.with(|s| s.inventory.count(&ResourceTag::new(resource)))
    }

    pub fn chat_log(&self) -> Vec<String> {
        self.with(|s| s.chat.clone())
    }

    pub fn goals(&self) -> Vec<Goal> {
        self.with(|s| s.goals.clone())
    }

    pub fn collected_positions(&self) -> Vec<BlockPos> {
        self.with(|s| s.collected.clone())
    }

    pub fn collected_count(&self) -> usize {
        self.with(|s| s.collected.len())
    }

    pub fn placed(&self) -> Vec<BlockPos> {
        self.with(|s| s.placed.clone())
    }

    pub fn jump_placements(&self) -> u32 {
        self.with(|s| s.jump_placements)
    }

    pub fn tosses(&self) -> Vec<u32> {
        self.with(|s| s.tosses.clone())
    }

    pub fn look_target(&self) -> Option<Position> {
        self.with(|s| s.look_target)
    }

    pub fn stop_count(&self) -> u32 {
        self.with(|s| s.stops)
    }

    pub fn max_concurrent_paths(&self) -> u32 {
        self.with(|s| s.max_paths_in_flight)
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.with(|s| s.reconnect_attempts)
    }

    pub fn drops(&self) -> Vec<DroppedItem> {
        self.with(|s| s.drops.clone())
    }
}

#[async_trait]
impl WorldPort for MockWorld {
    fn username(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        self.with(|s| s.connected)
    }

    fn position(&self) -> Result<Position, WorldError> {
        Ok(self.with(|s| s.position))
    }

    fn inventory(&self) -> Result<Inventory, WorldError> {
        Ok(self.with(|s| s.inventory.clone()))
    }

    fn find_nearest_block(
        &self,
        predicate: BlockPredicate<'_>,
        max_distance: u32,
    ) -> Result<Option<Block>, WorldError> {
        self.with(|s| {
            let here = s.position;
            let origin = here.block();
            Ok(s.blocks
                .iter()
                .map(|(pos, kind)| Block::new(*pos, kind.clone()))
                .filter(|block| block.position.chebyshev(&origin) <= max_distance as i32)
                .filter(|block| predicate(block))
                .min_by(|a, b| {
                    here.distance_to(&a.position.center())
                        .total_cmp(&here.distance_to(&b.position.center()))
                }))
        })
    }

    fn blocks_near(
        &self,
        center: BlockPos,
        radius: u32,
        predicate: BlockPredicate<'_>,
    ) -> Result<Vec<Block>, WorldError> {
        self.with(|s| {
            Ok(s.blocks
                .iter()
                .map(|(pos, kind)| Block::new(*pos, kind.clone()))
                .filter(|block| block.position.chebyshev(&center) <= radius as i32)
                .filter(|block| predicate(block))
                .collect())
        })
    }

    fn block_at(&self, position: BlockPos) -> Result<Option<Block>, WorldError> {
        Ok(self.with(|s| {
            s.blocks
                .get(&position)
                .map(|kind| Block::new(position, kind.clone()))
        }))
    }

    fn player_position(&self, name: &str) -> Result<Option<Position>, WorldError> {
        Ok(self.with(|s| s.players.get(name).copied()))
    }

    fn dropped_items_near(
        &self,
        center: Position,
        radius: f64,
    ) -> Result<Vec<DroppedItem>, WorldError> {
        Ok(self.with(|s| {
            s.drops
                .iter()
                .filter(|item| item.position.distance_to(&center) <= radius)
                .cloned()
                .collect()
        }))
    }

    fn subscribe(&self) -> broadcast::Receiver<WorldEvent> {
        self.events.subscribe()
    }

    async fn path_to(&self, goal: Goal) -> Result<(), WorldError> {
        let delay = self.with(|s| {
            s.goals.push(goal);
            s.paths_in_flight += 1;
            s.max_paths_in_flight = s.max_paths_in_flight.max(s.paths_in_flight);
            s.path_delay
        });
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.with(|s| {
            s.paths_in_flight -= 1;
            match goal {
                Goal::Block(target) => {
                    if s.unreachable.contains(&target) {
                        return Err(WorldError::Unreachable(target.to_string()));
                    }
                    s.position = target.offset(-1, 0, 0).center();
                }
                Goal::Near { position, range } => {
                    if s.position.distance_to(&position) > range {
                        s.position = position.offset(-range, 0.0, 0.0);
                    }
                }
                Goal::Exact(position) => s.position = position,
            }
            Ok(())
        })
    }

    fn stop_movement(&self) {
        self.with(|s| s.stops += 1);
    }

    fn set_control_state(&self, control: Control, active: bool) {
        self.with(|s| {
            if active {
                s.controls.insert(control);
            } else {
                s.controls.remove(&control);
            }
        });
    }

    fn clear_control_states(&self) {
        self.with(|s| s.controls.clear());
    }

    async fn collect(&self, block: &Block) -> Result<(), WorldError> {
        self.with(|s| {
            if s.blocks.remove(&block.position).is_none() {
                return Err(WorldError::Other(format!("nothing at {}", block.position)));
            }
            s.collected.push(block.position);
            s.inventory.add(&block.kind, 1);
            Ok(())
        })
    }

    async fn compact_stacks(&self, resource: &ResourceTag) -> Result<(), WorldError> {
        self.with(|s| s.inventory.compact(resource));
        Ok(())
    }

    async fn equip(&self, resource: &ResourceTag) -> Result<(), WorldError> {
        self.with(|s| {
            if s.inventory.count(resource) == 0 {
                return Err(WorldError::NotHeld(resource.to_string()));
            }
            Ok(())
        })
    }

    async fn place(&self, reference: BlockPos, face: Face) -> Result<(), WorldError> {
        self.with(|s| {
            let target = face.target_of(reference);
            if s.blocks.contains_key(&target) {
                return Err(WorldError::PlacementBlocked(target));
            }
            let resource = ResourceTag::new("oak_log");
            if s.inventory.remove(&resource, 1) == 0 {
                return Err(WorldError::NotHeld(resource.to_string()));
            }
            if s.position.block() == target {
                if !s.controls.contains(&Control::Jump) {
                    return Err(WorldError::PlacementBlocked(target));
                }
                s.jump_placements += 1;
                s.position = s.position.offset(0.0, 1.0, 0.0);
            }
            s.blocks.insert(target, resource);
            s.placed.push(target);
            Ok(())
        })
    }

    async fn look_at(&self, target: Position) -> Result<(), WorldError> {
        self.with(|s| s.look_target = Some(target));
        Ok(())
    }

    async fn toss(&self, resource: &ResourceTag, count: u32) -> Result<(), WorldError> {
        self.with(|s| {
            let removed = s.inventory.remove(resource, count);
            if removed == 0 {
                return Err(WorldError::NotHeld(resource.to_string()));
            }
            s.tosses.push(removed);
            s.next_drop += 1;
            let id = s.next_drop;
            let position = s.look_target.unwrap_or(s.position);
            s.drops.push(DroppedItem {
                id,
                resource: resource.clone(),
                count: removed,
                position,
            });
            Ok(())
        })
    }

    async fn pick_up(&self, item: &DroppedItem) -> Result<(), WorldError> {
        self.with(|s| {
            let Some(index) = s.drops.iter().position(|d| d.id == item.id) else {
                return Err(WorldError::Other(format!("item {} is gone", item.id)));
            };
            let drop = s.drops.remove(index);
            s.inventory.add(&drop.resource, drop.count);
            Ok(())
        })
    }

    async fn send_chat(&self, message: &str) -> Result<(), WorldError> {
        self.with(|s| s.chat.push(message.to_string()));
        let _ = self.events.send(WorldEvent::Chat {
            sender: self.name.clone(),
            message: message.to_string(),
        });
        Ok(())
    }

    async fn reconnect(&self) -> Result<(), WorldError> {
        let ok = self.with(|s| {
            s.reconnect_attempts += 1;
            if s.failing_reconnects > 0 {
                s.failing_reconnects -= 1;
                false
            } else {
                s.connected = true;
                true
            }
        });
        if !ok {
            return Err(WorldError::NotConnected);
        }
        let _ = self.events.send(WorldEvent::Spawn);
        Ok(())
    }
}

// ==================== Delegation ====================

enum DelegatorScript {
    Fail(AgentError),
    Supply(std::sync::Arc<MockWorld>, String),
    EmptyHanded,
}

/// Resource delegator with a fixed answer.
pub struct MockDelegator {
    script: DelegatorScript,
    requests: Mutex<Vec<u32>>,
}

impl MockDelegator {
    pub fn failing(error: AgentError) -> Self {
        Self::with_script(DelegatorScript::Fail(error))
    }

    /// Puts the requested units straight into `world`'s inventory.
    pub fn supplying(world: std::sync::Arc<MockWorld>, resource: &str) -> Self {
        Self::with_script(DelegatorScript::Supply(world, resource.to_string()))
    }

    pub fn empty_handed() -> Self {
        Self::with_script(DelegatorScript::EmptyHanded)
    }

    fn with_script(script: DelegatorScript) -> Self {
        Self {
            script,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<u32> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResourceDelegator for MockDelegator {
    async fn request_resources(
        &self,
        _resource: &str,
        amount: u32,
        _cancel: &CancellationToken,
    ) -> Result<DelegationReceipt, AgentError> {
        self.requests.lock().unwrap().push(amount);
        match &self.script {
            DelegatorScript::Fail(error) => Err(error.clone()),
            DelegatorScript::Supply(world, resource) => {
                world.give(resource, amount);
                Ok(DelegationReceipt {
                    task_id: TaskId::new("task-1"),
                    collaborator: "Merchant".to_string(),
                    received: amount,
                })
            }
            DelegatorScript::EmptyHanded => Ok(DelegationReceipt {
                task_id: TaskId::new("task-1"),
                collaborator: "Merchant".to_string(),
                received: 0,
            }),
        }
    }
}

// ==================== Registry ====================

/// In-memory collaborator registry.
#[derive(Default)]
pub struct MockRegistry {
    records: Mutex<Vec<CollaboratorRecord>>,
}

impl MockRegistry {
    pub fn with(records: Vec<CollaboratorRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }
}

#[async_trait]
impl CollaboratorRepository for MockRegistry {
    type Error = std::convert::Infallible;

    async fn all(&self) -> Result<Vec<CollaboratorRecord>, Self::Error> {
        Ok(self.records.lock().unwrap().clone())
    }

    async fn get(&self, identity: &str) -> Result<Option<CollaboratorRecord>, Self::Error> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.identity == identity)
            .cloned())
    }

    async fn upsert(&self, record: CollaboratorRecord) -> Result<(), Self::Error> {
        let mut records = self.records.lock().unwrap();
        records.retain(|r| r.identity != record.identity);
        records.push(record);
        Ok(())
    }
}

// ==================== Ledger ====================

#[derive(Default)]
struct LedgerState {
    balances: HashMap<String, CreditBalance>,
    /// Credits granted by `order_plan`.
    order_grant: u64,
    orders: Vec<PlanId>,
    submissions: Vec<(AgentId, PlanId, String)>,
    update_senders: Vec<mpsc::UnboundedSender<TaskUpdate>>,
    scripted_updates: Vec<TaskUpdate>,
    steps: HashMap<String, Step>,
    created: Vec<Step>,
    updated: Vec<Step>,
    logs: Vec<(TaskId, LogLevel, String)>,
    plans: Vec<(String, u64)>,
    agents: Vec<(String, PlanId)>,
    /// Upcoming `update_step` calls to reject, of any status.
    failing_updates: u32,
    /// Upcoming terminal `update_step` calls to reject.
    failing_terminal_updates: u32,
}

/// Scriptable ledger recording every call.
#[derive(Default)]
pub struct MockLedger {
    state: Mutex<LedgerState>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut LedgerState) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }

    pub fn set_balance(&self, plan_id: &str, balance: CreditBalance) {
        self.with(|s| s.balances.insert(plan_id.to_string(), balance));
    }

    pub fn grant_on_order(&self, credits: u64) {
        self.with(|s| s.order_grant = credits);
    }

    /// Updates sent on the stream of the next submitted task.
    pub fn script_updates(&self, updates: Vec<TaskUpdate>) {
        self.with(|s| s.scripted_updates = updates);
    }

    /// Push an update to every open task stream.
    pub fn push_update(&self, update: TaskUpdate) {
        self.with(|s| {
            for sender in &s.update_senders {
                let _ = sender.send(update.clone());
            }
        });
    }

    /// Reject the next `count` step updates.
    pub fn fail_updates(&self, count: u32) {
        self.with(|s| s.failing_updates = count);
    }

    /// Reject the next `count` updates that would finish a step.
    pub fn fail_terminal_updates(&self, count: u32) {
        self.with(|s| s.failing_terminal_updates = count);
    }

    pub fn put_step(&self, step: Step) {
        self.with(|s| s.steps.insert(step.step_id.to_string(), step));
    }

    pub fn step(&self, id: &str) -> Option<Step> {
        self.with(|s| s.steps.get(id).cloned())
    }

    pub fn orders(&self) -> Vec<PlanId> {
        self.with(|s| s.orders.clone())
    }

    pub fn submissions(&self) -> Vec<(AgentId, PlanId, String)> {
        self.with(|s| s.submissions.clone())
    }

    pub fn created_steps(&self) -> Vec<Step> {
        self.with(|s| s.created.clone())
    }

    pub fn updated_steps(&self) -> Vec<Step> {
        self.with(|s| s.updated.clone())
    }

    pub fn logs(&self) -> Vec<(TaskId, LogLevel, String)> {
        self.with(|s| s.logs.clone())
    }

    pub fn plans(&self) -> Vec<(String, u64)> {
        self.with(|s| s.plans.clone())
    }
}

#[async_trait]
impl LedgerPort for MockLedger {
    async fn create_credits_plan(&self, name: &str, credits: u64) -> Result<PlanId, LedgerError> {
        Ok(self.with(|s| {
            s.plans.push((name.to_string(), credits));
            PlanId::new(format!("plan-{}", s.plans.len()))
        }))
    }

    async fn create_agent(&self, name: &str, plan_id: &PlanId) -> Result<AgentId, LedgerError> {
        Ok(self.with(|s| {
            s.agents.push((name.to_string(), plan_id.clone()));
            AgentId::new(format!("agent-{}", s.agents.len()))
        }))
    }

    async fn get_balance(&self, plan_id: &PlanId) -> Result<CreditBalance, LedgerError> {
        Ok(self.with(|s| {
            s.balances
                .get(plan_id.as_str())
                .copied()
                .unwrap_or_default()
        }))
    }

    async fn order_plan(&self, plan_id: &PlanId) -> Result<(), LedgerError> {
        self.with(|s| {
            s.orders.push(plan_id.clone());
            let grant = s.order_grant;
            let balance = s.balances.entry(plan_id.to_string()).or_default();
            balance.subscribed = true;
            balance.amount += grant;
        });
        Ok(())
    }

    async fn submit_task(
        &self,
        agent_id: &AgentId,
        plan_id: &PlanId,
        query: &str,
    ) -> Result<TaskSubmission, LedgerError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let task_id = self.with(|s| {
            s.submissions
                .push((agent_id.clone(), plan_id.clone(), query.to_string()));
            for update in s.scripted_updates.drain(..) {
                let _ = tx.send(update);
            }
            s.update_senders.push(tx);
            TaskId::new(format!("task-{}", s.submissions.len()))
        });
        Ok(TaskSubmission {
            task_id,
            updates: rx,
        })
    }

    async fn subscribe_steps(
        &self,
        _agent_id: &AgentId,
    ) -> Result<mpsc::UnboundedReceiver<StepEvent>, LedgerError> {
        let (_tx, rx) = mpsc::unbounded_channel();
        Ok(rx)
    }

    async fn get_step(&self, step_id: &StepId) -> Result<Step, LedgerError> {
        self.with(|s| s.steps.get(step_id.as_str()).cloned())
            .ok_or_else(|| LedgerError::NotFound {
                kind: "step",
                id: step_id.to_string(),
            })
    }

    async fn create_steps(&self, _task_id: &TaskId, steps: Vec<Step>) -> Result<(), LedgerError> {
        self.with(|s| {
            for step in steps {
                s.steps.insert(step.step_id.to_string(), step.clone());
                s.created.push(step);
            }
        });
        Ok(())
    }

    async fn update_step(&self, step: &Step) -> Result<(), LedgerError> {
        self.with(|s| {
            if s.failing_updates > 0 {
                s.failing_updates -= 1;
                return Err(LedgerError::Rejected("transient".to_string()));
            }
            if step.is_terminal() && s.failing_terminal_updates > 0 {
                s.failing_terminal_updates -= 1;
                return Err(LedgerError::Rejected("transient".to_string()));
            }
            s.steps.insert(step.step_id.to_string(), step.clone());
            s.updated.push(step.clone());
            Ok(())
        })
    }

    async fn log_task(
        &self,
        task_id: &TaskId,
        level: LogLevel,
        message: &str,
    ) -> Result<(), LedgerError> {
        self.with(|s| s.logs.push((task_id.clone(), level, message.to_string())));
        Ok(())
    }
}
