//! Slot-based inventory model.

use super::value_objects::ResourceTag;
use serde::{Deserialize, Serialize};

/// Maximum units held by a single stack.
pub const STACK_LIMIT: u32 = 64;

/// Number of slots in an agent inventory.
pub const INVENTORY_SLOTS: usize = 36;

/// A stack of identical items occupying one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub resource: ResourceTag,
    pub count: u32,
}

impl ItemStack {
    pub fn new(resource: impl Into<ResourceTag>, count: u32) -> Self {
        Self {
            resource: resource.into(),
            count,
        }
    }
}

/// Agent inventory: a fixed number of slots holding item stacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    slots: Vec<Option<ItemStack>>,
}

impl Default for Inventory {
    fn default() -> Self {
        Self {
            slots: vec![None; INVENTORY_SLOTS],
        }
    }
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an inventory from explicit stacks, one per slot.
    pub fn from_stacks(stacks: impl IntoIterator<Item = ItemStack>) -> Self {
        let mut inventory = Self::default();
        for (slot, stack) in inventory.slots.iter_mut().zip(stacks) {
            *slot = Some(stack);
        }
        inventory
    }

    /// Total units of a resource across all slots.
    pub fn count(&self, resource: &ResourceTag) -> u32 {
        self.stacks_of(resource).map(|s| s.count).sum()
    }

    /// Stacks holding the resource, in slot order.
    pub fn stacks_of<'a>(
        &'a self,
        resource: &'a ResourceTag,
    ) -> impl Iterator<Item = &'a ItemStack> + 'a {
        self.slots
            .iter()
            .flatten()
            .filter(move |s| &s.resource == resource)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Add units, topping up existing stacks first. Returns the units that
    /// did not fit.
    pub fn add(&mut self, resource: &ResourceTag, amount: u32) -> u32 {
        let mut remaining = amount;
        for stack in self.slots.iter_mut().flatten() {
            if remaining == 0 {
                break;
            }
            if &stack.resource == resource && stack.count < STACK_LIMIT {
                let moved = remaining.min(STACK_LIMIT - stack.count);
                stack.count += moved;
                remaining -= moved;
            }
        }
        for slot in self.slots.iter_mut() {
            if remaining == 0 {
                break;
            }
            if slot.is_none() {
                let moved = remaining.min(STACK_LIMIT);
                *slot = Some(ItemStack::new(resource.clone(), moved));
                remaining -= moved;
            }
        }
        remaining
    }

    /// Remove up to `amount` units, draining the smallest stacks first.
    /// Returns the number of units removed.
    pub fn remove(&mut self, resource: &ResourceTag, amount: u32) -> u32 {
        let mut indices: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| match s {
                Some(stack) if &stack.resource == resource => Some(i),
                _ => None,
            })
            .collect();
        indices.sort_by_key(|&i| self.slots[i].as_ref().map(|s| s.count).unwrap_or(0));

        let mut removed = 0;
        for i in indices {
            if removed == amount {
                break;
            }
            if let Some(stack) = self.slots[i].as_mut() {
                let take = (amount - removed).min(stack.count);
                stack.count -= take;
                removed += take;
                if stack.count == 0 {
                    self.slots[i] = None;
                }
            }
        }
        removed
    }

    /// Merge every stack of `resource` into the fullest ones.
    ///
    /// Units are poured from the emptiest stacks into the fullest until each
    /// receiving stack reaches [`STACK_LIMIT`]; emptied slots are freed.
    pub fn compact(&mut self, resource: &ResourceTag) {
        let mut indices: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| match s {
                Some(stack) if &stack.resource == resource => Some(i),
                _ => None,
            })
            .collect();
        if indices.len() < 2 {
            return;
        }
        // fullest first
        indices.sort_by_key(|&i| {
            std::cmp::Reverse(self.slots[i].as_ref().map(|s| s.count).unwrap_or(0))
        });

        let total: u32 = indices
            .iter()
            .filter_map(|&i| self.slots[i].as_ref().map(|s| s.count))
            .sum();
        let mut remaining = total;
        for &i in &indices {
            if remaining == 0 {
                self.slots[i] = None;
                continue;
            }
            let fill = remaining.min(STACK_LIMIT);
            self.slots[i] = Some(ItemStack::new(resource.clone(), fill));
            remaining -= fill;
        }
    }
}
