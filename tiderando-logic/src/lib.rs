//! Ownership state for reachability queries: a multiset of owned items and
//! the requirement evaluator. Evaluation runs thousands of times per search
//! call, so it works purely off hash lookups with no allocation.

use hashbrown::HashMap;
use tiderando_game::{Item, Requirement};

/// Multiset of owned item instances. Duplicates are meaningful: progressive
/// items and small keys gate on counts.
#[derive(Clone, Debug, Default)]
pub struct Inventory {
    counts: HashMap<Item, u32>,
}

impl Inventory {
    pub fn new() -> Self {
        Inventory::default()
    }

    pub fn from_items(items: &[Item]) -> Self {
        let mut inventory = Inventory::new();
        for &item in items {
            inventory.add(item);
        }
        inventory
    }

    pub fn add(&mut self, item: Item) {
        *self.counts.entry(item).or_insert(0) += 1;
    }

    /// Removes one instance; removing an item that isn't owned is a no-op.
    pub fn remove(&mut self, item: Item) {
        if let Some(count) = self.counts.get_mut(&item) {
            *count -= 1;
            if *count == 0 {
                self.counts.remove(&item);
            }
        }
    }

    pub fn count(&self, item: Item) -> u32 {
        self.counts.get(&item).copied().unwrap_or(0)
    }

    pub fn has(&self, item: Item) -> bool {
        self.count(item) > 0
    }
}

pub fn evaluate_requirement(req: &Requirement, owned: &Inventory) -> bool {
    match req {
        Requirement::Nothing => true,
        Requirement::Impossible => false,
        Requirement::Has(item) => owned.has(*item),
        Requirement::Count(count, item) => owned.count(*item) >= *count,
        Requirement::And(reqs) => reqs.iter().all(|r| evaluate_requirement(r, owned)),
        Requirement::Or(reqs) => reqs.iter().any(|r| evaluate_requirement(r, owned)),
        Requirement::Not(inner) => !evaluate_requirement(inner, owned),
    }
}
