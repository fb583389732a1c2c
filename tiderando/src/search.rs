//! Fixed-point reachability over the world graph. The core search is a pure
//! function of the supplied ownership multiset: it never collects items from
//! the locations it discovers. Queries that need collection semantics
//! (beatability, playthrough spheres) drive the pure search in an outer loop
//! that grows the ownership set one sphere at a time.

use hashbrown::HashSet;
use log::debug;
use tiderando_game::{EntranceId, Item, LocationId, World, WorldId, ROOT_AREA};
use tiderando_logic::{Inventory, evaluate_requirement};

pub type LocationRef = (WorldId, LocationId);
pub type EntranceRef = (WorldId, EntranceId);

pub struct SearchResult {
    pub locations: Vec<LocationRef>,
    /// Connected entrances whose parent area is reachable and whose
    /// requirement holds; used for entrance playthrough spheres.
    pub entrances: Vec<EntranceRef>,
}

fn searched(world: &World, world_to_search: Option<WorldId>) -> bool {
    world_to_search.is_none() || world_to_search == Some(world.world_id)
}

/// Expands the reachable area set of every searched world to a fixed point
/// under `owned_items` (plus each searched world's starting items).
pub fn search(
    worlds: &[World],
    owned_items: &[Item],
    world_to_search: Option<WorldId>,
) -> SearchResult {
    let mut owned = Inventory::from_items(owned_items);
    for world in worlds {
        if searched(world, world_to_search) {
            for &item in &world.starting_items {
                owned.add(item);
            }
        }
    }

    let mut result = SearchResult {
        locations: vec![],
        entrances: vec![],
    };
    for world in worlds {
        if searched(world, world_to_search) {
            search_world(world, &owned, &mut result);
        }
    }
    result
}

fn search_world(world: &World, owned: &Inventory, result: &mut SearchResult) {
    let mut area_reachable = vec![false; world.areas.len()];
    area_reachable[ROOT_AREA] = true;

    // Each pass only ever flips areas to reachable, so the loop settles in
    // at most |areas| passes.
    loop {
        let mut changed = false;
        for area in 0..world.areas.len() {
            if !area_reachable[area] {
                continue;
            }
            for &exit in &world.areas[area].exits {
                let entrance = &world.entrances[exit];
                if entrance.retired {
                    continue;
                }
                let Some(connected) = entrance.connected_area else {
                    continue;
                };
                if area_reachable[connected] {
                    continue;
                }
                if evaluate_requirement(&entrance.requirement, owned) {
                    area_reachable[connected] = true;
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }

    for (id, location) in world.locations.iter().enumerate() {
        if area_reachable[location.area] && evaluate_requirement(&location.requirement, owned) {
            result.locations.push((world.world_id, id));
        }
    }
    for (id, entrance) in world.entrances.iter().enumerate() {
        if entrance.retired || entrance.connected_area.is_none() {
            continue;
        }
        if area_reachable[entrance.parent_area] && evaluate_requirement(&entrance.requirement, owned)
        {
            result.entrances.push((world.world_id, id));
        }
    }
}

/// Reachable locations from `allowed_locations` that are still empty, i.e.
/// valid placement targets under the given ownership set.
pub fn accessible_locations(
    worlds: &[World],
    owned_items: &[Item],
    allowed_locations: &[LocationRef],
    world_to_search: Option<WorldId>,
) -> Vec<LocationRef> {
    let allowed: HashSet<LocationRef> = allowed_locations.iter().copied().collect();
    search(worlds, owned_items, world_to_search)
        .locations
        .into_iter()
        .filter(|&(w, l)| allowed.contains(&(w, l)) && worlds[w].locations[l].current_item.is_none())
        .collect()
}

/// Is every location of `locations_to_check` reachable under `owned_items`?
pub fn locations_reachable(
    worlds: &[World],
    owned_items: &[Item],
    locations_to_check: &[LocationRef],
    world_to_search: Option<WorldId>,
) -> bool {
    let reachable: HashSet<LocationRef> = search(worlds, owned_items, world_to_search)
        .locations
        .into_iter()
        .collect();
    locations_to_check.iter().all(|&(w, l)| {
        let reached = reachable.contains(&(w, l));
        if !reached {
            debug!("Missing location {}", worlds[w].location_name(l));
        }
        reached
    })
}

/// The entrance-shuffle validity check: with the complete item pool owned,
/// every location of every world must be reachable.
pub fn all_locations_reachable(worlds: &[World], owned_items: &[Item]) -> bool {
    let total: usize = worlds.iter().map(|w| w.locations.len()).sum();
    let reachable = search(worlds, owned_items, None).locations.len();
    reachable == total
}

/// One step of the collection driver: everything reachable right now, given
/// only starting items plus items already collected from found locations.
fn collect_step(worlds: &[World], owned: &[Item]) -> SearchResult {
    search(worlds, owned, None)
}

/// Runs the pure search to a collection fixed point, picking up the items
/// sitting at each newly found location between passes. Returns the found
/// location set.
fn collect_all(worlds: &[World]) -> HashSet<LocationRef> {
    let mut owned: Vec<Item> = vec![];
    let mut found: HashSet<LocationRef> = HashSet::new();
    loop {
        let result = collect_step(worlds, &owned);
        let mut grew = false;
        for (w, l) in result.locations {
            if found.insert((w, l)) {
                if let Some(item) = worlds[w].locations[l].current_item {
                    if !worlds[w].catalog.is_junk(item.game_item_id) {
                        owned.push(item);
                        grew = true;
                    }
                }
            }
        }
        if !grew {
            break;
        }
    }
    found
}

/// Items currently obtainable by playing the filled world from scratch.
pub fn collect_owned_items(worlds: &[World]) -> Vec<Item> {
    let found = collect_all(worlds);
    let mut owned = vec![];
    for &(w, l) in &found {
        if let Some(item) = worlds[w].locations[l].current_item {
            owned.push(item);
        }
    }
    owned
}

/// A world is beatable when its victory-marked location can be collected.
pub fn game_beatable(worlds: &[World]) -> bool {
    let found = collect_all(worlds);
    worlds.iter().all(|world| {
        // A world with no victory marker has nothing to prove.
        world
            .locations
            .iter()
            .enumerate()
            .filter(|(_, loc)| {
                loc.current_item
                    .map(|item| world.catalog.is_victory(item.game_item_id))
                    .unwrap_or(false)
            })
            .all(|(l, _)| found.contains(&(world.world_id, l)))
    })
}

pub struct Sphere {
    pub locations: Vec<LocationRef>,
    pub entrances: Vec<EntranceRef>,
}

/// Groups locations (and first-traversed shuffled entrances) by the sphere
/// in which they become reachable. Input for the spoiler log.
pub fn collect_spheres(worlds: &[World]) -> Vec<Sphere> {
    let mut owned: Vec<Item> = vec![];
    let mut found: HashSet<LocationRef> = HashSet::new();
    let mut seen_entrances: HashSet<EntranceRef> = HashSet::new();
    let mut spheres: Vec<Sphere> = vec![];
    loop {
        let result = collect_step(worlds, &owned);
        let new_locations: Vec<LocationRef> = result
            .locations
            .iter()
            .copied()
            .filter(|r| !found.contains(r))
            .collect();
        let mut new_entrances: Vec<EntranceRef> = vec![];
        for &(w, e) in &result.entrances {
            let entrance = &worlds[w].entrances[e];
            if !entrance.shuffled || seen_entrances.contains(&(w, e)) {
                continue;
            }
            // Record only the first side of a two-way pair.
            if let Some(reverse) = entrance.reverse {
                if seen_entrances.contains(&(w, reverse)) {
                    seen_entrances.insert((w, e));
                    continue;
                }
            }
            seen_entrances.insert((w, e));
            new_entrances.push((w, e));
        }
        if new_locations.is_empty() && new_entrances.is_empty() {
            break;
        }
        for &(w, l) in &new_locations {
            found.insert((w, l));
            if let Some(item) = worlds[w].locations[l].current_item {
                if !worlds[w].catalog.is_junk(item.game_item_id) {
                    owned.push(item);
                }
            }
        }
        spheres.push(Sphere {
            locations: new_locations,
            entrances: new_entrances,
        });
    }
    spheres
}
