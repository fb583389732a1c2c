//! Item placement. Major items are found by removing each item in turn and
//! checking what progression it gates, dungeon-restricted items are solved
//! against their policy pools, and everything progression-relevant is placed
//! by assumed fill: place one item at a time while pretending every other
//! unplaced item is already owned, so the reachable location set is as wide
//! as it can be. A forward-fill rescue unsticks low-mobility worlds, junk
//! pads out the rest, and the result has to be beatable or the whole fill is
//! thrown away and retried.

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use thiserror::Error;
use tiderando_game::{
    GameItemId, Item, LocationCategory, World, WorldId, settings::DungeonItemMode,
};

use crate::helpers::{Combinations, pop_random, random_element};
use crate::search::{LocationRef, accessible_locations, collect_owned_items, game_beatable,
    locations_reachable};

pub const FILL_RETRY_COUNT: usize = 5;
pub const ASSUMED_FILL_RETRY_COUNT: usize = 5;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FillError {
    #[error("more items to place ({items}) than allowed locations ({locations})")]
    MoreItemsThanLocations { items: usize, locations: usize },
    #[error("no reachable locations")]
    NoReachableLocations,
    #[error("ran out of retries")]
    RanOutOfRetries,
    #[error(
        "not enough progression locations ({major_items} major items, {progression_locations} progression locations)"
    )]
    NotEnoughProgressionLocations {
        major_items: usize,
        progression_locations: usize,
    },
    #[error("game not beatable")]
    GameNotBeatable,
    #[error("plandomizer error: {0}")]
    Plandomizer(String),
}

impl FillError {
    /// Retryable failures are rolled back and retried by the outer fill
    /// loop; the rest indicate a broken configuration and escalate at once.
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            FillError::RanOutOfRetries
                | FillError::NoReachableLocations
                | FillError::GameNotBeatable
        )
    }
}

pub fn clear_worlds(worlds: &mut [World]) {
    for world in worlds.iter_mut() {
        world.clear();
    }
}

fn complete_item_pool(worlds: &[World]) -> Vec<Item> {
    worlds
        .iter()
        .flat_map(|w| w.item_pool.iter().copied())
        .collect()
}

fn progression_location_refs(worlds: &[World]) -> Vec<LocationRef> {
    let mut refs = vec![];
    for world in worlds {
        for l in world.progression_locations() {
            refs.push((world.world_id, l));
        }
    }
    refs
}

fn empty_refs(worlds: &[World], refs: &[LocationRef]) -> Vec<LocationRef> {
    refs.iter()
        .copied()
        .filter(|&(w, l)| worlds[w].locations[l].current_item.is_none())
        .collect()
}

/// Commits user-forced placements before anything else runs. The forced item
/// is consumed from the pool so it can't be placed twice.
fn place_plandomized_items(worlds: &mut [World], item_pool: &mut Vec<Item>) -> Result<(), FillError> {
    for w in 0..worlds.len() {
        for (location, item) in worlds[w].plandomized_locations.clone() {
            if let Some(existing) = worlds[w].locations[location].current_item {
                if existing != item {
                    return Err(FillError::Plandomizer(format!(
                        "location \"{}\" already holds a different item",
                        worlds[w].location_name(location)
                    )));
                }
            } else {
                worlds[w].locations[location].current_item = Some(item);
                worlds[w].locations[location].known_vanilla = true;
                debug!(
                    "Plandomized {} at {}",
                    worlds[w].item_name(item),
                    worlds[w].location_name(location)
                );
            }
            if let Some(pos) = item_pool.iter().position(|&i| i == item) {
                item_pool.remove(pos);
            } else {
                return Err(FillError::Plandomizer(format!(
                    "item \"{}\" is not in the item pool",
                    worlds[w].item_name(item)
                )));
            }
        }
    }
    Ok(())
}

/// A plandomized major item sitting in a non-progression slot would make the
/// seed quietly unbeatable, so it is rejected instead.
fn validate_plandomized_items(worlds: &[World]) -> Result<(), FillError> {
    for world in worlds {
        for &(location, _) in &world.plandomized_locations {
            let loc = &world.locations[location];
            if let Some(item) = loc.current_item {
                if item.major && !loc.progression {
                    return Err(FillError::Plandomizer(format!(
                        "major item \"{}\" was forced into non-progression location \"{}\"",
                        world.item_name(item),
                        loc.name
                    )));
                }
            }
        }
    }
    Ok(())
}

fn vanilla_item_ids(world: &World, dungeon: usize) -> Vec<GameItemId> {
    let settings = &world.settings;
    let d = &world.dungeons[dungeon];
    let mut ids = vec![];
    if settings.small_key_mode == DungeonItemMode::Vanilla {
        ids.extend(d.small_key);
    }
    if settings.big_key_mode == DungeonItemMode::Vanilla {
        ids.extend(d.big_key);
    }
    if settings.map_compass_mode == DungeonItemMode::Vanilla {
        ids.extend(d.map);
        ids.extend(d.compass);
    }
    ids
}

/// Pins vanilla-policy dungeon items back at their original locations.
fn place_vanilla_dungeon_items(worlds: &mut [World], item_pool: &mut Vec<Item>) {
    for w in 0..worlds.len() {
        for d in 0..worlds[w].dungeons.len() {
            for id in vanilla_item_ids(&worlds[w], d) {
                let item = Item::new(id, w);
                while let Some(pos) = item_pool.iter().position(|&i| i == item) {
                    item_pool.remove(pos);
                    let slot = worlds[w].dungeons[d].locations.iter().copied().find(|&l| {
                        worlds[w].locations[l].original_item == Some(item)
                            && worlds[w].locations[l].current_item.is_none()
                    });
                    match slot {
                        Some(l) => {
                            worlds[w].locations[l].current_item = Some(item);
                            worlds[w].locations[l].known_vanilla = true;
                        }
                        None => {
                            // Already pinned by an earlier fill attempt.
                            let pinned = worlds[w].dungeons[d].locations.iter().any(|&l| {
                                worlds[w].locations[l].original_item == Some(item)
                                    && worlds[w].locations[l].current_item == Some(item)
                            });
                            if !pinned {
                                warn!(
                                    "No vanilla slot left for {} in {}",
                                    worlds[w].item_name(item),
                                    worlds[w].dungeons[d].name
                                );
                            }
                        }
                    }
                }
            }
        }
    }
}

enum MajorCandidate {
    Pool(usize),
    Placed(LocationRef),
}

/// An item is major when taking it away costs reachability of some
/// progression location. Candidates are visited in random order, and items
/// found non-major stay out of the assumed set for the remainder of the pass
/// so interchangeable items don't all get flagged.
pub fn determine_major_items(
    worlds: &mut [World],
    item_pool: &mut Vec<Item>,
    progression_locations: &[LocationRef],
    rng: &mut StdRng,
) {
    for item in item_pool.iter_mut() {
        item.major = false;
    }
    let mut candidates: Vec<MajorCandidate> = vec![];
    for (i, item) in item_pool.iter().enumerate() {
        if !worlds[item.world_id].catalog.is_junk(item.game_item_id) {
            candidates.push(MajorCandidate::Pool(i));
        }
    }
    let mut assumed: Vec<Item> = item_pool.clone();
    for w in 0..worlds.len() {
        for l in 0..worlds[w].locations.len() {
            let Some(mut item) = worlds[w].locations[l].current_item else {
                continue;
            };
            item.major = false;
            worlds[w].locations[l].current_item = Some(item);
            let id = item.game_item_id;
            if !worlds[w].catalog.is_junk(id) && !worlds[w].catalog.is_victory(id) {
                candidates.push(MajorCandidate::Placed((w, l)));
            }
            assumed.push(item);
        }
    }
    candidates.shuffle(rng);

    for candidate in candidates {
        let item = match &candidate {
            MajorCandidate::Pool(i) => item_pool[*i],
            MajorCandidate::Placed((w, l)) => worlds[*w].locations[*l].current_item.unwrap(),
        };
        let pos = assumed
            .iter()
            .position(|&i| i == item)
            .expect("assumed ownership set lost an item instance");
        assumed.swap_remove(pos);
        if locations_reachable(worlds, &assumed, progression_locations, None) {
            // Not load-bearing; it stays out until the pass completes.
            continue;
        }
        debug!("Major item: {}", worlds[item.world_id].item_name(item));
        assumed.push(item);
        match candidate {
            MajorCandidate::Pool(i) => item_pool[i].major = true,
            MajorCandidate::Placed((w, l)) => {
                worlds[w].locations[l].current_item.as_mut().unwrap().major = true;
            }
        }
    }
}

/// Picks a target for one item. Charts would rather not sit on a sunken
/// treasure so that finding a chart doesn't just lead to another chart.
fn choose_location(
    worlds: &[World],
    accessible: &[LocationRef],
    item: Item,
    rng: &mut StdRng,
) -> LocationRef {
    if worlds[item.world_id].catalog.is_chart(item.game_item_id) {
        let non_sunken: Vec<LocationRef> = accessible
            .iter()
            .copied()
            .filter(|&(w, l)| {
                !worlds[w].locations[l]
                    .categories
                    .contains(&LocationCategory::SunkenTreasure)
            })
            .collect();
        if let Some(&chosen) = random_element(&non_sunken, rng) {
            return chosen;
        }
    }
    *random_element(accessible, rng).expect("choose_location on empty accessible set")
}

/// Assumed fill: place the items of `items_to_place` one at a time into
/// `allowed_locations`, assuming at each step that every item not yet placed
/// (the remainder of the pool plus `items_not_yet_placed`) is owned. A step
/// with no accessible location rolls the attempt back; after the retry
/// budget, forward fill opens up space and the attempts start over.
pub fn assumed_fill(
    worlds: &mut [World],
    items_to_place: &mut Vec<Item>,
    items_not_yet_placed: &[Item],
    allowed_locations: &[LocationRef],
    world_to_fill: Option<WorldId>,
    rng: &mut StdRng,
) -> Result<(), FillError> {
    let capacity = empty_refs(worlds, allowed_locations).len();
    if items_to_place.len() > capacity {
        return Err(FillError::MoreItemsThanLocations {
            items: items_to_place.len(),
            locations: capacity,
        });
    }

    let mut retries = ASSUMED_FILL_RETRY_COUNT;
    let mut rescues = ASSUMED_FILL_RETRY_COUNT;
    loop {
        if retries == 0 {
            // The rescue itself is bounded so that a rescue which opens no
            // new space cannot loop forever.
            if rescues == 0 {
                return Err(FillError::RanOutOfRetries);
            }
            rescues -= 1;
            forward_fill_until_more_free_space(
                worlds,
                items_to_place,
                allowed_locations,
                world_to_fill,
                rng,
            )?;
            retries = ASSUMED_FILL_RETRY_COUNT;
        }
        retries -= 1;

        items_to_place.shuffle(rng);
        let mut rollback: Vec<(LocationRef, Item)> = vec![];
        let mut stuck = false;
        while let Some(item) = pop_random(items_to_place, rng) {
            let mut assumed = items_to_place.clone();
            assumed.extend_from_slice(items_not_yet_placed);
            let accessible =
                accessible_locations(worlds, &assumed, allowed_locations, world_to_fill);
            if accessible.is_empty() {
                debug!(
                    "No accessible locations to place {}",
                    worlds[item.world_id].item_name(item)
                );
                items_to_place.push(item);
                stuck = true;
                break;
            }
            let (w, l) = choose_location(worlds, &accessible, item, rng);
            worlds[w].locations[l].current_item = Some(item);
            debug!(
                "Placed {} at {}",
                worlds[w].item_name(item),
                worlds[w].location_name(l)
            );
            rollback.push(((w, l), item));
        }

        if !stuck {
            return Ok(());
        }
        for ((w, l), item) in rollback {
            worlds[w].locations[l].current_item = None;
            items_to_place.push(item);
        }
    }
}

/// Forward-fill rescue: with only what is actually collectable owned, search
/// k-combinations of the unplaced items (k bounded by the number of open
/// locations) for one whose placement strictly grows the open frontier, and
/// commit it. Repeats until the frontier holds at least 3 locations per
/// world, or fails when the combination space is exhausted.
pub fn forward_fill_until_more_free_space(
    worlds: &mut [World],
    items_to_place: &mut Vec<Item>,
    allowed_locations: &[LocationRef],
    world_to_fill: Option<WorldId>,
    rng: &mut StdRng,
) -> Result<(), FillError> {
    let open_location_target = 3 * worlds.len();
    loop {
        let owned = collect_owned_items(worlds);
        let mut open = accessible_locations(worlds, &owned, allowed_locations, world_to_fill);
        if open.len() >= open_location_target || items_to_place.is_empty() {
            return Ok(());
        }
        if open.is_empty() {
            debug!("Forward fill has no reachable locations at all");
            return Err(FillError::NoReachableLocations);
        }
        open.shuffle(rng);
        let before = open.len();

        let mut committed: Option<Vec<usize>> = None;
        'combination_search: for k in 1..=before.min(items_to_place.len()) {
            for combination in Combinations::new(items_to_place.len(), k) {
                for (slot, &i) in combination.iter().enumerate() {
                    let (w, l) = open[slot];
                    worlds[w].locations[l].current_item = Some(items_to_place[i]);
                }
                let owned = collect_owned_items(worlds);
                let after =
                    accessible_locations(worlds, &owned, allowed_locations, world_to_fill).len();
                if after > before {
                    committed = Some(combination);
                    break 'combination_search;
                }
                for slot in 0..k {
                    let (w, l) = open[slot];
                    worlds[w].locations[l].current_item = None;
                }
            }
        }

        match committed {
            Some(mut combination) => {
                for &i in &combination {
                    let item = items_to_place[i];
                    info!(
                        "Forward-placed {} to open more locations",
                        worlds[item.world_id].item_name(item)
                    );
                }
                combination.sort_unstable_by(|a, b| b.cmp(a));
                for i in combination {
                    items_to_place.remove(i);
                }
            }
            None => {
                debug!("No combination of unplaced items opens new locations");
                return Err(FillError::RanOutOfRetries);
            }
        }
    }
}

/// Splits the dungeon items of one world into their policy pools and places
/// the restricted ones through assumed fill before anything else is placed.
fn handle_dungeon_items(
    worlds: &mut [World],
    item_pool: &mut Vec<Item>,
    rng: &mut StdRng,
) -> Result<(), FillError> {
    for w in 0..worlds.len() {
        let settings = worlds[w].settings.clone();
        let mode_ids = |mode: DungeonItemMode, world: &World, dungeon: usize| -> Vec<GameItemId> {
            let d = &world.dungeons[dungeon];
            let mut ids = vec![];
            if settings.small_key_mode == mode {
                ids.extend(d.small_key);
            }
            if settings.big_key_mode == mode {
                ids.extend(d.big_key);
            }
            if settings.map_compass_mode == mode {
                ids.extend(d.map);
                ids.extend(d.compass);
            }
            ids
        };
        let take_items = |pool: &mut Vec<Item>, ids: &[GameItemId]| -> Vec<Item> {
            let mut taken = vec![];
            pool.retain(|&item| {
                if item.world_id == w && ids.contains(&item.game_item_id) {
                    taken.push(item);
                    false
                } else {
                    true
                }
            });
            taken
        };

        // Own-dungeon pools are solved one dungeon at a time against only
        // that dungeon's locations.
        for d in 0..worlds[w].dungeons.len() {
            let ids = mode_ids(DungeonItemMode::OwnDungeon, &worlds[w], d);
            let mut items = take_items(item_pool, &ids);
            if items.is_empty() {
                continue;
            }
            let locations: Vec<LocationRef> = worlds[w].dungeons[d]
                .locations
                .iter()
                .map(|&l| (w, l))
                .collect();
            debug!(
                "Placing {} own-dungeon items in {}",
                items.len(),
                worlds[w].dungeons[d].name
            );
            assumed_fill(worlds, &mut items, item_pool, &locations, Some(w), rng)?;
        }

        // Any-dungeon and overworld pools are solved globally per world.
        let mut any_dungeon_items = vec![];
        let mut overworld_items = vec![];
        for d in 0..worlds[w].dungeons.len() {
            let any_ids = mode_ids(DungeonItemMode::AnyDungeon, &worlds[w], d);
            any_dungeon_items.extend(take_items(item_pool, &any_ids));
            let overworld_ids = mode_ids(DungeonItemMode::Overworld, &worlds[w], d);
            overworld_items.extend(take_items(item_pool, &overworld_ids));
        }
        if !any_dungeon_items.is_empty() {
            let locations: Vec<LocationRef> = worlds[w]
                .locations
                .iter()
                .enumerate()
                .filter(|(_, loc)| loc.dungeon.is_some())
                .map(|(l, _)| (w, l))
                .collect();
            debug!("Placing {} any-dungeon items", any_dungeon_items.len());
            assumed_fill(worlds, &mut any_dungeon_items, item_pool, &locations, Some(w), rng)?;
        }
        if !overworld_items.is_empty() {
            let locations: Vec<LocationRef> = worlds[w]
                .locations
                .iter()
                .enumerate()
                .filter(|(_, loc)| loc.dungeon.is_none())
                .map(|(l, _)| (w, l))
                .collect();
            debug!("Placing {} overworld dungeon items", overworld_items.len());
            assumed_fill(worlds, &mut overworld_items, item_pool, &locations, Some(w), rng)?;
        }
    }
    Ok(())
}

/// Junk fill: the leftover pool first, then arbitrary junk from the catalog.
/// No reachability constraint applies.
fn fast_fill(worlds: &mut [World], item_pool: &mut Vec<Item>, rng: &mut StdRng) {
    item_pool.shuffle(rng);
    for w in 0..worlds.len() {
        let junk_ids = worlds[w].catalog.junk_ids();
        for l in 0..worlds[w].locations.len() {
            if worlds[w].locations[l].current_item.is_some() {
                continue;
            }
            let item = match item_pool.pop() {
                Some(item) => item,
                None => match random_element(&junk_ids, rng) {
                    Some(&id) => Item::new(id, w),
                    None => {
                        warn!("Item pool ran dry and the catalog has no junk items");
                        return;
                    }
                },
            };
            worlds[w].locations[l].current_item = Some(item);
        }
    }
}

fn fill_attempt(worlds: &mut [World], rng: &mut StdRng) -> Result<(), FillError> {
    let mut item_pool = complete_item_pool(worlds);
    place_plandomized_items(worlds, &mut item_pool)?;
    place_vanilla_dungeon_items(worlds, &mut item_pool);

    let progression_locations = progression_location_refs(worlds);
    determine_major_items(worlds, &mut item_pool, &progression_locations, rng);
    validate_plandomized_items(worlds)?;

    handle_dungeon_items(worlds, &mut item_pool, rng)?;

    // Fixing the dungeon items in place can change which of the remaining
    // items are load-bearing, so the determination pass runs again.
    determine_major_items(worlds, &mut item_pool, &progression_locations, rng);

    let (mut major_items, rest): (Vec<Item>, Vec<Item>) =
        item_pool.drain(..).partition(|item| item.major);
    item_pool = rest;

    let open_progression = empty_refs(worlds, &progression_locations);
    if major_items.len() > open_progression.len() {
        return Err(FillError::NotEnoughProgressionLocations {
            major_items: major_items.len(),
            progression_locations: open_progression.len(),
        });
    }

    assumed_fill(
        worlds,
        &mut major_items,
        &item_pool,
        &open_progression,
        None,
        rng,
    )?;
    fast_fill(worlds, &mut item_pool, rng);
    Ok(())
}

/// Runs fill attempts until the worlds come out beatable, clearing back to
/// vanilla and plandomized placements between attempts. Configuration errors
/// escalate immediately; everything else is retried up to the budget.
pub fn fill(worlds: &mut [World], rng: &mut StdRng) -> Result<(), FillError> {
    let mut last_err = FillError::GameNotBeatable;
    for attempt in 1..=FILL_RETRY_COUNT {
        match fill_attempt(worlds, rng) {
            Ok(()) => {
                if game_beatable(worlds) {
                    info!("Fill succeeded on attempt {attempt}");
                    return Ok(());
                }
                debug!("[attempt {attempt}] Filled worlds are not beatable");
                last_err = FillError::GameNotBeatable;
            }
            Err(err) if err.is_retryable() => {
                debug!("[attempt {attempt}] Fill failed: {err}");
                last_err = err;
            }
            Err(err) => return Err(err),
        }
        clear_worlds(worlds);
    }
    Err(last_err)
}
