//! Entrance randomization. Every shuffled entrance is first disconnected and
//! replaced by a stand-in target hanging off Root ("assumed reachable"), so
//! placement order can't invalidate the reachability checks. Placements are
//! then made one at a time, validating the whole world pool after each and
//! rolling back on failure; a pool that can't be placed is reshuffled and
//! retried up to a fixed budget.

use log::{debug, info};
use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use thiserror::Error;
use tiderando_game::{EntranceId, EntranceType, Item, World, WorldId};

use crate::search::all_locations_reachable;

pub const ENTRANCE_SHUFFLE_RETRY_COUNT: usize = 20;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EntranceShuffleError {
    #[error("no more valid entrances: no target produced a valid world")]
    NoMoreValidEntrances,
    #[error("ran out of retries while shuffling an entrance pool")]
    RanOutOfRetries,
    #[error("not all locations are reachable")]
    AllLocationsNotReachable,
    #[error("attempted self connection")]
    AttemptedSelfConnection,
    #[error("target entrance \"{0}\" was never disconnected")]
    FailedToDisconnectTarget(String),
    #[error("world has no spawn entrance or no starting areas to choose from")]
    BadSpawnEntrance,
}

pub type EntrancePair = (EntranceId, EntranceId);

/// Copies the static metadata of the loader's entrance table onto the live
/// entrances, marks forward sides primary and binds two-way pairs.
pub fn set_all_entrances_data(world: &mut World) {
    let table = world.entrance_table.clone();
    for entry in &table {
        let (forward, forward_metadata) = &entry.forward;
        world.entrances[*forward].metadata = forward_metadata.clone();
        world.entrances[*forward].entrance_type = entry.entrance_type;
        world.entrances[*forward].primary = true;
        if let Some((reverse, reverse_metadata)) = &entry.reverse {
            world.entrances[*reverse].metadata = reverse_metadata.clone();
            world.entrances[*reverse].entrance_type = entry.entrance_type.reverse();
            world.bind_two_way(*forward, *reverse);
        }
    }
}

/// Disconnects every entrance in the pool, leaving Root-connected targets in
/// their place. Targets of a two-way pair are bound as each other's reverse.
pub fn assume_entrance_pool(world: &mut World, entrance_pool: &[EntranceId]) -> Vec<EntranceId> {
    let mut assumed_pool = vec![];
    for &entrance in entrance_pool {
        let assumed_forward = world.assume_reachable(entrance);
        if let Some(reverse) = world.entrances[entrance].reverse {
            let assumed_return = world.assume_reachable(reverse);
            world.bind_two_way(assumed_forward, assumed_return);
        }
        assumed_pool.push(assumed_forward);
    }
    assumed_pool
}

/// Self-connections (an entrance leading straight back out of itself) are
/// disproportionately failure-prone, so they are rejected up front.
fn check_entrances_compatibility(
    world: &World,
    entrance: EntranceId,
    target: EntranceId,
) -> Result<(), EntranceShuffleError> {
    if let Some(reverse) = world.entrances[entrance].reverse {
        if world.entrances[target].replaces == Some(reverse) {
            return Err(EntranceShuffleError::AttemptedSelfConnection);
        }
    }
    Ok(())
}

/// Connects `entrance` to the area behind `target`, consuming the target.
/// For a two-way pair the return side is reconnected symmetrically, consuming
/// the reverse's stand-in.
pub fn change_connections(world: &mut World, entrance: EntranceId, target: EntranceId) {
    let area = world.disconnect(target);
    world.connect(entrance, area);
    world.entrances[entrance].replaces = world.entrances[target].replaces;
    if let Some(reverse) = world.entrances[entrance].reverse {
        let target_replaces = world.entrances[target]
            .replaces
            .expect("target entrance has no replacement");
        let replaces_reverse = world.entrances[target_replaces]
            .reverse
            .expect("two-way entrance paired with a one-way target");
        let reverse_assumed = world.entrances[reverse]
            .assumed
            .expect("reverse entrance was never assumed");
        let reverse_area = world.disconnect(reverse_assumed);
        world.connect(replaces_reverse, reverse_area);
        world.entrances[replaces_reverse].replaces = Some(reverse);
    }
}

/// Exact inverse of `change_connections`; the graph is restored to its
/// pre-placement state, links included.
pub fn restore_connections(world: &mut World, entrance: EntranceId, target: EntranceId) {
    debug!(
        "Restoring connection for {}",
        world.entrances[entrance].original_name
    );
    let area = world.disconnect(entrance);
    world.connect(target, area);
    world.entrances[entrance].replaces = None;
    if let Some(reverse) = world.entrances[entrance].reverse {
        let target_replaces = world.entrances[target]
            .replaces
            .expect("target entrance has no replacement");
        let replaces_reverse = world.entrances[target_replaces]
            .reverse
            .expect("two-way entrance paired with a one-way target");
        let reverse_assumed = world.entrances[reverse]
            .assumed
            .expect("reverse entrance was never assumed");
        let reverse_area = world.disconnect(replaces_reverse);
        world.connect(reverse_assumed, reverse_area);
        world.entrances[replaces_reverse].replaces = None;
    }
}

fn delete_target_entrance(world: &mut World, target: EntranceId) {
    if world.entrances[target].connected_area.is_some() {
        world.disconnect(target);
    }
    if let Some(owner) = world.entrances[target].replaces {
        world.entrances[owner].assumed = None;
    }
    world.remove_entrance(target);
}

fn confirm_replacement(world: &mut World, entrance: EntranceId, target: EntranceId) {
    delete_target_entrance(world, target);
    if let Some(reverse) = world.entrances[entrance].reverse {
        if let Some(assumed) = world.entrances[reverse].assumed {
            delete_target_entrance(world, assumed);
        }
    }
}

fn validate_world(
    worlds: &[World],
    item_pool: &[Item],
) -> Result<(), EntranceShuffleError> {
    if !all_locations_reachable(worlds, item_pool) {
        return Err(EntranceShuffleError::AllLocationsNotReachable);
    }
    Ok(())
}

/// Attempts one placement and validates the whole pool; on failure the
/// connection is undone before returning.
fn replace_entrance(
    worlds: &mut [World],
    world_id: WorldId,
    entrance: EntranceId,
    target: EntranceId,
    rollbacks: &mut Vec<EntrancePair>,
    item_pool: &[Item],
) -> Result<(), EntranceShuffleError> {
    debug!(
        "Attempting to connect {} to {}",
        worlds[world_id].entrances[entrance].original_name,
        worlds[world_id].entrances[target].original_name
    );
    check_entrances_compatibility(&worlds[world_id], entrance, target)?;
    change_connections(&mut worlds[world_id], entrance, target);
    if let Err(err) = validate_world(worlds, item_pool) {
        if worlds[world_id].entrances[entrance].connected_area.is_some() {
            restore_connections(&mut worlds[world_id], entrance, target);
        }
        return Err(err);
    }
    rollbacks.push((entrance, target));
    Ok(())
}

fn shuffle_entrances(
    worlds: &mut [World],
    world_id: WorldId,
    entrances: &mut Vec<EntranceId>,
    target_entrances: &mut Vec<EntranceId>,
    rollbacks: &mut Vec<EntrancePair>,
    item_pool: &[Item],
    rng: &mut StdRng,
) -> Result<(), EntranceShuffleError> {
    entrances.shuffle(rng);

    // Place each entrance against the first valid target of a freshly
    // shuffled target pool.
    for &entrance in entrances.iter() {
        if worlds[world_id].entrances[entrance].connected_area.is_some() {
            continue;
        }
        target_entrances.shuffle(rng);

        let mut last_err = EntranceShuffleError::NoMoreValidEntrances;
        for &target in target_entrances.iter() {
            // A disconnected target has already been used up.
            if worlds[world_id].entrances[target].connected_area.is_none() {
                continue;
            }
            match replace_entrance(worlds, world_id, entrance, target, rollbacks, item_pool) {
                Ok(()) => break,
                Err(err) => last_err = err,
            }
        }

        if worlds[world_id].entrances[entrance].connected_area.is_none() {
            debug!(
                "Could not connect {}. Last error: {}",
                worlds[world_id].entrances[entrance].original_name, last_err
            );
            return Err(EntranceShuffleError::NoMoreValidEntrances);
        }
    }

    // Every target must have been consumed, or the bookkeeping is broken.
    for &target in target_entrances.iter() {
        if worlds[world_id].entrances[target].connected_area.is_some() {
            return Err(EntranceShuffleError::FailedToDisconnectTarget(
                worlds[world_id].entrances[target].original_name.clone(),
            ));
        }
    }

    Ok(())
}

/// Random placement can paint itself into a corner, so the whole pool gets a
/// bounded number of fresh attempts before giving up.
fn shuffle_entrance_pool(
    worlds: &mut [World],
    world_id: WorldId,
    entrance_pool: &mut Vec<EntranceId>,
    target_pool: &mut Vec<EntranceId>,
    item_pool: &[Item],
    rng: &mut StdRng,
    retry_count: usize,
) -> Result<(), EntranceShuffleError> {
    let mut retries = retry_count;
    while retries > 0 {
        retries -= 1;
        let mut rollbacks: Vec<EntrancePair> = vec![];

        match shuffle_entrances(
            worlds,
            world_id,
            entrance_pool,
            target_pool,
            &mut rollbacks,
            item_pool,
            rng,
        ) {
            Err(err) => {
                debug!(
                    "Failed to place all entrances in a pool for world {}. Will retry {} more times. Last error: {}",
                    world_id + 1,
                    retries,
                    err
                );
                for &(entrance, target) in &rollbacks {
                    restore_connections(&mut worlds[world_id], entrance, target);
                }
            }
            Ok(()) => {
                for &(entrance, target) in &rollbacks {
                    confirm_replacement(&mut worlds[world_id], entrance, target);
                }
                return Ok(());
            }
        }
    }

    debug!(
        "Entrance placement attempt count exceeded for world {}",
        world_id + 1
    );
    Err(EntranceShuffleError::RanOutOfRetries)
}

fn set_random_starting_island(
    world: &mut World,
    rng: &mut StdRng,
) -> Result<(), EntranceShuffleError> {
    let spawn = world
        .spawn_entrance
        .ok_or(EntranceShuffleError::BadSpawnEntrance)?;
    if world.starting_area_pool.is_empty() {
        return Err(EntranceShuffleError::BadSpawnEntrance);
    }
    let area = world.starting_area_pool[rng.gen_range(0..world.starting_area_pool.len())];
    world.disconnect(spawn);
    world.connect(spawn, area);
    info!("Starting island: {}", world.area_name(area));
    Ok(())
}

fn mark_shuffled(world: &mut World, pool: &[EntranceId]) {
    for &entrance in pool {
        world.entrances[entrance].shuffled = true;
        if let Some(reverse) = world.entrances[entrance].reverse {
            world.entrances[reverse].shuffled = true;
        }
    }
}

/// Shuffles the enabled entrance pools of every world, in pool construction
/// order, validating the complete pool after each placement and once more at
/// the very end.
pub fn randomize_entrances(
    worlds: &mut [World],
    rng: &mut StdRng,
) -> Result<(), EntranceShuffleError> {
    let complete_item_pool: Vec<Item> = worlds
        .iter()
        .flat_map(|w| w.item_pool.iter().copied())
        .collect();

    for world_id in 0..worlds.len() {
        let settings = worlds[world_id].settings.clone();

        if settings.randomize_starting_island {
            set_random_starting_island(&mut worlds[world_id], rng)?;
        }

        set_all_entrances_data(&mut worlds[world_id]);

        // Entrance pools are shuffled in the order they are constructed here.
        let mut entrance_pools: Vec<(EntranceType, Vec<EntranceId>)> = vec![];
        if settings.randomize_dungeon_entrances {
            let pool = worlds[world_id].get_shuffleable_entrances(EntranceType::Dungeon, true);
            entrance_pools.push((EntranceType::Dungeon, pool));
        }
        if settings.randomize_cave_entrances {
            let pool = worlds[world_id].get_shuffleable_entrances(EntranceType::Cave, true);
            entrance_pools.push((EntranceType::Cave, pool));
        }
        if settings.randomize_door_entrances {
            let pool = worlds[world_id].get_shuffleable_entrances(EntranceType::Door, true);
            entrance_pools.push((EntranceType::Door, pool));
        }
        if settings.randomize_misc_entrances {
            // Restrictive entrances (mostly dead ends) ride along in the
            // misc pool; crawlspaces stay separate so a crawlspace entrance
            // can never lead anywhere a standing spawn would break.
            let mut pool = worlds[world_id].get_shuffleable_entrances(EntranceType::Misc, true);
            pool.extend(
                worlds[world_id].get_shuffleable_entrances(EntranceType::MiscRestrictive, true),
            );
            entrance_pools.push((EntranceType::Misc, pool));
            let crawlspaces =
                worlds[world_id].get_shuffleable_entrances(EntranceType::MiscCrawlspace, true);
            if !crawlspaces.is_empty() {
                entrance_pools.push((EntranceType::MiscCrawlspace, crawlspaces));
            }
        }

        for (_, pool) in &entrance_pools {
            mark_shuffled(&mut worlds[world_id], pool);
        }

        // Merge mixed pools into one when more than one mix toggle is set.
        let mix_for = |entrance_type: EntranceType| match entrance_type {
            EntranceType::Dungeon => settings.mix_dungeons,
            EntranceType::Cave => settings.mix_caves,
            EntranceType::Door => settings.mix_doors,
            EntranceType::Misc => settings.mix_misc,
            _ => false,
        };
        let total_mixed_pools = entrance_pools
            .iter()
            .filter(|(entrance_type, _)| mix_for(*entrance_type))
            .count();
        if total_mixed_pools > 1 {
            let mut mixed: Vec<EntranceId> = vec![];
            entrance_pools.retain_mut(|(entrance_type, pool)| {
                if mix_for(*entrance_type) {
                    mixed.append(pool);
                    false
                } else {
                    true
                }
            });
            entrance_pools.push((EntranceType::Mixed, mixed));
        }

        // Build the target pool for each entrance pool, then place.
        let mut pools: Vec<(EntranceType, Vec<EntranceId>, Vec<EntranceId>)> = vec![];
        for (entrance_type, pool) in entrance_pools {
            let targets = assume_entrance_pool(&mut worlds[world_id], &pool);
            pools.push((entrance_type, pool, targets));
        }

        for (entrance_type, mut pool, mut targets) in pools {
            shuffle_entrance_pool(
                worlds,
                world_id,
                &mut pool,
                &mut targets,
                &complete_item_pool,
                rng,
                ENTRANCE_SHUFFLE_RETRY_COUNT,
            )
            .map_err(|err| {
                debug!("Encountered when shuffling pool of type {entrance_type}");
                err
            })?;
        }
    }

    // One last validation over the fully placed pool.
    validate_world(worlds, &complete_item_pool)
}
