//! Spoiler report for a completed generation: final entrance connections,
//! the location→item table, and the playthrough spheres pared down to the
//! placements that are actually required to finish.

use serde::Serialize;
use tiderando_game::{Item, World, WorldId};

use crate::search::{LocationRef, Sphere, collect_spheres, game_beatable};

#[derive(Serialize)]
pub struct SpoilerLog {
    pub seed: u64,
    pub worlds: Vec<SpoilerWorld>,
    pub playthrough: Vec<SpoilerSphere>,
}

#[derive(Serialize)]
pub struct SpoilerWorld {
    pub world: WorldId,
    pub starting_items: Vec<String>,
    pub entrances: Vec<SpoilerEntrance>,
    pub locations: Vec<SpoilerLocation>,
}

#[derive(Serialize)]
pub struct SpoilerEntrance {
    pub entrance: String,
    pub leads_to: String,
}

#[derive(Serialize)]
pub struct SpoilerLocation {
    pub location: String,
    pub item: String,
    pub item_world: WorldId,
}

#[derive(Serialize)]
pub struct SpoilerSphere {
    pub locations: Vec<SpoilerSphereEntry>,
    pub entrances: Vec<String>,
}

#[derive(Serialize)]
pub struct SpoilerSphereEntry {
    pub world: WorldId,
    pub location: String,
    pub item: String,
}

/// Computes the playthrough spheres and whittles them down to the required
/// placements: an item whose removal leaves the game beatable is not part of
/// the playthrough. The worlds are restored to their exact final state
/// before returning.
pub fn generate_playthrough(worlds: &mut [World]) -> Vec<Sphere> {
    let spheres = collect_spheres(worlds);

    // Temporarily take away everything that is not required.
    let mut removed: Vec<(LocationRef, Item)> = vec![];
    for sphere in &spheres {
        for &(w, l) in &sphere.locations {
            let Some(item) = worlds[w].locations[l].current_item else {
                continue;
            };
            if worlds[w].catalog.is_junk(item.game_item_id) {
                continue;
            }
            worlds[w].locations[l].current_item = None;
            if game_beatable(worlds) {
                removed.push(((w, l), item));
            } else {
                worlds[w].locations[l].current_item = Some(item);
            }
        }
    }

    // Regenerate so spheres flattened by non-required items disappear.
    let mut pared = collect_spheres(worlds);
    for sphere in &mut pared {
        sphere.locations.retain(|&(w, l)| {
            worlds[w].locations[l]
                .current_item
                .map(|item| !worlds[w].catalog.is_junk(item.game_item_id))
                .unwrap_or(false)
        });
    }
    pared.retain(|sphere| !sphere.locations.is_empty() || !sphere.entrances.is_empty());

    for ((w, l), item) in removed {
        worlds[w].locations[l].current_item = Some(item);
    }
    pared
}

pub fn get_spoiler_log(worlds: &[World], seed: u64, playthrough: &[Sphere]) -> SpoilerLog {
    let spoiler_worlds = worlds
        .iter()
        .map(|world| SpoilerWorld {
            world: world.world_id,
            starting_items: world
                .starting_items
                .iter()
                .map(|&item| world.item_name(item).to_string())
                .collect(),
            entrances: world
                .entrances
                .iter()
                .filter(|e| !e.retired && e.shuffled && e.primary)
                .filter_map(|e| {
                    e.connected_area.map(|area| SpoilerEntrance {
                        entrance: e.original_name.clone(),
                        leads_to: world.area_name(area).to_string(),
                    })
                })
                .collect(),
            locations: world
                .locations
                .iter()
                .map(|loc| {
                    let (item, item_world) = match loc.current_item {
                        Some(item) => (world.item_name(item).to_string(), item.world_id),
                        None => ("Nothing".to_string(), world.world_id),
                    };
                    SpoilerLocation {
                        location: loc.name.clone(),
                        item,
                        item_world,
                    }
                })
                .collect(),
        })
        .collect();

    let playthrough = playthrough
        .iter()
        .map(|sphere| SpoilerSphere {
            locations: sphere
                .locations
                .iter()
                .map(|&(w, l)| SpoilerSphereEntry {
                    world: w,
                    location: worlds[w].location_name(l).to_string(),
                    item: worlds[w].locations[l]
                        .current_item
                        .map(|item| worlds[w].item_name(item).to_string())
                        .unwrap_or_else(|| "Nothing".to_string()),
                })
                .collect(),
            entrances: sphere
                .entrances
                .iter()
                .map(|&(w, e)| worlds[w].entrances[e].original_name.clone())
                .collect(),
        })
        .collect();

    SpoilerLog {
        seed,
        worlds: spoiler_worlds,
        playthrough,
    }
}
