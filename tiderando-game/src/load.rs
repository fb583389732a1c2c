//! Loader for the JSON world-definition format. The definition describes
//! one world template (items, areas, exits, locations, dungeons, the
//! entrance shuffle table and the item pools); a multi-world pool is built
//! by instancing the template once per player.

use anyhow::{Context, Result, bail};
use hashbrown::HashSet;
use serde::Deserialize;

use crate::settings::Settings;
use crate::{
    EntranceMetadata, EntranceTableEntry, EntranceType, GameItemDef, Item, ItemCatalog,
    LocationCategory, ROOT_AREA, Requirement, World, WorldId, WorldPool,
};

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorldDef {
    pub items: Vec<ItemEntryDef>,
    #[serde(default)]
    pub dungeons: Vec<DungeonDef>,
    pub areas: Vec<AreaDef>,
    #[serde(default)]
    pub entrance_table: Vec<EntrancePairDef>,
    pub spawn_area: String,
    #[serde(default)]
    pub starting_area_pool: Vec<String>,
    #[serde(default)]
    pub item_pool: Vec<String>,
    #[serde(default)]
    pub starting_items: Vec<String>,
    #[serde(default)]
    pub plandomized_locations: Vec<PlandoDef>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ItemEntryDef {
    pub name: String,
    #[serde(flatten)]
    pub def: GameItemDef,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DungeonDef {
    pub name: String,
    #[serde(default)]
    pub small_key: Option<String>,
    #[serde(default)]
    pub big_key: Option<String>,
    #[serde(default)]
    pub map: Option<String>,
    #[serde(default)]
    pub compass: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AreaDef {
    pub name: String,
    #[serde(default)]
    pub dungeon: Option<String>,
    #[serde(default)]
    pub exits: Vec<ExitDef>,
    #[serde(default)]
    pub locations: Vec<LocationDef>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ExitDef {
    pub to: String,
    #[serde(default)]
    pub requirement: Option<RequirementDef>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LocationDef {
    pub name: String,
    #[serde(default)]
    pub requirement: Option<RequirementDef>,
    #[serde(default)]
    pub categories: Vec<LocationCategory>,
    #[serde(default)]
    pub original_item: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EntrancePairDef {
    pub entrance_type: EntranceType,
    pub forward: EntranceSideDef,
    #[serde(default)]
    pub reverse: Option<EntranceSideDef>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EntranceSideDef {
    pub parent: String,
    pub connected: String,
    #[serde(flatten)]
    pub metadata: EntranceMetadata,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PlandoDef {
    pub location: String,
    pub item: String,
}

/// Requirement expression tree as written in world files.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequirementDef {
    Nothing,
    Impossible,
    HasItem { item: String },
    Count { count: u32, item: String },
    And { args: Vec<RequirementDef> },
    Or { args: Vec<RequirementDef> },
    Not { arg: Box<RequirementDef> },
}

impl RequirementDef {
    fn resolve(&self, catalog: &ItemCatalog, world_id: WorldId) -> Result<Requirement> {
        let item_id = |name: &str| -> Result<Item> {
            let id = catalog
                .id(name)
                .with_context(|| format!("unknown item \"{name}\" in requirement"))?;
            Ok(Item::new(id, world_id))
        };
        Ok(match self {
            RequirementDef::Nothing => Requirement::Nothing,
            RequirementDef::Impossible => Requirement::Impossible,
            RequirementDef::HasItem { item } => Requirement::Has(item_id(item)?),
            RequirementDef::Count { count, item } => Requirement::Count(*count, item_id(item)?),
            RequirementDef::And { args } => Requirement::make_and(
                args.iter()
                    .map(|a| a.resolve(catalog, world_id))
                    .collect::<Result<Vec<_>>>()?,
            ),
            RequirementDef::Or { args } => Requirement::make_or(
                args.iter()
                    .map(|a| a.resolve(catalog, world_id))
                    .collect::<Result<Vec<_>>>()?,
            ),
            RequirementDef::Not { arg } => {
                Requirement::Not(Box::new(arg.resolve(catalog, world_id)?))
            }
        })
    }
}

pub fn parse_world_def(json: &str) -> Result<WorldDef> {
    serde_json::from_str(json).context("unable to parse world definition")
}

/// Builds `num_worlds` instances of the definition, one per player.
pub fn load_world_pool(def: &WorldDef, settings: &Settings, num_worlds: usize) -> Result<WorldPool> {
    let mut catalog = ItemCatalog::default();
    for entry in &def.items {
        catalog.add(&entry.name, entry.def);
    }
    let mut worlds = Vec::with_capacity(num_worlds);
    for world_id in 0..num_worlds {
        worlds.push(build_world(def, settings.clone(), world_id, catalog.clone())?);
    }
    Ok(worlds)
}

fn build_world(
    def: &WorldDef,
    settings: Settings,
    world_id: WorldId,
    catalog: ItemCatalog,
) -> Result<World> {
    let mut world = World::new(world_id, settings, catalog);

    let resolve_item = |world: &World, name: &str| -> Result<Item> {
        let id = world
            .catalog
            .id(name)
            .with_context(|| format!("unknown item \"{name}\""))?;
        Ok(Item::new(id, world_id))
    };

    for dungeon_def in &def.dungeons {
        let item_id = |name: &Option<String>| -> Result<Option<usize>> {
            name.as_ref()
                .map(|n| {
                    world
                        .catalog
                        .id(n)
                        .with_context(|| format!("unknown dungeon item \"{n}\""))
                })
                .transpose()
        };
        let dungeon = crate::Dungeon {
            name: dungeon_def.name.clone(),
            small_key: item_id(&dungeon_def.small_key)?,
            big_key: item_id(&dungeon_def.big_key)?,
            map: item_id(&dungeon_def.map)?,
            compass: item_id(&dungeon_def.compass)?,
            locations: vec![],
            race_mode: false,
        };
        world.dungeons.push(dungeon);
    }

    // Create all areas up front so exits can reference areas defined later.
    for area_def in &def.areas {
        let area = world.add_area(&area_def.name);
        if let Some(dungeon_name) = &area_def.dungeon {
            let dungeon = world
                .dungeons
                .iter()
                .position(|d| &d.name == dungeon_name)
                .with_context(|| format!("unknown dungeon \"{dungeon_name}\""))?;
            world.areas[area].dungeon = Some(dungeon);
        }
    }

    for area_def in &def.areas {
        let area = world.area_id(&area_def.name).unwrap();
        for exit_def in &area_def.exits {
            let connected = world
                .area_id(&exit_def.to)
                .with_context(|| format!("exit to unknown area \"{}\"", exit_def.to))?;
            let requirement = match &exit_def.requirement {
                Some(r) => r.resolve(&world.catalog, world_id)?,
                None => Requirement::Nothing,
            };
            world.add_exit(area, connected, requirement);
        }
        for location_def in &area_def.locations {
            let requirement = match &location_def.requirement {
                Some(r) => r.resolve(&world.catalog, world_id)?,
                None => Requirement::Nothing,
            };
            let categories: HashSet<LocationCategory> =
                location_def.categories.iter().copied().collect();
            let original_item = location_def
                .original_item
                .as_ref()
                .map(|n| resolve_item(&world, n))
                .transpose()?;
            let location = world.add_location(
                &location_def.name,
                area,
                requirement,
                categories,
                original_item,
            );
            if let Some(d) = world.locations[location].dungeon {
                world.dungeons[d].locations.push(location);
            }
            // The victory marker sits at its vanilla location permanently.
            if let Some(item) = original_item {
                if world.catalog.is_victory(item.game_item_id) {
                    world.locations[location].current_item = Some(item);
                    world.locations[location].known_vanilla = true;
                }
            }
        }
    }

    let spawn_area = world
        .area_id(&def.spawn_area)
        .with_context(|| format!("unknown spawn area \"{}\"", def.spawn_area))?;
    let spawn = world.add_exit(ROOT_AREA, spawn_area, Requirement::Nothing);
    world.spawn_entrance = Some(spawn);

    for name in &def.starting_area_pool {
        let area = world
            .area_id(name)
            .with_context(|| format!("unknown starting area \"{name}\""))?;
        world.starting_area_pool.push(area);
    }

    for pair in &def.entrance_table {
        let forward = world
            .get_entrance(&pair.forward.parent, &pair.forward.connected)
            .with_context(|| {
                format!(
                    "entrance table references unknown entrance \"{} -> {}\"",
                    pair.forward.parent, pair.forward.connected
                )
            })?;
        let reverse = match &pair.reverse {
            Some(side) => Some((
                world.get_entrance(&side.parent, &side.connected).with_context(|| {
                    format!(
                        "entrance table references unknown entrance \"{} -> {}\"",
                        side.parent, side.connected
                    )
                })?,
                side.metadata.clone(),
            )),
            None => None,
        };
        world.entrance_table.push(EntranceTableEntry {
            entrance_type: pair.entrance_type,
            forward: (forward, pair.forward.metadata.clone()),
            reverse,
        });
    }

    for name in &def.item_pool {
        let item = resolve_item(&world, name)?;
        world.item_pool.push(item);
    }
    for name in &def.starting_items {
        let item = resolve_item(&world, name)?;
        world.starting_items.push(item);
    }
    for plando in &def.plandomized_locations {
        let location = world
            .location_index
            .get(&plando.location)
            .copied()
            .with_context(|| format!("plandomized unknown location \"{}\"", plando.location))?;
        let item = resolve_item(&world, &plando.item)?;
        world.plandomized_locations.push((location, item));
    }

    if world.locations.is_empty() {
        bail!("world definition has no locations");
    }

    world.determine_progression_locations();
    Ok(world)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_minimal_world() {
        let json = r#"{
            "items": [
                {"name": "Sword"},
                {"name": "GreenRupee", "junk": true},
                {"name": "Victory", "victory": true}
            ],
            "areas": [
                {
                    "name": "Harbor",
                    "exits": [
                        {"to": "Keep", "requirement": {"type": "has_item", "item": "Sword"}}
                    ],
                    "locations": [
                        {"name": "Harbor - Chest", "categories": ["Misc"]}
                    ]
                },
                {
                    "name": "Keep",
                    "locations": [
                        {"name": "Keep - Throne", "original_item": "Victory"}
                    ]
                }
            ],
            "spawn_area": "Harbor",
            "item_pool": ["Sword", "GreenRupee"]
        }"#;
        let def = parse_world_def(json).unwrap();
        let worlds = load_world_pool(&def, &Settings::default(), 1).unwrap();
        assert_eq!(worlds.len(), 1);
        let world = &worlds[0];
        assert_eq!(world.locations.len(), 2);
        assert_eq!(world.item_pool.len(), 2);
        // The victory marker is pre-placed and survives clearing.
        let throne = world.location_index["Keep - Throne"];
        assert!(world.locations[throne].known_vanilla);
        assert!(world.locations[throne].current_item.is_some());
        // Spawn exit hangs off Root.
        let spawn = world.spawn_entrance.unwrap();
        assert_eq!(world.entrances[spawn].parent_area, ROOT_AREA);
        assert_eq!(
            world.entrances[spawn].connected_area,
            world.area_id("Harbor")
        );
    }

    #[test]
    fn requirement_defs_fold_constants() {
        let mut catalog = ItemCatalog::default();
        catalog.add("Sword", GameItemDef::default());
        let def = RequirementDef::And {
            args: vec![
                RequirementDef::Nothing,
                RequirementDef::HasItem {
                    item: "Sword".to_string(),
                },
            ],
        };
        let req = def.resolve(&catalog, 0).unwrap();
        assert_eq!(req, Requirement::Has(Item::new(0, 0)));
    }
}
