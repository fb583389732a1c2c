//! Hand-built fixture worlds for the engine tests.

use hashbrown::HashSet;
use tiderando_game::settings::Settings;
use tiderando_game::{
    AreaId, EntranceMetadata, EntranceTableEntry, EntranceType, GameItemDef, Item, ItemCatalog,
    LocationCategory, ROOT_AREA, Requirement, World, WorldId,
};

pub fn catalog() -> ItemCatalog {
    let mut catalog = ItemCatalog::default();
    catalog.add("Sword", GameItemDef::default());
    catalog.add("Grapple", GameItemDef::default());
    catalog.add("Bombs", GameItemDef::default());
    catalog.add("SmallKey", GameItemDef::default());
    catalog.add("BigKey", GameItemDef::default());
    catalog.add("DungeonMap", GameItemDef::default());
    catalog.add("Compass", GameItemDef::default());
    catalog.add(
        "TreasureChart",
        GameItemDef {
            chart: true,
            ..Default::default()
        },
    );
    catalog.add(
        "GreenRupee",
        GameItemDef {
            junk: true,
            ..Default::default()
        },
    );
    catalog.add(
        "Victory",
        GameItemDef {
            victory: true,
            ..Default::default()
        },
    );
    catalog
}

pub fn item(world: &World, name: &str) -> Item {
    Item::new(world.catalog.id(name).unwrap(), world.world_id)
}

pub fn has(world: &World, name: &str) -> Requirement {
    Requirement::Has(item(world, name))
}

pub fn count(world: &World, n: u32, name: &str) -> Requirement {
    Requirement::Count(n, item(world, name))
}

pub fn misc() -> HashSet<LocationCategory> {
    [LocationCategory::Misc].into_iter().collect()
}

pub fn add_chest(world: &mut World, name: &str, area: AreaId, requirement: Requirement) -> usize {
    world.add_location(name, area, requirement, misc(), None)
}

/// A filled, permanent victory marker gated by `requirement`.
pub fn add_victory(world: &mut World, area: AreaId, requirement: Requirement) -> usize {
    let victory = item(world, "Victory");
    let categories: HashSet<LocationCategory> =
        [LocationCategory::AlwaysProgression].into_iter().collect();
    let l = world.add_location("Victory", area, requirement, categories, Some(victory));
    world.locations[l].current_item = Some(victory);
    world.locations[l].known_vanilla = true;
    l
}

/// The two-location scenario: Start and a Vault behind a one-key lock.
pub fn key_vault_world() -> Vec<World> {
    let mut world = World::new(0, Settings::default(), catalog());
    let start = world.add_area("Start");
    let vault = world.add_area("Vault");
    let spawn = world.add_exit(ROOT_AREA, start, Requirement::Nothing);
    world.spawn_entrance = Some(spawn);
    let req = count(&world, 1, "SmallKey");
    world.add_exit(start, vault, req);
    world.add_exit(vault, start, Requirement::Nothing);
    add_chest(&mut world, "Start - Chest", start, Requirement::Nothing);
    add_chest(&mut world, "Vault - Chest", vault, Requirement::Nothing);
    world.determine_progression_locations();
    vec![world]
}

/// Sea hub with two two-way cave entrances, shuffleable as one CAVE pool.
pub fn cave_world(settings: Settings, world_id: WorldId) -> World {
    let mut world = World::new(world_id, settings, catalog());
    let sea = world.add_area("Sea");
    let cave_a = world.add_area("Cave A");
    let cave_b = world.add_area("Cave B");
    let spawn = world.add_exit(ROOT_AREA, sea, Requirement::Nothing);
    world.spawn_entrance = Some(spawn);

    let to_a = world.add_exit(sea, cave_a, Requirement::Nothing);
    let from_a = world.add_exit(cave_a, sea, Requirement::Nothing);
    let to_b = world.add_exit(sea, cave_b, Requirement::Nothing);
    let from_b = world.add_exit(cave_b, sea, Requirement::Nothing);

    add_chest(&mut world, "Sea - Open Chest", sea, Requirement::Nothing);
    let grapple_req = has(&world, "Grapple");
    add_chest(&mut world, "Sea - High Chest", sea, grapple_req);
    add_chest(&mut world, "Cave A - Chest", cave_a, Requirement::Nothing);
    let sword_req = has(&world, "Sword");
    add_chest(&mut world, "Cave B - Chest", cave_b, sword_req);
    let victory_req = has(&world, "Sword");
    add_victory(&mut world, sea, victory_req);

    for (forward, reverse) in [(to_a, from_a), (to_b, from_b)] {
        world.entrance_table.push(EntranceTableEntry {
            entrance_type: EntranceType::Cave,
            forward: (forward, EntranceMetadata::default()),
            reverse: Some((reverse, EntranceMetadata::default())),
        });
    }

    for name in ["Sword", "Grapple", "GreenRupee", "GreenRupee"] {
        let i = item(&world, name);
        world.item_pool.push(i);
    }
    world.determine_progression_locations();
    world
}

/// Sea plus a one-dungeon world: the Vault's inner room is locked behind its
/// own small key.
pub fn vault_world(settings: Settings) -> Vec<World> {
    let mut world = World::new(0, settings, catalog());
    world.dungeons.push(tiderando_game::Dungeon {
        name: "Vault".to_string(),
        small_key: world.catalog.id("SmallKey"),
        big_key: world.catalog.id("BigKey"),
        map: world.catalog.id("DungeonMap"),
        compass: world.catalog.id("Compass"),
        locations: vec![],
        race_mode: false,
    });
    let sea = world.add_area("Sea");
    let entry = world.add_area("Vault Entry");
    let inner = world.add_area("Vault Inner");
    world.areas[entry].dungeon = Some(0);
    world.areas[inner].dungeon = Some(0);

    let spawn = world.add_exit(ROOT_AREA, sea, Requirement::Nothing);
    world.spawn_entrance = Some(spawn);
    world.add_exit(sea, entry, Requirement::Nothing);
    world.add_exit(entry, sea, Requirement::Nothing);
    let key_req = count(&world, 1, "SmallKey");
    world.add_exit(entry, inner, key_req);
    world.add_exit(inner, entry, Requirement::Nothing);

    add_chest(&mut world, "Sea - Open Chest", sea, Requirement::Nothing);
    let dungeon_categories: HashSet<LocationCategory> =
        [LocationCategory::Dungeon].into_iter().collect();
    let key = item(&world, "SmallKey");
    let l1 = world.add_location(
        "Vault - Entry Chest",
        entry,
        Requirement::Nothing,
        dungeon_categories.clone(),
        Some(key),
    );
    let l2 = world.add_location(
        "Vault - Inner Chest",
        inner,
        Requirement::Nothing,
        dungeon_categories,
        None,
    );
    world.dungeons[0].locations.push(l1);
    world.dungeons[0].locations.push(l2);
    let victory_req = has(&world, "Sword");
    add_victory(&mut world, sea, victory_req);

    for name in ["Sword", "SmallKey", "GreenRupee"] {
        let i = item(&world, name);
        world.item_pool.push(i);
    }
    world.determine_progression_locations();
    vec![world]
}

pub fn all_location_refs(worlds: &[World]) -> Vec<(WorldId, usize)> {
    let mut refs = vec![];
    for world in worlds {
        for l in 0..world.locations.len() {
            refs.push((world.world_id, l));
        }
    }
    refs
}
