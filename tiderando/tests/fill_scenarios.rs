mod common;

use common::*;
use hashbrown::HashSet;
use tiderando::fill::{
    FillError, assumed_fill, clear_worlds, determine_major_items, fill,
    forward_fill_until_more_free_space,
};
use tiderando::generate::make_rng;
use tiderando::search::game_beatable;
use tiderando_game::settings::{DungeonItemMode, Settings};
use tiderando_game::{LocationCategory, Requirement, ROOT_AREA, World};

#[test]
fn assumed_fill_never_overcommits() {
    let mut worlds = vec![cave_world(Settings::default(), 0)];
    let mut rng = make_rng(1);
    let mut items = vec![
        item(&worlds[0], "Sword"),
        item(&worlds[0], "Grapple"),
        item(&worlds[0], "Bombs"),
        item(&worlds[0], "GreenRupee"),
        item(&worlds[0], "GreenRupee"),
    ];
    let allowed = all_location_refs(&worlds)[..3].to_vec();
    let allowed = allowed
        .into_iter()
        .filter(|&(w, l)| worlds[w].locations[l].current_item.is_none())
        .collect::<Vec<_>>();
    assert!(items.len() > allowed.len());

    let err = assumed_fill(&mut worlds, &mut items, &[], &allowed, None, &mut rng).unwrap_err();
    assert!(matches!(err, FillError::MoreItemsThanLocations { .. }));
    // Zero mutations: nothing was placed, nothing was consumed.
    assert_eq!(items.len(), 5);
    for &(w, l) in &allowed {
        assert!(worlds[w].locations[l].current_item.is_none());
    }
}

#[test]
fn fill_is_complete_and_sound() {
    let mut worlds = vec![cave_world(Settings::default(), 0)];
    let mut rng = make_rng(5);
    fill(&mut worlds, &mut rng).unwrap();

    // Completeness: every location holds an item.
    for world in &worlds {
        for location in &world.locations {
            assert!(
                location.current_item.is_some(),
                "location {} was left empty",
                location.name
            );
        }
    }
    // Soundness: the result is beatable.
    assert!(game_beatable(&worlds));
}

#[test]
fn fill_is_deterministic_under_a_fixed_seed() {
    let run = |seed: u64| -> Vec<Option<(usize, usize)>> {
        let mut worlds = vec![cave_world(Settings::default(), 0)];
        let mut rng = make_rng(seed);
        fill(&mut worlds, &mut rng).unwrap();
        worlds[0]
            .locations
            .iter()
            .map(|loc| loc.current_item.map(|i| (i.game_item_id, i.world_id)))
            .collect()
    };
    assert_eq!(run(123), run(123));
}

#[test]
fn major_items_are_the_load_bearing_ones() {
    let mut worlds = vec![cave_world(Settings::default(), 0)];
    let mut rng = make_rng(2);
    let mut item_pool = worlds[0].item_pool.clone();
    let progression: Vec<_> = worlds[0]
        .progression_locations()
        .into_iter()
        .map(|l| (0, l))
        .collect();
    determine_major_items(&mut worlds, &mut item_pool, &progression, &mut rng);

    let sword = item(&worlds[0], "Sword");
    let grapple = item(&worlds[0], "Grapple");
    let rupee = item(&worlds[0], "GreenRupee");
    for pool_item in &item_pool {
        if *pool_item == sword || *pool_item == grapple {
            assert!(pool_item.major, "{} should be major", worlds[0].item_name(*pool_item));
        }
        if *pool_item == rupee {
            assert!(!pool_item.major, "junk can never be major");
        }
    }
}

#[test]
fn not_enough_progression_locations_is_terminal() {
    // One progression chest gated on both Sword and Grapple: both are major,
    // but there is only the single progression slot for them.
    let mut world = World::new(0, Settings::default(), catalog());
    let sea = world.add_area("Sea");
    let spawn = world.add_exit(ROOT_AREA, sea, Requirement::Nothing);
    world.spawn_entrance = Some(spawn);
    let req = Requirement::make_and(vec![has(&world, "Sword"), has(&world, "Grapple")]);
    add_chest(&mut world, "Sea - Gated Chest", sea, req);
    let junk_categories: HashSet<LocationCategory> =
        [LocationCategory::Junk].into_iter().collect();
    world.add_location(
        "Sea - Junk Pile",
        sea,
        Requirement::Nothing,
        junk_categories,
        None,
    );
    add_victory(&mut world, sea, Requirement::Nothing);
    for name in ["Sword", "Grapple"] {
        let i = item(&world, name);
        world.item_pool.push(i);
    }
    world.determine_progression_locations();

    let mut worlds = vec![world];
    let mut rng = make_rng(4);
    let err = fill(&mut worlds, &mut rng).unwrap_err();
    assert!(matches!(err, FillError::NotEnoughProgressionLocations { .. }));
}

#[test]
fn forward_fill_places_a_minimal_unsticking_combination() {
    // One open chest; three more behind the Sword. The rescue has to place
    // the Sword (a 1-combination) to reach the three-per-world target.
    let mut world = World::new(0, Settings::default(), catalog());
    let sea = world.add_area("Sea");
    let peak = world.add_area("Peak");
    let spawn = world.add_exit(ROOT_AREA, sea, Requirement::Nothing);
    world.spawn_entrance = Some(spawn);
    let sword_req = has(&world, "Sword");
    world.add_exit(sea, peak, sword_req);
    add_chest(&mut world, "Sea - Open Chest", sea, Requirement::Nothing);
    add_chest(&mut world, "Peak - Chest 1", peak, Requirement::Nothing);
    add_chest(&mut world, "Peak - Chest 2", peak, Requirement::Nothing);
    add_chest(&mut world, "Peak - Chest 3", peak, Requirement::Nothing);
    world.determine_progression_locations();
    let mut worlds = vec![world];

    let mut rng = make_rng(8);
    let mut items = vec![item(&worlds[0], "Sword"), item(&worlds[0], "Grapple")];
    let allowed = all_location_refs(&worlds);
    forward_fill_until_more_free_space(&mut worlds, &mut items, &allowed, None, &mut rng).unwrap();

    // The Sword was committed at the only open spot; the Grapple was not
    // needed.
    let open_chest = worlds[0].location_index["Sea - Open Chest"];
    assert_eq!(
        worlds[0].locations[open_chest].current_item,
        Some(item(&worlds[0], "Sword"))
    );
    assert_eq!(items, vec![item(&worlds[0], "Grapple")]);
}

#[test]
fn forward_fill_reports_an_exhausted_combination_space() {
    // Nothing in hand can open the Sword lock, so no combination helps.
    let mut world = World::new(0, Settings::default(), catalog());
    let sea = world.add_area("Sea");
    let peak = world.add_area("Peak");
    let spawn = world.add_exit(ROOT_AREA, sea, Requirement::Nothing);
    world.spawn_entrance = Some(spawn);
    let sword_req = has(&world, "Sword");
    world.add_exit(sea, peak, sword_req);
    add_chest(&mut world, "Sea - Open Chest", sea, Requirement::Nothing);
    add_chest(&mut world, "Peak - Chest 1", peak, Requirement::Nothing);
    add_chest(&mut world, "Peak - Chest 2", peak, Requirement::Nothing);
    world.determine_progression_locations();
    let mut worlds = vec![world];

    let mut rng = make_rng(9);
    let mut items = vec![item(&worlds[0], "Grapple")];
    let allowed = all_location_refs(&worlds);
    let err = forward_fill_until_more_free_space(&mut worlds, &mut items, &allowed, None, &mut rng)
        .unwrap_err();
    assert_eq!(err, FillError::RanOutOfRetries);
}

#[test]
fn own_dungeon_keys_stay_in_their_dungeon() {
    for seed in 0..10 {
        let mut worlds = vault_world(Settings {
            small_key_mode: DungeonItemMode::OwnDungeon,
            ..Settings::default()
        });
        let mut rng = make_rng(seed);
        fill(&mut worlds, &mut rng).unwrap();
        let world = &worlds[0];
        let key = item(world, "SmallKey");
        let holder = world
            .locations
            .iter()
            .position(|loc| loc.current_item == Some(key))
            .expect("small key was not placed");
        assert_eq!(world.locations[holder].dungeon, Some(0));
        assert!(game_beatable(&worlds));
    }
}

#[test]
fn vanilla_keys_return_to_their_original_location() {
    let mut worlds = vault_world(Settings {
        small_key_mode: DungeonItemMode::Vanilla,
        ..Settings::default()
    });
    let mut rng = make_rng(6);
    fill(&mut worlds, &mut rng).unwrap();
    let world = &worlds[0];
    let key = item(world, "SmallKey");
    let entry_chest = world.location_index["Vault - Entry Chest"];
    assert_eq!(world.locations[entry_chest].current_item, Some(key));
    assert!(world.locations[entry_chest].known_vanilla);
}

#[test]
fn charts_avoid_sunken_treasure_slots_when_possible() {
    for seed in 0..10 {
        let mut world = World::new(0, Settings::default(), catalog());
        let sea = world.add_area("Sea");
        let spawn = world.add_exit(ROOT_AREA, sea, Requirement::Nothing);
        world.spawn_entrance = Some(spawn);
        add_chest(&mut world, "Sea - Dry Chest", sea, Requirement::Nothing);
        let sunken: HashSet<LocationCategory> =
            [LocationCategory::SunkenTreasure].into_iter().collect();
        world.add_location("Sea - Sunken Chest", sea, Requirement::Nothing, sunken, None);
        world.determine_progression_locations();
        let mut worlds = vec![world];

        let mut rng = make_rng(seed);
        let mut items = vec![item(&worlds[0], "TreasureChart")];
        let allowed = all_location_refs(&worlds);
        assumed_fill(&mut worlds, &mut items, &[], &allowed, None, &mut rng).unwrap();

        let dry = worlds[0].location_index["Sea - Dry Chest"];
        assert_eq!(
            worlds[0].locations[dry].current_item,
            Some(item(&worlds[0], "TreasureChart"))
        );
    }
}

#[test]
fn clearing_keeps_vanilla_placements() {
    let mut worlds = vault_world(Settings {
        small_key_mode: DungeonItemMode::Vanilla,
        ..Settings::default()
    });
    let mut rng = make_rng(14);
    fill(&mut worlds, &mut rng).unwrap();
    clear_worlds(&mut worlds);
    let world = &worlds[0];
    let entry_chest = world.location_index["Vault - Entry Chest"];
    let open_chest = world.location_index["Sea - Open Chest"];
    assert!(world.locations[entry_chest].current_item.is_some());
    assert!(world.locations[open_chest].current_item.is_none());
}
