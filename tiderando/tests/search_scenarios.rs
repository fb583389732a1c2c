mod common;

use common::*;
use hashbrown::HashSet;
use tiderando::search::{
    LocationRef, accessible_locations, all_locations_reachable, game_beatable,
    locations_reachable,
};
use tiderando_game::settings::Settings;

#[test]
fn locked_vault_opens_with_a_key() {
    let worlds = key_vault_world();
    let allowed = all_location_refs(&worlds);

    let reachable = accessible_locations(&worlds, &[], &allowed, None);
    assert_eq!(reachable.len(), 1);
    let (w, l) = reachable[0];
    assert_eq!(worlds[w].location_name(l), "Start - Chest");

    let key = item(&worlds[0], "SmallKey");
    let reachable = accessible_locations(&worlds, &[key], &allowed, None);
    let names: HashSet<&str> = reachable
        .iter()
        .map(|&(w, l)| worlds[w].location_name(l))
        .collect();
    assert_eq!(names, HashSet::from_iter(["Start - Chest", "Vault - Chest"]));
}

#[test]
fn empty_allowed_set_is_empty_not_an_error() {
    let worlds = key_vault_world();
    let reachable = accessible_locations(&worlds, &[], &[], None);
    assert!(reachable.is_empty());
}

#[test]
fn reachability_is_monotonic_in_ownership() {
    let worlds = vec![cave_world(Settings::default(), 0)];
    let allowed = all_location_refs(&worlds);

    let smaller = [item(&worlds[0], "Sword")];
    let larger = [
        item(&worlds[0], "Sword"),
        item(&worlds[0], "Grapple"),
        item(&worlds[0], "Bombs"),
    ];
    let reachable_smaller: HashSet<LocationRef> =
        accessible_locations(&worlds, &smaller, &allowed, None)
            .into_iter()
            .collect();
    let reachable_larger: HashSet<LocationRef> =
        accessible_locations(&worlds, &larger, &allowed, None)
            .into_iter()
            .collect();
    assert!(reachable_smaller.is_subset(&reachable_larger));
}

#[test]
fn locations_reachable_checks_the_whole_subset() {
    let worlds = key_vault_world();
    let allowed = all_location_refs(&worlds);
    assert!(!locations_reachable(&worlds, &[], &allowed, None));
    let key = item(&worlds[0], "SmallKey");
    assert!(locations_reachable(&worlds, &[key], &allowed, None));
}

#[test]
fn all_locations_reachable_wants_every_location() {
    let worlds = key_vault_world();
    assert!(!all_locations_reachable(&worlds, &[]));
    let key = item(&worlds[0], "SmallKey");
    assert!(all_locations_reachable(&worlds, &[key]));
}

#[test]
fn search_can_be_restricted_to_one_world() {
    let worlds = vec![
        cave_world(Settings::default(), 0),
        cave_world(Settings::default(), 1),
    ];
    let allowed = all_location_refs(&worlds);
    let reachable = accessible_locations(&worlds, &[], &allowed, Some(1));
    assert!(!reachable.is_empty());
    assert!(reachable.iter().all(|&(w, _)| w == 1));
}

#[test]
fn beatability_collects_items_sphere_by_sphere() {
    // Victory requires the Sword; the Sword sits in plain reach.
    let mut worlds = vec![cave_world(Settings::default(), 0)];
    let sword = item(&worlds[0], "Sword");
    let open_chest = worlds[0].location_index["Sea - Open Chest"];
    worlds[0].locations[open_chest].current_item = Some(sword);
    assert!(game_beatable(&worlds));

    // Behind its own lock, the Sword can never be collected.
    worlds[0].locations[open_chest].current_item = None;
    let locked_chest = worlds[0].location_index["Cave B - Chest"];
    worlds[0].locations[locked_chest].current_item = Some(sword);
    assert!(!game_beatable(&worlds));
}
