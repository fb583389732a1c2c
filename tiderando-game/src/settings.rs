use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString, VariantNames};

use crate::LocationCategory;

/// Where a dungeon's keys, maps and compasses are allowed to land.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumString,
    VariantNames,
    Display,
)]
pub enum DungeonItemMode {
    Vanilla,
    OwnDungeon,
    AnyDungeon,
    Overworld,
}

/// Flat per-world options consumed from the configuration layer. Unknown
/// fields in a settings file are rejected; missing fields take defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub randomize_dungeon_entrances: bool,
    pub randomize_cave_entrances: bool,
    pub randomize_door_entrances: bool,
    pub randomize_misc_entrances: bool,
    pub mix_dungeons: bool,
    pub mix_caves: bool,
    pub mix_doors: bool,
    pub mix_misc: bool,
    pub small_key_mode: DungeonItemMode,
    pub big_key_mode: DungeonItemMode,
    pub map_compass_mode: DungeonItemMode,
    pub race_mode: bool,
    pub num_race_mode_dungeons: usize,
    pub randomize_starting_island: bool,
    /// Location categories that may hold progression items. Locations
    /// carrying any category outside this list are demoted to junk slots.
    pub progression_categories: Vec<LocationCategory>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            randomize_dungeon_entrances: false,
            randomize_cave_entrances: false,
            randomize_door_entrances: false,
            randomize_misc_entrances: false,
            mix_dungeons: false,
            mix_caves: false,
            mix_doors: false,
            mix_misc: false,
            small_key_mode: DungeonItemMode::OwnDungeon,
            big_key_mode: DungeonItemMode::OwnDungeon,
            map_compass_mode: DungeonItemMode::OwnDungeon,
            race_mode: false,
            num_race_mode_dungeons: 2,
            randomize_starting_island: false,
            progression_categories: vec![
                LocationCategory::Misc,
                LocationCategory::Dungeon,
                LocationCategory::GreatFairy,
                LocationCategory::IslandPuzzle,
                LocationCategory::FreeGift,
                LocationCategory::PuzzleCave,
                LocationCategory::CombatCave,
                LocationCategory::SunkenTreasure,
                LocationCategory::ExpensivePurchase,
            ],
        }
    }
}
