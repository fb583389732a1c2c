pub mod load;
pub mod settings;

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use strum_macros::{Display, EnumString, VariantNames};

use crate::settings::Settings;

pub type WorldId = usize; // Index into the WorldPool
pub type AreaId = usize; // Index into World.areas
pub type EntranceId = usize; // Index into World.entrances (arena; stand-ins are appended)
pub type LocationId = usize; // Index into World.locations
pub type GameItemId = usize; // Index into ItemCatalog.item_isv.keys
pub type DungeonId = usize; // Index into World.dungeons

/// Area 0 of every world. Targets created during entrance shuffle hang off
/// of it so that their connected areas are reachable with no requirements.
pub const ROOT_AREA: AreaId = 0;

#[derive(Default, Clone, Debug)]
pub struct IndexedVec<T: Hash + Eq> {
    pub keys: Vec<T>,
    pub index_by_key: HashMap<T, usize>,
}

impl<T: Hash + Eq> IndexedVec<T> {
    pub fn add<U: ToOwned<Owned = T> + ?Sized>(&mut self, name: &U) -> usize {
        if !self.index_by_key.contains_key(&name.to_owned()) {
            let idx = self.keys.len();
            self.index_by_key.insert(name.to_owned(), self.keys.len());
            self.keys.push(name.to_owned());
            idx
        } else {
            self.index_by_key[&name.to_owned()]
        }
    }
}

/// Loader-supplied classification for one game item id.
#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize)]
pub struct GameItemDef {
    /// Junk items never gate progression and are skipped by major-item
    /// determination.
    #[serde(default)]
    pub junk: bool,
    /// Treasure charts get special handling during assumed fill so that a
    /// chart doesn't end up guarding the treasure another chart leads to.
    #[serde(default)]
    pub chart: bool,
    /// Marker item sitting at a world's final-objective location.
    #[serde(default)]
    pub victory: bool,
}

#[derive(Default, Clone, Debug)]
pub struct ItemCatalog {
    pub item_isv: IndexedVec<String>,
    pub defs: Vec<GameItemDef>,
}

impl ItemCatalog {
    pub fn add(&mut self, name: &str, def: GameItemDef) -> GameItemId {
        let id = self.item_isv.add(name);
        if id == self.defs.len() {
            self.defs.push(def);
        }
        id
    }

    pub fn id(&self, name: &str) -> Option<GameItemId> {
        self.item_isv.index_by_key.get(name).copied()
    }

    pub fn name(&self, id: GameItemId) -> &str {
        &self.item_isv.keys[id]
    }

    pub fn is_junk(&self, id: GameItemId) -> bool {
        self.defs[id].junk
    }

    pub fn is_chart(&self, id: GameItemId) -> bool {
        self.defs[id].chart
    }

    pub fn is_victory(&self, id: GameItemId) -> bool {
        self.defs[id].victory
    }

    pub fn junk_ids(&self) -> Vec<GameItemId> {
        (0..self.defs.len()).filter(|&i| self.defs[i].junk).collect()
    }
}

/// A concrete item instance belonging to one world of the pool.
///
/// Equality and hashing cover only (game_item_id, world_id): the `major`
/// flag is scratch state owned by major-item determination and must not
/// affect multiset membership.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct Item {
    pub game_item_id: GameItemId,
    pub world_id: WorldId,
    #[serde(default)]
    pub major: bool,
}

impl Item {
    pub fn new(game_item_id: GameItemId, world_id: WorldId) -> Self {
        Item {
            game_item_id,
            world_id,
            major: false,
        }
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.game_item_id == other.game_item_id && self.world_id == other.world_id
    }
}

impl Eq for Item {}

impl Hash for Item {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.game_item_id.hash(state);
        self.world_id.hash(state);
    }
}

/// Boolean predicate over an ownership multiset, attached to entrances and
/// locations. Evaluation lives in the logic crate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Requirement {
    Nothing,
    Impossible,
    Has(Item),
    Count(u32, Item),
    And(Vec<Requirement>),
    Or(Vec<Requirement>),
    Not(Box<Requirement>),
}

impl Requirement {
    pub fn make_and(reqs: Vec<Requirement>) -> Requirement {
        let mut out_reqs: Vec<Requirement> = vec![];
        for req in reqs {
            if let Requirement::Impossible = req {
                return Requirement::Impossible;
            } else if let Requirement::Nothing = req {
                continue;
            } else if let Requirement::And(and_reqs) = req {
                out_reqs.extend(and_reqs);
            } else {
                out_reqs.push(req);
            }
        }
        if out_reqs.is_empty() {
            Requirement::Nothing
        } else if out_reqs.len() == 1 {
            out_reqs.into_iter().next().unwrap()
        } else {
            Requirement::And(out_reqs)
        }
    }

    pub fn make_or(reqs: Vec<Requirement>) -> Requirement {
        let mut out_reqs: Vec<Requirement> = vec![];
        for req in reqs {
            if let Requirement::Nothing = req {
                return Requirement::Nothing;
            } else if let Requirement::Impossible = req {
                continue;
            } else if let Requirement::Or(or_reqs) = req {
                out_reqs.extend(or_reqs);
            } else {
                out_reqs.push(req);
            }
        }
        if out_reqs.is_empty() {
            Requirement::Impossible
        } else if out_reqs.len() == 1 {
            out_reqs.into_iter().next().unwrap()
        } else {
            Requirement::Or(out_reqs)
        }
    }
}

#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    VariantNames,
    Display,
)]
pub enum EntranceType {
    None,
    Dungeon,
    DungeonReverse,
    Cave,
    CaveReverse,
    Door,
    DoorReverse,
    Misc,
    MiscRestrictive,
    MiscCrawlspace,
    MiscCrawlspaceReverse,
    Mixed,
}

impl EntranceType {
    /// The type assigned to the return side of a two-way pair of this type.
    pub fn reverse(self) -> EntranceType {
        match self {
            EntranceType::Dungeon => EntranceType::DungeonReverse,
            EntranceType::Cave => EntranceType::CaveReverse,
            EntranceType::Door => EntranceType::DoorReverse,
            EntranceType::Misc => EntranceType::Misc,
            EntranceType::MiscRestrictive => EntranceType::MiscRestrictive,
            EntranceType::MiscCrawlspace => EntranceType::MiscCrawlspaceReverse,
            other => other,
        }
    }
}

#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    VariantNames,
    Display,
)]
pub enum LocationCategory {
    Misc,
    Dungeon,
    GreatFairy,
    IslandPuzzle,
    Mail,
    FreeGift,
    Minigame,
    PuzzleCave,
    CombatCave,
    SunkenTreasure,
    LongSideQuest,
    ExpensivePurchase,
    AlwaysProgression,
    Junk,
}

/// Static per-entrance data consumed by the asset writer; the shuffle
/// algorithm only copies it around.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntranceMetadata {
    pub stage_name: String,
    pub room_num: u8,
    pub spawn_id: u8,
    pub filepath_stage: String,
    pub filepath_room_num: u8,
    pub scls_exit_index: u8,
}

/// One row of the loader-provided entrance shuffle table: a forward
/// entrance, its optional return entrance, and the file metadata for both.
#[derive(Clone, Debug)]
pub struct EntranceTableEntry {
    pub entrance_type: EntranceType,
    pub forward: (EntranceId, EntranceMetadata),
    pub reverse: Option<(EntranceId, EntranceMetadata)>,
}

/// A directed edge of the world graph, stored in the world's entrance arena.
/// `reverse`, `replaces` and `assumed` are weak back-references into the
/// same arena; a retired slot keeps its data but is skipped by lookups.
#[derive(Clone, Debug, PartialEq)]
pub struct Entrance {
    pub parent_area: AreaId,
    pub connected_area: Option<AreaId>,
    pub original_connected_area: AreaId,
    pub requirement: Requirement,
    pub entrance_type: EntranceType,
    pub primary: bool,
    pub shuffled: bool,
    pub reverse: Option<EntranceId>,
    pub replaces: Option<EntranceId>,
    pub assumed: Option<EntranceId>,
    pub retired: bool,
    pub original_name: String,
    pub metadata: EntranceMetadata,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Area {
    pub name: String,
    pub exits: Vec<EntranceId>,
    /// Entrances currently connected into this area. Maintained by
    /// connect/disconnect so disconnection can unhook in O(len).
    pub entrances: Vec<EntranceId>,
    pub locations: Vec<LocationId>,
    pub dungeon: Option<DungeonId>,
}

#[derive(Clone, Debug)]
pub struct Location {
    pub name: String,
    pub area: AreaId,
    pub requirement: Requirement,
    pub original_item: Option<Item>,
    pub current_item: Option<Item>,
    pub progression: bool,
    pub race_mode: bool,
    /// Locations whose content is fixed (vanilla policy, plandomizer, the
    /// victory marker) survive `World::clear`.
    pub known_vanilla: bool,
    pub categories: HashSet<LocationCategory>,
    pub dungeon: Option<DungeonId>,
}

#[derive(Clone, Debug, Default)]
pub struct Dungeon {
    pub name: String,
    pub small_key: Option<GameItemId>,
    pub big_key: Option<GameItemId>,
    pub map: Option<GameItemId>,
    pub compass: Option<GameItemId>,
    pub locations: Vec<LocationId>,
    pub race_mode: bool,
}

pub type WorldPool = Vec<World>;

/// One player's world: the area graph, the entrance arena, the location
/// table, dungeons, item pools and settings. Multi-world pools hold one of
/// these per player; ids inside a world never reference another world.
#[derive(Clone, Debug)]
pub struct World {
    pub world_id: WorldId,
    pub settings: Settings,
    pub catalog: ItemCatalog,
    pub areas: Vec<Area>,
    pub entrances: Vec<Entrance>,
    pub locations: Vec<Location>,
    pub dungeons: Vec<Dungeon>,
    pub area_index: HashMap<String, AreaId>,
    pub location_index: HashMap<String, LocationId>,
    pub entrance_table: Vec<EntranceTableEntry>,
    pub item_pool: Vec<Item>,
    pub starting_items: Vec<Item>,
    pub plandomized_locations: Vec<(LocationId, Item)>,
    /// The Root exit the player spawns through; retargeted by
    /// starting-island randomization.
    pub spawn_entrance: Option<EntranceId>,
    pub starting_area_pool: Vec<AreaId>,
}

impl World {
    pub fn new(world_id: WorldId, settings: Settings, catalog: ItemCatalog) -> Self {
        let mut world = World {
            world_id,
            settings,
            catalog,
            areas: vec![],
            entrances: vec![],
            locations: vec![],
            dungeons: vec![],
            area_index: HashMap::new(),
            location_index: HashMap::new(),
            entrance_table: vec![],
            item_pool: vec![],
            starting_items: vec![],
            plandomized_locations: vec![],
            spawn_entrance: None,
            starting_area_pool: vec![],
        };
        let root = world.add_area("Root");
        assert_eq!(root, ROOT_AREA);
        world
    }

    pub fn add_area(&mut self, name: &str) -> AreaId {
        if let Some(&id) = self.area_index.get(name) {
            return id;
        }
        let id = self.areas.len();
        self.areas.push(Area {
            name: name.to_string(),
            ..Area::default()
        });
        self.area_index.insert(name.to_string(), id);
        id
    }

    pub fn area_id(&self, name: &str) -> Option<AreaId> {
        self.area_index.get(name).copied()
    }

    /// Creates a connected exit from `parent` to `connected`.
    pub fn add_exit(
        &mut self,
        parent: AreaId,
        connected: AreaId,
        requirement: Requirement,
    ) -> EntranceId {
        let id = self.entrances.len();
        let original_name = format!("{} -> {}", self.areas[parent].name, self.areas[connected].name);
        self.entrances.push(Entrance {
            parent_area: parent,
            connected_area: None,
            original_connected_area: connected,
            requirement,
            entrance_type: EntranceType::None,
            primary: false,
            shuffled: false,
            reverse: None,
            replaces: None,
            assumed: None,
            retired: false,
            original_name,
            metadata: EntranceMetadata::default(),
        });
        self.areas[parent].exits.push(id);
        self.connect(id, connected);
        id
    }

    pub fn add_location(
        &mut self,
        name: &str,
        area: AreaId,
        requirement: Requirement,
        categories: HashSet<LocationCategory>,
        original_item: Option<Item>,
    ) -> LocationId {
        let id = self.locations.len();
        self.locations.push(Location {
            name: name.to_string(),
            area,
            requirement,
            original_item,
            current_item: None,
            progression: true,
            race_mode: false,
            known_vanilla: false,
            categories,
            dungeon: self.areas[area].dungeon,
        });
        self.areas[area].locations.push(id);
        self.location_index.insert(name.to_string(), id);
        id
    }

    /// Non-retired entrance lookup; `None` once the slot has been retired.
    pub fn entrance(&self, id: EntranceId) -> Option<&Entrance> {
        let e = &self.entrances[id];
        if e.retired { None } else { Some(e) }
    }

    /// Finds the entrance whose original connection was `parent -> connected`.
    pub fn get_entrance(&self, parent: &str, connected: &str) -> Option<EntranceId> {
        let parent_id = self.area_id(parent)?;
        let connected_id = self.area_id(connected)?;
        self.areas[parent_id]
            .exits
            .iter()
            .copied()
            .find(|&e| {
                !self.entrances[e].retired
                    && self.entrances[e].original_connected_area == connected_id
            })
    }

    pub fn connect(&mut self, entrance: EntranceId, area: AreaId) {
        debug_assert!(self.entrances[entrance].connected_area.is_none());
        self.entrances[entrance].connected_area = Some(area);
        self.areas[area].entrances.push(entrance);
    }

    /// Unhooks the entrance from its connected area and returns that area.
    /// The entrance then reads as an open placement target.
    pub fn disconnect(&mut self, entrance: EntranceId) -> AreaId {
        let area = self.entrances[entrance]
            .connected_area
            .take()
            .expect("disconnect on an already-disconnected entrance");
        self.areas[area].entrances.retain(|&e| e != entrance);
        area
    }

    pub fn bind_two_way(&mut self, a: EntranceId, b: EntranceId) {
        self.entrances[a].reverse = Some(b);
        self.entrances[b].reverse = Some(a);
    }

    /// Creates a target entrance connected from Root to this entrance's
    /// current connected area, recording which real entrance it stands for.
    pub fn new_target(&mut self, entrance: EntranceId) -> EntranceId {
        let connected = self.entrances[entrance]
            .connected_area
            .expect("new_target on a disconnected entrance");
        let id = self.entrances.len();
        let original_name = format!("Root -> {}", self.areas[connected].name);
        self.entrances.push(Entrance {
            parent_area: ROOT_AREA,
            connected_area: None,
            original_connected_area: connected,
            requirement: Requirement::Nothing,
            entrance_type: EntranceType::None,
            primary: false,
            shuffled: false,
            reverse: None,
            replaces: Some(entrance),
            assumed: None,
            retired: false,
            original_name,
            metadata: EntranceMetadata::default(),
        });
        self.areas[ROOT_AREA].exits.push(id);
        self.connect(id, connected);
        id
    }

    /// Disconnects the entrance, leaving behind a Root-connected stand-in so
    /// its original destination stays trivially reachable during shuffling.
    pub fn assume_reachable(&mut self, entrance: EntranceId) -> EntranceId {
        if self.entrances[entrance].assumed.is_none() {
            let target = self.new_target(entrance);
            self.entrances[entrance].assumed = Some(target);
            self.disconnect(entrance);
        }
        self.entrances[entrance].assumed.unwrap()
    }

    /// Retires an arena slot: detaches it from its parent's exit list and
    /// marks it so handle lookups fail from now on.
    pub fn remove_entrance(&mut self, entrance: EntranceId) {
        let parent = self.entrances[entrance].parent_area;
        self.areas[parent].exits.retain(|&e| e != entrance);
        self.entrances[entrance].retired = true;
    }

    pub fn get_shuffleable_entrances(
        &self,
        entrance_type: EntranceType,
        only_primary: bool,
    ) -> Vec<EntranceId> {
        (0..self.entrances.len())
            .filter(|&e| {
                let entrance = &self.entrances[e];
                !entrance.retired
                    && entrance.entrance_type == entrance_type
                    && (!only_primary || entrance.primary)
            })
            .collect()
    }

    pub fn progression_locations(&self) -> Vec<LocationId> {
        (0..self.locations.len())
            .filter(|&l| self.locations[l].progression)
            .collect()
    }

    /// Recomputes the progression flag from each location's categories and
    /// the world's settings. A location qualifies only if every category it
    /// carries is enabled, unless it is tagged AlwaysProgression.
    pub fn determine_progression_locations(&mut self) {
        let enabled: HashSet<LocationCategory> = self
            .settings
            .progression_categories
            .iter()
            .copied()
            .collect();
        for location in &mut self.locations {
            if location.categories.contains(&LocationCategory::AlwaysProgression) {
                location.progression = true;
                continue;
            }
            location.progression = location
                .categories
                .iter()
                .all(|category| enabled.contains(category));
        }
    }

    /// Restricts dungeon progression to `race_mode_dungeons` randomly chosen
    /// dungeons; locations of the remaining dungeons are demoted.
    pub fn set_race_mode_dungeons(&mut self, chosen: &[DungeonId]) {
        for d in 0..self.dungeons.len() {
            let selected = chosen.contains(&d);
            self.dungeons[d].race_mode = selected;
            for &l in &self.dungeons[d].locations.clone() {
                self.locations[l].race_mode = selected;
                if !selected {
                    self.locations[l].progression = false;
                }
            }
        }
    }

    /// Clears every location assignment made by fill, keeping vanilla,
    /// plandomized and victory placements.
    pub fn clear(&mut self) {
        for location in &mut self.locations {
            if !location.known_vanilla {
                location.current_item = None;
            }
        }
    }

    pub fn location_name(&self, id: LocationId) -> &str {
        &self.locations[id].name
    }

    pub fn area_name(&self, id: AreaId) -> &str {
        &self.areas[id].name
    }

    pub fn item_name(&self, item: Item) -> &str {
        self.catalog.name(item.game_item_id)
    }
}
