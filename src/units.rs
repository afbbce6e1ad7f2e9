//! Unit and building reference table.
//!
//! Maps unit type ids to names and supply figures. Supply is counted in
//! whole supply (a zergling pair is one). Buildings cost no supply; some
//! provide it.

use crate::header::Race;

/// Static facts about a unit or building type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitInfo {
    /// Unit type id.
    pub id: u16,
    /// Display name.
    pub name: &'static str,
    /// Owning race.
    pub race: Race,
    /// Supply used once built.
    pub supply_cost: u32,
    /// Supply cap added once built.
    pub supply_provided: u32,
}

const fn unit(id: u16, name: &'static str, race: Race, supply_cost: u32) -> UnitInfo {
    UnitInfo {
        id,
        name,
        race,
        supply_cost,
        supply_provided: 0,
    }
}

const fn building(id: u16, name: &'static str, race: Race, supply_provided: u32) -> UnitInfo {
    UnitInfo {
        id,
        name,
        race,
        supply_cost: 0,
        supply_provided,
    }
}

const T: Race = Race::Terran;
const Z: Race = Race::Zerg;
const P: Race = Race::Protoss;

/// Known unit types, sorted by id.
pub static UNITS: &[UnitInfo] = &[
    unit(0, "Marine", T, 1),
    unit(1, "Ghost", T, 1),
    unit(2, "Vulture", T, 2),
    unit(3, "Goliath", T, 2),
    unit(5, "Siege Tank", T, 2),
    unit(7, "SCV", T, 1),
    unit(8, "Wraith", T, 2),
    unit(9, "Science Vessel", T, 2),
    unit(11, "Dropship", T, 2),
    unit(12, "Battlecruiser", T, 6),
    unit(32, "Firebat", T, 1),
    unit(34, "Medic", T, 1),
    unit(37, "Zergling", Z, 1),
    unit(38, "Hydralisk", Z, 1),
    unit(39, "Ultralisk", Z, 4),
    unit(41, "Drone", Z, 1),
    UnitInfo {
        id: 42,
        name: "Overlord",
        race: Z,
        supply_cost: 0,
        supply_provided: 8,
    },
    unit(43, "Mutalisk", Z, 2),
    unit(45, "Queen", Z, 2),
    unit(46, "Defiler", Z, 2),
    unit(47, "Scourge", Z, 1),
    unit(58, "Valkyrie", T, 3),
    unit(60, "Corsair", P, 2),
    unit(61, "Dark Templar", P, 2),
    unit(62, "Devourer", Z, 2),
    unit(63, "Dark Archon", P, 4),
    unit(64, "Probe", P, 1),
    unit(65, "Zealot", P, 2),
    unit(66, "Dragoon", P, 2),
    unit(67, "High Templar", P, 2),
    unit(68, "Archon", P, 4),
    unit(69, "Shuttle", P, 2),
    unit(70, "Scout", P, 3),
    unit(71, "Arbiter", P, 4),
    unit(72, "Carrier", P, 6),
    unit(83, "Reaver", P, 4),
    unit(84, "Observer", P, 1),
    unit(103, "Lurker", Z, 2),
    building(106, "Command Center", T, 10),
    building(107, "Comsat Station", T, 0),
    building(108, "Nuclear Silo", T, 0),
    building(109, "Supply Depot", T, 8),
    building(110, "Refinery", T, 0),
    building(111, "Barracks", T, 0),
    building(112, "Academy", T, 0),
    building(113, "Factory", T, 0),
    building(114, "Starport", T, 0),
    building(115, "Control Tower", T, 0),
    building(116, "Science Facility", T, 0),
    building(117, "Covert Ops", T, 0),
    building(118, "Physics Lab", T, 0),
    building(120, "Machine Shop", T, 0),
    building(122, "Engineering Bay", T, 0),
    building(123, "Armory", T, 0),
    building(124, "Missile Turret", T, 0),
    building(125, "Bunker", T, 0),
    building(131, "Hatchery", Z, 1),
    building(132, "Lair", Z, 0),
    building(133, "Hive", Z, 0),
    building(134, "Nydus Canal", Z, 0),
    building(135, "Hydralisk Den", Z, 0),
    building(136, "Defiler Mound", Z, 0),
    building(137, "Greater Spire", Z, 0),
    building(138, "Queen's Nest", Z, 0),
    building(139, "Evolution Chamber", Z, 0),
    building(140, "Ultralisk Cavern", Z, 0),
    building(141, "Spire", Z, 0),
    building(142, "Spawning Pool", Z, 0),
    building(143, "Creep Colony", Z, 0),
    building(144, "Spore Colony", Z, 0),
    building(146, "Sunken Colony", Z, 0),
    building(149, "Extractor", Z, 0),
    building(154, "Nexus", P, 9),
    building(155, "Robotics Facility", P, 0),
    building(156, "Pylon", P, 8),
    building(157, "Assimilator", P, 0),
    building(159, "Observatory", P, 0),
    building(160, "Gateway", P, 0),
    building(162, "Photon Cannon", P, 0),
    building(163, "Citadel of Adun", P, 0),
    building(164, "Cybernetics Core", P, 0),
    building(165, "Templar Archives", P, 0),
    building(166, "Forge", P, 0),
    building(167, "Stargate", P, 0),
    building(169, "Fleet Beacon", P, 0),
    building(170, "Arbiter Tribunal", P, 0),
    building(171, "Robotics Support Bay", P, 0),
    building(172, "Shield Battery", P, 0),
];

/// Looks up a unit type.
///
/// # Example
///
/// ```
/// use rep_parser::units::lookup;
///
/// assert_eq!(lookup(65).map(|u| u.name), Some("Zealot"));
/// assert!(lookup(4).is_none());
/// ```
#[must_use]
pub fn lookup(id: u16) -> Option<&'static UnitInfo> {
    UNITS
        .binary_search_by_key(&id, |u| u.id)
        .ok()
        .map(|index| &UNITS[index])
}

/// Returns the display name for a unit type, or `"Unknown (id)"`.
#[must_use]
pub fn unit_name(id: u16) -> String {
    lookup(id).map_or_else(|| format!("Unknown ({id})"), |u| u.name.to_string())
}

/// Supply cap a player of the given race starts with.
#[must_use]
pub fn starting_supply_cap(race: Race) -> u32 {
    match race {
        Race::Protoss | Race::Zerg => 9,
        Race::Terran | Race::Random | Race::Invalid => 10,
    }
}
