//! Build order extraction.
//!
//! A build order is the time-ordered list of a player's construction,
//! training, morphing and research commands, with a running supply
//! estimate. Supply is only estimated: deaths and cancellations are not
//! tracked, so the figure is the supply the player would have reached had
//! everything finished.

use std::fmt;

use serde::Serialize;

use crate::commands::{Category, Command};
use crate::config::MetricsConfig;
use crate::header::{PlayerSlot, ReplayHeader};
use crate::units::{self, UnitInfo};

/// Kind of build order entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BuildCategory {
    /// Building placed or morphed.
    Build,
    /// Unit trained or morphed.
    Train,
    /// Tech researched.
    Tech,
    /// Upgrade researched.
    Upgrade,
}

impl BuildCategory {
    /// Maps a command category to a build order category.
    #[must_use]
    pub fn from_category(category: Category) -> Option<Self> {
        match category {
            Category::Build | Category::BuildingMorph => Some(Self::Build),
            Category::Train | Category::Morph => Some(Self::Train),
            Category::Tech => Some(Self::Tech),
            Category::Upgrade => Some(Self::Upgrade),
            _ => None,
        }
    }
}

impl fmt::Display for BuildCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Build => "Build",
            Self::Train => "Train",
            Self::Tech => "Tech",
            Self::Upgrade => "Upgrade",
        };
        f.pad(name)
    }
}

/// One line of a build order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildOrderEntry {
    /// Frame the command was issued on.
    pub frame: u32,
    /// Game time as `mm:ss`.
    pub timestamp: String,
    /// What was built or researched.
    pub unit_name: String,
    /// Kind of entry.
    pub category: BuildCategory,
    /// Estimated supply in use when the command was issued.
    pub supply_estimate: u32,
}

/// The build order of one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildOrder {
    /// Dense player id.
    pub player_id: u8,
    /// Entries in frame order.
    pub entries: Vec<BuildOrderEntry>,
}

/// Formats a frame number as `mm:ss` game time.
///
/// Minutes are not wrapped into hours.
///
/// # Example
///
/// ```
/// use rep_parser::metrics::build_order::format_timestamp;
///
/// assert_eq!(format_timestamp(0, 24.0), "00:00");
/// assert_eq!(format_timestamp(1500, 24.0), "01:02");
/// assert_eq!(format_timestamp(24 * 3700, 24.0), "61:40");
/// ```
#[must_use]
pub fn format_timestamp(frame: u32, fps: f64) -> String {
    let seconds = if fps > 0.0 {
        (f64::from(frame) / fps).floor() as u64
    } else {
        0
    };
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Running supply figures for one player.
#[derive(Debug, Clone, Copy)]
struct SupplyTracker {
    used: u32,
    cap: u32,
    min: u32,
    max: u32,
}

impl SupplyTracker {
    fn new(player: &PlayerSlot, config: &MetricsConfig) -> Self {
        Self {
            used: config.min_supply,
            cap: units::starting_supply_cap(player.race),
            min: config.min_supply,
            max: config.max_supply,
        }
    }

    fn estimate(&self) -> u32 {
        self.used.min(self.cap).max(self.min).min(self.max)
    }

    fn add(&mut self, unit: &UnitInfo) {
        self.used = self.used.saturating_add(unit.supply_cost);
        self.cap = self.cap.saturating_add(unit.supply_provided);
    }
}

/// Extracts the build order of a single player.
#[must_use]
pub fn player_build_order(
    player: &PlayerSlot,
    commands: &[Command],
    fps: f64,
    config: &MetricsConfig,
) -> Vec<BuildOrderEntry> {
    let mut items: Vec<(&Command, BuildCategory)> = commands
        .iter()
        .filter(|c| c.player_id == player.player_id)
        .filter_map(|c| BuildCategory::from_category(c.category()).map(|cat| (c, cat)))
        .collect();
    items.sort_by_key(|(c, _)| c.frame);

    let mut supply = SupplyTracker::new(player, config);
    let mut entries = Vec::new();

    for (command, category) in items {
        if entries.len() >= config.build_order_limit {
            break;
        }

        let (unit_name, unit) = match category {
            BuildCategory::Build | BuildCategory::Train => match command.params.unit_type {
                Some(id) => (units::unit_name(id), units::lookup(id)),
                None => continue,
            },
            BuildCategory::Tech => match command.params.research_id {
                Some(id) => (format!("Tech #{id}"), None),
                None => continue,
            },
            BuildCategory::Upgrade => match command.params.research_id {
                Some(id) => (format!("Upgrade #{id}"), None),
                None => continue,
            },
        };

        entries.push(BuildOrderEntry {
            frame: command.frame,
            timestamp: format_timestamp(command.frame, fps),
            unit_name,
            category,
            supply_estimate: supply.estimate(),
        });

        if let Some(unit) = unit {
            supply.add(unit);
        }
    }

    entries
}

/// Extracts the build order of every active player, in player id order.
#[must_use]
pub fn build_orders(
    header: &ReplayHeader,
    commands: &[Command],
    fps: f64,
    config: &MetricsConfig,
) -> Vec<BuildOrder> {
    header
        .players
        .iter()
        .map(|player| BuildOrder {
            player_id: player.player_id,
            entries: player_build_order(player, commands, fps, config),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{CommandParams, Opcode};
    use crate::header::Race;

    fn player(race: Race) -> PlayerSlot {
        PlayerSlot {
            player_id: 0,
            slot_index: 0,
            name: "Flash".to_string(),
            race,
            team: 1,
            color: 0,
        }
    }

    fn unit_command(frame: u32, opcode: Opcode, unit_type: u16) -> Command {
        Command {
            frame,
            player_id: 0,
            opcode,
            params: CommandParams {
                unit_type: Some(unit_type),
                ..CommandParams::default()
            },
        }
    }

    fn default_order(race: Race, commands: &[Command]) -> Vec<BuildOrderEntry> {
        player_build_order(&player(race), commands, 24.0, &MetricsConfig::default())
    }

    fn research_command(frame: u32, opcode: Opcode, id: u8) -> Command {
        Command {
            frame,
            player_id: 0,
            opcode,
            params: CommandParams {
                research_id: Some(id),
                ..CommandParams::default()
            },
        }
    }

    // ========================================================================
    // Categories and timestamps
    // ========================================================================

    #[test]
    fn test_category_mapping() {
        assert_eq!(BuildCategory::from_category(Category::Build), Some(BuildCategory::Build));
        assert_eq!(
            BuildCategory::from_category(Category::BuildingMorph),
            Some(BuildCategory::Build)
        );
        assert_eq!(BuildCategory::from_category(Category::Morph), Some(BuildCategory::Train));
        assert_eq!(BuildCategory::from_category(Category::Upgrade), Some(BuildCategory::Upgrade));
        assert_eq!(BuildCategory::from_category(Category::Hotkey), None);
        assert_eq!(BuildCategory::from_category(Category::Cancel), None);
    }

    #[test]
    fn test_timestamp() {
        assert_eq!(format_timestamp(23, 24.0), "00:00");
        assert_eq!(format_timestamp(24, 24.0), "00:01");
        assert_eq!(format_timestamp(1440, 24.0), "01:00");
        assert_eq!(format_timestamp(100, 0.0), "00:00");
    }

    // ========================================================================
    // Build order extraction
    // ========================================================================

    #[test]
    fn test_terran_opening() {
        let commands = vec![
            unit_command(10, Opcode::Train, 7),
            unit_command(300, Opcode::Train, 7),
            unit_command(600, Opcode::Build, 109),
            unit_command(900, Opcode::Train, 7),
            unit_command(1200, Opcode::Build, 111),
            research_command(1500, Opcode::Upgrade, 3),
            research_command(1600, Opcode::Tech, 0),
        ];

        let entries = default_order(Race::Terran, &commands);
        let names: Vec<&str> = entries.iter().map(|e| e.unit_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["SCV", "SCV", "Supply Depot", "SCV", "Barracks", "Upgrade #3", "Tech #0"]
        );

        let supply: Vec<u32> = entries.iter().map(|e| e.supply_estimate).collect();
        assert_eq!(supply, vec![4, 5, 6, 6, 7, 7, 7]);

        assert_eq!(entries[2].category, BuildCategory::Build);
        assert_eq!(entries[5].category, BuildCategory::Upgrade);
        assert_eq!(entries[6].category, BuildCategory::Tech);
        assert_eq!(entries[4].timestamp, "00:50");
    }

    #[test]
    fn test_supply_capped_by_providers() {
        // Protoss start at a cap of 9
        let mut commands: Vec<Command> = (0..8)
            .map(|i| unit_command(i * 10, Opcode::Train, 64))
            .collect();
        commands.push(unit_command(100, Opcode::Build, 156));
        commands.push(unit_command(110, Opcode::Train, 64));
        commands.push(unit_command(120, Opcode::Train, 64));

        let entries = default_order(Race::Protoss, &commands);
        let supply: Vec<u32> = entries.iter().map(|e| e.supply_estimate).collect();
        assert_eq!(supply, vec![4, 5, 6, 7, 8, 9, 9, 9, 9, 12, 13]);
        assert!(supply.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_unknown_unit_and_missing_fields() {
        let commands = vec![
            unit_command(10, Opcode::Train, 999),
            Command {
                frame: 20,
                player_id: 0,
                opcode: Opcode::TrainFighter,
                params: CommandParams::default(),
            },
        ];

        let entries = default_order(Race::Zerg, &commands);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].unit_name, "Unknown (999)");
    }

    #[test]
    fn test_stable_sort_and_other_players() {
        let mut other = unit_command(5, Opcode::Train, 7);
        other.player_id = 1;
        let commands = vec![
            unit_command(50, Opcode::Build, 111),
            other,
            unit_command(10, Opcode::Train, 7),
            unit_command(50, Opcode::Build, 109),
        ];

        let entries = default_order(Race::Terran, &commands);
        let names: Vec<&str> = entries.iter().map(|e| e.unit_name.as_str()).collect();
        assert_eq!(names, vec!["SCV", "Barracks", "Supply Depot"]);
    }

    #[test]
    fn test_truncated_to_limit() {
        let commands: Vec<Command> = (0..40)
            .map(|i| unit_command(i * 24, Opcode::Train, 41))
            .collect();

        let entries = default_order(Race::Zerg, &commands);
        assert_eq!(entries.len(), 25);
        assert_eq!(entries[24].frame, 24 * 24);

        let config = MetricsConfig {
            build_order_limit: 3,
            ..MetricsConfig::default()
        };
        assert_eq!(player_build_order(&player(Race::Zerg), &commands, 24.0, &config).len(), 3);
    }

    #[test]
    fn test_supply_bounded_above() {
        let mut commands: Vec<Command> = (0..30)
            .map(|i| unit_command(i, Opcode::Build, 109))
            .collect();
        commands.extend((30..60).map(|i| unit_command(i, Opcode::Train, 12)));
        let config = MetricsConfig {
            build_order_limit: 100,
            ..MetricsConfig::default()
        };

        let entries = player_build_order(&player(Race::Terran), &commands, 24.0, &config);
        assert_eq!(entries.last().map(|e| e.supply_estimate), Some(178));

        let config = MetricsConfig {
            max_supply: 100,
            ..config
        };
        let entries = player_build_order(&player(Race::Terran), &commands, 24.0, &config);
        assert!(entries.iter().all(|e| e.supply_estimate <= 100));
        assert_eq!(entries.last().map(|e| e.supply_estimate), Some(100));
    }
}
