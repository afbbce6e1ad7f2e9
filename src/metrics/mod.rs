//! Metrics derived from the decoded header and command timeline.
//!
//! Everything here is a pure function of the header, the commands, the
//! frame rate, and [`MetricsConfig`]. Nothing is cached.
//!
//! - **APM**: game actions per game minute
//! - **EAPM**: the same, leaving out selection changes and plain right clicks
//! - **Build orders**: see [`build_order`]
//! - **Command count check**: see [`quality`]
//!
//! # Example
//!
//! ```
//! use rep_parser::commands::{Command, CommandParams, Opcode};
//! use rep_parser::metrics::compute_player_metrics;
//! # use rep_parser::header::{HeaderLayout, ReplayHeader};
//! # let mut stream = vec![0u8; 0x311];
//! # stream[0x04..0x08].copy_from_slice(&1440u32.to_le_bytes());
//! # stream[0x161..0x166].copy_from_slice(b"Flash");
//! # let header = ReplayHeader::decode(&stream, &HeaderLayout::NOMINAL).unwrap();
//!
//! let stop = Command {
//!     frame: 100,
//!     player_id: 0,
//!     opcode: Opcode::Stop,
//!     params: CommandParams::default(),
//! };
//!
//! // One minute at 24 fps, two actions
//! let metrics = compute_player_metrics(&header, &[stop, stop], 24.0);
//! assert!((metrics[0].apm - 2.0).abs() < 1e-9);
//! assert_eq!(metrics[0].per_minute, vec![2]);
//! ```

pub mod build_order;
pub mod quality;

pub use build_order::{build_orders, BuildCategory, BuildOrder, BuildOrderEntry};
pub use quality::{
    assess_command_count, CommandCountAssessment, CommandCountCheck, QualityFlags,
};

use serde::Serialize;

use crate::commands::Command;
use crate::config::MetricsConfig;
use crate::header::ReplayHeader;

/// Activity figures for one player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerMetrics {
    /// Dense player id.
    pub player_id: u8,
    /// Player name.
    pub name: String,
    /// Actions per minute.
    pub apm: f64,
    /// Effective actions per minute.
    pub eapm: f64,
    /// Game actions issued.
    pub total_actions: u32,
    /// Game actions counted towards EAPM.
    pub effective_actions: u32,
    /// Game actions in each started game minute.
    pub per_minute: Vec<u32>,
}

/// All metrics for a replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsReport {
    /// Game length in minutes.
    pub game_minutes: f64,
    /// Per-player activity, in player id order.
    pub players: Vec<PlayerMetrics>,
    /// Per-player build orders, in player id order.
    pub build_orders: Vec<BuildOrder>,
}

/// Returns the game length in minutes.
#[must_use]
pub fn game_minutes(frame_count: u32, fps: f64) -> f64 {
    if fps <= 0.0 {
        return 0.0;
    }
    f64::from(frame_count) / fps / 60.0
}

/// Computes APM, EAPM and per-minute activity for every active player.
///
/// Commands whose player id is not an active player are ignored. A game
/// of zero length yields zero APM and EAPM.
#[must_use]
pub fn compute_player_metrics(
    header: &ReplayHeader,
    commands: &[Command],
    fps: f64,
) -> Vec<PlayerMetrics> {
    let minutes = game_minutes(header.frame_count, fps);
    let buckets = minutes.ceil() as usize;

    let mut metrics: Vec<PlayerMetrics> = header
        .players
        .iter()
        .map(|player| PlayerMetrics {
            player_id: player.player_id,
            name: player.name.clone(),
            apm: 0.0,
            eapm: 0.0,
            total_actions: 0,
            effective_actions: 0,
            per_minute: vec![0; buckets],
        })
        .collect();

    for command in commands.iter().filter(|c| c.is_game_action()) {
        let Some(player) = metrics.get_mut(usize::from(command.player_id)) else {
            continue;
        };

        player.total_actions += 1;
        if command.is_effective_action() {
            player.effective_actions += 1;
        }
        if buckets > 0 {
            let minute = (f64::from(command.frame) / fps / 60.0) as usize;
            player.per_minute[minute.min(buckets - 1)] += 1;
        }
    }

    if minutes > 0.0 {
        for player in &mut metrics {
            player.apm = f64::from(player.total_actions) / minutes;
            player.eapm = f64::from(player.effective_actions) / minutes;
        }
    }

    metrics
}

/// Runs the whole metrics engine.
#[must_use]
pub fn compute_metrics(
    header: &ReplayHeader,
    commands: &[Command],
    fps: f64,
    config: &MetricsConfig,
) -> MetricsReport {
    MetricsReport {
        game_minutes: game_minutes(header.frame_count, fps),
        players: compute_player_metrics(header, commands, fps),
        build_orders: build_orders(header, commands, fps, config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{CommandParams, Opcode};
    use crate::header::{HeaderLayout, ReplayHeader};

    fn header(frames: u32, names: &[&str]) -> ReplayHeader {
        let mut stream = vec![0u8; HeaderLayout::NOMINAL.required_len()];
        stream[0x04..0x08].copy_from_slice(&frames.to_le_bytes());
        for (slot, name) in names.iter().enumerate() {
            let base = 0x161 + slot * 36;
            stream[base..base + name.len()].copy_from_slice(name.as_bytes());
        }
        ReplayHeader::decode(&stream, &HeaderLayout::NOMINAL).unwrap()
    }

    fn cmd(frame: u32, player_id: u8, opcode: Opcode) -> Command {
        Command {
            frame,
            player_id,
            opcode,
            params: CommandParams::default(),
        }
    }

    #[test]
    fn test_game_minutes() {
        assert!((game_minutes(1440, 24.0) - 1.0).abs() < 1e-12);
        assert!((game_minutes(1440, 0.0)).abs() < 1e-12);
    }

    #[test]
    fn test_apm_one_minute() {
        let header = header(1440, &["Flash"]);
        let commands: Vec<Command> = (0..120).map(|i| cmd(i * 12, 0, Opcode::Stop)).collect();

        let metrics = compute_player_metrics(&header, &commands, 24.0);
        assert_eq!(metrics.len(), 1);
        assert!((metrics[0].apm - 120.0).abs() < 1e-9);
        assert!((metrics[0].eapm - 120.0).abs() < 1e-9);
        assert_eq!(metrics[0].per_minute, vec![120]);
        assert_eq!(metrics[0].name, "Flash");
    }

    #[test]
    fn test_eapm_excludes_selection_and_moves() {
        let header = header(2880, &["Flash"]);
        let commands = vec![
            cmd(10, 0, Opcode::Select),
            cmd(11, 0, Opcode::RightClick),
            cmd(12, 0, Opcode::ShiftSelect),
            cmd(13, 0, Opcode::Train),
            cmd(14, 0, Opcode::TargetedOrder),
        ];

        let metrics = compute_player_metrics(&header, &commands, 24.0);
        assert_eq!(metrics[0].total_actions, 5);
        assert_eq!(metrics[0].effective_actions, 2);
        assert!((metrics[0].apm - 2.5).abs() < 1e-9);
        assert!((metrics[0].eapm - 1.0).abs() < 1e-9);
        assert!(metrics[0].eapm <= metrics[0].apm);
    }

    #[test]
    fn test_non_game_actions_and_unknown_players_ignored() {
        let header = header(1440, &["Flash", "Jaedong"]);
        let commands = vec![
            cmd(0, 0, Opcode::KeepAlive),
            cmd(0, 0, Opcode::Chat),
            cmd(0, 1, Opcode::Hotkey),
            cmd(0, 2, Opcode::Hotkey),
            cmd(0, 7, Opcode::Build),
        ];

        let metrics = compute_player_metrics(&header, &commands, 24.0);
        assert_eq!(metrics[0].total_actions, 0);
        assert_eq!(metrics[1].total_actions, 1);
    }

    #[test]
    fn test_per_minute_buckets() {
        // 2.5 minutes at 24 fps: three started minutes
        let header = header(3600, &["Flash"]);
        let commands = vec![
            cmd(0, 0, Opcode::Stop),
            cmd(1439, 0, Opcode::Stop),
            cmd(1440, 0, Opcode::Stop),
            cmd(3000, 0, Opcode::Stop),
            cmd(3600, 0, Opcode::Stop),
        ];

        let metrics = compute_player_metrics(&header, &commands, 24.0);
        assert_eq!(metrics[0].per_minute, vec![2, 1, 2]);
    }

    #[test]
    fn test_zero_length_game() {
        let mut header = header(1440, &["Flash"]);
        header.frame_count = 0;
        let commands = vec![cmd(0, 0, Opcode::Stop)];

        let metrics = compute_player_metrics(&header, &commands, 24.0);
        assert_eq!(metrics[0].total_actions, 1);
        assert!(metrics[0].apm.abs() < f64::EPSILON);
        assert!(metrics[0].eapm.abs() < f64::EPSILON);
        assert!(metrics[0].per_minute.is_empty());
    }

    #[test]
    fn test_compute_metrics_report() {
        let header = header(1440, &["Flash", "Jaedong"]);
        let commands = vec![cmd(0, 0, Opcode::Stop)];

        let report = compute_metrics(&header, &commands, 24.0, &MetricsConfig::default());
        assert_eq!(report.players.len(), 2);
        assert_eq!(report.build_orders.len(), 2);
        assert!((report.game_minutes - 1.0).abs() < 1e-12);
    }
}
