//! Opcode definitions and per-engine opcode tables.
//!
//! Every command in the stream starts with an opcode byte followed by the
//! issuing player's id. Payload lengths below include both of those bytes.
//!
//! The set of valid opcodes depends on the engine revision: 1.21 clients
//! added wider variants of the selection and targeting commands. An
//! [`EngineProfile`] pairs the right [`OpcodeTable`] with the frame rate of
//! the format.

use std::fmt;

use serde::Serialize;

use crate::format::ReplayFormat;

/// Broad grouping of opcodes, used by the metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Category {
    /// Network bookkeeping (keep-alive, sync, leave).
    Network,
    /// Game-level commands (save, pause, alliance, ping).
    Game,
    /// Chat message.
    Chat,
    /// Replace the current selection.
    Select,
    /// Add to the current selection.
    ShiftSelect,
    /// Remove from the current selection.
    ShiftDeselect,
    /// Control group assign/recall.
    Hotkey,
    /// Right click.
    PlainMove,
    /// Targeted order.
    Order,
    /// Place a building.
    Build,
    /// Train a unit.
    Train,
    /// Morph a unit.
    Morph,
    /// Morph a building.
    BuildingMorph,
    /// Research a tech.
    Tech,
    /// Research an upgrade.
    Upgrade,
    /// Cancel something in progress.
    Cancel,
    /// Other unit commands (stop, siege, burrow, ...).
    Unit,
}

impl Category {
    /// Returns whether commands of this category only manage the selection
    /// or move units without a specific order.
    ///
    /// These are left out of effective APM.
    #[must_use]
    pub fn is_ineffective(&self) -> bool {
        matches!(
            self,
            Category::Select | Category::ShiftSelect | Category::ShiftDeselect | Category::PlainMove
        )
    }
}

/// How many bytes a command occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadLength {
    /// A fixed number of bytes.
    Fixed(usize),
    /// `3 + count * tag_size` bytes, with the count at offset 2.
    Selection {
        /// Size of each unit tag in bytes.
        tag_size: usize,
    },
}

impl PayloadLength {
    /// Resolves the length given the selection count, if any.
    #[must_use]
    pub fn resolve(&self, count: u8) -> usize {
        match self {
            PayloadLength::Fixed(len) => *len,
            PayloadLength::Selection { tag_size } => 3 + usize::from(count) * tag_size,
        }
    }
}

/// A known command opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[allow(missing_docs)]
pub enum Opcode {
    KeepAlive,
    SaveGame,
    LoadGame,
    RestartGame,
    Select,
    ShiftSelect,
    ShiftDeselect,
    Build,
    Vision,
    Alliance,
    GameSpeed,
    Pause,
    Resume,
    Cheat,
    Hotkey,
    RightClick,
    TargetedOrder,
    CancelBuild,
    CancelMorph,
    Stop,
    CarrierStop,
    ReaverStop,
    OrderNothing,
    ReturnCargo,
    Train,
    CancelTrain,
    Cloak,
    Decloak,
    UnitMorph,
    Unsiege,
    Siege,
    TrainFighter,
    UnloadAll,
    Unload,
    MergeArchon,
    HoldPosition,
    Burrow,
    Unburrow,
    CancelNuke,
    LiftOff,
    Tech,
    CancelTech,
    Upgrade,
    CancelUpgrade,
    CancelAddon,
    BuildingMorph,
    Stim,
    Sync,
    LeaveGame,
    MinimapPing,
    MergeDarkArchon,
    Chat,
    TargetedOrder121,
    RightClick121,
    Unload121,
    Select121,
    ShiftSelect121,
    ShiftDeselect121,
}

/// Static metadata for an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeInfo {
    /// The opcode byte.
    pub byte: u8,
    /// Display name.
    pub name: &'static str,
    /// Category.
    pub category: Category,
    /// Whether the command counts towards APM.
    pub game_action: bool,
    /// Length rule.
    pub length: PayloadLength,
}

const fn info(
    byte: u8,
    name: &'static str,
    category: Category,
    game_action: bool,
    length: PayloadLength,
) -> OpcodeInfo {
    OpcodeInfo {
        byte,
        name,
        category,
        game_action,
        length,
    }
}

const fn fixed(len: usize) -> PayloadLength {
    PayloadLength::Fixed(len)
}

const SELECTION: PayloadLength = PayloadLength::Selection { tag_size: 2 };
const SELECTION_121: PayloadLength = PayloadLength::Selection { tag_size: 4 };

impl Opcode {
    /// Every opcode, in byte order.
    pub const ALL: [Opcode; 58] = [
        Opcode::KeepAlive,
        Opcode::SaveGame,
        Opcode::LoadGame,
        Opcode::RestartGame,
        Opcode::Select,
        Opcode::ShiftSelect,
        Opcode::ShiftDeselect,
        Opcode::Build,
        Opcode::Vision,
        Opcode::Alliance,
        Opcode::GameSpeed,
        Opcode::Pause,
        Opcode::Resume,
        Opcode::Cheat,
        Opcode::Hotkey,
        Opcode::RightClick,
        Opcode::TargetedOrder,
        Opcode::CancelBuild,
        Opcode::CancelMorph,
        Opcode::Stop,
        Opcode::CarrierStop,
        Opcode::ReaverStop,
        Opcode::OrderNothing,
        Opcode::ReturnCargo,
        Opcode::Train,
        Opcode::CancelTrain,
        Opcode::Cloak,
        Opcode::Decloak,
        Opcode::UnitMorph,
        Opcode::Unsiege,
        Opcode::Siege,
        Opcode::TrainFighter,
        Opcode::UnloadAll,
        Opcode::Unload,
        Opcode::MergeArchon,
        Opcode::HoldPosition,
        Opcode::Burrow,
        Opcode::Unburrow,
        Opcode::CancelNuke,
        Opcode::LiftOff,
        Opcode::Tech,
        Opcode::CancelTech,
        Opcode::Upgrade,
        Opcode::CancelUpgrade,
        Opcode::CancelAddon,
        Opcode::BuildingMorph,
        Opcode::Stim,
        Opcode::Sync,
        Opcode::LeaveGame,
        Opcode::MinimapPing,
        Opcode::MergeDarkArchon,
        Opcode::Chat,
        Opcode::TargetedOrder121,
        Opcode::RightClick121,
        Opcode::Unload121,
        Opcode::Select121,
        Opcode::ShiftSelect121,
        Opcode::ShiftDeselect121,
    ];

    /// Maps a byte to its opcode, across all engine revisions.
    ///
    /// # Example
    ///
    /// ```
    /// use rep_parser::commands::Opcode;
    ///
    /// assert_eq!(Opcode::from_byte(0x0C), Some(Opcode::Build));
    /// assert_eq!(Opcode::from_byte(0x63), Some(Opcode::Select121));
    /// assert_eq!(Opcode::from_byte(0x24), None);
    /// ```
    #[must_use]
    pub fn from_byte(byte: u8) -> Option<Self> {
        let opcode = match byte {
            0x05 => Opcode::KeepAlive,
            0x06 => Opcode::SaveGame,
            0x07 => Opcode::LoadGame,
            0x08 => Opcode::RestartGame,
            0x09 => Opcode::Select,
            0x0A => Opcode::ShiftSelect,
            0x0B => Opcode::ShiftDeselect,
            0x0C => Opcode::Build,
            0x0D => Opcode::Vision,
            0x0E => Opcode::Alliance,
            0x0F => Opcode::GameSpeed,
            0x10 => Opcode::Pause,
            0x11 => Opcode::Resume,
            0x12 => Opcode::Cheat,
            0x13 => Opcode::Hotkey,
            0x14 => Opcode::RightClick,
            0x15 => Opcode::TargetedOrder,
            0x18 => Opcode::CancelBuild,
            0x19 => Opcode::CancelMorph,
            0x1A => Opcode::Stop,
            0x1B => Opcode::CarrierStop,
            0x1C => Opcode::ReaverStop,
            0x1D => Opcode::OrderNothing,
            0x1E => Opcode::ReturnCargo,
            0x1F => Opcode::Train,
            0x20 => Opcode::CancelTrain,
            0x21 => Opcode::Cloak,
            0x22 => Opcode::Decloak,
            0x23 => Opcode::UnitMorph,
            0x25 => Opcode::Unsiege,
            0x26 => Opcode::Siege,
            0x27 => Opcode::TrainFighter,
            0x28 => Opcode::UnloadAll,
            0x29 => Opcode::Unload,
            0x2A => Opcode::MergeArchon,
            0x2B => Opcode::HoldPosition,
            0x2C => Opcode::Burrow,
            0x2D => Opcode::Unburrow,
            0x2E => Opcode::CancelNuke,
            0x2F => Opcode::LiftOff,
            0x30 => Opcode::Tech,
            0x31 => Opcode::CancelTech,
            0x32 => Opcode::Upgrade,
            0x33 => Opcode::CancelUpgrade,
            0x34 => Opcode::CancelAddon,
            0x35 => Opcode::BuildingMorph,
            0x36 => Opcode::Stim,
            0x37 => Opcode::Sync,
            0x57 => Opcode::LeaveGame,
            0x58 => Opcode::MinimapPing,
            0x5A => Opcode::MergeDarkArchon,
            0x5C => Opcode::Chat,
            0x60 => Opcode::TargetedOrder121,
            0x61 => Opcode::RightClick121,
            0x62 => Opcode::Unload121,
            0x63 => Opcode::Select121,
            0x64 => Opcode::ShiftSelect121,
            0x65 => Opcode::ShiftDeselect121,
            _ => return None,
        };
        Some(opcode)
    }

    /// Returns the static metadata of this opcode.
    #[must_use]
    pub const fn info(&self) -> OpcodeInfo {
        use Category as C;

        match self {
            Opcode::KeepAlive => info(0x05, "Keep Alive", C::Network, false, fixed(2)),
            Opcode::SaveGame => info(0x06, "Save Game", C::Game, false, fixed(2)),
            Opcode::LoadGame => info(0x07, "Load Game", C::Game, false, fixed(2)),
            Opcode::RestartGame => info(0x08, "Restart Game", C::Game, false, fixed(2)),
            Opcode::Select => info(0x09, "Select", C::Select, true, SELECTION),
            Opcode::ShiftSelect => info(0x0A, "Shift Select", C::ShiftSelect, true, SELECTION),
            Opcode::ShiftDeselect => {
                info(0x0B, "Shift Deselect", C::ShiftDeselect, true, SELECTION)
            }
            Opcode::Build => info(0x0C, "Build", C::Build, true, fixed(8)),
            Opcode::Vision => info(0x0D, "Vision", C::Game, false, fixed(4)),
            Opcode::Alliance => info(0x0E, "Alliance", C::Game, false, fixed(6)),
            Opcode::GameSpeed => info(0x0F, "Game Speed", C::Game, false, fixed(3)),
            Opcode::Pause => info(0x10, "Pause", C::Game, false, fixed(2)),
            Opcode::Resume => info(0x11, "Resume", C::Game, false, fixed(2)),
            Opcode::Cheat => info(0x12, "Cheat", C::Game, false, fixed(6)),
            Opcode::Hotkey => info(0x13, "Hotkey", C::Hotkey, true, fixed(4)),
            Opcode::RightClick => info(0x14, "Right Click", C::PlainMove, true, fixed(11)),
            Opcode::TargetedOrder => info(0x15, "Targeted Order", C::Order, true, fixed(12)),
            Opcode::CancelBuild => info(0x18, "Cancel Build", C::Cancel, true, fixed(2)),
            Opcode::CancelMorph => info(0x19, "Cancel Morph", C::Cancel, true, fixed(2)),
            Opcode::Stop => info(0x1A, "Stop", C::Unit, true, fixed(3)),
            Opcode::CarrierStop => info(0x1B, "Carrier Stop", C::Unit, true, fixed(2)),
            Opcode::ReaverStop => info(0x1C, "Reaver Stop", C::Unit, true, fixed(2)),
            Opcode::OrderNothing => info(0x1D, "Order Nothing", C::Unit, true, fixed(2)),
            Opcode::ReturnCargo => info(0x1E, "Return Cargo", C::Unit, true, fixed(3)),
            Opcode::Train => info(0x1F, "Train", C::Train, true, fixed(4)),
            Opcode::CancelTrain => info(0x20, "Cancel Train", C::Cancel, true, fixed(4)),
            Opcode::Cloak => info(0x21, "Cloak", C::Unit, true, fixed(3)),
            Opcode::Decloak => info(0x22, "Decloak", C::Unit, true, fixed(3)),
            Opcode::UnitMorph => info(0x23, "Unit Morph", C::Morph, true, fixed(4)),
            Opcode::Unsiege => info(0x25, "Unsiege", C::Unit, true, fixed(3)),
            Opcode::Siege => info(0x26, "Siege", C::Unit, true, fixed(3)),
            Opcode::TrainFighter => info(0x27, "Train Fighter", C::Train, true, fixed(2)),
            Opcode::UnloadAll => info(0x28, "Unload All", C::Unit, true, fixed(3)),
            Opcode::Unload => info(0x29, "Unload", C::Unit, true, fixed(4)),
            Opcode::MergeArchon => info(0x2A, "Merge Archon", C::Unit, true, fixed(2)),
            Opcode::HoldPosition => info(0x2B, "Hold Position", C::Unit, true, fixed(3)),
            Opcode::Burrow => info(0x2C, "Burrow", C::Unit, true, fixed(3)),
            Opcode::Unburrow => info(0x2D, "Unburrow", C::Unit, true, fixed(3)),
            Opcode::CancelNuke => info(0x2E, "Cancel Nuke", C::Cancel, true, fixed(2)),
            Opcode::LiftOff => info(0x2F, "Lift Off", C::Unit, true, fixed(6)),
            Opcode::Tech => info(0x30, "Tech", C::Tech, true, fixed(3)),
            Opcode::CancelTech => info(0x31, "Cancel Tech", C::Cancel, true, fixed(2)),
            Opcode::Upgrade => info(0x32, "Upgrade", C::Upgrade, true, fixed(3)),
            Opcode::CancelUpgrade => info(0x33, "Cancel Upgrade", C::Cancel, true, fixed(2)),
            Opcode::CancelAddon => info(0x34, "Cancel Addon", C::Cancel, true, fixed(2)),
            Opcode::BuildingMorph => {
                info(0x35, "Building Morph", C::BuildingMorph, true, fixed(4))
            }
            Opcode::Stim => info(0x36, "Stim", C::Unit, true, fixed(2)),
            Opcode::Sync => info(0x37, "Sync", C::Network, false, fixed(8)),
            Opcode::LeaveGame => info(0x57, "Leave Game", C::Network, false, fixed(3)),
            Opcode::MinimapPing => info(0x58, "Minimap Ping", C::Game, false, fixed(6)),
            Opcode::MergeDarkArchon => {
                info(0x5A, "Merge Dark Archon", C::Unit, true, fixed(2))
            }
            Opcode::Chat => info(0x5C, "Chat", C::Chat, false, fixed(83)),
            Opcode::TargetedOrder121 => {
                info(0x60, "Targeted Order", C::Order, true, fixed(14))
            }
            Opcode::RightClick121 => info(0x61, "Right Click", C::PlainMove, true, fixed(13)),
            Opcode::Unload121 => info(0x62, "Unload", C::Unit, true, fixed(6)),
            Opcode::Select121 => info(0x63, "Select", C::Select, true, SELECTION_121),
            Opcode::ShiftSelect121 => {
                info(0x64, "Shift Select", C::ShiftSelect, true, SELECTION_121)
            }
            Opcode::ShiftDeselect121 => {
                info(0x65, "Shift Deselect", C::ShiftDeselect, true, SELECTION_121)
            }
        }
    }

    /// Returns the opcode byte.
    #[must_use]
    pub const fn byte(&self) -> u8 {
        self.info().byte
    }

    /// Returns the display name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.info().name
    }

    /// Returns the category.
    #[must_use]
    pub const fn category(&self) -> Category {
        self.info().category
    }

    /// Returns whether the command counts towards APM.
    #[must_use]
    pub const fn is_game_action(&self) -> bool {
        self.info().game_action
    }

    /// Returns the length rule.
    #[must_use]
    pub const fn payload_length(&self) -> PayloadLength {
        self.info().length
    }

    /// Returns whether the opcode only exists in 1.21+ streams.
    #[must_use]
    pub const fn is_extended(&self) -> bool {
        self.byte() >= 0x60
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.name(), self.byte())
    }
}

/// A 256-entry lookup table from byte to opcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpcodeTable {
    entries: [Option<Opcode>; 256],
}

impl OpcodeTable {
    /// Builds a table containing the given opcodes.
    #[must_use]
    pub fn from_opcodes(opcodes: impl IntoIterator<Item = Opcode>) -> Self {
        let mut entries = [None; 256];
        for opcode in opcodes {
            entries[usize::from(opcode.byte())] = Some(opcode);
        }
        Self { entries }
    }

    /// The opcode set of pre-1.21 streams.
    #[must_use]
    pub fn standard() -> Self {
        Self::from_opcodes(Opcode::ALL.into_iter().filter(|op| !op.is_extended()))
    }

    /// The opcode set of 1.21+ streams.
    #[must_use]
    pub fn extended() -> Self {
        Self::from_opcodes(Opcode::ALL)
    }

    /// Looks up a byte.
    #[must_use]
    pub fn lookup(&self, byte: u8) -> Option<Opcode> {
        self.entries[usize::from(byte)]
    }

    /// Returns whether the byte is a known opcode in this table.
    #[must_use]
    pub fn contains(&self, byte: u8) -> bool {
        self.lookup(byte).is_some()
    }

    /// Returns the number of opcodes in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    /// Returns whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decoding parameters that depend on the engine revision.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineProfile {
    /// Simulation frames per second.
    pub fps: f64,
    /// Valid opcodes.
    pub opcodes: OpcodeTable,
}

impl EngineProfile {
    /// Selects the profile for a container format.
    ///
    /// # Example
    ///
    /// ```
    /// use rep_parser::commands::EngineProfile;
    /// use rep_parser::format::ReplayFormat;
    ///
    /// let profile = EngineProfile::for_format(ReplayFormat::Modern121);
    /// assert!(profile.opcodes.contains(0x63));
    ///
    /// let profile = EngineProfile::for_format(ReplayFormat::LegacyPkware);
    /// assert!(!profile.opcodes.contains(0x63));
    /// assert!((profile.fps - 24.0).abs() < 1e-9);
    /// ```
    #[must_use]
    pub fn for_format(format: ReplayFormat) -> Self {
        let opcodes = match format {
            ReplayFormat::Modern121 => OpcodeTable::extended(),
            ReplayFormat::ModernZlib | ReplayFormat::LegacyPkware | ReplayFormat::Uncompressed => {
                OpcodeTable::standard()
            }
        };

        Self {
            fps: format.frames_per_second(),
            opcodes,
        }
    }
}
