//! Logical controller reports
//!
//! The per-tick output of the core: which game buttons are down, the hat
//! direction, the host-command echo axes, and the per-channel velocities.
//! Serializing these fields into transport bytes (USB report layout, byte
//! offsets, console-specific button numbering) is the [`ReportSink`]
//! implementor's concern, not ours.

use crate::notemap::CHANNEL_COUNT;

/// Game-controller buttons as a bitmask of logical roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReportButtons(pub u16);

impl ReportButtons {
    pub const RED_DRUM: ReportButtons = ReportButtons(0x0001);
    pub const YELLOW_DRUM: ReportButtons = ReportButtons(0x0002);
    pub const BLUE_DRUM: ReportButtons = ReportButtons(0x0004);
    pub const GREEN_DRUM: ReportButtons = ReportButtons(0x0008);
    pub const KICK_PEDAL: ReportButtons = ReportButtons(0x0010);
    /// Hi-hat pedal in Rock Band 3; the orange cymbal in Guitar Hero.
    pub const HIHAT_PEDAL: ReportButtons = ReportButtons(0x0020);
    pub const ORANGE_CYMBAL: ReportButtons = ReportButtons(0x0020);
    pub const SELECT: ReportButtons = ReportButtons(0x0040);
    pub const BACK: ReportButtons = ReportButtons(0x0080);
    pub const START: ReportButtons = ReportButtons(0x0100);
    /// Combined with a drum button to signal a pad hit (Rock Band).
    pub const DRUM_HIT: ReportButtons = ReportButtons(0x0200);
    /// Combined with a drum button to signal a cymbal hit (Rock Band).
    pub const CYMBAL_HIT: ReportButtons = ReportButtons(0x0400);
    pub const SYSTEM: ReportButtons = ReportButtons(0x0800);

    pub fn insert(&mut self, other: ReportButtons) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: ReportButtons) {
        self.0 &= !other.0;
    }

    pub fn contains(self, other: ReportButtons) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Hat/nav direction reported to the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HatDir {
    #[default]
    Centered,
    Up,
    Down,
    Left,
    Right,
}

/// Ordinary per-tick input fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputReport {
    pub buttons: ReportButtons,
    pub hat: HatDir,
    /// Generic axis bytes, reused as the host-command response echo
    /// (X, Y, Z, Rz).
    pub axes: [u8; 4],
    /// Per-channel velocity, already game-profile scaled; zero for
    /// channels that are not active this tick.
    pub velocity: [u8; CHANNEL_COUNT],
}

/// Diagnostic log payload that replaces the input fields while data logging
/// is enabled. Entries are (parser state, data byte) pairs; status bytes are
/// not logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogReport {
    pub sequence: u8,
    pub entries: Vec<(u8, u8)>,
}

/// What the core hands to the report assembler each tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    Input(InputReport),
    Log(LogReport),
}

/// Report assembler boundary. Implementations serialize the logical fields
/// into whatever the transport wants.
pub trait ReportSink {
    fn submit(&mut self, report: &Report);
}

/// Sink that remembers the last report. Used by tests and dry runs.
#[derive(Default)]
pub struct MemorySink {
    pub last: Option<Report>,
    pub count: usize,
}

impl ReportSink for MemorySink {
    fn submit(&mut self, report: &Report) {
        self.last = Some(report.clone());
        self.count += 1;
    }
}
