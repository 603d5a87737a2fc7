//! Hardware collaborator traits
//!
//! The core never touches pins, ports, or transports directly; the
//! surrounding system hands in implementations of these traits. Tests use
//! the in-memory versions.

use crate::notemap::CHANNEL_COUNT;

/// Raw panel inputs, sampled once per tick. No electrical debouncing is
/// expected here; the core runs its own button state machines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawInputs {
    pub nav_center: bool,
    pub nav_left: bool,
    pub nav_right: bool,
    pub nav_up: bool,
    pub nav_down: bool,
    pub start: bool,
    pub back: bool,
}

/// Source of the raw panel inputs.
pub trait InputLines {
    fn sample(&mut self) -> RawInputs;
}

/// Output line carrying the hi-hat pedal state, one past the note channels.
pub const HIHAT_OUTPUT: usize = CHANNEL_COUNT;
/// Total output lines an [`OutputSink`] may be asked to drive.
pub const OUTPUT_COUNT: usize = CHANNEL_COUNT + 1;

/// Per-channel boolean actuator (channel indicator LEDs / external outputs).
/// Written once per tick per channel; polarity and routing belong to the
/// implementor.
pub trait OutputSink {
    fn set_output(&mut self, channel: usize, active: bool);
}

/// Inputs source that always reads idle.
#[derive(Default)]
pub struct NullInputs;

impl InputLines for NullInputs {
    fn sample(&mut self) -> RawInputs {
        RawInputs::default()
    }
}

/// Output sink that remembers the last state of each line.
#[derive(Default)]
pub struct MemoryOutputs {
    pub channels: [bool; OUTPUT_COUNT],
}

impl OutputSink for MemoryOutputs {
    fn set_output(&mut self, channel: usize, active: bool) {
        if channel < OUTPUT_COUNT {
            self.channels[channel] = active;
        }
    }
}
