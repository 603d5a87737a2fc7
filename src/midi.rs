//! MIDI byte-stream parser
//!
//! Decodes the raw serial byte stream one byte at a time. The parser is a
//! plain state machine: a status byte re-dispatches the machine — even in
//! the middle of a system-exclusive payload — except for the realtime and
//! undefined system bytes, which are transparent. Data bytes are interpreted
//! according to the current state only; out-of-sequence data bytes are
//! absorbed silently.
//!
//! The parser only decodes. Velocity thresholding, hi-hat substitution, and
//! note-map lookups all live in the controller.

use std::fmt;

/// MIDI status bytes (channel nibble stripped for channel-voice messages).
pub mod status {
    pub const NOTE_OFF: u8 = 0x80;
    pub const NOTE_ON: u8 = 0x90;
    pub const POLY_AFTERTOUCH: u8 = 0xA0;
    pub const CONTROL_CHANGE: u8 = 0xB0;
    pub const PROGRAM_CHANGE: u8 = 0xC0;
    pub const CHANNEL_AFTERTOUCH: u8 = 0xD0;
    pub const PITCH_BEND: u8 = 0xE0;

    pub const SYS_EX_START: u8 = 0xF0;
    pub const QUARTER_FRAME: u8 = 0xF1;
    pub const SONG_POSITION_PTR: u8 = 0xF2;
    pub const SONG_SELECT: u8 = 0xF3;
    pub const SYS_EX_END: u8 = 0xF7;
    pub const TIMING_CLOCK: u8 = 0xF8;
    pub const ACTIVE_SENSING: u8 = 0xFE;
}

/// Default controller number carrying the hi-hat pedal position.
pub const HIHAT_PEDAL_CONTROLLER: u8 = 4;

/// Capacity of the system-exclusive collection buffer; further payload bytes
/// are silently dropped.
pub const SYSEX_BUFFER_SIZE: usize = 16;

/// Parser states, one per kind of data byte we might be waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    WaitingForStatus,
    WaitingForNoteOn,
    WaitingForOnVelocity,
    WaitingForNoteOff,
    WaitingForOffVelocity,
    WaitingForData1Only,
    WaitingForData1Of2,
    WaitingForData2,
    CollectSysExData,
    WaitingForCcData1,
    WaitingForPedalData,
    WaitingForCcData2,
}

/// A fully decoded event of interest to the rest of the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    /// Note-on with velocity > 0. Threshold gating is the caller's job.
    NoteOn { note: u8, velocity: u8 },
    /// Explicit note-off, or a note-on with velocity 0 (which bypasses the
    /// threshold path entirely).
    NoteOff { note: u8 },
    /// New hi-hat pedal position, 0 (open) to 127 (fully pressed).
    PedalPosition(u8),
}

impl fmt::Display for MidiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MidiEvent::NoteOn { note, velocity } => write!(f, "NoteOn n:{note} v:{velocity}"),
            MidiEvent::NoteOff { note } => write!(f, "NoteOff n:{note}"),
            MidiEvent::PedalPosition(pos) => write!(f, "Pedal {pos}"),
        }
    }
}

/// Byte-at-a-time MIDI decoder.
pub struct MidiParser {
    state: ParserState,
    /// Note byte of a note-on/off in flight; becomes official with the
    /// velocity byte.
    pending_note: u8,
    /// Controller number that carries the pedal position.
    pedal_controller: u8,
    sysex_buf: [u8; SYSEX_BUFFER_SIZE],
    sysex_len: usize,
}

impl MidiParser {
    pub fn new() -> Self {
        Self::with_pedal_controller(HIHAT_PEDAL_CONTROLLER)
    }

    pub fn with_pedal_controller(pedal_controller: u8) -> Self {
        Self {
            state: ParserState::WaitingForStatus,
            pending_note: 0,
            pedal_controller,
            sysex_buf: [0; SYSEX_BUFFER_SIZE],
            sysex_len: 0,
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Collected payload of the system-exclusive message in flight.
    pub fn sysex_payload(&self) -> &[u8] {
        &self.sysex_buf[..self.sysex_len]
    }

    /// Feed one byte from the serial link; returns a decoded event when this
    /// byte completes one.
    pub fn consume(&mut self, byte: u8) -> Option<MidiEvent> {
        if byte & 0x80 != 0 {
            self.on_status(byte);
            return None;
        }
        self.on_data(byte)
    }

    /// A dispatched status byte restarts the machine whatever it was doing —
    /// system-exclusive collection included. Realtime and undefined system
    /// bytes pass through without touching the state.
    fn on_status(&mut self, byte: u8) {
        if byte < 0xF0 {
            self.state = match byte & 0xF0 {
                status::NOTE_ON => ParserState::WaitingForNoteOn,
                status::NOTE_OFF => ParserState::WaitingForNoteOff,
                status::CONTROL_CHANGE => ParserState::WaitingForCcData1,
                status::POLY_AFTERTOUCH | status::PITCH_BEND => ParserState::WaitingForData1Of2,
                status::PROGRAM_CHANGE | status::CHANNEL_AFTERTOUCH => {
                    ParserState::WaitingForData1Only
                }
                _ => ParserState::WaitingForStatus,
            };
            return;
        }

        match byte {
            status::SYS_EX_START => {
                self.sysex_len = 0;
                self.state = ParserState::CollectSysExData;
            }
            status::QUARTER_FRAME | status::SONG_SELECT => {
                self.state = ParserState::WaitingForData1Only;
            }
            status::SONG_POSITION_PTR => {
                self.state = ParserState::WaitingForData1Of2;
            }
            status::SYS_EX_END => {
                self.state = ParserState::WaitingForStatus;
            }
            // Realtime bytes (clock, start/stop, active sensing) and the
            // undefined system commons carry no data and leave the machine
            // alone, so a clocked stream can interleave them mid-message.
            _ => {}
        }
    }

    fn on_data(&mut self, byte: u8) -> Option<MidiEvent> {
        match self.state {
            ParserState::WaitingForNoteOn => {
                self.pending_note = byte;
                self.state = ParserState::WaitingForOnVelocity;
                None
            }
            ParserState::WaitingForOnVelocity => {
                // Running status: another note/velocity pair may follow with
                // no new status byte.
                self.state = ParserState::WaitingForNoteOn;
                if byte == 0 {
                    Some(MidiEvent::NoteOff {
                        note: self.pending_note,
                    })
                } else {
                    Some(MidiEvent::NoteOn {
                        note: self.pending_note,
                        velocity: byte,
                    })
                }
            }
            ParserState::WaitingForNoteOff => {
                self.pending_note = byte;
                self.state = ParserState::WaitingForOffVelocity;
                None
            }
            ParserState::WaitingForOffVelocity => {
                self.state = ParserState::WaitingForStatus;
                Some(MidiEvent::NoteOff {
                    note: self.pending_note,
                })
            }
            ParserState::WaitingForCcData1 => {
                self.state = if byte == self.pedal_controller {
                    ParserState::WaitingForPedalData
                } else {
                    ParserState::WaitingForCcData2
                };
                None
            }
            ParserState::WaitingForPedalData => {
                self.state = ParserState::WaitingForStatus;
                Some(MidiEvent::PedalPosition(byte))
            }
            ParserState::CollectSysExData => {
                if self.sysex_len < SYSEX_BUFFER_SIZE {
                    self.sysex_buf[self.sysex_len] = byte;
                    self.sysex_len += 1;
                }
                // Exits only via the next status byte.
                None
            }
            ParserState::WaitingForData1Of2 => {
                self.state = ParserState::WaitingForData2;
                None
            }
            ParserState::WaitingForData1Only
            | ParserState::WaitingForData2
            | ParserState::WaitingForCcData2
            | ParserState::WaitingForStatus => {
                // Discarded payload, or a stray data byte with no status.
                self.state = ParserState::WaitingForStatus;
                None
            }
        }
    }
}

impl Default for MidiParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Format raw bytes as a hex string for debug logging.
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
