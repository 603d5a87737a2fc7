//! Top-level device controller
//!
//! Owns every piece of per-device state (parser, note map, buttons, shaper,
//! settings, host-command state, diagnostic log) and stitches them together
//! behind two entry points: [`Controller::on_byte`] for each incoming MIDI
//! byte and [`Controller::tick`] for the fixed-period report tick. Bytes and
//! ticks never run concurrently; the surrounding event loop guarantees that.

mod modes;
#[cfg(test)]
mod tests;

use crate::buttons::{ButtonDebouncer, ButtonFlags};
use crate::config::AppConfig;
use crate::host::{self, HostContext, HostResponse, REQUEST_SIZE};
use crate::io::{InputLines, OutputSink, RawInputs};
use crate::midi::{MidiEvent, MidiParser};
use crate::notemap::{NoteMap, BANK_COUNT, UNASSIGNED_NOTE};
use crate::report::{LogReport, Report};
use crate::settings::DeviceSettings;
use crate::shaper::{GameProfile, OutputShaper, PulseProfile};
use crate::store::SettingsStore;
use tracing::{debug, info};

/// Hi-hat notes some drum brains emit for an open hat. When the hi-hat
/// threshold is enabled they are rewritten before map lookup according to
/// the pedal position.
const HIHAT_OPEN_NOTE: u8 = 46;
const HIHAT_RIM_OPEN_NOTE: u8 = 26;
const HIHAT_EDGE_OPEN_NOTE: u8 = 28;
const HIHAT_CLOSED_NOTE: u8 = 42;

/// Entry pairs the diagnostic log holds before dropping new ones.
const LOG_CAPACITY: usize = 30;

/// Top-level operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceMode {
    #[default]
    Play,
    ProgramVelocity,
    ProgramMap,
    ProgramDuration,
}

/// A note-on waiting to be consumed by the swap-note check or a programming
/// action.
#[derive(Debug, Clone, Copy)]
struct PendingNote {
    note: u8,
    velocity: u8,
}

/// The panel buttons, one debouncer each.
pub(crate) struct PanelButtons {
    pub center: ButtonDebouncer,
    pub left: ButtonDebouncer,
    pub right: ButtonDebouncer,
    pub up: ButtonDebouncer,
    pub down: ButtonDebouncer,
    pub start: ButtonDebouncer,
    pub back: ButtonDebouncer,
}

impl PanelButtons {
    fn new(thresholds: crate::buttons::DebounceThresholds) -> Self {
        Self {
            center: ButtonDebouncer::new(thresholds),
            left: ButtonDebouncer::new(thresholds),
            right: ButtonDebouncer::new(thresholds),
            up: ButtonDebouncer::new(thresholds),
            down: ButtonDebouncer::new(thresholds),
            start: ButtonDebouncer::new(thresholds),
            back: ButtonDebouncer::new(thresholds),
        }
    }

    fn update(&mut self, raw: RawInputs) {
        self.center.update(raw.nav_center);
        self.left.update(raw.nav_left);
        self.right.update(raw.nav_right);
        self.up.update(raw.nav_up);
        self.down.update(raw.nav_down);
        self.start.update(raw.start);
        self.back.update(raw.back);
    }

    /// Edge check the mode handlers use: the classification changed this
    /// tick and now includes `flag`.
    pub(crate) fn edge(deb: &ButtonDebouncer, flag: ButtonFlags) -> bool {
        deb.changed() && deb.flags().contains(flag)
    }

    /// Edge check for an exact classification (a fresh press with no
    /// accumulated hold flags).
    pub(crate) fn press_edge(deb: &ButtonDebouncer) -> bool {
        deb.changed() && deb.flags() == ButtonFlags::PRESSED
    }
}

pub struct Controller {
    parser: MidiParser,
    pub(crate) map: NoteMap,
    pub(crate) settings: DeviceSettings,
    pub(crate) store: Box<dyn SettingsStore>,
    pub(crate) shaper: OutputShaper,
    pub(crate) buttons: PanelButtons,
    pub(crate) mode: DeviceMode,
    /// Channel being taught; `Some` only outside Play.
    pub(crate) program_channel: Option<usize>,
    pending_note: Option<PendingNote>,
    pub(crate) game: GameProfile,
    pub(crate) pulse: PulseProfile,
    pub(crate) command_mode: bool,
    logging_enabled: bool,
    log_entries: Vec<(u8, u8)>,
    log_sequence: u8,
    pub(crate) sticky: crate::report::ReportButtons,
    pub(crate) host_response: HostResponse,
    distress: bool,
    inputs: Box<dyn InputLines + Send>,
    pub(crate) outputs: Box<dyn OutputSink + Send>,
    pub(crate) last_inputs: RawInputs,
}

impl Controller {
    pub fn new(
        config: &AppConfig,
        mut store: Box<dyn SettingsStore>,
        inputs: Box<dyn InputLines + Send>,
        outputs: Box<dyn OutputSink + Send>,
    ) -> Self {
        let mut map = NoteMap::new();
        let (settings, was_reset) = DeviceSettings::recall(store.as_mut(), &mut map);
        info!(
            game = ?config.game,
            pulse = ?config.pulse,
            bank = map.bank(),
            "controller ready"
        );
        Self {
            parser: MidiParser::with_pedal_controller(config.midi.hihat_controller),
            map,
            settings,
            store,
            shaper: OutputShaper::new(),
            buttons: PanelButtons::new(config.debounce),
            mode: DeviceMode::Play,
            program_channel: None,
            pending_note: None,
            game: config.game,
            pulse: config.pulse,
            command_mode: false,
            logging_enabled: false,
            log_entries: Vec::new(),
            log_sequence: 0,
            sticky: crate::report::ReportButtons::default(),
            host_response: HostResponse::default(),
            distress: was_reset,
            inputs,
            outputs,
            last_inputs: RawInputs::default(),
        }
    }

    pub fn mode(&self) -> DeviceMode {
        self.mode
    }

    pub fn command_mode(&self) -> bool {
        self.command_mode
    }

    /// True when the persisted settings were reset at boot.
    pub fn distress(&self) -> bool {
        self.distress
    }

    pub fn map(&self) -> &NoteMap {
        &self.map
    }

    pub fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    /// Feed one byte from the MIDI link.
    pub fn on_byte(&mut self, byte: u8) {
        // Only data bytes are logged; decoders pair each entry's parser
        // state with the data byte it interpreted.
        if self.logging_enabled && byte & 0x80 == 0 && self.log_entries.len() < LOG_CAPACITY {
            self.log_entries.push((self.parser.state() as u8, byte));
        }

        let Some(event) = self.parser.consume(byte) else {
            return;
        };
        debug!(%event, "midi event");

        match event {
            MidiEvent::NoteOn { note, velocity } => {
                self.pending_note = Some(PendingNote { note, velocity });
                if velocity >= self.settings.min_velocity {
                    self.activate_note(note, velocity);
                }
            }
            MidiEvent::NoteOff { .. } => {
                // Includes velocity-0 note-ons, which bypass the threshold
                // path entirely.
                self.pending_note = None;
            }
            MidiEvent::PedalPosition(pos) => {
                self.shaper.set_pedal_position(pos);
            }
        }
    }

    /// Activate every channel the note maps to. The open-hat rewrite is
    /// applied for the lookup only; the latched note keeps its raw value so
    /// programming always sees what the kit actually sent.
    fn activate_note(&mut self, note: u8, velocity: u8) {
        let note = self.substitute_hihat(note);
        let shaper = &mut self.shaper;
        for channel in self.map.channels_for(note) {
            shaper.activate(channel, velocity);
        }
    }

    fn substitute_hihat(&self, note: u8) -> u8 {
        if self.settings.hihat_threshold == UNASSIGNED_NOTE {
            return note;
        }
        match note {
            HIHAT_OPEN_NOTE | HIHAT_RIM_OPEN_NOTE | HIHAT_EDGE_OPEN_NOTE => {
                // Past the threshold (strictly) the hat is closed.
                if self.shaper.pedal_position() > self.settings.hihat_threshold {
                    HIHAT_CLOSED_NOTE
                } else {
                    HIHAT_OPEN_NOTE
                }
            }
            _ => note,
        }
    }

    /// Handle a host command request. The response is echoed in the axis
    /// bytes of every following report while command mode lasts.
    pub fn handle_host_request(&mut self, request: &[u8; REQUEST_SIZE]) {
        let mut ctx = HostContext {
            store: self.store.as_mut(),
            settings: &mut self.settings,
            map: &mut self.map,
            game: &mut self.game,
            logging_enabled: &mut self.logging_enabled,
            command_mode: &mut self.command_mode,
            outputs: self.outputs.as_mut(),
            inputs: self.last_inputs,
        };
        if let Some(resp) = host::process(request, &mut ctx) {
            self.host_response = resp;
        }
    }

    /// Advance one tick and produce the report for it.
    pub fn tick(&mut self) -> Report {
        // While data logging is on, the report slot carries the log instead
        // of input fields and ordinary tick processing is suspended.
        if self.logging_enabled {
            return self.drain_log();
        }

        self.last_inputs = self.inputs.sample();
        let raw = self.last_inputs;
        self.buttons.update(raw);

        // Start held toggles between Play and map programming.
        if !self.command_mode && PanelButtons::edge(&self.buttons.start, ButtonFlags::HELD) {
            if self.mode == DeviceMode::Play {
                self.mode = DeviceMode::ProgramMap;
                self.program_channel = Some(0);
                info!("entering map programming mode");
            } else {
                self.exit_to_play();
            }
        }

        // Host command mode always runs in Play.
        if self.command_mode && self.mode != DeviceMode::Play {
            self.exit_to_play();
        }

        match self.mode {
            DeviceMode::Play => self.tick_play(),
            DeviceMode::ProgramVelocity => self.tick_program_velocity(),
            DeviceMode::ProgramMap => self.tick_program_map(),
            DeviceMode::ProgramDuration => self.tick_program_duration(),
        }
    }

    pub(crate) fn exit_to_play(&mut self) {
        self.mode = DeviceMode::Play;
        self.program_channel = None;
        info!("back to play mode");
    }

    /// Cycle the active bank and reload it from the store.
    pub(crate) fn cycle_bank(&mut self) {
        let next = (self.map.bank() + 1) % BANK_COUNT;
        self.map.switch_bank(self.store.as_ref(), next, true);
        info!(bank = next, "switched note map bank");
    }

    /// Take the latched note-on, if any.
    pub(crate) fn take_pending_note(&mut self) -> Option<(u8, u8)> {
        self.pending_note.take().map(|p| (p.note, p.velocity))
    }

    pub(crate) fn pending_note_is(&self, note: u8) -> bool {
        matches!(self.pending_note, Some(p) if p.note == note)
    }

    fn drain_log(&mut self) -> Report {
        let entries = std::mem::take(&mut self.log_entries);
        if !entries.is_empty() {
            self.log_sequence = self.log_sequence.wrapping_add(1);
        }
        Report::Log(LogReport {
            sequence: self.log_sequence,
            entries,
        })
    }
}
