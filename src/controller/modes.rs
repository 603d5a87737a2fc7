//! Per-mode tick behavior
//!
//! One handler per [`DeviceMode`](super::DeviceMode). Play shapes outputs
//! and builds the input report; the three programming modes edit the note
//! map, the velocity threshold, and the hold duration, and emit an empty
//! report while they have the panel.

use super::{Controller, DeviceMode, PanelButtons};
use crate::buttons::ButtonFlags;
use crate::io::HIHAT_OUTPUT;
use crate::notemap::{channel, CHANNEL_COUNT};
use crate::report::{HatDir, InputReport, Report, ReportButtons};
use crate::settings::{DEFAULT_HOLD_COUNT, DEFAULT_VELOCITY_THRESHOLD, VELOCITY_INCREMENT};
use crate::shaper::{scale_velocity, ChannelOutputs, GameProfile};
use tracing::{debug, info};

/// Hold-duration bounds in duration programming mode.
const MIN_HOLD_COUNT: u8 = 1;
const MAX_HOLD_COUNT: u8 = 6;
/// The velocity threshold moves in `VELOCITY_INCREMENT` steps up to here.
const MAX_VELOCITY_LEVEL: u8 = 6;

impl Controller {
    pub(super) fn tick_play(&mut self) -> Report {
        // A latched swap note cycles the active bank instead of playing.
        if self.settings.swap_note != crate::notemap::UNASSIGNED_NOTE
            && self.pending_note_is(self.settings.swap_note)
        {
            self.cycle_bank();
            self.take_pending_note();
        }
        self.program_channel = None;

        let (mut buttons, mut hat) = self.play_button_flags();

        let out = self
            .shaper
            .tick(self.settings.hold_count, self.pulse, self.settings.hihat_threshold);

        // A kick hit, Start, Back, or releasing Center all cancel a latched
        // sticky gesture.
        if out.active[channel::KICK]
            || buttons.contains(ReportButtons::START)
            || buttons.contains(ReportButtons::BACK)
        {
            self.sticky = ReportButtons::default();
        }
        if self.buttons.center.changed() && self.buttons.center.flags().is_up() {
            self.sticky = ReportButtons::default();
        }

        self.drive_outputs(&out);
        self.channel_button_flags(&out, &mut buttons, &mut hat);

        let mut velocity = [0u8; CHANNEL_COUNT];
        for (i, v) in velocity.iter_mut().enumerate() {
            if out.active[i] {
                *v = scale_velocity(self.game, out.velocity[i]);
            }
        }

        Report::Input(InputReport {
            buttons,
            hat,
            axes: self.response_axes(),
            velocity,
        })
    }

    /// Button and hat flags for Play. In host command mode the buttons pass
    /// through raw so the host can introspect the panel; otherwise they get
    /// their play-mode meanings.
    fn play_button_flags(&mut self) -> (ReportButtons, HatDir) {
        let mut buttons = ReportButtons::default();
        let mut hat = HatDir::Centered;

        // Quick bank change: Back pressed while Up is already down.
        if !self.command_mode
            && PanelButtons::edge(&self.buttons.back, ButtonFlags::PRESSED)
            && self.buttons.up.flags().is_down()
        {
            self.cycle_bank();
            return (buttons, hat);
        }

        let b = &self.buttons;

        if self.command_mode {
            if b.start.flags().is_down() {
                buttons.insert(ReportButtons::START);
            }
            if b.back.flags().is_down() {
                buttons.insert(ReportButtons::BACK);
            }
            if b.center.flags().is_down() {
                buttons.insert(ReportButtons::SELECT);
            }
            if b.left.flags().is_down() {
                hat = HatDir::Left;
            }
            if b.right.flags().is_down() {
                hat = HatDir::Right;
            }
            if b.up.flags().is_down() {
                hat = HatDir::Up;
            }
            if b.down.flags().is_down() {
                hat = HatDir::Down;
            }
            return (buttons, hat);
        }

        if b.start.flags().is_down() {
            buttons.insert(ReportButtons::START);
        }
        if b.back.flags().is_down() {
            buttons.insert(ReportButtons::BACK);
        }

        // A Center click plays the green drum; holding it is Select.
        if b.center.flags().is_press_released() {
            buttons.insert(ReportButtons::GREEN_DRUM);
        } else if b.center.flags().is_held() {
            buttons.insert(ReportButtons::SELECT);
        } else if b.left.flags().is_down() {
            hat = HatDir::Left;
        } else if b.right.flags().is_down() {
            hat = HatDir::Right;
        } else if b.up.flags().is_down() {
            hat = HatDir::Up;
        } else if b.down.flags().is_down() {
            hat = HatDir::Down;
        }

        // Sticky gestures: the games want the kick pedal or the green pad
        // held down in their sort/setlist menus, which a percussion pedal
        // cannot do. Holding the nav left/right latches the flag instead.
        if b.left.flags().is_held() {
            hat = HatDir::Centered;
            self.sticky = ReportButtons::KICK_PEDAL;
        } else if b.right.flags().is_held() {
            hat = HatDir::Centered;
            self.sticky = ReportButtons::GREEN_DRUM;
        } else if self.sticky == ReportButtons::KICK_PEDAL && b.right.flags().is_down() {
            self.sticky = ReportButtons::default();
        } else if self.sticky == ReportButtons::GREEN_DRUM && b.left.flags().is_down() {
            self.sticky = ReportButtons::default();
        }
        buttons.insert(self.sticky);

        // Back held is the console system button, alone.
        if b.back.flags().is_held() {
            buttons = ReportButtons::SYSTEM;
        }

        (buttons, hat)
    }

    /// Indicator outputs: one line per channel, cymbals sharing their pad's
    /// line in Rock Band, plus the hi-hat pedal line.
    fn drive_outputs(&mut self, out: &ChannelOutputs) {
        match self.game {
            GameProfile::GuitarHero => {
                for i in 0..=channel::ORANGE_CYMBAL {
                    self.outputs.set_output(i, out.active[i]);
                }
            }
            GameProfile::RockBand => {
                self.outputs.set_output(0, out.active[channel::RED_PAD]);
                self.outputs.set_output(
                    1,
                    out.active[channel::YELLOW_PAD] || out.active[channel::YELLOW_CYMBAL],
                );
                self.outputs.set_output(
                    2,
                    out.active[channel::BLUE_PAD] || out.active[channel::BLUE_CYMBAL],
                );
                self.outputs.set_output(
                    3,
                    out.active[channel::GREEN_PAD] || out.active[channel::GREEN_CYMBAL],
                );
                self.outputs.set_output(4, out.active[channel::KICK]);
                self.outputs.set_output(HIHAT_OUTPUT, out.hihat_pedal);
            }
        }
    }

    /// Fold the active channels into report buttons.
    fn channel_button_flags(
        &self,
        out: &ChannelOutputs,
        buttons: &mut ReportButtons,
        hat: &mut HatDir,
    ) {
        if out.active[channel::RED_PAD] {
            buttons.insert(ReportButtons::RED_DRUM);
        }
        if out.active[channel::YELLOW_PAD] {
            buttons.insert(ReportButtons::YELLOW_DRUM);
        }
        if out.active[channel::BLUE_PAD] {
            buttons.insert(ReportButtons::BLUE_DRUM);
        }
        if out.active[channel::GREEN_PAD] {
            buttons.insert(ReportButtons::GREEN_DRUM);
        }
        if out.active[channel::KICK] {
            buttons.insert(ReportButtons::KICK_PEDAL);
        }

        match self.game {
            GameProfile::GuitarHero => {
                if out.active[channel::ORANGE_CYMBAL] {
                    buttons.insert(ReportButtons::ORANGE_CYMBAL);
                }
            }
            GameProfile::RockBand => {
                if out.hihat_pedal {
                    buttons.insert(ReportButtons::HIHAT_PEDAL);
                }
                // Pad hits carry the drum flag so the console can tell pads
                // from cymbals on the shared buttons.
                if out.active[channel::RED_PAD]
                    || out.active[channel::YELLOW_PAD]
                    || out.active[channel::BLUE_PAD]
                    || out.active[channel::GREEN_PAD]
                {
                    buttons.insert(ReportButtons::DRUM_HIT);
                }
                if out.active[channel::YELLOW_CYMBAL] {
                    buttons.insert(ReportButtons::YELLOW_DRUM);
                    buttons.insert(ReportButtons::CYMBAL_HIT);
                    *hat = HatDir::Up;
                }
                if out.active[channel::BLUE_CYMBAL] {
                    buttons.insert(ReportButtons::BLUE_DRUM);
                    buttons.insert(ReportButtons::CYMBAL_HIT);
                    *hat = HatDir::Down;
                }
                if out.active[channel::GREEN_CYMBAL] {
                    buttons.insert(ReportButtons::GREEN_DRUM);
                    buttons.insert(ReportButtons::CYMBAL_HIT);
                }
            }
        }
    }

    pub(super) fn tick_program_map(&mut self) -> Report {
        // Left/Right pick the bank being edited.
        if PanelButtons::press_edge(&self.buttons.left) {
            if self.map.bank() > 0 {
                let bank = self.map.bank() - 1;
                self.map.switch_bank(self.store.as_ref(), bank, true);
                self.program_channel = Some(0);
            }
        } else if PanelButtons::press_edge(&self.buttons.right)
            && self.map.bank() < crate::notemap::BANK_COUNT - 1
        {
            let bank = self.map.bank() + 1;
            self.map.switch_bank(self.store.as_ref(), bank, true);
            self.program_channel = Some(0);
        }

        // Up/Down pick the channel being taught. Guitar Hero has no
        // separate cymbal channels past the orange one.
        let current = self.program_channel.unwrap_or(0);
        if PanelButtons::press_edge(&self.buttons.up) {
            if current > 0 {
                self.program_channel = Some(current - 1);
            }
        } else if PanelButtons::press_edge(&self.buttons.down) {
            let max = match self.game {
                GameProfile::GuitarHero => channel::ORANGE_CYMBAL,
                GameProfile::RockBand => CHANNEL_COUNT - 1,
            };
            if current < max {
                self.program_channel = Some(current + 1);
            }
        }

        // Back clears: the channel when held, every channel when held long,
        // the whole bank back to factory defaults when held super long
        // (which also drops back to Play).
        if PanelButtons::edge(&self.buttons.back, ButtonFlags::HELD_SUPER_LONG) {
            let bank = self.map.bank();
            self.map.restore_defaults(self.store.as_mut(), bank);
            info!(bank, "note map restored to defaults");
            self.exit_to_play();
            self.shaper.discard_pending();
            return empty_report();
        } else if PanelButtons::edge(&self.buttons.back, ButtonFlags::HELD_LONG) {
            for ch in 0..CHANNEL_COUNT {
                self.map.clear_channel(self.store.as_mut(), ch);
            }
            info!("note map erased");
        } else if PanelButtons::edge(&self.buttons.back, ButtonFlags::HELD) {
            if let Some(ch) = self.program_channel {
                self.map.clear_channel(self.store.as_mut(), ch);
                info!(channel = ch, "channel mappings cleared");
            }
        }

        // An incoming note teaches the selected channel.
        if let Some((note, velocity)) = self.take_pending_note() {
            if let Some(ch) = self.program_channel {
                match self.map.add_mapping(self.store.as_mut(), ch, note, velocity, true) {
                    Ok(outcome) => debug!(channel = ch, note, ?outcome, "mapping taught"),
                    Err(e) => debug!(channel = ch, note, "mapping rejected: {e}"),
                }
            }
        }

        // Center held moves on to velocity programming.
        if PanelButtons::edge(&self.buttons.center, ButtonFlags::HELD) {
            self.program_channel = None;
            self.mode = DeviceMode::ProgramVelocity;
            info!("entering velocity programming mode");
        }

        self.shaper.discard_pending();
        empty_report()
    }

    pub(super) fn tick_program_velocity(&mut self) -> Report {
        // Back held resets the threshold.
        if PanelButtons::edge(&self.buttons.back, ButtonFlags::HELD) {
            self.settings
                .set_min_velocity(self.store.as_mut(), DEFAULT_VELOCITY_THRESHOLD);
        }

        // Up softens, Down stiffens, in fixed quantized steps.
        let level = self.settings.min_velocity / VELOCITY_INCREMENT;
        if PanelButtons::press_edge(&self.buttons.up) {
            let value = if level > 1 {
                (level - 1) * VELOCITY_INCREMENT
            } else {
                0
            };
            self.settings.set_min_velocity(self.store.as_mut(), value);
        } else if PanelButtons::press_edge(&self.buttons.down) {
            let value = if level < MAX_VELOCITY_LEVEL {
                (level + 1) * VELOCITY_INCREMENT
            } else {
                MAX_VELOCITY_LEVEL * VELOCITY_INCREMENT
            };
            self.settings.set_min_velocity(self.store.as_mut(), value);
        }

        if PanelButtons::edge(&self.buttons.center, ButtonFlags::HELD) {
            self.mode = DeviceMode::ProgramDuration;
            info!("entering duration programming mode");
        }

        self.shaper.discard_pending();
        empty_report()
    }

    pub(super) fn tick_program_duration(&mut self) -> Report {
        if PanelButtons::edge(&self.buttons.back, ButtonFlags::HELD) {
            self.settings
                .set_hold_count(self.store.as_mut(), DEFAULT_HOLD_COUNT);
        }

        if PanelButtons::press_edge(&self.buttons.up) {
            if self.settings.hold_count > MIN_HOLD_COUNT {
                let value = self.settings.hold_count - 1;
                self.settings.set_hold_count(self.store.as_mut(), value);
            }
        } else if PanelButtons::press_edge(&self.buttons.down)
            && self.settings.hold_count < MAX_HOLD_COUNT
        {
            let value = self.settings.hold_count + 1;
            self.settings.set_hold_count(self.store.as_mut(), value);
        }

        if PanelButtons::edge(&self.buttons.center, ButtonFlags::HELD) {
            self.program_channel = Some(0);
            self.mode = DeviceMode::ProgramMap;
            info!("entering map programming mode");
        }

        self.shaper.discard_pending();
        empty_report()
    }

    fn response_axes(&self) -> [u8; 4] {
        if self.command_mode {
            [
                self.host_response.x,
                self.host_response.y,
                self.host_response.z,
                0,
            ]
        } else {
            [0; 4]
        }
    }
}

fn empty_report() -> Report {
    Report::Input(InputReport::default())
}
