//! Output pulse shaping
//!
//! A note-on does not drive an output for as long as the note stays on;
//! instead it loads a per-channel hold countdown, and the channel reports
//! active while the countdown drains. This decouples the output pulse width
//! from however briefly the drum brain keeps the note on.

use crate::notemap::{channel, CHANNEL_COUNT};
use serde::Deserialize;

/// Which game the output is shaped for. Selects the velocity transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GameProfile {
    #[default]
    RockBand,
    GuitarHero,
}

/// How the hold countdown is derived when a channel activates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PulseProfile {
    /// Every channel gets the configured hold count.
    #[default]
    Fixed,
    /// Pulse width varies with velocity and channel role: a long fixed pulse
    /// for the kick pedal, a 5..=25 range for cymbals, velocity/12 for pads.
    VelocityScaled,
}

/// Longest cymbal pulse under the velocity-scaled profile.
const CYMBAL_MAX_HOLD: u8 = 25;
/// Kick pulse multiplier under the velocity-scaled profile. The kick is not
/// velocity sensitive but needs a longer pulse than the pads.
const KICK_HOLD_MULTIPLIER: u8 = 20;

/// Velocity byte as the console expects it.
pub fn scale_velocity(profile: GameProfile, value: u8) -> u8 {
    match profile {
        GameProfile::GuitarHero => value,
        GameProfile::RockBand => 0xFFu8.wrapping_sub(value.wrapping_mul(2)),
    }
}

fn scale_hold_count(channel_index: usize, velocity: u8, hold_count: u8) -> u8 {
    match channel_index {
        c if c == channel::KICK => KICK_HOLD_MULTIPLIER.saturating_mul(hold_count),
        c if c > channel::KICK => (velocity / 5 + 5).min(CYMBAL_MAX_HOLD),
        _ => velocity / 12,
    }
}

/// Snapshot of every output after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelOutputs {
    pub active: [bool; CHANNEL_COUNT],
    /// Untransformed last velocity per channel; apply [`scale_velocity`]
    /// when building the outgoing report.
    pub velocity: [u8; CHANNEL_COUNT],
    /// Hi-hat pedal output, driven by the pedal position alone.
    pub hihat_pedal: bool,
}

/// Converts activations into hold pulses, one countdown per channel.
pub struct OutputShaper {
    hold_counts: [u8; CHANNEL_COUNT],
    velocity: [u8; CHANNEL_COUNT],
    /// Velocity of an activation that arrived since the last tick.
    pending: [Option<u8>; CHANNEL_COUNT],
    pedal_position: u8,
}

impl OutputShaper {
    pub fn new() -> Self {
        Self {
            hold_counts: [0; CHANNEL_COUNT],
            velocity: [0; CHANNEL_COUNT],
            pending: [None; CHANNEL_COUNT],
            pedal_position: 0,
        }
    }

    /// Record a note activation for `channel_index`. Takes effect on the
    /// next tick; a second activation before then just refreshes the
    /// velocity.
    pub fn activate(&mut self, channel_index: usize, velocity: u8) {
        if channel_index < CHANNEL_COUNT {
            self.pending[channel_index] = Some(velocity);
        }
    }

    pub fn set_pedal_position(&mut self, position: u8) {
        self.pedal_position = position;
    }

    pub fn pedal_position(&self) -> u8 {
        self.pedal_position
    }

    /// Drop activations that arrived since the last tick without shaping
    /// them. Used while a programming mode has the note stream.
    pub fn discard_pending(&mut self) {
        self.pending = [None; CHANNEL_COUNT];
    }

    /// Drop all countdowns and pending activations.
    pub fn clear(&mut self) {
        self.hold_counts = [0; CHANNEL_COUNT];
        self.pending = [None; CHANNEL_COUNT];
    }

    /// Advance one tick: latch pending activations into countdowns, then
    /// report and decrement every running countdown.
    ///
    /// `hihat_threshold` of `0xFF` disables the pedal output entirely.
    pub fn tick(
        &mut self,
        hold_count: u8,
        profile: PulseProfile,
        hihat_threshold: u8,
    ) -> ChannelOutputs {
        for (i, slot) in self.pending.iter_mut().enumerate() {
            if let Some(vel) = slot.take() {
                self.velocity[i] = vel;
                self.hold_counts[i] = match profile {
                    PulseProfile::Fixed => hold_count,
                    PulseProfile::VelocityScaled => scale_hold_count(i, vel, hold_count),
                };
            }
        }

        let mut out = ChannelOutputs {
            velocity: self.velocity,
            ..Default::default()
        };
        for (i, count) in self.hold_counts.iter_mut().enumerate() {
            if *count > 0 {
                *count -= 1;
                out.active[i] = true;
            }
        }
        if hihat_threshold != 0xFF {
            out.hihat_pedal = self.pedal_position >= hihat_threshold;
        }
        out
    }
}

impl Default for OutputShaper {
    fn default() -> Self {
        Self::new()
    }
}
