//! Host command protocol
//!
//! A configuration tool on the host can drive the device through a small
//! get/set protocol: an 8-byte request (prefix, opcode, sequence number, up
//! to 5 parameters) answered through the three report axis bytes X, Y, Z.
//! Z echoes the sequence number so the host can pair requests with
//! responses; for an unknown opcode Z carries the logical complement of the
//! sequence instead, which is the only error signal the protocol has.
//!
//! Dispatch is stateless: every request is handled entirely from the
//! borrowed context. Any valid request other than `CLEAR` puts the device
//! into command mode (Play mode, raw button passthrough) until `CLEAR`.

use crate::io::{OutputSink, RawInputs};
use crate::notemap::{NoteMap, BANK_COUNT, CHANNEL_COUNT, SLOTS_PER_CHANNEL, UNASSIGNED_NOTE};
use crate::settings::DeviceSettings;
use crate::shaper::GameProfile;
use crate::store::SettingsStore;
use tracing::debug;

/// First byte of every valid request.
pub const COMMAND_PREFIX: u8 = 0xBA;
/// Fixed request size.
pub const REQUEST_SIZE: usize = 8;

/// Reported firmware revision.
pub const MAJOR_REV: u8 = 3;
pub const MINOR_REV: u8 = 9;

/// Request opcodes.
pub mod opcode {
    pub const CLEAR: u8 = 0;
    pub const GET_VERSION: u8 = 1;
    pub const SET_XY: u8 = 2;
    pub const GET_NOTE_MAPPING: u8 = 3;
    pub const SET_NOTE_MAPPING: u8 = 4;
    pub const SET_OUTPUT: u8 = 5;
    pub const GET_INPUT: u8 = 6;
    pub const GET_HOLD_COUNT: u8 = 7;
    pub const SET_HOLD_COUNT: u8 = 8;
    pub const GET_TABLE_SIZE: u8 = 9;
    pub const SET_LOGGING: u8 = 11;
    pub const READ_STORE: u8 = 12;
    pub const WRITE_STORE: u8 = 13;
    pub const GET_VEL_THRESH: u8 = 14;
    pub const SET_VEL_THRESH: u8 = 15;
    pub const GET_MAP_COUNT: u8 = 16;
    pub const GET_MAP_NUMBER: u8 = 17;
    pub const SET_MAP_NUMBER: u8 = 18;
    pub const GET_SWAP_NOTE: u8 = 19;
    pub const SET_SWAP_NOTE: u8 = 20;
    pub const GET_HIHAT_THRESHOLD: u8 = 21;
    pub const SET_HIHAT_THRESHOLD: u8 = 22;
    pub const GET_FEATURES: u8 = 23;
    pub const SET_GAME_MODE: u8 = 24;
}

/// Response carried back in the axis bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HostResponse {
    pub x: u8,
    pub y: u8,
    pub z: u8,
}

/// Everything a request may read or mutate, borrowed from the controller.
pub struct HostContext<'a> {
    pub store: &'a mut dyn SettingsStore,
    pub settings: &'a mut DeviceSettings,
    pub map: &'a mut NoteMap,
    pub game: &'a mut GameProfile,
    pub logging_enabled: &'a mut bool,
    pub command_mode: &'a mut bool,
    pub outputs: &'a mut dyn OutputSink,
    /// Panel inputs as sampled this tick, for `GET_INPUT`.
    pub inputs: RawInputs,
}

/// Handle one request. Returns `None` when the prefix is wrong (the request
/// is ignored entirely, command mode untouched).
pub fn process(request: &[u8; REQUEST_SIZE], ctx: &mut HostContext<'_>) -> Option<HostResponse> {
    if request[0] != COMMAND_PREFIX {
        return None;
    }

    let op = request[1];
    let seq = request[2];
    let params = &request[3..];
    debug!(opcode = op, seq, "host command");

    let mut resp = HostResponse {
        x: 0,
        y: 0,
        z: seq,
    };
    *ctx.command_mode = true;

    match op {
        opcode::CLEAR => {
            *ctx.command_mode = false;
            *ctx.logging_enabled = false;
        }
        opcode::GET_VERSION => {
            resp.x = MAJOR_REV;
            resp.y = MINOR_REV;
        }
        opcode::SET_XY => {
            resp.x = params[0];
            resp.y = params[1];
        }
        opcode::GET_NOTE_MAPPING => {
            let (ch, slot) = (params[0] as usize, params[1] as usize);
            resp.x = if ch < CHANNEL_COUNT && slot < SLOTS_PER_CHANNEL {
                ctx.map.get(ch, slot)
            } else {
                UNASSIGNED_NOTE
            };
        }
        opcode::SET_NOTE_MAPPING => {
            ctx.map
                .set(ctx.store, params[0] as usize, params[1] as usize, params[2]);
        }
        opcode::SET_OUTPUT => {
            ctx.outputs.set_output(params[0] as usize, params[1] != 0);
        }
        opcode::GET_INPUT => {
            resp.x = input_line(ctx.inputs, params[0]) as u8;
        }
        opcode::GET_HOLD_COUNT => resp.x = ctx.settings.hold_count,
        opcode::SET_HOLD_COUNT => ctx.settings.set_hold_count(ctx.store, params[0]),
        opcode::GET_TABLE_SIZE => {
            resp.x = CHANNEL_COUNT as u8;
            resp.y = SLOTS_PER_CHANNEL as u8;
        }
        opcode::SET_LOGGING => *ctx.logging_enabled = params[0] != 0,
        opcode::READ_STORE => resp.x = ctx.store.get(params[0]),
        opcode::WRITE_STORE => ctx.store.set(params[0], params[1]),
        opcode::GET_VEL_THRESH => resp.x = ctx.settings.min_velocity,
        opcode::SET_VEL_THRESH => ctx.settings.set_min_velocity(ctx.store, params[0]),
        opcode::GET_MAP_COUNT => resp.x = BANK_COUNT,
        opcode::GET_MAP_NUMBER => resp.x = ctx.map.bank(),
        opcode::SET_MAP_NUMBER => ctx.map.switch_bank(ctx.store, params[0], true),
        opcode::GET_SWAP_NOTE => resp.x = ctx.settings.swap_note,
        opcode::SET_SWAP_NOTE => ctx.settings.set_swap_note(ctx.store, params[0]),
        opcode::GET_HIHAT_THRESHOLD => resp.x = ctx.settings.hihat_threshold,
        opcode::SET_HIHAT_THRESHOLD => ctx.settings.set_hihat_threshold(ctx.store, params[0]),
        opcode::GET_FEATURES => {
            resp.x = 0x01;
            resp.y = 0x01; // data logging is always available
            if ctx.settings.swap_note != UNASSIGNED_NOTE {
                resp.y |= 0x02;
            }
            if ctx.settings.hihat_threshold != UNASSIGNED_NOTE {
                resp.y |= 0x04;
            }
        }
        opcode::SET_GAME_MODE => {
            // Affects report shaping only; the boot value comes from the
            // config file.
            *ctx.game = if params[0] & 0x01 != 0 {
                GameProfile::GuitarHero
            } else {
                GameProfile::RockBand
            };
        }
        _ => {
            // Unknown command: Z carries the logical complement of the
            // sequence number.
            resp.z = (seq == 0) as u8;
        }
    }

    Some(resp)
}

fn input_line(inputs: RawInputs, index: u8) -> bool {
    match index {
        0 => inputs.nav_center,
        1 => inputs.nav_left,
        2 => inputs.nav_right,
        3 => inputs.nav_up,
        4 => inputs.nav_down,
        5 => inputs.start,
        6 => inputs.back,
        _ => false,
    }
}
