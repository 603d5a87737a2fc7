//! Persisted device settings
//!
//! The handful of scalar settings that survive power cycles: hold duration,
//! velocity threshold, swap note, and hi-hat pedal threshold. A version
//! marker guards the whole layout — if it does not match, everything
//! (including both note-map banks) is reset to factory defaults and
//! re-persisted, a distress indication is raised, and operation continues.

use crate::notemap::{NoteMap, UNASSIGNED_NOTE};
use crate::store::SettingsStore;
use tracing::{info, warn};

/// Store addresses of the persisted scalar settings.
pub mod addr {
    pub const VERSION: u8 = 0x10;
    pub const HOLD_COUNT: u8 = 0x12;
    pub const VEL_THRESH: u8 = 0x13;
    pub const SWAP_NOTE: u8 = 0x14;
    pub const HIHAT_THRESHOLD: u8 = 0x15;
}

/// Expected value of the version marker. Bump when the layout changes.
pub const SETTINGS_VERSION: u8 = 0x01;

/// Default hold duration in ticks.
pub const DEFAULT_HOLD_COUNT: u8 = 5;
/// Minimum velocity for a note to register, out of the box.
pub const DEFAULT_VELOCITY_THRESHOLD: u8 = 10;
/// Velocity threshold adjustments move in steps of this size.
pub const VELOCITY_INCREMENT: u8 = 20;

/// Scalar settings cached in memory; every setter writes through to the
/// store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSettings {
    /// How many ticks a channel stays active after a mapped note arrives.
    pub hold_count: u8,
    /// Notes quieter than this are ignored.
    pub min_velocity: u8,
    /// Note that cycles the active bank while playing; `0xFF` disables it.
    pub swap_note: u8,
    /// Hi-hat pedal position threshold; `0xFF` disables pedal handling.
    pub hihat_threshold: u8,
}

impl DeviceSettings {
    pub fn defaults() -> Self {
        Self {
            hold_count: DEFAULT_HOLD_COUNT,
            min_velocity: DEFAULT_VELOCITY_THRESHOLD,
            swap_note: UNASSIGNED_NOTE,
            hihat_threshold: UNASSIGNED_NOTE,
        }
    }

    /// Load settings from the store, or reset everything to defaults when the
    /// version marker does not match.
    ///
    /// On a reset, both note-map banks are restored to their built-in
    /// defaults and the map is left on bank 0. Returns `true` when a reset
    /// happened so the caller can raise the distress indication.
    pub fn recall(store: &mut dyn SettingsStore, map: &mut NoteMap) -> (Self, bool) {
        if store.get(addr::VERSION) == SETTINGS_VERSION {
            let settings = Self {
                hold_count: store.get(addr::HOLD_COUNT),
                min_velocity: store.get(addr::VEL_THRESH),
                swap_note: store.get(addr::SWAP_NOTE),
                hihat_threshold: store.get(addr::HIHAT_THRESHOLD),
            };
            map.reload(store);
            info!("recalled stored settings: {:?}", settings);
            return (settings, false);
        }

        warn!("settings version marker mismatch, resetting to factory defaults");
        let settings = Self::defaults();
        settings.persist_all(store);

        map.restore_defaults(store, 0);
        map.restore_defaults(store, 1);
        map.switch_bank(store, 0, true);

        // Marker last: a partial reset re-runs on the next boot.
        store.set(addr::VERSION, SETTINGS_VERSION);
        (settings, true)
    }

    fn persist_all(&self, store: &mut dyn SettingsStore) {
        store.set(addr::HOLD_COUNT, self.hold_count);
        store.set(addr::VEL_THRESH, self.min_velocity);
        store.set(addr::SWAP_NOTE, self.swap_note);
        store.set(addr::HIHAT_THRESHOLD, self.hihat_threshold);
    }

    pub fn set_hold_count(&mut self, store: &mut dyn SettingsStore, value: u8) {
        self.hold_count = value;
        store.set(addr::HOLD_COUNT, value);
    }

    pub fn set_min_velocity(&mut self, store: &mut dyn SettingsStore, value: u8) {
        self.min_velocity = value;
        store.set(addr::VEL_THRESH, value);
    }

    pub fn set_swap_note(&mut self, store: &mut dyn SettingsStore, value: u8) {
        self.swap_note = value;
        store.set(addr::SWAP_NOTE, value);
    }

    pub fn set_hihat_threshold(&mut self, store: &mut dyn SettingsStore, value: u8) {
        self.hihat_threshold = value;
        store.set(addr::HIHAT_THRESHOLD, value);
    }
}
