//! Note-to-channel mapping tables
//!
//! Maps incoming MIDI notes to output channels (pads, cymbals, kick). Each of
//! the 8 output channels owns an ordered list of up to 8 note slots; a slot
//! holding [`UNASSIGNED_NOTE`] terminates the list, and nothing past the first
//! sentinel is ever scanned. Two complete banks are persisted; exactly one is
//! active at a time.

use crate::store::SettingsStore;
use thiserror::Error;

/// Number of output channels that can be taught MIDI notes.
pub const CHANNEL_COUNT: usize = 8;
/// Notes that can be taught to a single channel.
pub const SLOTS_PER_CHANNEL: usize = 8;
/// Persisted size of one bank.
pub const BANK_SIZE: usize = CHANNEL_COUNT * SLOTS_PER_CHANNEL;
/// Number of independently persisted banks.
pub const BANK_COUNT: u8 = 2;

/// Sentinel marking an unassigned slot (also the end of a channel's list).
pub const UNASSIGNED_NOTE: u8 = 0xFF;

/// Store address of the first bank; bank `n` starts at `BASE + n * BANK_SIZE`.
const BANK_BASE_ADDR: u8 = 0x20;

/// Fixed output channel roles, in table order.
///
/// Channels 0-3 are the drum pads, 4 the kick pedal, 5-7 the cymbals (only
/// 5 is used as a cymbal in the GuitarHero profile).
pub mod channel {
    pub const RED_PAD: usize = 0;
    pub const YELLOW_PAD: usize = 1;
    pub const BLUE_PAD: usize = 2;
    pub const GREEN_PAD: usize = 3;
    pub const KICK: usize = 4;
    pub const YELLOW_CYMBAL: usize = 5;
    pub const ORANGE_CYMBAL: usize = 5;
    pub const BLUE_CYMBAL: usize = 6;
    pub const GREEN_CYMBAL: usize = 7;
}

/// Factory default table for bank 0 (RockBand-style kit, channel-major).
const DEFAULT_BANK0: [[u8; SLOTS_PER_CHANNEL]; CHANNEL_COUNT] = [
    [31, 34, 37, 38, 40, 255, 255, 255],
    [48, 50, 255, 255, 255, 255, 255, 255],
    [45, 47, 255, 255, 255, 255, 255, 255],
    [39, 41, 43, 255, 255, 255, 255, 255],
    [33, 35, 36, 255, 255, 255, 255, 255],
    [22, 26, 42, 44, 46, 54, 255, 255],
    [25, 51, 53, 56, 59, 255, 255, 255],
    [49, 52, 55, 57, 255, 255, 255, 255],
];

/// Factory default table for bank 1 (GuitarHero-style kit: hi-hat notes on
/// the yellow pad, crashes on the orange cymbal, channels 6-7 unused).
const DEFAULT_BANK1: [[u8; SLOTS_PER_CHANNEL]; CHANNEL_COUNT] = [
    [31, 34, 37, 38, 40, 255, 255, 255],
    [22, 26, 42, 44, 46, 85, 255, 255],
    [48, 50, 255, 255, 255, 255, 255, 255],
    [39, 41, 43, 45, 47, 255, 255, 255],
    [33, 35, 36, 255, 255, 255, 255, 255],
    [49, 52, 55, 57, 255, 255, 255, 255],
    [255; SLOTS_PER_CHANNEL],
    [255; SLOTS_PER_CHANNEL],
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NoteMapError {
    #[error("channel {0} out of range")]
    InvalidChannel(usize),
}

/// Outcome of teaching a note to a channel.
#[derive(Debug, PartialEq, Eq)]
pub enum AddOutcome {
    /// Note stored; the value is how many slots the channel now occupies.
    Added(usize),
    /// Note was already mapped to this channel; nothing written.
    Duplicate,
}

/// In-memory cache of the active bank plus the active bank number.
///
/// Every mutation writes through to the persistent store immediately; the
/// cache only ever diverges from the store when `switch_bank` is told not to
/// reload (the caller is about to overwrite the whole bank anyway).
pub struct NoteMap {
    table: [[u8; SLOTS_PER_CHANNEL]; CHANNEL_COUNT],
    bank: u8,
}

impl NoteMap {
    /// Create an empty map with bank 0 active. Call [`NoteMap::reload`] (or
    /// `switch_bank(_, true)`) to populate it from the store.
    pub fn new() -> Self {
        Self {
            table: [[UNASSIGNED_NOTE; SLOTS_PER_CHANNEL]; CHANNEL_COUNT],
            bank: 0,
        }
    }

    /// Currently active bank number.
    pub fn bank(&self) -> u8 {
        self.bank
    }

    fn bank_addr(&self, ch: usize, slot: usize) -> u8 {
        BANK_BASE_ADDR
            .wrapping_add(self.bank * BANK_SIZE as u8)
            .wrapping_add((ch * SLOTS_PER_CHANNEL + slot) as u8)
    }

    /// Read one slot from the in-memory cache.
    pub fn get(&self, channel: usize, slot: usize) -> u8 {
        self.table[channel][slot]
    }

    /// Write one slot, updating the cache and the store.
    ///
    /// Out-of-range indices are silently ignored.
    pub fn set(&mut self, store: &mut dyn SettingsStore, channel: usize, slot: usize, note: u8) {
        if channel >= CHANNEL_COUNT || slot >= SLOTS_PER_CHANNEL {
            return;
        }
        self.table[channel][slot] = note;
        store.set(self.bank_addr(channel, slot), note);
    }

    /// Teach `note` to `channel`.
    ///
    /// With `append`, the channel's slots are scanned in order: an existing
    /// entry for `note` returns [`AddOutcome::Duplicate`]; otherwise the note
    /// lands in the first unassigned slot, or overwrites the last slot when
    /// the list is full. After writing into slot `i` (i < last), slot `i+1`
    /// is re-marked unassigned so the list stays sentinel-terminated.
    /// Without `append`, the note simply replaces slot 0.
    pub fn add_mapping(
        &mut self,
        store: &mut dyn SettingsStore,
        channel: usize,
        note: u8,
        _velocity: u8,
        append: bool,
    ) -> Result<AddOutcome, NoteMapError> {
        if channel >= CHANNEL_COUNT {
            return Err(NoteMapError::InvalidChannel(channel));
        }

        let mut slot = 0;
        if append {
            loop {
                if slot >= SLOTS_PER_CHANNEL {
                    // All slots in use: re-use the last one.
                    slot = SLOTS_PER_CHANNEL - 1;
                    break;
                }
                if self.table[channel][slot] == note {
                    return Ok(AddOutcome::Duplicate);
                }
                if self.table[channel][slot] == UNASSIGNED_NOTE {
                    break;
                }
                slot += 1;
            }
        }

        self.set(store, channel, slot, note);
        if slot < SLOTS_PER_CHANNEL - 1 {
            self.set(store, channel, slot + 1, UNASSIGNED_NOTE);
        }
        Ok(AddOutcome::Added(slot + 1))
    }

    /// Find the first channel at index >= `start_channel` whose slot list
    /// contains `note`.
    ///
    /// One note may be taught to several channels; callers enumerate them by
    /// looping with `start_channel = found + 1`.
    pub fn lookup(&self, note: u8, start_channel: usize) -> Option<usize> {
        for ch in start_channel..CHANNEL_COUNT {
            for slot in 0..SLOTS_PER_CHANNEL {
                let entry = self.table[ch][slot];
                // Sentinel terminates this channel's list.
                if entry == UNASSIGNED_NOTE {
                    break;
                }
                if entry == note {
                    return Some(ch);
                }
            }
        }
        None
    }

    /// Iterate over every channel mapped to `note`, in index order.
    pub fn channels_for(&self, note: u8) -> ChannelsFor<'_> {
        ChannelsFor {
            map: self,
            note,
            next: 0,
        }
    }

    /// Erase every slot of one channel (all slots persisted as unassigned).
    pub fn clear_channel(&mut self, store: &mut dyn SettingsStore, channel: usize) {
        if channel >= CHANNEL_COUNT {
            return;
        }
        for slot in 0..SLOTS_PER_CHANNEL {
            self.set(store, channel, slot, UNASSIGNED_NOTE);
        }
    }

    /// Overwrite `bank` with its built-in default table, persisting every
    /// entry. The given bank becomes the active one.
    pub fn restore_defaults(&mut self, store: &mut dyn SettingsStore, bank: u8) {
        self.bank = bank % BANK_COUNT;
        let defaults = if self.bank == 0 {
            &DEFAULT_BANK0
        } else {
            &DEFAULT_BANK1
        };
        for ch in 0..CHANNEL_COUNT {
            for slot in 0..SLOTS_PER_CHANNEL {
                self.set(store, ch, slot, defaults[ch][slot]);
            }
        }
    }

    /// Make `bank` the active bank, optionally reloading the cache from the
    /// store. Callers that are about to bulk-overwrite the bank skip the
    /// reload.
    pub fn switch_bank(&mut self, store: &dyn SettingsStore, bank: u8, reload_from_store: bool) {
        self.bank = bank % BANK_COUNT;
        if reload_from_store {
            self.reload(store);
        }
    }

    /// Refresh the in-memory cache from the store for the active bank.
    pub fn reload(&mut self, store: &dyn SettingsStore) {
        for ch in 0..CHANNEL_COUNT {
            for slot in 0..SLOTS_PER_CHANNEL {
                self.table[ch][slot] = store.get(self.bank_addr(ch, slot));
            }
        }
    }
}

impl Default for NoteMap {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ChannelsFor<'a> {
    map: &'a NoteMap,
    note: u8,
    next: usize,
}

impl Iterator for ChannelsFor<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let found = self.map.lookup(self.note, self.next)?;
        self.next = found + 1;
        Some(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;

    fn fresh_map(store: &mut MemStore) -> NoteMap {
        let mut map = NoteMap::new();
        map.restore_defaults(store, 0);
        map
    }

    #[test]
    fn defaults_have_dense_slot_prefixes() {
        for table in [&DEFAULT_BANK0, &DEFAULT_BANK1] {
            for ch in 0..CHANNEL_COUNT {
                let mut seen_sentinel = false;
                for slot in 0..SLOTS_PER_CHANNEL {
                    if table[ch][slot] == UNASSIGNED_NOTE {
                        seen_sentinel = true;
                    } else {
                        assert!(!seen_sentinel, "gap in channel {ch} of defaults");
                    }
                }
            }
        }
    }

    #[test]
    fn lookup_finds_default_mappings() {
        let mut store = MemStore::new();
        let map = fresh_map(&mut store);
        assert_eq!(map.lookup(38, 0), Some(channel::RED_PAD)); // snare
        assert_eq!(map.lookup(36, 0), Some(channel::KICK)); // kick
        assert_eq!(map.lookup(46, 0), Some(channel::YELLOW_CYMBAL)); // open hat
        assert_eq!(map.lookup(99, 0), None);
    }

    #[test]
    fn lookup_stops_at_first_sentinel() {
        let mut store = MemStore::new();
        let mut map = NoteMap::new();
        // A note hidden behind a gap must never be found.
        map.set(&mut store, 2, 0, 60);
        map.set(&mut store, 2, 1, UNASSIGNED_NOTE);
        map.set(&mut store, 2, 2, 61);
        assert_eq!(map.lookup(60, 0), Some(2));
        assert_eq!(map.lookup(61, 0), None);
    }

    #[test]
    fn add_mapping_appends_and_reports_count() {
        let mut store = MemStore::new();
        let mut map = NoteMap::new();
        assert_eq!(
            map.add_mapping(&mut store, 1, 50, 100, true),
            Ok(AddOutcome::Added(1))
        );
        assert_eq!(
            map.add_mapping(&mut store, 1, 51, 100, true),
            Ok(AddOutcome::Added(2))
        );
        assert_eq!(map.get(1, 0), 50);
        assert_eq!(map.get(1, 1), 51);
        assert_eq!(map.get(1, 2), UNASSIGNED_NOTE);
    }

    #[test]
    fn add_mapping_rejects_duplicates() {
        let mut store = MemStore::new();
        let mut map = NoteMap::new();
        map.add_mapping(&mut store, 3, 42, 90, true).unwrap();
        assert_eq!(
            map.add_mapping(&mut store, 3, 42, 90, true),
            Ok(AddOutcome::Duplicate)
        );
        // No second slot was consumed.
        assert_eq!(map.get(3, 1), UNASSIGNED_NOTE);
    }

    #[test]
    fn add_mapping_overwrites_last_slot_when_full() {
        let mut store = MemStore::new();
        let mut map = NoteMap::new();
        for n in 0..SLOTS_PER_CHANNEL as u8 {
            map.add_mapping(&mut store, 0, 10 + n, 100, true).unwrap();
        }
        assert_eq!(map.get(0, SLOTS_PER_CHANNEL - 1), 17);
        assert_eq!(
            map.add_mapping(&mut store, 0, 99, 100, true),
            Ok(AddOutcome::Added(SLOTS_PER_CHANNEL))
        );
        assert_eq!(map.get(0, SLOTS_PER_CHANNEL - 1), 99);
        // Earlier slots untouched.
        assert_eq!(map.get(0, 0), 10);
    }

    #[test]
    fn add_mapping_invalid_channel_errors() {
        let mut store = MemStore::new();
        let mut map = NoteMap::new();
        assert_eq!(
            map.add_mapping(&mut store, CHANNEL_COUNT, 42, 90, true),
            Err(NoteMapError::InvalidChannel(CHANNEL_COUNT))
        );
    }

    #[test]
    fn non_append_writes_slot_zero() {
        let mut store = MemStore::new();
        let mut map = NoteMap::new();
        map.add_mapping(&mut store, 0, 50, 100, true).unwrap();
        map.add_mapping(&mut store, 0, 51, 100, true).unwrap();
        map.add_mapping(&mut store, 0, 60, 100, false).unwrap();
        assert_eq!(map.get(0, 0), 60);
        // Slot 1 was re-marked as the end of the list.
        assert_eq!(map.get(0, 1), UNASSIGNED_NOTE);
    }

    #[test]
    fn channels_for_enumerates_all_matches() {
        let mut store = MemStore::new();
        let mut map = NoteMap::new();
        map.add_mapping(&mut store, 1, 46, 100, true).unwrap();
        map.add_mapping(&mut store, 5, 46, 100, true).unwrap();
        map.add_mapping(&mut store, 7, 46, 100, true).unwrap();
        let hits: Vec<usize> = map.channels_for(46).collect();
        assert_eq!(hits, vec![1, 5, 7]);
    }

    #[test]
    fn clear_channel_erases_every_slot() {
        let mut store = MemStore::new();
        let mut map = fresh_map(&mut store);
        map.clear_channel(&mut store, channel::RED_PAD);
        assert_eq!(map.lookup(38, 0), None);
        for slot in 0..SLOTS_PER_CHANNEL {
            assert_eq!(map.get(channel::RED_PAD, slot), UNASSIGNED_NOTE);
        }
    }

    #[test]
    fn banks_persist_independently() {
        let mut store = MemStore::new();
        let mut map = NoteMap::new();
        map.restore_defaults(&mut store, 0);
        map.switch_bank(&store, 1, false);
        map.restore_defaults(&mut store, 1);
        map.add_mapping(&mut store, 0, 100, 90, true).unwrap();

        // Back to bank 0: the custom note is not there.
        map.switch_bank(&store, 0, true);
        assert_eq!(map.lookup(100, 0), None);
        // And bank 1 still has it after a reload.
        map.switch_bank(&store, 1, true);
        assert!(map.lookup(100, 0).is_some());
    }

    #[test]
    fn switch_bank_wraps_modulo_bank_count() {
        let store = MemStore::new();
        let mut map = NoteMap::new();
        map.switch_bank(&store, BANK_COUNT, false);
        assert_eq!(map.bank(), 0);
    }
}
