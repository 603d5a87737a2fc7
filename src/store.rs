//! Byte-addressable settings store
//!
//! The device keeps its settings and note-map banks in a tiny byte-addressable
//! store (an EEPROM on the original hardware). Writes are synchronous: a
//! `set` does not return until the value is durable, and the single-threaded
//! core never issues two writes concurrently.

use anyhow::{Context, Result};
use std::path::Path;

/// Value reported for cells that have never been written.
///
/// Matches erased EEPROM, and doubles as the "unassigned" note sentinel so a
/// blank store reads as an empty note map.
pub const ERASED: u8 = 0xFF;

/// Address space of the store. Addresses are a single byte.
pub const STORE_SIZE: usize = 256;

/// Byte-addressable persistent store.
///
/// No transactions: each `set` is an independent durable write.
pub trait SettingsStore {
    fn get(&self, addr: u8) -> u8;

    /// Write one byte. Blocks until the value is durable.
    fn set(&mut self, addr: u8, value: u8);
}

/// In-memory store, used by tests and the `--ephemeral` run mode.
pub struct MemStore {
    cells: [u8; STORE_SIZE],
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            cells: [ERASED; STORE_SIZE],
        }
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsStore for MemStore {
    fn get(&self, addr: u8) -> u8 {
        self.cells[addr as usize]
    }

    fn set(&mut self, addr: u8, value: u8) {
        self.cells[addr as usize] = value;
    }
}

/// Sled-backed store. One tree, one-byte keys, one-byte values.
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let db = sled::open(path)
            .with_context(|| format!("failed to open settings store at {}", path.display()))?;
        Ok(Self { db })
    }
}

impl SettingsStore for SledStore {
    fn get(&self, addr: u8) -> u8 {
        match self.db.get([addr]) {
            Ok(Some(v)) if !v.is_empty() => v[0],
            Ok(_) => ERASED,
            Err(e) => {
                tracing::warn!("settings store read failed at {:#04x}: {}", addr, e);
                ERASED
            }
        }
    }

    fn set(&mut self, addr: u8, value: u8) {
        // The durability contract requires the write to land before we return.
        if let Err(e) = self.db.insert([addr], &[value][..]) {
            tracing::warn!("settings store write failed at {:#04x}: {}", addr, e);
            return;
        }
        if let Err(e) = self.db.flush() {
            tracing::warn!("settings store flush failed at {:#04x}: {}", addr, e);
        }
    }
}
