//! Button debouncing and hold classification
//!
//! Each panel button runs its own little state machine, sampled once per
//! tick. Hold flags accumulate while the button stays down (a long-held
//! button still reports `HELD` from earlier in the press); release states
//! replace the accumulated flags and collapse to `UP` one tick later.

use serde::Deserialize;

/// Tick counts separating a press from the various hold stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DebounceThresholds {
    /// Ticks a contact must stay put before the state advances at all.
    pub press: u16,
    pub hold: u16,
    pub long_hold: u16,
    /// Also the saturation point of the run-length counter.
    pub super_long_hold: u16,
}

impl Default for DebounceThresholds {
    fn default() -> Self {
        Self {
            press: 4,
            hold: 100,
            long_hold: 300,
            super_long_hold: 800,
        }
    }
}

/// Classified button state as a set of bit flags.
///
/// The hold flags (`PRESSED`, `HELD`, `HELD_LONG`, `HELD_SUPER_LONG`)
/// accumulate during a press; the release flags and `UP` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonFlags(pub u8);

impl ButtonFlags {
    pub const UP: ButtonFlags = ButtonFlags(0x00);
    pub const PRESSED: ButtonFlags = ButtonFlags(0x01);
    pub const HELD: ButtonFlags = ButtonFlags(0x02);
    pub const PRESS_RELEASED: ButtonFlags = ButtonFlags(0x04);
    pub const HOLD_RELEASED: ButtonFlags = ButtonFlags(0x08);
    pub const HELD_LONG: ButtonFlags = ButtonFlags(0x10);
    pub const HELD_SUPER_LONG: ButtonFlags = ButtonFlags(0x20);

    pub fn contains(self, other: ButtonFlags) -> bool {
        self.0 & other.0 != 0
    }

    /// Button is currently down (debounced).
    pub fn is_down(self) -> bool {
        self.contains(Self::PRESSED)
    }

    pub fn is_held(self) -> bool {
        self.contains(Self::HELD)
    }

    pub fn is_held_long(self) -> bool {
        self.contains(Self::HELD_LONG)
    }

    pub fn is_held_super_long(self) -> bool {
        self.contains(Self::HELD_SUPER_LONG)
    }

    /// Released after a short press (a "click").
    pub fn is_press_released(self) -> bool {
        self.contains(Self::PRESS_RELEASED)
    }

    /// Released after reaching any hold stage.
    pub fn is_hold_released(self) -> bool {
        self.contains(Self::HOLD_RELEASED)
    }

    pub fn is_up(self) -> bool {
        self.0 == 0
    }
}

/// Per-button debouncer and hold classifier.
#[derive(Debug, Clone)]
pub struct ButtonDebouncer {
    thresholds: DebounceThresholds,
    flags: ButtonFlags,
    raw_pressed: bool,
    count: u16,
    changed: bool,
}

impl ButtonDebouncer {
    pub fn new(thresholds: DebounceThresholds) -> Self {
        Self {
            thresholds,
            flags: ButtonFlags::UP,
            raw_pressed: false,
            count: 0,
            changed: false,
        }
    }

    pub fn flags(&self) -> ButtonFlags {
        self.flags
    }

    /// True when the last `update` changed the classified state.
    pub fn changed(&self) -> bool {
        self.changed
    }

    /// Sample the raw contact for this tick and advance the machine.
    pub fn update(&mut self, pressed: bool) -> ButtonFlags {
        self.changed = false;
        let mut flags = self.flags;

        if pressed != self.raw_pressed {
            // Contact moved: restart the run-length count. A release edge
            // converts the accumulated hold flags into the matching release
            // state right away.
            self.count = 0;
            self.raw_pressed = pressed;
            if !pressed {
                if flags.is_held() {
                    flags = ButtonFlags::HOLD_RELEASED;
                } else if flags.is_down() {
                    flags = ButtonFlags::PRESS_RELEASED;
                }
            }
        } else {
            if self.count < self.thresholds.super_long_hold {
                self.count += 1;
            }
            if self.count < self.thresholds.press {
                return self.flags;
            }

            if pressed {
                if flags.is_down() {
                    if self.count >= self.thresholds.super_long_hold {
                        flags.0 |= ButtonFlags::HELD_SUPER_LONG.0;
                    }
                    if self.count >= self.thresholds.long_hold {
                        flags.0 |= ButtonFlags::HELD_LONG.0;
                    } else if self.count >= self.thresholds.hold {
                        flags.0 |= ButtonFlags::HELD.0;
                    }
                } else {
                    // Possibly replacing a lingering release state.
                    flags = ButtonFlags::PRESSED;
                }
            } else if flags.is_press_released() || flags.is_hold_released() {
                flags = ButtonFlags::UP;
            } else if flags.is_held() {
                flags = ButtonFlags::HOLD_RELEASED;
            } else if flags.is_down() {
                flags = ButtonFlags::PRESS_RELEASED;
            }
        }

        if flags != self.flags {
            self.flags = flags;
            self.changed = true;
        }
        self.flags
    }
}
