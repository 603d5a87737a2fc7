//! Drumpad GW core
//!
//! Turns a percussion MIDI stream plus a handful of panel buttons into
//! game-controller input reports. The crate is transport-agnostic: bytes
//! come in through [`Controller::on_byte`], panel state through an
//! [`io::InputLines`] implementation, and every tick produces one
//! [`report::Report`] for whatever carries reports to the console.
//!
//! [`Controller::on_byte`]: controller::Controller::on_byte

pub mod buttons;
pub mod config;
pub mod controller;
pub mod host;
pub mod io;
pub mod midi;
pub mod notemap;
pub mod report;
pub mod settings;
pub mod shaper;
pub mod store;

pub use config::AppConfig;
pub use controller::{Controller, DeviceMode};
pub use report::{Report, ReportSink};
