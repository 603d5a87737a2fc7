//! Configuration management for the drumpad gateway
//!
//! Handles loading and parsing of the YAML configuration file. Everything
//! that was a compile-time build variant on the original hardware lives
//! here instead: game profile, pulse shaping, debounce thresholds, the
//! hi-hat controller number, and the tick rate.

use crate::buttons::DebounceThresholds;
use crate::shaper::{GameProfile, PulseProfile};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use tokio::fs;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub midi: MidiConfig,
    /// Which game the reports are shaped for.
    #[serde(default)]
    pub game: GameProfile,
    /// How output pulse widths are derived.
    #[serde(default)]
    pub pulse: PulseProfile,
    #[serde(default)]
    pub debounce: DebounceThresholds,
    #[serde(default = "default_tick_period_ms")]
    pub tick_period_ms: u64,
    /// Where the settings store lives on disk.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
}

/// MIDI input configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MidiConfig {
    /// Substring match against available input port names; the first port
    /// is used when unset.
    #[serde(default)]
    pub input_port: Option<String>,
    /// Controller number carrying the hi-hat pedal position.
    #[serde(default = "default_hihat_controller")]
    pub hihat_controller: u8,
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            input_port: None,
            hihat_controller: default_hihat_controller(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            midi: MidiConfig::default(),
            game: GameProfile::default(),
            pulse: PulseProfile::default(),
            debounce: DebounceThresholds::default(),
            tick_period_ms: default_tick_period_ms(),
            store_path: default_store_path(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path))?;

        Ok(config)
    }
}

fn default_hihat_controller() -> u8 {
    crate::midi::HIHAT_PEDAL_CONTROLLER
}
fn default_tick_period_ms() -> u64 {
    1
}
fn default_store_path() -> PathBuf {
    PathBuf::from("drumpad-gw.db")
}
