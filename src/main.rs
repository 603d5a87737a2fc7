//! Drumpad GW - percussion MIDI to game-controller adapter
//!
//! Binary entry point: opens the MIDI input, runs the controller on a fixed
//! tick, and traces the resulting reports. The report transport to an actual
//! console lives outside this process.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use midir::{MidiInput, MidiInputConnection};
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use drumpad_gw::config::AppConfig;
use drumpad_gw::controller::Controller;
use drumpad_gw::io::{NullInputs, OutputSink, OUTPUT_COUNT};
use drumpad_gw::report::{Report, ReportSink};
use drumpad_gw::store::{MemStore, SettingsStore, SledStore};

/// Drumpad Gateway - turn percussion MIDI into game-controller input reports
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// MIDI input port name pattern or index (overrides the config file)
    #[arg(short, long)]
    port: Option<String>,

    /// Keep settings in memory instead of the on-disk store
    #[arg(long)]
    ephemeral: bool,

    /// List available MIDI input ports
    #[arg(long)]
    list_ports: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(&args.log_level)?;

    if args.list_ports {
        return list_ports();
    }

    info!("Starting Drumpad GW...");
    info!("Configuration file: {}", args.config);

    let mut config = AppConfig::load(&args.config).await?;
    if let Some(port) = args.port {
        config.midi.input_port = Some(port);
    }

    let store: Box<dyn SettingsStore> = if args.ephemeral {
        info!("Using in-memory settings store");
        Box::new(MemStore::new())
    } else {
        info!("Settings store: {}", config.store_path.display());
        Box::new(SledStore::open(&config.store_path)?)
    };

    let (byte_tx, byte_rx) = mpsc::channel::<u8>(1024);
    let _midi = connect_midi(config.midi.input_port.as_deref(), byte_tx)?;

    let controller = Controller::new(
        &config,
        store,
        Box::new(NullInputs),
        Box::new(TraceOutputs::default()),
    );
    if controller.distress() {
        info!("Settings store was blank or stale; factory defaults restored");
    }

    run_loop(controller, config.tick_period_ms, byte_rx, shutdown_signal()).await?;

    info!("Drumpad GW shutdown complete");
    Ok(())
}

async fn run_loop(
    mut controller: Controller,
    tick_period_ms: u64,
    mut bytes: mpsc::Receiver<u8>,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    let mut sink = TraceSink::default();
    let mut ticker = tokio::time::interval(Duration::from_millis(tick_period_ms.max(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    info!("Ready to process MIDI events!");

    loop {
        tokio::select! {
            Some(byte) = bytes.recv() => {
                controller.on_byte(byte);
            }
            _ = ticker.tick() => {
                let report = controller.tick();
                sink.submit(&report);
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping event loop");
                break;
            }
        }
    }

    Ok(())
}

/// Report sink that traces changes. Stands in for the HID transport.
#[derive(Default)]
struct TraceSink {
    last: Option<Report>,
}

impl ReportSink for TraceSink {
    fn submit(&mut self, report: &Report) {
        if self.last.as_ref() == Some(report) {
            return;
        }
        match report {
            Report::Input(fields) => {
                debug!(buttons = ?fields.buttons, hat = ?fields.hat, "report");
            }
            Report::Log(log) => {
                if !log.entries.is_empty() {
                    info!(sequence = log.sequence, entries = log.entries.len(), "data log");
                }
            }
        }
        self.last = Some(report.clone());
    }
}

/// Output sink that traces level changes on the channel indicator lines.
#[derive(Default)]
struct TraceOutputs {
    lines: [bool; OUTPUT_COUNT],
}

impl OutputSink for TraceOutputs {
    fn set_output(&mut self, channel: usize, active: bool) {
        if channel < OUTPUT_COUNT && self.lines[channel] != active {
            self.lines[channel] = active;
            debug!(channel, active, "output line");
        }
    }
}

fn connect_midi(pattern: Option<&str>, tx: mpsc::Sender<u8>) -> Result<MidiInputConnection<()>> {
    let midi_in = MidiInput::new("Drumpad-GW")?;
    let port = find_port(&midi_in, pattern)?;
    let name = midi_in
        .port_name(&port)
        .unwrap_or_else(|_| "<unknown>".to_string());
    info!("Connecting to MIDI input: {}", name);

    let conn = midi_in.connect(
        &port,
        "drumpad-gw-in",
        move |_timestamp, data, _| {
            for &byte in data {
                // Drop bytes rather than block the MIDI thread.
                let _ = tx.try_send(byte);
            }
        },
        (),
    );
    let conn = conn.map_err(|e| anyhow::anyhow!("failed to connect MIDI input: {e}"))?;
    Ok(conn)
}

fn find_port(midi_in: &MidiInput, pattern: Option<&str>) -> Result<midir::MidiInputPort> {
    let ports = midi_in.ports();
    match pattern {
        Some(pattern) => {
            if let Ok(index) = pattern.parse::<usize>() {
                return ports
                    .into_iter()
                    .nth(index)
                    .with_context(|| format!("no MIDI port at index {index}"));
            }
            for port in ports {
                if let Ok(name) = midi_in.port_name(&port) {
                    if name.to_lowercase().contains(&pattern.to_lowercase()) {
                        return Ok(port);
                    }
                }
            }
            anyhow::bail!("no MIDI port matching pattern: {pattern}")
        }
        None => ports
            .into_iter()
            .next()
            .context("no MIDI input ports available"),
    }
}

fn list_ports() -> Result<()> {
    let midi_in = MidiInput::new("Drumpad-GW")?;
    let ports = midi_in.ports();
    if ports.is_empty() {
        println!("No MIDI input ports available");
        return Ok(());
    }
    println!("Available MIDI input ports:");
    for (index, port) in ports.iter().enumerate() {
        let name = midi_in
            .port_name(port)
            .unwrap_or_else(|_| "<unknown>".to_string());
        println!("  [{index}] {name}");
    }
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    info!("Shutdown signal received");
}
