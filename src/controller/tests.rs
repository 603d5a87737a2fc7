use super::*;
use crate::buttons::DebounceThresholds;
use crate::host::{opcode, COMMAND_PREFIX, REQUEST_SIZE};
use crate::io::{InputLines, OutputSink, RawInputs, OUTPUT_COUNT};
use crate::report::{HatDir, InputReport, Report, ReportButtons};
use crate::store::MemStore;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct SharedInputs(Arc<Mutex<RawInputs>>);

impl SharedInputs {
    fn set(&self, f: impl FnOnce(&mut RawInputs)) {
        f(&mut self.0.lock().unwrap());
    }
}

impl InputLines for SharedInputs {
    fn sample(&mut self) -> RawInputs {
        *self.0.lock().unwrap()
    }
}

#[derive(Clone, Default)]
struct SharedOutputs(Arc<Mutex<[bool; OUTPUT_COUNT]>>);

impl SharedOutputs {
    fn get(&self, line: usize) -> bool {
        self.0.lock().unwrap()[line]
    }
}

impl OutputSink for SharedOutputs {
    fn set_output(&mut self, channel: usize, active: bool) {
        if channel < OUTPUT_COUNT {
            self.0.lock().unwrap()[channel] = active;
        }
    }
}

/// Short debounce thresholds keep the tests readable: press edge after 3
/// ticks, held after 6, held long after 11, super long after 21.
fn test_config() -> crate::config::AppConfig {
    crate::config::AppConfig {
        debounce: DebounceThresholds {
            press: 2,
            hold: 5,
            long_hold: 10,
            super_long_hold: 20,
        },
        ..Default::default()
    }
}

fn harness() -> (Controller, SharedInputs, SharedOutputs) {
    let inputs = SharedInputs::default();
    let outputs = SharedOutputs::default();
    let ctrl = Controller::new(
        &test_config(),
        Box::new(MemStore::new()),
        Box::new(inputs.clone()),
        Box::new(outputs.clone()),
    );
    (ctrl, inputs, outputs)
}

fn tick_n(ctrl: &mut Controller, n: usize) -> Report {
    let mut last = ctrl.tick();
    for _ in 1..n {
        last = ctrl.tick();
    }
    last
}

fn feed(ctrl: &mut Controller, bytes: &[u8]) {
    for &b in bytes {
        ctrl.on_byte(b);
    }
}

fn fields(report: &Report) -> &InputReport {
    match report {
        Report::Input(f) => f,
        Report::Log(_) => panic!("expected an input report"),
    }
}

fn request(op: u8, seq: u8, params: [u8; 5]) -> [u8; REQUEST_SIZE] {
    [
        COMMAND_PREFIX,
        op,
        seq,
        params[0],
        params[1],
        params[2],
        params[3],
        params[4],
    ]
}

/// Hold Start long enough to toggle in or out of map programming, then let
/// go and settle.
fn toggle_start(ctrl: &mut Controller, inputs: &SharedInputs) {
    inputs.set(|r| r.start = true);
    tick_n(ctrl, 6);
    inputs.set(|r| r.start = false);
    tick_n(ctrl, 3);
}

/// Hold Center to advance through the programming mode cycle.
fn hold_center(ctrl: &mut Controller, inputs: &SharedInputs) {
    inputs.set(|r| r.nav_center = true);
    tick_n(ctrl, 6);
    inputs.set(|r| r.nav_center = false);
    tick_n(ctrl, 3);
}

fn click(ctrl: &mut Controller, inputs: &SharedInputs, f: fn(&mut RawInputs, bool)) {
    inputs.set(|r| f(r, true));
    tick_n(ctrl, 3);
    inputs.set(|r| f(r, false));
    tick_n(ctrl, 3);
}

#[test]
fn blank_store_boots_with_distress_and_defaults() {
    let (ctrl, _, _) = harness();
    assert!(ctrl.distress());
    assert_eq!(ctrl.mode(), DeviceMode::Play);
    assert_eq!(ctrl.settings().hold_count, 5);
    assert_eq!(ctrl.settings().min_velocity, 10);
    // Factory bank 0: the snare lands on the red pad channel.
    assert_eq!(ctrl.map().lookup(38, 0), Some(0));
}

#[test]
fn mapped_note_pulses_channel_for_hold_duration() {
    let (mut ctrl, _, _) = harness();
    feed(&mut ctrl, &[0x90, 38, 100]);

    for _ in 0..5 {
        let report = ctrl.tick();
        let f = fields(&report);
        assert!(f.buttons.contains(ReportButtons::RED_DRUM));
        assert!(f.buttons.contains(ReportButtons::DRUM_HIT));
        // Rock Band velocity transform.
        assert_eq!(f.velocity[0], 0xFF - 200);
    }
    let report = ctrl.tick();
    assert!(!fields(&report).buttons.contains(ReportButtons::RED_DRUM));
}

#[test]
fn quiet_notes_are_ignored() {
    let (mut ctrl, _, _) = harness();
    feed(&mut ctrl, &[0x90, 38, 5]); // below the default threshold of 10
    let report = ctrl.tick();
    assert!(fields(&report).buttons.is_empty());
}

#[test]
fn velocity_zero_does_not_activate() {
    let (mut ctrl, _, _) = harness();
    feed(&mut ctrl, &[0x90, 38, 0]);
    let report = ctrl.tick();
    assert!(fields(&report).buttons.is_empty());
}

#[test]
fn one_note_can_drive_multiple_channels() {
    let (mut ctrl, _, _) = harness();
    // Teach note 99 to two channels through the host protocol, then leave
    // command mode.
    ctrl.handle_host_request(&request(opcode::SET_NOTE_MAPPING, 1, [0, 5, 99, 0, 0]));
    ctrl.handle_host_request(&request(opcode::SET_NOTE_MAPPING, 2, [1, 2, 99, 0, 0]));
    ctrl.handle_host_request(&request(opcode::CLEAR, 3, [0; 5]));

    feed(&mut ctrl, &[0x90, 99, 100]);
    let report = ctrl.tick();
    let f = fields(&report);
    assert!(f.buttons.contains(ReportButtons::RED_DRUM));
    assert!(f.buttons.contains(ReportButtons::YELLOW_DRUM));
}

#[test]
fn start_held_toggles_map_programming() {
    let (mut ctrl, inputs, _) = harness();
    toggle_start(&mut ctrl, &inputs);
    assert_eq!(ctrl.mode(), DeviceMode::ProgramMap);

    // Notes do not reach the outputs while programming.
    feed(&mut ctrl, &[0x90, 48, 100]);
    let report = ctrl.tick();
    assert!(fields(&report).buttons.is_empty());

    toggle_start(&mut ctrl, &inputs);
    assert_eq!(ctrl.mode(), DeviceMode::Play);
}

#[test]
fn programming_teaches_and_survives_mode_round_trip() {
    let (mut ctrl, inputs, _) = harness();
    toggle_start(&mut ctrl, &inputs);

    // Channel 0 is selected on entry; an incoming note is appended.
    feed(&mut ctrl, &[0x90, 99, 100]);
    ctrl.tick();
    assert_eq!(ctrl.map().lookup(99, 0), Some(0));

    toggle_start(&mut ctrl, &inputs);
    assert_eq!(ctrl.mode(), DeviceMode::Play);
    assert_eq!(ctrl.map().lookup(99, 0), Some(0));

    // And the taught note now plays.
    feed(&mut ctrl, &[0x90, 99, 100]);
    let report = ctrl.tick();
    assert!(fields(&report).buttons.contains(ReportButtons::RED_DRUM));
}

#[test]
fn down_selects_next_channel_for_programming() {
    let (mut ctrl, inputs, _) = harness();
    toggle_start(&mut ctrl, &inputs);

    click(&mut ctrl, &inputs, |r, v| r.nav_down = v);
    feed(&mut ctrl, &[0x90, 99, 100]);
    ctrl.tick();
    assert_eq!(ctrl.map().lookup(99, 0), Some(1));
}

#[test]
fn back_held_clears_the_selected_channel() {
    let (mut ctrl, inputs, _) = harness();
    toggle_start(&mut ctrl, &inputs);

    inputs.set(|r| r.back = true);
    tick_n(&mut ctrl, 6); // held edge
    inputs.set(|r| r.back = false);
    tick_n(&mut ctrl, 3);

    assert_eq!(ctrl.map().lookup(38, 0), None);
    // Other channels are untouched.
    assert_eq!(ctrl.map().lookup(48, 0), Some(1));
}

#[test]
fn back_held_super_long_restores_defaults_and_exits() {
    let (mut ctrl, inputs, _) = harness();
    toggle_start(&mut ctrl, &inputs);
    feed(&mut ctrl, &[0x90, 99, 100]);
    ctrl.tick();
    assert_eq!(ctrl.map().lookup(99, 0), Some(0));

    inputs.set(|r| r.back = true);
    tick_n(&mut ctrl, 21); // through held, held long, and super long
    inputs.set(|r| r.back = false);
    tick_n(&mut ctrl, 3);

    assert_eq!(ctrl.mode(), DeviceMode::Play);
    assert_eq!(ctrl.map().lookup(99, 0), None);
    assert_eq!(ctrl.map().lookup(38, 0), Some(0));
}

#[test]
fn velocity_threshold_moves_in_quantized_steps() {
    let (mut ctrl, inputs, _) = harness();
    toggle_start(&mut ctrl, &inputs);
    hold_center(&mut ctrl, &inputs);
    assert_eq!(ctrl.mode(), DeviceMode::ProgramVelocity);

    // Default 10 sits below the first step; Down moves to the next step up.
    click(&mut ctrl, &inputs, |r, v| r.nav_down = v);
    assert_eq!(ctrl.settings().min_velocity, 20);
    click(&mut ctrl, &inputs, |r, v| r.nav_down = v);
    assert_eq!(ctrl.settings().min_velocity, 40);
    // Up goes back down; at level 1 it drops to zero.
    click(&mut ctrl, &inputs, |r, v| r.nav_up = v);
    assert_eq!(ctrl.settings().min_velocity, 20);
    click(&mut ctrl, &inputs, |r, v| r.nav_up = v);
    assert_eq!(ctrl.settings().min_velocity, 0);

    // Clamped at six steps.
    for _ in 0..10 {
        click(&mut ctrl, &inputs, |r, v| r.nav_down = v);
    }
    assert_eq!(ctrl.settings().min_velocity, 120);
}

#[test]
fn hold_duration_is_bounded_one_to_six() {
    let (mut ctrl, inputs, _) = harness();
    toggle_start(&mut ctrl, &inputs);
    hold_center(&mut ctrl, &inputs); // velocity
    hold_center(&mut ctrl, &inputs); // duration
    assert_eq!(ctrl.mode(), DeviceMode::ProgramDuration);

    for _ in 0..10 {
        click(&mut ctrl, &inputs, |r, v| r.nav_up = v);
    }
    assert_eq!(ctrl.settings().hold_count, 1);
    for _ in 0..10 {
        click(&mut ctrl, &inputs, |r, v| r.nav_down = v);
    }
    assert_eq!(ctrl.settings().hold_count, 6);

    // Center held again wraps back to map programming.
    hold_center(&mut ctrl, &inputs);
    assert_eq!(ctrl.mode(), DeviceMode::ProgramMap);
}

#[test]
fn host_command_forces_play_and_echoes_response() {
    let (mut ctrl, inputs, _) = harness();
    toggle_start(&mut ctrl, &inputs);
    assert_eq!(ctrl.mode(), DeviceMode::ProgramMap);

    ctrl.handle_host_request(&request(opcode::GET_VERSION, 42, [0; 5]));
    assert!(ctrl.command_mode());

    let report = ctrl.tick();
    assert_eq!(ctrl.mode(), DeviceMode::Play);
    assert_eq!(fields(&report).axes, [3, 9, 42, 0]);

    ctrl.handle_host_request(&request(opcode::CLEAR, 43, [0; 5]));
    assert!(!ctrl.command_mode());
}

#[test]
fn swap_note_cycles_the_bank() {
    let (mut ctrl, _, _) = harness();
    ctrl.handle_host_request(&request(opcode::SET_SWAP_NOTE, 1, [100, 0, 0, 0, 0]));
    ctrl.handle_host_request(&request(opcode::CLEAR, 2, [0; 5]));
    assert_eq!(ctrl.map().bank(), 0);

    feed(&mut ctrl, &[0x90, 100, 90]);
    ctrl.tick();
    assert_eq!(ctrl.map().bank(), 1);
    // Bank 1 defaults are live.
    assert_eq!(ctrl.map().lookup(22, 0), Some(1));

    // The latched note was consumed; nothing swaps again.
    ctrl.tick();
    assert_eq!(ctrl.map().bank(), 1);
}

#[test]
fn sticky_kick_latches_until_cancelled() {
    let (mut ctrl, inputs, _) = harness();
    inputs.set(|r| r.nav_left = true);
    tick_n(&mut ctrl, 6); // held
    inputs.set(|r| r.nav_left = false);
    let report = tick_n(&mut ctrl, 3);

    let f = fields(&report);
    assert!(f.buttons.contains(ReportButtons::KICK_PEDAL));
    assert_eq!(f.hat, HatDir::Centered);

    // Pressing right cancels it.
    inputs.set(|r| r.nav_right = true);
    let report = tick_n(&mut ctrl, 3);
    inputs.set(|r| r.nav_right = false);
    assert!(!fields(&report).buttons.contains(ReportButtons::KICK_PEDAL));
}

#[test]
fn back_held_reports_only_the_system_button() {
    let (mut ctrl, inputs, _) = harness();
    inputs.set(|r| r.back = true);
    let report = tick_n(&mut ctrl, 6);
    assert_eq!(fields(&report).buttons, ReportButtons::SYSTEM);
}

#[test]
fn hihat_pedal_follows_threshold_and_substitutes_notes() {
    let (mut ctrl, _, outputs) = harness();
    ctrl.handle_host_request(&request(opcode::SET_HIHAT_THRESHOLD, 1, [64, 0, 0, 0, 0]));
    ctrl.handle_host_request(&request(opcode::CLEAR, 2, [0; 5]));

    // Pedal pressed past the threshold raises the pedal output with no
    // note involved.
    feed(&mut ctrl, &[0xB0, 4, 100]);
    let report = ctrl.tick();
    assert!(fields(&report).buttons.contains(ReportButtons::HIHAT_PEDAL));
    assert!(outputs.get(crate::io::HIHAT_OUTPUT));

    // Open-hat note 46 is rewritten to closed 42 while the pedal is past
    // the threshold; on bank 0 both land on the yellow cymbal channel.
    feed(&mut ctrl, &[0x90, 46, 90]);
    let report = ctrl.tick();
    let f = fields(&report);
    assert!(f.buttons.contains(ReportButtons::CYMBAL_HIT));
}

#[test]
fn data_log_replaces_reports_while_enabled() {
    let (mut ctrl, _, _) = harness();
    ctrl.handle_host_request(&request(opcode::SET_LOGGING, 1, [1, 0, 0, 0, 0]));

    feed(&mut ctrl, &[0x90, 38, 100]);
    let report = ctrl.tick();
    match report {
        Report::Log(log) => {
            assert_eq!(log.sequence, 1);
            // The status byte is not logged, only the two data bytes.
            assert_eq!(log.entries.len(), 2);
            assert_eq!(log.entries[0].1, 38);
            assert_eq!(log.entries[1].1, 100);
        }
        Report::Input(_) => panic!("expected a log report"),
    }

    // Nothing new: the next log is empty and keeps its sequence.
    match ctrl.tick() {
        Report::Log(log) => {
            assert_eq!(log.sequence, 1);
            assert!(log.entries.is_empty());
        }
        Report::Input(_) => panic!("expected a log report"),
    }

    ctrl.handle_host_request(&request(opcode::CLEAR, 2, [0; 5]));
    assert!(matches!(ctrl.tick(), Report::Input(_)));
}

#[test]
fn quick_bank_change_gesture() {
    let (mut ctrl, inputs, _) = harness();
    // Up held down, then Back pressed.
    inputs.set(|r| r.nav_up = true);
    tick_n(&mut ctrl, 4);
    inputs.set(|r| r.back = true);
    tick_n(&mut ctrl, 3);
    assert_eq!(ctrl.map().bank(), 1);
}
