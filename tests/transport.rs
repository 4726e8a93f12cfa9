//! Transport state machine through the session surface.

mod common;

use std::io::Cursor;
use std::sync::atomic::Ordering;

use common::{loaded, session, two_pattern_song, SAMPLE_RATE};
use tp_audio::NullOutput;
use tp_master::{Session, TransportState, INFO_VALUES, TICK_CONTINUE, TICK_FAILED};

#[test]
fn start_before_init_fails() {
    let mut session = Session::new(common::null_config());
    assert!(!session.start_module());
    assert_eq!(session.state(), TransportState::Uninitialized);
    assert!(session.channel_arrays().is_empty());
}

#[test]
fn full_lifecycle() {
    let mut session = loaded(&two_pattern_song());
    assert_eq!(session.state(), TransportState::Loaded);

    assert!(session.start_module());
    assert_eq!(session.state(), TransportState::Playing);
    assert!(session.pause(true));
    assert_eq!(session.state(), TransportState::Paused);
    assert!(!session.pause(false));
    assert_eq!(session.state(), TransportState::Playing);

    session.stop_module();
    assert_eq!(session.state(), TransportState::Stopped);
    assert!(session.restart_module());
    assert_eq!(session.state(), TransportState::Playing);
    session.stop_module();

    session.release_module();
    assert_eq!(session.state(), TransportState::Released);
    assert!(session.module_name().is_none());

    session.deinit_player();
    assert_eq!(session.state(), TransportState::Uninitialized);
}

#[test]
fn rejected_operations_change_nothing() {
    let mut session = session();
    assert!(!session.pause(true));
    session.stop_module();
    assert_eq!(session.tick(false), TICK_FAILED);
    assert_eq!(session.state(), TransportState::Initialized);

    assert!(session.load_from_source(Cursor::new(two_pattern_song())));
    assert!(!session.restart_module());
    session.deinit_player();
    assert_eq!(session.state(), TransportState::Loaded);

    assert!(session.start_module());
    assert!(!session.load_from_source(Cursor::new(two_pattern_song())));
    session.release_module();
    assert_eq!(session.state(), TransportState::Playing);
}

#[test]
fn pause_with_current_flag_is_a_no_op() {
    let mut session = loaded(&two_pattern_song());
    session.start_module();
    assert!(!session.pause(false));
    assert_eq!(session.state(), TransportState::Playing);
    assert!(session.pause(true));
    assert!(session.pause(true));
    assert_eq!(session.state(), TransportState::Paused);
}

#[test]
fn failed_load_keeps_previous_module() {
    let mut session = loaded(&two_pattern_song());
    assert!(!session.load_from_source(Cursor::new(vec![0u8; 3000])));
    assert_eq!(session.state(), TransportState::Loaded);
    assert_eq!(session.module_name().as_deref(), Some("two patterns"));

    session.start_module();
    session.stop_module();
    // Truncated: the patterns are missing
    let truncated = &two_pattern_song()[..1500];
    assert!(!session.load_from_source(Cursor::new(truncated)));
    assert_eq!(session.state(), TransportState::Stopped);
    assert_eq!(session.module_name().as_deref(), Some("two patterns"));
}

#[test]
fn module_metadata() {
    let session = loaded(&two_pattern_song());
    assert!(session.module_type().is_some());
    let instruments = session.instruments().unwrap();
    assert_eq!(instruments[0], "01 square");
    assert!(Session::supported_formats().contains(&"M.K."));
    assert!(!Session::version().is_empty());

    let vars = session.module_vars().unwrap();
    // 768 ticks of 20 ms, 2 orders, 2 patterns, 4 channels, 1 sequence
    assert_eq!(vars[..4], [15_360, 2, 2, 4]);
    assert_eq!(vars[6..], [1, 0]);
}

#[test]
fn info_needs_playback() {
    let mut session = loaded(&two_pattern_song());
    let mut values = [0; INFO_VALUES];
    let mut channels = session.channel_arrays();
    assert!(!session.get_info(&mut values, &mut channels));
    assert_eq!(session.time(), -1);

    session.start_module();
    assert_eq!(session.tick(false), TICK_CONTINUE);
    assert!(session.get_info(&mut values, &mut channels));
    assert_eq!(session.time(), 20);
}

#[test]
fn channel_arrays_cover_every_voice_slot() {
    let mut session = loaded(&two_pattern_song());
    let mut values = [0; INFO_VALUES];
    let mut channels = session.channel_arrays();
    assert_eq!(channels.len(), 64);

    session.start_module();
    session.tick(false);
    assert!(session.get_info(&mut values, &mut channels));
    assert_eq!(values, [0, 0, 0, 64, 0, 6, 125]);
    for ch in 0..4 {
        assert!(channels.final_volumes[ch] > 0);
        assert_eq!(channels.instruments[ch], 1);
        assert_eq!(channels.periods[ch], 1712);
    }
    assert!(channels.final_volumes[4..].iter().all(|&v| v == 0));
    assert!(channels.instruments[4..].iter().all(|&v| v == 0));
    assert!(channels.periods[4..].iter().all(|&v| v == 0));
}

#[test]
fn device_fault_surfaces_on_tick() {
    let output = NullOutput::new(SAMPLE_RATE, 100);
    let fault = output.fault_handle();
    let mut session = Session::new(common::null_config());
    assert!(session.init_with_output(Box::new(output)));
    assert!(session.load_from_source(Cursor::new(two_pattern_song())));
    assert!(session.start_module());
    assert_eq!(session.tick(false), TICK_CONTINUE);

    fault.store(true, Ordering::Relaxed);
    assert_eq!(session.tick(false), TICK_FAILED);
    assert_eq!(session.state(), TransportState::Playing);

    fault.store(false, Ordering::Relaxed);
    assert_eq!(session.tick(false), TICK_CONTINUE);
}

#[test]
fn end_player_returns_to_loaded() {
    let mut session = loaded(&two_pattern_song());
    session.start_module();
    session.tick(false);
    session.end_player();
    assert_eq!(session.state(), TransportState::Loaded);
    assert!(session.start_module());
}

#[test]
fn set_position_jumps_while_playing() {
    let mut session = loaded(&two_pattern_song());
    assert!(!session.set_position(1));
    session.start_module();
    assert!(session.set_position(1));
    assert!(!session.set_position(2));
    session.tick(false);

    let mut values = [0; INFO_VALUES];
    let mut channels = session.channel_arrays();
    session.get_info(&mut values, &mut channels);
    assert_eq!(&values[..3], &[1, 1, 0]);
}

#[test]
fn output_counts_frames_written_while_playing() {
    let mut session = loaded(&two_pattern_song());
    assert!(session.controller().output_stats().is_some_and(|s| s.frames_played == 0));
    session.start_module();
    for _ in 0..3 {
        session.tick(false);
    }
    session.pause(true);
    session.tick(false);
    let stats = session.controller().output_stats().unwrap();
    // three 20 ms ticks at 8 kHz
    assert_eq!(stats.frames_played, 3 * SAMPLE_RATE as u64 / 50);
    assert_eq!(stats.underruns, 0);
}
