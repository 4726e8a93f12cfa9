//! Sequencer flow and mixing through the full player.

mod common;

use std::sync::Arc;

use common::{build_mod, loaded, two_pattern_song, ModCell};
use tp_engine::EngineConfig;
use tp_master::{render_frames, render_to_wav, RenderOptions, Session, TransportState, INFO_VALUES, TICK_CONTINUE, TICK_END_OF_SONG, TICK_FAILED};

fn info(session: &Session) -> [i32; INFO_VALUES] {
    let mut values = [0; INFO_VALUES];
    let mut channels = session.channel_arrays();
    assert!(session.get_info(&mut values, &mut channels));
    values
}

/// Tick until the end of the song, checking the order on the way.
fn ticks_to_end(session: &mut Session, limit: usize) -> usize {
    for n in 1..=limit {
        match session.tick(false) {
            TICK_CONTINUE => assert!(info(session)[0] <= 1),
            TICK_END_OF_SONG => return n,
            status => panic!("tick {n} returned {status}"),
        }
    }
    panic!("no end of song within {limit} ticks");
}

#[test]
fn two_patterns_end_after_768_ticks() {
    let mut session = loaded(&two_pattern_song());
    assert!(session.start_module());

    assert_eq!(session.tick(false), TICK_CONTINUE);
    let first = info(&session);
    assert_eq!(first[2], 0);

    assert_eq!(ticks_to_end(&mut session, 10_000) + 1, 768);
    assert_eq!(session.state(), TransportState::Stopped);
    assert_eq!(session.tick(false), TICK_FAILED);
}

#[test]
fn backward_jump_ends_the_song() {
    // Bxx back to order 0 on the last row of pattern 1
    let cells = [(0, 0, 0, ModCell::note(428, 1)), (1, 63, 1, ModCell::effect(0xB, 0))];
    let mut session = loaded(&build_mod("jump", &[0, 1], 2, &cells));
    session.start_module();
    assert_eq!(ticks_to_end(&mut session, 10_000), 768);
}

#[test]
fn pattern_break_skips_rows() {
    // D32 on row 0 of pattern 0: continue at row 32 of pattern 1
    let cells = [(0, 0, 2, ModCell::effect(0xD, 0x32))];
    let mut session = loaded(&build_mod("break", &[0, 1], 2, &cells));
    session.start_module();
    assert_eq!(ticks_to_end(&mut session, 10_000), 6 + 32 * 6);
}

#[test]
fn speed_and_tempo_commands() {
    // F03 sets speed 3, FFA sets 250 bpm
    let cells = [(0, 0, 0, ModCell::effect(0xF, 0x03)), (0, 0, 1, ModCell::effect(0xF, 0xFA))];
    let mut session = loaded(&build_mod("speed", &[0], 1, &cells));
    session.start_module();
    session.tick(false);
    let values = info(&session);
    assert_eq!((values[5], values[6]), (3, 250));
    // 64 rows of 3 ticks
    assert_eq!(ticks_to_end(&mut session, 10_000) + 1, 192);
}

#[test]
fn looping_song_is_periodic() {
    let mut session = loaded(&two_pattern_song());
    session.start_module();

    let mut positions = Vec::new();
    for _ in 0..768 * 2 {
        assert_eq!(session.tick(true), TICK_CONTINUE);
        let values = info(&session);
        positions.push((values[0], values[2], values[4]));
    }
    assert_eq!(positions[..768], positions[768..]);
    assert_eq!(positions[767], (1, 63, 5));
    assert_eq!(session.state(), TransportState::Playing);
}

#[test]
fn pause_round_trip_keeps_position() {
    let mut session = loaded(&two_pattern_song());
    session.start_module();
    for _ in 0..100 {
        session.tick(false);
    }
    let before = info(&session);

    assert!(session.pause(true));
    for _ in 0..10 {
        assert_eq!(session.tick(false), TICK_CONTINUE);
    }
    assert_eq!(info(&session), before);
    assert!(!session.pause(false));
    assert_eq!(info(&session), before);

    session.tick(false);
    let after = info(&session);
    // tick 100 is row 16, frame 4
    assert_eq!((before[2], before[4]), (16, 3));
    assert_eq!((after[2], after[4]), (16, 4));
}

#[test]
fn restart_plays_from_the_top() {
    let mut session = loaded(&two_pattern_song());
    session.start_module();
    for _ in 0..500 {
        session.tick(false);
    }
    session.stop_module();
    assert!(session.restart_module());
    session.tick(false);
    assert_eq!(&info(&session)[..5], &[0, 0, 0, 64, 0]);
    assert_eq!(session.time(), 20);
}

#[test]
fn offline_render_is_audible_and_finite() {
    let module = tp_formats::load(&two_pattern_song()).unwrap();
    let config = EngineConfig {
        sample_rate: 8000,
        voices: 4,
        ..EngineConfig::default()
    };
    let frames = render_frames(Arc::new(module.clone()), config, RenderOptions::default(), usize::MAX).unwrap();
    // 768 ticks of 160 frames
    assert_eq!(frames.len(), 768 * 160);
    assert!(frames.iter().any(|f| f.left != 0 && f.right != 0));

    let mut wav = Vec::new();
    let written = render_to_wav(Arc::new(module), config, RenderOptions::default(), 1, &mut wav).unwrap();
    assert_eq!(written, 8000);
    assert_eq!(wav.len(), 44 + 8000 * 4);
}
