//! Allocation-free render path tests.
//!
//! Every render here runs under `assert_no_alloc`, which aborts the test
//! on any heap allocation. The modules exercise row commands that touch
//! sequencer and voice state: jumps, breaks, loops, delays, retriggers,
//! sample offsets and key-offs.

mod common;

use std::sync::Arc;

use assert_no_alloc::{assert_no_alloc, AllocDisabler};
use common::{build_mod, two_pattern_song, ModCell};
use tp_engine::{Engine, EngineConfig, Frame, Interpolation, RenderStatus};

#[cfg(debug_assertions)]
#[global_allocator]
static A: AllocDisabler = AllocDisabler;

fn engine_for(data: &[u8], interpolation: Interpolation) -> Engine {
    let module = tp_formats::load(data).unwrap();
    let mut engine = Engine::new(EngineConfig {
        sample_rate: 44100,
        voices: 64,
        interpolation,
        stereo_separation: 70,
    });
    engine.load(Arc::new(module)).unwrap();
    engine.set_loop(true);
    assert!(engine.start());
    engine
}

/// Render `seconds` of audio in odd-sized blocks, aborting on allocation.
fn assert_render_alloc_free(engine: &mut Engine, seconds: usize) {
    let mut block = vec![Frame::silence(); 777];
    let blocks = 44100 * seconds / block.len();
    assert_no_alloc(|| {
        for _ in 0..blocks {
            assert_eq!(engine.render(&mut block), RenderStatus::Continue);
        }
    });
}

fn effects_song() -> Vec<u8> {
    let cells = [
        (0, 0, 0, ModCell::note(428, 1)),
        (0, 0, 1, ModCell { period: 214, sample: 1, effect: 0x4, param: 0x48 }),
        (0, 4, 2, ModCell { period: 856, sample: 1, effect: 0x9, param: 0x01 }),
        (0, 8, 3, ModCell { period: 320, sample: 1, effect: 0xE, param: 0x93 }),
        (0, 12, 0, ModCell::effect(0xE, 0x60)),
        (0, 14, 0, ModCell::effect(0xE, 0x62)),
        (0, 16, 1, ModCell { period: 0, sample: 0, effect: 0x3, param: 0x10 }),
        (0, 20, 2, ModCell::effect(0xE, 0xE2)),
        (0, 24, 3, ModCell { period: 508, sample: 1, effect: 0xE, param: 0xD3 }),
        (0, 28, 0, ModCell::effect(0xA, 0x0F)),
        (0, 30, 1, ModCell::effect(0xE, 0xC2)),
        (0, 40, 2, ModCell::effect(0xD, 0x10)),
        (1, 20, 0, ModCell::effect(0xF, 0x40)),
        (1, 30, 3, ModCell::effect(0x0, 0x37)),
        (1, 63, 0, ModCell::effect(0xB, 0x00)),
    ];
    build_mod("effects", &[0, 1, 0], 2, &cells)
}

#[test]
fn plain_song_alloc_free() {
    let mut engine = engine_for(&two_pattern_song(), Interpolation::Linear);
    assert_render_alloc_free(&mut engine, 5);
}

#[test]
fn effects_song_alloc_free() {
    let mut engine = engine_for(&effects_song(), Interpolation::Linear);
    assert_render_alloc_free(&mut engine, 10);
}

#[test]
fn nearest_interpolation_alloc_free() {
    let mut engine = engine_for(&effects_song(), Interpolation::Nearest);
    assert_render_alloc_free(&mut engine, 5);
}

#[test]
fn play_tick_alloc_free() {
    let mut engine = engine_for(&effects_song(), Interpolation::Linear);
    assert_no_alloc(|| {
        for _ in 0..2000 {
            engine.play_tick();
        }
    });
    assert!(!engine.last_tick().is_empty());
}
