//! Sub-song detection by walking the order list without mixing.

use alloc::vec;
use alloc::vec::Vec;
use tp_ir::{EventPayload, EventTarget, Module};

use crate::event_queue::EventQueue;
use crate::sequencer::Sequencer;

/// Guard against modules whose flow never reaches a played row again.
const MAX_SCAN_TICKS: u32 = 1 << 22;

/// A playable sub-song.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SequenceInfo {
    /// Order entry the sequence starts at
    pub entry: usize,
    pub duration_ms: u64,
}

/// Find every sequence in the module.
///
/// The first sequence starts at order 0. Any order entry not reached by an
/// earlier sequence starts another one.
pub fn scan_sequences(module: &Module) -> Vec<SequenceInfo> {
    let mut reached = vec![false; module.order.len()];
    let mut sequences = Vec::new();
    let mut sequencer = Sequencer::new();
    let mut queue = EventQueue::new();

    for entry in 0..module.order.len() {
        if reached[entry] {
            continue;
        }
        sequencer.reset(module, entry);
        let mut micros: u64 = 0;
        let mut ticks = 0;
        loop {
            if let Some(slot) = reached.get_mut(sequencer.order()) {
                *slot = true;
            }
            if sequencer.tick() == 0 {
                queue.decode_row(module, sequencer.order(), sequencer.row());
                for event in queue.iter().filter(|e| e.target == EventTarget::Global) {
                    if !matches!(
                        event.payload,
                        EventPayload::SetGlobalVolume(_) | EventPayload::GlobalVolumeSlide(_)
                    ) {
                        sequencer.apply(&event.payload);
                    }
                }
            }
            micros += 2_500_000 / sequencer.bpm() as u64;
            ticks += 1;
            if !sequencer.advance(module, false) || ticks >= MAX_SCAN_TICKS {
                break;
            }
        }
        log::debug!("sequence at order {entry}: {ticks} ticks");
        sequences.push(SequenceInfo {
            entry,
            duration_ms: micros / 1000,
        });
    }
    sequences
}
