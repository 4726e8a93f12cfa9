//! CPAL-based audio output backend.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, SampleRate, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use tp_engine::Frame;

use crate::traits::{AudioError, AudioOutput, OutputStats};

/// State shared with the device threads.
///
/// Control is level-triggered: the callback reads the latest pause flag and
/// the number of frames to discard, so no request can be lost.
struct Shared {
    paused: AtomicBool,
    /// Queued frames the callback drops before playing again
    discard: AtomicUsize,
    frames_played: AtomicU64,
    underruns: AtomicU64,
    /// Written only by the stream error callback
    error: Mutex<Option<String>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            paused: AtomicBool::new(true),
            discard: AtomicUsize::new(0),
            frames_played: AtomicU64::new(0),
            underruns: AtomicU64::new(0),
            error: Mutex::new(None),
        }
    }

    fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    /// Drop the `queued` frames currently in the ring, but none written later.
    fn discard(&self, queued: usize) {
        self.discard.fetch_add(queued, Ordering::AcqRel);
    }

    /// Device callback body: fill interleaved stereo `data` from the ring.
    fn fill(&self, data: &mut [f32], consumer: &mut HeapCons<Frame>) {
        let discard = self.discard.swap(0, Ordering::AcqRel);
        if discard > 0 {
            consumer.skip(discard.min(consumer.occupied_len()));
        }

        if self.paused.load(Ordering::Acquire) {
            data.fill(0.0);
            return;
        }

        let mut played = 0;
        for chunk in data.chunks_mut(2) {
            let (left, right) = match consumer.try_pop() {
                Some(frame) => {
                    played += 1;
                    frame.to_f32()
                }
                None => (0.0, 0.0),
            };
            for (i, sample) in chunk.iter_mut().enumerate() {
                *sample = if i == 0 { left } else { right };
            }
        }
        self.frames_played.fetch_add(played, Ordering::Relaxed);
        if (played as usize) < data.len() / 2 {
            self.underruns.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// CPAL-based audio output.
///
/// Frames travel through a lock-free ring to the device callback, which
/// only pops frames, reads the control atomics and bumps counters. The
/// stream runs from open until drop; stop and pause turn it silent.
pub struct CpalOutput {
    sample_rate: u32,
    _stream: Stream,
    producer: HeapProd<Frame>,
    shared: Arc<Shared>,
}

impl CpalOutput {
    /// Open the default device at `sample_rate`, falling back to the
    /// device's own rate if it cannot do stereo float output at that rate.
    pub fn open(sample_rate: u32, buffer_ms: u32) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;
        let name = device.name().unwrap_or_else(|_| "unknown".into());

        let default = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?;
        let supported = device
            .supported_output_configs()
            .map(|mut configs| {
                configs.any(|c| {
                    c.channels() >= 2
                        && c.sample_format() == SampleFormat::F32
                        && (c.min_sample_rate().0..=c.max_sample_rate().0).contains(&sample_rate)
                })
            })
            .unwrap_or(false);
        let rate = if supported {
            sample_rate
        } else {
            log::warn!(
                "{name} does not support {sample_rate} Hz stereo f32, using {} Hz",
                default.sample_rate().0
            );
            default.sample_rate().0
        };

        let config = StreamConfig {
            channels: 2,
            sample_rate: SampleRate(rate),
            buffer_size: BufferSize::Default,
        };

        let ring_frames = (rate as usize * buffer_ms.max(10) as usize / 1000).max(1024);
        let (producer, consumer) = HeapRb::<Frame>::new(ring_frames).split();
        // Silent until started
        let shared = Arc::new(Shared::new());

        let stream = build_stream(&device, &config, consumer, Arc::clone(&shared))?;
        stream.play().map_err(|e| AudioError::Playback(e.to_string()))?;
        log::info!("opened {name} at {rate} Hz, {ring_frames} frame queue");

        Ok(Self {
            sample_rate: rate,
            _stream: stream,
            producer,
            shared,
        })
    }
}

fn build_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    mut consumer: HeapCons<Frame>,
    shared: Arc<Shared>,
) -> Result<Stream, AudioError> {
    let errors = Arc::clone(&shared);

    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| shared.fill(data, &mut consumer),
            move |err| {
                log::error!("audio stream error: {err}");
                if let Ok(mut slot) = errors.error.lock() {
                    slot.get_or_insert_with(|| err.to_string());
                }
            },
            None,
        )
        .map_err(|e| AudioError::StreamCreate(e.to_string()))
}

impl AudioOutput for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn capacity(&self) -> usize {
        self.producer.capacity().get()
    }

    fn queued(&self) -> usize {
        self.producer.occupied_len()
    }

    fn write(&mut self, frames: &[Frame]) -> usize {
        self.producer.push_slice(frames)
    }

    fn start(&mut self) -> Result<(), AudioError> {
        self.shared.set_paused(false);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.shared.set_paused(true);
        self.shared.discard(self.producer.occupied_len());
        Ok(())
    }

    fn set_paused(&mut self, paused: bool) {
        self.shared.set_paused(paused);
    }

    fn take_error(&mut self) -> Option<AudioError> {
        let mut slot = self.shared.error.lock().ok()?;
        slot.take().map(AudioError::Stream)
    }

    fn stats(&self) -> OutputStats {
        OutputStats {
            frames_played: self.shared.frames_played.load(Ordering::Relaxed),
            underruns: self.shared.underruns.load(Ordering::Relaxed),
        }
    }
}
