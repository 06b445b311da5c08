//! Streaming playback of one wave through one hardware voice.
//!
//! A [`VoiceStream`] owns a [`HardwareVoice`] and the feeder that keeps its
//! queue topped up from the wave. The counters the feeder writes (`read_pos`,
//! `samples_sent`, and the loop-wrap bookkeeping) live in a shared
//! [`StreamCore`] as atomics, so position queries from the control thread
//! never block the feeder.
//!
//! Playback position is computed in the hardware domain. Whenever playback is
//! positioned (creation, seek, natural end) the stream records the frames sent
//! so far (`offset_n`) and the wave position they map to (`offset_p`). The
//! frames the hardware has played since then are counted forward from
//! `offset_p`, and anything past the loop end is folded back into the loop
//! region. This holds however many wraps the feeder has queued ahead of the
//! listener.

use crate::backend::{AudioBackend, HardwareVoice, VoiceFormat};
use crate::config::{AudioConfig, FeedMode};
use chime_core::{LoopRegion, Result, Wave, Worker};
use std::sync::atomic::{fence, AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// How a stream is created and fed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamSettings {
    pub max_speed: f64,
    pub buffer_divisor: u32,
    pub feed_mode: FeedMode,
    pub feed_interval: Duration,
}

impl StreamSettings {
    pub fn from_config(config: &AudioConfig) -> Self {
        Self {
            max_speed: config.max_speed,
            buffer_divisor: config.buffer_divisor,
            feed_mode: config.feed_mode,
            feed_interval: config.feed_interval(),
        }
    }
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self::from_config(&AudioConfig::default())
    }
}

/// Where playback was last positioned, in both domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PlayBase {
    /// Frames sent when playback was positioned.
    offset_n: u64,
    /// Wave position that frame `offset_n` maps to.
    offset_p: u64,
}

/// Counters shared between a stream and its feeder.
pub(crate) struct StreamCore {
    voice: Arc<dyn HardwareVoice>,
    wave: Arc<Wave>,
    loop_region: Option<LoopRegion>,
    target_frames: usize,
    chunk_frames: usize,

    read_pos: AtomicU64,
    samples_sent: AtomicU64,
    // Seqlock over the two base fields: odd while a writer is active.
    base_seq: AtomicU64,
    offset_n: AtomicU64,
    offset_p: AtomicU64,
    // Wraps since playback was last positioned.
    loop_count: AtomicU64,

    active: AtomicBool,
    paused: AtomicBool,
    ended: AtomicBool,
}

impl StreamCore {
    fn new(
        voice: Arc<dyn HardwareVoice>,
        wave: Arc<Wave>,
        loop_region: Option<LoopRegion>,
        buffer_divisor: u32,
    ) -> Self {
        let rate = wave.sample_rate();
        Self {
            voice,
            wave,
            loop_region,
            target_frames: (rate / buffer_divisor.max(1)).max(1) as usize,
            chunk_frames: rate.max(1) as usize,
            read_pos: AtomicU64::new(0),
            samples_sent: AtomicU64::new(0),
            base_seq: AtomicU64::new(0),
            offset_n: AtomicU64::new(0),
            offset_p: AtomicU64::new(0),
            loop_count: AtomicU64::new(0),
            active: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            ended: AtomicBool::new(false),
        }
    }

    fn play_base(&self) -> PlayBase {
        loop {
            let before = self.base_seq.load(Ordering::Acquire);
            let base = PlayBase {
                offset_n: self.offset_n.load(Ordering::Relaxed),
                offset_p: self.offset_p.load(Ordering::Relaxed),
            };
            fence(Ordering::Acquire);
            let after = self.base_seq.load(Ordering::Relaxed);
            if before % 2 == 0 && before == after {
                return base;
            }
            std::hint::spin_loop();
        }
    }

    /// Re-base positions. Only runs while the feeder is not wrapping (the
    /// stream is inactive), so `loop_count` is reset alongside.
    fn set_play_base(&self, base: PlayBase) {
        self.base_seq.fetch_add(1, Ordering::Relaxed);
        fence(Ordering::Release);
        self.offset_n.store(base.offset_n, Ordering::Relaxed);
        self.offset_p.store(base.offset_p, Ordering::Relaxed);
        self.base_seq.fetch_add(1, Ordering::Release);
        self.loop_count.store(0, Ordering::Release);
    }

    /// One feeder wake-up: handle a finished stream, otherwise top up.
    fn service(&self) {
        if self.voice.take_stream_end() {
            self.on_stream_end();
            return;
        }
        self.feed(0);
    }

    /// Submit the next frames from the wave.
    fn feed(&self, required: usize) {
        if !self.active.load(Ordering::Acquire) {
            return;
        }
        let buffered = self.voice.queued_samples();
        if required == 0 && buffered > self.target_frames / 2 {
            return;
        }
        let to_feed = required
            .max(self.target_frames.saturating_sub(buffered))
            .min(self.chunk_frames);
        if to_feed == 0 {
            return;
        }

        match self.loop_region {
            None => self.feed_once(to_feed),
            Some(region) => self.feed_looped(to_feed, region),
        }
    }

    fn feed_once(&self, frames: usize) {
        let len = self.wave.len() as u64;
        let pos = self.read_pos.load(Ordering::Relaxed);
        if pos >= len {
            return;
        }
        let count = (frames as u64).min(len - pos);
        let end = pos + count;
        let accepted = self
            .voice
            .submit(self.wave.slice(pos as usize..end as usize), end == len) as u64;

        self.read_pos.store(pos + accepted, Ordering::Release);
        self.samples_sent.fetch_add(accepted, Ordering::AcqRel);
    }

    fn feed_looped(&self, frames: usize, region: LoopRegion) {
        let mut remaining = frames as u64;
        while remaining > 0 {
            let pos = self.read_pos.load(Ordering::Relaxed);
            let count = remaining.min(region.end().saturating_sub(pos));
            if count == 0 {
                break;
            }
            let accepted = self
                .voice
                .submit(self.wave.slice(pos as usize..(pos + count) as usize), false)
                as u64;
            let sent = self.samples_sent.fetch_add(accepted, Ordering::AcqRel) + accepted;
            remaining -= accepted;

            let next = pos + accepted;
            if next >= region.end() {
                let loop_count = self.loop_count.fetch_add(1, Ordering::AcqRel) + 1;
                self.read_pos.store(region.begin(), Ordering::Release);
                trace!(loop_count, sent, "Loop wrapped");
            } else {
                self.read_pos.store(next, Ordering::Release);
            }

            if accepted < count {
                // Hardware queue is full.
                break;
            }
        }
    }

    /// The hardware stopped at the end-of-stream marker: rewind so a later
    /// play starts over, and re-base positions on the hardware counter.
    fn on_stream_end(&self) {
        let sent = self.samples_sent.load(Ordering::Acquire);
        self.read_pos.store(0, Ordering::Release);
        self.set_play_base(PlayBase {
            offset_n: sent,
            offset_p: 0,
        });
        self.active.store(false, Ordering::Release);
        self.paused.store(false, Ordering::Release);
        self.ended.store(true, Ordering::Release);
        debug!(sent, "Stream reached its end");
    }

    fn set_read_pos(&self, sample: u64) {
        let clamped = match self.loop_region {
            Some(region) => sample.min(region.end() - 1),
            None => sample.min(self.wave.len() as u64),
        };
        self.set_play_base(PlayBase {
            offset_n: self.samples_sent.load(Ordering::Acquire),
            offset_p: clamped,
        });
        self.read_pos.store(clamped, Ordering::Release);
    }

    fn pos_sample(&self) -> u64 {
        let base = self.play_base();
        let played = self.voice.samples_played();
        let linear = base.offset_p + played.saturating_sub(base.offset_n);
        match self.loop_region {
            // Everything heard past the loop end is whole or partial passes
            // over the region.
            Some(region) if linear >= region.end() => {
                region.begin() + (linear - region.end()) % region.len()
            }
            _ => linear,
        }
    }

    fn loop_count(&self) -> u64 {
        self.loop_count.load(Ordering::Acquire)
    }
}

/// Streams a wave to a hardware voice and tracks playback position.
pub struct VoiceStream {
    backend: Arc<dyn AudioBackend>,
    wave: Arc<Wave>,
    loop_region: Option<LoopRegion>,
    settings: StreamSettings,
    core: Option<Arc<StreamCore>>,
    feeder: Option<Worker>,
    volume: (f64, f64),
    fade_volume: f64,
    speed: f64,
}

impl VoiceStream {
    /// Create a stream and its hardware voice.
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        wave: Arc<Wave>,
        loop_region: Option<LoopRegion>,
        settings: StreamSettings,
    ) -> Result<Self> {
        let mut stream = Self::unallocated(backend, wave, loop_region, settings);
        stream.create()?;
        Ok(stream)
    }

    /// A stream with no hardware voice yet. Every transport call is a no-op
    /// until [`Self::create`] succeeds.
    pub fn unallocated(
        backend: Arc<dyn AudioBackend>,
        wave: Arc<Wave>,
        loop_region: Option<LoopRegion>,
        settings: StreamSettings,
    ) -> Self {
        Self {
            backend,
            wave,
            loop_region,
            settings,
            core: None,
            feeder: None,
            volume: (1.0, 1.0),
            fade_volume: 1.0,
            speed: 1.0,
        }
    }

    /// (Re)allocate the hardware voice and reset every counter. Volume, fade
    /// volume and speed carry over.
    pub fn create(&mut self) -> Result<()> {
        self.destroy();

        let rate = self.wave.sample_rate();
        let format = VoiceFormat::new(rate, self.settings.max_speed, rate as usize * 2);
        let voice = self.backend.create_voice(format)?;
        let core = Arc::new(StreamCore::new(
            voice,
            Arc::clone(&self.wave),
            self.loop_region,
            self.settings.buffer_divisor,
        ));

        if self.settings.feed_mode == FeedMode::Thread {
            let feeder_core = Arc::clone(&core);
            let worker = Worker::spawn("chime-feeder", self.settings.feed_interval, move || {
                feeder_core.service();
                true
            });
            match worker {
                Ok(worker) => self.feeder = Some(worker),
                Err(e) => {
                    core.voice.destroy();
                    return Err(e);
                }
            }
        }

        self.core = Some(core);
        self.apply_gains();
        self.apply_speed();
        Ok(())
    }

    /// Stop the feeder, then release the hardware voice. Idempotent.
    pub fn destroy(&mut self) {
        // Joined before the voice goes away.
        self.feeder.take();
        if let Some(core) = self.core.take() {
            core.voice.stop();
            core.voice.flush();
            core.voice.destroy();
        }
    }

    pub fn is_created(&self) -> bool {
        self.core.is_some()
    }

    pub fn wave(&self) -> &Arc<Wave> {
        &self.wave
    }

    pub fn get_loop(&self) -> Option<LoopRegion> {
        self.loop_region
    }

    /// Replace the loop region, rebuilding the hardware voice.
    pub fn set_loop(&mut self, loop_region: Option<LoopRegion>) -> Result<()> {
        self.loop_region = loop_region;
        self.create()
    }

    // ── Feeding ─────────────────────────────────────────────────

    /// Top up the hardware queue. `required` is the number of frames the
    /// hardware asked for, or zero on a plain poll.
    pub fn feed(&self, required: usize) {
        if let Some(core) = &self.core {
            core.feed(required);
        }
    }

    /// One feeder step: detect a finished stream, otherwise feed. Polled
    /// streams rely on the caller to run this.
    pub fn service(&self) {
        if let Some(core) = &self.core {
            core.service();
        }
    }

    /// Seek. Meant for a stopped stream.
    pub fn set_read_pos(&self, sample: u64) {
        if let Some(core) = &self.core {
            core.set_read_pos(sample);
        }
    }

    // ── Transport ───────────────────────────────────────────────

    /// Start or resume. Returns `false` if the hardware refused.
    pub fn play(&mut self) -> bool {
        let Some(core) = &self.core else {
            return false;
        };
        if core.active.load(Ordering::Acquire) && !core.paused.load(Ordering::Acquire) {
            return true;
        }
        if let Err(e) = core.voice.start() {
            warn!(error = %e, "Failed to start voice");
            return false;
        }
        core.ended.store(false, Ordering::Release);
        core.paused.store(false, Ordering::Release);
        core.active.store(true, Ordering::Release);
        true
    }

    pub fn pause(&mut self) {
        let Some(core) = &self.core else {
            return;
        };
        if !core.active.load(Ordering::Acquire) {
            return;
        }
        core.voice.stop();
        core.paused.store(true, Ordering::Release);
    }

    /// Hard reset: rebuild the voice with every counter at zero.
    pub fn stop(&mut self) {
        let active = self
            .core
            .as_ref()
            .is_some_and(|core| core.active.load(Ordering::Acquire));
        if !active {
            return;
        }
        if let Err(e) = self.create() {
            warn!(error = %e, "Failed to recreate voice after stop");
        }
    }

    // ── Queries ─────────────────────────────────────────────────

    pub fn is_active(&self) -> bool {
        self.core
            .as_ref()
            .is_some_and(|core| core.active.load(Ordering::Acquire))
    }

    pub fn is_playing(&self) -> bool {
        self.core.as_ref().is_some_and(|core| {
            core.active.load(Ordering::Acquire) && !core.paused.load(Ordering::Acquire)
        })
    }

    pub fn is_paused(&self) -> bool {
        self.core.as_ref().is_some_and(|core| {
            core.active.load(Ordering::Acquire) && core.paused.load(Ordering::Acquire)
        })
    }

    /// Whether playback ran off the end of a non-looping wave.
    pub fn reached_end(&self) -> bool {
        self.core
            .as_ref()
            .is_some_and(|core| core.ended.load(Ordering::Acquire))
    }

    /// Position of the frame the hardware is playing.
    pub fn pos_sample(&self) -> u64 {
        self.core.as_ref().map_or(0, |core| core.pos_sample())
    }

    /// Position of the feeder in the wave, ahead of what has been heard.
    pub fn stream_pos_sample(&self) -> u64 {
        self.core
            .as_ref()
            .map_or(0, |core| core.read_pos.load(Ordering::Acquire))
    }

    /// Frames the hardware voice has consumed since it was created.
    pub fn samples_played(&self) -> u64 {
        self.core
            .as_ref()
            .map_or(0, |core| core.voice.samples_played())
    }

    pub fn samples_sent(&self) -> u64 {
        self.core
            .as_ref()
            .map_or(0, |core| core.samples_sent.load(Ordering::Acquire))
    }

    /// Loop wraps the feeder has made since playback was last positioned.
    pub fn loop_count(&self) -> u64 {
        self.core.as_ref().map_or(0, |core| core.loop_count())
    }

    // ── Volume and speed ────────────────────────────────────────

    fn apply_gains(&self) {
        if let Some(core) = &self.core {
            let fade = self.fade_volume * self.fade_volume;
            core.voice.set_channel_volumes(
                (self.volume.0 * fade) as f32,
                (self.volume.1 * fade) as f32,
            );
        }
    }

    fn apply_speed(&mut self) {
        if let Some(core) = &self.core {
            core.voice.set_frequency_ratio(self.speed);
            self.speed = core.voice.frequency_ratio();
        }
    }

    pub fn set_volume(&mut self, volume: (f64, f64)) {
        self.volume = volume;
        self.apply_gains();
    }

    pub fn volume(&self) -> (f64, f64) {
        self.volume
    }

    /// Fade multiplier in [0, 1]; applied squared.
    pub fn set_fade_volume(&mut self, volume: f64) {
        self.fade_volume = volume.clamp(0.0, 1.0);
        self.apply_gains();
    }

    pub fn fade_volume(&self) -> f64 {
        self.fade_volume
    }

    /// Set the playback rate, clamped to [`Self::min_max_speed`].
    pub fn set_speed(&mut self, speed: f64) {
        let (min, max) = self.min_max_speed();
        self.speed = if speed.is_nan() { 1.0 } else { speed.clamp(min, max) };
        self.apply_speed();
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn min_max_speed(&self) -> (f64, f64) {
        self.core
            .as_ref()
            .map_or((1.0, 1.0), |core| core.voice.frequency_ratio_range())
    }
}

impl Drop for VoiceStream {
    fn drop(&mut self) {
        self.destroy();
    }
}
