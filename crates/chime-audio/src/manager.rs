//! The voice manager: the one object applications talk to.
//!
//! [`AudioManager`] owns the backend, a [`HandleTable`] of voices behind one
//! manager-wide mutex, and the fade-management worker. Every control call
//! takes that mutex, and so does each fade tick, so a user `pause` and a fade
//! step never interleave on the same voice. Feeders never take it.
//!
//! Calls on unknown or released handles act on the null voice, a voice built
//! from a short synthetic tone, rather than failing.

use crate::backend::{create_backend, AudioBackend, BackendKind, NullBackend};
use crate::config::{AudioConfig, FeedMode};
use crate::fade::ControlState;
use crate::stream::StreamSettings;
use crate::voice::Voice;
use chime_core::limits::MASTER_FADE_FLOOR;
use chime_core::{AudioId, Clock, HandleTable, LoopRegion, Result, SystemClock, Wave, Worker};
use parking_lot::Mutex;
use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Sample rate of the null voice's tone.
const NULL_TONE_RATE: u32 = 44_100;

/// Step of the master fade-out.
const MASTER_FADE_STEP: Duration = Duration::from_millis(10);

/// State shared with the fade worker.
struct Shared {
    backend: Arc<dyn AudioBackend>,
    voices: Mutex<HandleTable<Voice>>,
    fade_enabled: AtomicBool,
}

impl Shared {
    fn update_fade(&self) -> bool {
        if !self.fade_enabled.load(Ordering::Acquire) {
            return false;
        }
        let mut voices = self.voices.lock();
        for voice in voices.iter_all_mut() {
            voice.update_fade();
        }
        true
    }
}

/// Owns the audio backend and every voice.
pub struct AudioManager {
    shared: Arc<Shared>,
    config: AudioConfig,
    clock: Arc<dyn Clock>,
    fade_worker: Option<Worker>,
}

impl AudioManager {
    /// Open the configured backend. Fails if the device cannot be opened.
    pub fn open(config: AudioConfig) -> Result<Self> {
        Self::open_with_clock(config, SystemClock::shared())
    }

    /// [`Self::open`] with an explicit clock for fade timing.
    pub fn open_with_clock(config: AudioConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let backend = create_backend(&config)?;
        Ok(Self::with_backend(backend, config, clock))
    }

    /// Open the configured backend, falling back to the null backend when
    /// that fails.
    pub fn new(config: AudioConfig) -> Self {
        Self::with_clock(config, SystemClock::shared())
    }

    /// [`Self::new`] with an explicit clock for fade timing.
    pub fn with_clock(config: AudioConfig, clock: Arc<dyn Clock>) -> Self {
        match Self::open_with_clock(config.clone(), Arc::clone(&clock)) {
            Ok(manager) => manager,
            Err(e) => {
                warn!("Audio backend unavailable ({}), falling back to null output", e);
                let config = if config.validate().is_ok() {
                    config
                } else {
                    AudioConfig::default()
                };
                Self::with_backend(Arc::new(NullBackend::new()), config, clock)
            }
        }
    }

    /// Build a manager on an already opened backend.
    pub fn with_backend(
        backend: Arc<dyn AudioBackend>,
        config: AudioConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let null_voice = Self::build_null_voice(&backend, &config, &clock);
        let shared = Arc::new(Shared {
            backend,
            voices: Mutex::new(HandleTable::new(null_voice)),
            fade_enabled: AtomicBool::new(true),
        });

        let worker_shared = Arc::clone(&shared);
        let fade_worker = match Worker::spawn("chime-fade", config.fade_interval(), move || {
            worker_shared.update_fade()
        }) {
            Ok(worker) => Some(worker),
            Err(e) => {
                warn!("Fade thread unavailable ({}); call update_fade manually", e);
                None
            }
        };

        info!(
            "Audio manager ready (backend: {}, device: {})",
            shared.backend.kind(),
            shared.backend.has_device()
        );

        Self {
            shared,
            config,
            clock,
            fade_worker,
        }
    }

    fn build_null_voice(
        backend: &Arc<dyn AudioBackend>,
        config: &AudioConfig,
        clock: &Arc<dyn Clock>,
    ) -> Voice {
        let wave = Arc::new(null_tone(config.null_tone_seconds));
        let settings = StreamSettings::from_config(config);
        Voice::new(
            Arc::clone(backend),
            Arc::clone(&wave),
            settings,
            config.max_voice_shots,
            Arc::clone(clock),
        )
        .unwrap_or_else(|e| {
            warn!("Failed to create null voice ({}); it will be silent", e);
            Voice::inert(
                Arc::clone(backend),
                wave,
                settings,
                config.max_voice_shots,
                Arc::clone(clock),
            )
        })
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<dyn AudioBackend> {
        &self.shared.backend
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.shared.backend.kind()
    }

    pub fn has_audio_device(&self) -> bool {
        self.shared.backend.has_device()
    }

    fn with_voice<R>(&self, id: AudioId, f: impl FnOnce(&mut Voice) -> R) -> R {
        let mut voices = self.shared.voices.lock();
        f(voices.get_mut(id))
    }

    // ── Lifetime ────────────────────────────────────────────────

    /// Create a voice for `wave`. Returns [`AudioId::NULL`] for an empty
    /// wave or when the voice cannot be built.
    pub fn create(&self, wave: impl Into<Arc<Wave>>) -> AudioId {
        let wave = wave.into();
        if wave.is_empty() {
            debug!("Refusing to create a voice for an empty wave");
            return AudioId::NULL;
        }

        let voice = match Voice::new(
            Arc::clone(&self.shared.backend),
            wave,
            StreamSettings::from_config(&self.config),
            self.config.max_voice_shots,
            Arc::clone(&self.clock),
        ) {
            Ok(voice) => voice,
            Err(e) => {
                warn!("Failed to create voice: {}", e);
                return AudioId::NULL;
            }
        };

        let id = self.shared.voices.lock().insert(voice);
        debug!("Created voice {}", id);
        id
    }

    /// Release a voice. Blocks until its feeder has stopped.
    pub fn release(&self, id: AudioId) {
        let voice = self.shared.voices.lock().remove(id);
        if let Some(mut voice) = voice {
            voice.destroy();
            debug!("Released voice {}", id);
        }
    }

    /// Whether `id` names a live voice.
    pub fn contains(&self, id: AudioId) -> bool {
        self.shared.voices.lock().contains(id)
    }

    pub fn live_voices(&self) -> usize {
        self.shared.voices.lock().len()
    }

    pub fn voice_ids(&self) -> Vec<AudioId> {
        self.shared.voices.lock().ids()
    }

    // ── Transport ───────────────────────────────────────────────

    pub fn play(&self, id: AudioId, fade_sec: f64) -> bool {
        self.change_state(id, ControlState::play(fade_sec), fade_sec)
    }

    pub fn pause(&self, id: AudioId, fade_sec: f64) -> bool {
        self.change_state(id, ControlState::pause(fade_sec), fade_sec)
    }

    pub fn stop(&self, id: AudioId, fade_sec: f64) -> bool {
        self.change_state(id, ControlState::stop(fade_sec), fade_sec)
    }

    fn change_state(&self, id: AudioId, state: ControlState, fade_sec: f64) -> bool {
        let fade_sec = if fade_sec.is_nan() { 0.0 } else { fade_sec.max(0.0) };
        self.with_voice(id, |voice| voice.change_state(state, fade_sec))
    }

    /// Advance every voice's fade by one tick. The fade worker calls this on
    /// its own; hosts may call it too. Returns `false` once shutdown began.
    pub fn update_fade(&self) -> bool {
        self.shared.update_fade()
    }

    /// Feed every polled stream once. Does nothing in threaded feed mode.
    pub fn pump(&self) {
        if self.config.feed_mode != FeedMode::Polled {
            return;
        }
        let mut voices = self.shared.voices.lock();
        for voice in voices.iter_all_mut() {
            voice.pump();
        }
    }

    pub fn is_playing(&self, id: AudioId) -> bool {
        self.with_voice(id, |voice| voice.is_playing())
    }

    pub fn is_paused(&self, id: AudioId) -> bool {
        self.with_voice(id, |voice| voice.is_paused())
    }

    // ── Loop and position ───────────────────────────────────────

    /// Enable looping over `[begin, end)`, or disable it. Returns `false` if
    /// the region is invalid for the wave or the voice could not be rebuilt.
    pub fn set_loop(&self, id: AudioId, enabled: bool, begin: u64, end: u64) -> bool {
        self.with_voice(id, |voice| {
            let region = if enabled {
                match LoopRegion::new(begin, end, voice.samples() as u64) {
                    Ok(region) => Some(region),
                    Err(e) => {
                        warn!("Ignoring loop region for voice {}: {}", id, e);
                        return false;
                    }
                }
            } else {
                None
            };
            match voice.set_loop(region) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Failed to rebuild voice {} for looping: {}", id, e);
                    false
                }
            }
        })
    }

    pub fn get_loop(&self, id: AudioId) -> Option<LoopRegion> {
        self.with_voice(id, |voice| voice.get_loop())
    }

    /// Seek to `sample`. A playing voice keeps playing from there.
    pub fn set_pos_sample(&self, id: AudioId, sample: u64) {
        self.with_voice(id, |voice| voice.set_pos_sample(sample));
    }

    pub fn pos_sample(&self, id: AudioId) -> u64 {
        self.with_voice(id, |voice| voice.pos_sample())
    }

    pub fn stream_pos_sample(&self, id: AudioId) -> u64 {
        self.with_voice(id, |voice| voice.stream_pos_sample())
    }

    pub fn samples_played(&self, id: AudioId) -> u64 {
        self.with_voice(id, |voice| voice.samples_played())
    }

    pub fn sampling_rate(&self, id: AudioId) -> u32 {
        self.with_voice(id, |voice| voice.sampling_rate())
    }

    pub fn samples(&self, id: AudioId) -> usize {
        self.with_voice(id, |voice| voice.samples())
    }

    pub fn get_wave(&self, id: AudioId) -> Arc<Wave> {
        self.with_voice(id, |voice| Arc::clone(voice.wave()))
    }

    // ── Volume and speed ────────────────────────────────────────

    pub fn set_volume(&self, id: AudioId, volume: (f64, f64)) {
        self.with_voice(id, |voice| voice.set_volume(volume));
    }

    pub fn get_volume(&self, id: AudioId) -> (f64, f64) {
        self.with_voice(id, |voice| voice.volume())
    }

    pub fn set_speed(&self, id: AudioId, speed: f64) {
        self.with_voice(id, |voice| voice.set_speed(speed));
    }

    pub fn get_speed(&self, id: AudioId) -> f64 {
        self.with_voice(id, |voice| voice.speed())
    }

    pub fn get_min_max_speed(&self, id: AudioId) -> (f64, f64) {
        self.with_voice(id, |voice| voice.min_max_speed())
    }

    // ── One-shots ───────────────────────────────────────────────

    pub fn play_one_shot(&self, id: AudioId, volume: f64, pitch: f64) -> bool {
        self.with_voice(id, |voice| voice.play_one_shot(volume, pitch))
    }

    pub fn stop_all_shots(&self, id: AudioId) {
        self.with_voice(id, |voice| voice.stop_all_shots());
    }

    pub fn one_shot_count(&self, id: AudioId) -> usize {
        self.with_voice(id, |voice| voice.one_shot_count())
    }

    // ── Master volume ───────────────────────────────────────────

    pub fn set_master_volume(&self, volume: f64) {
        let volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        self.shared.backend.set_master_volume(volume);
    }

    pub fn master_volume(&self) -> f64 {
        self.shared.backend.master_volume()
    }

    /// Fade the whole output to silence, blocking until done. Meant for
    /// shutdown; per-voice fades are unaffected.
    pub fn fade_master_volume(&self) {
        let backend = &self.shared.backend;
        let mut volume = backend.master_volume();
        while volume > MASTER_FADE_FLOOR {
            volume *= 0.75;
            backend.set_master_volume(volume);
            std::thread::sleep(MASTER_FADE_STEP);
        }
        backend.set_master_volume(0.0);
        debug!("Master volume faded out");
    }
}

impl Drop for AudioManager {
    fn drop(&mut self) {
        self.shared.fade_enabled.store(false, Ordering::Release);
        if let Some(worker) = self.fade_worker.take() {
            worker.stop();
        }

        let released = {
            let mut voices = self.shared.voices.lock();
            voices.null_mut().destroy();
            voices.clear()
        };
        let count = released.len();
        for mut voice in released {
            voice.destroy();
        }

        self.shared.backend.shutdown();
        info!("Audio manager shut down ({} voices released)", count);
    }
}

/// The null voice's tone: a 220 Hz chirp under a slow amplitude swell.
fn null_tone(seconds: f64) -> Wave {
    Wave::generate(NULL_TONE_RATE, seconds, |t| {
        0.5 * (TAU * t).sin() * (TAU * 220.0 * (4.0 * t + 1.0) * t).sin()
    })
}
