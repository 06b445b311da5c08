//! Owned convenience handle over a managed voice.

use crate::manager::AudioManager;
use chime_core::{AudioId, LoopRegion, Wave};
use std::fmt;
use std::sync::Arc;

/// A voice that is released when the handle drops.
///
/// Methods mirror the manager's handle operations and add second- and
/// decibel-based helpers. An `Audio` whose creation failed wraps the null
/// handle and behaves like the null voice.
pub struct Audio<'m> {
    manager: &'m AudioManager,
    id: AudioId,
}

impl<'m> Audio<'m> {
    pub fn new(manager: &'m AudioManager, wave: impl Into<Arc<Wave>>) -> Self {
        let id = manager.create(wave);
        Self { manager, id }
    }

    pub fn id(&self) -> AudioId {
        self.id
    }

    /// Whether this handle wraps the null voice.
    pub fn is_empty(&self) -> bool {
        self.id.is_null()
    }

    /// Give up ownership without releasing the voice.
    pub fn into_id(self) -> AudioId {
        let id = self.id;
        std::mem::forget(self);
        id
    }

    // ── Transport ───────────────────────────────────────────────

    pub fn play(&self, fade_sec: f64) -> bool {
        self.manager.play(self.id, fade_sec)
    }

    pub fn pause(&self, fade_sec: f64) -> bool {
        self.manager.pause(self.id, fade_sec)
    }

    pub fn stop(&self, fade_sec: f64) -> bool {
        self.manager.stop(self.id, fade_sec)
    }

    pub fn is_playing(&self) -> bool {
        self.manager.is_playing(self.id)
    }

    pub fn is_paused(&self) -> bool {
        self.manager.is_paused(self.id)
    }

    // ── Loop ────────────────────────────────────────────────────

    /// Loop over the whole wave, or stop looping.
    pub fn set_loop(&self, enabled: bool) -> bool {
        self.manager
            .set_loop(self.id, enabled, 0, self.samples() as u64)
    }

    /// Loop over `[begin, end)` in samples.
    pub fn set_loop_range(&self, begin: u64, end: u64) -> bool {
        self.manager.set_loop(self.id, true, begin, end)
    }

    /// Loop from `begin_sec` to `end_sec`, or to the end of the wave.
    pub fn set_loop_seconds(&self, begin_sec: f64, end_sec: Option<f64>) -> bool {
        let begin = self.seconds_to_samples(begin_sec);
        let end = match end_sec {
            Some(end_sec) => self.seconds_to_samples(end_sec),
            None => self.samples() as u64,
        };
        self.set_loop_range(begin, end)
    }

    pub fn get_loop(&self) -> Option<LoopRegion> {
        self.manager.get_loop(self.id)
    }

    pub fn is_loop(&self) -> bool {
        self.get_loop().is_some()
    }

    // ── Position ────────────────────────────────────────────────

    pub fn pos_sample(&self) -> u64 {
        self.manager.pos_sample(self.id)
    }

    pub fn pos_sec(&self) -> f64 {
        self.samples_to_seconds(self.pos_sample())
    }

    pub fn set_pos_sample(&self, sample: u64) {
        self.manager.set_pos_sample(self.id, sample);
    }

    pub fn set_pos_sec(&self, seconds: f64) {
        self.set_pos_sample(self.seconds_to_samples(seconds));
    }

    pub fn stream_pos_sample(&self) -> u64 {
        self.manager.stream_pos_sample(self.id)
    }

    pub fn samples_played(&self) -> u64 {
        self.manager.samples_played(self.id)
    }

    pub fn sampling_rate(&self) -> u32 {
        self.manager.sampling_rate(self.id)
    }

    pub fn samples(&self) -> usize {
        self.manager.samples(self.id)
    }

    pub fn length_sec(&self) -> f64 {
        self.samples_to_seconds(self.samples() as u64)
    }

    pub fn wave(&self) -> Arc<Wave> {
        self.manager.get_wave(self.id)
    }

    fn seconds_to_samples(&self, seconds: f64) -> u64 {
        if seconds.is_nan() || seconds <= 0.0 {
            return 0;
        }
        (seconds * self.sampling_rate() as f64) as u64
    }

    fn samples_to_seconds(&self, samples: u64) -> f64 {
        match self.sampling_rate() {
            0 => 0.0,
            rate => samples as f64 / rate as f64,
        }
    }

    // ── Volume ──────────────────────────────────────────────────

    pub fn set_volume(&self, volume: f64) {
        self.set_volume_lr(volume, volume);
    }

    pub fn set_volume_lr(&self, left: f64, right: f64) {
        self.manager.set_volume(self.id, (left, right));
    }

    pub fn set_volume_db(&self, db: f64) {
        self.set_volume(db_to_gain(db));
    }

    pub fn set_volume_lr_db(&self, left_db: f64, right_db: f64) {
        self.set_volume_lr(db_to_gain(left_db), db_to_gain(right_db));
    }

    pub fn volume(&self) -> (f64, f64) {
        self.manager.get_volume(self.id)
    }

    // ── Speed ───────────────────────────────────────────────────

    pub fn set_speed(&self, speed: f64) {
        self.manager.set_speed(self.id, speed);
    }

    /// Shift pitch and tempo by `semitones` (12 per octave).
    pub fn set_speed_by_semitone(&self, semitones: f64) {
        self.set_speed(semitone_ratio(semitones));
    }

    pub fn speed(&self) -> f64 {
        self.manager.get_speed(self.id)
    }

    pub fn min_speed(&self) -> f64 {
        self.manager.get_min_max_speed(self.id).0
    }

    pub fn max_speed(&self) -> f64 {
        self.manager.get_min_max_speed(self.id).1
    }

    // ── One-shots ───────────────────────────────────────────────

    pub fn play_one_shot(&self, volume: f64, pitch: f64) -> bool {
        self.manager.play_one_shot(self.id, volume, pitch)
    }

    pub fn stop_all_shots(&self) {
        self.manager.stop_all_shots(self.id);
    }

    pub fn one_shot_count(&self) -> usize {
        self.manager.one_shot_count(self.id)
    }
}

impl Drop for Audio<'_> {
    fn drop(&mut self) {
        self.manager.release(self.id);
    }
}

impl fmt::Debug for Audio<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Audio").field("id", &self.id).finish()
    }
}

/// Linear gain for a level in decibels.
pub fn db_to_gain(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

/// Playback ratio that shifts pitch by `semitones`.
pub fn semitone_ratio(semitones: f64) -> f64 {
    2f64.powf(semitones / 12.0)
}
