//! One managed voice: a streamed wave, its fade control, and its one-shots.

use crate::backend::AudioBackend;
use crate::fade::{ControlState, FadeControl, LifecyclePhase};
use crate::shots::OneShotPool;
use crate::stream::{StreamSettings, VoiceStream};
use chime_core::{Clock, LoopRegion, Result, Wave};
use std::fmt;
use std::sync::Arc;

pub struct Voice {
    stream: VoiceStream,
    control: FadeControl,
    shots: OneShotPool,
}

impl Voice {
    /// Build a voice and allocate its hardware voice.
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        wave: Arc<Wave>,
        settings: StreamSettings,
        max_shots: usize,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let stream = VoiceStream::new(Arc::clone(&backend), Arc::clone(&wave), None, settings)?;
        Ok(Self::assemble(backend, wave, stream, settings, max_shots, clock))
    }

    /// A voice without a hardware voice. It answers every query with
    /// defaults and ignores transport calls; one-shots still work if the
    /// backend can create voices.
    pub fn inert(
        backend: Arc<dyn AudioBackend>,
        wave: Arc<Wave>,
        settings: StreamSettings,
        max_shots: usize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let stream = VoiceStream::unallocated(Arc::clone(&backend), Arc::clone(&wave), None, settings);
        Self::assemble(backend, wave, stream, settings, max_shots, clock)
    }

    fn assemble(
        backend: Arc<dyn AudioBackend>,
        wave: Arc<Wave>,
        stream: VoiceStream,
        settings: StreamSettings,
        max_shots: usize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            stream,
            control: FadeControl::new(clock),
            shots: OneShotPool::new(backend, wave, max_shots, settings.max_speed),
        }
    }

    pub fn wave(&self) -> &Arc<Wave> {
        self.stream.wave()
    }

    pub fn control(&self) -> &FadeControl {
        &self.control
    }

    pub fn stream(&self) -> &VoiceStream {
        &self.stream
    }

    // ── Transport ───────────────────────────────────────────────

    pub fn change_state(&mut self, state: ControlState, duration_sec: f64) -> bool {
        self.control.change_state(&mut self.stream, state, duration_sec)
    }

    /// One fade tick. Also drops one-shots that have finished.
    pub fn update_fade(&mut self) -> bool {
        self.shots.reap_finished();
        self.control.update_fade(&mut self.stream)
    }

    /// One feeder step for polled streams.
    pub fn pump(&self) {
        self.stream.service();
    }

    pub fn is_playing(&self) -> bool {
        self.stream.is_playing()
    }

    pub fn is_paused(&self) -> bool {
        self.stream.is_paused()
    }

    pub fn reached_end(&self) -> bool {
        self.control.phase() == LifecyclePhase::EndOfStream || self.stream.reached_end()
    }

    /// Seek, keeping a playing voice playing.
    pub fn set_pos_sample(&mut self, sample: u64) {
        let resume = self.resume_state();
        self.change_state(ControlState::StopImmediately, 0.0);
        self.control.cancel_seek_to_start();
        self.stream.set_read_pos(sample);
        self.resume(resume);
    }

    /// Replace the loop region. The hardware voice is rebuilt, so playback
    /// restarts from the beginning; a playing voice keeps playing.
    pub fn set_loop(&mut self, loop_region: Option<LoopRegion>) -> Result<()> {
        let resume = self.resume_state();
        self.stream.set_loop(loop_region)?;
        self.change_state(ControlState::StopImmediately, 0.0);
        self.control.cancel_seek_to_start();
        self.resume(resume);
        Ok(())
    }

    pub fn get_loop(&self) -> Option<LoopRegion> {
        self.stream.get_loop()
    }

    fn resume_state(&self) -> Option<(ControlState, f64)> {
        let state = self.control.state();
        (self.stream.is_playing() && state.is_play()).then(|| (state, self.control.duration_sec()))
    }

    fn resume(&mut self, resume: Option<(ControlState, f64)>) {
        if let Some((state, duration_sec)) = resume {
            self.change_state(state, duration_sec);
        }
    }

    // ── Position ────────────────────────────────────────────────

    pub fn pos_sample(&self) -> u64 {
        self.stream.pos_sample()
    }

    pub fn stream_pos_sample(&self) -> u64 {
        self.stream.stream_pos_sample()
    }

    pub fn samples_played(&self) -> u64 {
        self.stream.samples_played()
    }

    pub fn sampling_rate(&self) -> u32 {
        self.wave().sample_rate()
    }

    pub fn samples(&self) -> usize {
        self.wave().len()
    }

    // ── Volume and speed ────────────────────────────────────────

    /// Per-channel volume, each clamped to [0, 1].
    pub fn set_volume(&mut self, volume: (f64, f64)) {
        self.stream
            .set_volume((unit(volume.0), unit(volume.1)));
    }

    pub fn volume(&self) -> (f64, f64) {
        self.stream.volume()
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.stream.set_speed(speed);
    }

    pub fn speed(&self) -> f64 {
        self.stream.speed()
    }

    pub fn min_max_speed(&self) -> (f64, f64) {
        self.stream.min_max_speed()
    }

    // ── One-shots ───────────────────────────────────────────────

    pub fn play_one_shot(&mut self, volume: f64, pitch: f64) -> bool {
        self.shots.play_one_shot(volume, pitch).is_some()
    }

    pub fn stop_all_shots(&mut self) {
        self.shots.stop_all_shots();
    }

    pub fn one_shot_count(&self) -> usize {
        self.shots.len()
    }

    pub fn one_shot_ids(&self) -> Vec<u64> {
        self.shots.ids()
    }

    /// Release every hardware voice this voice owns.
    pub fn destroy(&mut self) {
        self.shots.stop_all_shots();
        self.stream.destroy();
    }
}

fn unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

impl fmt::Debug for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Voice")
            .field("samples", &self.samples())
            .field("state", &self.control.state())
            .field("phase", &self.control.phase())
            .field("playing", &self.is_playing())
            .field("one_shots", &self.shots.len())
            .finish()
    }
}
