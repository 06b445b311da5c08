//! Play/pause/stop requests with optional timed fades.
//!
//! [`FadeControl`] turns a coarse request such as "pause with a 2 s fade" into
//! a volume ramp advanced by repeated [`FadeControl::update_fade`] ticks, and
//! calls into the [`PlaybackTarget`] at the right moment: immediately for play
//! and for immediate pause/stop, only once the ramp reaches silence for
//! fading pause/stop.

use crate::stream::VoiceStream;
use chime_core::{Clock, Stopwatch};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::trace;

/// Requested transport state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlState {
    PlayImmediately,
    PlayWithFade,
    PauseImmediately,
    PauseWithFade,
    StopImmediately,
    StopWithFade,
}

impl ControlState {
    /// Play, fading in when `fade_sec > 0`.
    pub fn play(fade_sec: f64) -> Self {
        if fade_sec.max(0.0) > 0.0 {
            Self::PlayWithFade
        } else {
            Self::PlayImmediately
        }
    }

    /// Pause, fading out when `fade_sec > 0`.
    pub fn pause(fade_sec: f64) -> Self {
        if fade_sec.max(0.0) > 0.0 {
            Self::PauseWithFade
        } else {
            Self::PauseImmediately
        }
    }

    /// Stop, fading out when `fade_sec > 0`.
    pub fn stop(fade_sec: f64) -> Self {
        if fade_sec.max(0.0) > 0.0 {
            Self::StopWithFade
        } else {
            Self::StopImmediately
        }
    }

    pub fn is_play(self) -> bool {
        matches!(self, Self::PlayImmediately | Self::PlayWithFade)
    }

    pub fn is_pause(self) -> bool {
        matches!(self, Self::PauseImmediately | Self::PauseWithFade)
    }

    pub fn is_stop(self) -> bool {
        matches!(self, Self::StopImmediately | Self::StopWithFade)
    }
}

/// Progress of the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    /// Request adopted, nothing done yet.
    Ready,
    /// Fading out; the voice is still running.
    Waiting,
    /// Steady playing, paused or stopped.
    Done,
    /// Playback ran off the end of the wave.
    EndOfStream,
}

/// What the fade state machine drives.
pub trait PlaybackTarget {
    /// Fade multiplier in [0, 1].
    fn set_fade_volume(&mut self, volume: f64);

    /// Rewind so the next play starts from sample 0.
    fn seek_to_start(&mut self);

    /// Start or resume. `false` means the hardware refused.
    fn play(&mut self) -> bool;

    fn pause(&mut self);

    fn stop(&mut self);

    fn reached_end(&self) -> bool;
}

impl PlaybackTarget for VoiceStream {
    fn set_fade_volume(&mut self, volume: f64) {
        VoiceStream::set_fade_volume(self, volume);
    }

    fn seek_to_start(&mut self) {
        VoiceStream::stop(self);
        self.set_read_pos(0);
    }

    fn play(&mut self) -> bool {
        VoiceStream::play(self)
    }

    fn pause(&mut self) {
        VoiceStream::pause(self);
    }

    fn stop(&mut self) {
        VoiceStream::stop(self);
    }

    fn reached_end(&self) -> bool {
        VoiceStream::reached_end(self)
    }
}

/// Fade and transport state of one voice.
#[derive(Debug, Clone)]
pub struct FadeControl {
    state: ControlState,
    duration_sec: f64,
    current_volume: f64,
    phase: LifecyclePhase,
    timer: Stopwatch,
    seek_to_start_pending: bool,
}

impl FadeControl {
    /// A stopped voice at full fade volume.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: ControlState::StopImmediately,
            duration_sec: 0.0,
            current_volume: 1.0,
            phase: LifecyclePhase::Done,
            timer: Stopwatch::new(clock),
            seek_to_start_pending: false,
        }
    }

    pub fn state(&self) -> ControlState {
        self.state
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    pub fn duration_sec(&self) -> f64 {
        self.duration_sec
    }

    /// Fade volume last pushed to the target.
    pub fn current_volume(&self) -> f64 {
        self.current_volume
    }

    pub fn elapsed_sec(&self) -> f64 {
        self.timer.elapsed_sec()
    }

    pub fn is_timer_started(&self) -> bool {
        self.timer.is_started()
    }

    pub fn seek_to_start_pending(&self) -> bool {
        self.seek_to_start_pending
    }

    /// Forget a rewind left behind by an interrupted stop-with-fade. Called
    /// after an explicit seek so the next play keeps the new position.
    pub fn cancel_seek_to_start(&mut self) {
        self.seek_to_start_pending = false;
    }

    /// Adopt a new request and run its first tick right away.
    ///
    /// Asking to play while already playing, or to pause while already
    /// paused, changes nothing.
    pub fn change_state<T>(&mut self, target: &mut T, state: ControlState, duration_sec: f64) -> bool
    where
        T: PlaybackTarget + ?Sized,
    {
        let settled = self.phase == LifecyclePhase::Done;
        if state.is_play() && self.state.is_play() && settled {
            return true;
        }
        if state.is_pause() && self.state.is_pause() && settled {
            return true;
        }

        trace!(from = ?self.state, to = ?state, duration_sec, "Control state change");
        self.state = state;
        self.duration_sec = duration_sec.max(0.0);
        self.phase = LifecyclePhase::Ready;
        self.timer.reset();
        self.update_fade(target)
    }

    /// Advance the current request by one tick. Always returns `true`.
    pub fn update_fade<T>(&mut self, target: &mut T) -> bool
    where
        T: PlaybackTarget + ?Sized,
    {
        match self.state {
            ControlState::PlayImmediately => {
                self.timer.reset();
                self.push_volume(target, 1.0);
                self.advance_play(target);
            }
            ControlState::PlayWithFade => {
                let progress = self.fade_progress();
                self.push_volume(target, progress);
                self.advance_play(target);
            }
            ControlState::PauseImmediately => {
                self.timer.reset();
                self.push_volume(target, 0.0);
                if self.phase == LifecyclePhase::Ready {
                    self.phase = LifecyclePhase::Done;
                    target.pause();
                }
            }
            ControlState::PauseWithFade => {
                let progress = self.fade_progress();
                self.push_falling_volume(target, 1.0 - progress);
                match self.phase {
                    LifecyclePhase::Ready => self.phase = LifecyclePhase::Waiting,
                    LifecyclePhase::Waiting if progress >= 1.0 => {
                        self.phase = LifecyclePhase::Done;
                        target.pause();
                    }
                    _ => {}
                }
            }
            ControlState::StopImmediately => {
                self.timer.reset();
                self.push_volume(target, 0.0);
                if self.phase == LifecyclePhase::Ready {
                    self.phase = LifecyclePhase::Done;
                    target.stop();
                }
            }
            ControlState::StopWithFade => {
                let progress = self.fade_progress();
                self.push_falling_volume(target, 1.0 - progress);
                match self.phase {
                    LifecyclePhase::Ready => {
                        self.seek_to_start_pending = true;
                        self.phase = LifecyclePhase::Waiting;
                    }
                    LifecyclePhase::Waiting if progress >= 1.0 => {
                        self.phase = LifecyclePhase::Done;
                        target.stop();
                        self.seek_to_start_pending = false;
                    }
                    _ => {}
                }
            }
        }
        true
    }

    fn advance_play<T>(&mut self, target: &mut T)
    where
        T: PlaybackTarget + ?Sized,
    {
        match self.phase {
            LifecyclePhase::Ready => {
                if self.seek_to_start_pending {
                    self.seek_to_start_pending = false;
                    target.seek_to_start();
                }
                if target.play() {
                    self.phase = LifecyclePhase::Done;
                } else {
                    trace!("Play refused, retrying next tick");
                }
            }
            LifecyclePhase::Done if target.reached_end() => {
                self.phase = LifecyclePhase::EndOfStream;
            }
            _ => {}
        }
    }

    /// Fraction of the fade elapsed, starting the timer on first use.
    fn fade_progress(&mut self) -> f64 {
        if !self.timer.is_started() {
            self.timer.restart();
        }
        fade_in_volume(self.timer.elapsed_sec(), self.duration_sec)
    }

    fn push_volume<T>(&mut self, target: &mut T, volume: f64)
    where
        T: PlaybackTarget + ?Sized,
    {
        let volume = volume.clamp(0.0, 1.0);
        if volume != self.current_volume {
            self.current_volume = volume;
            target.set_fade_volume(volume);
        }
    }

    /// Push only when the ramp moves down, so a fade-out never gets louder.
    fn push_falling_volume<T>(&mut self, target: &mut T, volume: f64)
    where
        T: PlaybackTarget + ?Sized,
    {
        let volume = volume.clamp(0.0, 1.0);
        if volume.min(self.current_volume) != self.current_volume {
            self.current_volume = volume;
            target.set_fade_volume(volume);
        }
    }
}

/// Fade-in volume after `elapsed_sec` of a `duration_sec` fade.
pub fn fade_in_volume(elapsed_sec: f64, duration_sec: f64) -> f64 {
    if duration_sec <= 0.0 {
        return 1.0;
    }
    (elapsed_sec / duration_sec).clamp(0.0, 1.0)
}

/// Fade-out volume after `elapsed_sec` of a `duration_sec` fade.
pub fn fade_out_volume(elapsed_sec: f64, duration_sec: f64) -> f64 {
    1.0 - fade_in_volume(elapsed_sec, duration_sec)
}
