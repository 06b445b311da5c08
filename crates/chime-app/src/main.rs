//! chime - audio playback demo
//!
//! Plays a synthesized tone through the configured backend: fade in, fading
//! pause, a pitched loop, a burst of one-shots, then a master fade-out.
//!
//! Usage: `chime [config.json]`

use anyhow::{Context, Result};
use chime_audio::{Audio, AudioConfig, AudioManager, BackendKind, OfflineBackend, Wave};
use chime_core::{as_interleaved, SystemClock};
use std::f64::consts::TAU;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const TONE_RATE: u32 = 44_100;
const TICK: Duration = Duration::from_millis(10);

/// Drives the offline backend in real time when there is no device.
struct Host {
    offline: Option<Arc<OfflineBackend>>,
    frames_per_tick: usize,
    captured_sec: f64,
    peak: f32,
}

impl Host {
    fn run_for(&mut self, manager: &AudioManager, seconds: f64) {
        let ticks = (seconds / TICK.as_secs_f64()).ceil() as usize;
        for _ in 0..ticks {
            manager.pump();
            if let Some(offline) = &self.offline {
                let block = offline.render_wave(self.frames_per_tick);
                self.captured_sec += block.length_sec();
                self.peak = as_interleaved(&block)
                    .iter()
                    .fold(self.peak, |peak, s| peak.max(s.abs()));
            }
            std::thread::sleep(TICK);
        }
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => AudioConfig::load_from_file(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => AudioConfig::default(),
    };
    info!("chime starting (backend: {})", config.backend);

    let frames_per_tick =
        (config.offline_sample_rate as f64 * TICK.as_secs_f64()).ceil() as usize;
    let (manager, offline) = if config.backend == BackendKind::Offline {
        let backend = Arc::new(
            OfflineBackend::new(config.offline_sample_rate, config.offline_channels)
                .context("failed to open offline backend")?,
        );
        let manager = AudioManager::with_backend(backend.clone(), config, SystemClock::shared());
        (manager, Some(backend))
    } else {
        (AudioManager::new(config), None)
    };
    info!(
        "Output: {} backend, device attached: {}",
        manager.backend_kind(),
        manager.has_audio_device()
    );

    let mut host = Host {
        offline,
        frames_per_tick,
        captured_sec: 0.0,
        peak: 0.0,
    };
    run_demo(&manager, &mut host);

    manager.fade_master_volume();
    if host.offline.is_some() {
        info!(
            "Offline render: {:.2} s captured, peak level {:.3}",
            host.captured_sec, host.peak
        );
    }
    info!("chime finished");
    Ok(())
}

fn run_demo(manager: &AudioManager, host: &mut Host) {
    let tone = Wave::generate(TONE_RATE, 2.0, |t| {
        0.3 * (TAU * 440.0 * t).sin() * (1.0 - 0.3 * (TAU * 3.0 * t).sin())
    });
    let audio = Audio::new(manager, tone);
    info!(
        "Tone: {:.2} s at {} Hz (voice {})",
        audio.length_sec(),
        audio.sampling_rate(),
        audio.id()
    );

    audio.play(0.5);
    host.run_for(manager, 1.0);
    info!("Fading in, at {:.2} s", audio.pos_sec());

    audio.pause(0.3);
    host.run_for(manager, 0.5);
    info!("Paused: {}, at {:.2} s", audio.is_paused(), audio.pos_sec());

    if !audio.set_loop_seconds(0.5, Some(1.5)) {
        info!("Loop region rejected");
    }
    audio.set_speed_by_semitone(7.0);
    audio.set_volume_db(-6.0);
    audio.play(0.0);
    host.run_for(manager, 2.0);
    info!(
        "Looping at speed {:.3} (range {:.4}..{:.1}), at {:.2} s",
        audio.speed(),
        audio.min_speed(),
        audio.max_speed(),
        audio.pos_sec()
    );

    let blip = Wave::generate(TONE_RATE, 0.15, |t| {
        0.4 * (TAU * 880.0 * t).sin() * (1.0 - t / 0.15)
    });
    let blips = Audio::new(manager, blip);
    for semitones in [0.0, 4.0, 7.0, 12.0] {
        blips.play_one_shot(0.8, chime_audio::semitone_ratio(semitones));
    }
    info!("Started {} one-shots", blips.one_shot_count());
    host.run_for(manager, 0.5);

    audio.stop(0.5);
    host.run_for(manager, 0.7);
    info!("Stopped: playing {}, {} voices live", audio.is_playing(), manager.live_voices());
}
