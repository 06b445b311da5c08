//! Feeder and fade threads running on their own.

use chime_audio::{AudioConfig, AudioManager, FeedMode, OfflineBackend};
use chime_core::{SystemClock, Wave, WaveSample};
use std::sync::Arc;
use std::time::{Duration, Instant};

const RATE: u32 = 8_000;

fn threaded() -> (AudioManager, Arc<OfflineBackend>) {
    let config = AudioConfig {
        feed_mode: FeedMode::Thread,
        feed_interval_ms: 1,
        fade_interval_ms: 2,
        ..AudioConfig::offline()
    };
    let backend = Arc::new(OfflineBackend::new(RATE, 2).unwrap());
    let manager = AudioManager::with_backend(backend.clone(), config, SystemClock::shared());
    (manager, backend)
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    false
}

#[test]
fn feeder_thread_streams_without_pumping() {
    let (manager, backend) = threaded();
    let id = manager.create(Wave::new(RATE, vec![WaveSample::mono(0.1); RATE as usize]));
    manager.play(id, 0.0);

    assert!(wait_until(|| {
        backend.render(64);
        manager.samples_played(id) > 0
    }));
    assert!(manager.is_playing(id));
}

#[test]
fn fade_thread_completes_fading_pause() {
    let (manager, backend) = threaded();
    let id = manager.create(Wave::new(RATE, vec![WaveSample::mono(0.1); RATE as usize * 4]));
    manager.play(id, 0.0);
    manager.pause(id, 0.05);

    assert!(wait_until(|| {
        backend.render(16);
        manager.is_paused(id)
    }));
}

#[test]
fn natural_end_is_detected_by_threads() {
    let (manager, backend) = threaded();
    let id = manager.create(Wave::new(RATE, vec![WaveSample::mono(0.1); 400]));
    manager.play(id, 0.0);

    assert!(wait_until(|| {
        backend.render(64);
        !manager.is_playing(id)
    }));
    assert_eq!(manager.samples_played(id), 400);
    assert_eq!(manager.pos_sample(id), 0);
}

#[test]
fn shutdown_joins_every_thread() {
    let (manager, backend) = threaded();
    for _ in 0..4 {
        let id = manager.create(Wave::new(RATE, vec![WaveSample::mono(0.1); 800]));
        manager.play(id, 0.0);
        manager.play_one_shot(id, 0.5, 1.0);
    }
    backend.render(128);
    drop(manager);
    assert_eq!(backend.voice_count(), 0);
}
