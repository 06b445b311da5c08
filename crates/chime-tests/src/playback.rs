//! End-to-end playback behavior through the manager.

use crate::support::{flat, Rig, RATE};
use chime_core::{LoopRegion, Wave, WaveSample};

fn ramp(len: usize) -> Wave {
    Wave::new(
        RATE,
        (0..len).map(|i| WaveSample::mono(i as f32 / len as f32)).collect(),
    )
}

#[test]
fn loop_positions_wrap_from_end_to_begin() {
    let rig = Rig::new();
    let id = rig.manager.create(ramp(100));
    assert!(rig.manager.set_loop(id, true, 20, 80));
    rig.manager.play(id, 0.0);
    assert_eq!(rig.manager.pos_sample(id), 0);

    let positions: Vec<u64> = (0..16)
        .map(|_| {
            rig.step(10);
            rig.manager.pos_sample(id)
        })
        .collect();
    assert_eq!(
        positions,
        vec![10, 20, 30, 40, 50, 60, 70, 20, 30, 40, 50, 60, 70, 20, 30, 40]
    );
}

#[test]
fn short_loop_position_stays_in_region() {
    let rig = Rig::new();
    let id = rig.manager.create(ramp(100));
    // Three frames of loop against a ten-frame queue target.
    assert!(rig.manager.set_loop(id, true, 20, 23));
    rig.manager.play(id, 0.0);

    for _ in 0..60 {
        rig.manager.pump();
        let heard = rig.backend.render_wave(1);
        let pos = rig.manager.pos_sample(id);
        let played = rig.manager.samples_played(id);
        let expected = if played < 23 { played } else { 20 + (played - 23) % 3 };
        assert_eq!(pos, expected);
        if played > 20 {
            assert!((20..23).contains(&pos));
        }
        // The frame just heard is the one before the reported position.
        let prev = if pos == 20 && played > 20 { 22 } else { pos - 1 };
        assert_eq!(heard[0], ramp(100)[prev as usize]);
    }
}

#[test]
fn non_looping_voice_ends_once() {
    let config = chime_audio::AudioConfig {
        // Target queue of 30 frames at this rate.
        buffer_divisor: 10,
        ..chime_audio::AudioConfig::deterministic(RATE)
    };
    let rig = Rig::with_config(config);
    let id = rig.manager.create(ramp(100));
    rig.manager.play(id, 0.0);

    for _ in 0..3 {
        rig.step(30);
    }
    assert_eq!(rig.manager.samples_played(id), 90);
    rig.step(30);
    assert_eq!(rig.manager.samples_played(id), 100);

    rig.manager.pump();
    rig.tick(0.02);
    assert!(!rig.manager.is_playing(id));
    assert_eq!(rig.manager.pos_sample(id), 0);

    for _ in 0..3 {
        rig.step(30);
    }
    assert_eq!(rig.manager.samples_played(id), 100);
    assert_eq!(rig.manager.stream_pos_sample(id), 0);
}

#[test]
fn replay_after_end_starts_over() {
    let rig = Rig::new();
    let id = rig.manager.create(ramp(40));
    rig.manager.play(id, 0.0);
    for _ in 0..6 {
        rig.step(10);
    }
    rig.tick(0.02);
    assert!(!rig.manager.is_playing(id));

    rig.manager.play(id, 0.0);
    assert!(rig.manager.is_playing(id));
    rig.step(10);
    assert_eq!(rig.manager.pos_sample(id), 10);
}

#[test]
fn play_while_playing_leaves_fade_untouched() {
    let rig = Rig::new();
    let id = rig.manager.create(flat(600, 0.25));
    rig.manager.play(id, 0.0);
    rig.step(5);

    rig.manager.play(id, 1.0);
    rig.tick(0.1);
    let out = rig.step(5);
    assert!(out.iter().all(|s| (s - 0.25).abs() < 1e-6));
}

#[test]
fn pause_with_fade_ramps_down_then_holds() {
    let rig = Rig::new();
    let id = rig.manager.create(flat(600, 0.25));
    rig.manager.play(id, 0.0);
    rig.step(5);

    rig.manager.pause(id, 1.0);
    rig.tick(0.5);
    // Fade volume 0.5 is applied squared.
    let out = rig.step(5);
    assert!((out[0] - 0.0625).abs() < 1e-6);
    assert!(rig.manager.is_playing(id));

    rig.tick(0.6);
    assert!(rig.manager.is_paused(id));
    let pos = rig.manager.pos_sample(id);
    let out = rig.step(5);
    assert!(out.iter().all(|s| *s == 0.0));
    assert_eq!(rig.manager.pos_sample(id), pos);

    rig.manager.play(id, 0.0);
    let out = rig.step(5);
    assert!((out[0] - 0.25).abs() < 1e-6);
}

#[test]
fn stop_with_fade_then_play_restarts_from_zero() {
    let rig = Rig::new();
    let id = rig.manager.create(ramp(600));
    rig.manager.play(id, 0.0);
    for _ in 0..3 {
        rig.step(10);
    }
    assert_eq!(rig.manager.pos_sample(id), 30);

    rig.manager.stop(id, 1.0);
    rig.tick(0.4);
    rig.step(10);
    assert_eq!(rig.manager.pos_sample(id), 40);

    rig.manager.play(id, 0.0);
    assert_eq!(rig.manager.pos_sample(id), 0);
    rig.step(10);
    assert_eq!(rig.manager.pos_sample(id), 10);
}

#[test]
fn seek_while_playing_continues_from_new_position() {
    let rig = Rig::new();
    let id = rig.manager.create(ramp(600));
    rig.manager.play(id, 0.0);
    rig.step(10);

    rig.manager.set_pos_sample(id, 300);
    assert!(rig.manager.is_playing(id));
    rig.step(10);
    assert_eq!(rig.manager.pos_sample(id), 310);

    rig.manager.set_pos_sample(id, 10_000);
    assert_eq!(rig.manager.stream_pos_sample(id), 600);
}

#[test]
fn loop_survives_stop_and_replay() {
    let rig = Rig::new();
    let id = rig.manager.create(ramp(100));
    rig.manager.set_loop(id, true, 20, 80);
    rig.manager.set_volume(id, (0.5, 0.5));
    rig.manager.set_speed(id, 1.5);
    rig.manager.play(id, 0.0);
    rig.step(10);

    rig.manager.stop(id, 0.0);
    assert!(!rig.manager.is_playing(id));
    assert_eq!(rig.manager.get_loop(id), Some(LoopRegion::new(20, 80, 100).unwrap()));
    assert_eq!(rig.manager.get_volume(id), (0.5, 0.5));
    assert_eq!(rig.manager.get_speed(id), 1.5);
}

#[test]
fn one_shot_pool_is_bounded() {
    let rig = Rig::new();
    let id = rig.manager.create(flat(100, 0.01));
    let max = rig.manager.config().max_voice_shots;

    for _ in 0..max + 5 {
        assert!(rig.manager.play_one_shot(id, 1.0, 1.0));
    }
    assert_eq!(rig.manager.one_shot_count(id), max);
    // One-shots plus the voice's stream and the null voice.
    assert_eq!(rig.backend.voice_count(), max + 2);

    rig.backend.render(150);
    rig.tick(0.02);
    assert_eq!(rig.manager.one_shot_count(id), 0);
}

#[test]
fn stop_all_shots_silences_instances() {
    let rig = Rig::new();
    let id = rig.manager.create(flat(100, 0.1));
    rig.manager.play_one_shot(id, 1.0, 1.0);
    rig.manager.play_one_shot(id, 1.0, 2.0);
    assert!(rig.backend.render(1)[0] > 0.0);

    rig.manager.stop_all_shots(id);
    assert_eq!(rig.manager.one_shot_count(id), 0);
    assert!(rig.backend.render(4).iter().all(|s| *s == 0.0));
}

#[test]
fn master_volume_scales_output() {
    let rig = Rig::new();
    let id = rig.manager.create(flat(600, 0.5));
    rig.manager.set_master_volume(0.5);
    rig.manager.play(id, 0.0);
    let out = rig.step(5);
    assert!((out[0] - 0.25).abs() < 1e-6);

    rig.manager.fade_master_volume();
    assert_eq!(rig.manager.master_volume(), 0.0);
    assert!(rig.step(5).iter().all(|s| *s == 0.0));
}
