//! Invalid and released handles behave exactly like the null voice.

use crate::support::{flat, Rig};
use chime_audio::{AudioConfig, AudioManager, BackendKind};
use chime_core::AudioId;
use proptest::prelude::*;

/// Everything observable about a handle without mutating it.
#[derive(Debug, PartialEq)]
struct Snapshot {
    playing: bool,
    paused: bool,
    pos: u64,
    stream_pos: u64,
    played: u64,
    rate: u32,
    samples: usize,
    volume: (f64, f64),
    speed: f64,
    speed_range: (f64, f64),
    looping: bool,
}

fn snapshot(manager: &AudioManager, id: AudioId) -> Snapshot {
    Snapshot {
        playing: manager.is_playing(id),
        paused: manager.is_paused(id),
        pos: manager.pos_sample(id),
        stream_pos: manager.stream_pos_sample(id),
        played: manager.samples_played(id),
        rate: manager.sampling_rate(id),
        samples: manager.samples(id),
        volume: manager.get_volume(id),
        speed: manager.get_speed(id),
        speed_range: manager.get_min_max_speed(id),
        looping: manager.get_loop(id).is_some(),
    }
}

#[test]
fn released_handle_resolves_to_null_voice() {
    let rig = Rig::new();
    let id = rig.manager.create(flat(100, 0.1));
    rig.manager.set_volume(id, (0.2, 0.3));
    assert_ne!(snapshot(&rig.manager, id), snapshot(&rig.manager, AudioId::NULL));

    rig.manager.release(id);
    assert_eq!(snapshot(&rig.manager, id), snapshot(&rig.manager, AudioId::NULL));
    // Releasing twice is harmless.
    rig.manager.release(id);
    assert_eq!(rig.manager.live_voices(), 0);
}

#[test]
fn operations_on_stale_handle_act_on_null_voice() {
    let rig = Rig::new();
    let stale = AudioId::from_raw(424_242);
    rig.manager.set_volume(stale, (0.5, 0.25));
    assert_eq!(rig.manager.get_volume(AudioId::NULL), (0.5, 0.25));

    assert!(rig.manager.play(stale, 0.0));
    assert!(rig.manager.is_playing(AudioId::NULL));
    rig.manager.stop(stale, 0.0);
    assert!(!rig.manager.is_playing(AudioId::NULL));
}

#[test]
fn live_voices_are_unaffected_by_stale_handles() {
    let rig = Rig::new();
    let id = rig.manager.create(flat(100, 0.1));
    let before = snapshot(&rig.manager, id);

    let stale = AudioId::from_raw(id.raw() + 1000);
    rig.manager.play(stale, 0.0);
    rig.manager.set_volume(stale, (0.0, 0.0));
    rig.manager.set_speed(stale, 0.5);
    rig.manager.set_pos_sample(stale, 10);

    assert_eq!(snapshot(&rig.manager, id), before);
}

#[test]
fn config_selects_null_backend() {
    let config = AudioConfig::from_json(br#"{"backend": "null"}"#).unwrap();
    let manager = AudioManager::open(config).unwrap();
    assert_eq!(manager.backend_kind(), BackendKind::Null);
    assert!(!manager.has_audio_device());

    let id = manager.create(flat(100, 0.1));
    assert!(manager.play(id, 0.5));
    assert_eq!(manager.samples_played(id), 0);
    assert_eq!(manager.get_min_max_speed(id), (1.0, 1.0));
    assert_eq!(manager.master_volume(), 1.0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn unknown_handles_match_null_voice(raw in 2u64..u64::MAX, fade in -2.0f64..2.0) {
        let rig = Rig::new();
        let live = rig.manager.create(flat(100, 0.1));
        prop_assume!(raw != live.raw());
        let id = AudioId::from_raw(raw);

        prop_assert_eq!(snapshot(&rig.manager, id), snapshot(&rig.manager, AudioId::NULL));
        rig.manager.pause(id, fade);
        rig.manager.stop(id, fade);
        prop_assert!(!rig.manager.contains(id));
        prop_assert_eq!(snapshot(&rig.manager, id), snapshot(&rig.manager, AudioId::NULL));
    }
}
