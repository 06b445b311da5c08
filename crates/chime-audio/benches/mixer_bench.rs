//! Benchmarks for the chime-audio render path.
//!
//! Run with: cargo bench -p chime-audio

use chime_audio::{HardwareVoice, Mixer, RingBuffer, VoiceFormat, WaveSample};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const RATE: u32 = 48_000;
const BLOCK_FRAMES: usize = 512;

fn tone(len: usize) -> Vec<WaveSample> {
    (0..len)
        .map(|i| WaveSample::mono((i as f32 * 0.05).sin() * 0.25))
        .collect()
}

fn bench_mixer_render(c: &mut Criterion) {
    let source = tone(BLOCK_FRAMES * 4);

    for (name, ratio) in [("mixer_render_8_voices", 1.0), ("mixer_render_8_voices_resampled", 1.37)] {
        let mixer = Mixer::new(RATE, 2);
        let voices: Vec<_> = (0..8)
            .map(|_| {
                let voice = mixer
                    .add_voice(VoiceFormat::new(RATE, 2.0, BLOCK_FRAMES * 8))
                    .unwrap();
                voice.set_frequency_ratio(ratio);
                voice.start().unwrap();
                voice
            })
            .collect();
        let mut out = vec![0.0f32; BLOCK_FRAMES * 2];

        c.bench_function(name, |bencher| {
            bencher.iter(|| {
                for voice in &voices {
                    if voice.queued_samples() < BLOCK_FRAMES * 2 {
                        voice.submit(&source, false);
                    }
                }
                mixer.render(black_box(&mut out));
            });
        });
    }
}

fn bench_ring_buffer(c: &mut Criterion) {
    let buffer = RingBuffer::new(BLOCK_FRAMES * 4);
    let source = tone(BLOCK_FRAMES);
    let mut sink = vec![WaveSample::ZERO; BLOCK_FRAMES];

    c.bench_function("ring_buffer_write_read_512", |bencher| {
        bencher.iter(|| {
            buffer.write(black_box(&source));
            buffer.read(black_box(&mut sink));
        });
    });
}

criterion_group!(benches, bench_mixer_render, bench_ring_buffer);
criterion_main!(benches);
