//! Alignment throughput benchmarks.
//!
//! Measures the per-event cost of the hot paths a host calls on every
//! recognizer update and display frame.
//!
//! # Benchmarks
//!
//! - `index_build`: Indexing a 2000-word script
//! - `final_batch`: One final transcript event through the full alignment step
//! - `fallback_batch`: A batch with no n-gram hits, scored over the whole window
//! - `frame`: One scroll-controller frame
//!
//! # Running
//!
//! ```bash
//! cargo bench --bench alignment_throughput
//! ```

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use scriptsync_core::{
    EngineConfig, Script, ScriptIndex, StaticLayout, SyncEngine, TranscriptEvent,
};

const LINES: usize = 200;
const WORDS_PER_LINE: usize = 10;

fn word(i: usize) -> String {
    const ONSETS: [char; 12] = ['b', 'd', 'f', 'g', 'k', 'l', 'm', 'p', 'r', 's', 't', 'v'];
    const VOWELS: [char; 5] = ['a', 'e', 'i', 'o', 'u'];
    [
        ONSETS[i % 12],
        VOWELS[(i / 12) % 5],
        ONSETS[(i / 60) % 12],
        VOWELS[(i / 720) % 5],
    ]
    .iter()
    .collect()
}

fn words(range: std::ops::Range<usize>) -> String {
    range.map(word).collect::<Vec<_>>().join(" ")
}

fn script() -> Script {
    Script::from_paragraphs(
        (0..LINES).map(|l| words(l * WORDS_PER_LINE..(l + 1) * WORDS_PER_LINE)),
    )
}

fn engine() -> SyncEngine<StaticLayout> {
    let ranges: Vec<(usize, usize)> = (0..LINES)
        .map(|l| (l * WORDS_PER_LINE, (l + 1) * WORDS_PER_LINE))
        .collect();
    let layout = StaticLayout::uniform(&ranges, 40.0, 600.0);
    let mut engine = SyncEngine::new(layout, EngineConfig::default()).unwrap();
    engine.load_script(&script(), 0).unwrap();
    engine.tick(0);
    engine
}

fn bench_index_build(c: &mut Criterion) {
    let script = script();
    c.bench_function("index_build", |b| {
        b.iter(|| ScriptIndex::build(black_box(&script)));
    });
}

fn bench_final_batch(c: &mut Criterion) {
    let event = TranscriptEvent::final_text(words(40..52));
    c.bench_function("final_batch", |b| {
        b.iter_batched(
            engine,
            |mut engine| engine.handle_transcript(black_box(&event), 100),
            criterion::BatchSize::SmallInput,
        );
    });
}

fn bench_fallback_batch(c: &mut Criterion) {
    // Every token is in the script, but never in script order.
    let scrambled = (0..12).map(|i| word(i * 97 % 2000)).collect::<Vec<_>>().join(" ");
    let event = TranscriptEvent::final_text(scrambled);
    c.bench_function("fallback_batch", |b| {
        b.iter_batched(
            engine,
            |mut engine| engine.handle_transcript(black_box(&event), 100),
            criterion::BatchSize::SmallInput,
        );
    });
}

fn bench_frame(c: &mut Criterion) {
    let mut engine = engine();
    engine.handle_transcript(&TranscriptEvent::final_text(words(300..312)), 100);
    let mut now = 100;
    c.bench_function("frame", |b| {
        b.iter(|| {
            now += 16;
            let command = engine.frame(black_box(now));
            if let Some(command) = &command {
                engine.layout_mut().apply_command(command);
            }
            command
        });
    });
}

criterion_group!(
    benches,
    bench_index_build,
    bench_final_batch,
    bench_fallback_batch,
    bench_frame
);
criterion_main!(benches);
