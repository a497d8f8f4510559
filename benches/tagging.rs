use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use srctag::collector::{Collector, CollectorConfig};
use srctag::facts::MemoryHistory;
use srctag::index::storage::{Storage, StorageConfig};
use srctag::index::MemoryIndex;
use srctag::tagger::{ScoringMode, Tagger, TaggerConfig};

const WORDS: [&str; 8] = ["cache", "parser", "network", "docs", "config", "render", "io", "tests"];

fn bench_tagging(c: &mut Criterion) {
    let mut h = MemoryHistory::new();
    for i in 0..600 {
        let msg = format!("{} {} tweak #{}", WORDS[i % 8], WORDS[(i / 8) % 8], i % 23);
        h.commit(&format!("c{i}"), &msg, [format!("src/f{}.rs", i % 90), format!("src/f{}.rs", (i * 13) % 90)]);
    }
    let collector = Collector::new(CollectorConfig { max_depth_limit: -1, ..Default::default() }).expect("valid config");
    let collection = collector.collect(&h).expect("collect");

    let mut storage_cfg = StorageConfig::default();
    for n in 0..23 {
        storage_cfg.issue_mapping.insert(format!("#{n}"), format!("{} issue {n}", WORDS[n % 8]));
    }
    let storage = Storage::new(storage_cfg);
    let mut index = MemoryIndex::new();
    storage.embed(&collection.facts, &collection.graph, &mut index);

    let mut group = c.benchmark_group("tagging");
    for weighting in [false, true] {
        let cfg = TaggerConfig { tags: WORDS.iter().map(|w| (*w).to_string()).collect(), weighting, ..Default::default() };
        let tagger = Tagger::new(cfg).expect("valid config");
        for mode in [ScoringMode::Direct, ScoringMode::IssueAware] {
            let id = format!("{mode}{}", if weighting { "+weighting" } else { "" });
            group.bench_function(BenchmarkId::new("tag_with_mode", id), |b| {
                b.iter(|| {
                    let run = tagger.tag_with_mode(&index, collection.graph.clone(), mode);
                    black_box(run.result.files().len())
                })
            });
        }
    }
    group.finish();
}

criterion_group!(name = benches; config = Criterion::default(); targets = bench_tagging);
criterion_main!(benches);
