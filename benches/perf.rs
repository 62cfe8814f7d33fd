use std::collections::{HashMap, HashSet};
use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};

use pitchline::percentiles::ranked_percentile;
use pitchline::scores::{ScoreInputs, resolve_scores};
use pitchline::stats::quantile_sorted;

fn bench_score_resolution(c: &mut Criterion) {
    let spine: Vec<String> = (0..10_000).map(|i| format!("m{i}")).collect();
    let mut trusted = HashMap::new();
    let mut from_incidents = HashMap::new();
    let mut with_appearances = HashSet::new();
    for (i, id) in spine.iter().enumerate() {
        match i % 4 {
            0 => {
                trusted.insert(id.clone(), ((i % 5) as i64, (i % 3) as i64));
            }
            1 => {
                from_incidents.insert(id.clone(), ((i % 4) as i64, (i % 2) as i64));
            }
            2 => {
                with_appearances.insert(id.clone());
            }
            _ => {}
        }
    }
    let inputs = ScoreInputs {
        trusted,
        from_incidents,
        with_appearances,
    };

    c.bench_function("resolve_scores_10k", |b| {
        b.iter(|| {
            let rows = resolve_scores(black_box(&spine), black_box(&inputs));
            black_box(rows.len());
        })
    });
}

fn bench_percentiles(c: &mut Criterion) {
    let peers: Vec<f64> = (0..2_000).map(|i| (i % 97) as f64 / 10.0).collect();

    c.bench_function("ranked_percentile_2k_peers", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            for v in [0.5, 3.3, 7.1, 9.6] {
                acc += ranked_percentile(black_box("goals_per90"), black_box(&peers), v);
                acc += ranked_percentile(black_box("fouls_per90"), black_box(&peers), v);
            }
            black_box(acc);
        })
    });

    let mut sorted = peers.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    c.bench_function("quantiles_2k", |b| {
        b.iter(|| {
            let p25 = quantile_sorted(black_box(&sorted), 0.25).unwrap();
            let p90 = quantile_sorted(black_box(&sorted), 0.90).unwrap();
            black_box(p25 + p90);
        })
    });
}

criterion_group!(benches, bench_score_resolution, bench_percentiles);
criterion_main!(benches);
