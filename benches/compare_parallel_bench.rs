//! Sequential vs parallel skill ranking over the sample skill catalog.
//!
//! Run with: `cargo bench --bench compare_parallel`

use std::path::PathBuf;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use racesim::conditions::ConditionTable;
use racesim::data::Dataset;
use racesim::parallel::WorkerPool;
use racesim::simulation::{rank_skills, Scenario};

fn bench_rank_sequential_vs_parallel(c: &mut Criterion) {
    let dataset =
        Dataset::load(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data")).expect("sample dataset");
    let table = ConditionTable::standard();
    let scenario = Scenario {
        course: dataset.course(10101).expect("course 10101"),
        params: dataset.params.clone(),
        horse: dataset.horse("Sample Closer").expect("sample horse").clone(),
        samples: 50,
        seed: 42,
    };

    let mut group = c.benchmark_group("rank_skills");
    group.sample_size(10);
    group.measurement_time(std::time::Duration::from_secs(10));

    for (label, pool) in [
        ("sequential", WorkerPool::with_workers(1)),
        ("parallel", WorkerPool::default_workers()),
    ] {
        group.bench_function(label, |b| {
            b.iter(|| {
                black_box(
                    rank_skills(&scenario, &[], 95.0, &table, &dataset.skills, &pool)
                        .expect("ranking")
                        .len(),
                )
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_rank_sequential_vs_parallel);
criterion_main!(benches);
