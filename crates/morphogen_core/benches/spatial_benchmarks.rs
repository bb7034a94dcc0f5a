use criterion::{black_box, criterion_group, criterion_main, Criterion};
use morphogen_core::spatial::SpatialIndex;
use morphogen_data::{Sphere, Vec3};
use uuid::Uuid;

fn grid(count: usize) -> Vec<(Uuid, Sphere)> {
    (0..count)
        .map(|i| {
            let x = (i % 10) as f32 * 3.0;
            let y = ((i / 10) % 10) as f32 * 3.0;
            let z = (i / 100) as f32 * 3.0;
            (Uuid::new_v4(), Sphere::new(Vec3::new(x, y, z), 1.8))
        })
        .collect()
}

fn bench_spatial_rebuild(c: &mut Criterion) {
    let entries = grid(1000);

    c.bench_function("spatial_rebuild_1000", |b| {
        b.iter(|| {
            let mut index = SpatialIndex::new(4.0);
            index.rebuild(entries.iter().copied());
            black_box(index)
        })
    });
}

fn bench_spatial_query(c: &mut Criterion) {
    let mut index = SpatialIndex::new(4.0);
    index.rebuild(grid(1000));
    let probe = Sphere::new(Vec3::new(15.0, 15.0, 15.0), 5.0);

    c.bench_function("spatial_query_radius_5", |b| {
        b.iter(|| black_box(index.query(&probe).len()))
    });
}

fn bench_candidate_pairs(c: &mut Criterion) {
    let mut index = SpatialIndex::new(4.0);
    index.rebuild(grid(1000));

    c.bench_function("spatial_candidate_pairs_1000", |b| {
        b.iter(|| black_box(index.candidate_pairs().len()))
    });
}

criterion_group!(
    benches,
    bench_spatial_rebuild,
    bench_spatial_query,
    bench_candidate_pairs
);
criterion_main!(benches);
