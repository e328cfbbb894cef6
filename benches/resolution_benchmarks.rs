// Resolution Benchmarks
// Criterion benchmarks for paired index insertion, repeat resolution and path growth

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use path_forge::assembly::{RepeatResolver, ResolverSettings};
use path_forge::paired_info::Point;
use path_forge::path_extend::CompositeExtender;
use path_forge::utils::configuration::{GapCloserConfig, PathExtendConfig};
use path_forge::{AssemblyGraph, Conjugation, EdgeId, LibraryStats, PairedInfoIndex, PathContainer};
use std::time::Duration;

const K: usize = 21;

fn random_sequence(rng: &mut fastrand::Rng, len: usize) -> String {
    (0..len).map(|_| ['A', 'C', 'G', 'T'][rng.usize(..4)]).collect()
}

/// A chain of `count` edges of random length with paired points between
/// every edge and its next few successors.
fn chain_with_index(count: usize, seed: u64) -> (AssemblyGraph, PairedInfoIndex) {
    let mut rng = fastrand::Rng::with_seed(seed);
    let mut graph = AssemblyGraph::new(K, Conjugation::Symmetric);
    let vertices: Vec<_> = (0..=count).map(|_| graph.add_vertex()).collect();
    let edges: Vec<EdgeId> = (0..count)
        .map(|i| {
            let len = rng.usize(50..150);
            graph
                .add_edge(vertices[i], vertices[i + 1], &random_sequence(&mut rng, len + K), 30.0)
                .unwrap()
        })
        .collect();

    let mut index = PairedInfoIndex::new();
    for i in 0..count {
        let mut d = 0;
        for j in i..count.min(i + 4) {
            index
                .add_point(edges[i], edges[j], Point::new(d as f64, 5.0, 0.0), true)
                .unwrap();
            d += graph.length(edges[j]);
        }
    }
    (graph, index)
}

fn bench_index_insertion(c: &mut Criterion) {
    let mut group = c.benchmark_group("paired_index_insertion");
    group.measurement_time(Duration::from_secs(10));

    for points in [1_000usize, 10_000, 50_000].iter() {
        group.throughput(Throughput::Elements(*points as u64));
        group.bench_with_input(BenchmarkId::from_parameter(points), points, |b, &points| {
            b.iter(|| {
                let mut rng = fastrand::Rng::with_seed(42);
                let mut index = PairedInfoIndex::new();
                for _ in 0..points {
                    let e1 = EdgeId(rng.usize(1..500));
                    let e2 = EdgeId(rng.usize(1..500));
                    let d = rng.i64(-300..300) as f64;
                    index.add_point(e1, e2, Point::new(d, 1.0, 0.0), true).unwrap();
                }
                black_box(index.size())
            })
        });
    }
    group.finish();
}

fn bench_repeat_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("repeat_resolution");
    group.sample_size(20);

    for count in [50usize, 200].iter() {
        let (graph, index) = chain_with_index(*count, 7);
        let library = LibraryStats::default();
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, _| {
            b.iter(|| {
                let mut resolver =
                    RepeatResolver::new(&graph, &index, library.clone(), ResolverSettings::default()).unwrap();
                resolver.resolve_repeats().unwrap();
                black_box(resolver.into_resolved().graph.edge_count())
            })
        });
    }
    group.finish();
}

fn bench_path_growth(c: &mut Criterion) {
    let mut group = c.benchmark_group("path_growth");
    group.sample_size(20);

    for count in [50usize, 200, 1000].iter() {
        let (graph, index) = chain_with_index(*count, 11);
        let library = LibraryStats::default();
        let config = PathExtendConfig::default();
        let gap_config = GapCloserConfig::default();
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, _| {
            b.iter(|| {
                let mut extender = CompositeExtender::from_config(&graph, &index, &library, &config, &gap_config);
                let seeds = PathContainer::seeds(&graph);
                black_box(extender.grow_all(&seeds).total_length())
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_index_insertion,
    bench_repeat_resolution,
    bench_path_growth
);
criterion_main!(benches);
