//! Benchmarks for error collection and the spatial index

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use geo::{Geometry, LineString, Polygon};
use geocheck_algorithms::checks::{AngleParams, Check, SegmentLengthParams};
use geocheck_algorithms::engine::{CheckContext, FeaturePools, Tolerance};
use geocheck_algorithms::geometry::{Envelope, EnvelopeIndex};
use geocheck_core::{GeometryType, Layer, NoFeedback, CRS};

/// `n * n` slightly jittered squares, one per grid cell
fn create_polygon_layer(n: usize) -> Layer {
    let mut layer = Layer::new("cells", "cells", GeometryType::Polygon);
    for row in 0..n {
        for col in 0..n {
            let x = col as f64 * 2.0;
            let y = row as f64 * 2.0;
            let jitter = ((row * 7 + col * 13) % 17) as f64 * 0.005;
            let ring = LineString::from(vec![
                (x, y),
                (x + 1.0, y),
                (x + 1.0, y + 1.0 - jitter),
                (x + 1.0 - jitter, y + 1.0),
                (x, y + 1.0),
                (x, y),
            ]);
            layer.push_geometry(Geometry::Polygon(Polygon::new(ring, vec![])));
        }
    }
    layer
}

/// `n` horizontal lines crossed by `n` vertical ones
fn create_line_layer(n: usize) -> Layer {
    let mut layer = Layer::new("grid", "grid", GeometryType::Line);
    let extent = n as f64;
    for i in 0..n {
        let t = i as f64 + 0.5;
        layer.push_geometry(Geometry::LineString(LineString::from(vec![(0.0, t), (extent, t)])));
        layer.push_geometry(Geometry::LineString(LineString::from(vec![(t, 0.0), (t, extent)])));
    }
    layer
}

fn context() -> CheckContext {
    CheckContext::new(Tolerance::default(), CRS::unknown())
}

fn bench_segment_length(c: &mut Criterion) {
    let mut group = c.benchmark_group("checks/segment_length");
    let check = Check::segment_length(SegmentLengthParams {
        min_segment_length: 0.03,
    })
    .unwrap();
    for n in [16, 32, 64] {
        let pools = FeaturePools::from_layers(vec![create_polygon_layer(n)], false).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(n * n), &n, |b, _| {
            b.iter(|| check.as_check().collect_errors(black_box(&pools), &context(), &NoFeedback).unwrap())
        });
    }
    group.finish();
}

fn bench_angle(c: &mut Criterion) {
    let mut group = c.benchmark_group("checks/angle");
    let check = Check::angle(AngleParams { min_angle: 15.0 }).unwrap();
    for n in [16, 32, 64] {
        let pools = FeaturePools::from_layers(vec![create_polygon_layer(n)], false).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(n * n), &n, |b, _| {
            b.iter(|| check.as_check().collect_errors(black_box(&pools), &context(), &NoFeedback).unwrap())
        });
    }
    group.finish();
}

fn bench_dangle(c: &mut Criterion) {
    let mut group = c.benchmark_group("checks/dangle");
    let check = Check::dangle();
    for n in [32, 128, 512] {
        let pools = FeaturePools::from_layers(vec![create_line_layer(n)], false).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(2 * n), &n, |b, _| {
            b.iter(|| check.as_check().collect_errors(black_box(&pools), &context(), &NoFeedback).unwrap())
        });
    }
    group.finish();
}

fn bench_contained(c: &mut Criterion) {
    let mut group = c.benchmark_group("checks/contained");
    let check = Check::contained();
    for n in [16, 32] {
        let pools =
            FeaturePools::from_layers(vec![create_polygon_layer(n), create_line_layer(2 * n)], false).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(n * n), &n, |b, _| {
            b.iter(|| check.as_check().collect_errors(black_box(&pools), &context(), &NoFeedback).unwrap())
        });
    }
    group.finish();
}

fn bench_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("index/query");
    for n in [1_000usize, 10_000, 100_000] {
        let side = (n as f64).sqrt().ceil() as usize;
        let entries: Vec<_> = (0..n)
            .map(|i| {
                let x = (i % side) as f64;
                let y = (i / side) as f64;
                (i as i64, Envelope::new(x, y, x + 0.8, y + 0.8))
            })
            .collect();
        let index = EnvelopeIndex::build(entries);
        let window = Envelope::new(10.0, 10.0, 20.0, 20.0);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| index.query(black_box(&window)))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_segment_length,
    bench_angle,
    bench_dangle,
    bench_contained,
    bench_index
);
criterion_main!(benches);
