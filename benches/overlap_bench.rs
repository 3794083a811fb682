//! Benchmarks for overlap fraction estimation.
//!
//! Run with: `cargo bench --bench overlap_bench`
//!
//! Compares supersampling factors and tile heights on a synthetic grid
//! with a handful of irregular regions.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use geo::{LineString, MultiPolygon, Polygon};
use gridmask_rs::{
    OverlapConfig, ProgressReporter, Regions, RegularGrid, label, overlap_fractions, sample_axis,
};

/// Star-shaped polygon around (cx, cy) with `n` vertices.
fn blob(cx: f64, cy: f64, r: f64, n: usize) -> MultiPolygon<f64> {
    let mut coords: Vec<(f64, f64)> = (0..n)
        .map(|k| {
            let angle = 2.0 * std::f64::consts::PI * k as f64 / n as f64;
            let radius = r * (1.0 + 0.3 * (5.0 * angle).sin());
            (cx + radius * angle.cos(), cy + radius * angle.sin())
        })
        .collect();
    coords.push(coords[0]);
    MultiPolygon(vec![Polygon::new(LineString::from(coords), vec![])])
}

fn test_regions() -> Regions {
    Regions::from_polygons(vec![
        blob(115.0, -30.0, 4.0, 200),
        blob(125.0, -25.0, 5.0, 300),
        blob(135.0, -32.0, 3.5, 150),
        blob(145.0, -22.0, 4.5, 250),
    ])
}

/// Benchmark the full pipeline at different supersampling factors.
fn bench_factors(c: &mut Criterion) {
    let mut group = c.benchmark_group("overlap_factor");
    group.sample_size(10);

    let grid = RegularGrid::uniform(-40.0, 0.25, 80, 110.0, 0.25, 160);
    let regions = test_regions();

    for factor in [2usize, 5, 10] {
        group.bench_with_input(BenchmarkId::from_parameter(factor), &factor, |b, &factor| {
            let config = OverlapConfig::default().with_factor(factor);
            b.iter(|| {
                let raster = overlap_fractions(
                    black_box(&grid),
                    black_box(&regions),
                    &config,
                    &mut ProgressReporter::silent(),
                )
                .unwrap();
                black_box(raster)
            })
        });
    }

    group.finish();
}

/// Benchmark tiled labelling against a single pass.
fn bench_tiles(c: &mut Criterion) {
    let mut group = c.benchmark_group("overlap_tiles");
    group.sample_size(10);

    let grid = RegularGrid::uniform(-40.0, 0.25, 80, 110.0, 0.25, 160);
    let regions = test_regions();

    for tile_rows in [50usize, 200, 800] {
        group.bench_with_input(BenchmarkId::from_parameter(tile_rows), &tile_rows, |b, &rows| {
            let config = OverlapConfig::default().with_tile_rows(rows);
            b.iter(|| {
                let mut progress = ProgressReporter::silent();
                overlap_fractions(&grid, &regions, &config, &mut progress).unwrap()
            })
        });
    }

    group.finish();
}

/// Benchmark raw point labelling.
fn bench_label(c: &mut Criterion) {
    let lat: Vec<f64> = (0..40).map(|j| -40.0 + j as f64 * 0.5).collect();
    let lon: Vec<f64> = (0..80).map(|i| 110.0 + i as f64 * 0.5).collect();
    let lats = sample_axis(&lat, 10).unwrap();
    let lons = sample_axis(&lon, 10).unwrap();
    let regions = test_regions();

    c.bench_function("label_400x800", |b| {
        b.iter(|| label(black_box(&regions), black_box(&lons), black_box(&lats)).unwrap())
    });
}

criterion_group!(benches, bench_factors, bench_tiles, bench_label);
criterion_main!(benches);
