//! # Line Error Benchmark

use criterion::{criterion_group, criterion_main, Criterion};
use image::{Rgb, RgbImage};

use follower_lib::nav::line_error;

fn line_error_benchmark(c: &mut Criterion) {
    // ---- Build a dummy frame ----

    // A dark diagonal line on a light floor
    let frame = RgbImage::from_fn(640, 480, |x, y| {
        let line_x = 200 + y / 4;
        if x >= line_x && x < line_x + 40 {
            Rgb([20, 20, 20])
        } else {
            Rgb([200, 190, 180])
        }
    });

    c.bench_function("line_error::binarise", |b| {
        b.iter(|| line_error::binarise(&frame, 60))
    });

    let mask = line_error::binarise(&frame, 60);

    c.bench_function("line_error::extract", |b| {
        b.iter(|| line_error::extract(&mask))
    });
}

criterion_group!(benches, line_error_benchmark);
criterion_main!(benches);
