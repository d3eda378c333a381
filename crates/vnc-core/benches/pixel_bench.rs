//! Criterion benchmarks for raw update encoding.
//!
//! Every framebuffer update copies (and, for non-native formats, repacks)
//! the whole requested region, so this is the hot loop of the writer task.
//!
//! Run with:
//! ```bash
//! cargo bench --package vnc-core --bench pixel_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use vnc_core::protocol::{encode_raw_update, encode_region, PixelFormat, Rectangle};

const WIDTH: u16 = 720;
const HEIGHT: u16 = 1280;

fn frame() -> Vec<u8> {
    (0..usize::from(WIDTH) * usize::from(HEIGHT) * 4)
        .map(|i| (i % 251) as u8)
        .collect()
}

fn formats() -> Vec<(&'static str, PixelFormat)> {
    vec![
        ("rgba8888", PixelFormat::rgba8888()),
        (
            "bgrx8888_be",
            PixelFormat {
                big_endian: true,
                red_shift: 16,
                green_shift: 8,
                blue_shift: 0,
                ..PixelFormat::rgba8888()
            },
        ),
        (
            "rgb565",
            PixelFormat {
                bits_per_pixel: 16,
                depth: 16,
                big_endian: false,
                true_colour: true,
                red_max: 31,
                green_max: 63,
                blue_max: 31,
                red_shift: 11,
                green_shift: 5,
                blue_shift: 0,
            },
        ),
    ]
}

fn bench_encode_full_frame(c: &mut Criterion) {
    let src = frame();
    let region = Rectangle::full(WIDTH, HEIGHT);
    let mut group = c.benchmark_group("encode_full_frame");
    group.throughput(Throughput::Elements(region.area() as u64));
    for (name, format) in formats() {
        group.bench_with_input(BenchmarkId::from_parameter(name), &format, |b, f| {
            b.iter(|| {
                let pixels = encode_region(black_box(&src), WIDTH, region, f);
                encode_raw_update(region, &pixels)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode_full_frame);
criterion_main!(benches);
