use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use dualreadout::dataset::{Encoding, EncodingOptions, encode};
use dualreadout::normalize::{NormalizeOptions, normalize_batch};
use dualreadout::waveform::Histogram;

const WAVEFORM_COUNT: usize = 64;
const BINS: usize = 10_000;

fn synthetic_batch() -> Vec<Histogram> {
    (0..WAVEFORM_COUNT)
        .map(|i| {
            let contents = (0..BINS)
                .map(|bin| {
                    let z = (bin as f64 - 200.0 - i as f64) / 20.0;
                    -0.1 * (-z * z).exp()
                })
                .collect();
            Histogram::from_contents(format!("wf_{i}"), -2e-8, 1e-5 - 2e-8, contents)
                .expect("synthetic histogram")
        })
        .collect()
}

fn bench_encode(c: &mut Criterion) {
    let batch = normalize_batch(&synthetic_batch(), &NormalizeOptions::default())
        .expect("normalize batch");
    for kind in [Encoding::Linear, Encoding::PointPair, Encoding::Resampled] {
        let options = EncodingOptions {
            kind,
            resample_count: 1_000,
            resample_seed: Some(7),
        };
        c.bench_with_input(
            BenchmarkId::new("encode", kind.as_str()),
            &batch,
            |b, batch| {
                b.iter(|| encode("signal", black_box(batch), &options).expect("encode"));
            },
        );
    }
}

criterion_group!(benches, bench_encode);
criterion_main!(benches);
