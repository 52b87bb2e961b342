//! Criterion benchmark for `DiskVector<f64>::spmv_over`, the per-iteration
//! hot path of PageRank.
//!
//! Run with:
//!   cargo bench --bench spmv_throughput

use std::fs::File;
use std::io::Write as _;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use flate2::write::GzEncoder;
use flate2::Compression;

use graphee_rs::budget::BudgetController;
use graphee_rs::config::GraphConfig;
use graphee_rs::disk_matrix::DiskMatrix;
use graphee_rs::disk_vector::DiskVector;

fn write_gz_edges(path: &std::path::Path, nvertices: u64, fanout: u64) -> u64 {
    let f = File::create(path).unwrap();
    let mut enc = GzEncoder::new(f, Compression::fast());
    let mut n = 0u64;
    for src in 0..nvertices {
        for k in 1..=fanout {
            let dst = (src + k) % nvertices;
            if dst != src {
                writeln!(enc, "{} {}", dst, src).unwrap();
                n += 1;
            }
        }
    }
    enc.finish().unwrap();
    n
}

fn bench_spmv(c: &mut Criterion) {
    let mut group = c.benchmark_group("diskvector_spmv_over");

    for &nvertices in &[2_000u64, 10_000] {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Arc::new(
            GraphConfig::with_dir("bench", nvertices, 4, num_cpus::get() as u64, 2u64 << 30, 32 << 20, dir.path().to_path_buf())
                .unwrap(),
        );
        let edge_file = dir.path().join("edges.gz");
        let nedges = write_gz_edges(&edge_file, cfg.nvertices, 8);

        let mat = DiskMatrix::new(Arc::clone(&cfg), "A");
        let budget = BudgetController::new(cfg.ram_limit_bytes);
        mat.build(vec![edge_file], budget).unwrap();

        let out_deg = DiskVector::<f64>::new(Arc::clone(&cfg), "out_deg", 0.0).unwrap();
        out_deg.column_sum(&mat).unwrap();
        let pr = DiskVector::<f64>::new(Arc::clone(&cfg), "pr", 1.0 / cfg.nvertices as f64).unwrap();

        group.throughput(Throughput::Elements(nedges));
        group.bench_with_input(BenchmarkId::new("spmv_over", nvertices), &nvertices, |b, _| {
            b.iter(|| {
                let acc = DiskVector::<f64>::new(Arc::clone(&cfg), "pr_next", 0.0).unwrap();
                acc.spmv_over(0.85, &mat, &pr, &out_deg).unwrap();
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_spmv);
criterion_main!(benches);
