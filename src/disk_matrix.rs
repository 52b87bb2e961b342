//! Builder for a blocked on-disk sparse adjacency matrix, plus its
//! tile-fetch API.
//!
//! Stage A shards the edge stream into per-block temp runs (sorted, not yet
//! merged); Stage B merges each block's runs into one CSR tile under a
//! shared RAM budget. Both stages log under the `[diskmat]` tag.

use std::collections::BinaryHeap;
use std::cmp::Reverse;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crossbeam_channel::bounded;

use crate::budget::BudgetController;
use crate::common::FileFormat;
use crate::config::GraphConfig;
use crate::csr::SparseBlockCsr;
use crate::edge_source::EdgeSource;
use crate::error::{GraphError, IoResultExt};
use crate::progress::BuildProgress;

const EDGE_CHUNK_SIZE: usize = 1 << 20;

/// Outcome of a `DiskMatrix::build` call: which tiles were written, and
/// which were skipped with `BudgetExceeded` because their `alloc_need`
/// exceeded `ram_limit_bytes` — a per-tile failure; other tiles still
/// proceed.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub tiles_built: Vec<(u64, u64)>,
    pub tiles_skipped: Vec<(u64, u64, GraphError)>,
}

/// A logical `N x N` boolean adjacency matrix materialized as `nslices^2`
/// CSR tile files.
pub struct DiskMatrix {
    pub cfg: Arc<GraphConfig>,
    pub mat_name: String,
}

struct BlockShard {
    buf: Mutex<Vec<(u64, u64)>>,
    file: Mutex<BufWriter<File>>,
}

enum FlushJob {
    Entries { block: u64, entries: Vec<(u64, u64)> },
}

impl DiskMatrix {
    pub fn new(cfg: Arc<GraphConfig>, mat_name: impl Into<String>) -> Self {
        DiskMatrix { cfg, mat_name: mat_name.into() }
    }

    /// Runs Stage A (shard/sort/spill) then Stage B (budgeted k-way merge
    /// per block) over `edge_paths` — gzip-compressed edge-list files in the
    /// "dst src" transposed-adjacency text format.
    pub fn build(
        &self,
        edge_paths: Vec<PathBuf>,
        budget: Arc<BudgetController>,
    ) -> Result<BuildReport, GraphError> {
        eprintln!(
            "[diskmat] stage A: sharding {} edge file(s) into {} blocks",
            edge_paths.len(),
            self.cfg.nblocks()
        );
        self.shard_and_spill(edge_paths)?;
        eprintln!("[diskmat] stage B: merging {} blocks under budget", self.cfg.nblocks());
        self.merge_blocks(budget)
    }

    /// Loads tile `(row, col)` fresh from disk. No cache; ownership
    /// transfers to the caller.
    pub fn get_block(&self, row: u64, col: u64) -> Result<SparseBlockCsr, GraphError> {
        SparseBlockCsr::load(self.cfg.tile_path(&self.mat_name, row, col))
    }

    // ---- Stage A ------------------------------------------------------

    fn shard_and_spill(&self, edge_paths: Vec<PathBuf>) -> Result<(), GraphError> {
        let nblocks = self.cfg.nblocks();
        let entries_per_buffer = (self.cfg.sort_limit_bytes / 16).max(1) as usize;

        let mut shards = Vec::with_capacity(nblocks as usize);
        for b in 0..nblocks {
            let (row, col) = self.row_col(b);
            let path = self.cfg.temp_path(&self.mat_name, row, col);
            let f = File::create(&path).with_path(&path)?;
            shards.push(BlockShard { buf: Mutex::new(Vec::new()), file: Mutex::new(BufWriter::new(f)) });
        }
        let shards = Arc::new(shards);

        let (tx, rx) = bounded::<FlushJob>(self.cfg.nthreads as usize * 4);
        let mut workers = Vec::new();
        for _ in 0..self.cfg.nthreads.max(1) {
            let rx = rx.clone();
            let shards = Arc::clone(&shards);
            workers.push(std::thread::spawn(move || {
                while let Ok(FlushJob::Entries { block, mut entries }) = rx.recv() {
                    let shard = &shards[block as usize];
                    // Sort and write under the same lock: two jobs for the same
                    // block are dequeued in submission order (single producer,
                    // bounded channel), but without this the unlocked sort lets
                    // whichever worker finishes first win the write race and
                    // reorders runs relative to submission order, which
                    // `merge_and_fill` assumes holds.
                    let mut file = shard.file.lock().expect("shard file mutex poisoned");
                    entries.sort_unstable();
                    for (src, dst) in entries {
                        let _ = file.write_all(&src.to_le_bytes());
                        let _ = file.write_all(&dst.to_le_bytes());
                    }
                }
            }));
        }

        let mut source = EdgeSource::new(edge_paths, EDGE_CHUNK_SIZE);
        let mut leftover = String::new();
        let mut buf = Vec::new();
        let mut nedges: u64 = 0;
        let mut nself_loops: u64 = 0;

        loop {
            let has_more = source.read(&mut buf)?;
            let text = String::from_utf8_lossy(&buf);
            leftover.push_str(&text);

            let split_at = if has_more { leftover.rfind('\n') } else { Some(leftover.len()) };
            let Some(split_at) = split_at else {
                if !has_more {
                    break;
                }
                continue;
            };
            let (complete, rest) = leftover.split_at(split_at);
            let rest = rest.trim_start_matches('\n').to_string();

            for line in complete.lines() {
                let mut it = line.split_whitespace();
                let (Some(t0), Some(t1)) = (it.next(), it.next()) else { continue };
                let (Ok(dst), Ok(src)) = (t0.parse::<u64>(), t1.parse::<u64>()) else { continue };
                if src == dst {
                    nself_loops += 1;
                    continue;
                }
                nedges += 1;
                let b = self.cfg.block_id(src, dst);
                let mut buffer = shards[b as usize].buf.lock().expect("shard buf mutex poisoned");
                buffer.push((src, dst));
                if buffer.len() >= entries_per_buffer {
                    let taken = std::mem::take(&mut *buffer);
                    drop(buffer);
                    tx.send(FlushJob::Entries { block: b, entries: taken })
                        .expect("flush worker channel closed early");
                }
            }
            leftover = rest;

            if !has_more {
                break;
            }
        }

        for b in 0..nblocks {
            let mut buffer = shards[b as usize].buf.lock().expect("shard buf mutex poisoned");
            if !buffer.is_empty() {
                let taken = std::mem::take(&mut *buffer);
                drop(buffer);
                tx.send(FlushJob::Entries { block: b, entries: taken })
                    .expect("flush worker channel closed early");
            }
        }
        drop(tx);
        for w in workers {
            let _ = w.join();
        }
        for shard in shards.iter() {
            shard.file.lock().expect("shard file mutex poisoned").flush().with_path("")?;
        }

        eprintln!("[diskmat] stage A complete: {} edges kept, {} self-loops dropped", nedges, nself_loops);
        Ok(())
    }

    // ---- Stage B --------------------------------------------------------

    fn merge_blocks(&self, budget: Arc<BudgetController>) -> Result<BuildReport, GraphError> {
        let nblocks = self.cfg.nblocks();
        let progress = BuildProgress::new(nblocks);
        let results: Mutex<Vec<(u64, u64, Result<(), GraphError>)>> = Mutex::new(Vec::new());

        std::thread::scope(|s| {
            for b in 0..nblocks {
                let (row, col) = self.row_col(b);
                let budget = Arc::clone(&budget);
                let results = &results;
                let progress = &progress;
                s.spawn(move || {
                    let r = self.build_tile(b, row, col, &budget);
                    match &r {
                        Ok(()) => progress.record_tile_built(),
                        Err(_) => progress.record_tile_skipped(),
                    }
                    results.lock().expect("results mutex poisoned").push((row, col, r));
                });
            }
        });

        let snapshot = progress.snapshot();
        eprintln!(
            "[diskmat] stage B complete: {}/{} tiles built, {} skipped, {:.2}s",
            snapshot.completed,
            snapshot.total_blocks,
            snapshot.skipped,
            snapshot.elapsed.as_secs_f64()
        );

        let mut report = BuildReport::default();
        for (row, col, r) in results.into_inner().expect("results mutex poisoned") {
            match r {
                Ok(()) => report.tiles_built.push((row, col)),
                Err(e) => report.tiles_skipped.push((row, col, e)),
            }
        }
        Ok(report)
    }

    fn build_tile(
        &self,
        block_id: u64,
        row: u64,
        col: u64,
        budget: &BudgetController,
    ) -> Result<(), GraphError> {
        let window = self.cfg.window();
        let temp_path = self.cfg.temp_path(&self.mat_name, row, col);

        let raw = match File::open(&temp_path) {
            Ok(mut f) => {
                let mut buf = Vec::new();
                f.read_to_end(&mut buf).with_path(&temp_path)?;
                buf
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(GraphError::Io { source: e, path: temp_path }),
        };

        let nnz = (raw.len() / 16) as u64;
        let alloc_need = (window + 1) * 8 + nnz * 8;
        if alloc_need > self.cfg.ram_limit_bytes {
            eprintln!(
                "[diskmat] block ({},{}) unbuildable: alloc_need={} > ram_limit_bytes={}",
                row, col, alloc_need, self.cfg.ram_limit_bytes
            );
            return Err(GraphError::BudgetExceeded {
                block_id,
                needed: alloc_need,
                limit: self.cfg.ram_limit_bytes,
            });
        }

        budget.acquire(block_id, alloc_need)?;
        let result = self.merge_and_fill(&raw, row, col, window, nnz);
        budget.release(alloc_need);
        result
    }

    fn merge_and_fill(
        &self,
        raw: &[u8],
        row: u64,
        col: u64,
        window: u64,
        nnz: u64,
    ) -> Result<(), GraphError> {
        let section_bytes = (((self.cfg.sort_limit_bytes.max(16)) / 16) * 16) as usize;
        let sections: Vec<Vec<(u64, u64)>> = raw
            .chunks(section_bytes.max(16))
            .map(parse_pairs)
            .filter(|s| !s.is_empty())
            .collect();

        let mut csr = SparseBlockCsr::with_capacity(window, nnz);
        let mut cursors = vec![0usize; sections.len()];
        let mut heap: BinaryHeap<Reverse<(u64, u64, usize)>> = BinaryHeap::new();
        for (si, section) in sections.iter().enumerate() {
            if let Some(&(s, d)) = section.get(0) {
                heap.push(Reverse((s, d, si)));
            }
        }

        while let Some(Reverse((src, dst, si))) = heap.pop() {
            let row_local = src - row * window;
            let col_local = dst - col * window;
            csr.fill(row_local, col_local);

            cursors[si] += 1;
            if let Some(&(s, d)) = sections[si].get(cursors[si]) {
                heap.push(Reverse((s, d, si)));
            }
        }

        csr.finalize();
        let block_id = row + col * self.cfg.nslices;
        if !csr.verify() {
            eprintln!("[diskmat] block ({},{}) failed verify (ia[m] != nnz)", row, col);
            return Err(GraphError::VerifyFailed { block_id });
        }

        let tile_path = self.cfg.tile_path(&self.mat_name, row, col);
        csr.save(&tile_path, FileFormat::SnappyChunked)
    }

    fn row_col(&self, b: u64) -> (u64, u64) {
        let nslices = self.cfg.nslices;
        (b % nslices, b / nslices)
    }
}

fn parse_pairs(bytes: &[u8]) -> Vec<(u64, u64)> {
    let mut out = Vec::with_capacity(bytes.len() / 16);
    let mut chunks = bytes.chunks_exact(16);
    for chunk in &mut chunks {
        let src = u64::from_le_bytes(chunk[0..8].try_into().unwrap());
        let dst = u64::from_le_bytes(chunk[8..16].try_into().unwrap());
        out.push((src, dst));
    }
    out
}
