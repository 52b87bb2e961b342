//! Progress tracking for `DiskMatrix` build phases and `PageRank` iterations:
//! atomic counters a driving thread can snapshot without locking out the
//! workers updating them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Tracks Stage-B tile completion across a `DiskMatrix::build` call.
pub struct BuildProgress {
    total_blocks: u64,
    completed: AtomicU64,
    skipped: AtomicU64,
    start: Instant,
}

#[derive(Debug, Clone, Copy)]
pub struct BuildProgressState {
    pub total_blocks: u64,
    pub completed: u64,
    pub skipped: u64,
    pub elapsed: Duration,
}

impl BuildProgress {
    pub fn new(total_blocks: u64) -> Self {
        BuildProgress {
            total_blocks,
            completed: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            start: Instant::now(),
        }
    }

    pub fn record_tile_built(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tile_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BuildProgressState {
        BuildProgressState {
            total_blocks: self.total_blocks,
            completed: self.completed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            elapsed: self.start.elapsed(),
        }
    }
}

/// Tracks power-iteration progress across a `PageRank::run` call.
pub struct IterationProgress {
    total_iterations: u64,
    completed: AtomicU64,
    start: Instant,
}

#[derive(Debug, Clone, Copy)]
pub struct IterationProgressState {
    pub total_iterations: u64,
    pub completed: u64,
    pub elapsed: Duration,
}

impl IterationProgress {
    pub fn new(total_iterations: u64) -> Self {
        IterationProgress {
            total_iterations,
            completed: AtomicU64::new(0),
            start: Instant::now(),
        }
    }

    pub fn record_iteration(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> IterationProgressState {
        IterationProgressState {
            total_iterations: self.total_iterations,
            completed: self.completed.load(Ordering::Relaxed),
            elapsed: self.start.elapsed(),
        }
    }
}
