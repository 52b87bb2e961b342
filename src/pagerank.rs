//! Power-iteration PageRank built on `DiskMatrix` + `DiskVector`.

use std::path::PathBuf;
use std::sync::Arc;

use rayon::prelude::*;

use crate::budget::BudgetController;
use crate::config::GraphConfig;
use crate::dense_vector::DenseVector;
use crate::disk_matrix::DiskMatrix;
use crate::disk_vector::DiskVector;
use crate::error::GraphError;
use crate::progress::IterationProgress;

/// Default damping factor `d`.
pub const DEFAULT_DAMPING: f64 = 0.85;

/// Per-iteration convergence diagnostics.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageRankStats {
    pub sum_score: f64,
    pub variation: f64,
    pub sink_score: f64,
}

/// Drives the power iteration over a `DiskMatrix` representing the
/// transposed adjacency (in-link) matrix.
pub struct PageRank {
    pub cfg: Arc<GraphConfig>,
    pub damping: f64,
    pub pr: DiskVector<f64>,
    pr_next: DiskVector<f64>,
    pub out_deg: DiskVector<f64>,
    mat: DiskMatrix,
}

impl PageRank {
    /// Builds a fresh `DiskMatrix` from `edge_paths` (ingest + algebra in one
    /// call), then attaches state vectors to it — the original's
    /// from-edge-list `gpe_pagerank` constructor.
    pub fn from_edge_list(
        cfg: Arc<GraphConfig>,
        mat_name: impl Into<String>,
        edge_paths: Vec<PathBuf>,
        budget: Arc<BudgetController>,
        damping: f64,
    ) -> Result<Self, GraphError> {
        let mat_name = mat_name.into();
        let mat = DiskMatrix::new(Arc::clone(&cfg), mat_name.clone());
        mat.build(edge_paths, budget)?;
        Self::attach(cfg, mat_name, damping)
    }

    /// Attaches to a `DiskMatrix` already built by a prior run, skipping
    /// ingest entirely — the original's attach-by-name constructor, useful
    /// for rerunning PageRank with a different damping factor without
    /// rebuilding tiles.
    pub fn attach(cfg: Arc<GraphConfig>, mat_name: impl Into<String>, damping: f64) -> Result<Self, GraphError> {
        let mat = DiskMatrix::new(Arc::clone(&cfg), mat_name);
        let n = cfg.nvertices as f64;
        let pr = DiskVector::new(Arc::clone(&cfg), "pr", 1.0 / n)?;
        let pr_next = DiskVector::new(Arc::clone(&cfg), "pr_next", 0.0)?;
        let out_deg = DiskVector::new(Arc::clone(&cfg), "out_deg", 0.0)?;
        // out_deg[v] = #outgoing edges of v, via A.column_sum — equivalent
        // to the original's alpha_mat_vec_prod(1., adj_mat, pagerank) pass
        // seeded with pagerank=1, without the extra transient vector.
        out_deg.column_sum(&mat)?;
        Ok(PageRank { cfg, damping, pr, pr_next, out_deg, mat })
    }

    /// Runs `iterations` power-iteration steps and returns the final
    /// iteration's convergence stats.
    pub fn run(&mut self, iterations: u64) -> Result<PageRankStats, GraphError> {
        let n = self.cfg.nvertices as f64;
        let n_sinks = self.out_deg.count_zeros()? as f64;
        let mut sink_score = n_sinks * (1.0 / n);
        let progress = IterationProgress::new(iterations);
        let mut stats = PageRankStats { sum_score: 1.0, variation: f64::INFINITY, sink_score };

        for t in 0..iterations {
            let base = (1.0 - sink_score) * (1.0 - self.damping) / n + sink_score / n;
            self.reset_pr_next_to_constant(base)?;
            self.pr_next.spmv_over(self.damping, &self.mat, &self.pr, &self.out_deg)?;

            stats = self.stats()?;
            sink_score = stats.sink_score;
            self.pr.swap(&mut self.pr_next)?;
            progress.record_iteration();

            if std::env::var("GRAPHEE_DEBUG_BUDGET").is_ok() {
                eprintln!(
                    "[pagerank] iter {}/{}: sum={:.6} var={:.6} sink={:.6}",
                    t + 1,
                    iterations,
                    stats.sum_score,
                    stats.variation,
                    stats.sink_score
                );
            }
        }
        Ok(stats)
    }

    fn reset_pr_next_to_constant(&self, base: f64) -> Result<(), GraphError> {
        let window = self.cfg.window();
        (0..self.cfg.nslices).into_par_iter().try_for_each(|k| -> Result<(), GraphError> {
            let v = DenseVector::new(window, base);
            self.pr_next.save_slice(k, &v)
        })
    }

    /// One slice-parallel pass computing `sum_score`, `variation` and
    /// `sink_score`.
    fn stats(&self) -> Result<PageRankStats, GraphError> {
        let partials: Result<Vec<(f64, f64, f64)>, GraphError> = (0..self.cfg.nslices)
            .into_par_iter()
            .map(|k| -> Result<(f64, f64, f64), GraphError> {
                let pr_next = self.pr_next.get_slice(k)?;
                let pr = self.pr.get_slice(k)?;
                let out_deg = self.out_deg.get_slice(k)?;
                let mut sum = 0.0;
                let mut variation = 0.0;
                let mut sink = 0.0;
                for i in 0..pr_next.len() {
                    let pn = pr_next.data[i];
                    sum += pn;
                    let diff = pr.data[i] - pn;
                    variation += diff * diff;
                    if out_deg.data[i] == 0.0 {
                        sink += pn;
                    }
                }
                Ok((sum, variation, sink))
            })
            .collect();

        let mut sum_score = 0.0;
        let mut variation = 0.0;
        let mut sink_score = 0.0;
        for (s, v, sk) in partials? {
            sum_score += s;
            variation += v;
            sink_score += sk;
        }
        Ok(PageRankStats { sum_score, variation, sink_score })
    }
}
