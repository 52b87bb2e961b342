//! Process-wide immutable configuration.

use std::path::PathBuf;

use crate::error::GraphError;

/// Immutable, shared-by-reference configuration for a single graph run.
///
/// `nvertices` is `nvertices_declared` padded up to the nearest multiple of
/// `nslices`. `window` and `nblocks` are derived.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub name: String,
    pub nvertices_declared: u64,
    pub nvertices: u64,
    pub nslices: u64,
    pub nthreads: u64,
    pub ram_limit_bytes: u64,
    pub sort_limit_bytes: u64,
    /// Working directory all tile/slice/temp files are written under.
    pub dir: PathBuf,
}

impl GraphConfig {
    /// Builds a config, padding `nvertices_declared` up to a multiple of
    /// `nslices` and eagerly checking the two `ConfigError` preconditions:
    /// the Stage A double-buffer bound, and that a single `f64` DenseVector
    /// slice fits in `ram_limit_bytes`.
    pub fn new(
        name: impl Into<String>,
        nvertices_declared: u64,
        nslices: u64,
        nthreads: u64,
        ram_limit_bytes: u64,
        sort_limit_bytes: u64,
    ) -> Result<Self, GraphError> {
        Self::with_dir(
            name,
            nvertices_declared,
            nslices,
            nthreads,
            ram_limit_bytes,
            sort_limit_bytes,
            PathBuf::from("."),
        )
    }

    pub fn with_dir(
        name: impl Into<String>,
        nvertices_declared: u64,
        nslices: u64,
        nthreads: u64,
        ram_limit_bytes: u64,
        sort_limit_bytes: u64,
        dir: PathBuf,
    ) -> Result<Self, GraphError> {
        if nslices == 0 {
            return Err(GraphError::Config("nslices must be > 0".into()));
        }
        if nthreads == 0 {
            return Err(GraphError::Config("nthreads must be > 0".into()));
        }

        let nvertices = if nvertices_declared % nslices == 0 {
            nvertices_declared
        } else {
            (nvertices_declared / nslices + 1) * nslices
        };

        let nblocks = nslices * nslices;
        if 2 * sort_limit_bytes * nblocks > ram_limit_bytes {
            return Err(GraphError::Config(format!(
                "2*sort_limit_bytes*nblocks ({}) exceeds ram_limit_bytes ({})",
                2 * sort_limit_bytes * nblocks,
                ram_limit_bytes
            )));
        }

        let window = nvertices / nslices;
        let vector_bytes = window * std::mem::size_of::<f64>() as u64;
        if vector_bytes > ram_limit_bytes {
            return Err(GraphError::Config(format!(
                "window*sizeof(f64) ({}) exceeds ram_limit_bytes ({})",
                vector_bytes, ram_limit_bytes
            )));
        }

        Ok(GraphConfig {
            name: name.into(),
            nvertices_declared,
            nvertices,
            nslices,
            nthreads,
            ram_limit_bytes,
            sort_limit_bytes,
            dir,
        })
    }

    pub fn nblocks(&self) -> u64 {
        self.nslices * self.nslices
    }

    pub fn window(&self) -> u64 {
        self.nvertices / self.nslices
    }

    /// Which block an edge `(src, dst)` belongs to: column-major over slice
    /// indices.
    pub fn block_id(&self, src: u64, dst: u64) -> u64 {
        let window = self.window();
        src / window + (dst / window) * self.nslices
    }

    pub fn tile_path(&self, mat_name: &str, row: u64, col: u64) -> PathBuf {
        self.dir.join(format!("{}_{}_dmatblk_{}_{}.gpe", self.name, mat_name, row, col))
    }

    pub fn temp_path(&self, mat_name: &str, row: u64, col: u64) -> PathBuf {
        self.dir.join(format!("{}_{}_tmpblk_{}_{}.gpe", self.name, mat_name, row, col))
    }

    pub fn slice_path(&self, vec_name: &str, k: u64) -> PathBuf {
        self.dir.join(format!("{}_{}_dvecslc_{}.gpe", self.name, vec_name, k))
    }

    pub fn swap_scratch_path(&self) -> PathBuf {
        self.dir.join(format!("{}_swap_file.gpe", self.name))
    }
}

/// Recognizes `B`/`KiB`/`MiB`/`GiB` multipliers (binary units), matching the
/// original `properties` class's `B`/`KB`/`MB`/`GB` constants.
pub fn parse_size(s: &str) -> Result<u64, GraphError> {
    let s = s.trim();
    let (num_part, mult): (&str, u64) = if let Some(p) = s.strip_suffix("GiB") {
        (p, 1u64 << 30)
    } else if let Some(p) = s.strip_suffix("MiB") {
        (p, 1u64 << 20)
    } else if let Some(p) = s.strip_suffix("KiB") {
        (p, 1u64 << 10)
    } else if let Some(p) = s.strip_suffix('B') {
        (p, 1u64)
    } else {
        return Err(GraphError::Config(format!("unrecognized size unit in '{}'", s)));
    };

    let n: u64 = num_part
        .trim()
        .parse()
        .map_err(|_| GraphError::Config(format!("invalid size literal '{}'", s)))?;
    Ok(n * mult)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_size_units() {
        assert_eq!(parse_size("512B").unwrap(), 512);
        assert_eq!(parse_size("4KiB").unwrap(), 4096);
        assert_eq!(parse_size("1MiB").unwrap(), 1 << 20);
        assert_eq!(parse_size("2GiB").unwrap(), 2 << 30);
        assert_eq!(parse_size("  3 MiB").unwrap(), 3 << 20);
    }

    #[test]
    fn parse_size_rejects_unknown_unit() {
        assert!(parse_size("10TB").is_err());
    }

    #[test]
    fn nvertices_padded_up_to_slice_multiple() {
        let cfg = GraphConfig::new("g", 10, 3, 1, 1 << 30, 1 << 10).unwrap();
        assert_eq!(cfg.nvertices, 12);
        assert_eq!(cfg.window(), 4);
        assert_eq!(cfg.nblocks(), 9);
    }

    #[test]
    fn nvertices_exact_multiple_unchanged() {
        let cfg = GraphConfig::new("g", 6, 2, 1, 5u64 << 30, 128 << 20).unwrap();
        assert_eq!(cfg.nvertices, 6);
        assert_eq!(cfg.window(), 3);
    }

    #[test]
    fn rejects_stage_a_buffer_overcommit() {
        let err = GraphConfig::new("g", 1000, 20, 4, 1024, 1024).unwrap_err();
        match err {
            GraphError::Config(_) => {}
            other => panic!("expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn block_id_matches_column_major_formula() {
        let cfg = GraphConfig::new("g", 6, 2, 1, 5u64 << 30, 128 << 20).unwrap();
        // window = 3, nslices = 2
        assert_eq!(cfg.block_id(0, 0), 0);
        assert_eq!(cfg.block_id(4, 0), 1);
        assert_eq!(cfg.block_id(0, 4), 2);
        assert_eq!(cfg.block_id(4, 4), 3);
    }
}
