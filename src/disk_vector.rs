//! Slice-oriented vector persisted as `nslices` files, with streaming
//! algebra against a `DiskMatrix`.

use std::sync::Arc;

use rayon::prelude::*;

use crate::common::{FileFormat, Scalar};
use crate::config::GraphConfig;
use crate::dense_vector::DenseVector;
use crate::disk_matrix::DiskMatrix;
use crate::error::GraphError;
use crate::fsx;

/// Logical vector of length `nvertices`, materialized as `nslices` slice
/// files named `<name>_<vec>_dvecslc_<k>.gpe`.
pub struct DiskVector<T: Scalar> {
    pub cfg: Arc<GraphConfig>,
    pub name: String,
    _marker: std::marker::PhantomData<T>,
}

impl<T: Scalar> DiskVector<T> {
    /// Writes `nslices` slice files, each of length `window`, filled with
    /// `init`.
    pub fn new(cfg: Arc<GraphConfig>, name: impl Into<String>, init: T) -> Result<Self, GraphError> {
        let name = name.into();
        let window = cfg.window();
        for k in 0..cfg.nslices {
            let v = DenseVector::new(window, init);
            v.save(cfg.slice_path(&name, k), FileFormat::Bin)?;
        }
        Ok(DiskVector { cfg, name, _marker: std::marker::PhantomData })
    }

    /// Attaches to slice files already written by a previous run, without
    /// rewriting them.
    pub fn attach(cfg: Arc<GraphConfig>, name: impl Into<String>) -> Self {
        DiskVector { cfg, name: name.into(), _marker: std::marker::PhantomData }
    }

    pub fn get_slice(&self, k: u64) -> Result<DenseVector<T>, GraphError> {
        DenseVector::load(self.cfg.slice_path(&self.name, k))
    }

    pub fn save_slice(&self, k: u64, v: &DenseVector<T>) -> Result<(), GraphError> {
        v.save(self.cfg.slice_path(&self.name, k), FileFormat::Bin)
    }

    /// Exchanges `self` and `other`'s slice files pairwise via a three-way
    /// rename, without reading their contents. Precondition: both vectors
    /// share `nvertices`.
    pub fn swap(&mut self, other: &mut DiskVector<T>) -> Result<(), GraphError> {
        if self.cfg.nvertices != other.cfg.nvertices {
            return Err(GraphError::DimensionMismatch {
                expected: self.cfg.nvertices,
                found: other.cfg.nvertices,
            });
        }
        for k in 0..self.cfg.nslices {
            let a = self.cfg.slice_path(&self.name, k);
            let b = other.cfg.slice_path(&other.name, k);
            let scratch = self.cfg.dir.join(format!(
                "{}_swap_file_{}_{}.gpe",
                self.cfg.name, k, std::process::id()
            ));
            fsx::atomic_swap(&a, &b, &scratch).map_err(|source| GraphError::Io {
                source,
                path: scratch,
            })?;
        }
        Ok(())
    }

    /// `v += scalar` for every slice: load, add, save.
    pub fn add_scalar(&self, s: T) -> Result<(), GraphError> {
        (0..self.cfg.nslices).into_par_iter().try_for_each(|k| {
            let mut v = self.get_slice(k)?;
            v.add_scalar(s);
            self.save_slice(k, &v)
        })
    }

    /// Slice-parallel reduction: counts zero entries across every slice.
    pub fn count_zeros(&self) -> Result<u64, GraphError> {
        (0..self.cfg.nslices)
            .into_par_iter()
            .map(|k| self.get_slice(k).map(|v| v.count_zeros()))
            .try_reduce(|| 0, |a, b| Ok(a + b))
    }

    /// Hadamard-divides every slice by `d`'s matching slice, accumulating
    /// the undefined (`d[i]==0`) mass into `acc`.
    pub fn divide_and_sum_undef(&self, d: &DiskVector<T>, acc: &mut T) -> Result<(), GraphError> {
        let partials: Result<Vec<T>, GraphError> = (0..self.cfg.nslices)
            .into_par_iter()
            .map(|k| -> Result<T, GraphError> {
                let mut v = self.get_slice(k)?;
                let dv = d.get_slice(k)?;
                let mut local_acc = T::from_f64(0.0);
                v.divide_and_sum_undef(&dv, &mut local_acc)?;
                self.save_slice(k, &v)?;
                Ok(local_acc)
            })
            .collect();
        for p in partials? {
            *acc = acc.add(p);
        }
        Ok(())
    }
}

impl DiskVector<f64> {
    /// `out_deg.column_sum(A)`: for each column slice, accumulates each
    /// row-block tile's `col_sum` into it.
    pub fn column_sum(&self, mat: &DiskMatrix) -> Result<(), GraphError> {
        (0..self.cfg.nslices).into_par_iter().try_for_each(|col| -> Result<(), GraphError> {
            let mut acc = self.get_slice(col)?;
            for row in 0..self.cfg.nslices {
                let tile = mat.get_block(row, col)?;
                tile.col_sum(&mut acc);
            }
            self.save_slice(col, &acc)
        })
    }

    /// `self ← Sum_row-block (alpha * mat * x)`, row-wise.
    pub fn spmv_accumulate(&self, alpha: f64, mat: &DiskMatrix, x: &DiskVector<f64>) -> Result<(), GraphError> {
        (0..self.cfg.nslices).into_par_iter().try_for_each(|row| -> Result<(), GraphError> {
            let mut acc = self.get_slice(row)?;
            for col in 0..self.cfg.nslices {
                let tile = mat.get_block(row, col)?;
                let mut x_col = x.get_slice(col)?;
                x_col.mul_scalar(alpha);
                tile.spmv(&x_col, &mut acc);
            }
            self.save_slice(row, &acc)
        })
    }

    /// Like [`spmv_accumulate`](Self::spmv_accumulate), but every `x` column
    /// slice is first divided elementwise by `d`'s matching slice
    /// (`d[i]==0 -> 0`) before being scaled by `alpha` — the "rank /
    /// out-degree" primitive PageRank's `spmv_over` step uses.
    pub fn spmv_over(
        &self,
        alpha: f64,
        mat: &DiskMatrix,
        x: &DiskVector<f64>,
        d: &DiskVector<f64>,
    ) -> Result<(), GraphError> {
        (0..self.cfg.nslices).into_par_iter().try_for_each(|row| -> Result<(), GraphError> {
            let mut acc = self.get_slice(row)?;
            for col in 0..self.cfg.nslices {
                let tile = mat.get_block(row, col)?;
                let mut x_col = x.get_slice(col)?;
                let d_col = d.get_slice(col)?;
                x_col.div_vec(&d_col)?;
                x_col.mul_scalar(alpha);
                tile.spmv(&x_col, &mut acc);
            }
            self.save_slice(row, &acc)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphConfig;

    fn cfg(dir: &std::path::Path) -> Arc<GraphConfig> {
        Arc::new(GraphConfig::with_dir("g", 6, 2, 1, 1 << 30, 1 << 20, dir.to_path_buf()).unwrap())
    }

    #[test]
    fn swap_exchanges_all_slices() {
        let dir = tempfile::tempdir().unwrap();
        let c = cfg(dir.path());
        let mut a = DiskVector::<f64>::new(Arc::clone(&c), "A", 3.0).unwrap();
        let mut b = DiskVector::<f64>::new(Arc::clone(&c), "B", 7.0).unwrap();

        a.swap(&mut b).unwrap();
        for k in 0..c.nslices {
            assert!(a.get_slice(k).unwrap().data.iter().all(|&v| v == 7.0));
            assert!(b.get_slice(k).unwrap().data.iter().all(|&v| v == 3.0));
        }

        a.swap(&mut b).unwrap();
        for k in 0..c.nslices {
            assert!(a.get_slice(k).unwrap().data.iter().all(|&v| v == 3.0));
            assert!(b.get_slice(k).unwrap().data.iter().all(|&v| v == 7.0));
        }
    }

    #[test]
    fn add_scalar_updates_every_slice() {
        let dir = tempfile::tempdir().unwrap();
        let c = cfg(dir.path());
        let v = DiskVector::<f64>::new(Arc::clone(&c), "V", 1.0).unwrap();
        v.add_scalar(2.0).unwrap();
        for k in 0..c.nslices {
            assert!(v.get_slice(k).unwrap().data.iter().all(|&x| x == 3.0));
        }
    }

    #[test]
    fn count_zeros_sums_across_slices() {
        let dir = tempfile::tempdir().unwrap();
        let c = cfg(dir.path());
        let v = DiskVector::<f64>::new(Arc::clone(&c), "V", 0.0).unwrap();
        assert_eq!(v.count_zeros().unwrap(), c.nvertices);
    }

    #[test]
    fn swap_rejects_mismatched_vertex_counts() {
        let dir = tempfile::tempdir().unwrap();
        let c6 = cfg(dir.path());
        let c9 = Arc::new(GraphConfig::with_dir("g", 9, 3, 1, 1 << 30, 1 << 20, dir.path().to_path_buf()).unwrap());
        let mut a = DiskVector::<f64>::new(c6, "A", 1.0).unwrap();
        let mut b = DiskVector::<f64>::new(c9, "B", 1.0).unwrap();
        match a.swap(&mut b) {
            Err(GraphError::DimensionMismatch { .. }) => {}
            other => panic!("expected DimensionMismatch, got {:?}", other),
        }
    }
}
