//! CSR-format sparse tile: boolean structural (`SparseBlockCsr`) or weighted
//! (`SparseBlockCsrW`), with sorted fill, serialize/deserialize, SpMV and
//! column-sum.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use rayon::prelude::*;

use crate::common::{self, FileFormat, Scalar, TYPE_NAME_CSR_BOOL, TYPE_NAME_CSR_WEIGHTED};
use crate::dense_vector::DenseVector;
use crate::error::{GraphError, IoResultExt};

fn extend_row_pointer(ia: &mut [u64], last_row: &mut i64, nnz: u64, upto: u64) {
    while (*last_row + 1) <= upto as i64 {
        *last_row += 1;
        ia[*last_row as usize] = nnz;
    }
}

/// Boolean structural CSR tile of dimension `window x window`.
#[derive(Debug, Clone)]
pub struct SparseBlockCsr {
    pub m: u64,
    pub n: u64,
    pub nnz: u64,
    pub ia: Vec<u64>,
    pub ja: Vec<u64>,
    last_row: i64,
}

impl SparseBlockCsr {
    pub fn new(window: u64) -> Self {
        SparseBlockCsr {
            m: window,
            n: window,
            nnz: 0,
            ia: vec![0u64; (window + 1) as usize],
            ja: Vec::new(),
            last_row: -1,
        }
    }

    pub fn with_capacity(window: u64, nnz_estimate: u64) -> Self {
        let mut s = Self::new(window);
        s.ja.reserve(nnz_estimate as usize);
        s
    }

    /// Records column `j` in row `i`. Precondition: `i` is nondecreasing
    /// across calls (sorted ingest).
    pub fn fill(&mut self, i: u64, j: u64) {
        debug_assert!(i as i64 >= self.last_row, "fill() requires nondecreasing row order");
        extend_row_pointer(&mut self.ia, &mut self.last_row, self.nnz, i);
        self.ja.push(j);
        self.nnz += 1;
        self.ia[(i + 1) as usize] = self.nnz;
    }

    /// Extends row pointers through row `m`, establishing `ia[m] == nnz`.
    pub fn finalize(&mut self) {
        extend_row_pointer(&mut self.ia, &mut self.last_row, self.nnz, self.m);
    }

    pub fn verify(&self) -> bool {
        self.ia[self.m as usize] == self.nnz
    }

    /// For each `k` in `ja`, increments `out[ja[k]]` by one. Parallel over an
    /// independent sharding of `ja`.
    pub fn col_sum(&self, out: &mut DenseVector<f64>) {
        let shards = self.ja.par_chunks(shard_len(self.ja.len(), rayon::current_num_threads()));
        let partials: Vec<Vec<f64>> = shards
            .map(|shard| {
                let mut local = vec![0f64; self.n as usize];
                for &j in shard {
                    local[j as usize] += 1.0;
                }
                local
            })
            .collect();
        for local in partials {
            for (i, v) in local.into_iter().enumerate() {
                out.data[i] += v;
            }
        }
    }

    /// `y[i] += sum_{k in row i} x[ja[k]]`. Row-parallel.
    pub fn spmv(&self, x: &DenseVector<f64>, y: &mut DenseVector<f64>) {
        y.data
            .par_iter_mut()
            .enumerate()
            .take(self.m as usize)
            .for_each(|(i, yi)| {
                let start = self.ia[i] as usize;
                let end = self.ia[i + 1] as usize;
                let mut acc = 0f64;
                for &j in &self.ja[start..end] {
                    acc += x.data[j as usize];
                }
                *yi += acc;
            });
    }

    pub fn save(&self, path: impl AsRef<Path>, format: FileFormat) -> Result<(), GraphError> {
        let path = path.as_ref();
        let f = File::create(path).with_path(path)?;
        let mut w = BufWriter::new(f);
        common::write_type_header(&mut w, TYPE_NAME_CSR_BOOL)?;
        w.write_all(&(format as i32).to_le_bytes()).with_path(path)?;
        w.write_all(&self.m.to_le_bytes()).with_path(path)?;
        w.write_all(&self.nnz.to_le_bytes()).with_path(path)?;
        common::write_payload(&mut w, &self.ia, format)?;
        common::write_payload(&mut w, &self.ja, format)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, GraphError> {
        let path = path.as_ref();
        let f = File::open(path).with_path(path)?;
        let mut r = BufReader::new(f);
        common::expect_type_header(&mut r, &[TYPE_NAME_CSR_BOOL])?;
        let format = read_format(&mut r, path)?;
        let m = read_u64(&mut r, path)?;
        let nnz = read_u64(&mut r, path)?;
        let ia = common::read_payload::<u64>(&mut r, (m + 1) as usize, format)?;
        let ja = common::read_payload::<u64>(&mut r, nnz as usize, format)?;
        Ok(SparseBlockCsr { m, n: m, nnz, ia, ja, last_row: m as i64 })
    }
}

/// Weighted CSR tile: `SparseBlockCsr` plus a parallel values array `a`.
#[derive(Debug, Clone)]
pub struct SparseBlockCsrW<T: Scalar> {
    pub m: u64,
    pub n: u64,
    pub nnz: u64,
    pub ia: Vec<u64>,
    pub ja: Vec<u64>,
    pub a: Vec<T>,
    last_row: i64,
}

impl<T: Scalar> SparseBlockCsrW<T> {
    pub fn new(window: u64) -> Self {
        SparseBlockCsrW {
            m: window,
            n: window,
            nnz: 0,
            ia: vec![0u64; (window + 1) as usize],
            ja: Vec::new(),
            a: Vec::new(),
            last_row: -1,
        }
    }

    pub fn fill(&mut self, i: u64, j: u64, value: T) {
        debug_assert!(i as i64 >= self.last_row, "fill() requires nondecreasing row order");
        extend_row_pointer(&mut self.ia, &mut self.last_row, self.nnz, i);
        self.ja.push(j);
        self.a.push(value);
        self.nnz += 1;
        self.ia[(i + 1) as usize] = self.nnz;
    }

    pub fn finalize(&mut self) {
        extend_row_pointer(&mut self.ia, &mut self.last_row, self.nnz, self.m);
    }

    pub fn verify(&self) -> bool {
        self.ia[self.m as usize] == self.nnz
    }

    /// For each `k`, sums `a[k]` into `out[ja[k]]`.
    pub fn col_sum(&self, out: &mut DenseVector<T>) {
        for (k, &j) in self.ja.iter().enumerate() {
            out.data[j as usize] = out.data[j as usize].add(self.a[k]);
        }
    }

    /// `y[i] += sum_{k in row i} a[k] * x[ja[k]]`. Row-parallel.
    pub fn spmv(&self, x: &DenseVector<T>, y: &mut DenseVector<T>) {
        y.data
            .par_iter_mut()
            .enumerate()
            .take(self.m as usize)
            .for_each(|(i, yi)| {
                let start = self.ia[i] as usize;
                let end = self.ia[i + 1] as usize;
                let mut acc = T::from_f64(0.0);
                for k in start..end {
                    acc = acc.add(self.a[k].mul(x.data[self.ja[k] as usize]));
                }
                *yi = yi.add(acc);
            });
    }

    pub fn save(&self, path: impl AsRef<Path>, format: FileFormat) -> Result<(), GraphError> {
        let path = path.as_ref();
        let f = File::create(path).with_path(path)?;
        let mut w = BufWriter::new(f);
        common::write_type_header(&mut w, TYPE_NAME_CSR_WEIGHTED)?;
        w.write_all(&(format as i32).to_le_bytes()).with_path(path)?;
        w.write_all(&self.m.to_le_bytes()).with_path(path)?;
        w.write_all(&self.nnz.to_le_bytes()).with_path(path)?;
        common::write_payload(&mut w, &self.a, format)?;
        common::write_payload(&mut w, &self.ia, format)?;
        common::write_payload(&mut w, &self.ja, format)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, GraphError> {
        let path = path.as_ref();
        let f = File::open(path).with_path(path)?;
        let mut r = BufReader::new(f);
        common::expect_type_header(&mut r, &[TYPE_NAME_CSR_WEIGHTED])?;
        let format = read_format(&mut r, path)?;
        let m = read_u64(&mut r, path)?;
        let nnz = read_u64(&mut r, path)?;
        let a = common::read_payload::<T>(&mut r, nnz as usize, format)?;
        let ia = common::read_payload::<u64>(&mut r, (m + 1) as usize, format)?;
        let ja = common::read_payload::<u64>(&mut r, nnz as usize, format)?;
        Ok(SparseBlockCsrW { m, n: m, nnz, ia, ja, a, last_row: m as i64 })
    }
}

fn read_format(r: &mut impl Read, path: &Path) -> Result<FileFormat, GraphError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).with_path(path)?;
    FileFormat::from_i32(i32::from_le_bytes(buf))
}

fn read_u64(r: &mut impl Read, path: &Path) -> Result<u64, GraphError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf).with_path(path)?;
    Ok(u64::from_le_bytes(buf))
}

fn shard_len(total: usize, nthreads: usize) -> usize {
    let nthreads = nthreads.max(1);
    (total + nthreads - 1) / nthreads.max(1).max(1)
}
