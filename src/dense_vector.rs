//! In-memory numeric vector with serialize/deserialize and elementwise ops.
//! Bulk ops are parallelized across `nthreads` with no interleaved
//! dependencies within one op.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use rayon::prelude::*;

use crate::common::{self, FileFormat, Scalar, TYPE_NAME_VECTOR};
use crate::error::{GraphError, IoResultExt};

#[derive(Debug, Clone)]
pub struct DenseVector<T: Scalar> {
    pub data: Vec<T>,
}

impl<T: Scalar> DenseVector<T> {
    pub fn new(m: u64, init: T) -> Self {
        DenseVector { data: vec![init; m as usize] }
    }

    pub fn from_vec(data: Vec<T>) -> Self {
        DenseVector { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// `v += s`, parallel over `data`.
    pub fn add_scalar(&mut self, s: T) {
        self.data.par_iter_mut().for_each(|v| *v = v.add(s));
    }

    /// `v += u`, elementwise, same length. Precondition: `self.len() == u.len()`.
    pub fn add_vec(&mut self, u: &DenseVector<T>) -> Result<(), GraphError> {
        self.check_same_len(u)?;
        self.data
            .par_iter_mut()
            .zip(u.data.par_iter())
            .for_each(|(v, &uv)| *v = v.add(uv));
        Ok(())
    }

    /// `v *= s`, parallel over `data`.
    pub fn mul_scalar(&mut self, s: T) {
        self.data.par_iter_mut().for_each(|v| *v = v.mul(s));
    }

    /// `v /= u`, elementwise; where `u[i] == 0`, `v[i]` becomes `0` rather
    /// than propagating NaN/inf.
    pub fn div_vec(&mut self, u: &DenseVector<T>) -> Result<(), GraphError> {
        self.check_same_len(u)?;
        self.data.par_iter_mut().zip(u.data.par_iter()).for_each(|(v, &uv)| {
            *v = if uv.is_zero() { T::from_f64(0.0) } else { v.div(uv) };
        });
        Ok(())
    }

    /// Hadamard divide by `u`; for every `i` where `u[i] == 0`, adds `v[i]`
    /// to `acc` and sets `v[i] = 0`, otherwise divides normally.
    pub fn divide_and_sum_undef(&mut self, u: &DenseVector<T>, acc: &mut T) -> Result<(), GraphError> {
        self.check_same_len(u)?;
        let undef_sum: f64 = self
            .data
            .par_iter_mut()
            .zip(u.data.par_iter())
            .map(|(v, &uv)| {
                if uv.is_zero() {
                    let contributed = v.to_f64();
                    *v = T::from_f64(0.0);
                    contributed
                } else {
                    *v = v.div(uv);
                    0.0
                }
            })
            .sum();
        *acc = acc.add(T::from_f64(undef_sum));
        Ok(())
    }

    pub fn count_zeros(&self) -> u64 {
        self.data.par_iter().filter(|v| v.is_zero()).count() as u64
    }

    fn check_same_len(&self, other: &DenseVector<T>) -> Result<(), GraphError> {
        if self.len() != other.len() {
            return Err(GraphError::DimensionMismatch {
                expected: self.len() as u64,
                found: other.len() as u64,
            });
        }
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>, format: FileFormat) -> Result<(), GraphError> {
        let path = path.as_ref();
        let f = File::create(path).with_path(path)?;
        let mut w = BufWriter::new(f);
        common::write_type_header(&mut w, TYPE_NAME_VECTOR)?;
        w.write_all(&(format as i32).to_le_bytes()).with_path(path)?;
        w.write_all(&(self.data.len() as u64).to_le_bytes()).with_path(path)?;
        common::write_payload(&mut w, &self.data, format)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, GraphError> {
        let path = path.as_ref();
        let f = File::open(path).with_path(path)?;
        let mut r = BufReader::new(f);
        common::expect_type_header(&mut r, &[TYPE_NAME_VECTOR])?;
        let mut fmt_buf = [0u8; 4];
        std::io::Read::read_exact(&mut r, &mut fmt_buf).with_path(path)?;
        let format = FileFormat::from_i32(i32::from_le_bytes(fmt_buf))?;
        let mut m_buf = [0u8; 8];
        std::io::Read::read_exact(&mut r, &mut m_buf).with_path(path)?;
        let m = u64::from_le_bytes(m_buf) as usize;
        let data = common::read_payload::<T>(&mut r, m, format)?;
        Ok(DenseVector { data })
    }
}
