use std::path::PathBuf;
use std::time::SystemTimeError;

/// The primary error type for all operations in the `graphee` crate.
///
/// Each variant is either fatal at the call site (`Config`, `Io`, `Format`,
/// `DimensionMismatch`) or a per-unit failure the caller is expected to
/// handle locally (`BudgetExceeded`, `VerifyFailed`).
#[derive(Debug)]
pub enum GraphError {
    /// Bad `GraphConfig` — a precondition on vertex/slice/RAM sizing was violated.
    Config(String),

    /// An I/O error, typically while reading or writing a block/slice/temp file.
    /// Includes the path where the error happened.
    Io { source: std::io::Error, path: PathBuf },

    /// Compress/decompress failure in the chunked codec.
    Codec(String),

    /// Tile or slice file header type-name mismatch; load refuses to proceed.
    Format(String),

    /// A Stage-B tile's `alloc_need` exceeds `ram_limit_bytes`; the tile is
    /// skipped, other tiles proceed.
    BudgetExceeded { block_id: u64, needed: u64, limit: u64 },

    /// `ia[m] != nnz` after `finalize()`; the tile is not saved.
    VerifyFailed { block_id: u64 },

    /// SpMV with incompatible sizes, swap across differing vertex counts, etc.
    DimensionMismatch { expected: u64, found: u64 },

    /// A system time error, which can occur when reading file metadata.
    SystemTime(SystemTimeError),

    /// A wrapper for any other error that doesn't fit the specific variants.
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphError::Config(msg) => write!(f, "config error: {}", msg),
            GraphError::Io { source, path } => {
                write!(f, "I/O error on path '{}': {}", path.display(), source)
            }
            GraphError::Codec(msg) => write!(f, "codec error: {}", msg),
            GraphError::Format(msg) => write!(f, "format error: {}", msg),
            GraphError::BudgetExceeded { block_id, needed, limit } => write!(
                f,
                "block {} needs {} bytes, exceeding ram_limit_bytes {}",
                block_id, needed, limit
            ),
            GraphError::VerifyFailed { block_id } => {
                write!(f, "block {} failed CSR verification (ia[m] != nnz)", block_id)
            }
            GraphError::DimensionMismatch { expected, found } => {
                write!(f, "dimension mismatch: expected {}, found {}", expected, found)
            }
            GraphError::SystemTime(e) => write!(f, "system time error: {}", e),
            GraphError::Other(e) => write!(f, "unexpected error: {}", e),
        }
    }
}

impl std::error::Error for GraphError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GraphError::Io { source, .. } => Some(source),
            GraphError::SystemTime(e) => Some(e),
            GraphError::Other(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<SystemTimeError> for GraphError {
    fn from(err: SystemTimeError) -> Self {
        GraphError::SystemTime(err)
    }
}

impl From<std::io::Error> for GraphError {
    fn from(err: std::io::Error) -> Self {
        GraphError::Io { source: err, path: PathBuf::new() }
    }
}

/// Attaches a path to a bare `std::io::Error`, for call sites that know
/// which file failed.
pub trait IoResultExt<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T, GraphError>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T, GraphError> {
        self.map_err(|source| GraphError::Io { source, path: path.into() })
    }
}
