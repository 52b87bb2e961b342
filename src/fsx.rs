// Small cross-platform filesystem helper used by DiskVector's atomic swap.

use std::io;
use std::path::Path;

/// Exchanges the on-disk contents of `a` and `b` via a three-way rename
/// through `scratch`, without reading either file.
///
/// A failed rename partway through leaves at most `scratch` holding one of
/// the two files' former contents, never both `a` and `b` simultaneously
/// missing.
pub fn atomic_swap(a: &Path, b: &Path, scratch: &Path) -> io::Result<()> {
    std::fs::rename(a, scratch)?;
    std::fs::rename(b, a)?;
    std::fs::rename(scratch, b)?;
    Ok(())
}
