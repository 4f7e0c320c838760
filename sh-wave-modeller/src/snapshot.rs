//! Raw binary snapshots: `nz * nx` samples, row-major, native byte order,
//! no header.

use std::fs;
use std::path::{Path, PathBuf};

use ndarray::Array2;

use crate::backend::MemorySpace;
use crate::error::SnapshotError;
use crate::field::{FieldState, ScalarField};
use crate::model::Model;
use crate::Real;

const SAMPLE_BYTES: usize = std::mem::size_of::<Real>();

pub fn store_to_binary<M: MemorySpace>(
    path: impl AsRef<Path>,
    field: &ScalarField<M>,
    space: &M,
) -> Result<(), SnapshotError> {
    let path = path.as_ref();
    let samples = field.copy_to_host(space)?;
    fs::write(path, bytemuck::cast_slice::<Real, u8>(&samples)).map_err(|source| {
        SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        }
    })?;
    tracing::debug!(path = %path.display(), samples = samples.len(), "snapshot written");
    Ok(())
}

/// Reads a snapshot written by [`store_to_binary`] back as an `(nz, nx)` array.
pub fn load_from_binary(
    path: impl AsRef<Path>,
    nz: usize,
    nx: usize,
) -> Result<Array2<Real>, SnapshotError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let expected = nz * nx * SAMPLE_BYTES;
    if bytes.len() != expected {
        return Err(SnapshotError::SizeMismatch {
            path: path.to_path_buf(),
            expected,
            actual: bytes.len(),
        });
    }

    // `fs::read` gives no alignment guarantee for `Real`.
    let samples: Vec<Real> = bytes
        .chunks_exact(SAMPLE_BYTES)
        .map(bytemuck::pod_read_unaligned)
        .collect();
    Array2::from_shape_vec((nz, nx), samples).map_err(|_| SnapshotError::SizeMismatch {
        path: path.to_path_buf(),
        expected,
        actual: bytes.len(),
    })
}

/// Writes `V.bin`, `S.bin`, `T.bin`, `Vs.bin`, `L.bin` and `M.bin` into `dir`.
///
/// A failed file is logged and skipped; the others are still written. The
/// paths that were written are returned.
pub fn store_all<M: MemorySpace>(
    dir: impl AsRef<Path>,
    fields: &FieldState<M>,
    model: &Model<M>,
    space: &M,
) -> Vec<PathBuf> {
    let dir = dir.as_ref();
    let outputs = [
        ("V.bin", &fields.v),
        ("S.bin", &fields.s),
        ("T.bin", &fields.t),
        ("Vs.bin", &model.vs),
        ("L.bin", &model.l),
        ("M.bin", &model.m),
    ];

    let mut written = Vec::with_capacity(outputs.len());
    for (name, field) in outputs {
        let path = dir.join(name);
        match store_to_binary(&path, field, space) {
            Ok(()) => written.push(path),
            Err(err) => tracing::error!(file = name, error = %err, "failed to write snapshot"),
        }
    }
    written
}
