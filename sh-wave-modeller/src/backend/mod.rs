//! Memory spaces and compute backends.
//!
//! A [`MemorySpace`] decides where field buffers live and how they move to and
//! from the host. A [`ComputeBackend`] is bound to exactly one memory space and
//! supplies the three stencil kernels. The simulator is written once against
//! these traits:
//!
//! - [`Serial`]: host memory, sequential row loop.
//! - [`Threaded`]: host memory, rows spread over a `rayon` pool.
//! - `Device` (feature `gpu`): `wgpu` buffers, WGSL compute shaders.

mod serial;
mod threaded;

#[cfg(feature = "gpu")]
mod device;

pub use serial::Serial;
pub use threaded::Threaded;

#[cfg(feature = "gpu")]
pub use device::{adapter_available, Device, DeviceBuffer, DeviceSpace};

use crate::error::{BackendError, KernelError};
use crate::field::FieldState;
use crate::model::Model;
use crate::Real;

/// Where field data lives.
///
/// Buffers are released by dropping them, so every allocation is paired with
/// exactly one release on every exit path.
pub trait MemorySpace {
    type Buffer;

    /// Allocates a zero-initialized buffer of `len` elements.
    fn allocate(&self, len: usize) -> Result<Self::Buffer, BackendError>;

    /// Copies the whole of `src` into `dst`. Lengths must match.
    fn copy_to_host(&self, dst: &mut [Real], src: &Self::Buffer) -> Result<(), BackendError>;

    /// Copies `src` into `dst` starting at element `offset`.
    fn copy_from_host(
        &self,
        dst: &mut Self::Buffer,
        offset: usize,
        src: &[Real],
    ) -> Result<(), BackendError>;
}

/// Plain host RAM.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostSpace;

impl MemorySpace for HostSpace {
    type Buffer = Vec<Real>;

    fn allocate(&self, len: usize) -> Result<Vec<Real>, BackendError> {
        Ok(vec![0.0; len])
    }

    fn copy_to_host(&self, dst: &mut [Real], src: &Vec<Real>) -> Result<(), BackendError> {
        if dst.len() != src.len() {
            return Err(BackendError::LengthMismatch {
                buffer: src.len(),
                host: dst.len(),
            });
        }
        dst.copy_from_slice(src);
        Ok(())
    }

    fn copy_from_host(
        &self,
        dst: &mut Vec<Real>,
        offset: usize,
        src: &[Real],
    ) -> Result<(), BackendError> {
        let target = checked_range(offset, src.len(), dst.len())?;
        dst[target].copy_from_slice(src);
        Ok(())
    }
}

/// Validates `offset..offset+len` against a buffer of `buffer` elements.
pub(crate) fn checked_range(
    offset: usize,
    len: usize,
    buffer: usize,
) -> Result<std::ops::Range<usize>, BackendError> {
    match offset.checked_add(len) {
        Some(end) if end <= buffer => Ok(offset..end),
        _ => Err(BackendError::OutOfRange {
            offset,
            len,
            buffer,
        }),
    }
}

/// `dt/dz` and `dt/dx`, computed once per kernel call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StencilCoefficients {
    pub dt_dz: Real,
    pub dt_dx: Real,
}

impl StencilCoefficients {
    pub fn new(dt: Real, dz: Real, dx: Real) -> Self {
        Self {
            dt_dz: dt / dz,
            dt_dx: dt / dx,
        }
    }
}

/// Parallel-execution strategy bound to one memory space.
///
/// Each kernel either applies to the whole grid or returns an error; after an
/// error no further update of that step can be trusted.
pub trait ComputeBackend {
    type Memory: MemorySpace;

    /// Short name used in logs and on the command line.
    fn name(&self) -> &'static str;

    fn memory(&self) -> &Self::Memory;

    /// Overwrites `V[iz, ix]` with `amplitude`.
    fn inject_source(
        &self,
        fields: &mut FieldState<Self::Memory>,
        amplitude: Real,
        iz: usize,
        ix: usize,
    ) -> Result<(), KernelError> {
        let (nz, nx) = fields.shape();
        if iz >= nz || ix >= nx {
            return Err(KernelError::SourceOutOfBounds { iz, ix, nz, nx });
        }
        self.memory()
            .copy_from_host(fields.v.buffer_mut(), iz * nx + ix, &[amplitude])?;
        Ok(())
    }

    /// Momentum equation: forward differences of `S` and `T` scaled by buoyancy.
    fn velocity_update(
        &self,
        fields_new: &mut FieldState<Self::Memory>,
        fields_old: &FieldState<Self::Memory>,
        model: &Model<Self::Memory>,
        coeffs: StencilCoefficients,
    ) -> Result<(), KernelError>;

    /// Constitutive relation: backward differences of the new `V` scaled by
    /// the shear modulus. Must run after [`velocity_update`](Self::velocity_update).
    fn stress_update(
        &self,
        fields_new: &mut FieldState<Self::Memory>,
        fields_old: &FieldState<Self::Memory>,
        model: &Model<Self::Memory>,
        coeffs: StencilCoefficients,
    ) -> Result<(), KernelError>;
}

/// Checks that both field states and the model share one shape. Fields
/// cannot be empty, so the returned extents are positive.
pub(crate) fn check_shapes<M: MemorySpace>(
    fields_new: &FieldState<M>,
    fields_old: &FieldState<M>,
    model: &Model<M>,
) -> Result<(usize, usize), KernelError> {
    let expected = fields_new.shape();
    for found in [fields_old.shape(), model.shape()] {
        if found != expected {
            return Err(KernelError::ShapeMismatch { expected, found });
        }
    }
    Ok(expected)
}
