use ndarray::Array2;

use crate::backend::{HostSpace, MemorySpace};
use crate::error::BackendError;
use crate::Real;

/// Dense `nz x nx` grid of samples owned by one memory space.
///
/// Samples are stored row-major: `index = iz * nx + ix`.
pub struct ScalarField<M: MemorySpace> {
    nz: usize,
    nx: usize,
    data: M::Buffer,
}

impl<M: MemorySpace> ScalarField<M> {
    /// Allocates a zero-filled field. Both extents must be positive.
    pub fn zeros(space: &M, nz: usize, nx: usize) -> Result<Self, BackendError> {
        if nz == 0 || nx == 0 {
            return Err(BackendError::EmptyField { nz, nx });
        }
        let data = space.allocate(nz * nx)?;
        Ok(Self { nz, nx, data })
    }

    /// Allocates a field and fills it from a host array.
    pub fn from_host(space: &M, values: &Array2<Real>) -> Result<Self, BackendError> {
        let (nz, nx) = values.dim();
        let mut field = Self::zeros(space, nz, nx)?;
        // Logical iteration order is row-major regardless of the array's layout.
        let host: Vec<Real> = values.iter().copied().collect();
        space.copy_from_host(&mut field.data, 0, &host)?;
        Ok(field)
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nz, self.nx)
    }

    pub fn len(&self) -> usize {
        self.nz * self.nx
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn buffer(&self) -> &M::Buffer {
        &self.data
    }

    pub fn buffer_mut(&mut self) -> &mut M::Buffer {
        &mut self.data
    }

    /// Copies the samples into a freshly allocated host vector.
    pub fn copy_to_host(&self, space: &M) -> Result<Vec<Real>, BackendError> {
        let mut host = HostSpace.allocate(self.len())?;
        space.copy_to_host(&mut host, &self.data)?;
        Ok(host)
    }

    /// Copies the samples into an `(nz, nx)` array.
    pub fn to_array(&self, space: &M) -> Result<Array2<Real>, BackendError> {
        let host = self.copy_to_host(space)?;
        Array2::from_shape_vec((self.nz, self.nx), host).map_err(|_| {
            BackendError::LengthMismatch {
                buffer: self.len(),
                host: self.nz * self.nx,
            }
        })
    }
}

impl ScalarField<HostSpace> {
    pub fn as_slice(&self) -> &[Real] {
        &self.data
    }

    pub fn as_slice_mut(&mut self) -> &mut [Real] {
        &mut self.data
    }

    pub fn get(&self, iz: usize, ix: usize) -> Option<Real> {
        if iz < self.nz && ix < self.nx {
            Some(self.data[iz * self.nx + ix])
        } else {
            None
        }
    }
}

/// One discretized time level of the wavefield.
pub struct FieldState<M: MemorySpace> {
    /// Out-of-plane particle velocity.
    pub v: ScalarField<M>,
    /// Shear stress driven by the vertical velocity gradient.
    pub s: ScalarField<M>,
    /// Shear stress driven by the horizontal velocity gradient.
    pub t: ScalarField<M>,
}

impl<M: MemorySpace> FieldState<M> {
    pub fn zeros(space: &M, nz: usize, nx: usize) -> Result<Self, BackendError> {
        Ok(Self {
            v: ScalarField::zeros(space, nz, nx)?,
            s: ScalarField::zeros(space, nz, nx)?,
            t: ScalarField::zeros(space, nz, nx)?,
        })
    }

    /// Builds a state from host arrays of identical shape.
    pub fn from_host(
        space: &M,
        v: &Array2<Real>,
        s: &Array2<Real>,
        t: &Array2<Real>,
    ) -> Result<Self, BackendError> {
        Ok(Self {
            v: ScalarField::from_host(space, v)?,
            s: ScalarField::from_host(space, s)?,
            t: ScalarField::from_host(space, t)?,
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        self.v.shape()
    }
}
