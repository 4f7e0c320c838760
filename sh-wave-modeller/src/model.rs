use ndarray::Array2;

use crate::backend::MemorySpace;
use crate::error::SimulationError;
use crate::field::ScalarField;
use crate::Real;

/// Static physical parameters of the medium.
///
/// `m` is expected to equal `vs * vs / l` at every point. This is not
/// enforced, but the stencils only make physical sense when it holds.
pub struct Model<M: MemorySpace> {
    /// Shear-wave velocity.
    pub vs: ScalarField<M>,
    /// Buoyancy (reciprocal density).
    pub l: ScalarField<M>,
    /// Shear modulus.
    pub m: ScalarField<M>,
}

/// A single-row density contrast in a layered model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reflector {
    pub row: usize,
    pub density_scale: Real,
}

impl<M: MemorySpace> Model<M> {
    /// Uploads explicit `vs`, `l` and `m` arrays into `space`.
    pub fn from_arrays(
        space: &M,
        vs: &Array2<Real>,
        l: &Array2<Real>,
        m: &Array2<Real>,
    ) -> Result<Self, SimulationError> {
        let expected = vs.dim();
        if expected.0 == 0 || expected.1 == 0 {
            return Err(SimulationError::InvalidDimensions {
                nz: expected.0,
                nx: expected.1,
            });
        }
        for (name, field) in [("L", l), ("M", m)] {
            if field.dim() != expected {
                return Err(SimulationError::ModelShape {
                    name,
                    expected,
                    found: field.dim(),
                });
            }
        }

        Ok(Self {
            vs: ScalarField::from_host(space, vs)?,
            l: ScalarField::from_host(space, l)?,
            m: ScalarField::from_host(space, m)?,
        })
    }

    /// Derives buoyancy and shear modulus from velocity and density.
    pub fn from_velocity_density(
        space: &M,
        vs: &Array2<Real>,
        rho: &Array2<Real>,
    ) -> Result<Self, SimulationError> {
        let (nz, nx) = vs.dim();
        if rho.dim() != (nz, nx) {
            return Err(SimulationError::ModelShape {
                name: "rho",
                expected: (nz, nx),
                found: rho.dim(),
            });
        }

        let mut l = Array2::<Real>::zeros((nz, nx));
        let mut m = Array2::<Real>::zeros((nz, nx));
        for iz in 0..nz {
            for ix in 0..nx {
                let vs_zx = vs[[iz, ix]];
                let rho_zx = rho[[iz, ix]];
                l[[iz, ix]] = 1.0 / rho_zx;
                m[[iz, ix]] = vs_zx * vs_zx * rho_zx;
            }
        }

        Self::from_arrays(space, vs, &l, &m)
    }

    /// Homogeneous background with single-row density reflectors.
    pub fn layered(
        space: &M,
        nz: usize,
        nx: usize,
        vs: Real,
        rho: Real,
        reflectors: &[Reflector],
    ) -> Result<Self, SimulationError> {
        let vs_grid = Array2::from_elem((nz, nx), vs);
        let mut rho_grid = Array2::from_elem((nz, nx), rho);
        for reflector in reflectors {
            if reflector.row < nz {
                rho_grid
                    .row_mut(reflector.row)
                    .mapv_inplace(|r| r * reflector.density_scale);
            }
        }
        Self::from_velocity_density(space, &vs_grid, &rho_grid)
    }

    pub fn shape(&self) -> (usize, usize) {
        self.vs.shape()
    }
}
