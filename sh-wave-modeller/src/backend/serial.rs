use std::ops::Range;

use super::{ComputeBackend, HostSpace, StencilCoefficients};
use crate::error::KernelError;
use crate::field::FieldState;
use crate::kernels::{self, RowDispatch};
use crate::model::Model;
use crate::Real;

/// Single-threaded host backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct Serial;

impl RowDispatch for Serial {
    fn for_each_row<F>(&self, out: &mut [Real], nx: usize, rows: Range<usize>, kernel: F)
    where
        F: Fn(usize, &mut [Real]) + Send + Sync,
    {
        for (iz, row) in out
            .chunks_mut(nx)
            .enumerate()
            .skip(rows.start)
            .take(rows.len())
        {
            kernel(iz, row);
        }
    }
}

impl ComputeBackend for Serial {
    type Memory = HostSpace;

    fn name(&self) -> &'static str {
        "serial"
    }

    fn memory(&self) -> &HostSpace {
        &HostSpace
    }

    fn velocity_update(
        &self,
        fields_new: &mut FieldState<HostSpace>,
        fields_old: &FieldState<HostSpace>,
        model: &Model<HostSpace>,
        coeffs: StencilCoefficients,
    ) -> Result<(), KernelError> {
        kernels::velocity_update(self, fields_new, fields_old, model, coeffs)
    }

    fn stress_update(
        &self,
        fields_new: &mut FieldState<HostSpace>,
        fields_old: &FieldState<HostSpace>,
        model: &Model<HostSpace>,
        coeffs: StencilCoefficients,
    ) -> Result<(), KernelError> {
        kernels::stress_update(self, fields_new, fields_old, model, coeffs)
    }
}
