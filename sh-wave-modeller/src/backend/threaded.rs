use std::ops::Range;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use super::{ComputeBackend, HostSpace, StencilCoefficients};
use crate::error::{BackendError, KernelError};
use crate::field::FieldState;
use crate::kernels::{self, RowDispatch};
use crate::model::Model;
use crate::Real;

/// Multi-threaded host backend: grid rows are spread over a dedicated
/// `rayon` pool. Each kernel joins all of its rows before returning, which
/// is the barrier between the velocity and stress updates.
pub struct Threaded {
    pool: ThreadPool,
}

impl Threaded {
    /// Pool sized by `rayon` (one worker per logical CPU by default).
    pub fn new() -> Result<Self, BackendError> {
        Self::with_threads(0)
    }

    /// Pool with exactly `threads` workers; `0` lets `rayon` decide.
    pub fn with_threads(threads: usize) -> Result<Self, BackendError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("sh-stencil-{i}"))
            .build()?;
        tracing::debug!(threads = pool.current_num_threads(), "stencil thread pool ready");
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl RowDispatch for Threaded {
    fn for_each_row<F>(&self, out: &mut [Real], nx: usize, rows: Range<usize>, kernel: F)
    where
        F: Fn(usize, &mut [Real]) + Send + Sync,
    {
        self.pool.install(|| {
            out.par_chunks_mut(nx)
                .enumerate()
                .skip(rows.start)
                .take(rows.len())
                .for_each(|(iz, row)| kernel(iz, row));
        });
    }
}

impl ComputeBackend for Threaded {
    type Memory = HostSpace;

    fn name(&self) -> &'static str {
        "threaded"
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
