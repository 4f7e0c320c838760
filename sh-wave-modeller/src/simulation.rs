use std::f32::consts::{PI, SQRT_2};
use std::time::{Duration, Instant};

use crate::backend::{ComputeBackend, MemorySpace, StencilCoefficients};
use crate::error::{KernelError, SimulationError, SimulatorState};
use crate::field::FieldState;
use crate::grid::Grid;
use crate::model::Model;
use crate::Real;

/// Progress is logged every this many time steps unless configured otherwise.
pub const DEFAULT_REPORT_INTERVAL: usize = 250;

/// Ricker wavelet sampled at `it * dt`:
/// `R(t) = (1 - 2 pi^2 fpeak^2 t^2) * exp(-pi^2 fpeak^2 t^2)`, with `R(0) = 1`.
pub fn ricker_wavelet(nt: usize, dt: Real, fpeak: Real) -> Vec<Real> {
    let mut wavelet = vec![0.0; nt];
    if let Some(first) = wavelet.first_mut() {
        *first = 1.0;
    }
    for (it, sample) in wavelet.iter_mut().enumerate().skip(1) {
        let t = it as Real * dt;
        let term = PI * PI * fpeak * fpeak * t * t;
        *sample = (1.0 - 2.0 * term) * (-term).exp();
    }
    wavelet
}

/// Courant number `(dt/dx) * sqrt(2) * vmin` of the 2-D staggered scheme.
///
/// Staying at or below one is necessary but not sufficient for stability:
/// `dz` is not checked independently.
pub fn cfl_number(dt: Real, dx: Real, vmin: Real) -> Real {
    (dt / dx) * SQRT_2 * vmin
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationParams {
    pub grid: Grid,
    pub nt: usize,                // Number of time steps
    pub dt: Real,                 // Time step (seconds)
    pub source_z: Real,           // Source depth (meters)
    pub source_x: Real,           // Source horizontal position (meters)
    pub report_interval: usize,   // Steps between progress logs; 0 disables
}

impl SimulationParams {
    pub fn new(grid: Grid, nt: usize, dt: Real, source_z: Real, source_x: Real) -> Self {
        Self {
            grid,
            nt,
            dt,
            source_z,
            source_x,
            report_interval: DEFAULT_REPORT_INTERVAL,
        }
    }

    pub fn total_time(&self) -> Real {
        self.nt as Real * self.dt
    }

    pub fn coefficients(&self) -> StencilCoefficients {
        StencilCoefficients::new(self.dt, self.grid.dz, self.grid.dx)
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub steps: usize,
    pub elapsed: Duration,
}

/// Current and next time level. Swapping exchanges buffer ownership only.
struct DoubleBuffer<M: MemorySpace> {
    old: FieldState<M>,
    new: FieldState<M>,
}

impl<M: MemorySpace> DoubleBuffer<M> {
    fn swap(&mut self) {
        std::mem::swap(&mut self.old, &mut self.new);
    }
}

/// Drives the leapfrog time loop on one compute backend.
///
/// Lifecycle: `Unconfigured -> Allocated -> Running -> Finished | Failed`.
/// [`clean_internal_data_structures`](Self::clean_internal_data_structures)
/// releases the field states and returns to `Unconfigured`.
pub struct WaveSimulator<B: ComputeBackend> {
    backend: B,
    params: SimulationParams,
    wavelet: Vec<Real>,
    fields: Option<DoubleBuffer<B::Memory>>,
    state: SimulatorState,
}

impl<B: ComputeBackend> WaveSimulator<B> {
    pub fn new(backend: B, params: SimulationParams) -> Self {
        Self {
            backend,
            params,
            wavelet: Vec::new(),
            fields: None,
            state: SimulatorState::Unconfigured,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    pub fn state(&self) -> SimulatorState {
        self.state
    }

    pub fn wavelet(&self) -> &[Real] {
        &self.wavelet
    }

    /// Replaces the parameters. Any precomputed wavelet is discarded, since
    /// it was sampled for the previous `nt` and `dt`.
    pub fn set_params(&mut self, params: SimulationParams) -> Result<(), SimulationError> {
        self.expect_state(SimulatorState::Unconfigured)?;
        self.params = params;
        self.wavelet.clear();
        Ok(())
    }

    /// Precomputes the source time series for the configured `nt` and `dt`.
    pub fn make_ricker(&mut self, fpeak: Real) -> Result<(), SimulationError> {
        self.expect_state(SimulatorState::Unconfigured)?;
        self.wavelet = ricker_wavelet(self.params.nt, self.params.dt, fpeak);
        Ok(())
    }

    /// Allocates both field states, zero-initialized.
    pub fn allocate_internal_data_structures(&mut self) -> Result<(), SimulationError> {
        self.expect_state(SimulatorState::Unconfigured)?;
        let Grid { nz, nx, .. } = self.params.grid;
        if nz == 0 || nx == 0 {
            return Err(SimulationError::InvalidDimensions { nz, nx });
        }

        let space = self.backend.memory();
        self.fields = Some(DoubleBuffer {
            old: FieldState::zeros(space, nz, nx)?,
            new: FieldState::zeros(space, nz, nx)?,
        });
        self.state = SimulatorState::Allocated;
        tracing::debug!(nz, nx, backend = self.backend.name(), "field states allocated");
        Ok(())
    }

    /// Releases both field states.
    pub fn clean_internal_data_structures(&mut self) {
        if self.fields.take().is_some() {
            tracing::debug!(backend = self.backend.name(), "field states released");
        }
        self.state = SimulatorState::Unconfigured;
    }

    /// Fails with [`SimulationError::CflViolation`] when the slowest shear
    /// velocity of `model` gives a Courant number above one.
    pub fn check_cfl_condition(&self, model: &Model<B::Memory>) -> Result<Real, SimulationError> {
        let vs = model.vs.copy_to_host(self.backend.memory())?;
        let vmin = vs.iter().copied().fold(Real::INFINITY, Real::min);
        let cfl = cfl_number(self.params.dt, self.params.grid.dx, vmin);
        tracing::info!(cfl, vmin, "CFL: {cfl}");
        if cfl > 1.0 {
            return Err(SimulationError::CflViolation { cfl });
        }
        Ok(cfl)
    }

    /// Runs `nt` steps of inject -> velocity -> stress -> swap.
    ///
    /// The first kernel failure aborts the loop and leaves the simulator
    /// `Failed`; the partially updated wavefield stays readable but carries
    /// no meaning.
    pub fn run(&mut self, model: &Model<B::Memory>) -> Result<RunSummary, SimulationError> {
        self.expect_state(SimulatorState::Allocated)?;
        if self.wavelet.len() < self.params.nt {
            return Err(SimulationError::WaveletLength {
                nt: self.params.nt,
                len: self.wavelet.len(),
            });
        }

        self.state = SimulatorState::Running;
        let result = self.time_loop(model);
        self.state = match result {
            Ok(_) => SimulatorState::Finished,
            Err(_) => SimulatorState::Failed,
        };
        result
    }

    fn time_loop(&mut self, model: &Model<B::Memory>) -> Result<RunSummary, SimulationError> {
        let params = self.params;
        let fields = self.fields.as_mut().ok_or(SimulationError::InvalidState {
            expected: SimulatorState::Allocated,
            actual: SimulatorState::Unconfigured,
        })?;

        let (iz, ix) = params
            .grid
            .cell_of(params.source_z, params.source_x)
            .ok_or(SimulationError::Kernel {
                step: 0,
                source: KernelError::InvalidSourcePosition {
                    z: params.source_z,
                    x: params.source_x,
                },
            })?;
        let coeffs = params.coefficients();

        tracing::info!(
            backend = self.backend.name(),
            nz = params.grid.nz,
            nx = params.grid.nx,
            nt = params.nt,
            dt = params.dt,
            "starting simulation ({:.3} s simulated)",
            params.total_time()
        );

        let start = Instant::now();
        for (it, &amplitude) in self.wavelet.iter().take(params.nt).enumerate() {
            if params.report_interval > 0 && it % params.report_interval == 0 {
                tracing::info!("time-step: {it}");
            }

            let abort = |source: KernelError| {
                tracing::error!(step = it, error = %source, "kernel failed, aborting run");
                SimulationError::Kernel { step: it, source }
            };

            self.backend
                .inject_source(&mut fields.old, amplitude, iz, ix)
                .map_err(abort)?;
            self.backend
                .velocity_update(&mut fields.new, &fields.old, model, coeffs)
                .map_err(abort)?;
            self.backend
                .stress_update(&mut fields.new, &fields.old, model, coeffs)
                .map_err(abort)?;
            fields.swap();
        }

        let elapsed = start.elapsed();
        tracing::info!(steps = params.nt, ?elapsed, "simulation complete");
        Ok(RunSummary {
            steps: params.nt,
            elapsed,
        })
    }

    /// The latest time level: after a finished run, the wavefield at `nt * dt`.
    pub fn wavefield(&self) -> Option<&FieldState<B::Memory>> {
        self.fields.as_ref().map(|f| &f.old)
    }

    fn expect_state(&self, expected: SimulatorState) -> Result<(), SimulationError> {
        if self.state != expected {
            return Err(SimulationError::InvalidState {
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }
}
