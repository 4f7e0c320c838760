//! Error types shared by the backends, kernels and the simulator.

use std::path::PathBuf;
use thiserror::Error;

use crate::Real;

/// Failures raised by a memory space or compute backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("device error: {0}")]
    Device(String),

    #[error("failed to build worker pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("field dimensions must be positive (nz={nz}, nx={nx})")]
    EmptyField { nz: usize, nx: usize },

    #[error("copy length mismatch: buffer holds {buffer} elements, host slice holds {host}")]
    LengthMismatch { buffer: usize, host: usize },

    #[error("copy of {len} elements at offset {offset} overruns a buffer of {buffer} elements")]
    OutOfRange {
        offset: usize,
        len: usize,
        buffer: usize,
    },
}

/// Failures reported by a stencil kernel. Any of these aborts the current run.
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("source position ({iz}, {ix}) lies outside the {nz}x{nx} grid")]
    SourceOutOfBounds {
        iz: usize,
        ix: usize,
        nz: usize,
        nx: usize,
    },

    #[error("source position (z={z}, x={x}) does not map to a grid cell")]
    InvalidSourcePosition { z: Real, x: Real },

    #[error("field shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Lifecycle state of a [`WaveSimulator`](crate::WaveSimulator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatorState {
    Unconfigured,
    Allocated,
    Running,
    Finished,
    Failed,
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("CFL stability condition not satisfied (cfl = {cfl:.4} > 1)")]
    CflViolation { cfl: Real },

    #[error("operation requires the simulator to be {expected:?}, but it is {actual:?}")]
    InvalidState {
        expected: SimulatorState,
        actual: SimulatorState,
    },

    #[error("grid dimensions must be positive (nz={nz}, nx={nx})")]
    InvalidDimensions { nz: usize, nx: usize },

    #[error("model field '{name}' has shape {found:?}, expected {expected:?}")]
    ModelShape {
        name: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("wavelet holds {len} samples but {nt} time steps are configured")]
    WaveletLength { nt: usize, len: usize },

    #[error("kernel failed at time step {step}")]
    Kernel {
        step: usize,
        #[source]
        source: KernelError,
    },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Failures while writing or reading raw binary snapshots.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("unable to access snapshot file '{path}'")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot '{path}' holds {actual} bytes, expected {expected}")]
    SizeMismatch {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    #[error(transparent)]
    Backend(#[from] BackendError),
}
