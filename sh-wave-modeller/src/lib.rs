//! 2-D SH (horizontally polarized shear) wave propagation on a staggered
//! finite-difference grid.
//!
//! The simulator advances particle velocity `V` and the two shear stresses
//! `S` (sigma_yz) and `T` (sigma_xy) with a second-order leapfrog scheme, on
//! a serial, a thread-parallel or (feature `gpu`) a `wgpu` compute backend.

pub mod backend;
pub mod config;
pub mod error;
pub mod field;
pub mod grid;
pub mod kernels;
pub mod model;
pub mod scenario;
pub mod simulation;
pub mod snapshot;
pub mod visualisation;

/// Sample type shared by every backend.
pub type Real = f32;

pub use backend::{ComputeBackend, HostSpace, MemorySpace, Serial, StencilCoefficients, Threaded};
pub use error::{BackendError, KernelError, SimulationError, SimulatorState, SnapshotError};
pub use field::{FieldState, ScalarField};
pub use grid::Grid;
pub use model::{Model, Reflector};
pub use simulation::{cfl_number, ricker_wavelet, RunSummary, SimulationParams, WaveSimulator};
