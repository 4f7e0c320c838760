//! Staggered-grid stencils for host-resident fields.
//!
//! The arithmetic lives here once; host backends only decide how rows are
//! scheduled through [`RowDispatch`]. The WGSL shaders of the device backend
//! implement the same recurrences.

use std::ops::Range;

use crate::backend::{check_shapes, HostSpace, StencilCoefficients};
use crate::error::KernelError;
use crate::field::FieldState;
use crate::model::Model;
use crate::Real;

/// Row-scheduling primitive of a host backend.
///
/// `out` is split into rows of `nx` samples and `kernel(iz, row)` is called
/// for every `iz` in `rows`. Returning means every call has completed.
pub trait RowDispatch {
    fn for_each_row<F>(&self, out: &mut [Real], nx: usize, rows: Range<usize>, kernel: F)
    where
        F: Fn(usize, &mut [Real]) + Send + Sync;
}

/// `Vnew = Vold + dt/dz * L * dS/dz + dt/dx * L * dT/dx` (forward differences)
/// on `iz < nz-1`, `ix < nx-1`.
pub fn velocity_update<D: RowDispatch>(
    dispatch: &D,
    fields_new: &mut FieldState<HostSpace>,
    fields_old: &FieldState<HostSpace>,
    model: &Model<HostSpace>,
    c: StencilCoefficients,
) -> Result<(), KernelError> {
    let (nz, nx) = check_shapes(fields_new, fields_old, model)?;

    let v_old = fields_old.v.as_slice();
    let s_old = fields_old.s.as_slice();
    let t_old = fields_old.t.as_slice();
    let l = model.l.as_slice();

    dispatch.for_each_row(fields_new.v.as_slice_mut(), nx, 0..nz - 1, |iz, v_new| {
        let row = iz * nx;
        for ix in 0..nx - 1 {
            let idx = row + ix;
            v_new[ix] = v_old[idx]
                + c.dt_dz * l[idx] * (s_old[idx + nx] - s_old[idx])
                + c.dt_dx * l[idx] * (t_old[idx + 1] - t_old[idx]);
        }
    });

    Ok(())
}

/// `Snew = Sold + dt/dz * M * dV/dz` and `Tnew = Told + dt/dx * M * dV/dx`
/// (backward differences of the new velocity) on `iz >= 1`, `ix >= 1`.
pub fn stress_update<D: RowDispatch>(
    dispatch: &D,
    fields_new: &mut FieldState<HostSpace>,
    fields_old: &FieldState<HostSpace>,
    model: &Model<HostSpace>,
    c: StencilCoefficients,
) -> Result<(), KernelError> {
    let (nz, nx) = check_shapes(fields_new, fields_old, model)?;

    let s_old = fields_old.s.as_slice();
    let t_old = fields_old.t.as_slice();
    let m = model.m.as_slice();
    let v_new = fields_new.v.as_slice();

    dispatch.for_each_row(fields_new.s.as_slice_mut(), nx, 1..nz, |iz, s_new| {
        let row = iz * nx;
        for ix in 1..nx {
            let idx = row + ix;
            s_new[ix] = s_old[idx] + c.dt_dz * m[idx] * (v_new[idx] - v_new[idx - nx]);
        }
    });

    dispatch.for_each_row(fields_new.t.as_slice_mut(), nx, 1..nz, |iz, t_new| {
        let row = iz * nx;
        for ix in 1..nx {
            let idx = row + ix;
            t_new[ix] = t_old[idx] + c.dt_dx * m[idx] * (v_new[idx] - v_new[idx - 1]);
        }
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ComputeBackend, Serial, Threaded};
    use ndarray::Array2;

    const SENTINEL: Real = 7.0;

    fn ramp(nz: usize, nx: usize, scale: Real) -> Array2<Real> {
        Array2::from_shape_fn((nz, nx), |(iz, ix)| scale * (1.0 + iz as Real * nx as Real + ix as Real))
    }

    fn unit_model(nz: usize, nx: usize) -> Model<HostSpace> {
        let ones = Array2::from_elem((nz, nx), 1.0);
        Model::from_arrays(&HostSpace, &ones, &ones, &ones).unwrap()
    }

    fn prior_state(nz: usize, nx: usize) -> (FieldState<HostSpace>, FieldState<HostSpace>) {
        let old = FieldState::from_host(
            &HostSpace,
            &ramp(nz, nx, 0.5),
            &ramp(nz, nx, 0.25),
            &ramp(nz, nx, -0.125),
        )
        .unwrap();
        let sentinel = Array2::from_elem((nz, nx), SENTINEL);
        let new = FieldState::from_host(&HostSpace, &sentinel, &sentinel, &sentinel).unwrap();
        (new, old)
    }

    #[test]
    fn velocity_update_leaves_last_row_and_column() {
        let (mut new, old) = prior_state(4, 4);
        let model = unit_model(4, 4);
        let c = StencilCoefficients::new(0.1, 1.0, 1.0);

        Serial.velocity_update(&mut new, &old, &model, c).unwrap();

        for iz in 0..4 {
            for ix in 0..4 {
                let value = new.v.get(iz, ix).unwrap();
                if iz == 3 || ix == 3 {
                    assert_eq!(value, SENTINEL, "boundary ({iz}, {ix}) changed");
                } else {
                    assert_ne!(value, SENTINEL, "interior ({iz}, {ix}) untouched");
                }
            }
        }
        // Stress buffers are not touched by the velocity kernel.
        assert!(new.s.as_slice().iter().all(|&x| x == SENTINEL));
        assert!(new.t.as_slice().iter().all(|&x| x == SENTINEL));
    }

    #[test]
    fn velocity_update_matches_recurrence() {
        let (mut new, old) = prior_state(4, 4);
        let model = unit_model(4, 4);
        let c = StencilCoefficients::new(0.1, 1.0, 2.0);

        Serial.velocity_update(&mut new, &old, &model, c).unwrap();

        let v = old.v.as_slice();
        let s = old.s.as_slice();
        let t = old.t.as_slice();
        let idx = 4 + 1;
        let expected = v[idx] + c.dt_dz * 1.0 * (s[idx + 4] - s[idx]) + c.dt_dx * 1.0 * (t[idx + 1] - t[idx]);
        assert_eq!(new.v.get(1, 1), Some(expected));
    }

    #[test]
    fn stress_update_leaves_first_row_and_column() {
        let (mut new, old) = prior_state(4, 4);
        let model = unit_model(4, 4);
        let c = StencilCoefficients::new(0.1, 1.0, 1.0);

        Serial.stress_update(&mut new, &old, &model, c).unwrap();

        for iz in 0..4 {
            for ix in 0..4 {
                let s = new.s.get(iz, ix).unwrap();
                let t = new.t.get(iz, ix).unwrap();
                if iz == 0 || ix == 0 {
                    assert_eq!(s, SENTINEL, "S boundary ({iz}, {ix}) changed");
                    assert_eq!(t, SENTINEL, "T boundary ({iz}, {ix}) changed");
                } else {
                    // V is uniform, so both gradients vanish.
                    assert_eq!(s, old.s.get(iz, ix).unwrap());
                    assert_eq!(t, old.t.get(iz, ix).unwrap());
                }
            }
        }
    }

    #[test]
    fn stress_update_reads_new_velocity() {
        let nz = 3;
        let nx = 3;
        let zeros = Array2::<Real>::zeros((nz, nx));
        let old = FieldState::from_host(&HostSpace, &zeros, &zeros, &zeros).unwrap();
        let mut v_new = zeros.clone();
        v_new[[1, 1]] = 2.0;
        let mut new = FieldState::from_host(&HostSpace, &v_new, &zeros, &zeros).unwrap();
        let model = unit_model(nz, nx);

        Serial
            .stress_update(&mut new, &old, &model, StencilCoefficients::new(0.5, 1.0, 1.0))
            .unwrap();

        assert_eq!(new.s.get(1, 1), Some(1.0));
        assert_eq!(new.s.get(2, 1), Some(-1.0));
        assert_eq!(new.t.get(1, 1), Some(1.0));
        assert_eq!(new.t.get(1, 2), Some(-1.0));
        assert_eq!(new.s.get(1, 2), Some(0.0));
    }

    #[test]
    fn shape_mismatch_is_reported() {
        let (mut new, _) = prior_state(4, 4);
        let (_, old) = prior_state(3, 4);
        let model = unit_model(4, 4);
        let err = Serial
            .velocity_update(&mut new, &old, &model, StencilCoefficients::new(0.1, 1.0, 1.0))
            .unwrap_err();
        assert!(matches!(
            err,
            KernelError::ShapeMismatch { expected: (4, 4), found: (3, 4) }
        ));
    }

    #[test]
    fn single_row_grid_has_no_interior() {
        let (mut new, old) = prior_state(1, 5);
        let model = unit_model(1, 5);
        let c = StencilCoefficients::new(0.1, 1.0, 1.0);
        Serial.velocity_update(&mut new, &old, &model, c).unwrap();
        Serial.stress_update(&mut new, &old, &model, c).unwrap();
        assert!(new.v.as_slice().iter().all(|&x| x == SENTINEL));
        assert!(new.s.as_slice().iter().all(|&x| x == SENTINEL));
    }

    #[test]
    fn threaded_rows_match_serial_rows() {
        let model = unit_model(9, 7);
        let c = StencilCoefficients::new(0.05, 1.0, 1.5);

        let (mut serial_new, old) = prior_state(9, 7);
        Serial.velocity_update(&mut serial_new, &old, &model, c).unwrap();
        Serial.stress_update(&mut serial_new, &old, &model, c).unwrap();

        let threaded = Threaded::with_threads(3).unwrap();
        let (mut threaded_new, old) = prior_state(9, 7);
        threaded.velocity_update(&mut threaded_new, &old, &model, c).unwrap();
        threaded.stress_update(&mut threaded_new, &old, &model, c).unwrap();

        assert_eq!(serial_new.v.as_slice(), threaded_new.v.as_slice());
        assert_eq!(serial_new.s.as_slice(), threaded_new.s.as_slice());
        assert_eq!(serial_new.t.as_slice(), threaded_new.t.as_slice());
    }

    #[test]
    fn source_injection_respects_bounds() {
        let mut state = FieldState::zeros(&HostSpace, 4, 4).unwrap();

        let err = Serial.inject_source(&mut state, 1.0, 4, 0).unwrap_err();
        assert!(matches!(err, KernelError::SourceOutOfBounds { iz: 4, ix: 0, .. }));
        let err = Serial.inject_source(&mut state, 1.0, 0, 4).unwrap_err();
        assert!(matches!(err, KernelError::SourceOutOfBounds { iz: 0, ix: 4, .. }));
        assert!(state.v.as_slice().iter().all(|&x| x == 0.0));

        Serial.inject_source(&mut state, 0.75, 0, 0).unwrap();
        assert_eq!(state.v.as_slice()[0], 0.75);
        assert_eq!(state.v.as_slice().iter().filter(|&&x| x != 0.0).count(), 1);
    }
}
