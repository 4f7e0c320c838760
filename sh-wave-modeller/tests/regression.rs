//! Whole-run behaviour of the simulator on the host backends.

use ndarray::Array2;
use sh_wave_modeller::{
    ComputeBackend, FieldState, Grid, HostSpace, Model, Real, Reflector, Serial, SimulationParams,
    Threaded, WaveSimulator,
};

fn run_to_end<B: ComputeBackend<Memory = HostSpace>>(
    backend: B,
    params: SimulationParams,
    model: &Model<HostSpace>,
    fpeak: Real,
) -> (Array2<Real>, Array2<Real>, Array2<Real>) {
    let mut sim = WaveSimulator::new(backend, params);
    sim.check_cfl_condition(model).unwrap();
    sim.make_ricker(fpeak).unwrap();
    sim.allocate_internal_data_structures().unwrap();
    sim.run(model).unwrap();

    let FieldState { v, s, t } = sim.wavefield().unwrap();
    (
        v.to_array(&HostSpace).unwrap(),
        s.to_array(&HostSpace).unwrap(),
        t.to_array(&HostSpace).unwrap(),
    )
}

fn layered_case() -> (SimulationParams, Model<HostSpace>) {
    let grid = Grid::new(30, 40, 2.5, 2.5);
    let mut params = SimulationParams::new(grid, 80, 0.0002, 30.0, 50.0);
    params.report_interval = 0;
    let reflectors = [
        Reflector {
            row: 15,
            density_scale: 0.5,
        },
        Reflector {
            row: 20,
            density_scale: 2.0,
        },
    ];
    let model = Model::layered(&HostSpace, 30, 40, 2000.0, 2400.0, &reflectors).unwrap();
    (params, model)
}

#[test]
fn single_step_matches_hand_computed_values() {
    let grid = Grid::new(4, 4, 1.0, 1.0);
    let params = SimulationParams::new(grid, 1, 0.1, 1.0, 1.0);
    let ones = Array2::from_elem((4, 4), 1.0);
    let vs = Array2::from_elem((4, 4), 0.1);
    let model = Model::from_arrays(&HostSpace, &vs, &ones, &ones).unwrap();

    let (v, s, t) = run_to_end(Serial, params, &model, 10.0);

    let mut expected_v = Array2::<Real>::zeros((4, 4));
    expected_v[[1, 1]] = 1.0;
    let mut expected_s = Array2::<Real>::zeros((4, 4));
    expected_s[[1, 1]] = 0.1;
    expected_s[[2, 1]] = -0.1;
    let mut expected_t = Array2::<Real>::zeros((4, 4));
    expected_t[[1, 1]] = 0.1;
    expected_t[[1, 2]] = -0.1;

    assert_eq!(v, expected_v);
    assert_eq!(s, expected_s);
    assert_eq!(t, expected_t);
}

#[test]
fn repeated_runs_are_bit_identical() {
    let (params, model) = layered_case();
    let first = run_to_end(Serial, params, &model, 20.0);
    let second = run_to_end(Serial, params, &model, 20.0);
    assert_eq!(first, second);
}

#[test]
fn threaded_matches_serial_exactly() {
    let (params, model) = layered_case();
    let serial = run_to_end(Serial, params, &model, 20.0);
    let threaded = run_to_end(Threaded::with_threads(3).unwrap(), params, &model, 20.0);
    assert_eq!(serial, threaded);
}

#[test]
fn wave_leaves_the_source_cell() {
    let (params, model) = layered_case();
    let (v, _, _) = run_to_end(Serial, params, &model, 20.0);
    let (iz, ix) = params.grid.cell_of(params.source_z, params.source_x).unwrap();

    assert!(v.iter().all(|x| x.is_finite()));
    let neighbour = v[[iz, ix + 3]].abs() + v[[iz + 3, ix]].abs();
    assert!(neighbour > 0.0, "no energy propagated away from ({iz}, {ix})");
}

#[test]
fn reallocation_starts_from_rest() {
    let (params, model) = layered_case();
    let reference = run_to_end(Serial, params, &model, 20.0);

    let mut sim = WaveSimulator::new(Serial, params);
    sim.make_ricker(20.0).unwrap();
    sim.allocate_internal_data_structures().unwrap();
    sim.run(&model).unwrap();
    sim.clean_internal_data_structures();
    sim.make_ricker(20.0).unwrap();
    sim.allocate_internal_data_structures().unwrap();
    sim.run(&model).unwrap();

    let v = sim.wavefield().unwrap().v.to_array(&HostSpace).unwrap();
    assert_eq!(v, reference.0);
}
