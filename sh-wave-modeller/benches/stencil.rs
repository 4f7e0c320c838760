use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array2;
use sh_wave_modeller::{
    ComputeBackend, FieldState, HostSpace, Model, Real, Serial, StencilCoefficients, Threaded,
};

const SHAPE: (usize, usize) = (400, 1000);

fn prior_state() -> (FieldState<HostSpace>, FieldState<HostSpace>) {
    let ramp = Array2::from_shape_fn(SHAPE, |(iz, ix)| ((iz * 7 + ix * 3) % 11) as Real * 1e-3);
    let old = FieldState::from_host(&HostSpace, &ramp, &ramp, &ramp).unwrap();
    let new = FieldState::zeros(&HostSpace, SHAPE.0, SHAPE.1).unwrap();
    (new, old)
}

fn time_step<B: ComputeBackend<Memory = HostSpace>>(
    backend: &B,
    new: &mut FieldState<HostSpace>,
    old: &FieldState<HostSpace>,
    model: &Model<HostSpace>,
    coeffs: StencilCoefficients,
) {
    backend.velocity_update(new, old, model, coeffs).unwrap();
    backend.stress_update(new, old, model, coeffs).unwrap();
}

fn bench_time_step(c: &mut Criterion) {
    let model = Model::layered(&HostSpace, SHAPE.0, SHAPE.1, 2000.0, 2400.0, &[]).unwrap();
    let coeffs = StencilCoefficients::new(0.0002, 2.5, 2.5);
    let threaded = Threaded::new().unwrap();

    let mut group = c.benchmark_group("time_step");
    group.sample_size(20);

    let (mut new, old) = prior_state();
    group.bench_function(BenchmarkId::new("serial", "400x1000"), |b| {
        b.iter(|| time_step(&Serial, &mut new, black_box(&old), &model, coeffs))
    });

    let (mut new, old) = prior_state();
    group.bench_function(
        BenchmarkId::new(format!("threaded/{}", threaded.threads()), "400x1000"),
        |b| b.iter(|| time_step(&threaded, &mut new, black_box(&old), &model, coeffs)),
    );

    group.finish();
}

criterion_group!(benches, bench_time_step);
criterion_main!(benches);
