//! End-to-end scenario: model setup, CFL check, time loop and output, as
//! driven by the command-line tool.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::backend::ComputeBackend;
use crate::config::Config;
use crate::model::Model;
use crate::simulation::{RunSummary, WaveSimulator};
use crate::snapshot;
use crate::visualisation::WavefieldVisualiser;
use crate::Real;

const PREVIEW_SIZE: (u32, u32) = (1200, 600);

/// What a finished scenario produced.
#[derive(Debug)]
pub struct ScenarioReport {
    pub cfl: Real,
    pub summary: RunSummary,
    pub snapshots: Vec<PathBuf>,
    pub previews: Vec<PathBuf>,
}

/// Runs `config` on `backend` and writes the snapshots.
///
/// A CFL violation fails before any field is allocated. A kernel failure
/// fails without writing output.
pub fn run_scenario<B: ComputeBackend>(backend: B, config: &Config) -> Result<ScenarioReport> {
    let grid = config.grid();
    let mut sim = WaveSimulator::new(backend, config.simulation_params());
    let model = Model::layered(
        sim.backend().memory(),
        grid.nz,
        grid.nx,
        config.model.vs,
        config.model.rho,
        &config.reflectors(),
    )?;

    let cfl = sim.check_cfl_condition(&model)?;
    sim.make_ricker(config.source.fpeak)?;
    sim.allocate_internal_data_structures()?;
    let summary = sim
        .run(&model)
        .with_context(|| format!("simulation on the {} backend aborted", sim.backend().name()))?;

    let dir = &config.output.directory;
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory '{}'", dir.display()))?;

    let fields = sim.wavefield().context("wavefield missing after a finished run")?;
    let space = sim.backend().memory();
    let snapshots = snapshot::store_all(dir, fields, &model, space);
    tracing::info!("{} snapshot(s) written to {}", snapshots.len(), dir.display());

    let mut previews = Vec::new();
    if config.output.preview {
        let time = summary.steps as Real * config.time.dt;
        let vis = WavefieldVisualiser::new(dir, PREVIEW_SIZE.0, PREVIEW_SIZE.1)?;
        let wavefields = [("V", &fields.v), ("S", &fields.s), ("T", &fields.t)];
        for (name, field) in wavefields {
            match vis.plot_wavefield(&field.to_array(space)?, name, time) {
                Ok(path) => previews.push(path),
                Err(err) => tracing::warn!("Preview of {} failed: {:#}", name, err),
            }
        }
        let parameters = [("Vs", &model.vs), ("L", &model.l), ("M", &model.m)];
        for (name, field) in parameters {
            match vis.plot_model(&field.to_array(space)?, name) {
                Ok(path) => previews.push(path),
                Err(err) => tracing::warn!("Preview of {} failed: {:#}", name, err),
            }
        }
    }

    sim.clean_internal_data_structures();
    Ok(ScenarioReport {
        cfl,
        summary,
        snapshots,
        previews,
    })
}
