use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::grid::Grid;
use crate::model::Reflector;
use crate::simulation::{SimulationParams, DEFAULT_REPORT_INTERVAL};
use crate::Real;

/// Grid configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub nz: usize,
    pub nx: usize,
    pub dz: Real,
    pub dx: Real,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            nz: 400,
            nx: 1000,
            dz: 2.5,
            dx: 2.5,
        }
    }
}

impl GridConfig {
    fn validate(&self) -> Result<()> {
        if self.nx == 0 || self.nz == 0 {
            return Err(anyhow!("Grid dimensions must be positive (nz={}, nx={})", self.nz, self.nx));
        }
        if !(self.dx > 0.0 && self.dz > 0.0) {
            return Err(anyhow!(
                "Grid spacing must be positive (dz={}, dx={})",
                self.dz,
                self.dx
            ));
        }
        Ok(())
    }
}

/// Time stepping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    pub nt: usize,
    pub dt: Real,
    pub report_interval: usize, // 0 disables progress logging
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            nt: 2251,
            dt: 0.0002,
            report_interval: DEFAULT_REPORT_INTERVAL,
        }
    }
}

impl TimeConfig {
    fn validate(&self) -> Result<()> {
        if self.nt == 0 {
            return Err(anyhow!("nt must be positive"));
        }
        if !(self.dt > 0.0) {
            return Err(anyhow!("dt must be positive, got {}", self.dt));
        }
        Ok(())
    }
}

/// Point source with a Ricker time function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub z: Real,     // Depth (meters)
    pub x: Real,     // Horizontal position (meters)
    pub fpeak: Real, // Peak frequency (Hz)
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            z: 50.0,
            x: 1250.0,
            fpeak: 20.0,
        }
    }
}

impl SourceConfig {
    fn validate(&self, grid: &Grid) -> Result<()> {
        match grid.cell_of(self.z, self.x) {
            Some((iz, ix)) if grid.in_bounds(iz, ix) => {}
            _ => {
                let (depth, width) = grid.extent();
                return Err(anyhow!(
                    "Source position (z={}, x={}) is outside the {:.1} x {:.1} m grid",
                    self.z,
                    self.x,
                    depth,
                    width
                ));
            }
        }
        if !(self.fpeak > 0.0) {
            return Err(anyhow!("Source frequency must be positive, got {}", self.fpeak));
        }
        Ok(())
    }
}

/// Density contrast on the row `trunc(row_fraction * nz)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectorConfig {
    pub row_fraction: Real,
    pub density_scale: Real,
}

impl ReflectorConfig {
    fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.row_fraction) {
            return Err(anyhow!("row_fraction must be in [0, 1), got {}", self.row_fraction));
        }
        if !(self.density_scale > 0.0) {
            return Err(anyhow!("density_scale must be positive, got {}", self.density_scale));
        }
        Ok(())
    }

    pub fn row(&self, nz: usize) -> usize {
        (f64::from(self.row_fraction) * nz as f64) as usize
    }
}

/// Homogeneous background with optional reflectors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub vs: Real,  // S-wave velocity (m/s)
    pub rho: Real, // Density (kg/m³)
    pub reflectors: Vec<ReflectorConfig>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            vs: 2000.0,
            rho: 2400.0,
            reflectors: vec![
                ReflectorConfig {
                    row_fraction: 0.5,
                    density_scale: 0.5,
                },
                ReflectorConfig {
                    row_fraction: 2.0 / 3.0,
                    density_scale: 2.0,
                },
            ],
        }
    }
}

impl ModelConfig {
    fn validate(&self) -> Result<()> {
        if !(self.vs > 0.0 && self.rho > 0.0) {
            return Err(anyhow!(
                "Material properties must be positive (vs={}, rho={})",
                self.vs,
                self.rho
            ));
        }
        for reflector in &self.reflectors {
            reflector.validate()?;
        }
        Ok(())
    }
}

/// Where results go
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub preview: bool, // Also render PNG images of the final fields
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("output"),
            preview: false,
        }
    }
}

/// Complete scenario. Every section and field is optional in TOML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub grid: GridConfig,
    pub time: TimeConfig,
    pub source: SourceConfig,
    pub model: ModelConfig,
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config file '{}': {}", path.display(), e))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| anyhow!("Failed to parse TOML config: {}", e))?;

        config.validate()?;

        Ok(config)
    }

    /// Built-in scenario when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                tracing::info!("no scenario file given, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<()> {
        self.grid.validate()?;
        self.time.validate()?;
        self.model.validate()?;
        self.source.validate(&self.grid())?;
        Ok(())
    }

    pub fn grid(&self) -> Grid {
        Grid::new(self.grid.nz, self.grid.nx, self.grid.dz, self.grid.dx)
    }

    pub fn simulation_params(&self) -> SimulationParams {
        SimulationParams {
            report_interval: self.time.report_interval,
            ..SimulationParams::new(
                self.grid(),
                self.time.nt,
                self.time.dt,
                self.source.z,
                self.source.x,
            )
        }
    }

    pub fn reflectors(&self) -> Vec<Reflector> {
        self.model
            .reflectors
            .iter()
            .map(|r| Reflector {
                row: r.row(self.grid.nz),
                density_scale: r.density_scale,
            })
            .collect()
    }

    /// Log configuration summary
    pub fn log_summary(&self) {
        let grid = self.grid();
        let (depth, width) = grid.extent();
        tracing::info!("Grid: {}x{} ({} x {} m)", grid.nz, grid.nx, depth, width);
        tracing::info!(
            "Model: Vs={} m/s, rho={} kg/m³, {} reflector(s)",
            self.model.vs,
            self.model.rho,
            self.model.reflectors.len()
        );
        for (reflector, cfg) in self.reflectors().iter().zip(&self.model.reflectors) {
            tracing::info!("  Reflector at row {}: density x{}", reflector.row, cfg.density_scale);
        }
        tracing::info!(
            "Time: dt={} s, nt={}, total_time={} s",
            self.time.dt,
            self.time.nt,
            self.time.nt as Real * self.time.dt
        );
        tracing::info!(
            "Source: position (z={}, x={}) m, fpeak={} Hz",
            self.source.z,
            self.source.x,
            self.source.fpeak
        );
        tracing::info!("Output: {}", self.output.directory.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"
[grid]
nz = 40
nx = 100
dz = 5.0
dx = 5.0

[time]
nt = 300
dt = 0.001
report_interval = 50

[source]
z = 20.0
x = 250.0
fpeak = 15.0

[model]
vs = 1500.0
rho = 2000.0

[[model.reflectors]]
row_fraction = 0.25
density_scale = 3.0

[output]
directory = "runs/small"
preview = true
"#;

    #[test]
    fn defaults_reproduce_reference_scenario() {
        let config = Config::default();
        config.validate().unwrap();

        let params = config.simulation_params();
        assert_eq!(params.grid, Grid::new(400, 1000, 2.5, 2.5));
        assert_eq!(params.nt, 2251);
        assert_eq!(params.dt, 0.0002);
        assert_eq!(params.grid.cell_of(params.source_z, params.source_x), Some((20, 500)));

        let rows: Vec<usize> = config.reflectors().iter().map(|r| r.row).collect();
        assert_eq!(rows, vec![200, 266]);
    }

    #[test]
    fn source_error_names_grid_extent() {
        let mut config = Config::default();
        config.source.x = 5000.0;
        let message = config.validate().unwrap_err().to_string();
        assert!(message.contains("1000.0 x 2500.0 m"), "{message}");
    }

    #[test]
    fn parses_full_scenario() {
        let config: Config = toml::from_str(SCENARIO).unwrap();
        config.validate().unwrap();

        assert_eq!(config.grid.nx, 100);
        assert_eq!(config.time.report_interval, 50);
        assert_eq!(config.source.fpeak, 15.0);
        assert_eq!(config.output.directory, PathBuf::from("runs/small"));
        assert!(config.output.preview);
        assert_eq!(
            config.reflectors(),
            vec![Reflector {
                row: 10,
                density_scale: 3.0
            }]
        );
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config: Config = toml::from_str("[time]\nnt = 10\n").unwrap();
        assert_eq!(config.time.nt, 10);
        assert_eq!(config.time.dt, TimeConfig::default().dt);
        assert_eq!(config.grid, GridConfig::default());
        assert_eq!(config.model.reflectors.len(), 2);
    }

    #[test]
    fn rejects_invalid_values() {
        let mut config = Config::default();
        config.grid.nx = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.time.dt = -1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.source.x = 1e6;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.source.z = -5.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.model.reflectors[0].row_fraction = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn from_file_reads_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenario.toml");
        fs::write(&path, SCENARIO).unwrap();
        assert_eq!(Config::from_file(&path).unwrap().grid.nz, 40);

        fs::write(&path, "[grid]\nnz = 0\n").unwrap();
        assert!(Config::from_file(&path).is_err());

        assert!(Config::from_file(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn load_without_path_uses_defaults() {
        assert_eq!(Config::load(None).unwrap(), Config::default());
    }
}
