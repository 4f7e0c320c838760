use anyhow::{Context, Result};
use ndarray::Array2;
use plotters::prelude::*;
use std::path::{Path, PathBuf};

use crate::Real;

/// PNG previews of `(nz, nx)` fields, depth increasing downward.
pub struct WavefieldVisualiser {
    output_dir: PathBuf,
    width: u32,
    height: u32,
    annotate: bool,
    gradient: Box<dyn colorgrad::Gradient>,
}

impl WavefieldVisualiser {
    pub fn new(output_dir: &Path, width: u32, height: u32) -> Result<Self> {
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create '{}'", output_dir.display()))?;

        let gradient = Box::new(colorgrad::preset::rd_yl_bu());

        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            width,
            height,
            annotate: true,
            gradient,
        })
    }

    /// Drops caption and axis labels, which need system fonts.
    pub fn without_annotations(mut self) -> Self {
        self.annotate = false;
        self
    }

    /// Wavefields oscillate around zero, so the colour scale is symmetric.
    pub fn plot_wavefield(&self, data: &Array2<Real>, name: &str, time: Real) -> Result<PathBuf> {
        let max_abs = data.iter().map(|v| v.abs()).fold(0.0, Real::max);
        let title = format!("{} at t={:.4}s", name, time);
        self.render(data, name, &title, (-max_abs, max_abs))
    }

    pub fn plot_model(&self, data: &Array2<Real>, name: &str) -> Result<PathBuf> {
        let min_val = data.iter().copied().fold(Real::INFINITY, Real::min);
        let max_val = data.iter().copied().fold(Real::NEG_INFINITY, Real::max);
        self.render(data, name, name, (min_val, max_val))
    }

    fn render(
        &self,
        data: &Array2<Real>,
        name: &str,
        title: &str,
        range: (Real, Real),
    ) -> Result<PathBuf> {
        let filename = self.output_dir.join(format!("{}.png", name));
        self.draw(&filename, data, title, range)?;
        tracing::info!("Saved preview: {}", filename.display());
        Ok(filename)
    }

    fn draw(
        &self,
        path: &Path,
        data: &Array2<Real>,
        title: &str,
        (min_val, max_val): (Real, Real),
    ) -> Result<()> {
        let root = BitMapBackend::new(path, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE)?;

        let (nz, nx) = data.dim();
        let mut builder = ChartBuilder::on(&root);
        builder.margin(10);
        if self.annotate {
            builder
                .caption(title, ("sans-serif", 30))
                .x_label_area_size(40)
                .y_label_area_size(40);
        }
        let mut chart = builder.build_cartesian_2d(0..nx, 0..nz)?;

        if self.annotate {
            chart
                .configure_mesh()
                .disable_mesh()
                .x_desc("X (grid points)")
                .y_desc("Z (grid points, from bottom)")
                .draw()?;
        }

        // Row 0 is the surface; plot it at the top.
        chart.draw_series(data.indexed_iter().map(|((iz, ix), &value)| {
            let row = nz - 1 - iz;
            let color = self.value_to_color(value, min_val, max_val);
            Rectangle::new([(ix, row), (ix + 1, row + 1)], color.filled())
        }))?;

        root.present()?;
        Ok(())
    }

    fn value_to_color(&self, value: Real, min_val: Real, max_val: Real) -> RGBColor {
        let normalized = if max_val > min_val {
            (value - min_val) / (max_val - min_val)
        } else {
            0.5
        };
        let normalized = normalized.clamp(0.0, 1.0);
        let color_rgba = self.gradient.at(normalized).to_rgba8();
        RGBColor(color_rgba[0], color_rgba[1], color_rgba[2])
    }
}
