use std::fs;
use std::path::PathBuf;

use apogee_control::export::telemetry::{self, Row};
use clap::Parser;
use plotters::prelude::*;

/// Plot altitude, apogee estimates and airbrake deployment from a telemetry CSV.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Render altitude and apogee predictions from simulate telemetry"
)]
struct Cli {
    #[arg(long)]
    input: PathBuf,
    #[arg(long, default_value = "artifacts/flight.png")]
    output: PathBuf,
    /// Draw a horizontal line at this apogee target (m)
    #[arg(long)]
    target: Option<f64>,
    #[arg(long, default_value_t = 1200)]
    width: u32,
    #[arg(long, default_value_t = 900)]
    height: u32,
    /// Skip captions and axis labels (no font lookup)
    #[arg(long, default_value_t = false)]
    bare: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let rows = telemetry::read_rows(&cli.input)?;
    if rows.is_empty() {
        return Err(anyhow::anyhow!("Telemetry CSV contains no rows"));
    }

    let t_max = rows.last().map(|r| r.time_s).unwrap_or(1.0).max(1.0e-3);
    let mut y_max = rows
        .iter()
        .flat_map(|r| [Some(r.altitude_m), r.best_effort_m, r.strict_m])
        .flatten()
        .filter(|v| v.is_finite())
        .fold(0.0_f64, f64::max);
    if let Some(target) = cli.target {
        y_max = y_max.max(target);
    }
    let y_min = rows
        .iter()
        .map(|r| r.altitude_m)
        .fold(f64::INFINITY, f64::min)
        .min(0.0);
    let y_max = y_max * 1.05 + 1.0;

    if let Some(parent) = cli.output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let output_str = cli
        .output
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Output path contains invalid UTF-8"))?;
    let root = BitMapBackend::new(output_str, (cli.width, cli.height)).into_drawing_area();
    root.fill(&WHITE)?;
    let (upper, lower) = root.split_vertically((cli.height as f64 * 0.72) as i32);

    {
        let mut builder = ChartBuilder::on(&upper);
        builder.margin(20);
        if !cli.bare {
            builder
                .caption("Altitude and apogee estimates", ("sans-serif", 24))
                .x_label_area_size(40)
                .y_label_area_size(70);
        }
        let mut chart = builder.build_cartesian_2d(0.0..t_max, y_min..y_max)?;
        if !cli.bare {
            chart
                .configure_mesh()
                .x_desc("Time [s]")
                .y_desc("Altitude [m]")
                .draw()?;
        }

        chart.draw_series(LineSeries::new(
            rows.iter().map(|r| (r.time_s, r.altitude_m)),
            ShapeStyle::from(&BLUE).stroke_width(2),
        ))?;
        chart.draw_series(estimate_points(&rows, |r| r.best_effort_m, RGBColor(230, 140, 30)))?;
        chart.draw_series(estimate_points(&rows, |r| r.strict_m, RGBColor(30, 150, 60)))?;
        if let Some(target) = cli.target {
            chart.draw_series(std::iter::once(PathElement::new(
                vec![(0.0, target), (t_max, target)],
                ShapeStyle::from(&RED.mix(0.6)).stroke_width(1),
            )))?;
        }
    }

    {
        let mut builder = ChartBuilder::on(&lower);
        builder.margin(20);
        if !cli.bare {
            builder.x_label_area_size(40).y_label_area_size(70);
        }
        let mut chart = builder.build_cartesian_2d(0.0..t_max, 0.0..1.05)?;
        if !cli.bare {
            chart
                .configure_mesh()
                .x_desc("Time [s]")
                .y_desc("Deployment")
                .y_labels(3)
                .draw()?;
        }
        chart.draw_series(LineSeries::new(
            rows.iter().map(|r| (r.time_s, r.deployment)),
            ShapeStyle::from(&BLACK).stroke_width(2),
        ))?;
    }

    root.present()?;
    Ok(())
}

fn estimate_points<'a>(
    rows: &'a [Row],
    select: impl Fn(&Row) -> Option<f64> + 'a,
    color: RGBColor,
) -> impl Iterator<Item = Circle<(f64, f64), i32>> + 'a {
    rows.iter()
        .filter_map(move |r| select(r).filter(|v| v.is_finite()).map(|v| (r.time_s, v)))
        .map(move |point| Circle::new(point, 1, color.filled()))
}
