//! Rejection-rate figures for the block simulation
//!
//! Rows are grouped by (distribution, method, sample size); each group's
//! rejection rate at `alpha` is drawn as a line with a bootstrap 95% band.

use crate::simulation::SweepRow;
use crate::table::Table;
use anyhow::{anyhow, bail, Result};
use plotters::prelude::*;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Bootstrap resamples per interval
pub const BOOTSTRAP_RESAMPLES: usize = 1000;

/// Methods in legend order
pub const METHODS: [&str; 4] = [
    "Average Connectivity",
    "Average Edge Weight",
    "Multivariate Binary",
    "Multivariate Weighted",
];

const COLORS: [RGBColor; 4] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
];

/// Panel title and y-axis label for the standard scenarios
struct Panel {
    distribution: &'static str,
    title: &'static str,
    y_label: &'static str,
}

const PANELS: [Panel; 3] = [
    Panel {
        distribution: "equal",
        title: "Same Distribution",
        y_label: "False Positive Rate",
    },
    Panel {
        distribution: "same_mean",
        title: "Same Mean",
        y_label: "True Positive Rate",
    },
    Panel {
        distribution: "diff_mean",
        title: "Different Mean",
        y_label: "True Positive Rate",
    },
];

/// Name of the preprocessing applied to a sweep row
pub fn method_name(average: bool, binarize: bool) -> &'static str {
    match (average, binarize) {
        (true, true) => METHODS[0],
        (true, false) => METHODS[1],
        (false, true) => METHODS[2],
        (false, false) => METHODS[3],
    }
}

/// Parse a sweep results file back into rows
pub fn read_sweep_rows(path: &Path) -> Result<Vec<SweepRow>> {
    let table = Table::from_file(path)?;
    let binarize = table.bool_column("binarize")?;
    let average = table.bool_column("average")?;
    let distribution = table.column("distribution")?;
    let sample_size = table.parse_column::<usize>("sample_size")?;
    let stat = table.parse_column::<f64>("stat")?;
    let pvalue = table.parse_column::<f64>("pvalue")?;

    Ok((0..table.len())
        .map(|i| SweepRow {
            binarize: binarize[i],
            average: average[i],
            distribution: distribution[i].to_string(),
            sample_size: sample_size[i],
            stat: stat[i],
            pvalue: pvalue[i],
        })
        .collect())
}

/// Rejection rate of one (distribution, method, sample size) group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatePoint {
    pub distribution: String,
    pub method: String,
    pub sample_size: usize,
    pub rate: f64,
    pub lower: f64,
    pub upper: f64,
    pub n: usize,
}

/// Rejection rates (`pvalue < alpha`) with bootstrap 95% intervals
pub fn summarize(rows: &[SweepRow], alpha: f64, resamples: usize, seed: u64) -> Vec<RatePoint> {
    let mut groups: BTreeMap<(String, &'static str, usize), Vec<f64>> = BTreeMap::new();
    for row in rows {
        let key = (
            row.distribution.clone(),
            method_name(row.average, row.binarize),
            row.sample_size,
        );
        let reject = if row.pvalue < alpha { 1.0 } else { 0.0 };
        groups.entry(key).or_default().push(reject);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    groups
        .into_iter()
        .map(|((distribution, method, sample_size), rejects)| {
            let n = rejects.len();
            let rate = rejects.iter().sum::<f64>() / n as f64;
            let (lower, upper) = bootstrap_interval(&rejects, resamples, &mut rng);
            RatePoint {
                distribution,
                method: method.to_string(),
                sample_size,
                rate,
                lower,
                upper,
                n,
            }
        })
        .collect()
}

/// Percentile bootstrap 95% interval of the mean
fn bootstrap_interval<R: Rng>(values: &[f64], resamples: usize, rng: &mut R) -> (f64, f64) {
    let n = values.len();
    if n == 0 || resamples == 0 {
        return (f64::NAN, f64::NAN);
    }

    let mut means: Vec<f64> = (0..resamples)
        .map(|_| (0..n).map(|_| values[rng.gen_range(0..n)]).sum::<f64>() / n as f64)
        .collect();
    means.sort_by(f64::total_cmp);

    let at = |q: f64| means[((q * (resamples - 1) as f64).round() as usize).min(resamples - 1)];
    (at(0.025), at(0.975))
}

/// Distributions to draw, standard scenarios first
fn panel_order(points: &[RatePoint], only: Option<&str>) -> Result<Vec<String>> {
    let mut present: Vec<String> = points.iter().map(|p| p.distribution.clone()).collect();
    present.sort();
    present.dedup();

    if let Some(only) = only {
        if !present.iter().any(|d| d == only) {
            bail!("distribution '{}' not found in results (have {:?})", only, present);
        }
        return Ok(vec![only.to_string()]);
    }

    let mut order: Vec<String> = PANELS
        .iter()
        .map(|p| p.distribution.to_string())
        .filter(|d| present.contains(d))
        .collect();
    let rest: Vec<String> = present.into_iter().filter(|d| !order.contains(d)).collect();
    order.extend(rest);
    Ok(order)
}

fn panel_labels(distribution: &str) -> (String, &'static str) {
    PANELS
        .iter()
        .find(|p| p.distribution == distribution)
        .map(|p| (p.title.to_string(), p.y_label))
        .unwrap_or_else(|| (distribution.to_string(), "Rejection Rate"))
}

/// Draw one panel per distribution side by side into an SVG file
///
/// With `only`, a single panel for that distribution is drawn.
pub fn plot_rates(points: &[RatePoint], path: &Path, only: Option<&str>) -> Result<()> {
    let distributions = panel_order(points, only)?;
    if distributions.is_empty() {
        bail!("no sweep results to plot");
    }

    let (x_min, x_max) = points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p.sample_size as f64), hi.max(p.sample_size as f64))
        });
    let x_range = if x_min < x_max {
        x_min..x_max
    } else {
        (x_min - 1.0)..(x_max + 1.0)
    };

    let width = 420 * distributions.len() as u32;
    let root = SVGBackend::new(path, (width, 460)).into_drawing_area();
    root.fill(&WHITE).map_err(draw_error)?;
    let panels = root.split_evenly((1, distributions.len()));
    let legend_panel = distributions.len() / 2;

    for (index, (area, distribution)) in panels.iter().zip(&distributions).enumerate() {
        let (title, y_label) = panel_labels(distribution);
        let mut chart = ChartBuilder::on(area)
            .caption(&title, ("sans-serif", 20))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(55)
            .build_cartesian_2d(x_range.clone(), -0.05f64..1.05f64)
            .map_err(draw_error)?;

        chart
            .configure_mesh()
            .x_desc("Sample Size")
            .y_desc(y_label)
            .draw()
            .map_err(draw_error)?;

        for (method, color) in METHODS.iter().zip(COLORS) {
            let series: Vec<&RatePoint> = points
                .iter()
                .filter(|p| &p.distribution == distribution && p.method == *method)
                .collect();
            if series.is_empty() {
                continue;
            }

            let band: Vec<(f64, f64)> = series
                .iter()
                .map(|p| (p.sample_size as f64, p.upper))
                .chain(series.iter().rev().map(|p| (p.sample_size as f64, p.lower)))
                .filter(|(_, y)| y.is_finite())
                .collect();
            chart
                .draw_series(std::iter::once(Polygon::new(band, color.mix(0.2).filled())))
                .map_err(draw_error)?;

            let line = series.iter().map(|p| (p.sample_size as f64, p.rate));
            let drawn = chart
                .draw_series(LineSeries::new(line, color.stroke_width(2)))
                .map_err(draw_error)?;
            if index == legend_panel {
                drawn
                    .label(*method)
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
            }
        }

        if index == legend_panel {
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperLeft)
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()
                .map_err(draw_error)?;
        }
    }

    root.present().map_err(draw_error)?;
    info!(path = %path.display(), panels = distributions.len(), "wrote figure");
    Ok(())
}

fn draw_error<E: std::fmt::Display>(e: E) -> anyhow::Error {
    anyhow!("failed to draw figure: {}", e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn row(distribution: &str, binarize: bool, average: bool, n: usize, pvalue: f64) -> SweepRow {
        SweepRow {
            binarize,
            average,
            distribution: distribution.to_string(),
            sample_size: n,
            stat: 0.1,
            pvalue,
        }
    }

    #[test]
    fn test_method_names() {
        assert_eq!(method_name(true, true), "Average Connectivity");
        assert_eq!(method_name(true, false), "Average Edge Weight");
        assert_eq!(method_name(false, true), "Multivariate Binary");
        assert_eq!(method_name(false, false), "Multivariate Weighted");
    }

    #[test]
    fn test_summarize_rates() {
        let rows = vec![
            row("equal", true, true, 20, 0.01),
            row("equal", true, true, 20, 0.5),
            row("equal", true, true, 20, 0.04),
            row("equal", true, true, 20, 0.05),
            row("equal", false, false, 20, 0.001),
        ];
        let points = summarize(&rows, 0.05, 200, 0);
        assert_eq!(points.len(), 2);
        let ac = points.iter().find(|p| p.method == "Average Connectivity").unwrap();
        assert_eq!(ac.rate, 0.5);
        assert_eq!(ac.n, 4);
        assert!(ac.lower <= ac.rate && ac.rate <= ac.upper);
        let mw = points.iter().find(|p| p.method == "Multivariate Weighted").unwrap();
        assert_eq!((mw.lower, mw.rate, mw.upper), (1.0, 1.0, 1.0));
    }

    #[test]
    fn test_panel_order() {
        let points: Vec<RatePoint> = summarize(
            &[
                row("diff_mean", true, true, 10, 0.01),
                row("custom", true, true, 10, 0.01),
                row("equal", true, true, 10, 0.01),
            ],
            0.05,
            10,
            0,
        );
        assert_eq!(panel_order(&points, None).unwrap(), vec!["equal", "diff_mean", "custom"]);
        assert_eq!(panel_order(&points, Some("custom")).unwrap(), vec!["custom"]);
        assert!(panel_order(&points, Some("missing")).is_err());
    }

    #[test]
    fn test_read_sweep_rows() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sweep.csv");
        std::fs::write(
            &path,
            "binarize,average,distribution,sample_size,stat,pvalue\nTrue,False,equal,20,nan,1.0\n",
        )
        .unwrap();
        let rows = read_sweep_rows(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].binarize && !rows[0].average);
        assert!(rows[0].stat.is_nan());
    }

    #[test]
    fn test_plot_writes_svg() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("fig.svg");
        let mut rows = Vec::new();
        for dist in ["equal", "same_mean", "diff_mean"] {
            for n in [20, 40] {
                for (b, a) in [(true, true), (false, false)] {
                    rows.push(row(dist, b, a, n, 0.01));
                    rows.push(row(dist, b, a, n, 0.5));
                }
            }
        }
        let points = summarize(&rows, 0.05, 50, 1);
        plot_rates(&points, &path, None).unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Same Mean"));
    }
}
