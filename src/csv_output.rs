//! CSV output for sweep results, vertex statistics and comparison tables
//!
//! Booleans are written as `True`/`False` and NaN as `nan` so the files load
//! unchanged in pandas-based tooling.

use crate::compare::MergedRow;
use crate::simulation::SweepRow;
use ndarray::Array2;
use std::io::{self, Write};

/// Header of the block-simulation results file
pub const SWEEP_HEADER: &str = "binarize,average,distribution,sample_size,stat,pvalue";

/// Header of the vertex-wise test results file
pub const VERTEX_HEADER: &str = "ROI,stat,pval";

/// Header of the merged comparison file
pub const COMPARISON_HEADER: &str =
    "ROI,nonpar_stat,nonpar_pvalue,nonpar_holm,par_pvalue,par_holm";

/// Escape CSV field (handle commas, quotes, newlines)
pub fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub fn format_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

/// Float formatting: `nan`, `inf`, integral values keep one decimal
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "inf" } else { "-inf" }.to_string()
    } else if value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

fn format_optional(value: Option<f64>) -> String {
    value.map(format_float).unwrap_or_default()
}

/// Format a sweep row as CSV
pub fn format_sweep_row(row: &SweepRow) -> String {
    [
        format_bool(row.binarize).to_string(),
        format_bool(row.average).to_string(),
        escape_field(&row.distribution),
        row.sample_size.to_string(),
        format_float(row.stat),
        format_float(row.pvalue),
    ]
    .join(",")
}

/// Write the sweep results with header
pub fn write_sweep_csv<W: Write>(writer: &mut W, rows: &[SweepRow]) -> io::Result<()> {
    writeln!(writer, "{}", SWEEP_HEADER)?;
    for row in rows {
        writeln!(writer, "{}", format_sweep_row(row))?;
    }
    writer.flush()
}

/// Streams one vertex result per line so partial runs keep their output
#[derive(Debug)]
pub struct VertexCsvWriter<W: Write> {
    writer: W,
    rows: usize,
}

impl<W: Write> VertexCsvWriter<W> {
    /// Create the writer and emit the header
    pub fn new(mut writer: W) -> io::Result<Self> {
        writeln!(writer, "{}", VERTEX_HEADER)?;
        Ok(Self { writer, rows: 0 })
    }

    pub fn write_row(&mut self, roi: usize, stat: f64, pval: f64) -> io::Result<()> {
        writeln!(
            self.writer,
            "{},{},{}",
            roi,
            format_float(stat),
            format_float(pval)
        )?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows_written(&self) -> usize {
        self.rows
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.writer
    }
}

/// Tab-separated label matrix with block names on both axes
///
/// The header starts with an empty corner cell; values use one decimal.
pub fn format_label_matrix(names: &[String], matrix: &Array2<f64>) -> String {
    let mut output = String::new();
    for name in names {
        output.push('\t');
        output.push_str(name);
    }
    output.push('\n');

    for (name, row) in names.iter().zip(matrix.rows()) {
        output.push_str(name);
        for value in row {
            output.push('\t');
            output.push_str(&format!("{:.1}", value));
        }
        output.push('\n');
    }

    output
}

/// Merged nonparametric/parametric table, one row per ROI
pub fn write_comparison_csv<W: Write>(writer: &mut W, rows: &[MergedRow]) -> io::Result<()> {
    writeln!(writer, "{}", COMPARISON_HEADER)?;
    for row in rows {
        writeln!(
            writer,
            "{},{},{},{},{},{}",
            escape_field(&row.roi),
            format_optional(row.nonpar_stat),
            format_optional(row.nonpar_pvalue),
            format_optional(row.nonpar_holm),
            format_optional(row.par_pvalue),
            format_optional(row.par_holm),
        )?;
    }
    writer.flush()
}
