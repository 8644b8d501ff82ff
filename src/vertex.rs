//! Vertex-wise nonparametric MANOVA on an omnibus embedding
//!
//! For each vertex, the latent positions of that vertex in every graph are
//! grouped by label and compared with the K-sample test. Rows are written as
//! soon as they are computed.

use crate::csv_output::VertexCsvWriter;
use crate::ksample::{KSample, KSampleResult};
use crate::progress::progress_bar;
use anyhow::{bail, Context, Result};
use ndarray::{s, Array2, Array3};
use std::io::Write;
use tracing::info;

/// Permutations per vertex unless overridden
pub const DEFAULT_VERTEX_REPS: usize = 100_000;

/// Latent positions of `vertex`, one group per sorted unique label
pub fn vertex_groups<L: Ord + Clone>(
    vertex: usize,
    embedding: &Array3<f64>,
    labels: &[L],
) -> Result<Vec<Array2<f64>>> {
    let (n_graphs, n_vertices, _) = embedding.dim();
    if labels.len() != n_graphs {
        bail!("{} labels for {} embedded graphs", labels.len(), n_graphs);
    }
    if vertex >= n_vertices {
        bail!("vertex {} out of range for {} vertices", vertex, n_vertices);
    }

    let mut unique: Vec<L> = labels.to_vec();
    unique.sort();
    unique.dedup();

    Ok(unique
        .iter()
        .map(|group| {
            let rows: Vec<usize> = labels
                .iter()
                .enumerate()
                .filter(|(_, label)| *label == group)
                .map(|(g, _)| g)
                .collect();
            let mut samples = Array2::zeros((rows.len(), embedding.dim().2));
            for (dst, &g) in rows.iter().enumerate() {
                samples.row_mut(dst).assign(&embedding.slice(s![g, vertex, ..]));
            }
            samples
        })
        .collect())
}

/// K-sample test of `vertex` across label groups
pub fn vertex_pval<L: Ord + Clone>(
    vertex: usize,
    embedding: &Array3<f64>,
    labels: &[L],
    test: &KSample,
) -> Result<KSampleResult> {
    let groups = vertex_groups(vertex, embedding, labels)?;
    test.test(&groups)
        .with_context(|| format!("K-sample test failed for vertex {}", vertex))
}

/// Test every vertex in order, streaming `ROI,stat,pval` rows to `writer`
pub fn run_vertex_tests<L: Ord + Clone, W: Write>(
    embedding: &Array3<f64>,
    labels: &[L],
    test: &KSample,
    writer: W,
    quiet: bool,
) -> Result<usize> {
    let n_vertices = embedding.dim().1;
    info!(
        vertices = n_vertices,
        test = %test.kind(),
        reps = test.reps(),
        "running vertex-wise tests"
    );

    let mut csv = VertexCsvWriter::new(writer).context("Failed to write header")?;
    let pb = progress_bar(n_vertices, quiet);
    for vertex in 0..n_vertices {
        let result = vertex_pval(vertex, embedding, labels, test)?;
        csv.write_row(vertex, result.statistic, result.pvalue)
            .with_context(|| format!("Failed to write row for vertex {}", vertex))?;
        pb.inc(1);
    }
    pb.finish_and_clear();

    Ok(csv.rows_written())
}
