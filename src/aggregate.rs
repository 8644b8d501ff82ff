//! Block aggregation of connectome edge weights
//!
//! Sums edge weights between every pair of anatomical blocks, averages the
//! sums over the replicates of each label and writes one tab-separated
//! matrix per label (the table format expected by Circos tableviewer).

use crate::csv_output::format_label_matrix;
use crate::dataset::{Block, Connectome};
use anyhow::{bail, Context, Result};
use ndarray::{s, Array2};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Sum of edge weights within and between blocks
///
/// For every block pair `b1 <= b2` the sum over rows of `b1` and columns of
/// `b2` is stored at both `[b1, b2]` and `[b2, b1]`, so the result is
/// symmetric even for a directed graph.
///
/// # Example
/// ```
/// use connectome_ksample::aggregate::aggregate;
/// use connectome_ksample::dataset::Block;
/// use ndarray::array;
///
/// let graph = array![[0.0, 1.0, 2.0], [1.0, 0.0, 3.0], [2.0, 3.0, 0.0]];
/// let blocks = vec![Block::new("a", "left", 0, 2), Block::new("b", "left", 2, 3)];
/// let agg = aggregate(&graph, &blocks);
/// assert_eq!(agg[[0, 0]], 2.0);
/// assert_eq!(agg[[0, 1]], 5.0);
/// assert_eq!(agg[[1, 0]], 5.0);
/// ```
pub fn aggregate(graph: &Array2<f64>, blocks: &[Block]) -> Array2<f64> {
    let n = blocks.len();
    let mut agg = Array2::zeros((n, n));

    for (i, b1) in blocks.iter().enumerate() {
        for (j, b2) in blocks.iter().enumerate().skip(i) {
            let total = graph.slice(s![b1.start..b1.end, b2.start..b2.end]).sum();
            agg[[i, j]] = total;
            agg[[j, i]] = total;
        }
    }

    agg
}

/// Average block matrix per label
///
/// Graphs are aggregated and summed per label, then divided by `replicates`
/// (default: the number of graphs carrying the label) and rounded half to
/// even.
pub fn aggregate_by_label(
    connectome: &Connectome,
    replicates: Option<usize>,
) -> Result<BTreeMap<String, Array2<f64>>> {
    if replicates == Some(0) {
        bail!("replicate count must be positive");
    }

    let mut sums: BTreeMap<String, Array2<f64>> = BTreeMap::new();
    for (graph, label) in connectome.graphs.iter().zip(&connectome.labels) {
        let agg = aggregate(graph, &connectome.blocks);
        match sums.get_mut(label) {
            Some(total) => *total += &agg,
            None => {
                sums.insert(label.clone(), agg);
            }
        }
    }

    Ok(sums
        .into_iter()
        .map(|(label, total)| {
            let divisor = replicates.unwrap_or_else(|| connectome.count_label(&label)) as f64;
            let averaged = total.mapv(|v| (v / divisor).round_ties_even());
            (label, averaged)
        })
        .collect())
}

/// `"{block}_{hemisphere}"` for each block
pub fn block_names(blocks: &[Block]) -> Vec<String> {
    blocks
        .iter()
        .map(|b| format!("{}_{}", b.name, b.hemisphere))
        .collect()
}

/// `"Caudate Putamen (LEFT)"` style names for figure labels
pub fn pretty_block_names(blocks: &[Block]) -> Vec<String> {
    blocks
        .iter()
        .map(|b| format!("{} ({})", fix_structure_name(&b.name), b.hemisphere.to_uppercase()))
        .collect()
}

/// Human-readable structure name: `"caudate_putamen"` -> `"Caudate Putamen"`
pub fn fix_structure_name(name: &str) -> String {
    name.split('_')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Write one `<label>.csv` per label into `dir`, returning the written paths
pub fn write_label_matrices(
    dir: &Path,
    names: &[String],
    matrices: &BTreeMap<String, Array2<f64>>,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut written = Vec::with_capacity(matrices.len());
    for (label, matrix) in matrices {
        let path = dir.join(format!("{}.csv", label));
        fs::write(&path, format_label_matrix(names, matrix))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(label = %label, path = %path.display(), "wrote block matrix");
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Atlas;
    use ndarray::array;
    use tempfile::TempDir;

    fn blocks() -> Vec<Block> {
        vec![
            Block::new("front", "left", 0, 2),
            Block::new("back", "right", 2, 4),
        ]
    }

    #[test]
    fn test_aggregate_directed_graph_is_symmetric() {
        let graph = array![
            [0.0, 1.0, 2.0, 0.0],
            [0.0, 0.0, 0.0, 5.0],
            [9.0, 0.0, 0.0, 1.0],
            [0.0, 0.0, 0.0, 0.0]
        ];
        let agg = aggregate(&graph, &blocks());
        assert_eq!(agg, agg.t());
        assert_eq!(agg[[0, 0]], 1.0);
        // upper block pair wins: rows 0..2, cols 2..4
        assert_eq!(agg[[1, 0]], 7.0);
        assert_eq!(agg[[1, 1]], 1.0);
    }

    #[test]
    fn test_aggregate_by_label_rounds_half_even() {
        let g1 = Array2::from_elem((4, 4), 0.25);
        let g2 = Array2::from_elem((4, 4), 0.625);
        let connectome = Connectome::new(
            vec![g1.clone(), g1, g2],
            vec!["a".into(), "a".into(), "b".into()],
            Atlas::default(),
            blocks(),
        )
        .unwrap();

        // each block pair covers 4 cells
        let by_label = aggregate_by_label(&connectome, None).unwrap();
        assert_eq!(by_label["a"][[0, 1]], 1.0);
        // 2.5 rounds to 2
        assert_eq!(by_label["b"][[0, 0]], 2.0);

        let by_label = aggregate_by_label(&connectome, Some(4)).unwrap();
        // 0.5 rounds to 0, 0.625 to 1
        assert_eq!(by_label["a"][[0, 0]], 0.0);
        assert_eq!(by_label["b"][[1, 1]], 1.0);

        assert!(aggregate_by_label(&connectome, Some(0)).is_err());
    }

    #[test]
    fn test_block_names() {
        assert_eq!(block_names(&blocks()), vec!["front_left", "back_right"]);
        assert_eq!(
            pretty_block_names(&[Block::new("caudate_putamen", "left", 0, 1)]),
            vec!["Caudate Putamen (LEFT)"]
        );
    }

    #[test]
    fn test_fix_structure_name() {
        assert_eq!(fix_structure_name("caudate_putamen"), "Caudate Putamen");
        assert_eq!(fix_structure_name("CORTEX"), "Cortex");
        assert_eq!(fix_structure_name("a__b"), "A  B");
    }

    #[test]
    fn test_write_label_matrices() {
        let tmp = TempDir::new().unwrap();
        let mut matrices = BTreeMap::new();
        matrices.insert("B6".to_string(), array![[1.0, 2.0], [2.0, 3.0]]);
        let names = block_names(&blocks());
        let written = write_label_matrices(tmp.path(), &names, &matrices).unwrap();
        assert_eq!(written.len(), 1);
        let text = fs::read_to_string(&written[0]).unwrap();
        assert!(text.starts_with("\tfront_left\tback_right\n"));
        assert!(text.contains("back_right\t2.0\t3.0"));
    }
}
