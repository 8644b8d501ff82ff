//! Nonparametric vs. parametric vertex significance
//!
//! Both result sets are sorted by p-value, Holm-adjusted, mapped to atlas
//! structure names and thresholded; the report lists each significant set
//! and the structures they share.

use crate::correction::holm;
use crate::dataset::{Atlas, HEMISPHERE_SIZE};
use crate::table::Table;
use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::Path;

/// Family-wise error level for the significant sets
pub const DEFAULT_ALPHA: f64 = 0.05;

/// `"{structure} ({hemisphere})"` for a 0-based vertex index
///
/// Vertices `0..166` are the left hemisphere, the next 166 the right; both
/// map onto atlas ROI `index % 166 + 1`.
pub fn lookup_roi_name(index: usize, atlas: &Atlas) -> Result<String> {
    let hemisphere = if index / HEMISPHERE_SIZE >= 1 { "R" } else { "L" };
    let roi = index % HEMISPHERE_SIZE + 1;
    let structure = atlas
        .structure(roi)
        .ok_or_else(|| anyhow!("ROI {} (vertex {}) not found in atlas", roi, index))?;
    Ok(format!("{} ({})", structure, hemisphere))
}

/// One row of a vertex results file, with a 0-based ROI index
#[derive(Debug, Clone, PartialEq)]
pub struct VertexResult {
    pub roi: usize,
    pub statistic: Option<f64>,
    pub pvalue: f64,
}

/// Read `ROI,stat,pval` rows written by the vertex pipeline
pub fn load_nonparametric(path: &Path) -> Result<Vec<VertexResult>> {
    let table = Table::from_file(path)?;
    if table.headers().len() != 3 {
        bail!(
            "{}: expected columns ROI,stat,pval, found {:?}",
            path.display(),
            table.headers()
        );
    }
    let headers = table.headers().to_vec();
    let rois = table.parse_column::<usize>(&headers[0])?;
    let stats = table.parse_column::<f64>(&headers[1])?;
    let pvalues = table.parse_column::<f64>(&headers[2])?;

    Ok(rois
        .into_iter()
        .zip(stats)
        .zip(pvalues)
        .map(|((roi, stat), pvalue)| VertexResult {
            roi,
            statistic: Some(stat),
            pvalue,
        })
        .collect())
}

/// Read parametric results (`ROI,pvalue,order.p`, 1-based ROI)
///
/// The `order.p` column is ignored and ROIs are shifted to 0-based indices.
pub fn load_parametric(path: &Path) -> Result<Vec<VertexResult>> {
    let table = Table::from_file(path)?;
    let kept: Vec<String> = table
        .headers()
        .iter()
        .filter(|h| h.as_str() != "order.p")
        .cloned()
        .collect();
    if kept.len() != 2 {
        bail!(
            "{}: expected columns ROI,pvalue after dropping order.p, found {:?}",
            path.display(),
            kept
        );
    }
    let rois = table.parse_column::<usize>(&kept[0])?;
    let pvalues = table.parse_column::<f64>(&kept[1])?;

    rois.into_iter()
        .zip(pvalues)
        .map(|(roi, pvalue)| {
            let roi = roi
                .checked_sub(1)
                .ok_or_else(|| anyhow!("{}: parametric ROI ids start at 1", path.display()))?;
            Ok(VertexResult {
                roi,
                statistic: None,
                pvalue,
            })
        })
        .collect()
}

/// A vertex result with its Holm-adjusted p-value and structure name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedRoi {
    pub roi: usize,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistic: Option<f64>,
    pub pvalue: f64,
    pub holm_pvalue: f64,
}

/// Sort by p-value, Holm-adjust and attach structure names
pub fn rank_results(results: &[VertexResult], atlas: &Atlas) -> Result<Vec<RankedRoi>> {
    let mut sorted = results.to_vec();
    sorted.sort_by(|a, b| a.pvalue.total_cmp(&b.pvalue));

    let pvalues: Vec<f64> = sorted.iter().map(|r| r.pvalue).collect();
    let adjusted = holm(&pvalues);

    sorted
        .into_iter()
        .zip(adjusted)
        .map(|(result, holm_pvalue)| {
            Ok(RankedRoi {
                roi: result.roi,
                name: lookup_roi_name(result.roi, atlas)?,
                statistic: result.statistic,
                pvalue: result.pvalue,
                holm_pvalue,
            })
        })
        .collect()
}

/// Outcome of comparing the two analyses
#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub alpha: f64,
    pub nonparametric: Vec<RankedRoi>,
    pub parametric: Vec<RankedRoi>,
    pub nonparametric_significant: Vec<String>,
    pub parametric_significant: Vec<String>,
    pub shared: Vec<String>,
    pub overlap: usize,
}

/// Rank both analyses and intersect their significant structures
pub fn compare(
    nonparametric: &[VertexResult],
    parametric: &[VertexResult],
    atlas: &Atlas,
    alpha: f64,
) -> Result<Comparison> {
    let nonparametric = rank_results(nonparametric, atlas).context("nonparametric results")?;
    let parametric = rank_results(parametric, atlas).context("parametric results")?;

    let significant = |ranked: &[RankedRoi]| -> Vec<String> {
        ranked
            .iter()
            .filter(|r| r.holm_pvalue <= alpha)
            .map(|r| r.name.clone())
            .collect()
    };
    let nonparametric_significant = significant(&nonparametric);
    let parametric_significant = significant(&parametric);

    let par_set: BTreeSet<&String> = parametric_significant.iter().collect();
    let shared: Vec<String> = nonparametric_significant
        .iter()
        .filter(|name| par_set.contains(name))
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    Ok(Comparison {
        alpha,
        overlap: shared.len(),
        nonparametric,
        parametric,
        nonparametric_significant,
        parametric_significant,
        shared,
    })
}

/// One ROI across both analyses, for the merged CSV
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRow {
    pub roi: String,
    pub nonpar_stat: Option<f64>,
    pub nonpar_pvalue: Option<f64>,
    pub nonpar_holm: Option<f64>,
    pub par_pvalue: Option<f64>,
    pub par_holm: Option<f64>,
}

impl Comparison {
    /// Every ROI present in either analysis, ordered by vertex index
    pub fn merged_rows(&self) -> Vec<MergedRow> {
        let mut merged: BTreeMap<usize, MergedRow> = BTreeMap::new();
        let entry = |merged: &mut BTreeMap<usize, MergedRow>, r: &RankedRoi| {
            merged.entry(r.roi).or_insert_with(|| MergedRow {
                roi: r.name.clone(),
                nonpar_stat: None,
                nonpar_pvalue: None,
                nonpar_holm: None,
                par_pvalue: None,
                par_holm: None,
            });
        };

        for r in &self.nonparametric {
            entry(&mut merged, r);
            if let Some(row) = merged.get_mut(&r.roi) {
                row.nonpar_stat = r.statistic;
                row.nonpar_pvalue = Some(r.pvalue);
                row.nonpar_holm = Some(r.holm_pvalue);
            }
        }
        for r in &self.parametric {
            entry(&mut merged, r);
            if let Some(row) = merged.get_mut(&r.roi) {
                row.par_pvalue = Some(r.pvalue);
                row.par_holm = Some(r.holm_pvalue);
            }
        }

        merged.into_values().collect()
    }

    /// Human-readable report
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let section = |out: &mut String, title: &str, ranked: &[RankedRoi]| {
            let hits: Vec<&RankedRoi> = ranked.iter().filter(|r| r.holm_pvalue <= self.alpha).collect();
            let _ = writeln!(
                out,
                "{} ({} of {} ROIs with Holm p <= {}):",
                title,
                hits.len(),
                ranked.len(),
                self.alpha
            );
            for r in hits {
                let _ = writeln!(
                    out,
                    "  {:<40} p = {:.3e}  holm = {:.3e}",
                    r.name, r.pvalue, r.holm_pvalue
                );
            }
            out.push('\n');
        };

        section(&mut out, "Nonparametric MANOVA", &self.nonparametric);
        section(&mut out, "Parametric MANOVA", &self.parametric);

        let _ = writeln!(out, "Shared significant ROIs: {}", self.overlap);
        for name in &self.shared {
            let _ = writeln!(out, "  {}", name);
        }
        out
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize comparison")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn atlas() -> Atlas {
        (1..=HEMISPHERE_SIZE)
            .map(|roi| (roi, format!("Structure{}", roi)))
            .collect()
    }

    #[test]
    fn test_lookup_roi_name_hemispheres() {
        let atlas = atlas();
        assert_eq!(lookup_roi_name(0, &atlas).unwrap(), "Structure1 (L)");
        assert_eq!(lookup_roi_name(165, &atlas).unwrap(), "Structure166 (L)");
        assert_eq!(lookup_roi_name(166, &atlas).unwrap(), "Structure1 (R)");
        assert_eq!(lookup_roi_name(331, &atlas).unwrap(), "Structure166 (R)");
    }

    #[test]
    fn test_lookup_unknown_roi() {
        let atlas: Atlas = [(1, "Only".to_string())].into_iter().collect();
        assert!(lookup_roi_name(5, &atlas).is_err());
    }

    #[test]
    fn test_load_nonparametric() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nonpar.csv");
        fs::write(&path, "ROI,stat,pval\n0,0.5,0.001\n1,0.1,0.4\n").unwrap();
        let rows = load_nonparametric(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].roi, 0);
        assert_eq!(rows[0].statistic, Some(0.5));
        assert_eq!(rows[1].pvalue, 0.4);
    }

    #[test]
    fn test_load_parametric_shifts_roi_and_drops_order() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("par.csv");
        fs::write(&path, "\"ROI\",\"pvalue\",\"order.p\"\n1,0.01,2\n167,0.2,1\n").unwrap();
        let rows = load_parametric(&path).unwrap();
        assert_eq!(rows[0].roi, 0);
        assert_eq!(rows[1].roi, 166);
        assert_eq!(rows[1].statistic, None);

        fs::write(&path, "ROI,pvalue\n0,0.5\n").unwrap();
        assert!(load_parametric(&path).is_err());
    }

    #[test]
    fn test_rank_results_sorted_and_adjusted() {
        let results = vec![
            VertexResult { roi: 2, statistic: Some(0.1), pvalue: 0.3 },
            VertexResult { roi: 0, statistic: Some(0.9), pvalue: 0.001 },
            VertexResult { roi: 166, statistic: Some(0.5), pvalue: 0.01 },
        ];
        let ranked = rank_results(&results, &atlas()).unwrap();
        assert_eq!(ranked[0].name, "Structure1 (L)");
        assert_eq!(ranked[1].name, "Structure1 (R)");
        assert!((ranked[0].holm_pvalue - 0.003).abs() < 1e-12);
        assert!((ranked[1].holm_pvalue - 0.02).abs() < 1e-12);
        assert!(ranked.windows(2).all(|w| w[0].holm_pvalue <= w[1].holm_pvalue));
    }

    #[test]
    fn test_compare_overlap() {
        let nonpar = vec![
            VertexResult { roi: 0, statistic: Some(0.9), pvalue: 0.0001 },
            VertexResult { roi: 1, statistic: Some(0.8), pvalue: 0.0002 },
            VertexResult { roi: 2, statistic: Some(0.1), pvalue: 0.9 },
        ];
        let par = vec![
            VertexResult { roi: 1, statistic: None, pvalue: 0.0001 },
            VertexResult { roi: 3, statistic: None, pvalue: 0.0003 },
        ];
        let comparison = compare(&nonpar, &par, &atlas(), DEFAULT_ALPHA).unwrap();
        assert_eq!(comparison.nonparametric_significant.len(), 2);
        assert_eq!(comparison.parametric_significant.len(), 2);
        assert_eq!(comparison.shared, vec!["Structure2 (L)".to_string()]);
        assert_eq!(comparison.overlap, 1);

        let merged = comparison.merged_rows();
        assert_eq!(merged.len(), 4);
        assert_eq!(merged[1].roi, "Structure2 (L)");
        assert!(merged[1].nonpar_pvalue.is_some() && merged[1].par_pvalue.is_some());
        assert!(merged[3].nonpar_pvalue.is_none());

        let text = comparison.to_text();
        assert!(text.contains("Shared significant ROIs: 1"));
        let json: serde_json::Value = serde_json::from_str(&comparison.to_json().unwrap()).unwrap();
        assert_eq!(json["overlap"], 1);
    }
}
