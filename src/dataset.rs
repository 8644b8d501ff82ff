//! Connectome dataset loading
//!
//! A dataset directory holds one dense adjacency matrix per participant plus
//! the atlas and block definitions shared by all graphs:
//!
//! ```text
//! participants.csv          participant_id,genotype
//! graphs/<participant>.csv  dense adjacency, comma separated, no header
//! atlas.csv                 ROI,Structure[,...]
//! blocks.csv                block,hemisphere,i,j
//! ```

use crate::table::{Table, TableError};
use ndarray::Array2;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Vertices per hemisphere in the mouse atlas
pub const HEMISPHERE_SIZE: usize = 166;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{file}: {source}")]
    Table { file: String, source: TableError },

    #[error("graph for '{participant}': {reason}")]
    Graph { participant: String, reason: String },

    #[error("graph for '{participant}' is {rows}x{cols}, expected a square matrix")]
    NotSquare {
        participant: String,
        rows: usize,
        cols: usize,
    },

    #[error("graph for '{participant}' has {found} vertices, expected {expected}")]
    SizeMismatch {
        participant: String,
        expected: usize,
        found: usize,
    },

    #[error("{graphs} graphs but {labels} labels")]
    LabelCount { graphs: usize, labels: usize },

    #[error("dataset contains no graphs")]
    NoGraphs,

    #[error("block '{block}' spans [{start}, {end}) outside {n_vertices} vertices")]
    BlockOutOfRange {
        block: String,
        start: usize,
        end: usize,
        n_vertices: usize,
    },
}

pub type Result<T> = std::result::Result<T, DatasetError>;

/// Contiguous half-open vertex range `[start, end)` forming an anatomical block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub name: String,
    pub hemisphere: String,
    pub start: usize,
    pub end: usize,
}

impl Block {
    pub fn new(name: &str, hemisphere: &str, start: usize, end: usize) -> Self {
        Self {
            name: name.to_string(),
            hemisphere: hemisphere.to_string(),
            start,
            end,
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// ROI id (1-based) to structure name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Atlas {
    structures: BTreeMap<usize, String>,
}

impl Atlas {
    pub fn from_table(table: &Table) -> std::result::Result<Self, TableError> {
        let rois = table.parse_column::<usize>("ROI")?;
        let names = table.column("Structure")?;
        Ok(rois
            .into_iter()
            .zip(names)
            .map(|(roi, name)| (roi, name.to_string()))
            .collect())
    }

    pub fn structure(&self, roi: usize) -> Option<&str> {
        self.structures.get(&roi).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.structures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.structures.is_empty()
    }
}

impl FromIterator<(usize, String)> for Atlas {
    fn from_iter<I: IntoIterator<Item = (usize, String)>>(iter: I) -> Self {
        Self {
            structures: iter.into_iter().collect(),
        }
    }
}

/// Graphs with their group labels and shared anatomy
#[derive(Debug, Clone)]
pub struct Connectome {
    pub graphs: Vec<Array2<f64>>,
    pub labels: Vec<String>,
    pub atlas: Atlas,
    pub blocks: Vec<Block>,
}

impl Connectome {
    /// Assemble and validate a connectome from already loaded parts
    pub fn new(
        graphs: Vec<Array2<f64>>,
        labels: Vec<String>,
        atlas: Atlas,
        blocks: Vec<Block>,
    ) -> Result<Self> {
        if graphs.is_empty() {
            return Err(DatasetError::NoGraphs);
        }
        if graphs.len() != labels.len() {
            return Err(DatasetError::LabelCount {
                graphs: graphs.len(),
                labels: labels.len(),
            });
        }

        let n_vertices = graphs[0].nrows();
        for (index, graph) in graphs.iter().enumerate() {
            let participant = format!("#{}", index);
            check_square(&participant, graph)?;
            if graph.nrows() != n_vertices {
                return Err(DatasetError::SizeMismatch {
                    participant,
                    expected: n_vertices,
                    found: graph.nrows(),
                });
            }
        }

        for block in &blocks {
            if block.start > block.end || block.end > n_vertices {
                return Err(DatasetError::BlockOutOfRange {
                    block: block.name.clone(),
                    start: block.start,
                    end: block.end,
                    n_vertices,
                });
            }
        }

        Ok(Self {
            graphs,
            labels,
            atlas,
            blocks,
        })
    }

    /// Load a dataset directory
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let participants = read_table(&dir.join("participants.csv"))?;
        let ids = participants
            .column("participant_id")
            .map_err(|source| table_error("participants.csv", source))?;
        let labels: Vec<String> = participants
            .column("genotype")
            .map_err(|source| table_error("participants.csv", source))?
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut graphs = Vec::with_capacity(ids.len());
        for id in &ids {
            let path = dir.join("graphs").join(format!("{}.csv", id));
            let text = read_file(&path)?;
            let graph = parse_matrix(&text).map_err(|reason| DatasetError::Graph {
                participant: id.to_string(),
                reason,
            })?;
            check_square(id, &graph)?;
            debug!(participant = id, vertices = graph.nrows(), "loaded graph");
            graphs.push(graph);
        }

        let atlas = Atlas::from_table(&read_table(&dir.join("atlas.csv"))?)
            .map_err(|source| table_error("atlas.csv", source))?;
        let blocks = parse_blocks(&read_table(&dir.join("blocks.csv"))?)
            .map_err(|source| table_error("blocks.csv", source))?;

        let connectome = Self::new(graphs, labels, atlas, blocks)?;
        info!(
            subjects = connectome.n_subjects(),
            vertices = connectome.n_vertices(),
            blocks = connectome.blocks.len(),
            "loaded connectome dataset from {}",
            dir.display()
        );
        Ok(connectome)
    }

    pub fn n_subjects(&self) -> usize {
        self.graphs.len()
    }

    pub fn n_vertices(&self) -> usize {
        self.graphs.first().map_or(0, |g| g.nrows())
    }

    /// Sorted distinct labels
    pub fn unique_labels(&self) -> Vec<String> {
        let mut labels = self.labels.clone();
        labels.sort();
        labels.dedup();
        labels
    }

    /// Number of graphs carrying `label`
    pub fn count_label(&self, label: &str) -> usize {
        self.labels.iter().filter(|l| *l == label).count()
    }
}

fn check_square(participant: &str, graph: &Array2<f64>) -> Result<()> {
    if graph.nrows() != graph.ncols() {
        return Err(DatasetError::NotSquare {
            participant: participant.to_string(),
            rows: graph.nrows(),
            cols: graph.ncols(),
        });
    }
    Ok(())
}

fn table_error(file: &str, source: TableError) -> DatasetError {
    DatasetError::Table {
        file: file.to_string(),
        source,
    }
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_table(path: &Path) -> Result<Table> {
    let text = read_file(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Table::parse(&text).map_err(|source| table_error(&name, source))
}

fn parse_blocks(table: &Table) -> std::result::Result<Vec<Block>, TableError> {
    let names = table.column("block")?;
    let hemispheres = table.column("hemisphere")?;
    let starts = table.parse_column::<usize>("i")?;
    let ends = table.parse_column::<usize>("j")?;
    Ok(names
        .iter()
        .zip(&hemispheres)
        .zip(starts.iter().zip(&ends))
        .map(|((name, hemi), (&start, &end))| Block::new(name, hemi, start, end))
        .collect())
}

/// Dense matrix from headerless comma-separated text
pub fn parse_matrix(text: &str) -> std::result::Result<Array2<f64>, String> {
    let mut values = Vec::new();
    let mut cols = None;
    let mut rows = 0;

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let row: Vec<f64> = line
            .split(',')
            .map(|field| {
                field
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| format!("line {}: cannot parse '{}'", line_no + 1, field))
            })
            .collect::<std::result::Result<_, _>>()?;

        match cols {
            None => cols = Some(row.len()),
            Some(c) if c != row.len() => {
                return Err(format!(
                    "line {}: expected {} values, found {}",
                    line_no + 1,
                    c,
                    row.len()
                ))
            }
            Some(_) => {}
        }
        values.extend(row);
        rows += 1;
    }

    let cols = cols.ok_or_else(|| "empty matrix".to_string())?;
    Array2::from_shape_vec((rows, cols), values).map_err(|e| e.to_string())
}
