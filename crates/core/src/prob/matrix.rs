use std::ops::Range;

use nalgebra::DMatrix;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use super::grid::GridPosition;
use crate::error::{MpError, Result};
use crate::types::SUM_TOLERANCE;

/// Maps (position, founder) to a column of a canonical probability matrix.
///
/// Columns are grouped by position: the block of position `p` occupies
/// `p * n_founders .. (p + 1) * n_founders`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockIndex {
    n_positions: usize,
    n_founders: usize,
}

impl BlockIndex {
    pub fn new(n_positions: usize, n_founders: usize) -> Self {
        Self {
            n_positions,
            n_founders,
        }
    }

    pub fn n_positions(&self) -> usize {
        self.n_positions
    }

    pub fn n_founders(&self) -> usize {
        self.n_founders
    }

    pub fn n_columns(&self) -> usize {
        self.n_positions * self.n_founders
    }

    /// Column of `founder` (0-based) at `position`.
    pub fn column(&self, position: usize, founder: usize) -> usize {
        debug_assert!(position < self.n_positions && founder < self.n_founders);
        position * self.n_founders + founder
    }

    /// Columns of the block at `position`.
    pub fn block(&self, position: usize) -> Range<usize> {
        let start = position * self.n_founders;
        start..start + self.n_founders
    }

    /// `(position, founder)` of a column.
    pub fn locate(&self, column: usize) -> (usize, usize) {
        (column / self.n_founders, column % self.n_founders)
    }
}

/// Outcome of the computation for one individual at one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockStatus {
    /// The block holds a probability distribution over founders.
    Computed,
    /// No usable data; every entry of the block is NaN.
    Undefined,
}

/// Canonical founder-origin probabilities of one chromosome.
///
/// Rows are final individuals; columns are founder blocks, one per grid
/// position, addressed through [`BlockIndex`]. Every block sums to one or is
/// entirely NaN.
#[derive(Debug, Clone)]
pub struct FounderProbMatrix {
    chromosome: String,
    individuals: Vec<String>,
    positions: Vec<GridPosition>,
    index: BlockIndex,
    values: DMatrix<f64>,
}

impl FounderProbMatrix {
    /// # Errors
    /// - `DimensionMismatch` if `values` does not have one row per individual
    ///   and one block per position.
    /// - `Internal` if a block is neither a distribution nor all NaN.
    pub fn new(
        chromosome: impl Into<String>,
        individuals: Vec<String>,
        positions: Vec<GridPosition>,
        n_founders: usize,
        values: DMatrix<f64>,
    ) -> Result<Self> {
        let chromosome = chromosome.into();
        let index = BlockIndex::new(positions.len(), n_founders);
        if values.nrows() != individuals.len() {
            return Err(MpError::DimensionMismatch {
                expected: individuals.len(),
                got: values.nrows(),
                context: format!("probability rows on chromosome '{}'", chromosome),
            });
        }
        if values.ncols() != index.n_columns() {
            return Err(MpError::DimensionMismatch {
                expected: index.n_columns(),
                got: values.ncols(),
                context: format!("probability columns on chromosome '{}'", chromosome),
            });
        }

        let matrix = Self {
            chromosome,
            individuals,
            positions,
            index,
            values,
        };
        matrix.validate()?;
        Ok(matrix)
    }

    fn validate(&self) -> Result<()> {
        for row in 0..self.n_individuals() {
            for pos in 0..self.n_positions() {
                let block = self.block(row, pos);
                let n_nan = block.iter().filter(|v| v.is_nan()).count();
                if n_nan == block.len() {
                    continue;
                }
                let sum: f64 = block.iter().sum();
                let in_range = block
                    .iter()
                    .all(|v| (-SUM_TOLERANCE..=1.0 + SUM_TOLERANCE).contains(v));
                if n_nan > 0 || !in_range || (sum - 1.0).abs() > SUM_TOLERANCE {
                    return Err(MpError::Internal(format!(
                        "founder block of '{}' at '{}' on chromosome '{}' sums to {} ({:?})",
                        self.individuals[row], self.positions[pos].name, self.chromosome, sum, block
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn chromosome(&self) -> &str {
        &self.chromosome
    }

    pub fn individuals(&self) -> &[String] {
        &self.individuals
    }

    pub fn positions(&self) -> &[GridPosition] {
        &self.positions
    }

    pub fn index(&self) -> BlockIndex {
        self.index
    }

    pub fn values(&self) -> &DMatrix<f64> {
        &self.values
    }

    pub fn n_individuals(&self) -> usize {
        self.individuals.len()
    }

    pub fn n_positions(&self) -> usize {
        self.positions.len()
    }

    pub fn n_founders(&self) -> usize {
        self.index.n_founders()
    }

    /// Probability that `row` descends from `founder` (0-based) at `position`.
    pub fn get(&self, row: usize, position: usize, founder: usize) -> f64 {
        self.values[(row, self.index.column(position, founder))]
    }

    /// The founder block of `row` at `position`.
    pub fn block(&self, row: usize, position: usize) -> Vec<f64> {
        self.index
            .block(position)
            .map(|c| self.values[(row, c)])
            .collect()
    }

    pub fn block_status(&self, row: usize, position: usize) -> BlockStatus {
        if self.get(row, position, 0).is_nan() {
            BlockStatus::Undefined
        } else {
            BlockStatus::Computed
        }
    }

    /// Column labels: `"<position>, Founder <k>"` with `k` starting at 1.
    pub fn column_labels(&self) -> Vec<String> {
        (0..self.index.n_columns())
            .map(|c| {
                let (pos, f) = self.index.locate(c);
                format!("{}, Founder {}", self.positions[pos].name, f + 1)
            })
            .collect()
    }

    /// Fraction of (individual, position) blocks that are undefined.
    pub fn undefined_fraction(&self) -> f64 {
        let total = self.n_individuals() * self.n_positions();
        if total == 0 {
            return 0.0;
        }
        let undefined = (0..self.n_individuals())
            .flat_map(|r| (0..self.n_positions()).map(move |p| (r, p)))
            .filter(|&(r, p)| self.block_status(r, p) == BlockStatus::Undefined)
            .count();
        undefined as f64 / total as f64
    }
}

impl Serialize for FounderProbMatrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let rows: Vec<Vec<Option<f64>>> = self
            .values
            .row_iter()
            .map(|r| r.iter().map(|v| if v.is_nan() { None } else { Some(*v) }).collect())
            .collect();

        let mut s = serializer.serialize_struct("FounderProbMatrix", 5)?;
        s.serialize_field("chromosome", &self.chromosome)?;
        s.serialize_field("individuals", &self.individuals)?;
        s.serialize_field("positions", &self.positions)?;
        s.serialize_field("columns", &self.column_labels())?;
        s.serialize_field("values", &rows)?;
        s.end()
    }
}
