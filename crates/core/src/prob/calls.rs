//! Founder Caller: threshold founder probabilities into discrete calls.

use nalgebra::DMatrix;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use super::matrix::FounderProbMatrix;
use crate::error::{MpError, Result};

/// The founder (1-based) whose probability in `block` is largest and exceeds
/// `threshold`.
///
/// Ties go to the lowest founder index. An undefined block never yields a
/// call.
pub fn call_block(block: &[f64], threshold: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (f, &p) in block.iter().enumerate() {
        if p.is_nan() {
            return None;
        }
        if best.map_or(true, |(_, bp)| p > bp) {
            best = Some((f, p));
        }
    }
    best.filter(|&(_, p)| p > threshold).map(|(f, _)| f + 1)
}

fn check_threshold(threshold: f64) -> Result<()> {
    if threshold > 0.0 && threshold <= 1.0 {
        Ok(())
    } else {
        Err(MpError::InvalidParameter(format!(
            "calling threshold must be in (0, 1], got {}",
            threshold
        )))
    }
}

/// Call founders for every individual and position of `probs`.
///
/// # Errors
/// Returns `InvalidParameter` unless `0 < threshold <= 1`.
pub fn call_founders(probs: &FounderProbMatrix, threshold: f64) -> Result<FounderCallMatrix> {
    check_threshold(threshold)?;
    let calls = DMatrix::from_fn(probs.n_individuals(), probs.n_positions(), |row, pos| {
        call_block(&probs.block(row, pos), threshold)
    });
    Ok(FounderCallMatrix {
        chromosome: probs.chromosome().to_string(),
        individuals: probs.individuals().to_vec(),
        positions: probs.positions().iter().map(|p| p.name.clone()).collect(),
        n_founders: probs.n_founders(),
        threshold,
        calls,
    })
}

/// Discrete founder calls of one chromosome.
///
/// Rows are final individuals, columns are grid positions; entries are
/// 1-based founder indices or `None` for no call.
#[derive(Debug, Clone, PartialEq)]
pub struct FounderCallMatrix {
    chromosome: String,
    individuals: Vec<String>,
    positions: Vec<String>,
    n_founders: usize,
    threshold: f64,
    calls: DMatrix<Option<usize>>,
}

impl FounderCallMatrix {
    pub fn chromosome(&self) -> &str {
        &self.chromosome
    }

    pub fn individuals(&self) -> &[String] {
        &self.individuals
    }

    pub fn position_names(&self) -> &[String] {
        &self.positions
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn n_individuals(&self) -> usize {
        self.individuals.len()
    }

    pub fn n_positions(&self) -> usize {
        self.positions.len()
    }

    pub fn get(&self, row: usize, position: usize) -> Option<usize> {
        self.calls[(row, position)]
    }

    pub fn row(&self, row: usize) -> Vec<Option<usize>> {
        self.calls.row(row).iter().copied().collect()
    }

    /// Share of called positions assigned to each founder.
    ///
    /// All zeros when nothing was called.
    pub fn founder_proportions(&self) -> Vec<f64> {
        let mut counts = vec![0usize; self.n_founders];
        for f in self.calls.iter().flatten() {
            counts[f - 1] += 1;
        }
        let total: usize = counts.iter().sum();
        if total == 0 {
            return vec![0.0; self.n_founders];
        }
        counts.iter().map(|&c| c as f64 / total as f64).collect()
    }

    /// Founder switches between consecutive called positions, per individual.
    ///
    /// Positions without a call are skipped, so `1, -, 2` counts one switch.
    pub fn recombination_counts(&self) -> Vec<usize> {
        (0..self.n_individuals())
            .map(|row| {
                let called: Vec<usize> = self.calls.row(row).iter().flatten().copied().collect();
                called.windows(2).filter(|w| w[0] != w[1]).count()
            })
            .collect()
    }

    /// Fraction of (individual, position) cells without a call.
    pub fn missing_fraction(&self) -> f64 {
        let total = self.calls.len();
        if total == 0 {
            return 0.0;
        }
        self.calls.iter().filter(|c| c.is_none()).count() as f64 / total as f64
    }
}

impl Serialize for FounderCallMatrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let rows: Vec<Vec<Option<usize>>> =
            (0..self.n_individuals()).map(|r| self.row(r)).collect();
        let mut s = serializer.serialize_struct("FounderCallMatrix", 5)?;
        s.serialize_field("chromosome", &self.chromosome)?;
        s.serialize_field("threshold", &self.threshold)?;
        s.serialize_field("individuals", &self.individuals)?;
        s.serialize_field("positions", &self.positions)?;
        s.serialize_field("calls", &rows)?;
        s.end()
    }
}
