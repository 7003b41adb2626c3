use nalgebra::DVector;

use crate::data::cross::ChromosomeData;
use crate::error::{MpError, Result};
use crate::types::Allele;

/// Genotyping-error model linking an observed allele to founder alleles.
///
/// With error probability `e` and `k` alleles segregating at a marker:
/// the observed allele matches a founder with probability `1 - e`, and each
/// of the other `k - 1` alleles is observed with probability `e / (k - 1)`.
/// A missing founder allele is uninformative (`1 / k`), and a missing call
/// gives likelihood 1 for every founder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmissionModel {
    error_prob: f64,
}

impl EmissionModel {
    /// # Errors
    /// Returns `InvalidParameter` unless `0 < error_prob < 1`.
    pub fn new(error_prob: f64) -> Result<Self> {
        if !(error_prob > 0.0 && error_prob < 1.0) {
            return Err(MpError::InvalidParameter(format!(
                "genotyping error probability must lie in (0, 1), got {}",
                error_prob
            )));
        }
        Ok(Self { error_prob })
    }

    pub fn error_prob(&self) -> f64 {
        self.error_prob
    }

    /// Likelihood of `observed` given a founder carrying `founder`.
    pub fn likelihood(
        &self,
        founder: Option<Allele>,
        observed: Option<Allele>,
        n_alleles: usize,
    ) -> f64 {
        let k = n_alleles.max(2) as f64;
        match (observed, founder) {
            (None, _) => 1.0,
            (Some(_), None) => 1.0 / k,
            (Some(o), Some(f)) if o == f => 1.0 - self.error_prob,
            (Some(_), Some(_)) => self.error_prob / (k - 1.0),
        }
    }

    /// Likelihood of the call of final individual `row` at `marker`, for every
    /// founder.
    pub fn marker_likelihoods(
        &self,
        chromosome: &ChromosomeData<'_>,
        row: usize,
        marker: usize,
        n_alleles: usize,
    ) -> DVector<f64> {
        let observed = chromosome.final_alleles[(row, marker)];
        DVector::from_iterator(
            chromosome.n_founders(),
            chromosome
                .founder_alleles
                .column(marker)
                .iter()
                .map(|&f| self.likelihood(f, observed, n_alleles)),
        )
    }
}

/// Number of distinct founder alleles at each marker of a chromosome.
pub fn allele_counts(chromosome: &ChromosomeData<'_>) -> Vec<usize> {
    (0..chromosome.n_markers())
        .map(|m| distinct_alleles(chromosome.founder_alleles.column(m).iter().copied()).len())
        .collect()
}

/// Distinct non-missing alleles in order of first appearance.
pub fn distinct_alleles(alleles: impl Iterator<Item = Option<Allele>>) -> Vec<Allele> {
    let mut seen = Vec::new();
    for a in alleles.flatten() {
        if !seen.contains(&a) {
            seen.push(a);
        }
    }
    seen
}
