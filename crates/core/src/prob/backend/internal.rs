use std::collections::HashMap;

use nalgebra::{DMatrix, DVector};

use super::{BackendContext, ProbabilityBackend, Strategy};
use crate::data::cross::ChromosomeData;
use crate::error::{MpError, Result};
use crate::genetics::design::Design;
use crate::genetics::two_locus::{permute, TwoLocusModel};
use crate::prob::cube::{CubeLayout, ProbCube};
use crate::prob::emission::allele_counts;
use crate::prob::grid::{GridPosition, PositionGrid};

/// Three-point founder probabilities.
///
/// At each query position the nearest informative marker on either side is
/// combined with the call at the position itself (if it is a marker), through
/// the two-locus model of the individual's own design and funnel. Designs may
/// differ between individuals.
pub struct InternalBackend<'a> {
    ctx: BackendContext<'a>,
}

impl<'a> InternalBackend<'a> {
    /// # Errors
    /// Returns `Pedigree` if a final individual has no classified design.
    pub fn new(ctx: BackendContext<'a>) -> Result<Self> {
        if let Some(id) = ctx
            .final_ids
            .iter()
            .find(|id| ctx.classification.design_of(id).is_none())
        {
            return Err(MpError::Pedigree(format!(
                "Final individual '{}' has no design; is it flagged as observed?",
                id
            )));
        }
        Ok(Self { ctx })
    }
}

/// Informative markers around a query position: the marker at the position,
/// the nearest one to the left and the nearest one to the right.
fn flanking(
    gp: &GridPosition,
    informative: &[usize],
    positions: &[f64],
) -> (Option<usize>, Option<usize>, Option<usize>) {
    match (gp.kind.is_marker(), gp.marker) {
        (true, Some(m)) => {
            let split = informative.partition_point(|&i| i < m);
            let own = informative.get(split).copied().filter(|&i| i == m);
            let right_from = if own.is_some() { split + 1 } else { split };
            let left = split.checked_sub(1).map(|k| informative[k]);
            (own, left, informative.get(right_from).copied())
        }
        _ => {
            let split = informative.partition_point(|&i| positions[i] <= gp.position);
            let left = split.checked_sub(1).map(|k| informative[k]);
            (None, left, informative.get(split).copied())
        }
    }
}

impl ProbabilityBackend for InternalBackend<'_> {
    fn strategy(&self) -> Strategy {
        Strategy::Internal
    }

    fn compute(&self, chromosome: &ChromosomeData<'_>, grid: &PositionGrid) -> Result<ProbCube> {
        let n = chromosome.n_founders();
        let n_alleles = allele_counts(chromosome);
        let positions = chromosome.map.positions();
        let identity: Vec<usize> = (0..n).collect();

        let mut cube =
            ProbCube::new(chromosome.n_finals(), grid.len(), n, CubeLayout::PositionMajor);
        let mut joints: HashMap<(Design, u64), DMatrix<f64>> = HashMap::new();

        for row in 0..chromosome.n_finals() {
            self.ctx.cancel.check()?;

            let id = &self.ctx.final_ids[row];
            let design = self.ctx.classification.design_of(id).ok_or_else(|| {
                MpError::Pedigree(format!("Final individual '{}' has no design", id))
            })?;
            let funnel = self.ctx.classification.funnel_of(id).unwrap_or(&identity);

            let informative: Vec<usize> = (0..chromosome.n_markers())
                .filter(|&m| chromosome.final_alleles[(row, m)].is_some())
                .collect();
            if informative.is_empty() {
                log::debug!("'{}' has no calls on chromosome '{}'", id, chromosome.map.name());
                continue;
            }
            let emissions: HashMap<usize, DVector<f64>> = informative
                .iter()
                .map(|&m| {
                    (m, self.ctx.emission.marker_likelihoods(chromosome, row, m, n_alleles[m]))
                })
                .collect();

            for (q, gp) in grid.iter().enumerate() {
                let (own, left, right) = flanking(gp, &informative, &positions);

                let mut p = DVector::from_element(n, 1.0);
                if let Some(m) = own {
                    p.component_mul_assign(&emissions[&m]);
                }
                for m in [left, right].into_iter().flatten() {
                    let r = self
                        .ctx
                        .map_function
                        .recombination_fraction(positions[m] - gp.position);
                    let joint = joints
                        .entry((design, r.to_bits()))
                        .or_insert_with(|| TwoLocusModel::new(design).joint(r));
                    // Joint of (query, flank) summed over the flank's founder.
                    let toward = permute(joint, funnel) * &emissions[&m];
                    p.component_mul_assign(&toward);
                }

                let total = p.sum();
                if total > 0.0 && total.is_finite() {
                    cube.set_block(row, q, (p / total).as_slice());
                }
            }
        }

        Ok(cube)
    }
}
