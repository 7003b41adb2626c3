use std::collections::HashMap;

use nalgebra::{DMatrix, DVector};

use super::{BackendContext, ProbabilityBackend, Strategy};
use crate::data::cross::ChromosomeData;
use crate::error::Result;
use crate::genetics::design::{CrossSpec, Design};
use crate::genetics::two_locus::symmetric_transition;
use crate::prob::cube::{CubeLayout, ProbCube};
use crate::prob::emission::allele_counts;
use crate::prob::grid::PositionGrid;
use crate::prob::hmm::{forward_backward, PositionChain};

/// Multipoint probabilities under a recombinant-inbred cross type.
///
/// All observed individuals must share one design, which is mapped onto its
/// cross type and inbreeding generation count. Founders are exchangeable: the
/// chance of a change of origin between two positions is `1 - P(same)`, split
/// evenly over the other founders.
pub struct MultipointBackend<'a> {
    ctx: BackendContext<'a>,
    design: Design,
    cross: CrossSpec,
}

impl<'a> MultipointBackend<'a> {
    /// # Errors
    /// Returns `MixedDesign` when observed individuals differ in design, and
    /// `UnsupportedDesign` when the design has no recombinant-inbred cross type.
    pub fn new(ctx: BackendContext<'a>) -> Result<Self> {
        let design = ctx.classification.uniform_design()?;
        let mut cross = design.cross_spec()?;
        if let Some(g) = ctx.generations {
            cross.generations = g;
        }
        log::info!(
            "Multipoint model for {}: cross type {} with {} generations of inbreeding",
            design,
            cross.cross_type.label(),
            cross.generations
        );
        Ok(Self { ctx, design, cross })
    }

    pub fn design(&self) -> Design {
        self.design
    }

    pub fn cross(&self) -> CrossSpec {
        self.cross
    }
}

impl ProbabilityBackend for MultipointBackend<'_> {
    fn strategy(&self) -> Strategy {
        Strategy::Multipoint
    }

    fn compute(&self, chromosome: &ChromosomeData<'_>, grid: &PositionGrid) -> Result<ProbCube> {
        let n = chromosome.n_founders();
        let n_alleles = allele_counts(chromosome);
        let chain = PositionChain::new(chromosome.map, grid);

        let mut cache: HashMap<u64, DMatrix<f64>> = HashMap::new();
        let mut keys = Vec::with_capacity(chain.len().saturating_sub(1));
        for i in 0..chain.len().saturating_sub(1) {
            let r = self.ctx.map_function.recombination_fraction(chain.gap(i));
            cache
                .entry(r.to_bits())
                .or_insert_with(|| symmetric_transition(n, self.cross.same_origin(r)));
            keys.push(r.to_bits());
        }
        let transitions: Vec<&DMatrix<f64>> = keys.iter().map(|k| &cache[k]).collect();
        let init = DVector::from_element(n, 1.0 / n as f64);

        let mut cube =
            ProbCube::new(chromosome.n_finals(), grid.len(), n, CubeLayout::PositionMajor);
        for row in 0..chromosome.n_finals() {
            self.ctx.cancel.check()?;
            if chromosome.is_empty_row(row) {
                continue;
            }

            let emissions: Vec<DVector<f64>> = chain
                .markers
                .iter()
                .map(|link| match link {
                    Some(m) => {
                        self.ctx
                            .emission
                            .marker_likelihoods(chromosome, row, *m, n_alleles[*m])
                    }
                    None => DVector::from_element(n, 1.0),
                })
                .collect();

            match forward_backward(&init, &transitions, &emissions) {
                Some(posterior) => {
                    for (q, &link) in chain.grid_links.iter().enumerate() {
                        cube.set_block(row, q, posterior.probs[link].as_slice());
                    }
                }
                None => log::warn!(
                    "Genotypes of '{}' on chromosome '{}' are impossible under the model",
                    self.ctx.final_ids[row],
                    chromosome.map.name()
                ),
            }
        }

        Ok(cube)
    }
}
