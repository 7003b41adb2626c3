//! Probability Backend: founder-origin probabilities for one chromosome.
//!
//! Three strategies implement [`ProbabilityBackend`]; [`Strategy`] selects
//! one. Each strategy is compiled in through a cargo feature of the same name.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

use super::cancel::CancelToken;
use super::cube::{CubeLayout, ProbCube};
use super::emission::EmissionModel;
use super::grid::PositionGrid;
use crate::data::cross::ChromosomeData;
use crate::data::map::ChromosomeMap;
use crate::error::{MpError, Result};
use crate::genetics::classify::Classification;
use crate::genetics::mapfn::MapFunction;

#[cfg(feature = "haplotype")]
pub mod haplotype;
#[cfg(feature = "internal")]
pub mod internal;
#[cfg(feature = "multipoint")]
pub mod multipoint;

/// How founder-origin probabilities are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Three-point probabilities from the flanking markers of each position,
    /// using the design of each individual.
    Internal,
    /// Forward-backward along the whole chromosome under the recombinant
    /// inbred model of a single design.
    #[default]
    Multipoint,
    /// Haplotype reconstruction with a generation-count hidden Markov model;
    /// reports interval midpoints only.
    Haplotype,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Internal, Strategy::Multipoint, Strategy::Haplotype];

    /// Name of the cargo feature providing this strategy.
    pub fn capability(self) -> &'static str {
        match self {
            Strategy::Internal => "internal",
            Strategy::Multipoint => "multipoint",
            Strategy::Haplotype => "haplotype",
        }
    }

    /// Whether the strategy was compiled in.
    pub fn is_available(self) -> bool {
        match self {
            Strategy::Internal => cfg!(feature = "internal"),
            Strategy::Multipoint => cfg!(feature = "multipoint"),
            Strategy::Haplotype => cfg!(feature = "haplotype"),
        }
    }

    fn missing(self) -> MpError {
        MpError::MissingCapability {
            capability: format!(
                "{} strategy (build with cargo feature '{}')",
                self,
                self.capability()
            ),
        }
    }

    /// `MissingCapability` unless `available`.
    fn require(self, available: bool) -> Result<()> {
        if available {
            Ok(())
        } else {
            Err(self.missing())
        }
    }

    /// Instantiate the backend.
    ///
    /// # Errors
    /// Returns `MissingCapability` if the strategy was compiled out, or the
    /// strategy's own setup error (e.g. `MixedDesign` for multipoint).
    pub fn backend<'a>(self, ctx: BackendContext<'a>) -> Result<Box<dyn ProbabilityBackend + 'a>> {
        self.require(self.is_available())?;
        match self {
            #[cfg(feature = "internal")]
            Strategy::Internal => Ok(Box::new(internal::InternalBackend::new(ctx)?)),
            #[cfg(feature = "multipoint")]
            Strategy::Multipoint => Ok(Box::new(multipoint::MultipointBackend::new(ctx)?)),
            #[cfg(feature = "haplotype")]
            Strategy::Haplotype => Ok(Box::new(haplotype::HaplotypeBackend::new(ctx)?)),
            #[allow(unreachable_patterns)]
            other => {
                drop(ctx);
                Err(other.missing())
            }
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.capability())
    }
}

impl FromStr for Strategy {
    type Err = MpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "internal" | "mpmap" => Ok(Strategy::Internal),
            "multipoint" | "qtl" => Ok(Strategy::Multipoint),
            "haplotype" | "happy" => Ok(Strategy::Haplotype),
            other => Err(MpError::InvalidParameter(format!(
                "Unknown strategy '{}'. Use 'internal', 'multipoint' or 'haplotype'.",
                other
            ))),
        }
    }
}

/// Everything a backend needs besides the chromosome being computed.
#[derive(Debug, Clone)]
pub struct BackendContext<'a> {
    pub classification: &'a Classification,
    /// Founder IDs in founder-matrix row order.
    pub founder_ids: &'a [String],
    /// Final individual IDs in final-matrix row order.
    pub final_ids: &'a [String],
    pub map_function: MapFunction,
    pub emission: EmissionModel,
    /// Overrides the generation count derived from the design.
    pub generations: Option<u32>,
    /// Where to keep the flat design files of the haplotype strategy.
    pub design_dir: Option<PathBuf>,
    pub cancel: CancelToken,
}

/// One founder-probability computation strategy.
pub trait ProbabilityBackend: Send + Sync {
    fn strategy(&self) -> Strategy;

    /// The positions this backend reports for a chromosome.
    ///
    /// The default grid always includes the markers; stripping them is left
    /// to the normalizer.
    fn grid(&self, map: &ChromosomeMap, step: f64) -> Result<PositionGrid> {
        PositionGrid::build(map, step, true)
    }

    /// Probabilities for every final individual at every position of `grid`.
    fn compute(&self, chromosome: &ChromosomeData<'_>, grid: &PositionGrid) -> Result<ProbCube>;
}

/// Founder probabilities by allele identity, one block per marker.
///
/// Each founder carrying the observed allele gets `1 / k`, where `k` founders
/// carry it; everyone else gets 0. A missing call, or an allele no founder
/// carries, leaves the block undefined.
pub fn allele_lookup(chromosome: &ChromosomeData<'_>) -> ProbCube {
    let n = chromosome.n_founders();
    let mut cube = ProbCube::new(
        chromosome.n_finals(),
        chromosome.n_markers(),
        n,
        CubeLayout::PositionMajor,
    );

    for m in 0..chromosome.n_markers() {
        let founders = chromosome.founder_alleles.column(m);
        for row in 0..chromosome.n_finals() {
            let Some(observed) = chromosome.final_alleles[(row, m)] else {
                continue;
            };
            let carriers: Vec<usize> = (0..n).filter(|&f| founders[f] == Some(observed)).collect();
            if carriers.is_empty() {
                continue;
            }
            let p = 1.0 / carriers.len() as f64;
            let mut block = vec![0.0; n];
            for f in carriers {
                block[f] = p;
            }
            cube.set_block(row, m, &block);
        }
    }
    cube
}
