//! Orchestration: grid, backend, normalizer and caller for every chromosome.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use rayon::prelude::*;

use super::backend::{allele_lookup, BackendContext, ProbabilityBackend, Strategy};
use super::cancel::CancelToken;
use super::cube::{CubeLayout, ProbCube};
use super::emission::EmissionModel;
use super::grid::PositionGrid;
use super::matrix::FounderProbMatrix;
use super::normalize::{assemble, keep_markers, normalize};
use super::result::{FounderProbs, ProbMetadata};
use crate::data::cross::{ChromosomeData, MpCross};
use crate::error::{MpError, Result};
use crate::genetics::classify::{classify, Classification};
use crate::genetics::mapfn::MapFunction;

/// Builder for a founder-probability computation over an [`MpCross`].
pub struct FounderProbBuilder<'a> {
    cross: &'a MpCross,
    step: f64,
    include_markers: bool,
    map_function: MapFunction,
    strategy: Strategy,
    threshold: f64,
    error_prob: f64,
    generations: Option<u32>,
    chromosomes: Option<Vec<String>>,
    deadline: Option<Duration>,
    cancel: CancelToken,
    use_ibd: bool,
    design_dir: Option<PathBuf>,
}

impl<'a> FounderProbBuilder<'a> {
    pub fn new(cross: &'a MpCross) -> Self {
        Self {
            cross,
            step: 0.0,
            include_markers: true,
            map_function: MapFunction::Haldane,
            strategy: Strategy::default(),
            threshold: 0.7,
            error_prob: 1e-4,
            generations: None,
            chromosomes: None,
            deadline: None,
            cancel: CancelToken::new(),
            use_ibd: false,
            design_dir: None,
        }
    }

    /// Step size in cM (default: 0, markers only). Negative means interval
    /// midpoints.
    pub fn step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    /// Keep marker positions on a stepped grid (default: true).
    pub fn include_markers(mut self, include: bool) -> Self {
        self.include_markers = include;
        self
    }

    /// Default: Haldane.
    pub fn map_function(mut self, f: MapFunction) -> Self {
        self.map_function = f;
        self
    }

    /// Default: multipoint.
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Calling threshold (default: 0.7).
    pub fn threshold(mut self, t: f64) -> Self {
        self.threshold = t;
        self
    }

    /// Genotyping error probability (default: 1e-4).
    pub fn error_prob(mut self, e: f64) -> Self {
        self.error_prob = e;
        self
    }

    /// Override the generation count derived from the design.
    pub fn generations(mut self, g: u32) -> Self {
        self.generations = Some(g);
        self
    }

    /// Restrict to these chromosomes; output follows this order.
    pub fn chromosomes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.chromosomes = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Abort with `DeadlineExceeded` once a run takes longer than `limit`.
    pub fn deadline(mut self, limit: Duration) -> Self {
        self.deadline = Some(limit);
        self
    }

    /// Share a cancellation token with the caller.
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Take probabilities from the IBD truth of the cross instead of a backend.
    pub fn use_ibd(mut self, yes: bool) -> Self {
        self.use_ibd = yes;
        self
    }

    /// Export the flat design of each chromosome here (haplotype strategy).
    pub fn design_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.design_dir = Some(dir.into());
        self
    }

    /// Validate the options and classify the pedigree.
    ///
    /// The selected backend is instantiated once here so that capability and
    /// design errors surface before any computation.
    pub fn build(self) -> Result<FounderProbJob<'a>> {
        if !self.step.is_finite() {
            return Err(MpError::InvalidParameter(format!(
                "step must be finite, got {}",
                self.step
            )));
        }
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(MpError::InvalidParameter(format!(
                "threshold must be in (0, 1], got {}",
                self.threshold
            )));
        }
        let emission = EmissionModel::new(self.error_prob)?;
        if self.generations == Some(0) {
            return Err(MpError::InvalidParameter(
                "generations must be at least 1".into(),
            ));
        }

        let map = self.cross.map();
        let chromosomes = match self.chromosomes {
            Some(names) => {
                if names.is_empty() {
                    return Err(MpError::InvalidParameter("no chromosomes requested".into()));
                }
                let mut seen = HashSet::new();
                for name in &names {
                    if map.get(name).is_none() {
                        return Err(MpError::Config(format!("Unknown chromosome '{}'", name)));
                    }
                    if !seen.insert(name.as_str()) {
                        return Err(MpError::InvalidParameter(format!(
                            "chromosome '{}' requested twice",
                            name
                        )));
                    }
                }
                names
            }
            None => map.chromosome_names().into_iter().map(String::from).collect(),
        };

        let mut step = self.step;
        let classification = if self.use_ibd {
            if self.cross.ibd().is_none() {
                return Err(MpError::Config(
                    "IBD probabilities requested but the cross has no IBD matrix".into(),
                ));
            }
            if step != 0.0 {
                log::info!("IBD truth is defined at markers only; step {} ignored", step);
                step = 0.0;
            }
            None
        } else {
            let pedigree = self.cross.pedigree().with_observed(self.cross.final_ids());
            let cls = classify(&pedigree, self.cross.founder_ids())?;
            let ctx = BackendContext {
                classification: &cls,
                founder_ids: self.cross.founder_ids(),
                final_ids: self.cross.final_ids(),
                map_function: self.map_function,
                emission,
                generations: self.generations,
                design_dir: self.design_dir.clone(),
                cancel: self.cancel.clone(),
            };
            self.strategy.backend(ctx)?;
            Some(cls)
        };

        let mut include_markers = self.include_markers;
        if classification.is_some() && self.strategy == Strategy::Haplotype {
            if step >= 0.0 {
                log::info!("Haplotype strategy reports interval midpoints; step {} ignored", step);
                step = -1.0;
            }
            include_markers = false;
        }

        Ok(FounderProbJob {
            cross: self.cross,
            step,
            include_markers,
            map_function: self.map_function,
            strategy: self.strategy,
            threshold: self.threshold,
            emission,
            generations: self.generations,
            chromosomes,
            deadline: self.deadline,
            cancel: self.cancel,
            design_dir: self.design_dir,
            classification,
        })
    }
}

/// A validated, runnable founder-probability computation.
pub struct FounderProbJob<'a> {
    cross: &'a MpCross,
    step: f64,
    include_markers: bool,
    map_function: MapFunction,
    strategy: Strategy,
    threshold: f64,
    emission: EmissionModel,
    generations: Option<u32>,
    chromosomes: Vec<String>,
    deadline: Option<Duration>,
    cancel: CancelToken,
    design_dir: Option<PathBuf>,
    classification: Option<Classification>,
}

impl<'a> FounderProbJob<'a> {
    /// `None` when probabilities come from IBD truth.
    pub fn classification(&self) -> Option<&Classification> {
        self.classification.as_ref()
    }

    pub fn chromosomes(&self) -> &[String] {
        &self.chromosomes
    }

    /// Cancels a running [`run`](Self::run) from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Compute probabilities and calls for every requested chromosome.
    ///
    /// Chromosomes run in parallel; multi-marker chromosomes are scheduled
    /// before single-marker ones, and the result follows the requested order.
    pub fn run(&self) -> Result<FounderProbs> {
        let cancel = match self.deadline {
            Some(limit) => self.cancel.clone().with_deadline(limit),
            None => self.cancel.clone(),
        };

        let backend = match &self.classification {
            Some(cls) => Some(self.strategy.backend(BackendContext {
                classification: cls,
                founder_ids: self.cross.founder_ids(),
                final_ids: self.cross.final_ids(),
                map_function: self.map_function,
                emission: self.emission,
                generations: self.generations,
                design_dir: self.design_dir.clone(),
                cancel: cancel.clone(),
            })?),
            None => None,
        };

        let map = self.cross.map();
        let (multi, single): (Vec<&String>, Vec<&String>) = self
            .chromosomes
            .iter()
            .partition(|name| !map.get(name).map_or(false, |c| c.is_single_marker()));
        let order: Vec<&String> = multi.into_iter().chain(single).collect();

        let computed = order
            .par_iter()
            .map(|name| self.run_chromosome(name, backend.as_deref(), &cancel))
            .collect::<Result<Vec<FounderProbMatrix>>>()?;

        let probabilities = assemble(&self.chromosomes, computed)?;
        let metadata = ProbMetadata {
            step: self.step,
            strategy: backend.as_ref().map(|b| b.strategy()),
            from_ibd: backend.is_none(),
            map_function: self.map_function,
            include_markers: self.include_markers,
            error_prob: self.emission.error_prob(),
            n_founders: self.cross.n_founders(),
            threshold: self.threshold,
        };
        FounderProbs::new(metadata, probabilities)
    }

    fn run_chromosome(
        &self,
        name: &str,
        backend: Option<&dyn ProbabilityBackend>,
        cancel: &CancelToken,
    ) -> Result<FounderProbMatrix> {
        cancel.check()?;
        let chr = self.cross.chromosome(name)?;
        let finals = self.cross.final_ids();
        log::info!("Chromosome '{}': {} markers", name, chr.n_markers());

        let empty = (0..chr.n_finals()).filter(|&r| chr.is_empty_row(r)).count();
        if empty > 0 {
            log::warn!(
                "{} individuals have no genotype calls on chromosome '{}'",
                empty,
                name
            );
        }

        let Some(backend) = backend else {
            log::debug!("Chromosome '{}': probabilities from IBD truth", name);
            let (grid, cube) = self.ibd_cube(&chr)?;
            return normalize(&cube, &grid, finals, true);
        };

        if chr.map.is_single_marker() {
            log::info!("Chromosome '{}' has a single marker; using allele lookup", name);
            let grid = PositionGrid::markers_only(chr.map);
            return normalize(&allele_lookup(&chr), &grid, finals, true);
        }
        if chr.is_monomorphic() {
            log::warn!(
                "Chromosome '{}' is monomorphic among founders; probabilities carry no information",
                name
            );
        }

        let grid = backend.grid(chr.map, self.step)?;
        log::debug!(
            "Chromosome '{}': grid of {} markers and {} interstitial positions",
            name,
            grid.n_markers(),
            grid.n_interstitial()
        );
        let cube = backend.compute(&chr, &grid)?;
        let keep = keep_markers(self.include_markers, self.step, false);
        let probs = normalize(&cube, &grid, finals, keep)?;
        log::info!(
            "Chromosome '{}' done: {} positions, {:.1}% undefined",
            name,
            probs.n_positions(),
            100.0 * probs.undefined_fraction()
        );
        Ok(probs)
    }

    /// One-hot probabilities at the markers from the IBD matrix.
    fn ibd_cube(&self, chr: &ChromosomeData<'_>) -> Result<(PositionGrid, ProbCube)> {
        let ibd = self
            .cross
            .ibd()
            .ok_or_else(|| MpError::Internal("IBD matrix disappeared".into()))?;
        let grid = PositionGrid::markers_only(chr.map);
        let n = chr.n_founders();
        let mut cube = ProbCube::new(chr.n_finals(), grid.len(), n, CubeLayout::PositionMajor);
        for (q, marker) in chr.map.markers().iter().enumerate() {
            let col = ibd.marker_index(&marker.name).ok_or_else(|| {
                MpError::MarkerMismatch(format!(
                    "Marker '{}' is missing from the IBD matrix",
                    marker.name
                ))
            })?;
            for row in 0..chr.n_finals() {
                if let Some(f) = ibd.get(row, col) {
                    let mut block = vec![0.0; n];
                    block[f - 1] = 1.0;
                    cube.set_block(row, q, &block);
                }
            }
        }
        Ok((grid, cube))
    }
}
