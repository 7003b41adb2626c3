//! Haplotype reconstruction over a flat design.
//!
//! The chromosome is first flattened into a [`HappyDesign`]: a per-marker
//! table of allele probabilities for each founder and a per-individual
//! genotype table. An ancestral-segment hidden Markov model then runs over the
//! markers, with the chance of staying on the same founder over `d` cM set by
//! the assumed number of generations `g` as `exp(-g * d / 100)`. Probabilities
//! are reported at interval midpoints only.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use nalgebra::{DMatrix, DVector};

use super::{BackendContext, ProbabilityBackend, Strategy};
use crate::data::cross::ChromosomeData;
use crate::data::map::ChromosomeMap;
use crate::error::{MpError, Result};
use crate::prob::cube::{CubeLayout, ProbCube};
use crate::prob::emission::distinct_alleles;
use crate::prob::grid::PositionGrid;
use crate::prob::hmm::{forward_backward, PositionChain};
use crate::types::Allele;

/// One marker of a flat design.
#[derive(Debug, Clone)]
pub struct HappyMarker {
    pub name: String,
    pub position: f64,
    pub alleles: Vec<Allele>,
    /// `probs[(a, f)]`: probability that founder `f` carries allele `a`.
    pub probs: DMatrix<f64>,
}

/// A chromosome flattened into founder allele tables and a genotype table.
#[derive(Debug, Clone)]
pub struct HappyDesign {
    pub chromosome: String,
    pub founders: Vec<String>,
    pub markers: Vec<HappyMarker>,
    pub individuals: Vec<String>,
    /// Individuals x markers.
    pub genotypes: DMatrix<Option<Allele>>,
    pub generations: u32,
}

impl HappyDesign {
    pub fn from_chromosome(
        chromosome: &ChromosomeData<'_>,
        founders: &[String],
        individuals: &[String],
        generations: u32,
    ) -> Self {
        let n = chromosome.n_founders();
        let markers = chromosome
            .map
            .markers()
            .iter()
            .enumerate()
            .map(|(m, marker)| {
                let column = chromosome.founder_alleles.column(m);
                let alleles = distinct_alleles(column.iter().copied());
                let k = alleles.len().max(1) as f64;
                let probs = DMatrix::from_fn(alleles.len(), n, |a, f| match column[f] {
                    Some(x) if x == alleles[a] => 1.0,
                    Some(_) => 0.0,
                    None => 1.0 / k,
                });
                HappyMarker {
                    name: marker.name.clone(),
                    position: marker.position,
                    alleles,
                    probs,
                }
            })
            .collect();

        Self {
            chromosome: chromosome.map.name().to_string(),
            founders: founders.to_vec(),
            markers,
            individuals: individuals.to_vec(),
            genotypes: chromosome.final_alleles.clone(),
            generations,
        }
    }

    pub fn n_founders(&self) -> usize {
        self.founders.len()
    }

    /// Probability that `founder` carries `allele` at `marker`.
    pub fn allele_prob(&self, marker: usize, allele: Allele, founder: usize) -> f64 {
        let m = &self.markers[marker];
        m.alleles
            .iter()
            .position(|&a| a == allele)
            .map_or(0.0, |a| m.probs[(a, founder)])
    }

    /// Likelihood of the call of `row` at `marker` for each founder, with
    /// genotyping error `error_prob` spread over the other alleles.
    pub fn emission(&self, row: usize, marker: usize, error_prob: f64) -> DVector<f64> {
        let n = self.n_founders();
        let Some(observed) = self.genotypes[(row, marker)] else {
            return DVector::from_element(n, 1.0);
        };
        let k = self.markers[marker].alleles.len().max(2) as f64;
        DVector::from_fn(n, |f, _| {
            let p = self.allele_prob(marker, observed, f);
            (1.0 - error_prob) * p + error_prob * (1.0 - p) / (k - 1.0)
        })
    }

    /// Write `<prefix>.alleles` and `<prefix>.data` into `dir`.
    ///
    /// Files are written into a scratch directory inside `dir` and moved into
    /// place once complete; the scratch directory is removed on every path.
    ///
    /// # Errors
    /// Returns `Io` if the files cannot be written.
    pub fn write(&self, dir: &Path, prefix: &str) -> Result<(PathBuf, PathBuf)> {
        let scratch = tempfile::Builder::new().prefix(".happy-").tempdir_in(dir)?;

        let alleles_name = format!("{}.alleles", prefix);
        let data_name = format!("{}.data", prefix);

        let mut w = BufWriter::new(File::create(scratch.path().join(&alleles_name))?);
        self.write_alleles(&mut w)?;
        w.flush()?;
        drop(w);

        let mut w = BufWriter::new(File::create(scratch.path().join(&data_name))?);
        self.write_data(&mut w)?;
        w.flush()?;
        drop(w);

        let alleles_path = dir.join(&alleles_name);
        let data_path = dir.join(&data_name);
        std::fs::rename(scratch.path().join(&alleles_name), &alleles_path)?;
        std::fs::rename(scratch.path().join(&data_name), &data_path)?;
        Ok((alleles_path, data_path))
    }

    fn write_alleles<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        writeln!(
            w,
            "markers {} strains {}",
            self.markers.len(),
            self.n_founders()
        )?;
        writeln!(w, "strain_names {}", self.founders.join(" "))?;
        for m in &self.markers {
            writeln!(
                w,
                "marker {} {} {} {}",
                m.name,
                m.alleles.len(),
                self.chromosome,
                m.position
            )?;
            for (a, allele) in m.alleles.iter().enumerate() {
                let probs: Vec<String> = m.probs.row(a).iter().map(|p| format!("{}", p)).collect();
                writeln!(w, "allele {} {}", allele, probs.join(" "))?;
            }
        }
        Ok(())
    }

    fn write_data<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        for (row, id) in self.individuals.iter().enumerate() {
            write!(w, "{} NA", id)?;
            for call in self.genotypes.row(row).iter() {
                match call {
                    // Inbred lines: both haplotypes carry the same allele.
                    Some(a) => write!(w, " {} {}", a, a)?,
                    None => write!(w, " NA NA")?,
                }
            }
            writeln!(w)?;
        }
        Ok(())
    }
}

pub struct HaplotypeBackend<'a> {
    ctx: BackendContext<'a>,
    generations: u32,
}

impl<'a> HaplotypeBackend<'a> {
    /// # Errors
    /// Returns `InvalidParameter` for a zero generation count, and the design
    /// errors of [`uniform_design`] when no count is given.
    ///
    /// [`uniform_design`]: crate::genetics::Classification::uniform_design
    pub fn new(ctx: BackendContext<'a>) -> Result<Self> {
        let generations = match ctx.generations {
            Some(g) => g,
            None => ctx.classification.uniform_design()?.total_generations(),
        };
        if generations == 0 {
            return Err(MpError::InvalidParameter(
                "the haplotype strategy needs at least one generation".into(),
            ));
        }
        if let Some(dir) = &ctx.design_dir {
            if !dir.is_dir() {
                return Err(MpError::Config(format!(
                    "design directory '{}' does not exist",
                    dir.display()
                )));
            }
        }
        log::info!("Haplotype model with {} generations", generations);
        Ok(Self { ctx, generations })
    }

    pub fn generations(&self) -> u32 {
        self.generations
    }

    fn transition(&self, n: usize, cm: f64) -> DMatrix<f64> {
        let stay = (-(self.generations as f64) * cm.abs() / 100.0).exp();
        let jump = (1.0 - stay) / n as f64;
        DMatrix::from_fn(n, n, |i, j| if i == j { stay + jump } else { jump })
    }
}

impl ProbabilityBackend for HaplotypeBackend<'_> {
    fn strategy(&self) -> Strategy {
        Strategy::Haplotype
    }

    fn grid(&self, map: &ChromosomeMap, step: f64) -> Result<PositionGrid> {
        if step >= 0.0 {
            log::debug!(
                "Haplotype strategy reports interval midpoints; step {} ignored on '{}'",
                step,
                map.name()
            );
        }
        PositionGrid::build(map, -1.0, false)
    }

    fn compute(&self, chromosome: &ChromosomeData<'_>, grid: &PositionGrid) -> Result<ProbCube> {
        let n = chromosome.n_founders();
        let design = HappyDesign::from_chromosome(
            chromosome,
            self.ctx.founder_ids,
            self.ctx.final_ids,
            self.generations,
        );
        if let Some(dir) = &self.ctx.design_dir {
            let (alleles, _) = design.write(dir, chromosome.map.name())?;
            log::debug!("Wrote flat design to {}", alleles.display());
        }

        let chain = PositionChain::new(chromosome.map, grid);
        let mut cache: HashMap<u64, DMatrix<f64>> = HashMap::new();
        let mut keys = Vec::with_capacity(chain.len().saturating_sub(1));
        for i in 0..chain.len().saturating_sub(1) {
            let gap = chain.gap(i);
            cache
                .entry(gap.to_bits())
                .or_insert_with(|| self.transition(n, gap));
            keys.push(gap.to_bits());
        }
        let transitions: Vec<&DMatrix<f64>> = keys.iter().map(|k| &cache[k]).collect();
        let init = DVector::from_element(n, 1.0 / n as f64);
        let error_prob = self.ctx.emission.error_prob();

        let mut cube =
            ProbCube::new(chromosome.n_finals(), grid.len(), n, CubeLayout::FounderMajor);
        for row in 0..chromosome.n_finals() {
            self.ctx.cancel.check()?;
            if chromosome.is_empty_row(row) {
                continue;
            }
            let emissions: Vec<DVector<f64>> = chain
                .markers
                .iter()
                .map(|link| match link {
                    Some(m) => design.emission(row, *m, error_prob),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::map::MapMarker;
    use crate::genetics::classify::{classify, Classification};
    use crate::genetics::mapfn::MapFunction;
    use crate::genetics::pedigree::{Pedigree, PedigreeEntry};
    use crate::prob::cancel::CancelToken;
    use crate::prob::emission::EmissionModel;
    use crate::prob::grid::PositionKind;
    use approx::assert_relative_eq;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn classification() -> Classification {
        let ped = Pedigree::from_entries(&[
            PedigreeEntry::founder("A"),
            PedigreeEntry::founder("B"),
            PedigreeEntry::founder("C"),
            PedigreeEntry::founder("D"),
            PedigreeEntry::cross("AB", "A", "B"),
            PedigreeEntry::cross("CD", "C", "D"),
            PedigreeEntry::cross("X", "AB", "CD"),
            PedigreeEntry::cross("S1", "X", "X"),
            PedigreeEntry::cross("L1", "S1", "S1").observed(),
        ])
        .unwrap();
        classify(&ped, &ids(&["A", "B", "C", "D"])).unwrap()
    }

    fn map() -> ChromosomeMap {
        ChromosomeMap::new(
            "2",
            vec![
                MapMarker::new("a", 0.0),
                MapMarker::new("b", 4.0),
                MapMarker::new("c", 10.0),
            ],
        )
        .unwrap()
    }

    fn chromosome(map: &ChromosomeMap) -> ChromosomeData<'_> {
        ChromosomeData {
            map,
            founder_alleles: DMatrix::from_row_slice(
                4,
                3,
                &[
                    Some(1), Some(0), Some(1),
                    Some(0), Some(1), Some(0),
                    Some(0), Some(0), None,
                    Some(0), Some(0), Some(0),
                ],
            ),
            final_alleles: DMatrix::from_row_slice(1, 3, &[Some(1), Some(0), Some(1)]),
        }
    }

    fn context<'a>(
        cls: &'a Classification,
        f: &'a [String],
        l: &'a [String],
    ) -> BackendContext<'a> {
        BackendContext {
            classification: cls,
            founder_ids: f,
            final_ids: l,
            map_function: MapFunction::Haldane,
            emission: EmissionModel::new(0.01).unwrap(),
            generations: None,
            design_dir: None,
            cancel: CancelToken::new(),
        }
    }

    #[test]
    fn test_design_tables() {
        let map = map();
        let chr = chromosome(&map);
        let d = HappyDesign::from_chromosome(&chr, &ids(&["A", "B", "C", "D"]), &ids(&["L1"]), 4);
        assert_eq!(d.markers[0].alleles, vec![1, 0]);
        assert_eq!(d.allele_prob(0, 1, 0), 1.0);
        assert_eq!(d.allele_prob(0, 1, 1), 0.0);
        // Founder C is missing at marker c.
        assert_eq!(d.allele_prob(2, 1, 2), 0.5);
        assert_eq!(d.allele_prob(2, 7, 0), 0.0);
        for m in &d.markers {
            for f in 0..4 {
                assert_relative_eq!(m.probs.column(f).sum(), 1.0);
            }
        }
        let e = d.emission(0, 0, 0.01);
        assert_relative_eq!(e[0], 0.99);
        assert_relative_eq!(e[1], 0.01);
    }

    #[test]
    fn test_generations_from_design() {
        let cls = classification();
        let (f, l) = (ids(&["A", "B", "C", "D"]), ids(&["L1"]));
        let backend = HaplotypeBackend::new(context(&cls, &f, &l)).unwrap();
        // Two funnel generations plus two of selfing.
        assert_eq!(backend.generations(), 4);

        let mut ctx = context(&cls, &f, &l);
        ctx.generations = Some(0);
        assert!(HaplotypeBackend::new(ctx).is_err());
    }

    #[test]
    fn test_midpoints_only() {
        let cls = classification();
        let (f, l) = (ids(&["A", "B", "C", "D"]), ids(&["L1"]));
        let backend = HaplotypeBackend::new(context(&cls, &f, &l)).unwrap();
        let map = map();
        let grid = backend.grid(&map, 5.0).unwrap();
        assert_eq!(grid.len(), 2);
        assert!(grid.iter().all(|p| p.kind == PositionKind::Midpoint));
        assert_eq!(grid.names(), vec!["a-b", "b-c"]);

        let cube = backend.compute(&chromosome(&map), &grid).unwrap();
        assert_eq!(cube.layout(), CubeLayout::FounderMajor);
        for q in 0..2 {
            let block: Vec<f64> = (0..4).map(|k| cube.get(0, q, k)).collect();
            assert_relative_eq!(block.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        }
        // Founder A matches the call at every marker.
        assert!(cube.get(0, 0, 0) > cube.get(0, 0, 1));
        assert!(cube.get(0, 1, 0) > cube.get(0, 1, 3));
    }

    #[test]
    fn test_transition_rows_sum_to_one() {
        let cls = classification();
        let (f, l) = (ids(&["A", "B", "C", "D"]), ids(&["L1"]));
        let backend = HaplotypeBackend::new(context(&cls, &f, &l)).unwrap();
        let t = backend.transition(4, 7.5);
        for i in 0..4 {
            assert_relative_eq!(t.row(i).sum(), 1.0, epsilon = 1e-12);
        }
        assert_relative_eq!(backend.transition(4, 0.0)[(0, 0)], 1.0);
    }

    #[test]
    fn test_write_design_files() {
        let dir = tempfile::tempdir().unwrap();
        let map = map();
        let chr = chromosome(&map);
        let d = HappyDesign::from_chromosome(&chr, &ids(&["A", "B", "C", "D"]), &ids(&["L1"]), 4);
        let (alleles, data) = d.write(dir.path(), "chr2").unwrap();

        let text = std::fs::read_to_string(&alleles).unwrap();
        assert!(text.starts_with("markers 3 strains 4\nstrain_names A B C D\n"));
        assert!(text.contains("marker c 2 2 10\n"));
        assert!(text.contains("allele 1 1 0 0.5 0\n"));
        assert_eq!(std::fs::read_to_string(&data).unwrap(), "L1 NA 1 1 0 0 1 1\n");

        // Only the two finished files remain.
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 2);
    }
}
