use nalgebra::DMatrix;

use super::genotypes::GenotypeMatrix;
use super::ibd::IbdMatrix;
use super::map::{ChromosomeMap, GeneticMap};
use crate::error::{MpError, Result};
use crate::genetics::design::FounderCount;
use crate::genetics::pedigree::Pedigree;
use crate::types::Allele;

/// The read-only inputs of a founder-probability computation.
///
/// Bundles founder and final genotypes, the pedigree, the genetic map and an
/// optional IBD truth matrix, and checks on construction that they agree with
/// each other. The engine only ever borrows an `MpCross`.
#[derive(Debug, Clone)]
pub struct MpCross {
    founders: GenotypeMatrix,
    finals: GenotypeMatrix,
    pedigree: Pedigree,
    map: GeneticMap,
    ibd: Option<IbdMatrix>,
}

/// Genotypes of one chromosome, restricted to its mapped markers in map order.
#[derive(Debug, Clone)]
pub struct ChromosomeData<'a> {
    pub map: &'a ChromosomeMap,
    /// Founders x markers.
    pub founder_alleles: DMatrix<Option<Allele>>,
    /// Final individuals x markers.
    pub final_alleles: DMatrix<Option<Allele>>,
}

impl<'a> ChromosomeData<'a> {
    pub fn n_markers(&self) -> usize {
        self.map.len()
    }

    pub fn n_founders(&self) -> usize {
        self.founder_alleles.nrows()
    }

    pub fn n_finals(&self) -> usize {
        self.final_alleles.nrows()
    }

    /// Whether final individual `row` has no call on this chromosome.
    pub fn is_empty_row(&self, row: usize) -> bool {
        self.final_alleles.row(row).iter().all(|a| a.is_none())
    }

    /// Whether every marker has at most one distinct founder allele.
    pub fn is_monomorphic(&self) -> bool {
        (0..self.n_markers()).all(|m| {
            let mut seen: Option<Allele> = None;
            self.founder_alleles.column(m).iter().flatten().all(|&a| match seen {
                None => {
                    seen = Some(a);
                    true
                }
                Some(s) => s == a,
            })
        })
    }
}

impl MpCross {
    /// # Errors
    /// - `UnsupportedDesign` unless there are 4 or 8 founders.
    /// - `MarkerMismatch` when founder and final matrices disagree on markers,
    ///   or a mapped marker has no genotype column.
    /// - `Pedigree` when a founder or final individual is not in the pedigree.
    pub fn new(
        founders: GenotypeMatrix,
        finals: GenotypeMatrix,
        pedigree: Pedigree,
        map: GeneticMap,
    ) -> Result<Self> {
        FounderCount::from_count(founders.n_rows())?;

        if !founders.same_markers(&finals) {
            return Err(MpError::MarkerMismatch(format!(
                "founder matrix has {} markers, final matrix has {}; \
                 both must list the same markers in the same order",
                founders.n_markers(),
                finals.n_markers()
            )));
        }

        let missing: Vec<&str> = map
            .iter()
            .flat_map(|c| c.markers())
            .map(|m| m.name.as_str())
            .filter(|name| founders.marker_index(name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(MpError::MarkerMismatch(format!(
                "{} mapped marker(s) have no genotype column (first: '{}')",
                missing.len(),
                missing[0]
            )));
        }
        let unmapped = founders.n_markers().saturating_sub(map.n_markers());
        if unmapped > 0 {
            log::debug!("{} genotyped markers are not on the map and are ignored", unmapped);
        }

        for id in founders.ids() {
            if pedigree.index(id).is_none() {
                return Err(MpError::Pedigree(format!(
                    "Founder '{}' is not in the pedigree",
                    id
                )));
            }
        }
        for id in finals.ids() {
            if pedigree.index(id).is_none() {
                return Err(MpError::Pedigree(format!(
                    "Final individual '{}' is not in the pedigree",
                    id
                )));
            }
        }

        Ok(Self {
            founders,
            finals,
            pedigree,
            map,
            ibd: None,
        })
    }

    /// Attach founder-of-origin truth.
    ///
    /// # Errors
    /// Returns an error when the IBD rows are not the final individuals in
    /// order, a mapped marker is missing, or a founder index is out of range.
    pub fn with_ibd(mut self, ibd: IbdMatrix) -> Result<Self> {
        if ibd.ids() != self.finals.ids() {
            return Err(MpError::Data(
                "IBD matrix rows must be the final individuals in the same order".into(),
            ));
        }
        if let Some(m) = self
            .map
            .iter()
            .flat_map(|c| c.markers())
            .find(|m| ibd.marker_index(&m.name).is_none())
        {
            return Err(MpError::MarkerMismatch(format!(
                "Mapped marker '{}' is missing from the IBD matrix",
                m.name
            )));
        }
        if ibd.max_founder() > self.n_founders() {
            return Err(MpError::Data(format!(
                "IBD matrix refers to founder {} but there are only {} founders",
                ibd.max_founder(),
                self.n_founders()
            )));
        }
        self.ibd = Some(ibd);
        Ok(self)
    }

    pub fn founders(&self) -> &GenotypeMatrix {
        &self.founders
    }

    pub fn finals(&self) -> &GenotypeMatrix {
        &self.finals
    }

    pub fn pedigree(&self) -> &Pedigree {
        &self.pedigree
    }

    pub fn map(&self) -> &GeneticMap {
        &self.map
    }

    pub fn ibd(&self) -> Option<&IbdMatrix> {
        self.ibd.as_ref()
    }

    pub fn n_founders(&self) -> usize {
        self.founders.n_rows()
    }

    pub fn founder_ids(&self) -> &[String] {
        self.founders.ids()
    }

    pub fn final_ids(&self) -> &[String] {
        self.finals.ids()
    }

    /// Genotypes of chromosome `name`.
    ///
    /// # Errors
    /// Returns `Config` if the chromosome is not on the map.
    pub fn chromosome(&self, name: &str) -> Result<ChromosomeData<'_>> {
        let map = self
            .map
            .get(name)
            .ok_or_else(|| MpError::Config(format!("Unknown chromosome '{}'", name)))?;

        let cols = map
            .markers()
            .iter()
            .map(|m| {
                self.founders.marker_index(&m.name).ok_or_else(|| {
                    MpError::MarkerMismatch(format!("Marker '{}' has no genotype column", m.name))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ChromosomeData {
            map,
            founder_alleles: self.founders.select_columns(&cols),
            final_alleles: self.finals.select_columns(&cols),
        })
    }
}
