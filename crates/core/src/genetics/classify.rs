//! Design Classifier: derives the breeding design of each observed individual
//! from the structure of the pedigree.

use std::collections::HashMap;

use indexmap::IndexMap;

use super::design::{Design, FounderCount, Inbreeding};
use super::pedigree::Pedigree;
use crate::error::{MpError, Result};

/// The outcome of classifying a pedigree.
#[derive(Debug, Clone)]
pub struct Classification {
    /// Design of each observed individual, keyed by individual ID.
    pub designs: IndexMap<String, Design>,
    /// Funnel of each observed individual as founder-matrix row indices, when
    /// the individual descends from a single funnel.
    pub funnels: IndexMap<String, Vec<usize>>,
    /// Copy of the input pedigree with the design column filled in.
    pub pedigree: Pedigree,
    /// Whether the labels came from an existing annotation.
    pub annotated: bool,
}

impl Classification {
    /// The single design shared by all observed individuals.
    ///
    /// Designs that differ only in their inbreeding suffix count as one
    /// design; the most frequent full label is returned (first seen on ties).
    ///
    /// # Errors
    /// Returns `MixedDesign` when observed individuals carry more than one
    /// base design, and `Data` when nothing is observed.
    pub fn uniform_design(&self) -> Result<Design> {
        let mut bases: Vec<String> = Vec::new();
        for d in self.designs.values() {
            let b = d.base_label();
            if !bases.contains(&b) {
                bases.push(b);
            }
        }
        if bases.len() > 1 {
            return Err(MpError::MixedDesign { designs: bases });
        }

        let mut counts: IndexMap<Design, usize> = IndexMap::new();
        for d in self.designs.values() {
            *counts.entry(*d).or_insert(0) += 1;
        }
        let mut best: Option<(Design, usize)> = None;
        for (d, c) in counts {
            if best.map_or(true, |(_, bc)| c > bc) {
                best = Some((d, c));
            }
        }
        best.map(|(d, _)| d)
            .ok_or_else(|| MpError::Data("No observed individuals in the pedigree".into()))
    }

    pub fn design_of(&self, id: &str) -> Option<Design> {
        self.designs.get(id).copied()
    }

    pub fn funnel_of(&self, id: &str) -> Option<&[usize]> {
        self.funnels.get(id).map(|f| f.as_slice())
    }
}

/// Classify every observed individual of `pedigree`.
///
/// `founder_ids` is the row order of the founder genotype matrix; every
/// observed individual must trace back to founders in that list. An existing
/// design annotation is trusted and not recomputed.
///
/// # Errors
/// Returns `Pedigree` errors for inconsistent pedigrees, ancestry outside
/// the founder set, or a design whose founder count differs from the founder
/// matrix. Returns `UnsupportedDesign` for breeding schemes that do not fit
/// the funnel / intercross / inbreeding pattern.
pub fn classify(pedigree: &Pedigree, founder_ids: &[String]) -> Result<Classification> {
    pedigree.validate()?;
    let generations = pedigree.generations()?;

    let founder_rows: HashMap<&str, usize> = founder_ids
        .iter()
        .enumerate()
        .map(|(row, id)| (id.as_str(), row))
        .collect();

    let observed = pedigree.observed();
    if observed.is_empty() {
        return Err(MpError::Pedigree("No individual is flagged as observed".into()));
    }

    let annotated = pedigree.has_designs();
    let mut designs = IndexMap::with_capacity(observed.len());
    let mut funnels = IndexMap::with_capacity(observed.len());
    let mut labels = HashMap::new();

    for &i in &observed {
        let id = pedigree.id(i).to_string();
        let ancestry = founder_rows_of(pedigree, i, &founder_rows)?;

        let design = if annotated {
            pedigree.design(i).unwrap_or_default().parse::<Design>()?
        } else {
            classify_individual(pedigree, i, &generations)?
        };

        if design.n_founders() != founder_ids.len() {
            return Err(MpError::Pedigree(format!(
                "Individual '{}' has design '{}' with {} founders \
                 but the founder matrix has {} rows",
                id,
                design,
                design.n_founders(),
                founder_ids.len()
            )));
        }
        if ancestry.len() != design.n_founders() {
            return Err(MpError::Pedigree(format!(
                "Individual '{}' descends from {} founders but its design '{}' has {}",
                id,
                ancestry.len(),
                design,
                design.n_founders()
            )));
        }

        if design.intercross == 0 {
            funnels.insert(id.clone(), ancestry);
        }
        labels.insert(i, design.to_string());
        designs.insert(id, design);
    }

    if !annotated {
        log::info!(
            "Classified {} observed individuals into {} design(s)",
            designs.len(),
            designs.values().collect::<std::collections::HashSet<_>>().len()
        );
    }

    Ok(Classification {
        designs,
        funnels,
        pedigree: pedigree.with_designs(&labels),
        annotated,
    })
}

/// Derive the design of a single individual.
///
/// Walks up the maternal line through selfing or sib-mating generations to
/// the last mixing cross, then reads the founder count and the number of
/// generations of that cross.
pub fn classify_individual(
    pedigree: &Pedigree,
    index: usize,
    generations: &[usize],
) -> Result<Design> {
    let id = pedigree.id(index);
    if pedigree.is_founder(index) {
        return Err(MpError::Pedigree(format!(
            "Observed individual '{}' is a founder",
            id
        )));
    }

    let mut cur = index;
    let mut selfing = 0u32;
    let mut sib = 0u32;
    loop {
        if pedigree.is_selfed(cur) {
            selfing += 1;
        } else if pedigree.is_sib_mated(cur) {
            sib += 1;
        } else {
            break;
        }
        cur = pedigree
            .mother(cur)
            .ok_or_else(|| MpError::Internal(format!("'{}' has no mother", pedigree.id(cur))))?;
    }

    if selfing > 0 && sib > 0 {
        return Err(MpError::UnsupportedDesign(format!(
            "'{}' combines {} selfing and {} sib-mating generations",
            id, selfing, sib
        )));
    }

    let founders = FounderCount::from_count(pedigree.founder_ancestry(cur).len())?;
    let depth = generations[cur] as u32;
    let funnel = founders.funnel_generations();
    if depth < funnel {
        return Err(MpError::UnsupportedDesign(format!(
            "'{}' mixes {} founders in {} generations",
            id,
            founders.n(),
            depth
        )));
    }

    let inbreeding = if selfing > 0 {
        Inbreeding::Selfing(selfing)
    } else if sib > 0 {
        Inbreeding::Sib(sib)
    } else {
        Inbreeding::Outbred
    };

    Ok(Design::new(founders, depth - funnel, inbreeding))
}

fn founder_rows_of(
    pedigree: &Pedigree,
    index: usize,
    founder_rows: &HashMap<&str, usize>,
) -> Result<Vec<usize>> {
    pedigree
        .founder_ancestry(index)
        .into_iter()
        .map(|f| {
            let fid = pedigree.id(f);
            founder_rows.get(fid).copied().ok_or_else(|| {
                MpError::Pedigree(format!(
                    "Individual '{}' traces back to '{}', which is not a genotyped founder",
                    pedigree.id(index),
                    fid
                ))
            })
        })
        .collect()
}
