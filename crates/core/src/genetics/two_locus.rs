//! Two-locus founder-origin probabilities of a design.
//!
//! The joint matrix `J(i, j)` is the probability that, for a random haplotype
//! of a final line, the first locus descends from founder `i` and the second
//! from founder `j`. Founders are indexed by funnel slot: for a 4-way funnel
//! `(A x B) x (C x D)` slot 0 is `A`, slot 3 is `D`.

use nalgebra::{DMatrix, DVector};

use super::design::{CrossSpec, Design, FounderCount, Inbreeding, Mating};
use super::inbreeding::recombinant_fraction;

/// Founder-origin model for pairs of linked loci under one design.
#[derive(Debug, Clone, Copy)]
pub struct TwoLocusModel {
    design: Design,
}

impl TwoLocusModel {
    pub fn new(design: Design) -> Self {
        Self { design }
    }

    pub fn design(&self) -> &Design {
        &self.design
    }

    pub fn n_founders(&self) -> usize {
        self.design.n_founders()
    }

    /// Joint origin matrix in funnel-slot order for recombination fraction `r`.
    pub fn joint(&self, r: f64) -> DMatrix<f64> {
        let n = self.n_founders();
        let r = r.clamp(0.0, 0.5);
        let (x, y) = funnel_haplotypes(n, r);

        let big_r = match self.design.inbreeding.mating() {
            Some(mating) => {
                recombinant_fraction(mating, self.design.inbreeding.generations(), r)
            }
            None => 0.0,
        };

        if self.design.intercross == 0 {
            // A random haplotype of the funnel individual, reshuffled by inbreeding.
            return mix(&x, &y, 1.0 - big_r, big_r);
        }

        // Random mating breaks the funnel structure; keep only its recombination
        // history and average over founder labels.
        let mut h = gamete_of(&x, &y, r);
        for _ in 1..self.design.intercross {
            h = relax(&h, r);
        }
        let h = symmetrize(&h);
        relax(&h, big_r)
    }

    /// Probability that two loci at recombination fraction `r` share a founder.
    pub fn same_origin(&self, r: f64) -> f64 {
        self.joint(r).trace()
    }
}

impl CrossSpec {
    /// Probability that two loci at recombination fraction `r` descend from
    /// the same founder in lines of this cross type.
    pub fn same_origin(&self, r: f64) -> f64 {
        let founders = match self.cross_type.n_founders() {
            4 => FounderCount::Four,
            _ => FounderCount::Eight,
        };
        let inbreeding = match self.cross_type.mating() {
            Mating::Selfing => Inbreeding::Selfing(self.generations),
            Mating::Sib => Inbreeding::Sib(self.generations),
        };
        TwoLocusModel::new(Design::new(founders, 0, inbreeding)).same_origin(r)
    }
}

/// Markov transition between adjacent loci for a founder-exchangeable model:
/// stay with probability `same`, otherwise move to any other founder uniformly.
pub fn symmetric_transition(n: usize, same: f64) -> DMatrix<f64> {
    let other = if n > 1 { (1.0 - same) / (n - 1) as f64 } else { 0.0 };
    DMatrix::from_fn(n, n, |i, j| if i == j { same } else { other })
}

/// Relabel a slot-order matrix with an individual's funnel.
///
/// `funnel[slot]` is the founder index occupying that slot.
pub fn permute(joint: &DMatrix<f64>, funnel: &[usize]) -> DMatrix<f64> {
    let n = joint.nrows();
    let mut out = DMatrix::zeros(n, n);
    for a in 0..n {
        for b in 0..n {
            out[(funnel[a], funnel[b])] = joint[(a, b)];
        }
    }
    out
}

/// Haplotype distributions of the two parents of the final funnel cross.
fn funnel_haplotypes(n: usize, r: f64) -> (DMatrix<f64>, DMatrix<f64>) {
    let mut level: Vec<DMatrix<f64>> = (0..n)
        .map(|f| {
            let mut m = DMatrix::zeros(n, n);
            m[(f, f)] = 1.0;
            m
        })
        .collect();

    while level.len() > 2 {
        level = level
            .chunks(2)
            .map(|pair| gamete_of(&pair[0], &pair[1], r))
            .collect();
    }
    let y = level.pop().unwrap_or_else(|| DMatrix::zeros(n, n));
    let x = level.pop().unwrap_or_else(|| DMatrix::zeros(n, n));
    (x, y)
}

/// Gamete of an individual whose two haplotypes follow `x` and `y`.
fn gamete_of(x: &DMatrix<f64>, y: &DMatrix<f64>, r: f64) -> DMatrix<f64> {
    mix(x, y, 1.0 - r, r)
}

/// `keep/2 (X + Y) + swap/2 (x1 y2' + y1 x2')` where `x1` is the first-locus
/// marginal of `X` and `x2` its second-locus marginal.
fn mix(x: &DMatrix<f64>, y: &DMatrix<f64>, keep: f64, swap: f64) -> DMatrix<f64> {
    let (x1, x2) = marginals(x);
    let (y1, y2) = marginals(y);
    (x + y) * (0.5 * keep) + (&x1 * y2.transpose() + &y1 * x2.transpose()) * (0.5 * swap)
}

/// One round of random mating in a large population: linkage decays by `1 - r`.
fn relax(h: &DMatrix<f64>, r: f64) -> DMatrix<f64> {
    let (m1, m2) = marginals(h);
    h * (1.0 - r) + (&m1 * m2.transpose()) * r
}

fn marginals(m: &DMatrix<f64>) -> (DVector<f64>, DVector<f64>) {
    let first = DVector::from_iterator(m.nrows(), m.row_iter().map(|row| row.sum()));
    let second = DVector::from_iterator(m.ncols(), m.column_iter().map(|col| col.sum()));
    (first, second)
}

fn symmetrize(h: &DMatrix<f64>) -> DMatrix<f64> {
    let n = h.nrows();
    let same = h.trace();
    let diag = same / n as f64;
    let off = if n > 1 {
        (1.0 - same) / (n * (n - 1)) as f64
    } else {
        0.0
    };
    DMatrix::from_fn(n, n, |i, j| if i == j { diag } else { off })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genetics::design::CrossType;
    use approx::assert_relative_eq;

    fn design(label: &str) -> Design {
        label.parse().unwrap()
    }

    #[test]
    fn test_joint_is_distribution() {
        for label in ["4wayG2aic0self3", "8wayG3aic2sib4", "4wayG2aic0", "8wayG3aic0self10"] {
            let model = TwoLocusModel::new(design(label));
            let n = model.n_founders();
            let j = model.joint(0.12);
            assert_relative_eq!(j.sum(), 1.0, epsilon = 1e-12);
            for i in 0..n {
                assert_relative_eq!(j.row(i).sum(), 1.0 / n as f64, epsilon = 1e-12);
                assert_relative_eq!(j.column(i).sum(), 1.0 / n as f64, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_no_recombination_is_diagonal() {
        let j = TwoLocusModel::new(design("8wayG3aic1self4")).joint(0.0);
        for i in 0..8 {
            assert_relative_eq!(j[(i, i)], 0.125, epsilon = 1e-12);
        }
        assert_relative_eq!(j.trace(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_ri4self_fixation() {
        // Broman (2005): P(AA) = (1-r)/(4(1+2r)), P(AB) = P(AC) = r/(4(1+2r)).
        let r = 0.1;
        let j = TwoLocusModel::new(design("4wayG2aic0self200")).joint(r);
        let denom = 4.0 * (1.0 + 2.0 * r);
        assert_relative_eq!(j[(0, 0)], (1.0 - r) / denom, epsilon = 1e-12);
        assert_relative_eq!(j[(0, 1)], r / denom, epsilon = 1e-12);
        assert_relative_eq!(j[(0, 2)], r / denom, epsilon = 1e-12);
        assert_relative_eq!(j[(0, 3)], r / denom, epsilon = 1e-12);
    }

    #[test]
    fn test_unlinked_loci_independent() {
        let j = TwoLocusModel::new(design("4wayG2aic0self200")).joint(0.5);
        for v in j.iter() {
            assert_relative_eq!(*v, 1.0 / 16.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_funnel_partner_more_likely() {
        // Founders sharing the first cross are closer than across the funnel.
        let j = TwoLocusModel::new(design("8wayG3aic0self6")).joint(0.05);
        assert!(j[(0, 1)] > j[(0, 2)]);
        assert!(j[(0, 2)] > j[(0, 4)]);
    }

    #[test]
    fn test_intercross_is_symmetric_off_diagonal() {
        let j = TwoLocusModel::new(design("4wayG2aic2self3")).joint(0.05);
        assert_relative_eq!(j[(0, 1)], j[(0, 3)], epsilon = 1e-12);
        assert_relative_eq!(j[(1, 2)], j[(2, 3)], epsilon = 1e-12);
    }

    #[test]
    fn test_cross_spec_same_origin() {
        let spec = CrossSpec {
            cross_type: CrossType::Ri4Self,
            generations: 200,
        };
        let r = 0.2;
        assert_relative_eq!(spec.same_origin(r), (1.0 - r) / (1.0 + 2.0 * r), epsilon = 1e-12);
    }

    #[test]
    fn test_permute_and_transition() {
        let j = TwoLocusModel::new(design("4wayG2aic0self5")).joint(0.1);
        let funnel = [2, 3, 0, 1];
        let p = permute(&j, &funnel);
        assert_relative_eq!(p[(2, 3)], j[(0, 1)]);
        assert_relative_eq!(p[(0, 1)], j[(2, 3)]);

        let s = symmetric_transition(4, 0.7);
        assert_relative_eq!(s[(0, 0)], 0.7);
        assert_relative_eq!(s[(0, 3)], 0.1, epsilon = 1e-12);
    }
}
