//! Scaled forward-backward recursion over a chain of positions.
//!
//! The hidden state at each position is the founder of origin. Transition
//! `i` moves from position `i` to `i + 1`, with entry `(a, b)` the probability
//! of founder `b` at `i + 1` given founder `a` at `i`.

use nalgebra::{DMatrix, DVector};

use super::grid::PositionGrid;
use crate::data::map::ChromosomeMap;

/// Posterior state probabilities along a chain.
#[derive(Debug, Clone)]
pub struct Posterior {
    pub probs: Vec<DVector<f64>>,
    pub log_likelihood: f64,
}

/// Run forward-backward.
///
/// `emissions[i]` is the likelihood of the data at position `i` for every
/// state; positions without data carry all ones. Returns `None` when the data
/// have zero probability under the model.
pub fn forward_backward(
    init: &DVector<f64>,
    transitions: &[&DMatrix<f64>],
    emissions: &[DVector<f64>],
) -> Option<Posterior> {
    let len = emissions.len();
    if len == 0 || transitions.len() + 1 != len {
        return None;
    }

    let mut alpha: Vec<DVector<f64>> = Vec::with_capacity(len);
    let mut scale = vec![0.0; len];

    let a0 = init.component_mul(&emissions[0]);
    scale[0] = a0.sum();
    if !(scale[0] > 0.0) {
        return None;
    }
    alpha.push(a0 / scale[0]);

    for i in 1..len {
        let a = (transitions[i - 1].transpose() * &alpha[i - 1]).component_mul(&emissions[i]);
        scale[i] = a.sum();
        if !(scale[i] > 0.0) {
            return None;
        }
        alpha.push(a / scale[i]);
    }

    let n = init.len();
    let mut beta = vec![DVector::from_element(n, 1.0); len];
    for i in (0..len - 1).rev() {
        let weighted = emissions[i + 1].component_mul(&beta[i + 1]);
        beta[i] = (transitions[i] * weighted) / scale[i + 1];
    }

    let probs = alpha
        .iter()
        .zip(beta.iter())
        .map(|(a, b)| {
            let p = a.component_mul(b);
            let s = p.sum();
            p / s
        })
        .collect();

    Some(Posterior {
        probs,
        log_likelihood: scale.iter().map(|c| c.ln()).sum(),
    })
}

/// The markers of a chromosome merged with the non-marker positions of a grid.
///
/// Recursions run along the chain so that every marker contributes data,
/// while results are read back only at the grid positions.
#[derive(Debug, Clone)]
pub struct PositionChain {
    /// Position (cM) of every chain link.
    pub positions: Vec<f64>,
    /// Map index of the marker at each link, `None` for grid-only links.
    pub markers: Vec<Option<usize>>,
    /// Chain link of each grid position.
    pub grid_links: Vec<usize>,
}

impl PositionChain {
    pub fn new(map: &ChromosomeMap, grid: &PositionGrid) -> Self {
        // (position, marker, grid position); markers first at equal positions.
        let mut links: Vec<(f64, Option<usize>, Option<usize>)> = map
            .markers()
            .iter()
            .enumerate()
            .map(|(m, marker)| (marker.position, Some(m), None))
            .collect();
        for (q, gp) in grid.iter().enumerate() {
            if !gp.kind.is_marker() {
                links.push((gp.position, None, Some(q)));
            }
        }
        links.sort_by(|a, b| {
            a.0.total_cmp(&b.0)
                .then_with(|| b.1.is_some().cmp(&a.1.is_some()))
        });

        let mut marker_links = vec![0; map.len()];
        let mut grid_links = vec![0; grid.len()];
        for (i, &(_, marker, q)) in links.iter().enumerate() {
            if let Some(m) = marker {
                marker_links[m] = i;
            }
            if let Some(q) = q {
                grid_links[q] = i;
            }
        }
        for (q, gp) in grid.iter().enumerate() {
            if let (true, Some(m)) = (gp.kind.is_marker(), gp.marker) {
                grid_links[q] = marker_links[m];
            }
        }

        Self {
            positions: links.iter().map(|l| l.0).collect(),
            markers: links.iter().map(|l| l.1).collect(),
            grid_links,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Distance (cM) between link `i` and link `i + 1`.
    pub fn gap(&self, i: usize) -> f64 {
        self.positions[i + 1] - self.positions[i]
    }
}
