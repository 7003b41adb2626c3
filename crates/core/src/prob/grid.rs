//! Position Grid Builder: the ordered query positions of one chromosome.

use serde::Serialize;

use crate::data::map::ChromosomeMap;
use crate::error::{MpError, Result};
use crate::types::POSITION_TOLERANCE;

/// Upper bound on the step points of one chromosome.
pub const MAX_STEP_POSITIONS: usize = 1_000_000;

/// What a grid position is anchored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionKind {
    /// A marker position.
    Marker,
    /// A fixed-step position between markers.
    Step,
    /// The midpoint of the interval between two adjacent markers.
    Midpoint,
}

impl PositionKind {
    pub fn is_marker(self) -> bool {
        self == PositionKind::Marker
    }

    /// Step points and midpoints.
    pub fn is_interstitial(self) -> bool {
        !self.is_marker()
    }
}

/// One query position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridPosition {
    pub name: String,
    /// Genetic position in cM.
    pub position: f64,
    pub kind: PositionKind,
    /// Index of the marker on the chromosome map (the left marker for a
    /// midpoint); `None` for step points.
    #[serde(skip)]
    pub marker: Option<usize>,
    /// For a marker: the fixed-step point that coincided with it and was
    /// collapsed into it.
    #[serde(skip)]
    pub coincident_step: Option<f64>,
}

impl GridPosition {
    fn marker(name: &str, position: f64, index: usize) -> Self {
        Self {
            name: name.to_string(),
            position,
            kind: PositionKind::Marker,
            marker: Some(index),
            coincident_step: None,
        }
    }

    fn step(position: f64) -> Self {
        Self {
            name: step_name(position),
            position,
            kind: PositionKind::Step,
            marker: None,
            coincident_step: None,
        }
    }
}

/// Name of a fixed-step position: `loc` followed by the position in cM.
pub fn step_name(position: f64) -> String {
    let mut s = format!("{:.6}", position);
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    if s == "-0" {
        s = "0".into();
    }
    format!("loc{}", s)
}

/// The ordered query positions of one chromosome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionGrid {
    chromosome: String,
    positions: Vec<GridPosition>,
}

impl PositionGrid {
    /// Build the grid for `map` with step size `step` (cM).
    ///
    /// - `step == 0`: marker positions only, whatever `include_markers` says.
    /// - `step < 0`: interval midpoints only.
    /// - `step > 0`: `min + k * step` up to the last marker, plus the markers
    ///   when `include_markers` is set. A step point within
    ///   [`POSITION_TOLERANCE`] of a marker is collapsed into that marker.
    ///
    /// A chromosome with a single marker always gets a marker-only grid.
    ///
    /// # Errors
    /// Returns `InvalidParameter` if `step` is not finite.
    pub fn build(map: &ChromosomeMap, step: f64, include_markers: bool) -> Result<Self> {
        if !step.is_finite() {
            return Err(MpError::InvalidParameter(format!(
                "step must be a finite number of cM, got {}",
                step
            )));
        }
        if map.is_single_marker() || step == 0.0 {
            return Ok(Self::markers_only(map));
        }
        if step < 0.0 {
            return Ok(Self::midpoints(map));
        }

        let markers = map.markers();
        let min = map.min_position();
        let max = map.max_position();

        let mut positions: Vec<GridPosition> = if include_markers {
            markers
                .iter()
                .enumerate()
                .map(|(i, m)| GridPosition::marker(&m.name, m.position, i))
                .collect()
        } else {
            Vec::new()
        };

        let n_steps = ((max - min + POSITION_TOLERANCE) / step).floor() + 1.0;
        if n_steps > MAX_STEP_POSITIONS as f64 {
            return Err(MpError::InvalidParameter(format!(
                "step {} cM gives {} positions on chromosome '{}', more than {}",
                step,
                n_steps,
                map.name(),
                MAX_STEP_POSITIONS
            )));
        }

        // Marker positions stay sorted at the front while step points are pushed.
        let n_markers = positions.len();
        let mut k = 0u64;
        loop {
            let p = min + k as f64 * step;
            if p > max + POSITION_TOLERANCE {
                break;
            }
            k += 1;

            let i = positions[..n_markers]
                .partition_point(|g| g.position < p - POSITION_TOLERANCE);
            if let Some(m) = positions[..n_markers]
                .get_mut(i)
                .filter(|g| (g.position - p).abs() <= POSITION_TOLERANCE)
            {
                if m.coincident_step.is_none() {
                    m.coincident_step = Some(p);
                }
                continue;
            }
            positions.push(GridPosition::step(p));
        }

        // Markers sort before step points at equal positions.
        positions.sort_by(|a, b| {
            a.position
                .total_cmp(&b.position)
                .then_with(|| b.kind.is_marker().cmp(&a.kind.is_marker()))
        });

        Ok(Self {
            chromosome: map.name().to_string(),
            positions,
        })
    }

    /// One position per marker.
    pub fn markers_only(map: &ChromosomeMap) -> Self {
        Self {
            chromosome: map.name().to_string(),
            positions: map
                .markers()
                .iter()
                .enumerate()
                .map(|(i, m)| GridPosition::marker(&m.name, m.position, i))
                .collect(),
        }
    }

    /// One position per adjacent marker pair, named `<left>-<right>`.
    pub fn midpoints(map: &ChromosomeMap) -> Self {
        let positions = map
            .markers()
            .windows(2)
            .enumerate()
            .map(|(i, pair)| GridPosition {
                name: format!("{}-{}", pair[0].name, pair[1].name),
                position: 0.5 * (pair[0].position + pair[1].position),
                kind: PositionKind::Midpoint,
                marker: Some(i),
                coincident_step: None,
            })
            .collect();
        Self {
            chromosome: map.name().to_string(),
            positions,
        }
    }

    pub fn chromosome(&self) -> &str {
        &self.chromosome
    }

    pub fn positions(&self) -> &[GridPosition] {
        &self.positions
    }

    pub fn iter(&self) -> impl Iterator<Item = &GridPosition> {
        self.positions.iter()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn n_markers(&self) -> usize {
        self.positions.iter().filter(|p| p.kind.is_marker()).count()
    }

    pub fn n_interstitial(&self) -> usize {
        self.len() - self.n_markers()
    }

    pub fn names(&self) -> Vec<&str> {
        self.positions.iter().map(|p| p.name.as_str()).collect()
    }

    /// Check that an array with `columns` columns holds one founder block per
    /// grid position.
    ///
    /// # Errors
    /// Returns `GridMismatch` otherwise.
    pub fn check_columns(&self, columns: usize, n_founders: usize) -> Result<()> {
        let consistent = n_founders > 0
            && columns % n_founders == 0
            && self.n_markers() + self.n_interstitial() == columns / n_founders;
        if consistent {
            Ok(())
        } else {
            Err(MpError::GridMismatch {
                chromosome: self.chromosome.clone(),
                grid: self.len(),
                columns,
            })
        }
    }

    /// The grid with marker positions removed.
    ///
    /// Markers that absorbed a step point are turned back into that step
    /// point, so the result equals the grid built without markers.
    pub fn without_markers(&self) -> Vec<(usize, GridPosition)> {
        self.positions
            .iter()
            .enumerate()
            .filter_map(|(i, p)| match (p.kind, p.coincident_step) {
                (PositionKind::Marker, Some(step)) => Some((i, GridPosition::step(step))),
                (PositionKind::Marker, None) => None,
                _ => Some((i, p.clone())),
            })
            .collect()
    }
}
