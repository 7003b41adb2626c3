//! Probability Normalizer: backend output to canonical probability matrices.

use std::collections::HashMap;

use indexmap::IndexMap;
use nalgebra::DMatrix;

use super::cube::ProbCube;
use super::grid::{GridPosition, PositionGrid};
use super::matrix::{BlockIndex, FounderProbMatrix};
use crate::error::{MpError, Result};

/// Whether marker columns survive normalization.
///
/// Markers are always kept for marker-only grids (`step <= 0` or a
/// single-marker chromosome), otherwise only when the caller asked for them.
pub fn keep_markers(include_markers: bool, step: f64, single_marker: bool) -> bool {
    include_markers || step <= 0.0 || single_marker
}

/// Reshape a backend cube on `grid` into the canonical layout.
///
/// The grid/array alignment is verified before anything else. With
/// `keep_markers` unset, marker positions are then dropped; a marker that
/// absorbed a step point is reported under the step point's name instead.
///
/// # Errors
/// - `GridMismatch` if the cube does not hold one founder block per grid
///   position.
/// - `DimensionMismatch` if the cube does not have one row per individual.
/// - `Internal` if a resulting block is neither a distribution nor all NaN.
pub fn normalize(
    cube: &ProbCube,
    grid: &PositionGrid,
    individuals: &[String],
    keep_markers: bool,
) -> Result<FounderProbMatrix> {
    grid.check_columns(cube.n_columns(), cube.n_founders())?;
    if cube.n_individuals() != individuals.len() {
        return Err(MpError::DimensionMismatch {
            expected: individuals.len(),
            got: cube.n_individuals(),
            context: format!("backend rows on chromosome '{}'", grid.chromosome()),
        });
    }

    let selected: Vec<(usize, GridPosition)> = if keep_markers {
        grid.iter().cloned().enumerate().collect()
    } else {
        grid.without_markers()
    };
    if selected.len() < grid.len() {
        log::debug!(
            "Stripped {} marker columns from chromosome '{}'",
            grid.len() - selected.len(),
            grid.chromosome()
        );
    }

    let n = cube.n_founders();
    let index = BlockIndex::new(selected.len(), n);
    let values = DMatrix::from_fn(individuals.len(), index.n_columns(), |row, col| {
        let (pos, founder) = index.locate(col);
        cube.get(row, selected[pos].0, founder)
    });

    FounderProbMatrix::new(
        grid.chromosome(),
        individuals.to_vec(),
        selected.into_iter().map(|(_, p)| p).collect(),
        n,
        values,
    )
}

/// Collect per-chromosome matrices in the caller's requested order.
///
/// `computed` may arrive in any order (e.g. multi-marker chromosomes first).
///
/// # Errors
/// Returns `Internal` if a requested chromosome was not computed.
pub fn assemble(
    requested: &[String],
    computed: Vec<FounderProbMatrix>,
) -> Result<IndexMap<String, FounderProbMatrix>> {
    let mut by_name: HashMap<String, FounderProbMatrix> = computed
        .into_iter()
        .map(|m| (m.chromosome().to_string(), m))
        .collect();

    requested
        .iter()
        .map(|name| {
            by_name
                .remove(name)
                .map(|m| (name.clone(), m))
                .ok_or_else(|| {
                    MpError::Internal(format!(
                        "No probabilities computed for chromosome '{}'",
                        name
                    ))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::map::{ChromosomeMap, MapMarker};
    use crate::prob::cube::CubeLayout;
    use approx::assert_relative_eq;

    fn map(name: &str) -> ChromosomeMap {
        let markers = (0..3)
            .map(|i| MapMarker::new(format!("{}m{}", name, i + 1), i as f64 * 10.0))
            .collect();
        ChromosomeMap::new(name, markers).unwrap()
    }

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("L{}", i + 1)).collect()
    }

    /// A cube where founder `(q + row) % n` carries all the probability at q.
    fn cube(rows: usize, positions: usize, layout: CubeLayout) -> ProbCube {
        let mut cube = ProbCube::new(rows, positions, 4, layout);
        for row in 0..rows {
            for q in 0..positions {
                let mut block = vec![0.0; 4];
                block[(q + row) % 4] = 1.0;
                cube.set_block(row, q, &block);
            }
        }
        cube
    }

    #[test]
    fn test_layouts_normalize_identically() {
        let map = map("1");
        let grid = PositionGrid::build(&map, 5.0, true).unwrap();
        let position_major = cube(2, grid.len(), CubeLayout::PositionMajor);
        let founder_major = cube(2, grid.len(), CubeLayout::FounderMajor);
        let a = normalize(&position_major, &grid, &ids(2), true).unwrap();
        let b = normalize(&founder_major, &grid, &ids(2), true).unwrap();
        assert_eq!(a.values(), b.values());
        assert_eq!(a.n_positions(), 5);
        assert_eq!(a.column_labels()[0], "1m1, Founder 1");
        assert_eq!(a.column_labels()[5], "loc5, Founder 2");
    }

    #[test]
    fn test_strip_markers() {
        let map = map("1");
        let grid = PositionGrid::build(&map, 4.0, true).unwrap();
        // 1m1 (+loc0), loc4, loc8, 1m2, loc12, loc16, 1m3 (+loc20)
        assert_eq!(grid.len(), 7);
        let c = cube(1, grid.len(), CubeLayout::PositionMajor);
        let m = normalize(&c, &grid, &ids(1), false).unwrap();
        let names: Vec<&str> = m.positions().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["loc0", "loc4", "loc8", "loc12", "loc16", "loc20"]);
        // loc12 was grid position 4.
        assert_relative_eq!(m.get(0, 3, 0), 1.0);
        assert_eq!(m.values().ncols(), 24);
    }

    #[test]
    fn test_grid_mismatch_is_fatal() {
        let map = map("1");
        let grid = PositionGrid::build(&map, 0.0, true).unwrap();
        let c = cube(1, 4, CubeLayout::PositionMajor);
        assert!(matches!(
            normalize(&c, &grid, &ids(1), true),
            Err(MpError::GridMismatch { grid: 3, columns: 16, .. })
        ));
        let c = cube(2, 3, CubeLayout::PositionMajor);
        assert!(matches!(
            normalize(&c, &grid, &ids(1), true),
            Err(MpError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_undefined_blocks_pass_through() {
        let map = map("1");
        let grid = PositionGrid::markers_only(&map);
        let mut c = ProbCube::new(1, 3, 4, CubeLayout::PositionMajor);
        c.set_block(0, 1, &[0.25; 4]);
        let m = normalize(&c, &grid, &ids(1), true).unwrap();
        assert!(m.get(0, 0, 2).is_nan());
        assert_relative_eq!(m.get(0, 1, 2), 0.25);
    }

    #[test]
    fn test_bad_block_rejected() {
        let map = map("1");
        let grid = PositionGrid::markers_only(&map);
        let mut c = cube(1, 3, CubeLayout::PositionMajor);
        c.set_block(0, 2, &[0.5, 0.5, 0.5, 0.0]);
        assert!(matches!(
            normalize(&c, &grid, &ids(1), true),
            Err(MpError::Internal(_))
        ));
    }

    #[test]
    fn test_keep_markers() {
        assert!(keep_markers(false, 0.0, false));
        assert!(keep_markers(false, -1.0, false));
        assert!(keep_markers(false, 5.0, true));
        assert!(!keep_markers(false, 5.0, false));
        assert!(keep_markers(true, 5.0, false));
    }

    #[test]
    fn test_assemble_requested_order() {
        let mut computed = Vec::new();
        for name in ["2", "1", "3"] {
            let map = map(name);
            let grid = PositionGrid::markers_only(&map);
            let c = cube(1, 3, CubeLayout::PositionMajor);
            computed.push(normalize(&c, &grid, &ids(1), true).unwrap());
        }
        let requested: Vec<String> = vec!["1".into(), "3".into(), "2".into()];
        let out = assemble(&requested, computed.clone()).unwrap();
        assert_eq!(out.keys().collect::<Vec<_>>(), vec!["1", "3", "2"]);

        let requested: Vec<String> = vec!["1".into(), "4".into()];
        assert!(assemble(&requested, computed).is_err());
    }
}
