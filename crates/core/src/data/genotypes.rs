use indexmap::IndexMap;
use nalgebra::DMatrix;

use crate::error::{MpError, Result};
use crate::types::Allele;

/// A genotype matrix: rows are individuals, columns are markers.
///
/// Entries are integer allele codes, `None` where the call is missing. The
/// same type holds both the founder matrix (rows = founders, whose row order
/// defines the founder index used everywhere downstream) and the final
/// (progeny) matrix.
#[derive(Debug, Clone)]
pub struct GenotypeMatrix {
    ids: Vec<String>,
    id_to_row: IndexMap<String, usize>,
    markers: IndexMap<String, usize>,
    calls: DMatrix<Option<Allele>>,
}

impl GenotypeMatrix {
    /// Build a matrix from row IDs, marker names and row-major calls.
    ///
    /// # Errors
    /// Returns an error on duplicate row IDs or marker names, or when a row
    /// does not have one entry per marker.
    pub fn from_rows(
        ids: Vec<String>,
        markers: Vec<String>,
        rows: Vec<Vec<Option<Allele>>>,
    ) -> Result<Self> {
        if rows.len() != ids.len() {
            return Err(MpError::DimensionMismatch {
                expected: ids.len(),
                got: rows.len(),
                context: "genotype rows vs row IDs".into(),
            });
        }

        let mut id_to_row = IndexMap::with_capacity(ids.len());
        for (i, id) in ids.iter().enumerate() {
            if id_to_row.insert(id.clone(), i).is_some() {
                return Err(MpError::Data(format!("Duplicate genotype row ID '{}'", id)));
            }
        }

        let mut marker_index = IndexMap::with_capacity(markers.len());
        for (j, name) in markers.iter().enumerate() {
            if marker_index.insert(name.clone(), j).is_some() {
                return Err(MpError::Data(format!("Duplicate marker name '{}'", name)));
            }
        }

        let m = markers.len();
        for (row, id) in rows.iter().zip(ids.iter()) {
            if row.len() != m {
                return Err(MpError::DimensionMismatch {
                    expected: m,
                    got: row.len(),
                    context: format!("genotype row '{}'", id),
                });
            }
        }

        let calls = DMatrix::from_fn(ids.len(), m, |i, j| rows[i][j]);

        Ok(Self {
            ids,
            id_to_row,
            markers: marker_index,
            calls,
        })
    }

    /// Number of rows (individuals).
    pub fn n_rows(&self) -> usize {
        self.ids.len()
    }

    /// Number of markers (columns).
    pub fn n_markers(&self) -> usize {
        self.markers.len()
    }

    /// Row identifiers in row order.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Marker names in column order.
    pub fn marker_names(&self) -> impl Iterator<Item = &str> {
        self.markers.keys().map(|s| s.as_str())
    }

    /// Column index of a marker.
    pub fn marker_index(&self, name: &str) -> Option<usize> {
        self.markers.get(name).copied()
    }

    /// Row index of an individual.
    pub fn row_index(&self, id: &str) -> Option<usize> {
        self.id_to_row.get(id).copied()
    }

    /// The call for `row` at marker column `col`.
    pub fn get(&self, row: usize, col: usize) -> Option<Allele> {
        self.calls[(row, col)]
    }

    /// Whether both matrices have the same markers in the same order.
    pub fn same_markers(&self, other: &GenotypeMatrix) -> bool {
        self.markers.len() == other.markers.len()
            && self.markers.keys().zip(other.markers.keys()).all(|(a, b)| a == b)
    }

    /// Extract the given marker columns, in the given order.
    pub(crate) fn select_columns(&self, cols: &[usize]) -> DMatrix<Option<Allele>> {
        DMatrix::from_fn(self.n_rows(), cols.len(), |i, j| self.calls[(i, cols[j])])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> GenotypeMatrix {
        GenotypeMatrix::from_rows(
            vec!["A".into(), "B".into()],
            vec!["m1".into(), "m2".into(), "m3".into()],
            vec![
                vec![Some(0), Some(1), None],
                vec![Some(1), Some(1), Some(0)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_lookup() {
        let g = small();
        assert_eq!(g.n_rows(), 2);
        assert_eq!(g.n_markers(), 3);
        assert_eq!(g.row_index("B"), Some(1));
        assert_eq!(g.marker_index("m3"), Some(2));
        assert_eq!(g.get(0, 2), None);
        assert_eq!(g.get(1, 0), Some(1));
        assert_eq!(g.marker_names().collect::<Vec<_>>(), vec!["m1", "m2", "m3"]);
    }

    #[test]
    fn test_select_columns() {
        let g = small();
        let sub = g.select_columns(&[2, 0]);
        assert_eq!(sub.ncols(), 2);
        assert_eq!(sub[(1, 0)], Some(0));
        assert_eq!(sub[(1, 1)], Some(1));
    }

    #[test]
    fn test_ragged_row_rejected() {
        let r = GenotypeMatrix::from_rows(
            vec!["A".into()],
            vec!["m1".into(), "m2".into()],
            vec![vec![Some(0)]],
        );
        assert!(matches!(r, Err(MpError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_duplicate_marker_rejected() {
        let r = GenotypeMatrix::from_rows(
            vec!["A".into()],
            vec!["m1".into(), "m1".into()],
            vec![vec![Some(0), Some(0)]],
        );
        assert!(r.is_err());
    }
}
