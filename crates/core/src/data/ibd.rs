use indexmap::IndexMap;
use nalgebra::DMatrix;

use crate::error::{MpError, Result};

/// Known founder of origin for each final individual at each marker.
///
/// Entries are 1-based founder indices (matching the founder genotype row
/// order) or `None` when unknown. Used to bypass probability inference, e.g.
/// for simulated populations where the truth is available.
#[derive(Debug, Clone)]
pub struct IbdMatrix {
    ids: Vec<String>,
    markers: IndexMap<String, usize>,
    founders: DMatrix<Option<usize>>,
}

impl IbdMatrix {
    /// # Errors
    /// Returns an error on ragged rows, duplicate markers, or a founder index
    /// of zero.
    pub fn from_rows(
        ids: Vec<String>,
        markers: Vec<String>,
        rows: Vec<Vec<Option<usize>>>,
    ) -> Result<Self> {
        if rows.len() != ids.len() {
            return Err(MpError::DimensionMismatch {
                expected: ids.len(),
                got: rows.len(),
                context: "IBD rows vs row IDs".into(),
            });
        }
        let mut marker_index = IndexMap::with_capacity(markers.len());
        for (j, name) in markers.iter().enumerate() {
            if marker_index.insert(name.clone(), j).is_some() {
                return Err(MpError::Data(format!(
                    "Duplicate marker '{}' in IBD matrix",
                    name
                )));
            }
        }
        for (row, id) in rows.iter().zip(ids.iter()) {
            if row.len() != markers.len() {
                return Err(MpError::DimensionMismatch {
                    expected: markers.len(),
                    got: row.len(),
                    context: format!("IBD row '{}'", id),
                });
            }
            if row.iter().any(|f| *f == Some(0)) {
                return Err(MpError::Data(format!(
                    "IBD row '{}' contains founder index 0; indices are 1-based",
                    id
                )));
            }
        }
        let founders = DMatrix::from_fn(ids.len(), markers.len(), |i, j| rows[i][j]);
        Ok(Self {
            ids,
            markers: marker_index,
            founders,
        })
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn marker_index(&self, name: &str) -> Option<usize> {
        self.markers.get(name).copied()
    }

    /// 1-based founder index of `row` at marker column `col`.
    pub fn get(&self, row: usize, col: usize) -> Option<usize> {
        self.founders[(row, col)]
    }

    /// Largest founder index present.
    pub fn max_founder(&self) -> usize {
        self.founders.iter().flatten().copied().max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_index_rejected() {
        let r = IbdMatrix::from_rows(vec!["x".into()], vec!["m1".into()], vec![vec![Some(0)]]);
        assert!(r.is_err());
    }

    #[test]
    fn test_lookup() {
        let ibd = IbdMatrix::from_rows(
            vec!["x".into(), "y".into()],
            vec!["m1".into(), "m2".into()],
            vec![vec![Some(1), None], vec![Some(4), Some(2)]],
        )
        .unwrap();
        assert_eq!(ibd.get(1, 0), Some(4));
        assert_eq!(ibd.get(0, 1), None);
        assert_eq!(ibd.marker_index("m2"), Some(1));
        assert_eq!(ibd.max_founder(), 4);
    }
}
