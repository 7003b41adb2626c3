use nalgebra::DMatrix;

/// Column order of a raw probability array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CubeLayout {
    /// All founders of position 0, then all founders of position 1, ...
    PositionMajor,
    /// Founder 0 at every position, then founder 1 at every position, ...
    FounderMajor,
}

/// Raw output of a probability backend for one chromosome.
///
/// Rows are final individuals; columns hold one value per (position, founder)
/// pair in the backend's native [`CubeLayout`]. Entries start out as NaN so an
/// individual the backend never fills reads as "no data".
#[derive(Debug, Clone)]
pub struct ProbCube {
    layout: CubeLayout,
    n_positions: usize,
    n_founders: usize,
    data: DMatrix<f64>,
}

impl ProbCube {
    pub fn new(
        n_individuals: usize,
        n_positions: usize,
        n_founders: usize,
        layout: CubeLayout,
    ) -> Self {
        Self {
            layout,
            n_positions,
            n_founders,
            data: DMatrix::from_element(n_individuals, n_positions * n_founders, f64::NAN),
        }
    }

    pub fn layout(&self) -> CubeLayout {
        self.layout
    }

    pub fn n_individuals(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_positions(&self) -> usize {
        self.n_positions
    }

    pub fn n_founders(&self) -> usize {
        self.n_founders
    }

    pub fn n_columns(&self) -> usize {
        self.data.ncols()
    }

    fn column(&self, position: usize, founder: usize) -> usize {
        match self.layout {
            CubeLayout::PositionMajor => position * self.n_founders + founder,
            CubeLayout::FounderMajor => founder * self.n_positions + position,
        }
    }

    pub fn get(&self, row: usize, position: usize, founder: usize) -> f64 {
        self.data[(row, self.column(position, founder))]
    }

    pub fn set(&mut self, row: usize, position: usize, founder: usize, value: f64) {
        let col = self.column(position, founder);
        self.data[(row, col)] = value;
    }

    /// Write one founder block.
    pub fn set_block(&mut self, row: usize, position: usize, values: &[f64]) {
        for (f, &v) in values.iter().enumerate().take(self.n_founders) {
            self.set(row, position, f, v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layouts_address_same_cells() {
        for layout in [CubeLayout::PositionMajor, CubeLayout::FounderMajor] {
            let mut cube = ProbCube::new(2, 3, 4, layout);
            assert_eq!(cube.n_columns(), 12);
            assert!(cube.get(1, 2, 3).is_nan());
            cube.set_block(1, 2, &[0.1, 0.2, 0.3, 0.4]);
            assert_eq!(cube.get(1, 2, 0), 0.1);
            assert_eq!(cube.get(1, 2, 3), 0.4);
            assert!(cube.get(0, 2, 3).is_nan());
        }
    }

    #[test]
    fn test_founder_major_columns() {
        let mut cube = ProbCube::new(1, 3, 2, CubeLayout::FounderMajor);
        cube.set(0, 1, 1, 0.5);
        // Founder 1 occupies columns 3..6.
        assert_eq!(cube.data[(0, 4)], 0.5);
    }
}
