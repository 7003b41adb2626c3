/// Integer allele code as it appears in genotype files.
pub type Allele = i32;

/// Absolute tolerance (cM) when comparing map positions.
pub const POSITION_TOLERANCE: f64 = 1e-6;

/// Tolerance on the sum of a founder-probability block.
pub const SUM_TOLERANCE: f64 = 1e-6;
