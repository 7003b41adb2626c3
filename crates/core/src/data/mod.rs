// Data module
// Genotype matrices, genetic maps, IBD truth, the cross container, CSV loaders

pub mod cross;
pub mod genotypes;
pub mod ibd;
pub mod io;
pub mod map;

pub use cross::{ChromosomeData, MpCross};
pub use genotypes::GenotypeMatrix;
pub use ibd::IbdMatrix;
pub use io::{read_genotypes, read_ibd, read_map};
pub use map::{ChromosomeMap, GeneticMap, MapMarker};
