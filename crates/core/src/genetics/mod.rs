// Genetics module
// Pedigree, design classification, map functions, two-locus origin models

pub mod classify;
pub mod design;
pub mod inbreeding;
pub mod mapfn;
pub mod pedigree;
pub mod two_locus;

pub use classify::{classify, Classification};
pub use design::{CrossSpec, CrossType, Design, FounderCount, Inbreeding, Mating};
pub use mapfn::MapFunction;
pub use pedigree::{Pedigree, PedigreeEntry};
pub use two_locus::TwoLocusModel;
