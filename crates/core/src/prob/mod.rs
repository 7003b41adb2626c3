// Probability module
// Position grids, backends, normalization, founder calls, orchestration

pub mod backend;
pub mod calls;
pub mod cancel;
pub mod cube;
pub mod emission;
pub mod engine;
pub mod grid;
pub mod hmm;
pub mod matrix;
pub mod normalize;
pub mod result;

pub use backend::{allele_lookup, BackendContext, ProbabilityBackend, Strategy};
pub use calls::{call_block, call_founders, FounderCallMatrix};
pub use cancel::{CancelToken, Deadline};
pub use cube::{CubeLayout, ProbCube};
pub use engine::{FounderProbBuilder, FounderProbJob};
pub use grid::{GridPosition, PositionGrid, PositionKind};
pub use matrix::{BlockIndex, BlockStatus, FounderProbMatrix};
pub use normalize::{assemble, normalize};
pub use result::{FounderProbs, ProbMetadata};
