#![doc = include_str!("../README.md")]

pub mod coord;
pub mod error;
pub mod mesh;
pub mod refine;
pub mod spherical;
pub mod stats;
pub mod thinwalls;

pub use error::Error;

/// The bread-and-butter, shrink-wrapped and ready to use.
pub mod prelude {
    pub use crate::Error;
    pub use crate::coord::RegularCoord;
    pub use crate::mesh::Mesh;
    pub use crate::refine::{RefinementDriver, RefinementOptions, RefinementResult};
    pub use crate::stats::Stats;
    pub use crate::thinwalls::{sec::Direction, PipelineOptions, StageTag, ThinWalls, DEFAULT_PIPELINE};
}
