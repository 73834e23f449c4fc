//! Live mesh data model
//!
//! A half-structured triangle mesh: an index-addressable array of locations
//! plus a face map keyed by stable faceId. Every mutation re-establishes the
//! topology invariants (valid indices, no degenerate faces, no duplicate
//! faces, no unused locations, integer positions at rest).

mod model;
mod ops;
mod render;

pub use model::*;
pub use ops::*;
pub use render::*;
