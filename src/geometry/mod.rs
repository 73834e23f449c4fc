//! Pure geometry math for cursor picking and snapping
//!
//! No state, no mesh knowledge: just vectors and distance queries.

mod distance;
mod math;

pub use distance::*;
pub use math::*;
