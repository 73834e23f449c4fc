//! Snap engine: reconciling floating-point hand positions against mesh geometry
//!
//! Two mechanisms: merging a candidate position onto a nearby existing vertex
//! (vertex snapping), and rounding to the integer grid (grid snapping). Grid
//! snapping is what keeps persisted geometry on a stable lattice across
//! repeated load/save cycles.

use crate::geometry::Vec3;
use crate::mesh::LiveMesh;
use serde::{Deserialize, Serialize};

/// How aggressively a snap check matches existing vertices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exactness {
    /// Tight tolerance: "same point after rounding". First match wins.
    Exact,
    /// Interactive snap radius. Closest match among all candidates wins.
    Loose,
}

/// Snap tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapConfig {
    /// Global toggle. When false, every check uses the exact tolerance
    /// regardless of the requested exactness.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Distance below which two positions are considered the same point
    #[serde(default = "default_exact_tolerance")]
    pub exact_tolerance: f32,
    /// Interactive snap radius for loose checks
    #[serde(default = "default_snap_radius")]
    pub snap_radius: f32,
}

fn default_enabled() -> bool {
    true
}
fn default_exact_tolerance() -> f32 {
    0.01
}
fn default_snap_radius() -> f32 {
    1.8
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            exact_tolerance: default_exact_tolerance(),
            snap_radius: default_snap_radius(),
        }
    }
}

/// Find an existing location the candidate position should merge onto.
///
/// Linear scan over all locations. `excluded` indices are never valid
/// targets (a dragged point cannot snap to itself or to the edge it is
/// stretching from). Returns the matching location index, or None.
pub fn snap_check(
    mesh: &LiveMesh,
    position: Vec3,
    exactness: Exactness,
    config: &SnapConfig,
    excluded: &[usize],
) -> Option<usize> {
    if !config.enabled || exactness == Exactness::Exact {
        // "Same point after rounding": the candidate is compared in its
        // grid-rounded form, since that is where a commit would land it.
        // Comparing the raw position instead can append a second location
        // onto an occupied grid cell.
        let rounded = snap_to_grid(position);
        for (i, loc) in mesh.locations.iter().enumerate() {
            if excluded.contains(&i) {
                continue;
            }
            if loc.position.distance(rounded) < config.exact_tolerance {
                return Some(i);
            }
        }
        None
    } else {
        let mut best: Option<(usize, f32)> = None;
        for (i, loc) in mesh.locations.iter().enumerate() {
            if excluded.contains(&i) {
                continue;
            }
            let dist = loc.position.distance(position);
            if dist < config.snap_radius && best.map_or(true, |(_, d)| dist < d) {
                best = Some((i, dist));
            }
        }
        best.map(|(i, _)| i)
    }
}

/// Round a position to the integer grid. Idempotent.
pub fn snap_to_grid(position: Vec3) -> Vec3 {
    position.round()
}
