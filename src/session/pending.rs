//! In-progress gesture geometry
//!
//! While a pinch is held, the triangles being stretched live here, not in
//! the mesh. On commit they are folded back in through `add_geometry`; on
//! cancel or an accidental tap they are dropped (and for a point move the
//! pre-gesture snapshot is re-added).

use crate::geometry::Vec3;
use crate::mesh::{FaceId, IncomingFace, IncomingGeometry, IncomingLocation, LiveMesh, LocationId};

/// One triangle being previewed: two anchored corners plus the shared
/// moving corner
#[derive(Debug, Clone)]
pub struct PendingTriangle {
    pub fixed: [Vec3; 2],
    pub color_index: u32,
    /// FaceId to re-install under on commit (point moves keep their ids so
    /// peers converge); None mints a fresh id
    pub source_face: Option<FaceId>,
}

/// The full transient state of an in-progress move/create gesture
#[derive(Debug, Clone)]
pub struct PendingGesture {
    pub triangles: Vec<PendingTriangle>,
    /// Current position of the shared moving corner
    pub moving: Vec3,
    /// Accumulated hold time, for the accidental-tap guard
    pub elapsed: f32,
    /// Pre-gesture copy of the detached faces (point moves only), re-added
    /// verbatim on rollback
    pub snapshot: Option<IncomingGeometry>,
    /// Locations the moving corner may never snap onto, tracked by stable
    /// id because pruning shifts indices
    pub excluded_ids: Vec<LocationId>,
}

impl PendingGesture {
    /// Resolve the excluded ids to current location indices. Ids whose
    /// locations were pruned away resolve to nothing.
    pub fn excluded_indices(&self, mesh: &LiveMesh) -> Vec<usize> {
        self.excluded_ids
            .iter()
            .filter_map(|&id| mesh.index_of(id))
            .collect()
    }

    /// Convert to the incoming-data form for commit: coincident positions
    /// within the gesture collapse to one location, and the returned index
    /// marks which location is the moving corner.
    pub fn to_incoming(&self) -> (IncomingGeometry, usize) {
        let mut positions: Vec<Vec3> = Vec::new();
        let index_of = |p: Vec3, positions: &mut Vec<Vec3>| -> usize {
            match positions.iter().position(|&q| q == p) {
                Some(i) => i,
                None => {
                    positions.push(p);
                    positions.len() - 1
                }
            }
        };

        let mut faces = Vec::with_capacity(self.triangles.len());
        for tri in &self.triangles {
            let a = index_of(tri.fixed[0], &mut positions);
            let b = index_of(tri.fixed[1], &mut positions);
            let m = index_of(self.moving, &mut positions);
            faces.push(IncomingFace {
                vertices: [a, b, m],
                color_index: tri.color_index,
                id: tri.source_face,
            });
        }
        // Every triangle references the moving corner, but a gesture with no
        // triangles still needs a coherent answer
        let moving_index = index_of(self.moving, &mut positions);

        let locations = positions
            .into_iter()
            .map(|position| IncomingLocation { position, id: None })
            .collect();
        (IncomingGeometry { locations, faces }, moving_index)
    }
}
