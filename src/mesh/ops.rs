//! Mesh mutation operations: add, remove, and the cleanup passes
//!
//! Every structural mutation ends by re-establishing the invariants: faces
//! reference valid pairwise-distinct indices, no two faces share a vertex
//! set, and no location is left unreferenced. Degenerate and duplicate faces
//! are an expected product of vertex snapping, so cleanup is silent
//! self-healing, not an error path.

use super::model::{Face, FaceId, LiveMesh, Location, LocationId};
use crate::geometry::Vec3;
use crate::snap::{snap_check, snap_to_grid, Exactness, SnapConfig};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// A batch of geometry headed into the mesh: a gesture commit, a decoded
/// save slot, or a remote peer's edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingGeometry {
    pub locations: Vec<IncomingLocation>,
    pub faces: Vec<IncomingFace>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IncomingLocation {
    pub position: Vec3,
    /// Reused when present, freshly minted otherwise
    pub id: Option<LocationId>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IncomingFace {
    /// Indices into the incoming location list
    pub vertices: [usize; 3],
    pub color_index: u32,
    /// Reused when present; installing under an existing faceId replaces
    /// that face
    pub id: Option<FaceId>,
}

/// How incoming locations may merge onto existing mesh vertices
#[derive(Debug, Clone, PartialEq)]
pub enum SnapPolicy {
    /// Each incoming point may snap to the nearest existing point within the
    /// interactive snap radius
    Free,
    /// Snap only when the incoming position equals an existing point after
    /// rounding
    OnlyExact,
    /// No snapping at all (remote edits arrive pre-resolved)
    Disabled,
    /// Gesture commit: `moving` incoming indices snap exactly but never onto
    /// `excluded_targets` (a dragged point cannot snap to itself or to the
    /// edge it is stretching from); all other indices snap exactly.
    PerPoint {
        moving: Vec<usize>,
        excluded_targets: Vec<usize>,
    },
}

/// What an `add_geometry` call actually installed
#[derive(Debug, Clone, Default)]
pub struct AddOutcome {
    /// FaceIds installed by this call, in install order. Faces later removed
    /// by the degenerate/duplicate cleanup are not listed.
    pub installed: Vec<FaceId>,
    /// FaceIds the call deleted: reinstalls that degenerated under snapping,
    /// and faces collapsed by the duplicate sweep. Peers holding any of these
    /// need a matching remove. Fresh ids minted within the call never appear.
    pub dropped: Vec<FaceId>,
    /// Locations appended (as opposed to snapped onto existing ones)
    pub new_locations: usize,
}

/// Rejection of malformed incoming data. The mesh is untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddError {
    /// A face references an index outside the incoming location list
    VertexOutOfRange { face: usize, index: usize, len: usize },
}

impl fmt::Display for AddError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddError::VertexOutOfRange { face, index, len } => write!(
                f,
                "incoming face {} references location {} (only {} provided)",
                face, index, len
            ),
        }
    }
}

impl std::error::Error for AddError {}

impl LiveMesh {
    /// Compact the location array down to the set actually referenced by
    /// faces, remapping every face index. Runs after every structural
    /// mutation. O(locations + faces).
    pub fn prune_unused_locations(&mut self) {
        let mut used = vec![false; self.locations.len()];
        for face in self.faces.values() {
            for &v in &face.vertices {
                used[v] = true;
            }
        }

        let mut remap = vec![usize::MAX; self.locations.len()];
        let mut kept = Vec::with_capacity(self.locations.len());
        for (i, loc) in self.locations.iter().enumerate() {
            if used[i] {
                remap[i] = kept.len();
                kept.push(*loc);
            }
        }

        if kept.len() == self.locations.len() {
            return;
        }

        for face in self.faces.values_mut() {
            for v in &mut face.vertices {
                *v = remap[*v];
            }
        }
        self.locations = kept;
    }

    /// Collapse faces that reference the same unordered vertex triple.
    /// Iteration is ascending faceId, so the lowest id survives. Idempotent.
    pub fn dedupe_faces(&mut self) {
        let mut seen: HashSet<[usize; 3]> = HashSet::new();
        let mut doomed = Vec::new();
        for (&id, face) in &self.faces {
            if !seen.insert(face.canonical()) {
                doomed.push(id);
            }
        }
        for id in doomed {
            debug!("collapsing duplicate face {:?}", id);
            self.faces.remove(&id);
        }
    }

    /// All faces referencing the given location index, ascending by faceId.
    /// Brute-force scan; callers treat the result as the definition.
    pub fn faces_touching_location(&self, location: usize) -> Vec<FaceId> {
        self.faces
            .iter()
            .filter(|(_, face)| face.vertices.contains(&location))
            .map(|(&id, _)| id)
            .collect()
    }

    /// Delete the given faces, then prune now-unused locations. Returns how
    /// many faces were actually removed. No dedupe: removal cannot create
    /// duplicates.
    pub fn remove_faces(&mut self, face_ids: &[FaceId]) -> usize {
        let mut removed = 0;
        for id in face_ids {
            if self.faces.remove(id).is_some() {
                removed += 1;
            }
        }
        if removed > 0 {
            self.prune_unused_locations();
        }
        removed
    }

    /// Install a batch of incoming geometry, snapping incoming locations
    /// against the *pre-batch* mesh.
    ///
    /// Ordering matters and is load-bearing: snap checks run against the
    /// mesh as it was before this call, and staged locations are appended
    /// only after the whole batch is resolved, so within one call no
    /// incoming point can snap onto a sibling incoming point.
    pub fn add_geometry(
        &mut self,
        incoming: IncomingGeometry,
        policy: &SnapPolicy,
        snap: &SnapConfig,
    ) -> Result<AddOutcome, AddError> {
        for (fi, face) in incoming.faces.iter().enumerate() {
            for &v in &face.vertices {
                if v >= incoming.locations.len() {
                    return Err(AddError::VertexOutOfRange {
                        face: fi,
                        index: v,
                        len: incoming.locations.len(),
                    });
                }
            }
        }

        let adopt_directly = self.is_empty();

        // Resolve every incoming location against the pre-batch mesh
        let base = self.locations.len();
        let mut relink = Vec::with_capacity(incoming.locations.len());
        let mut staged: Vec<Location> = Vec::new();
        for (i, inc) in incoming.locations.iter().enumerate() {
            let target = if adopt_directly {
                None
            } else {
                self.snap_target(i, inc.position, policy, snap)
            };
            match target {
                Some(existing) => relink.push(existing),
                None => {
                    relink.push(base + staged.len());
                    let id = inc
                        .id
                        .unwrap_or_else(|| self.ids.mint_location_id());
                    staged.push(Location::new(snap_to_grid(inc.position), id));
                }
            }
        }
        let new_locations = staged.len();
        self.locations.append(&mut staged);

        // Ids the outside world may already hold: everything resident before
        // install plus every id the batch carried explicitly
        let mut known: Vec<FaceId> = self.faces.keys().copied().collect();
        known.extend(incoming.faces.iter().filter_map(|f| f.id));
        known.sort_unstable();
        known.dedup();

        // Install faces through the relink table
        let mut installed = Vec::with_capacity(incoming.faces.len());
        for inc in &incoming.faces {
            let face = Face::new(
                [
                    relink[inc.vertices[0]],
                    relink[inc.vertices[1]],
                    relink[inc.vertices[2]],
                ],
                inc.color_index,
            );
            let id = inc.id.unwrap_or_else(|| self.ids.mint_face_id());
            if face.is_valid() {
                self.faces.insert(id, face);
                installed.push(id);
            } else {
                // Snapping merged two corners of this triangle; it no longer
                // exists as a face
                debug!("dropping face {:?} degenerated by snapping", id);
                self.faces.remove(&id);
            }
        }

        self.prune_unused_locations();
        self.dedupe_faces();
        installed.retain(|id| self.faces.contains_key(id));
        known.retain(|id| !self.faces.contains_key(id));

        Ok(AddOutcome {
            installed,
            dropped: known,
            new_locations,
        })
    }

    fn snap_target(
        &self,
        incoming_index: usize,
        position: Vec3,
        policy: &SnapPolicy,
        snap: &SnapConfig,
    ) -> Option<usize> {
        match policy {
            SnapPolicy::Disabled => None,
            SnapPolicy::Free => snap_check(self, position, Exactness::Loose, snap, &[]),
            SnapPolicy::OnlyExact => snap_check(self, position, Exactness::Exact, snap, &[]),
            SnapPolicy::PerPoint {
                moving,
                excluded_targets,
            } => {
                if moving.contains(&incoming_index) {
                    snap_check(self, position, Exactness::Exact, snap, excluded_targets)
                } else {
                    snap_check(self, position, Exactness::Exact, snap, &[])
                }
            }
        }
    }

    /// Check every topology invariant. Test support; mutations are expected
    /// to keep this true at rest.
    pub fn invariants_hold(&self) -> bool {
        let mut seen = HashSet::new();
        for face in self.faces.values() {
            if !face.is_valid() {
                return false;
            }
            if face.vertices.iter().any(|&v| v >= self.locations.len()) {
                return false;
            }
            if !seen.insert(face.canonical()) {
                return false;
            }
        }
        let mut used = vec![false; self.locations.len()];
        for face in self.faces.values() {
            for &v in &face.vertices {
                used[v] = true;
            }
        }
        used.into_iter().all(|u| u)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::tests::mesh_from_triangles;

    fn tri(a: Vec3, b: Vec3, c: Vec3) -> IncomingGeometry {
        IncomingGeometry {
            locations: vec![
                IncomingLocation { position: a, id: None },
                IncomingLocation { position: b, id: None },
                IncomingLocation { position: c, id: None },
            ],
            faces: vec![IncomingFace {
                vertices: [0, 1, 2],
                color_index: 0,
                id: None,
            }],
        }
    }

    #[test]
    fn test_add_to_empty_mesh_adopts_directly() {
        let mut mesh = LiveMesh::new();
        let outcome = mesh
            .add_geometry(
                tri(
                    Vec3::new(0.0, 0.0, 0.0),
                    Vec3::new(10.0, 0.0, 0.0),
                    Vec3::new(0.0, 10.0, 0.0),
                ),
                &SnapPolicy::Free,
                &SnapConfig::default(),
            )
            .unwrap();
        assert_eq!(mesh.locations.len(), 3);
        assert_eq!(mesh.faces.len(), 1);
        assert_eq!(outcome.installed.len(), 1);
        assert_eq!(outcome.new_locations, 3);
        assert!(mesh.invariants_hold());
    }

    #[test]
    fn test_snap_convergence_gains_two_locations() {
        // One corner exactly matches an existing location, so the mesh gains
        // 2 new locations, not 3, and the new face references the existing
        // index.
        let mut mesh = mesh_from_triangles(&[[
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(0.0, 10.0, 0.0),
        ]]);
        let existing = 1; // (10, 0, 0)
        let outcome = mesh
            .add_geometry(
                tri(
                    Vec3::new(10.0, 0.0, 0.0),
                    Vec3::new(20.0, 0.0, 0.0),
                    Vec3::new(20.0, 10.0, 0.0),
                ),
                &SnapPolicy::Free,
                &SnapConfig::default(),
            )
            .unwrap();
        assert_eq!(outcome.new_locations, 2);
        assert_eq!(mesh.locations.len(), 5);
        let new_face = mesh.faces[&outcome.installed[0]];
        assert!(new_face.vertices.contains(&existing));
        assert!(mesh.invariants_hold());
    }

    #[test]
    fn test_exact_policy_merges_positions_that_round_together() {
        // 9.6 rounds onto the existing vertex at 10, so the corner must
        // merge instead of appending a co-located second location
        let mut mesh = mesh_from_triangles(&[[
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(0.0, 10.0, 0.0),
        ]]);
        let outcome = mesh
            .add_geometry(
                tri(
                    Vec3::new(9.6, 0.0, 0.0),
                    Vec3::new(20.0, 0.0, 0.0),
                    Vec3::new(20.0, 10.0, 0.0),
                ),
                &SnapPolicy::OnlyExact,
                &SnapConfig::default(),
            )
            .unwrap();
        assert_eq!(outcome.new_locations, 2);
        assert_eq!(mesh.locations.len(), 5);
        for (i, a) in mesh.locations.iter().enumerate() {
            for b in &mesh.locations[i + 1..] {
                assert!(a.position.distance(b.position) > 0.001);
            }
        }
        assert!(mesh.invariants_hold());
    }

    #[test]
    fn test_degenerate_reinstall_reports_dropped_id() {
        // A carried faceId whose face collapses under snapping never lands
        // in the mesh; the outcome must name it so peers can delete theirs
        let mut mesh = mesh_from_triangles(&[[
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(0.0, 10.0, 0.0),
        ]]);
        let incoming = IncomingGeometry {
            locations: vec![
                IncomingLocation { position: Vec3::new(0.0, 0.0, 0.0), id: None },
                IncomingLocation { position: Vec3::new(10.0, 0.0, 0.0), id: None },
                IncomingLocation { position: Vec3::new(9.8, 0.2, 0.0), id: None },
            ],
            faces: vec![IncomingFace {
                vertices: [0, 1, 2],
                color_index: 0,
                id: Some(FaceId(77)),
            }],
        };
        let outcome = mesh
            .add_geometry(incoming, &SnapPolicy::OnlyExact, &SnapConfig::default())
            .unwrap();
        assert!(outcome.installed.is_empty());
        assert_eq!(outcome.dropped, vec![FaceId(77)]);
        assert_eq!(mesh.faces.len(), 1);
        assert!(mesh.invariants_hold());
    }

    #[test]
    fn test_dedupe_after_add_reports_displaced_id() {
        // An incoming duplicate with a lower carried id survives the sweep;
        // the resident face it displaces shows up in dropped
        let mut mesh = mesh_from_triangles(&[[
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(0.0, 10.0, 0.0),
        ]]);
        let original = mesh.face_ids()[0];
        let incoming = IncomingGeometry {
            locations: vec![
                IncomingLocation { position: Vec3::new(0.0, 0.0, 0.0), id: None },
                IncomingLocation { position: Vec3::new(10.0, 0.0, 0.0), id: None },
                IncomingLocation { position: Vec3::new(0.0, 10.0, 0.0), id: None },
            ],
            faces: vec![IncomingFace {
                vertices: [0, 1, 2],
                color_index: 4,
                id: Some(FaceId(1)),
            }],
        };
        let outcome = mesh
            .add_geometry(incoming, &SnapPolicy::OnlyExact, &SnapConfig::default())
            .unwrap();
        assert_eq!(outcome.installed, vec![FaceId(1)]);
        assert_eq!(outcome.dropped, vec![original]);
        assert_eq!(mesh.faces.len(), 1);
        assert!(mesh.invariants_hold());
    }

    #[test]
    fn test_batch_siblings_do_not_snap_to_each_other() {
        // Two incoming locations a snap-radius apart must both be appended:
        // snapping only consults the pre-batch mesh.
        let mut mesh = mesh_from_triangles(&[[
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(0.0, 10.0, 0.0),
        ]]);
        let outcome = mesh
            .add_geometry(
                tri(
                    Vec3::new(20.0, 0.0, 0.0),
                    Vec3::new(21.0, 0.0, 0.0),
                    Vec3::new(20.0, 10.0, 0.0),
                ),
                &SnapPolicy::Free,
                &SnapConfig {
                    snap_radius: 1.8,
                    ..SnapConfig::default()
                },
            )
            .unwrap();
        assert_eq!(outcome.new_locations, 3);
        assert!(mesh.invariants_hold());
    }

    #[test]
    fn test_degenerate_by_snapping_is_deleted() {
        // Two corners of the incoming triangle collapse onto the same
        // existing location, so the face never materializes.
        let mut mesh = mesh_from_triangles(&[[
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(0.0, 10.0, 0.0),
        ]]);
        let outcome = mesh
            .add_geometry(
                tri(
                    Vec3::new(9.5, 0.0, 0.0),
                    Vec3::new(10.5, 0.0, 0.0),
                    Vec3::new(30.0, 0.0, 10.0),
                ),
                &SnapPolicy::Free,
                &SnapConfig::default(),
            )
            .unwrap();
        assert!(outcome.installed.is_empty());
        assert_eq!(mesh.faces.len(), 1);
        // The orphaned third corner was pruned right back out
        assert_eq!(mesh.locations.len(), 3);
        assert!(mesh.invariants_hold());
    }

    #[test]
    fn test_duplicate_face_collapse_keeps_lowest_id() {
        // Same vertex set in different winding collapses to one face
        let mut mesh = mesh_from_triangles(&[[
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(0.0, 10.0, 0.0),
        ]]);
        let first_id = mesh.face_ids()[0];
        let incoming = IncomingGeometry {
            locations: vec![
                IncomingLocation { position: Vec3::new(0.0, 10.0, 0.0), id: None },
                IncomingLocation { position: Vec3::new(10.0, 0.0, 0.0), id: None },
                IncomingLocation { position: Vec3::new(0.0, 0.0, 0.0), id: None },
            ],
            faces: vec![IncomingFace {
                vertices: [0, 1, 2],
                color_index: 5,
                id: None,
            }],
        };
        mesh.add_geometry(incoming, &SnapPolicy::OnlyExact, &SnapConfig::default())
            .unwrap();
        assert_eq!(mesh.faces.len(), 1);
        assert_eq!(mesh.face_ids()[0], first_id);
        assert!(mesh.invariants_hold());
    }

    #[test]
    fn test_dedupe_is_idempotent() {
        let mut mesh = mesh_from_triangles(&[
            [
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(10.0, 0.0, 0.0),
                Vec3::new(0.0, 10.0, 0.0),
            ],
            [
                Vec3::new(10.0, 0.0, 0.0),
                Vec3::new(10.0, 10.0, 0.0),
                Vec3::new(0.0, 10.0, 0.0),
            ],
        ]);
        mesh.dedupe_faces();
        let once = mesh.clone();
        mesh.dedupe_faces();
        assert_eq!(mesh.faces.len(), once.faces.len());
        assert_eq!(mesh.face_ids(), once.face_ids());
    }

    #[test]
    fn test_removal_cascade_prunes_everything() {
        // Removing the only face empties the location array too
        let mut mesh = mesh_from_triangles(&[[
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(0.0, 10.0, 0.0),
        ]]);
        let ids = mesh.face_ids();
        let removed = mesh.remove_faces(&ids);
        assert_eq!(removed, 1);
        assert!(mesh.faces.is_empty());
        assert!(mesh.locations.is_empty());
    }

    #[test]
    fn test_remove_shared_edge_keeps_shared_locations() {
        let mut mesh = mesh_from_triangles(&[
            [
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(10.0, 0.0, 0.0),
                Vec3::new(0.0, 10.0, 0.0),
            ],
            [
                Vec3::new(10.0, 0.0, 0.0),
                Vec3::new(10.0, 10.0, 0.0),
                Vec3::new(0.0, 10.0, 0.0),
            ],
        ]);
        let second = mesh.face_ids()[1];
        mesh.remove_faces(&[second]);
        assert_eq!(mesh.faces.len(), 1);
        assert_eq!(mesh.locations.len(), 3);
        assert!(mesh.invariants_hold());
    }

    #[test]
    fn test_faces_touching_location_matches_brute_force() {
        let mesh = mesh_from_triangles(&[
            [
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(10.0, 0.0, 0.0),
                Vec3::new(0.0, 10.0, 0.0),
            ],
            [
                Vec3::new(10.0, 0.0, 0.0),
                Vec3::new(10.0, 10.0, 0.0),
                Vec3::new(0.0, 10.0, 0.0),
            ],
        ]);
        // (10, 0, 0) is shared by both faces
        let shared = mesh
            .locations
            .iter()
            .position(|l| l.position.distance(Vec3::new(10.0, 0.0, 0.0)) < 0.001)
            .unwrap();
        assert_eq!(mesh.faces_touching_location(shared).len(), 2);
        // (10, 10, 0) belongs only to the second face
        let corner = mesh
            .locations
            .iter()
            .position(|l| l.position.distance(Vec3::new(10.0, 10.0, 0.0)) < 0.001)
            .unwrap();
        assert_eq!(mesh.faces_touching_location(corner).len(), 1);
    }

    #[test]
    fn test_malformed_incoming_rejected_without_mutation() {
        let mut mesh = mesh_from_triangles(&[[
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(0.0, 10.0, 0.0),
        ]]);
        let before = mesh.clone();
        let bad = IncomingGeometry {
            locations: vec![IncomingLocation {
                position: Vec3::new(50.0, 0.0, 0.0),
                id: None,
            }],
            faces: vec![IncomingFace {
                vertices: [0, 1, 2],
                color_index: 0,
                id: None,
            }],
        };
        let err = mesh
            .add_geometry(bad, &SnapPolicy::Free, &SnapConfig::default())
            .unwrap_err();
        assert!(matches!(err, AddError::VertexOutOfRange { .. }));
        assert_eq!(mesh.locations.len(), before.locations.len());
        assert_eq!(mesh.face_ids(), before.face_ids());
    }

    #[test]
    fn test_invariants_across_random_edit_sequence() {
        // Invariants must hold after every call in a mixed sequence
        let mut mesh = LiveMesh::new();
        let config = SnapConfig::default();
        for i in 0..12 {
            let x = (i * 3) as f32;
            mesh.add_geometry(
                tri(
                    Vec3::new(x, 0.0, 0.0),
                    Vec3::new(x + 10.0, 0.0, 0.0),
                    Vec3::new(x, 10.0, 0.0),
                ),
                &SnapPolicy::Free,
                &config,
            )
            .unwrap();
            assert!(mesh.invariants_hold(), "add {} broke invariants", i);
            if i % 3 == 2 {
                let victim = mesh.face_ids()[0];
                mesh.remove_faces(&[victim]);
                assert!(mesh.invariants_hold(), "remove {} broke invariants", i);
            }
        }
    }

    #[test]
    fn test_positions_grid_aligned_after_add() {
        let mut mesh = LiveMesh::new();
        mesh.add_geometry(
            tri(
                Vec3::new(0.2, 0.1, -0.3),
                Vec3::new(9.7, 0.4, 0.0),
                Vec3::new(0.0, 10.2, 0.1),
            ),
            &SnapPolicy::Free,
            &SnapConfig::default(),
        )
        .unwrap();
        for loc in &mesh.locations {
            assert!((loc.position.x - loc.position.x.round()).abs() < 0.001);
            assert!((loc.position.y - loc.position.y.round()).abs() < 0.001);
            assert!((loc.position.z - loc.position.z.round()).abs() < 0.001);
        }
    }
}
