//! Editing session: the pinch gesture state machine
//!
//! One pinch cycle (start → hold… → end) is the unit of interactive
//! editing. Depending on what the cursor is nearest to when the pinch
//! starts, the session moves an existing point, stretches a new face off an
//! existing edge, or (in remove mode) deletes faces continuously while the
//! pinch is held.
//!
//! The session mutates only the mesh. Rendering, persistence, broadcast,
//! and deferred work are the owner's job, driven by the returned
//! [`SessionOutcome`].

mod pending;

pub use pending::{PendingGesture, PendingTriangle};

use crate::config::EditorConfig;
use crate::cursor::Selection;
use crate::geometry::Vec3;
use crate::mesh::{
    AddOutcome, FaceId, IncomingFace, IncomingGeometry, IncomingLocation, LiveMesh, SnapPolicy,
};
use crate::snap::{snap_check, Exactness};
use log::{debug, warn};

/// What a gesture event did, for the owner to act on
#[derive(Debug, Clone)]
pub enum SessionOutcome {
    /// Nothing to do this frame
    Unchanged,
    /// A move/create gesture began; preview rendering should start
    Started,
    /// The pending gesture's moving corner changed; re-render the preview
    Preview,
    /// A face was deleted (remove mode)
    Removed(FaceId),
    /// A face was deleted and the mesh is now empty; upstream auto-exits
    /// remove mode on this
    MeshEmptied(FaceId),
    /// The gesture committed into the mesh
    Committed(AddOutcome),
    /// The gesture was discarded (accidental tap); any snapshot was already
    /// re-added
    RolledBack,
    /// A cancel signal aborted the gesture. `restore` carries the
    /// pre-gesture snapshot still to be re-added (point moves only); the
    /// owner applies it, usually through a deferred task.
    Cancelled { restore: Option<IncomingGeometry> },
}

#[derive(Debug, Clone)]
enum SessionState {
    Idle,
    MovingPoint(PendingGesture),
    CreatingFace(PendingGesture),
    RemovingFace,
}

/// The gesture state machine. One per world.
#[derive(Debug, Clone)]
pub struct EditingSession {
    state: SessionState,
}

impl EditingSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, SessionState::Idle)
    }

    /// The in-progress gesture, for preview rendering
    pub fn pending(&self) -> Option<&PendingGesture> {
        match &self.state {
            SessionState::MovingPoint(p) | SessionState::CreatingFace(p) => Some(p),
            _ => None,
        }
    }

    /// Pinch started. `remove_target` is the current closest face when in
    /// remove mode; `color_index` is the palette slot new faces take.
    pub fn gesture_start(
        &mut self,
        mesh: &mut LiveMesh,
        selection: &Selection,
        cursor_pos: Vec3,
        remove_mode: bool,
        remove_target: Option<FaceId>,
        color_index: u32,
    ) -> SessionOutcome {
        if !self.is_idle() {
            return SessionOutcome::Unchanged;
        }

        if remove_mode {
            self.state = SessionState::RemovingFace;
            return match remove_target {
                Some(id) => remove_one(mesh, id),
                None => SessionOutcome::Unchanged,
            };
        }

        if selection.is_point {
            let Some(point) = selection.point else {
                return SessionOutcome::Unchanged;
            };
            return self.start_point_move(mesh, point);
        }

        if selection.is_line {
            let Some((e0, e1)) = selection.line else {
                return SessionOutcome::Unchanged;
            };
            self.state = SessionState::CreatingFace(PendingGesture {
                triangles: vec![PendingTriangle {
                    fixed: [mesh.locations[e0].position, mesh.locations[e1].position],
                    color_index,
                    source_face: None,
                }],
                moving: cursor_pos,
                elapsed: 0.0,
                snapshot: None,
                excluded_ids: vec![mesh.locations[e0].id, mesh.locations[e1].id],
            });
            return SessionOutcome::Started;
        }

        // Inert selection: no gesture starts
        SessionOutcome::Unchanged
    }

    /// Detach every face touching the point and start dragging it. The
    /// detached faces are snapshotted first so cancel and accidental taps
    /// can restore them verbatim.
    fn start_point_move(&mut self, mesh: &mut LiveMesh, point: usize) -> SessionOutcome {
        let touching = mesh.faces_touching_location(point);
        if touching.is_empty() {
            // A point with no connected faces degrades to an inert state
            return SessionOutcome::Unchanged;
        }

        let moving = mesh.locations[point].position;
        let snapshot = snapshot_faces(mesh, &touching);

        let mut triangles = Vec::with_capacity(touching.len());
        let mut excluded_ids = Vec::new();
        for id in &touching {
            let face = mesh.faces[id];
            let fixed_indices: Vec<usize> = face
                .vertices
                .iter()
                .copied()
                .filter(|&v| v != point)
                .collect();
            // Faces are never degenerate at rest, so exactly two remain
            let [f0, f1] = [fixed_indices[0], fixed_indices[1]];
            triangles.push(PendingTriangle {
                fixed: [mesh.locations[f0].position, mesh.locations[f1].position],
                color_index: face.color_index,
                source_face: Some(*id),
            });
            for v in [f0, f1] {
                let loc_id = mesh.locations[v].id;
                if !excluded_ids.contains(&loc_id) {
                    excluded_ids.push(loc_id);
                }
            }
        }

        // Detach so the preview doesn't self-intersect the live mesh
        mesh.remove_faces(&touching);
        debug!("point move: detached {} faces", touching.len());

        self.state = SessionState::MovingPoint(PendingGesture {
            triangles,
            moving,
            elapsed: 0.0,
            snapshot: Some(snapshot),
            excluded_ids,
        });
        SessionOutcome::Started
    }

    /// Pinch still held. `cancel` is the out-of-band shake signal; `dt` is
    /// the frame delta.
    pub fn gesture_hold(
        &mut self,
        mesh: &mut LiveMesh,
        cursor_pos: Vec3,
        remove_target: Option<FaceId>,
        cancel: bool,
        dt: f32,
        config: &EditorConfig,
    ) -> SessionOutcome {
        if cancel && self.pending().is_some() {
            let restore = self.cancel();
            return SessionOutcome::Cancelled { restore };
        }

        match &mut self.state {
            SessionState::Idle => SessionOutcome::Unchanged,
            SessionState::RemovingFace => match remove_target {
                Some(id) => remove_one(mesh, id),
                None => SessionOutcome::Unchanged,
            },
            SessionState::MovingPoint(pending) | SessionState::CreatingFace(pending) => {
                pending.elapsed += dt;
                let excluded = pending.excluded_indices(mesh);
                pending.moving = match snap_check(
                    mesh,
                    cursor_pos,
                    Exactness::Loose,
                    &config.snap,
                    &excluded,
                ) {
                    Some(target) => mesh.locations[target].position,
                    None => cursor_pos,
                };
                SessionOutcome::Preview
            }
        }
    }

    /// Pinch released: commit, or roll back if the pinch was too short to
    /// be deliberate.
    pub fn gesture_end(&mut self, mesh: &mut LiveMesh, config: &EditorConfig) -> SessionOutcome {
        let state = std::mem::replace(&mut self.state, SessionState::Idle);
        let pending = match state {
            SessionState::Idle | SessionState::RemovingFace => return SessionOutcome::Unchanged,
            SessionState::MovingPoint(p) | SessionState::CreatingFace(p) => p,
        };

        if pending.elapsed < config.min_gesture_secs {
            // Accidental tap: never commit, restore what was detached
            if let Some(snapshot) = pending.snapshot {
                restore_snapshot(mesh, snapshot, config);
            }
            debug!("gesture under {}s treated as accidental tap", config.min_gesture_secs);
            return SessionOutcome::RolledBack;
        }

        let (incoming, moving_index) = pending.to_incoming();
        let policy = SnapPolicy::PerPoint {
            moving: vec![moving_index],
            excluded_targets: pending.excluded_indices(mesh),
        };
        match mesh.add_geometry(incoming, &policy, &config.snap) {
            Ok(outcome) => SessionOutcome::Committed(outcome),
            Err(e) => {
                // The gesture builder only emits well-formed batches; treat
                // a rejection like a cancel rather than losing the mesh
                warn!("gesture commit rejected: {}", e);
                if let Some(snapshot) = pending.snapshot {
                    restore_snapshot(mesh, snapshot, config);
                }
                SessionOutcome::RolledBack
            }
        }
    }

    /// Abort from outside the pinch cycle (mode exit, session teardown).
    /// Returns the snapshot still to be re-added, if any.
    pub fn cancel(&mut self) -> Option<IncomingGeometry> {
        let state = std::mem::replace(&mut self.state, SessionState::Idle);
        match state {
            SessionState::MovingPoint(mut pending) => pending.snapshot.take(),
            _ => None,
        }
    }
}

impl Default for EditingSession {
    fn default() -> Self {
        Self::new()
    }
}

fn remove_one(mesh: &mut LiveMesh, id: FaceId) -> SessionOutcome {
    if mesh.remove_faces(&[id]) == 0 {
        return SessionOutcome::Unchanged;
    }
    if mesh.faces.is_empty() {
        SessionOutcome::MeshEmptied(id)
    } else {
        SessionOutcome::Removed(id)
    }
}

/// Copy a set of faces (positions, colors, faceIds) into incoming-data form
fn snapshot_faces(mesh: &LiveMesh, face_ids: &[FaceId]) -> IncomingGeometry {
    let mut local_of: Vec<Option<usize>> = vec![None; mesh.locations.len()];
    let mut locations = Vec::new();
    let mut faces = Vec::new();
    for id in face_ids {
        let face = mesh.faces[id];
        let mut local = [0usize; 3];
        for (slot, &v) in local.iter_mut().zip(&face.vertices) {
            *slot = match local_of[v] {
                Some(i) => i,
                None => {
                    let i = locations.len();
                    local_of[v] = Some(i);
                    locations.push(IncomingLocation {
                        position: mesh.locations[v].position,
                        id: None,
                    });
                    i
                }
            };
        }
        faces.push(IncomingFace {
            vertices: local,
            color_index: face.color_index,
            id: Some(*id),
        });
    }
    IncomingGeometry { locations, faces }
}

/// Re-add a pre-gesture snapshot. Exact snapping relinks onto whatever
/// locations survived the detach.
pub(crate) fn restore_snapshot(mesh: &mut LiveMesh, snapshot: IncomingGeometry, config: &EditorConfig) {
    if let Err(e) = mesh.add_geometry(snapshot, &SnapPolicy::OnlyExact, &config.snap) {
        warn!("snapshot restore rejected: {}", e);
    }
}
