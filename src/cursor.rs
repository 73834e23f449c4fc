//! Cursor-to-geometry nearest-feature search
//!
//! Two searches live here. The continuous one drives editing: it finds the
//! nearest point/line feature to the hand cursor, time-sliced over a face
//! budget per frame so large meshes don't blow the frame budget. A new
//! [`Selection`] commits only when a full cycle over the face list
//! completes, so on a large mesh the selection lags the hand by up to one
//! cycle. That latency is the accepted tradeoff, not a bug.
//!
//! The discrete one (`closest_face`) is a full scan used only for remove-mode
//! face picking, where per-call cost is bounded by a single pinch.

use crate::geometry::{bounding_sphere, closest_point_on_segment, closest_point_on_triangle, Vec3};
use crate::mesh::{FaceId, LiveMesh};
use serde::{Deserialize, Serialize};

/// Search tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CursorConfig {
    /// Faces examined per step of the cycling search
    #[serde(default = "default_faces_per_step")]
    pub faces_per_step: usize,
    /// Winning endpoint closer than this classifies as a point selection
    #[serde(default = "default_point_radius")]
    pub point_radius: f32,
    /// Winning edge closer than this classifies as a line selection
    #[serde(default = "default_line_radius")]
    pub line_radius: f32,
    /// Maximum distance for remove-mode face picking
    #[serde(default = "default_face_pick_distance")]
    pub face_pick_distance: f32,
}

fn default_faces_per_step() -> usize {
    20
}
fn default_point_radius() -> f32 {
    1.5
}
fn default_line_radius() -> f32 {
    1.0
}
fn default_face_pick_distance() -> f32 {
    3.0
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            faces_per_step: default_faces_per_step(),
            point_radius: default_point_radius(),
            line_radius: default_line_radius(),
            face_pick_distance: default_face_pick_distance(),
        }
    }
}

/// What the cursor is currently nearest to. Recomputed continuously, never
/// persisted. Indices are only meaningful until the next structural change
/// (the resolver is reset on every mutation).
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Nearest face, reported even when no point/line qualifies (remove
    /// mode needs the context)
    pub face_id: Option<FaceId>,
    /// Location index of the winning endpoint
    pub point: Option<usize>,
    /// Endpoints of the winning edge
    pub line: Option<(usize, usize)>,
    /// The winning face's vertex not on the winning edge; completes a
    /// triangle when extending that edge into a new face
    pub third_vertex: Option<usize>,
    pub is_point: bool,
    pub is_line: bool,
}

impl Selection {
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when neither a point nor a line qualified
    pub fn is_inert(&self) -> bool {
        !self.is_point && !self.is_line
    }
}

/// Running best over the current cycle
#[derive(Debug, Clone)]
struct RunningBest {
    face_id: FaceId,
    endpoint_dist: f32,
    edge_dist: f32,
    endpoint: usize,
    edge: (usize, usize),
    third: usize,
}

/// The time-sliced nearest-feature search.
///
/// Holds a faceId snapshot taken at the last reset and a running best.
/// Must be reset whenever the mesh changes structurally or editing mode is
/// entered/exited; stepping against a mutated mesh would compare indices
/// into a topology that no longer exists.
#[derive(Debug, Clone, Default)]
pub struct CursorResolver {
    cycle: Vec<FaceId>,
    cursor: usize,
    best: Option<RunningBest>,
    selection: Selection,
}

impl CursorResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last committed selection
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Discard the running best, restart the cycle at 0, and re-snapshot the
    /// face list.
    pub fn reset(&mut self, mesh: &LiveMesh) {
        self.cycle = mesh.face_ids();
        self.cursor = 0;
        self.best = None;
        self.selection = Selection::empty();
    }

    /// Advance the search by one frame's budget. Commits a new selection
    /// only when the cycle wraps.
    pub fn step(&mut self, mesh: &LiveMesh, cursor_pos: Vec3, config: &CursorConfig) {
        if self.cycle.is_empty() {
            self.selection = Selection::empty();
            return;
        }
        let budget = config.faces_per_step.max(1);
        for _ in 0..budget {
            let id = self.cycle[self.cursor];
            // A face can disappear mid-cycle only if a reset was missed;
            // skipping it keeps the step total
            if let Some(face) = mesh.faces.get(&id) {
                self.consider(mesh, id, face.vertices, cursor_pos);
            }
            self.cursor += 1;
            if self.cursor >= self.cycle.len() {
                self.cursor = 0;
                self.commit(config);
                break;
            }
        }
    }

    /// Fold one face into the running best: closest of the 3 edges, then
    /// closer endpoint of that edge, compared lexicographically (endpoint
    /// distance first, edge distance only on an exact tie).
    fn consider(&mut self, mesh: &LiveMesh, id: FaceId, vertices: [usize; 3], cursor_pos: Vec3) {
        let [a, b, c] = vertices;
        let edges = [(a, b, c), (b, c, a), (c, a, b)];

        let mut best_edge = (f32::INFINITY, (a, b), c);
        for (v0, v1, other) in edges {
            let hit = closest_point_on_segment(
                cursor_pos,
                mesh.locations[v0].position,
                mesh.locations[v1].position,
            );
            if hit.distance < best_edge.0 {
                best_edge = (hit.distance, (v0, v1), other);
            }
        }
        let (edge_dist, edge, third) = best_edge;

        let d0 = cursor_pos.distance(mesh.locations[edge.0].position);
        let d1 = cursor_pos.distance(mesh.locations[edge.1].position);
        let (endpoint, endpoint_dist) = if d1 < d0 { (edge.1, d1) } else { (edge.0, d0) };

        let replaces = match &self.best {
            None => true,
            Some(best) => {
                endpoint_dist < best.endpoint_dist
                    || (endpoint_dist == best.endpoint_dist && edge_dist < best.edge_dist)
            }
        };
        if replaces {
            self.best = Some(RunningBest {
                face_id: id,
                endpoint_dist,
                edge_dist,
                endpoint,
                edge,
                third,
            });
        }
    }

    /// Cycle complete: classify the running best into a selection
    fn commit(&mut self, config: &CursorConfig) {
        self.selection = match self.best.take() {
            None => Selection::empty(),
            Some(best) => {
                let is_point = best.endpoint_dist < config.point_radius;
                let is_line = !is_point && best.edge_dist < config.line_radius;
                Selection {
                    face_id: Some(best.face_id),
                    point: Some(best.endpoint),
                    line: Some(best.edge),
                    third_vertex: Some(best.third),
                    is_point,
                    is_line,
                }
            }
        };
    }
}

/// Full-scan closest-face pick for remove mode: bounding-sphere rejection,
/// then exact triangle distance, interior projections only. Returns the
/// minimum within `face_pick_distance`.
pub fn closest_face(mesh: &LiveMesh, cursor_pos: Vec3, config: &CursorConfig) -> Option<FaceId> {
    let mut best: Option<(FaceId, f32)> = None;
    for (&id, face) in &mesh.faces {
        let [a, b, c] = face.vertices;
        let pa = mesh.locations[a].position;
        let pb = mesh.locations[b].position;
        let pc = mesh.locations[c].position;

        let sphere = bounding_sphere(pa, pb, pc);
        if cursor_pos.distance(sphere.center) - sphere.radius > config.face_pick_distance {
            continue;
        }

        let hit = closest_point_on_triangle(cursor_pos, pa, pb, pc);
        if !hit.interior || hit.distance > config.face_pick_distance {
            continue;
        }
        if best.map_or(true, |(_, d)| hit.distance < d) {
            best = Some((id, hit.distance));
        }
    }
    best.map(|(id, _)| id)
}
