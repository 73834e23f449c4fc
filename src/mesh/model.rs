//! Core mesh types: locations, faces, ids

use crate::geometry::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Stable id for a location, unique within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LocationId(pub u64);

/// Stable id for a face, unique within a session.
///
/// Ids are session-scoped tokens: two devices can mint colliding ids, so
/// cross-device messages always carry fresh faceIds explicitly in the wire
/// payload rather than assuming ids agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FaceId(pub u64);

/// Monotonic id mint, seeded from the wall clock at construction so ids from
/// successive sessions rarely collide (collisions are tolerated anyway).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdGen {
    next: u64,
}

impl IdGen {
    pub fn new() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self { next: seed }
    }

    /// A generator starting at a fixed value, for deterministic tests
    pub fn starting_at(next: u64) -> Self {
        Self { next }
    }

    pub fn mint_location_id(&mut self) -> LocationId {
        LocationId(self.mint())
    }

    pub fn mint_face_id(&mut self) -> FaceId {
        FaceId(self.mint())
    }

    fn mint(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

impl Default for IdGen {
    fn default() -> Self {
        Self::new()
    }
}

/// A vertex of the mesh
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Location {
    /// World-space position, integer-valued whenever the mesh is at rest
    pub position: Vec3,
    pub id: LocationId,
    /// Copy of the position frozen at creation. Rendering effects keyed on
    /// original placement read this; moves never update it.
    pub shader_position: Vec3,
}

impl Location {
    pub fn new(position: Vec3, id: LocationId) -> Self {
        Self {
            position,
            id,
            shader_position: position,
        }
    }
}

/// A triangle referencing three locations by array index
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Face {
    /// Indices into [`LiveMesh::locations`], pairwise distinct
    pub vertices: [usize; 3],
    /// Index into the application's fixed color palette
    pub color_index: u32,
}

impl Face {
    pub fn new(vertices: [usize; 3], color_index: u32) -> Self {
        Self {
            vertices,
            color_index,
        }
    }

    /// True when the three vertex indices are pairwise distinct
    pub fn is_valid(&self) -> bool {
        let [a, b, c] = self.vertices;
        a != b && b != c && a != c
    }

    /// Sorted index triple, the canonical key for duplicate detection
    pub fn canonical(&self) -> [usize; 3] {
        let mut key = self.vertices;
        key.sort_unstable();
        key
    }
}

/// The full in-memory mesh state for the world being edited
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveMesh {
    pub locations: Vec<Location>,
    /// BTreeMap so iteration is ascending faceId: dedupe's "first seen wins"
    /// deterministically keeps the lowest id, and encoding is reproducible.
    pub faces: BTreeMap<FaceId, Face>,
    pub ids: IdGen,
}

impl LiveMesh {
    pub fn new() -> Self {
        Self {
            locations: Vec::new(),
            faces: BTreeMap::new(),
            ids: IdGen::new(),
        }
    }

    pub fn with_ids(ids: IdGen) -> Self {
        Self {
            locations: Vec::new(),
            faces: BTreeMap::new(),
            ids,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty() && self.locations.is_empty()
    }

    /// Face ids in ascending order
    pub fn face_ids(&self) -> Vec<FaceId> {
        self.faces.keys().copied().collect()
    }

    /// Look up a location index by stable id
    pub fn index_of(&self, id: LocationId) -> Option<usize> {
        self.locations.iter().position(|loc| loc.id == id)
    }
}

impl Default for LiveMesh {
    fn default() -> Self {
        Self::new()
    }
}
