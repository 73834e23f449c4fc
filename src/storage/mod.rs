//! Persistent slot storage
//!
//! Meshes persist as one compact-format string per save slot, behind a
//! plain string key-value backend. A stored schema-version integer gates
//! every open: when the store predates the running build, the whole store
//! is wiped and every slot is reseeded with the default mesh before any
//! slot is read. Corrupt slot data never propagates; a slot that fails to
//! decode falls back to the default mesh.

pub mod local;
pub mod memory;

pub use local::LocalStore;
pub use memory::MemoryStore;

use crate::codec::{decode, encode, WireFormat};
use crate::geometry::Vec3;
use crate::mesh::{Face, IdGen, IncomingGeometry, LiveMesh, Location, SnapPolicy};
use crate::snap::SnapConfig;
use log::warn;
use std::fmt;

/// Number of save slots
pub const SLOT_COUNT: usize = 3;

/// Bump when the persisted format changes incompatibly
pub const SCHEMA_VERSION: u32 = 2;

const VERSION_KEY: &str = "schema_version";
const TUTORIAL_KEY: &str = "tutorial_done";

fn slot_key(slot: usize) -> String {
    format!("mesh_slot_{}", slot)
}

/// Storage error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Underlying backend I/O failure
    Io(String),
    /// Slot index past [`SLOT_COUNT`]
    BadSlot(usize),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(msg) => write!(f, "storage I/O error: {}", msg),
            StorageError::BadSlot(slot) => {
                write!(f, "slot {} out of range (max {})", slot, SLOT_COUNT - 1)
            }
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e.to_string())
    }
}

/// String key-value backend the slot store sits on
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
    /// Drop every key
    fn clear(&mut self) -> Result<(), StorageError>;
}

/// Slot-addressed mesh persistence over any backend
pub struct SlotStore<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> SlotStore<S> {
    /// Open the store, running the schema-version gate first: an absent or
    /// older version wipes the store and reseeds every slot with the
    /// default mesh.
    pub fn open(store: S) -> Result<Self, StorageError> {
        let mut slots = Self { store };
        let stored = slots
            .store
            .get(VERSION_KEY)
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(0);
        if stored < SCHEMA_VERSION {
            warn!(
                "store schema {} older than {}, wiping and reseeding",
                stored, SCHEMA_VERSION
            );
            slots.reseed()?;
        }
        Ok(slots)
    }

    fn reseed(&mut self) -> Result<(), StorageError> {
        self.store.clear()?;
        let seed = encode(&default_mesh(), WireFormat::Plain);
        for slot in 0..SLOT_COUNT {
            self.store.set(&slot_key(slot), &seed)?;
        }
        self.store.set(VERSION_KEY, &SCHEMA_VERSION.to_string())?;
        Ok(())
    }

    /// Load a slot's mesh. Missing or corrupt data falls back to the
    /// default mesh; this never fails.
    pub fn load_slot(&self, slot: usize) -> LiveMesh {
        let Some(stored) = self.store.get(&slot_key(slot)) else {
            return default_mesh();
        };
        match decode(&stored, WireFormat::Plain) {
            Ok(incoming) => mesh_from_incoming(incoming),
            Err(e) => {
                warn!("slot {} is corrupt ({}), using default mesh", slot, e);
                default_mesh()
            }
        }
    }

    pub fn save_slot(&mut self, slot: usize, mesh: &LiveMesh) -> Result<(), StorageError> {
        if slot >= SLOT_COUNT {
            return Err(StorageError::BadSlot(slot));
        }
        self.store
            .set(&slot_key(slot), &encode(mesh, WireFormat::Plain))
    }

    pub fn tutorial_done(&self) -> bool {
        self.store.get(TUTORIAL_KEY).map_or(false, |v| v == "true")
    }

    pub fn set_tutorial_done(&mut self, done: bool) -> Result<(), StorageError> {
        self.store
            .set(TUTORIAL_KEY, if done { "true" } else { "false" })
    }
}

/// The preset every slot starts from: a 10-unit two-triangle ground quad
pub fn default_mesh() -> LiveMesh {
    let mut ids = IdGen::starting_at(1);
    let corners = [
        Vec3::new(-5.0, 0.0, -5.0),
        Vec3::new(5.0, 0.0, -5.0),
        Vec3::new(-5.0, 0.0, 5.0),
        Vec3::new(5.0, 0.0, 5.0),
    ];
    let locations = corners
        .into_iter()
        .map(|position| Location {
            position,
            id: ids.mint_location_id(),
            shader_position: position,
        })
        .collect();
    let mut faces = std::collections::BTreeMap::new();
    for vertices in [[0, 1, 2], [1, 3, 2]] {
        faces.insert(ids.mint_face_id(), Face::new(vertices, 0));
    }
    let mut mesh = LiveMesh::with_ids(ids);
    mesh.locations = locations;
    mesh.faces = faces;
    mesh
}

fn mesh_from_incoming(incoming: IncomingGeometry) -> LiveMesh {
    let mut mesh = LiveMesh::new();
    match mesh.add_geometry(incoming, &SnapPolicy::Disabled, &SnapConfig::default()) {
        Ok(_) => mesh,
        Err(e) => {
            warn!("stored mesh rejected ({}), using default mesh", e);
            default_mesh()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> SlotStore<MemoryStore> {
        SlotStore::open(MemoryStore::new()).unwrap()
    }

    #[test]
    fn test_fresh_store_is_seeded() {
        let slots = fresh();
        for slot in 0..SLOT_COUNT {
            let mesh = slots.load_slot(slot);
            assert_eq!(mesh.faces.len(), 2);
            assert_eq!(mesh.locations.len(), 4);
        }
    }

    #[test]
    fn test_save_load_round_trip() {
        let mut slots = fresh();
        let mut mesh = default_mesh();
        let first = mesh.face_ids()[0];
        mesh.remove_faces(&[first]);
        slots.save_slot(1, &mesh).unwrap();

        let loaded = slots.load_slot(1);
        assert_eq!(loaded.faces.len(), 1);
        assert_eq!(loaded.locations.len(), 3);
        // Other slots untouched
        assert_eq!(slots.load_slot(0).faces.len(), 2);
    }

    #[test]
    fn test_old_schema_wipes_and_reseeds() {
        let mut backing = MemoryStore::new();
        backing.set(VERSION_KEY, "1").unwrap();
        backing
            .set(&slot_key(0), "user content that must not survive")
            .unwrap();
        backing.set("stray_key", "junk").unwrap();

        let slots = SlotStore::open(backing).unwrap();
        let mesh = slots.load_slot(0);
        assert_eq!(mesh.faces.len(), 2);
        assert!(slots.store.get("stray_key").is_none());
        assert_eq!(
            slots.store.get(VERSION_KEY).as_deref(),
            Some(SCHEMA_VERSION.to_string().as_str())
        );
    }

    #[test]
    fn test_current_schema_preserves_contents() {
        let mut slots = fresh();
        let mesh = LiveMesh::new();
        slots.save_slot(2, &mesh).unwrap();

        // Reopening at the same version keeps the emptied slot
        let slots = SlotStore::open(slots.store).unwrap();
        assert_eq!(slots.load_slot(2).faces.len(), 0);
    }

    #[test]
    fn test_corrupt_slot_falls_back_to_default() {
        let mut slots = fresh();
        slots.store.set(&slot_key(0), "1 2 3  0 1").unwrap();
        let mesh = slots.load_slot(0);
        assert_eq!(mesh.faces.len(), 2);
        assert_eq!(mesh.locations.len(), 4);
    }

    #[test]
    fn test_bad_slot_index_rejected() {
        let mut slots = fresh();
        let err = slots.save_slot(SLOT_COUNT, &LiveMesh::new()).unwrap_err();
        assert_eq!(err, StorageError::BadSlot(SLOT_COUNT));
    }

    #[test]
    fn test_tutorial_flag() {
        let mut slots = fresh();
        assert!(!slots.tutorial_done());
        slots.set_tutorial_done(true).unwrap();
        assert!(slots.tutorial_done());
        // Survives the version gate at the same schema
        let slots = SlotStore::open(slots.store).unwrap();
        assert!(slots.tutorial_done());
    }
}
