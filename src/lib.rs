//! Polygon Studio core: the live mesh engine behind a hand-tracked AR
//! polygon editor.
//!
//! Users pinch in mid-air to add, move, and remove triangular faces. This
//! crate owns the hard parts of that loop:
//!
//! - the in-memory mesh (locations + faces) and its topology invariants
//! - the per-frame nearest-feature cursor search (time-sliced for large meshes)
//! - snap-to-vertex / snap-to-grid reconciliation
//! - the pinch gesture state machine (move point, create face, remove face)
//! - the compact string codec used for save slots, QR export, and multiplayer
//! - slot storage with schema versioning
//!
//! Rendering, hand tracking, audio, UI, and the network transport are
//! collaborator traits (see [`world`]); the engine never talks to hardware.

pub mod codec;
pub mod config;
pub mod cursor;
pub mod geometry;
pub mod mesh;
pub mod schedule;
pub mod session;
pub mod snap;
pub mod storage;
pub mod sync;
pub mod world;

pub use codec::{decode, encode, DecodeError, WireFormat};
pub use config::EditorConfig;
pub use cursor::{CursorResolver, Selection};
pub use geometry::Vec3;
pub use mesh::{Face, FaceId, IdGen, LiveMesh, Location, LocationId};
pub use session::{EditingSession, SessionOutcome};
pub use storage::{KeyValueStore, LocalStore, MemoryStore, SlotStore, StorageError};
pub use sync::Transport;
pub use world::{CancelSignal, CursorSource, MeshRenderer, WorldEvent, WorldManager};
