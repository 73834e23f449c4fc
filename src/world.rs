//! WorldManager, the per-world wiring hub
//!
//! Owns the mesh, the cursor search, the gesture session, the scheduler
//! and the slot store, and talks to the app shell through small
//! collaborator traits. The shell drives it with `update(dt)` every frame
//! and forwards pinch events; everything downstream of a committed edit
//! (resolver reset, renderer rebuild, debounced persist, broadcast) is
//! handled here so the session stays a pure mesh transform.

use crate::codec::{decode, encode_faces, WireFormat};
use crate::config::EditorConfig;
use crate::cursor::{closest_face, CursorResolver, Selection};
use crate::geometry::Vec3;
use crate::mesh::{FaceId, IncomingGeometry, LiveMesh, RenderMesh, SnapPolicy};
use crate::schedule::{Scheduler, TaskHandle};
use crate::session::{restore_snapshot, EditingSession, PendingGesture, SessionOutcome};
use crate::storage::{KeyValueStore, SlotStore};
use crate::sync::Transport;
use log::{debug, warn};

/// Supplies the tracked cursor position each frame. `None` means tracking
/// is lost; the world skips search and gestures for that frame.
pub trait CursorSource {
    fn world_position(&mut self) -> Option<Vec3>;
}

/// Receives the flattened mesh whenever the static geometry changes.
pub trait MeshRenderer {
    fn rebuild(&mut self, mesh: &RenderMesh);
}

/// Polled during gesture holds; returns true at most once per trigger.
pub trait CancelSignal {
    fn take_cancel(&mut self) -> bool;
}

/// Notifications the shell reacts to, drained via [`WorldManager::take_events`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldEvent {
    /// The last face was removed; remove mode has been auto-exited
    AllFacesRemoved,
}

/// Deferred work tags for the world's scheduler
#[derive(Debug, Clone)]
enum WorldTask {
    /// Write the current mesh to its slot
    Persist,
    /// Re-add a cancelled gesture's detached faces
    Restore(IncomingGeometry),
}

pub struct WorldManager<S: KeyValueStore> {
    mesh: LiveMesh,
    config: EditorConfig,
    resolver: CursorResolver,
    session: EditingSession,
    scheduler: Scheduler<WorldTask>,
    slots: SlotStore<S>,
    cursor_source: Box<dyn CursorSource>,
    renderer: Box<dyn MeshRenderer>,
    cancel: Box<dyn CancelSignal>,
    transport: Option<Box<dyn Transport>>,
    current_slot: usize,
    remove_mode: bool,
    cursor_pos: Option<Vec3>,
    persist_task: Option<TaskHandle>,
    restore_task: Option<TaskHandle>,
    events: Vec<WorldEvent>,
}

impl<S: KeyValueStore> WorldManager<S> {
    pub fn new(
        config: EditorConfig,
        slots: SlotStore<S>,
        cursor_source: Box<dyn CursorSource>,
        renderer: Box<dyn MeshRenderer>,
        cancel: Box<dyn CancelSignal>,
    ) -> Self {
        let mut world = Self {
            mesh: LiveMesh::new(),
            config,
            resolver: CursorResolver::new(),
            session: EditingSession::new(),
            scheduler: Scheduler::new(),
            slots,
            cursor_source,
            renderer,
            cancel,
            transport: None,
            current_slot: 0,
            remove_mode: false,
            cursor_pos: None,
            persist_task: None,
            restore_task: None,
            events: Vec::new(),
        };
        world.load_slot(0);
        world
    }

    pub fn with_transport(mut self, transport: Box<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn mesh(&self) -> &LiveMesh {
        &self.mesh
    }

    pub fn selection(&self) -> &Selection {
        self.resolver.selection()
    }

    /// The in-progress gesture, for preview rendering
    pub fn pending(&self) -> Option<&PendingGesture> {
        self.session.pending()
    }

    pub fn remove_mode(&self) -> bool {
        self.remove_mode
    }

    pub fn take_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    /// Swap the world to another save slot. Any pending persist for the old
    /// slot is flushed first so its edits are not lost.
    pub fn load_slot(&mut self, slot: usize) {
        // A deferred restore targets the old slot's mesh; apply it now so it
        // can neither be lost nor fire into the newly loaded mesh
        if let Some(handle) = self.restore_task.take() {
            if let Some(WorldTask::Restore(snapshot)) = self.scheduler.take(handle) {
                restore_snapshot(&mut self.mesh, snapshot, &self.config);
            }
        }
        if let Some(handle) = self.persist_task.take() {
            self.scheduler.cancel(handle);
            self.persist_now();
        }
        // An in-flight gesture belongs to the old slot's mesh; restore its
        // snapshot there before swapping.
        if let Some(snapshot) = self.session.cancel() {
            restore_snapshot(&mut self.mesh, snapshot, &self.config);
            self.persist_now();
        }
        self.mesh = self.slots.load_slot(slot);
        self.current_slot = slot;
        self.refresh_view();
    }

    pub fn save_current(&mut self) -> Result<(), crate::storage::StorageError> {
        self.slots.save_slot(self.current_slot, &self.mesh)
    }

    /// Entering or leaving remove mode restarts the search so stale
    /// point/line highlights never survive the mode switch.
    pub fn set_remove_mode(&mut self, on: bool) {
        if self.remove_mode != on {
            self.remove_mode = on;
            self.resolver.reset(&self.mesh);
        }
    }

    /// Per-frame drive: dispatch due tasks, poll the cursor, advance the
    /// nearest-feature search.
    pub fn update(&mut self, dt: f32) {
        for task in self.scheduler.tick(dt) {
            match task {
                WorldTask::Persist => {
                    self.persist_task = None;
                    self.persist_now();
                }
                WorldTask::Restore(snapshot) => {
                    self.restore_task = None;
                    restore_snapshot(&mut self.mesh, snapshot, &self.config);
                    self.refresh_view();
                }
            }
        }

        let Some(pos) = self.cursor_source.world_position() else {
            self.cursor_pos = None;
            return;
        };
        self.cursor_pos = Some(pos);
        self.resolver.step(&self.mesh, pos, &self.config.cursor);
    }

    /// Pinch began. `color_index` is the palette slot new faces take.
    pub fn gesture_start(&mut self, color_index: u32) -> SessionOutcome {
        let Some(pos) = self.cursor_pos else {
            return SessionOutcome::Unchanged;
        };
        let remove_target = self.remove_target(pos);
        let selection = self.resolver.selection().clone();
        let outcome = self.session.gesture_start(
            &mut self.mesh,
            &selection,
            pos,
            self.remove_mode,
            remove_target,
            color_index,
        );
        self.apply_outcome(outcome.clone());
        outcome
    }

    /// Pinch is being held; call once per frame with the frame delta.
    pub fn gesture_hold(&mut self, dt: f32) -> SessionOutcome {
        let cancel = self.cancel.take_cancel();
        let Some(pos) = self.cursor_pos else {
            // The shake cancel is out-of-band; a tracking dropout must not
            // consume it and let the gesture commit later
            if cancel && self.session.pending().is_some() {
                let restore = self.session.cancel();
                let outcome = SessionOutcome::Cancelled { restore };
                self.apply_outcome(outcome.clone());
                return outcome;
            }
            return SessionOutcome::Unchanged;
        };
        let remove_target = self.remove_target(pos);
        let outcome =
            self.session
                .gesture_hold(&mut self.mesh, pos, remove_target, cancel, dt, &self.config);
        self.apply_outcome(outcome.clone());
        outcome
    }

    /// Pinch released.
    pub fn gesture_end(&mut self) -> SessionOutcome {
        let outcome = self.session.gesture_end(&mut self.mesh, &self.config);
        self.apply_outcome(outcome.clone());
        outcome
    }

    /// Remote peer committed triangles. Installed verbatim under the
    /// sender's faceIds; never re-broadcast.
    pub fn on_mesh_add_received(&mut self, encoded: &str) {
        let incoming = match decode(encoded, WireFormat::Connected) {
            Ok(incoming) => incoming,
            Err(e) => {
                warn!("dropping malformed remote add: {}", e);
                return;
            }
        };
        match self
            .mesh
            .add_geometry(incoming, &SnapPolicy::Disabled, &self.config.snap)
        {
            Ok(outcome) => {
                debug!("installed {} remote faces", outcome.installed.len());
                self.after_change();
            }
            Err(e) => warn!("dropping remote add with bad topology: {}", e),
        }
    }

    /// Remote peer removed faces by id. Ids not present locally are ignored.
    pub fn on_mesh_remove_received(&mut self, face_ids: &[FaceId]) {
        if self.mesh.remove_faces(face_ids) > 0 {
            self.after_change();
        }
    }

    fn remove_target(&self, pos: Vec3) -> Option<FaceId> {
        if self.remove_mode {
            closest_face(&self.mesh, pos, &self.config.cursor)
        } else {
            None
        }
    }

    fn apply_outcome(&mut self, outcome: SessionOutcome) {
        match outcome {
            SessionOutcome::Unchanged | SessionOutcome::Preview => {}
            // Detach-on-move changed the static mesh; the resolver's indices
            // point into the pre-detach topology and must be discarded along
            // with the stale render. The detachment itself is never persisted
            // or broadcast.
            SessionOutcome::Started => self.refresh_view(),
            SessionOutcome::Removed(id) => {
                self.after_change();
                self.broadcast_remove(&[id]);
            }
            SessionOutcome::MeshEmptied(id) => {
                self.after_change();
                self.broadcast_remove(&[id]);
                self.remove_mode = false;
                self.events.push(WorldEvent::AllFacesRemoved);
            }
            SessionOutcome::Committed(add) => {
                self.after_change();
                self.broadcast_add(&add.installed);
                // Faces the commit's cleanup deleted (degenerated or deduped
                // reinstalls) are still live on peers until told otherwise
                self.broadcast_remove(&add.dropped);
            }
            // Mesh is back to its pre-gesture state; nothing to persist
            SessionOutcome::RolledBack => self.refresh_view(),
            SessionOutcome::Cancelled { restore } => {
                if let Some(snapshot) = restore {
                    // One frame later so the release of the pinch cannot
                    // re-grab the restored point. Through the replace slot so
                    // two restores can never both be in flight.
                    self.scheduler.replace(
                        &mut self.restore_task,
                        1,
                        WorldTask::Restore(snapshot),
                    );
                }
                self.refresh_view();
            }
        }
    }

    /// Everything a committed structural change owes the outside world,
    /// minus the broadcast (receive paths skip that).
    fn after_change(&mut self) {
        self.refresh_view();
        self.scheduler.replace(
            &mut self.persist_task,
            self.config.persist_delay_frames,
            WorldTask::Persist,
        );
    }

    fn refresh_view(&mut self) {
        self.resolver.reset(&self.mesh);
        self.rebuild_renderer();
    }

    fn rebuild_renderer(&mut self) {
        self.renderer.rebuild(&RenderMesh::from_mesh(&self.mesh));
    }

    fn persist_now(&mut self) {
        if let Err(e) = self.save_current() {
            warn!("slot {} persist failed: {}", self.current_slot, e);
        }
    }

    fn broadcast_add(&mut self, installed: &[FaceId]) {
        if installed.is_empty() {
            return;
        }
        if let Some(transport) = &mut self.transport {
            transport.send_add(&encode_faces(&self.mesh, installed, WireFormat::Connected));
        }
    }

    fn broadcast_remove(&mut self, face_ids: &[FaceId]) {
        if face_ids.is_empty() {
            return;
        }
        if let Some(transport) = &mut self.transport {
            transport.send_remove(face_ids);
        }
    }
}
