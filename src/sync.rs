//! Multiplayer replication hooks
//!
//! The engine stays transport-agnostic: committed edits go out through a
//! [`Transport`] as already-encoded strings and faceId lists, and remote
//! edits come back in through the world's receive entry points. FaceIds
//! are globally unique (wall-clock seeded), so peers install each other's
//! faces under their original ids and later removals address the same
//! face everywhere.

use crate::mesh::FaceId;

/// Outbound channel to the other participants in a shared world.
///
/// Implementations are fire-and-forget; delivery and ordering are the
/// transport's problem.
pub trait Transport {
    /// Broadcast newly committed triangles, Connected-encoded so receivers
    /// install them under the sender's faceIds.
    fn send_add(&mut self, encoded: &str);

    /// Broadcast face deletions by id.
    fn send_remove(&mut self, face_ids: &[FaceId]);
}

/// Transport that records every broadcast, for tests.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    pub sent_adds: Vec<String>,
    pub sent_removes: Vec<Vec<FaceId>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for RecordingTransport {
    fn send_add(&mut self, encoded: &str) {
        self.sent_adds.push(encoded.to_string());
    }

    fn send_remove(&mut self, face_ids: &[FaceId]) {
        self.sent_removes.push(face_ids.to_vec());
    }
}
