//! Editor configuration
//!
//! Every tunable threshold in one serde struct, loadable from RON so tuning
//! passes don't need a rebuild. All fields have defaults; a partial config
//! file only overrides what it names.

use crate::cursor::CursorConfig;
use crate::snap::SnapConfig;
use serde::{Deserialize, Serialize};

/// Top-level tuning for the editing core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorConfig {
    #[serde(default)]
    pub snap: SnapConfig,
    #[serde(default)]
    pub cursor: CursorConfig,
    /// Pinches shorter than this are treated as accidental taps and rolled back
    #[serde(default = "default_min_gesture_secs")]
    pub min_gesture_secs: f32,
    /// Frames a commit waits before writing its save slot, so a burst of
    /// edits collapses into one write
    #[serde(default = "default_persist_delay_frames")]
    pub persist_delay_frames: u64,
}

fn default_min_gesture_secs() -> f32 {
    0.25
}
fn default_persist_delay_frames() -> u64 {
    1
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            snap: SnapConfig::default(),
            cursor: CursorConfig::default(),
            min_gesture_secs: default_min_gesture_secs(),
            persist_delay_frames: default_persist_delay_frames(),
        }
    }
}

impl EditorConfig {
    /// Parse a config from RON text
    pub fn from_ron(text: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(text)
    }
}
