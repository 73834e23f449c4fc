//! Compact string codec for persistence, QR export, and replication
//!
//! The format is two space-joined number lists separated by one literal
//! double space: every location's rounded `x y z` in array order, then every
//! face's `v1 v2 v3 color` (plus a trailing faceId in the connected form) in
//! ascending-faceId order. No field names, no type tags: the QR channel pays
//! per character.
//!
//! Decoding is total-or-nothing. Any structural defect (wrong group count,
//! non-numeric token, short trailing run, out-of-range vertex index) is a
//! corruption signal and yields an error, never a partial mesh.

use crate::mesh::{FaceId, IncomingFace, IncomingGeometry, IncomingLocation, LiveMesh};
use crate::geometry::Vec3;
use log::warn;
use std::fmt;

/// Wire form selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// Save slots and QR export: faces are `v1 v2 v3 color`
    Plain,
    /// Multiplayer: faces carry a 5th field, the faceId, so peers can
    /// address the same logical face
    Connected,
}

impl WireFormat {
    fn face_run(self) -> usize {
        match self {
            WireFormat::Plain => 4,
            WireFormat::Connected => 5,
        }
    }
}

/// Why a string failed to decode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Splitting on the double-space separator gave this many groups, not 2
    WrongGroupCount(usize),
    /// A token failed to parse as a number
    BadToken(String),
    /// Location group length is not a multiple of 3
    TruncatedLocations(usize),
    /// Face group length is not a multiple of the per-face run
    TruncatedFaces(usize),
    /// A face references a location index past the decoded location list
    VertexOutOfRange { index: usize, len: usize },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::WrongGroupCount(n) => {
                write!(f, "expected 2 space-separated groups, found {}", n)
            }
            DecodeError::BadToken(token) => write!(f, "non-numeric token {:?}", token),
            DecodeError::TruncatedLocations(n) => {
                write!(f, "location group has {} tokens (not a multiple of 3)", n)
            }
            DecodeError::TruncatedFaces(n) => {
                write!(f, "face group has {} tokens (short trailing face)", n)
            }
            DecodeError::VertexOutOfRange { index, len } => {
                write!(f, "face references location {} of {}", index, len)
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Encode a whole mesh
pub fn encode(mesh: &LiveMesh, format: WireFormat) -> String {
    let ids: Vec<FaceId> = mesh.face_ids();
    encode_faces(mesh, &ids, format)
}

/// Encode a subset of faces (a committed gesture, for broadcast). Locations
/// are renumbered to the subset's used set; the full-mesh `encode` is the
/// same call over every face.
pub fn encode_faces(mesh: &LiveMesh, face_ids: &[FaceId], format: WireFormat) -> String {
    // Local index space over the used locations, in first-use order
    let mut local_of = vec![usize::MAX; mesh.locations.len()];
    let mut used = Vec::new();
    let mut faces = Vec::new();
    for id in face_ids {
        let Some(face) = mesh.faces.get(id) else {
            continue;
        };
        let mut local = [0usize; 3];
        for (slot, &v) in local.iter_mut().zip(&face.vertices) {
            if local_of[v] == usize::MAX {
                local_of[v] = used.len();
                used.push(v);
            }
            *slot = local_of[v];
        }
        faces.push((*id, local, face.color_index));
    }

    let location_part = used
        .iter()
        .map(|&v| {
            let p = mesh.locations[v].position;
            format!(
                "{} {} {}",
                p.x.round() as i64,
                p.y.round() as i64,
                p.z.round() as i64
            )
        })
        .collect::<Vec<_>>()
        .join(" ");

    let face_part = faces
        .iter()
        .map(|(id, local, color)| match format {
            WireFormat::Plain => {
                format!("{} {} {} {}", local[0], local[1], local[2], color)
            }
            WireFormat::Connected => {
                format!("{} {} {} {} {}", local[0], local[1], local[2], color, id.0)
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    format!("{}  {}", location_part, face_part)
}

/// Decode a string into incoming geometry.
///
/// Location ids are never transmitted; the receiving side mints fresh ones
/// when the geometry lands in a mesh. Plain-form faces mint fresh faceIds
/// too; connected-form faces carry the sender's faceId as authoritative.
pub fn decode(encoded: &str, format: WireFormat) -> Result<IncomingGeometry, DecodeError> {
    let groups: Vec<&str> = encoded.split("  ").collect();
    if groups.len() != 2 {
        warn!(
            "rejecting encoded mesh with {} groups (want 2)",
            groups.len()
        );
        return Err(DecodeError::WrongGroupCount(groups.len()));
    }

    let location_tokens = tokens(groups[0])?;
    if location_tokens.len() % 3 != 0 {
        return Err(DecodeError::TruncatedLocations(location_tokens.len()));
    }
    let mut locations = Vec::with_capacity(location_tokens.len() / 3);
    for run in location_tokens.chunks(3) {
        let x = parse_f32(run[0])?;
        let y = parse_f32(run[1])?;
        let z = parse_f32(run[2])?;
        locations.push(IncomingLocation {
            position: Vec3::new(x, y, z).round(),
            id: None,
        });
    }

    let face_tokens = tokens(groups[1])?;
    let run_len = format.face_run();
    if face_tokens.len() % run_len != 0 {
        return Err(DecodeError::TruncatedFaces(face_tokens.len()));
    }
    let mut faces = Vec::with_capacity(face_tokens.len() / run_len);
    for run in face_tokens.chunks(run_len) {
        let mut vertices = [0usize; 3];
        for (slot, token) in vertices.iter_mut().zip(run) {
            let v = parse_u64(token)? as usize;
            if v >= locations.len() {
                return Err(DecodeError::VertexOutOfRange {
                    index: v,
                    len: locations.len(),
                });
            }
            *slot = v;
        }
        let color_index = parse_u64(run[3])? as u32;
        let id = match format {
            WireFormat::Plain => None,
            WireFormat::Connected => Some(FaceId(parse_u64(run[4])?)),
        };
        faces.push(IncomingFace {
            vertices,
            color_index,
            id,
        });
    }

    Ok(IncomingGeometry { locations, faces })
}

fn tokens(group: &str) -> Result<Vec<&str>, DecodeError> {
    if group.is_empty() {
        return Ok(Vec::new());
    }
    let parts: Vec<&str> = group.split(' ').collect();
    if let Some(empty) = parts.iter().find(|t| t.is_empty()) {
        return Err(DecodeError::BadToken(empty.to_string()));
    }
    Ok(parts)
}

fn parse_f32(token: &str) -> Result<f32, DecodeError> {
    token
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| DecodeError::BadToken(token.to_string()))
}

fn parse_u64(token: &str) -> Result<u64, DecodeError> {
    token
        .parse::<u64>()
        .map_err(|_| DecodeError::BadToken(token.to_string()))
}
