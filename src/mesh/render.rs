//! Flat buffers handed to the renderer collaborator
//!
//! The renderer is a black box: after every committed structural change it
//! receives per-face-vertex positions plus an index buffer and rebuilds its
//! drawable mesh. The engine never reads anything back.

use super::model::LiveMesh;
use crate::geometry::Vec3;

/// One renderable corner of a face
#[derive(Debug, Clone, Copy)]
pub struct RenderVertex {
    pub position: Vec3,
    /// Frozen creation-time position, for effects keyed on original placement
    pub shader_position: Vec3,
    pub color_index: u32,
}

/// Everything the renderer needs to rebuild its drawable mesh
#[derive(Debug, Clone, Default)]
pub struct RenderMesh {
    /// Three entries per face, in ascending-faceId order
    pub vertices: Vec<RenderVertex>,
    pub indices: Vec<u32>,
}

impl RenderMesh {
    /// Flatten a live mesh into per-face-vertex buffers. Corners are not
    /// shared between faces so per-face color stays per-face.
    pub fn from_mesh(mesh: &LiveMesh) -> Self {
        let mut vertices = Vec::with_capacity(mesh.faces.len() * 3);
        let mut indices = Vec::with_capacity(mesh.faces.len() * 3);
        for face in mesh.faces.values() {
            for &v in &face.vertices {
                let loc = &mesh.locations[v];
                indices.push(vertices.len() as u32);
                vertices.push(RenderVertex {
                    position: loc.position,
                    shader_position: loc.shader_position,
                    color_index: face.color_index,
                });
            }
        }
        Self { vertices, indices }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::tests::mesh_from_triangles;

    #[test]
    fn test_render_mesh_shape() {
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
        let render = RenderMesh::from_mesh(&mesh);
        assert_eq!(render.vertices.len(), 6);
        assert_eq!(render.indices.len(), 6);
        assert_eq!(render.indices[5], 5);
    }

    #[test]
    fn test_empty_mesh_renders_empty() {
        let render = RenderMesh::from_mesh(&LiveMesh::default());
        assert!(render.vertices.is_empty());
        assert!(render.indices.is_empty());
    }
}
