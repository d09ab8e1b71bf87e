//! Immutable vertex/index data shared by mesh components

use bytemuck::{Pod, Zeroable};

/// Vertex layout of 3D geometry
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex3D {
    /// Object-space position
    pub position: [f32; 3],
    /// Object-space normal
    pub normal: [f32; 3],
    /// Texture coordinates
    pub uv: [f32; 2],
}

impl Vertex3D {
    /// Create a vertex
    pub const fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self { position, normal, uv }
    }
}

/// Vertex and index range owned by the resource layer.
///
/// Renderers and mesh components only hold a
/// [`GeometryHandle`](super::GeometryHandle) to it; the data is never
/// modified after registration.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    vertices: Vec<Vertex3D>,
    indices: Vec<u32>,
}

impl Geometry {
    /// Create geometry from vertices and triangle-list indices
    pub fn new(vertices: Vec<Vertex3D>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Vertex data
    pub fn vertices(&self) -> &[Vertex3D] {
        &self.vertices
    }

    /// Index data
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// A unit quad in the XZ plane facing +Y, used for water surfaces and floors
    pub fn plane(half_extent: f32) -> Self {
        let h = half_extent;
        let up = [0.0, 1.0, 0.0];
        Self::new(
            vec![
                Vertex3D::new([-h, 0.0, -h], up, [0.0, 0.0]),
                Vertex3D::new([h, 0.0, -h], up, [1.0, 0.0]),
                Vertex3D::new([h, 0.0, h], up, [1.0, 1.0]),
                Vertex3D::new([-h, 0.0, h], up, [0.0, 1.0]),
            ],
            vec![0, 2, 1, 0, 3, 2],
        )
    }

    /// A quad covering normalized device coordinates, for full-screen passes
    pub fn fullscreen_quad() -> Self {
        let n = [0.0, 0.0, 1.0];
        Self::new(
            vec![
                Vertex3D::new([-1.0, -1.0, 0.0], n, [0.0, 0.0]),
                Vertex3D::new([1.0, -1.0, 0.0], n, [1.0, 0.0]),
                Vertex3D::new([1.0, 1.0, 0.0], n, [1.0, 1.0]),
                Vertex3D::new([-1.0, 1.0, 0.0], n, [0.0, 1.0]),
            ],
            vec![0, 1, 2, 0, 2, 3],
        )
    }

    /// An axis-aligned cube with per-face normals
    pub fn cube(half_extent: f32) -> Self {
        let h = half_extent;
        // (normal, tangent u, tangent v)
        let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ];
        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        let corners = [
            (-1.0, -1.0, [0.0, 1.0]),
            (1.0, -1.0, [1.0, 1.0]),
            (1.0, 1.0, [1.0, 0.0]),
            (-1.0, 1.0, [0.0, 0.0]),
        ];
        for (n, u, v) in faces {
            let base = vertices.len() as u32;
            for (su, sv, uv) in corners {
                let position = [
                    (n[0] + u[0] * su + v[0] * sv) * h,
                    (n[1] + u[1] * su + v[1] * sv) * h,
                    (n[2] + u[2] * su + v[2] * sv) * h,
                ];
                vertices.push(Vertex3D::new(position, n, uv));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        Self::new(vertices, indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_counts() {
        let cube = Geometry::cube(0.5);
        assert_eq!(cube.vertices().len(), 24);
        assert_eq!(cube.indices().len(), 36);
        assert!(cube.indices().iter().all(|i| (*i as usize) < cube.vertices().len()));
    }

    #[test]
    fn test_plane_is_flat() {
        let plane = Geometry::plane(10.0);
        assert!(plane.vertices().iter().all(|v| v.position[1] == 0.0));
        assert_eq!(plane.indices().len(), 6);
    }
}
