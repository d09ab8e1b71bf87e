//! Math utilities and types
//!
//! Thin aliases over `nalgebra` plus the conversions needed to pack matrices
//! and vectors into uniform/instance records.

pub use nalgebra::{Matrix4, Point3, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// RGBA colour with components in the 0.0-1.0 range
pub type Colour = [f32; 4];

/// Opaque white, the neutral tint
pub const WHITE: Colour = [1.0, 1.0, 1.0, 1.0];

/// Opaque black
pub const BLACK: Colour = [0.0, 0.0, 0.0, 1.0];

/// Column-major array layout expected by shader-visible buffers
pub fn mat4_to_array(matrix: &Mat4) -> [[f32; 4]; 4] {
    (*matrix).into()
}

/// Transform a point in the XY plane (z = 0) by a model matrix
pub fn transform_xy(model: &Mat4, x: f32, y: f32) -> [f32; 3] {
    let p = model.transform_point(&Point3::new(x, y, 0.0));
    [p.x, p.y, p.z]
}

/// Multiply two colours component-wise
pub fn modulate(a: Colour, b: Colour) -> Colour {
    [a[0] * b[0], a[1] * b[1], a[2] * b[2], a[3] * b[3]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mat4_to_array_is_column_major() {
        let m = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0));
        let a = mat4_to_array(&m);
        assert_eq!(a[3], [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(a[0], [1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_transform_xy_applies_translation_and_scale() {
        let m = Mat4::new_translation(&Vec3::new(10.0, 0.0, 0.5))
            * Mat4::new_nonuniform_scaling(&Vec3::new(2.0, 3.0, 1.0));
        let p = transform_xy(&m, 1.0, 1.0);
        assert_relative_eq!(p[0], 12.0);
        assert_relative_eq!(p[1], 3.0);
        assert_relative_eq!(p[2], 0.5);
    }

    #[test]
    fn test_modulate() {
        assert_eq!(modulate(WHITE, [0.5, 0.25, 1.0, 0.5]), [0.5, 0.25, 1.0, 0.5]);
    }
}
