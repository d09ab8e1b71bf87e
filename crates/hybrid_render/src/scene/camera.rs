//! Perspective camera

use crate::foundation::math::{Mat4, Point3, Vec3};
use crate::render::CameraUniform;

/// Right-handed perspective camera looking at a target point
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Eye position
    pub position: Vec3,
    /// Point looked at
    pub target: Vec3,
    /// Up direction
    pub up: Vec3,
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Width over height
    pub aspect: f32,
    /// Near clip distance
    pub near: f32,
    /// Far clip distance
    pub far: f32,
}

impl Camera {
    /// Camera at `position` looking at `target` with a 60 degree field of view
    pub fn new(position: Vec3, target: Vec3, aspect: f32) -> Self {
        Self {
            position,
            target,
            up: Vec3::y(),
            fov_y: std::f32::consts::FRAC_PI_3,
            aspect,
            near: 0.1,
            far: 1000.0,
        }
    }

    /// World to view
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(
            &Point3::from(self.position),
            &Point3::from(self.target),
            &self.up,
        )
    }

    /// View to clip
    pub fn projection(&self) -> Mat4 {
        Mat4::new_perspective(self.aspect, self.fov_y, self.near, self.far)
    }

    /// Mirror of this camera below a horizontal plane at `height`, used to
    /// render planar water reflections
    pub fn reflected(&self, height: f32) -> Self {
        let mut mirrored = self.clone();
        mirrored.position.y = 2.0 * height - self.position.y;
        mirrored.target.y = 2.0 * height - self.target.y;
        mirrored
    }

    /// Packed uniform record
    pub fn uniform(&self) -> CameraUniform {
        CameraUniform::new(&self.view(), &self.projection(), &self.position)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 2.0, 8.0), Vec3::zeros(), 16.0 / 9.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_reflection_mirrors_height() {
        let camera = Camera::new(Vec3::new(1.0, 5.0, 2.0), Vec3::new(0.0, 1.0, 0.0), 1.0);
        let reflected = camera.reflected(2.0);
        assert_relative_eq!(reflected.position.y, -1.0);
        assert_relative_eq!(reflected.target.y, 3.0);
        assert_relative_eq!(reflected.position.x, 1.0);
        // Reflecting twice is the identity
        assert_relative_eq!(reflected.reflected(2.0).position, camera.position);
    }

    #[test]
    fn test_view_moves_eye_to_origin() {
        let camera = Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::zeros(), 1.0);
        let eye = camera.view().transform_point(&Point3::new(0.0, 0.0, 5.0));
        assert_relative_eq!(eye.coords, Vec3::zeros(), epsilon = 1e-5);
    }
}
