use glam::{Mat4, Quat, Vec2, Vec3};

/// Position / rotation / scale of a drawable in world space.
///
/// The composed render matrix is `T * R * S`, so a unit quad is first scaled
/// to `size`, then rotated about its center, then moved to `position`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    position: Vec2,
    size: Vec2,
    rotation: f32, // radians, counter-clockwise
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            size: Vec2::ONE,
            rotation: 0.0,
        }
    }
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn set_position(&mut self, x: f32, y: f32) {
        self.position = Vec2::new(x, y);
    }

    pub fn size(&self) -> Vec2 {
        self.size
    }

    pub fn set_size(&mut self, width: f32, height: f32) {
        self.size = Vec2::new(width, height);
    }

    /// Grows (or shrinks, for negative `delta`) both axes by the same amount.
    pub fn inc_size_by(&mut self, delta: f32) {
        self.size += Vec2::splat(delta);
    }

    pub fn rotation_rad(&self) -> f32 {
        self.rotation
    }

    /// Sets the rotation, wrapped into `[0, 2π)`.
    pub fn set_rotation_rad(&mut self, radians: f32) {
        self.rotation = radians.rem_euclid(std::f32::consts::TAU);
    }

    pub fn set_rotation_deg(&mut self, degrees: f32) {
        self.set_rotation_rad(degrees.to_radians());
    }

    /// Combined translate/rotate/scale matrix.
    pub fn trs_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::new(self.size.x, self.size.y, 1.0),
            Quat::from_rotation_z(self.rotation),
            self.position.extend(0.0),
        )
    }
}
