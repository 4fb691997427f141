//! Orthographic 2D camera.

use glam::{Mat4, Vec2};

/// Looks at `center`, showing `width` world units across the viewport.
///
/// The visible height follows the viewport aspect ratio.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Camera {
    center: Vec2,
    width: f32,
    viewport: [u32; 2],
}

impl Camera {
    pub fn new(center: Vec2, width: f32, viewport_width: u32, viewport_height: u32) -> Self {
        Self {
            center,
            width,
            viewport: [viewport_width.max(1), viewport_height.max(1)],
        }
    }

    pub fn center(&self) -> Vec2 {
        self.center
    }

    pub fn set_center(&mut self, x: f32, y: f32) {
        self.center = Vec2::new(x, y);
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn set_width(&mut self, width: f32) {
        self.width = width;
    }

    /// World-space height implied by the width and the viewport aspect ratio.
    pub fn height(&self) -> f32 {
        self.width * self.viewport[1] as f32 / self.viewport[0] as f32
    }

    pub fn viewport(&self) -> [u32; 2] {
        self.viewport
    }

    /// View-projection matrix mapping world space to clip space.
    pub fn camera_matrix(&self) -> Mat4 {
        let half = Vec2::new(self.width, self.height()) * 0.5;
        let projection = Mat4::orthographic_rh(-half.x, half.x, -half.y, half.y, 0.0, 1.0);
        let view = Mat4::from_translation(-self.center.extend(0.0));
        projection * view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn height_follows_aspect() {
        let cam = Camera::new(Vec2::ZERO, 20.0, 640, 480);
        assert_eq!(cam.height(), 15.0);
    }

    #[test]
    fn center_maps_to_origin_and_edges_to_ndc_bounds() {
        let cam = Camera::new(Vec2::new(10.0, 5.0), 20.0, 200, 100);
        let m = cam.camera_matrix();

        let c = m * Vec4::new(10.0, 5.0, 0.0, 1.0);
        assert!(c.x.abs() < 1e-6 && c.y.abs() < 1e-6);

        let tr = m * Vec4::new(20.0, 10.0, 0.0, 1.0);
        assert!((tr.x - 1.0).abs() < 1e-6);
        assert!((tr.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_viewport_is_clamped() {
        let cam = Camera::new(Vec2::ZERO, 10.0, 0, 0);
        assert_eq!(cam.viewport(), [1, 1]);
        assert!(cam.height().is_finite());
    }
}
