//! Geometry and color types shared by shaders and drawables.
//!
//! World space is y-up with arbitrary units; the camera maps it to clip
//! space. Render matrices are column-major `glam::Mat4`.

mod color;
mod transform;

pub use color::ColorRgba;
pub use transform::Transform;
