//! Kiln engine crate.
//!
//! GPU-resident resources and draw activation for the kiln 2D engine:
//! reference-counted texture loading, shader activation chains and the
//! drawables that tie a transform, a color and a shader into one draw call.

pub mod device;
pub mod logging;
pub mod coords;
pub mod camera;
pub mod resources;
pub mod shaders;
pub mod renderables;
