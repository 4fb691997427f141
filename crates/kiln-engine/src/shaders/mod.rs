//! Shader programs and their activation chains.
//!
//! A [`Shader`] is a compiled program plus the device calls that prepare it
//! for a draw. The textured shader extends the flat color one; neither binds
//! textures, which stays with the texture manager.

mod library;
mod shader;

pub use library::{ShaderLibrary, QUAD_POSITIONS, QUAD_TEX_COORDS};
pub use shader::{
    ActivationStep, Shader, ShaderError, UniformSource, CAMERA_UNIFORM, COLOR_UNIFORM,
    MODEL_UNIFORM, POSITION_ATTRIB, SAMPLER_UNIFORM, TEX_COORD_ATTRIB,
};
