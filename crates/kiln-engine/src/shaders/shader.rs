use std::rc::Rc;

use glam::Mat4;
use thiserror::Error;

use crate::coords::ColorRgba;
use crate::device::{
    AttribLocation, BufferId, Device, DeviceError, ProgramId, UniformLocation, UniformValue,
};
use crate::resources::TEXTURE_UNIT;

pub const POSITION_ATTRIB: &str = "a_position";
pub const TEX_COORD_ATTRIB: &str = "a_tex_coord";
pub const COLOR_UNIFORM: &str = "u_color";
pub const MODEL_UNIFORM: &str = "u_model";
pub const CAMERA_UNIFORM: &str = "u_camera";
pub const SAMPLER_UNIFORM: &str = "u_sampler";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShaderError {
    #[error("program {program:?} has no `{name}`")]
    MissingLocation { program: ProgramId, name: &'static str },

    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Per-draw value a uniform step uploads.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UniformSource {
    Color,
    Model,
    Camera,
}

/// One device call of a shader activation, with its location already resolved.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ActivationStep {
    UseProgram,
    BindAttribute {
        location: AttribLocation,
        buffer: BufferId,
        components: u32,
    },
    Uniform {
        location: UniformLocation,
        source: UniformSource,
    },
    Sampler {
        location: UniformLocation,
        unit: u32,
    },
}

/// Compiled program plus the ordered steps that prepare it for a draw.
///
/// Variants are built by composition: a textured shader is the flat color
/// steps followed by its own. Locations are looked up once, here; `activate`
/// only replays the steps.
pub struct Shader {
    device: Rc<dyn Device>,
    program: ProgramId,
    steps: Vec<ActivationStep>,
}

impl Shader {
    /// Flat color activation: program, quad positions, color, model and camera.
    pub fn flat_color(
        device: Rc<dyn Device>,
        program: ProgramId,
        positions: BufferId,
    ) -> Result<Self, ShaderError> {
        let mut shader = Self {
            device,
            program,
            steps: vec![ActivationStep::UseProgram],
        };

        let position = shader.attrib(POSITION_ATTRIB)?;
        let color = shader.uniform(COLOR_UNIFORM)?;
        let model = shader.uniform(MODEL_UNIFORM)?;
        let camera = shader.uniform(CAMERA_UNIFORM)?;

        shader.steps.extend([
            ActivationStep::BindAttribute {
                location: position,
                buffer: positions,
                components: 3,
            },
            ActivationStep::Uniform {
                location: color,
                source: UniformSource::Color,
            },
            ActivationStep::Uniform {
                location: model,
                source: UniformSource::Model,
            },
            ActivationStep::Uniform {
                location: camera,
                source: UniformSource::Camera,
            },
        ]);
        Ok(shader)
    }

    /// Flat color activation extended with texture coordinates and a sampler on [`TEXTURE_UNIT`].
    ///
    /// Binding the texture itself is the caller's job (`TextureManager::activate`).
    pub fn textured(
        device: Rc<dyn Device>,
        program: ProgramId,
        positions: BufferId,
        tex_coords: BufferId,
    ) -> Result<Self, ShaderError> {
        let base = Self::flat_color(device, program, positions)?;
        let tex_coord = base.attrib(TEX_COORD_ATTRIB)?;
        let sampler = base.uniform(SAMPLER_UNIFORM)?;

        Ok(base.extend([
            ActivationStep::BindAttribute {
                location: tex_coord,
                buffer: tex_coords,
                components: 2,
            },
            ActivationStep::Sampler {
                location: sampler,
                unit: TEXTURE_UNIT,
            },
        ]))
    }

    /// Appends steps after everything this shader already does.
    pub fn extend(mut self, steps: impl IntoIterator<Item = ActivationStep>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Replays the activation steps. Safe to call every frame.
    pub fn activate(&self, color: ColorRgba, model: &Mat4, camera: &Mat4) {
        let device = &self.device;
        for step in &self.steps {
            match *step {
                ActivationStep::UseProgram => device.use_program(self.program),
                ActivationStep::BindAttribute {
                    location,
                    buffer,
                    components,
                } => device.bind_vertex_attrib(location, buffer, components),
                ActivationStep::Uniform { location, source } => {
                    let value = match source {
                        UniformSource::Color => UniformValue::Vec4(color.to_array()),
                        UniformSource::Model => UniformValue::Mat4(*model),
                        UniformSource::Camera => UniformValue::Mat4(*camera),
                    };
                    device.set_uniform(location, value);
                }
                ActivationStep::Sampler { location, unit } => {
                    device.set_uniform(location, UniformValue::Sampler(unit))
                }
            }
        }
    }

    pub fn program(&self) -> ProgramId {
        self.program
    }

    pub fn steps(&self) -> &[ActivationStep] {
        &self.steps
    }

    pub fn device(&self) -> &Rc<dyn Device> {
        &self.device
    }

    /// True if activation sets a sampler, i.e. a texture must be bound before drawing.
    pub fn is_texture_capable(&self) -> bool {
        self.steps
            .iter()
            .any(|step| matches!(step, ActivationStep::Sampler { .. }))
    }

    fn attrib(&self, name: &'static str) -> Result<AttribLocation, ShaderError> {
        self.device
            .attrib_location(self.program, name)
            .ok_or(ShaderError::MissingLocation {
                program: self.program,
                name,
            })
    }

    fn uniform(&self, name: &'static str) -> Result<UniformLocation, ShaderError> {
        self.device
            .uniform_location(self.program, name)
            .ok_or(ShaderError::MissingLocation {
                program: self.program,
                name,
            })
    }
}

impl std::fmt::Debug for Shader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shader")
            .field("program", &self.program)
            .field("steps", &self.steps)
            .finish()
    }
}
