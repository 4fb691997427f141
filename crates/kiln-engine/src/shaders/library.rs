use std::borrow::Cow;
use std::rc::Rc;

use crate::device::{AttribDesc, BufferId, Device, ProgramDesc, UniformDesc, UniformKind};

use super::shader::{
    Shader, ShaderError, CAMERA_UNIFORM, COLOR_UNIFORM, MODEL_UNIFORM, POSITION_ATTRIB,
    SAMPLER_UNIFORM, TEX_COORD_ATTRIB,
};

/// Unit square centred on the origin, as a 4-vertex triangle strip of `xyz`.
pub const QUAD_POSITIONS: [f32; 12] = [
    0.5, 0.5, 0.0, //
    -0.5, 0.5, 0.0, //
    0.5, -0.5, 0.0, //
    -0.5, -0.5, 0.0,
];

/// Texture coordinates matching [`QUAD_POSITIONS`]; `(0, 0)` is the bottom-left corner.
pub const QUAD_TEX_COORDS: [f32; 8] = [
    1.0, 1.0, //
    0.0, 1.0, //
    1.0, 0.0, //
    0.0, 0.0,
];

/// The engine's built-in shaders and the quad buffers they read.
///
/// Built once per device; drawables hold `Rc` clones of the shaders.
pub struct ShaderLibrary {
    device: Rc<dyn Device>,
    flat_color: Rc<Shader>,
    textured: Rc<Shader>,
    quad_positions: BufferId,
    quad_tex_coords: BufferId,
}

impl ShaderLibrary {
    pub fn new(device: Rc<dyn Device>) -> Result<Self, ShaderError> {
        let quad_positions = device.create_vertex_buffer(&QUAD_POSITIONS)?;
        let quad_tex_coords = device.create_vertex_buffer(&QUAD_TEX_COORDS)?;

        let flat_program = device.create_program(&flat_color_program())?;
        let texture_program = device.create_program(&texture_program())?;

        let flat_color = Shader::flat_color(device.clone(), flat_program, quad_positions)?;
        let textured =
            Shader::textured(device.clone(), texture_program, quad_positions, quad_tex_coords)?;

        log::debug!("shader library ready");
        Ok(Self {
            device,
            flat_color: Rc::new(flat_color),
            textured: Rc::new(textured),
            quad_positions,
            quad_tex_coords,
        })
    }

    pub fn device(&self) -> &Rc<dyn Device> {
        &self.device
    }

    pub fn flat_color(&self) -> &Rc<Shader> {
        &self.flat_color
    }

    pub fn textured(&self) -> &Rc<Shader> {
        &self.textured
    }

    pub fn quad_positions(&self) -> BufferId {
        self.quad_positions
    }

    pub fn quad_tex_coords(&self) -> BufferId {
        self.quad_tex_coords
    }
}

fn base_uniforms() -> Vec<UniformDesc> {
    vec![
        UniformDesc { name: COLOR_UNIFORM, kind: UniformKind::Vec4 },
        UniformDesc { name: MODEL_UNIFORM, kind: UniformKind::Mat4 },
        UniformDesc { name: CAMERA_UNIFORM, kind: UniformKind::Mat4 },
    ]
}

fn flat_color_program() -> ProgramDesc {
    ProgramDesc {
        label: "kiln flat color",
        source: Cow::Borrowed(include_str!("wgsl/flat_color.wgsl")),
        attributes: vec![AttribDesc { name: POSITION_ATTRIB, components: 3 }],
        uniforms: base_uniforms(),
    }
}

fn texture_program() -> ProgramDesc {
    let mut uniforms = base_uniforms();
    uniforms.push(UniformDesc { name: SAMPLER_UNIFORM, kind: UniformKind::Sampler });

    ProgramDesc {
        label: "kiln texture",
        source: Cow::Borrowed(include_str!("wgsl/texture.wgsl")),
        attributes: vec![
            AttribDesc { name: POSITION_ATTRIB, components: 3 },
            AttribDesc { name: TEX_COORD_ATTRIB, components: 2 },
        ],
        uniforms,
    }
}
