use std::rc::Rc;

use crate::camera::Camera;
use crate::coords::{ColorRgba, Transform};
use crate::device::{Device, Topology};
use crate::shaders::{Shader, ShaderLibrary};

/// Quad drawn with one shader, placed by a [`Transform`].
pub struct Renderable {
    transform: Transform,
    color: ColorRgba,
    shader: Rc<Shader>,
    device: Rc<dyn Device>,
}

impl Renderable {
    /// White unit quad at the origin using the flat color shader.
    pub fn new(library: &ShaderLibrary) -> Self {
        Self {
            transform: Transform::new(),
            color: ColorRgba::white(),
            shader: Rc::clone(library.flat_color()),
            device: Rc::clone(library.device()),
        }
    }

    /// Activates the shader for this object and draws the quad as a triangle strip.
    pub fn draw(&self, camera: &Camera) {
        self.shader.activate(
            self.color,
            &self.transform.trs_matrix(),
            &camera.camera_matrix(),
        );
        self.device.draw_arrays(Topology::TriangleStrip, 0, 4);
    }

    pub fn set_color(&mut self, color: ColorRgba) {
        self.color = color;
    }

    pub fn color(&self) -> ColorRgba {
        self.color
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn transform_mut(&mut self) -> &mut Transform {
        &mut self.transform
    }

    pub fn shader(&self) -> &Rc<Shader> {
        &self.shader
    }

    pub(crate) fn set_shader(&mut self, shader: Rc<Shader>) {
        self.shader = shader;
    }
}
