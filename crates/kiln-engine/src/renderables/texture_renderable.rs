use std::rc::Rc;

use crate::camera::Camera;
use crate::coords::{ColorRgba, Transform};
use crate::resources::{TextureError, TextureManager};
use crate::shaders::ShaderLibrary;

use super::Renderable;

/// Quad showing a named texture, optionally tinted by its color.
///
/// The texture must have finished loading before the first `draw`.
pub struct TextureRenderable {
    renderable: Renderable,
    textures: TextureManager,
    texture: String,
}

impl TextureRenderable {
    /// Uses the textured shader; the color starts transparent so the texture shows untinted.
    pub fn new(library: &ShaderLibrary, textures: TextureManager, texture: impl Into<String>) -> Self {
        let mut renderable = Renderable::new(library);
        renderable.set_shader(Rc::clone(library.textured()));
        renderable.set_color(ColorRgba::transparent());
        Self {
            renderable,
            textures,
            texture: texture.into(),
        }
    }

    /// Binds the texture, draws, then leaves the texture unit empty again.
    ///
    /// Fails without drawing if the texture is not loaded.
    pub fn draw(&self, camera: &Camera) -> Result<(), TextureError> {
        self.textures.activate(&self.texture)?;
        self.renderable.draw(camera);
        self.textures.deactivate();
        Ok(())
    }

    pub fn texture(&self) -> &str {
        &self.texture
    }

    /// Points at another texture. Loading it stays with the caller.
    pub fn set_texture(&mut self, texture: impl Into<String>) {
        self.texture = texture.into();
    }

    pub fn set_color(&mut self, color: ColorRgba) {
        self.renderable.set_color(color);
    }

    pub fn color(&self) -> ColorRgba {
        self.renderable.color()
    }

    pub fn transform(&self) -> &Transform {
        self.renderable.transform()
    }

    pub fn transform_mut(&mut self) -> &mut Transform {
        self.renderable.transform_mut()
    }

    pub fn renderable(&self) -> &Renderable {
        &self.renderable
    }
}
