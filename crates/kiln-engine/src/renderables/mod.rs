//! Drawable objects.

mod renderable;
mod texture_renderable;

pub use renderable::Renderable;
pub use texture_renderable::TextureRenderable;
