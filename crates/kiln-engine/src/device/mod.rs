//! Graphics device layer.
//!
//! This module is responsible for:
//! - the [`Device`] trait every GPU-touching component receives at construction
//! - headless wgpu bring-up ([`Gpu`])
//! - the wgpu implementation of [`Device`] ([`WgpuDevice`])
//!
//! The trait follows a bind-then-draw model: textures are bound to numbered
//! units, a program is made current, uniforms and vertex attributes are set,
//! then `draw_arrays` submits. All calls happen on one thread.

mod error;
mod gpu;
mod init;
mod types;
mod wgpu_device;

#[cfg(test)]
pub(crate) mod recording;

pub use error::DeviceError;
pub use gpu::Gpu;
pub use init::GpuInit;
pub use types::{
    AttribDesc, AttribLocation, BufferId, Filter, FramebufferId, FramebufferStatus, MinFilter,
    ProgramDesc, ProgramId, SamplerParams, TextureId, Topology, UniformDesc, UniformKind,
    UniformLocation, UniformValue, Wrap,
};
pub use wgpu_device::{WgpuDevice, TEXTURE_FORMAT};

/// Number of texture units a device exposes.
pub const MAX_TEXTURE_UNITS: u32 = 8;

/// Device context consumed by textures, shaders and drawables.
///
/// Handles are plain ids; the device owns the underlying objects until the
/// matching `delete_*` call.
pub trait Device {
    // ── textures ─────────────────────────────────────────────────────────

    /// Allocates an RGBA8 2D texture with storage for its full mipmap chain.
    fn create_texture(&self, width: u32, height: u32) -> Result<TextureId, DeviceError>;

    /// Writes `width * height * 4` bytes of straight RGBA8 into mip level 0.
    fn upload_rgba8(&self, texture: TextureId, pixels: &[u8]) -> Result<(), DeviceError>;

    /// Fills mip levels `1..` from the last level-0 upload.
    fn generate_mipmaps(&self, texture: TextureId) -> Result<(), DeviceError>;

    /// Sampling state used whenever `texture` is sampled.
    fn set_sampler_params(&self, texture: TextureId, params: SamplerParams);

    /// Binds `texture` to `unit`; `None` unbinds.
    fn bind_texture(&self, unit: u32, texture: Option<TextureId>);

    fn delete_texture(&self, texture: TextureId);

    // ── offscreen readback ───────────────────────────────────────────────

    /// Creates an offscreen render target whose color attachment is `texture`.
    fn create_framebuffer(&self, texture: TextureId) -> Result<FramebufferId, DeviceError>;

    fn framebuffer_status(&self, framebuffer: FramebufferId) -> FramebufferStatus;

    /// Reads `width * height * 4` RGBA8 bytes, rows in upload order.
    fn read_pixels(
        &self,
        framebuffer: FramebufferId,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, DeviceError>;

    fn delete_framebuffer(&self, framebuffer: FramebufferId);

    // ── programs and geometry ────────────────────────────────────────────

    /// Creates a vertex buffer from tightly packed `f32` components.
    fn create_vertex_buffer(&self, data: &[f32]) -> Result<BufferId, DeviceError>;

    fn create_program(&self, desc: &ProgramDesc) -> Result<ProgramId, DeviceError>;

    fn attrib_location(&self, program: ProgramId, name: &str) -> Option<AttribLocation>;

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation>;

    fn use_program(&self, program: ProgramId);

    fn set_uniform(&self, location: UniformLocation, value: UniformValue);

    /// Feeds attribute `location` from `buffer`, `components` floats per vertex.
    fn bind_vertex_attrib(&self, location: AttribLocation, buffer: BufferId, components: u32);

    /// Draws `count` vertices starting at `first` with the current program.
    fn draw_arrays(&self, topology: Topology, first: u32, count: u32);
}
