//! In-memory [`Device`] that records every call, for unit tests.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

use super::{
    AttribLocation, BufferId, Device, DeviceError, FramebufferId, FramebufferStatus, ProgramDesc,
    ProgramId, SamplerParams, TextureId, Topology, UniformLocation, UniformValue,
    MAX_TEXTURE_UNITS,
};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    CreateTexture { texture: TextureId, width: u32, height: u32 },
    UploadRgba8 { texture: TextureId, bytes: usize },
    GenerateMipmaps(TextureId),
    SetSamplerParams { texture: TextureId, params: SamplerParams },
    BindTexture { unit: u32, texture: Option<TextureId> },
    DeleteTexture(TextureId),
    CreateFramebuffer { framebuffer: FramebufferId, texture: TextureId },
    ReadPixels { framebuffer: FramebufferId, width: u32, height: u32 },
    DeleteFramebuffer(FramebufferId),
    CreateVertexBuffer { buffer: BufferId, floats: usize },
    CreateProgram { program: ProgramId, label: &'static str },
    UseProgram(ProgramId),
    SetUniform { location: UniformLocation, value: UniformValue },
    BindVertexAttrib { location: AttribLocation, buffer: BufferId, components: u32 },
    DrawArrays { topology: Topology, first: u32, count: u32 },
}

#[derive(Default)]
pub(crate) struct RecordingDevice {
    calls: RefCell<Vec<Call>>,
    next_id: Cell<u32>,
    textures: RefCell<HashMap<TextureId, (u32, u32)>>,
    framebuffers: RefCell<HashMap<FramebufferId, TextureId>>,
    programs: RefCell<HashMap<ProgramId, ProgramDesc>>,
    units: RefCell<[Option<TextureId>; MAX_TEXTURE_UNITS as usize]>,
    /// Makes every framebuffer report `IncompleteAttachment`.
    pub(crate) incomplete_framebuffers: Cell<bool>,
    /// Makes `create_texture` fail.
    pub(crate) fail_texture_creation: Cell<bool>,
}

impl RecordingDevice {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> u32 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        id
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub(crate) fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    pub(crate) fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.borrow().iter().filter(|c| pred(c)).count()
    }

    pub(crate) fn bound(&self, unit: u32) -> Option<TextureId> {
        self.units.borrow()[unit as usize]
    }

    pub(crate) fn live_textures(&self) -> HashSet<TextureId> {
        self.textures.borrow().keys().copied().collect()
    }

    /// Pixel value the fake readback reports for texel `i` of `texture`.
    pub(crate) fn texel(texture: TextureId, i: usize) -> [u8; 4] {
        [texture.0 as u8, (i % 251) as u8, (i / 251) as u8, 255]
    }
}

impl Device for RecordingDevice {
    fn create_texture(&self, width: u32, height: u32) -> Result<TextureId, DeviceError> {
        if self.fail_texture_creation.get() || width == 0 || height == 0 {
            return Err(DeviceError::InvalidTextureSize { width, height, max: 8192 });
        }
        let texture = TextureId(self.next_id());
        self.textures.borrow_mut().insert(texture, (width, height));
        self.record(Call::CreateTexture { texture, width, height });
        Ok(texture)
    }

    fn upload_rgba8(&self, texture: TextureId, pixels: &[u8]) -> Result<(), DeviceError> {
        let (w, h) = *self
            .textures
            .borrow()
            .get(&texture)
            .ok_or(DeviceError::UnknownTexture(texture))?;
        let expected = w as usize * h as usize * 4;
        if pixels.len() != expected {
            return Err(DeviceError::PixelDataSize { expected, actual: pixels.len() });
        }
        self.record(Call::UploadRgba8 { texture, bytes: pixels.len() });
        Ok(())
    }

    fn generate_mipmaps(&self, texture: TextureId) -> Result<(), DeviceError> {
        self.record(Call::GenerateMipmaps(texture));
        Ok(())
    }

    fn set_sampler_params(&self, texture: TextureId, params: SamplerParams) {
        self.record(Call::SetSamplerParams { texture, params });
    }

    fn bind_texture(&self, unit: u32, texture: Option<TextureId>) {
        self.units.borrow_mut()[unit as usize] = texture;
        self.record(Call::BindTexture { unit, texture });
    }

    fn delete_texture(&self, texture: TextureId) {
        self.textures.borrow_mut().remove(&texture);
        for unit in self.units.borrow_mut().iter_mut() {
            if *unit == Some(texture) {
                *unit = None;
            }
        }
        self.record(Call::DeleteTexture(texture));
    }

    fn create_framebuffer(&self, texture: TextureId) -> Result<FramebufferId, DeviceError> {
        let framebuffer = FramebufferId(self.next_id());
        self.framebuffers.borrow_mut().insert(framebuffer, texture);
        self.record(Call::CreateFramebuffer { framebuffer, texture });
        Ok(framebuffer)
    }

    fn framebuffer_status(&self, framebuffer: FramebufferId) -> FramebufferStatus {
        if self.incomplete_framebuffers.get() {
            return FramebufferStatus::IncompleteAttachment;
        }
        match self.framebuffers.borrow().get(&framebuffer) {
            Some(texture) if self.textures.borrow().contains_key(texture) => {
                FramebufferStatus::Complete
            }
            _ => FramebufferStatus::MissingAttachment,
        }
    }

    fn read_pixels(
        &self,
        framebuffer: FramebufferId,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, DeviceError> {
        let texture = *self
            .framebuffers
            .borrow()
            .get(&framebuffer)
            .ok_or(DeviceError::UnknownFramebuffer(framebuffer))?;
        self.record(Call::ReadPixels { framebuffer, width, height });
        Ok((0..width as usize * height as usize)
            .flat_map(|i| Self::texel(texture, i))
            .collect())
    }

    fn delete_framebuffer(&self, framebuffer: FramebufferId) {
        self.framebuffers.borrow_mut().remove(&framebuffer);
        self.record(Call::DeleteFramebuffer(framebuffer));
    }

    fn create_vertex_buffer(&self, data: &[f32]) -> Result<BufferId, DeviceError> {
        let buffer = BufferId(self.next_id());
        self.record(Call::CreateVertexBuffer { buffer, floats: data.len() });
        Ok(buffer)
    }

    fn create_program(&self, desc: &ProgramDesc) -> Result<ProgramId, DeviceError> {
        let program = ProgramId(self.next_id());
        self.programs.borrow_mut().insert(program, desc.clone());
        self.record(Call::CreateProgram { program, label: desc.label });
        Ok(program)
    }

    fn attrib_location(&self, program: ProgramId, name: &str) -> Option<AttribLocation> {
        self.programs
            .borrow()
            .get(&program)?
            .attrib_index(name)
            .map(AttribLocation)
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        self.programs
            .borrow()
            .get(&program)?
            .uniform_index(name)
            .map(|index| UniformLocation { program, index })
    }

    fn use_program(&self, program: ProgramId) {
        self.record(Call::UseProgram(program));
    }

    fn set_uniform(&self, location: UniformLocation, value: UniformValue) {
        self.record(Call::SetUniform { location, value });
    }

    fn bind_vertex_attrib(&self, location: AttribLocation, buffer: BufferId, components: u32) {
        self.record(Call::BindVertexAttrib { location, buffer, components });
    }

    fn draw_arrays(&self, topology: Topology, first: u32, count: u32) {
        self.record(Call::DrawArrays { topology, first, count });
    }
}
