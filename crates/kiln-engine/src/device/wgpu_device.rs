use std::cell::RefCell;
use std::collections::HashMap;
use std::num::NonZeroU64;

use wgpu::util::DeviceExt;

use crate::coords::ColorRgba;

use super::{
    AttribLocation, BufferId, Device, DeviceError, Filter, FramebufferId, FramebufferStatus, Gpu,
    MinFilter, ProgramDesc, ProgramId, SamplerParams, TextureId, Topology, UniformDesc,
    UniformKind, UniformLocation, UniformValue, Wrap, MAX_TEXTURE_UNITS,
};

/// Storage format of every texture created through [`WgpuDevice`].
pub const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// [`Device`] implementation on top of wgpu.
///
/// Binding state (texture units, current program, uniform values, attribute
/// buffers) lives on the CPU and is resolved into a pipeline + bind group when
/// `draw_arrays` runs. Each draw is encoded and submitted on its own, into the
/// texture selected with [`set_render_target`](Self::set_render_target).
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    state: RefCell<State>,
}

struct TextureSlot {
    texture: wgpu::Texture,
    /// All mip levels; used for sampling.
    view: wgpu::TextureView,
    width: u32,
    height: u32,
    mip_levels: u32,
    params: SamplerParams,
    /// Level-0 pixels kept between upload and mipmap generation.
    staged: Option<Vec<u8>>,
}

struct ProgramSlot {
    desc: ProgramDesc,
    module: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    values: Vec<Option<UniformValue>>,
}

#[derive(Debug, Copy, Clone)]
struct AttribBinding {
    buffer: BufferId,
    components: u32,
}

#[derive(Default)]
struct State {
    next_id: u32,
    textures: HashMap<TextureId, TextureSlot>,
    framebuffers: HashMap<FramebufferId, TextureId>,
    buffers: HashMap<BufferId, wgpu::Buffer>,
    programs: HashMap<ProgramId, ProgramSlot>,
    pipelines: HashMap<(ProgramId, Topology), wgpu::RenderPipeline>,
    samplers: HashMap<SamplerParams, wgpu::Sampler>,
    units: [Option<TextureId>; MAX_TEXTURE_UNITS as usize],
    attribs: HashMap<u32, AttribBinding>,
    current_program: Option<ProgramId>,
    target: Option<TextureId>,
}

impl State {
    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl WgpuDevice {
    pub fn new(gpu: &Gpu) -> Self {
        Self::from_parts(gpu.device().clone(), gpu.queue().clone())
    }

    /// Wraps an existing device/queue pair, e.g. one shared with a windowed runtime.
    pub fn from_parts(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            state: RefCell::new(State::default()),
        }
    }

    /// Selects the texture that `draw_arrays` and [`clear`](Self::clear) render into.
    ///
    /// The texture must not be bound to a unit sampled by the same draw.
    pub fn set_render_target(&self, texture: Option<TextureId>) {
        self.state.borrow_mut().target = texture;
    }

    pub fn render_target(&self) -> Option<TextureId> {
        self.state.borrow().target
    }

    pub fn texture_size(&self, texture: TextureId) -> Option<(u32, u32)> {
        self.state
            .borrow()
            .textures
            .get(&texture)
            .map(|slot| (slot.width, slot.height))
    }

    /// Clears mip level 0 of the current render target.
    pub fn clear(&self, color: ColorRgba) -> Result<(), DeviceError> {
        let state = self.state.borrow();
        let target = state
            .target
            .ok_or_else(|| DeviceError::DrawState("no render target".into()))?;
        let slot = state
            .textures
            .get(&target)
            .ok_or(DeviceError::UnknownTexture(target))?;
        let view = target_view(slot);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("kiln clear encoder"),
            });
        {
            let _rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("kiln clear"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: color.r as f64,
                            g: color.g as f64,
                            b: color.b as f64,
                            a: color.a as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn write_level(&self, texture: &wgpu::Texture, level: u32, width: u32, height: u32, pixels: &[u8]) {
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: level,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    fn try_draw(&self, topology: Topology, first: u32, count: u32) -> Result<(), DeviceError> {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;

        let program_id = state
            .current_program
            .ok_or_else(|| DeviceError::DrawState("no program in use".into()))?;
        let target_id = state
            .target
            .ok_or_else(|| DeviceError::DrawState("no render target".into()))?;
        let view = target_view(
            state
                .textures
                .get(&target_id)
                .ok_or(DeviceError::UnknownTexture(target_id))?,
        );
        let program = state
            .programs
            .get(&program_id)
            .ok_or(DeviceError::UnknownProgram(program_id))?;

        let mut vertex_buffers = Vec::with_capacity(program.desc.attributes.len());
        for (i, attr) in program.desc.attributes.iter().enumerate() {
            let binding = state.attribs.get(&(i as u32)).ok_or_else(|| {
                DeviceError::DrawState(format!("attribute `{}` has no buffer", attr.name))
            })?;
            if binding.components != attr.components {
                return Err(DeviceError::DrawState(format!(
                    "attribute `{}` expects {} components, buffer provides {}",
                    attr.name, attr.components, binding.components
                )));
            }
            let buffer = state
                .buffers
                .get(&binding.buffer)
                .ok_or(DeviceError::UnknownBuffer(binding.buffer))?;
            vertex_buffers.push(buffer);
        }

        let mut sampled = Vec::new();
        for (desc, value) in program.desc.uniforms.iter().zip(&program.values) {
            if desc.kind != UniformKind::Sampler {
                continue;
            }
            // An unset sampler reads unit 0.
            let unit = match value {
                Some(UniformValue::Sampler(unit)) => *unit,
                _ => 0,
            };
            let texture_id = state
                .units
                .get(unit as usize)
                .copied()
                .flatten()
                .ok_or_else(|| {
                    DeviceError::DrawState(format!(
                        "sampler `{}` reads empty texture unit {unit}",
                        desc.name
                    ))
                })?;
            if texture_id == target_id {
                return Err(DeviceError::DrawState(format!(
                    "sampler `{}` reads the current render target",
                    desc.name
                )));
            }
            let slot = state
                .textures
                .get(&texture_id)
                .ok_or(DeviceError::UnknownTexture(texture_id))?;
            sampled.push((&slot.view, slot.params));
        }

        for (_, params) in &sampled {
            if !state.samplers.contains_key(params) {
                let sampler = create_sampler(&self.device, *params);
                state.samplers.insert(*params, sampler);
            }
        }

        let key = (program_id, topology);
        if !state.pipelines.contains_key(&key) {
            let pipeline = create_pipeline(&self.device, program, topology);
            state.pipelines.insert(key, pipeline);
        }
        let pipeline = &state.pipelines[&key];

        let block = pack_uniforms(&program.desc.uniforms, &program.values);
        let ubo = (!block.is_empty()).then(|| {
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("kiln uniform block"),
                    contents: &block,
                    usage: wgpu::BufferUsages::UNIFORM,
                })
        });

        let mut entries = Vec::with_capacity(1 + sampled.len() * 2);
        if let Some(ubo) = ubo.as_ref() {
            entries.push(wgpu::BindGroupEntry {
                binding: 0,
                resource: ubo.as_entire_binding(),
            });
        }
        for (k, (view, params)) in sampled.iter().enumerate() {
            let k = k as u32;
            entries.push(wgpu::BindGroupEntry {
                binding: 1 + 2 * k,
                resource: wgpu::BindingResource::TextureView(view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: 2 + 2 * k,
                resource: wgpu::BindingResource::Sampler(&state.samplers[params]),
            });
        }

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("kiln draw bind group"),
            layout: &program.bind_group_layout,
            entries: &entries,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("kiln draw encoder"),
            });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("kiln draw pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            rpass.set_pipeline(pipeline);
            rpass.set_bind_group(0, &bind_group, &[]);
            for (slot, buffer) in vertex_buffers.iter().enumerate() {
                rpass.set_vertex_buffer(slot as u32, buffer.slice(..));
            }
            rpass.draw(first..first + count, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}

impl Device for WgpuDevice {
    fn create_texture(&self, width: u32, height: u32) -> Result<TextureId, DeviceError> {
        let max = self.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(DeviceError::InvalidTextureSize { width, height, max });
        }

        let mip_levels = mip_level_count(width, height);
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("kiln texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: mip_levels,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut state = self.state.borrow_mut();
        let id = TextureId(state.next_id());
        state.textures.insert(
            id,
            TextureSlot {
                texture,
                view,
                width,
                height,
                mip_levels,
                params: SamplerParams::default(),
                staged: None,
            },
        );
        Ok(id)
    }

    fn upload_rgba8(&self, texture: TextureId, pixels: &[u8]) -> Result<(), DeviceError> {
        let mut state = self.state.borrow_mut();
        let slot = state
            .textures
            .get_mut(&texture)
            .ok_or(DeviceError::UnknownTexture(texture))?;

        let expected = slot.width as usize * slot.height as usize * 4;
        if pixels.len() != expected {
            return Err(DeviceError::PixelDataSize {
                expected,
                actual: pixels.len(),
            });
        }

        self.write_level(&slot.texture, 0, slot.width, slot.height, pixels);
        slot.staged = Some(pixels.to_vec());
        Ok(())
    }

    fn generate_mipmaps(&self, texture: TextureId) -> Result<(), DeviceError> {
        let mut state = self.state.borrow_mut();
        let slot = state
            .textures
            .get_mut(&texture)
            .ok_or(DeviceError::UnknownTexture(texture))?;
        let pixels = slot.staged.take().ok_or(DeviceError::NothingStaged(texture))?;

        let actual = pixels.len();
        let mut level = image::RgbaImage::from_raw(slot.width, slot.height, pixels).ok_or(
            DeviceError::PixelDataSize {
                expected: slot.width as usize * slot.height as usize * 4,
                actual,
            },
        )?;

        for mip in 1..slot.mip_levels {
            let (w, h) = mip_extent(slot.width, slot.height, mip);
            level = image::imageops::resize(&level, w, h, image::imageops::FilterType::Triangle);
            self.write_level(&slot.texture, mip, w, h, level.as_raw());
        }
        Ok(())
    }

    fn set_sampler_params(&self, texture: TextureId, params: SamplerParams) {
        match self.state.borrow_mut().textures.get_mut(&texture) {
            Some(slot) => slot.params = params,
            None => log::warn!("set_sampler_params: unknown texture {texture:?}"),
        }
    }

    fn bind_texture(&self, unit: u32, texture: Option<TextureId>) {
        let mut state = self.state.borrow_mut();
        if unit >= MAX_TEXTURE_UNITS {
            log::error!("bind_texture: unit {unit} out of range (max {MAX_TEXTURE_UNITS})");
            return;
        }
        if let Some(id) = texture {
            if !state.textures.contains_key(&id) {
                log::warn!("bind_texture: unknown texture {id:?}");
                return;
            }
        }
        state.units[unit as usize] = texture;
    }

    fn delete_texture(&self, texture: TextureId) {
        let mut state = self.state.borrow_mut();
        let Some(slot) = state.textures.remove(&texture) else {
            log::warn!("delete_texture: unknown texture {texture:?}");
            return;
        };
        slot.texture.destroy();

        // Deleting a bound texture unbinds it everywhere.
        for unit in state.units.iter_mut() {
            if *unit == Some(texture) {
                *unit = None;
            }
        }
        if state.target == Some(texture) {
            state.target = None;
        }
    }

    fn create_framebuffer(&self, texture: TextureId) -> Result<FramebufferId, DeviceError> {
        let mut state = self.state.borrow_mut();
        let id = FramebufferId(state.next_id());
        state.framebuffers.insert(id, texture);
        Ok(id)
    }

    fn framebuffer_status(&self, framebuffer: FramebufferId) -> FramebufferStatus {
        let state = self.state.borrow();
        match state.framebuffers.get(&framebuffer) {
            None => FramebufferStatus::MissingAttachment,
            Some(texture) => match state.textures.get(texture) {
                None => FramebufferStatus::MissingAttachment,
                Some(slot) if slot.texture.format() != TEXTURE_FORMAT => {
                    FramebufferStatus::IncompleteAttachment
                }
                Some(_) => FramebufferStatus::Complete,
            },
        }
    }

    fn read_pixels(
        &self,
        framebuffer: FramebufferId,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, DeviceError> {
        let padded = padded_bytes_per_row(width);
        let buffer = {
            let state = self.state.borrow();
            let texture = state
                .framebuffers
                .get(&framebuffer)
                .ok_or(DeviceError::UnknownFramebuffer(framebuffer))?;
            let slot = state
                .textures
                .get(texture)
                .ok_or(DeviceError::UnknownTexture(*texture))?;
            if width == 0 || height == 0 || width > slot.width || height > slot.height {
                return Err(DeviceError::Readback(format!(
                    "region {width}x{height} outside {}x{} attachment",
                    slot.width, slot.height
                )));
            }

            let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("kiln readback buffer"),
                size: padded as u64 * height as u64,
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                mapped_at_creation: false,
            });

            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("kiln readback encoder"),
                });
            encoder.copy_texture_to_buffer(
                wgpu::TexelCopyTextureInfo {
                    texture: &slot.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::TexelCopyBufferInfo {
                    buffer: &buffer,
                    layout: wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(padded),
                        rows_per_image: Some(height),
                    },
                },
                wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
            );
            self.queue.submit(std::iter::once(encoder.finish()));
            buffer
        };

        let slice = buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });

        let _ = self.device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        });

        match receiver.recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(DeviceError::Readback(err.to_string())),
            Err(_) => return Err(DeviceError::Readback("map callback never ran".into())),
        }

        let data = slice.get_mapped_range();
        let pixels = unpad_rows(&data, width, height, padded);
        drop(data);
        buffer.unmap();
        Ok(pixels)
    }

    fn delete_framebuffer(&self, framebuffer: FramebufferId) {
        self.state.borrow_mut().framebuffers.remove(&framebuffer);
    }

    fn create_vertex_buffer(&self, data: &[f32]) -> Result<BufferId, DeviceError> {
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("kiln vertex buffer"),
                contents: bytemuck::cast_slice(data),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let mut state = self.state.borrow_mut();
        let id = BufferId(state.next_id());
        state.buffers.insert(id, buffer);
        Ok(id)
    }

    fn create_program(&self, desc: &ProgramDesc) -> Result<ProgramId, DeviceError> {
        if let Some(attr) = desc.attributes.iter().find(|a| !(1..=4).contains(&a.components)) {
            return Err(DeviceError::InvalidProgram {
                label: desc.label.to_string(),
                reason: format!(
                    "attribute `{}` has {} components (1..=4 supported)",
                    attr.name, attr.components
                ),
            });
        }

        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(desc.label),
                source: wgpu::ShaderSource::Wgsl(desc.source.clone()),
            });

        let mut entries = Vec::new();
        if let Some(size) = NonZeroU64::new(uniform_block_size(&desc.uniforms)) {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: Some(size),
                },
                count: None,
            });
        }
        let samplers = desc
            .uniforms
            .iter()
            .filter(|u| u.kind == UniformKind::Sampler)
            .count() as u32;
        for k in 0..samplers {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: 1 + 2 * k,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: 2 + 2 * k,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
        }

        let bind_group_layout =
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(desc.label),
                    entries: &entries,
                });

        let pipeline_layout =
            self.device
                .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some(desc.label),
                    bind_group_layouts: &[&bind_group_layout],
                    immediate_size: 0,
                });

        let mut state = self.state.borrow_mut();
        let id = ProgramId(state.next_id());
        state.programs.insert(
            id,
            ProgramSlot {
                desc: desc.clone(),
                module,
                bind_group_layout,
                pipeline_layout,
                values: vec![None; desc.uniforms.len()],
            },
        );
        log::debug!("compiled program `{}` as {id:?}", desc.label);
        Ok(id)
    }

    fn attrib_location(&self, program: ProgramId, name: &str) -> Option<AttribLocation> {
        let state = self.state.borrow();
        let slot = state.programs.get(&program)?;
        slot.desc.attrib_index(name).map(AttribLocation)
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let state = self.state.borrow();
        let slot = state.programs.get(&program)?;
        slot.desc
            .uniform_index(name)
            .map(|index| UniformLocation { program, index })
    }

    fn use_program(&self, program: ProgramId) {
        let mut state = self.state.borrow_mut();
        if state.programs.contains_key(&program) {
            state.current_program = Some(program);
        } else {
            log::warn!("use_program: unknown program {program:?}");
        }
    }

    fn set_uniform(&self, location: UniformLocation, value: UniformValue) {
        let mut state = self.state.borrow_mut();
        let Some(slot) = state.programs.get_mut(&location.program) else {
            log::error!("set_uniform: unknown program {:?}", location.program);
            return;
        };
        let index = location.index as usize;
        match slot.desc.uniforms.get(index) {
            Some(desc) if desc.kind == value.kind() => slot.values[index] = Some(value),
            Some(desc) => log::error!(
                "set_uniform: `{}` is {:?}, got {:?}",
                desc.name,
                desc.kind,
                value.kind()
            ),
            None => log::error!("set_uniform: no uniform at index {index}"),
        }
    }

    fn bind_vertex_attrib(&self, location: AttribLocation, buffer: BufferId, components: u32) {
        if !(1..=4).contains(&components) {
            log::error!("bind_vertex_attrib: {components} components (1..=4 supported)");
            return;
        }
        self.state
            .borrow_mut()
            .attribs
            .insert(location.0, AttribBinding { buffer, components });
    }

    fn draw_arrays(&self, topology: Topology, first: u32, count: u32) {
        if let Err(err) = self.try_draw(topology, first, count) {
            log::warn!("draw_arrays skipped: {err}");
        }
    }
}

// ── wgpu object construction ──────────────────────────────────────────────

fn target_view(slot: &TextureSlot) -> wgpu::TextureView {
    slot.texture.create_view(&wgpu::TextureViewDescriptor {
        label: Some("kiln target view"),
        base_mip_level: 0,
        mip_level_count: Some(1),
        ..Default::default()
    })
}

fn create_sampler(device: &wgpu::Device, params: SamplerParams) -> wgpu::Sampler {
    let (min_filter, mipmap_filter) = match params.min_filter {
        MinFilter::Nearest | MinFilter::NearestMipmapNearest => {
            (wgpu::FilterMode::Nearest, wgpu::MipmapFilterMode::Nearest)
        }
        MinFilter::Linear | MinFilter::LinearMipmapNearest => {
            (wgpu::FilterMode::Linear, wgpu::MipmapFilterMode::Nearest)
        }
        MinFilter::NearestMipmapLinear => {
            (wgpu::FilterMode::Nearest, wgpu::MipmapFilterMode::Linear)
        }
        MinFilter::LinearMipmapLinear => {
            (wgpu::FilterMode::Linear, wgpu::MipmapFilterMode::Linear)
        }
    };
    // Non-mipmapped minification samples level 0 only.
    let lod_max_clamp = if params.min_filter.uses_mipmaps() { 32.0 } else { 0.0 };

    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("kiln sampler"),
        address_mode_u: address_mode(params.wrap_s),
        address_mode_v: address_mode(params.wrap_t),
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: filter_mode(params.mag_filter),
        min_filter,
        mipmap_filter,
        lod_max_clamp,
        ..Default::default()
    })
}

fn create_pipeline(
    device: &wgpu::Device,
    program: &ProgramSlot,
    topology: Topology,
) -> wgpu::RenderPipeline {
    let attributes: Vec<wgpu::VertexAttribute> = program
        .desc
        .attributes
        .iter()
        .enumerate()
        .map(|(i, a)| wgpu::VertexAttribute {
            format: vertex_format(a.components),
            offset: 0,
            shader_location: i as u32,
        })
        .collect();
    // One buffer slot per attribute, matching `bind_vertex_attrib`.
    let buffers: Vec<wgpu::VertexBufferLayout<'_>> = attributes
        .iter()
        .zip(&program.desc.attributes)
        .map(|(attr, desc)| wgpu::VertexBufferLayout {
            array_stride: desc.components as u64 * 4,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: std::slice::from_ref(attr),
        })
        .collect();

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(program.desc.label),
        layout: Some(&program.pipeline_layout),

        vertex: wgpu::VertexState {
            module: &program.module,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &buffers,
        },

        fragment: Some(wgpu::FragmentState {
            module: &program.module,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: TEXTURE_FORMAT,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),

        primitive: wgpu::PrimitiveState {
            topology: match topology {
                Topology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
            },
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },

        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}

fn address_mode(wrap: Wrap) -> wgpu::AddressMode {
    match wrap {
        Wrap::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        Wrap::Repeat => wgpu::AddressMode::Repeat,
        Wrap::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
    }
}

fn filter_mode(filter: Filter) -> wgpu::FilterMode {
    match filter {
        Filter::Nearest => wgpu::FilterMode::Nearest,
        Filter::Linear => wgpu::FilterMode::Linear,
    }
}

fn vertex_format(components: u32) -> wgpu::VertexFormat {
    match components {
        1 => wgpu::VertexFormat::Float32,
        2 => wgpu::VertexFormat::Float32x2,
        3 => wgpu::VertexFormat::Float32x3,
        _ => wgpu::VertexFormat::Float32x4,
    }
}

// ── layout math ───────────────────────────────────────────────────────────

/// Levels in a full mipmap chain down to 1x1.
fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

fn mip_extent(width: u32, height: u32, level: u32) -> (u32, u32) {
    ((width >> level).max(1), (height >> level).max(1))
}

/// Row pitch for texture → buffer copies.
fn padded_bytes_per_row(width: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    (width * 4).div_ceil(align) * align
}

fn unpad_rows(data: &[u8], width: u32, height: u32, padded: u32) -> Vec<u8> {
    let row = width as usize * 4;
    let mut pixels = Vec::with_capacity(row * height as usize);
    for chunk in data.chunks(padded as usize).take(height as usize) {
        pixels.extend_from_slice(&chunk[..row]);
    }
    pixels
}

fn uniform_size(kind: UniformKind) -> u64 {
    match kind {
        UniformKind::Vec4 => 16,
        UniformKind::Mat4 => 64,
        UniformKind::Sampler => 0,
    }
}

/// Size of the packed uniform block; every member is 16-byte aligned.
fn uniform_block_size(uniforms: &[UniformDesc]) -> u64 {
    uniforms.iter().map(|u| uniform_size(u.kind)).sum()
}

/// Packs non-sampler uniform values in declaration order. Unset values are zero.
fn pack_uniforms(uniforms: &[UniformDesc], values: &[Option<UniformValue>]) -> Vec<u8> {
    let mut block = Vec::with_capacity(uniform_block_size(uniforms) as usize);
    for (desc, value) in uniforms.iter().zip(values.iter().chain(std::iter::repeat(&None))) {
        match (desc.kind, value) {
            (UniformKind::Sampler, _) => {}
            (UniformKind::Vec4, Some(UniformValue::Vec4(v))) => {
                block.extend_from_slice(bytemuck::cast_slice(v));
            }
            (UniformKind::Mat4, Some(UniformValue::Mat4(m))) => {
                block.extend_from_slice(bytemuck::cast_slice(&m.to_cols_array()));
            }
            (kind, _) => block.resize(block.len() + uniform_size(kind) as usize, 0),
        }
    }
    block
}
