use std::borrow::Cow;

use glam::Mat4;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);
    };
}

id_type!(
    /// Device texture handle.
    TextureId
);
id_type!(
    /// Offscreen render target handle.
    FramebufferId
);
id_type!(
    /// Vertex buffer handle.
    BufferId
);
id_type!(
    /// Compiled program handle.
    ProgramId
);

/// Vertex attribute slot within a program.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct AttribLocation(pub u32);

/// Uniform slot: index into the owning program's uniform list.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct UniformLocation {
    pub program: ProgramId,
    pub index: u32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

/// Minification filter, including how mip levels are blended.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MinFilter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

impl MinFilter {
    pub fn uses_mipmaps(self) -> bool {
        !matches!(self, MinFilter::Nearest | MinFilter::Linear)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Wrap {
    ClampToEdge,
    Repeat,
    MirroredRepeat,
}

/// Per-texture sampling state.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SamplerParams {
    pub mag_filter: Filter,
    pub min_filter: MinFilter,
    pub wrap_s: Wrap,
    pub wrap_t: Wrap,
}

impl SamplerParams {
    /// Policy for every texture loaded through the texture manager.
    pub const TEXTURE_DEFAULT: Self = Self {
        mag_filter: Filter::Linear,
        min_filter: MinFilter::LinearMipmapLinear,
        wrap_s: Wrap::ClampToEdge,
        wrap_t: Wrap::ClampToEdge,
    };
}

impl Default for SamplerParams {
    /// State of a freshly created texture before any parameters are set.
    fn default() -> Self {
        Self {
            mag_filter: Filter::Linear,
            min_filter: MinFilter::NearestMipmapLinear,
            wrap_s: Wrap::Repeat,
            wrap_t: Wrap::Repeat,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Topology {
    TriangleStrip,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FramebufferStatus {
    Complete,
    IncompleteAttachment,
    MissingAttachment,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UniformKind {
    Vec4,
    Mat4,
    /// Texture unit index; the sampled texture is whatever is bound there at draw time.
    Sampler,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UniformValue {
    Vec4([f32; 4]),
    Mat4(Mat4),
    Sampler(u32),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Vec4(_) => UniformKind::Vec4,
            UniformValue::Mat4(_) => UniformKind::Mat4,
            UniformValue::Sampler(_) => UniformKind::Sampler,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttribDesc {
    pub name: &'static str,
    pub components: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UniformDesc {
    pub name: &'static str,
    pub kind: UniformKind,
}

/// Program source plus its interface.
///
/// Attribute `i` is read from `@location(i)`. Non-sampler uniforms are packed
/// in declaration order into one uniform block at `@binding(0)`; sampler `k`
/// occupies `@binding(1 + 2k)` (texture) and `@binding(2 + 2k)` (sampler).
#[derive(Debug, Clone)]
pub struct ProgramDesc {
    pub label: &'static str,
    pub source: Cow<'static, str>,
    pub attributes: Vec<AttribDesc>,
    pub uniforms: Vec<UniformDesc>,
}

impl ProgramDesc {
    pub fn attrib_index(&self, name: &str) -> Option<u32> {
        self.attributes.iter().position(|a| a.name == name).map(|i| i as u32)
    }

    pub fn uniform_index(&self, name: &str) -> Option<u32> {
        self.uniforms.iter().position(|u| u.name == name).map(|i| i as u32)
    }
}
