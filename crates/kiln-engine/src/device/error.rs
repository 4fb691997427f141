use thiserror::Error;

use super::{BufferId, FramebufferId, ProgramId, TextureId};

/// Failure reported by a [`Device`](super::Device) call.
///
/// Cloneable so it can travel through shared load futures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeviceError {
    #[error("texture size {width}x{height} is invalid (max {max})")]
    InvalidTextureSize { width: u32, height: u32, max: u32 },

    #[error("pixel data is {actual} bytes, expected {expected}")]
    PixelDataSize { expected: usize, actual: usize },

    #[error("unknown texture {0:?}")]
    UnknownTexture(TextureId),

    #[error("unknown framebuffer {0:?}")]
    UnknownFramebuffer(FramebufferId),

    #[error("unknown buffer {0:?}")]
    UnknownBuffer(BufferId),

    #[error("unknown program {0:?}")]
    UnknownProgram(ProgramId),

    #[error("no level-0 pixels staged for {0:?}; upload before generating mipmaps")]
    NothingStaged(TextureId),

    #[error("program `{label}` is malformed: {reason}")]
    InvalidProgram { label: String, reason: String },

    #[error("draw state incomplete: {0}")]
    DrawState(String),

    #[error("readback failed: {0}")]
    Readback(String),
}
