//! GPU-resident resources.
//!
//! Textures are loaded by name through a [`TextureManager`], which shares a
//! single device texture between every holder of the name and releases it
//! when the last holder unloads.

mod cache;
mod decode;
mod error;
mod texture;

pub use cache::{EntryState, PendingOp, ResourceCache};
pub use decode::{
    DecodeError, DecodeFuture, DecodedImage, FsImageSource, ImageSource, MemoryImageSource,
    MAX_DECODE_WORKERS,
};
pub use error::TextureError;
pub use texture::{PendingLoad, TextureManager, TextureRecord, TEXTURE_UNIT};
