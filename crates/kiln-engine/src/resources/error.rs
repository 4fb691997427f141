use thiserror::Error;

use crate::device::DeviceError;

use super::{DecodeError, EntryState};

/// Failure of a texture manager operation.
///
/// Cloneable so every waiter on a shared load receives the same error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TextureError {
    /// The image could not be decoded. The name is absent again; a new `load` retries.
    #[error("texture `{name}` failed to load")]
    Decode {
        name: String,
        #[source]
        source: DecodeError,
    },

    /// The offscreen target used for readback was unusable. Nothing is memoized.
    #[error("pixel readback of `{name}` failed: {reason}")]
    Readback { name: String, reason: String },

    /// An operation was called on a name in the wrong state. This is a caller bug.
    #[error("`{op}` called on texture `{name}` while it is {state}")]
    UsageViolation {
        op: &'static str,
        name: String,
        state: EntryState,
    },

    #[error("device rejected texture `{name}`")]
    Device {
        name: String,
        #[source]
        source: DeviceError,
    },

    /// The manager was dropped before the load finished.
    #[error("texture manager dropped while `{0}` was loading")]
    Detached(String),
}
