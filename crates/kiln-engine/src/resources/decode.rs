use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use futures::channel::oneshot;
use futures::executor::ThreadPool;
use futures::future::{self, FutureExt, LocalBoxFuture};
use thiserror::Error;

/// Why an image could not be turned into pixels.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("image `{0}` not found")]
    NotFound(String),

    #[error("failed to read `{name}`: {message}")]
    Io { name: String, message: String },

    #[error("failed to decode `{name}`: {message}")]
    Format { name: String, message: String },

    #[error("image has invalid size {width}x{height} with {bytes} bytes of RGBA8")]
    InvalidDimensions { width: u32, height: u32, bytes: usize },

    #[error("decode of `{0}` was abandoned")]
    Cancelled(String),
}

/// Decoded straight-alpha RGBA8 pixels, rows top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl DecodedImage {
    /// Checks `pixels` holds exactly `width * height` RGBA8 texels and both sides are non-zero.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, DecodeError> {
        if width == 0 || height == 0 || pixels.len() != width as usize * height as usize * 4 {
            return Err(DecodeError::InvalidDimensions {
                width,
                height,
                bytes: pixels.len(),
            });
        }
        Ok(Self { width, height, pixels })
    }

    pub fn from_dynamic(image: image::DynamicImage) -> Result<Self, DecodeError> {
        let rgba = image.into_rgba8();
        let (width, height) = rgba.dimensions();
        Self::new(width, height, rgba.into_raw())
    }

    /// Decodes any format the `image` crate was built with.
    pub fn from_encoded(name: &str, bytes: &[u8]) -> Result<Self, DecodeError> {
        let image = image::load_from_memory(bytes).map_err(|e| DecodeError::Format {
            name: name.to_owned(),
            message: e.to_string(),
        })?;
        Self::from_dynamic(image)
    }

    /// Single-color image; sizes are clamped to at least 1.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        let pixels = rgba.repeat(width as usize * height as usize);
        Self { width, height, pixels }
    }

    /// Two-color checkerboard with square cells of `cell` pixels.
    pub fn checkerboard(width: u32, height: u32, cell: u32, a: [u8; 4], b: [u8; 4]) -> Self {
        let (width, height, cell) = (width.max(1), height.max(1), cell.max(1));
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
        for y in 0..height {
            for x in 0..width {
                let even = (x / cell + y / cell) % 2 == 0;
                pixels.extend_from_slice(if even { &a } else { &b });
            }
        }
        Self { width, height, pixels }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

pub type DecodeFuture = LocalBoxFuture<'static, Result<DecodedImage, DecodeError>>;

/// Turns a resource name into decoded pixels.
///
/// `decode` starts work immediately; the returned future only waits for it.
pub trait ImageSource {
    fn decode(&self, name: &str) -> DecodeFuture;
}

/// Upper bound on decode workers picked by [`FsImageSource::new`].
pub const MAX_DECODE_WORKERS: usize = 4;

/// Reads and decodes image files on a fixed pool of worker threads.
///
/// Relative names resolve against `root`. Requests beyond the pool size queue
/// up instead of starting more threads. Clones share the pool.
#[derive(Debug, Clone)]
pub struct FsImageSource {
    root: PathBuf,
    pool: ThreadPool,
    workers: usize,
}

impl FsImageSource {
    /// One worker per core, at most [`MAX_DECODE_WORKERS`].
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let workers = std::thread::available_parallelism()
            .map_or(1, |n| n.get())
            .min(MAX_DECODE_WORKERS);
        Self::with_workers(root, workers)
    }

    pub fn with_workers(root: impl Into<PathBuf>, workers: usize) -> io::Result<Self> {
        let workers = workers.max(1);
        let pool = ThreadPool::builder()
            .pool_size(workers)
            .name_prefix("kiln-decode-")
            .create()?;
        Ok(Self {
            root: root.into(),
            pool,
            workers,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, name: &str) -> PathBuf {
        let path = Path::new(name);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl ImageSource for FsImageSource {
    fn decode(&self, name: &str) -> DecodeFuture {
        let path = self.resolve(name);
        let label = name.to_owned();
        let (sender, receiver) = oneshot::channel();

        self.pool.spawn_ok({
            let label = label.clone();
            async move {
                let _ = sender.send(decode_file(&path, &label));
            }
        });

        async move {
            receiver
                .await
                .unwrap_or_else(|_| Err(DecodeError::Cancelled(label)))
        }
        .boxed_local()
    }
}

fn decode_file(path: &Path, name: &str) -> Result<DecodedImage, DecodeError> {
    log::debug!("decoding {}", path.display());
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DecodeError::NotFound(name.to_owned()),
        _ => DecodeError::Io {
            name: name.to_owned(),
            message: e.to_string(),
        },
    })?;
    DecodedImage::from_encoded(name, &bytes)
}

enum MemoryImage {
    Decoded(DecodedImage),
    Encoded(Vec<u8>),
}

/// Images held in memory: generated pixels or embedded encoded files.
///
/// Decoding completes immediately.
#[derive(Default)]
pub struct MemoryImageSource {
    images: RefCell<HashMap<String, MemoryImage>>,
}

impl MemoryImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: impl Into<String>, image: DecodedImage) {
        self.images
            .borrow_mut()
            .insert(name.into(), MemoryImage::Decoded(image));
    }

    /// Registers encoded bytes (e.g. from `include_bytes!`), decoded on each request.
    pub fn insert_encoded(&self, name: impl Into<String>, bytes: Vec<u8>) {
        self.images
            .borrow_mut()
            .insert(name.into(), MemoryImage::Encoded(bytes));
    }

    pub fn remove(&self, name: &str) -> bool {
        self.images.borrow_mut().remove(name).is_some()
    }
}

impl ImageSource for MemoryImageSource {
    fn decode(&self, name: &str) -> DecodeFuture {
        let result = match self.images.borrow().get(name) {
            None => Err(DecodeError::NotFound(name.to_owned())),
            Some(MemoryImage::Decoded(image)) => Ok(image.clone()),
            Some(MemoryImage::Encoded(bytes)) => DecodedImage::from_encoded(name, bytes),
        };
        future::ready(result).boxed_local()
    }
}
