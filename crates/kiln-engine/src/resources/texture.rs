use std::cell::OnceCell;
use std::fmt;
use std::rc::{Rc, Weak};

use futures::future::FutureExt;

use crate::device::{Device, DeviceError, FramebufferStatus, SamplerParams, TextureId};

use super::{DecodedImage, EntryState, ImageSource, PendingOp, ResourceCache, TextureError};

/// Texture unit that `activate` binds to and textured shaders sample from.
pub const TEXTURE_UNIT: u32 = 0;

/// Shared handle to a texture load in flight.
pub type PendingLoad = PendingOp<TextureError>;

/// One texture resident on the device.
pub struct TextureRecord {
    width: u32,
    height: u32,
    texture: TextureId,
    /// RGBA8 readback, filled by the first successful `color_data` call.
    pixels: OnceCell<Rc<[u8]>>,
}

impl TextureRecord {
    fn new(width: u32, height: u32, texture: TextureId) -> Self {
        Self {
            width,
            height,
            texture,
            pixels: OnceCell::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Device handle; valid until the last holder unloads the name.
    pub fn texture(&self) -> TextureId {
        self.texture
    }

    /// Pixels read back so far, if any.
    pub fn cached_color_data(&self) -> Option<Rc<[u8]>> {
        self.pixels.get().cloned()
    }
}

impl fmt::Debug for TextureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureRecord")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("texture", &self.texture)
            .field("pixels_read", &self.pixels.get().is_some())
            .finish()
    }
}

struct Inner {
    device: Rc<dyn Device>,
    source: Rc<dyn ImageSource>,
    cache: ResourceCache<TextureRecord, TextureError>,
}

/// Loads, shares and releases device textures by name.
///
/// Cloning is cheap; clones share one cache. Everything runs on the thread
/// that owns the device, including the completion of loads: decoding happens
/// elsewhere, but the upload runs inside the returned future when it is
/// polled. Drive loads by awaiting them or [`wait_pending`](Self::wait_pending).
///
/// Dropping the last clone deletes every texture still loaded, whatever its
/// reference count.
#[derive(Clone)]
pub struct TextureManager {
    inner: Rc<Inner>,
}

impl TextureManager {
    pub fn new(device: Rc<dyn Device>, source: Rc<dyn ImageSource>) -> Self {
        Self {
            inner: Rc::new(Inner {
                device,
                source,
                cache: ResourceCache::new(),
            }),
        }
    }

    /// Requests `name`.
    ///
    /// If it is already pending or ready this only adds a reference and
    /// returns `None`. Otherwise decoding starts and the shared load is
    /// returned; every later request before completion attaches to it, so the
    /// image is uploaded once no matter how many callers asked.
    pub fn load(&self, name: &str) -> Option<PendingLoad> {
        let cache = &self.inner.cache;
        if cache.has(name) {
            cache.inc_ref(name);
            log::trace!("texture `{name}` requested again ({:?} refs)", cache.ref_count(name));
            return None;
        }

        cache.mark_pending(name);
        log::debug!("loading texture `{name}`");

        let decode = self.inner.source.decode(name);
        let inner = Rc::downgrade(&self.inner);
        let key = name.to_owned();
        let op = async move {
            let decoded = decode.await;
            let Some(inner) = Weak::upgrade(&inner) else {
                return Err(TextureError::Detached(key));
            };
            match decoded {
                Ok(image) => inner.finish_load(&key, &image),
                Err(source) => {
                    inner.cache.forget_pending(&key);
                    log::warn!("texture `{key}` failed to decode: {source}");
                    Err(TextureError::Decode { name: key, source })
                }
            }
        }
        .boxed_local()
        .shared();

        cache.register_pending(name, op.clone());
        Some(op)
    }

    /// The in-flight load for a pending `name`, for callers that did not start it.
    pub fn pending(&self, name: &str) -> Option<PendingLoad> {
        self.inner.cache.pending(name)
    }

    /// Drives every pending load to completion.
    ///
    /// All loads run even if some fail; the first failure is returned.
    pub async fn wait_pending(&self) -> Result<(), TextureError> {
        let ops = self.inner.cache.pending_operations();
        let mut first_err = None;
        for result in futures::future::join_all(ops).await {
            if let Err(err) = result {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Drops one reference; the last one deletes the device texture.
    ///
    /// Only valid for names this caller loaded and that finished loading.
    pub fn unload(&self, name: &str) -> Result<(), TextureError> {
        let cache = &self.inner.cache;
        let state = cache.state(name);
        if state != EntryState::Ready {
            return Err(usage_violation("unload", name, state));
        }

        if let Some(record) = cache.unload(name) {
            self.inner.device.delete_texture(record.texture());
            log::debug!("released texture `{name}` ({:?})", record.texture());
        }
        Ok(())
    }

    /// Binds `name` to [`TEXTURE_UNIT`] and re-applies the sampling policy.
    ///
    /// Sampling state is device-global and may have been changed since load.
    pub fn activate(&self, name: &str) -> Result<(), TextureError> {
        let record = self.ready(name, "activate")?;
        let device = &self.inner.device;
        device.bind_texture(TEXTURE_UNIT, Some(record.texture()));
        device.set_sampler_params(record.texture(), SamplerParams::TEXTURE_DEFAULT);
        Ok(())
    }

    /// Unbinds [`TEXTURE_UNIT`].
    pub fn deactivate(&self) {
        self.inner.device.bind_texture(TEXTURE_UNIT, None);
    }

    /// CPU copy of the texture as `width * height * 4` RGBA8 bytes.
    ///
    /// The first call reads the texture back through a transient offscreen
    /// target; later calls return the same buffer. A failed readback memoizes
    /// nothing, so the call may be repeated.
    pub fn color_data(&self, name: &str) -> Result<Rc<[u8]>, TextureError> {
        let record = self.ready(name, "color_data")?;
        if let Some(pixels) = record.pixels.get() {
            return Ok(Rc::clone(pixels));
        }

        let pixels: Rc<[u8]> = self.read_back(name, &record)?.into();
        let _ = record.pixels.set(Rc::clone(&pixels));
        Ok(pixels)
    }

    pub fn has(&self, name: &str) -> bool {
        self.inner.cache.has(name)
    }

    pub fn state(&self, name: &str) -> EntryState {
        self.inner.cache.state(name)
    }

    /// The loaded record, or `None` while absent or pending.
    pub fn get(&self, name: &str) -> Option<Rc<TextureRecord>> {
        self.inner.cache.get(name)
    }

    pub fn ref_count(&self, name: &str) -> Option<u32> {
        self.inner.cache.ref_count(name)
    }

    fn ready(&self, name: &str, op: &'static str) -> Result<Rc<TextureRecord>, TextureError> {
        self.inner
            .cache
            .get(name)
            .ok_or_else(|| usage_violation(op, name, self.inner.cache.state(name)))
    }

    fn read_back(&self, name: &str, record: &TextureRecord) -> Result<Vec<u8>, TextureError> {
        let device = &self.inner.device;
        let readback_err = |reason: String| {
            log::warn!("pixel readback of `{name}` failed: {reason}");
            TextureError::Readback {
                name: name.to_owned(),
                reason,
            }
        };

        let framebuffer = device
            .create_framebuffer(record.texture())
            .map_err(|e| readback_err(e.to_string()))?;

        let result = match device.framebuffer_status(framebuffer) {
            FramebufferStatus::Complete => device
                .read_pixels(framebuffer, record.width(), record.height())
                .map_err(|e| readback_err(e.to_string())),
            status => Err(readback_err(format!("offscreen target is {status:?}"))),
        };
        device.delete_framebuffer(framebuffer);

        let pixels = result?;
        let expected = record.width() as usize * record.height() as usize * 4;
        if pixels.len() != expected {
            return Err(readback_err(format!(
                "read {} bytes, expected {expected}",
                pixels.len()
            )));
        }
        Ok(pixels)
    }
}

impl Inner {
    /// Uploads a decoded image and turns `name` ready. Runs once per pending load.
    fn finish_load(&self, name: &str, image: &DecodedImage) -> Result<(), TextureError> {
        match self.upload(image) {
            Ok(texture) => {
                self.cache
                    .set(name, TextureRecord::new(image.width(), image.height(), texture));
                log::debug!(
                    "texture `{name}` ready: {}x{} as {texture:?}",
                    image.width(),
                    image.height()
                );
                Ok(())
            }
            Err(source) => {
                self.cache.forget_pending(name);
                log::warn!("texture `{name}` upload failed: {source}");
                Err(TextureError::Device {
                    name: name.to_owned(),
                    source,
                })
            }
        }
    }

    fn upload(&self, image: &DecodedImage) -> Result<TextureId, DeviceError> {
        let device = &self.device;
        let texture = device.create_texture(image.width(), image.height())?;

        let configured = device.upload_rgba8(texture, image.pixels()).and_then(|()| {
            device.set_sampler_params(texture, SamplerParams::TEXTURE_DEFAULT);
            device.generate_mipmaps(texture)
        });
        if let Err(err) = configured {
            device.delete_texture(texture);
            return Err(err);
        }
        Ok(texture)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        for (name, record) in self.cache.drain() {
            self.device.delete_texture(record.texture());
            log::debug!("released texture `{name}` ({:?}) with its manager", record.texture());
        }
    }
}

fn usage_violation(op: &'static str, name: &str, state: EntryState) -> TextureError {
    log::error!("`{op}` called on texture `{name}` while it is {state}");
    TextureError::UsageViolation {
        op,
        name: name.to_owned(),
        state,
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    use futures::channel::oneshot;
    use futures::future::{self, FutureExt};

    use super::*;
    use crate::device::recording::{Call, RecordingDevice};
    use crate::resources::{DecodeError, DecodeFuture, MemoryImageSource};

    /// Memory source that counts decode requests.
    #[derive(Default)]
    struct CountingSource {
        images: MemoryImageSource,
        decodes: Cell<usize>,
    }

    impl ImageSource for CountingSource {
        fn decode(&self, name: &str) -> DecodeFuture {
            self.decodes.set(self.decodes.get() + 1);
            self.images.decode(name)
        }
    }

    /// Source whose decodes finish only when the test says so.
    #[derive(Default)]
    struct GatedSource {
        gates: RefCell<HashMap<String, oneshot::Sender<Result<DecodedImage, DecodeError>>>>,
    }

    impl GatedSource {
        fn open(&self, name: &str, result: Result<DecodedImage, DecodeError>) {
            let sender = self.gates.borrow_mut().remove(name).expect("no decode in flight");
            sender.send(result).unwrap();
        }
    }

    impl ImageSource for GatedSource {
        fn decode(&self, name: &str) -> DecodeFuture {
            let (sender, receiver) = oneshot::channel();
            self.gates.borrow_mut().insert(name.to_owned(), sender);
            let name = name.to_owned();
            async move { receiver.await.unwrap_or(Err(DecodeError::Cancelled(name))) }.boxed_local()
        }
    }

    fn setup() -> (Rc<RecordingDevice>, Rc<CountingSource>, TextureManager) {
        let device = Rc::new(RecordingDevice::new());
        let source = Rc::new(CountingSource::default());
        source.images.insert("a.png", DecodedImage::solid(4, 2, [255, 0, 0, 255]));
        source.images.insert("b.png", DecodedImage::solid(1, 1, [0, 0, 255, 255]));
        let textures = TextureManager::new(device.clone(), source.clone());
        (device, source, textures)
    }

    fn load_ready(textures: &TextureManager, name: &str) {
        let op = textures.load(name).expect("first load returns the pending op");
        pollster::block_on(op).unwrap();
    }

    fn uploads(device: &RecordingDevice) -> usize {
        device.count(|c| matches!(c, Call::UploadRgba8 { .. }))
    }

    fn deletes(device: &RecordingDevice) -> usize {
        device.count(|c| matches!(c, Call::DeleteTexture(_)))
    }

    // ── load ──────────────────────────────────────────────────────────────

    #[test]
    fn load_twice_returns_op_then_nothing() {
        let (device, _, textures) = setup();

        let op = textures.load("a.png");
        assert!(op.is_some());
        assert!(textures.load("a.png").is_none());
        assert_eq!(textures.state("a.png"), EntryState::Pending);

        pollster::block_on(op.unwrap()).unwrap();
        assert_eq!(textures.state("a.png"), EntryState::Ready);
        assert_eq!(textures.ref_count("a.png"), Some(2));
        assert_eq!(uploads(&device), 1);
    }

    #[test]
    fn concurrent_loads_decode_and_upload_once() {
        let (device, source, textures) = setup();
        let k = 5;

        let first = textures.load("a.png").unwrap();
        for _ in 1..k {
            assert!(textures.load("a.png").is_none());
        }
        // Extra waiters attach to the same operation.
        let attached = textures.pending("a.png").unwrap();
        let (a, b) = pollster::block_on(future::join(first, attached));
        a.unwrap();
        b.unwrap();

        assert_eq!(source.decodes.get(), 1);
        assert_eq!(device.count(|c| matches!(c, Call::CreateTexture { .. })), 1);
        assert_eq!(uploads(&device), 1);
        assert_eq!(textures.ref_count("a.png"), Some(k));
    }

    #[test]
    fn upload_waits_for_decode_to_finish() {
        let device = Rc::new(RecordingDevice::new());
        let source = Rc::new(GatedSource::default());
        let textures = TextureManager::new(device.clone(), source.clone());

        let op = textures.load("a.png").unwrap();
        assert!(textures.load("a.png").is_none());
        assert!(op.clone().now_or_never().is_none());
        assert_eq!(uploads(&device), 0);
        assert!(textures.get("a.png").is_none());

        source.open("a.png", Ok(DecodedImage::solid(2, 2, [1, 2, 3, 4])));
        pollster::block_on(op).unwrap();

        assert_eq!(uploads(&device), 1);
        assert_eq!(textures.ref_count("a.png"), Some(2));
        let record = textures.get("a.png").unwrap();
        assert_eq!((record.width(), record.height()), (2, 2));
    }

    #[test]
    fn upload_applies_fixed_sampling_and_mipmaps() {
        let (device, _, textures) = setup();
        load_ready(&textures, "a.png");
        let texture = textures.get("a.png").unwrap().texture();

        assert_eq!(
            device.calls(),
            vec![
                Call::CreateTexture { texture, width: 4, height: 2 },
                Call::UploadRgba8 { texture, bytes: 32 },
                Call::SetSamplerParams { texture, params: SamplerParams::TEXTURE_DEFAULT },
                Call::GenerateMipmaps(texture),
            ]
        );
    }

    #[test]
    fn load_after_ready_only_adds_reference() {
        let (device, source, textures) = setup();
        load_ready(&textures, "a.png");

        assert!(textures.load("a.png").is_none());
        assert_eq!(textures.ref_count("a.png"), Some(2));
        assert_eq!(source.decodes.get(), 1);
        assert_eq!(uploads(&device), 1);
    }

    #[test]
    fn wait_pending_drives_every_load() {
        let (device, _, textures) = setup();
        let _ = textures.load("a.png");
        let _ = textures.load("b.png");

        pollster::block_on(textures.wait_pending()).unwrap();
        assert_eq!(textures.state("a.png"), EntryState::Ready);
        assert_eq!(textures.state("b.png"), EntryState::Ready);
        assert_eq!(uploads(&device), 2);
    }

    // ── failure paths ─────────────────────────────────────────────────────

    #[test]
    fn decode_failure_returns_name_to_absent() {
        let (device, source, textures) = setup();

        let op = textures.load("missing.png").unwrap();
        let err = pollster::block_on(op).unwrap_err();
        assert!(matches!(
            err,
            TextureError::Decode { source: DecodeError::NotFound(_), .. }
        ));
        assert_eq!(textures.state("missing.png"), EntryState::Absent);
        assert_eq!(uploads(&device), 0);

        // A fresh load retries.
        source.images.insert("missing.png", DecodedImage::solid(1, 1, [0; 4]));
        load_ready(&textures, "missing.png");
        assert_eq!(textures.ref_count("missing.png"), Some(1));
        assert_eq!(source.decodes.get(), 2);
    }

    #[test]
    fn attached_waiters_share_the_failure() {
        let device = Rc::new(RecordingDevice::new());
        let source = Rc::new(GatedSource::default());
        let textures = TextureManager::new(device.clone(), source.clone());

        let op = textures.load("a.png").unwrap();
        let _ = textures.load("a.png");
        let attached = textures.pending("a.png").unwrap();

        source.open("a.png", Err(DecodeError::Format { name: "a.png".into(), message: "bad".into() }));
        let (a, b) = pollster::block_on(future::join(op, attached));
        assert_eq!(a, b);
        assert!(a.is_err());
        assert_eq!(textures.state("a.png"), EntryState::Absent);
    }

    #[test]
    fn device_failure_returns_name_to_absent() {
        let (device, _, textures) = setup();
        device.fail_texture_creation.set(true);

        let err = pollster::block_on(textures.load("a.png").unwrap()).unwrap_err();
        assert!(matches!(err, TextureError::Device { .. }));
        assert_eq!(textures.state("a.png"), EntryState::Absent);
    }

    #[test]
    fn dropped_manager_detaches_load() {
        let (_, _, textures) = setup();
        let op = textures.load("a.png").unwrap();
        drop(textures);
        assert_eq!(
            pollster::block_on(op),
            Err(TextureError::Detached("a.png".into()))
        );
    }

    // ── unload ────────────────────────────────────────────────────────────

    #[test]
    fn unload_releases_on_last_reference() {
        let (device, _, textures) = setup();
        let op = textures.load("a.png").unwrap();
        let _ = textures.load("a.png");
        let _ = textures.load("a.png");
        pollster::block_on(op).unwrap();
        let texture = textures.get("a.png").unwrap().texture();

        textures.unload("a.png").unwrap();
        textures.unload("a.png").unwrap();
        assert_eq!(deletes(&device), 0);
        assert!(device.live_textures().contains(&texture));

        textures.unload("a.png").unwrap();
        assert_eq!(deletes(&device), 1);
        assert!(!device.live_textures().contains(&texture));
        assert_eq!(textures.state("a.png"), EntryState::Absent);
    }

    #[test]
    fn unload_absent_or_pending_is_usage_violation() {
        let (device, _, textures) = setup();

        let err = textures.unload("never.png").unwrap_err();
        assert!(matches!(
            err,
            TextureError::UsageViolation { op: "unload", state: EntryState::Absent, .. }
        ));

        let op = textures.load("a.png").unwrap();
        let err = textures.unload("a.png").unwrap_err();
        assert!(matches!(
            err,
            TextureError::UsageViolation { state: EntryState::Pending, .. }
        ));
        assert_eq!(textures.ref_count("a.png"), Some(1));

        pollster::block_on(op).unwrap();
        assert_eq!(deletes(&device), 0);
    }

    #[test]
    fn dropping_manager_releases_loaded_textures() {
        let (device, _, textures) = setup();
        let _ = textures.load("a.png");
        let _ = textures.load("a.png");
        let _ = textures.load("b.png");
        pollster::block_on(textures.wait_pending()).unwrap();
        let a = textures.get("a.png").unwrap().texture();
        let b = textures.get("b.png").unwrap().texture();

        let clone = textures.clone();
        drop(textures);
        assert_eq!(deletes(&device), 0);

        drop(clone);
        assert_eq!(deletes(&device), 2);
        assert!(device.calls().contains(&Call::DeleteTexture(a)));
        assert!(device.calls().contains(&Call::DeleteTexture(b)));
        assert!(device.live_textures().is_empty());
    }

    #[test]
    fn dropping_manager_skips_unfinished_loads() {
        let (device, _, textures) = setup();
        let _op = textures.load("a.png");
        drop(textures);
        assert_eq!(deletes(&device), 0);
        assert_eq!(device.count(|c| matches!(c, Call::CreateTexture { .. })), 0);
    }

    // ── activate ──────────────────────────────────────────────────────────

    #[test]
    fn activate_missing_is_usage_violation() {
        let (device, _, textures) = setup();
        let err = textures.activate("missing").unwrap_err();
        assert_eq!(
            err,
            TextureError::UsageViolation {
                op: "activate",
                name: "missing".into(),
                state: EntryState::Absent,
            }
        );
        assert!(device.calls().is_empty());
    }

    #[test]
    fn activate_pending_is_usage_violation() {
        let (_, _, textures) = setup();
        let _op = textures.load("a.png");
        assert!(matches!(
            textures.activate("a.png"),
            Err(TextureError::UsageViolation { state: EntryState::Pending, .. })
        ));
    }

    #[test]
    fn activate_binds_unit_zero_and_reapplies_sampling() {
        let (device, _, textures) = setup();
        load_ready(&textures, "a.png");
        let texture = textures.get("a.png").unwrap().texture();
        device.clear_calls();

        textures.activate("a.png").unwrap();
        assert_eq!(
            device.calls(),
            vec![
                Call::BindTexture { unit: TEXTURE_UNIT, texture: Some(texture) },
                Call::SetSamplerParams { texture, params: SamplerParams::TEXTURE_DEFAULT },
            ]
        );
        assert_eq!(device.bound(TEXTURE_UNIT), Some(texture));

        textures.deactivate();
        assert_eq!(device.bound(TEXTURE_UNIT), None);
    }

    // ── color_data ────────────────────────────────────────────────────────

    #[test]
    fn color_data_is_read_back_once() {
        let (device, _, textures) = setup();
        load_ready(&textures, "a.png");
        let texture = textures.get("a.png").unwrap().texture();

        let first = textures.color_data("a.png").unwrap();
        let second = textures.color_data("a.png").unwrap();
        let third = textures.color_data("a.png").unwrap();

        assert_eq!(first.len(), 4 * 2 * 4);
        assert_eq!(first, second);
        assert!(Rc::ptr_eq(&second, &third));
        assert_eq!(&first[..4], &RecordingDevice::texel(texture, 0));
        assert_eq!(device.count(|c| matches!(c, Call::ReadPixels { .. })), 1);
    }

    #[test]
    fn readback_releases_offscreen_target() {
        let (device, _, textures) = setup();
        load_ready(&textures, "a.png");
        textures.color_data("a.png").unwrap();

        assert_eq!(device.count(|c| matches!(c, Call::CreateFramebuffer { .. })), 1);
        assert_eq!(device.count(|c| matches!(c, Call::DeleteFramebuffer(_))), 1);
    }

    #[test]
    fn incomplete_target_fails_without_memoizing() {
        let (device, _, textures) = setup();
        load_ready(&textures, "a.png");
        device.incomplete_framebuffers.set(true);

        let err = textures.color_data("a.png").unwrap_err();
        assert!(matches!(err, TextureError::Readback { .. }));
        assert!(textures.get("a.png").unwrap().cached_color_data().is_none());
        assert_eq!(device.count(|c| matches!(c, Call::DeleteFramebuffer(_))), 1);

        device.incomplete_framebuffers.set(false);
        assert!(textures.color_data("a.png").is_ok());
        assert!(textures.get("a.png").unwrap().cached_color_data().is_some());
    }

    #[test]
    fn color_data_of_absent_name_is_usage_violation() {
        let (_, _, textures) = setup();
        assert!(matches!(
            textures.color_data("nope"),
            Err(TextureError::UsageViolation { op: "color_data", .. })
        ));
    }
}
