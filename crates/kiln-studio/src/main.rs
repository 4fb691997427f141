//! Headless kiln demo.
//!
//! Loads a texture (a PNG from disk, or a generated checkerboard), draws it
//! next to a flat-colored quad into an offscreen target and writes the frame
//! to a PNG.
//!
//! Usage: `kiln-studio [IMAGE] [OUTPUT]`. `IMAGE` is resolved against
//! `KILN_ASSETS` (default: current directory).

use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{anyhow, Context, Result};
use glam::Vec2;

use kiln_engine::camera::Camera;
use kiln_engine::coords::ColorRgba;
use kiln_engine::device::{Device, FramebufferStatus, Gpu, GpuInit, TextureId, WgpuDevice};
use kiln_engine::logging::{init_logging, LoggingConfig};
use kiln_engine::renderables::{Renderable, TextureRenderable};
use kiln_engine::resources::{
    DecodedImage, FsImageSource, ImageSource, MemoryImageSource, TextureManager,
};
use kiln_engine::shaders::ShaderLibrary;

const FRAME_WIDTH: u32 = 512;
const FRAME_HEIGHT: u32 = 256;
const GENERATED_TEXTURE: &str = "checker";

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());
    pollster::block_on(run())
}

async fn run() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let image = args.next();
    let output = PathBuf::from(args.next().unwrap_or_else(|| "kiln-frame.png".to_owned()));

    let gpu = Gpu::new_headless(GpuInit::default()).await?;
    let adapter = gpu.adapter_info();
    log::info!("rendering offscreen on {} ({:?})", adapter.name, adapter.backend);
    let wgpu_device = Rc::new(WgpuDevice::new(&gpu));
    let device: Rc<dyn Device> = wgpu_device.clone();

    let (source, texture_name): (Rc<dyn ImageSource>, String) = match image {
        Some(name) => {
            let root = std::env::var_os("KILN_ASSETS")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            let source = FsImageSource::new(root).context("failed to start image decoders")?;
            (Rc::new(source), name)
        }
        None => {
            let memory = MemoryImageSource::new();
            memory.insert(
                GENERATED_TEXTURE,
                DecodedImage::checkerboard(64, 64, 8, [230, 120, 40, 255], [30, 30, 40, 255]),
            );
            (Rc::new(memory), GENERATED_TEXTURE.to_owned())
        }
    };

    let library = ShaderLibrary::new(device.clone()).context("failed to build shaders")?;
    let textures = TextureManager::new(device.clone(), source);

    if let Some(load) = textures.load(&texture_name) {
        load.await
            .with_context(|| format!("failed to load texture `{texture_name}`"))?;
    }
    if let Some(record) = textures.get(&texture_name) {
        log::info!(
            "loaded `{texture_name}`: {}x{}",
            record.width(),
            record.height()
        );
    }

    let target = device
        .create_texture(FRAME_WIDTH, FRAME_HEIGHT)
        .context("failed to create frame target")?;
    wgpu_device.set_render_target(Some(target));
    wgpu_device.clear(ColorRgba::new(0.08, 0.08, 0.1, 1.0))?;

    let camera = Camera::new(Vec2::ZERO, 20.0, FRAME_WIDTH, FRAME_HEIGHT);

    let mut quad = Renderable::new(&library);
    quad.set_color(ColorRgba::new(0.2, 0.6, 0.9, 1.0));
    quad.transform_mut().set_position(-5.0, 0.0);
    quad.transform_mut().set_size(6.0, 6.0);
    quad.transform_mut().set_rotation_deg(15.0);
    quad.draw(&camera);

    let mut sprite = TextureRenderable::new(&library, textures.clone(), texture_name.clone());
    sprite.transform_mut().set_position(5.0, 0.0);
    sprite.transform_mut().set_size(7.0, 7.0);
    sprite.draw(&camera)?;

    let (width, height) = wgpu_device
        .texture_size(target)
        .context("frame target vanished")?;
    let pixels = read_frame(device.as_ref(), target, width, height)?;
    let frame = image::RgbaImage::from_raw(width, height, pixels)
        .context("frame readback has the wrong size")?;
    frame
        .save(&output)
        .with_context(|| format!("failed to write {}", output.display()))?;
    log::info!("wrote {}", output.display());

    let texels = textures.color_data(&texture_name)?;
    log::info!("`{texture_name}` holds {} bytes of RGBA8", texels.len());

    wgpu_device.set_render_target(None);
    device.delete_texture(target);
    textures.unload(&texture_name)?;
    Ok(())
}

fn read_frame(device: &dyn Device, target: TextureId, width: u32, height: u32) -> Result<Vec<u8>> {
    let framebuffer = device.create_framebuffer(target)?;
    let status = device.framebuffer_status(framebuffer);
    let pixels = match status {
        FramebufferStatus::Complete => device
            .read_pixels(framebuffer, width, height)
            .map_err(anyhow::Error::from),
        _ => Err(anyhow!("frame target is {status:?}")),
    };
    device.delete_framebuffer(framebuffer);
    pixels
}
