#![allow(dead_code)]

use anyhow::Context as _;
use enjon::{
    DeferredRenderer, FrameCamera, RenderSettings, Scene,
    camera::{Camera, Projection},
    resources::AssetManager,
    sprite_batch::{GlyphSortType, SpriteBatch},
    targets::{RenderTarget, TargetSize, TargetStack},
};

pub const VIEWPORT: (u32, u32) = (64, 64);
pub const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Device and queue without a window or surface.
pub async fn headless() -> anyhow::Result<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        ..Default::default()
    });
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .context("no adapter for headless tests")?;
    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("test device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: Default::default(),
            trace: wgpu::Trace::Off,
            ..Default::default()
        })
        .await?;
    Ok((device, queue))
}

/// Everything needed to render frames offscreen and read the presented image back.
pub struct Harness {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub renderer: DeferredRenderer,
    pub assets: AssetManager,
    pub scene: Scene,
    pub settings: RenderSettings,
    pub camera: FrameCamera,
    pub gui: SpriteBatch,
    pub output: RenderTarget,
}

impl Harness {
    pub async fn new() -> anyhow::Result<Self> {
        let (device, queue) = headless().await?;
        let renderer = DeferredRenderer::new(&device, OUTPUT_FORMAT, VIEWPORT);
        let assets = AssetManager::new(&device, &queue);
        let gui = SpriteBatch::new(&device, "test gui");
        let output = RenderTarget::new(&device, "test output", TargetSize::FULL, OUTPUT_FORMAT, VIEWPORT);
        // looking down -z from three units away
        let camera = Camera::new((0.0, 0.0, 3.0), cgmath::Deg(-90.0), cgmath::Deg(0.0));
        let projection = Projection::new(VIEWPORT.0, VIEWPORT.1, cgmath::Deg(45.0), 0.1, 100.0);
        Ok(Self {
            camera: FrameCamera::new(&camera, &projection),
            device,
            queue,
            renderer,
            assets,
            scene: Scene::new(),
            settings: RenderSettings::default(),
            gui,
            output,
        })
    }

    pub fn render(&mut self) -> anyhow::Result<()> {
        self.gui.begin(GlyphSortType::Texture);
        self.gui.end(&self.device, &self.queue);
        self.renderer.render(
            &self.device,
            &self.queue,
            &self.output.texture().view,
            &self.scene,
            &self.assets,
            &self.camera,
            &self.settings,
            &self.gui,
        )
    }

    /// RGBA8 pixels of what the present pass drew.
    pub fn presented(&self) -> anyhow::Result<Vec<[u8; 4]>> {
        let bytes = self
            .output
            .read_pixels(&self.device, &self.queue, &mut TargetStack::new())?;
        Ok(pixels(&bytes))
    }
}

pub fn pixels(bytes: &[u8]) -> Vec<[u8; 4]> {
    bytes
        .chunks_exact(4)
        .map(|p| [p[0], p[1], p[2], p[3]])
        .collect()
}

pub fn pixel_at(pixels: &[[u8; 4]], width: u32, x: u32, y: u32) -> [u8; 4] {
    pixels[(y * width + x) as usize]
}
