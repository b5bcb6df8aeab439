use std::sync::Arc;

use anyhow::Context as _;
use winit::window::Window;

use crate::{
    camera::{Camera, CameraController, Projection},
    data_structures::scene::Scene,
    renderer::{DeferredRenderer, FrameCamera},
    resources::AssetManager,
    settings::RenderSettings,
    sprite_batch::SpriteBatch,
};

/// Window, GPU and renderer state shared by every flow.
///
/// Flows read it in their hooks and change it through `Out::Configure`.
#[derive(Debug)]
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub camera: Camera,
    pub projection: Projection,
    pub controller: CameraController,
    pub settings: RenderSettings,
    pub assets: AssetManager,
    /// Screen-space sprites drawn on top of the frame, in pixels with the origin bottom left.
    pub gui: SpriteBatch,
    pub(crate) renderer: DeferredRenderer,
}

impl Context {
    pub async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let size = window.inner_size();

        // BackendBit::PRIMARY => Vulkan + Metal + DX12 + Browser WebGPU
        log::debug!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("cannot create a surface for the window")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no suitable GPU adapter")?;
        log::info!("using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
                ..Default::default()
            })
            .await
            .context("cannot open the GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        // The composite pass applies gamma itself, so a linear surface keeps it from being applied twice.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("surface reports no formats")?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        // right/left, height, forward/backward - y axis rotation (turn head left/right) - x axis rotation (head up/down)
        let camera = Camera::new((0.0, 5.0, 10.0), cgmath::Deg(-90.0), cgmath::Deg(-20.0));
        let projection = Projection::new(config.width, config.height, cgmath::Deg(45.0), 0.1, 500.0);
        let controller = CameraController::new(10.0, 0.4);

        let assets = AssetManager::new(&device, &queue);
        let gui = SpriteBatch::new(&device, "gui");
        let renderer = DeferredRenderer::new(&device, surface_format, (config.width, config.height));

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            camera,
            projection,
            controller,
            settings: RenderSettings::default(),
            assets,
            gui,
            renderer,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn viewport(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn renderer(&self) -> &DeferredRenderer {
        &self.renderer
    }

    /// Reconfigure the surface and reallocate every render target. Zero sizes are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.projection.resize(width, height);
        self.renderer.resize(&self.device, width, height);
        log::debug!("resized to {width}x{height}");
    }

    /// Render `scene` and present it.
    ///
    /// Surface errors are returned for the caller to reconfigure; a failing frame
    /// is logged and dropped without presenting.
    pub fn render(&mut self, scene: &Scene) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let camera = FrameCamera::new(&self.camera, &self.projection);

        match self.renderer.render(
            &self.device,
            &self.queue,
            &view,
            scene,
            &self.assets,
            &camera,
            &self.settings,
            &self.gui,
        ) {
            Ok(()) => output.present(),
            Err(e) => log::error!("frame dropped: {e:#}"),
        }
        Ok(())
    }
}

/// The part of the [`Context`] flow constructors get: enough to create GPU resources.
#[derive(Debug, Clone)]
pub struct InitContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl From<&Context> for InitContext {
    fn from(ctx: &Context) -> Self {
        // wgpu handles are reference counted, this only clones the handles
        Self {
            device: ctx.device.clone(),
            queue: ctx.queue.clone(),
        }
    }
}
