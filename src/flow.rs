//! Flow control and application event loop.
//!
//! A "flow" is a self-contained part of an application: it fills the shared
//! [`Scene`], reacts to input and draws GUI sprites. The engine owns the window,
//! the [`Context`] and the scene and drives all flows from the winit loop.
//!
//! # User-facing types
//!
//! - [`GraphicsFlow<S>`] is the trait for scenes/states that handle events and update the scene
//! - [`Out<S>`] is the output type for async state mutations and context configuration
//!
//! # Lifecycle Flow
//!
//! The event loop follows this pattern each frame:
//! 1. Call `on_window_events` / `on_device_events` on all flows for event distribution
//! 2. Update flow state and the scene (via `on_update`), then move the camera
//! 3. Collect GUI sprites (via `on_gui`)
//! 4. Render the scene through the deferred pipeline
//! 5. Present frame

use std::{fmt::Debug, pin::Pin, sync::Arc};

use instant::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    event::{DeviceEvent, DeviceId, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    window::Window,
};

use crate::{
    context::{Context, InitContext},
    cvars,
    data_structures::scene::Scene,
    resources::AssetManager,
    sprite_batch::{GlyphSortType, SpriteBatch},
};

///
/// This is the Output Type for every lifecycle hook.
///
/// `Out::FutFn` resolves futures producing state mutations; the mutation is applied
/// before the next hook runs.
///
/// `Out::Configure` modifies the Context, for instance the render settings, the
/// camera or the registered assets.
///
/// `Empty` is the default output used when nothing needs to be handled.
///
pub enum Out<S> {
    FutFn(Vec<Box<dyn Future<Output = Box<dyn FnOnce(&mut S)>>>>),
    Configure(Box<dyn FnOnce(&mut Context)>),
    Empty,
}

impl<S> Default for Out<S> {
    fn default() -> Self {
        Self::Empty
    }
}

/// Trait for implementing a scene or game state.
///
/// # Lifecycle
///
/// 1. `on_init()` is called once when the flow is created; register assets and fill the scene
/// 2. `on_window_events()` and `on_device_events()` are called for each winit input event
/// 3. `on_update()` is called every frame before rendering
/// 4. `on_gui()` is called every frame after the update to add screen-space sprites
///
pub trait GraphicsFlow<S> {
    /// Initialize the flow.
    fn on_init(&mut self, ctx: &mut Context, state: &mut S, scene: &mut Scene) -> Out<S>;

    /// Update state and scene every frame with the elapsed time `dt`.
    fn on_update(&mut self, ctx: &Context, state: &mut S, scene: &mut Scene, dt: Duration)
    -> Out<S>;

    /// Handle raw device events (keyboard, mouse hardware input).
    fn on_device_events(&mut self, _ctx: &Context, _state: &mut S, _event: &DeviceEvent) -> Out<S> {
        Out::Empty
    }

    /// Handle window events (keyboard, mouse, window resizing, etc.).
    fn on_window_events(&mut self, _ctx: &Context, _state: &mut S, _event: &WindowEvent) -> Out<S> {
        Out::Empty
    }

    /// Add GUI sprites for this frame. Coordinates are pixels, origin bottom left.
    fn on_gui(&mut self, _assets: &AssetManager, _state: &S, _gui: &mut SpriteBatch) {}
}

impl<State> Debug for dyn GraphicsFlow<State> + 'static {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("GraphicsFlow")
    }
}

/// Type alias for a flow constructor (factory function).
///
/// A flow constructor takes an `InitContext` and asynchronously returns a
/// boxed `GraphicsFlow`. This allows lazy initialization and resource loading.
pub type FlowConstructor<S> =
    Box<dyn FnOnce(InitContext) -> Pin<Box<dyn Future<Output = Box<dyn GraphicsFlow<S>>>>>>;

/// Application state bundle: GPU context, app state, scene and surface status.
#[derive(Debug)]
pub struct AppState<State: 'static> {
    pub(crate) ctx: Context,
    state: State,
    scene: Scene,
    is_surface_configured: bool,
    /// Right mouse button held: mouse motion turns the camera.
    looking: bool,
}

impl<State: 'static + Default> AppState<State> {
    async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let mut ctx = Context::new(window).await?;
        if let Ok(path) = std::env::var(cvars::SCRIPT_ENV) {
            match cvars::apply_file(&mut ctx.settings, &path) {
                Ok(n) => log::info!("applied {n} console variables from {path}"),
                Err(e) => log::warn!("ignoring {path}: {e:#}"),
            }
        }
        Ok(Self {
            ctx,
            state: State::default(),
            scene: Scene::new(),
            is_surface_configured: false,
            looking: false,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.ctx.resize(width, height);
            self.is_surface_configured = true;
        }
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        // invoke main render loop
        self.ctx.window.request_redraw();

        // Rendering requires the surface to be configured
        if !self.is_surface_configured {
            return Ok(());
        }
        self.ctx.render(&self.scene)
    }
}

pub struct App<State: 'static> {
    async_runtime: tokio::runtime::Runtime,
    state: Option<AppState<State>>,
    // This will hold the fully initialized flows once they are ready.
    graphics_flows: Vec<Box<dyn GraphicsFlow<State>>>,
    // This holds the constructors at the start.
    // We use Option to `take()` it after use.
    constructors: Option<Vec<FlowConstructor<State>>>,
    last_time: Instant,
}

impl<State: 'static> App<State> {
    fn new(constructors: Vec<FlowConstructor<State>>) -> anyhow::Result<Self> {
        Ok(Self {
            async_runtime: tokio::runtime::Runtime::new()?,
            state: None,
            graphics_flows: Vec::new(),
            constructors: Some(constructors),
            last_time: Instant::now(),
        })
    }
}

impl<State: 'static + Default> ApplicationHandler for App<State> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(constructors) = self.constructors.take() else {
            // resumed again after a suspend, everything already exists
            return;
        };
        let window_attributes = Window::default_attributes().with_title("Enjon");
        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("cannot create the window: {e}");
                event_loop.exit();
                return;
            }
        };

        let init_future = async move {
            let app_state = AppState::<State>::new(window).await?;
            let flow_futures: Vec<_> = constructors
                .into_iter()
                // The clone in into() leverages the internal Arcs of Device and Queue and thus only clones the ref
                .map(|constructor| constructor((&app_state.ctx).into()))
                .collect();
            let flows: Vec<_> = futures::future::join_all(flow_futures).await;
            anyhow::Ok((app_state, flows))
        };

        let (mut app_state, flows) = match self.async_runtime.block_on(init_future) {
            Ok(initialized) => initialized,
            Err(e) => {
                log::error!("App initialization failed. Cannot create the main context: {e:#}");
                event_loop.exit();
                return;
            }
        };
        self.graphics_flows = flows;
        for flow in self.graphics_flows.iter_mut() {
            let out = flow.on_init(&mut app_state.ctx, &mut app_state.state, &mut app_state.scene);
            handle_flow_output(&self.async_runtime, &mut app_state.state, &mut app_state.ctx, out);
        }
        let size = app_state.ctx.window.inner_size();
        app_state.resize(size.width, size.height);
        self.state = Some(app_state);
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        let state = match &mut self.state {
            Some(state) => state,
            None => return,
        };
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            if state.looking {
                state.ctx.controller.handle_mouse(dx, dy);
            }
        }
        for flow in self.graphics_flows.iter_mut() {
            let out = flow.on_device_events(&state.ctx, &mut state.state, &event);
            handle_flow_output(&self.async_runtime, &mut state.state, &mut state.ctx, out);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let state = match &mut self.state {
            Some(state) => state,
            None => return,
        };

        // general stuff
        state.ctx.controller.handle_window_events(&event);

        for flow in self.graphics_flows.iter_mut() {
            let out = flow.on_window_events(&state.ctx, &mut state.state, &event);
            handle_flow_output(&self.async_runtime, &mut state.state, &mut state.ctx, out);
        }

        match event {
            WindowEvent::CloseRequested => {
                log::info!("close requested");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => state.resize(size.width, size.height),
            WindowEvent::MouseInput {
                state: button_state,
                button: MouseButton::Right,
                ..
            } => state.looking = button_state.is_pressed(),
            WindowEvent::RedrawRequested => {
                let dt = self.last_time.elapsed();
                self.last_time = Instant::now();

                for flow in self.graphics_flows.iter_mut() {
                    let out = flow.on_update(&state.ctx, &mut state.state, &mut state.scene, dt);
                    handle_flow_output(&self.async_runtime, &mut state.state, &mut state.ctx, out);
                }
                // Update the camera
                state.ctx.controller.update(&mut state.ctx.camera, dt);

                let ctx = &mut state.ctx;
                ctx.gui.begin(GlyphSortType::Texture);
                for flow in self.graphics_flows.iter_mut() {
                    flow.on_gui(&ctx.assets, &state.state, &mut ctx.gui);
                }
                ctx.gui.end(&ctx.device, &ctx.queue);

                match state.render() {
                    Ok(()) => (),
                    // Reconfigure the surface if it's lost or outdated
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = state.ctx.window.inner_size();
                        state.resize(size.width, size.height);
                    }
                    Err(e) => log::warn!("Unable to render {e}"),
                }
            }
            _ => {}
        }
    }
}

fn handle_flow_output<State>(
    async_runtime: &tokio::runtime::Runtime,
    state: &mut State,
    ctx: &mut Context,
    out: Out<State>,
) {
    match out {
        // Mutate the state once every future resolved
        Out::FutFn(futures) => {
            let mutations: Vec<Pin<Box<dyn Future<Output = Box<dyn FnOnce(&mut State)>>>>> =
                futures.into_iter().map(Pin::from).collect();
            let resolved = async_runtime.block_on(futures::future::join_all(mutations));
            resolved.into_iter().for_each(|mutation| mutation(state));
        }
        Out::Configure(f) => f(ctx),
        Out::Empty => (),
    }
}

/// Open the window and run `constructors`' flows until the window is closed.
///
/// Logging goes through `env_logger` (configure with `RUST_LOG`). When
/// `ENJON_CVARS` names a file, its console variables are applied once the
/// context exists.
pub fn run<State: 'static + Default>(constructors: Vec<FlowConstructor<State>>) -> anyhow::Result<()> {
    if let Err(e) = env_logger::try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    };

    let event_loop = EventLoop::new()?;
    let mut app: App<State> = App::new(constructors)?;

    event_loop.run_app(&mut app)?;

    Ok(())
}
