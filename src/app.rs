//! The viewer application.
//!
//! [`Session`] holds everything that survives between frames apart from the
//! GPU: the current selection, the model cache and the rotation controller.
//! [`App`] drives it from the winit event loop. Natively startup runs on a
//! tokio runtime with `block_on` and the models load as a [`PendingLoad`]
//! polled between frames; on the web both run with `spawn_local` and report
//! back through the event loop proxy.

use std::{
    sync::Arc,
    task::{Poll, Waker},
};

use futures::{FutureExt, future::LocalBoxFuture};

use log::{info, warn};
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::UnwrapThrowExt;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::Window,
};

use crate::{
    config::{ControllerConfig, ViewerConfig},
    context::Context,
    controller::RotationController,
    data_structures::scene_graph::DisposeReport,
    keys::{AbilityKey, ClassKey},
    manager::{LoadError, LoadProgress, ModelManager},
    render,
    resources::texture::{ModelSource, PlatformSource, default_source},
};

pub const TITLE: &str = "figurine";

/// Ambient light used by `setBackground` when the caller gives none.
pub const DEFAULT_AMBIENT_COLOUR: u32 = 0x404040;
pub const DEFAULT_AMBIENT_INTENSITY: f32 = 0.4;

/// What is shown: one class and one ability.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Selection {
    pub class: ClassKey,
    pub ability: AbilityKey,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            class: ClassKey::Mage,
            ability: AbilityKey::Ability1,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum LoadStatus {
    Loading,
    Ready,
    Failed(String),
}

pub struct Session<S: ModelSource> {
    selection: Selection,
    /// `None` while a load owns the manager.
    manager: Option<ModelManager<S>>,
    controller: RotationController,
    status: LoadStatus,
}

impl<S: ModelSource> Session<S> {
    pub fn new(manager: ModelManager<S>, tuning: ControllerConfig) -> Self {
        Self {
            selection: Selection::default(),
            manager: Some(manager),
            controller: RotationController::new(tuning),
            status: LoadStatus::Loading,
        }
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    pub fn manager(&self) -> Option<&ModelManager<S>> {
        self.manager.as_ref()
    }

    pub fn controller(&self) -> &RotationController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut RotationController {
        &mut self.controller
    }

    /// Loads every model and shows the current selection once done.
    pub async fn load(&mut self) {
        let Some(mut manager) = self.take_manager() else {
            warn!("Models are already loading.");
            return;
        };
        let result = manager.load_all().await;
        self.finish_loading(manager, result);
    }

    /// Hands the manager to a load running elsewhere. Selections made in
    /// the meantime are remembered and shown by [`Session::finish_loading`].
    pub fn take_manager(&mut self) -> Option<ModelManager<S>> {
        self.status = LoadStatus::Loading;
        self.manager.take()
    }

    pub fn finish_loading(&mut self, manager: ModelManager<S>, result: Result<(), LoadError>) {
        self.manager = Some(manager);
        match result {
            Ok(()) => {
                self.status = LoadStatus::Ready;
                self.compose();
            }
            Err(e) => self.status = LoadStatus::Failed(e.to_string()),
        }
    }

    /// Returns whether the display changed.
    pub fn select_class(&mut self, class: ClassKey) -> bool {
        self.selection.class = class;
        self.compose()
    }

    /// Returns whether the display changed.
    pub fn select_ability(&mut self, ability: AbilityKey) -> bool {
        self.selection.ability = ability;
        self.compose()
    }

    /// Shows fresh copies of the selected class and ability. Leaves the
    /// display alone if either of them is not loaded.
    fn compose(&mut self) -> bool {
        let Selection { class, ability } = self.selection;
        let Some(manager) = &self.manager else {
            warn!("Cannot show {} with {} while models are loading.", class, ability);
            return false;
        };
        let Some(character) = manager.get_class(class) else {
            warn!("Class model {} is not loaded.", class);
            return false;
        };
        let Some(stand) = manager.get_ability(ability) else {
            warn!("Ability model {} is not loaded.", ability);
            return false;
        };
        self.controller.set_displayed_models(character, stand);
        info!("Showing {} with {}.", class, ability);
        true
    }

    /// Releases all cached models.
    pub fn dispose(&mut self) -> DisposeReport {
        self.manager
            .as_mut()
            .map(|manager| manager.dispose())
            .unwrap_or_default()
    }
}

/// A model load that the event loop advances without waiting on it.
pub struct PendingLoad<S: ModelSource + 'static> {
    future: LocalBoxFuture<'static, (ModelManager<S>, Result<(), LoadError>)>,
}

impl<S: ModelSource + 'static> PendingLoad<S> {
    /// Takes the manager out of `session`. Nothing is fetched until polled.
    pub fn start(session: &mut Session<S>) -> Option<Self> {
        let mut manager = session.take_manager()?;
        let future = async move {
            let result = manager.load_all().await;
            (manager, result)
        };
        Some(Self {
            future: future.boxed_local(),
        })
    }

    /// Returns true once the load is over and `session` has its manager back.
    pub fn poll(&mut self, session: &mut Session<S>, waker: &Waker) -> bool {
        let mut cx = std::task::Context::from_waker(waker);
        match self.future.poll_unpin(&mut cx) {
            Poll::Ready((manager, result)) => {
                session.finish_loading(manager, result);
                true
            }
            Poll::Pending => false,
        }
    }
}

/// Wakes a pending load by asking for another frame.
#[cfg(not(target_arch = "wasm32"))]
struct RedrawWaker(Arc<Window>);

#[cfg(not(target_arch = "wasm32"))]
impl futures::task::ArcWake for RedrawWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.0.request_redraw();
    }
}

/// A running viewer: the GPU side and the session it draws.
pub struct Viewer {
    pub ctx: Context,
    pub session: Session<PlatformSource>,
}

impl Viewer {
    async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let config = ViewerConfig::load().await;
        let ctx = Context::new(window.clone(), &config).await?;
        let mut manager =
            ModelManager::new(default_source()?, config.assets.clone(), config.model_size);
        report_loading(&mut manager, window);
        Ok(Self {
            ctx,
            session: Session::new(manager, config.controller.clone()),
        })
    }

    fn handle(&mut self, event: ViewerEvent) {
        match event {
            ViewerEvent::SelectClass(class) => {
                self.session.select_class(class);
            }
            ViewerEvent::SelectAbility(ability) => {
                self.session.select_ability(ability);
            }
            ViewerEvent::PointerDown { x, y } => self.session.controller_mut().begin_drag(x, y),
            ViewerEvent::PointerMove { x, y } => self.session.controller_mut().continue_drag(x, y),
            ViewerEvent::PointerUp => self.session.controller_mut().end_drag(),
            ViewerEvent::SetBackground {
                image,
                ambient_colour,
                ambient_intensity,
            } => {
                match image {
                    Some(image) => self.ctx.set_background_image(&image, "background"),
                    None => self.ctx.set_background_colour(ambient_colour),
                }
                self.ctx.set_ambient(ambient_colour, ambient_intensity);
            }
            ViewerEvent::Initialized(_) | ViewerEvent::Unsupported(_) | ViewerEvent::Loaded { .. } => {}
        }
    }

    fn redraw(&mut self) {
        let size = self.ctx.window().inner_size();
        self.ctx.resize(size.width, size.height);
        self.session.controller_mut().advance();
        if render::render(&mut self.ctx, self.session.controller().group()) == render::Frame::Skipped {
            log::debug!("Frame skipped.");
        }
        self.ctx.window().request_redraw();
    }
}

/// Shows loading progress in the window title.
#[cfg(not(target_arch = "wasm32"))]
fn report_loading(manager: &mut ModelManager<PlatformSource>, window: Arc<Window>) {
    let progress_window = window.clone();
    manager.on_item_loaded(move |progress: LoadProgress| {
        progress_window.set_title(&format!("{} - loading {:.0}%", TITLE, progress.percent()));
    });
    let done_window = window.clone();
    manager.on_complete(move || done_window.set_title(TITLE));
    manager.on_error(move |e: &LoadError| {
        window.set_title(&format!("{} - {} failed to load", TITLE, e.key));
    });
}

/// Drives the loading screen of the page.
#[cfg(target_arch = "wasm32")]
fn report_loading(manager: &mut ModelManager<PlatformSource>, _window: Arc<Window>) {
    use crate::web;

    manager.on_item_loaded(|progress: LoadProgress| web::show_progress(progress));
    manager.on_complete(web::hide_loading_screen);
    manager.on_error(|e: &LoadError| web::show_load_error(&e.to_string()));
}

pub enum ViewerEvent {
    #[allow(dead_code)]
    Initialized(Box<Viewer>),
    /// No rendering context could be created.
    #[allow(dead_code)]
    Unsupported(String),
    #[allow(dead_code)]
    Loaded {
        manager: Box<ModelManager<PlatformSource>>,
        result: Result<(), LoadError>,
    },
    SelectClass(ClassKey),
    SelectAbility(AbilityKey),
    PointerDown {
        x: f32,
        y: f32,
    },
    PointerMove {
        x: f32,
        y: f32,
    },
    PointerUp,
    SetBackground {
        image: Option<image::DynamicImage>,
        ambient_colour: u32,
        ambient_intensity: f32,
    },
}

impl std::fmt::Debug for ViewerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialized(_) => f.write_str("Initialized"),
            Self::Unsupported(reason) => f.debug_tuple("Unsupported").field(reason).finish(),
            Self::Loaded { result, .. } => f.debug_struct("Loaded").field("result", result).finish(),
            Self::SelectClass(class) => f.debug_tuple("SelectClass").field(class).finish(),
            Self::SelectAbility(ability) => f.debug_tuple("SelectAbility").field(ability).finish(),
            Self::PointerDown { x, y } => f.debug_struct("PointerDown").field("x", x).field("y", y).finish(),
            Self::PointerMove { x, y } => f.debug_struct("PointerMove").field("x", x).field("y", y).finish(),
            Self::PointerUp => f.write_str("PointerUp"),
            Self::SetBackground {
                image,
                ambient_colour,
                ambient_intensity,
            } => f
                .debug_struct("SetBackground")
                .field("image", &image.is_some())
                .field("ambient_colour", &format_args!("{:#08x}", ambient_colour))
                .field("ambient_intensity", ambient_intensity)
                .finish(),
        }
    }
}

/// Maps keys 1-4 to the class buttons and F1-F5 to the ability buttons.
#[cfg(not(target_arch = "wasm32"))]
fn key_binding(code: winit::keyboard::KeyCode) -> Option<ViewerEvent> {
    use winit::keyboard::KeyCode;

    let class = |index| ClassKey::from_button(index).map(ViewerEvent::SelectClass);
    let ability = |index| AbilityKey::from_button(index).map(ViewerEvent::SelectAbility);
    match code {
        KeyCode::Digit1 => class(0),
        KeyCode::Digit2 => class(1),
        KeyCode::Digit3 => class(2),
        KeyCode::Digit4 => class(3),
        KeyCode::F1 => ability(0),
        KeyCode::F2 => ability(1),
        KeyCode::F3 => ability(2),
        KeyCode::F4 => ability(3),
        KeyCode::F5 => ability(4),
        _ => None,
    }
}

pub struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    #[allow(dead_code)]
    proxy: winit::event_loop::EventLoopProxy<ViewerEvent>,
    viewer: Option<Viewer>,
    #[cfg(not(target_arch = "wasm32"))]
    loading: Option<PendingLoad<PlatformSource>>,
    #[cfg(not(target_arch = "wasm32"))]
    cursor: winit::dpi::PhysicalPosition<f64>,
}

impl App {
    fn new(event_loop: &EventLoop<ViewerEvent>) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        #[cfg(target_arch = "wasm32")]
        crate::web::install(proxy.clone());
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime: tokio::runtime::Runtime::new()?,
            proxy,
            viewer: None,
            #[cfg(not(target_arch = "wasm32"))]
            loading: None,
            #[cfg(not(target_arch = "wasm32"))]
            cursor: Default::default(),
        })
    }
}

impl ApplicationHandler<ViewerEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.viewer.is_some() {
            return;
        }

        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title(TITLE);

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "canvas";

            let window = web_sys::window().unwrap_throw();
            let document = window.document().unwrap_throw();
            let canvas = document.get_element_by_id(CANVAS_ID).unwrap_throw();
            let html_canvas_element = canvas.unchecked_into();
            window_attributes = window_attributes.with_canvas(Some(html_canvas_element));
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Unable to create a window: {}", e);
                event_loop.exit();
                return;
            }
        };

        #[cfg(not(target_arch = "wasm32"))]
        {
            let mut viewer = match self.async_runtime.block_on(Viewer::new(window)) {
                Ok(viewer) => viewer,
                Err(e) => {
                    log::error!("Unable to start the viewer: {:#}", e);
                    event_loop.exit();
                    return;
                }
            };
            self.loading = PendingLoad::start(&mut viewer.session);
            viewer.ctx.window().request_redraw();
            self.viewer = Some(viewer);
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let event = match Viewer::new(window).await {
                    Ok(viewer) => ViewerEvent::Initialized(Box::new(viewer)),
                    Err(e) => ViewerEvent::Unsupported(format!("{:#}", e)),
                };
                if proxy.send_event(event).is_err() {
                    log::error!("Event loop closed before the viewer started.");
                }
            });
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            ViewerEvent::Initialized(viewer) => {
                // This is the message from our wasm `spawn_local`
                let mut viewer = *viewer;
                let size = viewer.ctx.window().inner_size();
                viewer.ctx.resize(size.width, size.height);
                #[cfg(target_arch = "wasm32")]
                if let Some(mut manager) = viewer.session.take_manager() {
                    let proxy = self.proxy.clone();
                    wasm_bindgen_futures::spawn_local(async move {
                        let result = manager.load_all().await;
                        let loaded = ViewerEvent::Loaded {
                            manager: Box::new(manager),
                            result,
                        };
                        if proxy.send_event(loaded).is_err() {
                            log::error!("Event loop closed while loading models.");
                        }
                    });
                }
                viewer.ctx.window().request_redraw();
                self.viewer = Some(viewer);
            }
            ViewerEvent::Unsupported(reason) => {
                log::error!("Unable to start the viewer: {}", reason);
                #[cfg(target_arch = "wasm32")]
                crate::web::show_unsupported(&reason);
                event_loop.exit();
            }
            ViewerEvent::Loaded { manager, result } => {
                if let Some(viewer) = &mut self.viewer {
                    viewer.session.finish_loading(*manager, result);
                }
            }
            event => match &mut self.viewer {
                Some(viewer) => viewer.handle(event),
                None => log::debug!("Dropping {:?} received before startup.", event),
            },
        }
    }

    /// Advances the model load natively; on the web it runs on its own.
    #[cfg(not(target_arch = "wasm32"))]
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        let (Some(loading), Some(viewer)) = (&mut self.loading, &mut self.viewer) else {
            return;
        };
        let waker = futures::task::waker(Arc::new(RedrawWaker(viewer.ctx.window.clone())));
        // File reads are tokio tasks and need the runtime while polled.
        let _runtime = self.async_runtime.enter();
        if loading.poll(&mut viewer.session, &waker) {
            self.loading = None;
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(viewer) = &mut self.viewer else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                viewer.session.dispose();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => viewer.ctx.resize(size.width, size.height),
            WindowEvent::RedrawRequested => viewer.redraw(),
            // On the web pointer input comes from document listeners instead.
            #[cfg(not(target_arch = "wasm32"))]
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = position;
                viewer
                    .session
                    .controller_mut()
                    .continue_drag(position.x as f32, position.y as f32);
            }
            #[cfg(not(target_arch = "wasm32"))]
            WindowEvent::MouseInput {
                state,
                button: winit::event::MouseButton::Left,
                ..
            } => {
                let event = if state.is_pressed() {
                    ViewerEvent::PointerDown {
                        x: self.cursor.x as f32,
                        y: self.cursor.y as f32,
                    }
                } else {
                    ViewerEvent::PointerUp
                };
                viewer.handle(event);
            }
            #[cfg(not(target_arch = "wasm32"))]
            WindowEvent::KeyboardInput {
                event:
                    winit::event::KeyEvent {
                        physical_key: winit::keyboard::PhysicalKey::Code(code),
                        state: winit::event::ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                if let Some(event) = key_binding(code) {
                    viewer.handle(event);
                }
            }
            _ => {}
        }
    }
}

pub fn run() -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_log::init_with_level(log::Level::Info).unwrap_throw();
    }

    let event_loop: EventLoop<ViewerEvent> = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop)?;
    event_loop.run_app(&mut app)?;

    Ok(())
}
