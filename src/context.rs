use std::sync::Arc;

use anyhow::Context as _;
use winit::window::Window;

use crate::{
    camera::{Camera, CameraResources, Projection},
    config::{ViewerConfig, linear_rgb},
    data_structures::{model::GpuModel, texture},
    pipelines::{
        background,
        basic::{material_layout, mk_basic_pipeline},
        light::{LightResources, LightUniform},
    },
};

/// What is drawn behind the models.
pub enum Background {
    Colour(wgpu::Color),
    Image {
        texture: texture::Texture,
        bind_group: wgpu::BindGroup,
    },
}

impl Background {
    pub fn colour(hex: u32) -> Self {
        let [r, g, b] = linear_rgb(hex);
        Background::Colour(wgpu::Color {
            r: r as f64,
            g: g as f64,
            b: b as f64,
            a: 1.0,
        })
    }
}

/// The render pipelines of the viewer.
pub struct Pipelines {
    pub single_sided: wgpu::RenderPipeline,
    pub double_sided: wgpu::RenderPipeline,
    pub background: wgpu::RenderPipeline,
    pub material_layout: wgpu::BindGroupLayout,
    pub background_layout: wgpu::BindGroupLayout,
}

/// Owns the window surface, the device and everything drawn each frame.
pub struct Context {
    pub(crate) window: Arc<Window>,
    pub(crate) depth_texture: texture::Texture,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub camera: CameraResources,
    pub projection: Projection,
    pub light: LightResources,
    pub pipelines: Pipelines,
    pub background: Background,
    /// GPU copy of the display group, replaced whenever the group changes.
    pub model: Option<GpuModel>,
}

impl Context {
    /// Fails if no adapter can draw to the window, e.g. a browser without WebGL2.
    pub async fn new(window: Arc<Window>, viewer: &ViewerConfig) -> anyhow::Result<Self> {
        let size = window.inner_size();

        log::info!("WGPU setup");
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..wgpu::InstanceDescriptor::new_without_display_handle()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("Unable to create a rendering surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No graphics adapter supports this display (WebGL2 or a native GPU API is required)")?;

        log::info!("Device and queue");
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                // WebGL doesn't support all of wgpu's features, so if
                // we're building for the web we'll have to disable some.
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                ..Default::default()
            })
            .await
            .context("Unable to open the graphics device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        // The shaders assume an sRGB surface; colours come out darker otherwise.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("The surface reports no texture formats")?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let projection = Projection::new(
            config.width,
            config.height,
            cgmath::Deg(viewer.camera.fovy_degrees),
            viewer.camera.znear,
            viewer.camera.zfar,
        );
        let camera = CameraResources::new(&device, Camera::new(&viewer.camera), &projection);
        let light = LightResources::new(&device, LightUniform::new(&viewer.lighting));

        let depth_texture = texture::Texture::create_depth_texture(
            &device,
            [config.width, config.height],
            "depth_texture",
        );

        let material_layout = material_layout(&device);
        let background_layout = background::mk_bind_group_layout(&device);
        let pipelines = Pipelines {
            single_sided: mk_basic_pipeline(
                &device,
                config.format,
                &material_layout,
                &camera.bind_group_layout,
                &light.bind_group_layout,
                false,
            ),
            double_sided: mk_basic_pipeline(
                &device,
                config.format,
                &material_layout,
                &camera.bind_group_layout,
                &light.bind_group_layout,
                true,
            ),
            background: background::mk_background_pipeline(
                &device,
                config.format,
                &background_layout,
            ),
            material_layout,
            background_layout,
        };

        Ok(Self {
            window,
            depth_texture,
            surface,
            device,
            queue,
            config,
            camera,
            projection,
            light,
            pipelines,
            background: Background::colour(viewer.background_colour),
            model: None,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Reconfigures the surface if the window size changed. Zero sized
    /// windows (minimized, hidden canvas) are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if width == self.config.width && height == self.config.height {
            return;
        }
        self.reconfigure(width, height);
    }

    pub(crate) fn reconfigure(&mut self, width: u32, height: u32) {
        self.config.width = width.max(1);
        self.config.height = height.max(1);
        self.surface.configure(&self.device, &self.config);
        self.projection.resize(self.config.width, self.config.height);
        self.camera.update(&self.queue, &self.projection);
        self.depth_texture.texture.destroy();
        self.depth_texture = texture::Texture::create_depth_texture(
            &self.device,
            [self.config.width, self.config.height],
            "depth_texture",
        );
    }

    pub fn set_background_colour(&mut self, hex: u32) {
        self.release_background();
        self.background = Background::colour(hex);
    }

    pub fn set_background_image(&mut self, image: &image::DynamicImage, label: &str) {
        self.release_background();
        let texture = texture::Texture::from_image(&self.device, &self.queue, image, label);
        let bind_group = background::mk_bind_group(
            &self.device,
            &self.pipelines.background_layout,
            &texture,
        );
        self.background = Background::Image {
            texture,
            bind_group,
        };
    }

    pub fn set_ambient(&mut self, colour: u32, intensity: f32) {
        self.light.uniform.set_ambient(colour, intensity);
        self.light.update(&self.queue);
    }

    fn release_background(&mut self) {
        if let Background::Image { texture, .. } = &self.background {
            texture.texture.destroy();
        }
    }
}
