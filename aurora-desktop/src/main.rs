use aurora::render::Context;
use aurora::surface::{FrameRequest, Surface};
use aurora::{Driver, Settings};
use glow::HasContext;
use glutin::config::{Config, ConfigTemplateBuilder, GlConfig};
use glutin::context::{
    ContextApi, ContextAttributesBuilder, GlProfile, NotCurrentGlContext, PossiblyCurrentContext,
    Version,
};
use glutin::display::{GetGlDisplay, GlDisplay};
use glutin::surface::{GlSurface, SwapInterval, WindowSurface};
use glutin_winit::{DisplayBuilder, GlWindow};
use raw_window_handle::HasWindowHandle;
use std::error::Error;
use std::num::NonZeroU32;
use std::rc::Rc;
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::window::{Window, WindowId};

#[cfg(target_os = "macos")]
use winit::platform::macos::WindowAttributesExtMacOS;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = std::env::args()
        .nth(1)
        .map(|path| read_settings(&path))
        .unwrap_or_default();

    let event_loop = EventLoop::new()?;
    let mut app = App {
        settings,
        start: Instant::now(),
        aurora: None,
    };
    event_loop.run_app(&mut app)?;

    Ok(())
}

fn read_settings(path: &str) -> Settings {
    let parsed = std::fs::read_to_string(path)
        .map_err(|err| err.to_string())
        .and_then(|json| serde_json::from_str(&json).map_err(|err| err.to_string()));

    match parsed {
        Ok(settings) => {
            log::info!("Loaded settings from {}", path);
            settings
        }
        Err(err) => {
            log::error!("Cannot read settings from {}: {}. Using defaults", path, err);
            Settings::default()
        }
    }
}

struct App {
    settings: Settings,
    start: Instant,
    aurora: Option<Aurora>,
}

// The driver is declared first so that it releases its GL resources while
// the context is still alive.
struct Aurora {
    driver: Driver<DesktopSurface>,
    presenter: Option<Presenter>,
}

struct Presenter {
    gl_surface: glutin::surface::Surface<WindowSurface>,
    gl_context: PossiblyCurrentContext,
}

impl App {
    fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.aurora.is_some() {
            return;
        }

        let (window, gl_config) = match build_window(event_loop) {
            Ok(pair) => pair,
            Err(err) => {
                log::error!("Cannot open a window: {}", err);
                event_loop.exit();
                return;
            }
        };

        // Without a context the window stays open and blank. The driver
        // reports the missing context when it mounts.
        let (presenter, gl) = match create_context(&window, &gl_config) {
            Ok((presenter, gl)) => (Some(presenter), Some(Rc::new(gl))),
            Err(err) => {
                log::error!("Cannot create an OpenGL context: {}", err);
                (None, None)
            }
        };

        let surface = DesktopSurface::new(window, gl);
        let mut driver = Driver::new(surface, &self.settings);
        driver.mount(self.now());

        let aurora = Aurora { driver, presenter };
        aurora.clear_if_failed();
        self.aurora = Some(aurora);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let now = self.now();
        let Some(aurora) = self.aurora.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                self.aurora = None;
                event_loop.exit();
            }

            WindowEvent::Resized(physical_size) => {
                if let (Some(presenter), Some(width), Some(height)) = (
                    &aurora.presenter,
                    NonZeroU32::new(physical_size.width),
                    NonZeroU32::new(physical_size.height),
                ) {
                    presenter
                        .gl_surface
                        .resize(&presenter.gl_context, width, height);
                }

                if aurora.driver.surface().listening {
                    aurora.driver.resize();
                }
                aurora.clear_if_failed();
            }

            WindowEvent::ScaleFactorChanged { .. } => {
                if aurora.driver.surface().listening {
                    aurora.driver.resize();
                }
            }

            WindowEvent::Occluded(true) => aurora.driver.suspend(),
            WindowEvent::Occluded(false) => aurora.driver.resume(),

            WindowEvent::RedrawRequested => {
                if aurora.driver.surface_mut().pending_frame.take().is_none() {
                    return;
                }

                aurora.driver.surface().bind_offscreen();
                aurora.driver.frame(now);
                aurora.driver.surface().present();
                aurora.swap_buffers();
            }

            _ => (),
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.aurora = None;
    }
}

impl Aurora {
    // Leave a black window behind when there is nothing to render.
    fn clear_if_failed(&self) {
        let Some(problem) = self.driver.failure() else {
            return;
        };
        let Some(gl) = self.driver.surface().gl.as_ref() else {
            return;
        };

        log::debug!("Clearing the window after: {}", problem);
        let size = self.driver.surface().window.inner_size();
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            gl.viewport(0, 0, size.width as i32, size.height as i32);
        }
        aurora::Gpu::clear(gl.as_ref(), 0.0, 0.0, 0.0, 1.0);
        self.swap_buffers();
    }

    fn swap_buffers(&self) {
        if let Some(presenter) = &self.presenter {
            if let Err(err) = presenter.gl_surface.swap_buffers(&presenter.gl_context) {
                log::warn!("Cannot swap buffers: {}", err);
            }
        }
    }
}

fn build_window(event_loop: &ActiveEventLoop) -> Result<(Rc<Window>, Config), Box<dyn Error>> {
    let window_attributes = Window::default_attributes()
        .with_title("Aurora")
        .with_decorations(true)
        .with_resizable(true)
        .with_inner_size(LogicalSize::new(1280, 800));

    #[cfg(target_os = "macos")]
    let window_attributes = window_attributes
        .with_title_hidden(true)
        .with_titlebar_transparent(true)
        .with_fullsize_content_view(true);

    // The background is rendered offscreen and upscaled, so the window needs
    // no depth, stencil or multisampling.
    let template = ConfigTemplateBuilder::new()
        .with_depth_size(0)
        .with_stencil_size(0);

    let (window, gl_config) = DisplayBuilder::new()
        .with_window_attributes(Some(window_attributes))
        .build(event_loop, template, |configs| {
            configs
                .reduce(|best, config| {
                    if config.num_samples() < best.num_samples() {
                        config
                    } else {
                        best
                    }
                })
                // glutin errors out before calling the picker with no configs
                .expect("at least one GL config")
        })?;

    let window = window.ok_or("the display builder did not create a window")?;
    Ok((Rc::new(window), gl_config))
}

fn create_context(
    window: &Window,
    gl_config: &Config,
) -> Result<(Presenter, glow::Context), Box<dyn Error>> {
    let raw_window_handle = window.window_handle()?.as_raw();
    let context_attributes = ContextAttributesBuilder::new()
        .with_profile(GlProfile::Core)
        .with_context_api(ContextApi::OpenGl(Some(Version::new(3, 3))))
        .build(Some(raw_window_handle));

    let gl_display = gl_config.display();
    let not_current = unsafe { gl_display.create_context(gl_config, &context_attributes)? };

    let surface_attributes = window.build_surface_attributes(Default::default())?;
    let gl_surface = unsafe { gl_display.create_window_surface(gl_config, &surface_attributes)? };
    let gl_context = not_current.make_current(&gl_surface)?;

    if let Err(err) =
        gl_surface.set_swap_interval(&gl_context, SwapInterval::Wait(NonZeroU32::MIN))
    {
        log::warn!("Cannot enable vsync: {}", err);
    }

    let gl = unsafe {
        glow::Context::from_loader_function_cstr(|symbol| {
            gl_display.get_proc_address(symbol) as *const _
        })
    };

    Ok((
        Presenter {
            gl_surface,
            gl_context,
        },
        gl,
    ))
}

/// The reduced-resolution render target. Its contents are stretched over the
/// window with linear filtering when a frame is presented.
struct Offscreen {
    framebuffer: glow::Framebuffer,
    texture: glow::Texture,
    width: u32,
    height: u32,
}

impl Offscreen {
    fn new(gl: &glow::Context, width: u32, height: u32) -> Result<Self, String> {
        unsafe {
            let texture = gl.create_texture()?;
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            for (parameter, value) in [
                (glow::TEXTURE_MIN_FILTER, glow::LINEAR),
                (glow::TEXTURE_MAG_FILTER, glow::LINEAR),
                (glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE),
                (glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE),
            ] {
                gl.tex_parameter_i32(glow::TEXTURE_2D, parameter, value as i32);
            }
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA8 as i32,
                width as i32,
                height as i32,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                None,
            );
            gl.bind_texture(glow::TEXTURE_2D, None);

            let framebuffer = match gl.create_framebuffer() {
                Ok(framebuffer) => framebuffer,
                Err(err) => {
                    gl.delete_texture(texture);
                    return Err(err);
                }
            };
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(texture),
                0,
            );
            let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);

            if status != glow::FRAMEBUFFER_COMPLETE {
                gl.delete_framebuffer(framebuffer);
                gl.delete_texture(texture);
                return Err(format!("Incomplete framebuffer: {:#x}", status));
            }

            Ok(Self {
                framebuffer,
                texture,
                width,
                height,
            })
        }
    }

    fn delete(&self, gl: &glow::Context) {
        unsafe {
            gl.delete_framebuffer(self.framebuffer);
            gl.delete_texture(self.texture);
        }
    }
}

struct DesktopSurface {
    window: Rc<Window>,
    gl: Option<Context>,
    offscreen: Option<Offscreen>,

    pending_frame: Option<FrameRequest>,
    next_request: i32,
    listening: bool,
}

impl DesktopSurface {
    fn new(window: Rc<Window>, gl: Option<Context>) -> Self {
        Self {
            window,
            gl,
            offscreen: None,
            pending_frame: None,
            next_request: 0,
            listening: false,
        }
    }

    fn bind_offscreen(&self) {
        if let Some(gl) = &self.gl {
            let framebuffer = self.offscreen.as_ref().map(|offscreen| offscreen.framebuffer);
            unsafe { gl.bind_framebuffer(glow::FRAMEBUFFER, framebuffer) };
        }
    }

    fn present(&self) {
        let (Some(gl), Some(offscreen)) = (&self.gl, &self.offscreen) else {
            return;
        };

        let size = self.window.inner_size();
        unsafe {
            gl.bind_framebuffer(glow::READ_FRAMEBUFFER, Some(offscreen.framebuffer));
            gl.bind_framebuffer(glow::DRAW_FRAMEBUFFER, None);
            gl.blit_framebuffer(
                0,
                0,
                offscreen.width as i32,
                offscreen.height as i32,
                0,
                0,
                size.width as i32,
                size.height as i32,
                glow::COLOR_BUFFER_BIT,
                glow::LINEAR,
            );
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        }
    }
}

impl Drop for DesktopSurface {
    fn drop(&mut self) {
        if let (Some(gl), Some(offscreen)) = (&self.gl, self.offscreen.take()) {
            offscreen.delete(gl);
        }
    }
}

impl Surface for DesktopSurface {
    type Gpu = glow::Context;

    fn acquire_context(&mut self) -> Option<Context> {
        self.gl.clone()
    }

    fn logical_size(&self) -> (u32, u32) {
        let size: LogicalSize<u32> = self
            .window
            .inner_size()
            .to_logical(self.window.scale_factor());
        (size.width, size.height)
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.window.scale_factor()
    }

    fn set_backing_size(&mut self, width: u32, height: u32) {
        let Some(gl) = &self.gl else {
            return;
        };
        if self
            .offscreen
            .as_ref()
            .is_some_and(|offscreen| (offscreen.width, offscreen.height) == (width, height))
        {
            return;
        }

        if let Some(offscreen) = self.offscreen.take() {
            offscreen.delete(gl);
        }
        match Offscreen::new(gl, width, height) {
            Ok(offscreen) => self.offscreen = Some(offscreen),
            // Frames then land straight in the window, unscaled
            Err(err) => log::error!("Cannot create the offscreen framebuffer: {}", err),
        }
    }

    fn request_frame(&mut self) -> FrameRequest {
        self.next_request += 1;
        let request = FrameRequest(self.next_request);
        self.pending_frame = Some(request);
        self.window.request_redraw();
        request
    }

    // winit can't take back a redraw request. Forgetting the token makes the
    // redraw a no-op.
    fn cancel_frame(&mut self, request: FrameRequest) {
        if self.pending_frame == Some(request) {
            self.pending_frame = None;
        }
    }

    fn listen_for_resize(&mut self) {
        self.listening = true;
    }

    fn stop_listening_for_resize(&mut self) {
        self.listening = false;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::path::PathBuf;

    fn settings_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "aurora-desktop-{}-{}.json",
            std::process::id(),
            name
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn missing_settings_file_uses_defaults() {
        let path = std::env::temp_dir().join("aurora-desktop-no-such-settings.json");
        assert_eq!(read_settings(path.to_str().unwrap()), Settings::default());
    }

    #[test]
    fn invalid_settings_file_uses_defaults() {
        let path = settings_file("invalid", "{ \"speed\": ");
        let settings = read_settings(path.to_str().unwrap());
        std::fs::remove_file(&path).unwrap();

        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn settings_file_overrides_some_defaults() {
        let path = settings_file("partial", r##"{ "colorPrimary": "#ff0000", "speed": 2.0 }"##);
        let settings = read_settings(path.to_str().unwrap());
        std::fs::remove_file(&path).unwrap();

        assert_eq!(
            settings,
            Settings {
                color_primary: "#ff0000".to_string(),
                speed: 2.0,
                ..Settings::default()
            }
        );
    }
}
