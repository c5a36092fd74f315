// Browser front-end. Only meaningful on wasm32, where glow wraps WebGL2.
#![cfg(target_arch = "wasm32")]

use aurora::render::Context;
use aurora::surface::{FrameRequest, Surface};
use aurora::{Driver, Settings};
use gloo_utils::format::JsValueSerdeExt;
use serde::Serialize;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{EventTarget, HtmlCanvasElement, WebGl2RenderingContext, Window};

type SharedDriver = Rc<RefCell<Driver<WebSurface>>>;
type WeakDriver = Weak<RefCell<Driver<WebSurface>>>;

/// An animated aurora drawn behind the page, on an existing `<canvas>`.
///
/// The canvas should be positioned to cover the viewport. It is made
/// transparent to pointer events.
#[wasm_bindgen]
pub struct AuroraBackground {
    driver: SharedDriver,
    listeners: Vec<Listener>,
}

#[wasm_bindgen]
impl AuroraBackground {
    #[wasm_bindgen(constructor)]
    pub fn new(canvas_id: &str, settings_object: &JsValue) -> Result<AuroraBackground, JsValue> {
        set_panic_hook();
        // Fails if a previous instance already installed the logger
        console_log::init_with_level(log::Level::Info).ok();

        let settings = parse_settings(settings_object);
        let window = web_sys::window().ok_or("The global `window` doesn’t exist")?;
        let document = window.document().ok_or("The window has no document")?;
        let canvas = document
            .get_element_by_id(canvas_id)
            .ok_or_else(|| format!("Cannot find a canvas with id `{}`", canvas_id))?
            .dyn_into::<HtmlCanvasElement>()?;
        canvas.style().set_property("pointer-events", "none")?;

        let webgl = get_webgl2_context(&canvas);
        let driver: SharedDriver = Rc::new_cyclic(|weak| {
            let surface = WebSurface::new(window.clone(), canvas.clone(), webgl, weak.clone());
            RefCell::new(Driver::new(surface, &settings))
        });

        let listeners = register_listeners(&window, &document, &canvas, &driver)?;
        driver.borrow_mut().mount(now(&window));

        Ok(Self { driver, listeners })
    }

    #[wasm_bindgen(setter)]
    pub fn set_settings(&mut self, settings_object: &JsValue) {
        let settings = parse_settings(settings_object);
        with_driver(&Rc::downgrade(&self.driver), |driver| {
            driver.set_settings(&settings)
        });
    }

    /// One of `uninitialized`, `running`, `suspended` or `destroyed`, or
    /// `busy` when asked from inside one of the driver's own callbacks.
    #[wasm_bindgen(getter)]
    pub fn state(&self) -> String {
        match self.driver.try_borrow() {
            Ok(driver) => format!("{:?}", driver.state()).to_lowercase(),
            Err(_) => "busy".to_string(),
        }
    }

    /// Why the background is not rendering, if it failed.
    #[wasm_bindgen(getter)]
    pub fn error(&self) -> Option<String> {
        self.driver
            .try_borrow()
            .ok()
            .and_then(|driver| driver.failure().map(ToString::to_string))
    }

    pub fn destroy(&mut self) {
        self.listeners.clear();
        with_driver(&Rc::downgrade(&self.driver), Driver::destroy);
    }
}

fn parse_settings(settings_object: &JsValue) -> Settings {
    if settings_object.is_undefined() || settings_object.is_null() {
        return Settings::default();
    }

    settings_object.into_serde().unwrap_or_else(|err| {
        log::error!("Invalid settings: {}. Using defaults", err);
        Settings::default()
    })
}

// Host events run one at a time on the main thread. A callback that finds
// the driver busy is dropped rather than panicking.
fn with_driver(driver: &WeakDriver, action: impl FnOnce(&mut Driver<WebSurface>)) {
    if let Some(driver) = driver.upgrade() {
        match driver.try_borrow_mut() {
            Ok(mut driver) => action(&mut driver),
            Err(_) => log::debug!("Skipping a re-entrant callback"),
        };
    }
}

fn register_listeners(
    window: &Window,
    document: &web_sys::Document,
    canvas: &HtmlCanvasElement,
    driver: &SharedDriver,
) -> Result<Vec<Listener>, JsValue> {
    let visibility = {
        let driver = Rc::downgrade(driver);
        let page = document.clone();
        Listener::new(document.as_ref(), "visibilitychange", move |_| {
            with_driver(&driver, |driver| {
                if page.hidden() {
                    driver.suspend();
                } else {
                    driver.resume();
                }
            });
        })?
    };

    let context_lost = {
        let driver = Rc::downgrade(driver);
        Listener::new(canvas.as_ref(), "webglcontextlost", move |event| {
            // Without this the browser never offers the context back
            event.prevent_default();
            with_driver(&driver, Driver::context_lost);
        })?
    };

    let context_restored = {
        let driver = Rc::downgrade(driver);
        let window = window.clone();
        Listener::new(canvas.as_ref(), "webglcontextrestored", move |_| {
            let now = now(&window);
            with_driver(&driver, |driver| driver.context_restored(now));
        })?
    };

    Ok(vec![visibility, context_lost, context_restored])
}

fn now(window: &Window) -> f64 {
    window
        .performance()
        .map(|performance| performance.now())
        .unwrap_or_default()
}

/// An event listener that is removed when dropped.
struct Listener {
    target: EventTarget,
    event: &'static str,
    callback: Closure<dyn FnMut(web_sys::Event)>,
}

impl Listener {
    fn new(
        target: &EventTarget,
        event: &'static str,
        callback: impl FnMut(web_sys::Event) + 'static,
    ) -> Result<Self, JsValue> {
        let callback = Closure::<dyn FnMut(web_sys::Event)>::new(callback);
        target.add_event_listener_with_callback(event, callback.as_ref().unchecked_ref())?;

        Ok(Self {
            target: target.clone(),
            event,
            callback,
        })
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        let _ = self
            .target
            .remove_event_listener_with_callback(self.event, self.callback.as_ref().unchecked_ref());
    }
}

struct WebSurface {
    window: Window,
    canvas: HtmlCanvasElement,
    webgl: Option<WebGl2RenderingContext>,
    gl: Option<Context>,
    driver: WeakDriver,

    frame_callback: Option<Closure<dyn FnMut(f64)>>,
    resize_listener: Option<Listener>,
}

impl WebSurface {
    fn new(
        window: Window,
        canvas: HtmlCanvasElement,
        webgl: Option<WebGl2RenderingContext>,
        driver: WeakDriver,
    ) -> Self {
        let gl = webgl
            .clone()
            .map(|webgl| Rc::new(glow::Context::from_webgl2_context(webgl)));

        Self {
            window,
            canvas,
            webgl,
            gl,
            driver,
            frame_callback: None,
            resize_listener: None,
        }
    }
}

impl Surface for WebSurface {
    type Gpu = glow::Context;

    fn acquire_context(&mut self) -> Option<Context> {
        self.gl.clone()
    }

    fn logical_size(&self) -> (u32, u32) {
        (
            self.canvas.client_width().max(0) as u32,
            self.canvas.client_height().max(0) as u32,
        )
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.window.device_pixel_ratio()
    }

    fn set_backing_size(&mut self, width: u32, height: u32) {
        // Setting the size clears the canvas, even to the same value
        if self.canvas.width() != width {
            self.canvas.set_width(width);
        }
        if self.canvas.height() != height {
            self.canvas.set_height(height);
        }
    }

    fn request_frame(&mut self) -> FrameRequest {
        let driver = self.driver.clone();
        let callback = self.frame_callback.get_or_insert_with(|| {
            Closure::<dyn FnMut(f64)>::new(move |timestamp: f64| {
                with_driver(&driver, |driver| driver.frame(timestamp));
            })
        });
        let function: &js_sys::Function = callback.as_ref().unchecked_ref();

        match self.window.request_animation_frame(function) {
            Ok(handle) => FrameRequest(handle),
            Err(err) => {
                log::error!("Cannot request an animation frame: {:?}", err);
                FrameRequest(0)
            }
        }
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        if let Err(err) = self.window.cancel_animation_frame(request.0) {
            log::warn!("Cannot cancel the animation frame: {:?}", err);
        }
    }

    fn listen_for_resize(&mut self) {
        let driver = self.driver.clone();
        match Listener::new(self.window.as_ref(), "resize", move |_| {
            with_driver(&driver, Driver::resize)
        }) {
            Ok(listener) => self.resize_listener = Some(listener),
            Err(err) => log::error!("Cannot listen for resizes: {:?}", err),
        }
    }

    fn stop_listening_for_resize(&mut self) {
        self.resize_listener = None;
    }

    fn is_context_lost(&self) -> bool {
        self.webgl
            .as_ref()
            .is_some_and(WebGl2RenderingContext::is_context_lost)
    }

    // The canvas keeps its context object; the browser revives it and fires
    // `webglcontextrestored`.
    fn restores_lost_context(&self) -> bool {
        true
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ContextOptions {
    alpha: bool,
    depth: bool,
    stencil: bool,
    antialias: bool,
    power_preference: &'static str,
    premultiplied_alpha: bool,
    preserve_drawing_buffer: bool,
}

fn get_webgl2_context(canvas: &HtmlCanvasElement) -> Option<WebGl2RenderingContext> {
    use web_sys::WebGl2RenderingContext as GL;

    // The background is opaque and needs no depth or multisampling.
    let options = ContextOptions {
        alpha: false,
        depth: false,
        stencil: false,
        antialias: false,
        power_preference: "low-power",
        premultiplied_alpha: false,
        preserve_drawing_buffer: false,
    };
    let options = match JsValue::from_serde(&options) {
        Ok(options) => options,
        Err(err) => {
            log::error!("Cannot serialize the context options: {}", err);
            return None;
        }
    };

    let gl = canvas
        .get_context_with_context_options("webgl2", &options)
        .ok()
        .flatten()?
        .dyn_into::<GL>()
        .ok()?;
    gl.disable(GL::BLEND);
    gl.disable(GL::DEPTH_TEST);

    Some(gl)
}

// https://github.com/rustwasm/console_error_panic_hook#readme
fn set_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}
