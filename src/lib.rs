// Re-export all public modules so they can be used from main.rs
pub mod assets;
pub mod config;
pub mod logging;
pub mod ui;

// MVC Architecture
pub mod controller;
pub mod model;
pub mod view;

#[cfg(target_arch = "wasm32")]
use std::cell::RefCell;
#[cfg(target_arch = "wasm32")]
use std::rc::Rc;
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::closure::Closure;
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::{prelude::wasm_bindgen, JsCast, JsValue};
#[cfg(target_arch = "wasm32")]
use web_sys::{Document, HtmlCanvasElement, MouseEvent, TouchEvent, Window};

#[cfg(target_arch = "wasm32")]
use assets::AssetCatalog;
#[cfg(target_arch = "wasm32")]
use config::PlayableConfig;
#[cfg(target_arch = "wasm32")]
use controller::{DropStage, LifecycleController};
#[cfg(target_arch = "wasm32")]
use view::{GpuContext, ProxyRenderer};

#[cfg(target_arch = "wasm32")]
thread_local! {
    static APP: RefCell<Option<Rc<RefCell<LifecycleController>>>> = RefCell::new(None);
}

#[cfg(target_arch = "wasm32")]
fn with_app(f: impl FnOnce(&mut LifecycleController)) {
    APP.with(|app| match app.borrow().as_ref() {
        Some(app) => f(&mut app.borrow_mut()),
        None => tracing::warn!("host call before initGame, ignoring"),
    });
}

/// Host entry point: create the canvas and GPU surface, build the
/// controller, and hand it the built-in assets. Must be called exactly once
/// before any of the other exports.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(js_name = initGame)]
pub async fn init_game() -> Result<(), JsValue> {
    logging::init();

    let (window, document, canvas) = init_canvas()?;
    let (width, height) = (canvas.width(), canvas.height());

    let gpu = GpuContext::new(&canvas, width, height)
        .await
        .map_err(|e| js_error(format!("GPU init failed: {e:?}")))?;
    let renderer = ProxyRenderer::new(gpu);

    let app = Rc::new(RefCell::new(LifecycleController::new(
        PlayableConfig::default(),
        DropStage::factory(),
        Box::new(renderer),
    )));

    {
        let mut app = app.borrow_mut();
        app.resize(Some((width, height)));
        app.initialize();
        // Assets are procedural, so readiness is immediate
        app.assets_ready(AssetCatalog::builtin());
    }

    setup_input_listeners(&window, &document, &canvas, app.clone())?;

    // Continuous frame loop via requestAnimationFrame
    let last_time = Rc::new(RefCell::new(
        window.performance().map(|p| p.now()).unwrap_or(0.0),
    ));
    let raf = RcCellCallback::new(window.clone(), {
        let app = app.clone();
        let window = window.clone();
        move || {
            let now = window.performance().map(|p| p.now()).unwrap_or(0.0);
            let mut last = last_time.borrow_mut();
            let dt = ((now - *last) / 1000.0).clamp(0.0, 0.1) as f32;
            *last = now;
            drop(last);

            app.borrow_mut().on_frame(dt);
        }
    });
    raf.start();

    APP.with(|slot| *slot.borrow_mut() = Some(app));
    Ok(())
}

/// Host entry point: start the first round, or reset into a fresh one.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(js_name = startGame)]
pub fn start_game() {
    with_app(|app| app.reset());
}

/// Host entry point: the embedding viewport changed. Uses the given pixel
/// size, or the live window size when the host passes nothing. Safe at any
/// time, including before `initGame` completes.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(js_name = playableResize)]
pub fn playable_resize(width: Option<u32>, height: Option<u32>) {
    let size = web_sys::window().and_then(|window| {
        let width = match width {
            Some(w) => w,
            None => window.inner_width().ok()?.as_f64()? as u32,
        };
        let height = match height {
            Some(h) => h,
            None => window.inner_height().ok()?.as_f64()? as u32,
        };
        if let Some(canvas) = canvas_element(&window) {
            canvas.set_width(width);
            canvas.set_height(height);
        }
        Some((width, height))
    });
    with_app(|app| app.resize(size));
}

/// Host entry point: pause or resume the playable.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(js_name = paused)]
pub fn paused(flag: bool) {
    with_app(|app| app.pause(flag));
}

/// Host entry point: level-start notification for the live stage.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(js_name = startLevel)]
pub fn start_level() {
    with_app(|app| app.start_level());
}

#[cfg(target_arch = "wasm32")]
const CANVAS_ID: &str = "playable-canvas";

#[cfg(target_arch = "wasm32")]
fn canvas_element(window: &Window) -> Option<HtmlCanvasElement> {
    window
        .document()?
        .get_element_by_id(CANVAS_ID)?
        .dyn_into::<HtmlCanvasElement>()
        .ok()
}

#[cfg(target_arch = "wasm32")]
fn init_canvas() -> Result<(Window, Document, HtmlCanvasElement), JsValue> {
    let window = web_sys::window().ok_or(js_error("no global `window`"))?;
    let document = window.document().ok_or(js_error("no document on window"))?;

    // Reuse a canvas the host page already placed, otherwise create one
    if let Some(canvas) = canvas_element(&window) {
        return Ok((window, document, canvas));
    }

    let body = document.body().ok_or(js_error("no body on document"))?;
    let canvas = document
        .create_element("canvas")?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|_| js_error("failed to create canvas"))?;
    canvas.set_id(CANVAS_ID);
    let width = window.inner_width()?.as_f64().unwrap_or(800.0) as u32;
    let height = window.inner_height()?.as_f64().unwrap_or(600.0) as u32;
    canvas.set_width(width.max(1));
    canvas.set_height(height.max(1));
    body.append_child(&canvas)?;
    Ok((window, document, canvas))
}

#[cfg(target_arch = "wasm32")]
fn setup_input_listeners(
    window: &Window,
    document: &Document,
    canvas: &HtmlCanvasElement,
    app: Rc<RefCell<LifecycleController>>,
) -> Result<(), JsValue> {
    // Mouse move
    {
        let app = app.clone();
        let canvas = canvas.clone();
        let mm = Closure::wrap(Box::new(move |e: MouseEvent| {
            let (w, h) = (canvas.width() as f32, canvas.height() as f32);
            app.borrow_mut()
                .pointer
                .moved(e.client_x() as f32, e.client_y() as f32, w, h);
        }) as Box<dyn FnMut(MouseEvent)>);
        document.add_event_listener_with_callback("mousemove", mm.as_ref().unchecked_ref())?;
        mm.forget();
    }

    // Mouse down / up
    {
        let app = app.clone();
        let canvas_down = canvas.clone();
        let mousedown = Closure::wrap(Box::new(move |e: MouseEvent| {
            let (w, h) = (canvas_down.width() as f32, canvas_down.height() as f32);
            app.borrow_mut()
                .pointer
                .down(e.client_x() as f32, e.client_y() as f32, w, h);
        }) as Box<dyn FnMut(MouseEvent)>);
        document.add_event_listener_with_callback("mousedown", mousedown.as_ref().unchecked_ref())?;
        mousedown.forget();
    }
    {
        let app = app.clone();
        let mouseup = Closure::wrap(Box::new(move |_e: MouseEvent| {
            app.borrow_mut().pointer.up();
        }) as Box<dyn FnMut(MouseEvent)>);
        document.add_event_listener_with_callback("mouseup", mouseup.as_ref().unchecked_ref())?;
        mouseup.forget();
    }

    // Touch start / move / end map onto the same pointer state
    {
        let app = app.clone();
        let canvas_touch = canvas.clone();
        let touchstart = Closure::wrap(Box::new(move |e: TouchEvent| {
            if let Some(touch) = e.touches().item(0) {
                let (w, h) = (canvas_touch.width() as f32, canvas_touch.height() as f32);
                app.borrow_mut()
                    .pointer
                    .down(touch.client_x() as f32, touch.client_y() as f32, w, h);
            }
        }) as Box<dyn FnMut(TouchEvent)>);
        document.add_event_listener_with_callback("touchstart", touchstart.as_ref().unchecked_ref())?;
        touchstart.forget();
    }
    {
        let app = app.clone();
        let canvas_touch = canvas.clone();
        let touchmove = Closure::wrap(Box::new(move |e: TouchEvent| {
            if let Some(touch) = e.touches().item(0) {
                let (w, h) = (canvas_touch.width() as f32, canvas_touch.height() as f32);
                app.borrow_mut()
                    .pointer
                    .moved(touch.client_x() as f32, touch.client_y() as f32, w, h);
            }
        }) as Box<dyn FnMut(TouchEvent)>);
        document.add_event_listener_with_callback("touchmove", touchmove.as_ref().unchecked_ref())?;
        touchmove.forget();
    }
    {
        let app = app.clone();
        let touchend = Closure::wrap(Box::new(move |_e: TouchEvent| {
            app.borrow_mut().pointer.up();
        }) as Box<dyn FnMut(TouchEvent)>);
        document.add_event_listener_with_callback("touchend", touchend.as_ref().unchecked_ref())?;
        touchend.forget();
    }

    // Window resize and orientation changes mirror the host's explicit
    // playableResize call
    for event_name in ["resize", "orientationchange"] {
        let app = app.clone();
        let window_resize = window.clone();
        let resize = Closure::wrap(Box::new(move |_e: web_sys::Event| {
            let size = (|| {
                let width = window_resize.inner_width().ok()?.as_f64()? as u32;
                let height = window_resize.inner_height().ok()?.as_f64()? as u32;
                if let Some(canvas) = canvas_element(&window_resize) {
                    canvas.set_width(width);
                    canvas.set_height(height);
                }
                Some((width, height))
            })();
            app.borrow_mut().resize(size);
        }) as Box<dyn FnMut(web_sys::Event)>);
        window.add_event_listener_with_callback(event_name, resize.as_ref().unchecked_ref())?;
        resize.forget();
    }

    Ok(())
}

#[cfg(target_arch = "wasm32")]
fn js_error<E: Into<String>>(msg: E) -> JsValue {
    JsValue::from_str(&msg.into())
}

#[cfg(target_arch = "wasm32")]
struct RcCellCallback {
    inner: Rc<RefCell<Box<dyn FnMut()>>>,
    window: Window,
}

#[cfg(target_arch = "wasm32")]
impl RcCellCallback {
    fn new(window: Window, f: impl FnMut() + 'static) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Box::new(f))),
            window,
        }
    }

    fn start(self) {
        let inner = self.inner.clone();
        let window = self.window.clone();

        let callback = Rc::new(RefCell::new(None::<Closure<dyn FnMut()>>));
        let callback_clone = callback.clone();

        *callback.borrow_mut() = Some(Closure::wrap(Box::new(move || {
            inner.borrow_mut().as_mut()();

            // Recursively schedule next frame
            let cb_ref = callback_clone.borrow();
            window
                .request_animation_frame(cb_ref.as_ref().unwrap().as_ref().unchecked_ref())
                .expect("RAF failed");
        }) as Box<dyn FnMut()>));

        self.window
            .request_animation_frame(
                callback.borrow().as_ref().unwrap().as_ref().unchecked_ref(),
            )
            .expect("RAF start failed");

        // Leak the closure to keep it alive
        std::mem::forget(callback);
    }
}
