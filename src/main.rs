use std::sync::Arc;

use winit::{
    event::*,
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

use tumble::{
    assets::AssetCatalog,
    config::PlayableConfig,
    controller::{DropStage, LifecycleController},
    logging,
    view::{GpuContext, ProxyRenderer},
};

struct App {
    window: Arc<Window>,
    controller: LifecycleController,
    size: winit::dpi::PhysicalSize<u32>,
    cursor: (f64, f64),
    last_frame_time: std::time::Instant,
}

impl App {
    async fn new(window: Arc<Window>) -> Self {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window.clone())
            .expect("Failed to create surface");
        let gpu = GpuContext::new_native(&instance, surface, size.width, size.height).await;
        let renderer = ProxyRenderer::new(gpu);

        let mut controller = LifecycleController::new(
            PlayableConfig::default(),
            DropStage::factory(),
            Box::new(renderer),
        );
        controller.resize(Some((size.width, size.height)));
        controller.initialize();
        controller.assets_ready(AssetCatalog::builtin());
        // Kick off the first round right away when running standalone
        controller.reset();

        Self {
            window,
            controller,
            size,
            cursor: (0.0, 0.0),
            last_frame_time: std::time::Instant::now(),
        }
    }

    fn input(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(code),
                        ..
                    },
                ..
            } => {
                match code {
                    KeyCode::KeyR => self.controller.reset(),
                    KeyCode::KeyP => {
                        let paused = self.controller.is_paused();
                        self.controller.pause(!paused);
                    }
                    KeyCode::KeyL => self.controller.start_level(),
                    _ => return false,
                }
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = (position.x, position.y);
                self.controller.pointer.moved(
                    position.x as f32,
                    position.y as f32,
                    self.size.width as f32,
                    self.size.height as f32,
                );
                true
            }
            WindowEvent::MouseInput { state, button, .. } => {
                if *button == MouseButton::Left {
                    match state {
                        ElementState::Pressed => self.controller.pointer.down(
                            self.cursor.0 as f32,
                            self.cursor.1 as f32,
                            self.size.width as f32,
                            self.size.height as f32,
                        ),
                        ElementState::Released => self.controller.pointer.up(),
                    }
                }
                true
            }
            _ => false,
        }
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.controller
                .resize(Some((new_size.width, new_size.height)));
        }
    }
}

fn main() {
    logging::init();

    let event_loop = EventLoop::new().unwrap();
    let window_attributes = Window::default_attributes()
        .with_title("Tumble - Native")
        .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));
    let window = event_loop.create_window(window_attributes).unwrap();
    let window = Arc::new(window);

    let mut app = pollster::block_on(App::new(window.clone()));

    event_loop
        .run(move |event, elwt| match event {
            Event::WindowEvent {
                ref event,
                window_id,
            } if window_id == app.window.id() => {
                if !app.input(event) {
                    match event {
                        WindowEvent::CloseRequested => elwt.exit(),
                        WindowEvent::Resized(physical_size) => {
                            app.resize(*physical_size);
                        }
                        WindowEvent::RedrawRequested => {
                            let now = std::time::Instant::now();
                            let dt = (now - app.last_frame_time).as_secs_f32();
                            app.last_frame_time = now;

                            app.controller.on_frame(dt);
                        }
                        _ => {}
                    }
                }
            }
            Event::AboutToWait => {
                app.window.request_redraw();
            }
            _ => {}
        })
        .unwrap();
}
