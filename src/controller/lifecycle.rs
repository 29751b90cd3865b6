use tracing::{debug, info, trace, warn};

use crate::assets::AssetCatalog;
use crate::config::PlayableConfig;
use crate::controller::bindings::BindingTable;
use crate::controller::input::PointerState;
use crate::controller::physics::PhysicsWorld;
use crate::controller::stage::{Stage, StageContext, StageFactory};
use crate::model::{Camera, Scene};
use crate::ui::UiLayer;

/// Output seam between the controller and whatever presents frames.
///
/// The wgpu renderer implements this for real surfaces; tests substitute a
/// recording sink so the whole lifecycle runs headless.
pub trait RenderSink {
    fn resize(&mut self, width: u32, height: u32);
    fn render(&mut self, scene: &Scene, camera: &Camera);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Constructed, `initialize` not yet called.
    Uninitialized,
    /// Waiting for the asset catalog.
    Loading,
    /// Assets arrived; world and first stage under construction.
    Building,
    /// Simulating and rendering.
    Ready,
    /// Rendering without advancing simulation.
    Paused,
    /// Old stage torn down, rebuild pending.
    Resetting,
}

/// Deferred continuation of a staged reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StagedAction {
    RebuildStage,
    StartRound,
}

/// Everything that only exists once building has completed.
struct BuiltWorld {
    camera: Camera,
    scene: Scene,
    physics: PhysicsWorld,
    ui: UiLayer,
    assets: AssetCatalog,
}

/// Owner of the application state machine.
///
/// All host entry points funnel through here. Calls that arrive in a state
/// where they make no sense are logged and dropped rather than acted on;
/// the only fatal condition is a binding whose endpoints have vanished,
/// and that one only in debug builds.
pub struct LifecycleController {
    state: LifecycleState,
    config: PlayableConfig,
    /// Completed round starts. Zero means the first round has not begun.
    round: u32,
    built: Option<BuiltWorld>,
    bindings: BindingTable,
    stage: Option<Box<dyn Stage>>,
    stage_factory: StageFactory,
    render_sink: Box<dyn RenderSink>,
    pub pointer: PointerState,
    viewport: (u32, u32),
    /// Countdown timers for staged reset continuations, in seconds.
    pending: Vec<(f32, StagedAction)>,
}

impl LifecycleController {
    pub fn new(
        config: PlayableConfig,
        stage_factory: StageFactory,
        render_sink: Box<dyn RenderSink>,
    ) -> Self {
        Self {
            state: LifecycleState::Uninitialized,
            config,
            round: 0,
            built: None,
            bindings: BindingTable::new(),
            stage: None,
            stage_factory,
            render_sink,
            pointer: PointerState::new(),
            viewport: (1280, 720),
            pending: Vec::new(),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.state == LifecycleState::Paused
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.built.as_ref().map(|b| &b.scene)
    }

    pub fn physics(&self) -> Option<&PhysicsWorld> {
        self.built.as_ref().map(|b| &b.physics)
    }

    pub fn camera(&self) -> Option<&Camera> {
        self.built.as_ref().map(|b| &b.camera)
    }

    pub fn ui(&self) -> Option<&UiLayer> {
        self.built.as_ref().map(|b| &b.ui)
    }

    /// Host entry point: begin loading. Valid exactly once, from
    /// `Uninitialized`; repeated calls are logged no-ops.
    pub fn initialize(&mut self) {
        if self.state != LifecycleState::Uninitialized {
            warn!(state = ?self.state, "initialize called out of order, ignoring");
            return;
        }
        info!("initializing, waiting for assets");
        self.state = LifecycleState::Loading;
    }

    /// One-shot readiness signal from the loader. Builds the world, the
    /// first stage, and enters `Ready`. Ignored outside `Loading`.
    pub fn assets_ready(&mut self, assets: AssetCatalog) {
        if self.state != LifecycleState::Loading {
            warn!(state = ?self.state, "asset readiness signal out of order, ignoring");
            return;
        }
        self.state = LifecycleState::Building;
        debug!(assets = assets.len(), "building world");

        let (width, height) = self.viewport;
        self.built = Some(BuiltWorld {
            camera: Camera::new(width, height),
            scene: Scene::new(),
            physics: PhysicsWorld::new(self.config.gravity_scale),
            ui: UiLayer::new(self.config.ui_depth),
            assets,
        });
        self.render_sink.resize(width, height);

        self.construct_stage();
        self.state = LifecycleState::Ready;
        info!("build complete, ready");
    }

    /// Host entry point: start the first round, or tear the current one
    /// down and stage a rebuild. Ignored unless `Ready` or `Paused`.
    pub fn reset(&mut self) {
        match self.state {
            LifecycleState::Ready | LifecycleState::Paused => {}
            other => {
                warn!(state = ?other, "reset ignored in this state");
                return;
            }
        }
        // A staged start is already consuming this request; a second reset
        // here would start the same round twice.
        if !self.pending.is_empty() {
            warn!("reset ignored while a previous reset is still staged");
            return;
        }

        if self.round == 0 {
            // First launch: the stage built during construction is still
            // pristine, so there is nothing to tear down.
            info!("starting first round");
            self.state = LifecycleState::Ready;
            self.schedule(self.config.start_delay, StagedAction::StartRound);
        } else {
            info!(round = self.round, "resetting");
            self.state = LifecycleState::Resetting;
            self.teardown_stage();
            self.schedule(self.config.rebuild_delay, StagedAction::RebuildStage);
        }
    }

    /// Host entry point: pause or resume. Redundant calls are no-ops; calls
    /// in any other state are dropped.
    pub fn pause(&mut self, paused: bool) {
        match (paused, self.state) {
            (true, LifecycleState::Ready) => {
                info!("paused");
                self.state = LifecycleState::Paused;
            }
            (false, LifecycleState::Paused) => {
                info!("resumed");
                self.state = LifecycleState::Ready;
            }
            (true, LifecycleState::Paused) | (false, LifecycleState::Ready) => {}
            (_, other) => trace!(state = ?other, "pause change ignored"),
        }
    }

    /// Host entry point: the presentation surface changed size. Safe in
    /// every state; before the world exists the size is only recorded and
    /// applied when building completes.
    pub fn resize(&mut self, size: Option<(u32, u32)>) {
        if let Some((width, height)) = size {
            if width == 0 || height == 0 {
                warn!(width, height, "ignoring degenerate resize");
                return;
            }
            self.viewport = (width, height);
        }
        let (width, height) = self.viewport;
        match self.built.as_mut() {
            Some(built) => {
                built.camera.set_aspect(width, height);
                self.render_sink.resize(width, height);
            }
            None => trace!(width, height, "resize recorded before build"),
        }
    }

    /// Host entry point: forward a level-start notification to the live
    /// stage. Ignored while no stage can receive it.
    pub fn start_level(&mut self) {
        match self.state {
            LifecycleState::Ready | LifecycleState::Paused => {
                if let Some(stage) = self.stage.as_mut() {
                    stage.level_start();
                }
            }
            other => warn!(state = ?other, "start_level ignored in this state"),
        }
    }

    /// Per-frame tick with the real elapsed time since the previous tick.
    ///
    /// Staged reset continuations always advance, so a reset completes even
    /// while paused. Everything else is gated on `Ready`: UI context,
    /// stage update, physics, binding sync (exactly once, after the step),
    /// then the render.
    pub fn on_frame(&mut self, dt: f32) {
        self.advance_pending(dt);

        if self.state != LifecycleState::Ready {
            trace!(state = ?self.state, "frame skipped");
            return;
        }
        let Some(built) = self.built.as_mut() else {
            return;
        };

        let view = built.camera.view_size_at(self.config.ui_depth);
        built.ui.set_context(view);

        if let Some(stage) = self.stage.as_mut() {
            stage.update(dt * self.config.fixed_frame_rate as f32, &view);
        }

        built
            .physics
            .step(self.config.fixed_time_step(), dt, self.config.max_substeps);
        self.bindings.sync_all(&built.physics, &mut built.scene);

        self.render_sink.render(&built.scene, &built.camera);
    }

    /// Run `action` after `delay` seconds of frame time. A non-positive
    /// delay runs it within this call.
    fn schedule(&mut self, delay: f32, action: StagedAction) {
        if delay <= 0.0 {
            self.run_action(action);
        } else {
            self.pending.push((delay, action));
        }
    }

    fn advance_pending(&mut self, dt: f32) {
        if self.pending.is_empty() {
            return;
        }
        let mut due = Vec::new();
        self.pending.retain_mut(|(remaining, action)| {
            *remaining -= dt;
            if *remaining <= 0.0 {
                due.push(*action);
                false
            } else {
                true
            }
        });
        for action in due {
            self.run_action(action);
        }
    }

    fn run_action(&mut self, action: StagedAction) {
        match action {
            StagedAction::RebuildStage => {
                debug!("rebuilding stage");
                self.construct_stage();
                if let Some(built) = self.built.as_mut() {
                    built.ui.rebuild();
                }
                self.schedule(self.config.start_delay, StagedAction::StartRound);
            }
            StagedAction::StartRound => {
                if let Some(stage) = self.stage.as_mut() {
                    stage.start();
                }
                if self.state == LifecycleState::Resetting {
                    self.state = LifecycleState::Ready;
                }
                self.round += 1;
                info!(round = self.round, "round started");
            }
        }
    }

    fn construct_stage(&mut self) {
        let Some(built) = self.built.as_mut() else {
            return;
        };
        let mut stage = (self.stage_factory)();
        let mut ctx = StageContext {
            physics: &mut built.physics,
            scene: &mut built.scene,
            bindings: &mut self.bindings,
            assets: &built.assets,
        };
        stage.construct(&mut ctx);
        self.stage = Some(stage);
    }

    /// Dispose the live stage and verify it cleaned up after itself. Any
    /// leftovers are reported and removed so the next round starts from an
    /// empty world regardless.
    fn teardown_stage(&mut self) {
        let Some(built) = self.built.as_mut() else {
            return;
        };
        built.ui.dispose();

        if let Some(mut stage) = self.stage.take() {
            let mut ctx = StageContext {
                physics: &mut built.physics,
                scene: &mut built.scene,
                bindings: &mut self.bindings,
                assets: &built.assets,
            };
            stage.dispose(&mut ctx);
        }

        if !self.bindings.is_empty() {
            warn!(leftover = self.bindings.len(), "stage left bindings behind");
            self.bindings.clear();
        }
        if built.physics.body_count() > 0 {
            warn!(
                leftover = built.physics.body_count(),
                "stage left bodies behind"
            );
            built.physics.clear();
        }
        if built.scene.proxy_count() > 0 {
            warn!(
                leftover = built.scene.proxy_count(),
                "stage left proxies behind"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::stage::DropStage;
    use glam::Vec3;
    use std::cell::RefCell;
    use std::rc::Rc;

    const DT: f32 = 1.0 / 60.0;

    #[derive(Default)]
    struct SinkLog {
        renders: usize,
        last_resize: Option<(u32, u32)>,
    }

    struct RecordingSink(Rc<RefCell<SinkLog>>);

    impl RenderSink for RecordingSink {
        fn resize(&mut self, width: u32, height: u32) {
            self.0.borrow_mut().last_resize = Some((width, height));
        }
        fn render(&mut self, _scene: &Scene, _camera: &Camera) {
            self.0.borrow_mut().renders += 1;
        }
    }

    fn controller(config: PlayableConfig) -> (LifecycleController, Rc<RefCell<SinkLog>>) {
        let log = Rc::new(RefCell::new(SinkLog::default()));
        let sink = RecordingSink(Rc::clone(&log));
        (
            LifecycleController::new(config, DropStage::factory(), Box::new(sink)),
            log,
        )
    }

    fn booted() -> (LifecycleController, Rc<RefCell<SinkLog>>) {
        let (mut app, log) = controller(PlayableConfig::immediate());
        app.initialize();
        app.assets_ready(AssetCatalog::builtin());
        (app, log)
    }

    fn dynamic_positions(app: &LifecycleController) -> Vec<Vec3> {
        app.bindings()
            .iter()
            .map(|(body, _)| app.physics().unwrap().body(*body).unwrap().position)
            .collect()
    }

    #[test]
    fn lifecycle_calls_out_of_order_are_no_ops() {
        let (mut app, log) = controller(PlayableConfig::immediate());

        // Nothing may happen before initialize
        app.reset();
        app.start_level();
        app.pause(true);
        app.on_frame(DT);
        assert_eq!(app.state(), LifecycleState::Uninitialized);
        assert_eq!(log.borrow().renders, 0);

        app.initialize();
        app.initialize(); // second call ignored
        assert_eq!(app.state(), LifecycleState::Loading);

        app.assets_ready(AssetCatalog::builtin());
        assert_eq!(app.state(), LifecycleState::Ready);
        app.assets_ready(AssetCatalog::builtin()); // readiness is one-shot
        assert_eq!(app.state(), LifecycleState::Ready);
    }

    #[test]
    fn repeated_resets_never_accumulate_bodies() {
        let (mut app, _) = booted();
        assert_eq!(app.physics().unwrap().body_count(), DropStage::BODY_COUNT);

        app.reset(); // first launch
        assert_eq!(app.round(), 1);

        for expected_round in 2..6 {
            app.reset();
            assert_eq!(app.state(), LifecycleState::Ready);
            assert_eq!(app.round(), expected_round);
            assert_eq!(app.physics().unwrap().body_count(), DropStage::BODY_COUNT);
            assert_eq!(app.bindings().len(), 2);
            for _ in 0..30 {
                app.on_frame(DT);
            }
        }
    }

    #[test]
    fn proxies_match_bodies_exactly_after_each_frame() {
        let (mut app, _) = booted();
        app.reset();

        // Four simulated seconds: drop, tumble, come to rest
        for _ in 0..240 {
            app.on_frame(DT);
            for (body_id, proxy_id) in app.bindings().iter() {
                let body = app.physics().unwrap().body(*body_id).unwrap();
                let proxy = app.scene().unwrap().get(*proxy_id).unwrap();
                assert_eq!(proxy.position, body.position);
                assert_eq!(proxy.orientation, body.orientation);
            }
        }

        for position in dynamic_positions(&app) {
            assert!((position.y - 0.5).abs() < 1e-3, "rest height {}", position.y);
        }
    }

    #[test]
    fn pause_freezes_simulation_and_presentation() {
        let (mut app, log) = booted();
        app.reset();
        for _ in 0..10 {
            app.on_frame(DT);
        }
        let frozen = dynamic_positions(&app);
        let time_before = app.physics().unwrap().simulated_time();

        app.pause(true);
        app.pause(true); // idempotent
        assert!(app.is_paused());
        let renders_before = log.borrow().renders;
        for _ in 0..30 {
            app.on_frame(DT);
        }
        assert_eq!(dynamic_positions(&app), frozen);
        assert_eq!(app.physics().unwrap().simulated_time(), time_before);
        // Paused frames neither simulate nor present
        assert_eq!(log.borrow().renders, renders_before);

        app.pause(false);
        app.on_frame(DT);
        assert_ne!(dynamic_positions(&app), frozen);
    }

    #[test]
    fn resize_before_initialize_is_safe_and_applied_later() {
        let (mut app, log) = controller(PlayableConfig::immediate());
        app.resize(Some((640, 480)));
        assert!(log.borrow().last_resize.is_none());

        app.initialize();
        app.assets_ready(AssetCatalog::builtin());
        assert_eq!(log.borrow().last_resize, Some((640, 480)));

        let early_aspect = app.camera().unwrap().aspect;
        let (mut late, _) = booted();
        late.resize(Some((640, 480)));
        assert_eq!(early_aspect, late.camera().unwrap().aspect);

        // Degenerate sizes never reach the camera or the sink
        app.resize(Some((0, 480)));
        assert_eq!(log.borrow().last_resize, Some((640, 480)));
    }

    #[test]
    fn long_frame_is_capped_at_max_substeps() {
        let (mut app, _) = booted();
        app.reset();

        app.on_frame(25.0 * DT);
        let simulated = app.physics().unwrap().simulated_time();
        assert!((simulated - 10.0 * DT as f64).abs() < 1e-9);
    }

    #[test]
    fn staged_reset_completes_only_after_its_delays() {
        let config = PlayableConfig {
            rebuild_delay: 0.5,
            start_delay: 0.2,
            ..PlayableConfig::default()
        };
        let (mut app, _) = controller(config);
        app.initialize();
        app.assets_ready(AssetCatalog::builtin());

        app.reset(); // first launch, start delayed by 0.2 s
        assert_eq!(app.round(), 0);
        app.on_frame(0.3);
        assert_eq!(app.round(), 1);

        app.reset();
        assert_eq!(app.state(), LifecycleState::Resetting);
        assert_eq!(app.physics().unwrap().body_count(), 0);

        app.on_frame(0.25); // 0.25 s < rebuild delay
        assert_eq!(app.physics().unwrap().body_count(), 0);
        assert_eq!(app.state(), LifecycleState::Resetting);

        app.on_frame(0.3); // rebuild fires at 0.55 s
        assert_eq!(app.physics().unwrap().body_count(), DropStage::BODY_COUNT);
        assert_eq!(app.state(), LifecycleState::Resetting);
        assert_eq!(app.round(), 1);

        app.on_frame(0.25); // start fires 0.2 s after the rebuild
        assert_eq!(app.state(), LifecycleState::Ready);
        assert_eq!(app.round(), 2);
    }

    #[test]
    fn back_to_back_starts_launch_a_single_round() {
        let config = PlayableConfig {
            rebuild_delay: 0.5,
            start_delay: 0.5,
            ..PlayableConfig::default()
        };
        let (mut app, _) = controller(config);
        app.initialize();
        app.assets_ready(AssetCatalog::builtin());

        // Two quick start requests while the first is still staged
        app.reset();
        app.reset();
        // No teardown happened in between
        assert_eq!(app.physics().unwrap().body_count(), DropStage::BODY_COUNT);

        app.on_frame(0.6);
        assert_eq!(app.round(), 1);
        assert_eq!(app.state(), LifecycleState::Ready);

        // No second start lingers in the pipeline
        app.on_frame(1.0);
        assert_eq!(app.round(), 1);
    }

    #[test]
    fn reset_while_paused_starts_the_next_round_unpaused() {
        let (mut app, _) = booted();
        app.reset();
        app.pause(true);

        app.reset();
        assert_eq!(app.state(), LifecycleState::Ready);
        assert_eq!(app.round(), 2);
        assert!(!app.is_paused());
    }

    #[test]
    fn stage_hooks_receive_normalized_delta_and_level_start() {
        use crate::model::ViewContext;

        #[derive(Default)]
        struct Tally {
            starts: usize,
            level_starts: usize,
            deltas: Vec<f32>,
        }
        struct TallyStage(Rc<RefCell<Tally>>);
        impl Stage for TallyStage {
            fn construct(&mut self, _ctx: &mut StageContext<'_>) {}
            fn start(&mut self) {
                self.0.borrow_mut().starts += 1;
            }
            fn level_start(&mut self) {
                self.0.borrow_mut().level_starts += 1;
            }
            fn update(&mut self, delta: f32, _view: &ViewContext) {
                self.0.borrow_mut().deltas.push(delta);
            }
            fn dispose(&mut self, _ctx: &mut StageContext<'_>) {}
        }

        let tally = Rc::new(RefCell::new(Tally::default()));
        let tally_for_factory = Rc::clone(&tally);
        let factory: StageFactory =
            Box::new(move || Box::new(TallyStage(tally_for_factory.clone())));
        let log = Rc::new(RefCell::new(SinkLog::default()));
        let mut app = LifecycleController::new(
            PlayableConfig::immediate(),
            factory,
            Box::new(RecordingSink(Rc::clone(&log))),
        );
        app.initialize();
        app.assets_ready(AssetCatalog::builtin());

        app.reset();
        assert_eq!(tally.borrow().starts, 1);

        app.start_level();
        assert_eq!(tally.borrow().level_starts, 1);

        // One nominal frame updates the stage with a delta of exactly 1.0
        app.on_frame(DT);
        let delta = *tally.borrow().deltas.last().unwrap();
        assert!((delta - 1.0).abs() < 1e-4);
    }

    #[test]
    fn ui_context_tracks_camera_projection() {
        let (mut app, _) = booted();
        app.reset();
        app.on_frame(DT);

        let ctx = app.ui().unwrap().context().unwrap();
        let expected = app
            .camera()
            .unwrap()
            .view_size_at(PlayableConfig::default().ui_depth);
        assert_eq!(ctx, expected);

        app.resize(Some((400, 800)));
        app.on_frame(DT);
        let narrow = app.ui().unwrap().context().unwrap();
        assert!(narrow.width < narrow.height);
    }
}
