use glam::Vec3;
use tracing::debug;

use crate::assets::AssetCatalog;
use crate::controller::bindings::BindingTable;
use crate::controller::physics::{Body, BodyId, PhysicsWorld, Shape};
use crate::model::{ProxyId, ProxyShape, Scene, ViewContext, VisualProxy};

/// Mutable world access handed to a stage while it is being constructed or
/// disposed. Stages own the bodies/proxies/bindings they create and must
/// remove all of them in `dispose`.
pub struct StageContext<'a> {
    pub physics: &'a mut PhysicsWorld,
    pub scene: &'a mut Scene,
    pub bindings: &'a mut BindingTable,
    pub assets: &'a AssetCatalog,
}

/// One round of gameplay content. Constructed fresh for every round and
/// disposed before the next one is built; at most one stage is live at a
/// time.
pub trait Stage {
    fn construct(&mut self, ctx: &mut StageContext<'_>);

    /// The round is actually underway (input enabled, timers running).
    fn start(&mut self) {}

    /// Host-driven level hook; unused by the default content.
    fn level_start(&mut self) {}

    /// Per-frame gameplay update. `delta` is normalized to the nominal
    /// frame rate (1.0 at exactly one nominal frame), `view` is the
    /// projected view extents at the configured UI depth.
    fn update(&mut self, delta: f32, view: &ViewContext);

    fn dispose(&mut self, ctx: &mut StageContext<'_>);
}

/// Factory the lifecycle controller uses to build each round's stage.
pub type StageFactory = Box<dyn FnMut() -> Box<dyn Stage>>;

/// The shipped playable content: a ground plane and two rigid bodies
/// dropped from above, tumbling to rest.
pub struct DropStage {
    bodies: Vec<BodyId>,
    proxies: Vec<ProxyId>,
    started: bool,
    round_time: f32,
}

impl DropStage {
    /// Bodies constructed per round (ground plane + ball + crate).
    pub const BODY_COUNT: usize = 3;

    pub fn new() -> Self {
        Self {
            bodies: Vec::new(),
            proxies: Vec::new(),
            started: false,
            round_time: 0.0,
        }
    }

    pub fn factory() -> StageFactory {
        Box::new(|| Box::new(DropStage::new()))
    }

    fn spawn_bound(
        &mut self,
        ctx: &mut StageContext<'_>,
        body: Body,
        shape: ProxyShape,
        color: [f32; 4],
    ) {
        let position = body.position;
        let body_id = ctx.physics.add_body(body);
        let proxy_id = ctx.scene.add(VisualProxy::new(shape, position, color));
        // A fresh stage never re-binds, so this cannot fail
        if ctx.bindings.bind(body_id, proxy_id).is_err() {
            ctx.scene.remove(proxy_id);
            ctx.physics.remove_body(body_id);
            return;
        }
        self.bodies.push(body_id);
        self.proxies.push(proxy_id);
    }
}

impl Default for DropStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for DropStage {
    fn construct(&mut self, ctx: &mut StageContext<'_>) {
        debug!("constructing drop stage");

        // Ground: invisible collider plus a free-standing floor proxy
        self.bodies.push(ctx.physics.add_body(Body::ground_plane(0.0)));
        self.proxies.push(ctx.scene.add(VisualProxy::new(
            ProxyShape::Plane { extent: 60.0 },
            Vec3::ZERO,
            ctx.assets.color("ground"),
        )));

        self.spawn_bound(
            ctx,
            Body::dynamic(
                5.0,
                Shape::Sphere { radius: 0.5 },
                Vec3::new(-1.5, 10.0, 0.0),
            ),
            ProxyShape::Sphere { radius: 0.5 },
            ctx.assets.color("ball"),
        );
        self.spawn_bound(
            ctx,
            Body::dynamic(
                5.0,
                Shape::Cuboid {
                    half_extents: Vec3::splat(0.5),
                },
                Vec3::new(1.5, 12.0, 0.3),
            ),
            ProxyShape::Cuboid {
                half_extents: Vec3::splat(0.5),
            },
            ctx.assets.color("crate"),
        );

        ctx.scene.background = ctx.assets.color("sky");
        ctx.scene.visible = true;
    }

    fn start(&mut self) {
        self.started = true;
        self.round_time = 0.0;
    }

    fn update(&mut self, delta: f32, _view: &ViewContext) {
        if self.started {
            self.round_time += delta;
        }
    }

    fn dispose(&mut self, ctx: &mut StageContext<'_>) {
        debug!(round_time = self.round_time, "disposing drop stage");
        for body in self.bodies.drain(..) {
            ctx.bindings.unbind(body);
            ctx.physics.remove_body(body);
        }
        for proxy in self.proxies.drain(..) {
            ctx.scene.remove(proxy);
        }
        self.started = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_parts() -> (PhysicsWorld, Scene, BindingTable, AssetCatalog) {
        (
            PhysicsWorld::new(2.0),
            Scene::new(),
            BindingTable::new(),
            AssetCatalog::builtin(),
        )
    }

    #[test]
    fn construct_then_dispose_leaves_nothing_behind() {
        let (mut physics, mut scene, mut bindings, assets) = ctx_parts();
        let mut stage = DropStage::new();

        let mut ctx = StageContext {
            physics: &mut physics,
            scene: &mut scene,
            bindings: &mut bindings,
            assets: &assets,
        };
        stage.construct(&mut ctx);
        assert_eq!(ctx.physics.body_count(), DropStage::BODY_COUNT);
        assert_eq!(ctx.bindings.len(), 2);
        assert_eq!(ctx.scene.proxy_count(), 3);

        stage.dispose(&mut ctx);
        assert_eq!(ctx.physics.body_count(), 0);
        assert_eq!(ctx.bindings.len(), 0);
        assert_eq!(ctx.scene.proxy_count(), 0);
    }

    #[test]
    fn ground_body_and_floor_proxy_are_unbound() {
        let (mut physics, mut scene, mut bindings, assets) = ctx_parts();
        let mut stage = DropStage::new();
        let mut ctx = StageContext {
            physics: &mut physics,
            scene: &mut scene,
            bindings: &mut bindings,
            assets: &assets,
        };
        stage.construct(&mut ctx);

        let unbound_bodies = ctx
            .physics
            .iter()
            .filter(|(id, _)| !ctx.bindings.is_bound(*id))
            .count();
        assert_eq!(unbound_bodies, 1);
    }
}
