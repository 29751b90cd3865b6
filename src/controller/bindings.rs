use thiserror::Error;
use tracing::error;

use crate::controller::physics::{BodyId, PhysicsWorld};
use crate::model::{ProxyId, Scene};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BindError {
    #[error("body {0:?} is already bound to a visual proxy")]
    AlreadyBound(BodyId),
}

/// The body↔proxy binding table.
///
/// Each entry pairs a simulation body with the visual transform that stands
/// in for it on screen. A body holds at most one binding; a binding must be
/// removed before either side is destroyed. The table itself imposes no
/// ordering on its entries.
#[derive(Default)]
pub struct BindingTable {
    entries: Vec<(BodyId, ProxyId)>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate a body with a proxy. Rejects a second binding for the same
    /// body; rebinding requires an explicit `unbind` first.
    pub fn bind(&mut self, body: BodyId, proxy: ProxyId) -> Result<(), BindError> {
        if self.entries.iter().any(|(b, _)| *b == body) {
            return Err(BindError::AlreadyBound(body));
        }
        self.entries.push((body, proxy));
        Ok(())
    }

    /// Remove the binding for `body`, if any. Idempotent.
    pub fn unbind(&mut self, body: BodyId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(b, _)| *b != body);
        before != self.entries.len()
    }

    pub fn is_bound(&self, body: BodyId) -> bool {
        self.entries.iter().any(|(b, _)| *b == body)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &(BodyId, ProxyId)> {
        self.entries.iter()
    }

    /// Copy every bound body's transform into its proxy, exactly once.
    ///
    /// Called once per rendered frame, after the physics step, so proxies
    /// show only final post-step state. A binding whose body or proxy no
    /// longer exists indicates a missed `unbind`: fatal in debug builds,
    /// dropped with a diagnostic in release.
    pub fn sync_all(&mut self, world: &PhysicsWorld, scene: &mut Scene) {
        self.entries.retain(|(body_id, proxy_id)| {
            let (Some(body), Some(proxy)) = (world.body(*body_id), scene.get_mut(*proxy_id))
            else {
                debug_assert!(false, "dangling binding {body_id:?} -> {proxy_id:?}");
                error!(?body_id, ?proxy_id, "dropping dangling binding");
                return false;
            };
            proxy.position = body.position;
            proxy.orientation = body.orientation;
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::physics::{Body, Shape};
    use crate::model::{ProxyShape, VisualProxy};
    use glam::{Quat, Vec3};

    fn world_with_sphere(y: f32) -> (PhysicsWorld, BodyId) {
        let mut world = PhysicsWorld::new(1.0);
        let id = world.add_body(Body::dynamic(
            5.0,
            Shape::Sphere { radius: 0.5 },
            Vec3::new(0.0, y, 0.0),
        ));
        (world, id)
    }

    fn scene_with_sphere() -> (Scene, ProxyId) {
        let mut scene = Scene::new();
        let id = scene.add(VisualProxy::new(
            ProxyShape::Sphere { radius: 0.5 },
            Vec3::ZERO,
            [1.0; 4],
        ));
        (scene, id)
    }

    #[test]
    fn double_bind_is_rejected() {
        let (_, body) = world_with_sphere(1.0);
        let (mut scene, proxy) = scene_with_sphere();
        let other = scene.add(VisualProxy::new(
            ProxyShape::Sphere { radius: 0.5 },
            Vec3::ZERO,
            [1.0; 4],
        ));

        let mut table = BindingTable::new();
        assert!(table.bind(body, proxy).is_ok());
        assert_eq!(table.bind(body, other), Err(BindError::AlreadyBound(body)));
        // The original binding survives the rejected attempt
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn unbind_is_idempotent() {
        let (_, body) = world_with_sphere(1.0);
        let (_, proxy) = scene_with_sphere();

        let mut table = BindingTable::new();
        table.bind(body, proxy).unwrap();
        assert!(table.unbind(body));
        assert!(!table.unbind(body));
        assert!(table.is_empty());
    }

    #[test]
    fn sync_copies_body_transform_exactly() {
        let (mut world, body) = world_with_sphere(10.0);
        let (mut scene, proxy) = scene_with_sphere();
        world.body_mut(body).unwrap().orientation =
            Quat::from_rotation_z(0.3);

        let mut table = BindingTable::new();
        table.bind(body, proxy).unwrap();
        world.step(1.0 / 60.0, 1.0 / 60.0, 10);
        table.sync_all(&world, &mut scene);

        let b = world.body(body).unwrap();
        let p = scene.get(proxy).unwrap();
        assert_eq!(p.position, b.position);
        assert_eq!(p.orientation, b.orientation);
    }
}
