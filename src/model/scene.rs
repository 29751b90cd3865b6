use glam::{Quat, Vec3};

/// Renderable silhouette of a visual proxy. The renderer owns one mesh per
/// variant and scales it per-instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProxyShape {
    Sphere { radius: f32 },
    Cuboid { half_extents: Vec3 },
    Plane { extent: f32 },
}

/// A renderable transform standing in for something else, typically a
/// simulation body, kept in sync through the binding table. Proxies with no
/// binding are static scenery.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualProxy {
    pub position: Vec3,
    pub orientation: Quat,
    pub shape: ProxyShape,
    pub color: [f32; 4],
    pub visible: bool,
}

impl VisualProxy {
    pub fn new(shape: ProxyShape, position: Vec3, color: [f32; 4]) -> Self {
        Self {
            position,
            orientation: Quat::IDENTITY,
            shape,
            color,
            visible: true,
        }
    }
}

/// Generational handle into the scene's proxy arena. Stale handles (to
/// removed proxies, even if the slot was reused) never resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProxyId {
    index: usize,
    generation: u32,
}

struct ProxySlot {
    generation: u32,
    proxy: Option<VisualProxy>,
}

pub struct DirectionalLight {
    pub direction: Vec3,
    pub intensity: f32,
}

/// The scene graph: proxy arena plus the handful of whole-scene knobs the
/// lifecycle controller is allowed to touch (visibility, background color,
/// lighting). Mesh construction and materials live in the view layer.
pub struct Scene {
    slots: Vec<ProxySlot>,
    count: usize,
    pub background: [f32; 4],
    pub visible: bool,
    pub ambient_intensity: f32,
    pub sun: DirectionalLight,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            count: 0,
            background: [0.0, 0.0, 0.0, 1.0],
            visible: false,
            ambient_intensity: 0.35,
            sun: DirectionalLight {
                direction: Vec3::new(0.4, 1.0, 0.6).normalize(),
                intensity: 0.8,
            },
        }
    }

    pub fn add(&mut self, proxy: VisualProxy) -> ProxyId {
        self.count += 1;
        if let Some(index) = self.slots.iter().position(|s| s.proxy.is_none()) {
            let slot = &mut self.slots[index];
            slot.generation += 1;
            slot.proxy = Some(proxy);
            return ProxyId {
                index,
                generation: slot.generation,
            };
        }
        self.slots.push(ProxySlot {
            generation: 0,
            proxy: Some(proxy),
        });
        ProxyId {
            index: self.slots.len() - 1,
            generation: 0,
        }
    }

    pub fn remove(&mut self, id: ProxyId) -> Option<VisualProxy> {
        let slot = self.slots.get_mut(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        let removed = slot.proxy.take();
        if removed.is_some() {
            self.count -= 1;
        }
        removed
    }

    pub fn get(&self, id: ProxyId) -> Option<&VisualProxy> {
        let slot = self.slots.get(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.proxy.as_ref()
    }

    pub fn get_mut(&mut self, id: ProxyId) -> Option<&mut VisualProxy> {
        let slot = self.slots.get_mut(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.proxy.as_mut()
    }

    pub fn proxy_count(&self) -> usize {
        self.count
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProxyId, &VisualProxy)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.proxy.as_ref().map(|p| {
                (
                    ProxyId {
                        index,
                        generation: slot.generation,
                    },
                    p,
                )
            })
        })
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere(y: f32) -> VisualProxy {
        VisualProxy::new(
            ProxyShape::Sphere { radius: 0.5 },
            Vec3::new(0.0, y, 0.0),
            [1.0; 4],
        )
    }

    #[test]
    fn stale_handle_does_not_resolve_after_slot_reuse() {
        let mut scene = Scene::new();
        let a = scene.add(sphere(1.0));
        scene.remove(a);
        let b = scene.add(sphere(2.0));

        assert!(scene.get(a).is_none());
        assert_eq!(scene.get(b).unwrap().position.y, 2.0);
        assert_eq!(scene.proxy_count(), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut scene = Scene::new();
        let a = scene.add(sphere(1.0));
        assert!(scene.remove(a).is_some());
        assert!(scene.remove(a).is_none());
        assert_eq!(scene.proxy_count(), 0);
    }
}
