use glam::{Mat3, Quat, Vec3};

const STANDARD_GRAVITY: f32 = 9.82;
const MAX_FALL_SPEED: f32 = 50.0;
const CONTACT_FRICTION: f32 = 0.98;
const CONTACT_ANGULAR_DAMPING: f32 = 0.95;

/// Collision silhouette of a rigid body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Sphere { radius: f32 },
    Cuboid { half_extents: Vec3 },
    /// Infinite horizontal plane; the body's y position is the surface.
    Plane,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Static,
    Dynamic,
}

/// One simulated rigid body. Owned exclusively by the world; everything
/// outside refers to it through a `BodyId`.
#[derive(Debug, Clone)]
pub struct Body {
    pub kind: BodyKind,
    pub mass: f32,
    pub shape: Shape,
    pub position: Vec3,
    pub orientation: Quat,
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
}

impl Body {
    pub fn dynamic(mass: f32, shape: Shape, position: Vec3) -> Self {
        Self {
            kind: BodyKind::Dynamic,
            mass,
            shape,
            position,
            orientation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
        }
    }

    /// Static ground plane with its surface at the given height.
    pub fn ground_plane(surface_y: f32) -> Self {
        Self {
            kind: BodyKind::Static,
            mass: 0.0,
            shape: Shape::Plane,
            position: Vec3::new(0.0, surface_y, 0.0),
            orientation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
        }
    }

    /// Distance from the body's origin to its lowest point, accounting for
    /// the current orientation (support extent along -Y).
    fn bottom_extent(&self) -> f32 {
        match self.shape {
            Shape::Sphere { radius } => radius,
            Shape::Cuboid { half_extents } => {
                let rot = Mat3::from_quat(self.orientation);
                rot.x_axis.y.abs() * half_extents.x
                    + rot.y_axis.y.abs() * half_extents.y
                    + rot.z_axis.y.abs() * half_extents.z
            }
            Shape::Plane => 0.0,
        }
    }
}

/// Generational handle to a body slot. Stale ids never resolve, even after
/// the slot has been reused by a later round's body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyId {
    index: usize,
    generation: u32,
}

struct BodySlot {
    generation: u32,
    body: Option<Body>,
}

/// Rigid-body world stepped in fixed increments.
///
/// `step` is the only entry point that advances time: given the real
/// elapsed duration of a frame it performs `ceil(elapsed / fixed_dt)`
/// substeps, capped at the caller's substep bound. Under a stall the
/// simulation therefore falls behind wall-clock time instead of burning
/// unbounded CPU catching up.
pub struct PhysicsWorld {
    slots: Vec<BodySlot>,
    count: usize,
    pub gravity: Vec3,
    simulated_time: f64,
}

impl PhysicsWorld {
    pub fn new(gravity_scale: f32) -> Self {
        Self {
            slots: Vec::new(),
            count: 0,
            gravity: Vec3::new(0.0, -STANDARD_GRAVITY * gravity_scale, 0.0),
            simulated_time: 0.0,
        }
    }

    pub fn add_body(&mut self, body: Body) -> BodyId {
        self.count += 1;
        if let Some(index) = self.slots.iter().position(|s| s.body.is_none()) {
            let slot = &mut self.slots[index];
            slot.generation += 1;
            slot.body = Some(body);
            return BodyId {
                index,
                generation: slot.generation,
            };
        }
        self.slots.push(BodySlot {
            generation: 0,
            body: Some(body),
        });
        BodyId {
            index: self.slots.len() - 1,
            generation: 0,
        }
    }

    pub fn remove_body(&mut self, id: BodyId) -> Option<Body> {
        let slot = self.slots.get_mut(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        let removed = slot.body.take();
        if removed.is_some() {
            self.count -= 1;
        }
        removed
    }

    /// Drop every body at once. Used by the reset path as the backstop after
    /// stage disposal.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            if slot.body.take().is_some() {
                slot.generation += 1;
            }
        }
        self.count = 0;
    }

    pub fn body(&self, id: BodyId) -> Option<&Body> {
        let slot = self.slots.get(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.body.as_ref()
    }

    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        let slot = self.slots.get_mut(id.index)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.body.as_mut()
    }

    pub fn body_count(&self) -> usize {
        self.count
    }

    pub fn iter(&self) -> impl Iterator<Item = (BodyId, &Body)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.body.as_ref().map(|b| {
                (
                    BodyId {
                        index,
                        generation: slot.generation,
                    },
                    b,
                )
            })
        })
    }

    /// Total simulated time advanced so far, in seconds. Diverges from
    /// wall-clock time whenever the substep cap engages.
    pub fn simulated_time(&self) -> f64 {
        self.simulated_time
    }

    /// Advance the simulation to cover `elapsed` seconds of real time using
    /// substeps of `fixed_dt`, at most `max_substeps` of them. Returns the
    /// number of substeps taken.
    pub fn step(&mut self, fixed_dt: f32, elapsed: f32, max_substeps: u32) -> u32 {
        if fixed_dt <= 0.0 || elapsed <= 0.0 {
            return 0;
        }
        let needed = (elapsed / fixed_dt).ceil() as u32;
        let substeps = needed.min(max_substeps);
        for _ in 0..substeps {
            self.integrate(fixed_dt);
        }
        self.simulated_time += substeps as f64 * fixed_dt as f64;
        substeps
    }

    /// One semi-implicit Euler substep plus ground-plane contact resolution.
    fn integrate(&mut self, dt: f32) {
        let gravity = self.gravity;
        let planes: Vec<f32> = self
            .slots
            .iter()
            .filter_map(|s| s.body.as_ref())
            .filter(|b| matches!(b.shape, Shape::Plane))
            .map(|b| b.position.y)
            .collect();

        for slot in &mut self.slots {
            let Some(body) = slot.body.as_mut() else {
                continue;
            };
            if body.kind == BodyKind::Static {
                continue;
            }

            body.velocity += gravity * dt;
            body.velocity.y = body.velocity.y.max(-MAX_FALL_SPEED);
            body.position += body.velocity * dt;

            if body.angular_velocity != Vec3::ZERO {
                let w = body.angular_velocity;
                let dq = Quat::from_xyzw(w.x, w.y, w.z, 0.0) * body.orientation * 0.5;
                body.orientation = (body.orientation + dq * dt).normalize();
            }

            for &surface_y in &planes {
                let bottom = body.position.y - body.bottom_extent();
                if bottom < surface_y {
                    body.position.y += surface_y - bottom;
                    if body.velocity.y < 0.0 {
                        body.velocity.y = 0.0;
                    }
                    body.velocity.x *= CONTACT_FRICTION;
                    body.velocity.z *= CONTACT_FRICTION;
                    body.angular_velocity *= CONTACT_ANGULAR_DAMPING;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn free_fall_accumulates_gravity_per_substep() {
        let mut world = PhysicsWorld::new(1.0);
        let id = world.add_body(Body::dynamic(
            5.0,
            Shape::Sphere { radius: 0.5 },
            Vec3::new(0.0, 100.0, 0.0),
        ));

        world.step(DT, DT, 10);
        let body = world.body(id).unwrap();
        assert!((body.velocity.y - (-STANDARD_GRAVITY * DT)).abs() < 1e-5);
        assert!(body.position.y < 100.0);
    }

    #[test]
    fn substep_count_is_capped() {
        let mut world = PhysicsWorld::new(1.0);
        world.add_body(Body::dynamic(
            1.0,
            Shape::Sphere { radius: 0.5 },
            Vec3::new(0.0, 10.0, 0.0),
        ));

        // A frame worth 25 fixed steps must only advance 10 of them
        let taken = world.step(DT, 25.0 * DT, 10);
        assert_eq!(taken, 10);
        assert!((world.simulated_time() - 10.0 * DT as f64).abs() < 1e-9);

        // A nominal frame takes exactly one
        let taken = world.step(DT, DT, 10);
        assert_eq!(taken, 1);
    }

    #[test]
    fn zero_elapsed_takes_no_substeps() {
        let mut world = PhysicsWorld::new(1.0);
        assert_eq!(world.step(DT, 0.0, 10), 0);
        assert_eq!(world.simulated_time(), 0.0);
    }

    #[test]
    fn sphere_and_cuboid_come_to_rest_on_the_plane() {
        let mut world = PhysicsWorld::new(2.0);
        world.add_body(Body::ground_plane(0.0));
        let ball = world.add_body(Body::dynamic(
            5.0,
            Shape::Sphere { radius: 0.5 },
            Vec3::new(-1.5, 10.0, 0.0),
        ));
        let cube = world.add_body(Body::dynamic(
            5.0,
            Shape::Cuboid {
                half_extents: Vec3::splat(0.5),
            },
            Vec3::new(1.5, 12.0, 0.0),
        ));

        // Well past the free-fall duration from 12 m
        for _ in 0..360 {
            world.step(DT, DT, 10);
        }

        let ball_y = world.body(ball).unwrap().position.y;
        let cube_y = world.body(cube).unwrap().position.y;
        assert!((ball_y - 0.5).abs() < 1e-3, "ball rests at {ball_y}");
        assert!((cube_y - 0.5).abs() < 1e-3, "cube rests at {cube_y}");
        assert_eq!(world.body(ball).unwrap().velocity.y, 0.0);
    }

    #[test]
    fn static_bodies_never_move() {
        let mut world = PhysicsWorld::new(1.0);
        let plane = world.add_body(Body::ground_plane(-0.5));
        for _ in 0..60 {
            world.step(DT, DT, 10);
        }
        assert_eq!(world.body(plane).unwrap().position.y, -0.5);
    }

    #[test]
    fn stale_id_does_not_resolve_after_slot_reuse() {
        let mut world = PhysicsWorld::new(1.0);
        let a = world.add_body(Body::dynamic(
            1.0,
            Shape::Sphere { radius: 0.5 },
            Vec3::ZERO,
        ));
        world.remove_body(a);
        let b = world.add_body(Body::dynamic(
            1.0,
            Shape::Sphere { radius: 0.5 },
            Vec3::ONE,
        ));

        assert!(world.body(a).is_none());
        assert!(world.body(b).is_some());
        assert_eq!(world.body_count(), 1);
    }

    #[test]
    fn clear_empties_the_world_and_invalidates_ids() {
        let mut world = PhysicsWorld::new(1.0);
        let a = world.add_body(Body::ground_plane(0.0));
        let b = world.add_body(Body::dynamic(
            1.0,
            Shape::Sphere { radius: 0.5 },
            Vec3::ZERO,
        ));
        world.clear();
        assert_eq!(world.body_count(), 0);
        assert!(world.body(a).is_none());
        assert!(world.body(b).is_none());
    }
}
