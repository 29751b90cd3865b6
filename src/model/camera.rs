use glam::{Mat4, Vec3};

/// Projected view extents at a fixed camera-relative depth. Handed to the
/// UI overlay and to stages every frame so 2D placement can track the 3D
/// projection without touching the renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewContext {
    /// Visible world-space width at `z`.
    pub width: f32,
    /// Visible world-space height at `z`.
    pub height: f32,
    /// The camera-relative depth the extents were computed for.
    pub z: f32,
}

pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y: f32,
    pub aspect: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Camera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            eye: Vec3::new(0.0, 3.0, 14.0),
            target: Vec3::new(0.0, 1.5, 0.0),
            up: Vec3::Y,
            fov_y: 50f32.to_radians(),
            aspect: width as f32 / height as f32,
            z_near: 0.1,
            z_far: 5000.0,
        }
    }

    pub fn set_aspect(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn view_proj(&self) -> Mat4 {
        let view = Mat4::look_at_rh(self.eye, self.target, self.up);
        let proj = Mat4::perspective_rh(self.fov_y, self.aspect, self.z_near, self.z_far);
        proj * view
    }

    /// Visible extents of the frustum cross-section at the given
    /// camera-relative depth (negative z is in front of the camera).
    pub fn view_size_at(&self, depth: f32) -> ViewContext {
        let distance = depth.abs();
        let height = 2.0 * (self.fov_y * 0.5).tan() * distance;
        ViewContext {
            width: height * self.aspect,
            height,
            z: depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_tracks_resize() {
        let mut cam = Camera::new(800, 600);
        cam.set_aspect(1000, 500);
        assert_eq!(cam.aspect, 2.0);

        // Degenerate sizes are ignored rather than producing NaN aspect
        cam.set_aspect(0, 500);
        assert_eq!(cam.aspect, 2.0);
    }

    #[test]
    fn view_size_scales_linearly_with_depth() {
        let cam = Camera::new(800, 600);
        let near = cam.view_size_at(-5.0);
        let far = cam.view_size_at(-10.0);
        assert!((far.height - 2.0 * near.height).abs() < 1e-4);
        assert!((far.width / far.height - cam.aspect).abs() < 1e-4);
        assert_eq!(far.z, -10.0);
    }
}
