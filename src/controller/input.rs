/// Pointer state shared by mouse and touch input.
///
/// Events only record the latest position and pressed flag between ticks;
/// the frame loop consumes whatever is current when it runs. There is no
/// event queue; at most one pending gesture state exists at a time.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointerState {
    /// Latest pointer position in surface pixels.
    pub position: (f32, f32),
    /// Latest pointer position in normalized device coordinates
    /// (x right, y up, both in [-1, 1]).
    pub ndc: (f32, f32),
    pub pressed: bool,
}

impl PointerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn moved(&mut self, x: f32, y: f32, surface_width: f32, surface_height: f32) {
        self.position = (x, y);
        if surface_width > 0.0 && surface_height > 0.0 {
            self.ndc = (
                (x / surface_width) * 2.0 - 1.0,
                -(y / surface_height) * 2.0 + 1.0,
            );
        }
    }

    pub fn down(&mut self, x: f32, y: f32, surface_width: f32, surface_height: f32) {
        self.moved(x, y, surface_width, surface_height);
        self.pressed = true;
    }

    pub fn up(&mut self) {
        self.pressed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ndc_is_centered_and_y_up() {
        let mut pointer = PointerState::new();
        pointer.down(400.0, 300.0, 800.0, 600.0);
        assert!(pointer.pressed);
        assert_eq!(pointer.ndc, (0.0, 0.0));

        pointer.moved(800.0, 600.0, 800.0, 600.0);
        assert_eq!(pointer.ndc, (1.0, -1.0));

        pointer.up();
        assert!(!pointer.pressed);
        // position survives release
        assert_eq!(pointer.position, (800.0, 600.0));
    }
}
