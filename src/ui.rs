use crate::model::ViewContext;

/// The 2D overlay layer.
///
/// Its only coupling to the 3D world is the projected view extents at a
/// fixed viewing depth, refreshed every frame by the lifecycle controller.
/// Widget behavior itself lives with the host; this side just keeps the
/// projection context current and honors disposal across resets.
pub struct UiLayer {
    depth: f32,
    context: Option<ViewContext>,
    disposed: bool,
}

impl UiLayer {
    pub fn new(depth: f32) -> Self {
        Self {
            depth,
            context: None,
            disposed: false,
        }
    }

    pub fn depth(&self) -> f32 {
        self.depth
    }

    pub fn set_context(&mut self, context: ViewContext) {
        if self.disposed {
            return;
        }
        self.context = Some(context);
    }

    /// Latest projection context, if the layer is live and has seen a frame.
    pub fn context(&self) -> Option<ViewContext> {
        if self.disposed {
            None
        } else {
            self.context
        }
    }

    /// Tear the overlay down for a reset. Idempotent.
    pub fn dispose(&mut self) {
        self.disposed = true;
        self.context = None;
    }

    /// Bring a disposed overlay back for the next round.
    pub fn rebuild(&mut self) {
        self.disposed = false;
        self.context = None;
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposed_layer_ignores_context_updates() {
        let mut ui = UiLayer::new(-10.0);
        let ctx = ViewContext {
            width: 16.0,
            height: 9.0,
            z: -10.0,
        };
        ui.set_context(ctx);
        assert_eq!(ui.context(), Some(ctx));

        ui.dispose();
        ui.dispose(); // idempotent
        ui.set_context(ctx);
        assert_eq!(ui.context(), None);

        ui.rebuild();
        ui.set_context(ctx);
        assert_eq!(ui.context(), Some(ctx));
    }
}
