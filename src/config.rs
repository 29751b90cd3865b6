/// Runtime options recognized by the playable.
///
/// All collaborators receive this by value at construction time; there is no
/// process-global configuration object.
#[derive(Debug, Clone)]
pub struct PlayableConfig {
    /// Nominal simulation rate in Hz. The physics integrator always advances
    /// in increments of `1 / fixed_frame_rate` seconds.
    pub fixed_frame_rate: u32,
    /// Multiplier applied to standard gravity (9.82 m/s²).
    pub gravity_scale: f32,
    /// Upper bound on catch-up substeps per rendered frame. When a frame
    /// takes longer than `max_substeps` fixed steps, simulated time falls
    /// behind real time instead of spiralling.
    pub max_substeps: u32,
    /// Seconds between stage teardown and stage reconstruction during a
    /// reset. Zero makes the reset fully synchronous.
    pub rebuild_delay: f32,
    /// Seconds between stage reconstruction and the round actually starting.
    pub start_delay: f32,
    /// Viewing depth (camera-relative z) the UI overlay projects to.
    pub ui_depth: f32,
}

impl PlayableConfig {
    /// Simulated-time increment of one physics substep, in seconds.
    pub fn fixed_time_step(&self) -> f32 {
        1.0 / self.fixed_frame_rate as f32
    }
}

impl Default for PlayableConfig {
    fn default() -> Self {
        Self {
            fixed_frame_rate: 60,
            gravity_scale: 2.0,
            max_substeps: 10,
            // Teardown stagger; lets any outgoing visual transition settle
            // before the rebuild.
            rebuild_delay: 1.1,
            start_delay: 0.5,
            ui_depth: -10.0,
        }
    }
}

impl PlayableConfig {
    /// Configuration with all reset staging removed, so state transitions
    /// complete within the triggering call.
    pub fn immediate() -> Self {
        Self {
            rebuild_delay: 0.0,
            start_delay: 0.0,
            ..Self::default()
        }
    }
}
