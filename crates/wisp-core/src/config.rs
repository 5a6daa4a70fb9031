//! Simulation tuning constants and the per-engine friction configuration.

/// Fine cells per coarse tile along one axis.
pub const SUBDIVISION_COUNT: i32 = 5;

/// Number of fine cells covered by one object stamp.
pub const CELL_STAMP_LENGTH: usize = (SUBDIVISION_COUNT * SUBDIVISION_COUNT) as usize;

/// Heat capacity of air per unit of pressure. Blocked cells use the
/// occupant's `temp_coefficient` instead.
pub const AIRTEMPCOEFF_PER_PRESSURE: f64 = 1.0;

/// Default coarse grid width of a level, in tiles.
pub const DEFAULT_LEVEL_WIDTH: i32 = 50;

/// Default coarse grid height of a level, in tiles.
pub const DEFAULT_LEVEL_HEIGHT: i32 = 50;

/// Ticks an ignited explosive waits before it actually detonates.
pub const EXPLOSION_TRIGGER_TIMEOUT: u64 = 50;

/// Lifetime of an explosion block, in ticks.
pub const EXPLOSION_BLOCK_LIFETIME: u64 = 150;

/// Temperature gain a fire particle deposits into its cell per tick.
pub const FIRE_PARTICLE_TEMPERATURE_RISE: f64 = 0.01;

/// Friction and damping constants of the cellular automaton.
///
/// All five values are plain gains applied per frame by the flow kernels;
/// see the kernel documentation in `wisp-physics` for where each one
/// enters the update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationConfig {
    /// Gain from pressure difference to pressure flow.
    pub flow_friction: f64,
    /// Momentum retention of the flow moving average, in `[0, 1)`.
    pub flow_damping: f64,
    /// Gain of the vertical convection term (hot air rising).
    pub convection_friction: f64,
    /// Gain of heat conduction along the temperature gradient.
    pub heat_flow_friction: f64,
    /// Gain of fog diffusion along the fog gradient.
    pub fog_flow_friction: f64,
}

impl SimulationConfig {
    /// Check that every gain is finite and the damping is a valid
    /// retention factor.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated constraint.
    pub fn validate(&self) -> Result<(), String> {
        let gains = [
            ("flow_friction", self.flow_friction),
            ("flow_damping", self.flow_damping),
            ("convection_friction", self.convection_friction),
            ("heat_flow_friction", self.heat_flow_friction),
            ("fog_flow_friction", self.fog_flow_friction),
        ];
        for (name, value) in gains {
            if !value.is_finite() {
                return Err(format!("{name} must be finite, got {value}"));
            }
        }
        if !(0.0..1.0).contains(&self.flow_damping) {
            return Err(format!(
                "flow_damping must be in [0, 1), got {}",
                self.flow_damping
            ));
        }
        Ok(())
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            flow_friction: 0.3,
            flow_damping: 0.991,
            convection_friction: 0.3,
            heat_flow_friction: 0.05,
            fog_flow_friction: 0.1,
        }
    }
}
