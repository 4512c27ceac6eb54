use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Debug recording switches. Recording only fills `World::debug_draw()`;
/// nothing here changes simulation results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugFlags {
    /// Record AABBs of object/object contacts.
    pub physics: bool,
    /// Record every ray cast through `World::raycast`.
    pub raycast: bool,
    /// Record emitter positions each tick.
    pub particles: bool,
}

/// Configuration values for a simulation world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Gravity magnitude in units/s², applied along -Y.
    pub gravity: f32,
    /// Longest step a single tick may take; longer frames are clamped.
    pub max_dt: f32,
    /// Per-axis velocity limit in units/s.
    pub max_speed: f32,
    /// Cell size of the broad-phase grid. Best set near the common object size.
    pub spatial_cell_size: f32,
    /// Seed for the world random source; `None` seeds from entropy.
    pub seed: Option<u64>,
    pub debug: DebugFlags,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            gravity: 9.81,
            max_dt: 1.0 / 20.0,
            max_speed: 60.0,
            spatial_cell_size: 1.0,
            seed: None,
            debug: DebugFlags::default(),
        }
    }
}

impl SimulationConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).context("Failed to parse simulation config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.max_dt > 0.0) {
            bail!("max_dt must be positive, got {}", self.max_dt);
        }
        if !(self.spatial_cell_size > 0.0) {
            bail!(
                "spatial_cell_size must be positive, got {}",
                self.spatial_cell_size
            );
        }
        if !(self.max_speed > 0.0) {
            bail!("max_speed must be positive, got {}", self.max_speed);
        }
        if !self.gravity.is_finite() {
            bail!("gravity must be finite");
        }
        Ok(())
    }

    #[must_use]
    pub fn with_gravity(mut self, gravity: f32) -> Self {
        self.gravity = gravity;
        self
    }

    #[must_use]
    pub fn with_max_dt(mut self, max_dt: f32) -> Self {
        self.max_dt = max_dt;
        self
    }

    #[must_use]
    pub fn with_max_speed(mut self, max_speed: f32) -> Self {
        self.max_speed = max_speed;
        self
    }

    #[must_use]
    pub fn with_spatial_cell_size(mut self, cell_size: f32) -> Self {
        self.spatial_cell_size = cell_size;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn with_debug(mut self, debug: DebugFlags) -> Self {
        self.debug = debug;
        self
    }
}
