//! Configuration management for simulation parameters.
//!
//! Strongly-typed configuration structures mapping to a `morphogen.toml`
//! file. Every section has defaults, so a partial file only overrides what
//! it names.
//!
//! ## Example `morphogen.toml`
//!
//! ```toml
//! [physics]
//! gravity = 9.8
//! water_level = 0.0
//!
//! [organism]
//! slow_update_interval = 30
//!
//! [archetypes]
//! default_group = "CellTypes"
//!
//! [mutation]
//! rate = 0.1
//! ```

use serde::{Deserialize, Serialize};

/// Force model parameters.
///
/// Buoyancy, drag and propulsion come from each part's physiology; these
/// values scale them into world units.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct PhysicsConfig {
    pub gravity: f32,
    pub fluid_density: f32,
    /// Height of the water surface; parts above it get no buoyancy.
    pub water_level: f32,
    pub linear_damping: f32,
    pub max_speed: f32,
    /// Separation impulse per unit of penetration depth.
    pub collision_stiffness: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: 9.8,
            fluid_density: 1.0,
            water_level: 0.0,
            linear_damping: 0.05,
            max_speed: 20.0,
            collision_stiffness: 0.5,
        }
    }
}

/// Per-organism update parameters.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct OrganismConfig {
    /// Ticks between slow-path physiology updates.
    pub slow_update_interval: u64,
    /// Largest part tree an organism may grow or be edited into.
    pub max_parts: usize,
    /// Seconds per tick.
    pub dt: f32,
    /// Fraction of each global hormone lost per tick.
    pub hormone_decay: f32,
}

impl Default for OrganismConfig {
    fn default() -> Self {
        Self {
            slow_update_interval: 30,
            max_parts: 256,
            dt: 1.0 / 30.0,
            hormone_decay: 0.01,
        }
    }
}

/// Defaults applied when a gene's type string omits parts of its key.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ArchetypeConfig {
    pub default_group: String,
    pub default_variant: String,
}

impl Default for ArchetypeConfig {
    fn default() -> Self {
        Self {
            default_group: "CellTypes".to_string(),
            default_variant: "default".to_string(),
        }
    }
}

/// World container parameters.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct WorldConfig {
    /// Edge length of a spatial index cell.
    pub cell_size: f32,
    pub seed: Option<u64>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            cell_size: 4.0,
            seed: None,
        }
    }
}

/// Channel mutation parameters.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct MutationConfig {
    /// Per-channel probability of a chemical or constant change.
    pub rate: f32,
    /// Largest constant jitter.
    pub amount: f32,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            rate: 0.1,
            amount: 0.2,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct SimConfig {
    pub physics: PhysicsConfig,
    pub organism: OrganismConfig,
    pub archetypes: ArchetypeConfig,
    pub world: WorldConfig,
    pub mutation: MutationConfig,
}

impl SimConfig {
    /// Validates all configuration parameters.
    ///
    /// Returns `Ok(())` if all parameters are valid, or `Err` with a description
    /// of the first validation failure.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.physics.gravity >= 0.0, "Gravity must be non-negative");
        anyhow::ensure!(
            self.physics.fluid_density >= 0.0,
            "Fluid density must be non-negative"
        );
        anyhow::ensure!(
            self.physics.linear_damping >= 0.0 && self.physics.linear_damping <= 1.0,
            "Linear damping must be in [0.0, 1.0]"
        );
        anyhow::ensure!(self.physics.max_speed > 0.0, "Max speed must be positive");
        anyhow::ensure!(
            self.physics.collision_stiffness >= 0.0,
            "Collision stiffness must be non-negative"
        );

        anyhow::ensure!(
            self.organism.slow_update_interval > 0,
            "Slow update interval must be positive"
        );
        anyhow::ensure!(self.organism.max_parts > 0, "Max parts must be positive");
        anyhow::ensure!(
            self.organism.max_parts <= 10_000,
            "Max parts too large (max 10000)"
        );
        anyhow::ensure!(
            self.organism.dt > 0.0 && self.organism.dt <= 1.0,
            "Tick length must be in (0.0, 1.0]"
        );
        anyhow::ensure!(
            self.organism.hormone_decay >= 0.0 && self.organism.hormone_decay <= 1.0,
            "Hormone decay must be in [0.0, 1.0]"
        );

        anyhow::ensure!(
            !self.archetypes.default_group.trim().is_empty(),
            "Default archetype group must not be empty"
        );
        anyhow::ensure!(
            !self.archetypes.default_variant.trim().is_empty(),
            "Default archetype variant must not be empty"
        );

        anyhow::ensure!(
            self.world.cell_size > 0.0,
            "Spatial index cell size must be positive"
        );

        anyhow::ensure!(
            self.mutation.rate >= 0.0 && self.mutation.rate <= 1.0,
            "Mutation rate must be in [0.0, 1.0]"
        );
        anyhow::ensure!(
            self.mutation.amount >= 0.0,
            "Mutation amount must be non-negative"
        );
        Ok(())
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config = toml::from_str::<Self>(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if it exists, otherwise returns the defaults.
    pub fn load_or_default<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Stable digest of the parameters that affect simulation results.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(format!("{:?}", self.physics).as_bytes());
        hasher.update(format!("{:?}", self.organism).as_bytes());
        hasher.update(format!("{:?}", self.archetypes).as_bytes());
        hex::encode(hasher.finalize())
    }
}
