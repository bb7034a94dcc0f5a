//! Part behaviour.
//!
//! A [`Physiology`] is the per-part controller: it declares the role of
//! each channel slot, reads inputs, writes outputs and drives joints every
//! tick. Archetypes name their physiology; the [`PhysiologyRegistry`] maps
//! that name to a factory.
//!
//! ```text
//!   ┌──────────────┐   create(name, init)   ┌───────────────────┐
//!   │ Archetype    │ ─────────────────────▶ │ Box<dyn Physiology>│
//!   │ physiology=… │                        └───────────────────┘
//!   └──────────────┘                                  │
//!          fast_update / slow_update / on_stimulus    ▼
//!                                             ┌──────────────┐
//!                                             │ CellContext  │
//!                                             └──────────────┘
//! ```

pub mod effectors;
pub mod sensors;
pub mod structural;

use crate::channel::{Channel, GlobalChemistry};
use morphogen_data::{ChannelSpec, FrameId, FrameTree, Vec3};
use std::collections::HashMap;
use std::fmt;

/// Frame counts a factory may size its state from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhysiologyInit {
    pub joints: usize,
    pub sockets: usize,
    pub hotspots: usize,
}

/// Event delivered to a part from outside its own update.
#[derive(Debug, Clone, PartialEq)]
pub enum Stimulus {
    /// The part's collision geometry touched another organism.
    Contact { depth: f32, normal: Vec3 },
    /// Free-form stimulus from the host application.
    Custom { kind: String, strength: f32 },
}

/// Mutable view of one part handed to its physiology.
pub struct CellContext<'a> {
    pub channels: &'a mut [Channel],
    /// Joint values in 0..1, indexed like the part's `anim#` frames.
    pub joints: &'a mut [f32],
    pub globals: &'a mut GlobalChemistry,
    pub frames: &'a FrameTree,
    pub hotspots: &'a [FrameId],
    /// Index into the physiology's variant list.
    pub variant: usize,
    pub dt: f32,
    pub tick: u64,
}

impl CellContext<'_> {
    /// Current value of a channel; 0 for slots that do not exist.
    #[must_use]
    pub fn input(&self, index: usize) -> f32 {
        self.channels.get(index).map_or(0.0, Channel::value)
    }

    pub fn output(&mut self, index: usize, value: f32) {
        if let Some(channel) = self.channels.get_mut(index) {
            channel.write(value);
        }
    }

    #[must_use]
    pub fn joint(&self, index: usize) -> f32 {
        self.joints.get(index).copied().unwrap_or(0.0)
    }

    pub fn set_joint(&mut self, index: usize, value: f32) {
        if let Some(joint) = self.joints.get_mut(index) {
            *joint = value.clamp(0.0, 1.0);
        }
    }

    /// World position of hotspot `index` as of the last frame propagation.
    #[must_use]
    pub fn hotspot(&self, index: usize) -> Option<Vec3> {
        let id = *self.hotspots.get(index)?;
        self.frames.get(id).map(|f| f.world_position())
    }
}

/// Per-part controller.
pub trait Physiology: Send {
    /// Role table, one entry per channel slot, in slot order.
    fn channels(&self) -> Vec<ChannelSpec>;

    /// Variant names this physiology supports; the first is the default.
    fn variants(&self) -> &'static [&'static str] {
        &["default"]
    }

    /// Required number of `anim#` joints, when the physiology animates any.
    fn joint_count(&self) -> Option<usize> {
        None
    }

    /// Called once the part is fully assembled.
    fn init(&mut self, _ctx: &mut CellContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called every tick after channel propagation.
    fn fast_update(&mut self, ctx: &mut CellContext<'_>) -> anyhow::Result<()>;

    /// Called every `slow_update_interval` ticks.
    fn slow_update(&mut self, _ctx: &mut CellContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_stimulus(&mut self, _stimulus: &Stimulus) {}

    /// Hotspot index a camera may be mounted on.
    fn camera_mount(&self) -> Option<usize> {
        None
    }

    fn mass(&self) -> f32 {
        1.0
    }

    /// Upward force relative to the part's weight while submerged; 1.0 floats.
    fn buoyancy(&self) -> f32 {
        1.0
    }

    /// Linear drag coefficient.
    fn resistance(&self) -> f32 {
        0.5
    }

    /// Thrust in part-local coordinates.
    fn propulsion(&self) -> Vec3 {
        Vec3::ZERO
    }
}

pub type PhysiologyFactory = Box<dyn Fn(&PhysiologyInit) -> Box<dyn Physiology> + Send + Sync>;

/// Name-to-factory table for physiologies.
pub struct PhysiologyRegistry {
    factories: HashMap<String, PhysiologyFactory>,
}

impl PhysiologyRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// A registry holding every built-in physiology.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("core", |init| {
            Box::new(structural::Core::new(init.hotspots)) as Box<dyn Physiology>
        });
        registry.register("spine", |_| Box::new(structural::Spine) as Box<dyn Physiology>);
        registry.register("muscle", |_| {
            Box::new(effectors::Muscle::default()) as Box<dyn Physiology>
        });
        registry.register("fin", |_| Box::new(effectors::Fin::default()) as Box<dyn Physiology>);
        registry.register("gland", |_| Box::new(effectors::Gland) as Box<dyn Physiology>);
        registry.register("sensor", |_| {
            Box::new(sensors::Sensor::default()) as Box<dyn Physiology>
        });
        registry
    }

    /// Registers a factory; names are case-insensitive and later entries win.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&PhysiologyInit) -> Box<dyn Physiology> + Send + Sync + 'static,
    {
        self.factories
            .insert(name.to_ascii_lowercase(), Box::new(factory));
    }

    #[must_use]
    pub fn create(&self, name: &str, init: &PhysiologyInit) -> Option<Box<dyn Physiology>> {
        self.factories
            .get(&name.to_ascii_lowercase())
            .map(|factory| factory(init))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_ascii_lowercase())
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for PhysiologyRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for PhysiologyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysiologyRegistry")
            .field("names", &self.names())
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let registry = PhysiologyRegistry::with_builtins();
        assert_eq!(
            registry.names(),
            vec!["core", "fin", "gland", "muscle", "sensor", "spine"]
        );
        assert!(registry.contains("Muscle"));
    }

    #[test]
    fn test_unknown_name() {
        let registry = PhysiologyRegistry::new();
        assert!(registry.create("core", &PhysiologyInit::default()).is_none());
    }

    #[test]
    fn test_context_ignores_missing_slots() {
        let physiology = structural::Spine;
        let mut fixture = test_support::ContextFixture::new(&physiology, 0);
        let mut ctx = fixture.ctx(0);
        ctx.output(99, 1.0);
        ctx.set_joint(3, 1.0);
        assert_eq!(ctx.input(99), 0.0);
        assert_eq!(ctx.joint(3), 0.0);
        assert!(ctx.hotspot(0).is_none());
    }
}
