//! # Morphogen Core
//!
//! The simulation engine behind Morphogen: organisms assembled from
//! reusable parts, wired together by chemical channels.
//!
//! This crate contains:
//! - The refcounted archetype library that part instances are cloned from
//! - Physiology plug-ins and the registry that maps archetypes to them
//! - The part tree, channel wiring resolver and frame propagator
//! - Organism orchestration, editing and seeded channel mutation
//! - A multi-organism world with a spatial index and contact resolution
//! - Metrics collection and structured logging
//!
//! ## Example
//!
//! ```
//! use morphogen_core::archetype::{ArchetypeKey, ArchetypeSource, MemoryLoader};
//! use morphogen_core::config::SimConfig;
//! use morphogen_core::world::World;
//! use morphogen_data::{Frame, FrameTree, Gene, Genome, Mat4, Vec3};
//!
//! let mut loader = MemoryLoader::new();
//! loader.insert(
//!     ArchetypeKey::new("CellTypes", "sensor", "default"),
//!     ArchetypeSource {
//!         physiology: "sensor".into(),
//!         frames: FrameTree::new(Frame::new("body", Mat4::IDENTITY)),
//!     },
//! );
//!
//! let mut world = World::new(SimConfig::default(), Box::new(loader)).unwrap();
//! let id = world
//!     .spawn(Genome::new("eye", Gene::new("sensor")), Vec3::ZERO)
//!     .unwrap();
//! world.tick().unwrap();
//! assert_eq!(world.organism(id).unwrap().ticks(), 1);
//! ```

/// Archetype keys, the mesh loader seam and the refcounted library
pub mod archetype;
/// Part instances and the tree that attaches them
pub mod cell;
/// Live channel state and the global chemical pool
pub mod channel;
/// Configuration management for simulation parameters
pub mod config;
/// Error types
pub mod error;
/// Performance metrics collection and logging
pub mod metrics;
/// Seeded channel mutation
pub mod mutation;
/// Organism lifecycle, tick order and editing
pub mod organism;
/// Part behaviour plug-ins
pub mod physiology;
/// Uniform-grid index over organism bounds
pub mod spatial;
/// Frame propagation across the part tree
pub mod transform;
/// Channel wiring resolution and signal propagation
pub mod wiring;
/// Multi-organism container
pub mod world;

pub use archetype::{ArchetypeHandle, ArchetypeKey, ArchetypeLibrary, MeshLoader};
pub use cell::{Cell, PartId, PartTree};
pub use channel::{Channel, ChannelRef, GlobalChemistry};
pub use config::SimConfig;
pub use error::{CoreError, Result};
pub use organism::{BuildContext, Organism, OrganismState};
pub use physiology::{Physiology, PhysiologyRegistry, Stimulus};
pub use wiring::WiringReport;
pub use world::World;
