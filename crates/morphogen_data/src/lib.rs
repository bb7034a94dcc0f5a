//! # Morphogen Data
//!
//! Plain data shared by every Morphogen crate: genes and genomes, the
//! chemistry constants and channel-role tables, and the frame hierarchies
//! that archetypes and part instances are built from.
//!
//! Nothing in here simulates anything. The types are serde-friendly so the
//! io crate can persist them and the core crate can clone them cheaply.

pub mod data;

pub use data::chemistry::{
    is_global_chemical, is_local_chemical, ChannelRole, ChannelSpec, SocketRef,
    GLOBAL_CHEMICAL_BOUNDARY, NUM_CHEMICALS, NUM_GLOBAL_CHEMICALS, UNCONNECTED,
};
pub use data::frame::{
    base_name, Frame, FrameId, FrameKind, FrameTree, JointLimits, Material, MeshInfo, Sphere,
};
pub use data::gene::{ChannelGene, Gene, Genome};

pub use glam::{Mat4, Quat, Vec3};
