//! # Morphogen IO
//!
//! I/O and persistence layer for the Morphogen simulation.
//!
//! This crate provides:
//! - Structured error handling with custom error types
//! - The tagged genome text reader and writer
//! - JSON and HexDNA encodings
//! - A directory-backed genome store
//! - JSON archetype manifests and a mesh loader reading them

/// Error types and result aliases for I/O operations
pub mod error;
/// Tagged genome text format
pub mod genome_text;
/// JSON archetype manifests and the mesh loader that reads them
pub mod manifest;
/// Genome file store
pub mod persistence;
/// Validated serialization helpers for JSON and HexDNA formats
pub mod serialization;

pub use error::{IoError, Result};
pub use genome_text::{read_gene, read_genome, write_gene, write_genome};
pub use manifest::{ArchetypeManifest, FrameManifest, ManifestLoader, VariantManifest};
pub use persistence::GenomeStore;
pub use serialization::{
    from_hex_dna, from_json, is_valid_hex_dna, read_genome_file, read_json_file, to_hex_dna,
    to_json, to_json_pretty, write_json_file, GenomeFormat,
};
