//! Morphogen: creatures grown from genomes of reusable parts, wired
//! together by chemical channels.
//!
//! `model` exposes the simulation, `io` the genome and asset formats.

pub mod model;

pub mod io {
    pub use morphogen_io::*;
}
