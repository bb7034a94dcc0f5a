//! Core data structures for the Morphogen simulation.

pub mod chemistry;
pub mod frame;
pub mod gene;
