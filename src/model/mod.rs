pub use morphogen_core::{CoreError, Organism, OrganismState, PartId, World};
pub mod archetype {
    pub use morphogen_core::archetype::*;
}
pub mod cell {
    pub use morphogen_core::cell::*;
}
pub mod channel {
    pub use morphogen_core::channel::*;
}
pub mod config {
    pub use morphogen_core::config::*;
}
pub mod metrics {
    pub use morphogen_core::metrics::*;
}
pub mod mutation {
    pub use morphogen_core::mutation::*;
}
pub mod organism {
    pub use morphogen_core::organism::*;
}
pub mod physiology {
    pub use morphogen_core::physiology::*;
}
pub mod spatial {
    pub use morphogen_core::spatial::*;
}
pub mod transform {
    pub use morphogen_core::transform::*;
}
pub mod wiring {
    pub use morphogen_core::wiring::*;
}
pub mod world {
    pub use morphogen_core::world::*;
}

pub mod state {
    pub use morphogen_data::*;
}
