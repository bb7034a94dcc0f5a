//! Error types for morphogen_core.
//!
//! Construction-time errors identify the part, socket or variant involved so
//! the asset author can find the mismatch. Per-tick failures carry the name
//! of the part whose physiology failed.

use thiserror::Error;

/// Main error type for simulation operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The mesh loader has no archetype for this key
    #[error("Unknown archetype: {0}")]
    UnknownArchetype(String),

    /// No physiology factory registered under this name
    #[error("Unknown physiology '{physiology}' for archetype {archetype}")]
    UnknownPhysiology {
        archetype: String,
        physiology: String,
    },

    /// Malformed `group:name.variant` type string
    #[error("Invalid part type '{0}'")]
    InvalidTypeName(String),

    /// A gene names a socket the parent does not have
    #[error("Part {parent} has no socket named '{socket}' (requested by {child})")]
    MissingSocket {
        parent: String,
        socket: String,
        child: String,
    },

    /// A socket already holds a child
    #[error("Socket '{socket}' on part {parent} is already occupied")]
    SocketOccupied { parent: String, socket: String },

    /// Physiology and mesh disagree on joint count
    #[error("Part {part}: physiology expects {expected} joints but the mesh has {found}")]
    JointCountMismatch {
        part: String,
        expected: usize,
        found: usize,
    },

    /// Gene and archetype disagree on channel count
    #[error("Part {part}: gene declares {found} channels but the part type has {expected}")]
    ChannelCountMismatch {
        part: String,
        expected: usize,
        found: usize,
    },

    /// The requested variant is not in the physiology's variant list
    #[error("Part {part}: variant '{variant}' is not offered by its physiology")]
    UnknownVariant { part: String, variant: String },

    /// Numbered frames of one kind skip an index
    #[error("Part {part}: {kind} frames are not numbered contiguously (missing #{missing})")]
    FrameIndexGap {
        part: String,
        kind: String,
        missing: usize,
    },

    /// A chemical selection was refused by validation
    #[error("Part {part}: chemical {chemical} is not valid for channel {channel}")]
    InvalidChemical {
        part: String,
        channel: usize,
        chemical: u8,
    },

    /// Two upstream channels feed the same channel
    #[error("Part {part}: channel {channel} receives chemical {chemical} from more than one source")]
    AmbiguousWiring {
        part: String,
        channel: usize,
        chemical: u8,
    },

    /// Genome failed structural validation
    #[error("Invalid genome: {0}")]
    InvalidGenome(String),

    /// Operation not allowed in the organism's current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Stale or foreign part handle
    #[error("Unknown part: {0}")]
    UnknownPart(String),

    /// A part's per-tick update failed
    #[error("Part {part} failed during update: {source}")]
    PartUpdate {
        part: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Result type alias for morphogen_core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Creates a new invalid state error.
    #[must_use]
    pub fn invalid_state<S: Into<String>>(msg: S) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Creates a new unknown part error.
    #[must_use]
    pub fn unknown_part<S: Into<String>>(msg: S) -> Self {
        Self::UnknownPart(msg.into())
    }

    /// True for content-authoring errors raised while building a creature.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        !matches!(
            self,
            Self::PartUpdate { .. } | Self::InvalidState(_) | Self::InvalidChemical { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_names_parts() {
        let err = CoreError::MissingSocket {
            parent: "CellTypes:spine.default#0".into(),
            socket: "skt4".into(),
            child: "fin".into(),
        };
        let text = err.to_string();
        assert!(text.contains("skt4"));
        assert!(text.contains("spine"));
        assert!(text.contains("fin"));
    }

    #[test]
    fn test_part_update_keeps_source() {
        let err = CoreError::PartUpdate {
            part: "fin#2".into(),
            source: anyhow::anyhow!("joint exploded"),
        };
        assert!(err.to_string().contains("joint exploded"));
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_configuration());
    }
}
