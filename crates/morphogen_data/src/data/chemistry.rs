use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of distinct chemicals a channel can select (excluding 0).
pub const NUM_CHEMICALS: u8 = 16;

/// Chemicals above this index are global hormones; at or below it they are
/// local, flow-directional signals.
pub const GLOBAL_CHEMICAL_BOUNDARY: u8 = 12;

/// Number of global hormone chemicals.
pub const NUM_GLOBAL_CHEMICALS: usize = (NUM_CHEMICALS - GLOBAL_CHEMICAL_BOUNDARY) as usize;

/// Selectivity meaning "not connected, use the channel constant".
pub const UNCONNECTED: u8 = 0;

/// Returns true for organism-wide hormone chemicals.
#[must_use]
pub fn is_global_chemical(chemical: u8) -> bool {
    chemical > GLOBAL_CHEMICAL_BOUNDARY && chemical <= NUM_CHEMICALS
}

/// Returns true for per-connection signal chemicals.
#[must_use]
pub fn is_local_chemical(chemical: u8) -> bool {
    chemical != UNCONNECTED && chemical <= GLOBAL_CHEMICAL_BOUNDARY
}

/// Fixed role of a channel slot, declared by the part type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelRole {
    /// Consumes a signal arriving from a neighbour.
    Input,
    /// Produces a signal for its neighbours.
    Output,
    /// Passes a signal through; direction is resolved during wiring.
    Bypass,
}

impl fmt::Display for ChannelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
            Self::Bypass => write!(f, "bypass"),
        }
    }
}

/// One end of a channel.
///
/// `Plug` is the connection to the parent (through the socket this part is
/// attached to); `Socket(n)` is the connection to whichever child occupies
/// socket `n`; `Function` is the part's own internal behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SocketRef {
    Function,
    Plug,
    Socket(u8),
}

impl fmt::Display for SocketRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Function => write!(f, "fn"),
            Self::Plug => write!(f, "plug"),
            Self::Socket(n) => write!(f, "skt{n}"),
        }
    }
}

impl FromStr for SocketRef {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fn" | "function" => Ok(Self::Function),
            "plug" => Ok(Self::Plug),
            other => {
                let digits = other
                    .strip_prefix("skt")
                    .ok_or_else(|| anyhow::anyhow!("Unknown socket reference: {s}"))?;
                let n = digits
                    .parse::<u8>()
                    .map_err(|e| anyhow::anyhow!("Invalid socket number in {s}: {e}"))?;
                Ok(Self::Socket(n))
            }
        }
    }
}

/// Declared role-table entry for one channel slot of a part type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub role: ChannelRole,
    /// End the signal arrives from.
    pub source: SocketRef,
    /// End the signal leaves through.
    pub dest: SocketRef,
    /// Default chemical selectivity.
    pub chemical: u8,
    /// Default constant.
    pub constant: f32,
}

impl ChannelSpec {
    /// An input fed from `from` into the part's function.
    #[must_use]
    pub fn input(from: SocketRef) -> Self {
        Self {
            role: ChannelRole::Input,
            source: from,
            dest: SocketRef::Function,
            chemical: UNCONNECTED,
            constant: 0.0,
        }
    }

    /// An output from the part's function towards `to`.
    #[must_use]
    pub fn output(to: SocketRef) -> Self {
        Self {
            role: ChannelRole::Output,
            source: SocketRef::Function,
            dest: to,
            chemical: UNCONNECTED,
            constant: 0.0,
        }
    }

    /// A pass-through between two ends, nominally `source` to `dest`.
    #[must_use]
    pub fn bypass(source: SocketRef, dest: SocketRef) -> Self {
        Self {
            role: ChannelRole::Bypass,
            source,
            dest,
            chemical: UNCONNECTED,
            constant: 0.0,
        }
    }

    #[must_use]
    pub fn with_chemical(mut self, chemical: u8) -> Self {
        self.chemical = chemical;
        self
    }

    #[must_use]
    pub fn with_constant(mut self, constant: f32) -> Self {
        self.constant = constant;
        self
    }

    /// True when this channel joins the same unordered pair of ends as `other`.
    #[must_use]
    pub fn joins_same_pair(&self, other: &ChannelSpec) -> bool {
        (self.source == other.source && self.dest == other.dest)
            || (self.source == other.dest && self.dest == other.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chemical_ranges() {
        assert!(!is_local_chemical(UNCONNECTED));
        assert!(!is_global_chemical(UNCONNECTED));
        assert!(is_local_chemical(1));
        assert!(is_local_chemical(GLOBAL_CHEMICAL_BOUNDARY));
        assert!(is_global_chemical(GLOBAL_CHEMICAL_BOUNDARY + 1));
        assert!(is_global_chemical(NUM_CHEMICALS));
        assert!(!is_global_chemical(NUM_CHEMICALS + 1));
    }

    #[test]
    fn test_socket_ref_parse_and_display() {
        assert_eq!("plug".parse::<SocketRef>().unwrap(), SocketRef::Plug);
        assert_eq!("skt3".parse::<SocketRef>().unwrap(), SocketRef::Socket(3));
        assert_eq!("fn".parse::<SocketRef>().unwrap(), SocketRef::Function);
        assert_eq!(SocketRef::Socket(7).to_string(), "skt7");
        assert!("hot0".parse::<SocketRef>().is_err());
        assert!("sktx".parse::<SocketRef>().is_err());
    }

    #[test]
    fn test_joins_same_pair_either_orientation() {
        let a = ChannelSpec::bypass(SocketRef::Plug, SocketRef::Socket(0));
        let b = ChannelSpec::bypass(SocketRef::Socket(0), SocketRef::Plug);
        let c = ChannelSpec::bypass(SocketRef::Plug, SocketRef::Socket(1));
        assert!(a.joins_same_pair(&b));
        assert!(!a.joins_same_pair(&c));
    }
}
