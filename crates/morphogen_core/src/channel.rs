//! Chemical-signal channels and the organism-wide hormone pool.

use crate::cell::PartId;
use morphogen_data::{
    is_global_chemical, ChannelGene, GLOBAL_CHEMICAL_BOUNDARY, NUM_GLOBAL_CHEMICALS, UNCONNECTED,
};
use serde::{Deserialize, Serialize};

/// Identity of one channel: its part and its slot in that part's array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelRef {
    pub part: PartId,
    pub index: usize,
}

impl ChannelRef {
    #[must_use]
    pub fn new(part: PartId, index: usize) -> Self {
        Self { part, index }
    }
}

/// Runtime state of one channel slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    /// Chemical selectivity, 0 when unconnected.
    pub chemical: u8,
    /// Current value, conventionally 0..1.
    pub signal: f32,
    /// Value reported while unconnected.
    pub constant: f32,
    /// Upstream channel supplying this one; `None` for outputs and unwired ends.
    pub source: Option<ChannelRef>,
    /// Set when a bypass was wired against its declared direction.
    pub flipped: bool,
}

impl Channel {
    #[must_use]
    pub fn new(chemical: u8, constant: f32) -> Self {
        Self {
            chemical,
            signal: 0.0,
            constant,
            source: None,
            flipped: false,
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.chemical != UNCONNECTED
    }

    #[must_use]
    pub fn is_global(&self) -> bool {
        is_global_chemical(self.chemical)
    }

    /// Value seen by the owning physiology: the constant while unconnected.
    #[must_use]
    pub fn value(&self) -> f32 {
        if self.is_connected() {
            self.signal
        } else {
            self.constant
        }
    }

    /// Writes an output value. Unconnected channels always hold 0.
    pub fn write(&mut self, value: f32) {
        self.signal = if self.is_connected() {
            value.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    /// Drops the signal and any wiring.
    pub fn clear(&mut self) {
        self.signal = 0.0;
        self.source = None;
        self.flipped = false;
    }

    /// Persisted form of this channel.
    #[must_use]
    pub fn to_gene(&self) -> ChannelGene {
        ChannelGene::new(self.chemical, self.constant)
    }
}

/// Organism-wide levels of the global (hormone) chemicals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct GlobalChemistry {
    levels: [f32; NUM_GLOBAL_CHEMICALS],
}

impl GlobalChemistry {
    fn slot(chemical: u8) -> Option<usize> {
        is_global_chemical(chemical).then(|| (chemical - GLOBAL_CHEMICAL_BOUNDARY - 1) as usize)
    }

    /// Level of a global chemical; 0 for anything that is not global.
    #[must_use]
    pub fn get(&self, chemical: u8) -> f32 {
        Self::slot(chemical).map_or(0.0, |i| self.levels[i])
    }

    pub fn set(&mut self, chemical: u8, level: f32) {
        if let Some(i) = Self::slot(chemical) {
            self.levels[i] = level.clamp(0.0, 1.0);
        }
    }

    /// Adds (or with a negative amount, absorbs) a hormone.
    pub fn add(&mut self, chemical: u8, amount: f32) {
        if let Some(i) = Self::slot(chemical) {
            self.levels[i] = (self.levels[i] + amount).clamp(0.0, 1.0);
        }
    }

    /// Exponential decay of every level towards 0.
    pub fn decay(&mut self, rate: f32) {
        let keep = (1.0 - rate).clamp(0.0, 1.0);
        for level in &mut self.levels {
            *level *= keep;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use morphogen_data::NUM_CHEMICALS;

    #[test]
    fn test_unconnected_reads_constant() {
        let channel = Channel::new(UNCONNECTED, 0.42);
        assert_eq!(channel.value(), 0.42);
    }

    #[test]
    fn test_unconnected_write_forced_to_zero() {
        let mut channel = Channel::new(UNCONNECTED, 0.42);
        channel.write(0.9);
        assert_eq!(channel.signal, 0.0);
        assert_eq!(channel.value(), 0.42);
    }

    #[test]
    fn test_connected_write_clamps() {
        let mut channel = Channel::new(3, 0.0);
        channel.write(1.7);
        assert_eq!(channel.value(), 1.0);
        channel.write(0.25);
        assert_eq!(channel.value(), 0.25);
    }

    #[test]
    fn test_clear_resets_wiring() {
        let mut channel = Channel::new(3, 0.0);
        channel.signal = 0.5;
        channel.flipped = true;
        channel.clear();
        assert_eq!(channel.signal, 0.0);
        assert!(!channel.flipped);
        assert!(channel.source.is_none());
    }

    #[test]
    fn test_global_pool_only_accepts_globals() {
        let mut pool = GlobalChemistry::default();
        pool.set(1, 0.8);
        assert_eq!(pool.get(1), 0.0);
        pool.set(NUM_CHEMICALS, 0.8);
        assert_eq!(pool.get(NUM_CHEMICALS), 0.8);
        pool.add(NUM_CHEMICALS, 0.5);
        assert_eq!(pool.get(NUM_CHEMICALS), 1.0);
        pool.decay(0.5);
        assert!((pool.get(NUM_CHEMICALS) - 0.5).abs() < 1e-6);
    }
}
