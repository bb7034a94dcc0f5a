//! Skeleton parts: the root body and passive segments.

use super::{CellContext, Physiology};
use morphogen_data::{ChannelSpec, SocketRef};
use std::f32::consts::TAU;

/// Root body. Runs a pacemaker oscillator on two antiphase outputs.
///
/// Slot layout:
/// - 0: output to `skt0`, pacemaker
/// - 1: output to `skt1`, pacemaker in antiphase
/// - 2: input from `skt0`, added to the base rate in Hz
/// - 3: input from `skt1`
#[derive(Debug, Clone)]
pub struct Core {
    phase: f32,
    hotspots: usize,
    variant: usize,
}

impl Core {
    const BASE_RATE: f32 = 0.5;

    #[must_use]
    pub fn new(hotspots: usize) -> Self {
        Self {
            phase: 0.0,
            hotspots,
            variant: 0,
        }
    }

    #[must_use]
    pub fn phase(&self) -> f32 {
        self.phase
    }
}

impl Physiology for Core {
    fn channels(&self) -> Vec<ChannelSpec> {
        vec![
            ChannelSpec::output(SocketRef::Socket(0)).with_chemical(1),
            ChannelSpec::output(SocketRef::Socket(1)),
            ChannelSpec::input(SocketRef::Socket(0)).with_constant(0.5),
            ChannelSpec::input(SocketRef::Socket(1)),
        ]
    }

    fn variants(&self) -> &'static [&'static str] {
        &["default", "large"]
    }

    fn init(&mut self, ctx: &mut CellContext<'_>) -> anyhow::Result<()> {
        self.variant = ctx.variant;
        Ok(())
    }

    fn fast_update(&mut self, ctx: &mut CellContext<'_>) -> anyhow::Result<()> {
        let rate = Self::BASE_RATE + ctx.input(2);
        self.phase = (self.phase + rate * ctx.dt * TAU) % TAU;
        let beat = 0.5 + 0.5 * self.phase.sin();
        ctx.output(0, beat);
        ctx.output(1, 1.0 - beat);
        Ok(())
    }

    fn slow_update(&mut self, ctx: &mut CellContext<'_>) -> anyhow::Result<()> {
        tracing::trace!(tick = ctx.tick, phase = self.phase, "Core pacemaker");
        Ok(())
    }

    fn camera_mount(&self) -> Option<usize> {
        (self.hotspots > 0).then_some(0)
    }

    fn mass(&self) -> f32 {
        if self.variant == 1 {
            4.0
        } else {
            2.0
        }
    }

    fn resistance(&self) -> f32 {
        0.8
    }
}

/// Passive segment relaying two signals between its plug and `skt0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Spine;

impl Physiology for Spine {
    fn channels(&self) -> Vec<ChannelSpec> {
        vec![
            ChannelSpec::bypass(SocketRef::Plug, SocketRef::Socket(0)),
            ChannelSpec::bypass(SocketRef::Plug, SocketRef::Socket(0)),
        ]
    }

    fn fast_update(&mut self, _ctx: &mut CellContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }
}
