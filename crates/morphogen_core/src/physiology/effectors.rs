//! Parts that act on the body or the organism's chemistry.

use super::{CellContext, Physiology};
use morphogen_data::{ChannelSpec, SocketRef, Vec3, NUM_CHEMICALS};

/// Single-joint actuator. Eases its joint towards the plug input and
/// relays one signal through to `skt0`.
#[derive(Debug, Clone, Default)]
pub struct Muscle {
    variant: usize,
}

impl Muscle {
    const RESPONSE: [f32; 2] = [4.0, 10.0];
}

impl Physiology for Muscle {
    fn channels(&self) -> Vec<ChannelSpec> {
        vec![
            ChannelSpec::input(SocketRef::Plug).with_constant(0.5),
            ChannelSpec::bypass(SocketRef::Plug, SocketRef::Socket(0)),
        ]
    }

    fn variants(&self) -> &'static [&'static str] {
        &["default", "strong"]
    }

    fn joint_count(&self) -> Option<usize> {
        Some(1)
    }

    fn init(&mut self, ctx: &mut CellContext<'_>) -> anyhow::Result<()> {
        self.variant = ctx.variant.min(Self::RESPONSE.len() - 1);
        let rest = ctx.input(0);
        ctx.set_joint(0, rest);
        Ok(())
    }

    fn fast_update(&mut self, ctx: &mut CellContext<'_>) -> anyhow::Result<()> {
        let target = ctx.input(0);
        let current = ctx.joint(0);
        anyhow::ensure!(target.is_finite(), "muscle target is not finite");
        let step = (Self::RESPONSE[self.variant] * ctx.dt).min(1.0);
        ctx.set_joint(0, current + (target - current) * step);
        Ok(())
    }

    fn mass(&self) -> f32 {
        1.5
    }
}

/// Paddle producing thrust along its local +Z in proportion to its input.
#[derive(Debug, Clone, Default)]
pub struct Fin {
    drive: f32,
}

impl Fin {
    const MAX_THRUST: f32 = 6.0;
}

impl Physiology for Fin {
    fn channels(&self) -> Vec<ChannelSpec> {
        vec![ChannelSpec::input(SocketRef::Plug)]
    }

    fn fast_update(&mut self, ctx: &mut CellContext<'_>) -> anyhow::Result<()> {
        self.drive = ctx.input(0).clamp(0.0, 1.0);
        Ok(())
    }

    fn mass(&self) -> f32 {
        0.5
    }

    fn resistance(&self) -> f32 {
        1.5
    }

    fn propulsion(&self) -> Vec3 {
        Vec3::Z * self.drive * Self::MAX_THRUST
    }
}

/// Secretes a hormone into the organism-wide pool at a rate set by its input.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gland;

impl Gland {
    /// The hormone secreted, the highest global chemical.
    pub const HORMONE: u8 = NUM_CHEMICALS;
    const RATE: f32 = 0.5;
}

impl Physiology for Gland {
    fn channels(&self) -> Vec<ChannelSpec> {
        vec![ChannelSpec::input(SocketRef::Plug)]
    }

    fn fast_update(&mut self, ctx: &mut CellContext<'_>) -> anyhow::Result<()> {
        let amount = ctx.input(0) * Self::RATE * ctx.dt;
        ctx.globals.add(Self::HORMONE, amount);
        Ok(())
    }

    fn buoyancy(&self) -> f32 {
        1.1
    }
}
