//! Parts that turn stimuli into signals.

use super::{CellContext, Physiology, Stimulus};
use morphogen_data::{ChannelSpec, SocketRef};

/// Touch sensor. Reports the deepest recent contact on its plug output and
/// forgets it gradually.
#[derive(Debug, Clone, Default)]
pub struct Sensor {
    level: f32,
}

impl Sensor {
    /// Fraction of the level kept per second.
    const RETENTION: f32 = 0.25;

    #[must_use]
    pub fn level(&self) -> f32 {
        self.level
    }
}

impl Physiology for Sensor {
    fn channels(&self) -> Vec<ChannelSpec> {
        vec![ChannelSpec::output(SocketRef::Plug)]
    }

    fn fast_update(&mut self, ctx: &mut CellContext<'_>) -> anyhow::Result<()> {
        ctx.output(0, self.level);
        self.level *= Self::RETENTION.powf(ctx.dt);
        Ok(())
    }

    fn on_stimulus(&mut self, stimulus: &Stimulus) {
        let strength = match stimulus {
            Stimulus::Contact { depth, .. } => *depth,
            Stimulus::Custom { kind, strength } if kind == "touch" => *strength,
            Stimulus::Custom { .. } => return,
        };
        self.level = self.level.max(strength.clamp(0.0, 1.0));
    }

    fn mass(&self) -> f32 {
        0.25
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physiology::test_support::ContextFixture;
    use morphogen_data::Vec3;

    #[test]
    fn test_contact_raises_output() {
        let mut sensor = Sensor::default();
        let mut fixture = ContextFixture::new(&sensor, 0);
        fixture.channels[0].chemical = 4;

        sensor.on_stimulus(&Stimulus::Contact {
            depth: 0.6,
            normal: Vec3::Y,
        });
        sensor.fast_update(&mut fixture.ctx(0)).unwrap();
        assert!((fixture.channels[0].signal - 0.6).abs() < 1e-6);
        assert!(sensor.level() < 0.6);
    }

    #[test]
    fn test_unrelated_custom_stimulus_ignored() {
        let mut sensor = Sensor::default();
        sensor.on_stimulus(&Stimulus::Custom {
            kind: "light".into(),
            strength: 1.0,
        });
        assert_eq!(sensor.level(), 0.0);
        sensor.on_stimulus(&Stimulus::Custom {
            kind: "touch".into(),
            strength: 2.0,
        });
        assert_eq!(sensor.level(), 1.0);
    }
}
