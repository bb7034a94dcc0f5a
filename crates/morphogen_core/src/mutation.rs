//! Seeded channel mutation for organisms in edit mode.

use crate::config::MutationConfig;
use crate::error::{CoreError, Result};
use crate::organism::{Organism, OrganismState};
use crate::wiring;
use morphogen_data::NUM_CHEMICALS;
use rand::Rng;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationSummary {
    pub chemicals_changed: usize,
    pub constants_changed: usize,
    /// Drawn chemicals that the channel's role did not allow.
    pub rejected: usize,
}

impl MutationSummary {
    #[must_use]
    pub fn total(&self) -> usize {
        self.chemicals_changed + self.constants_changed
    }
}

/// Randomly reselects channel chemicals and jitters channel constants.
///
/// Channels are visited in tree-walk order, so the same organism and the
/// same seeded generator always produce the same edits. A drawn chemical
/// is kept only if [`wiring::is_valid_chemical`] accepts it at that point.
/// The organism must be in edit mode; the new wiring takes effect on
/// [`Organism::edit_off`].
pub fn mutate_channels<R: Rng>(
    organism: &mut Organism,
    config: &MutationConfig,
    rng: &mut R,
) -> Result<MutationSummary> {
    if organism.state() != OrganismState::Editing {
        return Err(CoreError::invalid_state(
            "channels can only be mutated in edit mode",
        ));
    }

    let slots: Vec<_> = organism
        .tree()
        .walk()
        .into_iter()
        .flat_map(|id| (0..organism.tree()[id].channels.len()).map(move |i| (id, i)))
        .collect();

    let mut summary = MutationSummary::default();
    for (part, index) in slots {
        if rng.gen::<f32>() < config.rate {
            let chemical = rng.gen_range(0..=NUM_CHEMICALS);
            let cell = &organism.tree()[part];
            if chemical != cell.channels[index].chemical {
                if wiring::is_valid_chemical(cell, index, chemical) {
                    organism.set_channel_chemical(part, index, chemical)?;
                    summary.chemicals_changed += 1;
                } else {
                    summary.rejected += 1;
                }
            }
        }

        if rng.gen::<f32>() < config.rate {
            let constant = organism.tree()[part].channels[index].constant;
            let jitter = rng.gen_range(-config.amount..=config.amount);
            organism.set_channel_constant(part, index, (constant + jitter).clamp(0.0, 1.0))?;
            summary.constants_changed += 1;
        }
    }

    tracing::debug!(
        organism = %organism.id(),
        chemicals = summary.chemicals_changed,
        constants = summary.constants_changed,
        rejected = summary.rejected,
        "Mutated channels"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::test_support::library;
    use crate::config::SimConfig;
    use crate::organism::BuildContext;
    use crate::physiology::PhysiologyRegistry;
    use morphogen_data::{Gene, Genome, Vec3};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn genome() -> Genome {
        Genome::new(
            "mutant",
            Gene::new("core")
                .with_child(
                    Gene::new("spine")
                        .with_socket("skt0")
                        .with_child(Gene::new("muscle").with_socket("skt0")),
                )
                .with_child(Gene::new("fin").with_socket("skt1")),
        )
    }

    fn mutated(seed: u64, config: &MutationConfig) -> (MutationSummary, Gene) {
        let library = library();
        let registry = PhysiologyRegistry::with_builtins();
        let sim = SimConfig::default();
        let ctx = BuildContext {
            library: &library,
            registry: &registry,
            config: &sim,
        };
        let mut organism = Organism::new(genome(), &ctx, Vec3::ZERO).unwrap();
        organism.edit_on().unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let summary = mutate_channels(&mut organism, config, &mut rng).unwrap();

        for (_, cell) in organism.tree().iter() {
            for (i, channel) in cell.channels.iter().enumerate() {
                assert!(wiring::is_valid_chemical(cell, i, channel.chemical));
                assert!((0.0..=1.0).contains(&channel.constant));
            }
        }
        let root = organism.tree().root().unwrap();
        let gene = organism.tree().to_gene(root).unwrap();
        (summary, gene)
    }

    #[test]
    fn test_requires_edit_mode() {
        let library = library();
        let registry = PhysiologyRegistry::with_builtins();
        let sim = SimConfig::default();
        let ctx = BuildContext {
            library: &library,
            registry: &registry,
            config: &sim,
        };
        let mut organism = Organism::new(genome(), &ctx, Vec3::ZERO).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(mutate_channels(&mut organism, &sim.mutation, &mut rng).is_err());
    }

    #[test]
    fn test_same_seed_same_result() {
        let config = MutationConfig {
            rate: 0.5,
            amount: 0.3,
        };
        let (s1, g1) = mutated(42, &config);
        let (s2, g2) = mutated(42, &config);
        assert_eq!(s1, s2);
        assert!(g1.approx_eq(&g2, 1e-6));
    }

    #[test]
    fn test_zero_rate_changes_nothing() {
        let config = MutationConfig {
            rate: 0.0,
            amount: 0.3,
        };
        let (summary, gene) = mutated(3, &config);
        assert_eq!(summary.total(), 0);
        assert_eq!(summary.rejected, 0);
        let (_, untouched) = mutated(4, &config);
        assert!(gene.approx_eq(&untouched, 1e-6));
    }

    #[test]
    fn test_full_rate_touches_every_constant() {
        let config = MutationConfig {
            rate: 1.0,
            amount: 0.1,
        };
        let (summary, _) = mutated(9, &config);
        // core 4 + spine 2 + muscle 2 + fin 1
        assert_eq!(summary.constants_changed, 9);
    }
}
