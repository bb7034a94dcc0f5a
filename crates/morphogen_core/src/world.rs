//! Multi-organism container.

use crate::archetype::{ArchetypeLibrary, MeshLoader};
use crate::config::SimConfig;
use crate::error::{CoreError, Result};
use crate::metrics::{Event, Metrics, TickSample};
use crate::organism::{BuildContext, Organism};
use crate::physiology::PhysiologyRegistry;
use crate::spatial::SpatialIndex;
use morphogen_data::{Genome, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::time::Instant;
use uuid::Uuid;

/// Owns the shared archetype library, the physiology registry and every
/// live organism, and steps them together.
pub struct World {
    pub config: SimConfig,
    library: ArchetypeLibrary,
    registry: PhysiologyRegistry,
    organisms: BTreeMap<Uuid, Organism>,
    spatial: SpatialIndex,
    rng: ChaCha8Rng,
    pub metrics: Metrics,
    ticks: u64,
}

impl World {
    /// Creates an empty world with the built-in physiologies registered.
    pub fn new(config: SimConfig, loader: Box<dyn MeshLoader>) -> anyhow::Result<Self> {
        config.validate()?;
        let rng = match config.world.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Ok(Self {
            spatial: SpatialIndex::new(config.world.cell_size),
            config,
            library: ArchetypeLibrary::new(loader),
            registry: PhysiologyRegistry::with_builtins(),
            organisms: BTreeMap::new(),
            rng,
            metrics: Metrics::new(),
            ticks: 0,
        })
    }

    #[must_use]
    pub fn library(&self) -> &ArchetypeLibrary {
        &self.library
    }

    /// Registry for adding custom physiologies before spawning.
    pub fn registry_mut(&mut self) -> &mut PhysiologyRegistry {
        &mut self.registry
    }

    /// Borrowed collaborators for building or editing organisms by hand.
    #[must_use]
    pub fn build_context(&self) -> BuildContext<'_> {
        BuildContext {
            library: &self.library,
            registry: &self.registry,
            config: &self.config,
        }
    }

    /// Expresses `genome` at `location` and adds the organism.
    pub fn spawn(&mut self, genome: Genome, location: Vec3) -> Result<Uuid> {
        let organism = Organism::new(genome, &self.build_context(), location)?;
        let id = organism.id();
        self.spatial.insert(id, organism.bounds());
        self.organisms.insert(id, organism);
        self.metrics.record(Event::Spawned);
        Ok(id)
    }

    /// Spawns at a random point within `radius` of `center`, drawn from the
    /// world's seeded generator.
    pub fn spawn_near(&mut self, genome: Genome, center: Vec3, radius: f32) -> Result<Uuid> {
        let offset = Vec3::new(
            self.rng.gen_range(-1.0..=1.0),
            self.rng.gen_range(-1.0..=1.0),
            self.rng.gen_range(-1.0..=1.0),
        )
        .clamp_length_max(1.0)
            * radius;
        self.spawn(genome, center + offset)
    }

    /// Adds an organism built elsewhere against this world's library.
    pub fn adopt(&mut self, organism: Organism) -> Uuid {
        let id = organism.id();
        self.spatial.insert(id, organism.bounds());
        self.organisms.insert(id, organism);
        id
    }

    /// Disposes of and removes an organism. Returns whether it existed.
    pub fn despawn(&mut self, id: Uuid) -> bool {
        let Some(mut organism) = self.organisms.remove(&id) else {
            return false;
        };
        self.spatial.remove(id);
        organism.dispose();
        self.metrics.record(Event::Despawned);
        true
    }

    #[must_use]
    pub fn organism(&self, id: Uuid) -> Option<&Organism> {
        self.organisms.get(&id)
    }

    pub fn organism_mut(&mut self, id: Uuid) -> Option<&mut Organism> {
        self.organisms.get_mut(&id)
    }

    /// Runs `edit` against organism `id` together with this world's build
    /// context, so parts can be grafted onto it. `None` if there is no such
    /// organism.
    pub fn edit_organism<T, F>(&mut self, id: Uuid, edit: F) -> Option<T>
    where
        F: FnOnce(&mut Organism, &BuildContext<'_>) -> T,
    {
        let ctx = BuildContext {
            library: &self.library,
            registry: &self.registry,
            config: &self.config,
        };
        let organism = self.organisms.get_mut(&id)?;
        let before = organism.rewires();
        let outcome = edit(organism, &ctx);
        let after = organism.rewires();
        for _ in before..after {
            self.metrics.record(Event::Rewired);
        }
        Some(outcome)
    }

    pub fn organisms(&self) -> impl Iterator<Item = &Organism> {
        self.organisms.values()
    }

    #[must_use]
    pub fn population(&self) -> usize {
        self.organisms.len()
    }

    #[must_use]
    pub fn part_count(&self) -> usize {
        self.organisms.values().map(Organism::part_count).sum()
    }

    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    #[must_use]
    pub fn spatial(&self) -> &SpatialIndex {
        &self.spatial
    }

    /// Steps every organism once.
    ///
    /// Organisms begin their tick in id order, collisions are resolved
    /// pairwise, then every organism finishes its tick. The first part
    /// failure aborts the world tick and is returned; organisms already
    /// stepped keep their new state.
    pub fn tick(&mut self) -> Result<()> {
        let start = Instant::now();

        for organism in self.organisms.values_mut() {
            if let Err(e) = organism.begin_tick(&self.config) {
                if matches!(e, CoreError::PartUpdate { .. }) {
                    self.metrics.record(Event::PartFailed);
                }
                return Err(e);
            }
        }

        self.spatial
            .rebuild(self.organisms.iter().map(|(id, o)| (*id, o.bounds())));
        let mut contacts = 0;
        for (a, b) in self.spatial.candidate_pairs() {
            contacts += self.resolve_pair(a, b)?;
        }

        for organism in self.organisms.values_mut() {
            if let Err(e) = organism.end_tick(&self.config) {
                if matches!(e, CoreError::PartUpdate { .. }) {
                    self.metrics.record(Event::PartFailed);
                }
                return Err(e);
            }
        }

        self.ticks += 1;
        if contacts > 0 {
            tracing::trace!(tick = self.ticks, contacts, "Resolved contacts");
        }
        let (links, dangling) = self.organisms.values().fold((0, 0), |(l, d), o| {
            (l + o.wiring().len(), d + o.wiring().dangling.len())
        });
        self.metrics.record_tick(TickSample {
            duration: start.elapsed(),
            organisms: self.organisms.len(),
            parts: self.part_count(),
            links,
            dangling,
            contacts,
            archetypes: self.library.len(),
        });
        Ok(())
    }

    fn resolve_pair(&mut self, a: Uuid, b: Uuid) -> Result<usize> {
        let contacts = match (self.organisms.get(&a), self.organisms.get(&b)) {
            (Some(oa), Some(ob)) => oa.contacts_with(ob),
            _ => return Err(CoreError::invalid_state("spatial index out of sync")),
        };
        if let Some(oa) = self.organisms.get_mut(&a) {
            for contact in &contacts {
                oa.apply_contact(contact, &self.config);
            }
        }
        if let Some(ob) = self.organisms.get_mut(&b) {
            for contact in &contacts {
                ob.apply_contact(&contact.mirrored(), &self.config);
            }
        }
        Ok(contacts.len())
    }
}

impl Drop for World {
    fn drop(&mut self) {
        for organism in self.organisms.values_mut() {
            organism.dispose();
        }
    }
}
