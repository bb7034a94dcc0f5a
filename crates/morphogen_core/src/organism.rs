//! Organism orchestration.
//!
//! An organism owns a part tree expressed from a genome and drives the
//! per-tick update order:
//!
//! 1. record previous part positions
//! 2. set the root transform from location, orientation and scale
//! 3. propagate frames through every part
//! 4. propagate channel signals
//! 5. run physiology fast updates
//! 6. collision detection (driven by [`crate::world::World`])
//! 7. accumulate and apply forces
//! 8. slow-path physiology updates every `slow_update_interval` ticks
//!
//! Steps 1–5 run in [`Organism::begin_tick`] and 7–8 in
//! [`Organism::end_tick`], so a world can resolve collisions between them.
//!
//! While editing, physics is suspended: only transforms and channels are
//! refreshed, and structural changes are allowed. Leaving edit mode rewires
//! the whole tree and mirrors it back into the genome.

use crate::archetype::ArchetypeLibrary;
use crate::cell::{PartId, PartTree};
use crate::channel::GlobalChemistry;
use crate::config::SimConfig;
use crate::error::{CoreError, Result};
use crate::physiology::{PhysiologyRegistry, Stimulus};
use crate::transform;
use crate::wiring::{self, WiringReport};
use morphogen_data::{Gene, Genome, Mat4, Quat, Sphere, Vec3};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrganismState {
    Running,
    Editing,
    Disposed,
}

/// Collaborators needed to clone parts.
#[derive(Clone, Copy)]
pub struct BuildContext<'a> {
    pub library: &'a ArchetypeLibrary,
    pub registry: &'a PhysiologyRegistry,
    pub config: &'a SimConfig,
}

/// Touch between a part of this organism and a part of another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub part: PartId,
    pub other_part: PartId,
    pub depth: f32,
    /// Unit vector pointing from the other part towards this one.
    pub normal: Vec3,
}

impl Contact {
    /// The same contact seen from the other organism.
    #[must_use]
    pub fn mirrored(&self) -> Self {
        Self {
            part: self.other_part,
            other_part: self.part,
            depth: self.depth,
            normal: -self.normal,
        }
    }
}

pub struct Organism {
    id: Uuid,
    genome: Genome,
    tree: PartTree,
    wiring: WiringReport,
    state: OrganismState,
    globals: GlobalChemistry,
    pub location: Vec3,
    pub orientation: Quat,
    pub scale: f32,
    pub velocity: Vec3,
    /// Contact forces gathered since the last integration.
    pending_force: Vec3,
    mass: f32,
    bounds: Sphere,
    ticks: u64,
    rewires: u64,
}

impl Organism {
    /// Expresses `genome` into a running organism at `location`.
    ///
    /// Parts are cloned and attached, channels wired, transforms propagated
    /// and mass and bounds aggregated before this returns. Any failure
    /// aborts construction and releases every part cloned so far.
    pub fn new(genome: Genome, ctx: &BuildContext<'_>, location: Vec3) -> Result<Self> {
        genome
            .validate()
            .map_err(|e| CoreError::InvalidGenome(format!("{e:#}")))?;
        let mut tree = PartTree::build(
            &genome.root,
            ctx.library,
            ctx.registry,
            &ctx.config.archetypes,
            ctx.config.organism.max_parts,
        )?;
        let wiring = wiring::wire_up_all_channels(&mut tree)?;

        let mut organism = Self {
            id: Uuid::new_v4(),
            genome,
            tree,
            wiring,
            state: OrganismState::Running,
            globals: GlobalChemistry::default(),
            location,
            orientation: Quat::IDENTITY,
            scale: 1.0,
            velocity: Vec3::ZERO,
            pending_force: Vec3::ZERO,
            mass: 0.0,
            bounds: Sphere::default(),
            ticks: 0,
            rewires: 0,
        };
        organism.update_transforms();
        organism.refresh_mass();
        tracing::info!(
            organism = %organism.id,
            genome = %organism.genome.name,
            parts = organism.tree.len(),
            links = organism.wiring.len(),
            "Organism constructed"
        );
        Ok(organism)
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    #[must_use]
    pub fn tree(&self) -> &PartTree {
        &self.tree
    }

    #[must_use]
    pub fn root(&self) -> Option<PartId> {
        self.tree.root()
    }

    #[must_use]
    pub fn state(&self) -> OrganismState {
        self.state
    }

    #[must_use]
    pub fn wiring(&self) -> &WiringReport {
        &self.wiring
    }

    /// Successful edit sessions, each ending in a full rewire.
    #[must_use]
    pub fn rewires(&self) -> u64 {
        self.rewires
    }

    #[must_use]
    pub fn globals(&self) -> &GlobalChemistry {
        &self.globals
    }

    pub fn globals_mut(&mut self) -> &mut GlobalChemistry {
        &mut self.globals
    }

    #[must_use]
    pub fn mass(&self) -> f32 {
        self.mass
    }

    /// Sphere enclosing every part as of the last propagation.
    #[must_use]
    pub fn bounds(&self) -> Sphere {
        self.bounds
    }

    #[must_use]
    pub fn part_count(&self) -> usize {
        self.tree.len()
    }

    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Current root transform.
    #[must_use]
    pub fn world_transform(&self) -> Mat4 {
        transform::root_transform(self.location, self.orientation, self.scale)
    }

    /// Re-runs frame propagation from the current placement.
    pub fn update_transforms(&mut self) {
        let world = self.world_transform();
        if let Some(bounds) = transform::propagate_frames(&mut self.tree, world) {
            self.bounds = bounds;
        }
    }

    fn refresh_mass(&mut self) {
        self.mass = self
            .tree
            .iter()
            .map(|(_, cell)| cell.physiology().mass())
            .sum();
    }

    fn ensure_live(&self) -> Result<()> {
        if self.state == OrganismState::Disposed {
            return Err(CoreError::invalid_state(format!(
                "organism {} is disposed",
                self.id
            )));
        }
        Ok(())
    }

    fn ensure_editing(&self) -> Result<()> {
        if self.state != OrganismState::Editing {
            return Err(CoreError::invalid_state(format!(
                "organism {} is not in edit mode",
                self.id
            )));
        }
        Ok(())
    }

    /// Steps 1–5 of a tick.
    ///
    /// A physiology failure aborts the rest of this organism's tick and is
    /// returned as [`CoreError::PartUpdate`] naming the part.
    pub fn begin_tick(&mut self, config: &SimConfig) -> Result<()> {
        self.ensure_live()?;
        for (_, cell) in self.tree.iter_mut() {
            cell.prev_location = cell.location;
        }
        self.update_transforms();
        wiring::propagate(&mut self.tree, &self.wiring, &self.globals);
        if self.state == OrganismState::Editing {
            return Ok(());
        }

        let dt = config.organism.dt;
        let tick = self.ticks;
        for id in self.tree.walk() {
            let cell = &mut self.tree[id];
            cell.run(&mut self.globals, dt, tick, |physiology, ctx| {
                physiology.fast_update(ctx)
            })
            .map_err(|source| {
                tracing::error!(
                    organism = %self.id,
                    part = %cell.name(),
                    error = %source,
                    "Part update failed"
                );
                CoreError::PartUpdate {
                    part: cell.name(),
                    source,
                }
            })?;
        }
        Ok(())
    }

    /// Steps 7–8 of a tick: force integration, slow-path updates and
    /// hormone decay.
    pub fn end_tick(&mut self, config: &SimConfig) -> Result<()> {
        self.ensure_live()?;
        if self.state == OrganismState::Editing {
            self.pending_force = Vec3::ZERO;
            return Ok(());
        }

        self.integrate(config);

        self.ticks += 1;
        let dt = config.organism.dt;
        // an unvalidated interval of 0 means every tick
        if self.ticks % config.organism.slow_update_interval.max(1) == 0 {
            let tick = self.ticks;
            for id in self.tree.walk() {
                let cell = &mut self.tree[id];
                cell.run(&mut self.globals, dt, tick, |physiology, ctx| {
                    physiology.slow_update(ctx)
                })
                .map_err(|source| CoreError::PartUpdate {
                    part: cell.name(),
                    source,
                })?;
            }
        }
        self.globals.decay(config.organism.hormone_decay);
        Ok(())
    }

    /// A full tick for an organism simulated on its own.
    pub fn tick(&mut self, config: &SimConfig) -> Result<()> {
        self.begin_tick(config)?;
        self.end_tick(config)
    }

    fn integrate(&mut self, config: &SimConfig) {
        let physics = &config.physics;
        let dt = config.organism.dt;
        let mut force = std::mem::take(&mut self.pending_force);

        for (_, cell) in self.tree.iter() {
            let physiology = cell.physiology();
            let weight = physiology.mass() * physics.gravity;
            force -= Vec3::Y * weight;
            if cell.world_bounds.center.y < physics.water_level {
                force += Vec3::Y * weight * physiology.buoyancy() * physics.fluid_density;
            }
            force -= self.velocity * physiology.resistance() * physics.fluid_density;
            force += cell.transform().transform_vector3(physiology.propulsion());
        }

        let mass = self.mass.max(f32::EPSILON);
        self.velocity += force / mass * dt;
        self.velocity *= 1.0 - physics.linear_damping;
        self.velocity = self.velocity.clamp_length_max(physics.max_speed);
        self.location += self.velocity * dt;
    }

    /// Part-level contacts with `other`: a bounds check on both organisms,
    /// then on part pairs, then on the mesh spheres of collision frames.
    /// At most one contact, the deepest, is reported per part pair.
    #[must_use]
    pub fn contacts_with(&self, other: &Organism) -> Vec<Contact> {
        let mut contacts = Vec::new();
        if self.bounds.penetration(&other.bounds) <= 0.0 {
            return contacts;
        }
        for (a_id, a) in self.tree.iter() {
            if a.world_bounds.penetration(&other.bounds) <= 0.0 {
                continue;
            }
            for (b_id, b) in other.tree.iter() {
                if a.world_bounds.penetration(&b.world_bounds) <= 0.0 {
                    continue;
                }
                let mut deepest: Option<(f32, Vec3)> = None;
                for sa in collision_spheres(a) {
                    for sb in collision_spheres(b) {
                        let depth = sa.penetration(&sb);
                        if depth > deepest.map_or(0.0, |(d, _)| d) {
                            let normal = (sa.center - sb.center).try_normalize().unwrap_or(Vec3::Y);
                            deepest = Some((depth, normal));
                        }
                    }
                }
                if let Some((depth, normal)) = deepest {
                    contacts.push(Contact {
                        part: a_id,
                        other_part: b_id,
                        depth,
                        normal,
                    });
                }
            }
        }
        contacts
    }

    /// Adds a separating force for `contact` and notifies the touched part.
    pub fn apply_contact(&mut self, contact: &Contact, config: &SimConfig) {
        if self.state != OrganismState::Running {
            return;
        }
        self.pending_force += contact.normal
            * contact.depth
            * config.physics.collision_stiffness
            / config.organism.dt;
        if let Some(cell) = self.tree.get_mut(contact.part) {
            cell.stimulate(&Stimulus::Contact {
                depth: contact.depth,
                normal: contact.normal,
            });
        }
    }

    /// Delivers a stimulus to one part.
    pub fn stimulate(&mut self, part: PartId, stimulus: &Stimulus) -> Result<()> {
        self.ensure_live()?;
        self.tree
            .get_mut(part)
            .ok_or_else(|| CoreError::unknown_part(format!("{part:?}")))?
            .stimulate(stimulus);
        Ok(())
    }

    /// First hotspot, in tree-walk order, whose physiology accepts a camera.
    #[must_use]
    pub fn camera_mount(&self) -> Option<(PartId, Mat4)> {
        self.tree.walk().into_iter().find_map(|id| {
            let cell = &self.tree[id];
            let hotspot = cell.physiology().camera_mount()?;
            let frame = cell.frames.get(*cell.hotspots.get(hotspot)?)?;
            Some((id, frame.combined))
        })
    }

    /// Enters edit mode, suspending physics.
    pub fn edit_on(&mut self) -> Result<()> {
        match self.state {
            OrganismState::Running => {
                self.state = OrganismState::Editing;
                tracing::debug!(organism = %self.id, "Edit mode on");
                Ok(())
            }
            OrganismState::Editing => Ok(()),
            OrganismState::Disposed => self.ensure_live(),
        }
    }

    /// Leaves edit mode: rewires the whole tree, mirrors it into the genome
    /// and resumes physics.
    ///
    /// If wiring fails the organism stays in edit mode so the offending
    /// change can be undone.
    pub fn edit_off(&mut self) -> Result<&Genome> {
        self.ensure_editing()?;
        self.wiring = wiring::wire_up_all_channels(&mut self.tree)?;
        self.rewires += 1;
        self.update_gene();
        self.refresh_mass();
        self.update_transforms();
        self.state = OrganismState::Running;
        tracing::debug!(
            organism = %self.id,
            parts = self.tree.len(),
            links = self.wiring.len(),
            "Edit mode off"
        );
        Ok(&self.genome)
    }

    /// Clones `gene` and its descendants onto `parent`.
    pub fn add_part(
        &mut self,
        parent: PartId,
        gene: &Gene,
        ctx: &BuildContext<'_>,
    ) -> Result<PartId> {
        self.ensure_editing()?;
        let total = self.tree.len() + gene.count();
        if total > ctx.config.organism.max_parts {
            return Err(CoreError::InvalidGenome(format!(
                "{total} parts exceeds the limit of {}",
                ctx.config.organism.max_parts
            )));
        }
        self.tree.graft(
            parent,
            gene,
            ctx.library,
            ctx.registry,
            &ctx.config.archetypes,
        )
    }

    /// Disposes of `part` and its descendants. The root cannot be deleted.
    pub fn delete_part(&mut self, part: PartId) -> Result<usize> {
        self.ensure_editing()?;
        if self.tree.root() == Some(part) {
            return Err(CoreError::invalid_state("the root part cannot be deleted"));
        }
        self.tree.remove_subtree(part)
    }

    /// Changes a channel's chemical if [`wiring::is_valid_chemical`] allows it.
    pub fn set_channel_chemical(&mut self, part: PartId, index: usize, chemical: u8) -> Result<()> {
        self.ensure_editing()?;
        let cell = self
            .tree
            .get_mut(part)
            .ok_or_else(|| CoreError::unknown_part(format!("{part:?}")))?;
        let name = cell.name();
        if index >= cell.channels.len() {
            return Err(CoreError::unknown_part(format!("{name} has no channel {index}")));
        }
        if !wiring::is_valid_chemical(cell, index, chemical) {
            tracing::warn!(part = %name, channel = index, chemical, "Rejected chemical");
            return Err(CoreError::InvalidChemical {
                part: name,
                channel: index,
                chemical,
            });
        }
        let channel = cell
            .channels
            .get_mut(index)
            .ok_or_else(|| CoreError::unknown_part(format!("{name} has no channel {index}")))?;
        channel.chemical = chemical;
        Ok(())
    }

    /// Sets the fallback value of a channel.
    pub fn set_channel_constant(&mut self, part: PartId, index: usize, constant: f32) -> Result<()> {
        self.ensure_live()?;
        let cell = self
            .tree
            .get_mut(part)
            .ok_or_else(|| CoreError::unknown_part(format!("{part:?}")))?;
        let name = cell.name();
        let channel = cell
            .channels
            .get_mut(index)
            .ok_or_else(|| CoreError::unknown_part(format!("{name} has no channel {index}")))?;
        channel.constant = constant;
        Ok(())
    }

    pub fn set_plug_orientation(&mut self, part: PartId, orientation: Mat4) -> Result<()> {
        self.ensure_editing()?;
        self.tree
            .get_mut(part)
            .ok_or_else(|| CoreError::unknown_part(format!("{part:?}")))?
            .plug = orientation;
        Ok(())
    }

    /// Rebuilds the genome from the live part tree.
    pub fn update_gene(&mut self) -> &Genome {
        if let Some(root) = self.tree.root().and_then(|r| self.tree.to_gene(r)) {
            self.genome.root = root;
        }
        &self.genome
    }

    /// Releases every part. Further ticks and edits fail.
    pub fn dispose(&mut self) {
        if self.state == OrganismState::Disposed {
            return;
        }
        let parts = self.tree.len();
        self.tree.clear();
        self.wiring = WiringReport::default();
        self.state = OrganismState::Disposed;
        tracing::info!(organism = %self.id, parts, "Organism disposed");
    }
}

impl std::fmt::Debug for Organism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Organism")
            .field("id", &self.id)
            .field("genome", &self.genome.name)
            .field("state", &self.state)
            .field("parts", &self.tree.len())
            .finish()
    }
}

/// World-space mesh spheres of a part's collision frames.
fn collision_spheres(cell: &crate::cell::Cell) -> impl Iterator<Item = Sphere> + '_ {
    cell.collision_frames.iter().filter_map(|&id| {
        let frame = cell.frames.get(id)?;
        Some(frame.mesh.as_ref()?.bounds.transformed(&frame.combined))
    })
}
