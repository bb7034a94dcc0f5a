pub mod macros;

use morphogen_lib::model::archetype::{ArchetypeKey, ArchetypeLibrary, ArchetypeSource, MemoryLoader};
use morphogen_lib::model::config::SimConfig;
use morphogen_lib::model::organism::BuildContext;
use morphogen_lib::model::physiology::PhysiologyRegistry;
use morphogen_lib::model::state::{
    Frame, FrameTree, Gene, Genome, JointLimits, Mat4, MeshInfo, Sphere, Vec3,
};
use morphogen_lib::model::{Organism, World};

#[allow(dead_code)]
pub const SOCKET_SPACING: f32 = 1.0;

fn mesh() -> MeshInfo {
    MeshInfo {
        bounds: Sphere::new(Vec3::ZERO, 0.5),
        materials: Vec::new(),
    }
}

/// Skeleton with `sockets` sockets spaced along +X, a chain of `joints`
/// joints between the body and the sockets, and `hotspots` hotspots.
#[allow(dead_code)]
pub fn skeleton(sockets: usize, joints: usize, hotspots: usize) -> FrameTree {
    let mut frames = FrameTree::new(Frame::new("body", Mat4::IDENTITY).with_mesh(mesh()));
    let mut parent = FrameTree::ROOT;
    for j in 0..joints {
        parent = frames.add_child(
            parent,
            Frame::new(format!("anim{j}"), Mat4::IDENTITY).with_limits(JointLimits {
                axis: Vec3::Y,
                min_angle: -1.0,
                max_angle: 1.0,
            }),
        );
    }
    for s in 0..sockets {
        let offset = Mat4::from_translation(Vec3::new(SOCKET_SPACING * (s + 1) as f32, 0.0, 0.0));
        frames.add_child(parent, Frame::new(format!("skt{s}"), offset));
    }
    for h in 0..hotspots {
        frames.add_child(FrameTree::ROOT, Frame::new(format!("hot{h}"), Mat4::IDENTITY));
    }
    frames
}

/// In-memory archetypes for every built-in physiology plus any extras.
#[allow(dead_code)]
pub fn loader() -> MemoryLoader {
    let entries = [
        ("core", "core", skeleton(2, 0, 1)),
        ("spine", "spine", skeleton(1, 0, 0)),
        ("muscle", "muscle", skeleton(1, 1, 0)),
        ("fin", "fin", skeleton(0, 0, 0)),
        ("gland", "gland", skeleton(0, 0, 0)),
        ("sensor", "sensor", skeleton(0, 0, 0)),
    ];
    let mut loader = MemoryLoader::new();
    for (name, physiology, frames) in entries {
        for variant in ["default", "large", "strong"] {
            loader.insert(
                ArchetypeKey::new("CellTypes", name, variant),
                ArchetypeSource {
                    physiology: physiology.into(),
                    frames: frames.clone(),
                },
            );
        }
    }
    loader
}

/// Everything needed to grow organisms outside a [`World`].
#[allow(dead_code)]
pub struct Env {
    pub library: ArchetypeLibrary,
    pub registry: PhysiologyRegistry,
    pub config: SimConfig,
}

#[allow(dead_code)]
impl Env {
    pub fn new() -> Self {
        Self::with_loader(loader())
    }

    pub fn with_loader(loader: MemoryLoader) -> Self {
        Self {
            library: ArchetypeLibrary::new(Box::new(loader)),
            registry: PhysiologyRegistry::with_builtins(),
            config: SimConfig::default(),
        }
    }

    pub fn ctx(&self) -> BuildContext<'_> {
        BuildContext {
            library: &self.library,
            registry: &self.registry,
            config: &self.config,
        }
    }

    pub fn grow(&self, root: Gene) -> Organism {
        Organism::new(Genome::new("test", root), &self.ctx(), Vec3::ZERO)
            .expect("Failed to grow test organism")
    }
}

/// Fluent setup for a [`World`] holding test organisms.
#[allow(dead_code)]
pub struct WorldBuilder {
    config: SimConfig,
    genomes: Vec<(Genome, Vec3)>,
}

#[allow(dead_code)]
impl WorldBuilder {
    pub fn new() -> Self {
        let mut config = SimConfig::default();
        config.world.seed = Some(42);
        Self {
            config,
            genomes: Vec::new(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.world.seed = Some(seed);
        self
    }

    pub fn with_config<F>(mut self, modifier: F) -> Self
    where
        F: FnOnce(&mut SimConfig),
    {
        modifier(&mut self.config);
        self
    }

    pub fn with_organism(mut self, root: Gene, location: Vec3) -> Self {
        let name = format!("organism{}", self.genomes.len());
        self.genomes.push((Genome::new(name, root), location));
        self
    }

    pub fn build(self) -> World {
        let mut world =
            World::new(self.config, Box::new(loader())).expect("Failed to create test world");
        for (genome, location) in self.genomes {
            world
                .spawn(genome, location)
                .expect("Failed to spawn test organism");
        }
        world
    }
}

/// Core, spine at `skt0`, muscle at the spine's `skt0`, all on chemical 1.
#[allow(dead_code)]
pub fn swimmer() -> Gene {
    Gene::new("core").with_child(
        Gene::new("spine")
            .with_socket("skt0")
            .with_channel(1, 0.0)
            .with_channel(0, 0.0)
            .with_child(
                Gene::new("muscle")
                    .with_socket("skt0")
                    .with_channel(1, 0.0)
                    .with_channel(0, 0.0),
            ),
    )
}
