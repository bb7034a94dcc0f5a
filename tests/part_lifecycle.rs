mod common;

use common::{loader, swimmer, Env};
use morphogen_lib::model::archetype::{
    ArchetypeKey, ArchetypeLibrary, ArchetypeSource, MeshLoader, MemoryLoader,
};
use morphogen_lib::model::cell::{Cell, PartTree};
use morphogen_lib::model::transform::propagate_frames;
use morphogen_lib::model::state::{Gene, Genome, Mat4, Quat, Vec3};
use morphogen_lib::model::{CoreError, Organism};
use std::f32::consts::FRAC_PI_2;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Loader that counts how often it is asked for a mesh.
struct CountingLoader {
    inner: MemoryLoader,
    loads: Arc<AtomicUsize>,
}

impl MeshLoader for CountingLoader {
    fn load(&self, key: &ArchetypeKey) -> anyhow::Result<ArchetypeSource> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load(key)
    }
}

fn get(env: &Env, gene: &Gene) -> Result<Cell, CoreError> {
    Cell::get(gene, &env.library, &env.registry, &env.config.archetypes)
}

#[test]
fn test_archetype_loaded_once_and_released_with_last_part() {
    let loads = Arc::new(AtomicUsize::new(0));
    let mut env = Env::new();
    env.library = ArchetypeLibrary::new(Box::new(CountingLoader {
        inner: loader(),
        loads: Arc::clone(&loads),
    }));
    let key = ArchetypeKey::new("CellTypes", "fin", "default");

    let mut cells: Vec<Cell> = (0..5)
        .map(|_| get(&env, &Gene::new("fin")).unwrap())
        .collect();
    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert_eq!(env.library.len(), 1);
    assert_eq!(env.library.live_count(&key), 5);

    let mut names: Vec<String> = cells.iter().map(Cell::name).collect();
    names.dedup();
    assert_eq!(names.len(), 5, "part names must be unique");

    cells.truncate(2);
    assert_eq!(env.library.live_count(&key), 2);
    cells.clear();
    assert!(!env.library.contains(&key));

    // a later request loads it again
    let _again = get(&env, &Gene::new("fin")).unwrap();
    assert_eq!(loads.load(Ordering::SeqCst), 2);
}

#[test]
fn test_variants_are_separate_archetypes() {
    let env = Env::new();
    let _plain = get(&env, &Gene::new("core")).unwrap();
    let _large = get(&env, &Gene::new("CellTypes:core.large")).unwrap();
    assert_eq!(env.library.len(), 2);
    assert_eq!(
        env.library
            .live_count(&ArchetypeKey::new("CellTypes", "core", "large")),
        1
    );
}

#[test]
fn test_instances_own_their_frames() {
    let env = Env::new();
    let mut a = get(&env, &Gene::new("muscle")).unwrap();
    let b = get(&env, &Gene::new("muscle")).unwrap();

    a.joint_values[0] = 1.0;
    a.apply_joint_pose();
    let joint = a.joints[0];
    assert_ne!(a.frames.get(joint).unwrap().local, b.frames.get(joint).unwrap().local);
    let shared = env
        .library
        .peek(&ArchetypeKey::new("CellTypes", "muscle", "default"))
        .unwrap();
    assert_eq!(shared.frames.get(joint).unwrap().local, Mat4::IDENTITY);
}

#[test]
fn test_unknown_archetype_is_reported() {
    let env = Env::new();
    let err = get(&env, &Gene::new("tentacle")).unwrap_err();
    assert!(matches!(err, CoreError::UnknownArchetype(_)));
    assert!(env.library.is_empty());
}

#[test]
fn test_missing_socket_names_both_parts() {
    let env = Env::new();
    let root = Gene::new("core").with_child(Gene::new("fin").with_socket("skt7"));
    let err = Organism::new(Genome::new("bad", root), &env.ctx(), Vec3::ZERO).unwrap_err();
    match err {
        CoreError::MissingSocket {
            parent,
            socket,
            child,
        } => {
            assert!(parent.starts_with("CellTypes:core.default"));
            assert_eq!(socket, "skt7");
            assert!(child.starts_with("CellTypes:fin.default"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(env.library.is_empty(), "failed construction must release parts");
}

#[test]
fn test_occupied_socket_is_rejected() {
    let env = Env::new();
    let root = Gene::new("core")
        .with_child(Gene::new("fin").with_socket("skt0"))
        .with_child(Gene::new("gland").with_socket("skt0"));
    let err = PartTree::build(
        &root,
        &env.library,
        &env.registry,
        &env.config.archetypes,
        env.config.organism.max_parts,
    )
    .unwrap_err();
    assert!(matches!(err, CoreError::SocketOccupied { .. }));
    assert!(env.library.is_empty());
}

#[test]
fn test_part_limit_is_enforced() {
    let mut env = Env::new();
    env.config.organism.max_parts = 2;
    let err = Organism::new(Genome::new("big", swimmer()), &env.ctx(), Vec3::ZERO).unwrap_err();
    assert!(matches!(err, CoreError::InvalidGenome(_)));
}

#[test]
fn test_joint_count_mismatch() {
    let mut source = loader();
    source.insert(
        ArchetypeKey::new("CellTypes", "muscle", "default"),
        ArchetypeSource {
            physiology: "muscle".into(),
            frames: common::skeleton(1, 0, 0),
        },
    );
    let env = Env::with_loader(source);
    let err = get(&env, &Gene::new("muscle")).unwrap_err();
    assert!(matches!(
        err,
        CoreError::JointCountMismatch {
            expected: 1,
            found: 0,
            ..
        }
    ));
}

#[test]
fn test_transform_chain_matches_manual_product() {
    let env = Env::new();
    let spine_plug = Mat4::from_rotation_z(FRAC_PI_2);
    let fin_plug = Mat4::from_translation(Vec3::new(0.0, 0.5, 0.0));
    let root = Gene::new("core").with_child(
        Gene::new("spine")
            .with_socket("skt1")
            .with_orientation(spine_plug)
            .with_child(Gene::new("fin").with_socket("skt0").with_orientation(fin_plug)),
    );
    let mut organism = env.grow(root);
    let core = organism.root().unwrap();
    let spine = organism.tree().child_at_socket(core, 1).unwrap();
    let fin = organism.tree().child_at_socket(spine, 0).unwrap();

    let core_skt1 = Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0));
    let spine_skt0 = Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0));
    let expected_fin = |world: Mat4| world * core_skt1 * spine_plug * spine_skt0 * fin_plug;

    assert_mat4_near!(
        organism.tree()[fin].transform(),
        expected_fin(organism.world_transform()),
        1e-5
    );

    organism.location = Vec3::new(-3.0, 1.0, 4.0);
    organism.orientation = Quat::from_rotation_y(0.7);
    organism.scale = 2.0;
    organism.update_transforms();

    let world = Mat4::from_scale_rotation_translation(
        Vec3::splat(2.0),
        Quat::from_rotation_y(0.7),
        Vec3::new(-3.0, 1.0, 4.0),
    );
    let expected = expected_fin(world);
    assert_mat4_near!(organism.tree()[fin].transform(), expected, 1e-4);
    assert_vec3_near!(
        organism.tree()[fin].location,
        expected.w_axis.truncate(),
        1e-4
    );
    assert_vec3_near!(
        organism.tree()[spine].location,
        (world * core_skt1).w_axis.truncate(),
        1e-4
    );
}

#[test]
fn test_joint_pose_moves_children() {
    let env = Env::new();
    let root = Gene::new("core").with_child(
        Gene::new("muscle")
            .with_socket("skt0")
            .with_child(Gene::new("fin").with_socket("skt0")),
    );
    let mut tree = PartTree::build(
        &root,
        &env.library,
        &env.registry,
        &env.config.archetypes,
        env.config.organism.max_parts,
    )
    .unwrap();
    let core = tree.root().unwrap();
    let muscle = tree.child_at_socket(core, 0).unwrap();
    let fin = tree.child_at_socket(muscle, 0).unwrap();

    // joint values span the limits: 0 is min_angle, 1 is max_angle about +Y
    let swung = |angle: f32| {
        (Mat4::from_translation(Vec3::X)
            * Mat4::from_rotation_y(angle)
            * Mat4::from_translation(Vec3::X))
        .w_axis
        .truncate()
    };
    propagate_frames(&mut tree, Mat4::IDENTITY);
    assert_vec3_near!(tree[fin].location, swung(-1.0), 1e-4);

    tree[muscle].joint_values[0] = 1.0;
    propagate_frames(&mut tree, Mat4::IDENTITY);
    assert_vec3_near!(tree[fin].location, swung(1.0), 1e-4);
    assert_vec3_near!(tree[muscle].location, Vec3::X, 1e-5);
}
