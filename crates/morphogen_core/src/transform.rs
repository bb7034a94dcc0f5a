//! Frame propagation across the part tree.
//!
//! Transforms compose with column vectors: a child part's root frame is
//! placed at `parent_socket * plug * rest`, i.e. its rest transform is
//! applied first, then its plug orientation, then the parent's socket.

use crate::cell::PartTree;
use morphogen_data::{Mat4, Quat, Sphere, Vec3};

/// World transform of an organism's root from its placement.
#[must_use]
pub fn root_transform(location: Vec3, orientation: Quat, scale: f32) -> Mat4 {
    Mat4::from_scale_rotation_translation(Vec3::splat(scale), orientation, location)
}

/// Recomputes every frame's combined transform, every part's location and
/// world bounds. Returns the sphere enclosing all parts.
///
/// Parents are always visited before their children, so each child reads
/// an up-to-date socket transform.
pub fn propagate_frames(tree: &mut PartTree, world: Mat4) -> Option<Sphere> {
    let root = tree.root()?;
    let mut bounds: Option<Sphere> = None;

    for id in tree.walk() {
        let base = if id == root {
            world
        } else {
            let cell = &tree[id];
            let socket = cell
                .parent
                .zip(cell.parent_socket)
                .and_then(|(parent, socket)| tree.get(parent)?.frames.get(socket))
                .map_or(world, |frame| frame.combined);
            socket * cell.plug * cell.frames.root().rest
        };

        let cell = &mut tree[id];
        cell.apply_joint_pose();
        cell.frames.propagate(base);
        cell.location = base.w_axis.truncate();
        cell.world_bounds = cell.bounds().transformed(&base);

        bounds = Some(match bounds {
            Some(acc) => acc.merge(&cell.world_bounds),
            None => cell.world_bounds,
        });
    }
    bounds
}
