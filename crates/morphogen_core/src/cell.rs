//! Parts and the part tree.
//!
//! A [`Cell`] is one live part: a deep clone of its archetype's skeleton,
//! its channel array, a physiology instance and the links that place it in
//! its organism's [`PartTree`]. Parts are cloned from genes with
//! [`Cell::get`], joined with [`PartTree::attach`] and disposed by removing
//! them from the tree, which releases their archetype.

use crate::archetype::{ArchetypeHandle, ArchetypeKey, ArchetypeLibrary};
use crate::channel::{Channel, GlobalChemistry};
use crate::config::ArchetypeConfig;
use crate::error::{CoreError, Result};
use crate::physiology::{CellContext, Physiology, PhysiologyInit, PhysiologyRegistry, Stimulus};
use crate::wiring;
use morphogen_data::{
    base_name, ChannelRole, ChannelSpec, FrameId, FrameKind, FrameTree, Gene, Mat4, SocketRef,
    Sphere, Vec3,
};
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Stable handle to a part inside its organism.
    pub struct PartId;
}

/// One live part.
pub struct Cell {
    archetype: ArchetypeHandle,
    physiology: Box<dyn Physiology>,
    /// Type string exactly as the gene gave it.
    pub type_name: String,
    pub variant: usize,
    /// Private copy of the archetype skeleton.
    pub frames: FrameTree,
    /// Frame ids of `anim#`, `skt#` and `hot#` frames, by index.
    pub joints: Vec<FrameId>,
    pub sockets: Vec<FrameId>,
    pub hotspots: Vec<FrameId>,
    /// Frames with meshes that take part in collision tests.
    pub collision_frames: Vec<FrameId>,
    pub joint_values: Vec<f32>,
    pub specs: Vec<ChannelSpec>,
    pub channels: Vec<Channel>,
    /// Orientation of this part within its parent's socket.
    pub plug: Mat4,
    pub location: Vec3,
    pub prev_location: Vec3,
    pub world_bounds: Sphere,
    pub parent: Option<PartId>,
    /// Socket frame on the parent this part is plugged into.
    pub parent_socket: Option<FrameId>,
    pub first_child: Option<PartId>,
    pub sibling: Option<PartId>,
}

impl Cell {
    /// Clones a new unattached part from a gene.
    ///
    /// Fails if the archetype or physiology is unknown, the variant is not
    /// offered, numbered frames are not contiguous, or the physiology's
    /// joint or channel counts disagree with the mesh or gene.
    pub fn get(
        gene: &Gene,
        library: &ArchetypeLibrary,
        registry: &PhysiologyRegistry,
        defaults: &ArchetypeConfig,
    ) -> Result<Cell> {
        let key = ArchetypeKey::parse(&gene.type_name, defaults)?;
        let archetype = library.acquire(&key)?;
        let part = format!("{key}#{}", archetype.instance());

        let mut frames = archetype.frames.clone_hierarchy();
        let joints = numbered_frames(&frames, FrameKind::Joint, &part)?;
        let sockets = numbered_frames(&frames, FrameKind::Socket, &part)?;
        let hotspots = numbered_frames(&frames, FrameKind::Hotspot, &part)?;

        let init = PhysiologyInit {
            joints: joints.len(),
            sockets: sockets.len(),
            hotspots: hotspots.len(),
        };
        let mut physiology =
            registry
                .create(&archetype.physiology, &init)
                .ok_or_else(|| CoreError::UnknownPhysiology {
                    archetype: key.to_string(),
                    physiology: archetype.physiology.clone(),
                })?;

        if let Some(expected) = physiology.joint_count() {
            if expected != joints.len() {
                return Err(CoreError::JointCountMismatch {
                    part,
                    expected,
                    found: joints.len(),
                });
            }
        }

        let variant = physiology
            .variants()
            .iter()
            .position(|v| v.eq_ignore_ascii_case(&key.variant))
            .ok_or_else(|| CoreError::UnknownVariant {
                part: part.clone(),
                variant: key.variant.clone(),
            })?;

        let specs = physiology.channels();
        if !gene.channels.is_empty() && gene.channels.len() != specs.len() {
            return Err(CoreError::ChannelCountMismatch {
                part,
                expected: specs.len(),
                found: gene.channels.len(),
            });
        }
        let saved_channels = !gene.channels.is_empty();
        let mut channels: Vec<Channel> = specs
            .iter()
            .map(|s| Channel::new(if saved_channels { 0 } else { s.chemical }, s.constant))
            .collect();
        for (index, saved) in gene.channels.iter().enumerate() {
            channels[index].constant = saved.constant;
            if wiring::accepts_chemical(&specs, &channels, index, saved.chemical) {
                channels[index].chemical = saved.chemical;
            } else {
                tracing::warn!(
                    part = %part,
                    channel = index,
                    chemical = saved.chemical,
                    "Gene chemical rejected, channel left unconnected"
                );
                channels[index].chemical = 0;
            }
        }

        let mut collision_frames = Vec::new();
        for (id, frame) in frames.iter_mut() {
            if frame.kind.is_organelle() {
                frame.visible = false;
            } else if frame.mesh.is_some() {
                collision_frames.push(id);
            }
        }

        let mut joint_values = vec![0.0; joints.len()];
        let mut scratch = GlobalChemistry::default();
        let mut ctx = CellContext {
            channels: &mut channels,
            joints: &mut joint_values,
            globals: &mut scratch,
            frames: &frames,
            hotspots: &hotspots,
            variant,
            dt: 0.0,
            tick: 0,
        };
        physiology
            .init(&mut ctx)
            .map_err(|source| CoreError::PartUpdate {
                part: part.clone(),
                source,
            })?;

        let world_bounds = archetype.bounds;
        tracing::trace!(part = %part, channels = specs.len(), "Cloned part");
        Ok(Cell {
            archetype,
            physiology,
            type_name: gene.type_name.clone(),
            variant,
            frames,
            joints,
            sockets,
            hotspots,
            collision_frames,
            joint_values,
            specs,
            channels,
            plug: gene.orientation,
            location: Vec3::ZERO,
            prev_location: Vec3::ZERO,
            world_bounds,
            parent: None,
            parent_socket: None,
            first_child: None,
            sibling: None,
        })
    }

    /// `group:name.variant#instance`, unique among live parts.
    #[must_use]
    pub fn name(&self) -> String {
        format!("{}#{}", self.archetype.key, self.archetype.instance())
    }

    #[must_use]
    pub fn archetype(&self) -> &ArchetypeHandle {
        &self.archetype
    }

    #[must_use]
    pub fn physiology(&self) -> &dyn Physiology {
        self.physiology.as_ref()
    }

    /// Bounds in part space, shared with the archetype.
    #[must_use]
    pub fn bounds(&self) -> Sphere {
        self.archetype.bounds
    }

    /// Applies the current joint values to the joint frames' local transforms.
    pub fn apply_joint_pose(&mut self) {
        for (slot, &id) in self.joints.iter().enumerate() {
            let value = self.joint_values.get(slot).copied().unwrap_or(0.0);
            if let Some(frame) = self.frames.get_mut(id) {
                frame.local = match &frame.limits {
                    Some(limits) => frame.rest * limits.pose(value),
                    None => frame.rest,
                };
            }
        }
    }

    /// Runs `f` against this part's physiology with a context over its state.
    pub fn run<F>(
        &mut self,
        globals: &mut GlobalChemistry,
        dt: f32,
        tick: u64,
        f: F,
    ) -> anyhow::Result<()>
    where
        F: FnOnce(&mut dyn Physiology, &mut CellContext<'_>) -> anyhow::Result<()>,
    {
        let mut ctx = CellContext {
            channels: &mut self.channels,
            joints: &mut self.joint_values,
            globals,
            frames: &self.frames,
            hotspots: &self.hotspots,
            variant: self.variant,
            dt,
            tick,
        };
        f(self.physiology.as_mut(), &mut ctx)
    }

    pub fn stimulate(&mut self, stimulus: &Stimulus) {
        self.physiology.on_stimulus(stimulus);
    }

    /// World transform of the part's root frame.
    #[must_use]
    pub fn transform(&self) -> Mat4 {
        self.frames.root().combined
    }

    /// Declared role of channel slot `index`.
    #[must_use]
    pub fn channel_role(&self, index: usize) -> Option<ChannelRole> {
        self.specs.get(index).map(|s| s.role)
    }

    /// Persisted form of this part alone, without socket or children.
    #[must_use]
    pub fn to_gene(&self) -> Gene {
        Gene {
            type_name: self.type_name.clone(),
            socket: None,
            orientation: self.plug,
            channels: self.channels.iter().map(Channel::to_gene).collect(),
            children: Vec::new(),
        }
    }
}

impl std::fmt::Debug for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cell")
            .field("name", &self.name())
            .field("channels", &self.channels.len())
            .field("parent", &self.parent)
            .finish()
    }
}

/// Frame ids of one kind ordered by index, rejecting gaps.
fn numbered_frames(frames: &FrameTree, kind: FrameKind, part: &str) -> Result<Vec<FrameId>> {
    let ids = frames.frames_of_kind(kind);
    for (expected, &id) in ids.iter().enumerate() {
        let index = frames.get(id).map_or(usize::MAX, |f| f.index);
        if index != expected {
            return Err(CoreError::FrameIndexGap {
                part: part.to_string(),
                kind: format!("{kind:?}"),
                missing: expected,
            });
        }
    }
    Ok(ids)
}

/// Arena of parts linked as a first-child / next-sibling tree.
#[derive(Debug, Default)]
pub struct PartTree {
    parts: SlotMap<PartId, Cell>,
    root: Option<PartId>,
}

impl PartTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clones and attaches every part described by `root` and its descendants.
    pub fn build(
        root: &Gene,
        library: &ArchetypeLibrary,
        registry: &PhysiologyRegistry,
        defaults: &ArchetypeConfig,
        max_parts: usize,
    ) -> Result<Self> {
        let count = root.count();
        if count > max_parts {
            return Err(CoreError::InvalidGenome(format!(
                "{count} parts exceeds the limit of {max_parts}"
            )));
        }

        let mut tree = Self::new();
        let root_id = tree.insert_root(Cell::get(root, library, registry, defaults)?)?;
        for child in &root.children {
            tree.graft(root_id, child, library, registry, defaults)?;
        }
        Ok(tree)
    }

    /// Clones `gene` and its descendants and attaches them under `parent`
    /// at the socket the gene names.
    ///
    /// Either the whole subtree is attached or, on error, nothing is.
    pub fn graft(
        &mut self,
        parent: PartId,
        gene: &Gene,
        library: &ArchetypeLibrary,
        registry: &PhysiologyRegistry,
        defaults: &ArchetypeConfig,
    ) -> Result<PartId> {
        let top = self.attach_gene(parent, gene, library, registry, defaults)?;
        let mut stack: Vec<(&Gene, PartId)> = gene.children.iter().rev().map(|g| (g, top)).collect();
        while let Some((child, parent)) = stack.pop() {
            match self.attach_gene(parent, child, library, registry, defaults) {
                Ok(id) => stack.extend(child.children.iter().rev().map(|g| (g, id))),
                Err(e) => {
                    self.remove_subtree(top)?;
                    return Err(e);
                }
            }
        }
        Ok(top)
    }

    fn attach_gene(
        &mut self,
        parent: PartId,
        gene: &Gene,
        library: &ArchetypeLibrary,
        registry: &PhysiologyRegistry,
        defaults: &ArchetypeConfig,
    ) -> Result<PartId> {
        let socket = gene
            .socket
            .as_deref()
            .ok_or_else(|| CoreError::InvalidGenome(format!("{} has no socket", gene.type_name)))?;
        let cell = Cell::get(gene, library, registry, defaults)?;
        self.attach(parent, socket, cell)
    }

    pub fn insert_root(&mut self, cell: Cell) -> Result<PartId> {
        if self.root.is_some() {
            return Err(CoreError::invalid_state("part tree already has a root"));
        }
        let id = self.parts.insert(cell);
        self.root = Some(id);
        Ok(id)
    }

    /// Plugs `cell` into the socket named `socket` on `parent`.
    ///
    /// Socket names are matched on their base name, so `skt1` also finds a
    /// frame exported as `skt1.001`. The child becomes the parent's last child.
    pub fn attach(&mut self, parent: PartId, socket: &str, mut cell: Cell) -> Result<PartId> {
        let parent_cell = self
            .parts
            .get(parent)
            .ok_or_else(|| CoreError::unknown_part(format!("{parent:?}")))?;
        let wanted = base_name(socket);
        let socket_frame = parent_cell
            .sockets
            .iter()
            .copied()
            .find(|&id| parent_cell.frames.get(id).is_some_and(|f| f.base_name() == wanted))
            .ok_or_else(|| CoreError::MissingSocket {
                parent: parent_cell.name(),
                socket: socket.to_string(),
                child: cell.name(),
            })?;
        if self
            .children(parent)
            .any(|c| self.parts[c].parent_socket == Some(socket_frame))
        {
            return Err(CoreError::SocketOccupied {
                parent: parent_cell.name(),
                socket: socket.to_string(),
            });
        }

        let last = self.children(parent).last();
        cell.parent = Some(parent);
        cell.parent_socket = Some(socket_frame);
        cell.sibling = None;
        let id = self.parts.insert(cell);
        match last {
            Some(prev) => self.parts[prev].sibling = Some(id),
            None => self.parts[parent].first_child = Some(id),
        }
        Ok(id)
    }

    #[must_use]
    pub fn root(&self) -> Option<PartId> {
        self.root
    }

    #[must_use]
    pub fn get(&self, id: PartId) -> Option<&Cell> {
        self.parts.get(id)
    }

    pub fn get_mut(&mut self, id: PartId) -> Option<&mut Cell> {
        self.parts.get_mut(id)
    }

    #[must_use]
    pub fn contains(&self, id: PartId) -> bool {
        self.parts.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PartId, &Cell)> {
        self.parts.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (PartId, &mut Cell)> {
        self.parts.iter_mut()
    }

    /// Direct children of `id`, in attachment order.
    pub fn children(&self, id: PartId) -> impl Iterator<Item = PartId> + '_ {
        let mut next = self.parts.get(id).and_then(|c| c.first_child);
        std::iter::from_fn(move || {
            let current = next?;
            next = self.parts.get(current).and_then(|c| c.sibling);
            Some(current)
        })
    }

    /// Every part in tree-walk order: a part, then its later siblings'
    /// subtrees, then its own children.
    #[must_use]
    pub fn walk(&self) -> Vec<PartId> {
        let mut order = Vec::with_capacity(self.parts.len());
        let mut stack: Vec<PartId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            let Some(cell) = self.parts.get(id) else {
                continue;
            };
            order.push(id);
            stack.extend(cell.first_child);
            stack.extend(cell.sibling);
        }
        order
    }

    /// Socket index on the parent that `id` is plugged into.
    #[must_use]
    pub fn socket_index(&self, id: PartId) -> Option<u8> {
        let cell = self.parts.get(id)?;
        let parent = self.parts.get(cell.parent?)?;
        let frame = parent.frames.get(cell.parent_socket?)?;
        u8::try_from(frame.index).ok()
    }

    /// Child occupying socket `index` of `parent`.
    #[must_use]
    pub fn child_at_socket(&self, parent: PartId, index: u8) -> Option<PartId> {
        self.children(parent)
            .find(|&c| self.socket_index(c) == Some(index))
    }

    /// The part on the far side of `end`, and the end it is reached through.
    #[must_use]
    pub fn neighbor(&self, id: PartId, end: SocketRef) -> Option<(PartId, SocketRef)> {
        match end {
            SocketRef::Function => None,
            SocketRef::Plug => {
                let parent = self.parts.get(id)?.parent?;
                Some((parent, SocketRef::Socket(self.socket_index(id)?)))
            }
            SocketRef::Socket(n) => Some((self.child_at_socket(id, n)?, SocketRef::Plug)),
        }
    }

    /// Detaches `id` and disposes of it and all its descendants.
    ///
    /// Returns the number of parts removed.
    pub fn remove_subtree(&mut self, id: PartId) -> Result<usize> {
        let cell = self
            .parts
            .get(id)
            .ok_or_else(|| CoreError::unknown_part(format!("{id:?}")))?;
        let (parent, sibling) = (cell.parent, cell.sibling);

        match parent {
            Some(parent) => {
                let prev = self.children(parent).take_while(|&c| c != id).last();
                match prev {
                    Some(prev) => self.parts[prev].sibling = sibling,
                    None => self.parts[parent].first_child = sibling,
                }
            }
            None => self.root = None,
        }

        let mut doomed = vec![id];
        let mut removed = 0;
        while let Some(next) = doomed.pop() {
            doomed.extend(self.children(next));
            if let Some(cell) = self.parts.remove(next) {
                tracing::trace!(part = %cell.name(), "Disposed part");
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Disposes of every part.
    pub fn clear(&mut self) {
        self.parts.clear();
        self.root = None;
    }

    /// Reconstructs the gene subtree rooted at `id` from the live parts.
    #[must_use]
    pub fn to_gene(&self, id: PartId) -> Option<Gene> {
        let cell = self.parts.get(id)?;
        let mut gene = cell.to_gene();
        if let (Some(parent), Some(socket)) = (cell.parent, cell.parent_socket) {
            gene.socket = self
                .parts
                .get(parent)
                .and_then(|p| p.frames.get(socket))
                .map(|f| f.base_name().to_string());
        }
        gene.children = self.children(id).filter_map(|c| self.to_gene(c)).collect();
        Some(gene)
    }
}

impl std::ops::Index<PartId> for PartTree {
    type Output = Cell;

    fn index(&self, id: PartId) -> &Cell {
        &self.parts[id]
    }
}

impl std::ops::IndexMut<PartId> for PartTree {
    fn index_mut(&mut self, id: PartId) -> &mut Cell {
        &mut self.parts[id]
    }
}
