use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Index of a frame inside its owning [`FrameTree`].
pub type FrameId = usize;

/// Classification of a skeleton frame, derived from its name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FrameKind {
    /// Ordinary body geometry.
    #[default]
    General,
    /// Animatable joint (`anim#`).
    Joint,
    /// Structural attachment point (`skt#`).
    Socket,
    /// Sensor/effector point (`hot#`).
    Hotspot,
    /// Channel marker organelle (`chan#`).
    ChannelMarker,
    /// Function marker organelle (`fn#`).
    FunctionMarker,
}

impl FrameKind {
    const PREFIXES: [(&'static str, FrameKind); 5] = [
        ("anim", FrameKind::Joint),
        ("skt", FrameKind::Socket),
        ("hot", FrameKind::Hotspot),
        ("chan", FrameKind::ChannelMarker),
        ("fn", FrameKind::FunctionMarker),
    ];

    /// Classifies a frame name into its kind and index within that kind.
    ///
    /// Names such as `skt2` or `anim0.001` yield `(Socket, 2)` and
    /// `(Joint, 0)`. Anything else is `General` with index 0.
    #[must_use]
    pub fn classify(name: &str) -> (FrameKind, usize) {
        let base = base_name(name);
        for (prefix, kind) in Self::PREFIXES {
            if let Some(digits) = base.strip_prefix(prefix) {
                if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                    if let Ok(index) = digits.parse() {
                        return (kind, index);
                    }
                }
            }
        }
        (FrameKind::General, 0)
    }

    /// Organelle frames are markers, not body geometry, and start hidden.
    #[must_use]
    pub fn is_organelle(self) -> bool {
        !matches!(self, FrameKind::General | FrameKind::Joint)
    }
}

/// Strips the `.NNN` disambiguating suffix the mesh tool appends to
/// duplicate frame names.
#[must_use]
pub fn base_name(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((base, suffix))
            if !base.is_empty()
                && !suffix.is_empty()
                && suffix.bytes().all(|b| b.is_ascii_digit()) =>
        {
            base
        }
        _ => name,
    }
}

/// Rotation range of an animatable joint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointLimits {
    pub axis: Vec3,
    /// Angle in radians at joint value 0.
    pub min_angle: f32,
    /// Angle in radians at joint value 1.
    pub max_angle: f32,
}

impl JointLimits {
    /// Rotation for a joint value in 0..1.
    #[must_use]
    pub fn pose(&self, value: f32) -> Mat4 {
        let t = value.clamp(0.0, 1.0);
        let angle = self.min_angle + (self.max_angle - self.min_angle) * t;
        let axis = self.axis.try_normalize().unwrap_or(Vec3::Z);
        Mat4::from_axis_angle(axis, angle)
    }
}

/// Bounding sphere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Sphere {
    #[must_use]
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Smallest sphere enclosing both `self` and `other`.
    #[must_use]
    pub fn merge(&self, other: &Sphere) -> Sphere {
        let offset = other.center - self.center;
        let dist = offset.length();
        if dist + other.radius <= self.radius {
            return *self;
        }
        if dist + self.radius <= other.radius {
            return *other;
        }
        let radius = (dist + self.radius + other.radius) * 0.5;
        let center = if dist > f32::EPSILON {
            self.center + offset * ((radius - self.radius) / dist)
        } else {
            self.center
        };
        Sphere { center, radius }
    }

    /// The sphere carried through `m`; the radius scales by the largest axis scale.
    #[must_use]
    pub fn transformed(&self, m: &Mat4) -> Sphere {
        let scale = m
            .x_axis
            .truncate()
            .length()
            .max(m.y_axis.truncate().length())
            .max(m.z_axis.truncate().length());
        Sphere {
            center: m.transform_point3(self.center),
            radius: self.radius * scale,
        }
    }

    /// Signed overlap depth with `other` (positive when intersecting).
    #[must_use]
    pub fn penetration(&self, other: &Sphere) -> f32 {
        self.radius + other.radius - self.center.distance(other.center)
    }
}

/// Material colour information used to approximate a part's colour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub diffuse: [f32; 3],
    /// Mean colour of the material's texture, when it has one.
    pub texture_color: Option<[f32; 3]>,
}

/// Mesh data attached to a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MeshInfo {
    /// Bounds in the frame's own space.
    pub bounds: Sphere,
    #[serde(default)]
    pub materials: Vec<Material>,
}

/// One node of a skeleton hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub name: String,
    pub kind: FrameKind,
    /// Index within its kind (the numeric suffix of `skt3`, `anim1`, ...).
    pub index: usize,
    pub rest: Mat4,
    /// Rest transform with any joint pose applied.
    pub local: Mat4,
    /// World transform computed by the last propagation.
    #[serde(skip)]
    pub combined: Mat4,
    pub limits: Option<JointLimits>,
    pub mesh: Option<MeshInfo>,
    pub visible: bool,
    pub parent: Option<FrameId>,
    pub first_child: Option<FrameId>,
    pub sibling: Option<FrameId>,
}

impl Frame {
    /// Creates an unlinked frame, classified by its name.
    #[must_use]
    pub fn new(name: impl Into<String>, rest: Mat4) -> Self {
        let name = name.into();
        let (kind, index) = FrameKind::classify(&name);
        Self {
            name,
            kind,
            index,
            rest,
            local: rest,
            combined: Mat4::IDENTITY,
            limits: None,
            mesh: None,
            visible: true,
            parent: None,
            first_child: None,
            sibling: None,
        }
    }

    #[must_use]
    pub fn with_limits(mut self, limits: JointLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    #[must_use]
    pub fn with_mesh(mut self, mesh: MeshInfo) -> Self {
        self.mesh = Some(mesh);
        self
    }

    /// Frame name without the mesh tool's numeric suffix.
    #[must_use]
    pub fn base_name(&self) -> &str {
        base_name(&self.name)
    }

    /// World-space origin of this frame.
    #[must_use]
    pub fn world_position(&self) -> Vec3 {
        self.combined.w_axis.truncate()
    }
}

/// Arena-backed frame hierarchy. Frame 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameTree {
    frames: Vec<Frame>,
}

impl FrameTree {
    pub const ROOT: FrameId = 0;

    #[must_use]
    pub fn new(mut root: Frame) -> Self {
        root.parent = None;
        root.sibling = None;
        root.first_child = None;
        Self { frames: vec![root] }
    }

    /// Appends `frame` as the last child of `parent`.
    pub fn add_child(&mut self, parent: FrameId, mut frame: Frame) -> FrameId {
        let id = self.frames.len();
        frame.parent = Some(parent);
        frame.first_child = None;
        frame.sibling = None;
        self.frames.push(frame);

        match self.frames[parent].first_child {
            None => self.frames[parent].first_child = Some(id),
            Some(mut cursor) => {
                while let Some(next) = self.frames[cursor].sibling {
                    cursor = next;
                }
                self.frames[cursor].sibling = Some(id);
            }
        }
        id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[must_use]
    pub fn root(&self) -> &Frame {
        &self.frames[Self::ROOT]
    }

    #[must_use]
    pub fn get(&self, id: FrameId) -> Option<&Frame> {
        self.frames.get(id)
    }

    pub fn get_mut(&mut self, id: FrameId) -> Option<&mut Frame> {
        self.frames.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FrameId, &Frame)> {
        self.frames.iter().enumerate()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (FrameId, &mut Frame)> {
        self.frames.iter_mut().enumerate()
    }

    /// Direct children of `id` in sibling order.
    pub fn children(&self, id: FrameId) -> impl Iterator<Item = FrameId> + '_ {
        let mut next = self.frames.get(id).and_then(|f| f.first_child);
        std::iter::from_fn(move || {
            let current = next?;
            next = self.frames[current].sibling;
            Some(current)
        })
    }

    /// Depth-first order: a frame, then each child subtree in sibling order.
    #[must_use]
    pub fn preorder(&self) -> Vec<FrameId> {
        let mut order = Vec::with_capacity(self.frames.len());
        let mut stack = vec![Self::ROOT];
        while let Some(id) = stack.pop() {
            order.push(id);
            let children: Vec<FrameId> = self.children(id).collect();
            stack.extend(children.into_iter().rev());
        }
        order
    }

    /// First frame whose base name equals `name` exactly.
    #[must_use]
    pub fn find_by_base_name(&self, name: &str) -> Option<FrameId> {
        self.frames.iter().position(|f| f.base_name() == name)
    }

    /// Frames of `kind`, ordered by their kind index.
    #[must_use]
    pub fn frames_of_kind(&self, kind: FrameKind) -> Vec<FrameId> {
        let mut ids: Vec<FrameId> = self
            .frames
            .iter()
            .enumerate()
            .filter(|(_, f)| f.kind == kind)
            .map(|(id, _)| id)
            .collect();
        ids.sort_by_key(|&id| self.frames[id].index);
        ids
    }

    /// Rebuilds the hierarchy node by node in depth-first order.
    ///
    /// The copy shares nothing with `self` and its ids are renumbered so
    /// that parents always precede their children.
    #[must_use]
    pub fn clone_hierarchy(&self) -> FrameTree {
        let order = self.preorder();
        let mut remap = vec![None; self.frames.len()];
        for (new_id, &old_id) in order.iter().enumerate() {
            remap[old_id] = Some(new_id);
        }
        let relink = |id: Option<FrameId>| id.and_then(|old| remap[old]);

        let frames = order
            .iter()
            .map(|&old_id| {
                let src = &self.frames[old_id];
                Frame {
                    name: src.name.clone(),
                    kind: src.kind,
                    index: src.index,
                    rest: src.rest,
                    local: src.local,
                    combined: src.combined,
                    limits: src.limits,
                    mesh: src.mesh.clone(),
                    visible: src.visible,
                    parent: relink(src.parent),
                    first_child: relink(src.first_child),
                    sibling: relink(src.sibling),
                }
            })
            .collect();
        FrameTree { frames }
    }

    /// Sets the root's combined transform and carries it down the hierarchy:
    /// each frame's combined transform is its parent's combined transform
    /// applied to its own local transform.
    pub fn propagate(&mut self, root_combined: Mat4) {
        self.frames[Self::ROOT].combined = root_combined;
        let mut stack: Vec<FrameId> = self.children(Self::ROOT).collect();
        while let Some(id) = stack.pop() {
            if let Some(parent) = self.frames[id].parent {
                self.frames[id].combined = self.frames[parent].combined * self.frames[id].local;
            }
            stack.extend(self.children(id));
        }
    }
}
