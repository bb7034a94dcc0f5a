//! Part archetype cache.
//!
//! An archetype is the shared, read-only template of a part type and
//! variant: its skeleton, aggregate bounds and approximate colour, plus the
//! name of the physiology that drives it. Archetypes are loaded on first
//! request through a [`MeshLoader`] and live in an [`ArchetypeLibrary`]
//! for as long as at least one [`ArchetypeHandle`] to them exists.
//!
//! Dropping the last handle evicts the entry, so the lifetime of every
//! template is tied to the parts cloned from it.

use crate::config::ArchetypeConfig;
use crate::error::{CoreError, Result};
use morphogen_data::{FrameTree, Sphere, Vec3};
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Mutex, Weak};

/// Composite cache key: `group:name.variant`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchetypeKey {
    pub group: String,
    pub name: String,
    pub variant: String,
}

impl ArchetypeKey {
    #[must_use]
    pub fn new(
        group: impl Into<String>,
        name: impl Into<String>,
        variant: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            variant: variant.into(),
        }
    }

    /// Parses a gene type string.
    ///
    /// The group (before `:`) and variant (after the last `.`) are optional
    /// and fall back to the configured defaults.
    pub fn parse(type_name: &str, defaults: &ArchetypeConfig) -> Result<Self> {
        let trimmed = type_name.trim();
        let (group, rest) = match trimmed.split_once(':') {
            Some((group, rest)) => (group, rest),
            None => (defaults.default_group.as_str(), trimmed),
        };
        let (name, variant) = match rest.rsplit_once('.') {
            Some((name, variant)) => (name, variant),
            None => (rest, defaults.default_variant.as_str()),
        };
        if group.is_empty() || name.is_empty() || variant.is_empty() || name.contains(':') {
            return Err(CoreError::InvalidTypeName(type_name.to_string()));
        }
        Ok(Self::new(group, name, variant))
    }
}

impl fmt::Display for ArchetypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}.{}", self.group, self.name, self.variant)
    }
}

/// Raw material returned by a mesh loader.
#[derive(Debug, Clone)]
pub struct ArchetypeSource {
    /// Registry name of the physiology that drives this part type.
    pub physiology: String,
    /// Skeleton with meshes attached, in rest pose.
    pub frames: FrameTree,
}

/// External collaborator that turns a key into a skeleton.
pub trait MeshLoader: Send + Sync {
    fn load(&self, key: &ArchetypeKey) -> anyhow::Result<ArchetypeSource>;
}

/// Loader backed by a map, for tests and procedurally defined parts.
#[derive(Debug, Default, Clone)]
pub struct MemoryLoader {
    sources: HashMap<ArchetypeKey, ArchetypeSource>,
}

impl MemoryLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: ArchetypeKey, source: ArchetypeSource) {
        self.sources.insert(key, source);
    }

    #[must_use]
    pub fn with(mut self, key: ArchetypeKey, source: ArchetypeSource) -> Self {
        self.insert(key, source);
        self
    }
}

impl MeshLoader for MemoryLoader {
    fn load(&self, key: &ArchetypeKey) -> anyhow::Result<ArchetypeSource> {
        self.sources
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no mesh registered for {key}"))
    }
}

/// Shared template for one part type and variant.
#[derive(Debug)]
pub struct Archetype {
    pub key: ArchetypeKey,
    pub physiology: String,
    /// Rest-pose skeleton. Instances deep-clone this.
    pub frames: FrameTree,
    /// Sphere enclosing every mesh under the rest pose, in part space.
    pub bounds: Sphere,
    /// Approximate colour for distant rendering and UI swatches.
    pub color: [f32; 3],
}

impl Archetype {
    /// Computes the derived data once from the loader's output.
    #[must_use]
    pub fn build(key: ArchetypeKey, source: ArchetypeSource) -> Self {
        let mut posed = source.frames.clone();
        posed.propagate(morphogen_data::Mat4::IDENTITY);

        let mut bounds: Option<Sphere> = None;
        for (_, frame) in posed.iter() {
            if let Some(mesh) = &frame.mesh {
                let sphere = mesh.bounds.transformed(&frame.combined);
                bounds = Some(match bounds {
                    Some(acc) => acc.merge(&sphere),
                    None => sphere,
                });
            }
        }

        let color = approximate_color(&posed);
        Self {
            key,
            physiology: source.physiology,
            frames: source.frames,
            bounds: bounds.unwrap_or_else(|| Sphere::new(Vec3::ZERO, 0.0)),
            color,
        }
    }
}

/// Mean material colour; texture colours win when most materials are textured.
fn approximate_color(frames: &FrameTree) -> [f32; 3] {
    let mut diffuse = (Vec3::ZERO, 0usize);
    let mut textured = (Vec3::ZERO, 0usize);
    for (_, frame) in frames.iter() {
        let Some(mesh) = &frame.mesh else { continue };
        for material in &mesh.materials {
            match material.texture_color {
                Some(tex) => {
                    textured.0 += Vec3::from_array(tex);
                    textured.1 += 1;
                }
                None => {
                    diffuse.0 += Vec3::from_array(material.diffuse);
                    diffuse.1 += 1;
                }
            }
        }
    }
    let (sum, count) = if textured.1 > diffuse.1 {
        textured
    } else {
        diffuse
    };
    if count == 0 {
        return [0.5, 0.5, 0.5];
    }
    (sum / count as f32).to_array()
}

struct Entry {
    archetype: Arc<Archetype>,
    live: usize,
    next_instance: u32,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<ArchetypeKey, Entry>,
}

impl Inner {
    fn release(&mut self, key: &ArchetypeKey) {
        let evict = match self.entries.get_mut(key) {
            Some(entry) => {
                entry.live = entry.live.saturating_sub(1);
                entry.live == 0
            }
            None => false,
        };
        if evict {
            self.entries.remove(key);
            tracing::debug!(archetype = %key, "Evicted archetype");
        }
    }
}

/// Reference-counted cache of loaded archetypes.
pub struct ArchetypeLibrary {
    inner: Arc<Mutex<Inner>>,
    loader: Box<dyn MeshLoader>,
}

impl ArchetypeLibrary {
    #[must_use]
    pub fn new(loader: Box<dyn MeshLoader>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            loader,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a handle to the archetype for `key`, loading it on a miss.
    ///
    /// Each handle counts as one live instance and carries a fresh instance
    /// number for that archetype.
    pub fn acquire(&self, key: &ArchetypeKey) -> Result<ArchetypeHandle> {
        if let Some(handle) = self.try_reuse(key) {
            return Ok(handle);
        }

        let source = self
            .loader
            .load(key)
            .map_err(|e| CoreError::UnknownArchetype(format!("{key}: {e:#}")))?;
        let archetype = Arc::new(Archetype::build(key.clone(), source));
        tracing::debug!(
            archetype = %key,
            frames = archetype.frames.len(),
            radius = archetype.bounds.radius,
            "Loaded archetype"
        );

        let mut inner = self.lock();
        let entry = inner.entries.entry(key.clone()).or_insert(Entry {
            archetype,
            live: 0,
            next_instance: 0,
        });
        Ok(self.issue(entry))
    }

    fn try_reuse(&self, key: &ArchetypeKey) -> Option<ArchetypeHandle> {
        let mut inner = self.lock();
        let entry = inner.entries.get_mut(key)?;
        Some(self.issue(entry))
    }

    fn issue(&self, entry: &mut Entry) -> ArchetypeHandle {
        entry.live += 1;
        let instance = entry.next_instance;
        entry.next_instance = entry.next_instance.wrapping_add(1);
        ArchetypeHandle {
            archetype: Arc::clone(&entry.archetype),
            instance,
            library: Arc::downgrade(&self.inner),
        }
    }

    /// True while some part still uses `key`.
    #[must_use]
    pub fn contains(&self, key: &ArchetypeKey) -> bool {
        self.lock().entries.contains_key(key)
    }

    /// The cached archetype for `key`, without counting a new instance.
    #[must_use]
    pub fn peek(&self, key: &ArchetypeKey) -> Option<Arc<Archetype>> {
        self.lock()
            .entries
            .get(key)
            .map(|e| Arc::clone(&e.archetype))
    }

    /// Live instance count for `key`.
    #[must_use]
    pub fn live_count(&self, key: &ArchetypeKey) -> usize {
        self.lock().entries.get(key).map_or(0, |e| e.live)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One live use of an archetype. Dropping it releases the instance.
pub struct ArchetypeHandle {
    archetype: Arc<Archetype>,
    instance: u32,
    library: Weak<Mutex<Inner>>,
}

impl ArchetypeHandle {
    /// Instance number, monotonic per archetype.
    #[must_use]
    pub fn instance(&self) -> u32 {
        self.instance
    }

    #[must_use]
    pub fn shared(&self) -> &Arc<Archetype> {
        &self.archetype
    }
}

impl Deref for ArchetypeHandle {
    type Target = Archetype;

    fn deref(&self) -> &Archetype {
        &self.archetype
    }
}

impl fmt::Debug for ArchetypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchetypeHandle")
            .field("key", &self.archetype.key)
            .field("instance", &self.instance)
            .finish()
    }
}

impl Drop for ArchetypeHandle {
    fn drop(&mut self) {
        if let Some(inner) = self.library.upgrade() {
            inner
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .release(&self.archetype.key);
        }
    }
}
