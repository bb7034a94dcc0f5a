//! JSON archetype manifests.
//!
//! Each part type lives at `<root>/<group>/<name>.json`:
//!
//! ```json
//! {
//!   "physiology": "muscle",
//!   "variants": {
//!     "default": {
//!       "frames": [
//!         { "name": "body", "mesh": { "bounds": { "center": [0, 0, 0], "radius": 0.5 },
//!                                     "materials": [{ "diffuse": [0.8, 0.2, 0.2] }] } },
//!         { "name": "anim0", "parent": 0,
//!           "limits": { "axis": [0, 1, 0], "min_angle": -0.5, "max_angle": 0.5 } },
//!         { "name": "skt0", "parent": 1,
//!           "transform": [1,0,0,0, 0,1,0,0, 0,0,1,0, 1,0,0,1] }
//!       ]
//!     }
//!   }
//! }
//! ```
//!
//! Frames are listed parents-first; `parent` indexes an earlier entry and
//! is omitted only for the first frame. Transforms use the same row-major
//! layout as genome orientations. A top-level `frames` list serves every
//! variant without its own entry.

use crate::error::{IoError, Result};
use crate::serialization::read_json_file;
use morphogen_core::archetype::{ArchetypeKey, ArchetypeSource, MeshLoader};
use morphogen_data::{Frame, FrameTree, JointLimits, Mat4, MeshInfo};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameManifest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<[f32; 16]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<JointLimits>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<MeshInfo>,
}

impl FrameManifest {
    #[must_use]
    pub fn new(name: impl Into<String>, parent: Option<usize>) -> Self {
        Self {
            name: name.into(),
            parent,
            transform: None,
            limits: None,
            mesh: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariantManifest {
    pub frames: Vec<FrameManifest>,
}

/// One part type with all of its variants.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeManifest {
    pub physiology: String,
    #[serde(default)]
    pub frames: Vec<FrameManifest>,
    #[serde(default)]
    pub variants: BTreeMap<String, VariantManifest>,
}

impl ArchetypeManifest {
    /// Frames for `variant`, matched case-insensitively, else the shared list.
    #[must_use]
    pub fn frames_for(&self, variant: &str) -> Option<&[FrameManifest]> {
        self.variants
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(variant))
            .map(|(_, v)| v.frames.as_slice())
            .or_else(|| (!self.frames.is_empty()).then_some(self.frames.as_slice()))
    }

    /// Builds the rest-pose skeleton for `variant`.
    pub fn skeleton(&self, variant: &str) -> Result<FrameTree> {
        let frames = self
            .frames_for(variant)
            .ok_or_else(|| IoError::not_found(format!("variant '{variant}'")))?;
        let (first, rest) = frames
            .split_first()
            .ok_or_else(|| IoError::validation(format!("variant '{variant}' has no frames")))?;
        if first.parent.is_some() {
            return Err(IoError::validation("the first frame must be the root"));
        }

        let mut tree = FrameTree::new(to_frame(first));
        // manifest index -> tree id
        let mut ids = vec![FrameTree::ROOT];
        for (offset, manifest) in rest.iter().enumerate() {
            let index = offset + 1;
            let parent = manifest
                .parent
                .filter(|&p| p < index)
                .ok_or_else(|| {
                    IoError::validation(format!(
                        "frame '{}' must name an earlier frame as parent",
                        manifest.name
                    ))
                })?;
            ids.push(tree.add_child(ids[parent], to_frame(manifest)));
        }
        Ok(tree)
    }
}

fn to_frame(manifest: &FrameManifest) -> Frame {
    let rest = manifest
        .transform
        .map_or(Mat4::IDENTITY, |m| Mat4::from_cols_array(&m));
    let mut frame = Frame::new(manifest.name.clone(), rest);
    frame.limits = manifest.limits;
    frame.mesh = manifest.mesh.clone();
    frame
}

/// [`MeshLoader`] reading [`ArchetypeManifest`] files from an asset directory.
#[derive(Debug, Clone)]
pub struct ManifestLoader {
    root: PathBuf,
}

impl ManifestLoader {
    #[must_use]
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    #[must_use]
    pub fn path_for(&self, key: &ArchetypeKey) -> PathBuf {
        self.root.join(&key.group).join(format!("{}.json", key.name))
    }

    pub fn manifest(&self, key: &ArchetypeKey) -> Result<ArchetypeManifest> {
        let path = self.path_for(key);
        if !path.is_file() {
            return Err(IoError::not_found(format!("archetype manifest {:?}", path)));
        }
        read_json_file(&path)
    }
}

impl MeshLoader for ManifestLoader {
    fn load(&self, key: &ArchetypeKey) -> anyhow::Result<ArchetypeSource> {
        let manifest = self.manifest(key)?;
        let frames = manifest
            .skeleton(&key.variant)
            .map_err(|e| e.with_context(format!("loading {key}")))?;
        tracing::debug!(archetype = %key, frames = frames.len(), "Loaded manifest");
        Ok(ArchetypeSource {
            physiology: manifest.physiology,
            frames,
        })
    }
}
