use super::chemistry::NUM_CHEMICALS;
use glam::Mat4;
use serde::{Deserialize, Serialize};

/// Per-channel override carried by a gene.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct ChannelGene {
    /// Chemical selectivity (0 = unconnected).
    pub chemical: u8,
    /// Constant used while unconnected.
    pub constant: f32,
}

impl ChannelGene {
    #[must_use]
    pub fn new(chemical: u8, constant: f32) -> Self {
        Self { chemical, constant }
    }
}

/// One node of the declarative creature description.
///
/// Children are held in order: the first entry is the first child and the
/// remaining entries are its siblings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Gene {
    /// Archetype key in `group:name.variant` form (group and variant optional).
    pub type_name: String,
    /// Socket on the parent this part plugs into. `None` only for the root.
    pub socket: Option<String>,
    /// Plug orientation within the socket.
    pub orientation: Mat4,
    /// Channel overrides, position-for-position. Empty means "use defaults".
    pub channels: Vec<ChannelGene>,
    pub children: Vec<Gene>,
}

impl Gene {
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            socket: None,
            orientation: Mat4::IDENTITY,
            channels: Vec::new(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_socket(mut self, socket: impl Into<String>) -> Self {
        self.socket = Some(socket.into());
        self
    }

    #[must_use]
    pub fn with_orientation(mut self, orientation: Mat4) -> Self {
        self.orientation = orientation;
        self
    }

    #[must_use]
    pub fn with_channel(mut self, chemical: u8, constant: f32) -> Self {
        self.channels.push(ChannelGene::new(chemical, constant));
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: Gene) -> Self {
        self.children.push(child);
        self
    }

    #[must_use]
    pub fn first_child(&self) -> Option<&Gene> {
        self.children.first()
    }

    /// Number of genes in this subtree, including `self`.
    #[must_use]
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Gene::count).sum::<usize>()
    }

    /// Depth-first walk: a gene, then each child subtree in order.
    pub fn walk(&self) -> impl Iterator<Item = &Gene> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let gene = stack.pop()?;
            stack.extend(gene.children.iter().rev());
            Some(gene)
        })
    }

    /// Structural equality with orientation compared to `epsilon`.
    #[must_use]
    pub fn approx_eq(&self, other: &Gene, epsilon: f32) -> bool {
        self.type_name == other.type_name
            && self.socket == other.socket
            && self.orientation.abs_diff_eq(other.orientation, epsilon)
            && self.channels.len() == other.channels.len()
            && self
                .channels
                .iter()
                .zip(&other.channels)
                .all(|(a, b)| a.chemical == b.chemical && (a.constant - b.constant).abs() <= epsilon)
            && self.children.len() == other.children.len()
            && self
                .children
                .iter()
                .zip(&other.children)
                .all(|(a, b)| a.approx_eq(b, epsilon))
    }
}

/// A named creature description with exactly one root gene.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Genome {
    pub name: String,
    pub root: Gene,
}

impl Genome {
    #[must_use]
    pub fn new(name: impl Into<String>, root: Gene) -> Self {
        Self {
            name: name.into(),
            root,
        }
    }

    #[must_use]
    pub fn gene_count(&self) -> usize {
        self.root.count()
    }

    /// Checks the structural invariants of the gene tree.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.name.trim().is_empty(), "Genome name must not be empty");
        let mut stack: Vec<(&Gene, bool)> = vec![(&self.root, true)];
        while let Some((gene, is_root)) = stack.pop() {
            anyhow::ensure!(
                !gene.type_name.trim().is_empty(),
                "Gene type must not be empty"
            );
            if !is_root {
                anyhow::ensure!(
                    gene.socket.as_deref().is_some_and(|s| !s.trim().is_empty()),
                    "Gene {} has no socket but is not the root",
                    gene.type_name
                );
            }
            for channel in &gene.channels {
                anyhow::ensure!(
                    channel.chemical <= NUM_CHEMICALS,
                    "Gene {} selects chemical {} (max {})",
                    gene.type_name,
                    channel.chemical,
                    NUM_CHEMICALS
                );
            }
            stack.extend(gene.children.iter().map(|c| (c, false)));
        }
        Ok(())
    }

    /// Compact JSON form.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
