//! Channel wiring.
//!
//! Wiring links every consumer channel to the channel that feeds it. Each
//! output with a local chemical starts a walk: the signal leaves through
//! the output's destination end, crosses into the neighbouring part, and is
//! picked up there by every channel of the same chemical whose entry end
//! faces the arrival point. Inputs end the walk; bypasses continue it out of
//! their other end. A bypass entered through its declared destination is
//! marked `flipped` and carries the signal backwards.
//!
//! Links are recorded in discovery order, which is always upstream before
//! downstream, so one pass of [`propagate`] settles a whole chain in a
//! single tick.

use crate::cell::{Cell, PartId, PartTree};
use crate::channel::{Channel, ChannelRef, GlobalChemistry};
use crate::error::{CoreError, Result};
use morphogen_data::{
    is_global_chemical, is_local_chemical, ChannelRole, ChannelSpec, SocketRef, NUM_CHEMICALS,
    UNCONNECTED,
};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// One resolved source-to-consumer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub from: ChannelRef,
    pub to: ChannelRef,
    pub chemical: u8,
    /// The consumer is a bypass entered through its destination end.
    pub flipped: bool,
}

/// Outcome of a full wiring pass, and the propagation plan for later ticks.
#[derive(Debug, Clone, Default)]
pub struct WiringReport {
    /// Connections in propagation order.
    pub links: Vec<Link>,
    /// Outputs whose signal reached no consumer.
    pub dangling: Vec<ChannelRef>,
}

impl WiringReport {
    #[must_use]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Upstream channel of `channel`, if it was wired.
    #[must_use]
    pub fn source_of(&self, channel: ChannelRef) -> Option<ChannelRef> {
        self.links.iter().find(|l| l.to == channel).map(|l| l.from)
    }

    /// Signal-flow graph with one node per linked channel and edges
    /// weighted by chemical.
    #[must_use]
    pub fn graph(&self) -> DiGraph<ChannelRef, u8> {
        let mut graph = DiGraph::new();
        let mut nodes: HashMap<ChannelRef, NodeIndex> = HashMap::new();
        for link in &self.links {
            let from = *nodes
                .entry(link.from)
                .or_insert_with(|| graph.add_node(link.from));
            let to = *nodes
                .entry(link.to)
                .or_insert_with(|| graph.add_node(link.to));
            graph.add_edge(from, to, link.chemical);
        }
        graph
    }

    /// True when no signal can feed back into itself.
    #[must_use]
    pub fn is_acyclic(&self) -> bool {
        !petgraph::algo::is_cyclic_directed(&self.graph())
    }
}

/// Drops every signal, source and flip flag in the tree.
pub fn clear_all_channels(tree: &mut PartTree) {
    for (_, cell) in tree.iter_mut() {
        for channel in &mut cell.channels {
            channel.clear();
        }
    }
}

/// Clears and re-resolves all wiring in the tree.
///
/// Fails with [`CoreError::AmbiguousWiring`] when two different upstream
/// channels reach the same consumer.
pub fn wire_up_all_channels(tree: &mut PartTree) -> Result<WiringReport> {
    clear_all_channels(tree);
    let mut report = WiringReport::default();

    for part in tree.walk() {
        let outputs: Vec<usize> = {
            let cell = &tree[part];
            cell.specs
                .iter()
                .zip(&cell.channels)
                .enumerate()
                .filter(|(_, (spec, channel))| {
                    spec.role == ChannelRole::Output && is_local_chemical(channel.chemical)
                })
                .map(|(index, _)| index)
                .collect()
        };
        for index in outputs {
            let origin = ChannelRef::new(part, index);
            if trace(tree, origin, &mut report)? == 0 {
                report.dangling.push(origin);
            }
        }
    }

    tracing::debug!(
        links = report.links.len(),
        dangling = report.dangling.len(),
        "Wired channels"
    );
    Ok(report)
}

/// Follows one output's signal through the tree, linking every consumer.
/// Returns the number of channels linked.
fn trace(tree: &mut PartTree, origin: ChannelRef, report: &mut WiringReport) -> Result<usize> {
    let mut stack = vec![origin];
    let mut linked = 0;

    while let Some(current) = stack.pop() {
        let (chemical, facing) = {
            let cell = &tree[current.part];
            let spec = cell.specs[current.index];
            let channel = &cell.channels[current.index];
            let facing = if channel.flipped {
                spec.source
            } else {
                spec.dest
            };
            (channel.chemical, facing)
        };
        let Some((neighbor, arrival)) = tree.neighbor(current.part, facing) else {
            continue;
        };

        let consumers: Vec<(usize, bool)> = tree[neighbor]
            .specs
            .iter()
            .zip(&tree[neighbor].channels)
            .enumerate()
            .filter(|(_, (_, channel))| channel.chemical == chemical)
            .filter_map(|(index, (spec, _))| entry_direction(spec, arrival).map(|f| (index, f)))
            .collect();

        for (index, flipped) in consumers {
            let target = ChannelRef::new(neighbor, index);
            let cell = &mut tree[neighbor];
            match cell.channels[index].source {
                Some(existing) if existing == current => continue,
                Some(_) => {
                    return Err(CoreError::AmbiguousWiring {
                        part: cell.name(),
                        channel: index,
                        chemical,
                    });
                }
                None => {}
            }
            cell.channels[index].source = Some(current);
            cell.channels[index].flipped = flipped;
            report.links.push(Link {
                from: current,
                to: target,
                chemical,
                flipped,
            });
            linked += 1;
            if cell.specs[index].role == ChannelRole::Bypass {
                stack.push(target);
            }
        }
    }
    Ok(linked)
}

/// Whether a channel picks up a signal arriving at `arrival`, and if so
/// whether it is entered backwards.
fn entry_direction(spec: &ChannelSpec, arrival: SocketRef) -> Option<bool> {
    if spec.source == arrival && spec.role != ChannelRole::Output {
        Some(false)
    } else if spec.role == ChannelRole::Bypass && spec.dest == arrival {
        Some(true)
    } else {
        None
    }
}

/// Copies each wired signal from its source, then refreshes channels that
/// read global chemicals from the organism's pool.
///
/// Links whose parts no longer exist are skipped.
pub fn propagate(tree: &mut PartTree, report: &WiringReport, globals: &GlobalChemistry) {
    for link in &report.links {
        let Some(value) = signal_at(tree, link.from) else {
            continue;
        };
        if let Some(channel) = channel_mut(tree, link.to) {
            channel.signal = value;
        }
    }

    for (_, cell) in tree.iter_mut() {
        for (spec, channel) in cell.specs.iter().zip(cell.channels.iter_mut()) {
            if spec.role != ChannelRole::Output && is_global_chemical(channel.chemical) {
                channel.signal = globals.get(channel.chemical);
            }
        }
    }
}

fn signal_at(tree: &PartTree, at: ChannelRef) -> Option<f32> {
    tree.get(at.part)?.channels.get(at.index).map(|c| c.signal)
}

fn channel_mut(tree: &mut PartTree, at: ChannelRef) -> Option<&mut Channel> {
    tree.get_mut(at.part)?.channels.get_mut(at.index)
}

/// Whether channel `index` of `cell` may select `chemical`.
///
/// 0 is always allowed. Inputs accept any chemical. Outputs may not emit a
/// global chemical or share a chemical with another output or bypass
/// leaving through the same socket. A bypass may not share a chemical with
/// another output or bypass joining the same two ends.
#[must_use]
pub fn is_valid_chemical(cell: &Cell, index: usize, chemical: u8) -> bool {
    accepts_chemical(&cell.specs, &cell.channels, index, chemical)
}

pub(crate) fn accepts_chemical(
    specs: &[ChannelSpec],
    channels: &[Channel],
    index: usize,
    chemical: u8,
) -> bool {
    let Some(spec) = specs.get(index) else {
        return false;
    };
    if chemical == UNCONNECTED {
        return true;
    }
    if chemical > NUM_CHEMICALS {
        return false;
    }
    match spec.role {
        ChannelRole::Input => true,
        ChannelRole::Output => {
            !is_global_chemical(chemical)
                && !competing(specs, channels, index, chemical).any(|other| other.dest == spec.dest)
        }
        ChannelRole::Bypass => {
            !competing(specs, channels, index, chemical).any(|other| other.joins_same_pair(spec))
        }
    }
}

/// Other outputs and bypasses of the part already using `chemical`.
fn competing<'a>(
    specs: &'a [ChannelSpec],
    channels: &'a [Channel],
    index: usize,
    chemical: u8,
) -> impl Iterator<Item = &'a ChannelSpec> + 'a {
    specs
        .iter()
        .zip(channels)
        .enumerate()
        .filter(move |&(k, (other, channel))| {
            k != index && other.role != ChannelRole::Input && channel.chemical == chemical
        })
        .map(|(_, (other, _))| other)
}

/// Indices of the channels on `part` with either end at `end`.
#[must_use]
pub fn channels_facing(tree: &PartTree, part: PartId, end: SocketRef) -> Vec<usize> {
    tree.get(part).map_or_else(Vec::new, |cell| {
        cell.specs
            .iter()
            .enumerate()
            .filter(|(_, s)| s.source == end || s.dest == end)
            .map(|(i, _)| i)
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::test_support::library;
    use crate::config::ArchetypeConfig;
    use crate::physiology::PhysiologyRegistry;
    use morphogen_data::Gene;

    fn build(root: &Gene) -> (crate::archetype::ArchetypeLibrary, PartTree) {
        let library = library();
        let tree = PartTree::build(
            root,
            &library,
            &PhysiologyRegistry::with_builtins(),
            &ArchetypeConfig::default(),
            32,
        )
        .unwrap();
        (library, tree)
    }

    /// core -skt0-> spine -skt0-> muscle, pacemaker on chemical 1.
    fn chain(spine_channels: [(u8, f32); 2]) -> Gene {
        Gene::new("core").with_child(
            Gene::new("spine")
                .with_socket("skt0")
                .with_channel(spine_channels[0].0, spine_channels[0].1)
                .with_channel(spine_channels[1].0, spine_channels[1].1)
                .with_child(
                    Gene::new("muscle")
                        .with_socket("skt0")
                        .with_channel(1, 0.0)
                        .with_channel(0, 0.0),
                ),
        )
    }

    #[test]
    fn test_chain_through_bypass() {
        let (_library, mut tree) = build(&chain([(1, 0.0), (0, 0.0)]));
        let report = wire_up_all_channels(&mut tree).unwrap();

        let root = tree.root().unwrap();
        let spine = tree.child_at_socket(root, 0).unwrap();
        let muscle = tree.child_at_socket(spine, 0).unwrap();

        assert_eq!(report.len(), 2);
        assert_eq!(
            tree[spine].channels[0].source,
            Some(ChannelRef::new(root, 0))
        );
        assert!(!tree[spine].channels[0].flipped);
        assert_eq!(
            tree[muscle].channels[0].source,
            Some(ChannelRef::new(spine, 0))
        );
        assert!(report.is_acyclic());

        tree[root].channels[0].signal = 0.75;
        propagate(&mut tree, &report, &GlobalChemistry::default());
        assert_eq!(tree[muscle].channels[0].signal, 0.75);
    }

    #[test]
    fn test_sources_share_chemical() {
        let (_library, mut tree) = build(&chain([(1, 0.0), (0, 0.0)]));
        wire_up_all_channels(&mut tree).unwrap();
        for (_, cell) in tree.iter() {
            for channel in &cell.channels {
                if let Some(source) = channel.source {
                    let upstream = &tree[source.part].channels[source.index];
                    assert_eq!(upstream.chemical, channel.chemical);
                }
            }
        }
    }

    #[test]
    fn test_bypass_entered_from_dest_is_flipped() {
        // sensor output -> plug of sensor -> spine skt0 (spine bypass dest) -> spine plug -> core skt0 input
        let root = Gene::new("core")
            .with_channel(0, 0.0)
            .with_channel(0, 0.0)
            .with_channel(6, 0.0)
            .with_channel(0, 0.0)
            .with_child(
                Gene::new("spine")
                    .with_socket("skt0")
                    .with_channel(6, 0.0)
                    .with_channel(0, 0.0)
                    .with_child(Gene::new("sensor").with_socket("skt0").with_channel(6, 0.0)),
            );
        let (_library, mut tree) = build(&root);
        let report = wire_up_all_channels(&mut tree).unwrap();

        let core = tree.root().unwrap();
        let spine = tree.child_at_socket(core, 0).unwrap();
        let sensor = tree.child_at_socket(spine, 0).unwrap();
        assert!(tree[spine].channels[0].flipped);
        assert_eq!(tree[spine].channels[0].source, Some(ChannelRef::new(sensor, 0)));
        assert_eq!(tree[core].channels[2].source, Some(ChannelRef::new(spine, 0)));
        assert!(!tree[core].channels[2].flipped);
        assert_eq!(report.links[0].to, ChannelRef::new(spine, 0));

        tree[sensor].channels[0].signal = 0.4;
        propagate(&mut tree, &report, &GlobalChemistry::default());
        assert_eq!(tree[core].channels[2].value(), 0.4);
    }

    #[test]
    fn test_rewire_clears_stale_flips() {
        let root = Gene::new("core").with_child(
            Gene::new("spine")
                .with_socket("skt0")
                .with_channel(6, 0.0)
                .with_channel(0, 0.0)
                .with_child(Gene::new("sensor").with_socket("skt0").with_channel(6, 0.0)),
        );
        let (_library, mut tree) = build(&root);
        wire_up_all_channels(&mut tree).unwrap();
        let core = tree.root().unwrap();
        let spine = tree.child_at_socket(core, 0).unwrap();
        let sensor = tree.child_at_socket(spine, 0).unwrap();
        assert!(tree[spine].channels[0].flipped);

        tree[sensor].channels[0].chemical = 0;
        let report = wire_up_all_channels(&mut tree).unwrap();
        assert!(!tree[spine].channels[0].flipped);
        assert!(tree[spine].channels[0].source.is_none());
        assert!(report.links.iter().all(|l| l.to != ChannelRef::new(spine, 0)));
    }

    #[test]
    fn test_ambiguous_wiring_rejected() {
        // Pacemaker output 0 on chemical 1 reaches the spine at its plug; the
        // sensor below pushes chemical 1 up into the same bypass from its dest.
        let root = Gene::new("core").with_child(
            Gene::new("spine")
                .with_socket("skt0")
                .with_channel(1, 0.0)
                .with_channel(0, 0.0)
                .with_child(Gene::new("sensor").with_socket("skt0").with_channel(1, 0.0)),
        );
        let (_library, mut tree) = build(&root);
        let err = wire_up_all_channels(&mut tree).unwrap_err();
        assert!(matches!(err, CoreError::AmbiguousWiring { chemical: 1, .. }));
    }

    #[test]
    fn test_unheard_output_is_dangling() {
        let (_library, mut tree) = build(&Gene::new("core"));
        let report = wire_up_all_channels(&mut tree).unwrap();
        assert!(report.is_empty());
        assert_eq!(
            report.dangling,
            vec![ChannelRef::new(tree.root().unwrap(), 0)]
        );
    }

    #[test]
    fn test_global_inputs_read_pool() {
        let root = Gene::new("core")
            .with_channel(1, 0.0)
            .with_channel(0, 0.0)
            .with_channel(16, 0.0)
            .with_channel(0, 0.0);
        let (_library, mut tree) = build(&root);
        let report = wire_up_all_channels(&mut tree).unwrap();
        let mut globals = GlobalChemistry::default();
        globals.set(16, 0.3);
        propagate(&mut tree, &report, &globals);
        assert!((tree[tree.root().unwrap()].channels[2].value() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_is_valid_chemical_rules() {
        let (library, mut tree) = build(&Gene::new("core"));
        let core = tree.root().unwrap();
        let cell = &tree[core];

        assert!(is_valid_chemical(cell, 0, 0));
        assert!(!is_valid_chemical(cell, 99, 0));
        assert!(!is_valid_chemical(cell, 0, NUM_CHEMICALS + 1));
        assert!(!is_valid_chemical(cell, 0, 14));
        assert!(is_valid_chemical(cell, 2, 14));
        // Outputs 0 and 1 leave through different sockets.
        assert!(is_valid_chemical(cell, 1, 1));

        let spine_gene = Gene::new("spine");
        let spine = tree
            .attach(
                core,
                "skt0",
                Cell::get(
                    &spine_gene,
                    &library,
                    &PhysiologyRegistry::with_builtins(),
                    &ArchetypeConfig::default(),
                )
                .unwrap(),
            )
            .unwrap();
        tree[spine].channels[0].chemical = 4;
        assert!(!is_valid_chemical(&tree[spine], 1, 4));
        assert!(is_valid_chemical(&tree[spine], 1, 5));
        assert_eq!(channels_facing(&tree, spine, SocketRef::Plug), vec![0, 1]);
    }
}
