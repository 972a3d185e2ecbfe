// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::collections::HashSet;

use tracing::debug;

use crate::parameters::{self, Parameter, ParameterSurface};

use super::node::{Node, NodeId, NodeKind};
use super::{Graph, GraphError};

/// Builds a chain from the given node kinds using the default parameter set.
pub fn build_graph(nodes: &[NodeKind]) -> Result<Graph, GraphError> {
    build_graph_with_parameters(nodes, parameters::defaults())
}

/// Builds a chain from the given node kinds. Node i feeds node i+1 and the last listed node
/// feeds the system output, which is appended here. Parameters bound to a node kind that
/// isn't in the chain are dropped.
pub fn build_graph_with_parameters(
    nodes: &[NodeKind],
    parameters: Vec<Parameter>,
) -> Result<Graph, GraphError> {
    validate(nodes)?;

    let mut arena: Vec<Node> = nodes
        .iter()
        .chain(std::iter::once(&NodeKind::Output))
        .enumerate()
        .map(|(index, kind)| Node::new(NodeId(index), *kind))
        .collect();

    for index in 1..arena.len() {
        let (from, to) = (NodeId(index - 1), NodeId(index));
        arena[index - 1].connect_output(to);
        arena[index].connect_input(from);
        debug!(
            from = arena[index - 1].kind().name(),
            to = arena[index].kind().name(),
            "Connected nodes."
        );
    }

    for node in arena.iter() {
        if let Some(preset) = node.preset() {
            debug!(node = node.kind().name(), preset = %preset, "Loaded factory preset.");
        }
    }

    let present: HashSet<NodeKind> = nodes.iter().copied().collect();
    let parameters: Vec<Parameter> = parameters
        .into_iter()
        .filter(|parameter| present.contains(&parameter.binding().node))
        .collect();

    // Nodes start out with the parameters' initial values.
    for parameter in parameters.iter() {
        let binding = parameter.binding();
        if let Some(node) = arena.iter_mut().find(|node| node.kind() == binding.node) {
            node.set_property(binding.property, parameter.value());
        }
    }

    Ok(Graph::new(arena, ParameterSurface::new(parameters)))
}

fn validate(nodes: &[NodeKind]) -> Result<(), GraphError> {
    if nodes.is_empty() {
        return Err(GraphError::Empty);
    }
    if nodes.contains(&NodeKind::Output) {
        return Err(GraphError::ExplicitOutput);
    }

    let instruments = nodes
        .iter()
        .filter(|kind| **kind == NodeKind::Instrument)
        .count();
    if instruments != 1 {
        return Err(GraphError::InstrumentCount(instruments));
    }

    let mut seen: HashSet<NodeKind> = HashSet::new();
    for kind in nodes {
        if !seen.insert(*kind) {
            return Err(GraphError::DuplicateNode(*kind));
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use crate::graph::node::{Property, ReverbPreset};
    use crate::parameters::{DELAY_MIX, DELAY_TIME, GAIN, LOW_PASS_CUTOFF, REVERB_MIX};

    use super::*;

    #[test]
    fn test_default_chain_order() {
        let graph = build_graph(&NodeKind::DEFAULT_CHAIN).unwrap();

        assert_eq!(
            graph.chain(),
            vec![
                NodeKind::Instrument,
                NodeKind::Reverb,
                NodeKind::Delay,
                NodeKind::Limiter,
                NodeKind::Output,
            ]
        );
        assert_eq!(
            graph.connections(),
            vec![
                (NodeId(0), NodeId(1)),
                (NodeId(1), NodeId(2)),
                (NodeId(2), NodeId(3)),
                (NodeId(3), NodeId(4)),
            ]
        );
        assert_eq!(graph.nodes()[0].input(), None);
        assert_eq!(graph.nodes()[4].output(), None);
        assert_eq!(graph.nodes()[4].input(), Some(NodeId(3)));
        assert_eq!(
            graph.to_string(),
            "instrument -> reverb -> delay -> limiter -> output"
        );
    }

    #[test]
    fn test_reordered_chain() {
        let graph = build_graph(&[
            NodeKind::Instrument,
            NodeKind::Delay,
            NodeKind::Limiter,
            NodeKind::Reverb,
        ])
        .unwrap();

        assert_eq!(
            graph.to_string(),
            "instrument -> delay -> limiter -> reverb -> output"
        );
        let delay = graph.find(NodeKind::Delay).unwrap();
        let limiter = graph.find(NodeKind::Limiter).unwrap();
        let reverb = graph.find(NodeKind::Reverb).unwrap();
        assert_eq!(delay.output(), Some(limiter.id()));
        assert_eq!(limiter.output(), Some(reverb.id()));
        assert_eq!(
            reverb.output(),
            Some(graph.find(NodeKind::Output).unwrap().id())
        );
    }

    #[test]
    fn test_invalid_chains() {
        assert_eq!(build_graph(&[]).unwrap_err(), GraphError::Empty);
        assert_eq!(
            build_graph(&[NodeKind::Reverb]).unwrap_err(),
            GraphError::InstrumentCount(0)
        );
        assert_eq!(
            build_graph(&[NodeKind::Instrument, NodeKind::Instrument]).unwrap_err(),
            GraphError::InstrumentCount(2)
        );
        assert_eq!(
            build_graph(&[NodeKind::Instrument, NodeKind::Delay, NodeKind::Delay]).unwrap_err(),
            GraphError::DuplicateNode(NodeKind::Delay)
        );
        assert_eq!(
            build_graph(&[NodeKind::Instrument, NodeKind::Output]).unwrap_err(),
            GraphError::ExplicitOutput
        );
    }

    #[test]
    fn test_parameters_for_missing_nodes_dropped() {
        let graph = build_graph(&[NodeKind::Instrument, NodeKind::Limiter]).unwrap();

        let names: Vec<&str> = graph.parameters().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec![LOW_PASS_CUTOFF, GAIN]);
        assert!(graph.get_parameter(REVERB_MIX).is_err());
    }

    #[test]
    fn test_parameter_writes_through_to_node() {
        let mut graph = build_graph(&NodeKind::DEFAULT_CHAIN).unwrap();

        graph.set_parameter(DELAY_TIME, 5.0).unwrap();
        graph.set_parameter(DELAY_MIX, 42.0).unwrap();
        let delay = graph.find(NodeKind::Delay).unwrap();
        assert_eq!(delay.property(Property::DelayTime), Some(2.0));
        assert_eq!(delay.property(Property::WetDryMix), Some(42.0));

        // The reverb's wet/dry mix is a separate property.
        let reverb = graph.find(NodeKind::Reverb).unwrap();
        assert_eq!(reverb.property(Property::WetDryMix), Some(50.0));
        assert_eq!(reverb.preset(), Some(ReverbPreset::LargeHall));
    }

    #[test]
    fn test_initial_values_applied_to_nodes() {
        let parameters = crate::parameters::defaults()
            .into_iter()
            .map(|p| {
                if p.name() == REVERB_MIX {
                    Parameter::new(p.name(), p.min(), p.max(), 10.0, p.binding())
                } else {
                    p
                }
            })
            .collect();
        let graph = build_graph_with_parameters(&NodeKind::DEFAULT_CHAIN, parameters).unwrap();

        assert_eq!(
            graph
                .find(NodeKind::Reverb)
                .unwrap()
                .property(Property::WetDryMix),
            Some(10.0)
        );
    }
}
