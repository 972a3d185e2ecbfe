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

//! The processing graph: an arena of nodes connected as a simple chain, plus the
//! parameters bound to their properties.

use std::fmt;

use crossbeam_channel::Receiver;

use crate::parameters::{ParamError, Parameter, ParameterChange, ParameterSurface};

mod builder;
pub mod node;

pub use builder::{build_graph, build_graph_with_parameters};
use node::{Node, NodeId, NodeKind};

/// Errors raised while building a graph.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum GraphError {
    #[error("a graph needs at least one node")]
    Empty,
    #[error("a graph needs exactly one instrument node, found {0}")]
    InstrumentCount(usize),
    #[error("node {0} appears more than once in the chain")]
    DuplicateNode(NodeKind),
    #[error("the output node is added automatically and cannot be listed")]
    ExplicitOutput,
}

/// A fixed chain of nodes ending at the system output.
#[derive(Debug)]
pub struct Graph {
    /// Nodes in signal order. The output node is always last.
    nodes: Vec<Node>,
    parameters: ParameterSurface,
}

impl Graph {
    pub(crate) fn new(nodes: Vec<Node>, parameters: ParameterSurface) -> Graph {
        Graph { nodes, parameters }
    }

    /// Returns the nodes in signal order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Finds the node of the given kind.
    pub fn find(&self, kind: NodeKind) -> Option<&Node> {
        self.nodes.iter().find(|node| node.kind() == kind)
    }

    /// Returns the node kinds in signal order, including the output.
    pub fn chain(&self) -> Vec<NodeKind> {
        self.nodes.iter().map(Node::kind).collect()
    }

    /// Returns every connection as (from, to), derived from node adjacency.
    pub fn connections(&self) -> Vec<(NodeId, NodeId)> {
        self.nodes
            .iter()
            .filter_map(|node| node.output().map(|output| (node.id(), output)))
            .collect()
    }

    /// Sets a parameter and writes the clamped value through to the bound node property.
    pub fn set_parameter(
        &mut self,
        name: &str,
        value: f32,
    ) -> Result<ParameterChange, ParamError> {
        let change = self.parameters.set(name, value)?;
        if let Some(node) = self
            .nodes
            .iter_mut()
            .find(|node| node.kind() == change.binding.node)
        {
            node.set_property(change.binding.property, change.value);
        }
        Ok(change)
    }

    pub fn get_parameter(&self, name: &str) -> Result<f32, ParamError> {
        self.parameters.get(name)
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.parameter(name)
    }

    pub fn parameters(&self) -> &[Parameter] {
        self.parameters.parameters()
    }

    /// Subscribes to parameter changes.
    pub fn subscribe(&mut self) -> Receiver<ParameterChange> {
        self.parameters.subscribe()
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chain = self
            .nodes
            .iter()
            .map(|node| node.kind().name())
            .collect::<Vec<&str>>()
            .join(" -> ");
        write!(f, "{}", chain)
    }
}
