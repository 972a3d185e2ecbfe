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
use std::{collections::HashMap, fmt, str::FromStr};

use serde::Deserialize;

/// The kinds of processing node that can appear in a chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// The sampler instrument. Every graph has exactly one.
    Instrument,
    /// A reverb effect.
    Reverb,
    /// A delay effect.
    Delay,
    /// A peak limiter.
    Limiter,
    /// The system output. Always appended by the builder and always last.
    Output,
}

impl NodeKind {
    /// The chain the sampler uses when nothing else is configured.
    pub const DEFAULT_CHAIN: [NodeKind; 4] = [
        NodeKind::Instrument,
        NodeKind::Reverb,
        NodeKind::Delay,
        NodeKind::Limiter,
    ];

    /// Returns the name of the node kind.
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Instrument => "instrument",
            NodeKind::Reverb => "reverb",
            NodeKind::Delay => "delay",
            NodeKind::Limiter => "limiter",
            NodeKind::Output => "output",
        }
    }

    /// Returns the factory preset the node is loaded with. Only reverb has one.
    pub fn factory_preset(&self) -> Option<ReverbPreset> {
        match self {
            NodeKind::Reverb => Some(ReverbPreset::LargeHall),
            _ => None,
        }
    }

    /// Returns the properties this kind of node exposes along with their initial values.
    pub fn properties(&self) -> &'static [(Property, f32)] {
        match self {
            NodeKind::Instrument => &[
                (Property::LowPassCutoff, 127.0),
                (Property::OverallGain, 0.0),
            ],
            NodeKind::Reverb => &[(Property::WetDryMix, 50.0)],
            NodeKind::Delay => &[
                (Property::WetDryMix, 20.0),
                (Property::DelayTime, 0.3),
                (Property::Feedback, 50.0),
            ],
            NodeKind::Limiter => &[
                (Property::PreGain, 0.0),
                (Property::AttackTime, 0.012),
                (Property::DecayTime, 0.024),
            ],
            NodeKind::Output => &[],
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "instrument" => Ok(NodeKind::Instrument),
            "reverb" => Ok(NodeKind::Reverb),
            "delay" => Ok(NodeKind::Delay),
            "limiter" => Ok(NodeKind::Limiter),
            "output" => Ok(NodeKind::Output),
            _ => Err(format!("unknown node kind '{}'", s)),
        }
    }
}

/// A controllable property on a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Property {
    /// Wet/dry mix, in percent.
    WetDryMix,
    /// Delay time, in seconds.
    DelayTime,
    /// Delay feedback, in percent.
    Feedback,
    /// The instrument's low-pass filter cutoff, as a MIDI controller value.
    LowPassCutoff,
    /// The instrument's overall gain, in decibels.
    OverallGain,
    /// Limiter pre-gain, in decibels.
    PreGain,
    /// Limiter attack time, in seconds.
    AttackTime,
    /// Limiter decay time, in seconds.
    DecayTime,
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Property::WetDryMix => "wet_dry_mix",
            Property::DelayTime => "delay_time",
            Property::Feedback => "feedback",
            Property::LowPassCutoff => "low_pass_cutoff",
            Property::OverallGain => "overall_gain",
            Property::PreGain => "pre_gain",
            Property::AttackTime => "attack_time",
            Property::DecayTime => "decay_time",
        };
        write!(f, "{}", name)
    }
}

/// Factory room presets for the reverb node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReverbPreset {
    SmallRoom,
    MediumRoom,
    LargeRoom,
    MediumHall,
    LargeHall,
    Plate,
    Cathedral,
}

impl fmt::Display for ReverbPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReverbPreset::SmallRoom => "small_room",
            ReverbPreset::MediumRoom => "medium_room",
            ReverbPreset::LargeRoom => "large_room",
            ReverbPreset::MediumHall => "medium_hall",
            ReverbPreset::LargeHall => "large_hall",
            ReverbPreset::Plate => "plate",
            ReverbPreset::Cathedral => "cathedral",
        };
        write!(f, "{}", name)
    }
}

/// The position of a node in the graph arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Returns the arena index of the node.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A processing node in the chain.
#[derive(Clone, Debug)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,
    /// The node feeding this one. None for the head of the chain.
    input: Option<NodeId>,
    /// The node this one feeds. None only for the output node.
    output: Option<NodeId>,
    properties: HashMap<Property, f32>,
    preset: Option<ReverbPreset>,
}

impl Node {
    pub(crate) fn new(id: NodeId, kind: NodeKind) -> Node {
        Node {
            id,
            kind,
            input: None,
            output: None,
            properties: kind.properties().iter().copied().collect(),
            preset: kind.factory_preset(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn input(&self) -> Option<NodeId> {
        self.input
    }

    pub fn output(&self) -> Option<NodeId> {
        self.output
    }

    pub(crate) fn connect_input(&mut self, input: NodeId) {
        self.input = Some(input);
    }

    pub(crate) fn connect_output(&mut self, output: NodeId) {
        self.output = Some(output);
    }

    /// Returns the factory preset loaded into the node, if any.
    pub fn preset(&self) -> Option<ReverbPreset> {
        self.preset
    }

    /// Returns the current value of the property, if this node has it.
    pub fn property(&self, property: Property) -> Option<f32> {
        self.properties.get(&property).copied()
    }

    /// Writes the property. Returns false if the node doesn't expose it.
    pub(crate) fn set_property(&mut self, property: Property, value: f32) -> bool {
        match self.properties.get_mut(&property) {
            Some(current) => {
                *current = value;
                true
            }
            None => false,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind, self.id)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_node_kind_parse() {
        assert_eq!(NodeKind::from_str("Reverb"), Ok(NodeKind::Reverb));
        assert_eq!(NodeKind::from_str(" limiter "), Ok(NodeKind::Limiter));
        assert!(NodeKind::from_str("chorus").is_err());
    }

    #[test]
    fn test_node_properties() {
        let mut node = Node::new(NodeId(1), NodeKind::Delay);
        assert_eq!(node.property(Property::DelayTime), Some(0.3));
        assert_eq!(node.property(Property::LowPassCutoff), None);

        assert!(node.set_property(Property::WetDryMix, 80.0));
        assert_eq!(node.property(Property::WetDryMix), Some(80.0));
        assert!(!node.set_property(Property::OverallGain, 3.0));
        assert_eq!(node.property(Property::OverallGain), None);
    }

    #[test]
    fn test_reverb_loads_large_hall() {
        let reverb = Node::new(NodeId(1), NodeKind::Reverb);
        assert_eq!(reverb.preset(), Some(ReverbPreset::LargeHall));
        assert_eq!(reverb.preset().map(|p| p.to_string()), Some("large_hall".into()));

        for kind in [NodeKind::Instrument, NodeKind::Delay, NodeKind::Limiter, NodeKind::Output] {
            assert_eq!(Node::new(NodeId(0), kind).preset(), None);
        }
    }

    #[test]
    fn test_output_has_no_properties() {
        let node = Node::new(NodeId(4), NodeKind::Output);
        assert!(NodeKind::Output.properties().is_empty());
        assert_eq!(node.input(), None);
        assert_eq!(node.output(), None);
    }
}
