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

//! The parameter surface: named, range-bound control values bound to node properties.

use crossbeam_channel::{Receiver, Sender};
use tracing::debug;

use crate::graph::node::{NodeKind, Property};

pub const REVERB_MIX: &str = "reverb_mix";
pub const DELAY_MIX: &str = "delay_mix";
pub const DELAY_TIME: &str = "delay_time";
pub const LOW_PASS_CUTOFF: &str = "low_pass_cutoff";
pub const GAIN: &str = "gain";

/// Errors from reading or writing parameters.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ParamError {
    #[error("no parameter named '{0}'")]
    InvalidName(String),
    #[error("invalid value {value} for parameter '{name}'")]
    InvalidValue { name: String, value: f32 },
}

/// The node property a parameter writes through to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Binding {
    pub node: NodeKind,
    pub property: Property,
}

impl Binding {
    pub fn new(node: NodeKind, property: Property) -> Binding {
        Binding { node, property }
    }
}

/// A named, bounded control value.
#[derive(Clone, Debug, PartialEq)]
pub struct Parameter {
    name: String,
    min: f32,
    max: f32,
    value: f32,
    binding: Binding,
}

impl Parameter {
    /// Creates a new parameter. The initial value is clamped into range, and a NaN initial
    /// value falls back to the minimum.
    pub fn new(name: &str, min: f32, max: f32, value: f32, binding: Binding) -> Parameter {
        let mut parameter = Parameter {
            name: name.to_string(),
            min,
            max,
            value: min,
            binding,
        };
        if !value.is_nan() {
            parameter.value = parameter.clamp(value);
        }
        parameter
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn binding(&self) -> Binding {
        self.binding
    }

    fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

/// Published to subscribers whenever a parameter value changes.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterChange {
    pub name: String,
    pub value: f32,
    pub binding: Binding,
}

/// The parameters the sampler exposes, with their ranges and initial values.
pub fn defaults() -> Vec<Parameter> {
    vec![
        Parameter::new(
            REVERB_MIX,
            0.0,
            100.0,
            50.0,
            Binding::new(NodeKind::Reverb, Property::WetDryMix),
        ),
        Parameter::new(
            DELAY_MIX,
            0.0,
            100.0,
            20.0,
            Binding::new(NodeKind::Delay, Property::WetDryMix),
        ),
        Parameter::new(
            DELAY_TIME,
            0.0,
            2.0,
            0.3,
            Binding::new(NodeKind::Delay, Property::DelayTime),
        ),
        Parameter::new(
            LOW_PASS_CUTOFF,
            0.0,
            127.0,
            127.0,
            Binding::new(NodeKind::Instrument, Property::LowPassCutoff),
        ),
        Parameter::new(
            GAIN,
            -12.0,
            12.0,
            0.0,
            Binding::new(NodeKind::Instrument, Property::OverallGain),
        ),
    ]
}

/// Holds the parameter set and fans changes out to subscribers.
#[derive(Debug)]
pub struct ParameterSurface {
    parameters: Vec<Parameter>,
    subscribers: Vec<Sender<ParameterChange>>,
}

impl ParameterSurface {
    pub fn new(parameters: Vec<Parameter>) -> ParameterSurface {
        ParameterSurface {
            parameters,
            subscribers: Vec::new(),
        }
    }

    /// Sets the named parameter, clamping the value into its range rather than rejecting it.
    /// Returns the change that was applied.
    pub fn set(&mut self, name: &str, value: f32) -> Result<ParameterChange, ParamError> {
        let parameter = self
            .parameters
            .iter_mut()
            .find(|parameter| parameter.name == name)
            .ok_or_else(|| ParamError::InvalidName(name.to_string()))?;

        if value.is_nan() {
            return Err(ParamError::InvalidValue {
                name: name.to_string(),
                value,
            });
        }

        let clamped = parameter.clamp(value);
        let changed = parameter.value != clamped;
        parameter.value = clamped;

        let change = ParameterChange {
            name: parameter.name.clone(),
            value: clamped,
            binding: parameter.binding,
        };

        debug!(
            parameter = name,
            requested = value,
            value = clamped,
            "Parameter set."
        );

        if changed {
            self.notify(&change);
        }

        Ok(change)
    }

    /// Gets the current value of the named parameter.
    pub fn get(&self, name: &str) -> Result<f32, ParamError> {
        self.parameter(name)
            .map(Parameter::value)
            .ok_or_else(|| ParamError::InvalidName(name.to_string()))
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters
            .iter()
            .find(|parameter| parameter.name == name)
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Registers a new subscriber. Every subsequent change is delivered to the returned receiver.
    pub fn subscribe(&mut self) -> Receiver<ParameterChange> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    fn notify(&mut self, change: &ParameterChange) {
        // Subscribers that have gone away are dropped.
        self.subscribers
            .retain(|subscriber| subscriber.send(change.clone()).is_ok());
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn surface() -> ParameterSurface {
        ParameterSurface::new(defaults())
    }

    #[test]
    fn test_set_clamps_into_range() {
        let mut surface = surface();
        for parameter in defaults() {
            let (min, max) = (parameter.min(), parameter.max());
            for value in [min - 100.0, min, (min + max) / 2.0, max, max + 0.5, f32::INFINITY] {
                let change = surface.set(parameter.name(), value).unwrap();
                assert_eq!(change.value, value.clamp(min, max));
                assert_eq!(surface.get(parameter.name()).unwrap(), value.clamp(min, max));
            }
        }
    }

    #[test]
    fn test_nan_initial_value_falls_back_to_min() {
        let binding = Binding::new(NodeKind::Reverb, Property::WetDryMix);
        let parameter = Parameter::new("mix", 0.0, 100.0, f32::NAN, binding);
        assert_eq!(parameter.value(), 0.0);

        let parameter = Parameter::new("mix", 0.0, 100.0, 150.0, binding);
        assert_eq!(parameter.value(), 100.0);
    }

    #[test]
    fn test_invalid_name_leaves_state_unchanged() {
        let mut surface = surface();
        let before = surface.parameters().to_vec();

        assert_eq!(
            surface.set("chorus_depth", 10.0),
            Err(ParamError::InvalidName("chorus_depth".to_string()))
        );
        assert_eq!(
            surface.get("chorus_depth"),
            Err(ParamError::InvalidName("chorus_depth".to_string()))
        );
        assert_eq!(surface.parameters(), before.as_slice());
    }

    #[test]
    fn test_nan_rejected() {
        let mut surface = surface();
        assert!(matches!(
            surface.set(GAIN, f32::NAN),
            Err(ParamError::InvalidValue { .. })
        ));
        assert_eq!(surface.get(GAIN).unwrap(), 0.0);
    }

    #[test]
    fn test_initial_value_clamped() {
        let parameter = Parameter::new(
            "cutoff",
            0.0,
            127.0,
            300.0,
            Binding::new(NodeKind::Instrument, Property::LowPassCutoff),
        );
        assert_eq!(parameter.value(), 127.0);
    }

    #[test]
    fn test_subscribers_notified_on_change() {
        let mut surface = surface();
        let rx = surface.subscribe();

        surface.set(REVERB_MIX, 75.0).unwrap();
        let change = rx.try_recv().unwrap();
        assert_eq!(change.name, REVERB_MIX);
        assert_eq!(change.value, 75.0);
        assert_eq!(
            change.binding,
            Binding::new(NodeKind::Reverb, Property::WetDryMix)
        );

        // Setting the same value again is not a change.
        surface.set(REVERB_MIX, 75.0).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_subscribers_pruned() {
        let mut surface = surface();
        let rx = surface.subscribe();
        drop(rx);
        let kept = surface.subscribe();

        surface.set(DELAY_TIME, 1.0).unwrap();
        assert_eq!(surface.subscribers.len(), 1);
        assert_eq!(kept.try_recv().unwrap().value, 1.0);
    }
}
