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
use std::{collections::HashMap, error::Error};

use midly::num::u7;
use serde::Deserialize;

use crate::instrument::LOW_PASS_CUTOFF_CONTROLLER;
use crate::parameters::LOW_PASS_CUTOFF;

/// A YAML representation of the MIDI input configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct Midi {
    /// The MIDI input device. "*" listens to every available input.
    device: String,

    /// Additional control change mappings. Controller 74 always maps to the low-pass cutoff
    /// unless overridden here.
    #[serde(default)]
    controllers: Vec<ControllerMapping>,
}

impl Midi {
    /// New will create a new MIDI configuration.
    pub fn new(device: &str, controllers: Vec<ControllerMapping>) -> Midi {
        Midi {
            device: device.to_string(),
            controllers,
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Returns the configured controller mappings.
    pub fn controllers(&self) -> &[ControllerMapping] {
        &self.controllers
    }
}

/// Maps a MIDI controller number onto a parameter.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct ControllerMapping {
    controller: u8,
    parameter: String,
}

impl ControllerMapping {
    pub fn new(controller: u8, parameter: &str) -> ControllerMapping {
        ControllerMapping {
            controller,
            parameter: parameter.to_string(),
        }
    }

    /// Gets the controller number.
    pub fn controller(&self) -> Result<u7, Box<dyn Error>> {
        parse_u7(self.controller)
    }

    /// Gets the parameter name.
    pub fn parameter(&self) -> &str {
        &self.parameter
    }
}

/// Builds the controller map: the low-pass cutoff convention plus any configured mappings.
/// Later mappings override earlier ones.
pub fn controller_map(
    mappings: &[ControllerMapping],
) -> Result<HashMap<u7, String>, Box<dyn Error>> {
    let mut map = HashMap::from([(
        u7::new(LOW_PASS_CUTOFF_CONTROLLER),
        LOW_PASS_CUTOFF.to_string(),
    )]);
    for mapping in mappings {
        map.insert(mapping.controller()?, mapping.parameter.clone());
    }
    Ok(map)
}

/// Parses a raw u7 value.
fn parse_u7(raw: u8) -> Result<u7, Box<dyn Error>> {
    match u7::try_from(raw) {
        Some(val) => Ok(val),
        None => Err(format!("error parsing u7 value: {} is invalid", raw).into()),
    }
}
