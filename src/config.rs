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
use std::collections::HashMap;
use std::path::Path;

use config::{Config, File};
use serde::Deserialize;
use tracing::info;

use crate::graph::node::NodeKind;
use crate::parameters::{self, Parameter};

mod audio;
mod error;
mod instrument;
mod keyboard;
pub mod midi;

pub use self::audio::Audio;
pub use self::error::ConfigError;
pub use self::instrument::Instrument;
pub use self::keyboard::Keyboard;
pub use self::midi::{ControllerMapping, Midi};

/// The configuration for the sampler.
#[derive(Deserialize, Clone, Debug)]
pub struct Sampler {
    /// The audio output configuration.
    #[serde(default)]
    audio: Audio,
    /// The sampler instrument configuration.
    instrument: Instrument,
    /// The MIDI input configuration.
    midi: Option<Midi>,
    /// The virtual keyboard layout.
    #[serde(default)]
    keyboard: Keyboard,
    /// The node chain. Defaults to instrument, reverb, delay, limiter.
    chain: Option<Vec<NodeKind>>,
    /// Initial parameter values by parameter name.
    #[serde(default)]
    parameters: HashMap<String, f32>,
}

impl Sampler {
    /// Creates a new sampler configuration.
    pub fn new(audio: Audio, instrument: Instrument, midi: Option<Midi>) -> Sampler {
        Sampler {
            audio,
            instrument,
            midi,
            keyboard: Keyboard::default(),
            chain: None,
            parameters: HashMap::new(),
        }
    }

    /// Loads the sampler configuration from the given file.
    pub fn load(path: &Path) -> Result<Sampler, ConfigError> {
        let sampler: Sampler = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize()?;
        sampler.validate()?;

        info!(path = ?path, chain = ?sampler.chain(), "Loaded sampler configuration.");
        Ok(sampler)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.keyboard.pitch_range().map_err(ConfigError::Invalid)?;
        self.audio
            .resume_delay()
            .map_err(|e| ConfigError::Invalid(format!("resume_delay: {}", e)))?;
        let parameters = self.parameters()?;
        if let Some(midi) = &self.midi {
            midi::controller_map(midi.controllers())
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
            if let Some(unknown) = midi.controllers().iter().find(|mapping| {
                !parameters
                    .iter()
                    .any(|parameter| parameter.name() == mapping.parameter())
            }) {
                return Err(ConfigError::Invalid(format!(
                    "controller mapped to unknown parameter '{}'",
                    unknown.parameter()
                )));
            }
        }
        Ok(())
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    pub fn midi(&self) -> Option<&Midi> {
        self.midi.as_ref()
    }

    pub fn keyboard(&self) -> &Keyboard {
        &self.keyboard
    }

    /// Returns the node chain.
    pub fn chain(&self) -> Vec<NodeKind> {
        self.chain
            .clone()
            .unwrap_or_else(|| NodeKind::DEFAULT_CHAIN.to_vec())
    }

    /// Returns the parameter set with configured initial values applied.
    pub fn parameters(&self) -> Result<Vec<Parameter>, ConfigError> {
        let defaults = parameters::defaults();
        if let Some(unknown) = self
            .parameters
            .keys()
            .find(|name| !defaults.iter().any(|parameter| parameter.name() == name.as_str()))
        {
            return Err(ConfigError::Invalid(format!(
                "unknown parameter '{}'",
                unknown
            )));
        }
        if let Some((name, _)) = self.parameters.iter().find(|(_, value)| value.is_nan()) {
            return Err(ConfigError::Invalid(format!(
                "parameter '{}' is not a number",
                name
            )));
        }

        Ok(defaults
            .into_iter()
            .map(|parameter| match self.parameters.get(parameter.name()) {
                Some(value) => Parameter::new(
                    parameter.name(),
                    parameter.min(),
                    parameter.max(),
                    *value,
                    parameter.binding(),
                ),
                None => parameter,
            })
            .collect())
    }
}
