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
use std::{error::Error, path::PathBuf};

use midly::num::u4;
use serde::Deserialize;

const DEFAULT_CHANNEL: u8 = 1;
const DEFAULT_PRESET: &str = "Instrument1";
const DEFAULT_PRESET_PATH: &str = "assets/sounds";

/// A YAML representation of the sampler instrument configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct Instrument {
    /// The MIDI output that the sampler instrument listens on.
    device: String,

    /// The MIDI channel (1-16) the instrument plays on.
    channel: Option<u8>,

    /// The preset to load into the instrument.
    preset: Option<String>,

    /// The directory presets are loaded from.
    preset_path: Option<String>,
}

impl Instrument {
    /// New will create a new instrument configuration.
    pub fn new(device: &str, preset: Option<String>, preset_path: Option<String>) -> Instrument {
        Instrument {
            device: device.to_string(),
            channel: None,
            preset,
            preset_path,
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Returns the zero-indexed MIDI channel.
    pub fn channel(&self) -> Result<u4, Box<dyn Error>> {
        let channel = self.channel.unwrap_or(DEFAULT_CHANNEL);
        channel
            .checked_sub(1)
            .and_then(u4::try_from)
            .ok_or_else(|| format!("error parsing channel: {} is invalid", channel).into())
    }

    /// Returns the preset identifier.
    pub fn preset(&self) -> &str {
        self.preset.as_deref().unwrap_or(DEFAULT_PRESET)
    }

    /// Returns the directory presets are loaded from.
    pub fn preset_path(&self) -> PathBuf {
        PathBuf::from(self.preset_path.as_deref().unwrap_or(DEFAULT_PRESET_PATH))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults() {
        let instrument = Instrument::new("mock-instrument", None, None);
        assert_eq!(instrument.channel().unwrap().as_int(), 0);
        assert_eq!(instrument.preset(), "Instrument1");
        assert_eq!(instrument.preset_path(), PathBuf::from("assets/sounds"));
    }

    #[test]
    fn test_channel_range() {
        let mut instrument = Instrument::new("mock-instrument", None, None);
        instrument.channel = Some(16);
        assert_eq!(instrument.channel().unwrap().as_int(), 15);
        instrument.channel = Some(0);
        assert!(instrument.channel().is_err());
        instrument.channel = Some(17);
        assert!(instrument.channel().is_err());
    }
}
