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
use std::{error::Error, time::Duration};

use duration_string::DurationString;
use serde::Deserialize;

const DEFAULT_AUDIO_DEVICE: &str = "default";
const DEFAULT_RESUME_DELAY: Duration = Duration::from_secs(1);

/// A YAML representation of the audio configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Audio {
    /// The audio output device. Uses the host's default output when unset.
    device: Option<String>,

    /// How long to wait after an interruption ends before restarting the engine.
    resume_delay: Option<String>,
}

impl Audio {
    /// New will create a new Audio configuration.
    pub fn new(device: &str) -> Audio {
        Audio {
            device: Some(device.to_string()),
            resume_delay: None,
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        self.device.as_deref().unwrap_or(DEFAULT_AUDIO_DEVICE)
    }

    /// Returns the resume delay from the configuration.
    pub fn resume_delay(&self) -> Result<Duration, Box<dyn Error>> {
        match &self.resume_delay {
            Some(resume_delay) => Ok(DurationString::from_string(resume_delay.clone())?.into()),
            None => Ok(DEFAULT_RESUME_DELAY),
        }
    }
}
