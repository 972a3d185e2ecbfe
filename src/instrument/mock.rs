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
use std::{error::Error, fmt, sync::Arc};

use midly::num::u7;
use parking_lot::Mutex;
use tracing::debug;

use crate::resource::InstrumentPreset;

/// A call made against the mock instrument.
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    StartNote { pitch: u8, velocity: u8 },
    StopNote { pitch: u8 },
    Controller { controller: u8, value: u8 },
    Gain(f32),
    LoadPreset(String),
}

/// A mock instrument. Records every call made against it.
#[derive(Clone)]
pub struct Instrument {
    name: String,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl Instrument {
    /// Gets the given mock instrument.
    pub fn get(name: &str) -> Instrument {
        Instrument {
            name: name.to_string(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn record(&self, call: Call) {
        debug!(instrument = self.name, call = ?call, "Mock instrument call.");
        self.calls.lock().push(call);
    }

    /// Returns the calls made so far.
    #[cfg(test)]
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Forgets all recorded calls.
    #[cfg(test)]
    pub fn reset(&self) {
        self.calls.lock().clear();
    }
}

impl super::Instrument for Instrument {
    fn start_note(&self, pitch: u7, velocity: u7) -> Result<(), Box<dyn Error>> {
        self.record(Call::StartNote {
            pitch: pitch.as_int(),
            velocity: velocity.as_int(),
        });
        Ok(())
    }

    fn stop_note(&self, pitch: u7) -> Result<(), Box<dyn Error>> {
        self.record(Call::StopNote {
            pitch: pitch.as_int(),
        });
        Ok(())
    }

    fn send_controller(&self, controller: u7, value: u7) -> Result<(), Box<dyn Error>> {
        self.record(Call::Controller {
            controller: controller.as_int(),
            value: value.as_int(),
        });
        Ok(())
    }

    fn set_gain(&self, gain_db: f32) -> Result<(), Box<dyn Error>> {
        self.record(Call::Gain(gain_db));
        Ok(())
    }

    fn load_preset(&self, preset: &InstrumentPreset) -> Result<(), Box<dyn Error>> {
        self.record(Call::LoadPreset(preset.name().to_string()));
        Ok(())
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<Instrument>, Box<dyn Error>> {
        Ok(Arc::new(self.clone()))
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
