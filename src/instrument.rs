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

use crate::config;
use crate::resource::InstrumentPreset;

mod midir;
mod mock;

/// The general MIDI controller number for the filter cutoff (brightness).
pub const LOW_PASS_CUTOFF_CONTROLLER: u8 = 74;

/// The MIDI controller number for channel volume.
pub const CHANNEL_VOLUME_CONTROLLER: u8 = 7;

/// The sampler instrument at the head of the chain.
pub trait Instrument: fmt::Display + std::marker::Send + std::marker::Sync {
    /// Starts a note.
    fn start_note(&self, pitch: u7, velocity: u7) -> Result<(), Box<dyn Error>>;

    /// Stops a note.
    fn stop_note(&self, pitch: u7) -> Result<(), Box<dyn Error>>;

    /// Sends a controller value to the instrument.
    fn send_controller(&self, controller: u7, value: u7) -> Result<(), Box<dyn Error>>;

    /// Sets the overall gain of the instrument in decibels.
    fn set_gain(&self, gain_db: f32) -> Result<(), Box<dyn Error>>;

    /// Loads the given preset into the instrument.
    fn load_preset(&self, preset: &InstrumentPreset) -> Result<(), Box<dyn Error>>;

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<mock::Instrument>, Box<dyn Error>>;
}

/// Gets the instrument described by the configuration.
pub fn get_instrument(config: &config::Instrument) -> Result<Arc<dyn Instrument>, Box<dyn Error>> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Instrument::get(device)));
    }

    Ok(Arc::new(midir::Instrument::get(device, config.channel()?)?))
}

/// Maps a gain in decibels (-12 to +12) onto a channel volume controller value using the
/// 40 log10 volume curve, with +12 dB at full scale.
pub fn gain_to_volume(gain_db: f32) -> u7 {
    let volume = 127.0 * 10f32.powf((gain_db.clamp(-12.0, 12.0) - 12.0) / 40.0);
    u7::new(volume.round().clamp(0.0, 127.0) as u8)
}

#[cfg(test)]
pub mod test {
    pub use super::mock::{Call, Instrument};

    use super::gain_to_volume;

    #[test]
    fn test_gain_to_volume() {
        assert_eq!(gain_to_volume(12.0).as_int(), 127);
        assert_eq!(gain_to_volume(0.0).as_int(), 64);
        assert_eq!(gain_to_volume(-12.0).as_int(), 32);
        assert_eq!(gain_to_volume(40.0).as_int(), 127);
        assert_eq!(gain_to_volume(-40.0).as_int(), 32);
    }
}
