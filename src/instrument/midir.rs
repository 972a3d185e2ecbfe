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
use std::{error::Error, fmt};

use midir::{MidiOutput, MidiOutputConnection};
use midly::{
    live::LiveEvent,
    num::{u4, u7},
    MidiMessage,
};
use parking_lot::Mutex;
use tracing::{debug, info, span, Level};

use crate::resource::InstrumentPreset;

/// An instrument that drives an external sampler through a MIDI output port.
pub struct Instrument {
    name: String,
    channel: u4,
    connection: Mutex<MidiOutputConnection>,
}

impl Instrument {
    /// Connects to the single output port whose name contains the given name.
    pub fn get(name: &str, channel: u4) -> Result<Instrument, Box<dyn Error>> {
        let output = MidiOutput::new("samplechain instrument")?;
        let mut matches = Vec::new();
        for port in output.ports() {
            let port_name = output.port_name(&port)?;
            if port_name.contains(name) {
                matches.push((port_name, port));
            }
        }

        if matches.is_empty() {
            return Err(format!("no MIDI output found with name {}", name).into());
        }
        if matches.len() > 1 {
            return Err(format!(
                "found too many MIDI outputs that match ({}), use a less ambiguous name",
                matches
                    .iter()
                    .map(|(port_name, _)| port_name.clone())
                    .collect::<Vec<String>>()
                    .join(", ")
            )
            .into());
        }

        let (port_name, port) = matches.swap_remove(0);
        let connection = output.connect(&port, "samplechain instrument")?;
        info!(port = port_name, channel = channel.as_int() + 1, "Instrument connected.");

        Ok(Instrument {
            name: port_name,
            channel,
            connection: Mutex::new(connection),
        })
    }

    fn send(&self, message: MidiMessage) -> Result<(), Box<dyn Error>> {
        let event = LiveEvent::Midi {
            channel: self.channel,
            message,
        };
        debug!(
            instrument = self.name,
            event = format!("{:?}", event),
            "Sending event."
        );

        // Choosing 8 here because that's the largest channel message plus headroom.
        let mut buf: Vec<u8> = Vec::with_capacity(8);
        event.write(&mut buf)?;
        self.connection.lock().send(&buf)?;
        Ok(())
    }
}

impl super::Instrument for Instrument {
    fn start_note(&self, pitch: u7, velocity: u7) -> Result<(), Box<dyn Error>> {
        self.send(MidiMessage::NoteOn {
            key: pitch,
            vel: velocity,
        })
    }

    fn stop_note(&self, pitch: u7) -> Result<(), Box<dyn Error>> {
        self.send(MidiMessage::NoteOff {
            key: pitch,
            vel: u7::new(0),
        })
    }

    fn send_controller(&self, controller: u7, value: u7) -> Result<(), Box<dyn Error>> {
        self.send(MidiMessage::Controller { controller, value })
    }

    fn set_gain(&self, gain_db: f32) -> Result<(), Box<dyn Error>> {
        self.send_controller(
            u7::new(super::CHANNEL_VOLUME_CONTROLLER),
            super::gain_to_volume(gain_db),
        )
    }

    fn load_preset(&self, preset: &InstrumentPreset) -> Result<(), Box<dyn Error>> {
        let span = span!(Level::INFO, "load preset (midir)");
        let _enter = span.enter();

        if let Some(bank) = preset.bank() {
            // Bank select MSB, then LSB.
            self.send_controller(u7::new(0), u7::new((bank >> 7) as u8 & 0x7f))?;
            self.send_controller(u7::new(32), u7::new(bank as u8 & 0x7f))?;
        }
        self.send(MidiMessage::ProgramChange {
            program: u7::try_from(preset.program()).ok_or("program out of range")?,
        })?;

        info!(
            instrument = self.name,
            preset = preset.name(),
            "Preset loaded."
        );
        Ok(())
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<std::sync::Arc<super::mock::Instrument>, Box<dyn Error>> {
        Err("not a mock instrument".into())
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Channel={})", self.name, self.channel.as_int() + 1)
    }
}
