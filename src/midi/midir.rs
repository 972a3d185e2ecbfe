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
use std::{collections::BTreeMap, error::Error, fmt, mem};

use midir::{MidiInput, MidiInputConnection, MidiInputPort, MidiOutput};
use midly::live::LiveEvent;
use parking_lot::Mutex;
use tokio::sync::mpsc::Sender;
use tracing::{debug, error, info, span, warn, Level};

use super::ALL_INPUTS;

/// Ports whose names contain this belong to this program and are never listened to.
const CLIENT_NAME: &str = "samplechain";

pub struct Device {
    name: String,
    input_ports: Vec<MidiInputPort>,
    has_output: bool,
    event_connections: Mutex<Vec<MidiInputConnection<()>>>,
}

impl Device {
    fn new(name: &str) -> Device {
        Device {
            name: name.to_string(),
            input_ports: Vec::new(),
            has_output: false,
            event_connections: Mutex::new(Vec::new()),
        }
    }
}

impl super::Device for Device {
    fn name(&self) -> &str {
        &self.name
    }

    fn watch_events(&self, sender: Sender<Vec<u8>>) -> Result<(), Box<dyn Error>> {
        let span = span!(Level::INFO, "wait for event (midir)");
        let _enter = span.enter();

        let mut event_connections = self.event_connections.lock();
        if !event_connections.is_empty() {
            return Err("Already watching events.".into());
        }

        if self.input_ports.is_empty() {
            warn!(device = self.name, "No MIDI inputs available, cannot listen for events.");
            return Ok(());
        }

        for input_port in self.input_ports.iter() {
            // Each connection consumes its MidiInput.
            let input = MidiInput::new(&format!("{} input", CLIENT_NAME))?;
            let port_name = input.port_name(input_port)?;
            let sender = sender.clone();
            event_connections.push(input.connect(
                input_port,
                &format!("{} input watcher", CLIENT_NAME),
                move |_, raw_event, _| {
                    if let Ok(event) = LiveEvent::parse(raw_event) {
                        debug!(event = format!("{:?}", event), "Received MIDI event.");
                    }
                    if let Err(e) = sender.blocking_send(Vec::from(raw_event)) {
                        error!(
                            err = format!("{:?}", e),
                            "Error sending MIDI event to receiver."
                        );
                    }
                },
                (),
            )?);
            info!(port = port_name, "Watching MIDI events.");
        }

        Ok(())
    }

    fn stop_watch_events(&self) {
        // Explicitly drop the connections.
        let event_connections = mem::take(&mut *self.event_connections.lock());
        for connection in event_connections {
            connection.close();
        }
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<std::sync::Arc<super::mock::Device>, Box<dyn Error>> {
        Err("not a mock device".into())
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut capabilities: Vec<String> = Vec::new();
        if !self.input_ports.is_empty() {
            capabilities.push(String::from("Input"));
        }
        if self.has_output {
            capabilities.push(String::from("Output"));
        }

        write!(f, "{} ({})", self.name, capabilities.join("/"))
    }
}

/// Lists midir devices and produces the Device trait.
pub fn list() -> Result<Vec<Box<dyn super::Device>>, Box<dyn Error>> {
    Ok(list_midir_devices()?
        .into_iter()
        .map(|device| {
            let device: Box<dyn super::Device> = Box::new(device);
            device
        })
        .collect())
}

/// Lists midir devices, skipping this program's own ports.
fn list_midir_devices() -> Result<Vec<Device>, Box<dyn Error>> {
    let input = MidiInput::new(&format!("{} input listing", CLIENT_NAME))?;
    let output = MidiOutput::new(&format!("{} output listing", CLIENT_NAME))?;

    let mut devices: BTreeMap<String, Device> = BTreeMap::new();

    for port in input.ports() {
        let name = input.port_name(&port)?;
        if name.contains(CLIENT_NAME) {
            continue;
        }
        devices
            .entry(name.clone())
            .or_insert_with(|| Device::new(&name))
            .input_ports
            .push(port);
    }

    for port in output.ports() {
        let name = output.port_name(&port)?;
        if name.contains(CLIENT_NAME) {
            continue;
        }
        devices
            .entry(name.clone())
            .or_insert_with(|| Device::new(&name))
            .has_output = true;
    }

    Ok(devices.into_values().collect())
}

/// Gets the given midir device. The name "*" listens on every available input.
pub fn get(name: &str) -> Result<Device, Box<dyn Error>> {
    let devices = list_midir_devices()?;

    if name == ALL_INPUTS {
        let mut device = Device::new(ALL_INPUTS);
        device.input_ports = devices
            .into_iter()
            .flat_map(|device| device.input_ports)
            .collect();
        info!(inputs = device.input_ports.len(), "Listening on all MIDI inputs.");
        return Ok(device);
    }

    let mut matches = devices
        .into_iter()
        .filter(|device| device.name.contains(name))
        .collect::<Vec<Device>>();

    if matches.is_empty() {
        return Err(format!("no device found with name {}", name).into());
    }
    if matches.len() > 1 {
        return Err(format!(
            "found too many devices that match ({}), use a less ambiguous device name",
            matches
                .iter()
                .map(|device| device.name.clone())
                .collect::<Vec<String>>()
                .join(", ")
        )
        .into());
    }

    Ok(matches.swap_remove(0))
}
