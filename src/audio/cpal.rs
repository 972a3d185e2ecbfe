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
use std::{error::Error, fmt, sync::mpsc, thread};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info, span, Level};

use crate::audio::{Device as AudioDevice, Stream as AudioStream};

/// The device name that selects the host's default output.
const DEFAULT_DEVICE: &str = "default";

/// A small wrapper around a cpal::Device.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

/// An output stream held open on its own thread. cpal streams can't cross threads, so the
/// owning thread keeps the stream alive until it's told to stop.
struct OutputStream {
    device: String,
    stop_tx: Option<crossbeam_channel::Sender<()>>,
    output_thread: Option<thread::JoinHandle<()>>,
}

impl AudioStream for OutputStream {
    fn close(&mut self) {
        // Dropping the sender wakes the output thread.
        if self.stop_tx.take().is_none() {
            return;
        }
        if let Some(output_thread) = self.output_thread.take() {
            if output_thread.join().is_err() {
                error!(device = self.device, "Output thread panicked.");
            }
        }
        info!(device = self.device, "Output stream closed.");
    }
}

impl Drop for OutputStream {
    fn drop(&mut self) {
        self.close();
    }
}

/// Fills the buffer with silence. Rendering happens in the instrument backend; this stream
/// holds the device for the chain.
fn write_silence<T: cpal::SizedSample>(data: &mut [T], _: &cpal::OutputCallbackInfo) {
    for sample in data.iter_mut() {
        *sample = T::EQUILIBRIUM;
    }
}

fn build_stream(device: &cpal::Device) -> Result<cpal::Stream, Box<dyn Error>> {
    let supported = device.default_output_config()?;
    let sample_format = supported.sample_format();
    let config = supported.config();
    let err_fn = |err| error!("CPAL output stream error: {}", err);

    let stream = match sample_format {
        cpal::SampleFormat::F32 => {
            device.build_output_stream(&config, write_silence::<f32>, err_fn, None)?
        }
        cpal::SampleFormat::I16 => {
            device.build_output_stream(&config, write_silence::<i16>, err_fn, None)?
        }
        cpal::SampleFormat::I32 => {
            device.build_output_stream(&config, write_silence::<i32>, err_fn, None)?
        }
        cpal::SampleFormat::U16 => {
            device.build_output_stream(&config, write_silence::<u16>, err_fn, None)?
        }
        other => return Err(format!("unsupported sample format {}", other).into()),
    };
    stream.play()?;
    Ok(stream)
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn AudioDevice>>, Box<dyn Error>> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn AudioDevice> = Box::new(device);
                device
            })
            .collect())
    }

    fn from_cpal(host_id: cpal::HostId, device: cpal::Device) -> Option<Device> {
        let max_channels = device
            .supported_output_configs()
            .ok()?
            .map(|output_config| output_config.channels())
            .max()?;
        let name = device.name().ok()?;

        Some(Device {
            name,
            max_channels,
            host_id,
            device,
        })
    }

    /// Lists cpal devices that support output.
    fn list_cpal_devices() -> Result<Vec<Device>, Box<dyn Error>> {
        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            devices.extend(
                host_devices.filter_map(|device| Device::from_cpal(host_id, device)),
            );
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets the given cpal device. "default" selects the default host's default output.
    pub fn get(name: &str) -> Result<Device, Box<dyn Error>> {
        if name == DEFAULT_DEVICE {
            let host = cpal::default_host();
            return host
                .default_output_device()
                .and_then(|device| Device::from_cpal(host.id(), device))
                .ok_or_else(|| "no default output device available".into());
        }

        Device::list_cpal_devices()?
            .into_iter()
            .find(|device| device.name.trim() == name)
            .ok_or_else(|| format!("no device found with name {}", name).into())
    }
}

impl AudioDevice for Device {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> Result<Box<dyn AudioStream>, Box<dyn Error>> {
        let span = span!(Level::INFO, "open stream (cpal)");
        let _enter = span.enter();

        let device = self.device.clone();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);

        let output_thread = thread::spawn(move || {
            let stream = match build_stream(&device) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));

            // Returns once the sender is dropped.
            let _ = stop_rx.recv();
            drop(stream);
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!(device = self.name, "Output stream started.");
                Ok(Box::new(OutputStream {
                    device: self.name.clone(),
                    stop_tx: Some(stop_tx),
                    output_thread: Some(output_thread),
                }))
            }
            Ok(Err(e)) => {
                let _ = output_thread.join();
                Err(e.into())
            }
            Err(_) => Err("output thread exited before the stream opened".into()),
        }
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<std::sync::Arc<crate::audio::mock::Device>, Box<dyn Error>> {
        Err("not a mock device".into())
    }
}
