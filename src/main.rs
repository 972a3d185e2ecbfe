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
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use clap::{crate_version, Parser, Subcommand};
use crossbeam_channel::{select, Receiver};
use tracing::info;

use samplechain::conductor::{self, Conductor, Driver};
use samplechain::config::{self, Sampler};
use samplechain::engine::Engine;
use samplechain::parameters::ParameterChange;
use samplechain::router::{KeyChange, Router};
use samplechain::{audio, graph, midi};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A sampler keyboard engine."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Lists the available MIDI input/output devices.
    MidiDevices {},
    /// Builds and prints the processing graph described by the given config.
    Graph {
        /// The path to the sampler config.
        config_path: String,
    },
    /// Start will start the sampler.
    Start {
        /// The path to the sampler config.
        config_path: String,
    },
}

/// Logs parameter and key changes until both channels close.
fn watch_changes(parameters: Receiver<ParameterChange>, keys: Receiver<KeyChange>) {
    let mut parameters = Some(parameters);
    let mut keys = Some(keys);
    while parameters.is_some() || keys.is_some() {
        // A closed channel is swapped for one that never fires.
        let parameters_rx = parameters.clone().unwrap_or_else(crossbeam_channel::never);
        let keys_rx = keys.clone().unwrap_or_else(crossbeam_channel::never);
        select! {
            recv(parameters_rx) -> change => match change {
                Ok(change) => info!(
                    parameter = change.name,
                    value = change.value,
                    "Parameter changed."
                ),
                Err(_) => parameters = None,
            },
            recv(keys_rx) -> change => match change {
                Ok(change) => info!(pitch = change.pitch, pressed = change.pressed, "Key changed."),
                Err(_) => keys = None,
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::MidiDevices {} => {
            let devices = midi::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Graph { config_path } => {
            let sampler = Sampler::load(&PathBuf::from(config_path))?;
            let graph =
                graph::build_graph_with_parameters(&sampler.chain(), sampler.parameters()?)?;

            println!("Chain: {}", graph);
            println!("\nNodes:");
            for node in graph.nodes() {
                println!("- {} {}", node.id(), node.kind());
            }
            println!("\nParameters:");
            for parameter in graph.parameters() {
                let binding = parameter.binding();
                println!(
                    "- {} = {} ({} to {}) -> {}.{}",
                    parameter.name(),
                    parameter.value(),
                    parameter.min(),
                    parameter.max(),
                    binding.node,
                    binding.property
                );
            }
        }
        Commands::Start { config_path } => {
            let sampler = Sampler::load(&PathBuf::from(config_path))?;
            let mut engine = Engine::from_config(&sampler)?;

            let keyboard = conductor::keyboard::Driver::new(sampler.keyboard().pitch_range()?);
            let mut drivers: Vec<Arc<dyn Driver>> = vec![Arc::new(keyboard)];
            let controllers = match sampler.midi() {
                Some(midi_config) => {
                    let midi_device = midi::get_device(midi_config.device())?;
                    info!(device = midi_device.to_string(), "Using MIDI input.");
                    drivers.push(conductor::midi::Driver::new(midi_device));
                    config::midi::controller_map(midi_config.controllers())?
                }
                None => config::midi::controller_map(&[])?,
            };
            let router = Router::new(controllers);

            let parameter_changes = engine.subscribe();
            let key_changes = router.key_state().subscribe();
            thread::spawn(move || watch_changes(parameter_changes, key_changes));

            Conductor::new(engine, router, sampler.audio().resume_delay()?, drivers)
                .join()
                .await?;
        }
    }

    Ok(())
}
