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
use std::{io, sync::Arc};

use tokio::{
    sync::mpsc::{self, Sender},
    task::JoinHandle,
};
use tracing::{error, info, span, Instrument, Level};

use super::Command;
use crate::midi::Device;

/// The number of raw MIDI messages buffered between the input thread and the conductor.
const MIDI_EVENT_BUFFER: usize = 64;

/// Forwards messages from an external MIDI source to the conductor.
pub struct Driver {
    midi_device: Arc<dyn Device>,
}

impl Driver {
    pub fn new(midi_device: Arc<dyn Device>) -> Arc<Self> {
        Arc::new(Driver { midi_device })
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, commands_tx: Sender<Command>) -> JoinHandle<Result<(), io::Error>> {
        let (midi_events_tx, mut midi_events_rx) = mpsc::channel::<Vec<u8>>(MIDI_EVENT_BUFFER);
        let device = self.midi_device.clone();

        tokio::spawn(
            async move {
                if let Err(e) = device.watch_events(midi_events_tx) {
                    error!(err = e.to_string(), "Error watching MIDI events");
                    return Err(io::Error::other(e.to_string()));
                }
                info!(device = device.name(), "MIDI driver started.");

                loop {
                    let raw_event = tokio::select! {
                        raw_event = midi_events_rx.recv() => match raw_event {
                            Some(raw_event) => raw_event,
                            None => {
                                info!("MIDI watcher closed.");
                                return Ok(());
                            }
                        },
                        _ = commands_tx.closed() => break,
                    };

                    if commands_tx.send(Command::Midi(raw_event)).await.is_err() {
                        break;
                    }
                }

                info!("Conductor closed, no longer watching MIDI.");
                device.stop_watch_events();
                Ok(())
            }
            .instrument(span!(Level::INFO, "MIDI driver")),
        )
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, sync::Arc, time::Duration};

    use midly::{live::LiveEvent, MidiMessage};

    use crate::{
        audio,
        conductor::{Command, Conductor},
        engine::Engine,
        graph::{build_graph, node::NodeKind},
        instrument::test::{Call, Instrument},
        midi,
        parameters::REVERB_MIX,
        resource::MemoryLoader,
        router::Router,
        testutil::eventually,
    };

    fn raw(message: MidiMessage) -> Result<Vec<u8>, Box<dyn Error>> {
        let mut buf: Vec<u8> = Vec::with_capacity(8);
        LiveEvent::Midi {
            channel: 0.into(),
            message,
        }
        .write(&mut buf)?;
        Ok(buf)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_midi_driver() -> Result<(), Box<dyn Error>> {
        let instrument = Arc::new(Instrument::get("mock-instrument"));
        let engine = Engine::new(
            build_graph(&NodeKind::DEFAULT_CHAIN)?,
            Arc::new(audio::test::Device::get("mock-device")),
            instrument.clone(),
            Arc::new(MemoryLoader::new(vec![])),
            "Instrument1",
        );
        instrument.reset();

        let midi_device = midi::get_device("mock-midi")?;
        let mock = midi_device.to_mock()?;
        let router = Router::new(crate::config::midi::controller_map(&[
            crate::config::ControllerMapping::new(91, REVERB_MIX),
        ])?);
        let conductor = Conductor::new(
            engine,
            router,
            Duration::from_secs(1),
            vec![super::Driver::new(midi_device)],
        );
        eventually(|| mock.is_watching(), "MIDI device never watched");

        mock.mock_event(&[1, 2, 3])?;
        mock.mock_event(&raw(MidiMessage::NoteOn {
            key: 62.into(),
            vel: 33.into(),
        })?)?;
        mock.mock_event(&raw(MidiMessage::Controller {
            controller: 74.into(),
            value: 5.into(),
        })?)?;
        mock.mock_event(&raw(MidiMessage::NoteOff {
            key: 62.into(),
            vel: 0.into(),
        })?)?;

        eventually(
            || instrument.calls().len() == 3,
            "Instrument never received MIDI events",
        );
        assert_eq!(
            instrument.calls(),
            vec![
                Call::StartNote {
                    pitch: 62,
                    velocity: 33
                },
                Call::Controller {
                    controller: 74,
                    value: 5
                },
                Call::StopNote { pitch: 62 },
            ]
        );

        conductor.sender().send(Command::Shutdown).await?;
        conductor.join().await?;
        eventually(|| !mock.is_watching(), "MIDI device never stopped watching");
        Ok(())
    }
}
