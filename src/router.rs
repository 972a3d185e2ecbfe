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

//! Routes note and control events onto the instrument and the parameter surface.

use std::{collections::HashMap, sync::Arc};

use crossbeam_channel::{Receiver, Sender};
use midly::{live::LiveEvent, num::u7, MidiMessage};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::engine::Engine;

/// The velocity used for notes played on the virtual keyboard.
pub const VIRTUAL_KEYBOARD_VELOCITY: u8 = 127;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteKind {
    On,
    Off,
}

/// A note starting or stopping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoteEvent {
    pub pitch: u7,
    pub velocity: u7,
    pub kind: NoteKind,
}

impl NoteEvent {
    pub fn on(pitch: u7, velocity: u7) -> NoteEvent {
        NoteEvent {
            pitch,
            velocity,
            kind: NoteKind::On,
        }
    }

    pub fn off(pitch: u7) -> NoteEvent {
        NoteEvent {
            pitch,
            velocity: u7::new(0),
            kind: NoteKind::Off,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControlChangeEvent {
    pub controller: u7,
    pub value: u7,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgramChangeEvent {
    pub program: u7,
}

/// Where an event came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    VirtualKeyboard,
    Midi,
}

/// Published when a key's pressed state changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyChange {
    pub pitch: u8,
    pub pressed: bool,
}

/// The set of keys currently held on the external MIDI source, for display.
#[derive(Clone)]
pub struct KeyState {
    keys: Arc<RwLock<[bool; 128]>>,
    subscribers: Arc<Mutex<Vec<Sender<KeyChange>>>>,
}

impl KeyState {
    fn new() -> KeyState {
        KeyState {
            keys: Arc::new(RwLock::new([false; 128])),
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn is_pressed(&self, pitch: u7) -> bool {
        self.keys.read()[pitch.as_int() as usize]
    }

    /// Returns the pitches of every pressed key.
    pub fn pressed(&self) -> Vec<u8> {
        self.keys
            .read()
            .iter()
            .enumerate()
            .filter(|(_, pressed)| **pressed)
            .map(|(pitch, _)| pitch as u8)
            .collect()
    }

    /// Subscribes to key changes.
    pub fn subscribe(&self) -> Receiver<KeyChange> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    fn set(&self, pitch: u7, pressed: bool) {
        {
            let mut keys = self.keys.write();
            let key = &mut keys[pitch.as_int() as usize];
            if *key == pressed {
                return;
            }
            *key = pressed;
        }

        let change = KeyChange {
            pitch: pitch.as_int(),
            pressed,
        };
        self.subscribers
            .lock()
            .retain(|subscriber| subscriber.send(change).is_ok());
    }
}

pub struct Router {
    /// Controller number to parameter name.
    controllers: HashMap<u7, String>,
    key_state: KeyState,
}

impl Router {
    pub fn new(controllers: HashMap<u7, String>) -> Router {
        Router {
            controllers,
            key_state: KeyState::new(),
        }
    }

    pub fn key_state(&self) -> &KeyState {
        &self.key_state
    }

    /// Routes a note to the instrument. Notes from the virtual keyboard always play at full
    /// velocity. A MIDI note-on with zero velocity stops the note.
    pub fn route_note(&self, engine: &Engine, event: NoteEvent, source: Source) {
        let kind = match (event.kind, source) {
            (NoteKind::On, Source::Midi) if event.velocity.as_int() == 0 => NoteKind::Off,
            (kind, _) => kind,
        };

        let result = match kind {
            NoteKind::On => {
                let velocity = match source {
                    Source::VirtualKeyboard => u7::new(VIRTUAL_KEYBOARD_VELOCITY),
                    Source::Midi => event.velocity,
                };
                engine.instrument().start_note(event.pitch, velocity)
            }
            NoteKind::Off => engine.instrument().stop_note(event.pitch),
        };
        if let Err(e) = result {
            error!(
                pitch = event.pitch.as_int(),
                err = e.to_string(),
                "Unable to play note."
            );
        }

        if source == Source::Midi {
            self.key_state.set(event.pitch, kind == NoteKind::On);
        }
    }

    /// Routes a control change to the parameter it's mapped to. Unmapped controllers are
    /// ignored. The controller value is applied as-is and clamped by the parameter.
    pub fn route_control_change(&self, engine: &mut Engine, event: ControlChangeEvent) {
        let name = match self.controllers.get(&event.controller) {
            Some(name) => name,
            None => {
                debug!(
                    controller = event.controller.as_int(),
                    "Ignoring unmapped controller."
                );
                return;
            }
        };

        if let Err(e) = engine.set_parameter(name, event.value.as_int() as f32) {
            error!(
                controller = event.controller.as_int(),
                parameter = name,
                err = e.to_string(),
                "Unable to apply controller."
            );
        }
    }

    /// Program changes aren't applied, only logged.
    pub fn route_program_change(&self, event: ProgramChangeEvent) {
        info!(program = event.program.as_int(), "Received program change.");
    }

    /// Parses a raw MIDI message and routes it. Messages that can't be parsed are dropped.
    pub fn route_raw(&self, engine: &mut Engine, raw_event: &[u8]) {
        let event = match LiveEvent::parse(raw_event) {
            Ok(event) => event,
            Err(e) => {
                warn!(err = format!("{:?}", e), "Unable to parse MIDI event.");
                return;
            }
        };
        debug!(event = format!("{:?}", event), "Received MIDI event.");

        let message = match event {
            LiveEvent::Midi { message, .. } => message,
            _ => return,
        };

        match message {
            MidiMessage::NoteOn { key, vel } => {
                self.route_note(engine, NoteEvent::on(key, vel), Source::Midi)
            }
            MidiMessage::NoteOff { key, .. } => {
                self.route_note(engine, NoteEvent::off(key), Source::Midi)
            }
            MidiMessage::Controller { controller, value } => {
                self.route_control_change(engine, ControlChangeEvent { controller, value })
            }
            MidiMessage::ProgramChange { program } => {
                self.route_program_change(ProgramChangeEvent { program })
            }
            _ => {}
        }
    }
}
