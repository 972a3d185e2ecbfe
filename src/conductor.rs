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

//! The conductor is the single control task. Every event reaches the engine through it.

use std::{io, sync::Arc, time::Duration};

use tokio::{
    sync::mpsc::{self, Sender, WeakSender},
    task::{JoinError, JoinHandle},
};
use tracing::{debug, error, info, span, Instrument, Level};

use crate::{
    engine::Engine,
    router::{NoteEvent, Router, Source},
};

pub mod keyboard;
pub mod midi;

/// The number of commands that can be queued before senders wait.
const COMMAND_BUFFER: usize = 32;

/// Why the audio route changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteChangeReason {
    NewDeviceAvailable,
    OldDeviceUnavailable,
    Other,
}

/// Lifecycle notifications from the host environment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Notification {
    RouteChanged(RouteChangeReason),
    InterruptionBegan,
    InterruptionEnded { should_resume: bool },
    EnteredBackground,
    EnteredForeground,
}

/// Commands for the control task.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// A note from the virtual keyboard.
    Note(NoteEvent),
    /// A raw message from the external MIDI source.
    Midi(Vec<u8>),
    SetParameter { name: String, value: f32 },
    /// Logs every parameter and its current value.
    ListParameters,
    Start,
    Stop,
    Notify(Notification),
    /// Resumes the engine after an interruption. Sent by the conductor itself once the
    /// resume delay has passed.
    Resume,
    /// Tears the engine down and ends the control task.
    Shutdown,
}

/// Produces commands for the conductor.
pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, commands_tx: Sender<Command>) -> JoinHandle<Result<(), io::Error>>;
}

/// Runs the control task.
pub struct Conductor {
    commands_tx: Sender<Command>,
    handle: JoinHandle<()>,
}

impl Conductor {
    /// Starts the control task with the given drivers. The engine is started first; if the
    /// device is unavailable the error is logged and the task keeps running.
    pub fn new(
        engine: Engine,
        router: Router,
        resume_delay: Duration,
        drivers: Vec<Arc<dyn Driver>>,
    ) -> Conductor {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let driver_handles = drivers
            .iter()
            .map(|driver| driver.monitor_events(commands_tx.clone()))
            .collect();

        let control = Control {
            engine,
            router,
            resume_delay,
            resume_tx: commands_tx.downgrade(),
            pending_resume: None,
        };
        Conductor {
            commands_tx,
            handle: tokio::spawn(
                control
                    .run(commands_rx, driver_handles)
                    .instrument(span!(Level::INFO, "conductor")),
            ),
        }
    }

    /// Returns a sender for issuing commands.
    pub fn sender(&self) -> Sender<Command> {
        self.commands_tx.clone()
    }

    /// Waits for the control task to finish. It finishes on shutdown or once every driver
    /// and sender has gone away.
    pub async fn join(self) -> Result<(), JoinError> {
        drop(self.commands_tx);
        self.handle.await
    }
}

struct Control {
    engine: Engine,
    router: Router,
    resume_delay: Duration,
    /// Lets a scheduled resume reach the control task without keeping the channel open.
    resume_tx: WeakSender<Command>,
    pending_resume: Option<JoinHandle<()>>,
}

impl Control {
    async fn run(
        mut self,
        mut commands_rx: mpsc::Receiver<Command>,
        driver_handles: Vec<JoinHandle<Result<(), io::Error>>>,
    ) {
        if let Err(e) = self.engine.start() {
            error!(err = e.to_string(), "Unable to start engine.");
        }
        info!(graph = self.engine.graph().to_string(), "Conductor started.");

        while let Some(command) = commands_rx.recv().await {
            if command == Command::Shutdown {
                info!("Shutdown requested.");
                break;
            }
            self.handle(command);
        }

        self.cancel_resume();
        self.engine.teardown();

        // Drivers blocked on input can't be joined, so only the finished ones are reported.
        for driver_handle in driver_handles.into_iter().filter(JoinHandle::is_finished) {
            match driver_handle.await {
                Ok(Err(e)) => error!(err = e.to_string(), "Driver failed."),
                Err(e) => error!(err = e.to_string(), "Error waiting for driver."),
                Ok(Ok(())) => {}
            }
        }
        info!("Conductor closing.");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Note(event) => {
                self.router
                    .route_note(&self.engine, event, Source::VirtualKeyboard)
            }
            Command::Midi(raw_event) => self.router.route_raw(&mut self.engine, &raw_event),
            Command::SetParameter { name, value } => {
                match self.engine.set_parameter(&name, value) {
                    Ok(applied) => info!(parameter = name, value = applied, "Parameter updated."),
                    Err(e) => error!(err = e.to_string(), "Unable to set parameter."),
                }
            }
            Command::ListParameters => {
                for parameter in self.engine.parameters() {
                    info!(
                        parameter = parameter.name(),
                        value = parameter.value(),
                        min = parameter.min(),
                        max = parameter.max(),
                        "Parameter."
                    );
                }
            }
            Command::Start => {
                if let Err(e) = self.engine.start() {
                    error!(err = e.to_string(), "Unable to start engine.");
                }
            }
            Command::Stop => {
                self.cancel_resume();
                self.engine.stop();
            }
            Command::Notify(notification) => self.notify(notification),
            Command::Resume => {
                // A resume that was cancelled after its timer fired is dropped here.
                match self.pending_resume.take() {
                    Some(pending_resume) => pending_resume.abort(),
                    None => {
                        debug!("Ignoring cancelled resume.");
                        return;
                    }
                }
                if let Err(e) = self.engine.resume_after_interruption() {
                    error!(err = e.to_string(), "Unable to resume engine.");
                }
            }
            Command::Shutdown => {}
        }
    }

    fn notify(&mut self, notification: Notification) {
        info!(notification = format!("{:?}", notification), "Received notification.");

        match notification {
            Notification::InterruptionBegan | Notification::EnteredBackground => {
                self.cancel_resume();
                self.engine.interrupt();
            }
            Notification::InterruptionEnded { should_resume } => {
                if should_resume {
                    self.schedule_resume();
                }
            }
            Notification::RouteChanged(
                RouteChangeReason::NewDeviceAvailable | RouteChangeReason::OldDeviceUnavailable,
            ) => {
                self.engine.interrupt();
                self.schedule_resume();
            }
            Notification::RouteChanged(RouteChangeReason::Other) => {}
            Notification::EnteredForeground => {
                if !self.engine.is_running() {
                    if let Err(e) = self.engine.resume_after_interruption() {
                        error!(err = e.to_string(), "Unable to resume engine.");
                    }
                }
            }
        }
    }

    /// Schedules a single resume once the resume delay has passed. A newer request replaces
    /// one that hasn't fired yet.
    fn schedule_resume(&mut self) {
        self.cancel_resume();

        let resume_tx = self.resume_tx.clone();
        let resume_delay = self.resume_delay;
        self.pending_resume = Some(tokio::spawn(async move {
            tokio::time::sleep(resume_delay).await;
            if let Some(resume_tx) = resume_tx.upgrade() {
                let _ = resume_tx.send(Command::Resume).await;
            }
        }));
        info!(delay = ?resume_delay, "Resume scheduled.");
    }

    fn cancel_resume(&mut self) {
        if let Some(pending_resume) = self.pending_resume.take() {
            pending_resume.abort();
            info!("Scheduled resume cancelled.");
        }
    }
}
