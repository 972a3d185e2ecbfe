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
use std::{io, ops::RangeInclusive};

use midly::num::u7;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use crate::router::{NoteEvent, VIRTUAL_KEYBOARD_VELOCITY};

use super::{Command, Notification, RouteChangeReason};

const ON: &str = "on";
const OFF: &str = "off";
const SET: &str = "set";
const PARAMS: &str = "params";
const START: &str = "start";
const STOP: &str = "stop";
const INTERRUPT: &str = "interrupt";
const RESUME: &str = "resume";
const BACKGROUND: &str = "background";
const FOREGROUND: &str = "foreground";
const ROUTE: &str = "route";
const QUIT: &str = "quit";

/// The virtual keyboard. Reads commands from a terminal.
pub struct Driver {
    /// The pitches the keyboard has keys for.
    keys: RangeInclusive<u8>,
}

impl Driver {
    pub fn new(keys: RangeInclusive<u8>) -> Driver {
        Driver { keys }
    }

    /// Parses a line of input. Returns None for blank lines.
    fn parse(keys: &RangeInclusive<u8>, input: &str) -> Result<Option<Command>, String> {
        let mut words = input.split_whitespace();
        let command = match words.next() {
            Some(command) => command.to_lowercase(),
            None => return Ok(None),
        };
        let args: Vec<&str> = words.collect();

        let command = match (command.as_str(), args.as_slice()) {
            (ON, [pitch]) => Command::Note(NoteEvent::on(
                Self::parse_key(keys, pitch)?,
                u7::new(VIRTUAL_KEYBOARD_VELOCITY),
            )),
            (OFF, [pitch]) => Command::Note(NoteEvent::off(Self::parse_key(keys, pitch)?)),
            (SET, [name, value]) => Command::SetParameter {
                name: name.to_string(),
                value: value
                    .parse::<f32>()
                    .map_err(|e| format!("invalid value '{}': {}", value, e))?,
            },
            (PARAMS, []) => Command::ListParameters,
            (START, []) => Command::Start,
            (STOP, []) => Command::Stop,
            (INTERRUPT, []) => Command::Notify(Notification::InterruptionBegan),
            (RESUME, []) => Command::Notify(Notification::InterruptionEnded {
                should_resume: true,
            }),
            (BACKGROUND, []) => Command::Notify(Notification::EnteredBackground),
            (FOREGROUND, []) => Command::Notify(Notification::EnteredForeground),
            (ROUTE, []) => Command::Notify(Notification::RouteChanged(
                RouteChangeReason::NewDeviceAvailable,
            )),
            (QUIT, []) => Command::Shutdown,
            _ => return Err(format!("unrecognized command '{}'", input.trim())),
        };
        Ok(Some(command))
    }

    fn parse_key(keys: &RangeInclusive<u8>, pitch: &str) -> Result<u7, String> {
        let pitch: u8 = pitch
            .parse()
            .map_err(|_| format!("invalid pitch '{}'", pitch))?;
        if !keys.contains(&pitch) {
            return Err(format!(
                "pitch {} is not on the keyboard ({}-{})",
                pitch,
                keys.start(),
                keys.end()
            ));
        }
        u7::try_from(pitch).ok_or_else(|| format!("invalid pitch {}", pitch))
    }

    /// Reads one command and sends it on. Returns false once input is exhausted or the user
    /// quits.
    fn monitor_io<R, W>(
        commands_tx: &Sender<Command>,
        keys: &RangeInclusive<u8>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Command ({} <pitch>, {} <pitch>, {} <parameter> <value>, {}, {}, {}, {}, {}, {}, {}, {}, {}): ",
            ON, OFF, SET, PARAMS, START, STOP, INTERRUPT, RESUME, BACKGROUND, FOREGROUND, ROUTE, QUIT,
        )?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }

        let command = match Self::parse(keys, &input) {
            Ok(Some(command)) => command,
            Ok(None) => return Ok(true),
            Err(e) => {
                warn!(input = input.trim(), err = e, "Unrecognized input");
                return Ok(true);
            }
        };

        let quit = command == Command::Shutdown;
        commands_tx.blocking_send(command).map_err(io::Error::other)?;
        Ok(!quit)
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, commands_tx: Sender<Command>) -> JoinHandle<Result<(), io::Error>> {
        let keys = self.keys.clone();
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!(
                first = keys.start(),
                last = keys.end(),
                "Keyboard driver started."
            );

            while Self::monitor_io(&commands_tx, &keys, io::stdin().lock(), io::stdout())? {}

            info!("Keyboard driver stopped.");
            Ok(())
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, BufReader, BufWriter};

    use tokio::sync::mpsc;

    use crate::parameters::GAIN;

    use super::*;

    fn get_command(input: &str) -> Result<(bool, Option<Command>), io::Error> {
        let (sender, mut receiver) = mpsc::channel::<Command>(1);

        let reader = BufReader::new(input.as_bytes());
        let writer = BufWriter::new(Vec::new());
        let more = Driver::monitor_io(&sender, &(48..=72), reader, writer)?;

        // Force the sender to close.
        drop(sender);
        Ok((more, receiver.blocking_recv()))
    }

    fn command(input: &str) -> Option<Command> {
        get_command(input).unwrap().1
    }

    #[test]
    fn test_note_commands() {
        assert_eq!(
            command("on 60\n"),
            Some(Command::Note(NoteEvent::on(u7::new(60), u7::new(127))))
        );
        assert_eq!(
            command("OFF 72\n"),
            Some(Command::Note(NoteEvent::off(u7::new(72))))
        );
        // Outside the keyboard.
        assert_eq!(command("on 47\n"), None);
        assert_eq!(command("on 73\n"), None);
        assert_eq!(command("on C4\n"), None);
        assert_eq!(command("on\n"), None);
    }

    #[test]
    fn test_parameter_commands() {
        assert_eq!(
            command("set gain -3.5\n"),
            Some(Command::SetParameter {
                name: GAIN.to_string(),
                value: -3.5
            })
        );
        assert_eq!(command("set gain loud\n"), None);
        assert_eq!(command("params\n"), Some(Command::ListParameters));
    }

    #[test]
    fn test_lifecycle_commands() {
        assert_eq!(command("start\n"), Some(Command::Start));
        assert_eq!(command("stop\n"), Some(Command::Stop));
        assert_eq!(
            command("interrupt\n"),
            Some(Command::Notify(Notification::InterruptionBegan))
        );
        assert_eq!(
            command("resume\n"),
            Some(Command::Notify(Notification::InterruptionEnded {
                should_resume: true
            }))
        );
        assert_eq!(
            command("background\n"),
            Some(Command::Notify(Notification::EnteredBackground))
        );
        assert_eq!(
            command("foreground\n"),
            Some(Command::Notify(Notification::EnteredForeground))
        );
        assert_eq!(
            command("route\n"),
            Some(Command::Notify(Notification::RouteChanged(
                RouteChangeReason::NewDeviceAvailable
            )))
        );
        assert_eq!(command("unrecognized\n"), None);
    }

    #[test]
    fn test_quit_and_end_of_input() -> Result<(), io::Error> {
        assert_eq!(get_command("quit\n")?, (false, Some(Command::Shutdown)));
        assert_eq!(get_command("")?, (false, None));
        assert_eq!(get_command("\n")?, (true, None));
        assert_eq!(get_command("start\n")?, (true, Some(Command::Start)));
        Ok(())
    }
}
