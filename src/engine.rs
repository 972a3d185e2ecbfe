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

//! The engine owns the graph and drives the output lifecycle.

use std::{error::Error, fmt, sync::Arc};

use crossbeam_channel::Receiver;
use midly::num::u7;
use tracing::{error, info, span, warn, Level};

use crate::{
    audio,
    config,
    graph::{
        self,
        node::{NodeKind, Property},
        Graph,
    },
    instrument::{self, Instrument},
    parameters::{ParamError, Parameter, ParameterChange},
    resource::{FileLoader, ResourceLoader},
};

/// Errors raised by lifecycle operations.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("the engine has been torn down")]
    TornDown,
}

/// Where the engine is in its lifecycle. An engine only exists once its graph is built, so
/// the first state is Built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Built,
    Running,
    Stopped,
    TornDown,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            EngineState::Built => "built",
            EngineState::Running => "running",
            EngineState::Stopped => "stopped",
            EngineState::TornDown => "torn down",
        };
        write!(f, "{}", state)
    }
}

pub struct Engine {
    state: EngineState,
    graph: Graph,
    device: Arc<dyn audio::Device>,
    stream: Option<Box<dyn audio::Stream>>,
    instrument: Arc<dyn Instrument>,
    loader: Arc<dyn ResourceLoader>,
    /// The identifier of the instrument preset.
    preset: String,
    /// Set when the instrument binding was lost and the preset must be loaded again.
    preset_invalidated: bool,
}

impl Engine {
    /// Creates a new engine around an already built graph. The instrument preset is loaded
    /// and the instrument receives the current values of its parameters. Load failures are
    /// logged and aren't fatal.
    pub fn new(
        graph: Graph,
        device: Arc<dyn audio::Device>,
        instrument: Arc<dyn Instrument>,
        loader: Arc<dyn ResourceLoader>,
        preset: &str,
    ) -> Engine {
        let mut engine = Engine {
            state: EngineState::Built,
            graph,
            device,
            stream: None,
            instrument,
            loader,
            preset: preset.to_string(),
            preset_invalidated: false,
        };

        engine.load_preset();
        let initial: Vec<(NodeKind, Property, f32)> = engine
            .graph
            .parameters()
            .iter()
            .map(|parameter| {
                let binding = parameter.binding();
                (binding.node, binding.property, parameter.value())
            })
            .collect();
        for (node, property, value) in initial {
            engine.forward_to_instrument(node, property, value);
        }

        info!(
            graph = engine.graph.to_string(),
            device = engine.device.name(),
            instrument = engine.instrument.to_string(),
            "Engine built."
        );
        engine
    }

    /// Creates a new engine from the sampler configuration.
    pub fn from_config(config: &config::Sampler) -> Result<Engine, Box<dyn Error>> {
        let graph = graph::build_graph_with_parameters(&config.chain(), config.parameters()?)?;
        let device = audio::get_device(config.audio())?;
        let instrument = instrument::get_instrument(config.instrument())?;
        let loader = Arc::new(FileLoader::new(&config.instrument().preset_path()));

        Ok(Engine::new(
            graph,
            device,
            instrument,
            loader,
            config.instrument().preset(),
        ))
    }

    /// Starts the output stream. Starting a running engine does nothing.
    pub fn start(&mut self) -> Result<(), EngineError> {
        let span = span!(Level::INFO, "start engine");
        let _enter = span.enter();

        match self.state {
            EngineState::TornDown => return Err(EngineError::TornDown),
            EngineState::Running => return Ok(()),
            EngineState::Built | EngineState::Stopped => {}
        }

        let stream = self
            .device
            .open()
            .map_err(|e| EngineError::DeviceUnavailable(e.to_string()))?;
        self.stream = Some(stream);
        self.state = EngineState::Running;
        info!(device = self.device.name(), "Engine started.");
        Ok(())
    }

    /// Stops the output stream. Always succeeds and leaves parameters untouched. A built
    /// engine that never started moves straight to Stopped. A torn down engine stays torn down.
    pub fn stop(&mut self) {
        match self.state {
            EngineState::TornDown | EngineState::Stopped => return,
            EngineState::Built => {}
            EngineState::Running => self.close_stream(),
        }

        self.state = EngineState::Stopped;
        info!("Engine stopped.");
    }

    /// Stops the engine because the device or instrument binding was lost. The preset is
    /// loaded again before the engine next resumes.
    pub fn interrupt(&mut self) {
        if self.state == EngineState::TornDown {
            return;
        }

        self.stop();
        self.preset_invalidated = true;
        info!("Engine interrupted.");
    }

    /// Reloads the instrument preset if the binding was invalidated, then starts the engine.
    pub fn resume_after_interruption(&mut self) -> Result<(), EngineError> {
        let span = span!(Level::INFO, "resume engine");
        let _enter = span.enter();

        if self.state == EngineState::TornDown {
            return Err(EngineError::TornDown);
        }

        if self.preset_invalidated {
            self.load_preset();
        }
        self.start()
    }

    /// Closes the stream for good. Every later lifecycle operation fails.
    pub fn teardown(&mut self) {
        if self.state == EngineState::TornDown {
            return;
        }

        self.close_stream();
        self.state = EngineState::TornDown;
        info!("Engine torn down.");
    }

    /// Sets a parameter. The clamped value is written to the bound node and, for instrument
    /// properties, forwarded to the instrument.
    pub fn set_parameter(&mut self, name: &str, value: f32) -> Result<f32, ParamError> {
        let change = self.graph.set_parameter(name, value)?;
        self.forward_to_instrument(change.binding.node, change.binding.property, change.value);
        Ok(change.value)
    }

    pub fn get_parameter(&self, name: &str) -> Result<f32, ParamError> {
        self.graph.get_parameter(name)
    }

    pub fn parameters(&self) -> &[Parameter] {
        self.graph.parameters()
    }

    /// Subscribes to parameter changes.
    pub fn subscribe(&mut self) -> Receiver<ParameterChange> {
        self.graph.subscribe()
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn instrument(&self) -> &Arc<dyn Instrument> {
        &self.instrument
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == EngineState::Running
    }

    fn load_preset(&mut self) {
        let preset = match self.loader.load(&self.preset) {
            Ok(preset) => preset,
            Err(e) => {
                error!(preset = self.preset, err = e.to_string(), "Unable to load preset.");
                return;
            }
        };

        match self.instrument.load_preset(&preset) {
            Ok(()) => {
                self.preset_invalidated = false;
                info!(preset = preset.name(), "Preset loaded.");
            }
            Err(e) => error!(
                preset = preset.name(),
                err = e.to_string(),
                "Unable to apply preset."
            ),
        }
    }

    fn forward_to_instrument(&self, node: NodeKind, property: Property, value: f32) {
        if node != NodeKind::Instrument {
            return;
        }

        let result = match property {
            Property::LowPassCutoff => self.instrument.send_controller(
                u7::new(instrument::LOW_PASS_CUTOFF_CONTROLLER),
                u7::new(value.round().clamp(0.0, 127.0) as u8),
            ),
            Property::OverallGain => self.instrument.set_gain(value),
            _ => {
                warn!(property = property.to_string(), "Instrument has no such property.");
                Ok(())
            }
        };

        if let Err(e) = result {
            error!(
                property = property.to_string(),
                value,
                err = e.to_string(),
                "Unable to update instrument."
            );
        }
    }

    fn close_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.close();
        }
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use crate::{
        audio,
        graph::{build_graph, node::NodeKind},
        instrument::test::{Call, Instrument as MockInstrument},
        parameters::{DELAY_MIX, GAIN, LOW_PASS_CUTOFF, REVERB_MIX},
        resource::{InstrumentPreset, MemoryLoader},
    };

    use super::*;

    type Fixture = (Engine, Arc<audio::test::Device>, Arc<MockInstrument>);

    fn engine() -> Result<Fixture, Box<dyn Error>> {
        let device: Arc<dyn audio::Device> = Arc::new(audio::test::Device::get("mock-device"));
        let instrument: Arc<dyn crate::instrument::Instrument> =
            Arc::new(MockInstrument::get("mock-instrument"));
        let loader = Arc::new(MemoryLoader::new(vec![(
            "Instrument1",
            InstrumentPreset::new("Piano", 0, None),
        )]));
        let engine = Engine::new(
            build_graph(&NodeKind::DEFAULT_CHAIN)?,
            device.clone(),
            instrument.clone(),
            loader,
            "Instrument1",
        );
        Ok((engine, device.to_mock()?, instrument.to_mock()?))
    }

    #[test]
    fn test_build_loads_preset_and_parameters() -> Result<(), Box<dyn Error>> {
        let (engine, device, instrument) = engine()?;

        assert_eq!(engine.state(), EngineState::Built);
        assert!(!device.is_open());
        assert_eq!(
            instrument.calls(),
            vec![
                Call::LoadPreset("Piano".to_string()),
                Call::Controller {
                    controller: 74,
                    value: 127
                },
                Call::Gain(0.0),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_missing_preset_is_not_fatal() -> Result<(), Box<dyn Error>> {
        let device: Arc<dyn audio::Device> = Arc::new(audio::test::Device::get("mock-device"));
        let instrument = Arc::new(MockInstrument::get("mock-instrument"));
        let mut engine = Engine::new(
            build_graph(&NodeKind::DEFAULT_CHAIN)?,
            device,
            instrument.clone(),
            Arc::new(MemoryLoader::new(vec![])),
            "Missing",
        );

        assert!(!instrument
            .calls()
            .iter()
            .any(|call| matches!(call, Call::LoadPreset(_))));
        assert_eq!(engine.start(), Ok(()));
        Ok(())
    }

    #[test]
    fn test_start_stop() -> Result<(), Box<dyn Error>> {
        let (mut engine, device, _) = engine()?;

        engine.start()?;
        assert!(engine.is_running());
        assert!(device.is_open());

        // Starting again does nothing.
        engine.start()?;
        assert_eq!(device.open_count(), 1);

        engine.stop();
        assert_eq!(engine.state(), EngineState::Stopped);
        assert!(!device.is_open());

        // Stopping again is harmless.
        engine.stop();
        assert_eq!(engine.state(), EngineState::Stopped);

        engine.start()?;
        assert!(device.is_open());
        assert_eq!(device.open_count(), 2);
        Ok(())
    }

    #[test]
    fn test_stop_before_start() -> Result<(), Box<dyn Error>> {
        let (mut engine, device, _) = engine()?;

        engine.stop();
        assert_eq!(engine.state(), EngineState::Stopped);
        assert!(!device.is_open());
        assert_eq!(device.open_count(), 0);

        engine.start()?;
        assert!(engine.is_running());

        engine.teardown();
        engine.stop();
        assert_eq!(engine.state(), EngineState::TornDown);
        Ok(())
    }

    #[test]
    fn test_stop_start_keeps_parameters() -> Result<(), Box<dyn Error>> {
        let (mut engine, _, _) = engine()?;
        engine.start()?;
        engine.set_parameter(REVERB_MIX, 80.0)?;
        engine.set_parameter(DELAY_MIX, 35.0)?;

        engine.stop();
        engine.start()?;

        assert_eq!(engine.get_parameter(REVERB_MIX)?, 80.0);
        assert_eq!(engine.get_parameter(DELAY_MIX)?, 35.0);
        Ok(())
    }

    #[test]
    fn test_start_device_unavailable() -> Result<(), Box<dyn Error>> {
        let (mut engine, device, _) = engine()?;
        device.set_unavailable(true);

        assert!(matches!(
            engine.start(),
            Err(EngineError::DeviceUnavailable(_))
        ));
        assert_eq!(engine.state(), EngineState::Built);

        device.set_unavailable(false);
        engine.start()?;
        assert!(engine.is_running());
        Ok(())
    }

    #[test]
    fn test_resume_after_interruption_reloads_preset() -> Result<(), Box<dyn Error>> {
        let (mut engine, device, instrument) = engine()?;
        engine.start()?;
        instrument.reset();

        engine.interrupt();
        assert_eq!(engine.state(), EngineState::Stopped);
        assert!(!device.is_open());

        engine.resume_after_interruption()?;
        assert!(engine.is_running());
        assert_eq!(device.open_count(), 2);
        assert_eq!(instrument.calls(), vec![Call::LoadPreset("Piano".to_string())]);

        // Without another interruption the preset stays loaded.
        engine.stop();
        instrument.reset();
        engine.resume_after_interruption()?;
        assert!(instrument.calls().is_empty());
        Ok(())
    }

    #[test]
    fn test_resume_device_unavailable() -> Result<(), Box<dyn Error>> {
        let (mut engine, device, _) = engine()?;
        engine.start()?;
        engine.interrupt();
        device.set_unavailable(true);

        assert!(matches!(
            engine.resume_after_interruption(),
            Err(EngineError::DeviceUnavailable(_))
        ));
        assert_eq!(engine.state(), EngineState::Stopped);
        Ok(())
    }

    #[test]
    fn test_teardown() -> Result<(), Box<dyn Error>> {
        let (mut engine, device, _) = engine()?;
        engine.start()?;

        engine.teardown();
        assert_eq!(engine.state(), EngineState::TornDown);
        assert!(!device.is_open());

        assert_eq!(engine.start(), Err(EngineError::TornDown));
        assert_eq!(
            engine.resume_after_interruption(),
            Err(EngineError::TornDown)
        );
        engine.stop();
        assert_eq!(engine.state(), EngineState::TornDown);
        Ok(())
    }

    #[test]
    fn test_instrument_parameters_forwarded() -> Result<(), Box<dyn Error>> {
        let (mut engine, _, instrument) = engine()?;
        instrument.reset();

        assert_eq!(engine.set_parameter(LOW_PASS_CUTOFF, 99.6)?, 99.6);
        assert_eq!(engine.set_parameter(GAIN, 20.0)?, 12.0);
        engine.set_parameter(REVERB_MIX, 10.0)?;

        assert_eq!(
            instrument.calls(),
            vec![
                Call::Controller {
                    controller: 74,
                    value: 100
                },
                Call::Gain(12.0),
            ]
        );
        assert_eq!(
            engine
                .graph()
                .find(NodeKind::Instrument)
                .and_then(|node| node.property(Property::LowPassCutoff)),
            Some(99.6)
        );
        Ok(())
    }
}
