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
use std::path::{Path, PathBuf};

use config::{Config, File, FileFormat};
use serde::Deserialize;
use tracing::{info, span, Level};

/// Errors raised while loading an instrument resource.
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("instrument resource '{0}' not found")]
    NotFound(String),
    #[error("unable to load instrument resource '{id}': {reason}")]
    LoadFailed { id: String, reason: String },
}

/// A loaded instrument definition. Applying it to an instrument selects the bank and program.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct InstrumentPreset {
    /// A display name for the preset.
    name: String,
    /// The program number (0-127).
    program: u8,
    /// The bank number (0-16383), if the instrument uses banks.
    bank: Option<u16>,
}

impl InstrumentPreset {
    pub fn new(name: &str, program: u8, bank: Option<u16>) -> InstrumentPreset {
        InstrumentPreset {
            name: name.to_string(),
            program,
            bank,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn program(&self) -> u8 {
        self.program
    }

    pub fn bank(&self) -> Option<u16> {
        self.bank
    }

    fn validate(&self) -> Result<(), String> {
        if self.program > 127 {
            return Err(format!("program {} is out of range", self.program));
        }
        if let Some(bank) = self.bank {
            if bank > 16383 {
                return Err(format!("bank {} is out of range", bank));
            }
        }
        Ok(())
    }
}

/// Resolves resource identifiers into loaded instrument presets.
pub trait ResourceLoader: Send + Sync {
    fn load(&self, id: &str) -> Result<InstrumentPreset, ResourceError>;
}

/// Loads YAML presets from a directory on disk.
pub struct FileLoader {
    base_path: PathBuf,
}

impl FileLoader {
    pub fn new(base_path: &Path) -> FileLoader {
        FileLoader {
            base_path: base_path.to_path_buf(),
        }
    }

    /// Resolves the identifier to a file. Identifiers without an extension may omit ".yaml"
    /// or ".yml".
    fn resolve(&self, id: &str) -> Option<PathBuf> {
        let path = self.base_path.join(id);
        if path.is_file() {
            return Some(path);
        }
        if path.extension().is_some() {
            return None;
        }
        ["yaml", "yml"]
            .iter()
            .map(|ext| path.with_extension(ext))
            .find(|candidate| candidate.is_file())
    }
}

impl ResourceLoader for FileLoader {
    fn load(&self, id: &str) -> Result<InstrumentPreset, ResourceError> {
        let span = span!(Level::INFO, "load instrument");
        let _enter = span.enter();

        let path = self
            .resolve(id)
            .ok_or_else(|| ResourceError::NotFound(id.to_string()))?;

        let load_failed = |reason: String| ResourceError::LoadFailed {
            id: id.to_string(),
            reason,
        };

        let preset: InstrumentPreset = Config::builder()
            .add_source(File::from(path.as_path()).format(FileFormat::Yaml))
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(|e| load_failed(e.to_string()))?;
        preset.validate().map_err(load_failed)?;

        info!(
            id,
            path = ?path,
            name = preset.name(),
            program = preset.program(),
            "Loaded instrument preset."
        );

        Ok(preset)
    }
}

/// Serves presets from memory.
#[cfg(test)]
pub struct MemoryLoader {
    presets: std::collections::HashMap<String, InstrumentPreset>,
}

#[cfg(test)]
impl MemoryLoader {
    pub fn new(presets: Vec<(&str, InstrumentPreset)>) -> MemoryLoader {
        MemoryLoader {
            presets: presets
                .into_iter()
                .map(|(id, preset)| (id.to_string(), preset))
                .collect(),
        }
    }
}

#[cfg(test)]
impl ResourceLoader for MemoryLoader {
    fn load(&self, id: &str) -> Result<InstrumentPreset, ResourceError> {
        self.presets
            .get(id)
            .cloned()
            .ok_or_else(|| ResourceError::NotFound(id.to_string()))
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use super::*;

    fn write(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).expect("unable to write preset");
    }

    #[test]
    fn test_load_preset() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "Instrument1.yaml",
            "name: Grand Piano\nprogram: 0\nbank: 121\n",
        );
        let loader = FileLoader::new(dir.path());

        let preset = loader.load("Instrument1").unwrap();
        assert_eq!(preset, InstrumentPreset::new("Grand Piano", 0, Some(121)));
        assert_eq!(loader.load("Instrument1.yaml").unwrap(), preset);
    }

    #[test]
    fn test_load_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FileLoader::new(dir.path());

        assert!(matches!(
            loader.load("Missing"),
            Err(ResourceError::NotFound(id)) if id == "Missing"
        ));
    }

    #[test]
    fn test_load_failed() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "broken.yml", "name: [unterminated\n");
        write(dir.path(), "range.yaml", "name: Strings\nprogram: 200\n");
        let loader = FileLoader::new(dir.path());

        assert!(matches!(
            loader.load("broken"),
            Err(ResourceError::LoadFailed { .. })
        ));
        assert!(matches!(
            loader.load("range"),
            Err(ResourceError::LoadFailed { reason, .. }) if reason.contains("program 200")
        ));
    }
}
