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
use std::{
    error::Error,
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use tracing::info;

/// A mock device. Doesn't actually play anything.
#[derive(Clone)]
pub struct Device {
    name: String,
    /// True while a stream is open on the device.
    is_open: Arc<AtomicBool>,
    /// When set, opening the device fails as if the hardware were busy.
    unavailable: Arc<AtomicBool>,
    /// The number of times a stream has been opened.
    opened: Arc<AtomicUsize>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            is_open: Arc::new(AtomicBool::new(false)),
            unavailable: Arc::new(AtomicBool::new(false)),
            opened: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns true if a stream is currently open.
    #[cfg(test)]
    pub fn is_open(&self) -> bool {
        self.is_open.load(Ordering::Relaxed)
    }

    /// Returns the number of streams opened so far.
    #[cfg(test)]
    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::Relaxed)
    }

    /// Makes subsequent opens fail or succeed.
    #[cfg(test)]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }
}

struct Stream {
    name: String,
    is_open: Arc<AtomicBool>,
    closed: bool,
}

impl crate::audio::Stream for Stream {
    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.is_open.store(false, Ordering::Relaxed);
        info!(device = self.name, "Mock stream closed.");
    }
}

impl crate::audio::Device for Device {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> Result<Box<dyn crate::audio::Stream>, Box<dyn Error>> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(format!("{} is busy", self.name).into());
        }

        self.is_open.store(true, Ordering::Relaxed);
        self.opened.fetch_add(1, Ordering::Relaxed);
        info!(device = self.name, "Mock stream opened.");
        Ok(Box::new(Stream {
            name: self.name.clone(),
            is_open: self.is_open.clone(),
            closed: false,
        }))
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<Device>, Box<dyn Error>> {
        Ok(Arc::new(self.clone()))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}
