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
use std::ops::RangeInclusive;

use serde::Deserialize;

const DEFAULT_FIRST_OCTAVE: u8 = 2;
const DEFAULT_OCTAVE_COUNT: u8 = 2;

/// The lowest pitch of octave zero on the virtual keyboard.
const OCTAVE_ZERO_PITCH: u8 = 24;

/// A YAML representation of the virtual keyboard layout.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Keyboard {
    /// The first octave shown on the keyboard.
    first_octave: Option<u8>,

    /// How many octaves the keyboard spans.
    octave_count: Option<u8>,
}

impl Keyboard {
    pub fn new(first_octave: u8, octave_count: u8) -> Keyboard {
        Keyboard {
            first_octave: Some(first_octave),
            octave_count: Some(octave_count),
        }
    }

    pub fn first_octave(&self) -> u8 {
        self.first_octave.unwrap_or(DEFAULT_FIRST_OCTAVE)
    }

    pub fn octave_count(&self) -> u8 {
        self.octave_count.unwrap_or(DEFAULT_OCTAVE_COUNT)
    }

    /// Returns the pitches playable on the keyboard. The range includes the top C.
    pub fn pitch_range(&self) -> Result<RangeInclusive<u8>, String> {
        let low = u32::from(self.first_octave()) * 12 + u32::from(OCTAVE_ZERO_PITCH);
        let high = low + u32::from(self.octave_count()) * 12;
        if high > 127 {
            return Err(format!(
                "keyboard starting at octave {} with {} octaves exceeds the MIDI pitch range",
                self.first_octave(),
                self.octave_count()
            ));
        }
        Ok(low as u8..=high as u8)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_pitch_range() {
        assert_eq!(Keyboard::default().pitch_range(), Ok(48..=72));
    }

    #[test]
    fn test_pitch_range() {
        assert_eq!(Keyboard::new(0, 1).pitch_range(), Ok(24..=36));
        assert_eq!(Keyboard::new(3, 4).pitch_range(), Ok(60..=108));
        assert!(Keyboard::new(8, 2).pitch_range().is_err());
    }
}
