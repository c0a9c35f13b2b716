use std::fmt::Display;

use crate::error::{Error, Result};
use crate::keys::spelling_in_key;

/// Sharp-canonical pitch class names, indexed by pitch class (C = 0).
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Semitone offsets of the natural letters from C.
const LETTER_PITCH: [(char, u8); 7] = [
    ('C', 0),
    ('D', 2),
    ('E', 4),
    ('F', 5),
    ('G', 7),
    ('A', 9),
    ('B', 11),
];

/// A note name with an optional octave, e.g. `C`, `Eb`, `F#3`.
///
/// The name keeps whatever enharmonic spelling it was built with; use
/// [`Note::normalize`] for equality testing and [`note_for_display`] for
/// rendering, never the raw name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Note {
    pub name: String,
    pub octave: Option<i8>,
}

impl Note {
    /// Parse `[A-G][#b]?\d*`, e.g. "C", "Eb", "F#3".
    pub fn parse(s: &str) -> Result<Note> {
        let err = || Error::ParseNote(s.to_string());
        let mut chars = s.chars();
        let letter = chars.next().ok_or_else(err)?;
        if !('A'..='G').contains(&letter) {
            return Err(err());
        }
        let rest = chars.as_str();
        let (accidental, digits) = match rest.chars().next() {
            Some(c @ ('#' | 'b')) => (Some(c), &rest[1..]),
            _ => (None, rest),
        };
        let octave = if digits.is_empty() {
            None
        } else if digits.bytes().all(|b| b.is_ascii_digit()) {
            Some(digits.parse::<i8>().map_err(|_| err())?)
        } else {
            // no signs or stray characters; negative octaves only come
            // from from_midi
            return Err(err());
        };
        let mut name = letter.to_string();
        if let Some(a) = accidental {
            name.push(a);
        }
        Ok(Note { name, octave })
    }

    /// Pitch class 0..12 (C = 0). Tolerates unusual spellings like `Cb`.
    pub fn pitch_class(&self) -> u8 {
        pitch_class_of(&self.name).expect("note name was validated at construction")
    }

    /// Collapse the flat spellings onto their sharp equivalents. Idempotent;
    /// used for equality testing only, never for display.
    pub fn normalize(&self) -> Note {
        Note {
            name: NOTE_NAMES[self.pitch_class() as usize].to_string(),
            octave: self.octave,
        }
    }

    /// Enharmonic equality, ignoring octave unless asked not to.
    pub fn pitch_equals(&self, other: &Note, ignore_octave: bool) -> bool {
        self.pitch_class() == other.pitch_class()
            && (ignore_octave || self.octave == other.octave)
    }

    /// Move by `semitones`, carrying the octave when one is present.
    /// The result is sharp-spelled.
    pub fn transpose(&self, semitones: i32) -> Note {
        match self.octave {
            Some(octave) => {
                let midi = (octave as i32 + 1) * 12 + self.pitch_class() as i32 + semitones;
                Note::from_midi(midi)
            }
            None => {
                let pc = (self.pitch_class() as i32 + semitones).rem_euclid(12) as usize;
                Note {
                    name: NOTE_NAMES[pc].to_string(),
                    octave: None,
                }
            }
        }
    }

    /// Sharp-spelled note for a MIDI number (60 = C4).
    pub fn from_midi(midi: i32) -> Note {
        Note {
            name: NOTE_NAMES[midi.rem_euclid(12) as usize].to_string(),
            octave: Some((midi.div_euclid(12) - 1) as i8),
        }
    }
}

impl Display for Note {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.octave {
            Some(o) => write!(f, "{}{}", self.name, o),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Pitch class for a bare note name, if it is well-formed.
pub fn pitch_class_of(name: &str) -> Option<u8> {
    let mut chars = name.chars();
    let letter = chars.next()?;
    let base = LETTER_PITCH.iter().find(|(l, _)| *l == letter)?.1 as i32;
    let offset = match chars.next() {
        None => 0,
        Some('#') => 1,
        Some('b') => -1,
        Some(_) => return None,
    };
    if chars.next().is_some() {
        return None;
    }
    Some((base + offset).rem_euclid(12) as u8)
}

/// Do two note names (no octaves) refer to the same pitch class?
pub fn note_name_equals(a: &str, b: &str) -> bool {
    match (pitch_class_of(a), pitch_class_of(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Index of a note's letter in the diatonic sequence C D E F G A B.
pub fn letter_index(name: &str) -> Option<usize> {
    let letter = name.chars().next()?;
    LETTER_PITCH.iter().position(|(l, _)| *l == letter)
}

/// ASCII accidentals -> typographic accidentals, for labels.
pub fn display_accidentals(s: &str) -> String {
    s.replace('#', "♯").replace('b', "♭")
}

/// Inverse of [`display_accidentals`]; anything `note_for_display` produced
/// can be fed back through here and re-parsed.
pub fn untransform(s: &str) -> String {
    s.replace('♯', "#").replace('♭', "b")
}

/// Render a note name for display, using the official spelling of its pitch
/// class inside `key_name` when one is given (the same physical pitch is C♯
/// in one key and D♭ in another). Falls back to the input spelling.
pub fn note_for_display(name: &str, key_name: Option<&str>) -> String {
    let spelled = key_name
        .and_then(|key| {
            let pc = pitch_class_of(name)?;
            spelling_in_key(key, pc)
        })
        .unwrap_or_else(|| name.to_string());
    display_accidentals(&spelled)
}
