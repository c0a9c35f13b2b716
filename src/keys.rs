use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;
use strum_macros::{Display, EnumString};

use crate::catalogue::{all_known_chords, notes_of};
use crate::chord::ExplodedChord;
use crate::note::{pitch_class_of, Note};
use crate::triads::triad_notes;

/// The 12 major scales with their conventional spellings, in circle-of-fifths
/// order. This order is load-bearing: it fixes the tie-break order of
/// [`keys_containing_chord`] results and therefore every "pick the first /
/// a random compatible key" decision downstream.
pub const MAJOR_SCALES: [[&str; 7]; 12] = [
    ["C", "D", "E", "F", "G", "A", "B"],
    ["G", "A", "B", "C", "D", "E", "F#"],
    ["D", "E", "F#", "G", "A", "B", "C#"],
    ["A", "B", "C#", "D", "E", "F#", "G#"],
    ["E", "F#", "G#", "A", "B", "C#", "D#"],
    ["B", "C#", "D#", "E", "F#", "G#", "A#"],
    ["Gb", "Ab", "Bb", "Cb", "Db", "Eb", "F"],
    ["Db", "Eb", "F", "Gb", "Ab", "Bb", "C"],
    ["Ab", "Bb", "C", "Db", "Eb", "F", "G"],
    ["Eb", "F", "G", "Ab", "Bb", "C", "D"],
    ["Bb", "C", "D", "Eb", "F", "G", "A"],
    ["F", "G", "A", "Bb", "C", "D", "E"],
];

/// The seven diatonic modes, by ascending degree of the parent major scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Mode {
    Major,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Minor,
    Locrian,
}

pub const MODES_BY_DEGREE: [Mode; 7] = [
    Mode::Major,
    Mode::Dorian,
    Mode::Phrygian,
    Mode::Lydian,
    Mode::Mixolydian,
    Mode::Minor,
    Mode::Locrian,
];

/// Modes we never offer when generating, unless a caller asks for them.
pub const DEFAULT_RESTRICTED_MODES: [Mode; 1] = [Mode::Locrian];

/// A key's display name, e.g. "C major" or "F# dorian".
pub type ScaleName = String;

/// The 7 spelled notes of a named key, tonic first, or `None` for a name the
/// engine does not recognize. The tonic is matched by pitch class, so
/// "C# major" resolves to the Db-major spelling.
pub fn scale_notes(key_name: &str) -> Option<[&'static str; 7]> {
    let (tonic, mode_name) = key_name.split_once(' ')?;
    let mode = Mode::from_str(mode_name).ok()?;
    let degree = mode as usize;
    let tonic_pc = pitch_class_of(tonic)?;
    MAJOR_SCALES.iter().find_map(|scale| {
        if pitch_class_of(scale[degree]) != Some(tonic_pc) {
            return None;
        }
        let mut rotated = [""; 7];
        for (i, slot) in rotated.iter_mut().enumerate() {
            *slot = scale[(degree + i) % 7];
        }
        Some(rotated)
    })
}

/// The official spelling of a pitch class inside a key, when it is diatonic.
pub fn spelling_in_key(key_name: &str, pitch_class: u8) -> Option<String> {
    scale_notes(key_name)?
        .iter()
        .find(|name| pitch_class_of(name) == Some(pitch_class))
        .map(|name| name.to_string())
}

fn scale_mask(scale: &[&str]) -> u16 {
    scale
        .iter()
        .filter_map(|name| pitch_class_of(name))
        .fold(0u16, |mask, pc| mask | 1 << pc)
}

fn in_mask(mask: u16, pc: u8) -> bool {
    mask & (1 << pc) != 0
}

/// A candidate chord annotated with the pitch-class distances (from its
/// root) of each sounded note that falls outside the reference scale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChordAndAccidentals {
    pub chord: ExplodedChord,
    pub accidental_degrees: Vec<u8>,
}

lazy_static! {
    // keyed structurally (scale bitmask + tolerance) so equivalent but
    // freshly-built scale slices share an entry; concurrent recomputation
    // of the same key writes identical content
    static ref MATCHING_CACHE: Mutex<HashMap<(u16, Option<u8>), Arc<Vec<ChordAndAccidentals>>>> =
        Mutex::new(HashMap::new());
}

/// Every catalogued chord that fits a scale, with its accidentals annotated.
///
/// A chord is kept when its bass note is in scale (for slash chords the
/// second-lowest note stands in, since the lowest is the explicit bass) and
/// its out-of-scale note count is within `max_accidentals` (unlimited when
/// `None`). This walks the whole catalogue, so results are memoized per
/// distinct scale note-set.
pub fn chords_matching_scale(
    scale: &[&str],
    max_accidentals: Option<u8>,
) -> Arc<Vec<ChordAndAccidentals>> {
    let mask = scale_mask(scale);
    if let Some(hit) = MATCHING_CACHE
        .lock()
        .expect("matching cache poisoned")
        .get(&(mask, max_accidentals))
    {
        return Arc::clone(hit);
    }

    let mut matching = Vec::new();
    for chord in all_known_chords() {
        let notes = match notes_of(chord, 0) {
            Ok(notes) => notes,
            Err(_) => continue,
        };
        let root_pc = match pitch_class_of(&chord.root) {
            Some(pc) => pc,
            None => continue,
        };
        let bass_index = usize::from(chord.suffix.contains('/'));
        match notes.get(bass_index) {
            Some(bass) if in_mask(mask, bass.pitch_class()) => {}
            _ => continue,
        }
        let accidental_degrees: Vec<u8> = notes
            .iter()
            .map(Note::pitch_class)
            .filter(|&pc| !in_mask(mask, pc))
            .map(|pc| (pc + 12 - root_pc) % 12)
            .collect();
        if let Some(max) = max_accidentals {
            if accidental_degrees.len() > max as usize {
                continue;
            }
        }
        matching.push(ChordAndAccidentals {
            chord: chord.clone(),
            accidental_degrees,
        });
    }

    let matching = Arc::new(matching);
    MATCHING_CACHE
        .lock()
        .expect("matching cache poisoned")
        .insert((mask, max_accidentals), Arc::clone(&matching));
    matching
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeySearchOptions {
    pub max_accidentals: u8,
    /// Judge key fit by the chord's core triad, ignoring color tones, and
    /// fall back to the full note list for triadless chords.
    pub only_base_triad: bool,
    pub restricted_modes: Vec<Mode>,
}

impl Default for KeySearchOptions {
    fn default() -> Self {
        KeySearchOptions {
            max_accidentals: 0,
            only_base_triad: true,
            restricted_modes: DEFAULT_RESTRICTED_MODES.to_vec(),
        }
    }
}

/// All major-mode-derived keys containing a chord, in circle-of-fifths order
/// of the parent scale and ascending mode degree within it.
pub fn keys_containing_chord(
    chord: &ExplodedChord,
    notes: &[Note],
    options: &KeySearchOptions,
) -> Vec<ScaleName> {
    let considered: Vec<Note> = if options.only_base_triad {
        triad_notes(chord).unwrap_or_else(|| notes.to_vec())
    } else {
        notes.to_vec()
    };

    let mut matching = Vec::new();
    for scale in &MAJOR_SCALES {
        let mask = scale_mask(scale);
        let accidentals = considered
            .iter()
            .filter(|note| !in_mask(mask, note.pitch_class()))
            .count();
        if accidentals > options.max_accidentals as usize {
            continue;
        }
        for (degree, tonic) in scale.iter().enumerate() {
            let mode = MODES_BY_DEGREE[degree];
            if !options.restricted_modes.contains(&mode) {
                matching.push(format!("{tonic} {mode}"));
            }
        }
    }
    matching
}
