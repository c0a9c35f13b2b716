use std::collections::BTreeMap;

use itertools::Itertools;
use lazy_static::lazy_static;
use log::debug;
use serde::Deserialize;

use crate::chord::ExplodedChord;
use crate::error::{Error, Result};
use crate::note::{note_for_display, Note};

/// One concrete fingering of a chord. `frets` runs low string to high,
/// -1 meaning muted; fret numbers are relative to `base_fret`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Fretting {
    pub frets: Vec<i8>,
    pub fingers: Vec<u8>,
    #[serde(rename = "baseFret")]
    pub base_fret: u8,
    pub barres: Vec<u8>,
    #[serde(default)]
    pub capo: bool,
}

#[derive(Debug, Deserialize)]
struct LibraryEntry {
    suffix: String,
    positions: Vec<Fretting>,
}

#[derive(Debug, Deserialize)]
struct ChordDb {
    keys: Vec<String>,
    chords: BTreeMap<String, Vec<LibraryEntry>>,
}

lazy_static! {
    static ref DB: ChordDb =
        serde_json::from_str(include_str!("../data/guitar.json")).expect("embedded guitar.json");

    static ref ROOTS: Vec<&'static str> = DB.keys.iter().map(String::as_str).collect();

    /// Standard tuning, low to high.
    static ref OPEN_STRINGS: Vec<Note> = ["E2", "A2", "D3", "G3", "B3", "E4"]
        .iter()
        .map(|s| Note::parse(s).expect("open string name"))
        .collect();

    static ref ALL_CHORDS: Vec<ExplodedChord> = DB
        .chords
        .iter()
        .flat_map(|(lookup_key, entries)| {
            let root = lookup_key.replace("sharp", "#");
            entries
                .iter()
                .map(move |entry| ExplodedChord::new(root.clone(), entry.suffix.clone()))
        })
        .collect();
}

/// Root spellings the catalogue is keyed by.
pub(crate) fn roots() -> &'static [&'static str] {
    &ROOTS
}

/// The whole catalogue, flattened once at startup.
pub fn all_known_chords() -> &'static [ExplodedChord] {
    &ALL_CHORDS
}

/// All stored voicings for a root+suffix pair. A missing suffix is
/// recoverable upstream ("no such variant"), so it comes back as an error
/// with the available suffixes logged for diagnosis.
pub fn lookup_frettings(chord: &ExplodedChord) -> Result<&'static [Fretting]> {
    let not_found = || Error::NotFound {
        root: chord.root.clone(),
        suffix: chord.suffix.clone(),
    };
    // the database spells out "#" in its lookup keys, e.g. Csharp
    let lookup_key = chord.root.replace('#', "sharp");
    let entries = DB.chords.get(&lookup_key).ok_or_else(not_found)?;
    match entries.iter().find(|e| e.suffix == chord.suffix) {
        Some(entry) => Ok(&entry.positions),
        None => {
            debug!(
                "no {} fretting for {:?}; available suffixes: {}",
                chord.root,
                chord.suffix,
                entries.iter().map(|e| &e.suffix).join(", ")
            );
            Err(not_found())
        }
    }
}

fn semitone_offset(fret: i8, base_fret: u8) -> i32 {
    // fret 0 is the open string no matter where the shape is anchored
    if fret == 0 {
        0
    } else {
        fret as i32 + base_fret as i32 - 1
    }
}

/// The sounded pitches of one voicing, low string to high. Variant selection
/// is cyclic (index mod voicing count).
pub fn notes_of(chord: &ExplodedChord, variant: usize) -> Result<Vec<Note>> {
    let frettings = lookup_frettings(chord)?;
    let fretting = &frettings[variant % frettings.len()];
    Ok(OPEN_STRINGS
        .iter()
        .zip(&fretting.frets)
        .filter(|(_, &fret)| fret >= 0)
        .map(|(open, &fret)| open.transpose(semitone_offset(fret, fretting.base_fret)))
        .collect())
}

/// Diagram-ready form of one voicing for the presentation shell's fretboard
/// widget: per-string dots plus sounded note labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagram {
    /// (string number 6..1, fret) pairs; `None` marks a muted string.
    pub dots: Vec<(u8, Option<u8>)>,
    pub base_fret: u8,
    /// Per-string note label, spelled for the key context; "" when muted.
    pub note_labels: Vec<String>,
}

pub fn diagram_for(fretting: &Fretting, key_name: Option<&str>) -> Diagram {
    let dots = fretting
        .frets
        .iter()
        .enumerate()
        .map(|(i, &fret)| {
            let string_number = 6 - i as u8;
            (string_number, (fret >= 0).then_some(fret as u8))
        })
        .collect();
    let note_labels = OPEN_STRINGS
        .iter()
        .zip(&fretting.frets)
        .map(|(open, &fret)| {
            if fret < 0 {
                String::new()
            } else {
                let sounded = open.transpose(semitone_offset(fret, fretting.base_fret));
                note_for_display(&sounded.name, key_name)
            }
        })
        .collect();
    Diagram {
        dots,
        base_fret: fretting.base_fret,
        note_labels,
    }
}
