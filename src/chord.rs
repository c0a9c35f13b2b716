use std::hash::{Hash, Hasher};

use itertools::Itertools;
use lazy_static::lazy_static;

use crate::catalogue;
use crate::error::{Error, Result};
use crate::note::{display_accidentals, note_for_display, note_name_equals, pitch_class_of};

/// A chord name split into the catalogue's lookup parts: a root pitch class
/// name and an opaque suffix key (e.g. "major", "m7", "sus4", "/G").
#[derive(Debug, Clone, Eq)]
pub struct ExplodedChord {
    pub root: String,
    pub suffix: String,
}

/// Hash through the root's pitch class so it agrees with [`PartialEq`].
impl Hash for ExplodedChord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        pitch_class_of(&self.root).hash(state);
        self.suffix.hash(state);
    }
}

impl ExplodedChord {
    pub fn new(root: impl Into<String>, suffix: impl Into<String>) -> Self {
        ExplodedChord {
            root: root.into(),
            suffix: suffix.into(),
        }
    }
}

/// Equality is pitch-class equality of the root plus exact suffix equality,
/// so "Db major" and "C# major" are the same chord.
impl PartialEq for ExplodedChord {
    fn eq(&self, other: &Self) -> bool {
        note_name_equals(&self.root, &other.root) && self.suffix == other.suffix
    }
}

/// Spellings the catalogue does not use as keys, mapped to the ones it does.
pub(crate) const ROOT_ALIASES: [(&str, &str); 5] = [
    ("Db", "C#"),
    ("D#", "Eb"),
    ("Gb", "F#"),
    ("G#", "Ab"),
    ("A#", "Bb"),
];

lazy_static! {
    /// Every root spelling we accept, longest first so "Eb" matches before "E".
    static ref ROOTS_BY_DESC_LENGTH: Vec<&'static str> = catalogue::roots()
        .iter()
        .copied()
        .chain(ROOT_ALIASES.iter().map(|(alias, _)| *alias))
        .sorted_by_key(|r| std::cmp::Reverse(r.len()))
        .collect();
}

/// Split a chord name like "A#minor" or "C/G" into the catalogue's canonical
/// root and suffix.
pub fn explode(chord_name: &str) -> Result<ExplodedChord> {
    for prefix in ROOTS_BY_DESC_LENGTH.iter() {
        if let Some(rest) = chord_name.strip_prefix(prefix) {
            let root = ROOT_ALIASES
                .iter()
                .find(|(alias, _)| alias == prefix)
                .map(|(_, canonical)| *canonical)
                .unwrap_or(prefix);
            return Ok(ExplodedChord::new(root, rest.trim()));
        }
    }
    Err(Error::UnknownChord(chord_name.to_string()))
}

/// Inverse of [`explode`].
pub fn combine(chord: &ExplodedChord) -> String {
    format!("{} {}", chord.root, chord.suffix)
}

/// Format a chord for labels: root spelled for the key context, typographic
/// accidentals, and no space before a slash suffix ("C/G", not "C /G").
pub fn chord_for_display(chord: &ExplodedChord, key_name: Option<&str>) -> String {
    let root = note_for_display(&chord.root, key_name);
    let suffix = display_accidentals(&chord.suffix);
    if suffix.starts_with('/') {
        format!("{root}{suffix}")
    } else {
        format!("{root} {suffix}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_root_wins() {
        let chord = explode("Eb major").unwrap();
        assert_eq!(chord.root, "Eb");
        assert_eq!(chord.suffix, "major");
        let chord = explode("E major").unwrap();
        assert_eq!(chord.root, "E");
    }

    #[test]
    fn aliases_translate_to_catalogue_roots() {
        assert_eq!(explode("Dbmaj7").unwrap().root, "C#");
        assert_eq!(explode("A#minor").unwrap(), ExplodedChord::new("Bb", "minor"));
        assert_eq!(explode("G#m7").unwrap().root, "Ab");
    }

    #[test]
    fn unknown_root_is_an_error() {
        assert!(matches!(explode("Hb major"), Err(Error::UnknownChord(_))));
        assert!(matches!(explode(""), Err(Error::UnknownChord(_))));
    }

    #[test]
    fn equality_is_enharmonic_on_the_root() {
        assert_eq!(
            ExplodedChord::new("C#", "major"),
            ExplodedChord::new("Db", "major")
        );
        assert_ne!(
            ExplodedChord::new("C#", "major"),
            ExplodedChord::new("C#", "maj7")
        );
    }

    #[test]
    fn display_handles_slash_chords_and_accidentals() {
        let over = ExplodedChord::new("C", "/G");
        assert_eq!(chord_for_display(&over, None), "C/G");
        let sharp = ExplodedChord::new("F#", "m7");
        assert_eq!(chord_for_display(&sharp, None), "F♯ m7");
    }

    #[test]
    fn full_catalogue_round_trips() {
        for chord in catalogue::all_known_chords() {
            assert_eq!(&explode(&combine(chord)).unwrap(), chord);
        }
    }
}
