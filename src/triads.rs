use std::collections::HashMap;

use itertools::Itertools;
use lazy_static::lazy_static;

use crate::catalogue::all_known_chords;
use crate::chord::ExplodedChord;
use crate::keys::{scale_notes, spelling_in_key};
use crate::note::{letter_index, pitch_class_of, Note};

/// The two stacked semitone intervals that make up a triad shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Triad(pub u8, pub u8);

pub const POWER_TRIAD: Triad = Triad(0, 7); // not a triad, but it earns its keep
pub const SUS2_TRIAD: Triad = Triad(2, 5);
pub const SUS4_TRIAD: Triad = Triad(5, 2);
pub const MINOR_TRIAD: Triad = Triad(3, 4);
pub const MAJOR_TRIAD: Triad = Triad(4, 3);
pub const MAJOR_DIM_TRIAD: Triad = Triad(4, 2); // e.g. 7b5
pub const DIMINISHED_TRIAD: Triad = Triad(3, 3);
pub const AUGMENTED_TRIAD: Triad = Triad(4, 4);

fn mark(
    map: &mut HashMap<String, Triad>,
    remaining: &mut Vec<String>,
    triad: Triad,
    pred: impl Fn(&str) -> bool,
) {
    remaining.retain(|suffix| {
        if pred(suffix) {
            map.insert(suffix.clone(), triad);
            false
        } else {
            true
        }
    });
}

lazy_static! {
    /// Every catalogued suffix classified into at most one triad shape.
    /// Rule order is a total ordering: each rule only sees suffixes the
    /// earlier rules left unclassified, so "mmaj7" lands on minor before
    /// the bare "m" rule runs, and "b5" outranks bare "m" so that "m7b5"
    /// classifies as the major-flat5 shape.
    static ref SUFFIX_TO_TRIAD: HashMap<String, Triad> = {
        let mut map = HashMap::new();
        let mut remaining: Vec<String> = all_known_chords()
            .iter()
            .map(|chord| chord.suffix.clone())
            .unique()
            .collect();
        let m = &mut map;
        let r = &mut remaining;
        mark(m, r, DIMINISHED_TRIAD, |x| x.starts_with("dim"));
        mark(m, r, MAJOR_TRIAD, |x| x.starts_with("maj"));
        mark(m, r, MINOR_TRIAD, |x| x.starts_with("min"));
        mark(m, r, MINOR_TRIAD, |x| x.starts_with("m/"));
        mark(m, r, MINOR_TRIAD, |x| x.starts_with("mmaj"));
        mark(m, r, SUS2_TRIAD, |x| x.contains("sus2"));
        mark(m, r, SUS4_TRIAD, |x| x.contains("sus4"));
        mark(m, r, MAJOR_TRIAD, |x| x.starts_with('/'));
        mark(m, r, MAJOR_TRIAD, |x| x == "69");
        mark(m, r, POWER_TRIAD, |x| x == "5");
        mark(m, r, MAJOR_TRIAD, |x| x == "add9");
        mark(m, r, MAJOR_DIM_TRIAD, |x| x.contains("b5"));
        mark(m, r, AUGMENTED_TRIAD, |x| x.contains("aug"));
        mark(m, r, MINOR_TRIAD, |x| x.starts_with('m'));
        mark(m, r, MAJOR_TRIAD, |x| {
            x.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false)
        });
        mark(m, r, MAJOR_DIM_TRIAD, |x| x == "alt");
        // anything still unclassified has no well-formed triad and stays out
        map
    };
}

/// Triad shape for a suffix, or `None` when the suffix has no well-formed
/// triad. Callers treat `None` as "cannot place in a key", not a failure.
pub fn classify(suffix: &str) -> Option<Triad> {
    SUFFIX_TO_TRIAD.get(suffix).copied()
}

/// The three component notes of a triad built on a root (with or without
/// an octave).
pub fn build_triad(root: &Note, triad: Triad) -> Vec<Note> {
    vec![
        root.clone(),
        root.transpose(triad.0 as i32),
        root.transpose((triad.0 + triad.1) as i32),
    ]
}

/// Core notes of a chord, ignoring extensions, or `None` if its suffix
/// has no triad.
pub fn triad_notes(chord: &ExplodedChord) -> Option<Vec<Note>> {
    let triad = classify(&chord.suffix)?;
    let root = Note {
        name: chord.root.clone(),
        octave: None,
    };
    Some(build_triad(&root, triad))
}

const UPPER_NUMERALS: [&str; 7] = ["Ⅰ", "Ⅱ", "Ⅲ", "Ⅳ", "Ⅴ", "Ⅵ", "Ⅶ"];
const LOWER_NUMERALS: [&str; 7] = ["ⅰ", "ⅱ", "ⅲ", "ⅳ", "ⅴ", "ⅵ", "ⅶ"];

/// Roman-numeral label for a chord inside a key, e.g. "ⅱ°" or "♭Ⅲ".
///
/// Degree comes from the diatonic letter distance between the key tonic and
/// the chord root; the accidental prefix is the pitch-class delta against
/// the key's own note at that degree. Casing and quality symbols are driven
/// by the classified triad, never the raw suffix text. Unrepresentable
/// chords come back as the "?" sentinel.
pub fn roman_numeral(key_name: &str, chord: &ExplodedChord) -> String {
    let (scale, root, root_pc) = match (
        scale_notes(key_name),
        pitch_class_of(&chord.root),
    ) {
        (Some(scale), Some(pc)) => {
            let root = spelling_in_key(key_name, pc).unwrap_or_else(|| chord.root.clone());
            (scale, root, pc)
        }
        _ => return "?".to_string(),
    };

    let (degree, accidental) = match (letter_index(&root), letter_index(scale[0])) {
        (Some(root_letter), Some(tonic_letter)) => {
            let degree = (root_letter + 7 - tonic_letter) % 7;
            let expected = pitch_class_of(scale[degree]).unwrap_or(0);
            let delta = (root_pc as i32 - expected as i32).rem_euclid(12);
            let accidental = match delta {
                0 => "",
                1 => "♯",
                11 => "♭",
                _ => return "?".to_string(),
            };
            (degree, accidental)
        }
        _ => return "?".to_string(),
    };

    let triad = match classify(&chord.suffix) {
        Some(t) => t,
        None => return "?".to_string(),
    };
    let minor_family = triad == MINOR_TRIAD || triad == DIMINISHED_TRIAD;
    let numeral = if minor_family {
        LOWER_NUMERALS[degree]
    } else {
        UPPER_NUMERALS[degree]
    };
    let symbol = if triad == DIMINISHED_TRIAD || triad == MAJOR_DIM_TRIAD {
        "°"
    } else if triad == AUGMENTED_TRIAD {
        "⁺"
    } else if chord.suffix.contains("sus") {
        "ₛᵤₛ"
    } else {
        ""
    };
    format!("{accidental}{numeral}{symbol}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_vectors() {
        assert_eq!(classify("m7b5"), Some(MAJOR_DIM_TRIAD));
        assert_eq!(classify("sus4"), Some(SUS4_TRIAD));
        assert_eq!(classify("5"), Some(POWER_TRIAD));
        assert_eq!(classify("major"), Some(MAJOR_TRIAD));
        assert_eq!(classify("minor"), Some(MINOR_TRIAD));
        assert_eq!(classify("mmaj7"), Some(MINOR_TRIAD));
        assert_eq!(classify("dim7"), Some(DIMINISHED_TRIAD));
        assert_eq!(classify("aug7"), Some(AUGMENTED_TRIAD));
        assert_eq!(classify("alt"), Some(MAJOR_DIM_TRIAD));
        assert_eq!(classify("/G"), Some(MAJOR_TRIAD));
        assert_eq!(classify("m/G"), Some(MINOR_TRIAD));
        assert_eq!(classify("maj7b5"), Some(MAJOR_TRIAD));
        assert_eq!(classify("no such suffix"), None);
    }

    #[test]
    fn every_catalogued_suffix_classifies() {
        for chord in all_known_chords() {
            assert!(
                classify(&chord.suffix).is_some(),
                "unclassified suffix: {:?}",
                chord.suffix
            );
        }
    }

    #[test]
    fn triad_notes_are_root_plus_stacked_intervals() {
        let chord = ExplodedChord::new("C", "minor");
        let notes = triad_notes(&chord).unwrap();
        let names: Vec<&str> = notes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["C", "D#", "G"]);
        assert!(triad_notes(&ExplodedChord::new("C", "bogus")).is_none());
    }

    #[test]
    fn diatonic_numerals_in_c_major() {
        let cases = [
            ("C", "major", "Ⅰ"),
            ("D", "minor", "ⅱ"),
            ("E", "m7", "ⅲ"),
            ("F", "maj7", "Ⅳ"),
            ("G", "7", "Ⅴ"),
            ("A", "minor", "ⅵ"),
            ("B", "dim", "ⅶ°"),
        ];
        for (root, suffix, expected) in cases {
            let numeral = roman_numeral("C major", &ExplodedChord::new(root, suffix));
            assert_eq!(numeral, expected, "{root} {suffix}");
        }
    }

    #[test]
    fn quality_symbols_come_from_the_triad() {
        assert_eq!(
            roman_numeral("C major", &ExplodedChord::new("G", "7b5")),
            "Ⅴ°"
        );
        assert_eq!(
            roman_numeral("C major", &ExplodedChord::new("C", "aug")),
            "Ⅰ⁺"
        );
        assert_eq!(
            roman_numeral("C major", &ExplodedChord::new("D", "sus4")),
            "Ⅱₛᵤₛ"
        );
    }

    #[test]
    fn out_of_scale_roots_take_an_accidental_prefix() {
        // Eb against C major: lowered third degree
        assert_eq!(
            roman_numeral("C major", &ExplodedChord::new("Eb", "major")),
            "♭Ⅲ"
        );
        assert_eq!(
            roman_numeral("C major", &ExplodedChord::new("F#", "dim")),
            "♯ⅳ°"
        );
    }

    #[test]
    fn unknown_key_or_suffix_is_the_sentinel() {
        assert_eq!(
            roman_numeral("H mixofeelian", &ExplodedChord::new("C", "major")),
            "?"
        );
        assert_eq!(
            roman_numeral("C major", &ExplodedChord::new("C", "bogus")),
            "?"
        );
    }
}
