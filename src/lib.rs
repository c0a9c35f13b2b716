//! chordsmith: the music-theory engine behind a chord prompt generator.
//!
//! Pure, synchronous and CPU-bound: chord names are parsed into structured
//! chords, triads and sounded notes are derived from an embedded guitar
//! voicing catalogue, keys are matched against them, and a weighted random
//! selector regenerates chord sequences under per-entry constraints. The
//! presentation shell (UI, auth, streaming API, playback) lives elsewhere
//! and consumes this crate as a library.
//!
//! Randomized operations take `&mut impl Rng`, so callers own determinism.

pub mod catalogue;
pub mod chord;
pub mod error;
pub mod flavour;
pub mod generate;
pub mod keys;
pub mod note;
pub mod triads;

pub use catalogue::{all_known_chords, diagram_for, lookup_frettings, notes_of, Diagram, Fretting};
pub use chord::{chord_for_display, combine, explode, ExplodedChord};
pub use error::{Error, Result};
pub use flavour::{ChordSelector, Flavour, FLAVOUR_CHOICES};
pub use generate::{
    set_chord, set_flavour, set_key, shuffle_all, ChordChoice, GenerationContext, SourceSet,
};
pub use keys::{
    chords_matching_scale, keys_containing_chord, scale_notes, ChordAndAccidentals,
    KeySearchOptions, Mode, ScaleName,
};
pub use note::{note_for_display, untransform, Note};
pub use triads::{classify, roman_numeral, triad_notes, Triad};
